//! Run command implementation.

use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use harch_adapter_dm::DmPhysics;
use harch_adapter_werner::WernerPhysics;
use harch_core::{Controller, PairPhysics, PhysicsSet, RunReport, SimConfig};

use super::common::{PhysicsConfig, load_experiment, print_report};

/// Execute the run command.
pub fn execute(
    config: Option<&str>,
    cycles: Option<u64>,
    seed: Option<u64>,
    physics: Option<&str>,
    export: Option<&str>,
    quiet: bool,
) -> Result<()> {
    let mut experiment = load_experiment(config)?;
    if let Some(cycles) = cycles {
        experiment.simulation.cycles = cycles;
    }
    if let Some(seed) = seed {
        experiment.simulation.seed = seed;
    }
    if let Some(model) = physics {
        experiment.physics = experiment.physics.with_model(model)?;
    }
    experiment.simulation.validate()?;

    let sim = &experiment.simulation;
    println!(
        "{} Running {} ticks of {} ns with {} physics (seed {})",
        style("→").cyan().bold(),
        style(sim.cycles).green(),
        sim.clock_step_ns,
        style(experiment.physics.name()).yellow(),
        sim.seed
    );
    println!(
        "  Cells: {} input, {} memory, {} distillation, {} distilled",
        sim.input.generators, sim.memory.cells, sim.distillation.cells, sim.distilled_memory.cells
    );

    let started = Instant::now();
    let json = match &experiment.physics {
        PhysicsConfig::Dm(params) => {
            let model = DmPhysics::new(*params).context("Invalid density-matrix parameters")?;
            simulate(sim, model, quiet)?
        }
        PhysicsConfig::Werner(params) => {
            let model = WernerPhysics::new(*params).context("Invalid Werner parameters")?;
            simulate(sim, model, quiet)?
        }
    };
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "Simulation finished");

    if let Some(path) = export {
        fs::write(path, json).with_context(|| format!("Failed to write report: {path}"))?;
        println!("\n  Report written to {}", style(path).green());
    }

    Ok(())
}

/// Run the controller, print the summary and return the JSON report.
fn simulate<M: PairPhysics>(config: &SimConfig, model: M, quiet: bool) -> Result<String> {
    let mut controller = Controller::from_config(config, PhysicsSet::uniform(model))?;

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(config.cycles)
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} ticks, {msg}")?
            .progress_chars("=> "),
    );

    let mut emitted = 0usize;
    let report: RunReport<M::State> = controller.run_with(|tick| {
        emitted += tick.emitted.len();
        progress.inc(1);
        if !tick.emitted.is_empty() {
            progress.set_message(format!("{emitted} emitted"));
        }
    })?;
    progress.finish_and_clear();

    print_report(&report);
    Ok(report.to_json_pretty()?)
}
