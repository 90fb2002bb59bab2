//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use serde::{Deserialize, Serialize};

use harch_adapter_dm::DmParams;
use harch_adapter_werner::WernerParams;
use harch_core::{RunReport, SimConfig};

/// Pair model selected by an experiment file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PhysicsConfig {
    /// 4×4 density matrices with T1/T2 relaxation.
    Dm(DmParams),
    /// Closed-form Werner pairs.
    Werner(WernerParams),
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self::Werner(WernerParams::default())
    }
}

impl PhysicsConfig {
    /// Default parameters for a model name.
    pub fn for_model(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "dm" | "density-matrix" | "density_matrix" => Ok(Self::Dm(DmParams::default())),
            "werner" => Ok(Self::Werner(WernerParams::default())),
            other => anyhow::bail!("Unknown physics model: '{other}'. Available: dm, werner"),
        }
    }

    /// Short model name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dm(_) => "dm",
            Self::Werner(_) => "werner",
        }
    }

    /// Switch to `name`, keeping the current parameters if the model is unchanged.
    pub fn with_model(self, name: &str) -> Result<Self> {
        let requested = Self::for_model(name)?;
        if requested.name() == self.name() {
            Ok(self)
        } else {
            Ok(requested)
        }
    }
}

/// Top-level layout of an experiment YAML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentFile {
    /// Controller, module and timing parameters.
    pub simulation: SimConfig,
    /// Pair model.
    pub physics: PhysicsConfig,
}

impl ExperimentFile {
    /// Parse and validate YAML text.
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let file: Self =
            serde_yaml_ng::from_str(source).context("Failed to parse experiment file")?;
        file.simulation.validate()?;
        Ok(file)
    }

    /// Render as YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

/// Load an experiment file, or the defaults when `path` is `None`.
pub fn load_experiment(path: Option<&str>) -> Result<ExperimentFile> {
    let Some(path) = path else {
        return Ok(ExperimentFile::default());
    };

    if !Path::new(path).exists() {
        anyhow::bail!("File not found: {path}");
    }

    let source = fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))?;
    ExperimentFile::from_yaml_str(&source)
        .with_context(|| format!("Invalid experiment file: {path}"))
}

/// Print the human-readable summary of a finished run.
pub fn print_report<S>(report: &RunReport<S>) {
    println!(
        "\n{} Simulated {} ticks ({})",
        style("✓").green().bold(),
        report.cycles,
        report.final_time
    );

    println!("  Pairs caught:   {}", style(report.generated).cyan());
    println!("  Pairs emitted:  {}", style(report.emitted.len()).cyan());

    let tally = &report.purification;
    let rounds = tally.rounds();
    if rounds > 0 {
        let rate = tally.successes as f64 / rounds as f64 * 100.0;
        println!(
            "  Purifications:  {} ({} ok, {} failed, {:.1}% success)",
            rounds,
            style(tally.successes).green(),
            style(tally.failures).red(),
            rate
        );
    } else {
        println!("  Purifications:  0");
    }

    if let Some(mean) = report.mean_emitted_fidelity() {
        println!("  Mean emitted F: {}", style(format!("{mean:.5}")).yellow());
    }
    if let Some(max) = report.max_fidelity() {
        println!("  Best pair F:    {}", style(format!("{max:.5}")).yellow());
    }

    println!("\n  Modules:");
    for module in &report.modules {
        let bar_len = (module.utilisation.busy_fraction() * 20.0).round() as usize;
        println!(
            "  {:<18} {:>3} cells, {:>3} locked, {:>3} pairs {}",
            style(&module.label).cyan(),
            module.cells,
            module.locked,
            module.stored_pairs,
            style("█".repeat(bar_len)).green()
        );
    }
}
