//! The density-matrix model driving a full controller run.

use harch_adapter_dm::{Coherence, DmParams, DmPhysics};
use harch_core::{CatchTime, Controller, PhysicsSet, SimConfig};

fn physics() -> DmPhysics {
    DmPhysics::new(DmParams {
        coherence: Coherence::new(1.0e6, 1.0e6).unwrap(),
        source_fidelity: 0.9,
        ..DmParams::default()
    })
    .unwrap()
}

fn config(seed: u64) -> SimConfig {
    let mut config = SimConfig::default();
    config.seed = seed;
    config.cycles = 400;
    config.clock_step_ns = 10;
    config.input.catch_time = CatchTime::Fixed { ns: 20 };
    config.policy.target_fidelity = 0.93;
    config.policy.fidelity_error = 0.005;
    config.policy.same_fidelity_error = 0.01;
    config
}

#[test]
fn run_purifies_and_emits_above_source() {
    let set = PhysicsSet::uniform(physics());
    let mut controller = Controller::from_config(&config(7), set).unwrap();
    let report = controller.run().unwrap();

    assert!(report.generated > 0);
    assert!(report.purification.rounds() > 0);
    for pair in &report.emitted {
        assert!(pair.fidelity > 0.9);
        assert!(pair.rounds >= 1);
    }
    let samples = &report.samples;
    assert!(samples.windows(2).all(|w| w[1].maximum >= w[0].maximum));
}

#[test]
fn same_seed_reproduces_run() {
    let run = |seed| {
        let set = PhysicsSet::uniform(physics());
        let mut controller = Controller::from_config(&config(seed), set).unwrap();
        let report = controller.run().unwrap();
        (
            report.purification,
            report.emitted.len(),
            report.emitted.iter().map(|p| p.fidelity).collect::<Vec<_>>(),
        )
    };
    assert_eq!(run(3), run(3));
}
