//! Config command implementation.

use anyhow::Result;

use super::common::{ExperimentFile, PhysicsConfig};

/// Print the default experiment file for `physics`.
pub fn execute(physics: &str) -> Result<()> {
    let file = ExperimentFile {
        physics: PhysicsConfig::for_model(physics)?,
        ..ExperimentFile::default()
    };
    print!("{}", file.to_yaml_string()?);
    Ok(())
}
