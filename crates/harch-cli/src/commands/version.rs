//! Version command implementation.

use console::style;

use harch_core::Priority;

use super::common::PhysicsConfig;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {}",
        style("harch").cyan().bold(),
        style(format!("v{version}")).yellow()
    );

    println!("\nPhysics models:");
    let default = PhysicsConfig::default().name();
    for name in ["dm", "werner"] {
        let marker = if name == default { " (default)" } else { "" };
        println!("  {}{}", style(name).green(), style(marker).dim());
    }

    println!("\nPriorities, highest first:");
    for (rank, priority) in Priority::ALL.iter().enumerate() {
        println!("  P{} {priority}", rank + 1);
    }
}
