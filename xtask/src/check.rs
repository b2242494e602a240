use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Boot firmware runs the engine before DRAM is up, on a bare-metal core.
const FIRMWARE_TARGET: &str = "thumbv7em-none-eabihf";

struct Step {
    label: &'static str,
    args: &'static [&'static str],
    /// Failures are reported but do not abort the run.
    advisory: bool,
}

const STEPS: &[Step] = &[
    Step {
        label: "firmware target (no_std, defmt)",
        args: &["check", "-p", "lpddr5", "--target", FIRMWARE_TARGET, "--features", "defmt"],
        advisory: false,
    },
    Step {
        label: "firmware target (no_std, no logging)",
        args: &["check", "-p", "lpddr5", "--target", FIRMWARE_TARGET, "--no-default-features"],
        advisory: false,
    },
    Step {
        label: "host (tracing, serde)",
        args: &["check", "-p", "lpddr5", "--features", "std,tracing,serde"],
        advisory: false,
    },
    Step {
        label: "clippy lints",
        args: &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        advisory: true,
    },
    Step {
        label: "code formatting",
        args: &["fmt", "--all", "--check"],
        advisory: true,
    },
];

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking lpddr5...".cyan().bold());
    println!();

    let total_start = Instant::now();

    for step in STEPS {
        println!("{}", format!("  Checking {}...", step.label).cyan());
        let start = Instant::now();

        let output = Command::new("cargo")
            .args(step.args)
            .output()
            .with_context(|| format!("Failed to run {}", step.label))?;

        if output.status.success() {
            println!(
                "{}",
                format!("  ✓ {} passed in {:.2}s", step.label, start.elapsed().as_secs_f64()).green()
            );
        } else if step.advisory {
            eprintln!("{}", format!("  ⚠ {} reported issues", step.label).yellow().bold());
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        } else {
            eprintln!("{}", format!("  ✗ {} failed", step.label).red().bold());
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            anyhow::bail!("{} failed", step.label);
        }
        println!();
    }

    println!(
        "{}",
        format!("✓ All checks completed in {:.2}s", total_start.elapsed().as_secs_f64())
            .green()
            .bold()
    );
    println!();

    Ok(())
}
