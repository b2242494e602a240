use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

pub fn run(open: bool) -> Result<()> {
    println!();
    println!("{}", "📚 Building lpddr5 documentation...".cyan().bold());
    println!();

    let start = Instant::now();

    // serde so the configuration derives show up; defmt stays off, it
    // needs a firmware linker script.
    let mut cmd = Command::new("cargo");
    cmd.args(["doc", "-p", "lpddr5", "--no-deps", "--features", "std,serde,tracing"]);
    if open {
        cmd.arg("--open");
    }

    let output = cmd.output().context("Failed to build documentation")?;
    if !output.status.success() {
        eprintln!("{}", "✗ Documentation build failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("Documentation build failed");
    }

    println!(
        "{}",
        format!("✓ Documentation built in {:.2}s", start.elapsed().as_secs_f64()).green()
    );
    if !open {
        println!();
        println!("   {}", "Open target/doc/lpddr5/index.html in your browser".dimmed());
    }
    println!();

    Ok(())
}
