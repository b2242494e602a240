use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();

    let run_unit = !integration_only;
    let run_integration = !unit_only;

    if run_unit {
        suite("unit", &["test", "-p", "lpddr5", "--lib"])?;
    }

    if run_integration {
        // serde enables the configuration loading tests
        suite("integration", &["test", "-p", "lpddr5", "--tests", "--features", "serde"])?;
    }

    println!("{}", "  Running doc tests...".cyan());
    let doc_start = Instant::now();
    let doc_output = Command::new("cargo")
        .args(["test", "--doc", "-p", "lpddr5"])
        .output()
        .context("Failed to run doc tests")?;

    if doc_output.status.success() {
        let summary = extract_test_summary(&String::from_utf8_lossy(&doc_output.stdout));
        println!(
            "{}",
            format!("  ✓ Doc tests passed {} in {:.2}s", summary, doc_start.elapsed().as_secs_f64()).green()
        );
    } else {
        eprintln!("{}", "  ⚠ Doc tests failed".yellow().bold());
    }
    println!();

    println!(
        "{}",
        format!("✓ All tests completed in {:.2}s", total_start.elapsed().as_secs_f64())
            .green()
            .bold()
    );
    println!();

    Ok(())
}

fn suite(name: &str, args: &[&str]) -> Result<()> {
    println!("{}", format!("  Running {name} tests...").cyan());
    let start = Instant::now();

    let output = Command::new("cargo")
        .args(args)
        .output()
        .with_context(|| format!("Failed to run {name} tests"))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() {
        eprintln!("{}", format!("  ✗ {name} tests failed").red().bold());
        eprintln!();
        for line in stdout.lines() {
            eprintln!("  {line}");
        }
        anyhow::bail!("{name} tests failed");
    }

    println!(
        "{}",
        format!(
            "  ✓ {name} tests passed {} in {:.2}s",
            extract_test_summary(&stdout),
            start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();
    Ok(())
}

fn extract_test_summary(output: &str) -> String {
    // Look for lines like "test result: ok. 5 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out"
    for line in output.lines() {
        if line.contains("test result:") {
            if let Some(summary) = line.split("test result:").nth(1) {
                return summary.trim().to_string();
            }
        }
    }
    "(summary not available)".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_extracted() {
        let out = "running 3 tests\ntest result: ok. 3 passed; 0 failed\n";
        assert_eq!(extract_test_summary(out), "ok. 3 passed; 0 failed");
    }

    #[test]
    fn missing_summary() {
        assert_eq!(extract_test_summary(""), "(summary not available)");
    }
}
