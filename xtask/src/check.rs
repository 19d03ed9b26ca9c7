use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{OnFailure, Step};

const TARGET: &str = "thumbv7em-none-eabihf";

pub fn run(host_only: bool) -> Result<()> {
    println!();
    println!("{}", "🔍 Checking builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    if !host_only {
        // Portable core: no back-end, SpinSignal as the default Signal.
        Step {
            label: "Checking sched without a back-end (no_std)",
            args: &["check", "-p", "sched", "--target", TARGET],
            on_failure: OnFailure::Abort,
        }
        .run()?;

        Step {
            label: "Checking sched on the Cortex-M back-end",
            args: &[
                "check", "-p", "sched", "--target", TARGET, "--features", "hardware,defmt",
            ],
            on_failure: OnFailure::Abort,
        }
        .run()?;
    }

    Step {
        label: "Checking host back-end with tracing",
        args: &[
            "check",
            "-p",
            "sched",
            "--features",
            "std,tracing",
            "--all-targets",
        ],
        on_failure: OnFailure::Abort,
    }
    .run()?;

    Step {
        label: "Running clippy lints",
        args: &[
            "clippy",
            "--workspace",
            "--all-targets",
            "--features",
            "sched/std,sched/tracing",
            "--",
            "-D",
            "warnings",
        ],
        on_failure: OnFailure::Warn,
    }
    .run()?;

    if (Step {
        label: "Checking code formatting",
        args: &["fmt", "--all", "--check"],
        on_failure: OnFailure::Warn,
    })
    .run()?
    .is_none()
    {
        eprintln!("     Run 'cargo fmt --all' to fix");
        println!();
    }

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
