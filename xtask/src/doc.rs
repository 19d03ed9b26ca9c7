use anyhow::Result;
use colored::Colorize;

use crate::step::{OnFailure, Step};

pub fn run(open: bool) -> Result<()> {
    println!();
    println!("{}", "📚 Building documentation...".cyan().bold());
    println!();

    let mut args = vec![
        "doc",
        "-p",
        "platform",
        "-p",
        "sched",
        "--no-deps",
        "--features",
        "sched/std",
    ];
    if open {
        args.push("--open");
    }

    Step {
        label: "Building documentation",
        args: &args,
        on_failure: OnFailure::Abort,
    }
    .run()?;

    if !open {
        println!(
            "   {}",
            "Open target/doc/sched/index.html in your browser".dimmed()
        );
        println!(
            "   {}",
            "Or run 'cargo run -p xtask -- doc --open'".dimmed()
        );
        println!();
    }

    Ok(())
}
