//! `depcycle analyze` command implementation.

use std::path::Path;

use colored::Colorize;
use depcycle::Analyzer;

use super::display::print_run_summary;

/// Run the analyze command.
pub fn run(workspace: &Path, rebuild: bool) -> Result<(), depcycle::Error> {
    println!("{} {}...", "Analyzing".cyan().bold(), workspace.display());

    let mut analyzer = Analyzer::new(workspace)?;
    if rebuild {
        println!("{}", "Discarding cache and known cycles".yellow());
        analyzer.reset()?;
    }

    let result = analyzer.run_full_analysis()?;

    println!();
    print_run_summary(&result);
    Ok(())
}
