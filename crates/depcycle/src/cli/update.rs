//! `depcycle update` command implementation.

use std::path::Path;

use colored::Colorize;
use depcycle::Analyzer;

use super::display::print_run_summary;

/// Run the update command.
pub fn run(workspace: &Path) -> Result<(), depcycle::Error> {
    let mut analyzer = Analyzer::new(workspace)?;
    let result = analyzer.update()?;

    if result.affected_files.is_empty() && result.resolved.is_empty() {
        println!("{}", "Nothing changed since the last run.".green());
        return Ok(());
    }

    print_run_summary(&result);
    Ok(())
}
