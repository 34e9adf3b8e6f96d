//! `depcycle cycles` command implementation.

use std::path::Path;

use colored::Colorize;
use depcycle::{AnalysisLevel, Analyzer};

use super::display::{print_cycle, print_errors, print_fixes};

/// Run the cycles command.
pub fn run(
    workspace: &Path,
    level: Option<&str>,
    new_only: bool,
    fixes: bool,
) -> Result<(), depcycle::Error> {
    let level = level
        .map(|name| {
            AnalysisLevel::parse(name).ok_or_else(|| {
                depcycle::Error::Config(format!(
                    "unknown level '{name}' (expected namespace, class or system)"
                ))
            })
        })
        .transpose()?;

    let mut analyzer = Analyzer::new(workspace)?;
    let result = analyzer.update()?;

    let cycles: Vec<_> = result
        .circular_dependencies
        .iter()
        .filter(|c| level.is_none_or(|l| c.level == l))
        .filter(|c| !new_only || c.is_new)
        .collect();

    if cycles.is_empty() {
        println!("{}", "No circular dependencies detected.".green());
        print_errors(&result.errors);
        return Ok(());
    }

    println!(
        "Found {} circular dependencies:",
        cycles.len().to_string().red().bold()
    );
    println!();

    for (i, cycle) in cycles.iter().enumerate() {
        print_cycle(i + 1, cycle);
        if fixes {
            print_fixes(&analyzer.suggest_fixes(cycle));
        }
        println!();
    }

    print_errors(&result.errors);
    Ok(())
}
