//! Common display utilities for CLI commands.

use colored::Colorize;
use depcycle::{AnalysisResult, Cycle, FileError, FixSuggestion, SuggestionPriority};

const MAX_DISPLAY_ITEMS: usize = 5;

/// Print the one-line outcome of a run plus cycle movement.
pub fn print_run_summary(result: &AnalysisResult) {
    println!(
        "{} {} run: {} files affected, {} files total",
        "Finished".green().bold(),
        result.mode,
        result.affected_files.len(),
        result.total_files
    );
    println!("{}: {:.2?}", "Duration".dimmed(), result.duration);

    let new_count = result.new_cycles().count();
    println!();
    println!(
        "  {}: {} ({} new, {} resolved)",
        "Cycles".white().bold(),
        result.circular_dependencies.len().to_string().red(),
        new_count.to_string().yellow(),
        result.resolved.len().to_string().green()
    );
    for resolved in &result.resolved {
        println!(
            "    {} [{}] {}",
            "✓".green(),
            resolved.level,
            resolved.members.join(", ").dimmed()
        );
    }

    print_errors(&result.errors);
}

/// Print skipped files, truncated to a few entries.
pub fn print_errors(errors: &[FileError]) {
    if errors.is_empty() {
        return;
    }

    println!();
    println!("{} ({}):", "Errors".red().bold(), errors.len());
    for err in errors.iter().take(MAX_DISPLAY_ITEMS) {
        println!("  {} {}: {}", "•".red(), err.path.display(), err.message);
    }
    if errors.len() > MAX_DISPLAY_ITEMS {
        println!("  ... and {} more", errors.len() - MAX_DISPLAY_ITEMS);
    }
}

/// Print one cycle with its path and the edges that close it.
pub fn print_cycle(number: usize, cycle: &Cycle) {
    let marker = if cycle.is_new {
        " new".yellow().bold().to_string()
    } else {
        String::new()
    };
    println!(
        "  {} {} [{}]{} {}",
        "Cycle".yellow().bold(),
        number,
        cycle.level,
        marker,
        cycle.id.dimmed()
    );
    println!("    {}", cycle.path_string().dimmed());

    for edge in &cycle.edges {
        let kind = edge.kind.map_or_else(|| "unknown".to_string(), |k| k.to_string());
        let location = match (&edge.file_path, edge.line_number) {
            (Some(path), Some(line)) => format!(" ({}:{line})", path.display()),
            (Some(path), None) => format!(" ({})", path.display()),
            _ => String::new(),
        };
        println!(
            "    {} {} → {}: {}{}",
            "•".dimmed(),
            edge.from,
            edge.to,
            kind,
            location.dimmed()
        );
    }
}

/// Print ranked fix suggestions under a cycle.
pub fn print_fixes(fixes: &[FixSuggestion]) {
    if fixes.is_empty() {
        println!("    {}", "No suggestions".dimmed());
        return;
    }

    for fix in fixes {
        let priority = match fix.priority {
            SuggestionPriority::High => "high".red().bold(),
            SuggestionPriority::Medium => "medium".yellow(),
            SuggestionPriority::Low => "low".dimmed(),
        };
        println!("    {} [{}] {}", "→".cyan(), priority, fix.description);
        for file in fix.files.iter().take(MAX_DISPLAY_ITEMS) {
            println!("        {}", file.display().to_string().dimmed());
        }
        if fix.files.len() > MAX_DISPLAY_ITEMS {
            println!("        ... and {} more", fix.files.len() - MAX_DISPLAY_ITEMS);
        }
    }
}
