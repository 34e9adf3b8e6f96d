//! `depcycle stats` command implementation.

use std::path::Path;

use colored::Colorize;
use depcycle::{AnalysisLevel, Analyzer};

/// Run the stats command.
pub fn run(workspace: &Path) -> Result<(), depcycle::Error> {
    let mut analyzer = Analyzer::new(workspace)?;
    let result = analyzer.update()?;

    let db_path = analyzer.db_path();
    let db_size_str = match std::fs::metadata(db_path) {
        Ok(meta) => format_size(meta.len()),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to get database file size");
            "size unknown".to_string()
        }
    };

    println!("{}", "Depcycle Statistics".cyan().bold());
    println!();
    println!(
        "  {}: {} ({})",
        "Database".white().bold(),
        db_path.display(),
        db_size_str
    );
    println!(
        "  {}: {} cached",
        "Files".white().bold(),
        result.total_files.to_string().green()
    );
    println!();

    for level in AnalysisLevel::ALL {
        let graph = result.dependencies.level(level);
        let level_cycles: Vec<_> = result.cycles_at(level).cloned().collect();
        let stats = analyzer.get_cycle_stats(&level_cycles);

        println!("  {}:", level.to_string().white().bold());
        println!(
            "    {}: {}, {}: {}",
            "Nodes".dimmed(),
            graph.len(),
            "Edges".dimmed(),
            graph.edge_count()
        );
        if graph.dangling_edge_count() > 0 {
            println!(
                "    {}: {}",
                "Unresolved edges".dimmed(),
                graph.dangling_edge_count()
            );
        }

        if stats.total == 0 {
            println!("    {}: {}", "Cycles".dimmed(), "0".green());
            continue;
        }
        println!(
            "    {}: {} ({} new), {} nodes involved",
            "Cycles".dimmed(),
            stats.total.to_string().red(),
            stats.new_count,
            stats.distinct_nodes
        );
        println!(
            "    {}: avg {:.1}, max {}",
            "Length".dimmed(),
            stats.average_length,
            stats.max_length
        );
        for (length, count) in &stats.length_histogram {
            println!("      {length}: {count}");
        }
    }

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
