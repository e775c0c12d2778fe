//! Plain-text rendering: the pipeline report and query result tables.

use std::{fmt, fs, path::Path};

use crate::{
    backend::QueryRow,
    dual_write::{LoadSummary, SyncMode},
    errors::MovieKgError,
    schema::EntityKind,
    stats::{GraphStats, StatsComparison},
};

const RULE: &str = "============================================================";

pub fn render_report(
    summary: &LoadSummary,
    stats: &[GraphStats],
    consistency: Option<&StatsComparison>,
) -> String {
    Report {
        summary,
        stats,
        consistency,
    }
    .to_string()
}

pub fn render_stats(stats: &GraphStats) -> String {
    StatsBlock(stats).to_string()
}

struct Report<'a> {
    summary: &'a LoadSummary,
    stats: &'a [GraphStats],
    consistency: Option<&'a StatsComparison>,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary;
        writeln!(f, "{RULE}")?;
        writeln!(f, "MOVIE KNOWLEDGE GRAPH - PIPELINE REPORT")?;
        writeln!(f, "{RULE}")?;
        writeln!(f)?;

        writeln!(f, "Load")?;
        writeln!(f, "  rows read:        {}", summary.rows_read)?;
        writeln!(
            f,
            "  works ingested:   {} ({})",
            summary.works_ingested, summary.primary_store
        )?;
        if let Some(store) = summary.secondary_store.filter(|_| summary.secondary_available) {
            writeln!(
                f,
                "  works ingested:   {} ({store})",
                summary.secondary_works_ingested
            )?;
        }
        let mode = match summary.state.mode() {
            Some(SyncMode::DualActive) => "dual",
            Some(SyncMode::PrimaryOnly) => "primary only",
            None => "not started",
        };
        writeln!(f, "  mode:             {mode}")?;
        writeln!(f, "  rows skipped:     {}", summary.skipped.len())?;
        for skipped in &summary.skipped {
            writeln!(f, "    line {}: {}", skipped.line, skipped.reason)?;
        }
        if let Some(reason) = &summary.secondary_unavailable {
            let store = summary.secondary_store.unwrap_or("secondary store");
            writeln!(f, "  {store} unavailable: {reason}")?;
        }
        if !summary.secondary_errors.is_empty() {
            writeln!(f, "  secondary errors: {}", summary.secondary_errors.len())?;
            for error in &summary.secondary_errors {
                writeln!(f, "    line {}: {}", error.line, error.reason)?;
            }
        }
        for conflict in &summary.schema_conflicts {
            writeln!(f, "  schema conflict: {conflict}")?;
        }

        for store in self.stats {
            writeln!(f)?;
            write!(f, "{}", StatsBlock(store))?;
        }

        if let Some(comparison) = self.consistency {
            writeln!(f)?;
            if comparison.consistent() {
                writeln!(
                    f,
                    "Consistency: {} and {} agree",
                    comparison.left.store, comparison.right.store
                )?;
            } else {
                writeln!(f, "Consistency: MISMATCH")?;
                for mismatch in &comparison.mismatches {
                    writeln!(f, "  {mismatch}")?;
                }
            }
        }
        Ok(())
    }
}

struct StatsBlock<'a>(&'a GraphStats);

impl fmt::Display for StatsBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.0;
        writeln!(f, "Statistics ({})", stats.store)?;
        for kind in EntityKind::ALL {
            let label = format!("{}s:", kind.label().to_lowercase());
            writeln!(f, "  {label:<18}{}", stats.count(kind))?;
        }
        writeln!(f, "  {:<18}{}", "relationships:", stats.relationships)?;
        match stats.average_rating {
            Some(average) => writeln!(f, "  {:<18}{average:.2}", "average rating:"),
            None => writeln!(f, "  {:<18}n/a", "average rating:"),
        }
    }
}

pub fn write_report<P: AsRef<Path>>(path: P, report: &str) -> Result<(), MovieKgError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, report)?;
    Ok(())
}

/// Aligned text table; columns come from the first row.
pub fn render_table(rows: &[QueryRow]) -> String {
    let Some(first) = rows.first() else {
        return "(no rows)\n".to_owned();
    };
    let columns: Vec<&str> = first.column_names().collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(column).map(|v| v.to_string()).unwrap_or_default())
                .collect()
        })
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(column, width)| format!("{column:<width$}"))
        .collect();
    push_line(&mut out, header.join(" | ").trim_end());
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    push_line(&mut out, &rule.join("-+-"));
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        push_line(&mut out, line.join(" | ").trim_end());
    }
    let noun = if rows.len() == 1 { "row" } else { "rows" };
    push_line(&mut out, &format!("({} {noun})", rows.len()));
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}
