//! End-to-end load: CSV -> stores -> Turtle snapshot -> statistics -> report.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{
    config::KgConfig,
    dual_write::{LoadOptions, LoadSummary, SecondaryTarget, load_all},
    errors::MovieKgError,
    graph::SqliteGraph,
    ingest::read_csv,
    rdf::RdfStore,
    report::{render_report, write_report},
    stats::{GraphStats, StatsComparison, compare_stats, compute_stats},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadTarget {
    /// Triple store as primary, property graph as optional secondary.
    Both,
    TripleOnly,
    PropertyGraphOnly,
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub summary: LoadSummary,
    pub stats: Vec<GraphStats>,
    pub consistency: Option<StatsComparison>,
    pub snapshot: Option<PathBuf>,
    pub report_path: PathBuf,
    pub report: String,
}

pub fn run_load(config: &KgConfig, target: LoadTarget) -> Result<PipelineOutcome, MovieKgError> {
    let rows = read_csv(&config.input)?;
    info!(input = %config.input.display(), rows = rows.len(), ?target, "starting load");
    fs::create_dir_all(&config.output_dir)?;
    let options = LoadOptions {
        clear_before_load: config.load.clear_before_load,
    };

    let mut stats = Vec::new();
    let mut consistency = None;
    let mut snapshot = None;

    let summary = match target {
        LoadTarget::PropertyGraphOnly => {
            let graph = SqliteGraph::open(&config.property_graph.database)?;
            let summary = load_all(&rows, &graph, SecondaryTarget::Absent, &options)?;
            stats.push(compute_stats(&graph)?);
            summary
        }
        LoadTarget::TripleOnly | LoadTarget::Both => {
            let rdf = open_rdf_for_load(config)?;
            let graph = if target == LoadTarget::Both && config.property_graph.enabled {
                Some(open_secondary(config)?)
            } else {
                None
            };
            let secondary = match &graph {
                None => SecondaryTarget::Absent,
                Some(Ok(graph)) => SecondaryTarget::Store(graph),
                Some(Err(reason)) => SecondaryTarget::Unreachable(reason),
            };
            let summary = load_all(&rows, &rdf, secondary, &options)?;

            let snapshot_path = config.snapshot_path();
            rdf.save_turtle(&snapshot_path)?;
            info!(path = %snapshot_path.display(), "wrote triple store snapshot");
            snapshot = Some(snapshot_path);

            let rdf_stats = compute_stats(&rdf)?;
            if let Some(Ok(graph)) = &graph {
                if summary.secondary_available {
                    let graph_stats = compute_stats(graph)?;
                    let comparison = compare_stats(&rdf_stats, &graph_stats);
                    if !comparison.consistent() {
                        warn!(mismatches = ?comparison.mismatches, "stores disagree");
                    }
                    consistency = Some(comparison);
                    stats.push(rdf_stats.clone());
                    stats.push(graph_stats);
                } else {
                    stats.push(rdf_stats);
                }
            } else {
                stats.push(rdf_stats);
            }
            summary
        }
    };

    let report = render_report(&summary, &stats, consistency.as_ref());
    let report_path = config.report_path();
    write_report(&report_path, &report)?;
    info!(path = %report_path.display(), "wrote report");

    Ok(PipelineOutcome {
        summary,
        stats,
        consistency,
        snapshot,
        report_path,
        report,
    })
}

/// Without a clear, the previous snapshot is the starting point.
fn open_rdf_for_load(config: &KgConfig) -> Result<RdfStore, MovieKgError> {
    let snapshot = config.snapshot_path();
    if !config.load.clear_before_load && snapshot.is_file() {
        return RdfStore::from_turtle_file(&snapshot);
    }
    RdfStore::in_memory()
}

/// `Err(reason)` when the property graph cannot be opened but is optional.
fn open_secondary(config: &KgConfig) -> Result<Result<SqliteGraph, String>, MovieKgError> {
    match SqliteGraph::open(&config.property_graph.database) {
        Ok(graph) => Ok(Ok(graph)),
        Err(err) if config.property_graph.optional => {
            warn!(error = %err, "property graph unavailable");
            Ok(Err(err.to_string()))
        }
        Err(err) => Err(err),
    }
}

/// Reopens the triple store from the snapshot written by the last load.
pub fn open_triple_store(config: &KgConfig) -> Result<RdfStore, MovieKgError> {
    RdfStore::from_turtle_file(config.snapshot_path())
}

/// Opens the property graph written by the last load; it must already exist.
pub fn open_property_graph(config: &KgConfig) -> Result<SqliteGraph, MovieKgError> {
    let path: &Path = &config.property_graph.database;
    if !path.is_file() {
        return Err(MovieKgError::unavailable(format!(
            "property graph {} does not exist; run `moviekg load` first",
            path.display()
        )));
    }
    SqliteGraph::open(path)
}
