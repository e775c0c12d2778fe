//! Movie knowledge graph: loads tabular movie data into an RDF triple store and
//! an embedded property graph, keeps both consistent, and queries each in its
//! own pattern language.

pub mod backend;
pub mod cache;
pub mod client;
pub mod config;
pub mod dsl;
pub mod dual_write;
pub mod errors;
pub mod graph;
pub mod identity;
pub mod ingest;
pub mod logging;
pub mod pattern;
pub mod pipeline;
pub mod query;
pub mod rdf;
pub mod report;
pub mod schema;
pub mod stats;

pub use crate::backend::{
    EdgeSpec, GraphBackend, NodeSpec, OnMatch, PropertyValue, QueryDialect, QueryParams, QueryRow,
    QueryValue, Upsert,
};
pub use crate::config::KgConfig;
pub use crate::dual_write::{
    DualWriter, LoadOptions, LoadSummary, SecondaryTarget, SyncMode, SyncState, load_all,
};
pub use crate::errors::MovieKgError;
pub use crate::graph::{GraphEdge, GraphEntity, SqliteGraph};
pub use crate::identity::{StableId, resolve};
pub use crate::ingest::{CsvSource, MovieRecord, RawRow, ingest_row, read_csv};
pub use crate::pipeline::{LoadTarget, PipelineOutcome, run_load};
pub use crate::query::{Comparison, QueryIntent, compare_intent, run_intent};
pub use crate::rdf::RdfStore;
pub use crate::schema::{EntityKind, MOVIE_ONTOLOGY, RelationKind};
pub use crate::stats::{GraphStats, compare_stats, compute_stats};
