//! Read-only aggregates over either store, computed through its own query
//! language, and the cross-store consistency check run after a load.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    backend::{GraphBackend, QueryDialect, QueryParams, QueryRow, QueryValue},
    errors::MovieKgError,
    rdf::{attribute_iri, class_iri, relation_iri},
    schema::{Attribute, EntityKind, RelationKind},
};

const SPARQL_ENTITY_COUNT: &str =
    "SELECT (COUNT(DISTINCT ?entity) AS ?count) WHERE { ?entity a $class }";
const SPARQL_RATING: &str = "SELECT (AVG(?rating) AS ?average) (COUNT(?rating) AS ?rated) \
     WHERE { ?movie a $class ; $has_rating ?rating }";

const PATTERN_RELATIONSHIP_COUNT: &str =
    "MATCH (source)-[relation]->(target) RETURN count(relation) AS count";
const PATTERN_RATING: &str =
    "MATCH (movie:Movie) RETURN avg(movie.rating) AS average, count(movie.rating) AS rated";

const AVERAGE_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GraphStats {
    pub store: &'static str,
    pub entities: BTreeMap<EntityKind, usize>,
    pub relationships: usize,
    /// `None` when no Work carries a rating.
    pub average_rating: Option<f64>,
}

impl GraphStats {
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_entities(&self) -> usize {
        self.entities.values().sum()
    }
}

/// Callers must not run this concurrently with a load into the same store.
pub fn compute_stats<B: GraphBackend + ?Sized>(backend: &B) -> Result<GraphStats, MovieKgError> {
    let mut entities = BTreeMap::new();
    for kind in EntityKind::ALL {
        entities.insert(kind, entity_count(backend, kind)?);
    }

    let (relationships, rating_rows) = match backend.dialect() {
        QueryDialect::Sparql => {
            let relationships =
                backend.query(&sparql_relationship_count(), &QueryParams::new())?;

            let mut params = QueryParams::new();
            params.insert("class".into(), QueryValue::Iri(class_iri(EntityKind::Work)));
            params.insert(
                "has_rating".into(),
                QueryValue::Iri(attribute_iri(Attribute::Rating)),
            );
            (relationships, backend.query(SPARQL_RATING, &params)?)
        }
        QueryDialect::Pattern => (
            backend.query(PATTERN_RELATIONSHIP_COUNT, &QueryParams::new())?,
            backend.query(PATTERN_RATING, &QueryParams::new())?,
        ),
    };

    let rated = count_column(&rating_rows, "rated")?;
    let average_rating = if rated == 0 {
        None
    } else {
        first_value(&rating_rows, "average").as_f64()
    };

    Ok(GraphStats {
        store: backend.name(),
        entities,
        relationships: count_column(&relationships, "count")?,
        average_rating,
    })
}

fn entity_count<B: GraphBackend + ?Sized>(
    backend: &B,
    kind: EntityKind,
) -> Result<usize, MovieKgError> {
    let rows = match backend.dialect() {
        QueryDialect::Sparql => {
            let mut params = QueryParams::new();
            params.insert("class".into(), QueryValue::Iri(class_iri(kind)));
            backend.query(SPARQL_ENTITY_COUNT, &params)?
        }
        QueryDialect::Pattern => {
            let query = format!(
                "MATCH (entity:{}) RETURN count(entity) AS count",
                kind.label()
            );
            backend.query(&query, &QueryParams::new())?
        }
    };
    count_column(&rows, "count")
}

/// Counts edges by predicate so the result does not depend on schema triples.
fn sparql_relationship_count() -> String {
    let relations: Vec<String> = RelationKind::ALL
        .into_iter()
        .map(|relation| format!("<{}>", relation_iri(relation)))
        .collect();
    format!(
        "SELECT (COUNT(*) AS ?count) \
         WHERE {{ VALUES ?relation {{ {} }} ?source ?relation ?target }}",
        relations.join(" ")
    )
}

fn first_value(rows: &[QueryRow], column: &str) -> QueryValue {
    rows.first()
        .and_then(|row| row.get(column))
        .cloned()
        .unwrap_or(QueryValue::Null)
}

fn count_column(rows: &[QueryRow], column: &str) -> Result<usize, MovieKgError> {
    match first_value(rows, column) {
        QueryValue::Null => Ok(0),
        value => value
            .as_i64()
            .and_then(|count| usize::try_from(count).ok())
            .ok_or_else(|| MovieKgError::query(format!("{column} is not a count: {value}"))),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsComparison {
    pub left: GraphStats,
    pub right: GraphStats,
    pub mismatches: Vec<String>,
}

impl StatsComparison {
    pub fn consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

pub fn compare_stats(left: &GraphStats, right: &GraphStats) -> StatsComparison {
    let mut mismatches = Vec::new();
    for kind in EntityKind::ALL {
        let (a, b) = (left.count(kind), right.count(kind));
        if a != b {
            mismatches.push(format!(
                "{kind} count: {} has {a}, {} has {b}",
                left.store, right.store
            ));
        }
    }
    if left.relationships != right.relationships {
        mismatches.push(format!(
            "relationship count: {} has {}, {} has {}",
            left.store, left.relationships, right.store, right.relationships
        ));
    }
    let averages_agree = match (left.average_rating, right.average_rating) {
        (None, None) => true,
        (Some(a), Some(b)) => (a - b).abs() <= AVERAGE_TOLERANCE,
        _ => false,
    };
    if !averages_agree {
        mismatches.push(format!(
            "average rating: {} has {:?}, {} has {:?}",
            left.store, left.average_rating, right.store, right.average_rating
        ));
    }
    StatsComparison {
        left: left.clone(),
        right: right.clone(),
        mismatches,
    }
}
