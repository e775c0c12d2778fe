//! Embedded property graph: labelled nodes with JSON properties and typed,
//! directed edges, stored in SQLite.

use std::path::Path;

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    backend::{
        EdgeSpec, GraphBackend, NodeSpec, OnMatch, PropertyValue, QueryDialect, QueryParams,
        QueryRow, QueryValue, Upsert,
    },
    cache::AdjacencyCache,
    dsl::parse_query,
    errors::MovieKgError,
    identity::StableId,
    pattern::execute_pattern,
    schema::{Ontology, SchemaConflict, SchemaReport, ensure_schema},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphEntity {
    pub id: i64,
    /// Node label, e.g. `Movie`.
    pub kind: String,
    /// Stable id rendered as text, e.g. `movie_inception`.
    pub key: String,
    pub data: Value,
}

impl GraphEntity {
    pub fn property(&self, key: &str) -> QueryValue {
        self.data.get(key).map(json_to_value).unwrap_or(QueryValue::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphEdge {
    pub id: i64,
    pub from_id: i64,
    pub to_id: i64,
    pub edge_type: String,
}

pub struct SqliteGraph {
    conn: Connection,
    outgoing_cache: AdjacencyCache,
    incoming_cache: AdjacencyCache,
}

impl SqliteGraph {
    /// Opens (creating if needed) the database file; failure means the store is unreachable.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MovieKgError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            MovieKgError::unavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        ensure_schema(&conn)?;
        debug!(path = %path.display(), "opened property graph");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, MovieKgError> {
        let conn =
            Connection::open_in_memory().map_err(|e| MovieKgError::unavailable(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn get_entity(&self, id: i64) -> Result<GraphEntity, MovieKgError> {
        self.conn
            .query_row(
                "SELECT id, kind, entity_key, data FROM graph_entities WHERE id=?1",
                params![id],
                row_to_entity,
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    MovieKgError::query(format!("entity {id} does not exist"))
                }
                other => sql_error(other),
            })
    }

    pub fn find_entity(&self, id: &StableId) -> Result<Option<GraphEntity>, MovieKgError> {
        self.conn
            .query_row(
                "SELECT id, kind, entity_key, data FROM graph_entities
                 WHERE kind=?1 AND entity_key=?2",
                params![id.kind().label(), id.to_string()],
                row_to_entity,
            )
            .optional()
            .map_err(sql_error)
    }

    /// All entities, or only those carrying `label`, in insertion order.
    pub fn entities(&self, label: Option<&str>) -> Result<Vec<GraphEntity>, MovieKgError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, kind, entity_key, data FROM graph_entities
                 WHERE ?1 IS NULL OR kind=?1 ORDER BY id",
            )
            .map_err(sql_error)?;
        let rows = stmt
            .query_map(params![label], row_to_entity)
            .map_err(sql_error)?;
        let mut entities = Vec::new();
        for entity in rows {
            entities.push(entity.map_err(sql_error)?);
        }
        Ok(entities)
    }

    pub fn outgoing(&self, id: i64) -> Result<Vec<GraphEdge>, MovieKgError> {
        if let Some(cached) = self.outgoing_cache.get(id) {
            return Ok(cached);
        }
        let edges = self.collect_edges(
            "SELECT id, from_id, to_id, edge_type FROM graph_edges
             WHERE from_id=?1 ORDER BY to_id, edge_type, id",
            id,
        )?;
        self.outgoing_cache.insert(id, edges.clone());
        Ok(edges)
    }

    pub fn incoming(&self, id: i64) -> Result<Vec<GraphEdge>, MovieKgError> {
        if let Some(cached) = self.incoming_cache.get(id) {
            return Ok(cached);
        }
        let edges = self.collect_edges(
            "SELECT id, from_id, to_id, edge_type FROM graph_edges
             WHERE to_id=?1 ORDER BY from_id, edge_type, id",
            id,
        )?;
        self.incoming_cache.insert(id, edges.clone());
        Ok(edges)
    }

    pub fn entity_count(&self) -> Result<usize, MovieKgError> {
        self.count("SELECT COUNT(*) FROM graph_entities")
    }

    pub fn edge_count(&self) -> Result<usize, MovieKgError> {
        self.count("SELECT COUNT(*) FROM graph_edges")
    }

    fn count(&self, sql: &str) -> Result<usize, MovieKgError> {
        let count: i64 = self
            .conn
            .query_row(sql, [], |row| row.get(0))
            .map_err(sql_error)?;
        Ok(count as usize)
    }

    fn collect_edges(&self, sql: &str, id: i64) -> Result<Vec<GraphEdge>, MovieKgError> {
        let mut stmt = self.conn.prepare(sql).map_err(sql_error)?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(GraphEdge {
                    id: row.get(0)?,
                    from_id: row.get(1)?,
                    to_id: row.get(2)?,
                    edge_type: row.get(3)?,
                })
            })
            .map_err(sql_error)?;
        let mut edges = Vec::new();
        for edge in rows {
            edges.push(edge.map_err(sql_error)?);
        }
        Ok(edges)
    }

    fn entity_id(&self, id: &StableId) -> Result<Option<i64>, MovieKgError> {
        self.conn
            .query_row(
                "SELECT id FROM graph_entities WHERE kind=?1 AND entity_key=?2",
                params![id.kind().label(), id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_error)
    }

    fn invalidate_caches(&self) {
        self.outgoing_cache.clear();
        self.incoming_cache.clear();
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            outgoing_cache: AdjacencyCache::new(),
            incoming_cache: AdjacencyCache::new(),
        }
    }
}

impl GraphBackend for SqliteGraph {
    fn name(&self) -> &'static str {
        "property-graph"
    }

    fn dialect(&self) -> QueryDialect {
        QueryDialect::Pattern
    }

    fn register_schema(&self, ontology: &Ontology) -> Result<SchemaReport, MovieKgError> {
        let mut report = SchemaReport::default();
        for declaration in ontology.declarations() {
            let category = declaration.category().as_str();
            let name = declaration.graph_name();
            let existing: Option<String> = self
                .conn
                .query_row(
                    "SELECT description FROM graph_schema WHERE category=?1 AND name=?2",
                    params![category, name],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_error)?;
            match existing {
                None => {
                    self.conn
                        .execute(
                            "INSERT INTO graph_schema(category, name, description)
                             VALUES(?1, ?2, ?3)",
                            params![category, name, declaration.description()],
                        )
                        .map_err(sql_error)?;
                    report.declared += 1;
                }
                Some(description) if description == declaration.description() => {
                    report.already_present += 1;
                }
                Some(description) => report.conflicts.push(SchemaConflict {
                    name: format!("{category}:{name}"),
                    existing: description,
                    declared: declaration.description().to_owned(),
                }),
            }
        }
        Ok(report)
    }

    fn upsert_node(&self, node: &NodeSpec) -> Result<Upsert, MovieKgError> {
        let mut properties = Map::new();
        for (attribute, value) in &node.properties {
            properties.insert(attribute.key().to_owned(), property_json(value));
        }
        match self.find_entity(&node.id)? {
            None => {
                let data = Value::Object(properties).to_string();
                self.conn
                    .execute(
                        "INSERT INTO graph_entities(kind, entity_key, data) VALUES(?1, ?2, ?3)",
                        params![node.id.kind().label(), node.id.to_string(), data],
                    )
                    .map_err(sql_error)?;
                Ok(Upsert::Created)
            }
            Some(_) if node.on_match == OnMatch::Keep => Ok(Upsert::Unchanged),
            Some(existing) => {
                let mut merged = match existing.data {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                let before = merged.clone();
                merged.extend(properties);
                if merged == before {
                    return Ok(Upsert::Unchanged);
                }
                self.conn
                    .execute(
                        "UPDATE graph_entities SET data=?1 WHERE id=?2",
                        params![Value::Object(merged).to_string(), existing.id],
                    )
                    .map_err(sql_error)?;
                Ok(Upsert::Updated)
            }
        }
    }

    fn upsert_edge(&self, edge: &EdgeSpec) -> Result<Upsert, MovieKgError> {
        let from_id = self.entity_id(&edge.from)?.ok_or_else(|| {
            MovieKgError::invalid_input(format!("edge source {} does not exist", edge.from))
        })?;
        let to_id = self.entity_id(&edge.to)?.ok_or_else(|| {
            MovieKgError::invalid_input(format!("edge target {} does not exist", edge.to))
        })?;
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO graph_edges(from_id, to_id, edge_type) VALUES(?1, ?2, ?3)",
                params![from_id, to_id, edge.relation.edge_type()],
            )
            .map_err(sql_error)?;
        if inserted == 0 {
            return Ok(Upsert::Unchanged);
        }
        self.invalidate_caches();
        Ok(Upsert::Created)
    }

    fn query(&self, query: &str, params: &QueryParams) -> Result<Vec<QueryRow>, MovieKgError> {
        let parsed = parse_query(query)?;
        execute_pattern(self, &parsed, params)
    }

    fn clear(&self) -> Result<(), MovieKgError> {
        self.conn
            .execute_batch(
                "DELETE FROM graph_edges; DELETE FROM graph_entities; DELETE FROM graph_schema;",
            )
            .map_err(sql_error)?;
        self.invalidate_caches();
        Ok(())
    }
}

/// Connection-level failures mark the store unavailable; everything else is a query error.
fn sql_error(err: rusqlite::Error) -> MovieKgError {
    match err.sqlite_error_code() {
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure
            | ErrorCode::ReadOnly
            | ErrorCode::DiskFull,
        ) => MovieKgError::unavailable(err.to_string()),
        _ => MovieKgError::query(err.to_string()),
    }
}

fn property_json(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Text(text) => Value::String(text.clone()),
        PropertyValue::Integer(value) => Value::from(*value),
        PropertyValue::Float(value) => Value::from(*value),
    }
}

pub(crate) fn json_to_value(value: &Value) -> QueryValue {
    match value {
        Value::Null => QueryValue::Null,
        Value::Bool(flag) => QueryValue::Bool(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => QueryValue::Integer(integer),
            None => number
                .as_f64()
                .map(QueryValue::Float)
                .unwrap_or(QueryValue::Null),
        },
        Value::String(text) => QueryValue::Text(text.clone()),
        Value::Array(items) => QueryValue::List(items.iter().map(json_to_value).collect()),
        Value::Object(_) => QueryValue::Text(value.to_string()),
    }
}

fn row_to_entity(row: &rusqlite::Row<'_>) -> Result<GraphEntity, rusqlite::Error> {
    let data: String = row.get(3)?;
    let value: Value = serde_json::from_str(&data).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            data.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;
    Ok(GraphEntity {
        id: row.get(0)?,
        kind: row.get(1)?,
        key: row.get(2)?,
        data: value,
    })
}
