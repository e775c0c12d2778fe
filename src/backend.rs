//! Store-adapter interface shared by the triple store and the property graph.
//! Each adapter projects the same node and edge specs into its native model
//! and exposes its own declarative query language behind [`GraphBackend::query`].

use std::{cmp::Ordering, collections::BTreeMap, fmt};

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    errors::MovieKgError,
    identity::StableId,
    schema::{Attribute, Ontology, RelationKind, SchemaReport},
};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

/// What an upsert does when the entity already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnMatch {
    /// Overwrite scalar attributes in place.
    #[default]
    Update,
    /// Leave the existing entity untouched.
    Keep,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeSpec {
    pub id: StableId,
    pub properties: Vec<(Attribute, PropertyValue)>,
    pub on_match: OnMatch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeSpec {
    pub from: StableId,
    pub relation: RelationKind,
    pub to: StableId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
    Unchanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum QueryDialect {
    /// SPARQL 1.1 over the triple store.
    Sparql,
    /// `MATCH ... RETURN` patterns over the property graph.
    Pattern,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Iri(String),
    List(Vec<QueryValue>),
}

impl QueryValue {
    pub fn text<T: Into<String>>(value: T) -> Self {
        QueryValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            QueryValue::Integer(value) => Some(*value),
            QueryValue::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            QueryValue::Integer(value) => Some(*value as f64),
            QueryValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Text(value) | QueryValue::Iri(value) => Some(value),
            _ => None,
        }
    }

    /// Ordering used by `ORDER BY`: numbers compare across integer/float,
    /// nulls sort last, mismatched types fall back to their rank.
    pub fn compare(&self, other: &QueryValue) -> Ordering {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        }
        match (self, other) {
            (QueryValue::Text(a), QueryValue::Text(b))
            | (QueryValue::Iri(a), QueryValue::Iri(b)) => a.cmp(b),
            (QueryValue::Bool(a), QueryValue::Bool(b)) => a.cmp(b),
            (QueryValue::List(a), QueryValue::List(b)) => {
                for (left, right) in a.iter().zip(b) {
                    let ord = left.compare(right);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Equality used by filters; numbers compare by value.
    pub fn loosely_equals(&self, other: &QueryValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            QueryValue::Bool(_) => 0,
            QueryValue::Integer(_) | QueryValue::Float(_) => 1,
            QueryValue::Text(_) => 2,
            QueryValue::Iri(_) => 3,
            QueryValue::List(_) => 4,
            QueryValue::Null => 5,
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Null => f.write_str("null"),
            QueryValue::Bool(value) => write!(f, "{value}"),
            QueryValue::Integer(value) => write!(f, "{value}"),
            QueryValue::Float(value) => write!(f, "{value}"),
            QueryValue::Text(value) => f.write_str(value),
            QueryValue::Iri(value) => write!(f, "<{value}>"),
            QueryValue::List(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<PropertyValue> for QueryValue {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Text(text) => QueryValue::Text(text),
            PropertyValue::Integer(value) => QueryValue::Integer(value),
            PropertyValue::Float(value) => QueryValue::Float(value),
        }
    }
}

pub type QueryParams = BTreeMap<String, QueryValue>;

/// One result row: variable or column name to value, in projection order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryRow {
    columns: Vec<(String, QueryValue)>,
}

impl QueryRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Into<String>>(&mut self, name: T, value: QueryValue) {
        self.columns.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&QueryValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for QueryRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

pub trait GraphBackend {
    fn name(&self) -> &'static str;
    fn dialect(&self) -> QueryDialect;
    /// Declares the ontology; idempotent, never overwrites an existing declaration.
    fn register_schema(&self, ontology: &Ontology) -> Result<SchemaReport, MovieKgError>;
    fn upsert_node(&self, node: &NodeSpec) -> Result<Upsert, MovieKgError>;
    /// Inserts the edge if absent; both endpoints must already exist.
    fn upsert_edge(&self, edge: &EdgeSpec) -> Result<Upsert, MovieKgError>;
    fn query(&self, query: &str, params: &QueryParams) -> Result<Vec<QueryRow>, MovieKgError>;
    fn clear(&self) -> Result<(), MovieKgError>;
}

impl<'a, B> GraphBackend for &'a B
where
    B: GraphBackend + ?Sized,
{
    fn name(&self) -> &'static str {
        (*self).name()
    }

    fn dialect(&self) -> QueryDialect {
        (*self).dialect()
    }

    fn register_schema(&self, ontology: &Ontology) -> Result<SchemaReport, MovieKgError> {
        (*self).register_schema(ontology)
    }

    fn upsert_node(&self, node: &NodeSpec) -> Result<Upsert, MovieKgError> {
        (*self).upsert_node(node)
    }

    fn upsert_edge(&self, edge: &EdgeSpec) -> Result<Upsert, MovieKgError> {
        (*self).upsert_edge(edge)
    }

    fn query(&self, query: &str, params: &QueryParams) -> Result<Vec<QueryRow>, MovieKgError> {
        (*self).query(query, params)
    }

    fn clear(&self) -> Result<(), MovieKgError> {
        (*self).clear()
    }
}
