//! Triple-store adapter over an in-memory oxigraph [`Store`].
//!
//! Entities become IRIs under [`MOVIE_NS`], typed with their class; scalar
//! attributes are single-valued literals that an upsert replaces in place;
//! relationships are plain triples, so inserting one twice is a no-op.
//! Queries are SPARQL 1.1 with `$name` parameters bound before parsing.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use oxigraph::{
    io::RdfFormat,
    model::{
        GraphNameRef, Literal, NamedNode, NamedNodeRef, QuadRef, Term,
        vocab::{rdf, rdfs, xsd},
    },
    sparql::QueryResults,
    store::Store,
};
use tracing::debug;

use crate::{
    backend::{
        EdgeSpec, GraphBackend, NodeSpec, OnMatch, PropertyValue, QueryDialect, QueryParams,
        QueryRow, QueryValue, Upsert,
    },
    errors::MovieKgError,
    identity::StableId,
    schema::{
        Attribute, AttributeType, Declaration, EntityKind, Ontology, RelationKind, SchemaConflict,
        SchemaReport,
    },
};

pub const MOVIE_NS: &str = "http://movie-kg.org/ontology#";
pub const FOAF_NS: &str = "http://xmlns.com/foaf/0.1/";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";

const FOAF_NAME: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://xmlns.com/foaf/0.1/name");
const OWL_OBJECT_PROPERTY: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#ObjectProperty");
const OWL_DATATYPE_PROPERTY: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#DatatypeProperty");

pub fn class_iri(kind: EntityKind) -> String {
    format!("{MOVIE_NS}{}", kind.label())
}

pub fn relation_iri(relation: RelationKind) -> String {
    format!("{MOVIE_NS}{}", relation.predicate())
}

pub fn attribute_iri(attribute: Attribute) -> String {
    match attribute {
        Attribute::Name => FOAF_NAME.as_str().to_owned(),
        Attribute::ExternalId => format!("{MOVIE_NS}externalId"),
        Attribute::Title => format!("{MOVIE_NS}hasTitle"),
        Attribute::Year => format!("{MOVIE_NS}releasedIn"),
        Attribute::Rating => format!("{MOVIE_NS}hasRating"),
    }
}

pub fn entity_iri(id: &StableId) -> String {
    format!("{MOVIE_NS}{id}")
}

pub struct RdfStore {
    store: Store,
}

impl RdfStore {
    pub fn in_memory() -> Result<Self, MovieKgError> {
        let store = Store::new().map_err(|e| MovieKgError::unavailable(e.to_string()))?;
        Ok(Self { store })
    }

    /// Opens a store pre-populated from a Turtle snapshot.
    pub fn from_turtle_file<P: AsRef<Path>>(path: P) -> Result<Self, MovieKgError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            MovieKgError::unavailable(format!("snapshot {}: {e}", path.display()))
        })?;
        let store = Self::in_memory()?;
        store.load_turtle(BufReader::new(file))?;
        Ok(store)
    }

    pub fn load_turtle<R: Read>(&self, reader: R) -> Result<(), MovieKgError> {
        self.store
            .load_from_reader(RdfFormat::Turtle, reader)
            .map_err(|e| MovieKgError::invalid_input(e.to_string()))
    }

    pub fn write_turtle<W: Write>(&self, writer: W) -> Result<W, MovieKgError> {
        self.store
            .dump_graph_to_writer(GraphNameRef::DefaultGraph, RdfFormat::Turtle, writer)
            .map_err(|e| MovieKgError::query(e.to_string()))
    }

    pub fn save_turtle<P: AsRef<Path>>(&self, path: P) -> Result<(), MovieKgError> {
        let file = File::create(path.as_ref())?;
        let mut writer = self.write_turtle(BufWriter::new(file))?;
        writer.flush()?;
        debug!(path = %path.as_ref().display(), "turtle snapshot written");
        Ok(())
    }

    /// Number of triples in the default graph.
    pub fn len(&self) -> Result<usize, MovieKgError> {
        self.store
            .len()
            .map_err(|e| MovieKgError::unavailable(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, MovieKgError> {
        Ok(self.len()? == 0)
    }

    fn objects(
        &self,
        subject: NamedNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
    ) -> Result<Vec<Term>, MovieKgError> {
        self.store
            .quads_for_pattern(
                Some(subject.into()),
                Some(predicate),
                None,
                Some(GraphNameRef::DefaultGraph),
            )
            .map(|quad| {
                quad.map(|q| q.object)
                    .map_err(|e| MovieKgError::unavailable(e.to_string()))
            })
            .collect()
    }

    fn insert(
        &self,
        subject: NamedNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        object: impl Into<Term>,
    ) -> Result<bool, MovieKgError> {
        let object = object.into();
        self.store
            .insert(QuadRef::new(
                subject,
                predicate,
                object.as_ref(),
                GraphNameRef::DefaultGraph,
            ))
            .map_err(|e| MovieKgError::unavailable(e.to_string()))
    }

    /// Makes `object` the only value of `predicate` on `subject`.
    fn replace_value(
        &self,
        subject: NamedNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        object: Literal,
    ) -> Result<bool, MovieKgError> {
        let object = Term::from(object);
        let existing = self.objects(subject, predicate)?;
        if existing.len() == 1 && existing[0] == object {
            return Ok(false);
        }
        for old in &existing {
            self.store
                .remove(QuadRef::new(
                    subject,
                    predicate,
                    old.as_ref(),
                    GraphNameRef::DefaultGraph,
                ))
                .map_err(|e| MovieKgError::unavailable(e.to_string()))?;
        }
        self.insert(subject, predicate, object)?;
        Ok(true)
    }
}

impl GraphBackend for RdfStore {
    fn name(&self) -> &'static str {
        "rdf"
    }

    fn dialect(&self) -> QueryDialect {
        QueryDialect::Sparql
    }

    fn register_schema(&self, ontology: &Ontology) -> Result<SchemaReport, MovieKgError> {
        let mut report = SchemaReport::default();
        for declaration in ontology.declarations() {
            let subject = named_node(declaration_iri(declaration))?;
            let comment = Term::from(Literal::new_simple_literal(declaration.description()));
            let existing = self.objects(subject.as_ref(), rdfs::COMMENT)?;
            if existing.is_empty() {
                for class in declaration_types(declaration) {
                    self.insert(subject.as_ref(), rdf::TYPE, NamedNode::from(*class))?;
                }
                if let Declaration::Attribute(attribute) = declaration {
                    let range = NamedNode::from(datatype(attribute.value_type()));
                    self.insert(subject.as_ref(), rdfs::RANGE, range)?;
                }
                self.insert(subject.as_ref(), rdfs::COMMENT, comment)?;
                report.declared += 1;
            } else if existing.contains(&comment) {
                report.already_present += 1;
            } else {
                report.conflicts.push(SchemaConflict {
                    name: subject.as_str().to_owned(),
                    existing: existing
                        .iter()
                        .map(term_text)
                        .collect::<Vec<_>>()
                        .join(", "),
                    declared: declaration.description().to_owned(),
                });
            }
        }
        debug!(
            declared = report.declared,
            present = report.already_present,
            conflicts = report.conflicts.len(),
            "rdf schema registered"
        );
        Ok(report)
    }

    fn upsert_node(&self, node: &NodeSpec) -> Result<Upsert, MovieKgError> {
        let subject = named_node(entity_iri(&node.id))?;
        let class = named_node(class_iri(node.id.kind()))?;
        let created = self.insert(subject.as_ref(), rdf::TYPE, class)?;
        if !created && node.on_match == OnMatch::Keep {
            return Ok(Upsert::Unchanged);
        }
        let mut changed = false;
        for (attribute, value) in &node.properties {
            let predicate = named_node(attribute_iri(*attribute))?;
            changed |= self.replace_value(subject.as_ref(), predicate.as_ref(), literal(value))?;
        }
        Ok(if created {
            Upsert::Created
        } else if changed {
            Upsert::Updated
        } else {
            Upsert::Unchanged
        })
    }

    fn upsert_edge(&self, edge: &EdgeSpec) -> Result<Upsert, MovieKgError> {
        let from = named_node(entity_iri(&edge.from))?;
        let predicate = named_node(relation_iri(edge.relation))?;
        let to = named_node(entity_iri(&edge.to))?;
        let inserted = self.insert(from.as_ref(), predicate.as_ref(), to)?;
        Ok(if inserted {
            Upsert::Created
        } else {
            Upsert::Unchanged
        })
    }

    fn query(&self, query: &str, params: &QueryParams) -> Result<Vec<QueryRow>, MovieKgError> {
        let text = bind_parameters(query, params)?;
        let results = self
            .store
            .query(text.as_str())
            .map_err(|e| MovieKgError::query(e.to_string()))?;
        match results {
            QueryResults::Solutions(solutions) => {
                let variables: Vec<String> = solutions
                    .variables()
                    .iter()
                    .map(|v| v.as_str().to_owned())
                    .collect();
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| MovieKgError::query(e.to_string()))?;
                    let mut row = QueryRow::new();
                    for variable in &variables {
                        let value = solution
                            .get(variable.as_str())
                            .map(term_value)
                            .unwrap_or(QueryValue::Null);
                        row.push(variable.as_str(), value);
                    }
                    rows.push(row);
                }
                Ok(rows)
            }
            QueryResults::Boolean(result) => {
                let mut row = QueryRow::new();
                row.push("result", QueryValue::Bool(result));
                Ok(vec![row])
            }
            QueryResults::Graph(triples) => {
                let mut rows = Vec::new();
                for triple in triples {
                    let triple = triple.map_err(|e| MovieKgError::query(e.to_string()))?;
                    let mut row = QueryRow::new();
                    row.push("subject", QueryValue::Text(triple.subject.to_string()));
                    row.push(
                        "predicate",
                        QueryValue::Iri(triple.predicate.as_str().to_owned()),
                    );
                    row.push("object", term_value(&triple.object));
                    rows.push(row);
                }
                Ok(rows)
            }
        }
    }

    fn clear(&self) -> Result<(), MovieKgError> {
        self.store
            .clear()
            .map_err(|e| MovieKgError::unavailable(e.to_string()))?;
        debug!("rdf store cleared");
        Ok(())
    }
}

fn named_node(iri: String) -> Result<NamedNode, MovieKgError> {
    NamedNode::new(iri).map_err(|e| MovieKgError::invalid_input(e.to_string()))
}

fn declaration_iri(declaration: Declaration) -> String {
    match declaration {
        Declaration::Entity(kind) => class_iri(kind),
        Declaration::Relation(relation) => relation_iri(relation),
        Declaration::Attribute(attribute) => attribute_iri(attribute),
    }
}

fn declaration_types(declaration: Declaration) -> &'static [NamedNodeRef<'static>] {
    match declaration {
        Declaration::Entity(_) => &[rdfs::CLASS],
        Declaration::Relation(_) => &[rdf::PROPERTY, OWL_OBJECT_PROPERTY],
        Declaration::Attribute(_) => &[rdf::PROPERTY, OWL_DATATYPE_PROPERTY],
    }
}

fn datatype(value_type: AttributeType) -> NamedNodeRef<'static> {
    match value_type {
        AttributeType::Text => xsd::STRING,
        AttributeType::Integer => xsd::INTEGER,
        AttributeType::Float => xsd::DOUBLE,
    }
}

fn literal(value: &PropertyValue) -> Literal {
    match value {
        PropertyValue::Text(text) => Literal::new_simple_literal(text.as_str()),
        PropertyValue::Integer(value) => Literal::from(*value),
        PropertyValue::Float(value) => Literal::from(*value),
    }
}

fn term_text(term: &Term) -> String {
    match term {
        Term::Literal(literal) => literal.value().to_owned(),
        other => other.to_string(),
    }
}

fn term_value(term: &Term) -> QueryValue {
    match term {
        Term::NamedNode(node) => QueryValue::Iri(node.as_str().to_owned()),
        Term::Literal(literal) => literal_value(literal),
        other => QueryValue::Text(other.to_string()),
    }
}

fn literal_value(literal: &Literal) -> QueryValue {
    let datatype = literal.datatype();
    let lexical = literal.value();
    if datatype == xsd::INTEGER || datatype == xsd::INT || datatype == xsd::LONG {
        if let Ok(value) = lexical.parse::<i64>() {
            return QueryValue::Integer(value);
        }
    } else if datatype == xsd::DOUBLE || datatype == xsd::FLOAT || datatype == xsd::DECIMAL {
        if let Ok(value) = lexical.parse::<f64>() {
            return QueryValue::Float(value);
        }
    } else if datatype == xsd::BOOLEAN {
        return QueryValue::Bool(lexical == "true" || lexical == "1");
    }
    QueryValue::Text(lexical.to_owned())
}

/// Replaces every `$name` outside string literals, IRIs and comments with the
/// bound parameter rendered as an RDF term. SPARQL's `$var` variable form is
/// therefore unavailable; queries use `?var`.
pub fn bind_parameters(query: &str, params: &QueryParams) -> Result<String, MovieKgError> {
    let mut out = String::with_capacity(query.len());
    let mut rest = query;
    while let Some(c) = rest.chars().next() {
        let consumed = match c {
            '"' | '\'' => {
                let end = string_literal_end(rest, c);
                out.push_str(&rest[..end]);
                end
            }
            '#' => {
                let end = rest.find('\n').unwrap_or(rest.len());
                out.push_str(&rest[..end]);
                end
            }
            '<' => match iri_end(rest) {
                Some(end) => {
                    out.push_str(&rest[..end]);
                    end
                }
                None => {
                    out.push('<');
                    1
                }
            },
            '$' => {
                let name_len = rest[1..]
                    .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                    .unwrap_or(rest.len() - 1);
                if name_len == 0 {
                    out.push('$');
                    1
                } else {
                    let name = &rest[1..1 + name_len];
                    let value = params.get(name).ok_or_else(|| {
                        MovieKgError::query(format!("missing parameter ${name}"))
                    })?;
                    out.push_str(&sparql_term(value)?);
                    1 + name_len
                }
            }
            other => {
                out.push(other);
                other.len_utf8()
            }
        };
        rest = &rest[consumed..];
    }
    Ok(out)
}

fn string_literal_end(text: &str, quote: char) -> usize {
    let long = quote.to_string().repeat(3);
    if text.starts_with(long.as_str()) {
        let mut chars = text.char_indices().skip(3);
        while let Some((i, ch)) = chars.next() {
            if ch == '\\' {
                chars.next();
            } else if text[i..].starts_with(long.as_str()) {
                return i + 3;
            }
        }
        return text.len();
    }
    let mut chars = text.char_indices().skip(1);
    while let Some((i, ch)) = chars.next() {
        if ch == '\\' {
            chars.next();
        } else if ch == quote {
            return i + ch.len_utf8();
        }
    }
    text.len()
}

fn iri_end(text: &str) -> Option<usize> {
    let end = text.find('>')?;
    let inner = &text[1..end];
    if inner
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '<' | '"' | '{' | '}'))
    {
        return None;
    }
    Some(end + 1)
}

fn sparql_term(value: &QueryValue) -> Result<String, MovieKgError> {
    match value {
        QueryValue::Bool(value) => Ok(value.to_string()),
        QueryValue::Integer(value) => Ok(Literal::from(*value).to_string()),
        QueryValue::Float(value) => Ok(Literal::from(*value).to_string()),
        QueryValue::Text(value) => Ok(Literal::new_simple_literal(value.as_str()).to_string()),
        QueryValue::Iri(value) => Ok(named_node(value.clone())?.to_string()),
        QueryValue::Null | QueryValue::List(_) => Err(MovieKgError::query(format!(
            "cannot bind {value} as a SPARQL term"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_parameters_leaves_strings_and_iris_alone() {
        let mut params = QueryParams::new();
        params.insert("name".into(), QueryValue::text("Ada \"Lovelace\""));
        let bound = bind_parameters(
            "SELECT * WHERE { ?s <http://x/$name> \"$name\" ; ?p $name } # $name",
            &params,
        )
        .expect("bound");
        assert_eq!(
            bound,
            "SELECT * WHERE { ?s <http://x/$name> \"$name\" ; ?p \"Ada \\\"Lovelace\\\"\" } # $name"
        );
    }

    #[test]
    fn test_bind_parameters_reports_missing_parameter() {
        let err = bind_parameters("SELECT * WHERE { ?s ?p $missing }", &QueryParams::new())
            .expect_err("missing");
        assert!(matches!(err, MovieKgError::QueryError(_)));
    }

    #[test]
    fn test_less_than_is_not_mistaken_for_iri() {
        let mut params = QueryParams::new();
        params.insert("limit".into(), QueryValue::Integer(3));
        let bound = bind_parameters("FILTER(?year < $limit && ?x > 1)", &params).expect("bound");
        assert!(bound.contains("?year < \"3\"^^<http://www.w3.org/2001/XMLSchema#integer>"));
    }
}
