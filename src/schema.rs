//! Language-neutral ontology for the movie knowledge graph.
//!
//! Entity kinds, relationship kinds and attributes are declared once here and
//! projected by each store adapter into its native form: RDF classes and
//! properties for [`crate::rdf::RdfStore`], labels, edge types and a metadata
//! table for [`crate::graph::SqliteGraph`].

use std::fmt;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::errors::MovieKgError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Work,
    Agent,
    Category,
    RatingSubject,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Work,
        EntityKind::Agent,
        EntityKind::Category,
        EntityKind::RatingSubject,
    ];

    /// Class name in the triple store and node label in the property graph.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Work => "Movie",
            EntityKind::Agent => "Director",
            EntityKind::Category => "Genre",
            EntityKind::RatingSubject => "User",
        }
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            EntityKind::Work => "movie",
            EntityKind::Agent => "director",
            EntityKind::Category => "genre",
            EntityKind::RatingSubject => "user",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            EntityKind::Work => "A cinematic work",
            EntityKind::Agent => "A person who directs movies",
            EntityKind::Category => "A category or style of movie",
            EntityKind::RatingSubject => "A person who rates or reviews movies",
        }
    }

    pub fn required_attributes(self) -> &'static [Attribute] {
        match self {
            EntityKind::Work => &[
                Attribute::ExternalId,
                Attribute::Title,
                Attribute::Year,
                Attribute::Rating,
            ],
            EntityKind::Agent | EntityKind::Category | EntityKind::RatingSubject => {
                &[Attribute::Name]
            }
        }
    }

    pub fn from_label(label: &str) -> Option<EntityKind> {
        EntityKind::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationKind {
    DirectedBy,
    HasGenre,
    ActedIn,
    EnrolledIn,
    Rated,
}

impl RelationKind {
    pub const ALL: [RelationKind; 5] = [
        RelationKind::DirectedBy,
        RelationKind::HasGenre,
        RelationKind::ActedIn,
        RelationKind::EnrolledIn,
        RelationKind::Rated,
    ];

    /// Local name of the RDF predicate.
    pub fn predicate(self) -> &'static str {
        match self {
            RelationKind::DirectedBy => "directedBy",
            RelationKind::HasGenre => "hasGenre",
            RelationKind::ActedIn => "actedIn",
            RelationKind::EnrolledIn => "enrolledIn",
            RelationKind::Rated => "rated",
        }
    }

    /// Relationship type in the property graph.
    pub fn edge_type(self) -> &'static str {
        match self {
            RelationKind::DirectedBy => "DIRECTED_BY",
            RelationKind::HasGenre => "HAS_GENRE",
            RelationKind::ActedIn => "ACTED_IN",
            RelationKind::EnrolledIn => "ENROLLED_IN",
            RelationKind::Rated => "RATED",
        }
    }

    pub fn source(self) -> EntityKind {
        match self {
            RelationKind::DirectedBy | RelationKind::HasGenre => EntityKind::Work,
            RelationKind::ActedIn | RelationKind::EnrolledIn => EntityKind::Agent,
            RelationKind::Rated => EntityKind::RatingSubject,
        }
    }

    pub fn target(self) -> EntityKind {
        match self {
            RelationKind::DirectedBy => EntityKind::Agent,
            RelationKind::HasGenre => EntityKind::Category,
            RelationKind::ActedIn | RelationKind::EnrolledIn | RelationKind::Rated => {
                EntityKind::Work
            }
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RelationKind::DirectedBy => "A movie was directed by this person",
            RelationKind::HasGenre => "A movie belongs to this genre",
            RelationKind::ActedIn => "An actor performed in this movie",
            RelationKind::EnrolledIn => "A person is enrolled in this course",
            RelationKind::Rated => "A user rated this movie",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Attribute {
    ExternalId,
    Title,
    Year,
    Rating,
    Name,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeType {
    Text,
    Integer,
    Float,
}

impl Attribute {
    pub const ALL: [Attribute; 5] = [
        Attribute::ExternalId,
        Attribute::Title,
        Attribute::Year,
        Attribute::Rating,
        Attribute::Name,
    ];

    /// Property key in the property graph.
    pub fn key(self) -> &'static str {
        match self {
            Attribute::ExternalId => "movie_id",
            Attribute::Title => "title",
            Attribute::Year => "year",
            Attribute::Rating => "rating",
            Attribute::Name => "name",
        }
    }

    pub fn value_type(self) -> AttributeType {
        match self {
            Attribute::ExternalId | Attribute::Title | Attribute::Name => AttributeType::Text,
            Attribute::Year => AttributeType::Integer,
            Attribute::Rating => AttributeType::Float,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Attribute::ExternalId => "The identifier of a movie in its source dataset",
            Attribute::Title => "The title of a movie",
            Attribute::Year => "The year a movie was released",
            Attribute::Rating => "The rating score of a movie",
            Attribute::Name => "The display name of a person or category",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeclarationCategory {
    Entity,
    Relation,
    Attribute,
}

impl DeclarationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            DeclarationCategory::Entity => "entity",
            DeclarationCategory::Relation => "relation",
            DeclarationCategory::Attribute => "attribute",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Declaration {
    Entity(EntityKind),
    Relation(RelationKind),
    Attribute(Attribute),
}

impl Declaration {
    pub fn category(self) -> DeclarationCategory {
        match self {
            Declaration::Entity(_) => DeclarationCategory::Entity,
            Declaration::Relation(_) => DeclarationCategory::Relation,
            Declaration::Attribute(_) => DeclarationCategory::Attribute,
        }
    }

    /// Name under which the property graph records this declaration.
    pub fn graph_name(self) -> &'static str {
        match self {
            Declaration::Entity(kind) => kind.label(),
            Declaration::Relation(relation) => relation.edge_type(),
            Declaration::Attribute(attribute) => attribute.key(),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Declaration::Entity(kind) => kind.description(),
            Declaration::Relation(relation) => relation.description(),
            Declaration::Attribute(attribute) => attribute.description(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Ontology {
    pub entities: &'static [EntityKind],
    pub relations: &'static [RelationKind],
    pub attributes: &'static [Attribute],
}

pub const MOVIE_ONTOLOGY: Ontology = Ontology {
    entities: &EntityKind::ALL,
    relations: &RelationKind::ALL,
    attributes: &Attribute::ALL,
};

impl Ontology {
    pub fn declarations(&self) -> Vec<Declaration> {
        self.entities
            .iter()
            .map(|kind| Declaration::Entity(*kind))
            .chain(self.relations.iter().map(|rel| Declaration::Relation(*rel)))
            .chain(self.attributes.iter().map(|attr| Declaration::Attribute(*attr)))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaConflict {
    pub name: String,
    pub existing: String,
    pub declared: String,
}

impl fmt::Display for SchemaConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} already declared as {:?}, expected {:?}",
            self.name, self.existing, self.declared
        )
    }
}

/// Outcome of registering an ontology against one store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub declared: usize,
    pub already_present: usize,
    pub conflicts: Vec<SchemaConflict>,
}

impl SchemaReport {
    pub fn ensure_no_conflicts(&self) -> Result<(), MovieKgError> {
        match self.conflicts.first() {
            None => Ok(()),
            Some(conflict) => Err(MovieKgError::schema_conflict(conflict.to_string())),
        }
    }
}

pub fn ensure_schema(conn: &Connection) -> Result<(), MovieKgError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS graph_entities (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            kind       TEXT NOT NULL,
            entity_key TEXT NOT NULL,
            data       TEXT NOT NULL,
            UNIQUE(kind, entity_key)
        );
        CREATE TABLE IF NOT EXISTS graph_edges (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            from_id   INTEGER NOT NULL REFERENCES graph_entities(id) ON DELETE CASCADE,
            to_id     INTEGER NOT NULL REFERENCES graph_entities(id) ON DELETE CASCADE,
            edge_type TEXT NOT NULL,
            UNIQUE(from_id, edge_type, to_id)
        );
        CREATE TABLE IF NOT EXISTS graph_schema (
            category    TEXT NOT NULL,
            name        TEXT NOT NULL,
            description TEXT NOT NULL,
            PRIMARY KEY(category, name)
        );
        CREATE INDEX IF NOT EXISTS idx_entities_kind ON graph_entities(kind);
        CREATE INDEX IF NOT EXISTS idx_edges_from ON graph_edges(from_id);
        CREATE INDEX IF NOT EXISTS idx_edges_to ON graph_edges(to_id);
        CREATE INDEX IF NOT EXISTS idx_edges_type ON graph_edges(edge_type);
        "#,
    )
    .map_err(|e| MovieKgError::unavailable(e.to_string()))?;
    Ok(())
}
