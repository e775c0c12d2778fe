//! Tabular movie source and the graph ingestion engine.
//!
//! Each CSV row becomes one Work (keyed by its external id), one Agent for the
//! director and one Category per distinct genre, connected by `directedBy` and
//! `hasGenre` edges. Row-level problems surface as [`MovieKgError::MalformedRow`]
//! or [`MovieKgError::InvalidKey`]; the caller decides whether to skip the row.

use std::{fs::File, io::Read, path::Path};

use tracing::info;

use crate::{
    backend::{EdgeSpec, GraphBackend, NodeSpec, OnMatch, PropertyValue},
    errors::MovieKgError,
    identity::{StableId, display_name, resolve},
    schema::{Attribute, EntityKind, RelationKind},
};

pub const GENRE_DELIMITER: char = '|';

/// One undecoded input row; `line` is the 1-based line the record starts on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRow {
    pub line: u64,
    pub movie_id: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
    pub genres: Option<String>,
    pub director: Option<String>,
    pub rating: Option<String>,
}

impl RawRow {
    /// Cell carrying `attribute` of the Work this row describes.
    pub fn work_value(&self, attribute: Attribute) -> Option<&str> {
        match attribute {
            Attribute::ExternalId => self.movie_id.as_deref(),
            Attribute::Title => self.title.as_deref(),
            Attribute::Year => self.year.as_deref(),
            Attribute::Rating => self.rating.as_deref(),
            Attribute::Name => None,
        }
    }
}

#[derive(Debug, Default)]
struct ColumnMap {
    movie_id: Option<usize>,
    title: Option<usize>,
    year: Option<usize>,
    genres: Option<usize>,
    director: Option<usize>,
    rating: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::ByteRecord) -> Result<Self, MovieKgError> {
        let mut map = Self::default();
        for (i, header) in headers.iter().enumerate() {
            let name = String::from_utf8_lossy(header)
                .trim()
                .to_lowercase()
                .replace(' ', "_");
            match name.as_str() {
                "movie_id" | "id" | "movieid" | "external_id" => map.movie_id = Some(i),
                "title" | "movie_title" => map.title = Some(i),
                "year" | "release_year" | "released" => map.year = Some(i),
                "genres" | "genre" | "categories" => map.genres = Some(i),
                "director" | "director_name" => map.director = Some(i),
                "rating" | "score" => map.rating = Some(i),
                _ => {}
            }
        }

        let missing: Vec<&str> = [
            ("movie_id", map.movie_id),
            ("title", map.title),
            ("year", map.year),
            ("genres", map.genres),
            ("director", map.director),
            ("rating", map.rating),
        ]
        .into_iter()
        .filter(|(_, column)| column.is_none())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(MovieKgError::invalid_input(format!(
                "CSV is missing required column(s): {}",
                missing.join(", ")
            )));
        }
        Ok(map)
    }
}

/// Streams [`RawRow`]s from delimited text with a header line.
pub struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
    column_map: ColumnMap,
}

impl<R: Read> CsvSource<R> {
    /// Fails with `InvalidInput` if the header cannot be read or a required column is missing.
    pub fn new(reader: R) -> Result<Self, MovieKgError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader
            .byte_headers()
            .map_err(|e| MovieKgError::invalid_input(format!("cannot read CSV header: {e}")))?
            .clone();
        let column_map = ColumnMap::from_headers(&headers)?;
        Ok(Self { reader, column_map })
    }

    fn to_row(&self, record: &csv::ByteRecord) -> RawRow {
        let field = |idx: Option<usize>| -> Option<String> {
            idx.and_then(|i| record.get(i))
                .map(|bytes| String::from_utf8_lossy(bytes).trim().to_owned())
                .filter(|s| !s.is_empty())
        };
        RawRow {
            line: record.position().map_or(0, |p| p.line()),
            movie_id: field(self.column_map.movie_id),
            title: field(self.column_map.title),
            year: field(self.column_map.year),
            genres: field(self.column_map.genres),
            director: field(self.column_map.director),
            rating: field(self.column_map.rating),
        }
    }
}

impl<R: Read> Iterator for CsvSource<R> {
    type Item = Result<RawRow, MovieKgError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = csv::ByteRecord::new();
        match self.reader.read_byte_record(&mut record) {
            Ok(true) => Some(Ok(self.to_row(&record))),
            Ok(false) => None,
            Err(e) => Some(Err(MovieKgError::invalid_input(format!(
                "cannot read CSV record: {e}"
            )))),
        }
    }
}

/// Reads every row of a CSV file; a missing file or unreadable header is fatal.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Vec<RawRow>, MovieKgError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        MovieKgError::invalid_input(format!("cannot open input {}: {e}", path.display()))
    })?;
    CsvSource::new(file)?.collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedEntity {
    pub id: StableId,
    pub name: String,
}

/// A validated row, ready to be projected into any store.
#[derive(Clone, Debug, PartialEq)]
pub struct MovieRecord {
    pub line: u64,
    pub work: StableId,
    pub external_id: String,
    pub title: String,
    pub year: i64,
    pub rating: f64,
    pub director: NamedEntity,
    pub genres: Vec<NamedEntity>,
}

impl MovieRecord {
    pub fn from_row(row: &RawRow) -> Result<Self, MovieKgError> {
        let line = row.line;
        let missing =
            |column: &str| MovieKgError::malformed_row(format!("line {line}: missing {column}"));
        for &attribute in EntityKind::Work.required_attributes() {
            if row.work_value(attribute).is_none() {
                return Err(missing(attribute.key()));
            }
        }
        let required = |attribute: Attribute| {
            row.work_value(attribute)
                .map(str::to_owned)
                .ok_or_else(|| missing(attribute.key()))
        };
        let external_id = required(Attribute::ExternalId)?;
        let title = required(Attribute::Title)?;
        let year_text = required(Attribute::Year)?;
        let rating_text = required(Attribute::Rating)?;
        let director_name = row.director.clone().ok_or_else(|| missing("director"))?;

        let year = parse_year(&year_text).ok_or_else(|| {
            MovieKgError::malformed_row(format!(
                "line {line}: year {year_text:?} is not a whole number"
            ))
        })?;
        let rating = rating_text
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| {
                MovieKgError::malformed_row(format!(
                    "line {line}: rating {rating_text:?} is not a number"
                ))
            })?;

        let work = resolve(EntityKind::Work, &external_id)?;
        let director = NamedEntity {
            id: resolve(EntityKind::Agent, &director_name)?,
            name: display_name(&director_name),
        };

        let mut genres: Vec<NamedEntity> = Vec::new();
        for raw in row.genres.as_deref().unwrap_or_default().split(GENRE_DELIMITER) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let id = resolve(EntityKind::Category, raw)?;
            if genres.iter().all(|genre| genre.id != id) {
                genres.push(NamedEntity {
                    id,
                    name: display_name(raw),
                });
            }
        }

        Ok(Self {
            line,
            work,
            external_id,
            title: display_name(&title),
            year,
            rating,
            director,
            genres,
        })
    }

    /// Nodes in write order: the Work first, then the entities it links to.
    pub fn nodes(&self) -> Vec<NodeSpec> {
        let mut nodes = vec![NodeSpec {
            id: self.work.clone(),
            properties: vec![
                (
                    Attribute::ExternalId,
                    PropertyValue::Text(self.external_id.clone()),
                ),
                (Attribute::Title, PropertyValue::Text(self.title.clone())),
                (Attribute::Year, PropertyValue::Integer(self.year)),
                (Attribute::Rating, PropertyValue::Float(self.rating)),
            ],
            on_match: OnMatch::Update,
        }];
        for entity in std::iter::once(&self.director).chain(&self.genres) {
            nodes.push(NodeSpec {
                id: entity.id.clone(),
                properties: vec![(Attribute::Name, PropertyValue::Text(entity.name.clone()))],
                on_match: OnMatch::Keep,
            });
        }
        nodes
    }

    pub fn edges(&self) -> Vec<EdgeSpec> {
        let mut edges = vec![EdgeSpec {
            from: self.work.clone(),
            relation: RelationKind::DirectedBy,
            to: self.director.id.clone(),
        }];
        edges.extend(self.genres.iter().map(|genre| EdgeSpec {
            from: self.work.clone(),
            relation: RelationKind::HasGenre,
            to: genre.id.clone(),
        }));
        edges
    }
}

fn parse_year(text: &str) -> Option<i64> {
    if let Ok(year) = text.parse::<i64>() {
        return Some(year);
    }
    let value = text.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// Applies a validated record to one store and returns the Work's id.
pub fn ingest_record<B: GraphBackend + ?Sized>(
    backend: &B,
    record: &MovieRecord,
) -> Result<StableId, MovieKgError> {
    for node in record.nodes() {
        backend.upsert_node(&node)?;
    }
    for edge in record.edges() {
        backend.upsert_edge(&edge)?;
    }
    info!(
        store = backend.name(),
        line = record.line,
        work = %record.work,
        "ingested row"
    );
    Ok(record.work.clone())
}

pub fn ingest_row<B: GraphBackend + ?Sized>(
    backend: &B,
    row: &RawRow,
) -> Result<StableId, MovieKgError> {
    let record = MovieRecord::from_row(row)?;
    ingest_record(backend, &record)
}
