use moviekg::{
    CsvSource, EntityKind, GraphBackend, MovieKgError, MovieRecord, QueryParams, QueryValue,
    RawRow, SqliteGraph, ingest_row, read_csv, resolve,
    schema::Attribute,
};

fn raw(line: u64, fields: [&str; 6]) -> RawRow {
    let field = |value: &str| Some(value.to_owned()).filter(|v| !v.is_empty());
    RawRow {
        line,
        movie_id: field(fields[0]),
        title: field(fields[1]),
        year: field(fields[2]),
        genres: field(fields[3]),
        director: field(fields[4]),
        rating: field(fields[5]),
    }
}

fn inception() -> RawRow {
    raw(
        2,
        [
            "1",
            "Inception",
            "2010",
            "Sci-Fi|Action|Thriller",
            "Christopher Nolan",
            "8.8",
        ],
    )
}

#[test]
fn test_from_row_builds_record() {
    let record = MovieRecord::from_row(&inception()).expect("record");
    assert_eq!(record.line, 2);
    assert_eq!(record.work, resolve(EntityKind::Work, "1").expect("id"));
    assert_eq!(record.title, "Inception");
    assert_eq!(record.year, 2010);
    assert_eq!(record.rating, 8.8);
    assert_eq!(record.director.name, "Christopher Nolan");
    let genres: Vec<&str> = record.genres.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(genres, ["Sci-Fi", "Action", "Thriller"]);
    assert_eq!(record.nodes().len(), 5);
    assert_eq!(record.edges().len(), 4);
}

#[test]
fn test_from_row_deduplicates_genres_by_key() {
    let row = raw(3, ["7", "Drama Film", "2001", "Drama|drama| Drama |", "Someone", "7"]);
    let record = MovieRecord::from_row(&row).expect("record");
    assert_eq!(record.genres.len(), 1);
    assert_eq!(record.genres[0].name, "Drama");
}

#[test]
fn test_from_row_without_genres_has_no_genre_edges() {
    let row = raw(4, ["8", "Untitled", "2020", "", "Someone", "6.5"]);
    let record = MovieRecord::from_row(&row).expect("record");
    assert!(record.genres.is_empty());
    assert_eq!(record.edges().len(), 1);
}

#[test]
fn test_from_row_accepts_float_year() {
    let row = raw(5, ["9", "Float Year", "2010.0", "Drama", "Someone", "7.1"]);
    let record = MovieRecord::from_row(&row).expect("record");
    assert_eq!(record.year, 2010);
}

#[test]
fn test_from_row_rejects_bad_values() {
    let cases = [
        ["9", "Bad Year", "20x0", "Drama", "Someone", "7.1"],
        ["9", "Half Year", "2010.5", "Drama", "Someone", "7.1"],
        ["9", "Bad Rating", "2010", "Drama", "Someone", "great"],
        ["9", "NaN Rating", "2010", "Drama", "Someone", "NaN"],
        ["9", "No Director", "2010", "Drama", "", "7.1"],
        ["", "No Id", "2010", "Drama", "Someone", "7.1"],
    ];
    for fields in cases {
        let err = MovieRecord::from_row(&raw(6, fields)).expect_err("invalid row");
        assert!(
            matches!(err, MovieKgError::MalformedRow(_)),
            "{fields:?}: {err}"
        );
        assert!(err.to_string().contains("line 6"), "{err}");
    }
}

#[test]
fn test_from_row_requires_every_work_attribute() {
    for &attribute in EntityKind::Work.required_attributes() {
        let mut row = inception();
        match attribute {
            Attribute::ExternalId => row.movie_id = None,
            Attribute::Title => row.title = None,
            Attribute::Year => row.year = None,
            Attribute::Rating => row.rating = None,
            Attribute::Name => row.director = None,
        }
        assert!(row.work_value(attribute).is_none());
        let err = MovieRecord::from_row(&row).expect_err("missing attribute");
        assert!(matches!(err, MovieKgError::MalformedRow(_)), "{err}");
        assert!(
            err.to_string().contains(&format!("missing {}", attribute.key())),
            "{err}"
        );
    }
}

#[test]
fn test_from_row_rejects_unusable_keys() {
    let row = raw(7, ["10", "Punctuated", "2010", "Drama", "...", "7.1"]);
    let err = MovieRecord::from_row(&row).expect_err("invalid key");
    assert!(matches!(err, MovieKgError::InvalidKey(_)));
    assert!(err.is_row_level());
}

#[test]
fn test_csv_source_maps_aliased_headers() {
    let csv = "ID, Movie Title ,release_year,genre,director_name,score\n\
               42,\"Heat, Director's Cut\",1995,Crime|Thriller,Michael Mann,8.3\n";
    let rows: Vec<RawRow> = CsvSource::new(csv.as_bytes())
        .expect("source")
        .collect::<Result<_, _>>()
        .expect("rows");
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.line, 2);
    assert_eq!(row.movie_id.as_deref(), Some("42"));
    assert_eq!(row.title.as_deref(), Some("Heat, Director's Cut"));
    assert_eq!(row.genres.as_deref(), Some("Crime|Thriller"));
    assert_eq!(row.rating.as_deref(), Some("8.3"));
}

#[test]
fn test_csv_source_reports_missing_columns() {
    let csv = "movie_id,title,year\n1,Inception,2010\n";
    let err = CsvSource::new(csv.as_bytes())
        .err()
        .expect("missing columns");
    assert!(matches!(err, MovieKgError::InvalidInput(_)));
    let message = err.to_string();
    assert!(message.contains("genres"), "{message}");
    assert!(message.contains("director"), "{message}");
    assert!(message.contains("rating"), "{message}");
}

#[test]
fn test_csv_source_tolerates_short_records() {
    let csv = "movie_id,title,year,genres,director,rating\n\
               1,Inception,2010,Sci-Fi,Christopher Nolan,8.8\n\
               2,Short Row,2011\n";
    let rows: Vec<RawRow> = CsvSource::new(csv.as_bytes())
        .expect("source")
        .collect::<Result<_, _>>()
        .expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].line, 3);
    assert_eq!(rows[1].director, None);
    assert!(MovieRecord::from_row(&rows[1]).is_err());
}

#[test]
fn test_read_csv_missing_file_is_invalid_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = read_csv(dir.path().join("absent.csv")).expect_err("missing file");
    assert!(matches!(err, MovieKgError::InvalidInput(_)));
}

#[test]
fn test_read_csv_sample_data() {
    let rows = read_csv(concat!(env!("CARGO_MANIFEST_DIR"), "/data/movies.csv")).expect("rows");
    assert_eq!(rows.len(), 12);
    for row in &rows {
        MovieRecord::from_row(row).expect("sample rows are valid");
    }
}

#[test]
fn test_ingest_row_twice_is_idempotent() {
    let graph = SqliteGraph::open_in_memory().expect("graph");
    ingest_row(&graph, &inception()).expect("first");
    let entities = graph.entity_count().expect("entities");
    let edges = graph.edge_count().expect("edges");
    assert_eq!(entities, 5);
    assert_eq!(edges, 4);

    ingest_row(&graph, &inception()).expect("second");
    assert_eq!(graph.entity_count().expect("entities"), entities);
    assert_eq!(graph.edge_count().expect("edges"), edges);
}

#[test]
fn test_ingest_row_updates_work_and_keeps_first_names() {
    let graph = SqliteGraph::open_in_memory().expect("graph");
    ingest_row(&graph, &inception()).expect("first");
    let rerated = raw(
        9,
        [
            "1",
            "Inception",
            "2010",
            "sci fi",
            "christopher   NOLAN",
            "9.1",
        ],
    );
    ingest_row(&graph, &rerated).expect("second");

    let rows = graph
        .query(
            "MATCH (m:Movie)-[:DIRECTED_BY]->(d:Director) RETURN m.rating AS rating, d.name AS director",
            &QueryParams::new(),
        )
        .expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("rating"), Some(&QueryValue::Float(9.1)));
    assert_eq!(
        rows[0].get("director"),
        Some(&QueryValue::text("Christopher Nolan"))
    );

    let director = resolve(EntityKind::Agent, "Christopher Nolan").expect("id");
    let entity = graph.find_entity(&director).expect("lookup").expect("exists");
    assert_eq!(entity.property("name"), QueryValue::text("Christopher Nolan"));
    assert_eq!(graph.entities(Some("Genre")).expect("genres").len(), 3);
}
