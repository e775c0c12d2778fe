use moviekg::{
    CsvSource, EntityKind, GraphBackend, LoadOptions, MOVIE_ONTOLOGY, RawRow, RdfStore,
    SecondaryTarget, SqliteGraph, compare_stats, compute_stats, ingest_row, load_all,
};

const CSV: &str = "movie_id,title,year,genres,director,rating
1,Alpha,2001,Drama|Crime,Dir One,9.0
2,Beta,2002,Drama,Dir One,8.5
3,Gamma,2003,Comedy,dir  one,7.0
4,Delta,2004,Drama|Comedy|drama,Dir Two,9.3
5,Epsilon,2005,,Dir Three,8.8
";

fn rows() -> Vec<RawRow> {
    CsvSource::new(CSV.as_bytes())
        .expect("source")
        .collect::<Result<_, _>>()
        .expect("rows")
}

fn seed() -> (RdfStore, SqliteGraph) {
    let rdf = RdfStore::in_memory().expect("rdf");
    let graph = SqliteGraph::open_in_memory().expect("graph");
    load_all(
        &rows(),
        &rdf,
        SecondaryTarget::Store(&graph),
        &LoadOptions::default(),
    )
    .expect("load");
    (rdf, graph)
}

#[test]
fn test_stats_count_entities_per_kind() {
    let (rdf, graph) = seed();
    for backend in [&rdf as &dyn GraphBackend, &graph] {
        let stats = compute_stats(backend).expect("stats");
        assert_eq!(stats.count(EntityKind::Work), 5, "{}", stats.store);
        assert_eq!(stats.count(EntityKind::Agent), 3, "{}", stats.store);
        assert_eq!(stats.count(EntityKind::Category), 3, "{}", stats.store);
        assert_eq!(stats.count(EntityKind::RatingSubject), 0, "{}", stats.store);
        assert_eq!(stats.total_entities(), 11);
        assert_eq!(stats.relationships, 11, "{}", stats.store);
    }
}

#[test]
fn test_stats_average_rating() {
    let (rdf, graph) = seed();
    for backend in [&rdf as &dyn GraphBackend, &graph] {
        let stats = compute_stats(backend).expect("stats");
        let average = stats.average_rating.expect("average");
        assert!((average - 8.52).abs() < 1e-9, "{}: {average}", stats.store);
    }
}

#[test]
fn test_stats_on_empty_stores() {
    let rdf = RdfStore::in_memory().expect("rdf");
    let graph = SqliteGraph::open_in_memory().expect("graph");
    rdf.register_schema(&MOVIE_ONTOLOGY).expect("schema");
    graph.register_schema(&MOVIE_ONTOLOGY).expect("schema");

    let left = compute_stats(&rdf).expect("rdf stats");
    let right = compute_stats(&graph).expect("graph stats");
    for stats in [&left, &right] {
        assert_eq!(stats.total_entities(), 0, "{}", stats.store);
        assert_eq!(stats.relationships, 0, "{}", stats.store);
        assert_eq!(stats.average_rating, None, "{}", stats.store);
    }
    assert!(compare_stats(&left, &right).consistent());
}

#[test]
fn test_compare_stats_reports_each_mismatch() {
    let (rdf, graph) = seed();
    let left = compute_stats(&rdf).expect("rdf stats");
    let right = compute_stats(&graph).expect("graph stats");
    assert!(compare_stats(&left, &right).consistent());

    let mut skewed = right.clone();
    skewed.entities.insert(EntityKind::Work, 4);
    skewed.relationships = 10;
    skewed.average_rating = Some(8.6);
    let comparison = compare_stats(&left, &skewed);
    assert!(!comparison.consistent());
    assert_eq!(comparison.mismatches.len(), 3, "{:?}", comparison.mismatches);
    assert!(comparison.mismatches[0].starts_with("Movie count"));

    let mut unrated = right;
    unrated.average_rating = None;
    assert_eq!(compare_stats(&left, &unrated).mismatches.len(), 1);
}

#[test]
fn test_stats_serialize_to_json() {
    let (_, graph) = seed();
    let stats = compute_stats(&graph).expect("stats");
    let json = serde_json::to_value(&stats).expect("json");
    assert_eq!(json["store"], "property-graph");
    assert_eq!(json["entities"]["Work"], 5);
    assert_eq!(json["relationships"], 11);
}

#[test]
fn test_relationship_count_without_registered_schema() {
    let rdf = RdfStore::in_memory().expect("rdf");
    let graph = SqliteGraph::open_in_memory().expect("graph");
    let row = rows().into_iter().next().expect("first row");
    for backend in [&rdf as &dyn GraphBackend, &graph] {
        ingest_row(backend, &row).expect("ingest");
    }
    let left = compute_stats(&rdf).expect("rdf stats");
    let right = compute_stats(&graph).expect("graph stats");
    assert_eq!(left.relationships, 3);
    assert_eq!(right.relationships, 3);
    let comparison = compare_stats(&left, &right);
    assert!(comparison.consistent(), "{:?}", comparison.mismatches);
}
