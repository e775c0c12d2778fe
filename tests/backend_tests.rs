use moviekg::{
    EdgeSpec, EntityKind, GraphBackend, MovieKgError, NodeSpec, OnMatch, PropertyValue,
    QueryParams, QueryValue, RdfStore, RelationKind, SqliteGraph, StableId, Upsert,
    compute_stats, resolve, schema::Attribute,
};

fn work(key: &str, rating: f64) -> NodeSpec {
    NodeSpec {
        id: resolve(EntityKind::Work, key).expect("id"),
        properties: vec![
            (Attribute::ExternalId, PropertyValue::Text(key.to_owned())),
            (Attribute::Title, PropertyValue::Text(format!("Movie {key}"))),
            (Attribute::Year, PropertyValue::Integer(2000)),
            (Attribute::Rating, PropertyValue::Float(rating)),
        ],
        on_match: OnMatch::Update,
    }
}

fn director(name: &str) -> NodeSpec {
    NodeSpec {
        id: resolve(EntityKind::Agent, name).expect("id"),
        properties: vec![(Attribute::Name, PropertyValue::Text(name.to_owned()))],
        on_match: OnMatch::Keep,
    }
}

fn directed_by(work: &NodeSpec, director: &NodeSpec) -> EdgeSpec {
    EdgeSpec {
        from: work.id.clone(),
        relation: RelationKind::DirectedBy,
        to: director.id.clone(),
    }
}

fn backends() -> Vec<Box<dyn GraphBackend>> {
    vec![
        Box::new(RdfStore::in_memory().expect("rdf")),
        Box::new(SqliteGraph::open_in_memory().expect("graph")),
    ]
}

#[test]
fn test_upsert_node_reports_what_changed() {
    for backend in backends() {
        let name = backend.name();
        assert_eq!(backend.upsert_node(&work("1", 8.0)).expect(name), Upsert::Created);
        assert_eq!(backend.upsert_node(&work("1", 8.0)).expect(name), Upsert::Unchanged);
        assert_eq!(backend.upsert_node(&work("1", 8.5)).expect(name), Upsert::Updated);

        let stats = compute_stats(backend.as_ref()).expect(name);
        assert_eq!(stats.count(EntityKind::Work), 1, "{name}");
        assert_eq!(stats.average_rating, Some(8.5), "{name}");
    }
}

#[test]
fn test_keep_leaves_existing_entity_untouched() {
    for backend in backends() {
        let name = backend.name();
        assert_eq!(
            backend.upsert_node(&director("Christopher Nolan")).expect(name),
            Upsert::Created
        );
        assert_eq!(
            backend.upsert_node(&director("christopher nolan")).expect(name),
            Upsert::Unchanged
        );
    }
}

#[test]
fn test_upsert_edge_is_idempotent() {
    for backend in backends() {
        let name = backend.name();
        let movie = work("1", 8.0);
        let nolan = director("Christopher Nolan");
        backend.upsert_node(&movie).expect(name);
        backend.upsert_node(&nolan).expect(name);
        let edge = directed_by(&movie, &nolan);
        assert_eq!(backend.upsert_edge(&edge).expect(name), Upsert::Created);
        assert_eq!(backend.upsert_edge(&edge).expect(name), Upsert::Unchanged);
        assert_eq!(compute_stats(backend.as_ref()).expect(name).relationships, 1);
    }
}

#[test]
fn test_clear_empties_the_store() {
    for backend in backends() {
        let name = backend.name();
        let movie = work("1", 8.0);
        let nolan = director("Christopher Nolan");
        backend.upsert_node(&movie).expect(name);
        backend.upsert_node(&nolan).expect(name);
        backend.upsert_edge(&directed_by(&movie, &nolan)).expect(name);
        backend.clear().expect(name);
        let stats = compute_stats(backend.as_ref()).expect(name);
        assert_eq!(stats.total_entities(), 0, "{name}");
        assert_eq!(stats.relationships, 0, "{name}");
    }
}

#[test]
fn test_graph_edge_requires_both_endpoints() {
    let graph = SqliteGraph::open_in_memory().expect("graph");
    let movie = work("1", 8.0);
    graph.upsert_node(&movie).expect("node");
    let err = graph
        .upsert_edge(&directed_by(&movie, &director("Nobody")))
        .expect_err("missing endpoint");
    assert!(matches!(err, MovieKgError::InvalidInput(_)));
    assert_eq!(graph.edge_count().expect("edges"), 0);
}

#[test]
fn test_graph_open_unreachable_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("missing").join("nested").join("graph.db");
    let err = SqliteGraph::open(&path).err().expect("unreachable");
    assert!(err.is_unavailable(), "{err}");
}

#[test]
fn test_graph_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("graph.db");
    {
        let graph = SqliteGraph::open(&path).expect("open");
        graph.upsert_node(&work("1", 8.0)).expect("node");
    }
    let graph = SqliteGraph::open(&path).expect("reopen");
    let id: StableId = resolve(EntityKind::Work, "1").expect("id");
    let entity = graph.find_entity(&id).expect("lookup").expect("exists");
    assert_eq!(entity.kind, "Movie");
    assert_eq!(entity.key, "movie_1");
    assert_eq!(entity.property("rating"), QueryValue::Float(8.0));
}

#[test]
fn test_rdf_turtle_snapshot_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("snapshot.ttl");
    let store = RdfStore::in_memory().expect("rdf");
    let movie = work("1", 8.0);
    let nolan = director("Christopher Nolan");
    store.upsert_node(&movie).expect("node");
    store.upsert_node(&nolan).expect("node");
    store.upsert_edge(&directed_by(&movie, &nolan)).expect("edge");
    store.save_turtle(&path).expect("save");

    let reopened = RdfStore::from_turtle_file(&path).expect("reopen");
    assert_eq!(reopened.len().expect("len"), store.len().expect("len"));
    assert_eq!(
        compute_stats(&reopened).expect("stats"),
        compute_stats(&store).expect("stats")
    );
}

#[test]
fn test_rdf_missing_snapshot_is_unavailable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = RdfStore::from_turtle_file(dir.path().join("absent.ttl"))
        .err()
        .expect("missing");
    assert!(err.is_unavailable());
}

#[test]
fn test_rdf_query_forms() {
    let store = RdfStore::in_memory().expect("rdf");
    store.upsert_node(&director("Christopher Nolan")).expect("node");

    let mut params = QueryParams::new();
    params.insert("name".into(), QueryValue::text("Christopher Nolan"));
    let rows = store
        .query(
            "ASK { ?d <http://xmlns.com/foaf/0.1/name> $name }",
            &params,
        )
        .expect("ask");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("result"), Some(&QueryValue::Bool(true)));

    let rows = store
        .query(
            "SELECT ?name WHERE { ?d <http://xmlns.com/foaf/0.1/name> ?name }",
            &QueryParams::new(),
        )
        .expect("select");
    assert_eq!(rows[0].get("name"), Some(&QueryValue::text("Christopher Nolan")));

    let err = store
        .query("SELECT WHERE {", &QueryParams::new())
        .expect_err("syntax error");
    assert!(matches!(err, MovieKgError::QueryError(_)));
}
