use std::io::Cursor;

use moviekg::{
    QueryValue, RawRow, SqliteGraph,
    client::{QueryShell, ShellAction},
    ingest_row,
};

fn seed() -> SqliteGraph {
    let graph = SqliteGraph::open_in_memory().expect("graph");
    let rows = [
        ("1", "Inception", "2010", "Sci-Fi|Action", "Christopher Nolan", "8.8"),
        ("4", "Pulp Fiction", "1994", "Crime|Drama", "Quentin Tarantino", "8.9"),
    ];
    for (line, (id, title, year, genres, director, rating)) in rows.into_iter().enumerate() {
        let row = RawRow {
            line: line as u64 + 2,
            movie_id: Some(id.into()),
            title: Some(title.into()),
            year: Some(year.into()),
            genres: Some(genres.into()),
            director: Some(director.into()),
            rating: Some(rating.into()),
        };
        ingest_row(&graph, &row).expect("ingest");
    }
    graph
}

fn run_script(graph: &SqliteGraph, script: &str) -> String {
    let mut shell = QueryShell::new(graph);
    let mut out = Vec::new();
    shell
        .run(Cursor::new(script.as_bytes()), &mut out)
        .expect("shell");
    String::from_utf8(out).expect("utf8")
}

#[test]
fn test_shell_runs_multiline_query() {
    let graph = seed();
    let out = run_script(
        &graph,
        "MATCH (m:Movie)\nRETURN m.title AS title\nORDER BY title;\n:quit\n",
    );
    assert!(out.starts_with("Connected to property-graph"), "{out}");
    assert!(out.contains("     ... "), "{out}");
    assert!(out.contains("Inception"), "{out}");
    assert!(out.contains("Pulp Fiction"), "{out}");
    assert!(out.contains("(2 rows)"), "{out}");
}

#[test]
fn test_shell_binds_parameters() {
    let graph = seed();
    let out = run_script(
        &graph,
        ":param director=\"Christopher Nolan\"\n\
         :params\n\
         MATCH (m:Movie)-[:DIRECTED_BY]->(:Director {name: $director}) RETURN m.title AS title;\n",
    );
    assert!(out.contains("$director = Christopher Nolan"), "{out}");
    assert!(out.contains("Inception"), "{out}");
    assert!(!out.contains("Pulp Fiction"), "{out}");
}

#[test]
fn test_shell_reports_errors_and_continues() {
    let graph = seed();
    let out = run_script(
        &graph,
        "MATCH (m:Movie RETURN m;\n\
         MATCH (d:Director {name: $who}) RETURN d;\n\
         :bogus\n\
         :param 1bad\n\
         MATCH (g:Genre) RETURN count(g) AS genres;\n",
    );
    let errors = out
        .lines()
        .filter(|line| line.starts_with("moviekg> error:"))
        .count();
    assert_eq!(errors, 3, "{out}");
    assert!(out.contains("missing parameter $who"), "{out}");
    assert!(out.contains("unknown command :bogus"), "{out}");
    assert!(out.contains("genres"), "{out}");
}

#[test]
fn test_shell_runs_intents() {
    let graph = seed();
    let out = run_script(&graph, ":intents\n:run top-rated\n:run movies-by-director\n");
    assert!(out.contains("director-filmography"), "{out}");
    assert!(out.contains("-- the 5 best rated movies"), "{out}");
    assert!(out.contains("Pulp Fiction"), "{out}");
    assert!(out.contains("error: invalid input: movies-by-director needs a director name"));
}

#[test]
fn test_shell_executes_unterminated_query_at_eof() {
    let graph = seed();
    let out = run_script(&graph, "MATCH (m:Movie) RETURN count(m) AS movies");
    assert!(out.contains("movies"), "{out}");
    assert!(out.contains("(1 row)"), "{out}");
}

#[test]
fn test_handle_line_quit_and_reset() {
    let graph = seed();
    let mut shell = QueryShell::new(&graph);
    let mut out = Vec::new();
    assert_eq!(
        shell.handle_line(":param year=2010", &mut out).expect("param"),
        ShellAction::Continue
    );
    assert_eq!(shell.params().get("year"), Some(&QueryValue::Integer(2010)));
    shell.handle_line(":reset", &mut out).expect("reset");
    assert!(shell.params().is_empty());
    assert_eq!(
        shell.handle_line(":q", &mut out).expect("quit"),
        ShellAction::Quit
    );
}

#[test]
fn test_shell_help_explains_parameter_syntax() {
    let graph = seed();
    let out = run_script(&graph, ":help\n");
    assert!(out.contains(":param NAME=VALUE"), "{out}");
    assert!(out.contains("use ?name for SPARQL variables"), "{out}");
}
