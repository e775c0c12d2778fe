use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;

fn sample_csv() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/movies.csv")
}

fn moviekg(workdir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_moviekg"));
    let out = workdir.join("out");
    cmd.current_dir(workdir)
        .env_remove("RUST_LOG")
        .arg("--input")
        .arg(sample_csv())
        .arg("--output-dir")
        .arg(&out)
        .arg("--graph-db")
        .arg(out.join("graph.db"));
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().expect("run moviekg");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("utf8")
}

#[test]
fn test_cli_exits_with_success_on_help() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_moviekg"));
    cmd.arg("--help");
    cmd.assert().success();
}

#[test]
fn test_cli_unknown_subcommand_is_usage_error() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_moviekg"));
    cmd.arg("frobnicate");
    cmd.assert().code(2);
}

#[test]
fn test_cli_load_writes_snapshot_graph_and_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stdout = stdout_of(moviekg(dir.path()).arg("load"));
    assert!(stdout.contains("PIPELINE REPORT"), "{stdout}");
    assert!(stdout.contains("works ingested:   12 (rdf)"), "{stdout}");
    assert!(stdout.contains("Consistency: rdf and property-graph agree"), "{stdout}");

    let out = dir.path().join("out");
    assert!(out.join("movie_knowledge_graph.ttl").is_file());
    assert!(out.join("graph.db").is_file());
    let report = std::fs::read_to_string(out.join("pipeline_report.txt")).expect("report");
    assert!(report.contains("mode:             dual"), "{report}");
}

#[test]
fn test_cli_load_missing_input_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_moviekg"));
    cmd.current_dir(dir.path())
        .arg("--input")
        .arg(dir.path().join("absent.csv"))
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .arg("load");
    let output = cmd.output().expect("run moviekg");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("absent.csv"), "{stderr}");
}

#[test]
fn test_cli_stats_and_compare_after_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    stdout_of(moviekg(dir.path()).arg("load"));

    let stats = stdout_of(moviekg(dir.path()).args(["stats", "--json"]));
    let body: Value = serde_json::from_str(&stats).expect("json");
    assert_eq!(body["consistent"], Value::Bool(true));
    assert_eq!(body["stores"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["stores"][0]["entities"]["Work"], 12);

    let compare = stdout_of(moviekg(dir.path()).arg("compare"));
    assert_eq!(compare.matches(" agree ").count(), 8, "{compare}");
    assert!(!compare.contains("DIFFER"), "{compare}");
}

#[test]
fn test_cli_query_with_parameters() {
    let dir = tempfile::tempdir().expect("tempdir");
    stdout_of(moviekg(dir.path()).arg("load"));

    let table = stdout_of(moviekg(dir.path()).args([
        "query",
        "--store",
        "graph",
        "MATCH (m:Movie)-[:DIRECTED_BY]->(d:Director {name: $who}) RETURN m.title AS title ORDER BY title",
        "--param",
        "who=Quentin Tarantino",
    ]));
    assert!(table.contains("Django Unchained"), "{table}");
    assert!(table.contains("Pulp Fiction"), "{table}");
    assert!(table.contains("(2 rows)"), "{table}");

    let json = stdout_of(moviekg(dir.path()).args([
        "query",
        "--store",
        "rdf",
        "--json",
        "PREFIX movie: <http://movie-kg.org/ontology#> \
         SELECT ?title WHERE { ?m movie:hasTitle ?title ; movie:releasedIn $year } ORDER BY ?title",
        "--param",
        "year=1994",
    ]));
    let rows: Value = serde_json::from_str(&json).expect("json");
    assert_eq!(
        rows,
        serde_json::json!([
            {"title": "Pulp Fiction"},
            {"title": "The Shawshank Redemption"}
        ])
    );
}

#[test]
fn test_cli_query_before_load_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cmd = moviekg(dir.path());
    cmd.args(["query", "--store", "graph", "MATCH (m) RETURN m"]);
    cmd.assert().code(1);
}

#[test]
fn test_cli_shell_reads_stdin() {
    let dir = tempfile::tempdir().expect("tempdir");
    stdout_of(moviekg(dir.path()).arg("load"));

    let mut cmd = moviekg(dir.path());
    cmd.args(["shell", "--store", "graph"])
        .write_stdin("MATCH (g:Genre) RETURN count(g) AS genres;\n:quit\n");
    let stdout = stdout_of(&mut cmd);
    assert!(stdout.contains("genres\n------\n9\n(1 row)"), "{stdout}");
}
