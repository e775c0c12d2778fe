use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use moviekg::{
    GraphBackend, KgConfig, LoadTarget, QueryIntent, QueryParams, compare_intent, compare_stats,
    compute_stats,
    client::{QueryShell, parse_param},
    logging,
    pipeline::{open_property_graph, open_triple_store, run_load},
    report::{render_stats, render_table},
};
use serde_json::json;

/// Load movie data into a triple store and a property graph, then query both.
#[derive(Parser)]
#[command(name = "moviekg", version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (default: ./moviekg.toml if present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Input CSV, overriding the configuration.
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Output directory, overriding the configuration.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Property graph database file, overriding the configuration.
    #[arg(long, global = true)]
    graph_db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StoreArg {
    /// The RDF triple store (SPARQL).
    Rdf,
    /// The property graph (MATCH ... RETURN).
    Graph,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the CSV into both stores (or one with --only) and write the report.
    Load {
        #[arg(long, value_enum)]
        only: Option<StoreArg>,
    },

    /// Print statistics for the stores written by the last load.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Run every built-in query on both stores and compare the results.
    Compare {
        #[arg(long, default_value = "Christopher Nolan")]
        director: String,

        #[arg(long, default_value = "Sci-Fi")]
        genre: String,
    },

    /// Run one query against a store.
    Query {
        #[arg(long, value_enum)]
        store: StoreArg,

        /// Query text (SPARQL for rdf, MATCH ... RETURN for graph).
        query: String,

        /// Bind a $parameter; repeatable.
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Interactive query shell.
    Shell {
        #[arg(long, value_enum, default_value = "rdf")]
        store: StoreArg,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = KgConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(input) = cli.input {
        config.input = input;
    }
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(graph_db) = cli.graph_db {
        config.property_graph.database = graph_db;
    }
    logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Load { only } => load(&config, only),
        Commands::Stats { json } => stats(&config, json),
        Commands::Compare { director, genre } => compare(&config, &director, &genre),
        Commands::Query {
            store,
            query,
            params,
            json,
        } => run_query(&config, store, &query, &params, json),
        Commands::Shell { store } => {
            let backend = open_store(&config, store)?;
            let mut shell = QueryShell::new(backend.as_ref());
            shell.run(io::stdin().lock(), io::stdout().lock())?;
            Ok(())
        }
    }
}

fn load(config: &KgConfig, only: Option<StoreArg>) -> Result<()> {
    let target = match only {
        None => LoadTarget::Both,
        Some(StoreArg::Rdf) => LoadTarget::TripleOnly,
        Some(StoreArg::Graph) => LoadTarget::PropertyGraphOnly,
    };
    let outcome = run_load(config, target)?;
    print!("{}", outcome.report);
    if let Some(snapshot) = &outcome.snapshot {
        println!("\nSnapshot: {}", snapshot.display());
    }
    println!("Report:   {}", outcome.report_path.display());
    Ok(())
}

fn stats(config: &KgConfig, json: bool) -> Result<()> {
    let mut stats = Vec::new();
    match open_triple_store(config) {
        Ok(rdf) => stats.push(compute_stats(&rdf)?),
        Err(err) => eprintln!("skipping rdf: {err}"),
    }
    match open_property_graph(config) {
        Ok(graph) => stats.push(compute_stats(&graph)?),
        Err(err) => eprintln!("skipping graph: {err}"),
    }
    if stats.is_empty() {
        bail!("no store to read; run `moviekg load` first");
    }
    let comparison = match stats.as_slice() {
        [left, right] => Some(compare_stats(left, right)),
        _ => None,
    };

    if json {
        let body = json!({
            "stores": stats,
            "consistent": comparison.as_ref().map(|c| c.consistent()),
            "mismatches": comparison.as_ref().map(|c| c.mismatches.clone()).unwrap_or_default(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }
    for store in &stats {
        print!("{}", render_stats(store));
    }
    if let Some(comparison) = comparison {
        if comparison.consistent() {
            println!("Consistency: stores agree");
        } else {
            println!("Consistency: MISMATCH");
            for mismatch in &comparison.mismatches {
                println!("  {mismatch}");
            }
        }
    }
    Ok(())
}

fn compare(config: &KgConfig, director: &str, genre: &str) -> Result<()> {
    let rdf = open_triple_store(config)?;
    let graph = open_property_graph(config)?;
    let mut disagreements = 0;
    let mut stdout = io::stdout().lock();
    for intent in QueryIntent::catalog(director, genre) {
        let comparison = compare_intent(&rdf, &graph, &intent)
            .with_context(|| format!("running {intent}"))?;
        let verdict = if comparison.agrees() { "agree" } else { "DIFFER" };
        writeln!(
            stdout,
            "{:<22} {:>3} rows  {verdict}  ({})",
            intent.name(),
            comparison.left.len(),
            intent.description()
        )?;
        for difference in &comparison.differences {
            writeln!(stdout, "    {difference}")?;
        }
        if !comparison.agrees() {
            disagreements += 1;
        }
    }
    if disagreements > 0 {
        bail!("{disagreements} quer(ies) returned different results");
    }
    Ok(())
}

fn run_query(
    config: &KgConfig,
    store: StoreArg,
    query: &str,
    raw_params: &[String],
    json: bool,
) -> Result<()> {
    let mut params = QueryParams::new();
    for assignment in raw_params {
        let (name, value) = parse_param(assignment)?;
        params.insert(name, value);
    }
    let backend = open_store(config, store)?;
    let rows = backend.query(query, &params)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", render_table(&rows));
    }
    Ok(())
}

fn open_store(config: &KgConfig, store: StoreArg) -> Result<Box<dyn GraphBackend>> {
    let backend: Box<dyn GraphBackend> = match store {
        StoreArg::Rdf => Box::new(open_triple_store(config)?),
        StoreArg::Graph => Box::new(open_property_graph(config)?),
    };
    Ok(backend)
}
