//! planlens - command-line interface.
//!
//! Annotates the queries of a SQL script with plans loaded from EXPLAIN
//! JSON files, one per query, and prints them with the annotations inline.

use std::path::PathBuf;
use std::process::ExitCode;

use log::LevelFilter;

use planlens::catalog::StaticCatalog;
use planlens::plan::{PlanNode, PlanSet};
use planlens::session::{Session, SessionConfig, SessionError};
use planlens::sql::split_statements;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    // Parse simple command line args.
    let mut query_file: Option<PathBuf> = None;
    let mut execute: Option<String> = None;
    let mut plan_files: Vec<PathBuf> = Vec::new();
    let mut catalog_file: Option<PathBuf> = None;
    let mut config = SessionConfig::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-q" | "--query" => {
                i += 1;
                if i < args.len() {
                    query_file = Some(PathBuf::from(&args[i]));
                }
            }
            "-e" | "--execute" => {
                i += 1;
                if i < args.len() {
                    execute = Some(args[i].clone());
                }
            }
            "-p" | "--plan" => {
                i += 1;
                if i < args.len() {
                    plan_files.push(PathBuf::from(&args[i]));
                }
            }
            "-c" | "--catalog" => {
                i += 1;
                if i < args.len() {
                    catalog_file = Some(PathBuf::from(&args[i]));
                }
            }
            "-v" | "--verbose" => {
                config = config.verbose(true);
            }
            "--inclusive-between" => {
                config = config.inclusive_between(true);
            }
            "--no-lowercase" => {
                config = config.lowercase_input(false);
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("planlens v{}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            arg => {
                eprintln!("Unknown option: {}", arg);
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    init_logging(config.verbose);

    let script = match (execute, query_file) {
        (Some(sql), _) => sql,
        (None, Some(path)) => match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        (None, None) => {
            eprintln!("Error: no query given (-e SQL or -q FILE)");
            return ExitCode::FAILURE;
        }
    };

    let statements = split_statements(&script);
    if plan_files.len() != statements.len() {
        eprintln!(
            "Error: {} quer{} but {} plan file(s); give one -p FILE per query, in order",
            statements.len(),
            if statements.len() == 1 { "y" } else { "ies" },
            plan_files.len()
        );
        return ExitCode::FAILURE;
    }

    let session = match build_session(&statements, &plan_files, catalog_file, config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut failed = false;
    for result in session.annotate_batch(&script) {
        match result {
            Ok(annotated) => {
                print!("{}", annotated.render());
                println!("-- {}", annotated.coverage);
                if let Some(report) = annotated.resolve.as_ref().filter(|r| !r.is_complete()) {
                    println!("-- unqualified columns: {:?}", report.ambiguous.union(&report.unknown).collect::<Vec<_>>());
                }
                println!();
            }
            Err(e) => {
                failed = true;
                report_error(&e);
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

fn build_session(
    statements: &[&str],
    plan_files: &[PathBuf],
    catalog_file: Option<PathBuf>,
    config: SessionConfig,
) -> Result<Session<PlanSet>, SessionError> {
    let mut plans = PlanSet::new();
    for (sql, path) in statements.iter().zip(plan_files) {
        plans = plans.with_plan(&config.query_text(sql), PlanNode::from_json_file(path)?);
    }
    let session = Session::with_config(plans, config);
    Ok(match catalog_file {
        Some(path) => session.with_catalog(StaticCatalog::from_json_file(path)?),
        None => session,
    })
}

fn report_error(error: &SessionError) {
    eprintln!("Error: {}", error);
    if let Some(context) = error.context() {
        eprintln!("{}", context);
    }
}

fn print_help() {
    println!("planlens - annotate SQL queries with their execution plans");
    println!();
    println!("Usage: planlens (-e SQL | -q FILE) -p PLAN [-p PLAN ...] [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -q, --query FILE        Read queries (;-separated) from FILE");
    println!("  -e, --execute SQL       Annotate SQL");
    println!("  -p, --plan FILE         EXPLAIN (VERBOSE, COSTS FALSE, FORMAT JSON) output;");
    println!("                          repeat once per query, in query order");
    println!("  -c, --catalog FILE      JSON map of relation -> columns for column resolution");
    println!("  -v, --verbose           Enable debug logging (RUST_LOG overrides)");
    println!("      --inclusive-between Match BETWEEN as >= / <=");
    println!("      --no-lowercase      Do not fold unquoted query text to lower case");
    println!("  -h, --help              Show this help message");
    println!("      --version           Show version");
    println!();
    println!("Examples:");
    println!("  planlens -p plan.json -e 'SELECT * FROM nation WHERE n_regionkey = 0'");
    println!("  planlens -c tpch.json -q q5_q7.sql -p q5.json -p q7.json");
}
