use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use queryfront::{
    OrderByResult, ParseError, ParserResult, QueryConfig, SchemaConfig,
    observability::init_tracing,
};
use serde::Serialize;

/// Exit status when the query text is rejected.
const EXIT_INVALID_QUERY: u8 = 2;

/// CLI arguments for queryfront
#[derive(Parser, Debug)]
#[command(version, about = "Parse $filter and $orderby text against a schema", long_about = None)]
struct Args {
    /// Path to the TOML schema file
    #[arg(short, long)]
    schema: PathBuf,

    /// $filter text (omit for the schema defaults)
    #[arg(short, long)]
    filter: Option<String>,

    /// $orderby text (omit for the schema default)
    #[arg(short, long)]
    orderby: Option<String>,

    /// Print the queryable fields and exit
    #[arg(long)]
    describe: bool,
}

#[derive(Serialize)]
struct ResultOutput<'a> {
    filter: &'a ParserResult,
    orderby: &'a OrderByResult,
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    errors: Vec<&'a ParseError>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let schema = match SchemaConfig::from_file(&args.schema) {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&schema.logging);
    tracing::debug!(schema = %args.schema.display(), "Loaded schema");

    let config = match schema.query_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid schema");
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.describe {
        println!("{}", describe(&config));
        return ExitCode::SUCCESS;
    }

    let outcome = config.evaluate(args.filter.as_deref(), args.orderby.as_deref());

    let (rendered, code) = match (&outcome.filter, &outcome.order_by) {
        (Ok(filter), Ok(order_by)) => (
            serde_json::to_string_pretty(&ResultOutput {
                filter,
                orderby: order_by,
            }),
            ExitCode::SUCCESS,
        ),
        _ => (
            serde_json::to_string_pretty(&ErrorOutput {
                errors: outcome.errors(),
            }),
            ExitCode::from(EXIT_INVALID_QUERY),
        ),
    };

    match rendered {
        Ok(json) => {
            println!("{}", json);
            code
        }
        Err(e) => {
            eprintln!("Error: failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn describe(config: &QueryConfig) -> String {
    format!(
        "$filter\n{}\n\n$orderby\n{}",
        config.filter_parser(),
        config.order_by_parser()
    )
}
