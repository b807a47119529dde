//! CLI for seql
//!
//! Generates descriptors for elements picked by a CSS selector, resolves
//! SEQL lines against documents, and prints synthesized selectors.

use clap::{Parser, Subcommand};
use scraper::{Html, Selector};
use seql::{
    build_selector, generate_eid_batch, parse_seql, resolve, to_seql, BuildOptions,
    GenerateOptions, ResolveOptions, ResolveRoot, ResolveStatus,
};
use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "seql")]
#[command(version)]
#[command(about = "Resilient semantic identifiers for HTML/SVG elements", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate descriptors for elements picked by a CSS selector
    Generate {
        /// Input HTML file (use '-' for stdin)
        #[arg(value_name = "FILE")]
        input: String,

        /// CSS selector choosing the target element(s)
        #[arg(short, long)]
        select: String,

        /// Emit a descriptor for every match, not just the first
        #[arg(long)]
        all: bool,

        /// Print full JSON descriptors instead of SEQL lines
        #[arg(long)]
        json: bool,
    },

    /// Resolve a SEQL line against a document
    Resolve {
        /// Input HTML file (use '-' for stdin)
        #[arg(value_name = "FILE")]
        input: String,

        /// The SEQL line to resolve
        #[arg(value_name = "SEQL")]
        descriptor: String,

        /// Reject degraded fallback matches
        #[arg(long)]
        strict: bool,

        /// Treat ambiguous results as failures (for CI)
        #[arg(long)]
        unique: bool,
    },

    /// Print the CSS selector synthesized from a SEQL line
    Selector {
        /// The SEQL line to translate
        #[arg(value_name = "SEQL")]
        descriptor: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Generate {
            input,
            select,
            all,
            json,
        } => {
            let html = read_input(&input)?;
            let doc = Html::parse_document(&html);
            let selector = Selector::parse(&select)
                .map_err(|e| format!("invalid selector `{select}`: {e}"))?;

            let targets: Vec<_> = if all {
                doc.select(&selector).collect()
            } else {
                doc.select(&selector).take(1).collect()
            };
            if targets.is_empty() {
                eprintln!("no element matches `{select}`");
                return Ok(ExitCode::from(1));
            }

            let eids = generate_eid_batch(&targets, &GenerateOptions::default());
            for eid in eids.into_iter().flatten() {
                if json {
                    println!("{}", serde_json::to_string_pretty(&eid)?);
                } else {
                    println!("{}", to_seql(&eid));
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Resolve {
            input,
            descriptor,
            strict,
            unique,
        } => {
            let html = read_input(&input)?;
            let doc = Html::parse_document(&html);
            let eid = parse_seql(&descriptor)?;

            let opts = ResolveOptions {
                strict_mode: strict,
                require_uniqueness: unique,
                ..Default::default()
            };
            let result = resolve(&eid, ResolveRoot::Document(&doc), &opts);

            println!("status: {}", result.status);
            println!("confidence: {:.2}", result.confidence);
            for element in &result.elements {
                println!("match: {}", snippet(&element.html()));
            }
            for warning in &result.warnings {
                eprintln!("warning: {warning}");
            }

            Ok(match result.status {
                ResolveStatus::Success | ResolveStatus::Ambiguous => ExitCode::SUCCESS,
                ResolveStatus::DegradedFallback => ExitCode::SUCCESS,
                ResolveStatus::Error => ExitCode::from(1),
            })
        }

        Commands::Selector { descriptor } => {
            let eid = parse_seql(&descriptor)?;
            let built = build_selector(&eid, &BuildOptions::default());
            println!("{}", built.selector);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_input(path: &str) -> io::Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        fs::read_to_string(path)
    }
}

/// First line of an element's outer HTML, capped for terminal output.
fn snippet(html: &str) -> String {
    let line = html.lines().next().unwrap_or(html);
    if line.chars().count() > 120 {
        let mut out: String = line.chars().take(120).collect();
        out.push('…');
        out
    } else {
        line.to_string()
    }
}
