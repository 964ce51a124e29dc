use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use underwrite_rs::sandbox::{EvalLimits, EvaluationContext, Sandbox};
use underwrite_rs::underwrite::rules::{RuleLoader, RuleRunner};
use underwrite_rs::underwrite::{server, EngineConfig, UnderwriteError};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Largest collection a condition may build or consume
    #[arg(long, global = true)]
    max_collection_len: Option<usize>,

    /// Deepest expression nesting the parser accepts
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a rule set against an applicant payload
    Evaluate {
        /// Path to the applicant JSON payload
        #[arg(short, long)]
        payload: PathBuf,

        /// Path to the rule set (defaults to UW_RULES_PATH)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse every condition in a rule set without evaluating it
    Check {
        /// Path to the rule set (defaults to UW_RULES_PATH)
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
    /// Evaluate a single expression
    Eval {
        /// The condition to evaluate
        #[arg(short, long)]
        expr: String,

        /// JSON object of variables
        #[arg(short, long)]
        context: Option<String>,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    run(Args::parse()).await?;
    Ok(())
}

async fn run(args: Args) -> Result<(), UnderwriteError> {
    let mut config = EngineConfig::from_env()?;
    if args.max_collection_len.is_some() || args.max_depth.is_some() {
        config.limits = EvalLimits::new(
            args.max_collection_len.unwrap_or(config.limits.max_collection_len),
            args.max_depth.unwrap_or(config.limits.max_depth),
        );
    }

    match args.command {
        Commands::Evaluate {
            payload,
            rules,
            json,
        } => {
            let content = fs::read_to_string(&payload)?;
            let payload: Value = serde_json::from_str(&content)?;
            let rules_path = rules.unwrap_or(config.rules_path);

            let runner = RuleRunner::new(config.limits);
            let report = runner.evaluate_rules(&payload, rules_path.as_path())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render_text());
            }
        }
        Commands::Check { rules } => {
            let rules_path = rules.unwrap_or(config.rules_path);
            let rule_set = RuleLoader::new().load_rules(&rules_path)?;
            let problems = RuleRunner::new(config.limits).check_rule_set(&rule_set);

            if problems.is_empty() {
                println!(
                    "{}: {} rules OK (version {})",
                    rules_path.display(),
                    rule_set.len(),
                    rule_set.version
                );
            } else {
                for (id, err) in &problems {
                    println!("{}: {}", id, err);
                }
                return Err(UnderwriteError::other(format!(
                    "{} of {} conditions are malformed",
                    problems.len(),
                    rule_set.len()
                )));
            }
        }
        Commands::Eval { expr, context } => {
            let ctx = match context {
                Some(raw) => match serde_json::from_str::<Value>(&raw)? {
                    Value::Object(map) => EvaluationContext::from_json(map),
                    _ => return Err(UnderwriteError::config("--context must be a JSON object")),
                },
                None => EvaluationContext::default(),
            };
            let value = Sandbox::new(config.limits).evaluate(&expr, &ctx)?;
            println!("{}", value);
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            server::serve(config).await?;
        }
    }

    Ok(())
}
