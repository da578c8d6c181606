use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use repotrace_reasoning::ProviderKind;
use std::path::PathBuf;

mod commands;
mod config;
mod report;

use commands::{GenerateOptions, Overrides};

#[derive(Parser)]
#[command(name = "repotrace")]
#[command(about = "Turn a code repository into grounded Q&A and design-proposal datasets", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index, extract flows, synthesize, verify and emit records
    Generate(GenerateArgs),

    /// Index only and report what was found
    Index(IndexArgs),

    /// List the business flows discovered in a repository
    Flows(FlowsArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Repository root
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Feature request to produce design proposals for (repeatable)
    #[arg(long = "feature", value_name = "TEXT")]
    features: Vec<String>,

    /// Output directory for records.jsonl and manifest.json
    #[arg(long, default_value = "repotrace-out")]
    out: PathBuf,

    /// Config file (TOML, or YAML by extension); defaults to <PATH>/repotrace.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Completion provider: offline|http
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Concurrent generation requests
    #[arg(long)]
    workers: Option<usize>,

    /// Maximum business flows turned into questions
    #[arg(long)]
    max_flows: Option<usize>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct IndexArgs {
    /// Repository root
    #[arg(default_value = ".")]
    path: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct FlowsArgs {
    /// Repository root
    #[arg(default_value = ".")]
    path: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_flows: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON parsing
    let json_output = match &cli.command {
        Commands::Generate(args) => args.json,
        Commands::Index(args) => args.json,
        Commands::Flows(args) => args.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let success = match cli.command {
        Commands::Generate(args) => {
            commands::generate(GenerateOptions {
                path: args.path,
                features: args.features,
                out: args.out,
                config: args.config,
                overrides: Overrides {
                    provider: args.provider,
                    workers: args.workers,
                    max_flows: args.max_flows,
                },
                json: args.json,
            })
            .await?
        }
        Commands::Index(args) => {
            commands::index(&args.path, args.config.as_deref(), args.json).await?
        }
        Commands::Flows(args) => {
            commands::flows(&args.path, args.config.as_deref(), args.max_flows, args.json).await?
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
