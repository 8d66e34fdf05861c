use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use schemars::schema_for;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use topic_helper_annotator::{parse_url_context, AnnotatorConfig};
use topic_helper_lookup::fixture::FixtureTransport;
use topic_helper_lookup::{LookupClient, ReqwestTransport, Transport};
use topic_helper_protocol::{serialize_json, serialize_json_pretty, BadgeReport};

mod scenario;

pub use scenario::{run_scenario, NavigateMode, ReplayOutput, Scenario, Step};

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serialize_json_pretty(value)?
    } else {
        serialize_json(value)?
    };
    print_stdout(&text)
}

#[derive(Parser)]
#[command(name = "topic-helper")]
#[command(about = "Annotate topic pages with their topic ids", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(long, global = true)]
    quiet: bool,

    /// TOML configuration file (TOPIC_HELPER_* variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted host session and print the final badge report
    Replay(ReplayArgs),

    /// Print the topic context parsed from a page URL
    #[command(name = "url-context")]
    UrlContext(UrlContextArgs),

    /// Fetch the child topics of a multi-topic id
    Lookup(LookupArgs),

    /// Print JSON schemas for scenarios and badge reports
    Schema,
}

#[derive(Args)]
struct ReplayArgs {
    /// Scenario JSON file
    scenario: PathBuf,

    /// JSON object mapping lookup URLs to payloads, merged over the scenario's own
    #[arg(long)]
    lookup_fixtures: Option<PathBuf>,

    /// Send lookups to the real endpoints instead of fixtures
    #[arg(long, conflicts_with = "lookup_fixtures")]
    live: bool,
}

#[derive(Args)]
struct UrlContextArgs {
    url: String,
}

#[derive(Args)]
struct LookupArgs {
    topic_id: String,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay(args) => run_replay(args, config, cli.pretty).await?,
        Commands::UrlContext(args) => {
            print_json(&parse_url_context(&args.url, &config.query), cli.pretty)?;
        }
        Commands::Lookup(args) => run_lookup(args, config, cli.pretty).await?,
        Commands::Schema => print_json(&schemas(), cli.pretty)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AnnotatorConfig> {
    let mut config = match path {
        Some(path) => AnnotatorConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnnotatorConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid TOPIC_HELPER_* environment override")?;
    Ok(config)
}

async fn run_replay(args: ReplayArgs, config: AnnotatorConfig, pretty: bool) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;

    let transport: Arc<dyn Transport> = if args.live {
        Arc::new(ReqwestTransport::new(config.request_timeout())?)
    } else {
        let mut payloads = scenario.lookup_fixtures.clone();
        if let Some(path) = &args.lookup_fixtures {
            payloads.extend(load_fixtures(path)?);
        }
        Arc::new(FixtureTransport::from_payloads(&payloads))
    };

    let output = run_scenario(&scenario, transport, config).await?;
    print_json(&output, pretty)
}

fn load_fixtures(path: &Path) -> Result<HashMap<String, Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read lookup fixtures {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Lookup fixtures {} must be a JSON object", path.display()))
}

async fn run_lookup(args: LookupArgs, config: AnnotatorConfig, pretty: bool) -> Result<()> {
    let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
    let client = LookupClient::new(transport, config.endpoints.clone());
    let generation = client.generation().advance();
    let children = client
        .fetch_child_topics(&args.topic_id, generation)
        .await
        .with_context(|| format!("No endpoint returned child topics for {}", args.topic_id))?;
    print_json(children.as_ref(), pretty)
}

fn schemas() -> Value {
    json!({
        "scenario": schema_for!(Scenario),
        "report": schema_for!(BadgeReport),
    })
}
