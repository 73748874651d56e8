use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use parity_cli::{
    compiled_backends, init_project, render_report_lines, BackendFactory, InitProjectInput,
};
use parity_core::contract::load_contract;
use parity_core::fixture::{format_timestamp, TIMESTAMP_FORMAT};
use parity_core::hash::{hash_string, hash_string_sequence};
use parity_core::pipeline::{compare_models, process_models, BatchReport, RunMode};
use parity_core::{LocalAssetStore, ParityConfig};

#[derive(Parser)]
#[command(
    name = "parity-cli",
    version,
    about = "Tokenizer parity manifests, fixtures and fingerprints"
)]
struct Cli {
    /// Config file (default: parity.toml; defaults apply when it is missing)
    #[arg(long, global = true, value_name = "PATH", default_value = "parity.toml")]
    config: PathBuf,

    /// Log filter for stderr output (RUST_LOG syntax)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold parity.toml, a starter contract and the data root
    Init(InitArgs),
    /// Print canonical fingerprints
    Hash(HashArgs),
    /// Validate the shared contract
    Contract(ContractArgs),
    /// Reconcile or compare validation manifests
    Manifest(ManifestArgs),
    /// Regenerate benchmark fixtures
    Fixture(FixtureArgs),
}

#[derive(Parser)]
struct InitArgs {
    /// Root directory to initialize (default: current directory)
    #[arg(value_name = "PATH", default_value = ".")]
    path: PathBuf,

    /// Output JSON instead of key=value lines
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct HashArgs {
    #[command(subcommand)]
    command: HashCommands,
}

#[derive(Subcommand)]
enum HashCommands {
    /// Fingerprint one string
    Text {
        text: String,
    },
    /// Fingerprint an ordered sequence of strings
    Texts {
        #[arg(num_args = 0..)]
        texts: Vec<String>,
    },
}

#[derive(Parser)]
struct ContractArgs {
    #[command(subcommand)]
    command: ContractCommands,
}

#[derive(Subcommand)]
enum ContractCommands {
    Check(ContractCheckArgs),
}

#[derive(Parser)]
struct ContractCheckArgs {
    /// Backend target to filter cases by (e.g. huggingface)
    #[arg(long)]
    target: String,

    /// Contract path (default: from config)
    #[arg(long, value_name = "PATH")]
    contract: Option<PathBuf>,

    /// Output JSON instead of key=value lines
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct ManifestArgs {
    #[command(subcommand)]
    command: ManifestCommands,
}

#[derive(Subcommand)]
enum ManifestCommands {
    /// Run the contract and write manifests that changed
    Update(ManifestRunArgs),
    /// Run the contract and fail when a manifest would change
    Check(ManifestRunArgs),
    /// Compare two snapshots already stored in each manifest
    Compare(ManifestCompareArgs),
}

#[derive(Parser)]
struct ManifestRunArgs {
    /// Model ids to process (repeatable; default: all configured models)
    #[arg(long = "model", value_name = "ID")]
    models: Vec<String>,

    /// Snapshot name to write under (default: from config)
    #[arg(long)]
    snapshot: Option<String>,

    /// Output JSON instead of key=value lines
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct ManifestCompareArgs {
    #[arg(long)]
    left: String,

    #[arg(long)]
    right: String,

    /// Model ids to compare (repeatable; default: all configured models)
    #[arg(long = "model", value_name = "ID")]
    models: Vec<String>,

    /// Output JSON instead of key=value lines
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct FixtureArgs {
    #[command(subcommand)]
    command: FixtureCommands,
}

#[derive(Subcommand)]
enum FixtureCommands {
    Generate(FixtureGenerateArgs),
}

#[derive(Parser)]
struct FixtureGenerateArgs {
    /// Model ids to process (repeatable; default: all configured models)
    #[arg(long = "model", value_name = "ID")]
    models: Vec<String>,

    /// Pin the generatedAt timestamp (format: 2024-01-31T12:00:00Z)
    #[arg(long, value_name = "TIMESTAMP")]
    generated_at: Option<String>,

    /// Output JSON instead of key=value lines
    #[arg(long)]
    json: bool,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    debug!(backends = ?compiled_backends(), "parity-cli starting");

    let config_path = cli.config;
    let result = match cli.command {
        Commands::Init(args) => run_init(args),
        Commands::Hash(args) => match args.command {
            HashCommands::Text { text } => {
                println!("{}", hash_string(&text));
                Ok(())
            }
            HashCommands::Texts { texts } => {
                println!("{}", hash_string_sequence(&texts));
                Ok(())
            }
        },
        Commands::Contract(args) => match args.command {
            ContractCommands::Check(check) => run_contract_check(check, &config_path),
        },
        Commands::Manifest(args) => match args.command {
            ManifestCommands::Update(run) => {
                run_manifest(run, &config_path, RunMode::UpdateManifest)
            }
            ManifestCommands::Check(run) => run_manifest(run, &config_path, RunMode::CheckManifest),
            ManifestCommands::Compare(cmp) => run_manifest_compare(cmp, &config_path),
        },
        Commands::Fixture(args) => match args.command {
            FixtureCommands::Generate(generate) => run_fixture_generate(generate, &config_path),
        },
    };

    if let Err(err) = result {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn load_config(path: &Path) -> Result<ParityConfig, String> {
    let config = ParityConfig::load(path).map_err(|err| err.to_string())?;
    match &config.source {
        Some(source) => info!(path = %source.display(), models = config.models.len(), "config loaded"),
        None => info!(path = %path.display(), "config not found; using defaults"),
    }
    Ok(config)
}

fn run_init(args: InitArgs) -> Result<(), String> {
    let out = init_project(InitProjectInput {
        root: args.path.clone(),
    })
    .map_err(|err| err.to_string())?;

    if args.json {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "root": out.root,
            "created": out.created,
            "existing": out.existing,
            "next": ["parity-cli contract check --target huggingface", "parity-cli manifest update"]
        }))
        .map_err(|err| format!("json encode: {}", err))?;
        println!("{}", json);
    } else {
        println!("init_root={}", out.root.display());
        println!("created={}", out.created.len());
        for item in &out.created {
            println!("created_item={}", item);
        }
        println!("existing={}", out.existing.len());
        for item in &out.existing {
            println!("existing_item={}", item);
        }
        println!();
        println!("Next:");
        println!("  add [[models]] entries to parity.toml");
        println!("  parity-cli contract check --target huggingface");
        println!("  parity-cli manifest update");
    }
    Ok(())
}

fn run_contract_check(args: ContractCheckArgs, config_path: &Path) -> Result<(), String> {
    let contract_path = match args.contract {
        Some(path) => path,
        None => load_config(config_path)?.contract_path,
    };
    let contract = load_contract(&contract_path, &args.target).map_err(|err| err.to_string())?;

    if args.json {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "contract": contract.location,
            "sha256": contract.sha256,
            "target": args.target,
            "total_cases": contract.total_cases,
            "applicable_cases": contract.case_ids(),
        }))
        .map_err(|err| format!("json encode: {}", err))?;
        println!("{}", json);
    } else {
        println!("contract={}", contract.location);
        println!("sha256={}", contract.sha256);
        println!("target={}", args.target);
        println!("total_cases={}", contract.total_cases);
        println!("applicable_cases={}", contract.cases.len());
        for id in contract.case_ids() {
            println!("case={}", id);
        }
    }
    Ok(())
}

fn run_manifest(
    args: ManifestRunArgs,
    config_path: &Path,
    mode: RunMode,
) -> Result<(), String> {
    let mut config = load_config(config_path)?;
    if let Some(snapshot) = args.snapshot {
        if snapshot.trim().is_empty() {
            return Err("--snapshot must not be empty".to_string());
        }
        config.manifest.snapshot = snapshot;
    }
    let models = config
        .select_models(&args.models)
        .map_err(|err| err.to_string())?;
    if models.is_empty() {
        return Err("no models configured".to_string());
    }

    let store = LocalAssetStore::from_config(&config);
    let factory = BackendFactory::from_config(&config);
    let report = process_models(&config, &models, &mode, &store, &factory)
        .map_err(|err| err.to_string())?;
    finish(&report, args.json)
}

fn run_manifest_compare(args: ManifestCompareArgs, config_path: &Path) -> Result<(), String> {
    let config = load_config(config_path)?;
    let models = config
        .select_models(&args.models)
        .map_err(|err| err.to_string())?;
    if models.is_empty() {
        return Err("no models configured".to_string());
    }
    let report = compare_models(&config, &models, &args.left, &args.right);
    finish(&report, args.json)
}

fn run_fixture_generate(args: FixtureGenerateArgs, config_path: &Path) -> Result<(), String> {
    let generated_at = match args.generated_at {
        Some(value) => {
            NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT).map_err(|err| {
                format!(
                    "--generated-at '{}' does not match {}: {}",
                    value, TIMESTAMP_FORMAT, err
                )
            })?;
            value
        }
        None => format_timestamp(Utc::now()),
    };

    let config = load_config(config_path)?;
    let models = config
        .select_models(&args.models)
        .map_err(|err| err.to_string())?;
    if models.is_empty() {
        return Err("no models configured".to_string());
    }

    let store = LocalAssetStore::from_config(&config);
    let factory = BackendFactory::from_config(&config);
    let report = process_models(
        &config,
        &models,
        &RunMode::Fixture { generated_at },
        &store,
        &factory,
    )
    .map_err(|err| err.to_string())?;
    finish(&report, args.json)
}

fn finish(report: &BatchReport, json: bool) -> Result<(), String> {
    if json {
        let out =
            serde_json::to_string_pretty(report).map_err(|err| format!("json encode: {}", err))?;
        println!("{}", out);
    } else {
        for line in render_report_lines(report) {
            println!("{}", line);
        }
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(format!(
            "{} model(s) failed, {} drifted",
            report.failed(),
            report.drifted()
        ))
    }
}
