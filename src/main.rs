use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use ans_expenses::config::{Config, DEFAULT_CONFIG_PATH};
use ans_expenses::constants::METRICS_SNAPSHOT_FILE;
use ans_expenses::infra::{FileRegistrySource, FsArtifactStore, FsSourceFiles};
use ans_expenses::logging;
use ans_expenses::observability;
use ans_expenses::pipeline::processing::quality_gate::is_valid_cnpj;
use ans_expenses::pipeline::{PipelineConfig, PipelineOrchestrator, RunOutcome};

#[derive(Parser)]
#[command(name = "ans_expenses")]
#[command(about = "Consolidates and aggregates ANS operator expense statements")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the expense pipeline over the extracted quarter folders
    Run {
        /// TOML configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Root of the YYYY_QT folder tree
        #[arg(long)]
        extracted_dir: Option<PathBuf>,
        /// Operator registry file
        #[arg(long)]
        registry: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Quarter labels to process (comma-separated), e.g. 2025_1T,2025_2T
        #[arg(long, value_delimiter = ',')]
        quarters: Option<Vec<String>>,
        /// Process the latest N quarters present on disk
        #[arg(long)]
        latest: Option<usize>,
        /// Delete the consolidated artifact first so it is rebuilt
        #[arg(long)]
        force: bool,
    },
    /// Check a CNPJ against its check digits
    CheckCnpj {
        value: String,
    },
}

struct RunArgs {
    config: PathBuf,
    extracted_dir: Option<PathBuf>,
    registry: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    quarters: Option<Vec<String>>,
    latest: Option<usize>,
    force: bool,
}

fn resolve_config(args: &RunArgs) -> anyhow::Result<Config> {
    let mut config = Config::load(&args.config)?;
    config.apply_env_overrides()?;

    if let Some(dir) = &args.extracted_dir {
        config.paths.extracted_dir = dir.clone();
    }
    if let Some(file) = &args.registry {
        config.paths.registry_file = file.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.paths.output_dir = dir.clone();
    }
    if let Some(quarters) = &args.quarters {
        config.run.quarters = quarters.clone();
    }
    if let Some(latest) = args.latest {
        config.run.latest_quarters = latest;
        // An explicit --latest overrides labels coming from the file
        if args.quarters.is_none() {
            config.run.quarters.clear();
        }
    }

    config.validate()?;
    Ok(config)
}

async fn run(config: Config, force: bool) -> anyhow::Result<RunOutcome> {
    let store = Arc::new(FsArtifactStore::new(&config.paths.output_dir));
    let orchestrator = PipelineOrchestrator::new(
        Arc::new(FsSourceFiles::new(&config.paths.extracted_dir)),
        Arc::new(FileRegistrySource::new(&config.paths.registry_file)),
        store.clone(),
    );

    if force {
        orchestrator.clear_consolidated().await?;
    }

    let result = orchestrator
        .run_pipeline(&PipelineConfig::default_full_pipeline(), config.selection())
        .await?;

    info!(
        "Run {} finished in {}ms",
        result.report.run_id,
        result.duration().num_milliseconds()
    );
    Ok(result.report.outcome)
}

fn write_metrics_snapshot(output_dir: &std::path::Path) {
    let Some(rendered) = observability::render() else {
        return;
    };
    let path = output_dir.join(METRICS_SNAPSHOT_FILE);
    if let Err(e) = std::fs::create_dir_all(output_dir).and_then(|_| std::fs::write(&path, rendered)) {
        warn!("Could not write metrics snapshot {}: {}", path.display(), e);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckCnpj { value } => {
            if is_valid_cnpj(&value) {
                println!("{} is a valid CNPJ", value);
                ExitCode::SUCCESS
            } else {
                println!("{} is not a valid CNPJ", value);
                ExitCode::FAILURE
            }
        }
        Commands::Run {
            config,
            extracted_dir,
            registry,
            output_dir,
            quarters,
            latest,
            force,
        } => {
            let args = RunArgs {
                config,
                extracted_dir,
                registry,
                output_dir,
                quarters,
                latest,
                force,
            };
            let config = match resolve_config(&args) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Invalid configuration: {:#}", e);
                    return ExitCode::FAILURE;
                }
            };

            logging::init_logging(&config.logging.log_dir);
            if let Err(e) = observability::init() {
                warn!("Metrics disabled: {}", e);
            }

            let output_dir = config.paths.output_dir.clone();
            let outcome = run(config, args.force).await;
            write_metrics_snapshot(&output_dir);

            match outcome {
                Ok(RunOutcome::Completed) => {
                    println!("Pipeline completed; artifacts in {}", output_dir.display());
                    ExitCode::SUCCESS
                }
                Ok(RunOutcome::NothingToProcess { stage }) => {
                    println!("Nothing to process (stopped after {})", stage);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("Pipeline failed: {:#}", e);
                    eprintln!("Pipeline failed: {:#}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
