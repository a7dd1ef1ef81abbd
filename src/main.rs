//! Forest census ledger command-line shell.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use forest_ledger::engine::{
    build_workspace, diff_manifests, generate_datasheet, lint_transaction, load_manifest,
    submit_transaction, DatasheetOptions,
};
use forest_ledger::error::ForestLedgerError;
use forest_ledger::ledger::Ledger;
use forest_ledger::transactions::scaffold_transaction;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Transactional ledger for a multi-year forest census")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Transaction lifecycle: scaffold, lint, and submit.
    Tx {
        #[command(subcommand)]
        command: TxCommands,
    },
    /// Rebuild a version snapshot from the ledger's transaction log.
    Build {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        workspace: PathBuf,
    },
    /// Inspect recorded version manifests.
    Versions {
        #[command(subcommand)]
        command: VersionsCommands,
    },
    /// Generate a field datasheet scaffold for one site/plot/survey.
    Datasheets {
        #[command(subcommand)]
        command: DatasheetsCommands,
    },
}

#[derive(Subcommand, Debug)]
enum TxCommands {
    /// Scaffold an empty transaction directory.
    New {
        #[arg(long = "out")]
        out: PathBuf,
        #[arg(long)]
        force: bool,
    },
    /// Validate a transaction without committing it.
    Lint {
        tx_dir: PathBuf,
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
    /// Lint, then commit a transaction into the ledger.
    Submit {
        tx_dir: PathBuf,
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        workspace: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum VersionsCommands {
    /// List every recorded version sequence number.
    List {
        #[arg(long)]
        workspace: PathBuf,
    },
    /// Show one version's manifest.
    Show {
        seq: u32,
        #[arg(long)]
        workspace: PathBuf,
    },
    /// Diff two version manifests.
    Diff {
        seq_a: u32,
        seq_b: u32,
        #[arg(long)]
        workspace: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum DatasheetsCommands {
    /// Emit `context_SITE_PLOT_SURVEY.json` for one site/plot/survey.
    Generate {
        #[arg(long = "survey")]
        survey: String,
        #[arg(long)]
        site: String,
        #[arg(long)]
        plot: String,
        #[arg(long = "out")]
        out: PathBuf,
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        workspace: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<i32, ForestLedgerError> {
    match cli.command {
        Commands::Tx { command } => run_tx(command),
        Commands::Build { config, workspace } => {
            let result = build_workspace(&config, &workspace)?;
            println!("{}", serde_json::to_string(&result).expect("BuildResult is always serializable"));
            Ok(0)
        }
        Commands::Versions { command } => run_versions(command),
        Commands::Datasheets { command } => run_datasheets(command),
    }
}

fn run_tx(command: TxCommands) -> Result<i32, ForestLedgerError> {
    match command {
        TxCommands::New { out, force } => {
            scaffold_transaction(&out, force)?;
            info!(path = %out.display(), "scaffolded empty transaction");
            Ok(0)
        }
        TxCommands::Lint {
            tx_dir,
            config,
            report,
            workspace: _workspace,
        } => {
            let lint_report = lint_transaction(&tx_dir, &config)?;
            let text =
                serde_json::to_string_pretty(&lint_report).expect("LintReport is always serializable");
            println!("{text}");
            let report_path = report.unwrap_or_else(|| tx_dir.join("lint-report.json"));
            std::fs::write(&report_path, format!("{text}\n"))?;
            Ok(if lint_report.has_errors() { 2 } else { 0 })
        }
        TxCommands::Submit {
            tx_dir,
            config,
            workspace,
        } => {
            let result = submit_transaction(&tx_dir, &config, &workspace)?;
            println!("{}", serde_json::to_string(&result).expect("SubmitResult is always serializable"));
            Ok(0)
        }
    }
}

fn run_versions(command: VersionsCommands) -> Result<i32, ForestLedgerError> {
    match command {
        VersionsCommands::List { workspace } => {
            let ledger = Ledger::new(&workspace);
            let versions = ledger.list_versions()?;
            println!("{}", serde_json::to_string(&versions).expect("version list is always serializable"));
            Ok(0)
        }
        VersionsCommands::Show { seq, workspace } => {
            let manifest = load_manifest(&workspace, seq)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&manifest).expect("VersionManifest is always serializable")
            );
            Ok(0)
        }
        VersionsCommands::Diff { seq_a, seq_b, workspace } => {
            let a = load_manifest(&workspace, seq_a)?;
            let b = load_manifest(&workspace, seq_b)?;
            let diff = diff_manifests(&a, &b);
            println!("{}", serde_json::to_string_pretty(&diff).expect("ManifestDiff is always serializable"));
            Ok(0)
        }
    }
}

fn run_datasheets(command: DatasheetsCommands) -> Result<i32, ForestLedgerError> {
    match command {
        DatasheetsCommands::Generate {
            survey,
            site,
            plot,
            out,
            config,
            workspace,
        } => {
            let options = DatasheetOptions {
                survey_id: survey,
                site,
                plot,
                output_dir: out,
            };
            let path = generate_datasheet(&config, &workspace, &options)?;
            info!(path = %path.display(), "wrote datasheet context");
            Ok(0)
        }
    }
}
