//! auditscore CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "auditscore", version, about = "Audit checklist scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score audits against their forms
    Score {
        /// Path to an audit .toml file or directory
        #[arg(long)]
        audit: PathBuf,

        /// Path to a form .toml file or directory (default: forms_dir from config)
        #[arg(long)]
        forms: Option<PathBuf>,

        /// Output format: text, json, markdown
        #[arg(long)]
        format: Option<String>,

        /// Write JSON reports to this directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit code 1 if any audit failed
        #[arg(long)]
        fail_on_flag: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate form and audit TOML files
    Validate {
        /// Path to a form file or directory
        #[arg(long)]
        forms: PathBuf,

        /// Path to an audit file or directory to check against the forms
        #[arg(long)]
        audit: Option<PathBuf>,
    },

    /// Compare two audit reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Minimum change in percentage points to report
        #[arg(long, default_value = "0.5")]
        threshold: f64,

        /// Exit code 1 if regressions found
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config, example form and example audit
    Init,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("auditscore=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Score {
            audit,
            forms,
            format,
            output,
            fail_on_flag,
            config,
        } => commands::score::execute(audit, forms, format, output, fail_on_flag, config),
        Commands::Validate { forms, audit } => commands::validate::execute(forms, audit),
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_regression, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
