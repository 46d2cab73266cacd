// payreport - backup payment method resolution reports

mod exit_codes;
mod report;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};

use exit_codes::{
    retry_exit_code, retry_hint, EXIT_ERROR, EXIT_REPORT_IO, EXIT_SUCCESS, EXIT_USAGE,
};
use payreport_retry::RetryError;

#[derive(Parser)]
#[command(name = "payreport")]
#[command(about = "Find failed payments that were rescued by a backup payment method")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Output flags shared by every report-producing command.
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Also write the "All Payments (Detail)" sheet
    #[arg(long)]
    pub include_detail: bool,

    /// Print the full report as JSON to stdout
    #[arg(long)]
    pub json: bool,

    /// Write the full report as JSON to a file
    #[arg(long, value_name = "PATH")]
    pub json_output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a report from a TOML config file
    #[command(after_help = "\
Examples:
  payreport run december.report.toml
  payreport run december.report.toml --include-detail
  payreport run december.report.toml --json > report.json
  payreport run december.report.toml -o out/december.xlsx")]
    Run {
        /// Path to the .report.toml config file
        config: PathBuf,

        /// Workbook path (overrides output.file in the config)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Validate a report config without running it
    #[command(after_help = "\
Examples:
  payreport validate december.report.toml")]
    Validate {
        /// Path to the .report.toml config file
        config: PathBuf,
    },

    /// Report on a Stripe payments CSV export (grouped by email + description)
    #[command(after_help = "\
Examples:
  payreport csv -i payments.csv
  payreport csv -i payments.csv -o december.xlsx --encoding latin1")]
    Csv {
        /// Payments export to read
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Workbook to write
        #[arg(long, short = 'o', default_value = payreport_retry::config::DEFAULT_REPORT_FILE)]
        output: PathBuf,

        /// Input encoding label (utf-8, latin1, windows-1252, ...)
        #[arg(long)]
        encoding: Option<String>,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Report on the payments table of a SQLite database over [start, end)
    #[command(after_help = "\
Examples:
  payreport db --database payments.db --start 2025-12-01 --end 2026-01-01
  PAYREPORT_DATABASE=payments.db payreport db --start '2025-12-01 00:00:00' --end 2026-01-01")]
    Db {
        /// SQLite database file
        #[arg(long, env = "PAYREPORT_DATABASE")]
        database: PathBuf,

        /// Inclusive range start
        #[arg(long)]
        start: String,

        /// Exclusive range end
        #[arg(long)]
        end: String,

        /// Payments table name
        #[arg(long, default_value = "payments")]
        table: String,

        /// Workbook to write (default: backup_payment_methods_{start}_to_{end}.xlsx)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[command(flatten)]
        out: OutputArgs,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  payreport-retry ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, output, out } => report::cmd_run(config, output, out),
        Commands::Validate { config } => report::cmd_validate(config),
        Commands::Csv {
            input,
            output,
            encoding,
            out,
        } => report::cmd_csv(input, output, encoding, out),
        Commands::Db {
            database,
            start,
            end,
            table,
            output,
            out,
        } => report::cmd_db(database, start, end, table, output, out),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_REPORT_IO, message: msg.into(), hint: None }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<RetryError> for CliError {
    fn from(err: RetryError) -> Self {
        Self {
            code: retry_exit_code(&err),
            hint: retry_hint(&err).map(String::from),
            message: err.to_string(),
        }
    }
}
