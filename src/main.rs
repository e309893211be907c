//! tabledump - concurrent MySQL exporter
//!
//! Exports every base table of a database into one SQL file, a bounded
//! number of tables at a time.
//!
//! # Usage
//!
//! ```bash
//! tabledump --database shop -u backup -p secret --chunk-size 8 -o shop.sql
//! ```

use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use tabledump::cli::CliInterface;
use tabledump::error::{DumpError, Result, describe_error};
use tabledump::export::{ExportSettings, ExportSummary, export_database};

/// Exit status of a fatal error
const EXIT_FAILURE: i32 = 1;

/// Exit status of a completed run with marked table failures
const EXIT_PARTIAL: i32 = 2;

/// Application entry point
#[tokio::main]
async fn main() {
    let cli = match CliInterface::new() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    initialize_logging(&cli);

    let code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            report_error(&cli, &e);
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

/// Main application logic
///
/// 1. Handle subcommands (version, completion, config)
/// 2. Validate the effective configuration
/// 3. Export the database, cancelling on Ctrl+C
/// 4. Print the summary
///
/// # Returns
/// * `Result<i32>` - Process exit status or error
async fn run(cli: &CliInterface) -> Result<i32> {
    if cli.handle_subcommand()? {
        return Ok(0);
    }

    let config = cli.config();
    config.validate()?;

    let params = cli.connection_params()?;
    let settings = ExportSettings::from_config(config, &params)?;
    let output_path = config.output_path();
    cli.print_banner(&params.display_target(), &output_path);

    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => token.cancel(),
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    });

    let result = export_database(&params, &settings, &output_path, Some(cancel_token)).await;
    ctrl_c_handle.abort();
    let summary = result?;

    print_summary(cli, &summary)?;

    if summary.tables_failed.is_empty() {
        Ok(0)
    } else {
        Ok(EXIT_PARTIAL)
    }
}

/// Print the run summary as text or JSON
fn print_summary(cli: &CliInterface, summary: &ExportSummary) -> Result<()> {
    if cli.json() {
        let json = serde_json::to_string(summary).map_err(|e| DumpError::Generic(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }

    if cli.args().quiet {
        return Ok(());
    }

    println!(
        "Exported {} tables ({} rows, {} bytes) to {} in {} ms",
        summary.tables_exported,
        summary.rows_exported,
        summary.bytes_written,
        summary.output_path.display(),
        summary.elapsed_ms
    );
    if !summary.tables_failed.is_empty() {
        println!(
            "Failed tables ({}): {}",
            summary.tables_failed.len(),
            summary.tables_failed.join(", ")
        );
    }
    Ok(())
}

/// Print a fatal error, structured when `--json` is set
fn report_error(cli: &CliInterface, error: &DumpError) {
    if cli.json() {
        if let Ok(json) = describe_error(error).to_json_compact() {
            eprintln!("{}", json);
            return;
        }
    }
    eprintln!("Error: {}", error);
}

/// Initialize logging system based on verbosity level
///
/// `RUST_LOG`, when set, replaces the configured level.
///
/// # Arguments
/// * `cli` - CLI interface with verbosity settings
fn initialize_logging(cli: &CliInterface) {
    let level: Level = cli.config().logging.level.to_tracing_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
