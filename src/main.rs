// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use docx_relink::utils::logging::{format_error, format_info, format_success, format_warning};
use docx_relink::{
    BackupManager, BatchScheduler, CancellationFlag, Config, Document, DocumentScanner,
    DocxPackage, ExportFormat, HyperlinkExtractor, MetadataClient, ProcessingContext,
    ProcessingOrchestrator, ProgressTracker, UndoSession, Validator, exporter_for,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "docx_relink")]
#[command(author = "cipher")]
#[command(version = "0.1.0")]
#[command(about = "Validate and rewrite hyperlinks in word-processing documents", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up, resolve and rewrite every document found under the given paths
    Process {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(long, value_name = "NUM")]
        concurrency: Option<usize>,

        /// Where to write the undo session (default: <backup dir>/sessions/<id>.json)
        #[arg(long, value_name = "FILE")]
        session: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        export_json: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        export_csv: Option<PathBuf>,
    },

    /// List the hyperlinks of one document without modifying it
    Extract { file: PathBuf },

    /// Run the pre-processing checks only
    Validate {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Restore every file recorded in an undo session
    Revert {
        #[arg(long, value_name = "FILE")]
        session: PathBuf,
    },

    /// Delete backups older than the retention period
    Cleanup {
        #[arg(long, value_name = "DAYS")]
        retention_days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    docx_relink::utils::logging::init_logger(cli.color, cli.verbose);
    colored::control::set_override(cli.color);

    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::default_config()
    };

    match cli.command {
        Commands::Process {
            paths,
            concurrency,
            session,
            export_json,
            export_csv,
        } => {
            let exports = [
                (ExportFormat::Json, export_json),
                (ExportFormat::Csv, export_csv),
            ];
            cmd_process(config, &paths, concurrency, session, exports, cli.color).await?;
        }
        Commands::Extract { file } => {
            cmd_extract(&config, &file)?;
        }
        Commands::Validate { paths } => {
            cmd_validate(&config, &paths)?;
        }
        Commands::Revert { session } => {
            cmd_revert(&config, &session).await?;
        }
        Commands::Cleanup { retention_days } => {
            cmd_cleanup(&config, retention_days)?;
        }
    }

    Ok(())
}

async fn cmd_process(
    config: Config,
    paths: &[PathBuf],
    concurrency: Option<usize>,
    session_path: Option<PathBuf>,
    exports: [(ExportFormat, Option<PathBuf>); 2],
    color: bool,
) -> Result<()> {
    let start_time = Instant::now();

    let files = DocumentScanner::new()
        .scan(paths)
        .context("Failed to discover documents")?;
    if files.is_empty() {
        println!("{}", format_warning("No documents found"));
        return Ok(());
    }

    let concurrency = concurrency.unwrap_or(config.processing.max_concurrent_documents);
    let backup_dir = config.backup.directory.clone();

    let client = MetadataClient::new(config.api.clone()).context("Failed to create metadata client")?;
    let cancel = CancellationFlag::new();
    let context = ProcessingContext::new(config, Arc::new(client))
        .context("Failed to prepare processing context")?
        .with_cancellation(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling after in-flight documents are restored");
            cancel.cancel();
        }
    });

    let tracker = Arc::new(ProgressTracker::with_color(files.len(), color));
    let scheduler =
        BatchScheduler::new(ProcessingOrchestrator::new(context)).with_tracker(tracker.clone());

    let documents: Vec<Document> = files.into_iter().map(Document::new).collect();
    let batch = scheduler.process_batch(documents, concurrency).await;
    tracker.finish();

    for result in batch.results.iter().filter(|r| !r.success()) {
        let reason = result.error.as_deref().unwrap_or("unknown error");
        println!(
            "{}",
            format_error(&format!(
                "{} ({:?}): {}",
                result.file_path.display(),
                result.outcome,
                reason
            ))
        );
    }

    if !batch.session.is_empty() {
        let session_path = session_path.unwrap_or_else(|| {
            backup_dir
                .join("sessions")
                .join(format!("{}.json", batch.session.id))
        });
        batch
            .session
            .save(&session_path)
            .await
            .context("Failed to write undo session")?;
        println!(
            "{}",
            format_info(&format!("Undo session written to {}", session_path.display()))
        );
    }

    for (format, output) in exports {
        let Some(output) = output else { continue };
        let manifest = exporter_for(format)?
            .export(&batch.documents, &batch.results, &output)
            .with_context(|| format!("Failed to export {} results", format))?;
        println!(
            "{}",
            format_info(&format!(
                "Exported {} documents to {}",
                manifest.total_documents,
                manifest.output.display()
            ))
        );
    }

    let stats = &batch.stats;
    let summary = format!(
        "{} documents in {:.2}s: {} succeeded, {} failed ({} restored), {} cancelled",
        stats.total,
        start_time.elapsed().as_secs_f64(),
        stats.succeeded,
        stats.failed,
        stats.recovered,
        stats.cancelled
    );
    if stats.failed == 0 && stats.cancelled == 0 {
        println!("{}", format_success(&summary));
    } else {
        println!("{}", format_warning(&summary));
    }

    Ok(())
}

fn cmd_extract(config: &Config, file: &Path) -> Result<()> {
    Validator::validate_document(file, config.processing.max_file_size_bytes())?;

    let extractor = HyperlinkExtractor::with_pattern(&config.extraction.lookup_id_pattern)?;
    let package = DocxPackage::open(file).context("Failed to open document")?;
    let extraction = extractor.extract(&package);

    println!("\nHyperlinks in {}\n", file.display());
    println!("{}", "=".repeat(80));
    for (idx, link) in extraction.all_hyperlinks().enumerate() {
        println!(
            "\n{}. {:?} [{:?}]",
            idx + 1,
            link.display_text,
            link.status
        );
        println!("   Target: {}", link.full_target());
        println!(
            "   Location: {} #{}{}",
            link.location.part_name,
            link.location.ordinal,
            if link.location.in_text_box { " (text box)" } else { "" }
        );
        if let Some(lookup_id) = &link.lookup_id {
            println!("   Lookup ID: {}", lookup_id);
        }
        if let Some(content_id) = &link.content_id {
            println!("   Content ID: {}", content_id);
        }
    }

    let stats = &extraction.stats;
    println!("\n{}", "=".repeat(80));
    println!(
        "Total: {} | Visible: {} | Invisible: {} | In text boxes: {}",
        stats.total, stats.visible, stats.invisible, stats.in_text_boxes
    );
    println!(
        "With lookup ID: {} ({} unique) | With content ID: {} | With status marker: {}",
        stats.with_lookup_id, stats.unique_lookup_ids, stats.with_content_id, stats.with_status_marker
    );
    for (part, count) in &stats.by_part {
        println!("  {}: {}", part, count);
    }

    Ok(())
}

fn cmd_validate(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let files = DocumentScanner::new()
        .scan(paths)
        .context("Failed to discover documents")?;
    let max_bytes = config.processing.max_file_size_bytes();

    let mut invalid = 0;
    for file in &files {
        match Validator::validate_document(file, max_bytes) {
            Ok(validation) => println!(
                "{}",
                format_success(&format!(
                    "{} ({} bytes)",
                    file.display(),
                    validation.file_size
                ))
            ),
            Err(e) => {
                invalid += 1;
                println!("{}", format_error(&format!("{}: {}", file.display(), e)));
            }
        }
    }

    info!("{} of {} documents valid", files.len() - invalid, files.len());
    if invalid > 0 {
        return Err(anyhow::anyhow!("{} documents failed validation", invalid));
    }
    Ok(())
}

async fn cmd_revert(config: &Config, session_path: &Path) -> Result<()> {
    let session = UndoSession::load(session_path)
        .await
        .context("Failed to load undo session")?;
    info!(
        "Reverting session {} ({} files)",
        session.id,
        session.len()
    );

    let manager = BackupManager::new(config.backup.directory.clone());
    let report = tokio::task::spawn_blocking(move || session.revert(&manager))
        .await
        .context("Revert task failed")?;

    for restored in &report.restored {
        println!(
            "{}",
            format_success(&format!("Restored {}", restored.target_path.display()))
        );
    }
    for (path, reason) in &report.failed {
        error!("Failed to restore {}: {}", path.display(), reason);
        println!("{}", format_error(&format!("{}: {}", path.display(), reason)));
    }

    if !report.is_complete() {
        return Err(anyhow::anyhow!(
            "{} files could not be restored",
            report.failed.len()
        ));
    }
    Ok(())
}

fn cmd_cleanup(config: &Config, retention_days: Option<u32>) -> Result<()> {
    let retention_days = retention_days.unwrap_or(config.backup.retention_days);
    let manager = BackupManager::new(config.backup.directory.clone());

    let result = manager.cleanup(retention_days);
    for (path, reason) in &result.failed {
        println!("{}", format_error(&format!("{}: {}", path.display(), reason)));
    }
    println!(
        "{}",
        format_success(&format!(
            "Deleted {} backups older than {} days ({} bytes freed)",
            result.deleted.len(), retention_days, result.bytes_freed
        ))
    );
    Ok(())
}
