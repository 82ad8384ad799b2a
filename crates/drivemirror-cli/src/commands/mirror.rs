//! `mirror` subcommand
//!
//! Signs both accounts in, resolves the two folder paths, runs the
//! cross-account access pre-flight, drives one engine run and renders the
//! report. Temporary shares created by the pre-flight are revoked even
//! when the run fails.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;
use uuid::Uuid;

use drivemirror_core::config::Config;
use drivemirror_core::domain::{ConflictBehavior, MirrorMode};
use drivemirror_core::ports::ITreeService;
use drivemirror_engine::path::resolve_path;
use drivemirror_engine::permissions::{ensure_read_access, revoke_granted};
use drivemirror_engine::{MirrorEngine, MirrorOptions, RefreshCoordinator};
use drivemirror_graph::GraphRefresher;

use crate::commands::{connect_account, AccountSlot};
use crate::output::{get_formatter, OutputFormat};
use crate::progress::ConsoleStatusSink;

/// Mirror a source folder into a destination folder
#[derive(Args)]
pub struct MirrorCommand {
    /// Folder to mirror, as a path in the source drive (e.g. /Projects/Alpha)
    source: String,

    /// Folder in the destination drive that receives the mirrored folder;
    /// created when missing
    dest: String,

    /// Cumulative folder size (MiB) up to which a folder is copied wholesale
    #[arg(long, value_name = "MIB")]
    threshold_mb: Option<u64>,

    /// Number of concurrent traversal workers
    #[arg(long, value_name = "N")]
    traversal_concurrency: Option<usize>,

    /// Number of concurrent copy workers
    #[arg(long, value_name = "N")]
    copy_concurrency: Option<usize>,

    /// What to do when the destination already has a node of the same name
    #[arg(long, value_name = "fail|replace")]
    conflict: Option<ConflictBehavior>,

    /// Submit copies as discovered (interleaved) or after traversal (batched)
    #[arg(long, value_name = "interleaved|batched")]
    mode: Option<MirrorMode>,

    /// Seconds between polls of a pending copy without a service hint
    #[arg(long, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Treat an authorization denial after real copy progress as completion
    #[arg(long)]
    assume_complete_on_denied_progress: bool,

    /// Walk and count without creating or copying anything
    #[arg(long)]
    dry_run: bool,
}

impl MirrorCommand {
    pub async fn execute(
        &self,
        config_path: &Path,
        format: OutputFormat,
        quiet: bool,
    ) -> Result<()> {
        let out = get_formatter(format);
        let config = Config::load_or_default(config_path);

        let problems = config.validate();
        if !problems.is_empty() {
            for problem in &problems {
                out.warn(&format!("{}: {}", problem.field, problem.message));
            }
            anyhow::bail!("configuration at {} is invalid", config_path.display());
        }

        let options = self.options_from(&config);
        anyhow::ensure!(
            options.traversal_concurrency >= 1 && options.copy_concurrency >= 1,
            "concurrency must be at least 1"
        );

        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            source = %self.source,
            dest = %self.dest,
            dry_run = options.dry_run,
            "starting mirror run"
        );

        // Both interactive sign-ins happen before any tree work so the
        // prompts come out together at the start.
        let (source_service, _source_store, _source_auth) =
            connect_account(&config, AccountSlot::Source).await?;
        let (dest_service, dest_store, dest_auth) =
            connect_account(&config, AccountSlot::Dest).await?;

        let source_account = source_service.account_info().await?;
        let dest_account = dest_service.account_info().await?;
        out.info(&format!(
            "source:      {} <{}>",
            source_account.display_name, source_account.email
        ));
        out.info(&format!(
            "destination: {} <{}>",
            dest_account.display_name, dest_account.email
        ));

        let source_root = resolve_path(source_service.as_ref(), &self.source, false)
            .await
            .with_context(|| format!("resolving source folder '{}'", self.source))?;
        let dest_root = if options.dry_run {
            resolve_path(dest_service.as_ref(), &self.dest, false)
                .await
                .with_context(|| {
                    format!(
                        "destination folder '{}' does not exist; a real run would create it",
                        self.dest
                    )
                })?
        } else {
            resolve_path(dest_service.as_ref(), &self.dest, true)
                .await
                .with_context(|| format!("resolving destination folder '{}'", self.dest))?
        };

        // The run moves both root nodes into the engine.
        let source_root_id = source_root.id.clone();

        let granted = if options.dry_run {
            Vec::new()
        } else {
            ensure_read_access(source_service.as_ref(), &source_root_id, &dest_account.email)
                .await
                .context("sharing the source folder with the destination account")?
        };

        let refresher = Arc::new(GraphRefresher::new(dest_auth));
        let refresh = Arc::new(RefreshCoordinator::new(Arc::clone(&dest_store), refresher));

        let live = !quiet
            && format == OutputFormat::Human
            && std::io::stderr().is_terminal();
        let sink = Arc::new(ConsoleStatusSink::new(live));

        let engine = Arc::new(MirrorEngine::new(
            source_service.clone(),
            dest_service.clone(),
            refresh,
            sink.clone(),
            options.clone(),
        ));
        let outcome = engine.run(source_root, dest_root).await;

        sink.finish();

        // Cleanup runs regardless of how the run ended.
        if !granted.is_empty() {
            revoke_granted(source_service.as_ref(), &source_root_id, &granted).await;
        }

        let report = outcome?;

        out.print_json(&serde_json::json!({
            "run_id": run_id.to_string(),
            "dry_run": options.dry_run,
            "source": self.source,
            "dest": self.dest,
            "report": &report,
        }));

        let secs = report.duration_ms as f64 / 1000.0;
        if options.dry_run {
            out.success(&format!(
                "dry run: {} copy jobs discovered, {} folders would be created ({secs:.1}s)",
                report.jobs_total, report.folders_created
            ));
        } else {
            out.success(&format!(
                "mirrored {}/{} jobs, {} folders created ({secs:.1}s)",
                report.jobs_completed, report.jobs_total, report.folders_created
            ));
        }
        for error in &report.errors {
            out.warn(error);
        }
        if report.jobs_failed > 0 || !report.errors.is_empty() {
            anyhow::bail!(
                "run finished with {} failed jobs and {} errors",
                report.jobs_failed,
                report.errors.len()
            );
        }
        Ok(())
    }

    /// Flag overrides win over the configuration file.
    fn options_from(&self, config: &Config) -> MirrorOptions {
        let mirror = &config.mirror;
        MirrorOptions {
            traversal_concurrency: self
                .traversal_concurrency
                .unwrap_or(mirror.traversal_concurrency),
            copy_concurrency: self.copy_concurrency.unwrap_or(mirror.copy_concurrency),
            whole_folder_threshold: self
                .threshold_mb
                .unwrap_or(mirror.whole_folder_threshold_mb)
                * 1024
                * 1024,
            conflict: self.conflict.unwrap_or(mirror.conflict),
            mode: self.mode.unwrap_or(mirror.mode),
            poll_interval: Duration::from_secs(
                self.poll_interval.unwrap_or(config.polling.interval_secs),
            ),
            assume_complete_on_denied_progress: self.assume_complete_on_denied_progress
                || mirror.assume_complete_on_denied_progress,
            dry_run: self.dry_run,
        }
    }
}
