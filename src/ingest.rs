//! Sync orchestration.
//!
//! Coordinates one ingestion run: resolve the project id → page through
//! items → normalize and assemble the snapshot → write the CSV. A failure at
//! any step aborts the run before anything is written.

use anyhow::{Context, Result};
use chrono::Local;

use crate::client::{self, ProjectPages};
use crate::config::Config;
use crate::progress::{ProgressMode, SyncProgressEvent};
use crate::snapshot;
use crate::store;

pub fn run_sync(config: &Config, dry_run: bool, progress: ProgressMode) -> Result<()> {
    let github = &config.github;
    let token = github.token()?;
    let transport = client::transport_from_config(github, token)?;
    let reporter = progress.reporter();

    reporter.report(SyncProgressEvent::Resolving {
        org: github.org.clone(),
        number: github.project_number,
    });
    let project_id = client::resolve_project_id(&transport, &github.org, github.project_number)
        .with_context(|| {
            format!(
                "failed to resolve project {}/{}",
                github.org, github.project_number
            )
        })?;

    let pages = ProjectPages::new(&transport, project_id, github.page_size);
    let assembled = snapshot::assemble(pages, reporter.as_ref())
        .context("sync aborted; no snapshot was written")?;

    let label = format!("{}/{}", github.org, github.project_number);

    if dry_run {
        println!("sync {} (dry-run)", label);
        println!("  fetched: {} items", assembled.snapshot.len());
        println!("  pages: {}", assembled.pages);
        println!("  fingerprint: {}", assembled.snapshot.fingerprint());
        return Ok(());
    }

    let file_name = store::snapshot_file_name(
        &config.output.prefix,
        github.project_number,
        Local::now().date_naive(),
    );
    let path = config.output.dir.join(file_name);
    store::write_snapshot(&path, &assembled.snapshot)
        .with_context(|| format!("failed to write snapshot {}", path.display()))?;

    println!("sync {}", label);
    println!("  fetched: {} items", assembled.snapshot.len());
    println!("  pages: {}", assembled.pages);
    println!("  fingerprint: {}", assembled.snapshot.fingerprint());
    println!("  saved: {}", path.display());
    println!("ok");

    Ok(())
}
