//! One full backup run, start to finish.
//!
//! The steps are strictly sequential: request a server-side export, poll
//! until it completes, download the archive, make sure the working copy
//! exists, extract the snapshot into it, commit and push. Any failure
//! aborts the run; a re-run starts over with a fresh export job.

use anyhow::{Context, Result};
use chrono::Local;
use indicatif::ProgressBar;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::archive;
use crate::export::ExportClient;
use crate::progress::{done_style, fail_style, step_style};
use crate::repo;
use crate::settings::Config;

/// Directory (relative to the invocation dir) holding the working copy.
const REPO_DIR: &str = "backup_repo";

/// Fixed polling budget for one run.
///
/// The default gives the server ten minutes to finish an export, checked
/// once per second with no backoff. Exports are expected to finish within
/// minutes.
#[derive(Debug, Clone, Copy)]
pub struct PollPlan {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollPlan {
    fn default() -> Self {
        PollPlan {
            attempts: 600,
            interval: Duration::from_secs(1),
        }
    }
}

/// CLI entry: load the config and run one backup into the current directory.
pub fn cmd_backup(config_path: &Path) -> Result<()> {
    let cfg = Config::load_or_init(config_path)?;
    println!("Backup from {}", cfg.server);
    run(&cfg, Path::new("."), PollPlan::default())
}

/// Run one export → download → extract → commit → push cycle.
///
/// The archive and the `backup_repo/` working copy land in `work_dir`.
/// The downloaded archive is kept on disk as a local artifact.
pub fn run(cfg: &Config, work_dir: &Path, plan: PollPlan) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(step_style());
    pb.enable_steady_tick(Duration::from_millis(120));

    match run_steps(cfg, work_dir, plan, &pb) {
        Ok(backup_name) => {
            pb.set_style(done_style());
            pb.finish_with_message(format!("Finished ({backup_name})"));
            Ok(())
        }
        Err(e) => {
            pb.set_style(fail_style());
            pb.finish_with_message("backup aborted");
            Err(e)
        }
    }
}

fn run_steps(
    cfg: &Config,
    work_dir: &Path,
    plan: PollPlan,
    pb: &ProgressBar,
) -> Result<String> {
    let client = ExportClient::new(&cfg.server, &cfg.api_token)?;

    pb.set_message("requesting export…");
    let job_id = client.request_export().context("requesting export")?;

    pb.set_message("waiting for the export to finish on the server…");
    let started = Instant::now();
    client.wait_for_completion(&job_id, plan.attempts, plan.interval, thread::sleep)?;
    pb.println(format!(
        "export on server finished after {}s",
        started.elapsed().as_secs()
    ));

    let backup_name = Local::now().format("%Y%m%d-%H%M%S_backup").to_string();
    let archive_path = work_dir.join(format!("{backup_name}.zip"));
    pb.set_message(format!("downloading {}", archive_path.display()));
    client
        .download_archive(&job_id, &archive_path)
        .context("downloading export archive")?;
    pb.println(format!("Exported to: {}", archive_path.display()));

    let repo_dir = work_dir.join(REPO_DIR);
    pb.set_message("preparing backup repository…");
    repo::ensure_clone(&cfg.git_url, &cfg.key_path(), &repo_dir)?;

    pb.set_message("extracting snapshot…");
    archive::extract(&archive_path, &repo_dir)
        .with_context(|| format!("extracting {}", archive_path.display()))?;

    pb.set_message("committing and pushing…");
    repo::commit_and_push(&repo_dir, &cfg.key_path(), &backup_name)?;

    Ok(backup_name)
}
