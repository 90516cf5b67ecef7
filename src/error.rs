//! Failure taxonomy for a backup run.
//!
//! None of these are recovered locally: every variant aborts the run and
//! surfaces to the operator through the `anyhow` chain printed by `main`.
//! The operator fixes the underlying issue (network, credentials, disk,
//! diverged history) and re-runs the tool.

use std::path::PathBuf;

/// Everything that can sink one backup run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An HTTP call failed in transport or returned a non-success status.
    #[error("wiki server request failed")]
    Request(#[source] reqwest::Error),

    /// The server answered, but the payload was missing an expected field.
    ///
    /// A transient API hiccup and a permanently malformed response are not
    /// distinguished; both land here.
    #[error("unexpected wiki server response: {0}")]
    MalformedResponse(String),

    /// The export job never reported "complete" within the polling budget.
    #[error("export did not complete after {attempts} status checks")]
    Timeout { attempts: u32 },

    /// The downloaded file could not be read as a zip archive.
    #[error("cannot read backup archive {}", path.display())]
    CorruptArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Cloning, committing, or pushing the backup repository failed.
    #[error("repository sync failed")]
    Sync(#[source] git2::Error),
}
