//! Version-control layer for the backup repository.
//!
//! Wraps the git2-based backend and re-exports only the two operations the
//! orchestrator needs: making sure a working copy exists, and publishing
//! the current snapshot. Keeping the backend private means a future switch
//! of implementation stays local to this module.

mod git2_backend;

pub use git2_backend::{commit_and_push, ensure_clone};
