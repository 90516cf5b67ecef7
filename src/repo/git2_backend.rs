use anyhow::{Context, Result};
use git2::{
    Cred, FetchOptions, IndexAddOption, PushOptions, RemoteCallbacks, Repository, Signature,
    build::RepoBuilder,
};
use std::fs;
use std::path::Path;

use crate::error::Error;

/// File patterns stored through the large-object mechanism instead of
/// inline history. Wiki exports carry their attachments in these formats.
const LFS_PATTERNS: &[&str] = &["*.png", "*.pdf", "*.jpg", "*.zip"];

/// Committer identity recorded on every snapshot commit.
const COMMITTER_NAME: &str = "outline-backup";
const COMMITTER_EMAIL: &str = "outline-backup@localhost";

/// Build remote callbacks that authenticate with the operator's private key.
///
/// The key path comes straight from the config file; no agent lookup and
/// no process-wide environment override is involved. Local-path remotes
/// never trigger the callback.
fn callbacks_with_key(key_path: &Path) -> RemoteCallbacks<'_> {
    let mut cb = RemoteCallbacks::new();
    cb.credentials(move |_url, username_from_url, _allowed| {
        Cred::ssh_key(username_from_url.unwrap_or("git"), None, key_path, None)
    });
    cb
}

/// Clone the backup repository unless a working copy is already present.
///
/// An existing `dest` is left completely untouched, whatever its state;
/// the tool never re-clones over a working copy. A fresh clone also gets
/// large-file tracking configured for [`LFS_PATTERNS`].
///
/// # Errors
/// - [`Error::Sync`] if the clone fails (network, authentication, remote).
/// - A plain I/O error if the tracking configuration cannot be written.
pub fn ensure_clone(url: &str, key_path: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Ok(());
    }

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(callbacks_with_key(key_path));

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fo);

    let repo = builder
        .clone(url, dest)
        .map_err(Error::Sync)
        .with_context(|| format!("git clone {}", url))?;

    configure_lfs_tracking(&repo).context("configuring large-file tracking")?;
    Ok(())
}

/// Reproduce what `git lfs install --local` and `git lfs track` would set
/// up: the filter definition in the repository config, and the tracked
/// patterns in the working copy's `.gitattributes`.
///
/// Existing `.gitattributes` lines are preserved; each pattern is appended
/// only if not already present. The file lands in the worktree, so the
/// next commit publishes the tracking rules alongside the snapshot.
fn configure_lfs_tracking(repo: &Repository) -> Result<()> {
    let mut config = repo.config().map_err(Error::Sync)?;
    config
        .set_str("filter.lfs.clean", "git-lfs clean -- %f")
        .map_err(Error::Sync)?;
    config
        .set_str("filter.lfs.smudge", "git-lfs smudge -- %f")
        .map_err(Error::Sync)?;
    config
        .set_str("filter.lfs.process", "git-lfs filter-process")
        .map_err(Error::Sync)?;
    config
        .set_bool("filter.lfs.required", true)
        .map_err(Error::Sync)?;

    let workdir = repo
        .workdir()
        .context("backup repository has no worktree")?;
    let attributes = workdir.join(".gitattributes");
    let mut body = if attributes.exists() {
        fs::read_to_string(&attributes)?
    } else {
        String::new()
    };

    for pat in LFS_PATTERNS {
        if body.lines().any(|l| l.trim_start().starts_with(pat)) {
            continue;
        }
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        body.push_str(&format!("{} filter=lfs diff=lfs merge=lfs -text\n", pat));
    }
    fs::write(&attributes, body)?;
    Ok(())
}

/// Stage everything, commit if the tree changed, and push HEAD to origin.
///
/// Staging a snapshot identical to HEAD's tree creates no commit and is
/// not an error; the push still runs in that case, covering a commit left
/// unpublished by an earlier interrupted run.
///
/// # Errors
/// - [`Error::Sync`] if staging, committing, or pushing fails. A rejected
///   push (diverged history) is surfaced, never auto-resolved.
pub fn commit_and_push(dest: &Path, key_path: &Path, message: &str) -> Result<()> {
    let repo = Repository::open(dest)
        .map_err(Error::Sync)
        .with_context(|| format!("not a git working copy: {}", dest.display()))?;

    let mut index = repo.index().map_err(Error::Sync)?;
    index
        .add_all(["*"], IndexAddOption::DEFAULT, None)
        .map_err(Error::Sync)?;
    index.write().map_err(Error::Sync)?;
    let tree_id = index.write_tree().map_err(Error::Sync)?;

    let head = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    if head.is_none() && index.is_empty() {
        // brand-new clone with nothing to snapshot at all
        return Ok(());
    }

    let unchanged = head
        .as_ref()
        .is_some_and(|parent| parent.tree_id() == tree_id);
    if !unchanged {
        let tree = repo.find_tree(tree_id).map_err(Error::Sync)?;
        let sig = Signature::now(COMMITTER_NAME, COMMITTER_EMAIL).map_err(Error::Sync)?;
        let parents: Vec<&git2::Commit> = head.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .map_err(Error::Sync)?;
    }

    push_head(&repo, key_path).context("git push")?;
    Ok(())
}

/// Push the branch HEAD resolves to up to `origin` under the same name.
fn push_head(repo: &Repository, key_path: &Path) -> Result<()> {
    let head = repo.head().map_err(Error::Sync)?;
    let refname = head.name().context("HEAD is not valid utf-8")?.to_string();

    let mut po = PushOptions::new();
    po.remote_callbacks(callbacks_with_key(key_path));

    let mut remote = repo.find_remote("origin").map_err(Error::Sync)?;
    remote
        .push(&[format!("{refname}:{refname}")], Some(&mut po))
        .map_err(Error::Sync)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bare_remote(dir: &Path) -> String {
        let remote = dir.join("remote.git");
        Repository::init_bare(&remote).unwrap();
        remote.to_str().unwrap().to_string()
    }

    fn no_key() -> &'static Path {
        // local-path remotes never invoke the credential callback
        Path::new("/nonexistent/key")
    }

    #[test]
    fn fresh_clone_configures_large_file_tracking() {
        let td = tempdir().unwrap();
        let url = bare_remote(td.path());
        let dest = td.path().join("backup_repo");

        ensure_clone(&url, no_key(), &dest).unwrap();

        let attributes = fs::read_to_string(dest.join(".gitattributes")).unwrap();
        for pat in ["*.png", "*.pdf", "*.jpg", "*.zip"] {
            assert!(
                attributes.contains(&format!("{} filter=lfs", pat)),
                "missing pattern {pat}"
            );
        }

        let config = Repository::open(&dest).unwrap().config().unwrap();
        assert_eq!(
            config.get_string("filter.lfs.clean").unwrap(),
            "git-lfs clean -- %f"
        );
        assert!(config.get_bool("filter.lfs.required").unwrap());
    }

    #[test]
    fn ensure_clone_is_a_noop_when_working_copy_exists() {
        let td = tempdir().unwrap();
        let dest = td.path().join("backup_repo");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("marker"), "keep").unwrap();

        // the url is bogus; any clone attempt would fail loudly
        ensure_clone("ssh://invalid.example/nope.git", no_key(), &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("marker")).unwrap(), "keep");
        assert!(!dest.join(".git").exists(), "no clone happened");
    }

    #[test]
    fn commit_and_push_publishes_snapshot() {
        let td = tempdir().unwrap();
        let url = bare_remote(td.path());
        let dest = td.path().join("backup_repo");
        ensure_clone(&url, no_key(), &dest).unwrap();

        let names = ["a.md", "b.md", "c.md", "d.md", "e.md"];
        for name in names {
            fs::write(dest.join(name), name).unwrap();
        }
        commit_and_push(&dest, no_key(), "20260805-120000_backup").unwrap();

        let remote = Repository::open(td.path().join("remote.git")).unwrap();
        let head = remote.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.message().unwrap(), "20260805-120000_backup");
        assert_eq!(head.parent_count(), 0, "exactly one commit");

        let tree = head.tree().unwrap();
        for name in names {
            assert!(tree.get_name(name).is_some(), "missing {name}");
        }
        assert!(tree.get_name(".gitattributes").is_some());
    }

    #[test]
    fn unchanged_tree_creates_no_second_commit() {
        let td = tempdir().unwrap();
        let url = bare_remote(td.path());
        let dest = td.path().join("backup_repo");
        ensure_clone(&url, no_key(), &dest).unwrap();

        fs::write(dest.join("page.md"), "same").unwrap();
        commit_and_push(&dest, no_key(), "first").unwrap();
        commit_and_push(&dest, no_key(), "second").unwrap();

        let remote = Repository::open(td.path().join("remote.git")).unwrap();
        let head = remote.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.message().unwrap(), "first");
        assert_eq!(head.parent_count(), 0);
    }

    #[test]
    fn changed_snapshot_gets_a_new_commit() {
        let td = tempdir().unwrap();
        let url = bare_remote(td.path());
        let dest = td.path().join("backup_repo");
        ensure_clone(&url, no_key(), &dest).unwrap();

        fs::write(dest.join("page.md"), "v1").unwrap();
        commit_and_push(&dest, no_key(), "first").unwrap();
        fs::write(dest.join("page.md"), "v2").unwrap();
        commit_and_push(&dest, no_key(), "second").unwrap();

        let remote = Repository::open(td.path().join("remote.git")).unwrap();
        let head = remote.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.message().unwrap(), "second");
        assert_eq!(head.parent_count(), 1);
    }
}
