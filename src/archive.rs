use anyhow::{Context, Result, bail};
use std::fs;
use std::io;
use std::path::Path;
use zip::ZipArchive;

use crate::error::Error;

/// Unpack every entry of `archive_path` into `target_dir`.
///
/// The target directory is created if missing and existing files are
/// overwritten in place. Entry names are validated before writing;
/// anything that would escape the target tree is refused. Unix
/// permissions recorded in the archive are restored.
///
/// # Errors
/// - [`Error::CorruptArchive`] if the file is not a readable zip.
/// - A plain I/O error while creating directories or writing files.
pub fn extract(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)
        .with_context(|| format!("cannot open {}", archive_path.display()))?;
    let mut zip = ZipArchive::new(file).map_err(|source| Error::CorruptArchive {
        path: archive_path.to_path_buf(),
        source,
    })?;

    fs::create_dir_all(target_dir)
        .with_context(|| format!("cannot create {}", target_dir.display()))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|source| Error::CorruptArchive {
            path: archive_path.to_path_buf(),
            source,
        })?;

        let rel = match entry.enclosed_name() {
            Some(p) => p.to_path_buf(),
            None => bail!("archive entry escapes extraction root: {}", entry.name()),
        };
        let dest = target_dir.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&dest)
            .with_context(|| format!("cannot write {}", dest.display()))?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dest, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::{FileOptions, ZipWriter};

    fn write_fixture(path: &Path, files: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut zw = ZipWriter::new(file);
        for (name, body) in files {
            zw.start_file(*name, FileOptions::default()).unwrap();
            zw.write_all(body).unwrap();
        }
        zw.finish().unwrap();
    }

    #[test]
    fn extracts_every_entry_byte_identical() {
        let td = tempdir().unwrap();
        let archive = td.path().join("export.zip");
        let files: &[(&str, &[u8])] = &[
            ("index.md", b"# wiki\n"),
            ("guides/setup.md", b"setup steps"),
            ("assets/logo.png", &[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a]),
        ];
        write_fixture(&archive, files);

        // target does not exist yet; extract must create it
        let target = td.path().join("out");
        extract(&archive, &target).unwrap();

        for (name, body) in files {
            assert_eq!(fs::read(target.join(name)).unwrap(), *body, "{name}");
        }
    }

    #[test]
    fn overwrites_existing_snapshot_files() {
        let td = tempdir().unwrap();
        let archive = td.path().join("export.zip");
        write_fixture(&archive, &[("index.md", b"new contents")]);

        let target = td.path().join("out");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("index.md"), "stale contents").unwrap();

        extract(&archive, &target).unwrap();
        assert_eq!(fs::read(target.join("index.md")).unwrap(), b"new contents");
    }

    #[test]
    fn rejects_unreadable_archive() {
        let td = tempdir().unwrap();
        let archive = td.path().join("broken.zip");
        fs::write(&archive, b"this is not a zip").unwrap();

        let err = extract(&archive, &td.path().join("out")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::CorruptArchive { .. })
        ));
    }

    #[test]
    fn refuses_entries_escaping_the_target() {
        let td = tempdir().unwrap();
        let archive = td.path().join("evil.zip");
        write_fixture(&archive, &[("../evil.txt", b"nope")]);

        let target = td.path().join("out");
        assert!(extract(&archive, &target).is_err());
        assert!(!td.path().join("evil.txt").exists());
    }
}
