//! Filesystem utilities.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::core::errors::DepsyncError;

/// Read a file to string.
pub fn read_to_string(path: &Path) -> Result<String, DepsyncError> {
    fs::read_to_string(path).map_err(|e| DepsyncError::io(path, e))
}

/// Replace `path` with `contents` through a temporary file in the same
/// directory, so readers never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
    temp.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write temporary file for {}", path.display()))?;

    // Keep the permissions of the file being replaced.
    if let Ok(meta) = fs::metadata(path) {
        temp.as_file()
            .set_permissions(meta.permissions())
            .with_context(|| format!("failed to copy permissions of {}", path.display()))?;
    }

    temp.persist(path)
        .with_context(|| format!("failed to write file: {}", path.display()))?;
    Ok(())
}

/// All files under `root` with the given extension, sorted.
///
/// `root` may also name a single file, which is returned as is regardless
/// of its extension. The walk does not descend into any path listed in
/// `excluded`, though `root` itself is always read. A missing root is an
/// error.
pub fn source_files(
    root: &Path,
    extension: &str,
    excluded: &[PathBuf],
) -> Result<Vec<PathBuf>, DepsyncError> {
    let meta = fs::metadata(root).map_err(|e| DepsyncError::io(root, e))?;
    if meta.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !excluded.iter().any(|x| entry.path() == x.as_path())
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            DepsyncError::io(path, io::Error::other(e))
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == extension)
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Lexically normalize `path`: drop `.` components and fold `..` into
/// its parent where there is one. Symlinks are not resolved.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let foldable = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if foldable {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// `path` relative to `base` for display, or `path` unchanged when it lies
/// elsewhere.
pub fn display_path(base: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(base).unwrap_or(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_source_files() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("Http")).unwrap();
        fs::write(src.join("Kernel.php"), "<?php").unwrap();
        fs::write(src.join("Http/Client.php"), "<?php").unwrap();
        fs::write(src.join("README.md"), "readme").unwrap();

        let files = source_files(&src, "php", &[]).unwrap();
        assert_eq!(files, [src.join("Http/Client.php"), src.join("Kernel.php")]);

        let single = source_files(&src.join("README.md"), "php", &[]).unwrap();
        assert_eq!(single, [src.join("README.md")]);
    }

    #[test]
    fn test_source_files_skips_excluded_directories() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        for rel in ["Kernel.php", "vendor/acme/Lib.php", "tests/KernelTest.php"] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "<?php").unwrap();
        }

        let excluded = [root.join("vendor"), root.join("tests")];
        let files = source_files(root, "php", &excluded).unwrap();
        assert_eq!(files, [root.join("Kernel.php")]);

        let tests = source_files(&root.join("tests"), "php", &excluded).unwrap();
        assert_eq!(tests, [root.join("tests/KernelTest.php")]);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/p/./src/")), PathBuf::from("/p/src"));
        assert_eq!(normalize(Path::new("/p/.")), PathBuf::from("/p"));
        assert_eq!(normalize(Path::new("/p/lib/../vendor")), PathBuf::from("/p/vendor"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize(Path::new(".")), PathBuf::from("."));
    }

    #[test]
    fn test_missing_root_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = source_files(&tmp.path().join("nope"), "php", &[]).unwrap_err();
        assert_eq!(err.kind(), crate::core::errors::ErrorKind::Io);
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("composer.json");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, "new\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");

        let leftovers = fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_display_path() {
        let base = Path::new("/project");
        assert_eq!(
            display_path(base, Path::new("/project/src/A.php")),
            PathBuf::from("src/A.php")
        );
        assert_eq!(
            display_path(base, Path::new("/elsewhere/B.php")),
            PathBuf::from("/elsewhere/B.php")
        );
    }
}
