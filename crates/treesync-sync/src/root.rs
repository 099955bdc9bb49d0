//! The validated pair of root directories being compared

use std::path::{Component, Path, PathBuf};
use tracing::info;
use treesync_types::{Error, Result, Side};

/// Absolute, normalized root directories of location A and location B
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootContext {
    path_a: PathBuf,
    path_b: PathBuf,
}

impl RootContext {
    /// Validate and store the two locations
    ///
    /// Relative paths are resolved against the current directory. Both
    /// locations must exist, be writable directories and must not contain
    /// one another; equal paths count as nested.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Path`] naming the offending location.
    pub fn initialize<P, Q>(path_a: P, path_b: Q) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let path_a = absolutize(path_a.as_ref())?;
        let path_b = absolutize(path_b.as_ref())?;

        validate_root(&path_a)?;
        validate_root(&path_b)?;

        let canonical_a = std::fs::canonicalize(&path_a).map_err(|e| Error::io(&path_a, e))?;
        let canonical_b = std::fs::canonicalize(&path_b).map_err(|e| Error::io(&path_b, e))?;
        if canonical_a.starts_with(&canonical_b) || canonical_b.starts_with(&canonical_a) {
            return Err(Error::path(
                &path_b,
                format!(
                    "locations must not contain one another ('{}' and '{}')",
                    path_a.display(),
                    path_b.display()
                ),
            ));
        }

        info!(
            "left-root='{}', right-root='{}'",
            path_a.display(),
            path_b.display()
        );
        Ok(Self { path_a, path_b })
    }

    /// Root of location A
    pub fn path_a(&self) -> &Path {
        &self.path_a
    }

    /// Root of location B
    pub fn path_b(&self) -> &Path {
        &self.path_b
    }

    /// Root of the given side
    pub fn root(&self, side: Side) -> &Path {
        match side {
            Side::A => &self.path_a,
            Side::B => &self.path_b,
        }
    }

    /// Absolute path of `relative` under the given side
    ///
    /// The empty relative path maps to the root itself.
    pub fn absolute(&self, side: Side, relative: &Path) -> PathBuf {
        let root = self.root(side);
        if relative.as_os_str().is_empty() {
            root.to_path_buf()
        } else {
            root.join(relative)
        }
    }

    /// Absolute path of `relative` under location A
    pub fn absolute_a(&self, relative: &Path) -> PathBuf {
        self.absolute(Side::A, relative)
    }

    /// Absolute path of `relative` under location B
    pub fn absolute_b(&self, relative: &Path) -> PathBuf {
        self.absolute(Side::B, relative)
    }

    /// Map an absolute path under either root back to its relative path
    ///
    /// # Errors
    ///
    /// Returns [`Error::Path`] when the path lies under neither root.
    pub fn relative_path(&self, absolute: &Path) -> Result<PathBuf> {
        let normalized = absolutize(absolute)?;
        [&self.path_a, &self.path_b]
            .into_iter()
            .find_map(|root| normalized.strip_prefix(root).ok())
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                Error::path(
                    absolute,
                    "path cannot be associated with either synchronization location",
                )
            })
    }
}

/// `/`-prefixed rendering of a relative path; the root renders as `/`
pub fn display_path(relative: &Path) -> String {
    let mut rendered = String::from("/");
    let names: Vec<_> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect();
    rendered.push_str(&names.join("/"));
    rendered
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| Error::io(path, e))?
            .join(path)
    };
    Ok(normalize(&joined))
}

/// Lexical normalization: drops `.` and resolves `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn validate_root(path: &Path) -> Result<()> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::path(path, "location does not exist"));
        }
        Err(e) => return Err(Error::io(path, e)),
    };

    if !metadata.is_dir() {
        return Err(Error::path(path, "location is not a directory"));
    }
    if metadata.permissions().readonly() {
        return Err(Error::path(path, "location is not writable"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn two_roots() -> (TempDir, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a");
        let b = temp_dir.path().join("b");
        std::fs::create_dir(&a).unwrap();
        std::fs::create_dir(&b).unwrap();
        (temp_dir, a, b)
    }

    #[test]
    fn test_initialize_valid_roots() {
        let (_temp_dir, a, b) = two_roots();
        let roots = RootContext::initialize(&a, &b).unwrap();
        assert_eq!(roots.path_a(), a.as_path());
        assert_eq!(roots.path_b(), b.as_path());
    }

    #[test]
    fn test_trailing_separator_and_dots_are_normalized() {
        let (_temp_dir, a, b) = two_roots();
        let messy_a = PathBuf::from(format!("{}/", a.display()));
        let messy_b = b.join("..").join("b").join(".");

        let roots = RootContext::initialize(&messy_a, &messy_b).unwrap();
        assert_eq!(roots.path_a(), a.as_path());
        assert_eq!(roots.path_b(), b.as_path());
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let (_temp_dir, a, b) = two_roots();
        let error = RootContext::initialize(a.join("missing"), &b).unwrap_err();
        assert!(matches!(error, Error::Path { .. }));
    }

    #[test]
    fn test_file_root_is_rejected() {
        let (_temp_dir, a, b) = two_roots();
        let file = a.join("file.txt");
        std::fs::write(&file, b"x").unwrap();
        let error = RootContext::initialize(&b, &file).unwrap_err();
        assert!(error.to_string().contains("not a directory"));
    }

    #[test]
    fn test_nested_roots_are_rejected() {
        let (_temp_dir, a, _b) = two_roots();
        let inner = a.join("inner");
        std::fs::create_dir(&inner).unwrap();

        assert!(matches!(
            RootContext::initialize(&a, &inner),
            Err(Error::Path { .. })
        ));
        assert!(matches!(
            RootContext::initialize(&inner, &a),
            Err(Error::Path { .. })
        ));
        assert!(matches!(
            RootContext::initialize(&a, &a),
            Err(Error::Path { .. })
        ));
    }

    #[test]
    fn test_sibling_with_common_prefix_is_not_nested() {
        let temp_dir = TempDir::new().unwrap();
        let data = temp_dir.path().join("data");
        let data2 = temp_dir.path().join("data2");
        std::fs::create_dir(&data).unwrap();
        std::fs::create_dir(&data2).unwrap();

        assert!(RootContext::initialize(&data, &data2).is_ok());
    }

    #[test]
    fn test_absolute_and_relative_mapping() {
        let (_temp_dir, a, b) = two_roots();
        let roots = RootContext::initialize(&a, &b).unwrap();
        let relative = Path::new("docs").join("a.txt");

        assert_eq!(roots.absolute_a(&relative), a.join("docs").join("a.txt"));
        assert_eq!(roots.absolute_b(Path::new("")), b);
        assert_eq!(
            roots.relative_path(&roots.absolute_b(&relative)).unwrap(),
            relative
        );
        assert_eq!(roots.relative_path(&a).unwrap(), PathBuf::new());
        assert!(roots.relative_path(Path::new("/somewhere/else")).is_err());
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(Path::new("")), "/");
        assert_eq!(display_path(&Path::new("docs").join("a.txt")), "/docs/a.txt");
    }
}
