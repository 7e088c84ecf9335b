//! Per-year data file layout.
//!
//! The data directory (normally the volume-mounted `config/`) holds one field
//! collection and one workforce file per season, plus a shared harvest
//! history:
//!
//! ```text
//! config/
//!   config.yaml
//!   field_collection_2025.yaml
//!   Workforce_2025.yaml
//!   harvest_history.yaml
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// File name of the shared harvest history.
pub const HISTORY_FILE_NAME: &str = "harvest_history.yaml";

fn year_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:field_collection|Workforce)_(\d{4})\.ya?ml$")
            .expect("Invalid data file pattern")
    })
}

/// Resolves data file paths inside the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Create a helper rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The directory itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Field collection file for a season.
    #[must_use]
    pub fn fields_path(&self, year: i32) -> PathBuf {
        self.root.join(format!("field_collection_{year}.yaml"))
    }

    /// Workforce file for a season.
    #[must_use]
    pub fn workforce_path(&self, year: i32) -> PathBuf {
        self.root.join(format!("Workforce_{year}.yaml"))
    }

    /// Shared harvest history file.
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE_NAME)
    }

    /// Seasons for which a field collection or workforce file exists.
    ///
    /// A missing directory yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub fn available_years(&self) -> Result<BTreeSet<i32>> {
        let mut years = BTreeSet::new();
        if !self.root.is_dir() {
            debug!("Data directory {} does not exist", self.root.display());
            return Ok(years);
        }

        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(year) = parse_year(name) {
                years.insert(year);
            }
        }
        Ok(years)
    }
}

/// Extract the season from a per-year data file name.
#[must_use]
pub fn parse_year(file_name: &str) -> Option<i32> {
    year_file_pattern()
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Read a YAML sequence from `path`.
///
/// Returns `None` if the file does not exist. An empty file reads as an
/// empty list.
pub(crate) fn read_list<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("{} not found, starting empty", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    if contents.trim().is_empty() {
        return Ok(Some(Vec::new()));
    }

    let items: Option<Vec<T>> =
        serde_yaml::from_str(&contents).map_err(|source| Error::DataFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Some(items.unwrap_or_default()))
}

/// Write `items` to `path` as a YAML sequence, creating parent directories.
pub(crate) fn write_list<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let yaml = serde_yaml::to_string(items).map_err(|source| Error::DataFile {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, yaml)?;
    debug!("Wrote {} entries to {}", items.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let dir = DataDir::new("config");
        assert_eq!(
            dir.fields_path(2025),
            PathBuf::from("config/field_collection_2025.yaml")
        );
        assert_eq!(
            dir.workforce_path(2026),
            PathBuf::from("config/Workforce_2026.yaml")
        );
        assert_eq!(
            dir.history_path(),
            PathBuf::from("config/harvest_history.yaml")
        );
        assert_eq!(dir.root(), Path::new("config"));
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("field_collection_2025.yaml"), Some(2025));
        assert_eq!(parse_year("Workforce_2024.yml"), Some(2024));
        assert_eq!(parse_year("workforce_2024.yaml"), None);
        assert_eq!(parse_year("field_collection_25.yaml"), None);
        assert_eq!(parse_year("field_collection_2025.yaml.bak"), None);
        assert_eq!(parse_year("config.yaml"), None);
    }

    #[test]
    fn test_available_years() {
        let tmp = tempfile::tempdir().unwrap();
        for name in [
            "field_collection_2024.yaml",
            "Workforce_2024.yaml",
            "Workforce_2025.yaml",
            "config.yaml",
            "gsheets_creds.json",
        ] {
            std::fs::write(tmp.path().join(name), "[]").unwrap();
        }

        let years = DataDir::new(tmp.path()).available_years().unwrap();
        assert_eq!(years.into_iter().collect::<Vec<_>>(), vec![2024, 2025]);
    }

    #[test]
    fn test_read_list_missing_file() {
        let items: Option<Vec<i32>> = read_list(Path::new("/nonexistent/list.yaml")).unwrap();
        assert!(items.is_none());
    }

    #[test]
    fn test_read_list_empty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.yaml");
        std::fs::write(&path, "\n").unwrap();

        let items: Option<Vec<i32>> = read_list(&path).unwrap();
        assert_eq!(items, Some(Vec::new()));
    }

    #[test]
    fn test_read_list_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.yaml");
        std::fs::write(&path, "just: a mapping").unwrap();

        let result: Result<Option<Vec<i32>>> = read_list(&path);
        assert!(matches!(result, Err(Error::DataFile { .. })));
    }

    #[test]
    fn test_write_list_creates_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/list.yaml");

        write_list(&path, &[1, 2, 3]).unwrap();
        let items: Option<Vec<i32>> = read_list(&path).unwrap();
        assert_eq!(items, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_available_years_missing_dir() {
        let years = DataDir::new("/nonexistent/harvestplan/config")
            .available_years()
            .unwrap();
        assert!(years.is_empty());
    }
}
