//! Training data source: fetch a dataset directory and read its main table.

use crate::error::{FraudModelError, Result};
use crate::types::{RawRecord, RawTable};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Something that can materialize the training dataset on local disk.
pub trait DatasetSource: Send + Sync {
    /// Fetch the dataset and return the directory holding its files.
    fn fetch(&self) -> Result<PathBuf>;
}

/// Dataset already present in a local directory
#[derive(Debug, Clone)]
pub struct LocalDirectorySource {
    dir: PathBuf,
}

impl LocalDirectorySource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl DatasetSource for LocalDirectorySource {
    fn fetch(&self) -> Result<PathBuf> {
        if !self.dir.is_dir() {
            return Err(FraudModelError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("dataset directory {} not found", self.dir.display()),
            )));
        }
        Ok(self.dir.clone())
    }
}

/// Pick the largest `.csv` file in `dir`, the authoritative claims table.
///
/// Ties on size resolve to the lexicographically first path.
pub fn select_largest_table(dir: &Path) -> Result<PathBuf> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv && path.is_file() {
            let size = fs::metadata(&path)?.len();
            debug!(path = %path.display(), size, "tabular file found");
            candidates.push((size, path));
        }
    }

    candidates.sort_by(|(sa, pa), (sb, pb)| sb.cmp(sa).then_with(|| pa.cmp(pb)));
    candidates
        .into_iter()
        .next()
        .map(|(_, path)| path)
        .ok_or_else(|| FraudModelError::NoTabularFiles {
            dir: dir.to_path_buf(),
        })
}

/// Read a CSV file into raw records. Empty cells become null.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row = RawRecord::new();
        for (name, cell) in columns.iter().zip(record.iter()) {
            let value = if cell.is_empty() {
                Value::Null
            } else {
                Value::String(cell.to_string())
            };
            row.insert(name.clone(), value);
        }
        rows.push(row);
    }

    info!(
        path = %path.display(),
        columns = columns.len(),
        rows = rows.len(),
        "training table loaded"
    );
    Ok(RawTable::new(columns, rows))
}

/// Fetch from `source` and load the largest table it yields.
pub fn load_training_table(source: &dyn DatasetSource) -> Result<RawTable> {
    let dir = source.fetch()?;
    let path = select_largest_table(&dir)?;
    read_table(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_largest_csv_is_selected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("small.csv"), "a\n1\n").unwrap();
        fs::write(dir.path().join("claims.csv"), "a,b\n1,2\n3,4\n5,6\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "x".repeat(1000)).unwrap();

        let picked = select_largest_table(dir.path()).unwrap();
        assert_eq!(picked.file_name().unwrap(), "claims.csv");
    }

    #[test]
    fn test_no_csv_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.md"), "nothing").unwrap();

        let err = select_largest_table(dir.path()).unwrap_err();
        assert!(matches!(err, FraudModelError::NoTabularFiles { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_read_table_maps_empty_cells_to_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.csv");
        fs::write(&path, "ClaimAmount,DRGDefinition\n100,470\n,291\n").unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.columns, vec!["ClaimAmount", "DRGDefinition"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1]["ClaimAmount"], Value::Null);
        assert_eq!(table.rows[1]["DRGDefinition"], Value::String("291".into()));
    }

    #[test]
    fn test_local_source_requires_directory() {
        let source = LocalDirectorySource::new("/nonexistent/claims-dataset");
        assert!(source.fetch().is_err());
    }
}
