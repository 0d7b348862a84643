//! Whole-file CSV input and output at stage boundaries.

use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PrepError, Result, ResultExt};

/// Read a CSV with every column as text, so that no value is coerced before
/// the normalizer sees it.
pub fn read_raw_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))
        .context(format!("Opening {}", path.display()))?
        .finish()
        .context(format!("Reading {}", path.display()))?;

    debug!(
        "Read raw table {} ({} rows x {} columns)",
        path.display(),
        df.height(),
        df.width()
    );
    Ok(df)
}

/// Read a CSV with inferred column types.
pub fn read_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))
        .context(format!("Opening {}", path.display()))?
        .finish()
        .context(format!("Reading {}", path.display()))?;

    debug!(
        "Read table {} ({} rows x {} columns)",
        path.display(),
        df.height(),
        df.width()
    );
    Ok(df)
}

/// Write a table as CSV with a header row, creating parent directories.
pub fn write_csv(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;

    let mut file = File::create(path).context(format!("Creating {}", path.display()))?;
    let mut df = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df)
        .context(format!("Writing {}", path.display()))?;

    info!(
        "Saved {} ({} rows x {} columns)",
        path.display(),
        df.height(),
        df.width()
    );
    Ok(())
}

/// Write a text artifact, creating parent directories.
pub fn write_text(path: impl AsRef<Path>, contents: &str) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    fs::write(path, contents).context(format!("Writing {}", path.display()))?;
    info!("Saved {}", path.display());
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(PrepError::Io)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_csv_keeps_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        fs::write(&path, "age,ca,target\n63,0,1\n41,?,0\n").unwrap();

        let df = read_raw_csv(&path).unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("age").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("ca").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_write_then_read_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let df = df! {
            "chol" => [233.0, 250.0],
            "target" => [1i64, 0],
        }
        .unwrap();

        write_csv(&df, &path).unwrap();
        let back = read_csv(&path).unwrap();
        assert_eq!(back.shape(), (2, 2));
        let names: Vec<&str> = back.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["chol", "target"]);
    }

    #[test]
    fn test_missing_file_is_io_or_polars_error() {
        let err = read_csv("does/not/exist.csv").unwrap_err();
        assert!(matches!(err.error_code(), "IO_ERROR" | "POLARS_ERROR"));
    }
}
