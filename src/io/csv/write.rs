//! CSV writing operations.

use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerWriter, prelude::CsvWriter};

/// Write a DataFrame to a CSV file.
pub(crate) fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[io::csv::write] Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(file)
        .finish(df)
        .with_context(|| format!("[io::csv::write] Failed to write CSV to {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use crate::io::{read_csv, str_values};

    #[test]
    fn written_tables_read_back_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("units.csv");
        let mut df = df! { "unit" => ["0601", "0602"], "trials" => [100.0, 50.5] }.unwrap();

        write_csv(&mut df, &path).unwrap();

        let back = read_csv(&path).unwrap();
        assert_eq!(str_values(&back, "unit").unwrap(), vec![Some("0601".to_string()), Some("0602".to_string())]);
        assert_eq!(str_values(&back, "trials").unwrap()[1].as_deref(), Some("50.5"));
    }
}
