//! CSV reading operations.
//!
//! Every column is read as text so identifiers keep their leading zeros;
//! numeric access casts through `io::columns`.

use std::{fs::File, io::Cursor, path::Path};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerReader, prelude::CsvReadOptions};

fn text_options() -> CsvReadOptions {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
}

/// Reads a CSV file from `path` into a Polars DataFrame of text columns.
pub(crate) fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::csv::read] Failed to open CSV file: {}", path.display()))?;
    text_options()
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("[io::csv::read] Failed to read CSV from {:?}", path))
}

/// Reads a CSV from a string.
pub(crate) fn read_csv_string(csv: &str) -> Result<DataFrame> {
    text_options()
        .into_reader_with_file_handle(Cursor::new(csv.as_bytes()))
        .finish()
        .context("[io::csv::read] Failed to read CSV from string")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{f64_values, str_values};

    #[test]
    fn identifiers_keep_leading_zeros() {
        let df = read_csv_string("GEOID,pop\n060014001001,1200\n060014001002,\n").unwrap();

        assert_eq!(str_values(&df, "GEOID").unwrap()[0].as_deref(), Some("060014001001"));
        assert_eq!(f64_values(&df, "pop").unwrap(), vec![Some(1200.0), None]);
    }
}
