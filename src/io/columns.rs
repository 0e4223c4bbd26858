//! Typed access to DataFrame columns.

use anyhow::{Context, Result};
use polars::{frame::DataFrame, prelude::DataType};

/// Read a column as optional strings, casting numeric identifiers to text.
pub(crate) fn str_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)
        .with_context(|| format!("[io::columns] missing column {name:?}"))?
        .cast(&DataType::String)
        .with_context(|| format!("[io::columns] column {name:?} cannot be read as text"))?;
    Ok(column.str()?.into_iter()
        .map(|value| value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect())
}

/// Read a column as optional f64 values; nulls and unparseable cells become `None`.
pub(crate) fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)
        .with_context(|| format!("[io::columns] missing column {name:?}"))?
        .cast(&DataType::Float64)
        .with_context(|| format!("[io::columns] column {name:?} is not numeric"))?;
    Ok(column.f64()?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn integer_ids_are_read_as_text() {
        let df = df! { "id" => [101i64, 102] }.unwrap();
        assert_eq!(str_values(&df, "id").unwrap(), vec![Some("101".to_string()), Some("102".to_string())]);
    }

    #[test]
    fn nulls_become_none() {
        let df = df! { "x" => [Some(1.5), None, Some(3.0)] }.unwrap();
        assert_eq!(f64_values(&df, "x").unwrap(), vec![Some(1.5), None, Some(3.0)]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let df = df! { "x" => [1.0] }.unwrap();
        assert!(f64_values(&df, "y").is_err());
    }
}
