//! Draw tables written by an external sampler.
//!
//! One row per draw. Optional `chain` and `draw` columns label the row; every other
//! column holds one parameter. Rows of a chain are ordered by `draw` when present,
//! otherwise by file order. Chains appear in order of first appearance.

use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use ndarray::Array2;
use polars::frame::DataFrame;

use super::{f64_values, read_csv, str_values};

pub(crate) const CHAIN_COLUMN: &str = "chain";
pub(crate) const DRAW_COLUMN: &str = "draw";

/// Parameter columns and per-chain draw matrices (draws × columns).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DrawTable {
    pub columns: Vec<String>,
    pub chains: Vec<(String, Array2<f64>)>,
}

pub(crate) fn read_draw_table(path: &Path) -> Result<DrawTable> {
    let df = read_csv(path)?;
    draw_table(&df).with_context(|| format!("[io::draws] reading draws from {}", path.display()))
}

pub(crate) fn draw_table(df: &DataFrame) -> Result<DrawTable> {
    let names = df.get_column_names().into_iter().map(|name| name.to_string()).collect::<Vec<_>>();
    let columns = names.iter()
        .filter(|name| name.as_str() != CHAIN_COLUMN && name.as_str() != DRAW_COLUMN)
        .cloned()
        .collect::<Vec<_>>();
    ensure!(!columns.is_empty(), "[io::draws] no parameter columns");

    let labels = if names.iter().any(|name| name == CHAIN_COLUMN) {
        str_values(df, CHAIN_COLUMN)?.into_iter()
            .enumerate()
            .map(|(row, label)| label.with_context(|| format!("[io::draws] row {row} has no chain label")))
            .collect::<Result<Vec<_>>>()?
    } else {
        vec![String::from("1"); df.height()]
    };
    let order = if names.iter().any(|name| name == DRAW_COLUMN) {
        f64_values(df, DRAW_COLUMN)?
    } else {
        vec![None; df.height()]
    };

    let mut chains: Vec<(String, Vec<usize>)> = Vec::new();
    for (row, label) in labels.into_iter().enumerate() {
        match chains.iter_mut().find(|(name, _)| *name == label) {
            Some((_, rows)) => rows.push(row),
            None => chains.push((label, vec![row])),
        }
    }
    for (_, rows) in chains.iter_mut() {
        rows.sort_by(|&a, &b| {
            let key = |row: usize| order[row].unwrap_or(row as f64);
            key(a).total_cmp(&key(b)).then(a.cmp(&b))
        });
    }

    let values = columns.iter()
        .map(|name| f64_values(df, name))
        .collect::<Result<Vec<_>>>()?;

    let chains = chains.into_iter()
        .map(|(label, rows)| {
            let mut matrix = Array2::zeros((rows.len(), columns.len()));
            for (i, &row) in rows.iter().enumerate() {
                for (j, column) in values.iter().enumerate() {
                    match column[row] {
                        Some(v) if v.is_finite() => matrix[[i, j]] = v,
                        _ => bail!("[io::draws] chain {label}: column {:?} has no finite value in row {row}", columns[j]),
                    }
                }
            }
            Ok((label, matrix))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DrawTable { columns, chains })
}
