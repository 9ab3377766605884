//! Output-table assembly and final selection filtering.

use fj_core::{Column, Error, Result};

/// The finished columnar table for one chunk: named 2-D columns sharing one
/// row count, filtered to the final selection mask.
#[derive(Debug, Clone)]
pub struct OutputTable {
    columns: Vec<(String, Column)>,
    n_rows: usize,
}

impl OutputTable {
    /// Merge the derived columns, enforce the row-count invariant, and apply
    /// the final selection.
    ///
    /// The `weight` column is the canonical row-count baseline: it must be
    /// present, and every other column must match its row count before
    /// filtering. Any mismatch is a fatal internal-consistency error naming
    /// the offending field, since a silently mis-shaped column would corrupt
    /// the physics content rather than crash downstream.
    pub fn assemble(columns: Vec<(String, Column)>, final_mask: &[bool]) -> Result<Self> {
        let baseline = columns
            .iter()
            .find(|(name, _)| name == "weight")
            .map(|(_, col)| col.n_rows())
            .ok_or_else(|| {
                Error::Validation("output table is missing the 'weight' baseline column".into())
            })?;

        for (name, col) in &columns {
            if col.n_rows() != baseline {
                return Err(Error::Schema {
                    field: name.clone(),
                    expected: baseline,
                    actual: col.n_rows(),
                });
            }
        }
        if final_mask.len() != baseline {
            return Err(Error::Validation(format!(
                "final selection mask covers {} events, table has {}",
                final_mask.len(),
                baseline
            )));
        }

        let n_rows = final_mask.iter().filter(|&&b| b).count();
        let columns = columns
            .into_iter()
            .map(|(name, col)| Ok((name, col.filter(final_mask)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { columns, n_rows })
    }

    /// Number of retained rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Columns in assembly order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }
}
