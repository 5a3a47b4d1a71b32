//! Fitted coefficient tables and their text export.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{ModelError, ModelResult};

/// File holding one comma-separated coefficient row per fitted mesh.
pub const COEFFICIENTS_FILE: &str = "Fitted_Model_Coefficients.txt";

/// File listing the fitted mesh filenames in row order.
pub const FILENAMES_FILE: &str = "Files_Fitted.txt";

/// Rows of shape coefficients, one row per mesh and one column per mode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoefficientTable {
    rows: Vec<Vec<f64>>,
    columns: usize,
}

impl CoefficientTable {
    /// Creates a table, taking the column count from the first row.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::RaggedTable`] if rows differ in length.
    pub fn new(rows: Vec<Vec<f64>>) -> ModelResult<Self> {
        let columns = rows.first().map_or(0, Vec::len);
        Self::with_columns(rows, columns)
    }

    pub(crate) fn with_columns(rows: Vec<Vec<f64>>, columns: usize) -> ModelResult<Self> {
        if let Some((row, bad)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns) {
            return Err(ModelError::RaggedTable {
                row,
                expected: columns,
                actual: bad.len(),
            });
        }
        Ok(Self { rows, columns })
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of coefficients per row.
    #[must_use]
    pub const fn num_modes(&self) -> usize {
        self.columns
    }

    /// All rows in order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// One row.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// One mode's coefficient across all rows.
    #[must_use]
    pub fn column(&self, mode: usize) -> Option<Vec<f64>> {
        (mode < self.columns).then(|| self.rows.iter().map(|r| r[mode]).collect())
    }

    /// Writes [`COEFFICIENTS_FILE`] and [`FILENAMES_FILE`] into `dir`.
    ///
    /// Coefficients are written comma-separated with six decimals, one row
    /// per line. `filenames[i]` names the mesh of row `i`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::FilenameCount`] if `filenames` does not match
    /// the row count, or an I/O error.
    pub fn write<S: AsRef<str>>(&self, dir: &Path, filenames: &[S]) -> ModelResult<()> {
        if filenames.len() != self.rows.len() {
            return Err(ModelError::FilenameCount {
                filenames: filenames.len(),
                rows: self.rows.len(),
            });
        }
        fs::create_dir_all(dir)?;

        let mut out = BufWriter::new(File::create(dir.join(COEFFICIENTS_FILE))?);
        for row in &self.rows {
            let line: Vec<String> = row.iter().map(|c| format!("{c:.6}")).collect();
            writeln!(out, "{}", line.join(","))?;
        }
        out.flush()?;

        let mut names = BufWriter::new(File::create(dir.join(FILENAMES_FILE))?);
        for name in filenames {
            writeln!(names, "{}", name.as_ref())?;
        }
        names.flush()?;

        info!(
            rows = self.rows.len(),
            modes = self.columns,
            dir = %dir.display(),
            "Wrote fitted coefficients"
        );
        Ok(())
    }

    /// Reads a comma-separated coefficient file. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Parse`] for a non-numeric value,
    /// [`ModelError::RaggedTable`] for rows of differing length, or an I/O
    /// error.
    pub fn read(path: &Path) -> ModelResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut rows = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let row = line
                .split(',')
                .map(|v| {
                    v.trim().parse::<f64>().map_err(|e| ModelError::Parse {
                        path: path.to_path_buf(),
                        line: i + 1,
                        message: format!("'{}': {e}", v.trim()),
                    })
                })
                .collect::<ModelResult<Vec<f64>>>()?;
            rows.push(row);
        }
        Self::new(rows)
    }
}

impl std::fmt::Display for CoefficientTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} rows × {} modes", self.rows.len(), self.columns)
    }
}
