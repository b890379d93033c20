//! CSV import of profit entries exported from the admin spreadsheet.

mod parser;

use std::io::Read;
use std::path::Path;

use tracing::warn;

use super::domain::ValuationEntry;

pub use parser::SkippedRow;

#[derive(Debug, thiserror::Error)]
pub enum ValuationImportError {
    #[error("failed to read valuation export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid valuation CSV data: {0}")]
    Csv(#[from] csv::Error),
}

/// Parsed entries plus the rows that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationImport {
    pub entries: Vec<ValuationEntry>,
    pub skipped: Vec<SkippedRow>,
}

pub struct ValuationImporter;

impl ValuationImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ValuationImport, ValuationImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Malformed rows are skipped and reported; only structural CSV errors fail the import.
    pub fn from_reader<R: Read>(reader: R) -> Result<ValuationImport, ValuationImportError> {
        let parsed = parser::parse_valuations(reader)?;
        for skipped in &parsed.skipped {
            warn!(row = skipped.row, reason = %skipped.reason, "skipping valuation row");
        }

        Ok(ValuationImport {
            entries: parsed.entries,
            skipped: parsed.skipped,
        })
    }
}
