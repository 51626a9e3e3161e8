//! Reading delimited text into rows and dropping the rows that cannot be trained on

use csv::{ReaderBuilder, StringRecord, Trim};
use modelbridge_core::{is_missing, Error, FeatureSchema, ImputeOption, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Delimited text format of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Csv,
    Tsv,
}

impl DataFormat {
    #[inline]
    pub fn delimiter(&self) -> u8 {
        match self {
            DataFormat::Csv => b',',
            DataFormat::Tsv => b'\t',
        }
    }
}

/// Splits a dataset into records of trimmed fields.
///
/// Quoted fields may contain delimiters and line breaks. Blank lines are
/// skipped, and with `header` set the first remaining record is dropped.
/// Records of any width are returned; width checks belong to [`RowFilter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer {
    format: DataFormat,
    header: bool,
}

impl Tokenizer {
    pub fn new(format: DataFormat, header: bool) -> Self {
        Self { format, header }
    }

    pub fn tokenize(&self, text: &str) -> Result<Vec<Vec<String>>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.format.delimiter())
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| Error::Training(format!("malformed dataset: {}", e)))?;
            if !is_blank(&record) {
                rows.push(record.iter().map(str::to_string).collect());
            }
        }
        if self.header && !rows.is_empty() {
            rows.remove(0);
        }
        Ok(rows)
    }
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty) && record.len() <= 1
}

/// Drops rows that are malformed or miss a value that may not be imputed
#[derive(Debug, Clone)]
pub struct RowFilter {
    width: usize,
    required: Vec<usize>,
}

impl RowFilter {
    /// Rows must have exactly `schema.width()` fields. Features marked
    /// [`ImputeOption::Discard`] and the response column must be present.
    pub fn new(schema: &FeatureSchema, response_index: Option<usize>) -> Self {
        let mut required: Vec<usize> = schema
            .features
            .iter()
            .filter(|f| f.include && f.impute_option == ImputeOption::Discard)
            .map(|f| f.index)
            .chain(response_index)
            .collect();
        required.sort_unstable();
        required.dedup();
        Self {
            width: schema.width(),
            required,
        }
    }

    pub fn keep(&self, row: &[String]) -> bool {
        row.len() == self.width && self.required.iter().all(|&i| !is_missing(&row[i]))
    }

    /// Filter `rows`, returning the kept rows and the number dropped
    pub fn apply(&self, rows: Vec<Vec<String>>) -> (Vec<Vec<String>>, usize) {
        let total = rows.len();
        let kept: Vec<Vec<String>> = rows.into_par_iter().filter(|row| self.keep(row)).collect();
        let dropped = total - kept.len();
        if dropped > 0 {
            debug!("Dropped {} of {} rows (malformed or missing required values)", dropped, total);
        }
        (kept, dropped)
    }
}
