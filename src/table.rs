use crate::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const IMAGE_ID: &str = "image_id";
pub const IMAGE_PATH: &str = "image_path";
pub const DESCRIPTION: &str = "description";
pub const WORD_COUNT: &str = "word_count";
pub const TOKEN_ESTIMATE: &str = "token_estimate";
pub const LAST_UPDATED: &str = "last_updated";

/// Columns the pipeline writes, in the order they are appended.
pub const RESULT_COLUMNS: [&str; 4] = [DESCRIPTION, WORD_COUNT, TOKEN_ESTIMATE, LAST_UPDATED];

/// An ordered, string-celled table. Every row has exactly one cell per column;
/// an empty cell means the value is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Typed snapshot of the pipeline's columns for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub image_id: String,
    pub image_path: String,
    pub description: Option<String>,
    pub word_count: Option<u64>,
    pub token_estimate: Option<u64>,
    pub last_updated: Option<String>,
}

impl CatalogRow {
    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }
}

impl WorkingTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Read a CSV file with a header row. Short records are padded with empty cells.
    pub fn read_csv(path: &Path) -> Result<Self, Error> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = WorkingTable::new(columns);

        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(table.columns.len(), String::new());
            table.rows.push(row);
        }

        debug!(
            "Read {} rows x {} columns from {}",
            table.rows.len(),
            table.columns.len(),
            path.display()
        );
        Ok(table)
    }

    /// Rewrite `path` with the full table. The data goes to a sibling temp file
    /// first and is renamed into place, so readers never see a partial file.
    pub fn write_csv(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = temp_path_for(path);
        {
            let mut writer = csv::Writer::from_path(&tmp_path)?;
            writer.write_record(&self.columns)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Index of `name`, appending an all-empty column if it does not exist yet.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.columns.len() - 1
    }

    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| r[col].as_str())
    }

    pub fn row_cells(&self, row: usize) -> Option<&[String]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    pub fn set_cell(&mut self, row: usize, column: &str, value: impl Into<String>) {
        let col = self.ensure_column(column);
        self.set_value(row, col, value);
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: impl Into<String>) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = value.into();
        }
    }

    pub fn catalog_row(&self, row: usize) -> Option<CatalogRow> {
        if row >= self.rows.len() {
            return None;
        }
        let text = |column: &str| {
            self.cell(row, column)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let number = |column: &str| self.cell(row, column).and_then(parse_count);

        Some(CatalogRow {
            image_id: text(IMAGE_ID).unwrap_or_default(),
            image_path: text(IMAGE_PATH).unwrap_or_default(),
            description: text(DESCRIPTION),
            word_count: number(WORD_COUNT),
            token_estimate: number(TOKEN_ESTIMATE),
            last_updated: text(LAST_UPDATED),
        })
    }

    /// Write a successful description and its derived fields into `row`.
    pub fn record_description(
        &mut self,
        row: usize,
        description: &str,
        word_count: u64,
        token_estimate: u64,
        last_updated: &str,
    ) {
        self.set_cell(row, DESCRIPTION, description);
        self.set_cell(row, WORD_COUNT, word_count.to_string());
        self.set_cell(row, TOKEN_ESTIMATE, token_estimate.to_string());
        self.set_cell(row, LAST_UPDATED, last_updated);
    }
}

/// Parse a count cell. Accepts `"90"` as well as `"90.0"` (how dataframe tools
/// write integer columns that contain nulls). Empty or garbage is `None`.
pub fn parse_count(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(n) = value.parse::<u64>() {
        return Some(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => Some(f.round() as u64),
        _ => None,
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("90"), Some(90));
        assert_eq!(parse_count("117.0"), Some(117));
        assert_eq!(parse_count(" 12 "), Some(12));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("NaN"), None);
        assert_eq!(parse_count("abc"), None);
        assert_eq!(parse_count("-3"), None);
    }

    #[test]
    fn test_ensure_column_pads_existing_rows() {
        let mut table = WorkingTable::new(cols(&[IMAGE_ID]));
        table.push_row(cols(&["a"]));
        table.push_row(cols(&["b"]));

        let idx = table.ensure_column(DESCRIPTION);
        assert_eq!(idx, 1);
        assert_eq!(table.ensure_column(DESCRIPTION), 1);
        assert_eq!(table.cell(0, DESCRIPTION), Some(""));
        assert_eq!(table.cell(1, IMAGE_ID), Some("b"));
    }

    #[test]
    fn test_catalog_row_treats_empty_as_absent() {
        let mut table = WorkingTable::new(cols(&[IMAGE_ID, IMAGE_PATH]));
        table.push_row(cols(&["a", "a.jpg"]));
        for column in RESULT_COLUMNS {
            table.ensure_column(column);
        }

        let row = table.catalog_row(0).unwrap();
        assert_eq!(row.image_id, "a");
        assert_eq!(row.image_path, "a.jpg");
        assert!(row.description.is_none());
        assert!(row.word_count.is_none());
        assert!(!row.has_description());

        table.record_description(0, "red ring", 2, 3, "2024-01-01T00:00:00Z");
        let row = table.catalog_row(0).unwrap();
        assert!(row.has_description());
        assert_eq!(row.word_count, Some(2));
        assert_eq!(row.token_estimate, Some(3));
        assert!(table.catalog_row(1).is_none());
    }

    #[test]
    fn test_blank_description_is_not_a_description() {
        let mut table = WorkingTable::new(cols(&[IMAGE_ID, DESCRIPTION]));
        table.push_row(cols(&["a", "   "]));
        assert!(!table.catalog_row(0).unwrap().has_description());
    }

    #[test]
    fn test_csv_write_then_read_preserves_table() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("out.csv");

        let mut table = WorkingTable::new(cols(&[IMAGE_ID, IMAGE_PATH, "campaign"]));
        table.push_row(cols(&["1", "a.jpg", "spring, 2024"]));
        table.push_row(cols(&["2", "b.png", ""]));
        table.write_csv(&path).unwrap();

        assert!(!temp_path_for(&path).exists());
        let read = WorkingTable::read_csv(&path).unwrap();
        assert_eq!(read, table);
    }

    #[test]
    fn test_read_pads_short_records() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("in.csv");
        fs::write(&path, "image_id,image_path,extra\n1,a.jpg\n").unwrap();

        let table = WorkingTable::read_csv(&path).unwrap();
        assert_eq!(table.row_cells(0).unwrap().len(), 3);
        assert_eq!(table.cell(0, "extra"), Some(""));
    }
}
