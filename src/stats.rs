use crate::error::Error;
use crate::table::WorkingTable;
use serde::Serialize;
use std::path::Path;

/// Completion summary of a persisted output table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStats {
    pub total_rows: usize,
    pub with_description: usize,
    pub words_total: u64,
    pub tokens_total: u64,
    pub avg_words: f64,
    pub avg_tokens: f64,
}

pub fn load_stats(output_csv: &Path) -> Result<CatalogStats, Error> {
    if !output_csv.is_file() {
        return Err(Error::MissingOutput(output_csv.to_path_buf()));
    }
    let table = WorkingTable::read_csv(output_csv)?;
    Ok(compute_stats(&table))
}

/// Totals run over every row (missing counts are zero); averages are taken over
/// described rows only and are zero when there are none.
pub fn compute_stats(table: &WorkingTable) -> CatalogStats {
    let mut with_description = 0usize;
    let mut words_total = 0u64;
    let mut tokens_total = 0u64;

    for idx in 0..table.len() {
        let Some(row) = table.catalog_row(idx) else {
            continue;
        };
        if row.has_description() {
            with_description += 1;
        }
        words_total += row.word_count.unwrap_or(0);
        tokens_total += row.token_estimate.unwrap_or(0);
    }

    CatalogStats {
        total_rows: table.len(),
        with_description,
        words_total,
        tokens_total,
        avg_words: average(words_total, with_description),
        avg_tokens: average(tokens_total, with_description),
    }
}

fn average(total: u64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round2(total as f64 / count as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{DESCRIPTION, IMAGE_ID, TOKEN_ESTIMATE, WORD_COUNT};

    fn output(rows: &[[&str; 4]]) -> WorkingTable {
        let mut table = WorkingTable::new(
            [IMAGE_ID, DESCRIPTION, WORD_COUNT, TOKEN_ESTIMATE]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        for row in rows {
            table.push_row(row.iter().map(|s| s.to_string()).collect());
        }
        table
    }

    #[test]
    fn test_averages_over_described_rows() {
        let table = output(&[
            ["1", "a b c", "3", "4"],
            ["2", "", "", ""],
            ["3", "d e", "2.0", "3.0"],
        ]);
        let stats = compute_stats(&table);
        assert_eq!(stats.total_rows, 3);
        assert_eq!(stats.with_description, 2);
        assert_eq!(stats.words_total, 5);
        assert_eq!(stats.tokens_total, 7);
        assert_eq!(stats.avg_words, 2.5);
        assert_eq!(stats.avg_tokens, 3.5);
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        let table = output(&[
            ["1", "x", "1", "1"],
            ["2", "y", "1", "1"],
            ["3", "z", "2", "3"],
        ]);
        let stats = compute_stats(&table);
        assert_eq!(stats.avg_words, 1.33);
        assert_eq!(stats.avg_tokens, 1.67);
    }

    #[test]
    fn test_no_descriptions_means_zero_averages() {
        let table = output(&[["1", " ", "", ""]]);
        let stats = compute_stats(&table);
        assert_eq!(stats.with_description, 0);
        assert_eq!(stats.avg_words, 0.0);
        assert_eq!(stats.avg_tokens, 0.0);
    }

    #[test]
    fn test_table_without_result_columns() {
        let mut table = WorkingTable::new(vec![IMAGE_ID.to_string()]);
        table.push_row(vec!["1".to_string()]);
        let stats = compute_stats(&table);
        assert_eq!(stats.total_rows, 1);
        assert_eq!(stats.words_total, 0);
    }

    #[test]
    fn test_missing_output() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_stats(&tmp.path().join("master.csv")).unwrap_err();
        assert!(matches!(err, Error::MissingOutput(_)));
    }
}
