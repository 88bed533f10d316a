use crate::error::Error;
use crate::table::{WorkingTable, IMAGE_ID, RESULT_COLUMNS};
use ahash::{AHashMap, AHashSet};
use std::path::Path;
use tracing::{info, warn};

/// Build the working table for a run from the input list and, if it exists,
/// the previously persisted output.
pub fn load_working_table(input_csv: &Path, output_csv: &Path) -> Result<WorkingTable, Error> {
    if !input_csv.is_file() {
        return Err(Error::Configuration(format!(
            "input CSV not found: {}",
            input_csv.display()
        )));
    }
    let input = WorkingTable::read_csv(input_csv)?;

    let prior = if output_csv.is_file() {
        info!("Merging previous results from {}", output_csv.display());
        Some(WorkingTable::read_csv(output_csv)?)
    } else {
        None
    };

    reconcile(input, prior.as_ref())
}

/// Merge `prior` onto `input`.
///
/// The input decides which rows exist and in what order; the prior table decides
/// the values of every column it carries for ids it knows. Columns only the prior
/// table has are appended, and the result columns always exist afterwards.
pub fn reconcile(input: WorkingTable, prior: Option<&WorkingTable>) -> Result<WorkingTable, Error> {
    let id_col = input.column_index(IMAGE_ID).ok_or_else(|| {
        Error::Configuration(format!("input is missing the required '{}' column", IMAGE_ID))
    })?;

    let mut table = dedupe_input(input, id_col);

    match prior {
        Some(prior) if prior.has_column(IMAGE_ID) => merge_prior(&mut table, id_col, prior),
        Some(_) => {
            warn!(
                "Existing output has no '{}' column; ignoring it for the merge",
                IMAGE_ID
            );
        }
        None => {}
    }

    for column in RESULT_COLUMNS {
        table.ensure_column(column);
    }
    Ok(table)
}

fn dedupe_input(input: WorkingTable, id_col: usize) -> WorkingTable {
    let mut table = WorkingTable::new(input.columns().to_vec());
    let mut seen: AHashSet<String> = AHashSet::with_capacity(input.len());

    for idx in 0..input.len() {
        let Some(cells) = input.row_cells(idx) else {
            continue;
        };
        let id = &cells[id_col];
        if !seen.insert(id.clone()) {
            warn!("Duplicate {} '{}' in input; keeping the first row", IMAGE_ID, id);
            continue;
        }
        table.push_row(cells.to_vec());
    }
    table
}

fn merge_prior(table: &mut WorkingTable, id_col: usize, prior: &WorkingTable) {
    let Some(prior_id_col) = prior.column_index(IMAGE_ID) else {
        return;
    };

    // First occurrence wins when the prior output repeats an id.
    let mut prior_rows: AHashMap<&str, usize> = AHashMap::with_capacity(prior.len());
    for idx in 0..prior.len() {
        if let Some(cells) = prior.row_cells(idx) {
            prior_rows.entry(cells[prior_id_col].as_str()).or_insert(idx);
        }
    }

    // (prior column index, working column index), skipping the key itself.
    let column_map: Vec<(usize, usize)> = prior
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| name.as_str() != IMAGE_ID)
        .map(|(prior_idx, name)| (prior_idx, table.ensure_column(name)))
        .collect();

    let mut merged = 0usize;
    for row in 0..table.len() {
        let id = match table.row_cells(row) {
            Some(cells) => cells[id_col].clone(),
            None => continue,
        };
        let Some(&prior_row) = prior_rows.get(id.as_str()) else {
            continue;
        };
        let Some(prior_cells) = prior.row_cells(prior_row) else {
            continue;
        };
        for &(prior_idx, working_idx) in &column_map {
            table.set_value(row, working_idx, prior_cells[prior_idx].clone());
        }
        merged += 1;
    }

    let dropped = prior_rows.len().saturating_sub(merged);
    info!(
        "Merged {} previous rows ({} no longer in input)",
        merged, dropped
    );
}
