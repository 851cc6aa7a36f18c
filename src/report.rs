// src/report.rs
//! The consolidation run: extracted quarter files in, one validated report out.
//!
//! Every stage reads the previous stage's artifact from disk, applies pure
//! table transforms, and writes its own artifact into its workspace folder.
//! Writes go through a temporary sibling, so a failing stage leaves nothing
//! behind under its output name.

use anyhow::{bail, Context, Result};
use glob::MatchOptions;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::TableError;
use crate::fetch::zips::package_output;
use crate::table::Table;
use crate::transform::{
    compute_column, concatenate_files, deduplicate, derive_year_quarter, filter_files_by_value,
    join_by_key, normalize::require_header, normalize_headers, project_columns,
    remove_blank_rows, retain_by_comparison, strip_quotes, validate_cnpj, validate_required,
    Comparison, Keep, Operation,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    /// Extracted CSV files that fed the run.
    pub inputs: usize,
    /// Data rows in the final report.
    pub rows: usize,
    pub output: PathBuf,
    pub archive: PathBuf,
}

/// Every `*.csv` below any of `dirs`, any case, sorted by path.
pub fn discover_inputs<P: AsRef<Path>>(dirs: &[P]) -> Result<Vec<PathBuf>> {
    let options = MatchOptions {
        case_sensitive: false,
        ..Default::default()
    };
    let mut found = Vec::new();
    for dir in dirs {
        let pattern = format!("{}/**/*.csv", dir.as_ref().display());
        for entry in
            glob::glob_with(&pattern, options).with_context(|| format!("bad pattern {}", pattern))?
        {
            let path = entry?;
            if path.is_file() {
                found.push(path);
            }
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

/// Unquoted, canonical-header, blank-free form used on both join sides.
fn normalized(table: &Table) -> Table {
    remove_blank_rows(&normalize_headers(&strip_quotes(table)))
}

/// Load `input`, apply `f`, save to `output`.
fn stage<F>(name: &str, input: &Path, output: &Path, delimiter: char, f: F) -> Result<Table>
where
    F: FnOnce(&Table) -> Result<Table, TableError>,
{
    let table = Table::load(input, delimiter)?;
    let out = f(&table).with_context(|| format!("stage {}", name))?;
    out.save(output)?;
    info!(
        stage = name,
        rows_in = table.len(),
        rows_out = out.len(),
        path = %output.display(),
        "stage done"
    );
    Ok(out)
}

/// Run every stage over the CSV files inside `sources`, the folders this run
/// extracted, joining against the operator `registry` CSV. Other folders
/// under `extract/` are ignored.
#[instrument(level = "info", skip_all, fields(registry = %registry.display(), sources = sources.len()))]
pub fn run(cfg: &Config, registry: &Path, sources: &[PathBuf]) -> Result<ReportSummary> {
    let ws = &cfg.workspace;
    let rs = &cfg.report;
    let d = cfg.delimiter;
    ws.prepare()?;

    let inputs = discover_inputs(sources)?;
    if inputs.is_empty() {
        bail!("no csv files in the {} extracted archives", sources.len());
    }
    info!(files = inputs.len(), "discovered inputs");

    let filtered = filter_files_by_value(
        &inputs,
        &ws.filtered_dir(),
        &rs.filter_column,
        &rs.filter_value,
        d,
    )?;

    let consolidated = ws.pre_processed_dir().join("consolidated_quarters.csv");
    let merged_input = concatenate_files(&filtered, d)?;
    merged_input.save(&consolidated)?;
    info!(rows = merged_input.len(), path = %consolidated.display(), "concatenated");

    let unique = ws.pre_processed_dir().join("unique_consolidated_quarters.csv");
    stage("deduplicate", &consolidated, &unique, d, |t| {
        Ok(deduplicate(t, Keep::First))
    })?;

    let clean = ws.normalized_dir().join("normalized_quarters.csv");
    stage("normalize", &unique, &clean, d, |t| Ok(normalized(t)))?;

    let expenses = ws.calculated_dir().join("expenses.csv");
    stage("compute", &clean, &expenses, d, |t| {
        compute_column(
            t,
            &rs.final_balance_column,
            &rs.initial_balance_column,
            &rs.amount_column,
            Operation::Subtract,
        )
    })?;

    let dated = ws.calculated_dir().join("expenses_by_quarter.csv");
    stage("year_quarter", &expenses, &dated, d, |t| {
        derive_year_quarter(t, &rs.date_column)
    })?;

    let registry_table = Table::load(registry, d)?;
    let operators = normalized(require_header(&registry_table)?);
    info!(operators = operators.len(), "loaded registry");

    let merged = ws.merged_dir().join("expenses_with_operators.csv");
    stage("join", &dated, &merged, d, |t| {
        join_by_key(t, &operators, &rs.left_key, &rs.right_key)
    })?;

    let validated = ws.validated_dir().join("validated_expenses.csv");
    stage("validate", &merged, &validated, d, |t| {
        validate_required(&validate_cnpj(t, &rs.tax_id_column)?, &rs.name_column)
    })?;

    let positive = ws.validated_dir().join("positive_expenses.csv");
    stage("positive", &validated, &positive, d, |t| {
        retain_by_comparison(t, &rs.amount_column, Comparison::Gt, 0.0)
    })?;

    let output = ws.output_dir().join(&rs.output_file);
    let report = project_columns(&Table::load(&positive, d)?, &rs.output_columns)
        .context("stage project")?;
    report.save_formatted(&output)?;
    let archive = package_output(&output)?;

    let summary = ReportSummary {
        inputs: inputs.len(),
        rows: report.len(),
        output,
        archive,
    };
    info!(?summary, "report written");
    Ok(summary)
}
