//! Batch phone-list enrichment
//!
//! This module implements the CSV workflow around the Lookup API:
//! 1. Import a table of phone numbers and append the enrichment columns
//! 2. Optionally keep only the rows `[start, stop)`
//! 3. Validate each number, one request at a time, and merge the result into its row
//! 4. Save the enriched table

use crate::errors::{AppError, ResultExt};
use crate::gateway_client::NumberValidator;
use crate::models::{ExtractionError, LookupOutcome, ValidationResult};
use std::io::{Read, Write};
use std::path::Path;

/// Input column holding the number to validate.
pub const MOBILE_PHONE_COLUMN: &str = "Mobile_Phone";

/// `VALID` value for numbers the provider does not recognise.
pub const NOT_VALID: &str = "NOT VALID";

/// Columns appended to every imported table, in output order.
pub const ENRICHMENT_COLUMNS: [&str; 5] = [
    "VALID",
    "AccountName",
    "AccountType",
    "Carrier",
    "CarrierType",
];

/// One row of the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhoneRecord {
    /// Zero-based position of the row in the input file.
    pub row: usize,
    pub mobile_phone: String,
    /// Values of every input column except the enrichment columns, in header order.
    pub fields: Vec<String>,
    pub valid: String,
    pub account_name: String,
    pub account_type: String,
    pub carrier: String,
    pub carrier_type: String,
}

impl PhoneRecord {
    /// True once the row has been touched by a lookup that produced a value.
    pub fn is_enriched(&self) -> bool {
        !self.valid.is_empty()
    }

    fn enrichment_values(&self) -> [&str; 5] {
        [
            &self.valid,
            &self.account_name,
            &self.account_type,
            &self.carrier,
            &self.carrier_type,
        ]
    }

    /// Copies a successful lookup into the row.
    ///
    /// Fields are assigned in column order. The first field that cannot be
    /// extracted stops the copy: earlier fields keep their values, later
    /// ones stay empty.
    pub fn apply_lookup(&mut self, result: &ValidationResult) -> Result<(), ExtractionError> {
        self.valid = result.raw_text();
        self.account_name = result.account_name()?;
        self.account_type = result.account_type()?;
        self.carrier = result.carrier_name()?;
        self.carrier_type = result.carrier_type()?;
        Ok(())
    }

    pub fn mark_not_valid(&mut self) {
        self.valid = NOT_VALID.to_string();
        self.account_name.clear();
        self.account_type.clear();
        self.carrier.clear();
        self.carrier_type.clear();
    }
}

/// The in-memory table being enriched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    /// Pass-through header (input header minus any enrichment columns).
    pub headers: Vec<String>,
    pub records: Vec<PhoneRecord>,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PhoneRecord> {
        self.records.iter()
    }

    pub fn mobile_phones(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.mobile_phone.as_str()).collect()
    }

    /// Full output header: pass-through columns then the enrichment columns.
    pub fn output_headers(&self) -> Vec<&str> {
        self.headers
            .iter()
            .map(String::as_str)
            .chain(ENRICHMENT_COLUMNS)
            .collect()
    }

    /// Keeps rows `[start, stop)`. Negative bounds count back from the end
    /// and out-of-range bounds shrink the slice instead of failing.
    pub fn slice(&mut self, start: i64, stop: i64) {
        let len = self.records.len();
        let end = resolve_bound(stop, len);
        let begin = resolve_bound(start, len).min(end);
        self.records.truncate(end);
        self.records.drain(..begin);
    }
}

/// Maps a possibly negative slice bound onto `0..=len`.
fn resolve_bound(bound: i64, len: usize) -> usize {
    if bound < 0 {
        usize::try_from(bound.unsigned_abs()).map_or(0, |back| len.saturating_sub(back))
    } else {
        usize::try_from(bound).map_or(len, |index| index.min(len))
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a PhoneRecord;
    type IntoIter = std::slice::Iter<'a, PhoneRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Counts reported at the end of an enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    /// Rows that resolved and had all four fields extracted.
    pub valid: usize,
    pub not_valid: usize,
    /// Rows whose lookup failed for a reason other than not-found.
    pub lookup_failures: usize,
    /// Rows that resolved but were missing a caller-name or carrier record.
    pub extraction_failures: usize,
}

/// Reads the table at `path`. See [`read_rows`].
pub fn import_rows(
    path: impl AsRef<Path>,
    full_run: bool,
    start: i64,
    stop: i64,
) -> Result<RecordSet, AppError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    read_rows(file, full_run, start, stop).with_context(|| format!("reading {}", path.display()))
}

/// Parses a comma-separated table whose first line is the header.
///
/// The five enrichment columns are appended empty; if the input already has
/// columns with those names they are reset rather than duplicated. When
/// `full_run` is false only rows `[start, stop)` are kept (see
/// [`RecordSet::slice`]). Short rows are padded with empty fields.
pub fn read_rows<R: Read>(
    reader: R,
    full_run: bool,
    start: i64,
    stop: i64,
) -> Result<RecordSet, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .flexible(true)
        .from_reader(reader);

    let header = reader.headers()?.clone();
    let phone_index = header
        .iter()
        .position(|h| h == MOBILE_PHONE_COLUMN)
        .ok_or_else(|| AppError::MissingColumn(MOBILE_PHONE_COLUMN.to_string()))?;

    let keep: Vec<usize> = header
        .iter()
        .enumerate()
        .filter(|(_, h)| !ENRICHMENT_COLUMNS.contains(h))
        .map(|(i, _)| i)
        .collect();
    let headers = keep.iter().map(|&i| header[i].to_string()).collect();

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        records.push(PhoneRecord {
            row,
            mobile_phone: record.get(phone_index).unwrap_or_default().to_string(),
            fields: keep
                .iter()
                .map(|&i| record.get(i).unwrap_or_default().to_string())
                .collect(),
            ..Default::default()
        });
    }

    tracing::info!("Number of records {}", records.len());

    let mut set = RecordSet { headers, records };
    if !full_run {
        set.slice(start, stop);
        tracing::info!(
            "Processing rows [{}, {}): {} record(s)",
            start,
            stop,
            set.len()
        );
    }
    Ok(set)
}

/// Validates every row in order and merges the results in place.
///
/// Lookups are awaited one at a time. A failed lookup or a missing
/// sub-record is logged and only affects its own row.
pub async fn enrich<V>(validator: &V, records: &mut RecordSet) -> BatchSummary
where
    V: NumberValidator + ?Sized,
{
    let total = records.len();
    let mut summary = BatchSummary::default();

    for (idx, record) in records.records.iter_mut().enumerate() {
        tracing::debug!(
            "[{}/{}] Validating row {}: {}",
            idx + 1,
            total,
            record.row,
            record.mobile_phone
        );

        let outcome = validator.validate(&record.mobile_phone).await;
        tracing::info!("phone result {}: {}", record.mobile_phone, outcome);
        summary.processed += 1;

        match outcome {
            LookupOutcome::NotFound => {
                record.mark_not_valid();
                summary.not_valid += 1;
            }
            LookupOutcome::Found(result) => match record.apply_lookup(&result) {
                Ok(()) => summary.valid += 1,
                Err(e) => {
                    tracing::warn!(
                        "Row {} ({}): incomplete lookup data: {}",
                        record.row,
                        record.mobile_phone,
                        e
                    );
                    summary.extraction_failures += 1;
                }
            },
            LookupOutcome::Failed(e) => {
                tracing::error!(
                    "Row {} ({}): lookup failed: {}",
                    record.row,
                    record.mobile_phone,
                    e
                );
                summary.lookup_failures += 1;
            }
        }
    }

    tracing::info!(
        "done checking phones: {} processed, {} valid, {} not valid, {} failed, {} incomplete",
        summary.processed,
        summary.valid,
        summary.not_valid,
        summary.lookup_failures,
        summary.extraction_failures
    );
    summary
}

/// Writes the table to `path`. Returns `false` (after logging) on any failure.
pub fn save_rows(path: impl AsRef<Path>, records: &RecordSet) -> bool {
    let path = path.as_ref();
    let result = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))
        .and_then(|file| write_rows(file, records))
        .with_context(|| format!("writing {}", path.display()));

    match result {
        Ok(()) => {
            tracing::info!("Saved {} record(s) to {}", records.len(), path.display());
            true
        }
        Err(e) => {
            tracing::error!("Exception occurred: {}", e);
            false
        }
    }
}

/// Serializes the table with its header.
pub fn write_rows<W: Write>(writer: W, records: &RecordSet) -> Result<(), AppError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .from_writer(writer);

    writer.write_record(records.output_headers())?;
    for record in records {
        writer.write_record(
            record
                .fields
                .iter()
                .map(String::as_str)
                .chain(record.enrichment_values()),
        )?;
    }
    writer.flush()?;
    Ok(())
}
