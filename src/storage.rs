//! Delimited-file input and output.
//!
//! Input column names are configuration, not protocol (`ColumnSpec`). A
//! missing file or required column is fatal to the run; everything else is
//! carried through untouched so unrelated columns survive the pipeline.

use crate::config::ColumnSpec;
use crate::errors::{AppError, ResultExt};
use crate::models::{CandidateRecord, EnrichedRecord};
use crate::reconcile::PincodeComparison;
use csv::StringRecord;
use std::path::{Path, PathBuf};

/// Header row written for enriched output and its incremental backups.
const ENRICHED_HEADERS: [&str; 10] = [
    "State",
    "City",
    "Branch Name",
    "Address",
    "Google Maps Link",
    "Expanded URL",
    "Latitude",
    "Longitude",
    "Extraction Success",
    "Error",
];

/// A tabular snapshot kept verbatim so output can preserve columns we do
/// not interpret.
#[derive(Debug, Clone)]
pub struct AddressTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    /// The configured address column, one entry per row.
    pub addresses: Vec<String>,
}

fn find_column(headers: &StringRecord, name: &str, path: &Path) -> Result<usize, AppError> {
    headers.iter().position(|h| h == name).ok_or_else(|| {
        AppError::DataError(format!(
            "Column '{}' not found in {} (available: {})",
            name,
            path.display(),
            headers.iter().collect::<Vec<_>>().join(", ")
        ))
    })
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, AppError> {
    if !path.exists() {
        return Err(AppError::DataError(format!(
            "Input file not found: {}",
            path.display()
        )));
    }
    csv::Reader::from_path(path).map_err(AppError::from)
}

/// Reads candidate records. Branch name and address are required columns;
/// map URL, state and city are optional and default to empty.
pub fn read_candidates(path: &Path, cols: &ColumnSpec) -> Result<Vec<CandidateRecord>, AppError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .context(format!("Failed to read headers from {}", path.display()))?
        .clone();

    let name_idx = find_column(&headers, &cols.name, path)?;
    let address_idx = find_column(&headers, &cols.address, path)?;
    let url_idx = headers.iter().position(|h| h == cols.map_url);
    let state_idx = headers.iter().position(|h| h == cols.state);
    let city_idx = headers.iter().position(|h| h == cols.city);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.context(format!("Malformed row in {}", path.display()))?;
        let get = |idx: usize| row.get(idx).unwrap_or("").trim().to_string();

        records.push(CandidateRecord {
            state: state_idx.map(|i| get(i)).unwrap_or_default(),
            city: city_idx.map(|i| get(i)).unwrap_or_default(),
            branch_name: get(name_idx),
            raw_address: get(address_idx),
            source_url: url_idx.map(|i| get(i)).filter(|u| !u.is_empty()),
        });
    }

    tracing::info!("Read {} candidate records from {}", records.len(), path.display());
    Ok(records)
}

/// Reads a file keeping every row verbatim plus the configured address
/// column, for the geocoding and reconciliation passes.
pub fn read_address_table(path: &Path, address_column: &str) -> Result<AddressTable, AppError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .context(format!("Failed to read headers from {}", path.display()))?
        .clone();
    let address_idx = find_column(&headers, address_column, path)?;

    let mut rows = Vec::new();
    let mut addresses = Vec::new();
    for row in reader.records() {
        let row = row.context(format!("Malformed row in {}", path.display()))?;
        addresses.push(row.get(address_idx).unwrap_or("").trim().to_string());
        rows.push(row);
    }

    tracing::info!("Read {} rows from {}", rows.len(), path.display());
    Ok(AddressTable {
        headers,
        rows,
        addresses,
    })
}

fn fmt_opt_f64(v: Option<f64>) -> String {
    v.map(|f| f.to_string()).unwrap_or_default()
}

/// Writes enriched records; used for both the authoritative output and the
/// incremental backups so both carry the same shape.
pub fn write_enriched(path: &Path, records: &[EnrichedRecord]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to open {} for writing", path.display()))?;
    writer
        .write_record(ENRICHED_HEADERS)
        .context("Failed to write headers")?;

    for record in records {
        writer
            .write_record(&[
                record.state.clone(),
                record.city.clone(),
                record.branch_name.clone(),
                record.raw_address.clone(),
                record.source_url.clone().unwrap_or_default(),
                record.expanded_url.clone().unwrap_or_default(),
                fmt_opt_f64(record.latitude),
                fmt_opt_f64(record.longitude),
                record.success.to_string(),
                record.error.clone().unwrap_or_default(),
            ])
            .context(format!("Failed to write record for {}", record.branch_name))?;
    }

    writer.flush().context("Failed to flush output")?;
    Ok(())
}

/// Reads back a previously written enriched snapshot (final output or
/// backup). Used to resume a run without re-processing settled items.
pub fn read_enriched(path: &Path) -> Result<Vec<EnrichedRecord>, AppError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .context(format!("Failed to read headers from {}", path.display()))?
        .clone();

    let idx_of = |name: &str| find_column(&headers, name, path);
    let state_idx = idx_of("State")?;
    let city_idx = idx_of("City")?;
    let name_idx = idx_of("Branch Name")?;
    let address_idx = idx_of("Address")?;
    let url_idx = idx_of("Google Maps Link")?;
    let expanded_idx = idx_of("Expanded URL")?;
    let lat_idx = idx_of("Latitude")?;
    let lng_idx = idx_of("Longitude")?;
    let success_idx = idx_of("Extraction Success")?;
    let error_idx = idx_of("Error")?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.context(format!("Malformed row in {}", path.display()))?;
        let get = |idx: usize| row.get(idx).unwrap_or("").to_string();
        let opt = |idx: usize| Some(get(idx)).filter(|s| !s.is_empty());

        records.push(EnrichedRecord {
            state: get(state_idx),
            city: get(city_idx),
            branch_name: get(name_idx),
            raw_address: get(address_idx),
            source_url: opt(url_idx),
            expanded_url: opt(expanded_idx),
            latitude: get(lat_idx).parse().ok(),
            longitude: get(lng_idx).parse().ok(),
            success: get(success_idx) == "true",
            error: opt(error_idx),
        });
    }

    Ok(records)
}

/// Timestamped sibling path for an incremental backup.
pub fn backup_path(output_path: &Path, batch: usize) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let stem = output_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let file_name = format!("{}_backup_batch_{}_{}.csv", stem, batch, timestamp);
    output_path.with_file_name(file_name)
}

/// Appends the geocoder's columns to the original rows and writes the
/// combined table.
pub fn write_geocoded(
    path: &Path,
    table: &AddressTable,
    results: &[crate::models::GeocodeResult],
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to open {} for writing", path.display()))?;

    let mut headers: Vec<String> = table.headers.iter().map(String::from).collect();
    headers.extend(
        [
            "api_formatted_address",
            "api_pincode",
            "api_city",
            "api_state",
            "api_lat",
            "api_lng",
        ]
        .map(String::from),
    );
    writer.write_record(&headers).context("Failed to write headers")?;

    for (row, geo) in table.rows.iter().zip(results) {
        let mut fields: Vec<String> = row.iter().map(String::from).collect();
        fields.push(geo.formatted_address.clone().unwrap_or_default());
        fields.push(geo.pincode.clone().unwrap_or_default());
        fields.push(geo.city.clone().unwrap_or_default());
        fields.push(geo.state.clone().unwrap_or_default());
        fields.push(fmt_opt_f64(geo.latitude));
        fields.push(fmt_opt_f64(geo.longitude));
        writer.write_record(&fields).context("Failed to write row")?;
    }

    writer.flush().context("Failed to flush output")?;
    Ok(())
}

/// Writes the pincode comparison report with its advisory similarity score.
pub fn write_comparison(path: &Path, comparison: &PincodeComparison) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to open {} for writing", path.display()))?;
    writer
        .write_record([
            "Pincode",
            "Canonical_Address",
            "Scraped_Address",
            "Similarity_Score",
        ])
        .context("Failed to write headers")?;

    for row in &comparison.rows {
        writer
            .write_record(&[
                row.pincode.clone(),
                row.canonical_address.clone(),
                row.scraped_address.clone(),
                row.similarity.to_string(),
            ])
            .context("Failed to write comparison row")?;
    }

    writer.flush().context("Failed to flush output")?;
    Ok(())
}

/// Writes the scraped rows that had no canonical MatchKey match, with their
/// original columns intact.
pub fn write_unique(
    path: &Path,
    table: &AddressTable,
    unique_indices: &[usize],
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to open {} for writing", path.display()))?;
    writer
        .write_record(&table.headers)
        .context("Failed to write headers")?;

    for &idx in unique_indices {
        if let Some(row) = table.rows.get(idx) {
            writer.write_record(row).context("Failed to write row")?;
        }
    }

    writer.flush().context("Failed to flush output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnSpec;

    #[test]
    fn candidate_columns_are_configuration_not_protocol() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        std::fs::write(
            &path,
            "Region,Town,Outlet,Addr,Link\n\
             Karnataka,Bengaluru,Main Branch,1 Test St 560001,NA\n",
        )
        .unwrap();

        let cols = ColumnSpec {
            name: "Outlet".to_string(),
            address: "Addr".to_string(),
            map_url: "Link".to_string(),
            state: "Region".to_string(),
            city: "Town".to_string(),
            ..ColumnSpec::default()
        };

        let records = read_candidates(&path, &cols).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, "Karnataka");
        assert_eq!(records[0].city, "Bengaluru");
        assert_eq!(records[0].branch_name, "Main Branch");
        assert_eq!(records[0].source_url.as_deref(), Some("NA"));
    }

    #[test]
    fn absent_optional_columns_default_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        std::fs::write(&path, "Branch Name,Address\nSolo,2 Test St\n").unwrap();

        let records = read_candidates(&path, &ColumnSpec::default()).unwrap();
        assert_eq!(records[0].state, "");
        assert_eq!(records[0].city, "");
        assert_eq!(records[0].source_url, None);
    }
}
