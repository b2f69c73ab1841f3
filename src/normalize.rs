//! Record normalization: one raw tab-separated dataset in, canonical
//! records out.
//!
//! The first line of the raw table is the header row; every other line is a
//! data row split on tabs. Fields are populated from the resolved header
//! mapping, except the license number, which has its own composition rule.
//! A malformed row is skipped, never fatal to the dataset.

use tracing::debug;

use crate::config::AgencyConfig;
use crate::mapping::MappingResolver;
use crate::record::{CanonicalRecord, HeaderMapping, MappingValue};

const BOARD_COLUMN: &str = "BOARD";
const OCCUPATION_COLUMN: &str = "OCCUPATION";
const CERTIFICATE_COLUMN: &str = "CERTIFICATE #";

/// Normalizes one dataset. Resolves the header mapping for `dataset_key`
/// via the resolver (which never fails), then extracts one record per
/// surviving data row, in input order.
pub async fn normalize(
    resolver: &MappingResolver,
    agency: &AgencyConfig,
    dataset_key: &str,
    raw_table: &str,
) -> Vec<CanonicalRecord> {
    let mut lines = raw_table.lines();
    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let headers: Vec<&str> = header_line.split('\t').collect();

    let mapping = resolver.resolve(dataset_key).await;

    let mut records = Vec::new();
    for (row_number, line) in lines.enumerate() {
        match extract_record(&headers, line, &mapping, agency) {
            Some(record) => records.push(record),
            None => {
                debug!(dataset = dataset_key, row = row_number, "skipped malformed row");
            }
        }
    }
    records
}

fn column_index(headers: &[&str], name: &str) -> Option<usize> {
    headers.iter().position(|h| *h == name)
}

fn field_at<'a>(fields: &'a [&'a str], index: Option<usize>) -> Option<&'a str> {
    index.and_then(|i| fields.get(i).copied())
}

/// Applies one mapping value against a data row: literals pass through,
/// column references read the row at the header's position, trimmed, empty
/// when the column is missing or the row is short.
fn apply(value: &MappingValue, headers: &[&str], fields: &[&str]) -> String {
    match value {
        MappingValue::Literal(s) => s.clone(),
        MappingValue::Column(name) => field_at(fields, column_index(headers, name))
            .map(|v| v.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Board + occupation + certificate concatenated, in that order with no
/// separator, when all three columns exist; the registry reuses certificate
/// numbers across boards and occupations, so the bare number does not
/// identify a license. Falls back to the mapped license-number value.
fn compose_license_number(
    mapping: &HeaderMapping,
    headers: &[&str],
    fields: &[&str],
) -> String {
    let board_idx = column_index(headers, BOARD_COLUMN);
    let occupation_idx = column_index(headers, OCCUPATION_COLUMN);
    let certificate_idx = column_index(headers, CERTIFICATE_COLUMN);

    if let (Some(b), Some(o), Some(c)) = (board_idx, occupation_idx, certificate_idx) {
        let board = fields.get(b).copied().unwrap_or("");
        let occupation = fields.get(o).copied().unwrap_or("");
        let certificate = fields.get(c).copied().unwrap_or("");
        return format!("{board}{occupation}{certificate}");
    }

    apply(&mapping.license_number, headers, fields)
}

fn extract_record(
    headers: &[&str],
    line: &str,
    mapping: &HeaderMapping,
    agency: &AgencyConfig,
) -> Option<CanonicalRecord> {
    if line.trim().is_empty() {
        return None;
    }
    let fields: Vec<&str> = line.split('\t').collect();

    Some(CanonicalRecord {
        agency_name: apply(&mapping.agency_name, headers, &fields),
        bbb_id: agency.bbb_id.clone(),
        agency_id: apply(&mapping.agency_id, headers, &fields),
        agency_url: apply(&mapping.agency_url, headers, &fields),
        tob_id: apply(&mapping.tob_id, headers, &fields),
        state_established: apply(&mapping.state_established, headers, &fields),
        business_name: apply(&mapping.business_name, headers, &fields),
        street: apply(&mapping.street, headers, &fields),
        city: apply(&mapping.city, headers, &fields),
        zip: apply(&mapping.zip, headers, &fields),
        date_established: apply(&mapping.date_established, headers, &fields),
        category: apply(&mapping.category, headers, &fields),
        license_number: compose_license_number(mapping, headers, &fields),
        phone_number: apply(&mapping.phone_number, headers, &fields),
        owner_first_name: apply(&mapping.owner_first_name, headers, &fields),
        owner_last_name: apply(&mapping.owner_last_name, headers, &fields),
        expiration_date: apply(&mapping.expiration_date, headers, &fields),
        license_status: apply(&mapping.license_status, headers, &fields),
        county: apply(&mapping.county, headers, &fields),
    })
}
