//! Canonical record shape and the header-mapping table that produces it.
//!
//! Every downstream consumer (CSV export, the bulk-upload payload) relies on
//! the record carrying a stable set of columns in a stable order, so all
//! fields are plain `String`s that are always present — empty, never absent.

use serde::{Deserialize, Serialize};

/// One normalized row of license data.
///
/// Field order here is the column order of the CSV export and the key set of
/// each JSON object in an upload batch. Serialized names use the spaced
/// display form the ingestion API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(rename = "Agency Name")]
    pub agency_name: String,
    #[serde(rename = "BBB ID")]
    pub bbb_id: String,
    #[serde(rename = "Agency ID")]
    pub agency_id: String,
    #[serde(rename = "Agency URL")]
    pub agency_url: String,
    #[serde(rename = "TOB ID")]
    pub tob_id: String,
    #[serde(rename = "State Established")]
    pub state_established: String,
    #[serde(rename = "Business Name")]
    pub business_name: String,
    #[serde(rename = "Street")]
    pub street: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Zip")]
    pub zip: String,
    #[serde(rename = "Date Established")]
    pub date_established: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "License Number")]
    pub license_number: String,
    #[serde(rename = "Phone Number")]
    pub phone_number: String,
    #[serde(rename = "Owner First Name")]
    pub owner_first_name: String,
    #[serde(rename = "Owner Last Name")]
    pub owner_last_name: String,
    #[serde(rename = "Expiration Date")]
    pub expiration_date: String,
    #[serde(rename = "License Status")]
    pub license_status: String,
    #[serde(rename = "County")]
    pub county: String,
}

/// How one canonical field is populated from a raw dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingValue {
    /// Use this value verbatim for every row.
    Literal(String),
    /// Read the value from the named source column of each row.
    Column(String),
}

impl MappingValue {
    pub fn literal(s: &str) -> Self {
        MappingValue::Literal(s.to_string())
    }

    pub fn column(s: &str) -> Self {
        MappingValue::Column(s.to_string())
    }
}

/// Field-name translation table for one dataset family.
///
/// The mapping is total: every canonical field carries either a literal
/// default or a source-column reference. Resolved once per dataset at
/// normalization time and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMapping {
    pub agency_name: MappingValue,
    pub agency_id: MappingValue,
    pub agency_url: MappingValue,
    pub tob_id: MappingValue,
    pub state_established: MappingValue,
    pub business_name: MappingValue,
    pub street: MappingValue,
    pub city: MappingValue,
    pub zip: MappingValue,
    pub date_established: MappingValue,
    pub category: MappingValue,
    /// Fallback column for the license number when the board/occupation/
    /// certificate composition rule does not apply.
    pub license_number: MappingValue,
    pub phone_number: MappingValue,
    pub owner_first_name: MappingValue,
    pub owner_last_name: MappingValue,
    pub expiration_date: MappingValue,
    pub license_status: MappingValue,
    pub county: MappingValue,
}
