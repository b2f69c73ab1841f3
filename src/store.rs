//! Postgres-backed header-mapping store.
//!
//! One row per dataset family in `header_mappings`, joined to
//! `licensing_agencies` for the agency id and the aggregator (BBB) filter.
//! Stored values are plain text: identity fields hold literals, data fields
//! hold either a source-column name or `NA` for "no source, leave empty".

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::contract::{LookupError, MappingStore};
use crate::record::{HeaderMapping, MappingValue};

const MAPPING_QUERY: &str = r#"
SELECT la.agency_id::text AS agency_id,
    hm.agency_name,
    hm.agency_url,
    hm.tobid,
    hm.state,
    hm.business_name,
    hm.street,
    hm.zip,
    hm.date_established,
    hm.category,
    hm.license_number,
    hm.phone_number,
    hm.owner_first_name,
    hm.owner_last_name,
    hm.expiration_date,
    hm.license_status,
    hm.county
FROM public.header_mappings AS hm
JOIN licensing_agencies la ON hm.agency_name = la.agency_name
WHERE hm.dataset LIKE $1
  AND ($2::text IS NULL OR la.bbb_id = $2)
ORDER BY hm.dataset
"#;

pub struct PgMappingStore {
    pool: PgPool,
    /// When set, lookups only match mappings for this aggregator region.
    bbb_id: Option<String>,
}

impl PgMappingStore {
    /// Connects to the store described by `config`. A missing password is
    /// reported as `Unavailable` so the caller can degrade instead of
    /// holding a half-configured pool.
    pub async fn connect(
        config: &StoreConfig,
        bbb_id: Option<&str>,
    ) -> Result<Self, LookupError> {
        let url = config
            .connection_url()
            .ok_or_else(|| LookupError::Unavailable("no password configured".to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await?;
        info!(host = %config.host, database = %config.database, "connected to mapping store");
        Ok(PgMappingStore {
            pool,
            bbb_id: bbb_id.map(str::to_string),
        })
    }
}

#[async_trait]
impl MappingStore for PgMappingStore {
    async fn mapping_for(
        &self,
        dataset_key: &str,
    ) -> Result<Option<HeaderMapping>, LookupError> {
        let row = sqlx::query(MAPPING_QUERY)
            .bind(format!("{dataset_key}%"))
            .bind(self.bbb_id.as_deref())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            debug!(dataset = %dataset_key, "no header mapping row");
            return Ok(None);
        };

        let literal = |column: &str| -> Result<MappingValue, sqlx::Error> {
            let value: Option<String> = row.try_get(column)?;
            Ok(MappingValue::Literal(value.unwrap_or_default()))
        };
        // Data fields name a source column; `NA`, empty or NULL means the
        // field has no source in this dataset and stays empty.
        let source = |column: &str| -> Result<MappingValue, sqlx::Error> {
            let value: Option<String> = row.try_get(column)?;
            Ok(match value.as_deref() {
                None | Some("") | Some("NA") => MappingValue::Literal(String::new()),
                Some(name) => MappingValue::Column(name.to_string()),
            })
        };

        let mapping = HeaderMapping {
            agency_name: literal("agency_name")?,
            agency_id: literal("agency_id")?,
            agency_url: literal("agency_url")?,
            tob_id: literal("tobid")?,
            state_established: literal("state")?,
            business_name: source("business_name")?,
            street: source("street")?,
            // The store schema predates the city field; datasets carrying
            // one use the registry's conventional column name.
            city: MappingValue::column("CITY"),
            zip: source("zip")?,
            date_established: source("date_established")?,
            category: source("category")?,
            license_number: source("license_number")?,
            phone_number: source("phone_number")?,
            owner_first_name: source("owner_first_name")?,
            owner_last_name: source("owner_last_name")?,
            expiration_date: source("expiration_date")?,
            license_status: source("license_status")?,
            county: source("county")?,
        };
        Ok(Some(mapping))
    }
}

/// Stand-in store for runs without credentials: every lookup fails with
/// `Unavailable`, which the resolver absorbs into the fallback mapping.
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        UnavailableStore {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl MappingStore for UnavailableStore {
    async fn mapping_for(
        &self,
        _dataset_key: &str,
    ) -> Result<Option<HeaderMapping>, LookupError> {
        Err(LookupError::Unavailable(self.reason.clone()))
    }
}
