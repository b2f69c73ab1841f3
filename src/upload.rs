//! Bulk upload: partitions a record set into fixed-size batches, transmits
//! each independently and reports aggregate statistics.
//!
//! Batches are sent in index order but share no fate: a failed batch is
//! counted and the run continues. The overall run reports success when at
//! least one batch lands.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::{CountMode, UploadSettings};
use crate::contract::{BatchTransport, TransportError};
use crate::record::CanonicalRecord;

/// Aggregate outcome of one upload run. Immutable once computed.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    /// True when at least one batch was accepted (or the run was a dry run).
    pub success: bool,
    pub total: usize,
    /// Accepted-record count; see [`CountMode`] for how partial failures
    /// are reconciled.
    pub uploaded: usize,
    pub successful_batches: usize,
    pub failed_batches: usize,
    /// Percentage of batches accepted.
    pub success_rate: f64,
    pub dry_run: bool,
}

impl UploadOutcome {
    fn empty_input() -> Self {
        UploadOutcome {
            success: false,
            total: 0,
            uploaded: 0,
            successful_batches: 0,
            failed_batches: 0,
            success_rate: 0.0,
            dry_run: false,
        }
    }
}

/// Sends record sets to the ingestion endpoint through a [`BatchTransport`].
pub struct BulkUploader {
    transport: Arc<dyn BatchTransport>,
    settings: UploadSettings,
}

impl BulkUploader {
    pub fn new(transport: Arc<dyn BatchTransport>, settings: UploadSettings) -> Self {
        BulkUploader {
            transport,
            settings,
        }
    }

    /// Uploads `records` in batches of `settings.batch_size`. Never fails:
    /// the outcome's own fields carry the success/failure signal.
    pub async fn upload(&self, records: &[CanonicalRecord], dry_run: bool) -> UploadOutcome {
        if records.is_empty() {
            warn!("no records to upload");
            return UploadOutcome::empty_input();
        }

        info!(total = records.len(), "preparing upload");

        if dry_run {
            info!("dry run mode, not uploading");
            match serde_json::to_string_pretty(&records[0]) {
                Ok(sample) => info!(sample = %sample, "sample record"),
                Err(e) => error!(error = %e, "could not serialize sample record"),
            }
            return UploadOutcome {
                success: true,
                total: records.len(),
                uploaded: 0,
                successful_batches: 0,
                failed_batches: 0,
                success_rate: 0.0,
                dry_run: true,
            };
        }

        let batch_size = self.settings.batch_size;
        let total_batches = records.len().div_ceil(batch_size);
        info!(
            batches = total_batches,
            batch_size, "uploading in batches"
        );

        let mut successful_batches = 0usize;
        let mut failed_batches = 0usize;
        let mut exact_uploaded = 0usize;

        for (index, batch) in records.chunks(batch_size).enumerate() {
            let batch_number = index + 1;
            if self.send_with_retries(batch, batch_number).await {
                successful_batches += 1;
                exact_uploaded += batch.len();
            } else {
                failed_batches += 1;
            }
        }

        let uploaded = match self.settings.count_mode {
            CountMode::Approximate => {
                if successful_batches == total_batches {
                    records.len()
                } else {
                    // Legacy accounting: the short trailing batch is not
                    // special-cased, so this can overstate on partial runs.
                    successful_batches * batch_size
                }
            }
            CountMode::Exact => exact_uploaded,
        };

        let success_rate = if total_batches > 0 {
            successful_batches as f64 / total_batches as f64 * 100.0
        } else {
            0.0
        };

        info!(
            total = records.len(),
            successful_batches,
            failed_batches,
            total_batches,
            success_rate = format!("{success_rate:.1}"),
            "upload summary"
        );

        UploadOutcome {
            success: successful_batches > 0,
            total: records.len(),
            uploaded,
            successful_batches,
            failed_batches,
            success_rate,
            dry_run: false,
        }
    }

    async fn send_with_retries(&self, batch: &[CanonicalRecord], batch_number: usize) -> bool {
        let attempts = self.settings.max_retries + 1;
        for attempt in 1..=attempts {
            match self.transport.send(batch).await {
                Ok(()) => return true,
                Err(e) if e.is_timeout() => {
                    error!(batch = batch_number, attempt, "batch timed out");
                }
                Err(e) => {
                    warn!(batch = batch_number, attempt, error = %e, "batch failed");
                }
            }
        }
        false
    }
}

/// Production transport: HTTP POST of `{"results": [record, ...]}` to the
/// ingestion endpoint, one request per batch, bounded by a request timeout.
pub struct HttpBatchTransport {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpBatchTransport {
    pub fn new(settings: &UploadSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            // The portal terminates TLS with a certificate that does not
            // validate; the legacy uploader shipped with verification off.
            .danger_accept_invalid_certs(true)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;
        Ok(HttpBatchTransport {
            client,
            endpoint: settings.endpoint.clone(),
            timeout: settings.timeout,
        })
    }
}

#[async_trait]
impl BatchTransport for HttpBatchTransport {
    async fn send(&self, batch: &[CanonicalRecord]) -> Result<(), TransportError> {
        let payload = json!({ "results": batch });
        let response = self
            .client
            .post(&self.endpoint)
            .header("Origin", "https://visualknowledgeportal.com")
            .header("Referer", "https://visualknowledgeportal.com/")
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(response.status()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockBatchTransport;

    fn record(n: usize) -> CanonicalRecord {
        CanonicalRecord {
            agency_name: "VA - DPOR".into(),
            bbb_id: "0241".into(),
            agency_id: "3838".into(),
            agency_url: "https://www.dpor.virginia.gov/".into(),
            tob_id: String::new(),
            state_established: "VA".into(),
            business_name: format!("Business {n}"),
            street: String::new(),
            city: String::new(),
            zip: String::new(),
            date_established: String::new(),
            category: String::new(),
            license_number: format!("270501{n:04}"),
            phone_number: String::new(),
            owner_first_name: String::new(),
            owner_last_name: String::new(),
            expiration_date: String::new(),
            license_status: "Active".into(),
            county: String::new(),
        }
    }

    fn records(n: usize) -> Vec<CanonicalRecord> {
        (0..n).map(record).collect()
    }

    #[tokio::test]
    async fn empty_input_makes_no_network_call() {
        let mut transport = MockBatchTransport::new();
        transport.expect_send().times(0);
        let uploader = BulkUploader::new(Arc::new(transport), UploadSettings::default());

        let outcome = uploader.upload(&[], false).await;
        assert!(!outcome.success);
        assert_eq!(outcome.total, 0);
        assert_eq!(outcome.uploaded, 0);
    }

    #[tokio::test]
    async fn dry_run_makes_no_network_call() {
        let mut transport = MockBatchTransport::new();
        transport.expect_send().times(0);
        let uploader = BulkUploader::new(Arc::new(transport), UploadSettings::default());

        let outcome = uploader.upload(&records(3), true).await;
        assert!(outcome.success);
        assert!(outcome.dry_run);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.uploaded, 0);
    }

    #[tokio::test]
    async fn short_trailing_batch_is_sent_separately() {
        let mut transport = MockBatchTransport::new();
        transport
            .expect_send()
            .withf(|batch| batch.len() == 5 || batch.len() == 2)
            .times(3)
            .returning(|_| Ok(()));
        let settings = UploadSettings {
            batch_size: 5,
            ..UploadSettings::default()
        };
        let uploader = BulkUploader::new(Arc::new(transport), settings);

        let outcome = uploader.upload(&records(12), false).await;
        assert_eq!(outcome.successful_batches, 3);
        assert_eq!(outcome.failed_batches, 0);
        assert_eq!(outcome.uploaded, 12);
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn retries_are_attempted_before_counting_failure() {
        let mut transport = MockBatchTransport::new();
        // One batch, two attempts (1 retry), both fail.
        transport
            .expect_send()
            .times(2)
            .returning(|_| Err(TransportError::Status(reqwest::StatusCode::BAD_GATEWAY)));
        let settings = UploadSettings {
            batch_size: 10,
            max_retries: 1,
            ..UploadSettings::default()
        };
        let uploader = BulkUploader::new(Arc::new(transport), settings);

        let outcome = uploader.upload(&records(4), false).await;
        assert!(!outcome.success);
        assert_eq!(outcome.failed_batches, 1);
        assert_eq!(outcome.uploaded, 0);
    }
}
