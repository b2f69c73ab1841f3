//! Collection orchestration: link set → raw tables → one canonical record
//! set, plus CSV persistence of the result.
//!
//! Every per-item failure (unmatched link, failed fetch) is logged and
//! skipped; a partial record set is always preferable to no record set.
//! Zero discovered links is a legitimate empty outcome, not an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use regex::Regex;
use tracing::{info, warn};

use crate::config::{AgencyConfig, CollectSettings};
use crate::contract::{LinkSupplier, SourceFetcher};
use crate::mapping::MappingResolver;
use crate::normalize::normalize;
use crate::record::CanonicalRecord;

/// Dataset token embedded in each file link: the path segment before the
/// `__crnt.txt` suffix.
const DATASET_KEY_PATTERN: &str = r"/(\w+?)__crnt\.txt";

/// Drives one collection run and holds the collected record set so it can
/// be saved or uploaded without re-collecting.
pub struct Collector {
    supplier: Arc<dyn LinkSupplier>,
    fetcher: Arc<dyn SourceFetcher>,
    resolver: MappingResolver,
    agency: AgencyConfig,
    settings: CollectSettings,
    collected: Vec<CanonicalRecord>,
}

impl Collector {
    pub fn new(
        supplier: Arc<dyn LinkSupplier>,
        fetcher: Arc<dyn SourceFetcher>,
        resolver: MappingResolver,
        agency: AgencyConfig,
        settings: CollectSettings,
    ) -> Self {
        Collector {
            supplier,
            fetcher,
            resolver,
            agency,
            settings,
            collected: Vec::new(),
        }
    }

    /// The record set from the most recent `collect` run.
    pub fn records(&self) -> &[CanonicalRecord] {
        &self.collected
    }

    /// Runs the full collection pass: obtain links, fetch each matching
    /// dataset, normalize, aggregate in supplier order.
    pub async fn collect(&mut self) -> &[CanonicalRecord] {
        info!(
            bbb_id = %self.agency.bbb_id,
            agency_id = %self.agency.agency_id,
            "starting collection run"
        );

        let links = match self.supplier.links().await {
            Ok(links) => links,
            Err(e) => {
                warn!(error = %e, "link discovery failed");
                Vec::new()
            }
        };
        if links.is_empty() {
            warn!("no data links found");
            self.collected = Vec::new();
            return &self.collected;
        }
        info!(count = links.len(), "found data file links");

        let key_pattern = Regex::new(DATASET_KEY_PATTERN).expect("static regex");

        let mut all_records = Vec::new();
        for link in &links {
            let Some(dataset_key) = key_pattern
                .captures(link)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
            else {
                warn!(link = %link, "no dataset key in link, skipping");
                continue;
            };

            if let Some(filter) = &self.settings.dataset_filter {
                if !dataset_key.eq_ignore_ascii_case(filter) {
                    continue;
                }
            }

            let Some(raw) = self.fetch_with_retries(link, &dataset_key).await else {
                continue;
            };

            let records = normalize(&self.resolver, &self.agency, &dataset_key, &raw).await;
            info!(dataset = %dataset_key, records = records.len(), "dataset normalized");
            all_records.extend(records);
        }

        info!(total = all_records.len(), "collection run complete");
        self.collected = all_records;
        &self.collected
    }

    async fn fetch_with_retries(&self, link: &str, dataset_key: &str) -> Option<String> {
        let attempts = self.settings.fetch_retries + 1;
        for attempt in 1..=attempts {
            match self.fetcher.fetch(link).await {
                Ok(raw) => return Some(raw),
                Err(e) => {
                    warn!(
                        dataset = %dataset_key,
                        link = %link,
                        attempt,
                        error = %e,
                        "dataset fetch failed"
                    );
                }
            }
        }
        None
    }

    /// Writes the collected records to CSV, header row first, columns in
    /// record field order. Defaults to a timestamped file under `data/`.
    pub fn save_csv(&self, path: Option<&Path>) -> anyhow::Result<PathBuf> {
        if self.collected.is_empty() {
            warn!("no data to save");
        }

        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
                PathBuf::from("data").join(format!("dpor_data_{timestamp}.csv"))
            }
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating output dir {}", parent.display()))?;
            }
        }

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        for record in &self.collected {
            writer.serialize(record)?;
        }
        writer.flush()?;

        info!(path = %path.display(), records = self.collected.len(), "data saved to csv");
        Ok(path)
    }
}
