//! license-collect: collects state license-registry datasets, normalizes
//! them into one canonical record shape and bulk-uploads the result to the
//! Visual Knowledge ingestion API.

pub mod collect;
pub mod config;
pub mod contract;
pub mod mapping;
pub mod normalize;
pub mod record;
pub mod store;
pub mod supplier;
pub mod upload;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use collect::Collector;
use config::{AgencyConfig, CollectSettings, StoreConfig, UploadSettings};
use contract::MappingStore;
use mapping::MappingResolver;
use store::{PgMappingStore, UnavailableStore};
use supplier::{HttpSourceFetcher, RegulantPageSupplier};
use upload::{BulkUploader, HttpBatchTransport};

#[derive(Parser)]
#[clap(
    name = "license-collect",
    version,
    about = "Collect, normalize and upload state license-registry data"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a collection pass over the registry's dataset files
    Collect {
        /// Save the collected records to a CSV file
        #[clap(long)]
        save_csv: bool,
        /// CSV output path (default: data/dpor_data_<timestamp>.csv)
        #[clap(long)]
        csv_path: Option<PathBuf>,
        /// Upload the collected records to the ingestion API
        #[clap(long)]
        upload: bool,
        /// Exercise the upload formatting without transmitting anything
        #[clap(long)]
        dry_run: bool,
        /// Only process the dataset with this key (e.g. "0402a")
        #[clap(long)]
        dataset: Option<String>,
        /// Override the registry page to scrape for data links
        #[clap(long)]
        links_url: Option<String>,
    },
}

/// Async CLI entrypoint, shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Collect {
            save_csv,
            csv_path,
            upload,
            dry_run,
            dataset,
            links_url,
        } => {
            let agency = AgencyConfig::va_dpor();

            let store: Arc<dyn MappingStore> = match PgMappingStore::connect(
                &StoreConfig::resolve(),
                Some(&agency.bbb_id),
            )
            .await
            {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    warn!(error = %e, "mapping store unavailable, fallback mapping only");
                    Arc::new(UnavailableStore::new(e.to_string()))
                }
            };
            let resolver = MappingResolver::new(store, config::fallback_mapping(&agency));

            let settings = CollectSettings {
                dataset_filter: dataset,
                ..CollectSettings::default()
            };
            let page_url = links_url.unwrap_or_else(|| agency.registry_url.clone());
            let supplier = RegulantPageSupplier::new(&page_url, settings.fetch_timeout)?;
            let fetcher = HttpSourceFetcher::new(settings.fetch_timeout)?;

            let mut collector = Collector::new(
                Arc::new(supplier),
                Arc::new(fetcher),
                resolver,
                agency,
                settings,
            );
            collector.collect().await;

            if collector.records().is_empty() {
                warn!("no records collected");
                anyhow::bail!("no records collected");
            }

            if save_csv {
                let path = collector.save_csv(csv_path.as_deref())?;
                info!(path = %path.display(), "csv saved");
            }

            if upload || dry_run {
                let upload_settings = UploadSettings::default();
                let transport = HttpBatchTransport::new(&upload_settings)?;
                let uploader = BulkUploader::new(Arc::new(transport), upload_settings);
                let outcome = uploader.upload(collector.records(), dry_run).await;
                if outcome.success {
                    info!(uploaded = outcome.uploaded, "upload successful");
                } else {
                    error!(
                        failed_batches = outcome.failed_batches,
                        "upload failed"
                    );
                    anyhow::bail!("upload failed");
                }
            }

            Ok(())
        }
    }
}
