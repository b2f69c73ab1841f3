//! Header-mapping resolution: dataset-key normalization plus the
//! degrade-to-default lookup against the mapping store.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, error};

use crate::contract::MappingStore;
use crate::record::HeaderMapping;

/// Normalizes a raw dataset key for store lookup: a space is inserted at
/// every digit-run/letter-run boundary, then the whole key is upper-cased.
/// `"0402a"` becomes `"0402 A"`, `"12ab3cd"` becomes `"12 AB3 CD"`.
pub fn normalize_dataset_key(raw: &str) -> String {
    // Fixed transform, shared with the store's LIKE-prefix convention.
    let boundary = Regex::new(r"(\d+)([a-zA-Z]+)").expect("static regex");
    boundary.replace_all(raw, "$1 $2").to_uppercase()
}

/// Resolves header mappings for dataset keys, falling back to an injected
/// default whenever the store misses or fails.
///
/// `resolve` is deliberately infallible: mapping metadata being incomplete
/// or the store being down must not stop a collection run, so every failure
/// path is absorbed into the fallback.
pub struct MappingResolver {
    store: Arc<dyn MappingStore>,
    fallback: HeaderMapping,
}

impl MappingResolver {
    pub fn new(store: Arc<dyn MappingStore>, fallback: HeaderMapping) -> Self {
        MappingResolver { store, fallback }
    }

    pub async fn resolve(&self, dataset_key: &str) -> HeaderMapping {
        let key = normalize_dataset_key(dataset_key);

        match self.store.mapping_for(&key).await {
            Ok(Some(mapping)) => {
                debug!(dataset = %key, "header mapping found in store");
                mapping
            }
            Ok(None) => {
                // Misses are common for new datasets; not worth a warning.
                debug!(dataset = %key, "no header mapping in store, using fallback");
                self.fallback.clone()
            }
            Err(e) => {
                error!(dataset = %key, error = %e, "mapping lookup failed, using fallback");
                self.fallback.clone()
            }
        }
    }
}
