use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info};

use crate::error::IngestionError;

/// Single-slot store for the last element scan pushed by the browser
/// extension. Diagnostic only; the session never reads it.
///
/// Last writer wins and every ingestion resets the slot, so a malformed
/// payload leaves the cache empty rather than stale.
#[derive(Default)]
pub struct ElementCache {
    slot: Mutex<Option<Value>>,
}

impl ElementCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Value>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn ingest(&self, payload: &[u8]) -> Result<(), IngestionError> {
        let mut slot = self.lock();
        match serde_json::from_slice::<Value>(payload) {
            Ok(elements) => {
                *slot = Some(elements);
                info!("Elements successfully stored.");
                Ok(())
            }
            Err(e) => {
                *slot = None;
                error!("Error decoding element scan JSON: {}", e);
                Err(e.into())
            }
        }
    }

    pub fn snapshot(&self) -> Option<Value> {
        self.lock().clone()
    }
}
