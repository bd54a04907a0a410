//! In-process serialisation of chain advancements
//!
//! Two reviews touching the same linked object inside one process must not
//! interleave their fetch -> decide -> write sequences. The remote conditional
//! insert covers reviews running in different processes.

use approval_types::LinkedFamily;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type ChainKey = (LinkedFamily, u64);

/// Lock per (family, object id); entries are dropped once nobody holds them
#[derive(Default)]
pub struct ClaimRegistry {
    chains: Mutex<HashMap<ChainKey, Arc<AsyncMutex<()>>>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of one object's chain
    pub async fn acquire(&self, family: LinkedFamily, object_id: u64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut chains = self.chains.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            chains.retain(|_, lock| Arc::strong_count(lock) > 1);
            chains
                .entry((family, object_id))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }

    /// Chains currently locked or waited on
    pub fn active_chains(&self) -> usize {
        let chains = self.chains.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        chains.values().filter(|lock| Arc::strong_count(lock) > 1).count()
    }
}
