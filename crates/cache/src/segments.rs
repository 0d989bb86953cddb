//! In-process segment cache: the recipient list of every segment produced by
//! the latest campaign execution, keyed by cluster id.
//!
//! The cache is split into a single [`SegmentWriter`] (owned by the
//! segmentation engine) and cloneable [`SegmentReader`]s (used by the
//! disperser). A write replaces the whole map in one swap, so readers see
//! either the previous execution or the new one, never a mix. Two executions
//! racing each other are not serialized: whichever swaps last wins.

use campaign_core::types::CachedCustomer;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Staged recipient lists, one per cluster id.
pub type SegmentMap = HashMap<usize, Vec<CachedCustomer>>;

type Snapshot = Arc<HashMap<usize, Arc<Vec<CachedCustomer>>>>;

struct Shared {
    current: RwLock<Snapshot>,
    generation: AtomicU64,
}

/// Entry point for building a writer/reader pair over one shared store.
pub struct SegmentCache;

impl SegmentCache {
    pub fn new() -> (SegmentWriter, SegmentReader) {
        let shared = Arc::new(Shared {
            current: RwLock::new(Arc::new(HashMap::new())),
            generation: AtomicU64::new(0),
        });
        (
            SegmentWriter {
                shared: shared.clone(),
            },
            SegmentReader { shared },
        )
    }
}

/// Sole write handle. Not `Clone`.
pub struct SegmentWriter {
    shared: Arc<Shared>,
}

impl SegmentWriter {
    /// Discard every cached segment and install `segments` in their place.
    /// Returns the new generation number.
    pub fn replace_all(&self, segments: SegmentMap) -> u64 {
        let snapshot: Snapshot = Arc::new(
            segments
                .into_iter()
                .map(|(id, customers)| (id, Arc::new(customers)))
                .collect(),
        );
        let segment_count = snapshot.len();
        let customer_count: usize = snapshot.values().map(|c| c.len()).sum();

        *self.shared.current.write() = snapshot;
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        metrics::gauge!("segment_cache.segments").set(segment_count as f64);
        metrics::gauge!("segment_cache.customers").set(customer_count as f64);
        info!(
            generation,
            segments = segment_count,
            customers = customer_count,
            "Segment cache replaced"
        );
        generation
    }

    pub fn reader(&self) -> SegmentReader {
        SegmentReader {
            shared: self.shared.clone(),
        }
    }
}

/// Read-only view of the latest segments.
#[derive(Clone)]
pub struct SegmentReader {
    shared: Arc<Shared>,
}

impl SegmentReader {
    pub fn get(&self, cluster_id: usize) -> Option<Arc<Vec<CachedCustomer>>> {
        self.shared.current.read().get(&cluster_id).cloned()
    }

    /// Cluster ids currently cached, ascending.
    pub fn segment_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.shared.current.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of completed replacements since start-up.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.shared.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.current.read().is_empty()
    }
}
