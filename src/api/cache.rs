// file: src/api/cache.rs
// description: time-boxed per-identifier cache of metadata lookup verdicts
// reference: https://docs.rs/tokio/latest/tokio/sync/struct.Mutex.html

use crate::models::{DocumentMetadata, LookupResult};
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
enum Verdict {
    Found(DocumentMetadata),
    Expired(DocumentMetadata),
    Missing,
}

#[derive(Debug)]
pub struct LookupCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Verdict)>>,
}

impl LookupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Splits `ids` into a result assembled from fresh entries and the ids still to fetch.
    pub async fn partition(&self, ids: &BTreeSet<String>) -> (LookupResult, BTreeSet<String>) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, (stored_at, _)| now.duration_since(*stored_at) < self.ttl);

        let mut cached = LookupResult::empty();
        let mut pending = BTreeSet::new();
        for id in ids {
            match entries.get(id) {
                Some((_, Verdict::Found(meta))) => cached.found.push(meta.clone()),
                Some((_, Verdict::Expired(meta))) => cached.expired.push(meta.clone()),
                Some((_, Verdict::Missing)) => cached.missing.push(id.clone()),
                None => {
                    pending.insert(id.clone());
                }
            }
        }
        (cached, pending)
    }

    pub async fn store(&self, result: &LookupResult) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        for meta in &result.found {
            entries.insert(meta.lookup_id.clone(), (now, Verdict::Found(meta.clone())));
        }
        for meta in &result.expired {
            entries.insert(meta.lookup_id.clone(), (now, Verdict::Expired(meta.clone())));
        }
        for id in &result.missing {
            entries.insert(id.clone(), (now, Verdict::Missing));
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
