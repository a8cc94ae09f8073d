//! Short-lived UTXO reservations
//!
//! Inputs chosen by a built but not yet submitted transaction are recorded
//! per sender so that the next request from the same sender skips them.

use std::collections::HashMap;
use std::time::Duration;

use bridge_core::TxInputRef;
use tokio::sync::Mutex;
use tokio::time::Instant;

type SenderEntries = HashMap<String, (TxInputRef, Instant)>;

/// Per-sender reservation cache with lazy expiry.
///
/// Expired entries are swept on every `add` and `get` for the sender; there
/// is no background timer. Each call takes the lock once, so a `get` used for
/// selection followed by an `add` for the chosen inputs is not atomic: two
/// concurrent requests for the same sender can both see the same free inputs.
#[derive(Debug)]
pub struct UtxoCache {
    timeout: Duration,
    entries: Mutex<HashMap<String, SenderEntries>>,
}

impl UtxoCache {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve `inputs` for `sender`, refreshing the timestamp of known ones
    pub async fn add(&self, sender: &str, inputs: &[TxInputRef]) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let reserved = entries.entry(sender.to_string()).or_default();

        self.evict_expired(sender, reserved, now);

        for input in inputs {
            reserved.insert(input.key(), (input.clone(), now));
        }

        tracing::debug!(sender, added = inputs.len(), reserved = reserved.len(), "Reserved UTXOs");
    }

    /// Inputs currently reserved for `sender`; empty for unknown senders
    pub async fn get(&self, sender: &str) -> Vec<TxInputRef> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let Some(reserved) = entries.get_mut(sender) else {
            return Vec::new();
        };

        self.evict_expired(sender, reserved, now);

        if reserved.is_empty() {
            entries.remove(sender);
            return Vec::new();
        }

        reserved.values().map(|(input, _)| input.clone()).collect()
    }

    fn evict_expired(&self, sender: &str, reserved: &mut SenderEntries, now: Instant) {
        let before = reserved.len();
        reserved.retain(|_, (_, reserved_at)| now.duration_since(*reserved_at) < self.timeout);

        let evicted = before - reserved.len();
        if evicted > 0 {
            tracing::debug!(sender, evicted, "Evicted expired UTXO reservations");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(index: u32) -> TxInputRef {
        TxInputRef::new("0f".repeat(32), index)
    }

    fn sorted(mut inputs: Vec<TxInputRef>) -> Vec<TxInputRef> {
        inputs.sort_by_key(|i| i.index);
        inputs
    }

    #[tokio::test]
    async fn test_unknown_sender_is_empty() {
        let cache = UtxoCache::new(Duration::from_secs(60));
        assert!(cache.get("addr_nobody").await.is_empty());
    }

    #[tokio::test]
    async fn test_senders_are_isolated() {
        let cache = UtxoCache::new(Duration::from_secs(60));
        cache.add("addr_a", &[input(0), input(1)]).await;
        cache.add("addr_b", &[input(2)]).await;

        assert_eq!(sorted(cache.get("addr_a").await), vec![input(0), input(1)]);
        assert_eq!(cache.get("addr_b").await, vec![input(2)]);
    }

    #[tokio::test]
    async fn test_duplicate_inputs_are_upserted() {
        let cache = UtxoCache::new(Duration::from_secs(60));
        cache.add("addr_a", &[input(0)]).await;
        cache.add("addr_a", &[input(0), input(0)]).await;
        assert_eq!(cache.get("addr_a").await, vec![input(0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_at_timeout() {
        let cache = UtxoCache::new(Duration::from_secs(60));
        cache.add("addr_a", &[input(0)]).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("addr_a").await, vec![input(0)]);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("addr_a").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_sweeps_expired_and_refreshes() {
        let cache = UtxoCache::new(Duration::from_secs(60));
        cache.add("addr_a", &[input(0), input(1)]).await;

        tokio::time::advance(Duration::from_secs(40)).await;
        cache.add("addr_a", &[input(1), input(2)]).await;

        // input 0 reaches its timeout, input 1 was refreshed
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(sorted(cache.get("addr_a").await), vec![input(1), input(2)]);

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(cache.get("addr_a").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_never_resurface_after_add() {
        let cache = UtxoCache::new(Duration::from_secs(10));
        cache.add("addr_a", &[input(0)]).await;

        tokio::time::advance(Duration::from_secs(10)).await;
        cache.add("addr_a", &[input(5)]).await;

        assert_eq!(cache.get("addr_a").await, vec![input(5)]);
    }
}
