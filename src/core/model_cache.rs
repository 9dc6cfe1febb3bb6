use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::api::ModelInfo;

/// Per-server model listings reused for a fixed time. A zero TTL stores nothing.
#[derive(Debug, Default)]
pub struct ModelCache {
    ttl: Duration,
    entries: HashMap<String, (Instant, Vec<ModelInfo>)>,
}

impl ModelCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, server_id: &str) -> Option<&[ModelInfo]> {
        let (stored_at, models) = self.entries.get(server_id)?;
        (stored_at.elapsed() < self.ttl).then_some(models.as_slice())
    }

    pub fn insert(&mut self, server_id: &str, models: Vec<ModelInfo>) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries
            .insert(server_id.to_string(), (Instant::now(), models));
    }

    pub fn invalidate(&mut self, server_id: &str) {
        self.entries.remove(server_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "llama3".to_string(),
            created: None,
            created_at: None,
            owned_by: None,
            display_name: None,
        }]
    }

    #[test]
    fn zero_ttl_never_caches() {
        let mut cache = ModelCache::new(Duration::ZERO);
        cache.insert("a", models());
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn entries_expire_and_can_be_invalidated() {
        let mut cache = ModelCache::new(Duration::from_secs(60));
        cache.insert("a", models());
        assert_eq!(cache.get("a").map(<[ModelInfo]>::len), Some(1));
        cache.invalidate("a");
        assert!(cache.get("a").is_none());

        let mut short = ModelCache::new(Duration::from_millis(1));
        short.insert("a", models());
        std::thread::sleep(Duration::from_millis(5));
        assert!(short.get("a").is_none());
    }
}
