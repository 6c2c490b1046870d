use tracing::{debug, info};

use crate::backends::KvClient;
use crate::errors::SurfResult;
use crate::metrics::SearchMetrics;
use crate::results::KvSearchOutput;
use crate::search::input::SearchInput;
use crate::search::matcher::Matcher;

/// Prefix search over a flat key-value store. `input.scope` is the prefix.
pub struct KvSearcher<C, M> {
    client: C,
    matcher: M,
    metrics: SearchMetrics,
}

impl<C: KvClient, M: Matcher> KvSearcher<C, M> {
    pub fn new(client: C, matcher: M) -> Self {
        Self {
            client,
            matcher,
            metrics: SearchMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    pub fn search(&self, input: &SearchInput) -> SurfResult<KvSearchOutput> {
        self.matcher.is_match(&input.pattern, "")?;

        let keys = self.client.list_keys(&input.scope)?;
        self.metrics.record_page();
        self.metrics.record_items(keys.len() as u64);
        debug!(prefix = %input.scope, keys = keys.len(), "listed keys");

        let mut matches = Vec::new();
        for key in keys {
            if self.matcher.is_match(&input.pattern, &key)? {
                matches.push(key);
            }
        }
        self.metrics.record_resource();
        self.metrics.record_matches(matches.len() as u64);

        info!(matches = matches.len(), "kv search finished");
        self.metrics.log_stats();
        Ok(KvSearchOutput { matches })
    }
}
