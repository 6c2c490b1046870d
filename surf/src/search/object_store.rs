use tracing::{debug, info, trace};

use crate::backends::ObjectStoreClient;
use crate::errors::SurfResult;
use crate::metrics::SearchMetrics;
use crate::results::BucketSearchOutput;
use crate::search::fanout::{scatter_gather, select_resources};
use crate::search::input::BucketSearchInput;
use crate::search::matcher::Matcher;

/// Fan-out search of object keys across buckets.
pub struct BucketSearcher<C, M> {
    client: C,
    matcher: M,
    metrics: SearchMetrics,
}

impl<C: ObjectStoreClient, M: Matcher> BucketSearcher<C, M> {
    pub fn new(client: C, matcher: M) -> Self {
        Self {
            client,
            matcher,
            metrics: SearchMetrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: SearchMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    pub fn search(&self, input: &BucketSearchInput) -> SurfResult<BucketSearchOutput> {
        let search = &input.search;
        self.matcher.is_match(&search.pattern, "")?;

        let buckets = self.client.list_buckets()?;
        let selected = select_resources(
            &self.matcher,
            "buckets",
            buckets,
            |b| b.as_str(),
            &search.scope,
            input.limits,
        )?;
        if selected.is_empty() {
            info!(pattern = %search.scope, "no buckets selected");
            return Ok(BucketSearchOutput::default());
        }

        info!(
            buckets = selected.len(),
            parallel = search.parallel,
            "searching buckets"
        );
        let bucket_to_matches = scatter_gather(
            &selected,
            |b| b.clone(),
            search.parallel,
            search.fail_fast,
            &self.metrics,
            |bucket| self.search_bucket(bucket, &input.prefix, &search.pattern),
        )?;
        self.metrics.log_stats();

        Ok(BucketSearchOutput { bucket_to_matches })
    }

    /// Lists every page of `bucket` under `prefix` and keeps matching keys.
    pub fn search_bucket(&self, bucket: &str, prefix: &str, pattern: &str) -> SurfResult<Vec<String>> {
        let mut matches = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.client.list_objects(bucket, prefix, token.as_deref())?;
            self.metrics.record_page();
            self.metrics.record_items(page.keys.len() as u64);
            trace!(bucket, keys = page.keys.len(), "listed page");

            for key in page.keys {
                if self.matcher.is_match(pattern, &key)? {
                    matches.push(key);
                }
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(bucket, matches = matches.len(), "bucket done");
        Ok(matches)
    }
}
