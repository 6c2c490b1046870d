//! Recursive search over a hierarchical secret store.
//!
//! The start scope is listed once and the resulting nodes are split into
//! contiguous chunks, one pool job per chunk. Each job expands its chunk
//! depth first until only leaves remain and sends the leaves to the caller,
//! which is the only place results are merged. Leaves are then filtered by
//! full path in parallel.
//!
//! Unlike the fan-out searchers, any listing error aborts the whole search.

use crossbeam_channel::bounded;
use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::backends::TreeClient;
use crate::errors::SurfResult;
use crate::metrics::SearchMetrics;
use crate::pool::WorkerPool;
use crate::results::{Node, TreeSearchOutput};
use crate::search::chunks::split_into_n_chunks;
use crate::search::input::SearchInput;
use crate::search::matcher::Matcher;

pub struct RecursiveSearcher<C, M> {
    client: C,
    matcher: M,
    metrics: SearchMetrics,
}

fn is_root_scope(scope: &str) -> bool {
    scope.trim_matches('/').trim_matches('.').is_empty()
}

impl<C: TreeClient, M: Matcher> RecursiveSearcher<C, M> {
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

    /// Lists the children of `scope`. The root scope lists storage mounts,
    /// each as a branch.
    pub fn list_filtered(&self, scope: &str) -> SurfResult<Vec<Node>> {
        self.metrics.record_page();
        if is_root_scope(scope) {
            let mounts = self.client.list_mounts()?;
            let total = mounts.len();
            let nodes: Vec<Node> = mounts
                .into_iter()
                .filter(|m| m.is_storage())
                .map(|m| Node::branch(m.path, ""))
                .collect();
            debug!(total, storage = nodes.len(), "listed mounts");
            return Ok(nodes);
        }

        Ok(self
            .client
            .list(scope)?
            .into_iter()
            .map(|key| Node::new(key, scope))
            .collect())
    }

    /// Expands `nodes` until only leaves remain.
    fn expand(&self, nodes: &[Node]) -> SurfResult<Vec<Node>> {
        let mut leaves = Vec::new();
        let mut stack: Vec<Node> = nodes.iter().rev().cloned().collect();

        while let Some(node) = stack.pop() {
            if node.is_leaf() {
                leaves.push(node);
                continue;
            }
            let path = node.full_path();
            trace!(path = %path, "expanding branch");
            let children = self.list_filtered(&path)?;
            stack.extend(children.into_iter().rev());
        }
        Ok(leaves)
    }

    pub fn search(&self, input: &SearchInput) -> SurfResult<TreeSearchOutput> {
        // a malformed pattern fails before any listing
        self.matcher.is_match(&input.pattern, "")?;

        let start = self.list_filtered(&input.scope)?;
        if start.is_empty() {
            debug!(scope = %input.scope, "nothing to search");
            return Ok(TreeSearchOutput::default());
        }

        let workers = start.len().min(input.parallel.max(1));
        let chunks = split_into_n_chunks(&start, workers);
        let (tx, rx) = bounded::<SurfResult<Vec<Node>>>(chunks.len());

        let mut pool = WorkerPool::new(workers);
        for chunk in chunks {
            let tx = tx.clone();
            pool.submit(move || {
                let _ = tx.send(self.expand(chunk));
            });
        }
        drop(tx);

        info!(scope = %input.scope, parallel = workers, "searching tree");
        pool.run_all();

        let mut leaves = Vec::new();
        for chunk_result in rx.iter() {
            match chunk_result {
                Ok(found) => leaves.extend(found),
                Err(e) => {
                    self.metrics.record_resource_failure();
                    return Err(e);
                }
            }
        }
        self.metrics.record_resource();
        self.metrics.record_items(leaves.len() as u64);

        let pattern = input.pattern.as_str();
        let matches = leaves
            .into_par_iter()
            .filter_map(|node| match self.matcher.is_match(pattern, &node.full_path()) {
                Ok(true) => Some(Ok(node)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            })
            .collect::<SurfResult<Vec<Node>>>()?;

        self.metrics.record_matches(matches.len() as u64);
        info!(matches = matches.len(), "tree search finished");
        self.metrics.log_stats();
        Ok(TreeSearchOutput { matches })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryTreeStore;
    use crate::backends::Mount;
    use crate::results::NodeKind;
    use crate::search::matcher::RegexMatcher;
    use std::collections::BTreeSet;

    fn sample_store() -> MemoryTreeStore {
        MemoryTreeStore::new(["root/a/x", "root/a/y", "root/b"])
    }

    fn paths(output: &TreeSearchOutput) -> BTreeSet<String> {
        output.paths().into_iter().collect()
    }

    #[test]
    fn test_matches_leaves_only() {
        let searcher = RecursiveSearcher::new(sample_store(), RegexMatcher::default());
        let output = searcher.search(&SearchInput::new("x", "root", 4)).unwrap();
        assert_eq!(paths(&output), BTreeSet::from(["root/a/x".to_string()]));

        // the branch `a` is never reported
        let output = searcher.search(&SearchInput::new("a", "root", 4)).unwrap();
        assert_eq!(
            paths(&output),
            BTreeSet::from(["root/a/x".to_string(), "root/a/y".to_string()])
        );
        assert!(output.matches.iter().all(|n| n.kind == NodeKind::Leaf));
    }

    #[test]
    fn test_result_independent_of_parallelism() {
        let store = MemoryTreeStore::new((0..40).map(|i| format!("kv/team{}/svc{}/token", i % 7, i)));
        let searcher = RecursiveSearcher::new(store, RegexMatcher::default());
        let single = paths(&searcher.search(&SearchInput::new("token", "kv", 1)).unwrap());
        let many = paths(&searcher.search(&SearchInput::new("token", "kv", 16)).unwrap());
        assert_eq!(single.len(), 40);
        assert_eq!(single, many);
    }

    #[test]
    fn test_root_scope_keeps_storage_mounts() {
        let store = MemoryTreeStore::new(["secret/app/db", "sys/policy/x"]).with_mounts(vec![
            Mount::new("secret/", "kv"),
            Mount::new("sys/", "system"),
            Mount::new("audit/", "file"),
        ]);
        let searcher = RecursiveSearcher::new(store, RegexMatcher::default());

        for scope in ["", "/", "."] {
            let output = searcher.search(&SearchInput::new(".*", scope, 2)).unwrap();
            assert_eq!(paths(&output), BTreeSet::from(["secret/app/db".to_string()]));
        }
    }

    #[test]
    fn test_empty_listing_is_not_an_error() {
        let searcher = RecursiveSearcher::new(sample_store(), RegexMatcher::default());
        let output = searcher.search(&SearchInput::new("x", "missing", 4)).unwrap();
        assert!(output.matches.is_empty());
    }

    #[test]
    fn test_listing_error_aborts() {
        let store = sample_store().failing_on("root/a");
        let searcher = RecursiveSearcher::new(store, RegexMatcher::default());
        let err = searcher.search(&SearchInput::new("b", "root", 4)).unwrap_err();
        assert!(err.is_backend());
    }

    #[test]
    fn test_invalid_pattern_fails() {
        let searcher = RecursiveSearcher::new(sample_store(), RegexMatcher::default());
        assert!(searcher.search(&SearchInput::new("(", "root", 4)).is_err());
    }
}
