//! Shared machinery of the fan-out searchers: resource selection and the
//! scatter-gather loop that searches each selected resource on the pool.

use crossbeam_channel::bounded;
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

use crate::errors::{SurfError, SurfResult};
use crate::metrics::SearchMetrics;
use crate::pool::WorkerPool;
use crate::search::input::SelectionLimits;
use crate::search::matcher::Matcher;

/// Result of searching one resource, sent from a pool job to the collector.
#[derive(Debug)]
pub struct ResourceOutcome<T> {
    pub resource: String,
    pub result: SurfResult<Vec<T>>,
}

/// Keeps the resources whose name matches `pattern`. Without a pattern every
/// resource is kept, provided the caller allowed it or the count is within
/// the cap.
pub fn select_resources<R, M>(
    matcher: &M,
    kind: &str,
    resources: Vec<R>,
    name_of: impl Fn(&R) -> &str,
    pattern: &str,
    limits: SelectionLimits,
) -> SurfResult<Vec<R>>
where
    M: Matcher,
{
    if pattern.is_empty() {
        if !limits.allow_all && resources.len() > limits.max_allowed_all {
            return Err(SurfError::too_many_resources(
                kind,
                resources.len(),
                limits.max_allowed_all,
            ));
        }
        debug!(kind, count = resources.len(), "selected all resources");
        return Ok(resources);
    }

    let mut selected = Vec::new();
    for resource in resources {
        if matcher.is_match(pattern, name_of(&resource))? {
            selected.push(resource);
        }
    }
    debug!(kind, pattern, count = selected.len(), "selected resources by name");
    Ok(selected)
}

/// Searches every resource on a pool of `min(resources, parallel)` workers
/// and collects one outcome per resource.
///
/// A failed resource is logged and left out of the map, or returned as the
/// error when `fail_fast` is set. Every resource searched without error has
/// an entry, even when it matched nothing.
pub fn scatter_gather<R, T, F>(
    resources: &[R],
    name_of: impl Fn(&R) -> String,
    parallel: usize,
    fail_fast: bool,
    metrics: &SearchMetrics,
    search_one: F,
) -> SurfResult<BTreeMap<String, Vec<T>>>
where
    R: Sync,
    T: Send,
    F: Fn(&R) -> SurfResult<Vec<T>> + Sync,
{
    let mut output = BTreeMap::new();
    if resources.is_empty() {
        return Ok(output);
    }

    let (tx, rx) = bounded::<ResourceOutcome<T>>(resources.len());
    let search_one = &search_one;
    let mut pool = WorkerPool::new(parallel.min(resources.len()));
    for resource in resources {
        let tx = tx.clone();
        let name = name_of(resource);
        pool.submit(move || {
            let result = search_one(resource);
            let _ = tx.send(ResourceOutcome {
                resource: name,
                result,
            });
        });
    }
    drop(tx);

    let submitted = pool.len();
    debug!(
        jobs = submitted,
        workers = pool.effective_workers(),
        "starting fan-out"
    );
    pool.run_all();

    for _ in 0..submitted {
        let Ok(outcome) = rx.recv() else {
            break;
        };
        match outcome.result {
            Ok(items) => {
                metrics.record_resource();
                metrics.record_matches(items.len() as u64);
                output.insert(outcome.resource, items);
            }
            Err(e) => {
                metrics.record_resource_failure();
                if fail_fast {
                    error!(resource = %outcome.resource, error = %e, "search failed, aborting");
                    return Err(e);
                }
                warn!(resource = %outcome.resource, error = %e, "search failed, skipping resource");
            }
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::matcher::RegexMatcher;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("resource-{:02}", i)).collect()
    }

    #[test]
    fn test_select_by_pattern() {
        let selected = select_resources(
            &RegexMatcher::default(),
            "buckets",
            vec!["prod-logs".to_string(), "dev-logs".into(), "prod-db".into()],
            |s| s.as_str(),
            "^prod",
            SelectionLimits::default(),
        )
        .unwrap();
        assert_eq!(selected, vec!["prod-logs", "prod-db"]);
    }

    #[test]
    fn test_select_nothing_matches() {
        let selected = select_resources(
            &RegexMatcher::default(),
            "tables",
            names(50),
            |s| s.as_str(),
            "no-such-thing",
            SelectionLimits::default(),
        )
        .unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn test_select_all_needs_permission_over_cap() {
        let limits = SelectionLimits {
            allow_all: false,
            max_allowed_all: 30,
        };
        let err = select_resources(
            &RegexMatcher::default(),
            "tables",
            names(50),
            |s| s.as_str(),
            "",
            limits,
        )
        .unwrap_err();
        assert!(err.is_too_many_resources());

        let allowed = select_resources(
            &RegexMatcher::default(),
            "tables",
            names(50),
            |s| s.as_str(),
            "",
            SelectionLimits {
                allow_all: true,
                ..limits
            },
        )
        .unwrap();
        assert_eq!(allowed.len(), 50);

        let under_cap = select_resources(
            &RegexMatcher::default(),
            "tables",
            names(30),
            |s| s.as_str(),
            "",
            limits,
        )
        .unwrap();
        assert_eq!(under_cap.len(), 30);
    }

    #[test]
    fn test_scatter_gather_collects_every_resource() {
        let metrics = SearchMetrics::new();
        let resources = names(10);
        let output = scatter_gather(&resources, |r| r.clone(), 3, false, &metrics, |r| {
            if r.ends_with('0') {
                Ok(vec![r.len()])
            } else {
                Ok(vec![])
            }
        })
        .unwrap();

        assert_eq!(output.len(), 10);
        assert_eq!(output["resource-00"], vec![11]);
        assert!(output["resource-01"].is_empty());
        assert_eq!(metrics.get_stats().resources_searched, 10);
    }

    #[test]
    fn test_fail_fast_versus_skip() {
        let resources = vec!["good".to_string(), "bad".to_string()];
        let search = |r: &String| -> SurfResult<Vec<String>> {
            if r == "bad" {
                Err(SurfError::backend("scan", r.clone(), "boom"))
            } else {
                Ok(vec!["hit".to_string()])
            }
        };

        let metrics = SearchMetrics::new();
        let skipped = scatter_gather(&resources, |r| r.clone(), 2, false, &metrics, search).unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped["good"], vec!["hit"]);
        assert_eq!(metrics.get_stats().resources_failed, 1);

        let err = scatter_gather(&resources, |r| r.clone(), 2, true, &metrics, search).unwrap_err();
        assert!(err.is_backend());
    }
}
