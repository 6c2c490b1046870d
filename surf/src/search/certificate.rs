//! Certificate search.
//!
//! Listing only yields ARNs, so every certificate is described on the pool
//! and kept when the query matches one of the enabled fields. Describe
//! failures are per certificate: skipped, or fatal under `fail_fast`.

use tracing::{debug, info};

use crate::backends::{Certificate, CertificateClient};
use crate::errors::SurfResult;
use crate::metrics::SearchMetrics;
use crate::results::CertificateSearchOutput;
use crate::search::fanout::scatter_gather;
use crate::search::input::{CertificateFilters, CertificateSearchInput};
use crate::search::matcher::Matcher;

pub struct CertificateSearcher<C, M> {
    client: C,
    matcher: M,
    metrics: SearchMetrics,
}

impl<C: CertificateClient, M: Matcher> CertificateSearcher<C, M> {
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

    pub fn search(&self, input: &CertificateSearchInput) -> SurfResult<CertificateSearchOutput> {
        let search = &input.search;
        self.matcher.is_match(&search.pattern, "")?;

        let arns = self.client.list_certificates()?;
        self.metrics.record_page();
        self.metrics.record_items(arns.len() as u64);
        if arns.is_empty() {
            info!("no certificates to search");
            return Ok(CertificateSearchOutput::default());
        }

        info!(
            certificates = arns.len(),
            parallel = search.parallel,
            "describing certificates"
        );
        let described = scatter_gather(
            &arns,
            |arn| arn.clone(),
            search.parallel,
            search.fail_fast,
            &self.metrics,
            |arn| {
                let certificate = self.client.describe_certificate(arn)?;
                if self.matches(&certificate, &search.pattern, input.filters)? {
                    debug!(arn = %arn, "certificate matched");
                    Ok(vec![certificate])
                } else {
                    Ok(Vec::new())
                }
            },
        )?;

        let mut certificates: Vec<Certificate> = described.into_values().flatten().collect();
        certificates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.metrics.log_stats();

        Ok(CertificateSearchOutput { certificates })
    }

    fn matches(
        &self,
        certificate: &Certificate,
        pattern: &str,
        filters: CertificateFilters,
    ) -> SurfResult<bool> {
        let mut candidates: Vec<&str> = Vec::new();
        if filters.domains {
            if !certificate.domain_name.is_empty() {
                candidates.push(&certificate.domain_name);
            }
            candidates.extend(certificate.subject_alternative_names.iter().map(String::as_str));
        }
        if filters.used_by {
            candidates.extend(certificate.in_use_by.iter().map(String::as_str));
        }
        if filters.id {
            candidates.push(&certificate.arn);
        }

        for candidate in candidates {
            if self.matcher.is_match(pattern, candidate)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryCertificateStore;
    use crate::search::matcher::RegexMatcher;

    const ARN_PREFIX: &str = "arn:aws:acm:us-east-1:123456789012:certificate/";

    fn cert(id: &str, domain: &str, sans: &[&str], used_by: &[&str], created: &str) -> Certificate {
        Certificate {
            arn: format!("{}{}", ARN_PREFIX, id),
            domain_name: domain.to_string(),
            subject_alternative_names: sans.iter().map(|s| s.to_string()).collect(),
            in_use_by: used_by.iter().map(|s| s.to_string()).collect(),
            status: "ISSUED".to_string(),
            created_at: Some(created.to_string()),
            not_after: None,
        }
    }

    fn store() -> MemoryCertificateStore {
        MemoryCertificateStore::new()
            .with_certificate(cert(
                "c-1",
                "api.example.com",
                &["api.example.com", "www.example.com"],
                &["arn:aws:elasticloadbalancing:us-east-1:1:loadbalancer/app/public-lb/1"],
                "2023-01-01T00:00:00Z",
            ))
            .with_certificate(cert(
                "c-2",
                "internal.corp.net",
                &[],
                &["arn:aws:elasticloadbalancing:us-east-1:1:loadbalancer/app/internal-lb/2"],
                "2022-06-01T00:00:00Z",
            ))
            .with_certificate(cert(
                "deadbeef",
                "legacy.example.org",
                &[],
                &[],
                "2021-01-01T00:00:00Z",
            ))
    }

    fn domains(output: &CertificateSearchOutput) -> Vec<&str> {
        output
            .certificates
            .iter()
            .map(|c| c.domain_name.as_str())
            .collect()
    }

    fn search(
        store: MemoryCertificateStore,
        query: &str,
        filters: CertificateFilters,
    ) -> SurfResult<CertificateSearchOutput> {
        let input = CertificateSearchInput::new(query, 4)?.with_filters(filters);
        CertificateSearcher::new(store, RegexMatcher::default()).search(&input)
    }

    #[test]
    fn test_domain_filter_oldest_first() {
        let output = search(store(), "example", CertificateFilters::default()).unwrap();
        assert_eq!(domains(&output), vec!["legacy.example.org", "api.example.com"]);

        // subject alternative names count as domains
        let output = search(store(), "^www", CertificateFilters::default()).unwrap();
        assert_eq!(domains(&output), vec!["api.example.com"]);
    }

    #[test]
    fn test_used_by_filter() {
        let output = search(store(), "internal-lb", CertificateFilters::default()).unwrap();
        assert!(output.certificates.is_empty());

        let filters = CertificateFilters {
            domains: false,
            id: false,
            used_by: true,
        };
        let output = search(store(), "internal-lb", filters).unwrap();
        assert_eq!(domains(&output), vec!["internal.corp.net"]);
    }

    #[test]
    fn test_id_filter() {
        let output = search(store(), "deadbeef", CertificateFilters::default()).unwrap();
        assert!(output.certificates.is_empty());

        let filters = CertificateFilters {
            domains: false,
            id: true,
            used_by: false,
        };
        let output = search(store(), "deadbeef", filters).unwrap();
        assert_eq!(output.certificates[0].id(), "deadbeef");
    }

    #[test]
    fn test_all_filters() {
        let output = search(store(), "lb/|deadbeef", CertificateFilters::all()).unwrap();
        assert_eq!(
            domains(&output),
            vec!["legacy.example.org", "internal.corp.net", "api.example.com"]
        );
    }

    #[test]
    fn test_describe_failure_skip_or_fail_fast() {
        let failing = store().failing_on(format!("{}c-1", ARN_PREFIX));
        let searcher = CertificateSearcher::new(failing, RegexMatcher::default());

        let input = CertificateSearchInput::new("example", 2).unwrap();
        let output = searcher.search(&input).unwrap();
        assert_eq!(domains(&output), vec!["legacy.example.org"]);
        assert_eq!(searcher.metrics().get_stats().resources_failed, 1);

        let err = searcher.search(&input.with_fail_fast(true)).unwrap_err();
        assert!(err.is_backend());
    }

    #[test]
    fn test_malformed_pattern_is_fatal() {
        let err = search(store(), "(", CertificateFilters::all()).unwrap_err();
        assert!(err.is_invalid_pattern());
    }

    #[test]
    fn test_empty_store() {
        let output = search(
            MemoryCertificateStore::new(),
            "example",
            CertificateFilters::default(),
        )
        .unwrap();
        assert!(output.certificates.is_empty());
    }
}
