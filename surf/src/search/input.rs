use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{SurfError, SurfResult};

/// Default cap on resources searched when no name pattern is given.
pub const DEFAULT_MAX_ALLOWED_ALL: usize = 30;

/// Pattern substituted for the query when every row should match.
pub const MATCH_ALL_PATTERN: &str = ".*";

/// Parameters shared by every searcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchInput {
    /// Regular expression to look for
    pub pattern: String,
    /// Where to start: a base path, a key prefix, or a resource-name pattern.
    /// Empty means everything.
    pub scope: String,
    /// Upper bound on concurrent workers, always at least 1
    pub parallel: usize,
    /// Abort on the first per-resource error instead of skipping it
    pub fail_fast: bool,
}

impl SearchInput {
    pub fn new(pattern: impl Into<String>, scope: impl Into<String>, parallel: usize) -> Self {
        Self {
            pattern: pattern.into(),
            scope: scope.into(),
            parallel: parallel.max(1),
            fail_fast: false,
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Which resources a fan-out search may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionLimits {
    /// Search every resource when no name pattern is given, whatever the count
    pub allow_all: bool,
    /// Without a pattern or `allow_all`, searching all resources is still
    /// permitted up to this many
    pub max_allowed_all: usize,
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            allow_all: false,
            max_allowed_all: DEFAULT_MAX_ALLOWED_ALL,
        }
    }
}

/// Object-store search. `search.scope` is the bucket-name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSearchInput {
    pub search: SearchInput,
    /// Key prefix to list from inside each bucket
    pub prefix: String,
    pub limits: SelectionLimits,
}

impl BucketSearchInput {
    pub fn new(
        bucket_pattern: impl Into<String>,
        prefix: impl Into<String>,
        pattern: impl Into<String>,
        parallel: usize,
        allow_all: bool,
    ) -> Self {
        Self {
            search: SearchInput::new(pattern, bucket_pattern, parallel),
            prefix: prefix.into(),
            limits: SelectionLimits {
                allow_all,
                ..Default::default()
            },
        }
    }

    pub fn with_limits(mut self, limits: SelectionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.search.fail_fast = fail_fast;
        self
    }
}

/// How much of a table a query is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLevel {
    /// Attribute names, and decoded values, of every row
    Object,
    /// Attribute names only; a table is reported once, at its first matching row
    Table,
    /// Table names only; rows are never scanned
    TableNameOnly,
    /// Names and values of key-schema attributes only
    SchemaKeysOnly,
}

impl fmt::Display for MatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchLevel::Object => "object",
            MatchLevel::Table => "table",
            MatchLevel::TableNameOnly => "table_name_only",
            MatchLevel::SchemaKeysOnly => "schema_keys_only",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for MatchLevel {
    type Err = SurfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "object" => Ok(MatchLevel::Object),
            "table" => Ok(MatchLevel::Table),
            "table_name_only" => Ok(MatchLevel::TableNameOnly),
            "schema_keys_only" => Ok(MatchLevel::SchemaKeysOnly),
            other => Err(SurfError::invalid_input(format!(
                "unknown match level '{}'",
                other
            ))),
        }
    }
}

/// Table-store search. `search.scope` is the table-name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSearchInput {
    pub search: SearchInput,
    pub with_global_tables: bool,
    pub level: MatchLevel,
    /// Stop scanning a table after its first matching row
    pub stop_on_first_match: bool,
    pub limits: SelectionLimits,
}

impl TableSearchInput {
    /// Validates and builds a table search. The query must be non-empty and
    /// `TableNameOnly` needs a table pattern.
    pub fn new(
        table_pattern: impl Into<String>,
        query: impl Into<String>,
        level: MatchLevel,
        parallel: usize,
    ) -> SurfResult<Self> {
        let table_pattern = table_pattern.into();
        let query = query.into();

        if query.is_empty() {
            return Err(SurfError::invalid_input(format!(
                "query must not be empty (tables '{}')",
                table_pattern
            )));
        }
        if level == MatchLevel::TableNameOnly && table_pattern.is_empty() {
            return Err(SurfError::invalid_input(
                "table_name_only matching requires a table name pattern",
            ));
        }

        Ok(Self {
            search: SearchInput::new(query, table_pattern, parallel),
            with_global_tables: false,
            level,
            stop_on_first_match: false,
            limits: SelectionLimits::default(),
        })
    }

    /// A search in which every scanned row matches.
    pub fn match_all(
        table_pattern: impl Into<String>,
        level: MatchLevel,
        parallel: usize,
    ) -> SurfResult<Self> {
        Self::new(table_pattern, MATCH_ALL_PATTERN, level, parallel)
    }

    pub fn with_global_tables(mut self, with_global_tables: bool) -> Self {
        self.with_global_tables = with_global_tables;
        self
    }

    pub fn with_stop_on_first_match(mut self, stop: bool) -> Self {
        self.stop_on_first_match = stop;
        self
    }

    pub fn with_limits(mut self, limits: SelectionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.search.fail_fast = fail_fast;
        self
    }

    /// Whether scanning a table stops at its first hit.
    pub fn stops_at_first_hit(&self) -> bool {
        self.stop_on_first_match || self.level == MatchLevel::Table
    }
}

/// Certificate fields a query is matched against. Domains only by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificateFilters {
    /// Domain name and subject alternative names
    pub domains: bool,
    /// Certificate ARN
    pub id: bool,
    /// ARNs of the resources using the certificate
    pub used_by: bool,
}

impl Default for CertificateFilters {
    fn default() -> Self {
        Self {
            domains: true,
            id: false,
            used_by: false,
        }
    }
}

impl CertificateFilters {
    pub fn all() -> Self {
        Self {
            domains: true,
            id: true,
            used_by: true,
        }
    }
}

/// Certificate search. `search.scope` is unused; every certificate is described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSearchInput {
    pub search: SearchInput,
    pub filters: CertificateFilters,
}

impl CertificateSearchInput {
    pub fn new(query: impl Into<String>, parallel: usize) -> SurfResult<Self> {
        let query = query.into();
        if query.is_empty() {
            return Err(SurfError::invalid_input("certificate query must not be empty"));
        }
        Ok(Self {
            search: SearchInput::new(query, "", parallel),
            filters: CertificateFilters::default(),
        })
    }

    pub fn with_filters(mut self, filters: CertificateFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.search.fail_fast = fail_fast;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_coerced_to_one() {
        assert_eq!(SearchInput::new("x", "", 0).parallel, 1);
        assert_eq!(SearchInput::new("x", "", 8).parallel, 8);
    }

    #[test]
    fn test_table_input_validation() {
        assert!(TableSearchInput::new("users", "", MatchLevel::Object, 4).is_err());
        assert!(TableSearchInput::new("", "alice", MatchLevel::TableNameOnly, 4).is_err());
        assert!(TableSearchInput::new("users", "alice", MatchLevel::TableNameOnly, 4).is_ok());

        let all = TableSearchInput::match_all("", MatchLevel::Object, 4).unwrap();
        assert_eq!(all.search.pattern, MATCH_ALL_PATTERN);
    }

    #[test]
    fn test_match_level_round_trip_names() {
        for level in [
            MatchLevel::Object,
            MatchLevel::Table,
            MatchLevel::TableNameOnly,
            MatchLevel::SchemaKeysOnly,
        ] {
            assert_eq!(level.to_string().parse::<MatchLevel>().unwrap(), level);
        }
        assert!("rows".parse::<MatchLevel>().is_err());
    }

    #[test]
    fn test_table_level_stops_at_first_hit() {
        let input = TableSearchInput::new("t", "q", MatchLevel::Table, 1).unwrap();
        assert!(input.stops_at_first_hit());
        let input = TableSearchInput::new("t", "q", MatchLevel::Object, 1).unwrap();
        assert!(!input.stops_at_first_hit());
        assert!(input.with_stop_on_first_match(true).stops_at_first_hit());
    }

    #[test]
    fn test_certificate_input() {
        assert!(CertificateSearchInput::new("", 4).is_err());

        let input = CertificateSearchInput::new("example.com", 4).unwrap();
        assert_eq!(input.filters, CertificateFilters::default());
        assert!(input.filters.domains && !input.filters.id && !input.filters.used_by);

        let all = input.with_filters(CertificateFilters::all());
        assert!(all.filters.id && all.filters.used_by);
    }
}
