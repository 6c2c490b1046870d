//! Search outputs, one shape per searcher.
//!
//! Fan-out outputs are keyed by resource name. A resource that was searched
//! successfully always has an entry, possibly empty; a resource skipped after
//! an error has none.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::backends::Certificate;
use crate::decode::DecodedRecord;
use crate::search::input::MatchLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Branch,
    Leaf,
}

/// One entry of a hierarchical store, created while listing `base_path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub key: String,
    pub base_path: String,
}

impl Node {
    /// Builds a node from a listed key. Keys ending with `/` are branches.
    pub fn new(key: impl Into<String>, base_path: impl Into<String>) -> Self {
        let key = key.into();
        let kind = if key.ends_with('/') {
            NodeKind::Branch
        } else {
            NodeKind::Leaf
        };
        Self {
            kind,
            key,
            base_path: base_path.into(),
        }
    }

    pub fn branch(key: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Branch,
            ..Self::new(key, base_path)
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    /// `base_path` joined with `key`, without duplicate or trailing slashes.
    pub fn full_path(&self) -> String {
        join_path(&self.base_path, &self.key)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_path())
    }
}

pub fn join_path(base: &str, key: &str) -> String {
    base.split('/')
        .chain(key.split('/'))
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Matched leaves of a recursive tree search, in no particular order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TreeSearchOutput {
    pub matches: Vec<Node>,
}

impl TreeSearchOutput {
    pub fn paths(&self) -> Vec<String> {
        self.matches.iter().map(Node::full_path).collect()
    }
}

/// Matched keys of a key-value prefix search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KvSearchOutput {
    pub matches: Vec<String>,
}

/// Matched object keys per bucket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BucketSearchOutput {
    pub bucket_to_matches: BTreeMap<String, Vec<String>>,
}

impl BucketSearchOutput {
    pub fn total_matches(&self) -> usize {
        self.bucket_to_matches.values().map(Vec::len).sum()
    }

    pub fn buckets_searched(&self) -> usize {
        self.bucket_to_matches.len()
    }
}

/// One matching row, or one matching table for name-only searches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableHit {
    pub table: String,
    pub level: MatchLevel,
    pub data: DecodedRecord,
}

/// Hits per table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableSearchOutput {
    pub table_to_hits: BTreeMap<String, Vec<TableHit>>,
}

impl TableSearchOutput {
    pub fn total_matches(&self) -> usize {
        self.table_to_hits.values().map(Vec::len).sum()
    }

    pub fn tables_searched(&self) -> usize {
        self.table_to_hits.len()
    }

    pub fn hits(&self) -> impl Iterator<Item = &TableHit> {
        self.table_to_hits.values().flatten()
    }
}

/// Matching certificates, oldest first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CertificateSearchOutput {
    pub certificates: Vec<Certificate>,
}
