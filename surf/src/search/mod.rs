//! Searchers, one per backend family.
//!
//! - [`tree::RecursiveSearcher`] walks a hierarchical secret store and
//!   matches the full paths of its leaves.
//! - [`kv::KvSearcher`] matches the keys under a prefix of a flat store.
//! - [`object_store::BucketSearcher`] and [`table::TableSearcher`] fan out
//!   over buckets or tables, searching each on the worker pool.
//! - [`certificate::CertificateSearcher`] describes every certificate on the
//!   pool and filters by domain, ARN or attached resource.
//!
//! Every searcher takes its backend client and a [`matcher::Matcher`] at
//! construction and exposes a single `search` method.

pub mod certificate;
pub mod chunks;
pub mod fanout;
pub mod input;
pub mod kv;
pub mod matcher;
pub mod object_store;
pub mod table;
pub mod tree;

pub use certificate::CertificateSearcher;
pub use input::{
    BucketSearchInput, CertificateFilters, CertificateSearchInput, MatchLevel, SearchInput,
    SelectionLimits, TableSearchInput,
};
pub use kv::KvSearcher;
pub use matcher::{Matcher, RegexMatcher};
pub use object_store::BucketSearcher;
pub use table::TableSearcher;
pub use tree::RecursiveSearcher;
