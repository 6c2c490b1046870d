//! Concurrent pattern search across secret stores, key-value stores, object
//! stores, table stores and certificate managers.
//!
//! Backends are reached through the client traits in [`backends`]; the
//! searchers in [`search`] never talk to a network directly. A search
//! lists what it needs, spreads the work over a [`pool::WorkerPool`] and
//! merges the results in the calling thread.
//!
//! ```rust,ignore
//! let store = MemoryObjectStore::new().with_bucket("logs", ["2024/app.log"]);
//! let searcher = BucketSearcher::new(store, RegexMatcher::default());
//! let output = searcher.search(&BucketSearchInput::new("logs", "", "app", 4, false))?;
//! ```

pub mod backends;
pub mod config;
pub mod decode;
pub mod errors;
pub mod links;
pub mod metrics;
pub mod pool;
pub mod results;
pub mod search;
pub mod text;

pub use config::SurfConfig;
pub use errors::{SurfError, SurfResult};
pub use results::{
    BucketSearchOutput, CertificateSearchOutput, KvSearchOutput, Node, NodeKind, TableHit,
    TableSearchOutput, TreeSearchOutput,
};
