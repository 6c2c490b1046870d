//! Capability sets the searchers consume, one per backend family.
//!
//! Clients are shared by reference across worker threads for the whole
//! search, so every trait requires `Send + Sync` and implementations must be
//! safe for concurrent reads. Retries, credentials and session setup belong to
//! the implementation, never to the searchers.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::decode::{Record, TableSchema};
use crate::errors::SurfResult;

/// A top-level mount of a hierarchical secret store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub path: String,
    #[serde(rename = "type")]
    pub engine_type: String,
}

impl Mount {
    pub fn new(path: impl Into<String>, engine_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            engine_type: engine_type.into(),
        }
    }

    /// Secret-bearing storage engines. Audit devices, auth methods and other
    /// engines are not searchable.
    pub fn is_storage(&self) -> bool {
        matches!(self.engine_type.as_str(), "generic" | "kv")
    }
}

/// Hierarchical secret store.
pub trait TreeClient: Send + Sync {
    fn list_mounts(&self) -> SurfResult<Vec<Mount>>;

    /// Immediate children of `path`. Branch keys end with `/`. An empty list
    /// means the path holds nothing.
    fn list(&self, path: &str) -> SurfResult<Vec<String>>;
}

/// Flat key-value store addressed by prefix.
pub trait KvClient: Send + Sync {
    fn list_keys(&self, prefix: &str) -> SurfResult<Vec<String>>;
}

/// One page of object keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

/// Object store with paginated key listing.
pub trait ObjectStoreClient: Send + Sync {
    fn list_buckets(&self) -> SurfResult<Vec<String>>;

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> SurfResult<ObjectPage>;
}

/// A table name as returned by listing, before describe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    #[serde(default)]
    pub global: bool,
}

impl TableRef {
    pub fn new(name: impl Into<String>, global: bool) -> Self {
        Self {
            name: name.into(),
            global,
        }
    }
}

/// Wide-column table store.
pub trait TableClient: Send + Sync {
    fn list_tables(&self, include_global: bool) -> SurfResult<Vec<TableRef>>;

    fn describe_table(&self, table: &TableRef) -> SurfResult<TableSchema>;

    /// Scans `table` page by page. `on_page` returns `false` to stop early.
    fn scan(&self, table: &str, on_page: &mut dyn FnMut(&[Record]) -> bool) -> SurfResult<()>;
}

/// A TLS certificate as returned by describe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub arn: String,
    #[serde(default)]
    pub domain_name: String,
    #[serde(default)]
    pub subject_alternative_names: Vec<String>,
    /// ARNs of the resources the certificate is attached to
    #[serde(default)]
    pub in_use_by: Vec<String>,
    #[serde(default)]
    pub status: String,
    /// RFC 3339 timestamps; they order correctly as strings
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub not_after: Option<String>,
}

impl Certificate {
    pub fn new(arn: impl Into<String>, domain_name: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            domain_name: domain_name.into(),
            ..Default::default()
        }
    }

    /// The trailing segment of the ARN, as used in console URLs.
    pub fn id(&self) -> &str {
        self.arn.rsplit('/').next().unwrap_or(&self.arn)
    }
}

/// Certificate manager.
pub trait CertificateClient: Send + Sync {
    /// ARNs of every certificate, all pages included.
    fn list_certificates(&self) -> SurfResult<Vec<String>>;

    fn describe_certificate(&self, arn: &str) -> SurfResult<Certificate>;
}

impl<T: TreeClient + ?Sized> TreeClient for &T {
    fn list_mounts(&self) -> SurfResult<Vec<Mount>> {
        (**self).list_mounts()
    }

    fn list(&self, path: &str) -> SurfResult<Vec<String>> {
        (**self).list(path)
    }
}

impl<T: KvClient + ?Sized> KvClient for &T {
    fn list_keys(&self, prefix: &str) -> SurfResult<Vec<String>> {
        (**self).list_keys(prefix)
    }
}

impl<T: ObjectStoreClient + ?Sized> ObjectStoreClient for &T {
    fn list_buckets(&self) -> SurfResult<Vec<String>> {
        (**self).list_buckets()
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> SurfResult<ObjectPage> {
        (**self).list_objects(bucket, prefix, continuation)
    }
}

impl<T: TableClient + ?Sized> TableClient for &T {
    fn list_tables(&self, include_global: bool) -> SurfResult<Vec<TableRef>> {
        (**self).list_tables(include_global)
    }

    fn describe_table(&self, table: &TableRef) -> SurfResult<TableSchema> {
        (**self).describe_table(table)
    }

    fn scan(&self, table: &str, on_page: &mut dyn FnMut(&[Record]) -> bool) -> SurfResult<()> {
        (**self).scan(table, on_page)
    }
}

impl<T: CertificateClient + ?Sized> CertificateClient for &T {
    fn list_certificates(&self) -> SurfResult<Vec<String>> {
        (**self).list_certificates()
    }

    fn describe_certificate(&self, arn: &str) -> SurfResult<Certificate> {
        (**self).describe_certificate(arn)
    }
}
