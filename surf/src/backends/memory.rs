//! In-memory backends loaded from a snapshot file.
//!
//! A snapshot is a JSON or YAML document with one optional section per
//! backend:
//!
//! ```yaml
//! vault:
//!   mounts: [{ path: "secret/", type: "kv" }, { path: "sys/", type: "system" }]
//!   secrets: ["secret/app/db/password", "secret/app/api-key"]
//! consul:
//!   keys: ["config/app/db_url"]
//! s3:
//!   page_size: 2
//!   buckets:
//!     assets-prod: ["img/logo.png", "css/site.css"]
//! ddb:
//!   tables:
//!     - name: users
//!       keys: [id]
//!       items:
//!         - { id: { S: "u-1" }, email: { S: "alice@example.com" } }
//! acm:
//!   certificates:
//!     - { arn: "arn:aws:acm:us-east-1:1:certificate/c-1", domain_name: "example.com" }
//! ```
//!
//! Every section accepts `failing`, a list of paths, buckets, tables or
//! certificate ARNs whose calls return a backend error.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::debug;

use super::{
    Certificate, CertificateClient, KvClient, Mount, ObjectPage, ObjectStoreClient, TableClient,
    TableRef, TreeClient,
};
use crate::decode::{Record, TableSchema};
use crate::errors::{SurfError, SurfResult};

const DEFAULT_PAGE_SIZE: usize = 100;

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn trim_slashes(path: &str) -> &str {
    path.trim_matches('/')
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub vault: Option<MemoryTreeStore>,
    #[serde(default)]
    pub consul: Option<MemoryKvStore>,
    #[serde(default)]
    pub s3: Option<MemoryObjectStore>,
    #[serde(default)]
    pub ddb: Option<MemoryTableStore>,
    #[serde(default)]
    pub acm: Option<MemoryCertificateStore>,
}

impl Snapshot {
    /// Loads a snapshot, choosing the format from the file extension
    /// (`.json`, otherwise YAML).
    pub fn load(path: &Path) -> SurfResult<Self> {
        let content = fs::read_to_string(path)?;
        let snapshot: Snapshot = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        debug!(path = %path.display(), "loaded snapshot");
        Ok(snapshot)
    }

    pub fn vault(&self) -> SurfResult<&MemoryTreeStore> {
        self.vault
            .as_ref()
            .ok_or_else(|| SurfError::config_error("snapshot has no 'vault' section"))
    }

    pub fn consul(&self) -> SurfResult<&MemoryKvStore> {
        self.consul
            .as_ref()
            .ok_or_else(|| SurfError::config_error("snapshot has no 'consul' section"))
    }

    pub fn s3(&self) -> SurfResult<&MemoryObjectStore> {
        self.s3
            .as_ref()
            .ok_or_else(|| SurfError::config_error("snapshot has no 's3' section"))
    }

    pub fn ddb(&self) -> SurfResult<&MemoryTableStore> {
        self.ddb
            .as_ref()
            .ok_or_else(|| SurfError::config_error("snapshot has no 'ddb' section"))
    }

    pub fn acm(&self) -> SurfResult<&MemoryCertificateStore> {
        self.acm
            .as_ref()
            .ok_or_else(|| SurfError::config_error("snapshot has no 'acm' section"))
    }
}

/// Secret store built from the full paths of its secrets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryTreeStore {
    #[serde(default)]
    pub mounts: Vec<Mount>,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub failing: BTreeSet<String>,
}

impl MemoryTreeStore {
    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            secrets: secrets.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_mounts(mut self, mounts: Vec<Mount>) -> Self {
        self.mounts = mounts;
        self
    }

    pub fn failing_on(mut self, path: impl Into<String>) -> Self {
        self.failing.insert(trim_slashes(&path.into()).to_string());
        self
    }
}

impl TreeClient for MemoryTreeStore {
    fn list_mounts(&self) -> SurfResult<Vec<Mount>> {
        if !self.mounts.is_empty() {
            return Ok(self.mounts.clone());
        }
        // without explicit mounts every first path segment is a kv mount
        let roots: BTreeSet<&str> = self
            .secrets
            .iter()
            .filter_map(|s| trim_slashes(s).split('/').next())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(roots
            .into_iter()
            .map(|r| Mount::new(format!("{}/", r), "kv"))
            .collect())
    }

    fn list(&self, path: &str) -> SurfResult<Vec<String>> {
        let path = trim_slashes(path);
        if self.failing.contains(path) {
            return Err(SurfError::backend("list", path, "permission denied"));
        }

        let mut children = BTreeSet::new();
        for secret in &self.secrets {
            let secret = trim_slashes(secret);
            let rest = if path.is_empty() {
                Some(secret)
            } else {
                secret
                    .strip_prefix(path)
                    .and_then(|r| r.strip_prefix('/'))
            };
            let Some(rest) = rest.filter(|r| !r.is_empty()) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => children.insert(format!("{}/", dir)),
                None => children.insert(rest.to_string()),
            };
        }
        Ok(children.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryKvStore {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub failing: BTreeSet<String>,
}

impl MemoryKvStore {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

impl KvClient for MemoryKvStore {
    fn list_keys(&self, prefix: &str) -> SurfResult<Vec<String>> {
        if self.failing.contains(prefix) {
            return Err(SurfError::backend("list", prefix, "permission denied"));
        }
        Ok(self
            .keys
            .iter()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryObjectStore {
    #[serde(default)]
    pub buckets: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub failing: BTreeSet<String>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            failing: BTreeSet::new(),
        }
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket<I, S>(mut self, name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.buckets
            .insert(name.into(), keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn failing_on(mut self, bucket: impl Into<String>) -> Self {
        self.failing.insert(bucket.into());
        self
    }
}

impl ObjectStoreClient for MemoryObjectStore {
    fn list_buckets(&self) -> SurfResult<Vec<String>> {
        Ok(self.buckets.keys().cloned().collect())
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> SurfResult<ObjectPage> {
        if self.failing.contains(bucket) {
            return Err(SurfError::backend("list objects", bucket, "access denied"));
        }
        let keys = self
            .buckets
            .get(bucket)
            .ok_or_else(|| SurfError::backend("list objects", bucket, "no such bucket"))?;

        let start = match continuation {
            Some(token) => token.parse::<usize>().map_err(|_| {
                SurfError::backend("list objects", bucket, format!("bad continuation token '{}'", token))
            })?,
            None => 0,
        };
        let matching: Vec<&String> = keys.iter().filter(|k| k.starts_with(prefix)).collect();
        let page_size = self.page_size.max(1);
        let end = start.saturating_add(page_size).min(matching.len());

        Ok(ObjectPage {
            keys: matching
                .get(start..end)
                .unwrap_or_default()
                .iter()
                .map(|k| k.to_string())
                .collect(),
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryTable {
    pub name: String,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub items: Vec<Record>,
}

impl MemoryTable {
    pub fn new<I, S>(name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            keys: keys.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn with_item(mut self, item: Record) -> Self {
        self.items.push(item);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryTableStore {
    #[serde(default)]
    pub tables: Vec<MemoryTable>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub failing: BTreeSet<String>,
}

impl Default for MemoryTableStore {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            failing: BTreeSet::new(),
        }
    }
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: MemoryTable) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn failing_on(mut self, table: impl Into<String>) -> Self {
        self.failing.insert(table.into());
        self
    }

    fn table(&self, name: &str) -> SurfResult<&MemoryTable> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SurfError::backend("describe", name, "table not found"))
    }
}

impl TableClient for MemoryTableStore {
    fn list_tables(&self, include_global: bool) -> SurfResult<Vec<TableRef>> {
        Ok(self
            .tables
            .iter()
            .filter(|t| include_global || !t.global)
            .map(|t| TableRef::new(t.name.clone(), t.global))
            .collect())
    }

    fn describe_table(&self, table: &TableRef) -> SurfResult<TableSchema> {
        let found = self.table(&table.name)?;
        Ok(TableSchema::new(found.name.clone(), found.keys.iter().cloned()))
    }

    fn scan(&self, table: &str, on_page: &mut dyn FnMut(&[Record]) -> bool) -> SurfResult<()> {
        if self.failing.contains(table) {
            return Err(SurfError::backend("scan", table, "provisioned throughput exceeded"));
        }
        let found = self.table(table)?;
        for page in found.items.chunks(self.page_size.max(1)) {
            if !on_page(page) {
                debug!(table, "scan stopped by page handler");
                break;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryCertificateStore {
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    /// ARNs whose describe call fails
    #[serde(default)]
    pub failing: BTreeSet<String>,
}

impl MemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        self.certificates.push(certificate);
        self
    }

    pub fn failing_on(mut self, arn: impl Into<String>) -> Self {
        self.failing.insert(arn.into());
        self
    }
}

impl CertificateClient for MemoryCertificateStore {
    fn list_certificates(&self) -> SurfResult<Vec<String>> {
        Ok(self.certificates.iter().map(|c| c.arn.clone()).collect())
    }

    fn describe_certificate(&self, arn: &str) -> SurfResult<Certificate> {
        if self.failing.contains(arn) {
            return Err(SurfError::backend("describe certificate", arn, "throttled"));
        }
        self.certificates
            .iter()
            .find(|c| c.arn == arn)
            .cloned()
            .ok_or_else(|| SurfError::backend("describe certificate", arn, "no such certificate"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::AttributeValue;

    #[test]
    fn test_tree_listing() {
        let store = MemoryTreeStore::new(["secret/a/x", "secret/a/y", "secret/b"]);
        assert_eq!(store.list("secret").unwrap(), vec!["a/", "b"]);
        assert_eq!(store.list("secret/a/").unwrap(), vec!["x", "y"]);
        assert!(store.list("secret/missing").unwrap().is_empty());
        assert_eq!(
            store.list_mounts().unwrap(),
            vec![Mount::new("secret/", "kv")]
        );
    }

    #[test]
    fn test_tree_failure_injection() {
        let store = MemoryTreeStore::new(["secret/a/x"]).failing_on("secret/a/");
        assert!(store.list("secret/a").unwrap_err().is_backend());
    }

    #[test]
    fn test_object_paging() {
        let store = MemoryObjectStore::new()
            .with_bucket("b", ["k1", "k2", "k3", "other"])
            .with_page_size(2);

        let first = store.list_objects("b", "k", None).unwrap();
        assert_eq!(first.keys, vec!["k1", "k2"]);
        let token = first.next_token.unwrap();
        let second = store.list_objects("b", "k", Some(&token)).unwrap();
        assert_eq!(second.keys, vec!["k3"]);
        assert!(second.next_token.is_none());

        let past_end = store
            .list_objects("b", "k", Some(&usize::MAX.to_string()))
            .unwrap();
        assert!(past_end.keys.is_empty());
        assert!(past_end.next_token.is_none());
    }

    #[test]
    fn test_table_scan_pages_and_early_stop() {
        let mut table = MemoryTable::new("users", ["id"]);
        for i in 0..5 {
            table = table.with_item(Record::from([(
                "id".to_string(),
                AttributeValue::String(format!("u-{}", i)),
            )]));
        }
        let store = MemoryTableStore::new().with_table(table).with_page_size(2);

        let mut pages = 0;
        store
            .scan("users", &mut |_| {
                pages += 1;
                true
            })
            .unwrap();
        assert_eq!(pages, 3);

        let mut pages = 0;
        store
            .scan("users", &mut |_| {
                pages += 1;
                false
            })
            .unwrap();
        assert_eq!(pages, 1);
    }

    #[test]
    fn test_global_tables_filtered() {
        let store = MemoryTableStore::new()
            .with_table(MemoryTable::new("local", ["id"]))
            .with_table(MemoryTable::new("replicated", ["id"]).global());
        assert_eq!(store.list_tables(false).unwrap().len(), 1);
        assert_eq!(store.list_tables(true).unwrap().len(), 2);
    }

    #[test]
    fn test_snapshot_yaml() {
        let snapshot: Snapshot = serde_yaml::from_str(
            r#"
vault:
  secrets: ["secret/app/db"]
ddb:
  tables:
    - name: users
      keys: [id]
      items:
        - { id: { S: "u-1" } }
"#,
        )
        .unwrap();
        assert!(snapshot.vault().is_ok());
        assert!(snapshot.s3().is_err());
        assert_eq!(snapshot.ddb().unwrap().tables[0].items.len(), 1);
        assert!(snapshot.acm().is_err());
    }

    #[test]
    fn test_certificate_describe() {
        let store = MemoryCertificateStore::new()
            .with_certificate(Certificate::new("arn:c/1", "a.example.com"))
            .with_certificate(Certificate::new("arn:c/2", "b.example.com"))
            .failing_on("arn:c/2");

        assert_eq!(store.list_certificates().unwrap(), vec!["arn:c/1", "arn:c/2"]);
        assert_eq!(
            store.describe_certificate("arn:c/1").unwrap().domain_name,
            "a.example.com"
        );
        assert!(store.describe_certificate("arn:c/2").unwrap_err().is_backend());
        assert!(store.describe_certificate("arn:c/3").unwrap_err().is_backend());
    }
}
