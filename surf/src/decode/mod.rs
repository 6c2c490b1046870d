//! Turns table-store records into searchable text.
//!
//! A [`StrategyDecoder`] applies an ordered list of [`DecodeStrategy`] values
//! to a record. Each strategy may set a field, skip it, or (when allowed)
//! override what an earlier strategy produced. Strategies can be limited to
//! the table's key-schema attributes or to the non-key attributes.

pub mod attribute;
pub mod proto;

use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

use crate::errors::SurfResult;
pub use attribute::{AttributeValue, Record, BINARY_PLACEHOLDER, INVALID_PLACEHOLDER};

/// Attribute name to searchable text. Null and unrenderable attributes are
/// absent.
pub type DecodedRecord = BTreeMap<String, String>;

/// Key schema of one table, as returned by a describe call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub key_attributes: BTreeSet<String>,
}

impl TableSchema {
    pub fn new<I, S>(table: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            key_attributes: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_key(&self, attribute: &str) -> bool {
        self.key_attributes.contains(attribute)
    }
}

/// Which attributes a strategy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    All,
    KeysOnly,
    NonKeysOnly,
}

impl KeyScope {
    fn admits(self, is_key: bool) -> bool {
        match self {
            KeyScope::All => true,
            KeyScope::KeysOnly => is_key,
            KeyScope::NonKeysOnly => !is_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// Treat binary blobs as unknown-schema protobuf messages and join their
    /// length-delimited payloads with `delimiter`.
    ProtoSniff {
        scope: KeyScope,
        override_existing: bool,
        delimiter: String,
    },
    /// Generic rendering of the value. Renderings containing a binary or
    /// invalid-value placeholder are dropped, except that a plain binary
    /// attribute falls back to its raw bytes.
    GenericText {
        scope: KeyScope,
        override_existing: bool,
    },
}

impl DecodeStrategy {
    fn scope(&self) -> KeyScope {
        match self {
            DecodeStrategy::ProtoSniff { scope, .. } | DecodeStrategy::GenericText { scope, .. } => {
                *scope
            }
        }
    }

    fn override_existing(&self) -> bool {
        match self {
            DecodeStrategy::ProtoSniff {
                override_existing, ..
            }
            | DecodeStrategy::GenericText {
                override_existing, ..
            } => *override_existing,
        }
    }

    /// Applies this strategy to every admissible attribute of `record`.
    pub fn apply(&self, record: &Record, schema: &TableSchema, out: &mut DecodedRecord) {
        for (name, value) in record {
            if !self.scope().admits(schema.is_key(name)) {
                continue;
            }
            if out.contains_key(name) && !self.override_existing() {
                continue;
            }
            if value.is_null() {
                continue;
            }

            let decoded = match self {
                DecodeStrategy::ProtoSniff { delimiter, .. } => sniff_proto(value, delimiter),
                DecodeStrategy::GenericText { .. } => generic_text(value),
            };
            if let Some(text) = decoded {
                trace!(attribute = %name, "decoded attribute");
                out.insert(name.clone(), text);
            }
        }
    }
}

fn sniff_proto(value: &AttributeValue, delimiter: &str) -> Option<String> {
    let blobs = value.binary_blobs()?;
    let mut payloads = Vec::new();
    for blob in blobs {
        if let Some(found) = proto::parse_unknown(blob) {
            payloads.extend(found);
        }
    }
    if payloads.is_empty() {
        return None;
    }
    Some(proto::join_payloads(&payloads, delimiter))
}

fn generic_text(value: &AttributeValue) -> Option<String> {
    let rendered = value.render();
    if rendered.is_empty() {
        return None;
    }
    let placeholder =
        rendered.contains(BINARY_PLACEHOLDER) || rendered.contains(INVALID_PLACEHOLDER);
    if !placeholder {
        return Some(rendered);
    }
    match value {
        AttributeValue::Binary(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Converts one record into searchable text.
pub trait RecordDecoder: Send + Sync {
    fn decode(&self, record: &Record) -> SurfResult<DecodedRecord>;
}

/// Builds a decoder for a described table.
pub trait DecoderFactory: Send + Sync {
    type Decoder: RecordDecoder;

    fn decoder_for(&self, schema: &TableSchema) -> Self::Decoder;
}

#[derive(Debug, Clone)]
pub struct StrategyDecoder {
    schema: TableSchema,
    strategies: Vec<DecodeStrategy>,
}

impl StrategyDecoder {
    pub fn new(schema: TableSchema, strategies: Vec<DecodeStrategy>) -> Self {
        Self { schema, strategies }
    }

    pub fn strategies(&self) -> &[DecodeStrategy] {
        &self.strategies
    }
}

impl RecordDecoder for StrategyDecoder {
    fn decode(&self, record: &Record) -> SurfResult<DecodedRecord> {
        let mut out = DecodedRecord::new();
        for strategy in &self.strategies {
            strategy.apply(record, &self.schema, &mut out);
        }
        Ok(out)
    }
}

/// Protobuf sniffing on non-key binary attributes first, then generic text
/// for anything still unset.
#[derive(Debug, Clone)]
pub struct DefaultDecoderFactory {
    pub delimiter: String,
}

impl Default for DefaultDecoderFactory {
    fn default() -> Self {
        Self {
            delimiter: " ".to_string(),
        }
    }
}

impl DefaultDecoderFactory {
    pub fn with_delimiter(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }
}

impl DecoderFactory for DefaultDecoderFactory {
    type Decoder = StrategyDecoder;

    fn decoder_for(&self, schema: &TableSchema) -> StrategyDecoder {
        StrategyDecoder::new(
            schema.clone(),
            vec![
                DecodeStrategy::ProtoSniff {
                    scope: KeyScope::NonKeysOnly,
                    override_existing: true,
                    delimiter: self.delimiter.clone(),
                },
                DecodeStrategy::GenericText {
                    scope: KeyScope::All,
                    override_existing: false,
                },
            ],
        )
    }
}
