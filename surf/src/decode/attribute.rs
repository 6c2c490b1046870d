use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder the generic renderer emits for binary content.
pub const BINARY_PLACEHOLDER: &str = "<binary>";
/// Placeholder the generic renderer emits for a value with no usable content.
pub const INVALID_PLACEHOLDER: &str = "<invalid value>";

/// One row of a table store: attribute name to typed value.
pub type Record = BTreeMap<String, AttributeValue>;

/// A typed table-store attribute.
///
/// Serialises in the wire shape of the table store (`{"S": "..."}`,
/// `{"N": "42"}`, `{"B": [..]}`), which is also the snapshot file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    String(String),
    #[serde(rename = "N")]
    Number(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "B")]
    Binary(Vec<u8>),
    #[serde(rename = "SS")]
    StringSet(Vec<String>),
    #[serde(rename = "NS")]
    NumberSet(Vec<String>),
    #[serde(rename = "BS")]
    BinarySet(Vec<Vec<u8>>),
    #[serde(rename = "L")]
    List(Vec<AttributeValue>),
    #[serde(rename = "M")]
    Map(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// `NULL: true`, an explicit null.
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null(true))
    }

    /// The blobs of a binary or binary-set attribute.
    pub fn binary_blobs(&self) -> Option<Vec<&[u8]>> {
        match self {
            AttributeValue::Binary(bytes) if !bytes.is_empty() => Some(vec![bytes.as_slice()]),
            AttributeValue::BinarySet(set) if !set.is_empty() => {
                Some(set.iter().map(Vec::as_slice).collect())
            }
            _ => None,
        }
    }

    /// Generic debug rendering, e.g. `{ S: "alice" }` or `{ B: <binary> len 3 }`.
    pub fn render(&self) -> String {
        format!("{{ {} }}", self)
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "]")
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "S: {:?}", s),
            AttributeValue::Number(n) => write!(f, "N: {:?}", n),
            AttributeValue::Bool(b) => write!(f, "BOOL: {}", b),
            AttributeValue::Null(true) => write!(f, "NULL: true"),
            AttributeValue::Null(false) => write!(f, "{}", INVALID_PLACEHOLDER),
            AttributeValue::Binary(bytes) => {
                write!(f, "B: {} len {}", BINARY_PLACEHOLDER, bytes.len())
            }
            AttributeValue::StringSet(set) => {
                let quoted: Vec<String> = set.iter().map(|s| format!("{:?}", s)).collect();
                write!(f, "SS: ")?;
                write_list(f, &quoted)
            }
            AttributeValue::NumberSet(set) => {
                let quoted: Vec<String> = set.iter().map(|s| format!("{:?}", s)).collect();
                write!(f, "NS: ")?;
                write_list(f, &quoted)
            }
            AttributeValue::BinarySet(set) => {
                write!(f, "BS: {} len {}", BINARY_PLACEHOLDER, set.len())
            }
            AttributeValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| format!("{{ {} }}", v)).collect();
                write!(f, "L: ")?;
                write_list(f, &rendered)
            }
            AttributeValue::Map(map) => {
                write!(f, "M: {{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {{ {} }}", k, v)?;
                }
                write!(f, " }}")
            }
        }
    }
}
