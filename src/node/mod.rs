//! Generic tree node for JSON/YAML-like data (spec §4.3).
//!
//! [`StructuredNode`] is the tree; [`NodeReader`] is a read-only, dotted-path
//! view over it. [`merge`] implements the strategic-merge operation the
//! `ManifestGenerator` uses to turn a PATCH request body plus a prior full
//! manifest into an updated full manifest.

mod merge;
mod reader;

pub use merge::{merge, MergeArrayStrategy, MergeConfig, MergeError};
pub use reader::{NodeReader, SerializeFormat};

use indexmap::IndexMap;

/// A JSON/YAML scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A tree of `{scalar, sequence, mapping}` (spec §3).
///
/// Mapping order is preserved (`IndexMap`) so a "map-order strategy" (spec
/// §4.3) is simply "the order `merge` inserted/retained keys in".
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredNode {
    Null,
    Scalar(Scalar),
    Sequence(Vec<StructuredNode>),
    Mapping(IndexMap<String, StructuredNode>),
}

impl StructuredNode {
    pub fn null() -> Self {
        Self::Null
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::Scalar(Scalar::String(s.into()))
    }

    pub fn int(i: i64) -> Self {
        Self::Scalar(Scalar::Int(i))
    }

    pub fn bool(b: bool) -> Self {
        Self::Scalar(Scalar::Bool(b))
    }

    pub fn mapping(entries: impl IntoIterator<Item = (String, StructuredNode)>) -> Self {
        Self::Mapping(entries.into_iter().collect())
    }

    pub fn sequence(items: impl IntoIterator<Item = StructuredNode>) -> Self {
        Self::Sequence(items.into_iter().collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, StructuredNode>> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[StructuredNode]> {
        match self {
            Self::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn reader(&self) -> NodeReader<'_> {
        NodeReader::new(self)
    }

    /// Parse a JSON document into a `StructuredNode`.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Ok(Self::from_json_value(&value))
    }

    pub fn from_json_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::int(i)
                } else {
                    Self::Scalar(Scalar::Float(n.as_f64().unwrap_or_default()))
                }
            }
            serde_json::Value::String(s) => Self::string(s.clone()),
            serde_json::Value::Array(items) => {
                Self::sequence(items.iter().map(Self::from_json_value))
            }
            serde_json::Value::Object(map) => Self::mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json_value(v))),
            ),
        }
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Scalar(Scalar::String(s)) => serde_json::Value::String(s.clone()),
            Self::Scalar(Scalar::Int(i)) => serde_json::Value::from(*i),
            Self::Scalar(Scalar::Float(x)) => {
                serde_json::Number::from_f64(*x).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            Self::Scalar(Scalar::Bool(b)) => serde_json::Value::Bool(*b),
            Self::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json_value).collect())
            }
            Self::Mapping(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect(),
            ),
        }
    }

    /// Serialize to a compact JSON string (spec §4.3 `NodeReader::Serialize`).
    /// Strips `'@type'` keys: cloud-protobuf annotations irrelevant to
    /// semantics (spec §4.5).
    pub fn to_json_string(&self) -> String {
        let stripped = self.clone().strip_type_annotations();
        serde_json::to_string(&stripped.to_json_value()).unwrap_or_default()
    }

    pub fn to_yaml_string(&self) -> String {
        let stripped = self.clone().strip_type_annotations();
        serde_yaml::to_string(&stripped.to_json_value()).unwrap_or_default()
    }

    /// Remove `'@type'` entries from every mapping in the tree (spec §4.5:
    /// "strips `'@type'` lines from its serialized output").
    pub fn strip_type_annotations(self) -> Self {
        match self {
            Self::Mapping(map) => Self::Mapping(
                map.into_iter()
                    .filter(|(k, _)| k != "@type")
                    .map(|(k, v)| (k, v.strip_type_annotations()))
                    .collect(),
            ),
            Self::Sequence(items) => {
                Self::Sequence(items.into_iter().map(Self::strip_type_annotations).collect())
            }
            other => other,
        }
    }
}
