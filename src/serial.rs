//! Binary snapshots of prepared [`DerivedData`](crate::DerivedData).
//!
//! A snapshot is a 32-byte fixed header followed by a bincode-encoded
//! payload. Hosts use it to cache the output of a preparation pass and skip
//! re-running rule elements when nothing on the character changed.
//!
//! ## Wire Format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic bytes: b"RFDD"
//! 4       2     Format version (u16, little-endian)
//! 6       2     Engine version (u16, little-endian)
//! 8       4     Flags (u32, reserved)
//! 12      4     Payload length in bytes (u32, little-endian)
//! 16      16    BLAKE3 hash of the payload (truncated to 16 bytes)
//! 32..    var   Bincode-encoded payload
//! ```
//!
//! ## Versioning
//!
//! The format version in the header must match exactly. If it does not,
//! deserialization fails immediately with [`DeserializeError::IncompatibleVersion`].
//! The engine version is informational only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    DerivedData, Diagnostic, DiagnosticStage, Modifier, ModifierType, Node, Phase, Predicate,
    PropertyTree, RollOptionSet, Statistic, Value,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MAGIC: &[u8; 4] = b"RFDD";
const FORMAT_VERSION: u16 = 1;
const ENGINE_VERSION: u16 = 1;
const HEADER_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when serializing [`DerivedData`](crate::DerivedData) to bytes.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to encode derived data: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("failed to encode predicate: {0}")]
    Predicate(#[from] serde_json::Error),

    #[error("I/O error during serialization: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur when deserializing [`DerivedData`](crate::DerivedData) from bytes.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a ruleforge snapshot: invalid magic bytes")]
    BadMagic,

    #[error("incompatible format version: blob is v{blob}, engine supports v{supported}")]
    IncompatibleVersion { blob: u16, supported: u16 },

    #[error("integrity check failed: BLAKE3 checksum mismatch")]
    ChecksumMismatch,

    #[error("payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u32, actual: usize },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("I/O error during deserialization: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Serialized type hierarchy
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct SerializedDerivedData {
    metadata: SnapshotMetadata,
    name: String,
    properties: Vec<(String, SerializedNode)>,
    roll_options: Vec<String>,
    domain_options: Vec<(String, Vec<String>)>,
    statistics: Vec<SerializedStatistic>,
    diagnostics: Vec<SerializedDiagnostic>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotMetadata {
    statistic_count: usize,
    roll_option_count: usize,
    diagnostic_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum SerializedNode {
    Leaf(SerializedValue),
    Nested(Vec<(String, SerializedNode)>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum SerializedValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedStatistic {
    selector: String,
    base: i64,
    modifiers: Vec<SerializedModifier>,
    modifier: i64,
    total: i64,
    breakdown: Vec<SerializedModifier>,
    formula: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedModifier {
    slug: Option<String>,
    selector: String,
    modifier_type: ModifierType,
    value: i64,
    enabled: bool,
    source: String,
    /// Predicate in its JSON declaration form.
    predicate: String,
    stackable: bool,
    forced: bool,
    hidden: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedDiagnostic {
    element: String,
    key: String,
    stage: DiagnosticStage,
    phase: Option<Phase>,
    message: String,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

fn serialize_value(value: &Value) -> SerializedValue {
    match value {
        Value::Int(v) => SerializedValue::Int(*v),
        Value::Float(v) => SerializedValue::Float(*v),
        Value::Bool(v) => SerializedValue::Bool(*v),
        Value::String(v) => SerializedValue::String(v.clone()),
    }
}

fn deserialize_value(value: SerializedValue) -> Value {
    match value {
        SerializedValue::Int(v) => Value::Int(v),
        SerializedValue::Float(v) => Value::Float(v),
        SerializedValue::Bool(v) => Value::Bool(v),
        SerializedValue::String(v) => Value::String(v),
    }
}

fn serialize_nodes(nodes: &BTreeMap<String, Node>) -> Vec<(String, SerializedNode)> {
    nodes
        .iter()
        .map(|(key, node)| {
            let node = match node {
                Node::Leaf(v) => SerializedNode::Leaf(serialize_value(v)),
                Node::Nested(children) => SerializedNode::Nested(serialize_nodes(children)),
            };
            (key.clone(), node)
        })
        .collect()
}

fn deserialize_nodes(nodes: Vec<(String, SerializedNode)>) -> BTreeMap<String, Node> {
    nodes
        .into_iter()
        .map(|(key, node)| {
            let node = match node {
                SerializedNode::Leaf(v) => Node::Leaf(deserialize_value(v)),
                SerializedNode::Nested(children) => Node::Nested(deserialize_nodes(children)),
            };
            (key, node)
        })
        .collect()
}

fn serialize_modifier(modifier: &Modifier) -> Result<SerializedModifier, SerializeError> {
    Ok(SerializedModifier {
        slug: modifier.slug.clone(),
        selector: modifier.selector.clone(),
        modifier_type: modifier.modifier_type,
        value: modifier.value,
        enabled: modifier.enabled,
        source: modifier.source.clone(),
        predicate: serde_json::to_string(&modifier.predicate.to_json())?,
        stackable: modifier.stackable,
        forced: modifier.forced,
        hidden: modifier.hidden,
    })
}

fn deserialize_modifier(ser: SerializedModifier) -> Result<Modifier, DeserializeError> {
    let json: serde_json::Value = serde_json::from_str(&ser.predicate).map_err(|e| {
        DeserializeError::Validation(format!("modifier '{}' predicate: {e}", ser.source))
    })?;
    let predicate = Predicate::from_json(&json).map_err(|e| {
        DeserializeError::Validation(format!("modifier '{}' predicate: {e}", ser.source))
    })?;
    Ok(Modifier {
        slug: ser.slug,
        selector: ser.selector,
        modifier_type: ser.modifier_type,
        value: ser.value,
        enabled: ser.enabled,
        source: ser.source,
        predicate,
        stackable: ser.stackable,
        forced: ser.forced,
        hidden: ser.hidden,
    })
}

fn serialize_modifiers(modifiers: &[Modifier]) -> Result<Vec<SerializedModifier>, SerializeError> {
    modifiers.iter().map(serialize_modifier).collect()
}

fn deserialize_modifiers(
    modifiers: Vec<SerializedModifier>,
) -> Result<Vec<Modifier>, DeserializeError> {
    modifiers.into_iter().map(deserialize_modifier).collect()
}

fn options_to_vec(options: &RollOptionSet) -> Vec<String> {
    options.iter().map(str::to_owned).collect()
}

fn data_to_serialized(data: &DerivedData) -> Result<SerializedDerivedData, SerializeError> {
    let statistics = data
        .statistics
        .values()
        .map(|s| {
            Ok(SerializedStatistic {
                selector: s.selector.clone(),
                base: s.base,
                modifiers: serialize_modifiers(&s.modifiers)?,
                modifier: s.modifier,
                total: s.total,
                breakdown: serialize_modifiers(&s.breakdown)?,
                formula: s.formula.clone(),
            })
        })
        .collect::<Result<Vec<_>, SerializeError>>()?;

    let diagnostics = data
        .diagnostics
        .iter()
        .map(|d| SerializedDiagnostic {
            element: d.element.clone(),
            key: d.key.clone(),
            stage: d.stage,
            phase: d.phase,
            message: d.message.clone(),
        })
        .collect();

    Ok(SerializedDerivedData {
        metadata: SnapshotMetadata {
            statistic_count: data.statistics.len(),
            roll_option_count: data.roll_options.len(),
            diagnostic_count: data.diagnostics.len(),
        },
        name: data.name.clone(),
        properties: serialize_nodes(data.properties.nodes()),
        roll_options: options_to_vec(&data.roll_options),
        domain_options: data
            .domain_options
            .iter()
            .map(|(domain, options)| (domain.clone(), options_to_vec(options)))
            .collect(),
        statistics,
        diagnostics,
    })
}

fn serialized_to_data(ser: SerializedDerivedData) -> Result<DerivedData, DeserializeError> {
    validate(&ser)?;

    let mut statistics = BTreeMap::new();
    for s in ser.statistics {
        let statistic = Statistic {
            selector: s.selector.clone(),
            base: s.base,
            modifiers: deserialize_modifiers(s.modifiers)?,
            modifier: s.modifier,
            total: s.total,
            breakdown: deserialize_modifiers(s.breakdown)?,
            formula: s.formula,
        };
        statistics.insert(s.selector, statistic);
    }

    Ok(DerivedData {
        name: ser.name,
        properties: PropertyTree::from_nodes(deserialize_nodes(ser.properties)),
        roll_options: ser.roll_options.into_iter().collect(),
        domain_options: ser
            .domain_options
            .into_iter()
            .map(|(domain, options)| (domain, options.into_iter().collect()))
            .collect(),
        statistics,
        diagnostics: ser
            .diagnostics
            .into_iter()
            .map(|d| Diagnostic {
                element: d.element,
                key: d.key,
                stage: d.stage,
                phase: d.phase,
                message: d.message,
            })
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(ser: &SerializedDerivedData) -> Result<(), DeserializeError> {
    let meta = &ser.metadata;

    if meta.statistic_count != ser.statistics.len() {
        return Err(DeserializeError::Validation(format!(
            "statistic_count {} != statistics.len() {}",
            meta.statistic_count,
            ser.statistics.len()
        )));
    }
    if meta.roll_option_count != ser.roll_options.len() {
        return Err(DeserializeError::Validation(format!(
            "roll_option_count {} != roll_options.len() {}",
            meta.roll_option_count,
            ser.roll_options.len()
        )));
    }
    if meta.diagnostic_count != ser.diagnostics.len() {
        return Err(DeserializeError::Validation(format!(
            "diagnostic_count {} != diagnostics.len() {}",
            meta.diagnostic_count,
            ser.diagnostics.len()
        )));
    }

    let mut seen = std::collections::BTreeSet::new();
    for s in &ser.statistics {
        if !seen.insert(s.selector.as_str()) {
            return Err(DeserializeError::Validation(format!(
                "duplicate statistic '{}'",
                s.selector
            )));
        }
        if s.base.saturating_add(s.modifier) != s.total {
            return Err(DeserializeError::Validation(format!(
                "statistic '{}': total {} != base {} + modifier {}",
                s.selector, s.total, s.base, s.modifier
            )));
        }
        if s.breakdown.len() > s.modifiers.len() {
            return Err(DeserializeError::Validation(format!(
                "statistic '{}': breakdown has {} entries but only {} modifiers",
                s.selector,
                s.breakdown.len(),
                s.modifiers.len()
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Header I/O
// ---------------------------------------------------------------------------

fn write_header(buf: &mut Vec<u8>, payload: &[u8]) {
    let hash = blake3::hash(payload);
    let hash_bytes = hash.as_bytes();

    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&ENGINE_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // flags (reserved)
    #[allow(clippy::cast_possible_truncation)] // payload will never exceed 4 GiB
    let payload_len = payload.len() as u32;
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&hash_bytes[..16]);
}

#[allow(clippy::cast_possible_truncation)] // HEADER_SIZE is 32, always fits in u32
fn read_header(bytes: &[u8]) -> Result<(u16, u32, [u8; 16]), DeserializeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DeserializeError::LengthMismatch {
            expected: HEADER_SIZE as u32,
            actual: bytes.len(),
        });
    }

    if &bytes[0..4] != MAGIC {
        return Err(DeserializeError::BadMagic);
    }

    let format_version = u16::from_le_bytes([bytes[4], bytes[5]]);
    // bytes[6..8] is engine_version, bytes[8..12] is flags
    let payload_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

    let mut hash = [0u8; 16];
    hash.copy_from_slice(&bytes[16..32]);

    Ok((format_version, payload_len, hash))
}

// ---------------------------------------------------------------------------
// Public encode/decode
// ---------------------------------------------------------------------------

pub(crate) fn encode(data: &DerivedData) -> Result<Vec<u8>, SerializeError> {
    let serialized = data_to_serialized(data)?;
    let payload = bincode::serde::encode_to_vec(&serialized, bincode::config::standard())?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    write_header(&mut buf, &payload);
    buf.extend_from_slice(&payload);
    Ok(buf)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<DerivedData, DeserializeError> {
    let (format_version, payload_len, stored_hash) = read_header(bytes)?;

    if format_version != FORMAT_VERSION {
        return Err(DeserializeError::IncompatibleVersion {
            blob: format_version,
            supported: FORMAT_VERSION,
        });
    }

    let payload_end = HEADER_SIZE + payload_len as usize;
    if bytes.len() < payload_end {
        return Err(DeserializeError::LengthMismatch {
            expected: payload_len,
            actual: bytes.len() - HEADER_SIZE,
        });
    }
    let payload = &bytes[HEADER_SIZE..payload_end];

    if blake3::hash(payload).as_bytes()[..16] != stored_hash {
        return Err(DeserializeError::ChecksumMismatch);
    }

    let (serialized, _): (SerializedDerivedData, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())?;

    serialized_to_data(serialized)
}

impl DerivedData {
    /// Serialize this snapshot to a byte vector.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        encode(self)
    }

    /// Deserialize a snapshot previously produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`] on format, integrity, or validation failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeserializeError> {
        decode(bytes)
    }

    /// Serialize this snapshot and write it to a file.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`] on encoding or I/O failure.
    pub fn to_binary_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), SerializeError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read a file and deserialize the snapshot it contains.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`] on I/O, format, integrity, or validation failure.
    pub fn from_binary_file(path: impl AsRef<std::path::Path>) -> Result<Self, DeserializeError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
