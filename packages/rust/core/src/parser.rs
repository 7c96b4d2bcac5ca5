//! Tolerant parsing of structured generator output.
//!
//! Generator JSON is often wrapped in Markdown fences, surrounded by prose
//! or syntactically broken. Recovery tries these layers in order and stops
//! at the first that yields valid JSON:
//!
//! 1. strict parse of the raw text
//! 2. normalize (trim, strip code fences) and re-parse
//! 3. extract the first balanced `{...}` or `[...]` block and re-parse
//! 4. ask the generator to repair the extracted block (optional)
//!
//! The recovered value is then coerced to the canonical shape, deserialized,
//! validated, and finally checked for cardinality. Schema and count
//! failures are separate [`ParseError`] variants.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use leadmagnet_shared::{DocumentStructure, QueryList, redact_secrets};

use crate::ports::TextGenerator;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// One recovery layer of the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryLayer {
    Strict,
    Normalize,
    Extract,
    Repair,
}

impl RecoveryLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Normalize => "normalize",
            Self::Extract => "extract",
            Self::Repair => "repair",
        }
    }
}

impl fmt::Display for RecoveryLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn join_layers(layers: &[RecoveryLayer]) -> String {
    layers
        .iter()
        .map(RecoveryLayer::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Structured output could not be turned into a valid value.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// No recovery layer produced valid JSON.
    #[error("failed to parse JSON after trying layers [{}]: {detail}", join_layers(.layers))]
    Unrecoverable {
        layers: Vec<RecoveryLayer>,
        detail: String,
    },

    /// JSON was valid but did not match the expected schema.
    #[error("{kind} does not match the expected schema: {detail}")]
    Schema { kind: &'static str, detail: String },

    /// The value was well-formed but held the wrong number of items.
    #[error("expected {expected} {kind}, got {actual}")]
    Cardinality {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

// ---------------------------------------------------------------------------
// Target shapes
// ---------------------------------------------------------------------------

/// A typed value the parser can produce from generator JSON.
pub trait StructuredOutput: DeserializeOwned {
    /// Human-readable name of the whole value, used in schema errors.
    const LABEL: &'static str;
    /// Name of the counted items, used in cardinality errors.
    const ITEM_KIND: &'static str;

    /// Normalize near-miss JSON shapes before deserialization.
    fn coerce_shape(value: Value) -> Value {
        value
    }

    /// Semantic checks beyond what deserialization enforces.
    fn validate(&self) -> leadmagnet_shared::Result<()>;

    /// Number of items compared against the expected cardinality.
    fn item_count(&self) -> usize;
}

impl StructuredOutput for QueryList {
    const LABEL: &'static str = "query list";
    const ITEM_KIND: &'static str = "queries";

    fn coerce_shape(value: Value) -> Value {
        coerce_query_shape(value)
    }

    fn validate(&self) -> leadmagnet_shared::Result<()> {
        QueryList::validate(self)
    }

    fn item_count(&self) -> usize {
        self.queries.len()
    }
}

impl StructuredOutput for DocumentStructure {
    const LABEL: &'static str = "document structure";
    const ITEM_KIND: &'static str = "chapters";

    fn validate(&self) -> leadmagnet_shared::Result<()> {
        DocumentStructure::validate(self)
    }

    fn item_count(&self) -> usize {
        self.chapters.len()
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parse generator output into `T`, recovering from malformed JSON where
/// possible and requiring exactly `expected_count` items.
///
/// `repair` enables the generator repair layer; pass `None` to skip it.
pub async fn parse_structured<T: StructuredOutput>(
    raw: &str,
    expected_count: usize,
    repair: Option<&dyn TextGenerator>,
) -> Result<T, ParseError> {
    let (value, layer) = recover_json(raw, repair).await?;
    debug!(layer = %layer, kind = T::LABEL, "recovered JSON");

    let value = T::coerce_shape(value);

    let parsed: T = serde_json::from_value(value).map_err(|e| ParseError::Schema {
        kind: T::LABEL,
        detail: e.to_string(),
    })?;
    parsed.validate().map_err(|e| ParseError::Schema {
        kind: T::LABEL,
        detail: e.to_string(),
    })?;

    let actual = parsed.item_count();
    if actual != expected_count {
        return Err(ParseError::Cardinality {
            kind: T::ITEM_KIND,
            expected: expected_count,
            actual,
        });
    }

    Ok(parsed)
}

/// Run the recovery layers and return the first valid JSON value together
/// with the layer that produced it.
pub async fn recover_json(
    raw: &str,
    repair: Option<&dyn TextGenerator>,
) -> Result<(Value, RecoveryLayer), ParseError> {
    if let Ok(value) = serde_json::from_str(raw) {
        return Ok((value, RecoveryLayer::Strict));
    }

    let normalized = normalize_raw_json(raw);
    if let Ok(value) = serde_json::from_str(&normalized) {
        return Ok((value, RecoveryLayer::Normalize));
    }

    let extracted = extract_first_json_block(&normalized);
    let extract_err = match serde_json::from_str(extracted) {
        Ok(value) => return Ok((value, RecoveryLayer::Extract)),
        Err(e) => e,
    };
    debug!(error = %extract_err, "extraction did not yield valid JSON");

    let mut layers = vec![
        RecoveryLayer::Strict,
        RecoveryLayer::Normalize,
        RecoveryLayer::Extract,
    ];

    let Some(generator) = repair else {
        return Err(ParseError::Unrecoverable {
            layers,
            detail: format!("{extract_err} (no repair collaborator available)"),
        });
    };

    layers.push(RecoveryLayer::Repair);
    debug!("attempting generator repair pass");

    let detail = match generator.repair_json(extracted).await {
        Ok(repaired) => match serde_json::from_str(normalize_raw_json(&repaired).as_str()) {
            Ok(value) => return Ok((value, RecoveryLayer::Repair)),
            Err(e) => format!("repaired output is still invalid: {e}"),
        },
        Err(e) => {
            let msg = redact_secrets(&e.to_string());
            warn!(error = %msg, "JSON repair call failed");
            format!("repair call failed: {msg}")
        }
    };

    Err(ParseError::Unrecoverable { layers, detail })
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// Trim whitespace and strip a leading ```` ``` ```` / ```` ```json ```` fence and a
/// trailing ```` ``` ```` fence.
pub fn normalize_raw_json(raw: &str) -> String {
    static LEADING_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^```(?:json)?").expect("valid regex")
    });
    static TRAILING_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"```$").expect("valid regex")
    });

    let trimmed = raw.trim();
    let without_leading = LEADING_FENCE_RE.replace(trimmed, "");
    let without_trailing = TRAILING_FENCE_RE.replace(without_leading.trim(), "");
    without_trailing.trim().to_string()
}

/// Return the first balanced `{...}` block (one level of nesting), else the
/// first balanced `[...]` block, else the input unchanged.
pub fn extract_first_json_block(text: &str) -> &str {
    static OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("valid regex")
    });
    static ARRAY_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[[^\[\]]*(?:\[[^\[\]]*\][^\[\]]*)*\]").expect("valid regex")
    });

    if let Some(m) = OBJECT_RE.find(text) {
        return m.as_str();
    }
    if let Some(m) = ARRAY_RE.find(text) {
        return m.as_str();
    }
    text
}

// ---------------------------------------------------------------------------
// Query shape coercion
// ---------------------------------------------------------------------------

/// Keys that generators commonly use instead of `queries`.
const QUERY_ALIAS_KEYS: &[&str] = &["query", "search_queries", "items", "results"];

type ShapeStrategy = fn(&Value) -> Option<Value>;

/// Tried in order; the first strategy returning `Some` wins.
const QUERY_SHAPE_STRATEGIES: &[(&str, ShapeStrategy)] = &[
    ("bare_list", wrap_bare_list),
    ("canonical", canonical_queries),
    ("alias_key", alias_key_list),
    ("first_list_field", first_list_field),
];

fn queries_object(list: &Value) -> Value {
    serde_json::json!({ "queries": list })
}

fn wrap_bare_list(value: &Value) -> Option<Value> {
    value.is_array().then(|| queries_object(value))
}

fn canonical_queries(value: &Value) -> Option<Value> {
    value
        .get("queries")
        .filter(|v| v.is_array())
        .map(queries_object)
}

fn alias_key_list(value: &Value) -> Option<Value> {
    let obj = value.as_object()?;
    QUERY_ALIAS_KEYS
        .iter()
        .find_map(|key| obj.get(*key).filter(|v| v.is_array()))
        .map(queries_object)
}

fn first_list_field(value: &Value) -> Option<Value> {
    value
        .as_object()?
        .values()
        .find(|v| v.is_array())
        .map(queries_object)
}

/// Coerce near-miss shapes to `{"queries": [...]}`. Unrecognized shapes are
/// returned unchanged and fail later validation.
pub fn coerce_query_shape(value: Value) -> Value {
    for (name, strategy) in QUERY_SHAPE_STRATEGIES {
        if let Some(coerced) = strategy(&value) {
            debug!(strategy = name, "coerced query shape");
            return coerced;
        }
    }
    value
}
