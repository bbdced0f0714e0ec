//! Run-level evaluation configuration.
//!
//! Mirrors the submission format constants (document framing markers,
//! relation names, field separators) and the knobs that vary between
//! evaluation rounds (attribute schema, coreference alignment threshold,
//! token offset columns).

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Marker opening a document block in the annotation stream.
pub const BOD_MARKER: &str = "#BeginOfDocument";
/// Marker closing a document block.
pub const EOD_MARKER: &str = "#EndOfDocument";
/// Prefix of comment lines.
pub const COMMENT_MARKER: &str = "#";
/// Prefix of relation lines.
pub const RELATION_MARKER: &str = "@";
/// Relation name carrying coreference semantics.
pub const COREFERENCE_RELATION_NAME: &str = "Coreference";
/// Sentinel marking a gold attribute that was not annotated; it receives
/// automatic credit during attribute matching.
pub const MISSING_ATTRIBUTE_PLACEHOLDER: &str = "NOT_ANNOTATED";
/// Joiner between token ids inside a mention field.
pub const TOKEN_JOINER: char = ',';

/// CoNLL fragment header prefix.
pub const CONLL_BOD_MARKER: &str = "#begin document";
/// CoNLL fragment footer.
pub const CONLL_EOD_MARKER: &str = "#end document";

/// Directed temporal relation names recognized by the graph reducer.
pub static DIRECTED_RELATIONS: Lazy<Vec<&'static str>> = Lazy::new(|| vec!["After", "Subevent"]);

/// Default attribute schema, in submission column order.
pub static DEFAULT_ATTRIBUTE_NAMES: Lazy<Vec<String>> =
    Lazy::new(|| vec!["mention_type".to_string(), "realis_status".to_string()]);

/// Configuration for one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Tracked mention attribute names, in the order they appear on
    /// mention lines after the text field.
    pub attribute_names: Vec<String>,
    /// Lowercase and strip whitespace/punctuation from attribute values
    /// before comparison.
    pub canonicalize_types: bool,
    /// Minimum alignment score for a system mention to be carried into the
    /// coreference projection (1.0 requires exact span match).
    pub coref_mention_threshold: f64,
    /// Zero-based columns of the token table holding begin/end character
    /// offsets.
    pub token_offset_fields: (usize, usize),
    /// Token surface forms excluded from span scoring.
    pub invisible_words: Vec<String>,
    /// Attribute names a mapped pair must agree on before it feeds the
    /// coreference projection; empty means the span-only mapping is used.
    pub coref_criteria: Vec<String>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            attribute_names: DEFAULT_ATTRIBUTE_NAMES.clone(),
            canonicalize_types: true,
            coref_mention_threshold: 1.0,
            token_offset_fields: (2, 3),
            invisible_words: Vec::new(),
            coref_criteria: vec!["mention_type".to_string()],
        }
    }
}
