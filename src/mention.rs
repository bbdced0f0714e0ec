//! Data model: mentions, relations, per-document annotation tables.
//!
//! Everything here is constructed per document, consumed within that
//! document's evaluation, and released. No cross-document state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// An event mention: a (possibly discontinuous) set of tokens plus the
/// schema-defined attribute values, owned by exactly one document side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// Document-local mention id.
    pub id: String,
    /// Token ids of the span after invisible-word filtering. Overlap
    /// scoring operates on this set.
    pub tokens: BTreeSet<String>,
    /// Original token ids in submission order, before filtering. Used for
    /// diff output and CoNLL projection.
    pub original_tokens: Vec<String>,
    /// Surface text as submitted.
    pub text: String,
    /// Attribute values in schema order (canonicalized).
    pub attributes: Vec<String>,
}

impl Mention {
    /// Create a mention; the filtered token set is derived from
    /// `original_tokens` minus `invisible` ids.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        original_tokens: Vec<String>,
        text: impl Into<String>,
        attributes: Vec<String>,
        invisible: impl Fn(&str) -> bool,
    ) -> Self {
        let tokens = original_tokens
            .iter()
            .filter(|t| !invisible(t.as_str()))
            .cloned()
            .collect();
        Self {
            id: id.into(),
            tokens,
            original_tokens,
            text: text.into(),
            attributes,
        }
    }

    /// Token ids of the span, sorted in natural (numeric-aware) order.
    #[must_use]
    pub fn sorted_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.original_tokens.clone();
        tokens.sort_by(|a, b| crate::eval::coref::natural_order(a).cmp(&crate::eval::coref::natural_order(b)));
        tokens
    }
}

/// A typed relation over two or more mention ids.
///
/// Coreference relations are undirected with transitive-equivalence
/// semantics (closure resolved upstream, validated here); temporal
/// relations are directed and typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation name (e.g. `Coreference`, `After`, `Subevent`).
    pub name: String,
    /// Relation id as submitted.
    pub id: String,
    /// Mention-id arguments, in submission order.
    pub args: Vec<String>,
}

/// One side (gold or system) of a document: its mention table plus the
/// relations declared over those mentions.
#[derive(Debug, Clone, Default)]
pub struct DocumentSide {
    /// Mention table in submission order. Alignment indexes into this.
    pub mentions: Vec<Mention>,
    /// All declared relations.
    pub relations: Vec<Relation>,
}

impl DocumentSide {
    /// Relations with the given name.
    #[must_use]
    pub fn relations_named(&self, name: &str) -> Vec<&Relation> {
        self.relations.iter().filter(|r| r.name == name).collect()
    }

    /// Coreference relations.
    #[must_use]
    pub fn coreference_relations(&self) -> Vec<&Relation> {
        self.relations_named(crate::config::COREFERENCE_RELATION_NAME)
    }

    /// Directed temporal relations (any recognized directed type).
    #[must_use]
    pub fn temporal_relations(&self) -> Vec<&Relation> {
        self.relations
            .iter()
            .filter(|r| crate::config::DIRECTED_RELATIONS.contains(&r.name.as_str()))
            .collect()
    }
}
