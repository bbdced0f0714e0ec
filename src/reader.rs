//! Document Reader: parses the bracketed per-document annotation stream.
//!
//! The stream format frames each document with `#BeginOfDocument <id>` /
//! `#EndOfDocument`. Inside a frame, `@`-prefixed lines are relations,
//! other `#`-prefixed lines are comments, blank lines are ignored, and
//! everything else is a mention line. Mention lines stay raw until the
//! document is evaluated, because filtering the token ids needs that
//! document's token table.

use std::collections::BTreeMap;
use std::io::BufRead;

use crate::config::{
    EvalConfig, BOD_MARKER, COMMENT_MARKER, EOD_MARKER, RELATION_MARKER, TOKEN_JOINER,
};
use crate::error::{Error, Result};
use crate::mention::{Mention, Relation};
use crate::token::TokenTable;

/// Raw annotation lines of one document, not yet token-resolved.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    /// Mention lines, stripped, in stream order.
    pub mention_lines: Vec<String>,
    /// Relation lines with the `@` prefix removed.
    pub relation_lines: Vec<String>,
}

/// All documents of one annotation file, keyed by document id.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    /// Documents in the file, keyed and iterated by sorted document id.
    pub docs: BTreeMap<String, RawDocument>,
    /// Run id (derived by the caller, e.g. from the file name).
    pub run_id: String,
}

/// Read an annotation stream into a [`Corpus`].
pub fn read_corpus<R: BufRead>(reader: R, run_id: impl Into<String>) -> Result<Corpus> {
    let mut docs = BTreeMap::new();
    let mut mention_lines = Vec::new();
    let mut relation_lines = Vec::new();
    let mut doc_id = String::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.starts_with(COMMENT_MARKER) {
            if let Some(id) = line.strip_prefix(BOD_MARKER) {
                doc_id = id.trim().to_string();
            } else if line.starts_with(EOD_MARKER) {
                docs.insert(
                    std::mem::take(&mut doc_id),
                    RawDocument {
                        mention_lines: std::mem::take(&mut mention_lines),
                        relation_lines: std::mem::take(&mut relation_lines),
                    },
                );
            }
        } else if let Some(rel) = line.strip_prefix(RELATION_MARKER) {
            relation_lines.push(rel.trim().to_string());
        } else if !line.is_empty() {
            mention_lines.push(line.to_string());
        }
    }

    Ok(Corpus {
        docs,
        run_id: run_id.into(),
    })
}

/// A gold/system raw document pair to be scored.
#[derive(Debug, Clone)]
pub struct RawDocumentPair {
    /// Shared document id.
    pub doc_id: String,
    /// Gold-side raw annotations.
    pub gold: RawDocument,
    /// System-side raw annotations; empty when the system skipped the
    /// document.
    pub system: RawDocument,
}

/// Pair gold and system corpora by document id.
///
/// Ids on one side only are warned about; gold-only documents are still
/// scored against an empty system response, system-only documents are
/// dropped. Pairs come back in sorted gold-document-id order.
#[must_use]
pub fn pair_documents(gold: &Corpus, system: &Corpus) -> Vec<RawDocumentPair> {
    for id in gold.docs.keys() {
        if !system.docs.contains_key(id) {
            log::warn!("Document [{id}] found in gold standard but not in system");
        }
    }
    for id in system.docs.keys() {
        if !gold.docs.contains_key(id) {
            log::warn!("Document [{id}] found in system but not in gold standard");
        }
    }
    if !gold.docs.keys().any(|id| system.docs.contains_key(id)) && !gold.docs.is_empty() {
        log::warn!("No document to score, document ids are all different!");
    }

    gold.docs
        .iter()
        .map(|(doc_id, g)| RawDocumentPair {
            doc_id: doc_id.clone(),
            gold: g.clone(),
            system: system.docs.get(doc_id).cloned().unwrap_or_default(),
        })
        .collect()
}

/// Parse a tab-separated mention line into a [`Mention`].
///
/// Layout: `(runId, docId, mentionId, tokenIds, text, attr1, attr2, ...)`.
/// Fewer than `5 + attribute count` fields is a fatal parse error.
pub fn parse_mention_line(
    line: &str,
    config: &EvalConfig,
    tokens: &TokenTable,
) -> Result<Mention> {
    let fields: Vec<&str> = line.split('\t').collect();
    let num_attributes = config.attribute_names.len();
    if fields.len() < 5 + num_attributes {
        return Err(Error::parse(format!(
            "Mention line has too few fields:\n ---> {line}"
        )));
    }

    let original_tokens: Vec<String> = fields[3]
        .split(TOKEN_JOINER)
        .map(str::to_string)
        .collect();
    // The not-annotated sentinel must survive canonicalization so it can
    // still receive automatic credit during attribute matching.
    let attributes = fields[5..5 + num_attributes]
        .iter()
        .map(|a| {
            if *a == crate::config::MISSING_ATTRIBUTE_PLACEHOLDER {
                a.to_string()
            } else {
                crate::eval::attributes::canonicalize(a, config.canonicalize_types)
            }
        })
        .collect();

    Ok(Mention::new(
        fields[2],
        original_tokens,
        fields[4],
        attributes,
        |t| tokens.is_invisible(t),
    ))
}

/// Parse a relation line (already stripped of its `@` prefix):
/// `<Name>\t<relationId>\t<arg1,arg2,...>`.
pub fn parse_relation_line(line: &str) -> Result<Relation> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < 3 {
        return Err(Error::parse(format!(
            "Relation line has too few fields:\n ---> {line}"
        )));
    }
    Ok(Relation {
        name: parts[0].to_string(),
        id: parts[1].to_string(),
        args: parts[2].split(',').map(str::to_string).collect(),
    })
}
