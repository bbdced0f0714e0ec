//! Per-document token table.
//!
//! Resolves token ids to surface text and character spans, and tracks the
//! "invisible" (stop-word) token ids excluded from span scoring. One table
//! is loaded per document and discarded after that document is scored.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use crate::error::Result;

/// Token table for a single document.
///
/// A missing token file degrades to an empty table (empty invisible-word
/// set, empty span map) with a warning rather than aborting the run, so
/// partial submissions still score.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    id_to_text: HashMap<String, String>,
    id_to_span: HashMap<String, (u32, u32)>,
    invisible: HashSet<String>,
}

impl TokenTable {
    /// Empty table: every token id unknown, nothing invisible.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a token table from a tab-separated reader.
    ///
    /// Expected columns: `(tokenId, tokenText, ..., beginOffset, endOffset, ...)`
    /// with the offset columns selected by `offset_fields`. A line with
    /// fewer than four fields is skipped with an error log; offsets that
    /// fail integer parsing keep the token text but record no span.
    pub fn from_reader<R: BufRead>(
        reader: R,
        offset_fields: (usize, usize),
        invisible_words: &[String],
    ) -> Result<Self> {
        let invisible_set: HashSet<&str> = invisible_words.iter().map(String::as_str).collect();
        let mut table = Self::default();

        for line in reader.lines() {
            let line = line?;
            let fields: Vec<&str> = line.trim_end().split('\t').collect();
            if fields.len() < 4 {
                log::error!("Weird token line: {line}");
                continue;
            }

            let token_id = fields[0].to_string();
            let token = fields[1].trim().to_lowercase();

            let begin = fields.get(offset_fields.0).and_then(|f| f.parse::<u32>().ok());
            let end = fields.get(offset_fields.1).and_then(|f| f.parse::<u32>().ok());
            match (begin, end) {
                (Some(b), Some(e)) => {
                    table.id_to_span.insert(token_id.clone(), (b, e));
                }
                _ => {
                    log::error!(
                        "Cannot parse token span from fields {} and {}:  ---> {line}",
                        offset_fields.0,
                        offset_fields.1
                    );
                }
            }

            if invisible_set.contains(token.as_str()) {
                table.invisible.insert(token_id.clone());
            }
            table.id_to_text.insert(token_id, token);
        }

        Ok(table)
    }

    /// Load the token table for one document from `token_dir/<doc_id><ext>`.
    ///
    /// A missing file yields an empty table with a warning.
    pub fn load(
        token_dir: &Path,
        doc_id: &str,
        file_ext: &str,
        offset_fields: (usize, usize),
        invisible_words: &[String],
    ) -> Result<Self> {
        let path = token_dir.join(format!("{doc_id}{file_ext}"));
        log::debug!("Reading tokens for {doc_id}");
        match std::fs::File::open(&path) {
            Ok(f) => Self::from_reader(std::io::BufReader::new(f), offset_fields, invisible_words),
            Err(_) => {
                log::warn!(
                    "Cannot find token file for doc [{doc_id}] at [{}], \
                     will use empty invisible words list",
                    path.display()
                );
                Ok(Self::empty())
            }
        }
    }

    /// Surface text of a token id, if known.
    #[must_use]
    pub fn text(&self, token_id: &str) -> Option<&str> {
        self.id_to_text.get(token_id).map(String::as_str)
    }

    /// Character span `[begin, end)` of a token id, if known.
    #[must_use]
    pub fn span(&self, token_id: &str) -> Option<(u32, u32)> {
        self.id_to_span.get(token_id).copied()
    }

    /// Whether the token id belongs to the invisible-word set.
    #[must_use]
    pub fn is_invisible(&self, token_id: &str) -> bool {
        self.invisible.contains(token_id)
    }

    /// Number of known tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.id_to_text.len()
    }

    /// Whether the table holds no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_text.is_empty()
    }
}
