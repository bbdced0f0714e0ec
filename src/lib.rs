//! # mention-eval
//!
//! Token-based event-mention evaluation: aligns system mentions to a gold
//! standard, scores span and attribute agreement, and projects the result
//! into the inputs of downstream coreference and temporal-relation
//! scorers.
//!
//! - **Alignment**: greedy weighted bipartite matching over Dice token
//!   overlap, with a canonical tie-break and one greedy pass per attribute
//!   combination
//! - **Coreference**: cluster validation plus CoNLL fragment projection
//! - **Temporal**: coreference-aware transitive reduction of directed
//!   links, serialized as TimeML-like documents
//! - **Aggregation**: micro/macro precision, recall, F1
//!
//! ## Quick Start
//!
//! ```rust
//! use mention_eval::{
//!     evaluate_document, pair_documents, read_corpus, EvalConfig, EvalOptions,
//!     ScoreAggregator, TokenTable,
//! };
//! use mention_eval::eval::attributes::all_combinations;
//!
//! # fn main() -> mention_eval::Result<()> {
//! let gold_stream = "\
//! #BeginOfDocument doc1
//! gold\tdoc1\tE1\tt1,t2\tbomb attack\tConflict_Attack\tActual
//! #EndOfDocument
//! ";
//! let sys_stream = "\
//! #BeginOfDocument doc1
//! sysA\tdoc1\tS1\tt1,t2\tbomb attack\tConflict_Attack\tActual
//! #EndOfDocument
//! ";
//!
//! let config = EvalConfig::default();
//! let combinations = all_combinations(&config.attribute_names);
//! let gold = read_corpus(gold_stream.as_bytes(), "gold")?;
//! let system = read_corpus(sys_stream.as_bytes(), "sysA")?;
//!
//! // Mention detection only; CoNLL projection would need the real
//! // per-document token table for surface text.
//! let options = EvalOptions { coref: false, temporal: false };
//! let mut aggregator = ScoreAggregator::new(combinations.len());
//! for pair in pair_documents(&gold, &system) {
//!     let tokens = TokenTable::empty();
//!     let result = evaluate_document(&pair, &tokens, &config, &combinations, options)?;
//!     aggregator.add(result.score);
//! }
//! assert!((aggregator.span_averages().micro.f1 - 1.0).abs() < 1e-9);
//! # Ok(())
//! # }
//! ```
//!
//! The crate is a library: a thin driver supplies the parsed annotation
//! streams, the per-document token tables, and the output sinks for the
//! CoNLL and TimeML fragments. Documents are evaluated one at a time and
//! released; only the aggregate scores persist across documents.

#![warn(missing_docs)]

pub mod config;
mod error;
pub mod eval;
pub mod mention;
pub mod reader;
pub mod token;

pub use config::EvalConfig;
pub use error::{Error, Result};
pub use eval::{
    evaluate_document, AttributeCombination, Averages, DocumentResult, DocumentScore,
    EvalOptions, ScoreAggregator, Scores,
};
pub use mention::{DocumentSide, Mention, Relation};
pub use reader::{pair_documents, read_corpus, Corpus, RawDocument, RawDocumentPair};
pub use token::TokenTable;
