//! Score Aggregator: per-document counts pooled into micro and macro
//! precision/recall/F1.
//!
//! Policy (deliberate asymmetry): a document with zero gold mentions is
//! excluded from both averages; a document where gold mentions exist but
//! the system produced nothing counts toward the denominators with a
//! score of 0 — absence of system output is penalized, not ignored.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::eval::attributes::AttributeCombination;

/// Division that yields NaN instead of panicking on a zero denominator.
#[must_use]
pub fn safe_div(n: f64, dn: f64) -> f64 {
    if dn > 0.0 {
        n / dn
    } else {
        f64::NAN
    }
}

/// Harmonic mean of precision and recall; NaN-safe.
#[must_use]
pub fn compute_f1(p: f64, r: f64) -> f64 {
    safe_div(2.0 * p * r, p + r)
}

/// Precision, recall, F1 triple.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Scores {
    /// Precision.
    pub precision: f64,
    /// Recall.
    pub recall: f64,
    /// F1 score.
    pub f1: f64,
}

impl Scores {
    /// Build from precision and recall.
    #[must_use]
    pub fn new(precision: f64, recall: f64) -> Self {
        Self {
            precision,
            recall,
            f1: compute_f1(precision, recall),
        }
    }
}

/// The mention-scoring counts of one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentScore {
    /// Document id.
    pub doc_id: String,
    /// Span-only true positives (sum of assigned overlap scores).
    pub tp: f64,
    /// Span-only false positives.
    pub fp: f64,
    /// Per attribute combination `(tp, fp)`.
    pub attribute_counts: Vec<(f64, f64)>,
    /// Gold mention count.
    pub num_gold: usize,
    /// System mention count.
    pub num_system: usize,
}

impl DocumentScore {
    /// Span-only precision over the system mention count.
    #[must_use]
    pub fn precision(&self) -> f64 {
        safe_div(self.tp, self.num_system as f64)
    }

    /// Span-only recall over the gold mention count.
    #[must_use]
    pub fn recall(&self) -> f64 {
        safe_div(self.tp, self.num_gold as f64)
    }
}

/// Micro and macro averages of one score family.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Averages {
    /// Pooled tp over pooled counts.
    pub micro: Scores,
    /// Mean of per-document ratios over valid documents.
    pub macro_avg: Scores,
}

#[derive(Debug, Clone, Copy, Default)]
struct RunningTotals {
    tp: f64,
    prec_sum: f64,
    recall_sum: f64,
}

/// Accumulates per-document scores into running aggregates.
#[derive(Debug, Default)]
pub struct ScoreAggregator {
    docs: Vec<DocumentScore>,
    num_combinations: usize,
}

impl ScoreAggregator {
    /// Create an aggregator for the given number of attribute
    /// combinations.
    #[must_use]
    pub fn new(num_combinations: usize) -> Self {
        Self {
            docs: Vec::new(),
            num_combinations,
        }
    }

    /// Record one document's counts.
    pub fn add(&mut self, score: DocumentScore) {
        debug_assert_eq!(score.attribute_counts.len(), self.num_combinations);
        self.docs.push(score);
    }

    /// Recorded documents.
    #[must_use]
    pub fn documents(&self) -> &[DocumentScore] {
        &self.docs
    }

    fn fold<F>(&self, extract: F) -> Averages
    where
        F: Fn(&DocumentScore) -> f64,
    {
        let mut totals = RunningTotals::default();
        let mut total_gold = 0usize;
        let mut total_system = 0usize;
        let mut valid_docs = 0usize;

        for doc in &self.docs {
            if doc.num_gold == 0 {
                // Gold produced no mentions; nothing to measure.
                continue;
            }
            if doc.num_system == 0 {
                log::warn!(
                    "System produced nothing for document [{}], assigning 0 scores",
                    doc.doc_id
                );
                valid_docs += 1;
                total_gold += doc.num_gold;
                continue;
            }
            let tp = extract(doc);
            valid_docs += 1;
            total_gold += doc.num_gold;
            total_system += doc.num_system;
            totals.tp += tp;
            totals.prec_sum += tp / doc.num_system as f64;
            totals.recall_sum += tp / doc.num_gold as f64;
        }

        let micro = Scores::new(
            safe_div(totals.tp, total_system as f64),
            safe_div(totals.tp, total_gold as f64),
        );
        let macro_avg = Scores::new(
            safe_div(totals.prec_sum, valid_docs as f64),
            safe_div(totals.recall_sum, valid_docs as f64),
        );
        Averages { micro, macro_avg }
    }

    /// Span-only micro/macro averages.
    #[must_use]
    pub fn span_averages(&self) -> Averages {
        self.fold(|doc| doc.tp)
    }

    /// Micro/macro averages for one attribute combination.
    #[must_use]
    pub fn attribute_averages(&self, comb_index: usize) -> Averages {
        self.fold(|doc| doc.attribute_counts[comb_index].0)
    }

    /// Write the plain-text report: a per-document table followed by the
    /// final micro/macro block per attribute combination. Scores are
    /// reported multiplied by 100.
    pub fn write_report<W: Write>(
        &self,
        out: &mut W,
        combinations: &[AttributeCombination],
    ) -> Result<()> {
        writeln!(out, "========Document Mention Detection Results==========")?;
        let mut header = vec!["Doc ID".to_string(), "Prec".to_string(), "Rec".to_string(), "F1".to_string()];
        for comb in combinations {
            header.push(format!("{} P/R/F1", comb.name()));
        }
        writeln!(out, "{}", header.join("\t"))?;

        for doc in &self.docs {
            let prec = doc.precision() * 100.0;
            let recall = doc.recall() * 100.0;
            let f1 = compute_f1(prec, recall);
            let mut row = format!("{}\t{prec:.2}\t{recall:.2}\t{f1:.2}", doc.doc_id);
            for (tp, _) in &doc.attribute_counts {
                let p = safe_div(*tp, doc.num_system as f64) * 100.0;
                let r = safe_div(*tp, doc.num_gold as f64) * 100.0;
                row.push_str(&format!("\t{p:.2}/{r:.2}/{:.2}", compute_f1(p, r)));
            }
            writeln!(out, "{row}")?;
        }

        writeln!(out, "\n=======Final Mention Detection Results=========")?;
        writeln!(out, "Attributes\tMicro P\tMicro R\tMicro F1\tMacro P\tMacro R\tMacro F1")?;
        let span = self.span_averages();
        write_average_row(out, "span_only", span)?;
        for (index, comb) in combinations.iter().enumerate() {
            write_average_row(out, &comb.name(), self.attribute_averages(index))?;
        }
        Ok(())
    }
}

/// JSON-serializable form of a finished evaluation.
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    documents: &'a [DocumentScore],
    span_only: Averages,
    attributes: Vec<(String, Averages)>,
}

impl ScoreAggregator {
    /// Serialize the per-document scores and final averages as JSON.
    pub fn to_json(&self, combinations: &[AttributeCombination]) -> Result<String> {
        let report = JsonReport {
            documents: &self.docs,
            span_only: self.span_averages(),
            attributes: combinations
                .iter()
                .enumerate()
                .map(|(index, comb)| (comb.name(), self.attribute_averages(index)))
                .collect(),
        };
        serde_json::to_string_pretty(&report)
            .map_err(|e| crate::error::Error::evaluation(format!("Cannot serialize report: {e}")))
    }
}

fn write_average_row<W: Write>(out: &mut W, name: &str, avg: Averages) -> Result<()> {
    writeln!(
        out,
        "{name}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}",
        avg.micro.precision * 100.0,
        avg.micro.recall * 100.0,
        avg.micro.f1 * 100.0,
        avg.macro_avg.precision * 100.0,
        avg.macro_avg.recall * 100.0,
        avg.macro_avg.f1 * 100.0,
    )?;
    Ok(())
}
