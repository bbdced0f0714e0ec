//! Mention Aligner: greedy weighted bipartite matching between system and
//! gold mentions.
//!
//! Overlap is the Dice coefficient over invisible-filtered token-id sets.
//! All positive-scoring pairs enter a max-heap; popping greedily commits
//! the globally best pair whose system and gold mentions are both still
//! unconsumed. The same pop sequence independently drives one consumed-set
//! per attribute combination, so attribute-conditioned true positives come
//! from a single linear pass instead of the exact (exponential)
//! enumeration of one-to-one resolutions.
//!
//! Tie-break among equal scores is canonical: lowest system index, then
//! lowest gold index.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashSet};

use crate::eval::attributes::{attribute_match, AttributeCombination};
use crate::mention::Mention;

/// A candidate (system, gold) pair with its overlap score.
///
/// `Ord` is total: higher score first, then lower system index, then lower
/// gold index. Dice scores are finite, so `total_cmp` never sees a NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidatePair {
    /// Overlap score in `(0, 1]`.
    pub score: f64,
    /// Index into the system mention table.
    pub system: usize,
    /// Index into the gold mention table.
    pub gold: usize,
}

impl Eq for CandidatePair {}

impl Ord for CandidatePair {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.system.cmp(&self.system))
            .then_with(|| other.gold.cmp(&self.gold))
    }
}

impl PartialOrd for CandidatePair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dice coefficient (set F1) between two token-id sets.
///
/// Zero when the intersection is empty, even if both sets are non-empty.
#[must_use]
pub fn token_overlap_score(gold_tokens: &BTreeSet<String>, sys_tokens: &BTreeSet<String>) -> f64 {
    let overlap = sys_tokens.intersection(gold_tokens).count() as f64;
    if overlap == 0.0 {
        return 0.0;
    }
    let prec = overlap / sys_tokens.len() as f64;
    let recall = overlap / gold_tokens.len() as f64;
    2.0 * prec * recall / (prec + recall)
}

/// The finalized gold→system assignment of one document.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Span-only mapping: per gold index, the assigned `(system index,
    /// score)` or `None`. No system index appears twice.
    pub span_mapping: Vec<Option<(usize, f64)>>,
    /// Sum of assigned scores (span-only true positives).
    pub span_tp: f64,
    /// Per attribute combination, the mapping restricted to pairs agreeing
    /// on that combination.
    pub attribute_mappings: Vec<Vec<Option<(usize, f64)>>>,
    /// Per attribute combination, the summed true positives.
    pub attribute_tps: Vec<f64>,
}

impl Alignment {
    /// False positives of the span-only mapping:
    /// `|system mentions| − span tp`. Always non-negative since every
    /// assigned score is at most 1 and system mentions are assigned at
    /// most once.
    #[must_use]
    pub fn span_fp(&self, num_system: usize) -> f64 {
        num_system as f64 - self.span_tp
    }

    /// False positives per attribute combination.
    #[must_use]
    pub fn attribute_fps(&self, num_system: usize) -> Vec<f64> {
        self.attribute_tps
            .iter()
            .map(|tp| num_system as f64 - tp)
            .collect()
    }
}

/// Build the candidate heap: every (system, gold) pair with positive
/// overlap.
#[must_use]
pub fn candidate_pairs(
    gold: &[Mention],
    system: &[Mention],
    doc_id: &str,
) -> BinaryHeap<CandidatePair> {
    let mut heap = BinaryHeap::new();
    for (system_index, sys_mention) in system.iter().enumerate() {
        for (gold_index, gold_mention) in gold.iter().enumerate() {
            if gold_mention.tokens.is_empty() {
                log::warn!(
                    "Found empty span gold standard at doc: {doc_id}, mention: {}",
                    gold_mention.id
                );
            }
            let overlap = token_overlap_score(&gold_mention.tokens, &sys_mention.tokens);
            if overlap > 0.0 {
                heap.push(CandidatePair {
                    score: overlap,
                    system: system_index,
                    gold: gold_index,
                });
            }
        }
    }
    heap
}

/// Greedy assignment over the candidate heap.
///
/// The span-only mapping commits a popped pair when neither its system nor
/// its gold mention is consumed. Independently, each attribute combination
/// keeps its own consumed sets and commits the pair only when the two
/// mentions also agree on every attribute of the combination.
#[must_use]
pub fn greedy_align(
    mut candidates: BinaryHeap<CandidatePair>,
    gold: &[Mention],
    system: &[Mention],
    combinations: &[AttributeCombination],
    doc_id: &str,
) -> Alignment {
    let mut span_mapping = vec![None; gold.len()];
    let mut span_tp = 0.0;
    let mut attribute_mappings = vec![vec![None; gold.len()]; combinations.len()];
    let mut attribute_tps = vec![0.0; combinations.len()];

    let mut mapped_system: HashSet<usize> = HashSet::new();
    let mut mapped_gold: HashSet<usize> = HashSet::new();
    let mut mapped_system_attr: Vec<HashSet<usize>> = vec![HashSet::new(); combinations.len()];
    let mut mapped_gold_attr: Vec<HashSet<usize>> = vec![HashSet::new(); combinations.len()];

    while let Some(CandidatePair {
        score,
        system: system_index,
        gold: gold_index,
    }) = candidates.pop()
    {
        if !mapped_system.contains(&system_index) && !mapped_gold.contains(&gold_index) {
            span_tp += score;
            span_mapping[gold_index] = Some((system_index, score));
            mapped_system.insert(system_index);
            mapped_gold.insert(gold_index);
        }

        let gold_attrs = &gold[gold_index].attributes;
        let sys_attrs = &system[system_index].attributes;
        for (comb_index, combination) in combinations.iter().enumerate() {
            if mapped_system_attr[comb_index].contains(&system_index)
                || mapped_gold_attr[comb_index].contains(&gold_index)
            {
                continue;
            }
            if attribute_match(combination, gold_attrs, sys_attrs, doc_id) {
                attribute_tps[comb_index] += score;
                attribute_mappings[comb_index][gold_index] = Some((system_index, score));
                mapped_system_attr[comb_index].insert(system_index);
                mapped_gold_attr[comb_index].insert(gold_index);
            }
        }
    }

    Alignment {
        span_mapping,
        span_tp,
        attribute_mappings,
        attribute_tps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::attributes::all_combinations;

    fn mention(id: &str, tokens: &[&str], attrs: &[&str]) -> Mention {
        Mention::new(
            id,
            tokens.iter().map(|t| t.to_string()).collect(),
            id,
            attrs.iter().map(|a| a.to_string()).collect(),
            |_| false,
        )
    }

    fn schema() -> Vec<String> {
        vec!["mention_type".to_string(), "realis_status".to_string()]
    }

    #[test]
    fn dice_of_partial_overlap() {
        let g: BTreeSet<String> = ["t1", "t2"].iter().map(|s| s.to_string()).collect();
        let s: BTreeSet<String> = ["t1", "t2", "t3"].iter().map(|s| s.to_string()).collect();
        let score = token_overlap_score(&g, &s);
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn dice_zero_when_disjoint() {
        let g: BTreeSet<String> = ["t1"].iter().map(|s| s.to_string()).collect();
        let s: BTreeSet<String> = ["t9"].iter().map(|s| s.to_string()).collect();
        assert_eq!(token_overlap_score(&g, &s), 0.0);
    }

    #[test]
    fn identical_tables_align_perfectly() {
        let gold = vec![
            mention("g1", &["t1", "t2"], &["attack", "actual"]),
            mention("g2", &["t5"], &["die", "other"]),
        ];
        let system = gold.clone();
        let combos = all_combinations(&schema());
        let heap = candidate_pairs(&gold, &system, "d1");
        let alignment = greedy_align(heap, &gold, &system, &combos, "d1");
        assert!((alignment.span_tp - 2.0).abs() < 1e-9);
        assert_eq!(alignment.span_fp(system.len()), 0.0);
        for tp in &alignment.attribute_tps {
            assert!((tp - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn partial_overlap_and_miss() {
        // gold: g1={t1,t2}, g2={t5}; system: s1={t1,t2,t3}.
        let gold = vec![
            mention("g1", &["t1", "t2"], &["attack", "actual"]),
            mention("g2", &["t5"], &["die", "actual"]),
        ];
        let system = vec![mention("s1", &["t1", "t2", "t3"], &["attack", "actual"])];
        let combos = all_combinations(&schema());
        let alignment = greedy_align(
            candidate_pairs(&gold, &system, "d1"),
            &gold,
            &system,
            &combos,
            "d1",
        );
        assert!((alignment.span_tp - 0.8).abs() < 1e-9);
        assert_eq!(alignment.span_mapping[0], Some((0, alignment.span_tp)));
        assert_eq!(alignment.span_mapping[1], None);
        let fp = alignment.span_fp(system.len());
        assert!((fp - 0.2).abs() < 1e-9);
        // recall over gold count stays below 1.
        assert!(alignment.span_tp / (gold.len() as f64) < 1.0);
    }

    #[test]
    fn system_mention_consumed_once() {
        // Both gold mentions overlap the single system mention; only the
        // better-scoring gold gets it.
        let gold = vec![
            mention("g1", &["t1", "t2"], &["attack", "actual"]),
            mention("g2", &["t2", "t3"], &["attack", "actual"]),
        ];
        let system = vec![mention("s1", &["t1", "t2"], &["attack", "actual"])];
        let combos = all_combinations(&schema());
        let alignment = greedy_align(
            candidate_pairs(&gold, &system, "d1"),
            &gold,
            &system,
            &combos,
            "d1",
        );
        assert_eq!(alignment.span_mapping[0], Some((0, 1.0)));
        assert_eq!(alignment.span_mapping[1], None);
        assert!((alignment.span_tp - 1.0).abs() < 1e-9);
    }

    #[test]
    fn attribute_mapping_diverges_from_span_mapping() {
        // The best span match has the wrong type; the attribute pass must
        // fall through to the weaker pair with the right type.
        let gold = vec![mention("g1", &["t1", "t2"], &["attack", "actual"])];
        let system = vec![
            mention("s1", &["t1", "t2"], &["die", "actual"]),
            mention("s2", &["t1"], &["attack", "actual"]),
        ];
        let combos = all_combinations(&schema());
        let alignment = greedy_align(
            candidate_pairs(&gold, &system, "d1"),
            &gold,
            &system,
            &combos,
            "d1",
        );
        // Span mapping takes the exact-span s1.
        assert_eq!(alignment.span_mapping[0], Some((0, 1.0)));
        // mention_type combination takes s2 despite the lower score.
        let type_mapping = &alignment.attribute_mappings[0];
        assert_eq!(type_mapping[0].map(|(s, _)| s), Some(1));
        assert!(alignment.attribute_tps[0] < 1.0 && alignment.attribute_tps[0] > 0.0);
    }

    #[test]
    fn equal_scores_break_ties_by_lowest_system_then_gold_index() {
        let gold = vec![
            mention("g1", &["t1"], &["attack", "actual"]),
            mention("g2", &["t1"], &["attack", "actual"]),
        ];
        let system = vec![
            mention("s1", &["t1"], &["attack", "actual"]),
            mention("s2", &["t1"], &["attack", "actual"]),
        ];
        let combos = all_combinations(&schema());
        let alignment = greedy_align(
            candidate_pairs(&gold, &system, "d1"),
            &gold,
            &system,
            &combos,
            "d1",
        );
        // s1 pairs with g1 first, leaving s2 for g2.
        assert_eq!(alignment.span_mapping[0], Some((0, 1.0)));
        assert_eq!(alignment.span_mapping[1], Some((1, 1.0)));
    }

    #[test]
    fn fp_never_negative() {
        let gold = vec![mention("g1", &["t1", "t2", "t3"], &["attack", "actual"])];
        let system = vec![
            mention("s1", &["t1"], &["attack", "actual"]),
            mention("s2", &["t2"], &["attack", "actual"]),
        ];
        let combos = all_combinations(&schema());
        let alignment = greedy_align(
            candidate_pairs(&gold, &system, "d1"),
            &gold,
            &system,
            &combos,
            "d1",
        );
        assert!(alignment.span_fp(system.len()) >= 0.0);
        for fp in alignment.attribute_fps(system.len()) {
            assert!(fp >= 0.0);
        }
    }
}
