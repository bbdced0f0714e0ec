//! Coreference Projector: cluster validation and CoNLL projection.
//!
//! Declared coreference clusters arrive with transitive closure already
//! resolved upstream; this module validates well-formedness (pairwise
//! disjoint clusters, no duplicate span within a cluster, every member
//! present in the mention table) and projects each side into the
//! line-oriented CoNLL fragment consumed by the external coreference
//! scorer. Gold and system sides are processed independently over the
//! aligned mention tables.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{CONLL_BOD_MARKER, CONLL_EOD_MARKER};
use crate::error::{Error, Result};
use crate::mention::{Mention, Relation};
use crate::token::TokenTable;

static DIGIT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("static regex"));

/// A segment of a token id under natural ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NaturalKey {
    /// A run of digits, compared numerically.
    Num(u64),
    /// A run of non-digits, compared lexically.
    Text(String),
}

/// Natural sort key: digit runs compare numerically, so `t2 < t10`.
#[must_use]
pub fn natural_order(key: &str) -> Vec<NaturalKey> {
    let mut parts = Vec::new();
    let mut last = 0;
    for m in DIGIT_RUNS.find_iter(key) {
        if m.start() > last {
            parts.push(NaturalKey::Text(key[last..m.start()].to_string()));
        }
        // Runs too long for u64 fall back to lexical comparison.
        match m.as_str().parse::<u64>() {
            Ok(n) => parts.push(NaturalKey::Num(n)),
            Err(_) => parts.push(NaturalKey::Text(m.as_str().to_string())),
        }
        last = m.end();
    }
    if last < key.len() {
        parts.push(NaturalKey::Text(key[last..].to_string()));
    }
    parts
}

/// Declared clusters of one document side: mention-id sets indexed by
/// declared cluster id.
pub type Clusters = Vec<BTreeSet<String>>;

/// Build clusters from coreference relations and validate disjointness.
///
/// Two declared clusters sharing a mention id means transitive closure was
/// not resolved upstream, which makes projection undefined.
pub fn build_clusters(corefs: &[&Relation]) -> Result<Clusters> {
    let clusters: Clusters = corefs
        .iter()
        .map(|r| r.args.iter().cloned().collect())
        .collect();

    for i in 0..clusters.len() {
        for j in i + 1..clusters.len() {
            if !clusters[i].is_disjoint(&clusters[j]) {
                return Err(Error::validation(format!(
                    "Non-empty intersection between declared clusters {i} and {j}; \
                     please resolve transitive closure before submitting"
                )));
            }
        }
    }
    Ok(clusters)
}

/// Check that no two mentions inside one cluster share an identical sorted
/// token-id span; duplicate exact-match mentions would silently collapse
/// in the downstream metric.
fn check_cluster_span_duplicates(
    cluster: &BTreeSet<String>,
    sorted_tokens: &HashMap<&str, Vec<String>>,
) -> Result<()> {
    let mut span_map: HashMap<&[String], &str> = HashMap::new();
    for mention_id in cluster {
        let span = sorted_tokens.get(mention_id.as_str()).ok_or_else(|| {
            Error::validation(format!(
                "Cluster contains event that is not in mention list: [{mention_id}]"
            ))
        })?;
        if let Some(other) = span_map.get(span.as_slice()) {
            return Err(Error::validation(format!(
                "Span within the same cluster cannot be the same: \
                 [{mention_id}] and [{other}] -> [{}]",
                span.join(",")
            )));
        }
        span_map.insert(span.as_slice(), mention_id);
    }
    Ok(())
}

/// One row of the aligned table driving CoNLL projection: either a mention
/// of this side, or a gap where only the opposite side has a mention.
type AlignedSlot = Option<usize>;

/// Build the aligned gold/system tables from the one-to-one mapping.
///
/// Gold rows come first in gold order, each paired with its aligned system
/// mention when the alignment score reaches `threshold`; unaligned system
/// mentions are appended as system-only rows with a gold gap.
#[must_use]
pub fn create_aligned_tables(
    mapping: &[Option<(usize, f64)>],
    num_system: usize,
    threshold: f64,
) -> (Vec<AlignedSlot>, Vec<AlignedSlot>) {
    let mut aligned_gold: Vec<AlignedSlot> = Vec::new();
    let mut aligned_system: Vec<AlignedSlot> = Vec::new();
    let mut aligned_system_mentions = BTreeSet::new();

    for (gold_index, slot) in mapping.iter().enumerate() {
        aligned_gold.push(Some(gold_index));
        match slot {
            Some((system_index, score)) if *score >= threshold => {
                aligned_system.push(Some(*system_index));
                aligned_system_mentions.insert(*system_index);
            }
            _ => aligned_system.push(None),
        }
    }

    for system_index in 0..num_system {
        if !aligned_system_mentions.contains(&system_index) {
            aligned_gold.push(None);
            aligned_system.push(Some(system_index));
        }
    }

    (aligned_gold, aligned_system)
}

/// Projects one document's coreference clusters to CoNLL fragments.
pub struct ConllProjector<'a> {
    tokens: &'a TokenTable,
    doc_id: &'a str,
}

impl<'a> ConllProjector<'a> {
    /// Create a projector over one document's token table.
    #[must_use]
    pub fn new(tokens: &'a TokenTable, doc_id: &'a str) -> Self {
        Self { tokens, doc_id }
    }

    /// Produce the gold and system CoNLL fragments for this document.
    pub fn prepare_conll_lines(
        &self,
        gold_corefs: &[&Relation],
        sys_corefs: &[&Relation],
        gold_mentions: &[Mention],
        sys_mentions: &[Mention],
        mapping: &[Option<(usize, f64)>],
        threshold: f64,
    ) -> Result<(String, String)> {
        log::debug!(
            "Preparing CoNLL fragment for [{}] with mapping threshold {threshold:.2}",
            self.doc_id
        );
        let (aligned_gold, aligned_system) =
            create_aligned_tables(mapping, sys_mentions.len(), threshold);

        let gold_lines = self
            .prepare_lines(gold_corefs, &aligned_gold, gold_mentions)
            .map_err(|e| {
                Error::validation(format!("Gold standard data problem for doc [{}]: {e}", self.doc_id))
            })?;
        let sys_lines = self
            .prepare_lines(sys_corefs, &aligned_system, sys_mentions)
            .map_err(|e| {
                Error::validation(format!("System data problem for doc [{}]: {e}", self.doc_id))
            })?;

        Ok((gold_lines, sys_lines))
    }

    /// Project one side: assign a cluster id to every aligned slot and
    /// render the fragment.
    ///
    /// Mentions absent from every declared cluster become singletons with
    /// ids numbered after all declared cluster ids, so ids never collide.
    fn prepare_lines(
        &self,
        corefs: &[&Relation],
        aligned_table: &[AlignedSlot],
        mentions: &[Mention],
    ) -> Result<String> {
        let clusters = build_clusters(corefs)?;

        let sorted_tokens: HashMap<&str, Vec<String>> = mentions
            .iter()
            .map(|m| (m.id.as_str(), m.sorted_tokens()))
            .collect();

        for cluster in &clusters {
            check_cluster_span_duplicates(cluster, &sorted_tokens)?;
        }

        let mut singleton_cluster_id = clusters.len();
        let mut rows: Vec<(String, String)> = Vec::new();

        for slot in aligned_table {
            let Some(mention_index) = slot else {
                rows.push(("None".to_string(), "-".to_string()));
                continue;
            };
            let mention = &mentions[*mention_index];

            let cluster_id = match clusters.iter().position(|c| c.contains(&mention.id)) {
                Some(declared) => declared,
                None => {
                    let id = singleton_cluster_id;
                    singleton_cluster_id += 1;
                    id
                }
            };

            let merged = sorted_tokens[mention.id.as_str()]
                .iter()
                .map(|tid| {
                    self.tokens.text(tid).map(str::to_string).ok_or_else(|| {
                        Error::validation(format!(
                            "Token ID [{tid}] not found in token list, \
                             the token file provided is incorrect"
                        ))
                    })
                })
                .collect::<Result<Vec<String>>>()?
                .join("_");

            rows.push((merged, format!("({cluster_id})")));
        }

        let mut out = String::new();
        out.push_str(&format!("{CONLL_BOD_MARKER} ({}); part 000\n", self.doc_id));
        for (index, (merged, marker)) in rows.iter().enumerate() {
            out.push_str(&format!("{}\t{index}\t{merged}\t{marker}\n", self.doc_id));
        }
        out.push_str(CONLL_EOD_MARKER);
        out.push('\n');
        Ok(out)
    }
}

/// Partition mention ids into cluster ids: declared clusters keep their
/// index, every other mention becomes a singleton numbered afterwards.
///
/// This is the same rule the CoNLL projection applies, exposed for the
/// temporal reducer which needs the partition directly.
pub fn partition_mentions(clusters: &Clusters, mentions: &[Mention]) -> HashMap<String, usize> {
    let mut mention_to_class = HashMap::new();
    for (cluster_id, cluster) in clusters.iter().enumerate() {
        for mention_id in cluster {
            mention_to_class.insert(mention_id.clone(), cluster_id);
        }
    }
    let mut next = clusters.len();
    for mention in mentions {
        mention_to_class.entry(mention.id.clone()).or_insert_with(|| {
            let id = next;
            next += 1;
            id
        });
    }
    mention_to_class
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn relation(name: &str, id: &str, args: &[&str]) -> Relation {
        Relation {
            name: name.to_string(),
            id: id.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn mention(id: &str, tokens: &[&str]) -> Mention {
        Mention::new(
            id,
            tokens.iter().map(|t| t.to_string()).collect(),
            id,
            vec!["attack".to_string(), "actual".to_string()],
            |_| false,
        )
    }

    fn token_table() -> TokenTable {
        let data = "t1\tbomb\t0\t4\nt2\tattack\t5\t11\nt3\tkilled\t12\t18\nt10\tdied\t19\t23\n";
        TokenTable::from_reader(Cursor::new(data), (2, 3), &[]).unwrap()
    }

    #[test]
    fn natural_order_sorts_numerically() {
        let mut ids = vec!["t10".to_string(), "t2".to_string(), "t1".to_string()];
        ids.sort_by(|a, b| natural_order(a).cmp(&natural_order(b)));
        assert_eq!(ids, vec!["t1", "t2", "t10"]);
    }

    #[test]
    fn unresolved_closure_is_accepted_but_overlap_is_fatal() {
        // {(m1,m2),(m2,m3)} without the closure pair {(m1,m3)} as a single
        // cluster is fine; two separate clusters sharing m3 are not.
        let single = [relation("Coreference", "C1", &["m1", "m2", "m3"])];
        let refs: Vec<&Relation> = single.iter().collect();
        assert!(build_clusters(&refs).is_ok());

        let overlapping = [
            relation("Coreference", "C1", &["m1", "m2", "m3"]),
            relation("Coreference", "C2", &["m3", "m4", "m5"]),
        ];
        let refs: Vec<&Relation> = overlapping.iter().collect();
        assert!(matches!(
            build_clusters(&refs),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn duplicate_span_within_cluster_is_fatal() {
        let tokens = token_table();
        let mentions = vec![mention("m1", &["t1", "t2"]), mention("m2", &["t2", "t1"])];
        let corefs = [relation("Coreference", "C1", &["m1", "m2"])];
        let refs: Vec<&Relation> = corefs.iter().collect();
        let projector = ConllProjector::new(&tokens, "doc1");
        let mapping = vec![None, None];
        let err = projector
            .prepare_conll_lines(&refs, &[], &mentions, &[], &mapping, 1.0)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn cluster_member_missing_from_mention_table_is_fatal() {
        let tokens = token_table();
        let mentions = vec![mention("m1", &["t1"])];
        let corefs = [relation("Coreference", "C1", &["m1", "ghost"])];
        let refs: Vec<&Relation> = corefs.iter().collect();
        let projector = ConllProjector::new(&tokens, "doc1");
        let err = projector
            .prepare_conll_lines(&refs, &[], &mentions, &[], &[None], 1.0)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn unknown_token_id_is_fatal_at_projection() {
        // Alignment tolerates token ids missing from the token table, but
        // projection needs their surface text and must abort.
        let tokens = token_table();
        let mentions = vec![mention("m1", &["t1", "t99"])];
        let projector = ConllProjector::new(&tokens, "doc1");
        let err = projector
            .prepare_conll_lines(&[], &[], &mentions, &[], &[None], 1.0)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("Token ID [t99] not found"));
    }

    #[test]
    fn projects_clusters_and_singletons() {
        let tokens = token_table();
        let gold = vec![
            mention("m1", &["t1", "t2"]),
            mention("m2", &["t3"]),
            mention("m3", &["t10"]),
        ];
        let system = vec![mention("s1", &["t1", "t2"]), mention("s2", &["t3"])];
        let corefs = [relation("Coreference", "C1", &["m1", "m2"])];
        let gold_refs: Vec<&Relation> = corefs.iter().collect();
        let mapping = vec![Some((0, 1.0)), Some((1, 1.0)), None];

        let projector = ConllProjector::new(&tokens, "doc1");
        let (gold_out, sys_out) = projector
            .prepare_conll_lines(&gold_refs, &[], &gold, &system, &mapping, 1.0)
            .unwrap();

        let gold_lines: Vec<&str> = gold_out.lines().collect();
        assert_eq!(gold_lines[0], "#begin document (doc1); part 000");
        assert_eq!(gold_lines[1], "doc1\t0\tbomb_attack\t(0)");
        assert_eq!(gold_lines[2], "doc1\t1\tkilled\t(0)");
        // Singleton numbered after the declared cluster.
        assert_eq!(gold_lines[3], "doc1\t2\tdied\t(1)");
        assert_eq!(*gold_lines.last().unwrap(), "#end document");

        // System side: no declared clusters, two singletons, and a gap row
        // for the unaligned gold mention m3.
        let sys_lines: Vec<&str> = sys_out.lines().collect();
        assert_eq!(sys_lines[1], "doc1\t0\tbomb_attack\t(0)");
        assert_eq!(sys_lines[2], "doc1\t1\tkilled\t(1)");
        assert_eq!(sys_lines[3], "doc1\t2\tNone\t-");
    }

    #[test]
    fn below_threshold_alignment_becomes_gap_plus_system_only_row() {
        // One system mention aligned at 0.667, under threshold 1.0.
        let mapping = vec![Some((0, 2.0 / 3.0))];
        let (aligned_gold, aligned_system) = create_aligned_tables(&mapping, 1, 1.0);
        assert_eq!(aligned_gold, vec![Some(0), None]);
        assert_eq!(aligned_system, vec![None, Some(0)]);
    }

    #[test]
    fn projection_is_idempotent() {
        let tokens = token_table();
        let mentions = vec![mention("m1", &["t1"]), mention("m2", &["t2"]), mention("m3", &["t3"])];
        let corefs = [relation("Coreference", "C1", &["m1", "m3"])];
        let refs: Vec<&Relation> = corefs.iter().collect();
        let mapping: Vec<Option<(usize, f64)>> = vec![None, None, None];
        let projector = ConllProjector::new(&tokens, "doc1");
        let first = projector
            .prepare_conll_lines(&refs, &[], &mentions, &[], &mapping, 1.0)
            .unwrap()
            .0;
        let second = projector
            .prepare_conll_lines(&refs, &[], &mentions, &[], &mapping, 1.0)
            .unwrap()
            .0;
        assert_eq!(first, second);
    }

    #[test]
    fn partition_assigns_singletons_after_declared_clusters() {
        let clusters: Clusters = vec![["m1", "m2"].iter().map(|s| s.to_string()).collect()];
        let mentions = vec![mention("m1", &["t1"]), mention("m2", &["t2"]), mention("m3", &["t3"])];
        let partition = partition_mentions(&clusters, &mentions);
        assert_eq!(partition["m1"], 0);
        assert_eq!(partition["m2"], 0);
        assert_eq!(partition["m3"], 1);
    }
}
