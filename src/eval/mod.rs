//! Per-document evaluation pipeline.
//!
//! One call to [`evaluate_document`] takes a raw gold/system document pair
//! plus that document's token table, and produces the mention-detection
//! counts, the CoNLL coreference fragments, and the TimeML temporal
//! documents. All intermediate state lives in the call; nothing crosses
//! document boundaries except the scores the caller accumulates.

pub mod aggregate;
pub mod align;
pub mod attributes;
pub mod coref;
pub mod temporal;

use std::collections::HashSet;

use crate::config::EvalConfig;
use crate::error::{Error, Result};
use crate::mention::Mention;
use crate::reader::{self, RawDocumentPair};
use crate::token::TokenTable;

pub use aggregate::{Averages, DocumentScore, ScoreAggregator, Scores};
pub use align::Alignment;
pub use attributes::AttributeCombination;
pub use temporal::TemporalLink;

/// Which downstream projections to run besides mention detection.
#[derive(Debug, Clone, Copy)]
pub struct EvalOptions {
    /// Produce CoNLL coreference fragments.
    pub coref: bool,
    /// Produce reduced temporal link documents.
    pub temporal: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            coref: true,
            temporal: true,
        }
    }
}

/// Everything one document's evaluation produces.
#[derive(Debug)]
pub struct DocumentResult {
    /// Document id.
    pub doc_id: String,
    /// Mention-detection counts for the aggregator.
    pub score: DocumentScore,
    /// The full alignment, for diff output.
    pub alignment: Alignment,
    /// `(gold fragment, system fragment)` CoNLL projection, when requested.
    pub conll: Option<(String, String)>,
    /// Gold TimeML documents, one per link type plus `All`.
    pub temporal_gold: Vec<(String, String)>,
    /// System TimeML documents, one per link type plus `All`.
    pub temporal_system: Vec<(String, String)>,
}

fn parse_side(
    lines: &[String],
    side: &str,
    doc_id: &str,
    config: &EvalConfig,
    tokens: &TokenTable,
) -> Result<Vec<Mention>> {
    let mentions = lines
        .iter()
        .map(|l| reader::parse_mention_line(l, config, tokens))
        .collect::<Result<Vec<Mention>>>()?;

    let mut seen = HashSet::new();
    for mention in &mentions {
        if !seen.insert(mention.id.as_str()) {
            return Err(Error::validation(format!(
                "Duplicated {side} mention id [{}] for doc [{doc_id}]",
                mention.id
            )));
        }
    }
    Ok(mentions)
}

/// Pick the one-to-one mapping that feeds coreference and temporal
/// projection: the mapping of the attribute combination named by
/// `coref_criteria` when it exists, the span-only mapping otherwise.
/// Getting coreference credit thus requires getting those attributes
/// right.
fn select_mapping<'a>(
    alignment: &'a Alignment,
    combinations: &[AttributeCombination],
    config: &EvalConfig,
) -> &'a [Option<(usize, f64)>] {
    let criteria: Vec<&str> = config.coref_criteria.iter().map(String::as_str).collect();
    for (index, comb) in combinations.iter().enumerate() {
        let names: Vec<&str> = comb.attributes.iter().map(|(_, n)| n.as_str()).collect();
        if names == criteria {
            log::debug!("Selected mapping that matches criteria [{}]", comb.name());
            return &alignment.attribute_mappings[index];
        }
    }
    &alignment.span_mapping
}

/// Evaluate one document pair.
pub fn evaluate_document(
    pair: &RawDocumentPair,
    tokens: &TokenTable,
    config: &EvalConfig,
    combinations: &[AttributeCombination],
    options: EvalOptions,
) -> Result<DocumentResult> {
    let doc_id = &pair.doc_id;
    log::info!("Evaluating document {doc_id}");

    let system_mentions = parse_side(&pair.system.mention_lines, "system", doc_id, config, tokens)?;
    let gold_mentions = parse_side(&pair.gold.mention_lines, "gold", doc_id, config, tokens)?;

    let mut gold_side = crate::mention::DocumentSide {
        mentions: gold_mentions,
        relations: Vec::new(),
    };
    let mut system_side = crate::mention::DocumentSide {
        mentions: system_mentions,
        relations: Vec::new(),
    };
    for line in &pair.gold.relation_lines {
        gold_side.relations.push(reader::parse_relation_line(line)?);
    }
    for line in &pair.system.relation_lines {
        system_side.relations.push(reader::parse_relation_line(line)?);
    }

    log::debug!("Computing overlap scores for {doc_id}");
    let candidates = align::candidate_pairs(&gold_side.mentions, &system_side.mentions, doc_id);
    let alignment = align::greedy_align(
        candidates,
        &gold_side.mentions,
        &system_side.mentions,
        combinations,
        doc_id,
    );

    let num_system = system_side.mentions.len();
    let score = DocumentScore {
        doc_id: doc_id.clone(),
        tp: alignment.span_tp,
        fp: alignment.span_fp(num_system),
        attribute_counts: alignment
            .attribute_tps
            .iter()
            .zip(alignment.attribute_fps(num_system))
            .map(|(tp, fp)| (*tp, fp))
            .collect(),
        num_gold: gold_side.mentions.len(),
        num_system,
    };

    let selected_mapping = select_mapping(&alignment, combinations, config).to_vec();

    let conll = if options.coref {
        log::debug!("Preparing coreference files for {doc_id}");
        let projector = coref::ConllProjector::new(tokens, doc_id);
        Some(projector.prepare_conll_lines(
            &gold_side.coreference_relations(),
            &system_side.coreference_relations(),
            &gold_side.mentions,
            &system_side.mentions,
            &selected_mapping,
            config.coref_mention_threshold,
        )?)
    } else {
        None
    };

    let (temporal_gold, temporal_system) = if options.temporal {
        let nodes = temporal::TemporalNodes::from_alignment(
            &selected_mapping,
            &gold_side.mentions,
            &system_side.mentions,
        );

        let gold_docs = reduce_side_links(&gold_side, &nodes.gold_nodes, &nodes.gold_mention_to_node)?;
        let sys_docs =
            reduce_side_links(&system_side, &nodes.sys_nodes, &nodes.sys_mention_to_node)?;
        (gold_docs, sys_docs)
    } else {
        (Vec::new(), Vec::new())
    };

    Ok(DocumentResult {
        doc_id: doc_id.clone(),
        score,
        alignment,
        conll,
        temporal_gold,
        temporal_system,
    })
}

/// Reduce one side's temporal links over its coreference partition and
/// serialize the surviving mention-level links.
fn reduce_side_links(
    side: &crate::mention::DocumentSide,
    nodes: &[String],
    mention_to_node: &std::collections::HashMap<String, String>,
) -> Result<Vec<(String, String)>> {
    let clusters = coref::build_clusters(&side.coreference_relations())?;
    let partition = coref::partition_mentions(&clusters, &side.mentions);

    let links = side
        .temporal_relations()
        .into_iter()
        .map(TemporalLink::from_relation)
        .collect::<Result<Vec<_>>>()?;
    let reduced = temporal::reduce_links(&links, &partition, &side.mentions)?;

    temporal::timeml_documents(nodes, mention_to_node, &reduced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::RawDocument;

    fn raw_pair(gold: &[&str], gold_rel: &[&str], sys: &[&str], sys_rel: &[&str]) -> RawDocumentPair {
        RawDocumentPair {
            doc_id: "doc1".to_string(),
            gold: RawDocument {
                mention_lines: gold.iter().map(|s| s.to_string()).collect(),
                relation_lines: gold_rel.iter().map(|s| s.to_string()).collect(),
            },
            system: RawDocument {
                mention_lines: sys.iter().map(|s| s.to_string()).collect(),
                relation_lines: sys_rel.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    fn tokens() -> TokenTable {
        let data = "t1\tbomb\t0\t4\nt2\tattack\t5\t11\nt3\tkilled\t12\t18\nt5\tdied\t19\t23\n";
        TokenTable::from_reader(std::io::Cursor::new(data), (2, 3), &[]).unwrap()
    }

    fn combos(config: &EvalConfig) -> Vec<AttributeCombination> {
        attributes::all_combinations(&config.attribute_names)
    }

    #[test]
    fn full_document_round() {
        let config = EvalConfig::default();
        let pair = raw_pair(
            &[
                "gold\tdoc1\tE1\tt1,t2\tbomb attack\tConflict_Attack\tActual",
                "gold\tdoc1\tE2\tt5\tdied\tLife_Die\tActual",
            ],
            &["Coreference\tC1\tE1,E2"],
            &[
                "sysA\tdoc1\tS1\tt1,t2\tbomb attack\tConflict_Attack\tActual",
                "sysA\tdoc1\tS2\tt5\tdied\tLife_Die\tActual",
            ],
            &["Coreference\tC1\tS1,S2"],
        );
        let tokens = tokens();
        let config_combos = combos(&config);
        let result =
            evaluate_document(&pair, &tokens, &config, &config_combos, EvalOptions::default())
                .unwrap();
        assert!((result.score.tp - 2.0).abs() < 1e-9);
        assert_eq!(result.score.fp, 0.0);
        let (gold_conll, sys_conll) = result.conll.unwrap();
        assert!(gold_conll.contains("(doc1); part 000"));
        // Both mentions share declared cluster 0 on each side.
        assert_eq!(gold_conll.matches("(0)").count(), 2);
        assert_eq!(sys_conll.matches("(0)").count(), 2);
    }

    #[test]
    fn duplicate_mention_id_is_fatal() {
        let config = EvalConfig::default();
        let pair = raw_pair(
            &[
                "gold\tdoc1\tE1\tt1\tbomb\tConflict_Attack\tActual",
                "gold\tdoc1\tE1\tt2\tattack\tConflict_Attack\tActual",
            ],
            &[],
            &[],
            &[],
        );
        let err = evaluate_document(
            &pair,
            &tokens(),
            &config,
            &combos(&config),
            EvalOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn temporal_links_are_reduced_before_serialization() {
        let config = EvalConfig::default();
        let pair = raw_pair(
            &[
                "gold\tdoc1\tE1\tt1\tbomb\tConflict_Attack\tActual",
                "gold\tdoc1\tE2\tt2\tattack\tConflict_Attack\tActual",
                "gold\tdoc1\tE3\tt3\tkilled\tLife_Die\tActual",
            ],
            &[
                "After\tR1\tE1,E2",
                "After\tR2\tE2,E3",
                "After\tR3\tE1,E3",
            ],
            &[],
            &[],
        );
        let result = evaluate_document(
            &pair,
            &tokens(),
            &config,
            &combos(&config),
            EvalOptions::default(),
        )
        .unwrap();
        let after_doc = &result
            .temporal_gold
            .iter()
            .find(|(t, _)| t == "After")
            .unwrap()
            .1;
        // The redundant E1->E3 edge is gone: two TLINKs survive.
        assert_eq!(after_doc.matches("<TLINK").count(), 2);
    }

    #[test]
    fn coref_criteria_mapping_gates_projection_on_mention_type() {
        // System span matches exactly but has the wrong mention type, so
        // the selected mapping leaves the gold mention unaligned.
        let config = EvalConfig::default();
        let pair = raw_pair(
            &["gold\tdoc1\tE1\tt1,t2\tbomb attack\tConflict_Attack\tActual"],
            &[],
            &["sysA\tdoc1\tS1\tt1,t2\tbomb attack\tLife_Die\tActual"],
            &[],
        );
        let result = evaluate_document(
            &pair,
            &tokens(),
            &config,
            &combos(&config),
            EvalOptions::default(),
        )
        .unwrap();
        let (gold_conll, sys_conll) = result.conll.unwrap();
        // Gold row has a gap on the system side and vice versa.
        assert!(gold_conll.lines().any(|l| l.ends_with("\t-")));
        assert!(sys_conll.lines().any(|l| l.ends_with("\t-")));
    }
}
