//! Attribute-combination scoring support.
//!
//! The scorer reports one row per non-empty subset of the attribute schema
//! (e.g. `mention_type`, `realis_status`, `mention_type+realis_status`).
//! Subsets are precomputed once per run; matching treats a gold attribute
//! equal to the "not annotated" sentinel as an automatic match.

use serde::{Deserialize, Serialize};

use crate::config::MISSING_ATTRIBUTE_PLACEHOLDER;

/// One subset of the attribute schema: `(index, name)` pairs, index into
/// the mention attribute vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeCombination {
    /// The attributes in this subset, in schema order.
    pub attributes: Vec<(usize, String)>,
}

impl AttributeCombination {
    /// Short display name, e.g. `mention_type+realis_status`.
    #[must_use]
    pub fn name(&self) -> String {
        self.attributes
            .iter()
            .map(|(_, n)| n.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// All non-empty subsets of the attribute schema, ordered by subset size
/// then lexicographically by member indices.
#[must_use]
pub fn all_combinations(attr_names: &[String]) -> Vec<AttributeCombination> {
    let indexed: Vec<(usize, String)> = attr_names.iter().cloned().enumerate().collect();
    let mut combos = Vec::new();
    for size in 1..=indexed.len() {
        subsets_of_size(&indexed, size, 0, &mut Vec::new(), &mut combos);
    }
    log::debug!(
        "Will score on the following attribute combinations: {}",
        combos.iter().map(AttributeCombination::name).collect::<Vec<_>>().join(", ")
    );
    combos
}

fn subsets_of_size(
    items: &[(usize, String)],
    size: usize,
    start: usize,
    current: &mut Vec<(usize, String)>,
    out: &mut Vec<AttributeCombination>,
) {
    if current.len() == size {
        out.push(AttributeCombination {
            attributes: current.clone(),
        });
        return;
    }
    for i in start..items.len() {
        current.push(items[i].clone());
        subsets_of_size(items, size, i + 1, current, out);
        current.pop();
    }
}

/// Whether gold and system attribute vectors agree on every attribute in
/// the combination. A gold value equal to the not-annotated sentinel gives
/// the system automatic credit for that attribute, with a logged caveat.
#[must_use]
pub fn attribute_match(
    combination: &AttributeCombination,
    gold_attrs: &[String],
    sys_attrs: &[String],
    doc_id: &str,
) -> bool {
    for (index, name) in &combination.attributes {
        let gold_attr = &gold_attrs[*index];
        if gold_attr == MISSING_ATTRIBUTE_PLACEHOLDER {
            log::warn!(
                "Found attribute [{name}] in doc [{doc_id}] not annotated, \
                 giving full credit to the system"
            );
            continue;
        }
        if gold_attr != &sys_attrs[*index] {
            return false;
        }
    }
    true
}

/// Canonicalize an attribute value: lowercase, drop whitespace and ASCII
/// punctuation. Disabled by configuration for schemas where case matters.
#[must_use]
pub fn canonicalize(value: &str, enabled: bool) -> String {
    if !enabled {
        return value.to_string();
    }
    value
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<String> {
        vec!["mention_type".to_string(), "realis_status".to_string()]
    }

    #[test]
    fn generates_all_nonempty_subsets_in_order() {
        let combos = all_combinations(&schema());
        let names: Vec<String> = combos.iter().map(AttributeCombination::name).collect();
        assert_eq!(
            names,
            vec!["mention_type", "realis_status", "mention_type+realis_status"]
        );
    }

    #[test]
    fn three_attributes_give_seven_subsets() {
        let mut names = schema();
        names.push("polarity".to_string());
        assert_eq!(all_combinations(&names).len(), 7);
    }

    #[test]
    fn exact_match_required_per_attribute() {
        let combos = all_combinations(&schema());
        let gold = vec!["attack".to_string(), "actual".to_string()];
        let sys_ok = vec!["attack".to_string(), "other".to_string()];
        assert!(attribute_match(&combos[0], &gold, &sys_ok, "d1"));
        assert!(!attribute_match(&combos[1], &gold, &sys_ok, "d1"));
        assert!(!attribute_match(&combos[2], &gold, &sys_ok, "d1"));
    }

    #[test]
    fn not_annotated_gold_gives_automatic_credit() {
        let combos = all_combinations(&schema());
        let gold = vec![MISSING_ATTRIBUTE_PLACEHOLDER.to_string(), "actual".to_string()];
        let sys = vec!["anything".to_string(), "actual".to_string()];
        assert!(attribute_match(&combos[2], &gold, &sys, "d1"));
    }

    #[test]
    fn canonicalize_strips_case_space_punctuation() {
        assert_eq!(canonicalize("Conflict_Attack", true), "conflictattack");
        assert_eq!(canonicalize("Actual ", true), "actual");
        assert_eq!(canonicalize("Conflict_Attack", false), "Conflict_Attack");
    }
}
