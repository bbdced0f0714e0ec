//! Temporal Graph Reducer: coreference-aware transitive reduction of
//! directed temporal links, plus TimeML-style serialization.
//!
//! Two co-referent mentions are the same temporal event, so links are
//! lifted to coreference-equivalence classes before redundancy
//! elimination. Per link type the class graph's transitive closure is
//! computed, every edge inferable through an intermediate node is
//! dropped, and the surviving class edges are re-expanded to all mention
//! pairs across the two classes. Closure of the reduced graph equals
//! closure of the input graph.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::mention::{Mention, Relation};

/// A directed typed temporal link between two mention ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemporalLink {
    /// Link type, e.g. `After` or `Subevent`.
    pub relation: String,
    /// Source mention id.
    pub arg1: String,
    /// Target mention id.
    pub arg2: String,
}

impl TemporalLink {
    /// Build from a binary relation line.
    pub fn from_relation(relation: &Relation) -> Result<Self> {
        if relation.args.len() != 2 {
            return Err(Error::parse(format!(
                "Temporal relation [{}] must have exactly two arguments, got {}",
                relation.id,
                relation.args.len()
            )));
        }
        Ok(Self {
            relation: relation.name.clone(),
            arg1: relation.args[0].clone(),
            arg2: relation.args[1].clone(),
        })
    }
}

/// Boolean reachability closure of a directed graph over `n` nodes.
///
/// Dense Floyd–Warshall style; temporal graphs stay at mention scale, a
/// few hundred nodes per document at most.
#[must_use]
pub fn transitive_closure(edges: &HashSet<(usize, usize)>, n: usize) -> Vec<Vec<bool>> {
    let mut reach = vec![vec![false; n]; n];
    for &(u, v) in edges {
        reach[u][v] = true;
    }
    for w in 0..n {
        for u in 0..n {
            if reach[u][w] {
                for v in 0..n {
                    if reach[w][v] {
                        reach[u][v] = true;
                    }
                }
            }
        }
    }
    reach
}

/// Drop every edge `(u, v)` inferable through some intermediate node `w`
/// with `u→w` and `w→v` both in the closure.
#[must_use]
pub fn transitive_reduction(
    edges: &HashSet<(usize, usize)>,
    closure: &[Vec<bool>],
) -> HashSet<(usize, usize)> {
    edges
        .iter()
        .copied()
        .filter(|&(u, v)| {
            !(0..closure.len())
                .any(|w| w != u && w != v && closure[u][w] && closure[w][v])
        })
        .collect()
}

/// Lift mention-level links of one type to class level, validating
/// antisymmetry: a class edge present together with its reverse (or a
/// self-edge between co-referent arguments) makes the graph inconsistent.
fn lift_links(
    links: &[&TemporalLink],
    partition: &HashMap<String, usize>,
) -> Result<HashSet<(usize, usize)>> {
    let mut edges = HashSet::new();
    for link in links {
        let u = *partition.get(&link.arg1).ok_or_else(|| {
            Error::validation(format!("Relation contains unknown event [{}]", link.arg1))
        })?;
        let v = *partition.get(&link.arg2).ok_or_else(|| {
            Error::validation(format!("Relation contains unknown event [{}]", link.arg2))
        })?;
        if u == v || edges.contains(&(v, u)) {
            return Err(Error::validation(format!(
                "There is a link from [{}] to [{}] and its reverse for type [{}], \
                 this is not allowed",
                link.arg1, link.arg2, link.relation
            )));
        }
        edges.insert((u, v));
    }
    Ok(edges)
}

/// Reduce one side's temporal links over its coreference partition.
///
/// Returns the reduced link set re-expanded to mention level, grouped per
/// link type in the input's type order.
pub fn reduce_links(
    links: &[TemporalLink],
    partition: &HashMap<String, usize>,
    mentions: &[Mention],
) -> Result<Vec<TemporalLink>> {
    // Class members in mention-table order keeps re-expansion stable.
    let num_classes = partition.values().copied().max().map_or(0, |m| m + 1);
    let mut members: Vec<Vec<&str>> = vec![Vec::new(); num_classes];
    for mention in mentions {
        if let Some(&class) = partition.get(&mention.id) {
            members[class].push(&mention.id);
        }
    }

    let mut link_types: Vec<&str> = Vec::new();
    for link in links {
        if !link_types.contains(&link.relation.as_str()) {
            link_types.push(&link.relation);
        }
    }

    let mut reduced = Vec::new();
    for link_type in link_types {
        let typed: Vec<&TemporalLink> =
            links.iter().filter(|l| l.relation == link_type).collect();
        let edges = lift_links(&typed, partition)?;
        let closure = transitive_closure(&edges, num_classes);
        // A node reaching itself means the links form a directed cycle,
        // which the pairwise antisymmetry check cannot see. Reduction
        // would erase every edge of the cycle, so reject the graph
        // instead.
        if let Some(node) = (0..num_classes).find(|&u| closure[u][u]) {
            let member = members[node].first().copied().unwrap_or("?");
            return Err(Error::validation(format!(
                "Temporal links of type [{link_type}] form a cycle through \
                 event [{member}], this is not allowed"
            )));
        }
        let kept = transitive_reduction(&edges, &closure);

        let mut kept: Vec<(usize, usize)> = kept.into_iter().collect();
        kept.sort_unstable();
        for (u, v) in kept {
            for m1 in &members[u] {
                for m2 in &members[v] {
                    reduced.push(TemporalLink {
                        relation: link_type.to_string(),
                        arg1: (*m1).to_string(),
                        arg2: (*m2).to_string(),
                    });
                }
            }
        }
    }
    Ok(reduced)
}

/// Normalized temporal node ids shared between gold and system.
///
/// Every gold mention gets a `te<N>` node; its aligned system mention
/// shares that node, unaligned system mentions get fresh nodes.
#[derive(Debug, Clone, Default)]
pub struct TemporalNodes {
    /// Node ids of the gold side, in gold mention order.
    pub gold_nodes: Vec<String>,
    /// Node ids of the system side.
    pub sys_nodes: Vec<String>,
    /// Gold mention id → node id.
    pub gold_mention_to_node: HashMap<String, String>,
    /// System mention id → node id.
    pub sys_mention_to_node: HashMap<String, String>,
}

impl TemporalNodes {
    /// Assign node ids from the gold→system alignment.
    #[must_use]
    pub fn from_alignment(
        mapping: &[Option<(usize, f64)>],
        gold: &[Mention],
        system: &[Mention],
    ) -> Self {
        let mut nodes = Self::default();
        let mut mapped_system = HashSet::new();
        let mut tid = 0usize;

        for (gold_index, slot) in mapping.iter().enumerate() {
            let node_id = format!("te{tid}");
            tid += 1;
            nodes
                .gold_mention_to_node
                .insert(gold[gold_index].id.clone(), node_id.clone());
            nodes.gold_nodes.push(node_id.clone());

            if let Some((system_index, _)) = slot {
                nodes
                    .sys_mention_to_node
                    .insert(system[*system_index].id.clone(), node_id.clone());
                nodes.sys_nodes.push(node_id);
                mapped_system.insert(*system_index);
            }
        }

        for (system_index, mention) in system.iter().enumerate() {
            if !mapped_system.contains(&system_index) {
                let node_id = format!("te{tid}");
                tid += 1;
                nodes
                    .sys_mention_to_node
                    .insert(mention.id.clone(), node_id.clone());
                nodes.sys_nodes.push(node_id);
            }
        }

        nodes
    }
}

/// Render one TimeML-like document: `EVENT` per node, `MAKEINSTANCE` per
/// node, `TLINK` per link.
pub fn write_timeml(
    nodes: &[String],
    mention_to_node: &HashMap<String, String>,
    links: &[TemporalLink],
) -> Result<String> {
    let mut out = String::new();
    out.push_str("<TimeML xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" ");
    out.push_str(
        "xsi:noNamespaceSchemaLocation=\"http://timeml.org/timeMLdocs/TimeML_1.2.1.xsd\">\n",
    );
    // Dummy document creation time node.
    out.push_str("  <DCT>\n");
    out.push_str(
        "    <TIMEX3 tid=\"t0\" type=\"TIME\" value=\"\" temporalFunction=\"false\" \
         functionInDocument=\"CREATION_TIME\"/>\n",
    );
    out.push_str("  </DCT>\n");

    out.push_str("  <TEXT>\n");
    for node in nodes {
        let _ = writeln!(out, "    <EVENT eid=\"{node}\"/>");
    }
    out.push_str("  </TEXT>\n");

    for node in nodes {
        let _ = writeln!(out, "  <MAKEINSTANCE eiid=\"instance_{node}\" eid=\"{node}\"/>");
    }

    for (lid, link) in links.iter().enumerate() {
        let left = mention_to_node.get(&link.arg1).ok_or_else(|| {
            Error::evaluation(format!("No temporal node for mention [{}]", link.arg1))
        })?;
        let right = mention_to_node.get(&link.arg2).ok_or_else(|| {
            Error::evaluation(format!("No temporal node for mention [{}]", link.arg2))
        })?;
        let _ = writeln!(
            out,
            "  <TLINK lid=\"l{lid}\" relType=\"{}\" eventInstanceID=\"{left}\" \
             relatedToEventInstance=\"{right}\"/>",
            link.relation.to_uppercase()
        );
    }

    out.push_str("</TimeML>\n");
    Ok(out)
}

/// The TimeML documents of one evaluation side, one per link type plus the
/// aggregate `All`.
pub fn timeml_documents(
    nodes: &[String],
    mention_to_node: &HashMap<String, String>,
    links: &[TemporalLink],
) -> Result<Vec<(String, String)>> {
    let mut link_types: Vec<&str> = Vec::new();
    for link in links {
        if !link_types.contains(&link.relation.as_str()) {
            link_types.push(&link.relation);
        }
    }

    let mut docs = Vec::new();
    for link_type in link_types {
        let typed: Vec<TemporalLink> = links
            .iter()
            .filter(|l| l.relation == link_type)
            .cloned()
            .collect();
        docs.push((
            link_type.to_string(),
            write_timeml(nodes, mention_to_node, &typed)?,
        ));
    }
    docs.push((
        "All".to_string(),
        write_timeml(nodes, mention_to_node, links)?,
    ));
    Ok(docs)
}
