//! Plan normalization.
//!
//! Walks a raw plan depth-first, pre-order, and yields one [`PlanEvent`]
//! per join or scan node. Wrapper nodes (`Hash`, `Unique`, `Materialize`)
//! and node types without a handler are passed through silently.
//!
//! Child-count contracts count only input children. InitPlan and SubPlan
//! children are visited after the inputs of the node that owns them.

use log::{debug, warn};

use super::error::{PlanError, PlanResult};
use super::event::{JoinCandidates, JoinEvent, PlanEvent, ScanEvent};
use super::node::PlanNode;
use crate::annotate::CoverageCounters;

/// Lazy, single-pass event stream over a plan tree.
///
/// Yields `Err` at most once: after a structural violation the stream ends.
pub struct PlanNormalizer<'a> {
    stack: Vec<&'a PlanNode>,
    coverage: CoverageCounters,
    failed: bool,
}

impl<'a> PlanNormalizer<'a> {
    /// Start a traversal at `root`.
    pub fn new(root: &'a PlanNode) -> Self {
        Self {
            stack: vec![root],
            coverage: CoverageCounters::new(),
            failed: false,
        }
    }

    /// Counters accumulated so far (`processed` and `transparent`).
    pub fn coverage(&self) -> CoverageCounters {
        self.coverage
    }

    fn visit(&mut self, node: &'a PlanNode) -> PlanResult<Option<PlanEvent>> {
        let inputs: Vec<&'a PlanNode> = node.inputs().collect();

        let event = match node.node_type.as_str() {
            "Nested Loop" => {
                expect_inputs(node, &inputs, 2)?;
                let event = match &node.join_filter {
                    Some(filter) => join(node, filter.clone(), None),
                    None => join(
                        node,
                        String::new(),
                        Some(JoinCandidates {
                            lhs: inputs[0].output.clone(),
                            rhs: inputs[1].output.clone(),
                        }),
                    ),
                };
                Some(event)
            }
            "Hash Join" => {
                expect_inputs(node, &inputs, 2)?;
                Some(join(node, required(node, &node.hash_cond, "Hash Cond")?, None))
            }
            "Merge Join" => {
                if inputs.is_empty() {
                    return Err(PlanError::violation(&node.node_type, "expected at least 1 input, found 0"));
                }
                Some(join(node, required(node, &node.merge_cond, "Merge Cond")?, None))
            }
            "Seq Scan" => {
                expect_inputs(node, &inputs, 0)?;
                Some(scan(node, node.filter.clone().unwrap_or_default())?)
            }
            "Index Scan" | "Index Only Scan" => {
                expect_inputs(node, &inputs, 0)?;
                let filter = [node.index_cond.as_deref(), node.filter.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" AND ");
                Some(scan(node, filter)?)
            }
            "Bitmap Index Scan" => {
                expect_inputs(node, &inputs, 0)?;
                Some(PlanEvent::Scan(ScanEvent {
                    subtype: node.node_type.clone(),
                    name: required(node, &node.index_name, "Index Name")?,
                    alias: String::new(),
                    filter: node.index_cond.clone().unwrap_or_default(),
                }))
            }
            "Bitmap Heap Scan" => Some(scan(node, node.filter.clone().unwrap_or_default())?),
            "Hash" | "Unique" | "Materialize" => {
                expect_inputs(node, &inputs, 1)?;
                None
            }
            other => {
                warn!("unimplemented plan node type '{}', passing through", other);
                None
            }
        };

        match &event {
            Some(ev) => {
                self.coverage.processed += 1;
                debug!("plan event: {}", ev);
            }
            None => self.coverage.transparent += 1,
        }

        // Children are popped in order: inputs first, then subplans.
        let subplans: Vec<&'a PlanNode> = node.subplans().collect();
        self.stack.extend(subplans.into_iter().rev());
        self.stack.extend(inputs.into_iter().rev());

        Ok(event)
    }
}

impl<'a> Iterator for PlanNormalizer<'a> {
    type Item = PlanResult<PlanEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while let Some(node) = self.stack.pop() {
            match self.visit(node) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Normalize a whole plan eagerly, returning its events and counters.
pub fn normalize(root: &PlanNode) -> PlanResult<(Vec<PlanEvent>, CoverageCounters)> {
    let mut normalizer = PlanNormalizer::new(root);
    let events = normalizer.by_ref().collect::<PlanResult<Vec<_>>>()?;
    Ok((events, normalizer.coverage()))
}

fn expect_inputs(node: &PlanNode, inputs: &[&PlanNode], expected: usize) -> PlanResult<()> {
    if inputs.len() != expected {
        return Err(PlanError::violation(
            &node.node_type,
            format!("expected {} input(s), found {}", expected, inputs.len()),
        ));
    }
    Ok(())
}

fn required(node: &PlanNode, field: &Option<String>, name: &str) -> PlanResult<String> {
    field.clone().ok_or_else(|| PlanError::violation(&node.node_type, format!("missing '{}'", name)))
}

fn join(node: &PlanNode, filter: String, candidates: Option<JoinCandidates>) -> PlanEvent {
    PlanEvent::Join(JoinEvent {
        subtype: node.node_type.clone(),
        filter,
        candidates,
    })
}

fn scan(node: &PlanNode, filter: String) -> PlanResult<PlanEvent> {
    let name = required(node, &node.relation_name, "Relation Name")?;
    let alias = node.alias.clone().unwrap_or_else(|| name.clone());
    Ok(PlanEvent::Scan(ScanEvent {
        subtype: node.node_type.clone(),
        name,
        alias,
        filter,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_join_plan() -> PlanNode {
        PlanNode::new("Hash Join")
            .with_hash_cond("(nation.n_regionkey = region.r_regionkey)")
            .with_child(PlanNode::scan("Seq Scan", "nation").with_filter("(nation.n_regionkey = 0)"))
            .with_child(PlanNode::new("Hash").with_child(PlanNode::scan("Seq Scan", "region")))
    }

    fn subtypes(events: &[PlanEvent]) -> Vec<&str> {
        events.iter().map(|e| e.subtype()).collect()
    }

    #[test]
    fn test_hash_join_preorder() {
        let (events, coverage) = normalize(&hash_join_plan()).unwrap();

        assert_eq!(subtypes(&events), vec!["Hash Join", "Seq Scan", "Seq Scan"]);
        assert_eq!(events[0].filter(), "(nation.n_regionkey = region.r_regionkey)");
        match &events[1] {
            PlanEvent::Scan(s) => {
                assert_eq!(s.name, "nation");
                assert_eq!(s.alias, "nation");
                assert_eq!(s.filter, "(nation.n_regionkey = 0)");
            }
            other => panic!("Expected scan, got {:?}", other),
        }
        assert_eq!(coverage.processed, 3);
        assert_eq!(coverage.transparent, 1);
    }

    #[test]
    fn test_deterministic() {
        let plan = hash_join_plan();
        let first = normalize(&plan).unwrap();
        let second = normalize(&plan).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_nested_loop_with_join_filter() {
        let plan = PlanNode::new("Nested Loop")
            .with_join_filter("(n1.n_regionkey < n2.n_regionkey)")
            .with_child(PlanNode::scan("Seq Scan", "nation").with_alias("n1"))
            .with_child(PlanNode::new("Materialize").with_child(PlanNode::scan("Seq Scan", "nation").with_alias("n2")));

        let (events, coverage) = normalize(&plan).unwrap();
        match &events[0] {
            PlanEvent::Join(j) => {
                assert_eq!(j.filter, "(n1.n_regionkey < n2.n_regionkey)");
                assert!(j.candidates.is_none());
            }
            other => panic!("Expected join, got {:?}", other),
        }
        assert_eq!(events.len(), 3);
        assert_eq!(coverage.transparent, 1);
    }

    #[test]
    fn test_nested_loop_without_filter_carries_candidates() {
        let plan = PlanNode::new("Nested Loop")
            .with_child(PlanNode::scan("Seq Scan", "nation").with_alias("n1").with_output(["n1.n_regionkey"]))
            .with_child(PlanNode::scan("Seq Scan", "nation").with_alias("n2").with_output(["n2.n_regionkey"]));

        let (events, _) = normalize(&plan).unwrap();
        match &events[0] {
            PlanEvent::Join(j) => {
                assert!(j.filter.is_empty());
                let candidates = j.candidates.as_ref().expect("candidates");
                assert_eq!(candidates.lhs, vec!["n1.n_regionkey"]);
                assert_eq!(candidates.rhs, vec!["n2.n_regionkey"]);
            }
            other => panic!("Expected join, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_join_visits_all_children() {
        let plan = PlanNode::new("Merge Join")
            .with_merge_cond("(a.x = b.x)")
            .with_child(PlanNode::new("Sort").with_child(PlanNode::scan("Seq Scan", "a")))
            .with_child(PlanNode::new("Sort").with_child(PlanNode::scan("Seq Scan", "b")));

        let (events, coverage) = normalize(&plan).unwrap();
        assert_eq!(subtypes(&events), vec!["Merge Join", "Seq Scan", "Seq Scan"]);
        assert_eq!(coverage.transparent, 2);
    }

    #[test]
    fn test_index_scan_combines_conditions() {
        let plan = PlanNode::scan("Index Scan", "nation")
            .with_index_cond("(nation.n_nationkey = 7)")
            .with_filter("(nation.n_regionkey = 0)");

        let (events, _) = normalize(&plan).unwrap();
        assert_eq!(events[0].filter(), "(nation.n_nationkey = 7) AND (nation.n_regionkey = 0)");

        let only_filter = PlanNode::scan("Index Only Scan", "nation").with_filter("(nation.n_regionkey = 0)");
        let (events, _) = normalize(&only_filter).unwrap();
        assert_eq!(events[0].filter(), "(nation.n_regionkey = 0)");
    }

    #[test]
    fn test_bitmap_scans() {
        let plan = PlanNode::scan("Bitmap Heap Scan", "orders")
            .with_filter("(orders.o_totalprice > 100)")
            .with_child(
                PlanNode::new("Bitmap Index Scan")
                    .with_index("orders_pkey")
                    .with_index_cond("(orders.o_orderkey < 10)"),
            );

        let (events, _) = normalize(&plan).unwrap();
        assert_eq!(events.len(), 2);
        match &events[1] {
            PlanEvent::Scan(s) => {
                assert_eq!(s.name, "orders_pkey");
                assert!(s.alias.is_empty());
                assert_eq!(s.filter, "(orders.o_orderkey < 10)");
            }
            other => panic!("Expected scan, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_node_is_transparent() {
        let plan = PlanNode::new("Gather Merge")
            .with_child(PlanNode::scan("Seq Scan", "nation").with_filter("(nation.n_regionkey = 0)"));

        let (events, coverage) = normalize(&plan).unwrap();
        assert_eq!(subtypes(&events), vec!["Seq Scan"]);
        assert_eq!(coverage.transparent, 1);
    }

    #[test]
    fn test_subplans_visited_after_inputs() {
        let plan = PlanNode::scan("Seq Scan", "nation")
            .with_filter("(nation.n_nationkey = $0)")
            .with_child(PlanNode::new("Aggregate").as_subplan().with_child(PlanNode::scan("Seq Scan", "region")));

        let (events, _) = normalize(&plan).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], PlanEvent::Scan(s) if s.name == "region"));
    }

    #[test]
    fn test_hash_join_child_count_violation() {
        let plan = PlanNode::new("Hash Join")
            .with_hash_cond("(a.x = b.x)")
            .with_child(PlanNode::scan("Seq Scan", "a"));

        let err = normalize(&plan).unwrap_err();
        assert!(matches!(err, PlanError::StructuralViolation { ref node_type, .. } if node_type == "Hash Join"));
    }

    #[test]
    fn test_wrapper_child_count_violation() {
        let plan = PlanNode::new("Hash")
            .with_child(PlanNode::scan("Seq Scan", "a"))
            .with_child(PlanNode::scan("Seq Scan", "b"));
        assert!(normalize(&plan).is_err());
    }

    #[test]
    fn test_missing_required_field() {
        let plan = PlanNode::new("Seq Scan");
        let err = normalize(&plan).unwrap_err();
        assert!(err.to_string().contains("Relation Name"));
    }

    #[test]
    fn test_stream_stops_after_violation() {
        let plan = PlanNode::new("Unique").with_child(
            PlanNode::new("Hash Join").with_hash_cond("(a.x = b.x)"),
        );
        let mut events = PlanNormalizer::new(&plan);
        assert!(matches!(events.next(), Some(Err(_))));
        assert!(events.next().is_none());
    }

    #[test]
    fn test_missing_alias_defaults_to_relation() {
        let plan = PlanNode::new("Seq Scan").with_relation("nation");
        let (events, _) = normalize(&plan).unwrap();
        assert!(matches!(&events[0], PlanEvent::Scan(s) if s.alias == "nation"));
    }
}
