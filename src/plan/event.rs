//! Canonical plan events.

use std::fmt;

/// Output columns of the two children of a join that carries no explicit
/// condition. Used to reconstruct the implicit equi-join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCandidates {
    pub lhs: Vec<String>,
    pub rhs: Vec<String>,
}

impl JoinCandidates {
    /// Every `"{lhs} = {rhs}"` string over the cross product, lhs-major.
    pub fn conditions(&self) -> impl Iterator<Item = String> + '_ {
        self.lhs.iter().flat_map(move |l| self.rhs.iter().map(move |r| format!("{} = {}", l, r)))
    }
}

/// A join fact extracted from a plan node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinEvent {
    /// Original node type (e.g. `Hash Join`).
    pub subtype: String,
    /// Rendered join condition; empty when the plan has none.
    pub filter: String,
    /// Present only when `filter` is empty.
    pub candidates: Option<JoinCandidates>,
}

/// A scan fact extracted from a plan node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    /// Original node type (e.g. `Seq Scan`).
    pub subtype: String,
    /// Relation name, or index name for bitmap index scans.
    pub name: String,
    pub alias: String,
    /// Rendered scan condition; may be empty.
    pub filter: String,
}

/// A canonical event emitted by the plan normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanEvent {
    Join(JoinEvent),
    Scan(ScanEvent),
}

impl PlanEvent {
    pub fn subtype(&self) -> &str {
        match self {
            PlanEvent::Join(j) => &j.subtype,
            PlanEvent::Scan(s) => &s.subtype,
        }
    }

    pub fn filter(&self) -> &str {
        match self {
            PlanEvent::Join(j) => &j.filter,
            PlanEvent::Scan(s) => &s.filter,
        }
    }

    /// Annotation text written onto a condition this event realizes.
    pub fn condition_annotation(&self) -> String {
        match self {
            PlanEvent::Join(j) => format!("{} on {}", j.subtype, j.filter),
            PlanEvent::Scan(s) => format!("Filtered on {} of {}", s.subtype, s.name),
        }
    }
}

impl ScanEvent {
    /// Annotation text written onto the FROM slot this scan reads.
    pub fn relation_annotation(&self, aliased: bool) -> String {
        if aliased {
            format!("{} {} as {}", self.subtype, self.name, self.alias)
        } else {
            format!("{} {}", self.subtype, self.name)
        }
    }
}

impl JoinEvent {
    /// A copy of this event that carries `filter` as its condition; used to
    /// test one heuristic candidate.
    pub fn candidate(&self, filter: String) -> PlanEvent {
        PlanEvent::Join(JoinEvent {
            subtype: self.subtype.clone(),
            filter,
            candidates: None,
        })
    }
}

impl fmt::Display for PlanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanEvent::Join(j) if j.filter.is_empty() => write!(f, "Join[{}] (implicit)", j.subtype),
            PlanEvent::Join(j) => write!(f, "Join[{}] {}", j.subtype, j.filter),
            PlanEvent::Scan(s) => {
                write!(f, "Scan[{}] {}", s.subtype, s.name)?;
                if !s.alias.is_empty() && s.alias != s.name {
                    write!(f, " as {}", s.alias)?;
                }
                if !s.filter.is_empty() {
                    write!(f, " {}", s.filter)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_cross_product() {
        let candidates = JoinCandidates {
            lhs: vec!["a.x".into(), "a.y".into()],
            rhs: vec!["b.x".into()],
        };
        let conds: Vec<String> = candidates.conditions().collect();
        assert_eq!(conds, vec!["a.x = b.x", "a.y = b.x"]);
    }

    #[test]
    fn test_annotation_texts() {
        let scan = ScanEvent {
            subtype: "Seq Scan".into(),
            name: "nation".into(),
            alias: "n".into(),
            filter: "(n.n_regionkey = 0)".into(),
        };
        assert_eq!(scan.relation_annotation(true), "Seq Scan nation as n");
        assert_eq!(scan.relation_annotation(false), "Seq Scan nation");
        assert_eq!(PlanEvent::Scan(scan).condition_annotation(), "Filtered on Seq Scan of nation");

        let join = PlanEvent::Join(JoinEvent {
            subtype: "Hash Join".into(),
            filter: "(a.x = b.x)".into(),
            candidates: None,
        });
        assert_eq!(join.condition_annotation(), "Hash Join on (a.x = b.x)");
    }
}
