//! Text rendering of annotated queries.

use crate::sql::{Annotation, Condition, ConjunctionKind, FromItem, MembershipKind, MembershipSet, Operand, Query};

const INDENT: &str = "  ";

/// Render `query` one clause element per line, with each annotation as a
/// trailing `--` comment.
///
/// ```text
/// SELECT *
/// FROM
///   nation  -- Seq Scan nation
///   , region  -- Seq Scan region
/// WHERE
///   nation.n_regionkey = region.r_regionkey  -- Hash Join on (...)
///   AND nation.n_regionkey = 0  -- Filtered on Seq Scan of nation
/// ```
pub fn render(query: &Query) -> String {
    let mut renderer = Renderer::default();
    renderer.query(query, 0);
    renderer.out
}

#[derive(Default)]
struct Renderer {
    out: String,
}

impl Renderer {
    fn line(&mut self, depth: usize, text: &str, annotation: Option<&Annotation>) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        if let Some(note) = annotation.and_then(Annotation::get) {
            self.out.push_str("  -- ");
            self.out.push_str(note);
        }
        self.out.push('\n');
    }

    fn query(&mut self, query: &Query, depth: usize) {
        let projection: Vec<String> = query.projection.iter().map(|p| p.to_string()).collect();
        self.line(depth, &format!("SELECT {}", projection.join(", ")), None);

        if let Some(from) = &query.from {
            self.line(depth, "FROM", None);
            for (i, item) in from.items().iter().enumerate() {
                let sep = if i == 0 { "" } else { ", " };
                self.from_item(item, sep, depth + 1);
            }
        }

        match &query.selection {
            Some(Condition::Conjunction { kind, children, .. }) => {
                self.line(depth, "WHERE", None);
                self.conjuncts(*kind, children, depth + 1);
            }
            Some(cond) => {
                self.line(depth, "WHERE", None);
                self.condition(cond, "", depth + 1);
            }
            None => {}
        }
    }

    fn from_item(&mut self, item: &FromItem, sep: &str, depth: usize) {
        match item {
            FromItem::Relation { annotation, .. } => {
                self.line(depth, &format!("{}{}", sep, item), Some(annotation));
            }
            FromItem::Subquery { query, alias, annotation } => {
                self.line(depth, &format!("{}(", sep), Some(annotation));
                self.query(query, depth + 1);
                match alias {
                    Some(alias) => self.line(depth, &format!(") AS {}", alias), None),
                    None => self.line(depth, ")", None),
                }
            }
        }
    }

    fn condition(&mut self, cond: &Condition, prefix: &str, depth: usize) {
        match cond {
            Condition::Conjunction { kind, children, annotation } => {
                self.line(depth, &format!("{}(", prefix), Some(annotation));
                self.conjuncts(*kind, children, depth + 1);
                self.line(depth, ")", None);
            }
            Condition::Exists { subquery, annotation } => {
                self.nested(&format!("{}EXISTS (", prefix), annotation, subquery, depth);
            }
            Condition::Membership { kind, lhs, set: MembershipSet::Subquery(sub), annotation } => {
                let keyword = match kind {
                    MembershipKind::In => "IN",
                    MembershipKind::NotIn => "NOT IN",
                };
                self.nested(&format!("{}{} {} (", prefix, lhs, keyword), annotation, sub, depth);
            }
            Condition::Comparison { op, lhs, rhs: Operand::Subquery(sub), annotation }
                if !matches!(lhs, Operand::Subquery(_)) =>
            {
                self.nested(&format!("{}{} {} (", prefix, lhs, op), annotation, sub, depth);
            }
            Condition::Not { inner, .. } => self.condition(inner, &format!("{}NOT ", prefix), depth),
            other => self.line(depth, &format!("{}{}", prefix, other), Some(other.annotation())),
        }
    }

    fn conjuncts(&mut self, kind: ConjunctionKind, children: &[Condition], depth: usize) {
        let keyword = match kind {
            ConjunctionKind::And => "AND ",
            ConjunctionKind::Or => "OR ",
        };
        for (i, child) in children.iter().enumerate() {
            self.condition(child, if i == 0 { "" } else { keyword }, depth);
        }
    }

    fn nested(&mut self, head: &str, annotation: &Annotation, query: &Query, depth: usize) {
        self.line(depth, head, Some(annotation));
        self.query(query, depth + 1);
        self.line(depth, ")", None);
    }
}
