//! Plan-to-query matching.
//!
//! Each plan event is placed onto the structural tree: scans onto the FROM
//! slot they read and the WHERE conditions they filter on, joins onto the
//! WHERE conditions they evaluate. Annotations are write-once, so the
//! first event that matches a node owns it.

use log::debug;

use super::codec;
use super::coverage::CoverageCounters;
use super::error::{AnnotateError, AnnotateResult};
use crate::plan::{JoinEvent, PlanEvent, PlanNode, PlanNormalizer, ScanEvent};
use crate::sql::{CompareOp, Condition, FromItem, MembershipSet, Operand, Query};

/// How `value BETWEEN lo AND hi` is rewritten for matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BetweenMode {
    /// `lo < value` and `value < hi`.
    #[default]
    Strict,
    /// `value >= lo` and `value <= hi`, the way the engine prints it.
    Inclusive,
}

/// Result of evaluating one condition against one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    /// The condition (or one of its children) corresponds to the event.
    pub matched: bool,
    /// Annotations written while evaluating, nested queries included.
    pub tagged: usize,
}

impl Outcome {
    fn tagged(tagged: usize) -> Self {
        Self { matched: tagged > 0, tagged }
    }
}

/// Writes plan annotations onto a query's structural tree.
#[derive(Debug, Clone, Default)]
pub struct QueryAnnotator {
    between: BetweenMode,
}

impl QueryAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match `BETWEEN` with inclusive bounds instead of strict ones.
    pub fn inclusive_between(mut self, inclusive: bool) -> Self {
        self.between = if inclusive { BetweenMode::Inclusive } else { BetweenMode::Strict };
        self
    }

    pub fn between_mode(&self) -> BetweenMode {
        self.between
    }

    /// Annotate `query` with every event of `plan`.
    ///
    /// Works on a copy of the tree; `query` is only replaced when the whole
    /// pass succeeds.
    pub fn annotate(&self, query: &mut Query, plan: &PlanNode) -> AnnotateResult<CoverageCounters> {
        let mut scratch = query.clone();
        let mut events = PlanNormalizer::new(plan);
        let mut matched = 0;
        for event in events.by_ref() {
            matched += self.place_event(&event?, &mut scratch)?;
        }

        let mut coverage = events.coverage();
        coverage.matched = matched;
        *query = scratch;
        Ok(coverage)
    }

    /// Annotate `query` with an already normalized event sequence. Returns
    /// the number of annotations written. Same commit rule as [`annotate`].
    ///
    /// [`annotate`]: QueryAnnotator::annotate
    pub fn annotate_events<'e, I>(&self, query: &mut Query, events: I) -> AnnotateResult<usize>
    where
        I: IntoIterator<Item = &'e PlanEvent>,
    {
        let mut scratch = query.clone();
        let mut matched = 0;
        for event in events {
            matched += self.place_event(event, &mut scratch)?;
        }
        *query = scratch;
        Ok(matched)
    }

    /// Place one event onto `query`. Returns the number of annotations
    /// written. Annotations written before an error stay in `query`.
    pub fn place_event(&self, event: &PlanEvent, query: &mut Query) -> AnnotateResult<usize> {
        match event {
            PlanEvent::Join(join) => self.place_join(join, event, query),
            PlanEvent::Scan(scan) => self.place_scan(scan, event, query),
        }
    }

    fn place_join(&self, join: &JoinEvent, event: &PlanEvent, query: &mut Query) -> AnnotateResult<usize> {
        let mut tagged = 0;

        if let Some(selection) = query.selection.as_mut() {
            if !join.filter.is_empty() {
                tagged += self.eval_condition(selection, event)?.tagged;
            } else if let Some(candidates) = &join.candidates {
                let mut hits = 0;
                for candidate in candidates.conditions() {
                    let attempt = join.candidate(candidate);
                    hits += self.eval_condition(selection, &attempt)?.tagged;
                }
                if hits >= 2 {
                    return Err(AnnotateError::AmbiguousHeuristicMatch {
                        subtype: join.subtype.clone(),
                        candidates: hits,
                    });
                }
                tagged += hits;
            }
        }

        if let Some(from) = query.from.as_mut() {
            for item in from.items_mut() {
                if let FromItem::Subquery { query: sub, .. } = item {
                    tagged += self.place_event(event, sub)?;
                }
            }
        }

        Ok(tagged)
    }

    fn place_scan(&self, scan: &ScanEvent, event: &PlanEvent, query: &mut Query) -> AnnotateResult<usize> {
        let mut tagged = 0;

        if let Some(from) = query.from.as_mut() {
            for item in from.items_mut() {
                match item {
                    FromItem::Relation { name, alias, annotation } => {
                        if annotation.is_set() || *name != scan.name {
                            continue;
                        }
                        if alias.as_deref().unwrap_or(name) != scan.alias {
                            continue;
                        }
                        annotation.set(scan.relation_annotation(alias.is_some()));
                        debug!("{} -> FROM {}", event, name);
                        tagged += 1;
                        break;
                    }
                    FromItem::Subquery { query: sub, .. } => {
                        tagged += self.place_event(event, sub)?;
                    }
                }
            }
        }

        if let Some(selection) = query.selection.as_mut() {
            if scan.filter.is_empty() {
                tagged += self.place_in_subqueries(event, selection)?;
            } else {
                tagged += self.eval_condition(selection, event)?.tagged;
            }
        }

        Ok(tagged)
    }

    /// Place `event` into every query nested in `cond` without matching
    /// `cond` itself.
    fn place_in_subqueries(&self, event: &PlanEvent, cond: &mut Condition) -> AnnotateResult<usize> {
        let mut tagged = 0;
        match cond {
            Condition::Comparison { lhs, rhs, .. } => {
                for operand in [lhs, rhs] {
                    if let Operand::Subquery(sub) = operand {
                        tagged += self.place_event(event, sub)?;
                    }
                }
            }
            Condition::Conjunction { children, .. } => {
                for child in children.iter_mut() {
                    tagged += self.place_in_subqueries(event, child)?;
                }
            }
            Condition::Exists { subquery, .. } => tagged += self.place_event(event, subquery)?,
            Condition::Membership { set: MembershipSet::Subquery(sub), .. } => {
                tagged += self.place_event(event, sub)?;
            }
            Condition::Not { inner, .. } => tagged += self.place_in_subqueries(event, inner)?,
            Condition::Between { .. } | Condition::Membership { .. } | Condition::Unrecognized { .. } => {}
        }
        Ok(tagged)
    }

    /// Evaluate `cond` against `event`, annotating every node it realizes.
    ///
    /// An annotated node is never tagged again, but queries nested under it
    /// still receive the event.
    pub fn eval_condition(&self, cond: &mut Condition, event: &PlanEvent) -> AnnotateResult<Outcome> {
        match cond {
            Condition::Comparison { op, lhs, rhs, annotation } => {
                let mut tagged = 0;
                for operand in [&mut *lhs, &mut *rhs] {
                    if let Operand::Subquery(sub) = operand {
                        tagged += self.place_event(event, sub)?;
                    }
                }
                if !annotation.is_set() && codec::matches(*op, lhs, rhs, event.filter()) {
                    annotation.set(event.condition_annotation());
                    debug!("{} -> {} {} {}", event, lhs, op, rhs);
                    return Ok(Outcome { matched: true, tagged: tagged + 1 });
                }
                Ok(Outcome::tagged(tagged))
            }

            Condition::Conjunction { children, .. } => {
                let mut outcome = Outcome::default();
                for child in children.iter_mut() {
                    let child_outcome = self.eval_condition(child, event)?;
                    outcome.matched |= child_outcome.matched;
                    outcome.tagged += child_outcome.tagged;
                }
                Ok(outcome)
            }

            Condition::Between { annotation, .. } if annotation.is_set() => Ok(Outcome::default()),

            Condition::Between { value, lo, hi, annotation } => {
                let rewritten = match self.between {
                    BetweenMode::Strict => [(CompareOp::Lt, &*lo, &*value), (CompareOp::Lt, &*value, &*hi)],
                    BetweenMode::Inclusive => [(CompareOp::GtEq, &*value, &*lo), (CompareOp::LtEq, &*value, &*hi)],
                };
                for (op, l, r) in rewritten {
                    if codec::matches(op, l, r, event.filter()) {
                        annotation.set(event.condition_annotation());
                        debug!("{} -> {} BETWEEN {} AND {}", event, value, lo, hi);
                        return Ok(Outcome { matched: true, tagged: 1 });
                    }
                }
                Ok(Outcome::default())
            }

            Condition::Exists { subquery, .. } => {
                let tagged = self.place_event(event, subquery)?;
                Ok(Outcome { matched: true, tagged })
            }

            Condition::Membership { lhs, set, annotation, .. } => {
                let MembershipSet::Subquery(sub) = set else {
                    return Ok(Outcome::default());
                };

                let mut tagged = 0;
                if matches!(event, PlanEvent::Join(_)) && !annotation.is_set() {
                    let column = match sub.projection.as_slice() {
                        [column @ Operand::Column(_)] => Some(column.clone()),
                        _ => None,
                    };
                    if let Some(column) = column {
                        if codec::matches(CompareOp::Eq, lhs, &column, event.filter()) {
                            annotation.set(event.condition_annotation());
                            debug!("{} -> {} IN (SELECT {} ...)", event, lhs, column);
                            tagged += 1;
                        }
                    }
                }
                tagged += self.place_event(event, sub)?;
                Ok(Outcome::tagged(tagged))
            }

            Condition::Not { inner, .. } => self.eval_condition(inner, event),

            Condition::Unrecognized { sql, .. } => Err(AnnotateError::UnrecognizedConstruct(sql.clone())),
        }
    }
}
