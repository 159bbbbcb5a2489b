//! Structural tree for annotated queries.
//!
//! These types cover only the parts of a SELECT that the plan matcher
//! reconciles against a plan: the FROM region and the WHERE condition,
//! plus the projection (needed for `IN (subquery)` and column resolution).
//! Every FROM slot and every condition carries a write-once [`Annotation`].

use std::fmt;

/// A write-once annotation attached to a structural node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation(Option<String>);

impl Annotation {
    /// Create an empty annotation.
    pub fn new() -> Self {
        Self(None)
    }

    /// Set the annotation text. Returns false if it was already set,
    /// in which case the existing text is kept.
    pub fn set(&mut self, text: impl Into<String>) -> bool {
        if self.0.is_some() {
            return false;
        }
        self.0 = Some(text.into());
        true
    }

    /// Whether the annotation has been written.
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Get the annotation text, if any.
    pub fn get(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// A SELECT query reduced to the regions the annotator works on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub projection: Vec<Operand>,
    pub from: Option<FromRegion>,
    pub selection: Option<Condition>,
}

impl Query {
    /// Collect every annotation written into this query, in tree order
    /// (FROM before WHERE, nested queries inline).
    pub fn annotations(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_annotations(&mut out);
        out
    }

    fn collect_annotations<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(from) = &self.from {
            for item in from.items() {
                match item {
                    FromItem::Relation { annotation, .. } => out.extend(annotation.get()),
                    FromItem::Subquery { query, annotation, .. } => {
                        out.extend(annotation.get());
                        query.collect_annotations(out);
                    }
                }
            }
        }
        if let Some(cond) = &self.selection {
            cond.collect_annotations(out);
        }
    }
}

/// The FROM region of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum FromRegion {
    /// A single relation or derived table.
    Single(FromItem),
    /// A comma-separated list of relations / derived tables.
    List(Vec<FromItem>),
}

impl FromRegion {
    /// The slots of this region, in source order.
    pub fn items(&self) -> &[FromItem] {
        match self {
            FromRegion::Single(item) => std::slice::from_ref(item),
            FromRegion::List(items) => items,
        }
    }

    /// Mutable access to the slots of this region.
    pub fn items_mut(&mut self) -> &mut [FromItem] {
        match self {
            FromRegion::Single(item) => std::slice::from_mut(item),
            FromRegion::List(items) => items,
        }
    }
}

/// One slot of the FROM region.
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    /// A base relation, optionally aliased.
    Relation {
        name: String,
        alias: Option<String>,
        annotation: Annotation,
    },
    /// A derived table.
    Subquery {
        query: Box<Query>,
        alias: Option<String>,
        annotation: Annotation,
    },
}

impl FromItem {
    /// Create an unannotated base relation slot.
    pub fn relation(name: impl Into<String>, alias: Option<&str>) -> Self {
        FromItem::Relation {
            name: name.into(),
            alias: alias.map(str::to_string),
            annotation: Annotation::new(),
        }
    }

    /// The name other clauses use to refer to this slot: the alias when
    /// present, otherwise the relation name.
    pub fn reference_name(&self) -> Option<&str> {
        match self {
            FromItem::Relation { name, alias, .. } => Some(alias.as_deref().unwrap_or(name)),
            FromItem::Subquery { alias, .. } => alias.as_deref(),
        }
    }

    pub fn annotation(&self) -> &Annotation {
        match self {
            FromItem::Relation { annotation, .. } | FromItem::Subquery { annotation, .. } => annotation,
        }
    }
}

/// Comparison operators the codec knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Eq,
    NotEq,
    GtEq,
    LtEq,
    Like,
    NotLike,
}

/// Conjunction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConjunctionKind {
    And,
    Or,
}

/// Membership kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipKind {
    In,
    NotIn,
}

/// Right-hand side of an `IN` test.
#[derive(Debug, Clone, PartialEq)]
pub enum MembershipSet {
    Subquery(Box<Query>),
    List(Vec<Operand>),
}

/// A boolean condition in the WHERE region.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison {
        op: CompareOp,
        lhs: Operand,
        rhs: Operand,
        annotation: Annotation,
    },
    Conjunction {
        kind: ConjunctionKind,
        children: Vec<Condition>,
        annotation: Annotation,
    },
    Between {
        value: Operand,
        lo: Operand,
        hi: Operand,
        annotation: Annotation,
    },
    Exists {
        subquery: Box<Query>,
        annotation: Annotation,
    },
    Membership {
        kind: MembershipKind,
        lhs: Operand,
        set: MembershipSet,
        annotation: Annotation,
    },
    Not {
        inner: Box<Condition>,
        annotation: Annotation,
    },
    /// A boolean expression outside the supported grammar (e.g. `IS NULL`,
    /// `ILIKE`). Kept so the annotator can fail on it when reached.
    Unrecognized {
        sql: String,
        annotation: Annotation,
    },
}

impl Condition {
    /// Build an unannotated comparison.
    pub fn compare(op: CompareOp, lhs: Operand, rhs: Operand) -> Self {
        Condition::Comparison {
            op,
            lhs,
            rhs,
            annotation: Annotation::new(),
        }
    }

    /// Build an unannotated AND of the given children.
    pub fn and(children: Vec<Condition>) -> Self {
        Condition::Conjunction {
            kind: ConjunctionKind::And,
            children,
            annotation: Annotation::new(),
        }
    }

    /// Build an unannotated OR of the given children.
    pub fn or(children: Vec<Condition>) -> Self {
        Condition::Conjunction {
            kind: ConjunctionKind::Or,
            children,
            annotation: Annotation::new(),
        }
    }

    pub fn annotation(&self) -> &Annotation {
        match self {
            Condition::Comparison { annotation, .. }
            | Condition::Conjunction { annotation, .. }
            | Condition::Between { annotation, .. }
            | Condition::Exists { annotation, .. }
            | Condition::Membership { annotation, .. }
            | Condition::Not { annotation, .. }
            | Condition::Unrecognized { annotation, .. } => annotation,
        }
    }

    fn collect_annotations<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.extend(self.annotation().get());
        match self {
            Condition::Comparison { lhs, rhs, .. } => {
                lhs.collect_annotations(out);
                rhs.collect_annotations(out);
            }
            Condition::Conjunction { children, .. } => {
                for child in children {
                    child.collect_annotations(out);
                }
            }
            Condition::Exists { subquery, .. } => subquery.collect_annotations(out),
            Condition::Membership { set: MembershipSet::Subquery(q), .. } => q.collect_annotations(out),
            Condition::Not { inner, .. } => inner.collect_annotations(out),
            Condition::Between { .. }
            | Condition::Membership { .. }
            | Condition::Unrecognized { .. } => {}
        }
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal, kept as its source text.
    Number(String),
    /// String literal (also typed strings such as `date '1998-12-01'`).
    Text(String),
    Boolean(bool),
    Null,
    /// Interval literal, kept as its source text.
    Interval(String),
}

/// An operand of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Column reference, qualified (`n.n_name`) or bare (`n_name`).
    Column(String),
    Literal(Literal),
    /// Scalar subquery.
    Subquery(Box<Query>),
    /// Any computed expression (arithmetic, functions, `*`), kept as text.
    Opaque(String),
}

impl Operand {
    /// Shorthand for a column operand.
    pub fn column(name: impl Into<String>) -> Self {
        Operand::Column(name.into())
    }

    /// Shorthand for a numeric literal operand.
    pub fn number(n: impl fmt::Display) -> Self {
        Operand::Literal(Literal::Number(n.to_string()))
    }

    /// Shorthand for a string literal operand.
    pub fn text(s: impl Into<String>) -> Self {
        Operand::Literal(Literal::Text(s.into()))
    }

    fn collect_annotations<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Operand::Subquery(q) = self {
            q.collect_annotations(out);
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::GtEq => ">=",
            CompareOp::LtEq => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => f.write_str(n),
            Literal::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => f.write_str("NULL"),
            Literal::Interval(s) => f.write_str(s),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(name) => f.write_str(name),
            Operand::Literal(lit) => write!(f, "{}", lit),
            Operand::Subquery(q) => write!(f, "({})", q),
            Operand::Opaque(text) => f.write_str(text),
        }
    }
}

impl fmt::Display for FromItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromItem::Relation { name, alias, .. } => {
                f.write_str(name)?;
                if let Some(alias) = alias {
                    write!(f, " AS {}", alias)?;
                }
                Ok(())
            }
            FromItem::Subquery { query, alias, .. } => {
                write!(f, "({})", query)?;
                if let Some(alias) = alias {
                    write!(f, " AS {}", alias)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Comparison { op, lhs, rhs, .. } => write!(f, "{} {} {}", lhs, op, rhs),
            Condition::Conjunction { kind, children, .. } => {
                let sep = match kind {
                    ConjunctionKind::And => " AND ",
                    ConjunctionKind::Or => " OR ",
                };
                let parts: Vec<String> = children.iter().map(|c| match c {
                    Condition::Conjunction { .. } => format!("({})", c),
                    _ => c.to_string(),
                }).collect();
                f.write_str(&parts.join(sep))
            }
            Condition::Between { value, lo, hi, .. } => {
                write!(f, "{} BETWEEN {} AND {}", value, lo, hi)
            }
            Condition::Exists { subquery, .. } => write!(f, "EXISTS ({})", subquery),
            Condition::Membership { kind, lhs, set, .. } => {
                let kw = match kind {
                    MembershipKind::In => "IN",
                    MembershipKind::NotIn => "NOT IN",
                };
                match set {
                    MembershipSet::Subquery(q) => write!(f, "{} {} ({})", lhs, kw, q),
                    MembershipSet::List(items) => {
                        let items: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                        write!(f, "{} {} ({})", lhs, kw, items.join(", "))
                    }
                }
            }
            Condition::Not { inner, .. } => write!(f, "NOT ({})", inner),
            Condition::Unrecognized { sql, .. } => f.write_str(sql),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let projection: Vec<String> = self.projection.iter().map(|p| p.to_string()).collect();
        write!(f, "SELECT {}", projection.join(", "))?;
        if let Some(from) = &self.from {
            let items: Vec<String> = from.items().iter().map(|i| i.to_string()).collect();
            write!(f, " FROM {}", items.join(", "))?;
        }
        if let Some(cond) = &self.selection {
            write!(f, " WHERE {}", cond)?;
        }
        Ok(())
    }
}
