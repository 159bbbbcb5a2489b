//! SQL parser implementation.
//!
//! Parses SQL text with `sqlparser` (PostgreSQL dialect) and lowers the
//! resulting AST into the structural tree the annotator works on.

use sqlparser::ast as sp;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser as SqlParser;

use super::ast::*;
use super::error::{ParseError, ParseResult};

/// SQL parser producing structural trees.
pub struct Parser;

impl Parser {
    /// Parse a single SELECT statement into a structural tree.
    pub fn parse(sql: &str) -> ParseResult<Query> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(ParseError::EmptyQuery);
        }

        let dialect = PostgreSqlDialect {};
        let statements = SqlParser::parse_sql(&dialect, sql)?;

        if statements.is_empty() {
            return Err(ParseError::EmptyQuery);
        }
        if statements.len() > 1 {
            return Err(ParseError::MultipleStatements);
        }

        match &statements[0] {
            sp::Statement::Query(query) => Self::convert_query(query),
            other => Err(ParseError::UnsupportedStatement(other.to_string())),
        }
    }

    fn convert_query(query: &sp::Query) -> ParseResult<Query> {
        match query.body.as_ref() {
            sp::SetExpr::Select(select) => Self::convert_select(select),
            sp::SetExpr::Query(inner) => Self::convert_query(inner),
            other => Err(ParseError::UnsupportedStatement(format!(
                "set operation: {}",
                other
            ))),
        }
    }

    fn convert_select(select: &sp::Select) -> ParseResult<Query> {
        let projection = select.projection.iter()
            .map(Self::convert_select_item)
            .collect::<ParseResult<Vec<_>>>()?;

        let from = match select.from.len() {
            0 => None,
            1 => Some(FromRegion::Single(Self::convert_table(&select.from[0])?)),
            _ => {
                let items = select.from.iter()
                    .map(Self::convert_table)
                    .collect::<ParseResult<Vec<_>>>()?;
                Some(FromRegion::List(items))
            }
        };

        let selection = select.selection
            .as_ref()
            .map(Self::convert_condition)
            .transpose()?;

        Ok(Query {
            projection,
            from,
            selection,
        })
    }

    fn convert_select_item(item: &sp::SelectItem) -> ParseResult<Operand> {
        match item {
            sp::SelectItem::UnnamedExpr(expr) | sp::SelectItem::ExprWithAlias { expr, .. } => {
                Self::convert_operand(expr)
            }
            sp::SelectItem::Wildcard(_) => Ok(Operand::Opaque("*".into())),
            other => Ok(Operand::Opaque(other.to_string())),
        }
    }

    fn convert_table(table: &sp::TableWithJoins) -> ParseResult<FromItem> {
        if !table.joins.is_empty() {
            return Err(ParseError::UnsupportedFrom(format!(
                "explicit JOIN syntax: {}",
                table
            )));
        }

        match &table.relation {
            sp::TableFactor::Table { name, alias, .. } => Ok(FromItem::Relation {
                name: Self::extract_table_name(name)?,
                alias: alias.as_ref().map(|a| a.name.value.clone()),
                annotation: Annotation::new(),
            }),
            sp::TableFactor::Derived { subquery, alias, .. } => Ok(FromItem::Subquery {
                query: Box::new(Self::convert_query(subquery)?),
                alias: alias.as_ref().map(|a| a.name.value.clone()),
                annotation: Annotation::new(),
            }),
            other => Err(ParseError::UnsupportedFrom(other.to_string())),
        }
    }

    fn convert_condition(expr: &sp::Expr) -> ParseResult<Condition> {
        match expr {
            sp::Expr::Nested(inner) => Self::convert_condition(inner),

            sp::Expr::BinaryOp { op: op @ (sp::BinaryOperator::And | sp::BinaryOperator::Or), .. } => {
                let mut children = Vec::new();
                Self::collect_conjuncts(expr, op, &mut children)?;
                let kind = if matches!(op, sp::BinaryOperator::And) {
                    ConjunctionKind::And
                } else {
                    ConjunctionKind::Or
                };
                Ok(Condition::Conjunction {
                    kind,
                    children,
                    annotation: Annotation::new(),
                })
            }

            sp::Expr::BinaryOp { left, op, right } => match Self::convert_compare_op(op) {
                Some(op) => Ok(Condition::compare(
                    op,
                    Self::convert_operand(left)?,
                    Self::convert_operand(right)?,
                )),
                None => Ok(Self::unrecognized(expr)),
            },

            sp::Expr::Like { negated, expr: lhs, pattern, .. } => {
                let op = if *negated { CompareOp::NotLike } else { CompareOp::Like };
                Ok(Condition::compare(
                    op,
                    Self::convert_operand(lhs)?,
                    Self::convert_operand(pattern)?,
                ))
            }

            sp::Expr::Between { expr: value, negated, low, high, .. } => {
                let between = Condition::Between {
                    value: Self::convert_operand(value)?,
                    lo: Self::convert_operand(low)?,
                    hi: Self::convert_operand(high)?,
                    annotation: Annotation::new(),
                };
                Ok(Self::negate_if(between, *negated))
            }

            sp::Expr::Exists { subquery, negated, .. } => {
                let exists = Condition::Exists {
                    subquery: Box::new(Self::convert_query(subquery)?),
                    annotation: Annotation::new(),
                };
                Ok(Self::negate_if(exists, *negated))
            }

            sp::Expr::InSubquery { expr: lhs, subquery, negated, .. } => Ok(Condition::Membership {
                kind: if *negated { MembershipKind::NotIn } else { MembershipKind::In },
                lhs: Self::convert_operand(lhs)?,
                set: MembershipSet::Subquery(Box::new(Self::convert_query(subquery)?)),
                annotation: Annotation::new(),
            }),

            sp::Expr::InList { expr: lhs, list, negated, .. } => {
                let items = list.iter()
                    .map(Self::convert_operand)
                    .collect::<ParseResult<Vec<_>>>()?;
                Ok(Condition::Membership {
                    kind: if *negated { MembershipKind::NotIn } else { MembershipKind::In },
                    lhs: Self::convert_operand(lhs)?,
                    set: MembershipSet::List(items),
                    annotation: Annotation::new(),
                })
            }

            sp::Expr::UnaryOp { op: sp::UnaryOperator::Not, expr: inner } => Ok(Condition::Not {
                inner: Box::new(Self::convert_condition(inner)?),
                annotation: Annotation::new(),
            }),

            other => Ok(Self::unrecognized(other)),
        }
    }

    /// Flatten a left-deep chain of the same logical operator into one list,
    /// so `a AND b AND c` becomes a single conjunction of three children.
    fn collect_conjuncts(
        expr: &sp::Expr,
        target: &sp::BinaryOperator,
        out: &mut Vec<Condition>,
    ) -> ParseResult<()> {
        match expr {
            sp::Expr::BinaryOp { left, op, right } if op == target => {
                Self::collect_conjuncts(left, target, out)?;
                Self::collect_conjuncts(right, target, out)
            }
            other => {
                out.push(Self::convert_condition(other)?);
                Ok(())
            }
        }
    }

    fn negate_if(cond: Condition, negated: bool) -> Condition {
        if negated {
            Condition::Not {
                inner: Box::new(cond),
                annotation: Annotation::new(),
            }
        } else {
            cond
        }
    }

    fn unrecognized(expr: &sp::Expr) -> Condition {
        Condition::Unrecognized {
            sql: expr.to_string(),
            annotation: Annotation::new(),
        }
    }

    fn convert_compare_op(op: &sp::BinaryOperator) -> Option<CompareOp> {
        match op {
            sp::BinaryOperator::Gt => Some(CompareOp::Gt),
            sp::BinaryOperator::Lt => Some(CompareOp::Lt),
            sp::BinaryOperator::Eq => Some(CompareOp::Eq),
            sp::BinaryOperator::NotEq => Some(CompareOp::NotEq),
            sp::BinaryOperator::GtEq => Some(CompareOp::GtEq),
            sp::BinaryOperator::LtEq => Some(CompareOp::LtEq),
            _ => None,
        }
    }

    fn convert_operand(expr: &sp::Expr) -> ParseResult<Operand> {
        match expr {
            sp::Expr::Identifier(id) => Ok(Operand::Column(id.value.clone())),

            sp::Expr::CompoundIdentifier(parts) => {
                if parts.is_empty() {
                    return Err(ParseError::InvalidIdentifier("empty compound identifier".into()));
                }
                Ok(Operand::Column(
                    parts.iter().map(|p| p.value.as_str()).collect::<Vec<_>>().join("."),
                ))
            }

            sp::Expr::Value(v) => Ok(Self::convert_value(&v.value)),

            sp::Expr::UnaryOp { op: sp::UnaryOperator::Minus, expr: inner } => {
                match Self::convert_operand(inner)? {
                    Operand::Literal(Literal::Number(n)) => Ok(Operand::Literal(Literal::Number(format!("-{}", n)))),
                    _ => Ok(Operand::Opaque(expr.to_string())),
                }
            }

            sp::Expr::TypedString { .. } => {
                let text = expr.to_string();
                Ok(match quoted_body(&text) {
                    Some(body) => Operand::Literal(Literal::Text(body)),
                    None => Operand::Opaque(text),
                })
            }

            sp::Expr::Interval(_) => Ok(Operand::Literal(Literal::Interval(expr.to_string()))),

            sp::Expr::Subquery(query) => Ok(Operand::Subquery(Box::new(Self::convert_query(query)?))),

            sp::Expr::Nested(inner) => match inner.as_ref() {
                sp::Expr::Subquery(_) | sp::Expr::Identifier(_) | sp::Expr::CompoundIdentifier(_) | sp::Expr::Value(_) => {
                    Self::convert_operand(inner)
                }
                _ => Ok(Operand::Opaque(expr.to_string())),
            },

            other => Ok(Operand::Opaque(other.to_string())),
        }
    }

    fn convert_value(value: &sp::Value) -> Operand {
        match value {
            sp::Value::Number(n, _) => Operand::Literal(Literal::Number(n.clone())),
            sp::Value::SingleQuotedString(s) => Operand::Literal(Literal::Text(s.clone())),
            sp::Value::Boolean(b) => Operand::Literal(Literal::Boolean(*b)),
            sp::Value::Null => Operand::Literal(Literal::Null),
            other => Operand::Opaque(other.to_string()),
        }
    }

    fn extract_table_name(name: &sp::ObjectName) -> ParseResult<String> {
        // Plans report the bare relation name, so drop any schema prefix.
        name.0.last()
            .map(|i| i.as_ident().map(|id| id.value.clone()).unwrap_or_else(|| i.to_string()))
            .ok_or_else(|| ParseError::InvalidIdentifier("empty table name".into()))
    }
}

/// Extract the text between the first and last single quote, undoing
/// doubled-quote escapes.
fn quoted_body(text: &str) -> Option<String> {
    let start = text.find('\'')?;
    let end = text.rfind('\'')?;
    if end <= start {
        return None;
    }
    Some(text[start + 1..end].replace("''", "'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn where_of(sql: &str) -> Condition {
        Parser::parse(sql).unwrap().selection.expect("where clause")
    }

    #[test]
    fn test_parse_single_relation() {
        let query = Parser::parse("select * from nation").unwrap();
        assert_eq!(query.projection, vec![Operand::Opaque("*".into())]);
        match query.from {
            Some(FromRegion::Single(FromItem::Relation { name, alias, .. })) => {
                assert_eq!(name, "nation");
                assert!(alias.is_none());
            }
            other => panic!("Expected single relation, got {:?}", other),
        }
        assert!(query.selection.is_none());
    }

    #[test]
    fn test_parse_relation_list_with_alias() {
        let query = Parser::parse("select * from nation as n1, nation n2").unwrap();
        match query.from {
            Some(FromRegion::List(items)) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].reference_name(), Some("n1"));
                assert_eq!(items[1].reference_name(), Some("n2"));
            }
            other => panic!("Expected relation list, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_schema_qualified_relation() {
        let query = Parser::parse("select * from public.nation").unwrap();
        assert!(matches!(
            query.from,
            Some(FromRegion::Single(FromItem::Relation { ref name, .. })) if name == "nation"
        ));
    }

    #[test]
    fn test_parse_derived_table() {
        let query = Parser::parse(
            "select * from customer as c, (select * from nation as n where n.n_regionkey = 0) as n",
        ).unwrap();
        match query.from {
            Some(FromRegion::List(items)) => match &items[1] {
                FromItem::Subquery { query, alias, .. } => {
                    assert_eq!(alias.as_deref(), Some("n"));
                    assert!(query.selection.is_some());
                }
                other => panic!("Expected subquery, got {:?}", other),
            },
            other => panic!("Expected relation list, got {:?}", other),
        }
    }

    #[test]
    fn test_flattens_and_chain() {
        let cond = where_of("select * from t where a = 1 and b > 2 and c < 3");
        match cond {
            Condition::Conjunction { kind, children, .. } => {
                assert_eq!(kind, ConjunctionKind::And);
                assert_eq!(children.len(), 3);
            }
            other => panic!("Expected conjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_mixed_and_or_keeps_structure() {
        let cond = where_of("select * from t where a = 1 and (b = 2 or c = 3)");
        match cond {
            Condition::Conjunction { kind: ConjunctionKind::And, children, .. } => {
                assert_eq!(children.len(), 2);
                assert!(matches!(
                    &children[1],
                    Condition::Conjunction { kind: ConjunctionKind::Or, children, .. } if children.len() == 2
                ));
            }
            other => panic!("Expected conjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_comparison_operands() {
        let cond = where_of("select * from nation where nation.n_regionkey = 0");
        match cond {
            Condition::Comparison { op, lhs, rhs, .. } => {
                assert_eq!(op, CompareOp::Eq);
                assert_eq!(lhs, Operand::column("nation.n_regionkey"));
                assert_eq!(rhs, Operand::number(0));
            }
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_like_and_not_like() {
        assert!(matches!(
            where_of("select * from part where p_type like '%brass'"),
            Condition::Comparison { op: CompareOp::Like, .. }
        ));
        assert!(matches!(
            where_of("select * from part where p_type not like '%brass'"),
            Condition::Comparison { op: CompareOp::NotLike, .. }
        ));
    }

    #[test]
    fn test_between() {
        match where_of("select * from t where a between 1 and 5") {
            Condition::Between { value, lo, hi, .. } => {
                assert_eq!(value, Operand::column("a"));
                assert_eq!(lo, Operand::number(1));
                assert_eq!(hi, Operand::number(5));
            }
            other => panic!("Expected between, got {:?}", other),
        }
        assert!(matches!(
            where_of("select * from t where a not between 1 and 5"),
            Condition::Not { .. }
        ));
    }

    #[test]
    fn test_exists_and_in_subquery() {
        assert!(matches!(
            where_of("select * from orders where exists (select * from lineitem where l_orderkey = o_orderkey)"),
            Condition::Exists { .. }
        ));
        match where_of("select * from supplier where s_nationkey in (select n_nationkey from nation)") {
            Condition::Membership { kind, set: MembershipSet::Subquery(q), .. } => {
                assert_eq!(kind, MembershipKind::In);
                assert_eq!(q.projection, vec![Operand::column("n_nationkey")]);
            }
            other => panic!("Expected membership, got {:?}", other),
        }
    }

    #[test]
    fn test_in_list() {
        match where_of("select * from t where a not in (1, 2)") {
            Condition::Membership { kind, set: MembershipSet::List(items), .. } => {
                assert_eq!(kind, MembershipKind::NotIn);
                assert_eq!(items.len(), 2);
            }
            other => panic!("Expected membership, got {:?}", other),
        }
    }

    #[test]
    fn test_computed_operand_is_opaque() {
        match where_of("select * from lineitem where l_shipdate <= date '1998-12-01' + interval '-90 day'") {
            Condition::Comparison { rhs, .. } => assert!(matches!(rhs, Operand::Opaque(_))),
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_typed_string_is_text_literal() {
        match where_of("select * from orders where o_orderdate >= date '1993-07-01'") {
            Condition::Comparison { rhs, .. } => assert_eq!(rhs, Operand::text("1993-07-01")),
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_scalar_subquery_operand() {
        match where_of("select * from nation where n_nationkey = (select max(n_nationkey) from nation)") {
            Condition::Comparison { rhs: Operand::Subquery(q), .. } => {
                assert!(q.from.is_some());
            }
            other => panic!("Expected scalar subquery, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_shapes_become_unrecognized() {
        assert!(matches!(
            where_of("select * from t where a is null"),
            Condition::Unrecognized { .. }
        ));
    }

    #[test]
    fn test_rejects_explicit_join() {
        let err = Parser::parse("select * from a join b on a.x = b.x").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFrom(_)));
    }

    #[test]
    fn test_rejects_non_select() {
        assert!(matches!(
            Parser::parse("delete from t").unwrap_err(),
            ParseError::UnsupportedStatement(_)
        ));
        assert!(matches!(
            Parser::parse("select 1; select 2").unwrap_err(),
            ParseError::MultipleStatements
        ));
    }

    #[test]
    fn test_empty_query() {
        assert!(matches!(Parser::parse("").unwrap_err(), ParseError::EmptyQuery));
        assert!(matches!(Parser::parse("   ").unwrap_err(), ParseError::EmptyQuery));
    }

    #[test]
    fn test_quoted_body() {
        assert_eq!(quoted_body("DATE '1998-12-01'").as_deref(), Some("1998-12-01"));
        assert_eq!(quoted_body("'it''s'").as_deref(), Some("it's"));
        assert_eq!(quoted_body("no quotes"), None);
    }
}
