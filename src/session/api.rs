//! Annotation session - the end-to-end pipeline.

use log::{debug, info};

use super::error::{FailureContext, SessionError, SessionResult};
use super::render::render;
use crate::annotate::{CoverageCounters, QueryAnnotator};
use crate::catalog::{CatalogProvider, ColumnResolver, ResolveReport};
use crate::plan::{PlanNode, PlanProvider};
use crate::sql::{lowercase_unquoted, split_statements, Parser, Query};

/// Session configuration options.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fold unquoted query text to lower case before parsing and planning.
    pub lowercase_input: bool,
    /// Qualify bare column names when a catalog is available.
    pub resolve_columns: bool,
    /// Match `BETWEEN` as `>=`/`<=` instead of strict comparisons.
    pub inclusive_between: bool,
    /// Log each query and plan at `info`.
    pub verbose: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lowercase_input: true,
            resolve_columns: true,
            inclusive_between: false,
            verbose: false,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set lowercase_input flag.
    pub fn lowercase_input(mut self, value: bool) -> Self {
        self.lowercase_input = value;
        self
    }

    /// Set resolve_columns flag.
    pub fn resolve_columns(mut self, value: bool) -> Self {
        self.resolve_columns = value;
        self
    }

    /// Set inclusive_between flag.
    pub fn inclusive_between(mut self, value: bool) -> Self {
        self.inclusive_between = value;
        self
    }

    /// Set verbose flag.
    pub fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// The text a session parses and plans for `sql`.
    pub fn query_text(&self, sql: &str) -> String {
        if self.lowercase_input {
            lowercase_unquoted(sql)
        } else {
            sql.to_string()
        }
    }
}

/// The result of annotating one query.
#[derive(Debug, Clone)]
pub struct AnnotatedQuery {
    /// Query text as parsed and sent to the plan provider.
    pub sql: String,
    pub query: Query,
    pub plan: PlanNode,
    pub coverage: CoverageCounters,
    /// Present when column resolution ran.
    pub resolve: Option<ResolveReport>,
}

impl AnnotatedQuery {
    /// Line-broken query text with annotations as comments.
    pub fn render(&self) -> String {
        render(&self.query)
    }

    /// Every annotation, in tree order.
    pub fn annotations(&self) -> Vec<&str> {
        self.query.annotations()
    }
}

/// Ties a plan source, an optional catalog, and the annotator together.
pub struct Session<P: PlanProvider> {
    config: SessionConfig,
    plans: P,
    catalog: Option<Box<dyn CatalogProvider>>,
    annotator: QueryAnnotator,
}

impl<P: PlanProvider> Session<P> {
    /// Create a session with default configuration and no catalog.
    pub fn new(plans: P) -> Self {
        Self::with_config(plans, SessionConfig::default())
    }

    /// Create a session with custom configuration.
    pub fn with_config(plans: P, config: SessionConfig) -> Self {
        let annotator = QueryAnnotator::new().inclusive_between(config.inclusive_between);
        Self {
            config,
            plans,
            catalog: None,
            annotator,
        }
    }

    /// Use `catalog` for column resolution.
    pub fn with_catalog(mut self, catalog: impl CatalogProvider + 'static) -> Self {
        self.catalog = Some(Box::new(catalog));
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Normalize and parse `sql`, and qualify its columns. Returns the text
    /// that was parsed alongside the tree.
    pub fn prepare(&self, sql: &str) -> SessionResult<(String, Query, Option<ResolveReport>)> {
        let text = self.config.query_text(sql);
        let mut query = Parser::parse(&text)?;

        let resolve = match (&self.catalog, self.config.resolve_columns) {
            (Some(catalog), true) => Some(ColumnResolver::new(catalog.as_ref()).resolve(&mut query)?),
            _ => None,
        };
        Ok((text, query, resolve))
    }

    /// Annotate one query with its execution plan.
    pub fn annotate(&self, sql: &str) -> SessionResult<AnnotatedQuery> {
        let (text, mut query, resolve) = self.prepare(sql)?;
        if self.config.verbose {
            info!("[SQL] {}", text);
        }

        let plan = self.plans.explain(&text)?;
        if self.config.verbose {
            info!("[Plan]\n{}", plan);
        }

        let coverage = match self.annotator.annotate(&mut query, &plan) {
            Ok(coverage) => coverage,
            Err(source) => {
                return Err(SessionError::Annotate {
                    source,
                    context: Box::new(FailureContext { sql: text, query, plan }),
                })
            }
        };
        debug!("coverage: {}", coverage);

        Ok(AnnotatedQuery {
            sql: text,
            query,
            plan,
            coverage,
            resolve,
        })
    }

    /// Annotate every `;`-separated statement of `script`. Each statement
    /// gets its own result; the caller decides whether to skip or abort.
    pub fn annotate_batch(&self, script: &str) -> Vec<SessionResult<AnnotatedQuery>> {
        split_statements(script)
            .into_iter()
            .map(|sql| self.annotate(sql))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::AnnotateError;
    use crate::catalog::StaticCatalog;
    use crate::plan::{PlanError, PlanResult, PlanSet, StaticPlan};

    fn scenario_plan() -> PlanNode {
        PlanNode::new("Hash Join")
            .with_hash_cond("(nation.n_regionkey = region.r_regionkey)")
            .with_child(PlanNode::scan("Seq Scan", "nation").with_filter("(nation.n_regionkey = 0)"))
            .with_child(PlanNode::new("Hash").with_child(PlanNode::scan("Seq Scan", "region")))
    }

    fn tpch_catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with_table("nation", ["n_nationkey", "n_name", "n_regionkey"])
            .with_table("region", ["r_regionkey", "r_name"])
    }

    #[test]
    fn test_annotate_end_to_end() {
        let session = Session::new(StaticPlan::new(scenario_plan())).with_catalog(tpch_catalog());

        let result = session
            .annotate("SELECT * FROM Nation, Region WHERE N_REGIONKEY = R_REGIONKEY AND N_REGIONKEY = 0")
            .unwrap();

        assert_eq!(result.sql, "select * from nation, region where n_regionkey = r_regionkey and n_regionkey = 0");
        assert_eq!(
            result.annotations(),
            vec![
                "Seq Scan nation",
                "Seq Scan region",
                "Hash Join on (nation.n_regionkey = region.r_regionkey)",
                "Filtered on Seq Scan of nation",
            ]
        );
        assert_eq!(result.coverage.matched, 4);
        assert_eq!(result.resolve.as_ref().map(|r| r.rewritten), Some(3));
        assert!(result.render().contains("  AND nation.n_regionkey = 0  -- Filtered on Seq Scan of nation\n"));
    }

    #[test]
    fn test_without_catalog_bare_columns_do_not_match() {
        let session = Session::new(StaticPlan::new(scenario_plan()));
        let result = session
            .annotate("select * from nation, region where n_regionkey = r_regionkey")
            .unwrap();

        assert!(result.resolve.is_none());
        assert_eq!(result.annotations(), vec!["Seq Scan nation", "Seq Scan region"]);
    }

    #[test]
    fn test_resolution_can_be_disabled() {
        let config = SessionConfig::new().resolve_columns(false);
        let session = Session::with_config(StaticPlan::new(scenario_plan()), config).with_catalog(tpch_catalog());

        let (_, query, resolve) = session.prepare("select * from nation where n_regionkey = 0").unwrap();
        assert!(resolve.is_none());
        assert_eq!(query.selection.unwrap().to_string(), "n_regionkey = 0");
    }

    #[test]
    fn test_no_lowercase() {
        let config = SessionConfig::new().lowercase_input(false);
        let session = Session::with_config(StaticPlan::new(scenario_plan()), config);

        let (text, _, _) = session.prepare("SELECT * FROM Nation").unwrap();
        assert_eq!(text, "SELECT * FROM Nation");
    }

    #[test]
    fn test_failure_carries_context() {
        let plan = PlanNode::new("Nested Loop")
            .with_child(PlanNode::scan("Seq Scan", "a").with_output(["a.x", "a.y"]))
            .with_child(PlanNode::scan("Seq Scan", "b").with_output(["b.x", "b.y"]));
        let session = Session::new(StaticPlan::new(plan));

        let err = session.annotate("select * from a, b where a.x = b.x and a.y = b.y").unwrap_err();
        match &err {
            SessionError::Annotate { source, context } => {
                assert!(matches!(source, AnnotateError::AmbiguousHeuristicMatch { .. }));
                assert!(context.query.annotations().is_empty());
                assert_eq!(context.plan.node_type, "Nested Loop");
            }
            other => panic!("Expected annotate error, got {:?}", other),
        }
        assert!(err.context().is_some());
        assert!(err.to_string().starts_with("annotation failed for `select * from a, b"));
    }

    #[test]
    fn test_parse_error_surfaces() {
        let session = Session::new(StaticPlan::new(scenario_plan()));
        assert!(matches!(session.annotate("delete from nation"), Err(SessionError::Parse(_))));
    }

    #[test]
    fn test_annotate_batch_keeps_going() {
        let provider = |sql: &str| -> PlanResult<PlanNode> {
            let relation = if sql.contains("region") { "region" } else { "nation" };
            Ok(PlanNode::scan("Seq Scan", relation))
        };
        let session = Session::new(provider);

        let results = session.annotate_batch("select * from nation; update t set x = 1; select * from region;");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().annotations(), vec!["Seq Scan nation"]);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().annotations(), vec!["Seq Scan region"]);
    }

    #[test]
    fn test_inclusive_between_config() {
        let plan = PlanNode::scan("Seq Scan", "lineitem")
            .with_filter("((lineitem.l_quantity >= 1) AND (lineitem.l_quantity <= 10))");
        let config = SessionConfig::new().inclusive_between(true);
        let session = Session::with_config(StaticPlan::new(plan), config);

        let result = session
            .annotate("select * from lineitem where lineitem.l_quantity between 1 and 10")
            .unwrap();
        assert_eq!(result.coverage.matched, 2);
    }

    #[test]
    fn test_batch_with_plan_per_statement() {
        let config = SessionConfig::new();
        let plans = PlanSet::new()
            .with_plan(&config.query_text("SELECT * FROM Nation"), PlanNode::scan("Seq Scan", "nation"))
            .with_plan(&config.query_text("SELECT * FROM Region"), PlanNode::scan("Index Scan", "region"));
        let session = Session::with_config(plans, config);

        let results = session.annotate_batch("SELECT * FROM Nation; SELECT * FROM Region; SELECT * FROM Orders");
        assert_eq!(results[0].as_ref().unwrap().annotations(), vec!["Seq Scan nation"]);
        assert_eq!(results[1].as_ref().unwrap().annotations(), vec!["Index Scan region"]);
        assert!(matches!(results[2], Err(SessionError::Plan(PlanError::Provider(_)))));
    }
}
