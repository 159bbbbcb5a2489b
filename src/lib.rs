//! planlens - annotate SQL queries with their execution plans
//!
//! Matches the nodes of a PostgreSQL execution plan against the FROM and
//! WHERE structure of the query it was produced for, and writes onto each
//! relation and condition the operator that realized it: "this filter
//! became an index scan", "this predicate became a hash join".
//!
//! # Example
//!
//! ```no_run
//! use planlens::plan::StaticPlan;
//! use planlens::session::Session;
//!
//! let plans = StaticPlan::from_json_file("plan.json").unwrap();
//! let session = Session::new(plans);
//! let result = session.annotate("SELECT * FROM nation WHERE nation.n_regionkey = 0").unwrap();
//! print!("{}", result.render());
//! ```

pub mod annotate;
pub mod catalog;
pub mod plan;
pub mod session;
pub mod sql;
