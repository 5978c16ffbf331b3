//! # nsta-rs: Property validation for networks of stochastic timed automata
//!
//! **`nsta-rs`** checks safety properties of UPPAAL-style networks of timed automata with
//! probabilistic branching. It does not explore state spaces itself: it rewrites the network,
//! hands it to an external verification engine (the *oracle*), and interprets the answers.
//!
//! ## What is checked?
//!
//! A property is translated into a *violation condition*: a state predicate that holds exactly
//! when the property is broken. A property is **satisfied** iff its violation condition is
//! **unreachable**. Conditions can mention auxiliary automata and variables added to a private
//! copy of the network, so the caller's model is never changed.
//!
//! ## Key Features
//!
//! - **Three checkers**: exact reachability on an abstracted network ([`SymbolicChecker`][crate::checker::SymbolicChecker]),
//!   statistical simulation on the real network ([`ConcreteChecker`][crate::checker::ConcreteChecker]),
//!   and a combination that replays an abstract witness on the real network ([`ConcolicChecker`][crate::checker::ConcolicChecker]).
//! - **Sound abstraction**: non-integer data and probabilistic weights are hidden, so every
//!   behavior of the real network is a behavior of the abstraction.
//! - **Instrumentation toolkit**: observer automata, priority channels, time cutoffs, missed-sync
//!   counters and location-coverage flags.
//! - **Pluggable oracle**: the `verifyta` command line tool in production, a scripted oracle in tests.
//!
//! ## Basic Usage
//!
//! ```rust
//! use nsta_rs::decl::{Type, Variable};
//! use nsta_rs::expr::{CompareOp, Expr};
//! use nsta_rs::network::{Edge, Location, Network, Template};
//! use nsta_rs::oracle::{ScriptedOracle, Status};
//! use nsta_rs::validate::{ValidationSpec, Validator};
//!
//! // 1. A one-process network: Idle --[x > 5]--> Done
//! let mut network = Network::default();
//! network.add_global_variable(Type::int(), Variable::new("x").with_init(Expr::int(0)));
//! let mut p = Template::new("P");
//! let idle = p.add_location(Location::new("Idle"));
//! let done = p.add_location(Location::new("Done"));
//! p.set_initial(idle);
//! p.add_edge(Edge::new(idle, done).with_guard(Expr::compare(CompareOp::Gt, Expr::ident("x"), Expr::int(5))));
//! network.add_template(p);
//! network.instantiate("P");
//!
//! // 2. An oracle; here one that reports every reachability query as unsatisfiable
//! let mut oracle = ScriptedOracle::new().status("E<>", Status::NotOk);
//!
//! // 3. The checks to run
//! let spec = ValidationSpec::from_json(r#"{
//!     "checks": [ { "type": "condition", "condition": "P.Done" } ]
//! }"#).unwrap();
//!
//! // 4. Validate
//! let results = Validator::new(&mut oracle).run(&network, &spec).unwrap();
//! let result = results[0].as_ref().unwrap();
//! assert!(result.satisfied);
//! assert_eq!(result.message, "Property not reachable.");
//! ```
//!
//! ## Core Components
//!
//! - **[`network`]**: The model: templates, locations, edges and the system line.
//! - **[`abstraction`]**: The over-approximating abstraction pass.
//! - **[`instrument`]**: Building blocks for property translation.
//! - **[`property`]**: The property kinds and their translations.
//! - **[`checker`]**: The three reachability checkers.
//! - **[`oracle`]**: The interface to the verification engine.
//! - **[`validate`]**: Batch runs over a JSON list of checks.
//! - **[`dot`]**: Utilities for visualizing networks using Graphviz.
//!
//! For how verdicts are derived, check the [`checker`] module documentation.

pub mod abstraction;
pub mod checker;
pub mod decl;
pub mod dot;
pub mod error;
pub mod eval;
pub mod expr;
pub mod instrument;
pub mod network;
pub mod ops;
pub mod oracle;
pub mod property;
pub mod replay;
pub mod serialize;
pub mod types;
pub mod validate;
