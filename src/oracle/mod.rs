//! The verification oracle.
//!
//! The oracle compiles a [`Network`] and answers two families of queries
//! over the compiled model:
//!
//! | Family | Example | Trace |
//! |--------|---------|-------|
//! | exact reachability | `E<> (P.Done)`, `A[] not (x > 5)` | [`SymbolicTrace`] |
//! | statistical simulation | `simulate [<=66;1000] {0} :1: (P.Done)` | [`ConcreteTrace`] |
//!
//! Both families report a [`Status`]. The checkers in
//! [`checker`][crate::checker] map statuses to verdicts; the oracle itself
//! never interprets them.
//!
//! # Implementations
//!
//! | Implementation | Backend | Use Case |
//! |----------------|---------|----------|
//! | [`VerifytaOracle`] | the `verifyta` command line tool | Production |
//! | [`ScriptedOracle`] | canned replies | Tests, dry runs |
//!
//! # Connection discipline
//!
//! The oracle is one shared external resource. Callers [`reconnect`]
//! before every compile to clear state left by a previous (possibly
//! aborted) call. All calls are blocking; an in-flight call can be
//! interrupted from another thread through the [`AbortHandle`].
//!
//! [`reconnect`]: Oracle::reconnect

mod scripted;
mod trace;
pub mod verifyta;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Problem;
use crate::network::{Network, Process};

pub use scripted::{Reply, ScriptedOracle};
pub use trace::{ConcreteTrace, ProcessLocation, Series, State, SymbolicTrace, Transition, TransitionEdge};
pub use verifyta::VerifytaOracle;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("oracle executable not found: {0}")]
    NotFound(String),
    #[error("model rejected by the oracle's compiler")]
    Compile(Vec<Problem>),
    #[error("oracle call aborted")]
    Cancelled,
    #[error("unexpected oracle response: {0}")]
    UnexpectedResponse(String),
}

/// Oracle answer to a query.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Ok,
    NotOk,
    /// The engine could not decide, e.g. an exhausted sampling budget or an
    /// approximate result.
    Inconclusive,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ok => "OK",
            Status::NotOk => "NOT_OK",
            Status::Inconclusive => "INCONCLUSIVE",
        })
    }
}

/// Which witness an exact query should produce.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceKind {
    #[default]
    None,
    Some,
    Shortest,
    Fastest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub formula: String,
    pub trace: TraceKind,
}

impl Query {
    pub fn new(formula: impl Into<String>) -> Self {
        Query {
            formula: formula.into(),
            trace: TraceKind::None,
        }
    }

    pub fn with_trace(mut self, trace: TraceKind) -> Self {
        self.trace = trace;
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formula)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub status: Status,
    /// Witness of an exact query.
    pub trace: Option<SymbolicTrace>,
    /// Sampled runs of a simulation query.
    pub samples: Option<ConcreteTrace>,
}

impl QueryOutcome {
    pub fn new(status: Status) -> Self {
        QueryOutcome {
            status,
            trace: None,
            samples: None,
        }
    }

    pub fn with_trace(mut self, trace: SymbolicTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn with_samples(mut self, samples: ConcreteTrace) -> Self {
        self.samples = Some(samples);
        self
    }
}

/// A network accepted by the oracle's compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModel {
    /// The network as it was compiled.
    pub network: Network,
    /// The interchange document handed to the compiler.
    pub document: String,
    pub processes: Vec<Process>,
    /// Non-fatal diagnostics.
    pub warnings: Vec<Problem>,
}

impl CompiledModel {
    /// Number of processes instantiated from the template named `template`.
    pub fn instance_count(&self, template: &str) -> usize {
        self.processes
            .iter()
            .filter(|p| self.network.template(p.template).name == template)
            .count()
    }

    /// Template name of the process called `process`.
    pub fn template_of(&self, process: &str) -> Option<&str> {
        self.processes
            .iter()
            .find(|p| p.name == process)
            .map(|p| self.network.template(p.template).name.as_str())
    }
}

/// Cloneable handle that aborts the oracle call in flight.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears a previous abort request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub trait Oracle {
    /// Drops state left by earlier calls.
    fn reconnect(&mut self) -> Result<(), OracleError>;

    fn compile(&mut self, network: &Network) -> Result<CompiledModel, OracleError>;

    fn query(&mut self, model: &CompiledModel, query: &Query) -> Result<QueryOutcome, OracleError>;

    fn abort_handle(&self) -> AbortHandle;
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::network::{Location, Template};

    use test_log::test;

    #[test]
    fn test_abort_handle_is_shared() {
        let handle = AbortHandle::new();
        let other = handle.clone();
        other.abort();
        assert!(handle.is_aborted());
        handle.reset();
        assert!(!other.is_aborted());
    }

    #[test]
    fn test_instance_count() {
        let mut network = Network::default();
        let mut t = Template::new("T");
        let l = t.add_location(Location::new("L"));
        t.set_initial(l);
        let id = network.add_template(t);
        let model = CompiledModel {
            network,
            document: String::new(),
            processes: (0..3)
                .map(|i| Process {
                    name: format!("T({})", i),
                    template: id,
                })
                .collect(),
            warnings: Vec::new(),
        };
        assert_eq!(model.instance_count("T"), 3);
        assert_eq!(model.instance_count("U"), 0);
        assert_eq!(model.template_of("T(2)"), Some("T"));
    }
}
