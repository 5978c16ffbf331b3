//! Reachability checkers.
//!
//! A checker answers "can the network reach a state satisfying this
//! condition?" with a [`Verdict`] and, when the oracle produced a witness,
//! a [`Replay`].
//!
//! | Checker | Model | Query | Sound for |
//! |---------|-------|-------|-----------|
//! | [`SymbolicChecker`] | abstracted | `E<> (φ)` | UNREACHABLE |
//! | [`ConcreteChecker`] | full | `simulate [<=T;N] ... (φ)` | REACHABLE |
//! | [`ConcolicChecker`] | both | symbolic witness steering simulation | UNREACHABLE, REACHABLE |
//!
//! # Failures
//!
//! A model that does not compile yields [`Error::Compile`]: there is no
//! verdict, which callers must not confuse with UNREACHABLE. An oracle
//! call that fails ambiguously (garbled output, transport trouble after
//! the model compiled) is logged and degrades to MAYBE_REACHABLE. An
//! aborted call yields [`Error::Cancelled`].

mod concolic;
mod concrete;
mod symbolic;

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::network::Network;
use crate::oracle::{CompiledModel, Oracle, OracleError, Query, QueryOutcome, Status};
use crate::replay::Replay;

pub use concolic::{constrain, ConcolicChecker, GLOBAL_CLOCK, TRANSITION_COUNTER};
pub use concrete::ConcreteChecker;
pub use symbolic::SymbolicChecker;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Reachable,
    Unreachable,
    MaybeReachable,
}

impl Verdict {
    /// `Ok` is reachable, `NotOk` unreachable, anything else undecided.
    pub fn from_status(status: Status) -> Self {
        match status {
            Status::Ok => Verdict::Reachable,
            Status::NotOk => Verdict::Unreachable,
            Status::Inconclusive => Verdict::MaybeReachable,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Reachable => "REACHABLE",
            Verdict::Unreachable => "UNREACHABLE",
            Verdict::MaybeReachable => "MAYBE_REACHABLE",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub verdict: Verdict,
    pub replay: Option<Replay>,
}

impl Outcome {
    pub fn new(verdict: Verdict) -> Self {
        Outcome { verdict, replay: None }
    }

    pub fn with_replay(mut self, replay: Option<Replay>) -> Self {
        self.replay = replay;
        self
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckerKind {
    #[default]
    Symbolic,
    Concrete,
    Concolic,
}

impl CheckerKind {
    pub const ALL: [CheckerKind; 3] = [CheckerKind::Symbolic, CheckerKind::Concrete, CheckerKind::Concolic];

    pub fn name(self) -> &'static str {
        match self {
            CheckerKind::Symbolic => "symbolic",
            CheckerKind::Concrete => "concrete",
            CheckerKind::Concolic => "concolic",
        }
    }
}

impl fmt::Display for CheckerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CheckerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CheckerKind::ALL
            .into_iter()
            .find(|k| k.name() == s.trim())
            .ok_or_else(|| Error::UnknownChecker(s.to_string()))
    }
}

/// Model-checker configuration. These are never property parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerOptions {
    /// Time horizon of statistical simulation.
    pub simulation_time: u32,
    /// Number of simulated runs.
    pub simulation_runs: u32,
    /// Per-edge firing bound for coverage exploration; `0` disables it.
    pub state_space_bound: u32,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        CheckerOptions {
            simulation_time: 66,
            simulation_runs: 1000,
            state_space_bound: 0,
        }
    }
}

pub trait Checker {
    fn kind(&self) -> CheckerKind;

    /// Decides whether `network` can reach a state satisfying `condition`.
    /// The network is not modified; checkers work on clones.
    fn is_reachable(&self, oracle: &mut dyn Oracle, network: &Network, condition: &Expr) -> Result<Outcome>;
}

pub fn checker(kind: CheckerKind, options: &CheckerOptions) -> Box<dyn Checker> {
    match kind {
        CheckerKind::Symbolic => Box::new(SymbolicChecker),
        CheckerKind::Concrete => Box::new(ConcreteChecker::new(options.clone())),
        CheckerKind::Concolic => Box::new(ConcolicChecker::new(options.clone())),
    }
}

/// Reconnects, then compiles. Compiler rejection has no verdict.
pub fn compile(oracle: &mut dyn Oracle, network: &Network) -> Result<CompiledModel> {
    oracle.reconnect().map_err(lift)?;
    let model = oracle.compile(network).map_err(lift)?;
    for warning in &model.warnings {
        warn!("{}", warning);
    }
    Ok(model)
}

/// Issues `query`. `Ok(None)` means the call failed ambiguously and the
/// caller should fall back to MAYBE_REACHABLE.
pub fn ask(oracle: &mut dyn Oracle, model: &CompiledModel, query: &Query) -> Result<Option<QueryOutcome>> {
    debug!("ask({})", query);
    match oracle.query(model, query) {
        Ok(outcome) => {
            debug!("ask: {}", outcome.status);
            Ok(Some(outcome))
        }
        Err(OracleError::Cancelled) => Err(Error::Cancelled),
        Err(e) => {
            warn!("query `{}` failed: {}", query, e);
            Ok(None)
        }
    }
}

fn lift(e: OracleError) -> Error {
    match e {
        OracleError::Compile(problems) => Error::Compile(problems),
        OracleError::Cancelled => Error::Cancelled,
        other => Error::Oracle(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_checker_kind_from_str() {
        assert_eq!("symbolic".parse::<CheckerKind>().unwrap(), CheckerKind::Symbolic);
        assert_eq!("concolic".parse::<CheckerKind>().unwrap(), CheckerKind::Concolic);
        assert!(matches!("smc".parse::<CheckerKind>(), Err(Error::UnknownChecker(s)) if s == "smc"));
    }

    #[test]
    fn test_verdict_from_status() {
        assert_eq!(Verdict::from_status(Status::Ok), Verdict::Reachable);
        assert_eq!(Verdict::from_status(Status::NotOk), Verdict::Unreachable);
        assert_eq!(Verdict::from_status(Status::Inconclusive), Verdict::MaybeReachable);
    }

    #[test]
    fn test_default_options() {
        let options: CheckerOptions = serde_json::from_str("{\"simulation_runs\": 10}").unwrap();
        assert_eq!(options.simulation_time, 66);
        assert_eq!(options.simulation_runs, 10);
        assert_eq!(options.state_space_bound, 0);
    }

    #[test]
    fn test_checker_factory() {
        for kind in CheckerKind::ALL {
            assert_eq!(checker(kind, &CheckerOptions::default()).kind(), kind);
        }
    }
}
