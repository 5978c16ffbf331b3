use log::debug;

use super::{ask, compile, Checker, CheckerKind, Outcome, Verdict};
use crate::abstraction::abstract_network;
use crate::error::Result;
use crate::expr::Expr;
use crate::network::Network;
use crate::oracle::{Oracle, Query, TraceKind};
use crate::replay::Replay;

/// Exact reachability on the abstracted network.
#[derive(Debug, Default, Copy, Clone)]
pub struct SymbolicChecker;

impl SymbolicChecker {
    pub fn query(condition: &Expr) -> Query {
        Query::new(format!("E<> ({})", condition)).with_trace(TraceKind::Fastest)
    }
}

impl Checker for SymbolicChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Symbolic
    }

    fn is_reachable(&self, oracle: &mut dyn Oracle, network: &Network, condition: &Expr) -> Result<Outcome> {
        let mut network = network.clone();
        let hidden = abstract_network(&mut network);
        debug!("symbolic: hid {:?}", hidden);

        let model = compile(oracle, &network)?;
        let query = SymbolicChecker::query(condition);
        let Some(answer) = ask(oracle, &model, &query)? else {
            return Ok(Outcome::new(Verdict::MaybeReachable));
        };

        let replay = answer
            .trace
            .map(|trace| Replay::symbolic(&query.formula, &model.document, trace));
        Ok(Outcome::new(Verdict::from_status(answer.status)).with_replay(replay))
    }
}
