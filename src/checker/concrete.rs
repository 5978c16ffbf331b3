use super::{ask, compile, Checker, CheckerKind, CheckerOptions, Outcome, Verdict};
use crate::error::Result;
use crate::expr::Expr;
use crate::network::Network;
use crate::oracle::{Oracle, Query};
use crate::replay::Replay;

/// Statistical simulation on the full network, stopping at the first run
/// that satisfies the condition.
#[derive(Debug, Default, Clone)]
pub struct ConcreteChecker {
    options: CheckerOptions,
}

impl ConcreteChecker {
    pub fn new(options: CheckerOptions) -> Self {
        ConcreteChecker { options }
    }

    /// `simulate [<=T;N] {observed} :1: (φ)`
    pub fn query(options: &CheckerOptions, observed: &str, condition: &Expr) -> Query {
        Query::new(format!(
            "simulate [<={};{}] {{{}}} :1: ({})",
            options.simulation_time, options.simulation_runs, observed, condition
        ))
    }
}

impl Checker for ConcreteChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Concrete
    }

    fn is_reachable(&self, oracle: &mut dyn Oracle, network: &Network, condition: &Expr) -> Result<Outcome> {
        let model = compile(oracle, network)?;
        let query = ConcreteChecker::query(&self.options, "0", condition);
        let Some(answer) = ask(oracle, &model, &query)? else {
            return Ok(Outcome::new(Verdict::MaybeReachable));
        };

        let replay = answer
            .samples
            .map(|samples| Replay::concrete(&query.formula, &model.document, samples));
        Ok(Outcome::new(Verdict::from_status(answer.status)).with_replay(replay))
    }
}
