//! An oracle answering from a script.
//!
//! Compilation runs the structural checks of [`Network::validate`] and the
//! process expansion, so instrumentation that leaves a dangling identifier
//! is still caught. Queries are answered by the first rule whose pattern
//! occurs in the query formula; a query no rule matches is inconclusive.
//! Every compiled network and every query is recorded for inspection.

use log::debug;

use super::{AbortHandle, CompiledModel, Oracle, OracleError, Query, QueryOutcome, Status, SymbolicTrace};
use crate::error::Problem;
use crate::network::Network;
use crate::serialize::to_xml;

/// A scripted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Outcome(QueryOutcome),
    /// Behave as if the call had been aborted.
    Cancelled,
    /// Fail with [`OracleError::UnexpectedResponse`].
    Garbled(String),
}

struct Rule {
    pattern: String,
    reply: Reply,
    once: bool,
}

#[derive(Default)]
pub struct ScriptedOracle {
    rules: Vec<Rule>,
    rejection: Option<Vec<Problem>>,
    abort: AbortHandle,
    compiled: Vec<Network>,
    queries: Vec<Query>,
    reconnects: usize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every query containing `pattern`.
    pub fn reply(mut self, pattern: impl Into<String>, reply: Reply) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            reply,
            once: false,
        });
        self
    }

    /// Answers the next query containing `pattern`, then retires the rule.
    pub fn reply_once(mut self, pattern: impl Into<String>, reply: Reply) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            reply,
            once: true,
        });
        self
    }

    pub fn status(self, pattern: impl Into<String>, status: Status) -> Self {
        self.reply(pattern, Reply::Outcome(QueryOutcome::new(status)))
    }

    pub fn trace(self, pattern: impl Into<String>, status: Status, trace: SymbolicTrace) -> Self {
        self.reply(pattern, Reply::Outcome(QueryOutcome::new(status).with_trace(trace)))
    }

    /// Rejects every compilation with `problems`.
    pub fn rejecting(mut self, problems: Vec<Problem>) -> Self {
        self.rejection = Some(problems);
        self
    }

    pub fn compiled(&self) -> &[Network] {
        &self.compiled
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn formulas(&self) -> Vec<&str> {
        self.queries.iter().map(|q| q.formula.as_str()).collect()
    }

    pub fn reconnects(&self) -> usize {
        self.reconnects
    }
}

impl Oracle for ScriptedOracle {
    fn reconnect(&mut self) -> Result<(), OracleError> {
        self.reconnects += 1;
        Ok(())
    }

    fn compile(&mut self, network: &Network) -> Result<CompiledModel, OracleError> {
        if self.abort.is_aborted() {
            return Err(OracleError::Cancelled);
        }
        self.compiled.push(network.clone());
        if let Some(problems) = &self.rejection {
            return Err(OracleError::Compile(problems.clone()));
        }
        let (errors, warnings): (Vec<Problem>, Vec<Problem>) =
            network.validate().into_iter().partition(|p| p.is_error());
        if !errors.is_empty() {
            return Err(OracleError::Compile(errors));
        }
        let processes = network.processes().map_err(OracleError::Compile)?;
        Ok(CompiledModel {
            network: network.clone(),
            document: to_xml(network),
            processes,
            warnings,
        })
    }

    fn query(&mut self, _model: &CompiledModel, query: &Query) -> Result<QueryOutcome, OracleError> {
        if self.abort.is_aborted() {
            return Err(OracleError::Cancelled);
        }
        debug!("query({})", query.formula);
        self.queries.push(query.clone());
        let Some(index) = self.rules.iter().position(|r| query.formula.contains(&r.pattern)) else {
            return Ok(QueryOutcome::new(Status::Inconclusive));
        };
        let reply = if self.rules[index].once {
            self.rules.remove(index).reply
        } else {
            self.rules[index].reply.clone()
        };
        match reply {
            Reply::Outcome(outcome) => Ok(outcome),
            Reply::Cancelled => Err(OracleError::Cancelled),
            Reply::Garbled(text) => Err(OracleError::UnexpectedResponse(text)),
        }
    }

    fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::network::{Location, Template};

    use test_log::test;

    fn network() -> Network {
        let mut network = Network::default();
        let mut t = Template::new("P");
        let l = t.add_location(Location::new("Idle"));
        t.set_initial(l);
        network.add_template(t);
        network.instantiate("P");
        network
    }

    #[test]
    fn test_rules_match_by_substring() {
        let mut oracle = ScriptedOracle::new()
            .reply_once("E<>", Reply::Outcome(QueryOutcome::new(Status::NotOk)))
            .status("E<>", Status::Ok);
        let model = oracle.compile(&network()).unwrap();
        let q = Query::new("E<> (P.Idle)");
        assert_eq!(oracle.query(&model, &q).unwrap().status, Status::NotOk);
        assert_eq!(oracle.query(&model, &q).unwrap().status, Status::Ok);
        assert_eq!(oracle.query(&model, &Query::new("A[] true")).unwrap().status, Status::Inconclusive);
        assert_eq!(oracle.formulas(), vec!["E<> (P.Idle)", "E<> (P.Idle)", "A[] true"]);
    }

    #[test]
    fn test_compile_runs_structural_checks() {
        let mut oracle = ScriptedOracle::new();
        let mut broken = network();
        broken.instantiate("Nobody");
        assert!(matches!(oracle.compile(&broken), Err(OracleError::Compile(_))));
        assert_eq!(oracle.compiled().len(), 1);
    }

    #[test]
    fn test_rejecting() {
        let mut oracle = ScriptedOracle::new().rejecting(vec![Problem::error("system", "boom")]);
        assert!(matches!(oracle.compile(&network()), Err(OracleError::Compile(p)) if p.len() == 1));
    }

    #[test]
    fn test_abort() {
        let mut oracle = ScriptedOracle::new();
        let model = oracle.compile(&network()).unwrap();
        oracle.abort_handle().abort();
        assert!(matches!(oracle.query(&model, &Query::new("E<> true")), Err(OracleError::Cancelled)));
    }

    #[test]
    fn test_garbled() {
        let mut oracle = ScriptedOracle::new().reply("simulate", Reply::Garbled("???".to_string()));
        let model = oracle.compile(&network()).unwrap();
        let err = oracle.query(&model, &Query::new("simulate [<=1;1] {0} :1: true")).unwrap_err();
        assert!(matches!(err, OracleError::UnexpectedResponse(_)));
    }
}
