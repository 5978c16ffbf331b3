//! Concolic checking.
//!
//! An exact witness found on the abstracted network is replayed in the
//! concrete network by statistical simulation. The replay is steered by a
//! global step counter [`TRANSITION_COUNTER`]: every edge that can stand for
//! step `k` of the witness is guarded by `__cur_transition == k`. Edges other
//! than chance edges and receivers increment the counter.
//!
//! Correspondence between witness steps and concrete edges is by template and
//! location names only. With several processes of one template, an edge
//! taken by any of them at step `k` is enabled for all of them at step `k`.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::{ask, compile, Checker, CheckerKind, CheckerOptions, ConcreteChecker, Outcome, Verdict};
use crate::abstraction::abstract_network;
use crate::decl::{Type, Variable};
use crate::error::Result;
use crate::expr::{Expr, LogicalOp};
use crate::network::{Edge, Network, Template};
use crate::oracle::{Oracle, Query, State, Status, SymbolicTrace, TraceKind, Transition};
use crate::replay::Replay;
use crate::types::EdgeRef;

/// Global step counter driven by the constrained network.
pub const TRANSITION_COUNTER: &str = "__cur_transition";

/// Global clock that is never reset.
pub const GLOBAL_CLOCK: &str = "__global_time";

#[derive(Debug, Default, Clone)]
pub struct ConcolicChecker {
    options: CheckerOptions,
}

impl ConcolicChecker {
    pub fn new(options: CheckerOptions) -> Self {
        ConcolicChecker { options }
    }

    pub fn query(condition: &Expr) -> Query {
        Query::new(format!("A[] not ({})", condition)).with_trace(TraceKind::Shortest)
    }
}

impl Checker for ConcolicChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Concolic
    }

    fn is_reachable(&self, oracle: &mut dyn Oracle, network: &Network, condition: &Expr) -> Result<Outcome> {
        let mut concrete = network.clone();
        concrete.add_global_variable(Type::clock(), Variable::new(GLOBAL_CLOCK));

        let mut abstracted = concrete.clone();
        abstract_network(&mut abstracted);
        let model = compile(oracle, &abstracted)?;
        let query = ConcolicChecker::query(condition);
        let Some(answer) = ask(oracle, &model, &query)? else {
            return Ok(Outcome::new(Verdict::MaybeReachable));
        };
        let trace = match (answer.status, answer.trace) {
            (Status::Ok, _) => return Ok(Outcome::new(Verdict::Unreachable)),
            (_, Some(trace)) => trace,
            (status, None) => {
                debug!("concolic: {} without a witness", status);
                return Ok(Outcome::new(Verdict::MaybeReachable));
            }
        };
        let witness = Replay::symbolic(&query.formula, &model.document, trace.clone());

        constrain(&mut concrete, &trace);
        let model = compile(oracle, &concrete)?;
        let query = ConcreteChecker::query(&self.options, TRANSITION_COUNTER, condition);
        let Some(answer) = ask(oracle, &model, &query)? else {
            return Ok(Outcome::new(Verdict::MaybeReachable).with_replay(Some(witness)));
        };

        let verdict = match answer.status {
            Status::Ok => Verdict::Reachable,
            _ => Verdict::MaybeReachable,
        };
        let replay = match answer.samples {
            Some(samples) => Replay::concrete(&query.formula, &model.document, samples),
            None => witness,
        };
        Ok(Outcome::new(verdict).with_replay(Some(replay)))
    }
}

/// One process moving from `source` to `target` within a witness step.
struct Move<'a> {
    template: &'a str,
    source: &'a str,
    target: &'a str,
}

fn moves<'a>(source: &'a State, transition: &'a Transition) -> Vec<Move<'a>> {
    if !transition.edges.is_empty() {
        return transition
            .edges
            .iter()
            .map(|e| Move {
                template: &e.template,
                source: &e.source,
                target: &e.target,
            })
            .collect();
    }
    // No edge labels: pair the location vectors position by position.
    source
        .locations
        .iter()
        .zip(&transition.target.locations)
        .map(|(s, t)| Move {
            template: &s.template,
            source: &s.location,
            target: &t.location,
        })
        .collect()
}

/// Whether `edge` leads from the location named `source` to the one named
/// `target`.
fn realizes(template: &Template, edge: &Edge, source: &str, target: &str) -> bool {
    template.location(edge.source).name == source && template.location(edge.target).name == target
}

/// Restricts `network` to runs that follow `trace` step by step.
///
/// Adds the global int [`TRANSITION_COUNTER`] and conjoins a step guard onto
/// every edge, chance edges included. Edges that are neither chance edges
/// nor receivers also increment the counter. Returns, per edge, the steps it
/// stands for; an edge standing for no step is guarded by `false`.
pub fn constrain(network: &mut Network, trace: &SymbolicTrace) -> BTreeMap<EdgeRef, BTreeSet<usize>> {
    let mut steps: BTreeMap<EdgeRef, BTreeSet<usize>> = BTreeMap::new();
    for (i, (source, transition)) in trace.steps().enumerate() {
        for m in moves(source, transition) {
            let Some(t) = network.template_by_name(m.template) else {
                debug!("constrain: no template `{}`", m.template);
                continue;
            };
            let template = network.template(t);
            for (e, edge) in template.edges() {
                if realizes(template, edge, m.source, m.target) {
                    steps.entry(EdgeRef::new(t, e)).or_default().insert(i);
                }
            }
        }
    }
    debug!("constrain: {} steps over {} edges", trace.len(), steps.len());

    network.add_global_variable(Type::int(), Variable::new(TRANSITION_COUNTER).with_init(Expr::int(0)));

    let edges: Vec<(EdgeRef, bool)> = network
        .edges()
        .map(|(r, edge)| (r, network.template(r.template).is_chance_edge(edge)))
        .collect();
    for (r, chance) in edges {
        let indices = steps.entry(r).or_default();
        let checks = indices
            .iter()
            .map(|&i| Expr::ident(TRANSITION_COUNTER) % Expr::int(i as i64))
            .collect();
        let edge = network.edge_mut(r);
        edge.constrain(Expr::chain(checks, LogicalOp::Or, "false"));
        if !chance && !edge.is_receive() {
            edge.updates.push(Expr::post_inc(Expr::ident(TRANSITION_COUNTER)));
        }
    }
    steps
}
