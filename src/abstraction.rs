//! Over-approximating abstraction for exact verification.
//!
//! The exact engine handles neither variable clock rates nor real-valued
//! variables. The pass hides every such name:
//!
//! - a guard or invariant referencing a hidden name becomes `true`, except
//!   that operands of `&&` and `||` are replaced one by one, so the rest of
//!   a conjunction still constrains reachability;
//! - an update referencing a hidden name is dropped;
//! - a chance-edge weight referencing a hidden name becomes `1`, and an
//!   exponential rate referencing one is removed;
//! - declarations of hidden variables are removed, together with any
//!   declaration left empty.
//!
//! Replacing a whole sub-formula by `true` can only enable more behavior
//! when it is not under a negation, so only the positive connectives are
//! rewritten in place and every other shape is replaced wholesale. The
//! resulting network therefore accepts a superset of the behaviors of the
//! original: an UNREACHABLE verdict on it carries over to the original, a
//! REACHABLE one does not.

use std::collections::BTreeSet;

use log::debug;

use crate::expr::{Expr, LogicalOp};
use crate::network::Network;

/// Names that the abstraction hides: variables used with a clock-rate
/// annotation anywhere, and variables or template parameters of type
/// `double` at any scope.
pub fn hidden_names(network: &Network) -> BTreeSet<String> {
    let mut hidden = BTreeSet::new();

    let doubles = |decls: &crate::decl::Declarations, hidden: &mut BTreeSet<String>| {
        for (ty, var) in decls.variables() {
            if ty.is_double() {
                hidden.insert(var.name.clone());
            }
        }
    };
    doubles(&network.declarations, &mut hidden);

    for (_, template) in network.templates() {
        doubles(&template.declarations, &mut hidden);
        hidden.extend(template.parameters.iter().filter(|p| p.ty.is_double()).map(|p| p.name.clone()));

        for (_, location) in template.locations() {
            for expr in location.invariant.iter().chain(location.rate.iter()) {
                hidden.extend(expr.rate_identifiers());
            }
        }
        for (_, edge) in template.edges() {
            for expr in edge.guard.iter().chain(edge.updates.iter()).chain(edge.weight.iter()) {
                hidden.extend(expr.rate_identifiers());
            }
        }
    }

    hidden
}

/// Abstracts `network` in place and returns the hidden names.
pub fn abstract_network(network: &mut Network) -> BTreeSet<String> {
    let hidden = hidden_names(network);
    debug!("abstract_network(hidden = {:?})", hidden);
    if hidden.is_empty() {
        return hidden;
    }

    for template in network.templates_mut() {
        for location in template.locations_mut() {
            if let Some(invariant) = &mut location.invariant {
                if hide(invariant, &hidden) {
                    debug!("abstract: invariant of {} => true", location.name);
                    *invariant = Expr::tt();
                }
            }
            if location.rate.as_ref().is_some_and(|r| r.mentions(&hidden)) {
                location.rate = None;
            }
        }

        for edge in template.edges_mut() {
            if let Some(guard) = &mut edge.guard {
                if hide(guard, &hidden) {
                    *guard = Expr::tt();
                }
            }
            let before = edge.updates.len();
            edge.updates.retain(|u| !u.mentions(&hidden));
            if edge.updates.len() != before {
                debug!("abstract: dropped {} update(s)", before - edge.updates.len());
            }
            if let Some(weight) = &mut edge.weight {
                if weight.mentions(&hidden) {
                    *weight = Expr::int(1);
                }
            }
        }

        template.declarations.remove_variables(&hidden);
    }

    let removed = network.declarations.remove_variables(&hidden);
    debug!("abstract: removed {} global declaration(s)", removed);
    hidden
}

/// Rewrites `expr` in place. Returns `true` if the caller must replace the
/// whole expression by `true`.
fn hide(expr: &mut Expr, hidden: &BTreeSet<String>) -> bool {
    match expr {
        Expr::Logical(LogicalOp::And | LogicalOp::Or, lhs, rhs) => {
            for side in [lhs, rhs] {
                if hide(side, hidden) {
                    **side = Expr::tt();
                }
            }
            false
        }
        other => other.mentions(hidden),
    }
}
