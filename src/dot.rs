//! Network to DOT (Graphviz) conversion.
//!
//! Renders a [`Network`] as a directed graph, which can be visualized using Graphviz tools like
//! `dot` or online viewers. Handy for inspecting what instrumentation did to a model.
//!
//! # DOT Format
//!
//! The generated DOT output follows these conventions:
//! - Each **template** is a `subgraph cluster_<index>` labelled with the template name
//! - **Locations** are circles named `t<template>_l<location>`:
//!   - the initial location has a double border
//!   - urgent locations are marked with `U`, committed ones with `C`
//!   - chance nodes (branchpoints) are small diamonds
//!   - invariants are appended to the label
//! - **Edges** are labelled `select : guard / sync / updates`; edges leaving a chance node are
//!   dashed and labelled with their weight instead
//!
//! # Examples
//!
//! ```
//! use nsta_rs::dot::to_dot;
//! use nsta_rs::network::{Edge, Location, Network, Template};
//!
//! let mut network = Network::default();
//! let mut t = Template::new("P");
//! let idle = t.add_location(Location::new("Idle"));
//! t.set_initial(idle);
//! t.add_edge(Edge::new(idle, idle));
//! network.add_template(t);
//!
//! let dot = to_dot(&network).unwrap();
//! assert!(dot.contains("cluster_0"));
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! ```

use std::fmt::Write as _;

use crate::network::{Edge, Location, LocationKind, Network, Template};
use crate::types::TemplateId;

/// Configuration options for DOT output generation.
///
/// # Examples
///
/// ```
/// use nsta_rs::dot::{to_dot_with_config, DotConfig};
/// use nsta_rs::network::Network;
///
/// let config = DotConfig {
///     rankdir: "TB",
///     ..DotConfig::default()
/// };
/// let dot = to_dot_with_config(&Network::default(), &config).unwrap();
/// assert!(dot.contains("rankdir=TB"));
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Layout direction (default: "LR")
    pub rankdir: &'static str,

    /// Shape for ordinary locations (default: "circle")
    pub location_shape: &'static str,

    /// Shape for chance nodes (default: "diamond")
    pub chance_shape: &'static str,

    /// Peripheries of the initial location (default: 2)
    pub initial_peripheries: u32,

    /// Style for ordinary edges (default: "solid")
    pub edge_style: &'static str,

    /// Style for edges leaving a chance node (default: "dashed")
    pub chance_edge_style: &'static str,

    /// Whether invariants are part of location labels (default: true)
    pub show_invariants: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            rankdir: "LR",
            location_shape: "circle",
            chance_shape: "diamond",
            initial_peripheries: 2,
            edge_style: "solid",
            chance_edge_style: "dashed",
            show_invariants: true,
        }
    }
}

/// Converts a network to DOT format with the default configuration.
pub fn to_dot(network: &Network) -> Result<String, std::fmt::Error> {
    to_dot_with_config(network, &DotConfig::default())
}

/// Converts a network to DOT format with custom configuration.
pub fn to_dot_with_config(network: &Network, config: &DotConfig) -> Result<String, std::fmt::Error> {
    let mut dot = String::new();
    writeln!(dot, "digraph network {{")?;
    writeln!(dot, "rankdir={};", config.rankdir)?;
    writeln!(dot, "node [shape={}];", config.location_shape)?;

    for (tid, template) in network.templates() {
        writeln!(dot, "subgraph cluster_{} {{", tid.index())?;
        writeln!(dot, "label=\"{}\";", escape(&template.name))?;

        for (lid, location) in template.locations() {
            let name = node(tid, lid.index());
            let mut attrs = vec![format!("label=\"{}\"", escape(&location_label(location, config)))];
            if location.is_chance() {
                attrs.push(format!("shape={}, width=0.3, height=0.3", config.chance_shape));
            }
            if template.initial == Some(lid) {
                attrs.push(format!("peripheries={}", config.initial_peripheries));
            }
            writeln!(dot, "{} [{}];", name, attrs.join(", "))?;
        }

        for (_, edge) in template.edges() {
            let style = if template.is_chance_edge(edge) {
                config.chance_edge_style
            } else {
                config.edge_style
            };
            writeln!(
                dot,
                "{} -> {} [style={}, label=\"{}\"];",
                node(tid, edge.source.index()),
                node(tid, edge.target.index()),
                style,
                escape(&edge_label(template, edge))
            )?;
        }

        writeln!(dot, "}}")?;
    }

    writeln!(dot, "}}")?;
    Ok(dot)
}

fn node(template: TemplateId, location: usize) -> String {
    format!("t{}_l{}", template.index(), location)
}

fn location_label(location: &Location, config: &DotConfig) -> String {
    let mut label = match location.kind {
        LocationKind::Chance => String::new(),
        LocationKind::Urgent => format!("U {}", location.name),
        LocationKind::Committed => format!("C {}", location.name),
        LocationKind::Normal => location.name.clone(),
    };
    if config.show_invariants {
        if let Some(invariant) = &location.invariant {
            write!(label, "\n{}", invariant).ok();
        }
    }
    label
}

fn edge_label(template: &Template, edge: &Edge) -> String {
    if template.is_chance_edge(edge) {
        return edge.weight.as_ref().map(|w| w.to_string()).unwrap_or_default();
    }

    let mut parts = Vec::new();
    if !edge.selects.is_empty() {
        let selects: Vec<String> = edge.selects.iter().map(|s| format!("{} : {}", s.name, s.ty)).collect();
        parts.push(selects.join(", "));
    }
    if let Some(guard) = &edge.guard {
        parts.push(guard.to_string());
    }
    if let Some(sync) = &edge.sync {
        parts.push(sync.to_string());
    }
    if !edge.updates.is_empty() {
        let updates: Vec<String> = edge.updates.iter().map(|u| u.to_string()).collect();
        parts.push(updates.join(", "));
    }
    parts.join(" / ")
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::expr::{CompareOp, Expr};
    use crate::network::Sync;

    fn gate() -> Network {
        let mut network = Network::default();
        let mut t = Template::new("Gate");
        let open = t.add_location(Location::new("Open"));
        let pick = t.add_location(Location::chance("pick"));
        let closed = t.add_location(
            Location::new("Closed").with_invariant(Expr::compare(CompareOp::Le, Expr::ident("c"), Expr::int(3))),
        );
        t.set_initial(open);
        t.add_edge(
            Edge::new(open, pick)
                .with_guard(Expr::compare(CompareOp::Gt, Expr::ident("x"), Expr::int(1)))
                .with_sync(Sync::send("go"))
                .with_update(Expr::post_inc(Expr::ident("x"))),
        );
        t.add_edge(Edge::new(pick, closed).with_weight(Expr::int(3)));
        t.add_edge(Edge::new(pick, open).with_weight(Expr::int(1)));
        network.add_template(t);
        network
    }

    #[test]
    fn test_to_dot_basic() {
        let dot = to_dot(&gate()).unwrap();
        assert!(dot.starts_with("digraph network {"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("subgraph cluster_0 {"));
        assert!(dot.contains("label=\"Gate\";"));
    }

    #[test]
    fn test_locations() {
        let dot = to_dot(&gate()).unwrap();
        assert!(dot.contains("t0_l0 [label=\"Open\", peripheries=2];"));
        assert!(dot.contains("t0_l1 [label=\"\", shape=diamond"));
        assert!(dot.contains("label=\"Closed\\nc <= 3\""));
    }

    #[test]
    fn test_edges() {
        let dot = to_dot(&gate()).unwrap();
        assert!(dot.contains("t0_l0 -> t0_l1 [style=solid, label=\"x > 1 / go! / x++\"];"));
        assert!(dot.contains("t0_l1 -> t0_l2 [style=dashed, label=\"3\"];"));
    }

    #[test]
    fn test_config() {
        let config = DotConfig {
            show_invariants: false,
            chance_shape: "point",
            ..DotConfig::default()
        };
        let dot = to_dot_with_config(&gate(), &config).unwrap();
        assert!(dot.contains("t0_l2 [label=\"Closed\"];"));
        assert!(dot.contains("shape=point"));
    }

    #[test]
    fn test_empty_network() {
        let dot = to_dot(&Network::default()).unwrap();
        assert_eq!(dot, "digraph network {\nrankdir=LR;\nnode [shape=circle];\n}\n");
    }
}
