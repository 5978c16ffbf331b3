//! Traces produced by the oracle.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLocation {
    pub process: String,
    pub template: String,
    pub location: String,
}

impl ProcessLocation {
    pub fn new(process: impl Into<String>, template: impl Into<String>, location: impl Into<String>) -> Self {
        ProcessLocation {
            process: process.into(),
            template: template.into(),
            location: location.into(),
        }
    }
}

/// A symbolic state: the location vector, the integer valuation and the
/// clock constraints (one conjunct per entry).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub locations: Vec<ProcessLocation>,
    pub variables: BTreeMap<String, i64>,
    pub constraints: Vec<String>,
}

impl State {
    pub fn new(locations: Vec<ProcessLocation>) -> Self {
        State {
            locations,
            ..Default::default()
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: i64) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn location_of(&self, process: &str) -> Option<&str> {
        self.locations
            .iter()
            .find(|l| l.process == process)
            .map(|l| l.location.as_str())
    }
}

/// One process taking part in a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEdge {
    pub process: String,
    pub template: String,
    pub source: String,
    pub target: String,
    /// Guard, synchronization and updates as printed by the oracle.
    #[serde(default)]
    pub label: String,
}

impl TransitionEdge {
    pub fn new(
        process: impl Into<String>,
        template: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        TransitionEdge {
            process: process.into(),
            template: template.into(),
            source: source.into(),
            target: target.into(),
            label: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// One entry per participating process; more than one for a
    /// synchronization.
    pub edges: Vec<TransitionEdge>,
    pub target: State,
}

/// An exact witness: an initial state followed by transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolicTrace {
    pub initial: State,
    pub transitions: Vec<Transition>,
}

impl SymbolicTrace {
    pub fn new(initial: State) -> Self {
        SymbolicTrace {
            initial,
            transitions: Vec::new(),
        }
    }

    pub fn push(mut self, edges: Vec<TransitionEdge>, target: State) -> Self {
        self.transitions.push(Transition { edges, target });
        self
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn last_state(&self) -> &State {
        self.transitions.last().map_or(&self.initial, |t| &t.target)
    }

    /// `(source, transition)` pairs in order.
    pub fn steps(&self) -> impl Iterator<Item = (&State, &Transition)> {
        let sources = std::iter::once(&self.initial).chain(self.transitions.iter().map(|t| &t.target));
        sources.zip(self.transitions.iter())
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for l in &self.locations {
            write!(f, " {}.{}", l.process, l.location)?;
        }
        write!(f, " )")?;
        for (name, value) in &self.variables {
            write!(f, " {}={}", name, value)?;
        }
        Ok(())
    }
}

impl fmt::Display for SymbolicTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.initial)?;
        for t in &self.transitions {
            for e in &t.edges {
                writeln!(f, "  {}.{} -> {}.{}", e.process, e.source, e.process, e.target)?;
            }
            writeln!(f, "{}", t.target)?;
        }
        Ok(())
    }
}

/// One sampled run of one simulated expression: `(time, value)` points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub expression: String,
    pub run: usize,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcreteTrace {
    pub series: Vec<Series>,
}

impl ConcreteTrace {
    pub fn runs(&self) -> usize {
        self.series.iter().map(|s| s.run + 1).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn at(location: &str) -> State {
        State::new(vec![ProcessLocation::new("P", "P", location)])
    }

    #[test]
    fn test_steps_pair_sources_with_transitions() {
        let trace = SymbolicTrace::new(at("Idle"))
            .push(vec![TransitionEdge::new("P", "P", "Idle", "Idle")], at("Idle").with_variable("x", 1))
            .push(vec![TransitionEdge::new("P", "P", "Idle", "Done")], at("Done"));
        let steps: Vec<_> = trace.steps().collect();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].0.variables["x"], 1);
        assert_eq!(steps[1].1.target.location_of("P"), Some("Done"));
        assert_eq!(trace.last_state().location_of("P"), Some("Done"));
    }

    #[test]
    fn test_empty_trace() {
        let trace = SymbolicTrace::new(at("Idle"));
        assert!(trace.is_empty());
        assert_eq!(trace.steps().count(), 0);
        assert_eq!(trace.last_state(), &at("Idle"));
    }

    #[test]
    fn test_display() {
        let trace = SymbolicTrace::new(at("Idle"))
            .push(vec![TransitionEdge::new("P", "P", "Idle", "Done")], at("Done"));
        assert_eq!(trace.to_string(), "( P.Idle )\n  P.Idle -> P.Done\n( P.Done )\n");
    }
}
