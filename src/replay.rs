//! Replay handles returned with verdicts.
//!
//! A checker that obtained a witness wraps it, together with the query and
//! the document the witness belongs to, into a [`Replay`]. Presenting it
//! (loading it into a simulator, annotating an editor) is up to a
//! [`TracePresenter`] supplied by the caller.

use std::fmt;

use crate::oracle::{ConcreteTrace, SymbolicTrace};

#[derive(Debug, Clone, PartialEq)]
pub enum Witness {
    Symbolic(SymbolicTrace),
    Concrete(ConcreteTrace),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Replay {
    pub query: String,
    /// The interchange document the witness was produced on.
    pub document: String,
    pub witness: Witness,
}

impl Replay {
    pub fn symbolic(query: impl Into<String>, document: impl Into<String>, trace: SymbolicTrace) -> Self {
        Replay {
            query: query.into(),
            document: document.into(),
            witness: Witness::Symbolic(trace),
        }
    }

    pub fn concrete(query: impl Into<String>, document: impl Into<String>, trace: ConcreteTrace) -> Self {
        Replay {
            query: query.into(),
            document: document.into(),
            witness: Witness::Concrete(trace),
        }
    }

    pub fn present(&self, presenter: &mut dyn TracePresenter) {
        presenter.present(self);
    }
}

pub trait TracePresenter {
    fn present(&mut self, replay: &Replay);
}

/// Collects a plain-text rendering of every presented replay.
#[derive(Debug, Default)]
pub struct TextPresenter {
    pub output: String,
}

impl TracePresenter for TextPresenter {
    fn present(&mut self, replay: &Replay) {
        self.output.push_str(&replay.to_string());
    }
}

impl fmt::Display for Replay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "witness for `{}`", self.query)?;
        match &self.witness {
            Witness::Symbolic(trace) => write!(f, "{}", trace),
            Witness::Concrete(trace) => {
                for series in &trace.series {
                    write!(f, "{} [{}]:", series.expression, series.run)?;
                    for (t, v) in &series.points {
                        write!(f, " ({},{})", t, v)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::oracle::{ProcessLocation, Series, State, TransitionEdge};

    use test_log::test;

    #[test]
    fn test_text_presenter_symbolic() {
        let trace = SymbolicTrace::new(State::new(vec![ProcessLocation::new("P", "P", "Idle")])).push(
            vec![TransitionEdge::new("P", "P", "Idle", "Done")],
            State::new(vec![ProcessLocation::new("P", "P", "Done")]),
        );
        let replay = Replay::symbolic("E<> (P.Done)", "<nta/>", trace);
        let mut presenter = TextPresenter::default();
        replay.present(&mut presenter);
        assert_eq!(
            presenter.output,
            "witness for `E<> (P.Done)`\n( P.Idle )\n  P.Idle -> P.Done\n( P.Done )\n"
        );
    }

    #[test]
    fn test_text_presenter_concrete() {
        let trace = ConcreteTrace {
            series: vec![Series {
                expression: "x".to_string(),
                run: 0,
                points: vec![(0.0, 0.0), (1.5, 2.0)],
            }],
        };
        let replay = Replay::concrete("simulate [<=10;1] {x}", "<nta/>", trace);
        assert_eq!(replay.to_string(), "witness for `simulate [<=10;1] {x}`\nx [0]: (0,0) (1.5,2)\n");
    }
}
