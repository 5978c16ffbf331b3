//! Property kinds and their translation into reachability questions.
//!
//! A property check clones the network, lowers the property into a
//! condition (instrumenting the clone where needed) and hands both to a
//! [`Checker`](crate::checker::Checker). A safety property is *satisfied*
//! when its condition is UNREACHABLE.
//!
//! | Kind | Short name | Condition |
//! |------|------------|-----------|
//! | [`SafetyProperty::Condition`] | `condition` | `φ` |
//! | [`SafetyProperty::Invariant`] | `invariant` | `!(φ)` |
//! | [`SafetyProperty::PostSync`] | `sync-post` | `!(observer.Check imply (φ))` |
//! | [`SafetyProperty::ReceiveSync`] | `receivesyncs` | `__missed_c != 0 && !(ignore)` |
//! | [`Property::TemplateLocations`] | `template-locations` | coverage, no condition |

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::abstraction::abstract_network;
use crate::checker::{self, ask, CheckerKind, CheckerOptions, Outcome, Verdict};
use crate::error::{Error, Result};
use crate::expr::{CompareOp, Expr};
use crate::instrument::{add_coverage, add_missed_sync_counter, add_post_sync_observer, add_time_limit};
use crate::network::Network;
use crate::oracle::{Oracle, Query, TraceKind};
use crate::replay::Replay;

pub const CHECK_TYPE: &str = "check_type";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgumentType {
    String,
    CheckType,
}

/// One accepted parameter of a property kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub ty: ArgumentType,
    pub required: bool,
}

const fn param(key: &'static str, label: &'static str, ty: ArgumentType, required: bool) -> ParameterSpec {
    ParameterSpec {
        key,
        label,
        ty,
        required,
    }
}

const CHECK_TYPE_PARAM: ParameterSpec = param(CHECK_TYPE, "Check type", ArgumentType::CheckType, false);
const CONDITION_PARAM: ParameterSpec = param("condition", "Condition", ArgumentType::String, true);
const CHANNEL_PARAM: ParameterSpec = param("channel", "Channel", ArgumentType::String, true);
const TEMPLATE_PARAM: ParameterSpec = param("template", "Template", ArgumentType::String, true);
const IGNORE_CONDITION_PARAM: ParameterSpec =
    param("ignore-condition", "Ignore Condition", ArgumentType::String, false);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    Condition,
    Invariant,
    PostSync,
    ReceiveSync,
    TemplateLocations,
}

impl PropertyKind {
    pub const ALL: [PropertyKind; 5] = [
        PropertyKind::Condition,
        PropertyKind::Invariant,
        PropertyKind::PostSync,
        PropertyKind::ReceiveSync,
        PropertyKind::TemplateLocations,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PropertyKind::Condition => "Check Condition",
            PropertyKind::Invariant => "Model Invariant",
            PropertyKind::PostSync => "Synchronization post-condition",
            PropertyKind::ReceiveSync => "Receive Syncs",
            PropertyKind::TemplateLocations => "Template location reachability",
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            PropertyKind::Condition => "condition",
            PropertyKind::Invariant => "invariant",
            PropertyKind::PostSync => "sync-post",
            PropertyKind::ReceiveSync => "receivesyncs",
            PropertyKind::TemplateLocations => "template-locations",
        }
    }

    pub fn parameters(self) -> &'static [ParameterSpec] {
        match self {
            PropertyKind::Condition | PropertyKind::Invariant => &[CHECK_TYPE_PARAM, CONDITION_PARAM],
            PropertyKind::PostSync => &[CHECK_TYPE_PARAM, CHANNEL_PARAM, CONDITION_PARAM],
            PropertyKind::ReceiveSync => &[CHECK_TYPE_PARAM, CHANNEL_PARAM, TEMPLATE_PARAM, IGNORE_CONDITION_PARAM],
            PropertyKind::TemplateLocations => &[],
        }
    }

    pub fn from_short_name(name: &str) -> Option<Self> {
        PropertyKind::ALL.into_iter().find(|k| k.short_name() == name)
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A property kind plus its string parameters, as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyConfig {
    pub kind: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl PropertyConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        PropertyConfig {
            kind: kind.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(|s| s.as_str())
    }

    fn require(&self, kind: PropertyKind, key: &str) -> Result<String> {
        self.get(key)
            .map(|s| s.to_string())
            .ok_or_else(|| Error::MissingParameter {
                property: kind.short_name().to_string(),
                parameter: key.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyProperty {
    Condition { condition: String },
    Invariant { invariant: String },
    PostSync { channel: String, condition: String },
    ReceiveSync { channel: String, template: String, ignore: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    Safety { property: SafetyProperty, checker: CheckerKind },
    TemplateLocations,
}

impl Property {
    /// Reads a property from its configuration. Fails before any oracle
    /// call on an unknown kind, a missing parameter or an unknown checker.
    pub fn from_config(config: &PropertyConfig) -> Result<Self> {
        let kind = PropertyKind::from_short_name(&config.kind).ok_or_else(|| Error::UnknownProperty(config.kind.clone()))?;
        let property = match kind {
            PropertyKind::TemplateLocations => return Ok(Property::TemplateLocations),
            PropertyKind::Condition => SafetyProperty::Condition {
                condition: config.require(kind, "condition")?,
            },
            PropertyKind::Invariant => SafetyProperty::Invariant {
                invariant: config.require(kind, "condition")?,
            },
            PropertyKind::PostSync => SafetyProperty::PostSync {
                channel: config.require(kind, "channel")?,
                condition: config.require(kind, "condition")?,
            },
            PropertyKind::ReceiveSync => SafetyProperty::ReceiveSync {
                channel: config.require(kind, "channel")?,
                template: config.require(kind, "template")?,
                ignore: config.get("ignore-condition").unwrap_or("false").to_string(),
            },
        };
        let checker = match config.get(CHECK_TYPE) {
            Some(name) => name.parse()?,
            None => CheckerKind::default(),
        };
        Ok(Property::Safety { property, checker })
    }

    pub fn kind(&self) -> PropertyKind {
        match self {
            Property::Safety { property, .. } => property.kind(),
            Property::TemplateLocations => PropertyKind::TemplateLocations,
        }
    }

    pub fn check(&self, oracle: &mut dyn Oracle, network: &Network, settings: &Settings) -> Result<CheckResult> {
        match self {
            Property::Safety { property, checker } => check_safety(oracle, network, property, *checker, settings),
            Property::TemplateLocations => check_coverage(oracle, network, settings),
        }
    }
}

impl SafetyProperty {
    pub fn kind(&self) -> PropertyKind {
        match self {
            SafetyProperty::Condition { .. } => PropertyKind::Condition,
            SafetyProperty::Invariant { .. } => PropertyKind::Invariant,
            SafetyProperty::PostSync { .. } => PropertyKind::PostSync,
            SafetyProperty::ReceiveSync { .. } => PropertyKind::ReceiveSync,
        }
    }

    /// Lowers the property into the condition whose reachability violates
    /// it, instrumenting `network` as needed.
    pub fn translate(&self, oracle: &mut dyn Oracle, network: &mut Network, checker: CheckerKind) -> Result<Expr> {
        let condition = match self {
            SafetyProperty::Condition { condition } => Expr::raw(condition),
            SafetyProperty::Invariant { invariant } => !Expr::raw(invariant),
            SafetyProperty::PostSync { channel, condition } => {
                // the statistical engine ignores channel priorities
                let atomic = checker != CheckerKind::Concrete;
                let check = add_post_sync_observer(network, channel, atomic);
                !Expr::imply(check, Expr::raw(condition))
            }
            SafetyProperty::ReceiveSync {
                channel,
                template,
                ignore,
            } => {
                let model = checker::compile(oracle, network)?;
                let instances = model.instance_count(template);
                if instances == 0 {
                    return Err(Error::UnknownTemplate(template.clone()));
                }
                let counter = add_missed_sync_counter(network, channel, template, instances);
                Expr::compare(CompareOp::Ne, Expr::ident(counter), Expr::int(0)) & !Expr::raw(ignore)
            }
        };
        debug!("translate({:?}) = {}", self.kind(), condition);
        Ok(condition)
    }
}

/// Options shared by every check of a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Constant overrides: name to literal.
    pub constants: BTreeMap<String, String>,
    /// Time bound of the cutoff template; `None` or empty disables it.
    pub time: Option<String>,
    /// Existing clock the cutoff bounds instead of a fresh one.
    pub time_limit_clock: Option<String>,
    pub options: CheckerOptions,
}

impl Settings {
    fn time_limit(&self) -> Option<&str> {
        self.time.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Rewrites the initializer of every constant named in `constants`.
pub fn apply_constants(network: &mut Network, constants: &BTreeMap<String, String>) {
    for (name, literal) in constants {
        if network.set_constant(name, literal) {
            info!("Set constant {} to {}", name, literal);
        } else {
            debug!("apply_constants: no constant `{}`", name);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub kind: PropertyKind,
    pub message: String,
    pub satisfied: bool,
    /// Absent for checks that do not decide reachability of a condition.
    pub verdict: Option<Verdict>,
    pub replay: Option<Replay>,
}

impl CheckResult {
    fn from_outcome(kind: PropertyKind, outcome: Outcome) -> Self {
        let message = match outcome.verdict {
            Verdict::Reachable => "Property reachable.",
            Verdict::Unreachable => "Property not reachable.",
            Verdict::MaybeReachable => "Property may be reachable.",
        };
        CheckResult {
            kind,
            message: message.to_string(),
            satisfied: outcome.verdict == Verdict::Unreachable,
            verdict: Some(outcome.verdict),
            replay: outcome.replay,
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.satisfied { "ok" } else { "FAILED" };
        write!(f, "[{}] {}: {}", mark, self.kind, self.message)
    }
}

/// Clones `network`, adds the cutoff, applies constant overrides,
/// translates `property` and decides reachability of its condition.
pub fn check_safety(
    oracle: &mut dyn Oracle,
    network: &Network,
    property: &SafetyProperty,
    checker: CheckerKind,
    settings: &Settings,
) -> Result<CheckResult> {
    let mut network = network.clone();
    if let Some(time) = settings.time_limit() {
        add_time_limit(&mut network, time, settings.time_limit_clock.as_deref());
    }
    apply_constants(&mut network, &settings.constants);

    let condition = property.translate(oracle, &mut network, checker)?;
    let outcome = checker::checker(checker, &settings.options).is_reachable(oracle, &network, &condition)?;
    info!("{} ({}): {}", property.kind(), checker, outcome.verdict);
    Ok(CheckResult::from_outcome(property.kind(), outcome))
}

/// Reports locations no run reaches, on the abstracted network.
pub fn check_coverage(oracle: &mut dyn Oracle, network: &Network, settings: &Settings) -> Result<CheckResult> {
    let mut network = network.clone();
    apply_constants(&mut network, &settings.constants);
    abstract_network(&mut network);
    let coverage = add_coverage(&mut network, settings.options.state_space_bound);

    let model = checker::compile(oracle, &network)?;
    // Explores the state space; only the readout below is interpreted.
    ask(oracle, &model, &Query::new(coverage.exploration_query()))?;

    let readout = Query::new(coverage.readout_query()).with_trace(TraceKind::Some);
    let trace = ask(oracle, &model, &readout)?
        .and_then(|answer| answer.trace)
        .ok_or_else(|| Error::MissingTrace(readout.formula.clone()))?;
    let unreachable = coverage
        .unreachable(&network, trace.last_state())
        .ok_or_else(|| Error::MissingTrace(readout.formula.clone()))?;

    let message = if unreachable.is_empty() {
        "All locations reachable".to_string()
    } else {
        let names: Vec<String> = unreachable
            .iter()
            .map(|&(t, l)| {
                let template = network.template(t);
                format!("{}.{}", template.name, template.location(l).name)
            })
            .collect();
        format!("Unreachable locations found: {}", names.join(", "))
    };
    info!("{}: {}", PropertyKind::TemplateLocations, message);

    Ok(CheckResult {
        kind: PropertyKind::TemplateLocations,
        message,
        satisfied: unreachable.is_empty(),
        verdict: None,
        replay: Some(Replay::symbolic(&readout.formula, &model.document, trace)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::decl::{Type, Variable};
    use crate::network::{Edge, Location, Sync, Template};
    use crate::oracle::{ScriptedOracle, State, Status, SymbolicTrace};

    use test_log::test;

    fn network() -> Network {
        let mut network = Network::default();
        network.add_global_variable(Type::int().constant(), Variable::new("N").with_init(Expr::int(3)));
        network.add_global_variable(Type::bool(), Variable::new("flag").with_init(Expr::ff()));
        network.add_global_channel("a", false, true);
        let mut p = Template::new("P");
        let idle = p.add_location(Location::new("Idle"));
        let done = p.add_location(Location::new("Done"));
        p.set_initial(idle);
        p.add_edge(Edge::new(idle, done).with_sync(Sync::send("a")));
        p.add_edge(Edge::new(done, idle).with_update(Expr::assign(Expr::ident("flag"), Expr::tt())));
        network.add_template(p);
        network.instantiate("P");
        network
    }

    fn config(kind: &str, params: &[(&str, &str)]) -> PropertyConfig {
        params.iter().fold(PropertyConfig::new(kind), |c, (k, v)| c.with(*k, *v))
    }

    #[test]
    fn test_metadata() {
        assert_eq!(PropertyKind::from_short_name("sync-post"), Some(PropertyKind::PostSync));
        assert_eq!(PropertyKind::from_short_name("nope"), None);
        let keys: Vec<&str> = PropertyKind::ReceiveSync.parameters().iter().map(|p| p.key).collect();
        assert_eq!(keys, vec!["check_type", "channel", "template", "ignore-condition"]);
        let required: Vec<bool> = PropertyKind::ReceiveSync.parameters().iter().map(|p| p.required).collect();
        assert_eq!(required, vec![false, true, true, false]);
        assert!(PropertyKind::TemplateLocations.parameters().is_empty());
    }

    #[test]
    fn test_from_config() {
        let property = Property::from_config(&config("condition", &[("condition", "P.Done")])).unwrap();
        assert_eq!(
            property,
            Property::Safety {
                property: SafetyProperty::Condition {
                    condition: "P.Done".to_string()
                },
                checker: CheckerKind::Symbolic,
            }
        );
        let property = Property::from_config(&config(
            "receivesyncs",
            &[("channel", "b"), ("template", "T"), ("check_type", "concolic")],
        ))
        .unwrap();
        assert!(matches!(
            property,
            Property::Safety {
                property: SafetyProperty::ReceiveSync { ref ignore, .. },
                checker: CheckerKind::Concolic,
            } if ignore == "false"
        ));
    }

    #[test]
    fn test_from_config_errors() {
        assert!(matches!(
            Property::from_config(&config("condition", &[])),
            Err(Error::MissingParameter { ref parameter, .. }) if parameter == "condition"
        ));
        assert!(matches!(
            Property::from_config(&config("deadlock", &[])),
            Err(Error::UnknownProperty(ref k)) if k == "deadlock"
        ));
        assert!(matches!(
            Property::from_config(&config("condition", &[("condition", "x"), ("check_type", "smc")])),
            Err(Error::UnknownChecker(_))
        ));
    }

    #[test]
    fn test_translate_simple_kinds() {
        let mut oracle = ScriptedOracle::new();
        let mut n = network();
        let invariant = SafetyProperty::Invariant {
            invariant: "x < 3".to_string(),
        };
        assert_eq!(
            invariant.translate(&mut oracle, &mut n, CheckerKind::Symbolic).unwrap().to_string(),
            "!(x < 3)"
        );
        assert_eq!(n, network());
        assert!(oracle.queries().is_empty());
    }

    #[test]
    fn test_translate_post_sync() {
        let mut oracle = ScriptedOracle::new();
        let property = SafetyProperty::PostSync {
            channel: "a".to_string(),
            condition: "flag == true".to_string(),
        };
        let mut n = network();
        let condition = property.translate(&mut oracle, &mut n, CheckerKind::Symbolic).unwrap();
        assert_eq!(condition.to_string(), "!(__check_sync_post_condition.Check imply (flag == true))");
        assert!(n.channel_priority.is_some());

        let mut n = network();
        property.translate(&mut oracle, &mut n, CheckerKind::Concrete).unwrap();
        assert!(n.channel_priority.is_none());
    }

    #[test]
    fn test_translate_receive_sync_counts_instances() {
        let mut oracle = ScriptedOracle::new();
        let property = SafetyProperty::ReceiveSync {
            channel: "a".to_string(),
            template: "P".to_string(),
            ignore: "false".to_string(),
        };
        let mut n = network();
        let condition = property.translate(&mut oracle, &mut n, CheckerKind::Symbolic).unwrap();
        assert_eq!(condition.to_string(), "__missed_a != 0 && !(false)");
        assert_eq!(oracle.compiled().len(), 1);

        let unknown = SafetyProperty::ReceiveSync {
            channel: "a".to_string(),
            template: "T".to_string(),
            ignore: "false".to_string(),
        };
        assert!(matches!(
            unknown.translate(&mut oracle, &mut network(), CheckerKind::Symbolic),
            Err(Error::UnknownTemplate(t)) if t == "T"
        ));
    }

    #[test]
    fn test_check_safety_applies_cutoff_and_constants() {
        let mut oracle = ScriptedOracle::new().status("E<>", Status::NotOk);
        let settings = Settings {
            constants: BTreeMap::from([("N".to_string(), "5".to_string())]),
            time: Some("100".to_string()),
            ..Default::default()
        };
        let base = network();
        let property = SafetyProperty::Condition {
            condition: "P.Done".to_string(),
        };
        let result = check_safety(&mut oracle, &base, &property, CheckerKind::Symbolic, &settings).unwrap();
        assert!(result.satisfied);
        assert_eq!(result.message, "Property not reachable.");
        assert_eq!(result.verdict, Some(Verdict::Unreachable));

        let compiled = &oracle.compiled()[0];
        assert!(compiled.template_by_name("__limit_time").is_some());
        assert_eq!(compiled.find_variable("N").unwrap().1.to_string(), "N = 5");
        assert_eq!(base, network());
    }

    #[test]
    fn test_check_safety_messages() {
        for (status, message, satisfied) in [
            (Status::Ok, "Property reachable.", false),
            (Status::Inconclusive, "Property may be reachable.", false),
        ] {
            let mut oracle = ScriptedOracle::new().status("E<>", status);
            let property = SafetyProperty::Condition {
                condition: "P.Done".to_string(),
            };
            let result =
                check_safety(&mut oracle, &network(), &property, CheckerKind::Symbolic, &Settings::default()).unwrap();
            assert_eq!(result.message, message);
            assert_eq!(result.satisfied, satisfied);
        }
    }

    #[test]
    fn test_check_coverage() {
        let last = State::default().with_variable("_fl[0]", 0).with_variable("_fl[1]", 0);
        let mut oracle = ScriptedOracle::new()
            .status("forall", Status::NotOk)
            .trace("_Controller.done", Status::Ok, SymbolicTrace::new(last));
        let result = check_coverage(&mut oracle, &network(), &Settings::default()).unwrap();
        assert!(!result.satisfied);
        assert_eq!(result.message, "Unreachable locations found: P.Done");
        assert_eq!(result.verdict, None);
        assert_eq!(
            oracle.formulas(),
            vec!["E<> (forall (i : int[0, 1]) _f[i])", "E<> (_Controller.done)"]
        );
    }

    #[test]
    fn test_check_coverage_all_reachable() {
        let last = State::default().with_variable("_fl[0]", 1).with_variable("_fl[1]", 1);
        let mut oracle = ScriptedOracle::new().trace("_Controller.done", Status::Ok, SymbolicTrace::new(last));
        let result = check_coverage(&mut oracle, &network(), &Settings::default()).unwrap();
        assert!(result.satisfied);
        assert_eq!(result.message, "All locations reachable");
    }

    #[test]
    fn test_check_coverage_without_trace() {
        let mut oracle = ScriptedOracle::new().status("_Controller.done", Status::Ok);
        assert!(matches!(
            check_coverage(&mut oracle, &network(), &Settings::default()),
            Err(Error::MissingTrace(_))
        ));
    }
}
