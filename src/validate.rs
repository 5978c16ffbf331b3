//! Validation runs.
//!
//! A [`ValidationSpec`] lists property checks; a [`Validator`] runs them in
//! order against one network and one oracle. Each check gets its own clone
//! of the network, so no check observes another's instrumentation.
//!
//! ```
//! use nsta_rs::validate::ValidationSpec;
//!
//! let spec = ValidationSpec::from_json(r#"{
//!     "check_type": "concrete",
//!     "constants": { "N": 5 },
//!     "time": "100",
//!     "checks": [
//!         { "type": "condition", "condition": "P.Done" },
//!         { "type": "invariant", "condition": "x < 3", "check_type": "symbolic" }
//!     ]
//! }"#).unwrap();
//!
//! let configs = spec.properties();
//! assert_eq!(configs[0].get("check_type"), Some("concrete"));
//! assert_eq!(configs[1].get("check_type"), Some("symbolic"));
//! assert_eq!(spec.settings().constants["N"], "5");
//! ```

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::checker::{self, CheckerOptions};
use crate::error::{Error, Result};
use crate::network::Network;
use crate::oracle::Oracle;
use crate::property::{CheckResult, Property, PropertyConfig, Settings};

const KIND_KEY: &str = "type";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSpec {
    /// Constant overrides; values are rendered to literals.
    #[serde(default)]
    pub constants: BTreeMap<String, Value>,
    #[serde(default)]
    pub checks: Vec<Map<String, Value>>,
    /// Cutoff bound; empty or absent disables the cutoff.
    #[serde(default)]
    pub time: Option<Value>,
    #[serde(default)]
    pub time_limit_clock: Option<String>,
    #[serde(default)]
    pub options: CheckerOptions,
    /// Other top-level keys, visible as parameters of every check.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Renders a JSON value as the literal text a model expects.
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ValidationSpec {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// One configuration per check, in order. Keys of the check override
    /// top-level keys.
    pub fn properties(&self) -> Vec<PropertyConfig> {
        self.checks
            .iter()
            .map(|check| {
                let kind = check.get(KIND_KEY).map(literal).unwrap_or_default();
                let mut config = PropertyConfig::new(kind);
                let entries = self.extra.iter().chain(check.iter());
                for (key, value) in entries.filter(|(k, _)| k.as_str() != KIND_KEY) {
                    config.parameters.insert(key.clone(), literal(value));
                }
                config
            })
            .collect()
    }

    pub fn settings(&self) -> Settings {
        Settings {
            constants: self.constants.iter().map(|(k, v)| (k.clone(), literal(v))).collect(),
            time: self.time.as_ref().map(literal),
            time_limit_clock: self.time_limit_clock.clone(),
            options: self.options.clone(),
        }
    }
}

pub struct Validator<'a> {
    oracle: &'a mut dyn Oracle,
}

impl<'a> Validator<'a> {
    pub fn new(oracle: &'a mut dyn Oracle) -> Self {
        Validator { oracle }
    }

    /// Runs every check of `spec` against `network`.
    ///
    /// Fails as a whole only when `network` itself does not compile. Per
    /// check, an `Err` entry means "no result": an unknown kind or a missing
    /// parameter skips that check, a cancellation ends the run.
    pub fn run(&mut self, network: &Network, spec: &ValidationSpec) -> Result<Vec<Result<CheckResult>>> {
        let abort = self.oracle.abort_handle();
        abort.reset();
        checker::compile(self.oracle, network)?;

        let settings = spec.settings();
        let mut results = Vec::new();
        for config in spec.properties() {
            if abort.is_aborted() {
                results.push(Err(Error::Cancelled));
                break;
            }
            let result = Property::from_config(&config).and_then(|p| p.check(self.oracle, network, &settings));
            match &result {
                Ok(r) => info!("{}", r),
                Err(Error::UnknownProperty(kind)) => warn!("skipping unknown property kind `{}`", kind),
                Err(Error::Cancelled) => {
                    results.push(result);
                    break;
                }
                Err(e) => warn!("{}: {}", config.kind, e),
            }
            results.push(result);
        }
        Ok(results)
    }
}
