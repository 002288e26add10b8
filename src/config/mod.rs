use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use serde::{Serialize, Deserialize};
use crate::fit::FitParams;

/// Default mass left out of the effective supports reported for beliefs.
pub const SUPPORT_EPSILON : f64 = 1e-4;

/// What a network does when the message on one edge cannot be computed
/// (no handler for the input types, or a remote parent that cannot be reached).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeFailurePolicy {

    /// The query that needed the message fails.
    Fail,

    /// The lambda-message is replaced by Noninformative and the substitution is
    /// recorded; the other edges of the query proceed as usual.
    Noninformative

}

impl Default for EdgeFailurePolicy {

    fn default() -> Self {
        EdgeFailurePolicy::Fail
    }

}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PropagationConfig {

    pub edge_failure : EdgeFailurePolicy

}

/// Runtime settings of a belief network, read from JSON such as
///
/// ```json
/// {
///     "propagation" : { "edge_failure" : "noninformative" },
///     "fit" : { "max_iterations" : 200, "tolerance" : 1e-6 },
///     "support_epsilon" : 1e-3
/// }
/// ```
///
/// Every field is optional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {

    pub propagation : PropagationConfig,

    pub fit : FitParams,

    pub support_epsilon : f64

}

impl Default for Config {

    fn default() -> Self {
        Self {
            propagation : PropagationConfig::default(),
            fit : FitParams::default(),
            support_epsilon : SUPPORT_EPSILON
        }
    }

}

impl Config {

    pub fn load_from_path<P>(path : P) -> anyhow::Result<Self>
    where
        P : AsRef<Path>
    {
        let f = File::open(path)?;
        Self::load(f)
    }

    pub fn load<R>(mut reader : R) -> anyhow::Result<Self>
    where
        R : Read
    {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content : &str) -> anyhow::Result<Self> {
        let config : Config = serde_json::from_str(content)?;
        if !(config.support_epsilon > 0.0 && config.support_epsilon < 1.0) {
            anyhow::bail!("support_epsilon must lie in (0, 1), found {}", config.support_epsilon);
        }
        if !(config.fit.tolerance >= 0.0) {
            anyhow::bail!("fit tolerance must be non-negative, found {}", config.fit.tolerance);
        }
        Ok(config)
    }

    pub fn save_to_path<P>(&self, path : P) -> anyhow::Result<()>
    where
        P : AsRef<Path>
    {
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
        self.save(file)
    }

    pub fn save<W>(&self, mut writer : W) -> anyhow::Result<()>
    where
        W : Write
    {
        let content = serde_json::to_string_pretty(self)?;
        writer.write_all(content.as_bytes())?;
        Ok(())
    }

}
