//! Raw catalog schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw catalog as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawCatalog {
    /// Config schema version
    pub config_version: u32,

    /// Global session settings
    #[serde(default)]
    pub session: RawSessionConfig,

    /// Item definitions
    #[serde(default)]
    pub items: Vec<RawItem>,
}

/// Settings shared by every session
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSessionConfig {
    /// Extra time tolerated past max_time (ISO 8601 duration, default PT0S)
    pub acceptable_latency: Option<String>,

    /// Data directory for the session store
    pub data_dir: Option<PathBuf>,
}

/// Raw item definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawItem {
    /// Unique item identifier
    pub id: String,

    /// Display title
    #[serde(default)]
    pub title: Option<String>,

    /// Completion is decided by response processing rather than attempt count
    #[serde(default)]
    pub adaptive: bool,

    #[serde(default)]
    pub time_limits: Option<RawTimeLimits>,

    #[serde(default)]
    pub session_control: Option<RawSessionControl>,

    #[serde(default)]
    pub variables: Vec<RawVariable>,

    #[serde(default)]
    pub response_processing: Option<RawResponseProcessing>,
}

/// Time limits, as ISO 8601 durations
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTimeLimits {
    pub min_time: Option<String>,
    pub max_time: Option<String>,
    #[serde(default)]
    pub allow_late_submission: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSessionControl {
    /// Maximum attempts, 0 for unlimited (default 1)
    pub max_attempts: Option<u32>,

    /// Allow ending an attempt without responding (default true)
    pub allow_skipping: Option<bool>,
}

/// Variable declaration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawVariable {
    pub identifier: String,

    /// "response", "outcome" or "template"
    pub kind: String,

    /// "boolean", "integer", "float", "string", "identifier" or "duration"
    pub base_type: String,

    /// "single" (default), "multiple" or "ordered"
    #[serde(default)]
    pub cardinality: Option<String>,

    #[serde(default)]
    pub default: Option<toml::Value>,

    #[serde(default)]
    pub correct_response: Option<toml::Value>,
}

/// Response processing template
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum RawResponseProcessing {
    None,
    MatchCorrect {
        #[serde(default = "default_response_identifier")]
        response: String,
        #[serde(default = "default_outcome_identifier")]
        outcome: String,
    },
}

fn default_response_identifier() -> String {
    "RESPONSE".to_string()
}

fn default_outcome_identifier() -> String {
    "SCORE".to_string()
}
