//! Application configuration (§4.9): defaults layered with an optional TOML
//! file and `KONVEYOR_*` environment overrides, the way the CLI's own
//! workspace config is usually assembled.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use analyzer_domain::error::{Error, Result};

/// Tunables for one analysis run, layered in increasing precedence:
/// built-in defaults, an optional TOML file, then `KONVEYOR_*` env vars.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Number of worker tasks per rule batch.
    pub workers: usize,
    /// Maximum incidents retained per violation (0 = uncapped).
    pub incident_limit: usize,
    /// Maximum lines retained per code snippet (0 = uncapped).
    pub code_snip_limit: usize,
    /// Lines of context included on each side of a matched line.
    pub context_lines: usize,
    /// Candidate prefixes stripped from `file://` URIs in reported incidents.
    pub location_prefixes: Vec<String>,
    /// Basenames every rule is narrowed to (empty = pass all, §4.3).
    pub included_paths: Vec<String>,
    /// Regex patterns excluding matching file basenames from every rule.
    pub excluded_paths: Vec<String>,
    /// A boolean expression (§4.4 selector grammar) over rule labels.
    pub rule_selector: Option<String>,
    /// `tracing_subscriber` filter directive, e.g. `"info"` or `"analyzer=debug"`.
    pub log_level: String,
    /// Output format for the final report: `"text"` or `"json"`.
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            incident_limit: 0,
            code_snip_limit: 0,
            context_lines: 2,
            location_prefixes: Vec::new(),
            included_paths: Vec::new(),
            excluded_paths: Vec::new(),
            rule_selector: None,
            log_level: "info".to_owned(),
            format: "text".to_owned(),
        }
    }
}

impl AppConfig {
    /// Assemble configuration from defaults, an optional TOML file at
    /// `config_path`, and `KONVEYOR_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but fails to parse, or an
    /// env var has a value that doesn't fit its field's type.
    pub fn load(config_path: Option<&std::path::Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("KONVEYOR_"));
        figment
            .extract()
            .map_err(|err| Error::configuration_with_source("failed to assemble configuration", err))
    }
}
