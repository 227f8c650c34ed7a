//! Concrete path scopes (§4.3): `IncludedPathScope` and `ExcludedPathScope`.

use analyzer_domain::error::Result;
use analyzer_domain::model::{ChainTemplate, ConditionContext, IncidentContext};
use analyzer_domain::ports::Scope;
use regex::Regex;

/// Chain template key the path scopes share, so a rule author can already
/// seed `filepaths` themselves and have it win over the run-wide scope.
const PATH_SCOPE_KEY: &str = "konveyor.io/path-scope";
const EXCLUDED_PATHS_EXTRA: &str = "excludedPaths";

fn uri_basename(uri: &str) -> &str {
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    path.rsplit('/').next().unwrap_or(path)
}

/// Restricts evaluation (by basename) to an explicit allow-list of paths.
///
/// If a rule has already seeded `filepaths` on the path-scope template (by
/// its own condition's `As` binding), this scope leaves it untouched —
/// rule-author intent wins over the run-wide scope.
pub struct IncludedPathScope {
    paths: Vec<String>,
}

impl IncludedPathScope {
    /// Build a scope from an explicit path allow-list.
    #[must_use]
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }
}

impl Scope for IncludedPathScope {
    fn name(&self) -> &str {
        "included-path-scope"
    }

    fn add_to_context(&self, context: &mut ConditionContext) {
        let entry = context.template.entry(PATH_SCOPE_KEY.to_owned()).or_default();
        if entry.filepaths.is_empty() {
            entry.filepaths.clone_from(&self.paths);
        }
    }

    fn filter_response(&self, incident: &IncidentContext) -> bool {
        if self.paths.is_empty() {
            return false;
        }
        let basename = uri_basename(&incident.uri);
        !self.paths.iter().any(|path| path == basename)
    }
}

/// Drops incidents whose filename matches any of a set of regex patterns.
pub struct ExcludedPathScope {
    patterns: Vec<Regex>,
}

impl ExcludedPathScope {
    /// Compile `patterns`.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern fails to compile.
    pub fn new(patterns: &[String]) -> Result<Self> {
        let compiled = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|err| analyzer_domain::error::Error::invalid_regex(pattern, err.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns: compiled })
    }
}

impl Scope for ExcludedPathScope {
    fn name(&self) -> &str {
        "excluded-path-scope"
    }

    fn add_to_context(&self, context: &mut ConditionContext) {
        let names: Vec<serde_json::Value> = self
            .patterns
            .iter()
            .map(|pattern| serde_json::Value::String(pattern.as_str().to_owned()))
            .collect();
        let entry: &mut ChainTemplate = context.template.entry(PATH_SCOPE_KEY.to_owned()).or_default();
        entry
            .extras
            .insert(EXCLUDED_PATHS_EXTRA.to_owned(), serde_json::Value::Array(names));
    }

    fn filter_response(&self, incident: &IncidentContext) -> bool {
        if !incident.uri.starts_with("file://") {
            return false;
        }
        let basename = uri_basename(&incident.uri);
        self.patterns.iter().any(|pattern| pattern.is_match(basename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incident(uri: &str) -> IncidentContext {
        IncidentContext {
            uri: uri.to_owned(),
            ..IncidentContext::default()
        }
    }

    #[test]
    fn included_scope_passes_all_when_empty() {
        let scope = IncludedPathScope::new(vec![]);
        assert!(!scope.filter_response(&incident("file:///src/main.rs")));
    }

    #[test]
    fn included_scope_drops_non_matching_basename() {
        let scope = IncludedPathScope::new(vec!["main.rs".to_owned()]);
        assert!(!scope.filter_response(&incident("file:///src/main.rs")));
        assert!(scope.filter_response(&incident("file:///src/lib.rs")));
    }

    #[test]
    fn included_scope_does_not_override_existing_filepaths() {
        let scope = IncludedPathScope::new(vec!["main.rs".to_owned()]);
        let mut context = ConditionContext::new();
        context.template.insert(
            PATH_SCOPE_KEY.to_owned(),
            ChainTemplate {
                filepaths: vec!["already-set.rs".to_owned()],
                extras: Default::default(),
            },
        );
        scope.add_to_context(&mut context);
        assert_eq!(
            context.template[PATH_SCOPE_KEY].filepaths,
            vec!["already-set.rs".to_owned()]
        );
    }

    #[test]
    fn excluded_scope_drops_matching_filename() {
        let scope = ExcludedPathScope::new(&["_test\\.rs$".to_owned()]).expect("valid pattern");
        assert!(scope.filter_response(&incident("file:///src/foo_test.rs")));
        assert!(!scope.filter_response(&incident("file:///src/foo.rs")));
    }
}
