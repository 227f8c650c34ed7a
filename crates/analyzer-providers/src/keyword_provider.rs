//! A concrete, in-process provider (§4.8): greps source files under the
//! run's scope for a regex pattern. Stands in for a real language-server
//! or static-analysis backed provider so the engine is runnable end to end
//! without one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use analyzer_domain::error::{Error, Result};
use analyzer_domain::model::{ConditionContext, ConditionResponse, IncidentContext};
use analyzer_domain::ports::ProviderClient;
use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use regex::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

const CAPABILITY_KEYWORD_EXISTS: &str = "keyword.exists";
const PATH_SCOPE_KEY: &str = "konveyor.io/path-scope";

#[derive(Debug, Deserialize)]
struct KeywordInput {
    pattern: String,
    file_pattern: Option<String>,
}

/// Greps files under `root` (or the scope-seeded file list, when present)
/// line-by-line for a regex pattern.
pub struct KeywordProvider {
    root: PathBuf,
}

impl KeywordProvider {
    /// Build a provider rooted at `root`, used when no scope has seeded a
    /// narrower file list.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn candidate_files(&self, context: &ConditionContext, matcher: &GlobMatcher) -> Vec<PathBuf> {
        if let Some(template) = context.template.get(PATH_SCOPE_KEY) {
            if !template.filepaths.is_empty() {
                return template
                    .filepaths
                    .iter()
                    .map(PathBuf::from)
                    .filter(|path| matcher.is_match(path))
                    .collect();
            }
        }

        walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| matcher.is_match(path))
            .collect()
    }
}

#[async_trait]
impl ProviderClient for KeywordProvider {
    fn name(&self) -> &str {
        "keyword"
    }

    fn capabilities(&self) -> Vec<String> {
        vec![CAPABILITY_KEYWORD_EXISTS.to_owned()]
    }

    async fn evaluate(
        &self,
        context: &ConditionContext,
        capability: &str,
        input: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<ConditionResponse> {
        if capability != CAPABILITY_KEYWORD_EXISTS {
            return Err(Error::configuration(format!("unknown capability: {capability}")));
        }

        let input: KeywordInput = serde_json::from_value(input.clone())
            .map_err(|err| Error::configuration_with_source("invalid keyword.exists input", err))?;

        let glob_pattern = input.file_pattern.as_deref().unwrap_or("*");
        let matcher = Glob::new(glob_pattern)
            .map_err(|err| Error::configuration(format!("invalid file_pattern '{glob_pattern}': {err}")))?
            .compile_matcher();
        let pattern = Regex::new(&input.pattern)
            .map_err(|err| Error::invalid_regex(&input.pattern, err.to_string()))?;

        let mut incidents = Vec::new();
        for path in self.candidate_files(context, &matcher) {
            if cancel.is_cancelled() {
                break;
            }
            if let Some(found) = scan_file(&path, &pattern) {
                incidents.extend(found);
            }
        }

        let matched = !incidents.is_empty();
        Ok(ConditionResponse {
            matched,
            incidents,
            template_context: HashMap::new(),
        })
    }
}

fn scan_file(path: &Path, pattern: &Regex) -> Option<Vec<IncidentContext>> {
    let text = std::fs::read_to_string(path).ok()?;
    let mut incidents = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let Some(matched) = pattern.find(line) else {
            continue;
        };
        let mut variables = HashMap::new();
        variables.insert("match".to_owned(), matched.as_str().to_owned());
        incidents.push(IncidentContext {
            uri: format!("file://{}", path.display()),
            line_number: Some(index + 1),
            variables,
            code_location: None,
            links: Vec::new(),
            message: None,
            code_snip: None,
        });
    }
    Some(incidents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyzer_domain::model::ConditionContext;

    #[tokio::test]
    async fn finds_matching_lines_in_scope() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\nunwrap();\n").expect("write fixture");

        let provider = KeywordProvider::new(dir.path());
        let context = ConditionContext::new();
        let input = serde_json::json!({ "pattern": "unwrap", "file_pattern": "*.rs" });
        let cancel = CancellationToken::new();

        let response = provider
            .evaluate(&context, CAPABILITY_KEYWORD_EXISTS, &input, &cancel)
            .await
            .expect("evaluate succeeds");

        assert!(response.matched);
        assert_eq!(response.incidents.len(), 1);
        assert_eq!(response.incidents[0].line_number, Some(2));
    }

    #[tokio::test]
    async fn no_matches_is_unmatched() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\n").expect("write fixture");

        let provider = KeywordProvider::new(dir.path());
        let context = ConditionContext::new();
        let input = serde_json::json!({ "pattern": "unwrap" });
        let cancel = CancellationToken::new();

        let response = provider
            .evaluate(&context, CAPABILITY_KEYWORD_EXISTS, &input, &cancel)
            .await
            .expect("evaluate succeeds");

        assert!(!response.matched);
        assert!(response.incidents.is_empty());
    }
}
