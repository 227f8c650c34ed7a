//! The violation builder (§4.5): turns a matched `ConditionResponse` into a
//! deduplicated, filtered, message-rendered `Violation`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use analyzer_domain::error::Result;
use analyzer_domain::model::{ConditionResponse, IncidentContext, Perform, Rule, Violation};
use analyzer_domain::ports::Scope;
use handlebars::Handlebars;
use regex::Regex;

use crate::selector;
use crate::snippet;

/// Knobs that parameterize violation construction, set once per run.
#[derive(Debug, Clone)]
pub struct BuilderOptions {
    /// Maximum incidents retained per violation (0 = uncapped).
    pub incident_limit: usize,
    /// Maximum lines retained per code snippet (0 = uncapped).
    pub code_snip_limit: usize,
    /// Lines of context included on each side of the matched line.
    pub context_lines: usize,
    /// Candidate prefixes stripped from `file://` URIs to produce relative paths.
    pub location_prefixes: Vec<String>,
    /// Optional boolean expression filtering incidents by their variables.
    pub incident_selector: Option<String>,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            incident_limit: 0,
            code_snip_limit: 0,
            context_lines: 2,
            location_prefixes: Vec::new(),
            incident_selector: None,
        }
    }
}

/// Builds `Violation`s from matched responses, given a run-wide scope and options.
pub struct ViolationBuilder<'a> {
    scope: &'a dyn Scope,
    options: &'a BuilderOptions,
    handlebars: Handlebars<'static>,
}

impl<'a> ViolationBuilder<'a> {
    /// Build a builder over `scope` and `options`, valid for one run.
    #[must_use]
    pub fn new(scope: &'a dyn Scope, options: &'a BuilderOptions) -> Self {
        Self {
            scope,
            options,
            handlebars: Handlebars::new(),
        }
    }

    /// Process a matched response into a violation, or `None` if every
    /// incident was filtered out along the way.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured incident selector fails to parse.
    pub fn build(
        &self,
        rule: &Rule,
        ruleset_labels: &[String],
        response: ConditionResponse,
    ) -> Result<Option<Violation>> {
        let incidents = if self.options.incident_limit > 0 {
            response.incidents.into_iter().take(self.options.incident_limit).collect::<Vec<_>>()
        } else {
            response.incidents
        };

        let mut processed = Vec::new();
        let mut seen = HashSet::new();

        for mut incident in incidents {
            if self.scope.filter_response(&incident) {
                continue;
            }

            self.rewrite_uri(&mut incident);
            self.attach_snippet(rule, &mut incident);
            self.extract_custom_variables(rule, &mut incident);
            self.render_message(rule, &mut incident);

            if let Some(expr) = self.options.incident_selector.as_deref() {
                if !selector::evaluate(expr, &incident.variables)? {
                    continue;
                }
            }

            let key = (incident.uri.clone(), incident.message.clone(), incident.line_number);
            if !seen.insert(key) {
                continue;
            }
            processed.push(incident);
        }

        if processed.is_empty() {
            return Ok(None);
        }

        let mut violation = Violation {
            description: rule.description.clone(),
            category: rule.category.clone(),
            labels: Vec::new(),
            incidents: processed,
            links: rule.perform.links.clone(),
            effort: rule.effort,
            extras: std::collections::HashMap::new(),
        };
        violation.extend_labels(ruleset_labels.iter().cloned());
        violation.extend_labels(rule.labels.iter().cloned());
        Ok(Some(violation))
    }

    fn rewrite_uri(&self, incident: &mut IncidentContext) {
        let Some(path) = incident.uri.strip_prefix("file://").map(str::to_owned) else {
            return;
        };
        for prefix in &self.options.location_prefixes {
            if let Some(relative) = path.strip_prefix(prefix.as_str()) {
                let relative = relative.trim_start_matches('/').to_owned();
                incident.uri = format!("file://{relative}");
                if incident.variables.contains_key("file") {
                    incident.variables.insert("file".to_owned(), relative);
                }
                return;
            }
        }
    }

    fn attach_snippet(&self, rule: &Rule, incident: &mut IncidentContext) {
        let Some(line_number) = incident.line_number else {
            return;
        };
        let Some(path) = incident.uri.strip_prefix("file://") else {
            return;
        };
        match snippet::extract(
            Path::new(path),
            line_number,
            self.options.context_lines,
            self.options.code_snip_limit,
            rule.encoding.as_deref(),
        ) {
            Ok(snippet) => {
                incident.code_snip = Some(snippet.text);
                incident.code_location = Some(snippet.location);
            }
            Err(err) => {
                tracing::warn!(%err, uri = %incident.uri, "failed to extract code snippet");
            }
        }
    }

    fn extract_custom_variables(&self, rule: &Rule, incident: &mut IncidentContext) {
        let Some(line_number) = incident.line_number else {
            return;
        };
        let Some(snippet_text) = incident.code_snip.clone() else {
            return;
        };
        let Some(line) = snippet::line_without_prefix(&snippet_text, line_number) else {
            return;
        };

        for variable in &rule.custom_variables {
            let value = capture(&variable.pattern, &line, variable.capture_group.as_deref())
                .or_else(|| variable.default_value.clone());
            if let Some(value) = value {
                incident.variables.insert(variable.name.clone(), value.trim().to_owned());
            }
        }
    }

    fn render_message(&self, rule: &Rule, incident: &mut IncidentContext) {
        let Some(template) = &rule.perform.message else {
            return;
        };
        let data = template_data(&incident.variables, incident.line_number);
        match self.handlebars.render_template(template, &data) {
            Ok(rendered) => incident.message = Some(rendered),
            Err(err) => {
                tracing::warn!(%err, rule_id = %rule.id, "failed to render message template");
            }
        }
    }
}

fn capture(pattern: &Regex, line: &str, capture_group: Option<&str>) -> Option<String> {
    let captures = pattern.captures(line)?;
    if let Some(name) = capture_group {
        if let Some(matched) = captures.name(name) {
            return Some(matched.as_str().to_owned());
        }
    }
    captures
        .get(1)
        .or_else(|| captures.get(0))
        .map(|matched| matched.as_str().to_owned())
}

fn template_data(
    variables: &std::collections::HashMap<String, String>,
    line_number: Option<usize>,
) -> serde_json::Value {
    let mut data = serde_json::Map::new();
    for (key, value) in variables {
        data.insert(key.clone(), serde_json::Value::String(value.clone()));
    }
    if let Some(line_number) = line_number {
        data.insert("lineNumber".to_owned(), serde_json::Value::Number(line_number.into()));
    }
    serde_json::Value::Object(data)
}

fn tag_split_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[\w\- ()]+=)?([\w\- (),]+(?:, *[\w\- (),]+)*),?$")
            .expect("tag split pattern is a valid static regex")
    })
}

/// Split a rendered tag string on comma, ignoring an optional `category=`
/// prefix (§4.5 "Tag rendering").
#[must_use]
pub fn split_tag_string(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    match tag_split_pattern().captures(trimmed).and_then(|c| c.get(1)) {
        Some(matched) => matched
            .as_str()
            .split(',')
            .map(|part| part.trim().to_owned())
            .filter(|part| !part.is_empty())
            .collect(),
        None => vec![trimmed.to_owned()],
    }
}

/// Render a tag rule's `Perform.tag` templates against each incident's
/// variables (when they contain `{{ }}` placeholders) and split the results
/// into individual tag strings.
#[must_use]
pub fn render_tags(perform: &Perform, incidents: &[IncidentContext], handlebars: &Handlebars) -> Vec<String> {
    let mut tags = Vec::new();
    for template in &perform.tag {
        if template.contains("{{") {
            for incident in incidents {
                let data = template_data(&incident.variables, incident.line_number);
                if let Ok(rendered) = handlebars.render_template(template, &data) {
                    tags.extend(split_tag_string(&rendered));
                }
            }
        } else {
            tags.extend(split_tag_string(template));
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyzer_domain::model::{Condition, ConditionContext};
    use std::collections::HashMap;

    struct PassScope;

    impl Scope for PassScope {
        fn name(&self) -> &str {
            "pass"
        }

        fn add_to_context(&self, _context: &mut ConditionContext) {}

        fn filter_response(&self, _incident: &IncidentContext) -> bool {
            false
        }
    }

    fn sample_rule() -> Rule {
        Rule {
            id: "dup-001".to_owned(),
            description: None,
            category: None,
            labels: Vec::new(),
            effort: Some(1),
            perform: Perform {
                message: Some("found".to_owned()),
                tag: Vec::new(),
                links: Vec::new(),
            },
            when: Condition::HasTags(Vec::new()),
            custom_variables: Vec::new(),
            encoding: None,
        }
    }

    /// An incident appearing twice with the same uri/message/line collapses
    /// to one violation incident (§4.5 step 7 "Incident dedup").
    #[test]
    fn build_deduplicates_identical_incidents() {
        let scope = PassScope;
        let options = BuilderOptions::default();
        let builder = ViolationBuilder::new(&scope, &options);
        let rule = sample_rule();

        let incident = IncidentContext {
            uri: "file:///tmp/does-not-exist.rs".to_owned(),
            line_number: Some(3),
            ..IncidentContext::default()
        };
        let response = ConditionResponse {
            matched: true,
            incidents: vec![incident.clone(), incident],
            template_context: HashMap::new(),
        };

        let violation = builder
            .build(&rule, &[], response)
            .expect("build succeeds")
            .expect("a violation is produced");
        assert_eq!(violation.incidents.len(), 1);
    }

    #[test]
    fn splits_plain_comma_list() {
        assert_eq!(
            split_tag_string("alpha, beta,gamma"),
            vec!["alpha".to_owned(), "beta".to_owned(), "gamma".to_owned()]
        );
    }

    #[test]
    fn strips_category_prefix() {
        assert_eq!(
            split_tag_string("category=alpha, beta"),
            vec!["alpha".to_owned(), "beta".to_owned()]
        );
    }
}
