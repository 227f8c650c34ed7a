//! Renders a run's `RuleSetResult`s as text or JSON for the CLI's stdout.

use analyzer_domain::error::{Error, Result};
use analyzer_domain::model::RuleSetResult;

/// Render `results` in `format` (`"text"` or `"json"`).
///
/// # Errors
///
/// Returns an error if `format` names neither, or JSON serialization fails.
pub fn render(results: &[RuleSetResult], format: &str) -> Result<String> {
    match format {
        "json" => serde_json::to_string_pretty(results).map_err(Error::from),
        "text" => Ok(render_text(results)),
        other => Err(Error::invalid_argument(format!(
            "unknown report format '{other}', expected 'text' or 'json'"
        ))),
    }
}

fn render_text(results: &[RuleSetResult]) -> String {
    let mut out = String::new();
    for result in results {
        out.push_str(&format!("# {}\n", result.name));
        if let Some(description) = &result.description {
            out.push_str(&format!("{description}\n"));
        }

        if result.violations.is_empty() {
            out.push_str("  no violations\n");
        }
        for (rule_id, violation) in sorted(&result.violations) {
            out.push_str(&format!(
                "  [violation] {rule_id} ({} incident(s), effort={})\n",
                violation.incidents.len(),
                violation.effort.unwrap_or(0)
            ));
            for incident in &violation.incidents {
                let location = match incident.line_number {
                    Some(line) => format!("{}:{line}", incident.uri),
                    None => incident.uri.clone(),
                };
                let message = incident.message.as_deref().unwrap_or_default();
                out.push_str(&format!("    {location}: {message}\n"));
            }
        }

        for (rule_id, insight) in sorted(&result.insights) {
            out.push_str(&format!(
                "  [insight] {rule_id} ({} incident(s))\n",
                insight.incidents.len()
            ));
        }

        if !result.tags.is_empty() {
            out.push_str(&format!("  tags: {}\n", result.tags.join(", ")));
        }
        if !result.errors.is_empty() {
            for (rule_id, message) in sorted_errors(&result.errors) {
                out.push_str(&format!("  [error] {rule_id}: {message}\n"));
            }
        }
        if !result.skipped.is_empty() {
            out.push_str(&format!("  skipped: {}\n", result.skipped.join(", ")));
        }
        out.push('\n');
    }
    out
}

fn sorted(
    map: &std::collections::HashMap<String, analyzer_domain::model::Violation>,
) -> Vec<(&String, &analyzer_domain::model::Violation)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn sorted_errors(map: &std::collections::HashMap<String, String>) -> Vec<(&String, &String)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trips_an_empty_result_set() {
        let results = vec![RuleSetResult::new("sample", None)];
        let rendered = render(&results, "json").expect("render json");
        assert!(rendered.contains("\"name\": \"sample\""));
    }

    #[test]
    fn text_reports_no_violations() {
        let results = vec![RuleSetResult::new("sample", None)];
        let rendered = render(&results, "text").expect("render text");
        assert!(rendered.contains("no violations"));
    }

    #[test]
    fn unknown_format_is_an_error() {
        let results = vec![RuleSetResult::new("sample", None)];
        assert!(render(&results, "xml").is_err());
    }
}
