//! Rules: a condition tree plus an action, and the custom-variable
//! extractors that enrich matched incidents.

use regex::Regex;

use super::condition::Condition;

/// A documentation or tracking link attached to a rule or violation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Link {
    /// Target URL.
    pub url: String,
    /// Human-readable title.
    pub title: Option<String>,
}

/// The action a matched rule performs: render a message, produce tags, or both.
///
/// A rule with both set is split by the scheduler at classification time
/// (§4.4) into a tag-only rule and a message-only rule so each can be
/// tracked independently in the ruleset result.
#[derive(Debug, Clone, Default)]
pub struct Perform {
    /// Mustache-style message template, rendered per incident.
    pub message: Option<String>,
    /// Tag template strings, rendered per incident and split on comma.
    pub tag: Vec<String>,
    /// Links surfaced on the resulting violation.
    pub links: Vec<Link>,
}

impl Perform {
    /// Whether this action produces tags.
    #[must_use]
    pub fn is_tag_rule(&self) -> bool {
        !self.tag.is_empty()
    }

    /// Whether this action renders a message (and is therefore a violation
    /// or insight, not a pure tag rule).
    #[must_use]
    pub fn has_message(&self) -> bool {
        self.message.is_some()
    }
}

/// A regex-driven variable extracted from the matched line of a snippet.
///
/// See §4.5 step 5: the pattern is matched against the snippet line whose
/// numeric prefix equals the incident's line number, after stripping the
/// prefix.
#[derive(Debug, Clone)]
pub struct CustomVariable {
    /// Pattern to match against the (prefix-stripped) snippet line.
    pub pattern: Regex,
    /// Name under which the captured value is stored in `variables`.
    pub name: String,
    /// Value used when the pattern doesn't match, or doesn't apply.
    pub default_value: Option<String>,
    /// Named capture group to prefer over the first submatch.
    pub capture_group: Option<String>,
}

/// A single addressable rule: metadata, an action, and a condition tree.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Unique id within its ruleset.
    pub id: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Violation category, e.g. `"mandatory"` or `"potential"`.
    pub category: Option<String>,
    /// Labels copied onto the resulting violation, merged with ruleset labels.
    pub labels: Vec<String>,
    /// Remediation effort; `None` or `Some(0)` routes the result to insights.
    pub effort: Option<u32>,
    /// The action performed when `when` matches.
    pub perform: Perform,
    /// The condition tree evaluated against the run's providers.
    pub when: Condition,
    /// Custom-variable extractors applied to each matched incident.
    pub custom_variables: Vec<CustomVariable>,
    /// Source encoding hint for code-snippet extraction (§6). `None` or
    /// `"utf-8"` reads bytes verbatim; other values (e.g. `"shift_jis"`)
    /// are decoded through a configured encoding table.
    pub encoding: Option<String>,
}

impl Rule {
    /// Whether this rule's effort routes a match to `insights` rather than
    /// `violations` (§4.5 "Insight vs Violation split").
    #[must_use]
    pub fn is_insight(&self) -> bool {
        matches!(self.effort, None | Some(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, true)]
    #[case(Some(0), true)]
    #[case(Some(1), false)]
    #[case(Some(13), false)]
    fn is_insight_follows_effort(#[case] effort: Option<u32>, #[case] expected: bool) {
        let rule = Rule {
            id: "r".to_owned(),
            description: None,
            category: None,
            labels: Vec::new(),
            effort,
            perform: Perform::default(),
            when: Condition::HasTags(Vec::new()),
            custom_variables: Vec::new(),
            encoding: None,
        };
        assert_eq!(rule.is_insight(), expected);
    }

    #[rstest]
    #[case(Perform { message: None, tag: Vec::new(), links: Vec::new() }, false, false)]
    #[case(Perform { message: Some("m".to_owned()), tag: Vec::new(), links: Vec::new() }, true, false)]
    #[case(Perform { message: None, tag: vec!["t".to_owned()], links: Vec::new() }, false, true)]
    #[case(Perform { message: Some("m".to_owned()), tag: vec!["t".to_owned()], links: Vec::new() }, true, true)]
    fn perform_flags_reflect_message_and_tag(
        #[case] perform: Perform,
        #[case] has_message: bool,
        #[case] is_tag_rule: bool,
    ) {
        assert_eq!(perform.has_message(), has_message);
        assert_eq!(perform.is_tag_rule(), is_tag_rule);
    }
}
