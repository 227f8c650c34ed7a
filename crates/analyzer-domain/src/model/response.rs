//! Provider and condition evaluation responses.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// A contiguous line range a code snippet was extracted from.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CodeLocation {
    /// First line included in the snippet (1-based).
    pub start_line: usize,
    /// Last line included in the snippet (1-based).
    pub end_line: usize,
}

/// A single source-code finding returned by a provider.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IncidentContext {
    /// File URI the incident belongs to, e.g. `file:///src/main.rs`.
    pub uri: String,
    /// 1-based line number, when the provider can attribute one.
    pub line_number: Option<usize>,
    /// Named variables captured by the provider or by custom-variable extraction.
    pub variables: HashMap<String, String>,
    /// Code location the snippet (if any) was read from.
    pub code_location: Option<CodeLocation>,
    /// Links surfaced alongside this incident.
    pub links: Vec<String>,
    /// Rendered message, filled in by the violation builder (§4.5 step 6).
    pub message: Option<String>,
    /// Extracted code snippet, filled in by the violation builder (§4.5 step 4).
    pub code_snip: Option<String>,
}

/// The result of evaluating a condition (leaf or composite).
#[derive(Debug, Clone, Default)]
pub struct ConditionResponse {
    /// Whether the condition matched.
    pub matched: bool,
    /// Incidents surfaced while evaluating the condition.
    pub incidents: Vec<IncidentContext>,
    /// Arbitrary template data produced by this condition, merged into the
    /// enclosing composite's chain template under the entry's `As` name.
    pub template_context: HashMap<String, Value>,
}

impl ConditionResponse {
    /// A passing response with no incidents and no template data.
    #[must_use]
    pub fn matched() -> Self {
        Self {
            matched: true,
            ..Self::default()
        }
    }

    /// A failing response with no incidents and no template data.
    #[must_use]
    pub fn unmatched() -> Self {
        Self::default()
    }
}
