//! The condition evaluator (§4.1): AND/OR/CHAIN composition over provider
//! leaves, with `As`/`From` context passing and entry-level `Not`/`Ignorable`.

use std::collections::HashMap;
use std::sync::Arc;

use analyzer_domain::error::{Error, Result};
use analyzer_domain::model::{ChainTemplate, Condition, ConditionContext, ConditionEntry, ConditionResponse};
use analyzer_domain::ports::ProviderClient;
use tokio_util::sync::CancellationToken;

use crate::sorter::sort_entries;

/// Maps provider names to the clients rules may address in `Condition::Provider`.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own `name()`.
    pub fn register(&mut self, provider: Arc<dyn ProviderClient>) {
        self.providers.insert(provider.name().to_owned(), provider);
    }

    fn get(&self, name: &str) -> Result<&Arc<dyn ProviderClient>> {
        self.providers
            .get(name)
            .ok_or_else(|| Error::configuration(format!("unknown provider: {name}")))
    }
}

/// Evaluate a rule's condition tree against `context`, mutating `context`
/// as `As` bindings are produced.
///
/// # Errors
///
/// Returns an error on an empty composite, an unresolved `From` reference,
/// an unknown provider, or any error the provider itself returns.
pub async fn evaluate(
    context: &mut ConditionContext,
    condition: &Condition,
    registry: &ProviderRegistry,
    cancel: &CancellationToken,
) -> Result<ConditionResponse> {
    match condition {
        Condition::Provider(leaf) => {
            let provider = registry.get(&leaf.provider)?;
            provider
                .evaluate(context, &leaf.capability, &leaf.input, cancel)
                .await
        }
        Condition::HasTags(tags) => {
            let matched = tags.iter().all(|tag| context.tags.contains(tag));
            Ok(if matched {
                ConditionResponse::matched()
            } else {
                ConditionResponse::unmatched()
            })
        }
        Condition::And(entries) => evaluate_and_or(context, entries, true, registry, cancel).await,
        Condition::Or(entries) => evaluate_and_or(context, entries, false, registry, cancel).await,
        Condition::Chain(entries) => evaluate_chain(context, entries, registry, cancel).await,
    }
}

/// Shared entry bookkeeping: resolve `From`, evaluate the nested condition,
/// register `As`, and apply `Not`. Returns the inverted match plus the raw
/// response so callers can fold incidents/templateContext per their own rules.
async fn evaluate_entry(
    context: &mut ConditionContext,
    entry: &ConditionEntry,
    registry: &ProviderRegistry,
    cancel: &CancellationToken,
) -> Result<(bool, ConditionResponse)> {
    if let Some(from) = &entry.from {
        if !context.template.contains_key(from) {
            return Err(Error::missing_context(from.clone()));
        }
    }

    let response = Box::pin(evaluate(context, &entry.condition, registry, cancel)).await?;

    if let Some(as_name) = &entry.as_name {
        context.template.insert(
            as_name.clone(),
            ChainTemplate {
                filepaths: incidents_to_filepaths(&response.incidents),
                extras: response.template_context.clone(),
            },
        );
    }

    let matched = response.matched ^ entry.not;
    Ok((matched, response))
}

async fn evaluate_and_or(
    context: &mut ConditionContext,
    entries: &[ConditionEntry],
    is_and: bool,
    registry: &ProviderRegistry,
    cancel: &CancellationToken,
) -> Result<ConditionResponse> {
    if entries.is_empty() {
        return Err(Error::EmptyComposite);
    }
    let sorted = sort_entries(entries);

    let mut aggregate = ConditionResponse {
        matched: is_and,
        ..ConditionResponse::default()
    };

    for entry in &sorted {
        let (matched, response) = evaluate_entry(context, entry, registry, cancel).await?;

        if is_and {
            aggregate.matched &= matched;
        } else {
            aggregate.matched |= matched;
        }

        if !entry.ignorable {
            aggregate.incidents.extend(response.incidents);
        }
        aggregate.template_context.extend(response.template_context);
    }

    Ok(aggregate)
}

async fn evaluate_chain(
    context: &mut ConditionContext,
    entries: &[ConditionEntry],
    registry: &ProviderRegistry,
    cancel: &CancellationToken,
) -> Result<ConditionResponse> {
    if entries.is_empty() {
        return Err(Error::EmptyComposite);
    }

    let mut aggregate = ConditionResponse::default();

    for entry in entries {
        let (matched, response) = evaluate_entry(context, entry, registry, cancel).await?;

        aggregate.matched = matched;
        if !entry.ignorable {
            aggregate.incidents.extend(response.incidents);
        }
        aggregate.template_context.extend(response.template_context);
    }

    Ok(aggregate)
}

/// Convert incident URIs into filesystem paths for a chain template's
/// `filepaths`. Non-`file://` URIs pass through verbatim (§4.1 step 3).
fn incidents_to_filepaths(incidents: &[analyzer_domain::model::IncidentContext]) -> Vec<String> {
    incidents
        .iter()
        .map(|incident| match incident.uri.strip_prefix("file://") {
            Some(path) => path.to_owned(),
            None => incident.uri.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyzer_domain::model::{IncidentContext, ProviderCondition};
    use async_trait::async_trait;
    use rstest::rstest;

    /// A provider whose response per capability is fixed up front, so tests
    /// can assert on the evaluator's composition logic in isolation.
    struct StaticProvider {
        responses: HashMap<String, ConditionResponse>,
    }

    #[async_trait]
    impl ProviderClient for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        fn capabilities(&self) -> Vec<String> {
            self.responses.keys().cloned().collect()
        }

        async fn evaluate(
            &self,
            _context: &ConditionContext,
            capability: &str,
            _input: &serde_json::Value,
            _cancel: &CancellationToken,
        ) -> Result<ConditionResponse> {
            self.responses
                .get(capability)
                .cloned()
                .ok_or_else(|| Error::configuration(format!("no static response for {capability}")))
        }
    }

    fn registry_with(responses: HashMap<String, ConditionResponse>) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StaticProvider { responses }));
        registry
    }

    fn leaf(capability: &str) -> Condition {
        Condition::Provider(ProviderCondition {
            provider: "static".to_owned(),
            capability: capability.to_owned(),
            input: serde_json::Value::Null,
        })
    }

    fn entry(condition: Condition) -> ConditionEntry {
        ConditionEntry {
            from: None,
            as_name: None,
            ignorable: false,
            not: false,
            condition,
        }
    }

    /// Scenario 1 (§8): basic AND, both entries true.
    #[tokio::test]
    async fn and_matches_when_both_entries_match() {
        let mut responses = HashMap::new();
        responses.insert("always-true".to_owned(), ConditionResponse::matched());
        let registry = registry_with(responses);

        let condition = Condition::And(vec![entry(leaf("always-true")), entry(leaf("always-true"))]);
        let mut context = ConditionContext::new();
        let cancel = CancellationToken::new();

        let response = evaluate(&mut context, &condition, &registry, &cancel)
            .await
            .expect("evaluate succeeds");

        assert!(response.matched);
        assert!(response.incidents.is_empty());
    }

    /// Scenario 2 (§8): OR with mixed truth; both entries' templates merge
    /// into the aggregate regardless of which one matched.
    #[tokio::test]
    async fn or_matches_on_mixed_truth_and_merges_templates() {
        let mut responses = HashMap::new();
        responses.insert(
            "never".to_owned(),
            ConditionResponse {
                matched: false,
                incidents: Vec::new(),
                template_context: HashMap::from([("never".to_owned(), serde_json::json!(false))]),
            },
        );
        responses.insert(
            "always".to_owned(),
            ConditionResponse {
                matched: true,
                incidents: Vec::new(),
                template_context: HashMap::from([("always".to_owned(), serde_json::json!(true))]),
            },
        );
        let registry = registry_with(responses);

        let condition = Condition::Or(vec![entry(leaf("never")), entry(leaf("always"))]);
        let mut context = ConditionContext::new();
        let cancel = CancellationToken::new();

        let response = evaluate(&mut context, &condition, &registry, &cancel)
            .await
            .expect("evaluate succeeds");

        assert!(response.matched);
        assert!(response.template_context.contains_key("never"));
        assert!(response.template_context.contains_key("always"));
    }

    /// Scenario 3 (§8): CHAIN entry A's `As` binding is readable by entry
    /// B's `From`, and the chain template records both the filepaths and
    /// the producer's raw template data.
    #[tokio::test]
    async fn chain_passes_as_binding_into_from_reference() {
        let mut responses = HashMap::new();
        responses.insert(
            "produce".to_owned(),
            ConditionResponse {
                matched: true,
                incidents: vec![IncidentContext {
                    uri: "file://test.yaml".to_owned(),
                    ..IncidentContext::default()
                }],
                template_context: HashMap::from([(
                    "filepaths".to_owned(),
                    serde_json::json!(["test.yaml"]),
                )]),
            },
        );
        responses.insert("consume".to_owned(), ConditionResponse::matched());
        let registry = registry_with(responses);

        let condition = Condition::Chain(vec![
            ConditionEntry {
                as_name: Some("testing".to_owned()),
                ..entry(leaf("produce"))
            },
            ConditionEntry {
                from: Some("testing".to_owned()),
                ..entry(leaf("consume"))
            },
        ]);
        let mut context = ConditionContext::new();
        let cancel = CancellationToken::new();

        let response = evaluate(&mut context, &condition, &registry, &cancel)
            .await
            .expect("evaluate succeeds");

        assert!(response.matched);
        let testing = context.template.get("testing").expect("As binding recorded");
        assert_eq!(testing.filepaths, vec!["test.yaml".to_owned()]);
        assert_eq!(
            testing.extras.get("filepaths"),
            Some(&serde_json::json!(["test.yaml"]))
        );
    }

    /// Scenario 4 (§8): a `From` with no prior producer fails with a
    /// descriptive, stable error message.
    #[rstest]
    #[case("nope")]
    #[case("still-missing")]
    #[tokio::test]
    async fn chain_reports_missing_from_as_a_named_error(#[case] missing_name: &str) {
        let registry = registry_with(HashMap::new());
        let condition = Condition::Chain(vec![ConditionEntry {
            from: Some(missing_name.to_owned()),
            ..entry(leaf("anything"))
        }]);
        let mut context = ConditionContext::new();
        let cancel = CancellationToken::new();

        let err = evaluate(&mut context, &condition, &registry, &cancel)
            .await
            .expect_err("missing From must error");

        assert_eq!(err.to_string(), format!("unable to find context value: {missing_name}"));
    }
}
