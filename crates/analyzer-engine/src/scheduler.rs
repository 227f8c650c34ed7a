//! The rule scheduler (§4.4): classifies rules into dependency-ordered
//! batches and dispatches each batch to a bounded worker pool.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use analyzer_domain::error::Result;
use analyzer_domain::model::{ConditionContext, ConditionResponse, Rule, RuleSet, RuleSetResult};
use analyzer_domain::ports::{Scope, Stage};
use handlebars::Handlebars;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::evaluator::{self, ProviderRegistry};
use crate::progress::ProgressBus;
use crate::selector;
use crate::violation_builder::{render_tags, BuilderOptions, ViolationBuilder};

/// Knobs for one scheduler run.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Number of worker tasks evaluating rules concurrently.
    pub workers: usize,
    /// A boolean expression (§4.5 grammar) over rule labels; rules that
    /// don't match are recorded as skipped and never dispatched.
    pub rule_selector: Option<String>,
    /// Options forwarded to the violation builder.
    pub builder: BuilderOptions,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            rule_selector: None,
            builder: BuilderOptions::default(),
        }
    }
}

/// Classifies and dispatches a ruleset's rules to a bounded worker pool in
/// three strictly ordered batches (§4.4).
pub struct RuleScheduler {
    providers: Arc<ProviderRegistry>,
    scope: Arc<dyn Scope>,
    options: SchedulerOptions,
    progress: Option<Arc<ProgressBus>>,
}

#[derive(Clone)]
struct ClassifiedRule {
    rule: Arc<Rule>,
    is_tag_rule: bool,
}

struct WorkItem {
    rule: Arc<Rule>,
    is_tag_rule: bool,
    context: ConditionContext,
}

struct RuleOutcome {
    rule: Arc<Rule>,
    is_tag_rule: bool,
    result: Result<ConditionResponse>,
}

impl RuleScheduler {
    /// Build a scheduler over a provider registry and a run-wide scope.
    #[must_use]
    pub fn new(
        providers: ProviderRegistry,
        scope: Arc<dyn Scope>,
        options: SchedulerOptions,
        progress: Option<Arc<ProgressBus>>,
    ) -> Self {
        Self {
            providers: Arc::new(providers),
            scope,
            options,
            progress,
        }
    }

    /// Run every rule in `ruleset` to completion, in dependency order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the rule selector expression itself is
    /// malformed; per-rule provider/evaluation failures are recorded in the
    /// returned result's `errors` map instead of aborting the run.
    pub async fn run(&self, ruleset: &RuleSet, cancel: &CancellationToken) -> Result<RuleSetResult> {
        let mut result = RuleSetResult::new(ruleset.name.clone(), ruleset.description.clone());

        let eligible = self.select_rules(&ruleset.rules, &mut result)?;
        let (initial_tag, dependent_tag, violation) = classify(&eligible);

        if let Some(bus) = &self.progress {
            bus.emit(Stage::RuleExecution, format!("evaluating ruleset '{}'", ruleset.name)).await;
        }

        let mut tags: HashSet<String> = HashSet::new();
        let handlebars = Handlebars::new();
        let builder = ViolationBuilder::new(self.scope.as_ref(), &self.options.builder);

        for batch in [initial_tag, dependent_tag, violation] {
            if batch.is_empty() {
                continue;
            }
            let produced = self
                .run_batch(&ruleset.labels, &batch, &tags, &builder, &handlebars, &mut result, cancel)
                .await?;
            tags.extend(produced);
        }

        let mut sorted_tags: Vec<String> = tags.into_iter().collect();
        sorted_tags.sort();
        result.tags = sorted_tags;

        if let Some(bus) = &self.progress {
            bus.emit(Stage::Complete, format!("finished ruleset '{}'", ruleset.name)).await;
        }

        Ok(result)
    }

    fn select_rules(&self, rules: &[Rule], result: &mut RuleSetResult) -> Result<Vec<Rule>> {
        let Some(expression) = &self.options.rule_selector else {
            return Ok(rules.to_vec());
        };
        let mut eligible = Vec::with_capacity(rules.len());
        for rule in rules {
            let variables: HashMap<String, String> = rule
                .labels
                .iter()
                .map(|label| match label.split_once('=') {
                    Some((key, value)) => (key.to_owned(), value.to_owned()),
                    None => (label.clone(), String::new()),
                })
                .collect();
            if selector::evaluate(expression, &variables)? {
                eligible.push(rule.clone());
            } else {
                result.skipped.push(rule.id.clone());
            }
        }
        Ok(eligible)
    }

    /// Dispatch one batch to the worker pool and fold its outcomes into
    /// `result`, returning the tags this batch produced so the caller can
    /// merge them into the shared tag set once the whole batch has drained.
    async fn run_batch(
        &self,
        ruleset_labels: &[String],
        batch: &[ClassifiedRule],
        tags_snapshot: &HashSet<String>,
        builder: &ViolationBuilder<'_>,
        handlebars: &Handlebars<'_>,
        result: &mut RuleSetResult,
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>> {
        let (work_tx, work_rx) = mpsc::channel::<WorkItem>(10);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (response_tx, mut response_rx) = mpsc::channel::<RuleOutcome>(batch.len().max(1));

        let mut workers = JoinSet::new();
        for _ in 0..self.options.workers.max(1) {
            let work_rx = Arc::clone(&work_rx);
            let providers = Arc::clone(&self.providers);
            let response_tx = response_tx.clone();
            let cancel = cancel.clone();
            workers.spawn(async move {
                loop {
                    let item = {
                        let mut receiver = work_rx.lock().await;
                        receiver.recv().await
                    };
                    let Some(item) = item else {
                        break;
                    };
                    let mut context = item.context;
                    let result =
                        evaluator::evaluate(&mut context, &item.rule.when, &providers, &cancel).await;
                    if response_tx
                        .send(RuleOutcome {
                            rule: item.rule,
                            is_tag_rule: item.is_tag_rule,
                            result,
                        })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            });
        }
        drop(response_tx);

        let scope = Arc::clone(&self.scope);
        let dispatch_rules = batch.to_vec();
        let dispatch_tags = tags_snapshot.clone();
        let dispatch_cancel = cancel.clone();
        let dispatch_task = tokio::spawn(async move {
            for classified in dispatch_rules {
                if dispatch_cancel.is_cancelled() {
                    break;
                }
                let mut context = ConditionContext {
                    tags: dispatch_tags.clone(),
                    template: HashMap::new(),
                };
                scope.add_to_context(&mut context);
                let item = WorkItem {
                    rule: classified.rule,
                    is_tag_rule: classified.is_tag_rule,
                    context,
                };
                if work_tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        let mut produced_tags = HashSet::new();
        while let Some(outcome) = response_rx.recv().await {
            handle_outcome(ruleset_labels, outcome, builder, handlebars, &mut produced_tags, result)?;
        }

        let _ = dispatch_task.await;
        while workers.join_next().await.is_some() {}

        Ok(produced_tags)
    }
}

fn handle_outcome(
    ruleset_labels: &[String],
    outcome: RuleOutcome,
    builder: &ViolationBuilder<'_>,
    handlebars: &Handlebars<'_>,
    produced_tags: &mut HashSet<String>,
    result: &mut RuleSetResult,
) -> Result<()> {
    let rule = outcome.rule;

    let response = match outcome.result {
        Err(err) => {
            result.errors.insert(rule.id.clone(), err.to_string());
            return Ok(());
        }
        Ok(response) => response,
    };

    if !response.matched || response.incidents.is_empty() {
        result.unmatched.push(rule.id.clone());
        return Ok(());
    }

    if outcome.is_tag_rule {
        let rendered = render_tags(&rule.perform, &response.incidents, handlebars);
        for tag in &rendered {
            produced_tags.insert(tag.clone());
            result.add_tag(tag.clone());
        }

        let mut violation = analyzer_domain::model::Violation {
            description: rule.description.clone(),
            category: None,
            labels: ruleset_labels.to_vec(),
            incidents: response.incidents,
            links: rule.perform.links.clone(),
            effort: None,
            extras: HashMap::new(),
        };
        for tag in &rendered {
            violation.extend_labels(std::iter::once(format!("tag={tag}")));
        }
        result.insights.insert(rule.id.clone(), violation);
        return Ok(());
    }

    match builder.build(&rule, ruleset_labels, response)? {
        None => result.unmatched.push(rule.id.clone()),
        Some(violation) if rule.is_insight() => {
            result.insights.insert(rule.id.clone(), violation);
        }
        Some(violation) => {
            result.violations.insert(rule.id.clone(), violation);
        }
    }
    Ok(())
}

/// Classify rules into the three batches described in §4.4, splitting a
/// rule that both tags and emits a message into a tag-half (suffixed
/// `::tag`, see DESIGN.md) dispatched with the tag batches and a
/// message-half dispatched with the violation batch.
fn classify(rules: &[Rule]) -> (Vec<ClassifiedRule>, Vec<ClassifiedRule>, Vec<ClassifiedRule>) {
    let mut initial_tag = Vec::new();
    let mut dependent_tag = Vec::new();
    let mut violation = Vec::new();

    for rule in rules {
        let is_tag = rule.perform.is_tag_rule();
        let has_message = rule.perform.has_message();

        if is_tag {
            let tag_rule = if has_message { split_tag_half(rule) } else { Arc::new(rule.clone()) };
            let classified = ClassifiedRule {
                rule: tag_rule,
                is_tag_rule: true,
            };
            if rule.when.references_has_tags() {
                dependent_tag.push(classified);
            } else {
                initial_tag.push(classified);
            }
        }

        if has_message {
            let message_rule = if is_tag { split_message_half(rule) } else { Arc::new(rule.clone()) };
            violation.push(ClassifiedRule {
                rule: message_rule,
                is_tag_rule: false,
            });
        }
    }

    (initial_tag, dependent_tag, violation)
}

fn split_tag_half(rule: &Rule) -> Arc<Rule> {
    let mut tag_rule = rule.clone();
    tag_rule.id = format!("{}::tag", rule.id);
    tag_rule.perform.message = None;
    Arc::new(tag_rule)
}

fn split_message_half(rule: &Rule) -> Arc<Rule> {
    let mut message_rule = rule.clone();
    message_rule.perform.tag.clear();
    Arc::new(message_rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyzer_domain::model::{Condition, IncidentContext, Perform, ProviderCondition};
    use analyzer_domain::ports::{CompositeScope, ProviderClient};
    use async_trait::async_trait;
    use std::time::{Duration, Instant};

    fn rule(id: &str, effort: Option<u32>, message: Option<&str>, tag: Vec<String>, when: Condition) -> Rule {
        Rule {
            id: id.to_owned(),
            description: None,
            category: None,
            labels: Vec::new(),
            effort,
            perform: Perform {
                message: message.map(str::to_owned),
                tag,
                links: Vec::new(),
            },
            when,
            custom_variables: Vec::new(),
            encoding: None,
        }
    }

    fn provider_leaf(provider: &str, capability: &str) -> Condition {
        Condition::Provider(ProviderCondition {
            provider: provider.to_owned(),
            capability: capability.to_owned(),
            input: serde_json::Value::Null,
        })
    }

    /// Open Question 1 (DESIGN.md): a rule with both a tag and a message is
    /// split into an initial-tag half (`"{id}::tag"`, message stripped) and a
    /// violation half (original id, tag stripped).
    #[test]
    fn classify_splits_a_dual_tag_and_message_rule() {
        let dual = rule(
            "dual-001",
            Some(3),
            Some("found it"),
            vec!["category=migration".to_owned()],
            provider_leaf("static", "keyword.exists"),
        );

        let (initial_tag, dependent_tag, violation) = classify(std::slice::from_ref(&dual));

        assert!(dependent_tag.is_empty());
        assert_eq!(initial_tag.len(), 1);
        assert_eq!(initial_tag[0].rule.id, "dual-001::tag");
        assert!(initial_tag[0].rule.perform.message.is_none());
        assert!(initial_tag[0].is_tag_rule);

        assert_eq!(violation.len(), 1);
        assert_eq!(violation[0].rule.id, "dual-001");
        assert!(violation[0].rule.perform.tag.is_empty());
        assert!(!violation[0].is_tag_rule);
    }

    /// A tag rule whose condition references `hasTags` must run after the
    /// batch that produces tags, not alongside it.
    #[test]
    fn classify_routes_a_has_tags_dependent_tag_rule_separately() {
        let dependent = rule(
            "needs-tags",
            None,
            None,
            vec!["downstream".to_owned()],
            Condition::HasTags(vec!["upstream".to_owned()]),
        );

        let (initial_tag, dependent_tag, violation) = classify(std::slice::from_ref(&dependent));

        assert!(initial_tag.is_empty());
        assert!(violation.is_empty());
        assert_eq!(dependent_tag.len(), 1);
        assert_eq!(dependent_tag[0].rule.id, "needs-tags");
    }

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
            Ok(self.responses.get(capability).cloned().unwrap_or_default())
        }
    }

    fn hit_response() -> ConditionResponse {
        ConditionResponse {
            matched: true,
            incidents: vec![IncidentContext {
                uri: "file:///tmp/a.rs".to_owned(),
                ..IncidentContext::default()
            }],
            template_context: HashMap::new(),
        }
    }

    fn scheduler_with(registry: ProviderRegistry, workers: usize) -> RuleScheduler {
        let scope: Arc<dyn Scope> = Arc::new(CompositeScope::new(Vec::new()));
        let options = SchedulerOptions {
            workers,
            ..SchedulerOptions::default()
        };
        RuleScheduler::new(registry, scope, options, None)
    }

    /// Scenario 8 (§8): a rule with `effort: 0` routes its match to
    /// `insights`; a rule with a positive effort routes to `violations`.
    #[tokio::test]
    async fn effort_zero_routes_to_insights_not_violations() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StaticProvider {
            responses: HashMap::from([("hit".to_owned(), hit_response())]),
        }));

        let ruleset = RuleSet {
            name: "sample".to_owned(),
            description: None,
            labels: Vec::new(),
            rules: vec![
                rule("insight-001", Some(0), Some("found"), Vec::new(), provider_leaf("static", "hit")),
                rule("violation-001", Some(3), Some("found"), Vec::new(), provider_leaf("static", "hit")),
            ],
        };

        let scheduler = scheduler_with(registry, 2);
        let cancel = CancellationToken::new();
        let result = scheduler.run(&ruleset, &cancel).await.expect("run succeeds");

        assert!(result.insights.contains_key("insight-001"));
        assert!(!result.violations.contains_key("insight-001"));
        assert!(result.violations.contains_key("violation-001"));
        assert!(!result.insights.contains_key("violation-001"));
    }

    struct DelayProvider {
        delay: Duration,
    }

    #[async_trait]
    impl ProviderClient for DelayProvider {
        fn name(&self) -> &str {
            "delay"
        }

        fn capabilities(&self) -> Vec<String> {
            vec!["slow.wait".to_owned()]
        }

        async fn evaluate(
            &self,
            _context: &ConditionContext,
            _capability: &str,
            _input: &serde_json::Value,
            _cancel: &CancellationToken,
        ) -> Result<ConditionResponse> {
            tokio::time::sleep(self.delay).await;
            Ok(ConditionResponse::unmatched())
        }
    }

    /// Scenario 6 (§8): ten rules each carrying a synthetic delay, dispatched
    /// to a pool of workers, complete in roughly `ceil(10 / workers)` delays
    /// rather than ten delays run one after another.
    #[tokio::test]
    async fn worker_pool_bounds_wall_clock_by_worker_count() {
        let delay = Duration::from_millis(15);
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(DelayProvider { delay }));

        let rules = (0..10)
            .map(|i| rule(&format!("rule-{i}"), Some(1), Some("slow"), Vec::new(), provider_leaf("delay", "slow.wait")))
            .collect();
        let ruleset = RuleSet {
            name: "sample".to_owned(),
            description: None,
            labels: Vec::new(),
            rules,
        };

        let scheduler = scheduler_with(registry, 5);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        scheduler.run(&ruleset, &cancel).await.expect("run succeeds");
        let elapsed = start.elapsed();

        // ceil(10 / 5) = 2 batches of `delay`; serial execution would take 10.
        assert!(
            elapsed < delay * 6,
            "expected worker concurrency to bound wall-clock, took {elapsed:?}"
        );
    }
}
