//! The ruleset loader (§4.7): reads YAML rule files into the domain model.

use std::path::{Path, PathBuf};

use analyzer_domain::error::{Error, Result};
use analyzer_domain::model::{Condition, ConditionEntry, CustomVariable, Link, Perform, ProviderCondition, Rule, RuleSet};
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RuleSetDocument {
    name: String,
    description: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    rules: Vec<RuleDocument>,
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    #[serde(rename = "ruleID")]
    rule_id: String,
    description: Option<String>,
    category: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    effort: Option<u32>,
    when: serde_yaml::Value,
    message: Option<String>,
    #[serde(default)]
    tag: Vec<String>,
    #[serde(default, rename = "customVariables")]
    custom_variables: Vec<CustomVariableDocument>,
    #[serde(default)]
    links: Vec<LinkDocument>,
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomVariableDocument {
    pattern: String,
    name: String,
    #[serde(rename = "defaultValue")]
    default_value: Option<String>,
    #[serde(rename = "captureGroup")]
    capture_group: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkDocument {
    url: String,
    title: Option<String>,
}

/// Load every ruleset found at `path`: a single YAML file, or a directory
/// walked (in sorted path order, for reproducibility) for `*.yaml`/`*.yml`.
///
/// # Errors
///
/// Returns an error if a file cannot be read, is not valid YAML, or
/// describes a malformed rule (bad regex, unknown composite shape, missing
/// `when`); the offending rule id is named in the error.
pub fn load_path(path: &Path) -> Result<Vec<RuleSet>> {
    if path.is_dir() {
        load_dir(path)
    } else {
        Ok(vec![load_file(path)?])
    }
}

fn load_dir(dir: &Path) -> Result<Vec<RuleSet>> {
    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            matches!(
                path.extension().and_then(std::ffi::OsStr::to_str),
                Some("yaml" | "yml")
            )
        })
        .collect();
    paths.sort();
    paths.iter().map(|path| load_file(path)).collect()
}

fn load_file(path: &Path) -> Result<RuleSet> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| Error::io_with_source(format!("reading {}", path.display()), err))?;
    let doc: RuleSetDocument = serde_yaml::from_str(&text)?;

    let mut rules = Vec::with_capacity(doc.rules.len());
    for rule_doc in doc.rules {
        let rule_id = rule_doc.rule_id.clone();
        let rule = convert_rule(rule_doc)
            .map_err(|err| Error::configuration_with_source(format!("rule '{rule_id}' is invalid"), err))?;
        rules.push(rule);
    }

    Ok(RuleSet {
        name: doc.name,
        description: doc.description,
        labels: doc.labels,
        rules,
    })
}

fn convert_rule(doc: RuleDocument) -> Result<Rule> {
    let when = parse_condition(&doc.when)?;

    let mut custom_variables = Vec::with_capacity(doc.custom_variables.len());
    for variable in doc.custom_variables {
        let pattern = Regex::new(&variable.pattern)
            .map_err(|err| Error::invalid_regex(&variable.pattern, err.to_string()))?;
        custom_variables.push(CustomVariable {
            pattern,
            name: variable.name,
            default_value: variable.default_value,
            capture_group: variable.capture_group,
        });
    }

    let links = doc
        .links
        .into_iter()
        .map(|link| Link {
            url: link.url,
            title: link.title,
        })
        .collect();

    Ok(Rule {
        id: doc.rule_id,
        description: doc.description,
        category: doc.category,
        labels: doc.labels,
        effort: doc.effort,
        perform: Perform {
            message: doc.message,
            tag: doc.tag,
            links,
        },
        when,
        custom_variables,
        encoding: doc.encoding,
    })
}

/// Parse one condition mapping: `and`/`or`/`chain`/`hasTags`, or a single
/// `provider.capability: input` leaf key.
fn parse_condition(value: &serde_yaml::Value) -> Result<Condition> {
    let map = value
        .as_mapping()
        .ok_or_else(|| Error::configuration("condition must be a mapping"))?;

    if let Some(entries) = map.get("and") {
        return Ok(Condition::And(parse_entries(entries)?));
    }
    if let Some(entries) = map.get("or") {
        return Ok(Condition::Or(parse_entries(entries)?));
    }
    if let Some(entries) = map.get("chain") {
        return Ok(Condition::Chain(parse_entries(entries)?));
    }
    if let Some(tags) = map.get("hasTags") {
        let tags: Vec<String> = serde_yaml::from_value(tags.clone())?;
        return Ok(Condition::HasTags(tags));
    }

    if map.len() != 1 {
        return Err(Error::configuration(
            "leaf condition must have exactly one 'provider.capability' key",
        ));
    }
    let (key, input) = map.iter().next().expect("checked map.len() == 1 above");
    let key = key
        .as_str()
        .ok_or_else(|| Error::configuration("condition key must be a string"))?;
    let (provider, capability) = key
        .split_once('.')
        .ok_or_else(|| Error::configuration(format!("invalid provider capability key: {key}")))?;

    Ok(Condition::Provider(ProviderCondition {
        provider: provider.to_owned(),
        capability: capability.to_owned(),
        input: serde_json::to_value(input)?,
    }))
}

fn parse_entries(value: &serde_yaml::Value) -> Result<Vec<ConditionEntry>> {
    let list = value
        .as_sequence()
        .ok_or_else(|| Error::configuration("and/or/chain must be a list of condition entries"))?;
    list.iter().map(parse_entry).collect()
}

fn parse_entry(value: &serde_yaml::Value) -> Result<ConditionEntry> {
    let map = value
        .as_mapping()
        .ok_or_else(|| Error::configuration("condition entry must be a mapping"))?;

    let from = map.get("from").and_then(serde_yaml::Value::as_str).map(str::to_owned);
    let as_name = map.get("as").and_then(serde_yaml::Value::as_str).map(str::to_owned);
    let ignorable = map.get("ignorable").and_then(serde_yaml::Value::as_bool).unwrap_or(false);
    let not = map.get("not").and_then(serde_yaml::Value::as_bool).unwrap_or(false);

    let mut nested = serde_yaml::Mapping::new();
    for (key, entry_value) in map {
        if matches!(key.as_str(), Some("from" | "as" | "ignorable" | "not")) {
            continue;
        }
        nested.insert(key.clone(), entry_value.clone());
    }

    Ok(ConditionEntry {
        from,
        as_name,
        ignorable,
        not,
        condition: parse_condition(&serde_yaml::Value::Mapping(nested))?,
    })
}
