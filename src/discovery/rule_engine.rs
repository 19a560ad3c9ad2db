// src/discovery/rule_engine.rs
// Pure prompt-rewriter (§3 `Rule`, §4.2.2 "Rule hook", §9 design notes:
// "Rule engine is a pure prompt-rewriter: (prompt, serverName, paramNames)
// -> prompt'. No mutable global state.").

use regex::Regex;
use tracing::warn;

use crate::config::{RuleActionsConfig, RuleFile, RuleItemConfig};

#[derive(Debug, Clone)]
pub struct RuleItem {
    pub name: String,
    pub triggers: Vec<String>,
    pub content_keywords: Vec<String>,
    pub actions: RuleActionsConfig,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub server_name: String,
    pub items: Vec<RuleItem>,
}

impl From<(String, RuleFile)> for Rule {
    fn from((server_name, file): (String, RuleFile)) -> Self {
        Self {
            server_name,
            items: file.items.into_iter().map(RuleItem::from).collect(),
        }
    }
}

impl From<RuleItemConfig> for RuleItem {
    fn from(cfg: RuleItemConfig) -> Self {
        Self {
            name: cfg.name,
            triggers: cfg.triggers,
            content_keywords: cfg.content_keywords,
            actions: cfg.rules,
        }
    }
}

/// Does this item apply for the given tool parameter names and query?
/// (§4.2.2: "trigger intersects the tool's parameter names OR whose
/// content keywords appear in the query (case-insensitive)").
fn item_applies(item: &RuleItem, param_names: &[String], query: &str) -> bool {
    let lowered_query = query.to_lowercase();

    let trigger_hit = item.triggers.iter().any(|t| param_names.iter().any(|p| p == t));
    let keyword_hit = item
        .content_keywords
        .iter()
        .any(|kw| lowered_query.contains(kw.to_lowercase().as_str()));

    trigger_hit || keyword_hit
}

/// Rewrite `prompt` by applying every matching rule item's actions, in
/// declared order: `context_add` appends text, `parameter_replace`
/// regex-replaces within the prompt string.
pub fn apply_rules(prompt: &str, rule: &Rule, param_names: &[String], query: &str) -> String {
    let mut rewritten = prompt.to_string();

    for item in &rule.items {
        if !item_applies(item, param_names, query) {
            continue;
        }

        if let Some(addition) = &item.actions.context_add {
            rewritten.push('\n');
            rewritten.push_str(addition);
        }

        for replacement in item.actions.parameter_replace.values() {
            match Regex::new(&replacement.pattern) {
                Ok(re) => {
                    rewritten = re.replace_all(&rewritten, replacement.replacement.as_str()).into_owned();
                }
                Err(e) => {
                    warn!("[discovery] invalid parameter_replace pattern '{}': {e}", replacement.pattern);
                }
            }
        }
    }

    rewritten
}
