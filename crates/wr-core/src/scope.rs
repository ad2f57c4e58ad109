use regex::Regex;
use wildmatch::WildMatch;
use wr_config::{ChangeKind, PolicyScopeConfig, RuleScopeConfig};

use crate::error::{CoreResult, config_failure};
use crate::event::{Notification, RequestContext};
use crate::item::WorkItem;

/// One compiled condition of a policy scope.
#[derive(Debug)]
enum PolicyCondition {
    Collection(WildMatch),
    Projects(Vec<WildMatch>),
    Changes(Vec<ChangeKind>),
}

/// Event-level scope of a policy. Conditions are conjunctive; an empty
/// scope matches every event.
#[derive(Debug, Default)]
pub struct PolicyScope {
    conditions: Vec<PolicyCondition>,
}

impl PolicyScope {
    pub fn compile(config: &PolicyScopeConfig) -> Self {
        let mut conditions = Vec::new();
        if let Some(pattern) = &config.collection {
            conditions.push(PolicyCondition::Collection(WildMatch::new(pattern)));
        }
        if let Some(patterns) = &config.projects {
            conditions.push(PolicyCondition::Projects(
                patterns.iter().map(|p| WildMatch::new(p)).collect(),
            ));
        }
        if let Some(changes) = &config.changes {
            conditions.push(PolicyCondition::Changes(changes.clone()));
        }
        Self { conditions }
    }

    pub fn matches(&self, ctx: &RequestContext, notification: &Notification) -> bool {
        self.conditions.iter().all(|cond| match cond {
            PolicyCondition::Collection(pattern) => pattern.matches(&ctx.collection),
            PolicyCondition::Projects(patterns) => {
                patterns.iter().any(|p| p.matches(&ctx.project))
            }
            PolicyCondition::Changes(kinds) => kinds.contains(&notification.change),
        })
    }
}

/// One compiled condition of a rule scope.
#[derive(Debug)]
enum RuleCondition {
    ItemTypes(Vec<WildMatch>),
    HasFields(Vec<String>),
    FieldMatches(Vec<(String, Regex)>),
}

/// Record-level scope of a rule. Conditions are conjunctive and evaluated
/// against the current working copy, so earlier rules can bring a record
/// into or out of scope.
#[derive(Debug, Default)]
pub struct RuleScope {
    conditions: Vec<RuleCondition>,
}

impl RuleScope {
    pub fn compile(config: &RuleScopeConfig) -> CoreResult<Self> {
        let mut conditions = Vec::new();
        if let Some(types) = &config.item_types {
            conditions.push(RuleCondition::ItemTypes(
                types.iter().map(|t| WildMatch::new(t)).collect(),
            ));
        }
        if let Some(fields) = &config.has_fields {
            conditions.push(RuleCondition::HasFields(fields.clone()));
        }
        if let Some(matches) = &config.field_matches {
            let mut compiled = Vec::with_capacity(matches.len());
            for (field, pattern) in matches {
                let re = Regex::new(pattern).map_err(|e| {
                    config_failure(format!("field_matches[{field:?}]: {e}"))
                })?;
                compiled.push((field.clone(), re));
            }
            conditions.push(RuleCondition::FieldMatches(compiled));
        }
        Ok(Self { conditions })
    }

    pub fn matches(&self, item: &WorkItem) -> bool {
        self.conditions.iter().all(|cond| match cond {
            RuleCondition::ItemTypes(patterns) => {
                patterns.iter().any(|p| p.matches(&item.kind))
            }
            RuleCondition::HasFields(fields) => {
                fields.iter().all(|f| item.field(f).is_some())
            }
            RuleCondition::FieldMatches(checks) => checks.iter().all(|(field, re)| {
                item.field(field)
                    .is_some_and(|value| re.is_match(&value.to_text()))
            }),
        })
    }
}
