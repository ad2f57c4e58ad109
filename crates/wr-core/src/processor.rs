use std::sync::{Arc, Mutex};

use wr_config::RulesConfig;

use crate::error::{CoreResult, config_failure, script_failure, store_failure};
use crate::event::{Notification, ProcessingResult, RequestContext};
use crate::observer::EngineObserver;
use crate::save::save_dirty;
use crate::scope::{PolicyScope, RuleScope};
use crate::script::{EngineKind, ScriptEngine, build_engine, fingerprint};
use crate::store::{Session, WorkItemStore};

/// A rule ready to execute: its record scope plus the snippet loaded under
/// its name.
pub struct Rule {
    pub name: String,
    pub scope: RuleScope,
}

/// A policy ready to match: its event scope plus its rules in declared
/// order.
pub struct Policy {
    pub name: String,
    pub scope: PolicyScope,
    pub rules: Vec<Rule>,
}

/// The rule engine.
///
/// Construction compiles every scope, loads every rule's snippet into the
/// configured backend in declared order and seals it. After that the
/// processor is shared freely; the backend sits behind a mutex, so
/// concurrent invocations serialize on script execution but nothing else.
pub struct EventProcessor {
    policies: Vec<Policy>,
    engine: Mutex<Box<dyn ScriptEngine>>,
    store: Arc<dyn WorkItemStore>,
    observer: Arc<dyn EngineObserver>,
}

impl std::fmt::Debug for EventProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProcessor")
            .field("policies", &self.policies.len())
            .finish_non_exhaustive()
    }
}

impl EventProcessor {
    pub fn new(
        config: &RulesConfig,
        store: Arc<dyn WorkItemStore>,
        observer: Arc<dyn EngineObserver>,
    ) -> CoreResult<Self> {
        let policies = compile_policies(config)?;

        let mut engine = build_engine(&config.engine.language, observer.as_ref());
        for rule in &config.rules {
            let source = rule.script.text().ok_or_else(|| {
                config_failure(format!(
                    "rule {:?}: script source not inlined, load the config from disk",
                    rule.name
                ))
            })?;
            engine.load(&rule.name, source).map_err(script_failure)?;
            observer.snippet_loaded(&rule.name, &fingerprint(source));
        }
        engine.load_completed().map_err(script_failure)?;

        Ok(Self {
            policies,
            engine: Mutex::new(engine),
            store,
            observer,
        })
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Backend variant actually in use.
    pub fn engine_kind(&self) -> EngineKind {
        self.engine.lock().expect("script engine lock poisoned").kind()
    }

    /// React to one change notification.
    ///
    /// Policies whose event scope does not match are filtered out first;
    /// when none is left the store is never contacted and the result is
    /// `no_operation`. Otherwise the target record is loaded into a fresh
    /// session, every matching rule runs in declared order against the same
    /// working copy, and the save phase persists what changed. A script or
    /// store failure aborts the invocation.
    pub fn process_event(
        &self,
        ctx: &RequestContext,
        notification: &Notification,
    ) -> CoreResult<ProcessingResult> {
        let matched: Vec<&Policy> = self
            .policies
            .iter()
            .filter(|p| p.scope.matches(ctx, notification))
            .collect();
        if matched.is_empty() {
            return Ok(ProcessingResult::no_operation());
        }

        let mut session = Session::new(self.store.as_ref());
        {
            let mut engine = self.engine.lock().expect("script engine lock poisoned");
            let item = session.get(notification.item_id).map_err(store_failure)?;
            for policy in &matched {
                self.observer.policy_applying(&policy.name);
                for rule in &policy.rules {
                    self.observer.rule_applying(&policy.name, &rule.name);
                    if rule.scope.matches(item) {
                        self.observer.rule_running(&rule.name, item);
                        engine.run(&rule.name, item).map_err(script_failure)?;
                    }
                }
            }
        }
        save_dirty(&mut session, self.observer.as_ref())?;
        Ok(ProcessingResult::success())
    }
}

fn compile_policies(config: &RulesConfig) -> CoreResult<Vec<Policy>> {
    let mut policies = Vec::with_capacity(config.policies.len());
    for def in &config.policies {
        let mut rules = Vec::with_capacity(def.rules.len());
        for name in &def.rules {
            let rule_def = config
                .rules
                .iter()
                .find(|r| r.name == *name)
                .ok_or_else(|| {
                    config_failure(format!(
                        "policy {:?} references unknown rule {:?}",
                        def.name, name
                    ))
                })?;
            rules.push(Rule {
                name: rule_def.name.clone(),
                scope: RuleScope::compile(&rule_def.scope)?,
            });
        }
        policies.push(Policy {
            name: def.name.clone(),
            scope: PolicyScope::compile(&def.scope),
            rules,
        });
    }
    Ok(policies)
}
