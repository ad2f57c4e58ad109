use std::collections::HashSet;

use crate::settings::RulesConfig;

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Internal validation, called automatically during `RulesConfig::from_str` /
/// `load`.
pub(crate) fn validate(config: &RulesConfig) -> anyhow::Result<()> {
    // server.listen must start with tcp://
    if !config.server.listen.starts_with("tcp://") {
        anyhow::bail!(
            "server.listen must start with \"tcp://\", got {:?}",
            config.server.listen,
        );
    }

    if config.server.queue_capacity == 0 {
        anyhow::bail!("server.queue_capacity must be > 0");
    }

    if !LEVELS.contains(&config.logging.level.as_str()) {
        anyhow::bail!(
            "logging.level must be one of error/warn/info/debug/trace, got {:?}",
            config.logging.level,
        );
    }
    for (module, level) in &config.logging.modules {
        if !LEVELS.contains(&level.as_str()) {
            anyhow::bail!("logging.modules[{:?}]: unknown level {:?}", module, level);
        }
    }

    // An engine with nothing to run is a config mistake, not a deployment.
    if config.rules.is_empty() {
        anyhow::bail!("at least one [[rule]] is required");
    }
    if config.policies.is_empty() {
        anyhow::bail!("at least one [[policy]] is required");
    }

    let mut rule_names = HashSet::new();
    for rule in &config.rules {
        if rule.name.is_empty() {
            anyhow::bail!("rule names must be nonempty");
        }
        if !rule_names.insert(rule.name.as_str()) {
            anyhow::bail!("duplicate rule name {:?}", rule.name);
        }
        if let Some(matches) = &rule.scope.field_matches {
            for (field, pattern) in matches {
                regex::Regex::new(pattern).map_err(|e| {
                    anyhow::anyhow!("rule {:?}: field_matches[{:?}]: {e}", rule.name, field)
                })?;
            }
        }
    }

    let mut policy_names = HashSet::new();
    for policy in &config.policies {
        if policy.name.is_empty() {
            anyhow::bail!("policy names must be nonempty");
        }
        if !policy_names.insert(policy.name.as_str()) {
            anyhow::bail!("duplicate policy name {:?}", policy.name);
        }
        if policy.rules.is_empty() {
            anyhow::bail!("policy {:?} references no rules", policy.name);
        }
        for name in &policy.rules {
            if !rule_names.contains(name.as_str()) {
                anyhow::bail!("policy {:?} references unknown rule {:?}", policy.name, name);
            }
        }
    }

    Ok(())
}
