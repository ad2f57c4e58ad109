use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::logging::LoggingConfig;
use crate::policy::{PolicyDef, RuleDef, RuleRaw, ScriptSource};
use crate::server::ServerConfig;
use crate::store::StoreConfig;
use crate::validate;

// ---------------------------------------------------------------------------
// Raw TOML structure (intermediate representation)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RulesConfigRaw {
    #[serde(default)]
    engine: EngineConfig,
    server: ServerConfig,
    #[serde(default)]
    store: StoreConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    rule: Vec<RuleRaw>,
    #[serde(default)]
    policy: Vec<PolicyDef>,
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Script backend identifier, matched case-insensitively against the
    /// alias table. Unknown values fall back to the default backend with a
    /// warning instead of failing.
    pub language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            language: "js".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// RulesConfig (resolved, validated)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RulesConfig {
    pub engine: EngineConfig,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    /// Flat rule catalog in declared order. Snippets are registered in the
    /// backend in exactly this order.
    pub rules: Vec<RuleDef>,
    /// Policies in declared order.
    pub policies: Vec<PolicyDef>,
}

impl RulesConfig {
    /// Read and parse a `workrules.toml` file, inlining `script_file`
    /// sources relative to the file's parent directory.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        let mut config: RulesConfig = content.parse()?;
        let base = path.parent().unwrap_or(Path::new("."));
        config.inline_scripts(base)?;
        Ok(config)
    }

    /// Replace every `ScriptSource::File` with the file's contents, resolved
    /// against `base`.
    pub fn inline_scripts(&mut self, base: &Path) -> anyhow::Result<()> {
        for rule in &mut self.rules {
            if let ScriptSource::File(rel) = &rule.script {
                let full = if rel.is_absolute() {
                    rel.clone()
                } else {
                    base.join(rel)
                };
                let text = std::fs::read_to_string(&full).map_err(|e| {
                    anyhow::anyhow!(
                        "rule {:?}: failed to read {}: {e}",
                        rule.name,
                        full.display(),
                    )
                })?;
                rule.script = ScriptSource::Inline(text);
            }
        }
        Ok(())
    }
}

impl FromStr for RulesConfig {
    type Err = anyhow::Error;

    /// Parse a TOML string into a resolved, validated [`RulesConfig`].
    /// `script_file` sources stay unresolved until [`RulesConfig::load`] or
    /// [`RulesConfig::inline_scripts`] runs.
    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let raw: RulesConfigRaw = toml::from_str(toml_str)?;

        let mut rules = Vec::with_capacity(raw.rule.len());
        for rule in raw.rule {
            rules.push(rule.resolve()?);
        }

        let config = RulesConfig {
            engine: raw.engine,
            server: raw.server,
            store: raw.store,
            logging: raw.logging,
            rules,
            policies: raw.policy,
        };

        validate::validate(&config)?;

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use crate::policy::ChangeKind;

    const FULL_TOML: &str = r#"
[engine]
language = "js"

[server]
listen = "tcp://127.0.0.1:9400"
queue_capacity = 64

[store]
seed = "items.jsonl"
journal = "journal.jsonl"

[logging]
level = "info"
format = "plain"

[[rule]]
name = "estimate-rollup"
script = "estimate = estimate * 1.5"

[rule.scope]
item_types = ["task"]
has_fields = ["estimate"]

[[rule]]
name = "flag-stale"
script = "stale = true"

[rule.scope.field_matches]
state = "^closed$"

[[policy]]
name = "website"
rules = ["estimate-rollup", "flag-stale"]

[policy.scope]
collection = "fabrikam*"
projects = ["website", "api"]
changes = ["created", "updated"]

[[policy]]
name = "catch-all"
rules = ["flag-stale"]
"#;

    #[test]
    fn load_full_toml() {
        let cfg: RulesConfig = FULL_TOML.parse().unwrap();

        assert_eq!(cfg.engine.language, "js");
        assert_eq!(cfg.server.listen, "tcp://127.0.0.1:9400");
        assert_eq!(cfg.server.queue_capacity, 64);
        assert_eq!(cfg.store.seed.as_deref(), Some(Path::new("items.jsonl")));
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, LogFormat::Plain);

        assert_eq!(cfg.rules.len(), 2);
        assert_eq!(cfg.rules[0].name, "estimate-rollup");
        assert_eq!(
            cfg.rules[0].scope.item_types,
            Some(vec!["task".to_string()]),
        );
        assert_eq!(
            cfg.rules[0].script.text(),
            Some("estimate = estimate * 1.5"),
        );
        assert_eq!(cfg.rules[1].name, "flag-stale");
        let matches = cfg.rules[1].scope.field_matches.as_ref().unwrap();
        assert_eq!(matches["state"], "^closed$");

        assert_eq!(cfg.policies.len(), 2);
        assert_eq!(cfg.policies[0].name, "website");
        assert_eq!(cfg.policies[0].rules, vec!["estimate-rollup", "flag-stale"]);
        assert_eq!(
            cfg.policies[0].scope.collection.as_deref(),
            Some("fabrikam*"),
        );
        assert_eq!(
            cfg.policies[0].scope.changes,
            Some(vec![ChangeKind::Created, ChangeKind::Updated]),
        );
        // catch-all declares no scope: every key unconstrained
        assert!(cfg.policies[1].scope.collection.is_none());
        assert!(cfg.policies[1].scope.projects.is_none());
        assert!(cfg.policies[1].scope.changes.is_none());
    }

    #[test]
    fn omitted_sections_use_defaults() {
        let toml = r#"
[server]
listen = "tcp://127.0.0.1:9400"

[[rule]]
name = "r"
script = "x = 1"

[[policy]]
name = "p"
rules = ["r"]
"#;
        let cfg: RulesConfig = toml.parse().unwrap();
        assert_eq!(cfg.engine.language, "js");
        assert_eq!(cfg.server.queue_capacity, 1024);
        assert!(cfg.store.seed.is_none());
        assert!(cfg.store.journal.is_none());
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn missing_server_fails() {
        let toml = r#"
[[rule]]
name = "r"
script = "x = 1"

[[policy]]
name = "p"
rules = ["r"]
"#;
        assert!(toml.parse::<RulesConfig>().is_err());
    }

    #[test]
    fn reject_invalid_listen() {
        let toml = FULL_TOML.replace("tcp://127.0.0.1:9400", "http://127.0.0.1:9400");
        assert!(toml.parse::<RulesConfig>().is_err());
    }

    #[test]
    fn reject_zero_queue_capacity() {
        let toml = FULL_TOML.replace("queue_capacity = 64", "queue_capacity = 0");
        assert!(toml.parse::<RulesConfig>().is_err());
    }

    #[test]
    fn reject_unknown_log_level() {
        let toml = FULL_TOML.replace("level = \"info\"", "level = \"verbose\"");
        assert!(toml.parse::<RulesConfig>().is_err());
    }

    #[test]
    fn reject_duplicate_rule_name() {
        let toml = FULL_TOML.replace("name = \"flag-stale\"", "name = \"estimate-rollup\"");
        let err = toml.parse::<RulesConfig>().unwrap_err();
        assert!(err.to_string().contains("duplicate rule name"), "{err}");
    }

    #[test]
    fn reject_unknown_rule_reference() {
        let toml = FULL_TOML.replace("rules = [\"flag-stale\"]", "rules = [\"missing\"]");
        let err = toml.parse::<RulesConfig>().unwrap_err();
        assert!(err.to_string().contains("unknown rule"), "{err}");
    }

    #[test]
    fn reject_policy_without_rules() {
        let toml = FULL_TOML.replace("rules = [\"flag-stale\"]", "rules = []");
        let err = toml.parse::<RulesConfig>().unwrap_err();
        assert!(err.to_string().contains("references no rules"), "{err}");
    }

    #[test]
    fn reject_invalid_field_regex() {
        let toml = FULL_TOML.replace("state = \"^closed$\"", "state = \"(\"");
        let err = toml.parse::<RulesConfig>().unwrap_err();
        assert!(err.to_string().contains("field_matches"), "{err}");
    }

    #[test]
    fn reject_config_without_rules() {
        let toml = r#"
[server]
listen = "tcp://127.0.0.1:9400"

[[policy]]
name = "p"
rules = ["r"]
"#;
        let err = toml.parse::<RulesConfig>().unwrap_err();
        assert!(err.to_string().contains("[[rule]]"), "{err}");
    }

    #[test]
    fn load_inlines_script_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("scripts")).unwrap();
        std::fs::write(dir.path().join("scripts/bump.calc"), "estimate = estimate + 1").unwrap();
        let config_path = dir.path().join("workrules.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
listen = "tcp://127.0.0.1:9400"

[[rule]]
name = "bump"
script_file = "scripts/bump.calc"

[[policy]]
name = "p"
rules = ["bump"]
"#,
        )
        .unwrap();

        let cfg = RulesConfig::load(&config_path).unwrap();
        assert_eq!(cfg.rules[0].script.text(), Some("estimate = estimate + 1"));
    }

    #[test]
    fn load_reports_missing_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("workrules.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
listen = "tcp://127.0.0.1:9400"

[[rule]]
name = "bump"
script_file = "scripts/nope.calc"

[[policy]]
name = "p"
rules = ["bump"]
"#,
        )
        .unwrap();

        let err = RulesConfig::load(&config_path).unwrap_err();
        assert!(err.to_string().contains("failed to read"), "{err}");
    }
}
