use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Result;

use wr_config::RulesConfig;
use wr_core::{EventProcessor, MemoryStore, NullObserver};

/// Load a config file, compile every scope and snippet, and print a summary.
///
/// Exits non-zero when the config fails validation or a snippet fails to
/// compile, so `workrules check` works as a pre-deploy gate.
pub fn run(config: PathBuf) -> Result<()> {
    let config_path = config
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("config path '{}': {e}", config.display()))?;
    let rules_config = match RulesConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    // Building the processor against a scratch store compiles every policy
    // scope and loads every snippet into the backend, the same code path
    // the server takes at startup.
    let processor = match EventProcessor::new(
        &rules_config,
        Arc::new(MemoryStore::new()),
        Arc::new(NullObserver),
    ) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    println!("config:   {}", config_path.display());
    println!("backend:  {}", processor.engine_kind());
    println!("rules:    {}", rules_config.rules.len());
    println!("policies: {}", rules_config.policies.len());
    for policy in processor.policies() {
        println!("  {} ({} rule(s))", policy.name, policy.rules.len());
    }
    println!("configuration OK");

    Ok(())
}
