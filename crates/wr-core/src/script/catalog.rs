use std::collections::BTreeMap;

use crate::error::ScriptError;

/// Lifecycle of a backend's snippet catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing loaded yet.
    Unloaded,
    /// At least one snippet accepted, catalog still open.
    Loading,
    /// Catalog sealed; snippets may run.
    Ready,
}

/// Named snippet storage shared by every backend.
///
/// Backends differ in what a compiled snippet is, not in how the catalog
/// behaves: loads are rejected after sealing, duplicate names are rejected
/// outright, and nothing runs before the seal.
#[derive(Debug)]
pub struct SnippetCatalog<T> {
    state: EngineState,
    entries: BTreeMap<String, T>,
}

impl<T> SnippetCatalog<T> {
    pub fn new() -> Self {
        Self {
            state: EngineState::Unloaded,
            entries: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accept a compiled snippet under a unique name.
    pub fn insert(&mut self, name: &str, snippet: T) -> Result<(), ScriptError> {
        if self.state == EngineState::Ready {
            return Err(ScriptError::Sealed(name.to_string()));
        }
        if self.entries.contains_key(name) {
            return Err(ScriptError::DuplicateSnippet(name.to_string()));
        }
        self.entries.insert(name.to_string(), snippet);
        self.state = EngineState::Loading;
        Ok(())
    }

    /// Seal the catalog; loading is over, running may begin.
    pub fn seal(&mut self) -> Result<(), ScriptError> {
        if self.state == EngineState::Ready {
            return Err(ScriptError::AlreadySealed);
        }
        self.state = EngineState::Ready;
        Ok(())
    }

    /// Look up a snippet for execution.
    pub fn get(&self, name: &str) -> Result<&T, ScriptError> {
        if self.state != EngineState::Ready {
            return Err(ScriptError::NotReady);
        }
        self.entries
            .get(name)
            .ok_or_else(|| ScriptError::UnknownSnippet(name.to_string()))
    }
}

impl<T> Default for SnippetCatalog<T> {
    fn default() -> Self {
        Self::new()
    }
}
