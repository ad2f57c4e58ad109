use std::collections::BTreeMap;

use boa_engine::{Context, Source};

use crate::error::ScriptError;
use crate::item::{FieldValue, WorkItem};

use super::catalog::SnippetCatalog;
use super::{EngineKind, ScriptEngine};

/// Default backend: snippets are JavaScript bodies run against an `item`
/// object.
///
/// Only snippet sources are kept between runs; each run evaluates in a
/// fresh interpreter context, so no state leaks from one invocation into
/// the next and the engine stays `Send`.
pub struct JsEngine {
    catalog: SnippetCatalog<String>,
}

impl JsEngine {
    pub fn new() -> Self {
        Self {
            catalog: SnippetCatalog::new(),
        }
    }
}

impl Default for JsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for JsEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Js
    }

    fn load(&mut self, name: &str, source: &str) -> Result<(), ScriptError> {
        // Parse check only: the wrapped function is never called here.
        let probe = format!("(function() {{\n{source}\n}});");
        let mut context = Context::default();
        context
            .eval(Source::from_bytes(&probe))
            .map_err(|e| ScriptError::Compile {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        self.catalog.insert(name, source.to_string())
    }

    fn load_completed(&mut self) -> Result<(), ScriptError> {
        self.catalog.seal()
    }

    fn run(&mut self, name: &str, item: &mut WorkItem) -> Result<(), ScriptError> {
        let source = self.catalog.get(name)?;
        let item_json = serde_json::to_string(item)
            .map_err(|e| execution(name, format!("item encode: {e}")))?;
        let updated = eval_fields(name, source, &item_json)?;

        let present: Vec<String> = item.fields.keys().cloned().collect();
        for field in present {
            if !updated.contains_key(&field) {
                item.remove_field(&field);
            }
        }
        for (field, value) in &updated {
            let value = FieldValue::from_json(value).ok_or_else(|| {
                execution(name, format!("field {field:?} was set to an unsupported value"))
            })?;
            item.set_field(field, value);
        }
        Ok(())
    }
}

/// Evaluate one snippet and return the field map it left behind.
fn eval_fields(
    name: &str,
    source: &str,
    item_json: &str,
) -> Result<BTreeMap<String, serde_json::Value>, ScriptError> {
    let embedded = item_json.replace('\\', "\\\\").replace('\'', "\\'");
    let program = format!(
        "var item = JSON.parse('{embedded}');\n(function() {{\n{source}\n}})();\nJSON.stringify(item.fields);"
    );
    let mut context = Context::default();
    let value = context
        .eval(Source::from_bytes(&program))
        .map_err(|e| execution(name, e.to_string()))?;
    let text = value
        .as_string()
        .map(|s| s.to_std_string_escaped())
        .ok_or_else(|| execution(name, "item.fields is no longer serializable".to_string()))?;
    serde_json::from_str(&text).map_err(|e| execution(name, format!("result decode: {e}")))
}

fn execution(name: &str, message: String) -> ScriptError {
    ScriptError::Execution {
        name: name.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::WorkItemId;

    fn ready(snippets: &[(&str, &str)]) -> JsEngine {
        let mut engine = JsEngine::new();
        for (name, source) in snippets {
            engine.load(name, source).unwrap();
        }
        engine.load_completed().unwrap();
        engine
    }

    fn task() -> WorkItem {
        let mut it = WorkItem::new(WorkItemId(12), "task", "website");
        it.set_field("title", FieldValue::Str("Fix sign-in".to_string()));
        it.set_field("estimate", FieldValue::Number(4.0));
        it.mark_clean();
        it
    }

    #[test]
    fn snippet_updates_a_field() {
        let mut engine = ready(&[("double", "item.fields.estimate = item.fields.estimate * 2;")]);
        let mut item = task();
        engine.run("double", &mut item).unwrap();
        assert_eq!(item.field("estimate"), Some(&FieldValue::Number(8.0)));
        assert!(item.is_dirty());
    }

    #[test]
    fn snippet_sees_item_identity() {
        let mut engine = ready(&[("tag", "item.fields.note = item.kind + '/' + item.id;")]);
        let mut item = task();
        engine.run("tag", &mut item).unwrap();
        assert_eq!(
            item.field("note"),
            Some(&FieldValue::Str("task/12".to_string()))
        );
    }

    #[test]
    fn snippet_can_remove_a_field() {
        let mut engine = ready(&[("drop", "delete item.fields.estimate;")]);
        let mut item = task();
        engine.run("drop", &mut item).unwrap();
        assert_eq!(item.field("estimate"), None);
        assert!(item.is_dirty());
    }

    #[test]
    fn rewriting_the_same_value_keeps_the_item_clean() {
        let mut engine = ready(&[("noop", "item.fields.estimate = 4;")]);
        let mut item = task();
        engine.run("noop", &mut item).unwrap();
        assert!(!item.is_dirty());
    }

    #[test]
    fn quotes_and_backslashes_survive_embedding() {
        let mut engine = ready(&[(
            "suffix",
            "item.fields.title = item.fields.title + ' (checked)';",
        )]);
        let mut item = task();
        item.set_field(
            "title",
            FieldValue::Str("Don't break c:\\path \"here\"".to_string()),
        );
        engine.run("suffix", &mut item).unwrap();
        assert_eq!(
            item.field("title"),
            Some(&FieldValue::Str(
                "Don't break c:\\path \"here\" (checked)".to_string()
            ))
        );
    }

    #[test]
    fn syntax_errors_fail_at_load() {
        let mut engine = JsEngine::new();
        let err = engine.load("broken", "this is not javascript").unwrap_err();
        assert!(matches!(err, ScriptError::Compile { .. }), "got {err:?}");
    }

    #[test]
    fn runtime_errors_fail_the_run() {
        let mut engine = ready(&[("boom", "no_such_function();")]);
        let mut item = task();
        let err = engine.run("boom", &mut item).unwrap_err();
        assert!(matches!(err, ScriptError::Execution { .. }), "got {err:?}");
    }

    #[test]
    fn structured_field_values_are_rejected() {
        let mut engine = ready(&[("bad", "item.fields.tags = ['a', 'b'];")]);
        let mut item = task();
        let err = engine.run("bad", &mut item).unwrap_err();
        assert!(
            matches!(&err, ScriptError::Execution { message, .. } if message.contains("unsupported")),
            "got {err:?}"
        );
    }

    #[test]
    fn run_before_seal_is_not_ready() {
        let mut engine = JsEngine::new();
        engine.load("a", "item.fields.x = 1;").unwrap();
        let mut item = task();
        assert_eq!(engine.run("a", &mut item), Err(ScriptError::NotReady));
    }

    #[test]
    fn never_loaded_name_is_unknown() {
        let mut engine = ready(&[("a", "item.fields.x = 1;")]);
        let mut item = task();
        assert_eq!(
            engine.run("missing", &mut item),
            Err(ScriptError::UnknownSnippet("missing".to_string()))
        );
    }
}
