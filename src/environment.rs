use crate::evaluate::{RuntimeError, RuntimeErrorKind, Value};
use std::collections::HashMap;

/// Variable bindings of one scope: the globals, or a single call's locals.
#[derive(Debug, Default, Clone)]
pub struct Environment {
    map: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            map: HashMap::new(),
        }
    }

    pub fn define(&mut self, name: String, value: Value) {
        self.map.insert(name, value);
    }

    pub fn get(&self, name: &str, line: usize) -> Result<Value, RuntimeError> {
        match self.map.get(name) {
            Some(val) => Ok(val.clone()),
            None => Err(RuntimeError::new(
                RuntimeErrorKind::UndefinedIdentifier(name.to_string()),
                line,
            )),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.map.get(name)
    }

    /// Replaces every `#{name}` in `text` with the binding of `name`.
    /// Unbound names are rendered as `#name`; malformed markers are kept as is.
    pub fn interpolate(&self, text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("#{") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let name_len = after
                .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
                .unwrap_or(after.len());
            let name = &after[..name_len];
            if name.is_empty() || !after[name_len..].starts_with('}') {
                result.push_str("#{");
                rest = after;
                continue;
            }
            match self.lookup(name) {
                Some(value) => result.push_str(&value.to_string()),
                None => {
                    result.push('#');
                    result.push_str(name);
                }
            }
            rest = &after[name_len + 1..];
        }
        result.push_str(rest);
        result
    }
}
