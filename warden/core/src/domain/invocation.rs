// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named arguments of a single action call, kept in the order the caller
/// supplied them.
pub type Arguments = Map<String, Value>;

/// A named action plus its argument set: the unit an approval decision is
/// made about. Built per call and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInvocation {
    pub action_name: String,
    pub arguments: Arguments,
}

impl ActionInvocation {
    pub fn new(action_name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            action_name: action_name.into(),
            arguments,
        }
    }

    pub fn argument(&self, field: &str) -> Option<&Value> {
        self.arguments.get(field)
    }
}

/// Converts a JSON value into an argument map.
///
/// Objects are used as-is, `null` becomes an empty map and any other scalar
/// is stored under the `input` key.
pub fn arguments_from(value: Value) -> Arguments {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("input".to_string(), other);
            map
        }
    }
}
