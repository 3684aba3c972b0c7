//! Maps a free-text model reply onto one of the caller's candidate functions.
//!
//! Two reply shapes are understood:
//!
//! * A JSON object with a `"function"` key (what the premade prompt asks for),
//!   optionally wrapped in prose or code fences. Its `"parameters"` value holds
//!   the arguments.
//! * Prose naming a function. The earliest whole-identifier occurrence of a
//!   known name wins, with longer names preferred at the same position, and the
//!   first JSON object or array after it supplies the arguments.
//!
//! A reply whose JSON names an unknown function is a no-match; the prose scan
//! is never used to second-guess an explicit selection.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::chain::tools::{FunctionDescriptor, ParamType};
use crate::json::{find_json_fragment, json_fragments};

const ARGUMENT_KEYS: [&str; 3] = ["parameters", "arguments", "args"];

/// A resolved function selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionMatch {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl FunctionMatch {
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }
}

/// Matcher over an ordered candidate list.
#[derive(Debug, Clone, Copy)]
pub struct FunctionMatcher<'a> {
    functions: &'a [FunctionDescriptor],
}

impl<'a> FunctionMatcher<'a> {
    pub fn new(functions: &'a [FunctionDescriptor]) -> Self {
        Self { functions }
    }

    pub fn function(&self, name: &str) -> Option<&'a FunctionDescriptor> {
        self.functions.iter().find(|function| function.name == name)
    }

    /// Resolves `reply` to a function call, or `None` when no candidate is named.
    pub fn match_reply(&self, reply: &str) -> Option<FunctionMatch> {
        if let Some((selected, arguments)) = structured_selection(reply) {
            let Some(function) = self.function(selected.trim()) else {
                warn!(function = %selected, "{selected} is not a valid function");
                return None;
            };
            let arguments = match arguments {
                Some(value) => bind_arguments(function, value),
                None => Map::new(),
            };
            return Some(finish(function, arguments));
        }

        let (function, position) = self.earliest_mention(reply)?;
        debug!(function = %function.name, position, "function named in prose reply");
        let after_name = position + function.name.len();
        let arguments = match find_json_fragment(reply, after_name) {
            Some((_, _, value)) => bind_arguments(function, unwrap_argument_object(value)),
            None => fallback_arguments(function, reply),
        };
        Some(finish(function, arguments))
    }

    /// Candidate whose name occurs first as a whole identifier.
    fn earliest_mention(&self, reply: &str) -> Option<(&'a FunctionDescriptor, usize)> {
        self.functions
            .iter()
            .filter_map(|function| {
                first_identifier_occurrence(reply, &function.name).map(|pos| (function, pos))
            })
            .min_by(|(a, pos_a), (b, pos_b)| {
                pos_a
                    .cmp(pos_b)
                    .then_with(|| b.name.len().cmp(&a.name.len()))
            })
    }
}

/// Shorthand for [`FunctionMatcher::match_reply`].
pub fn match_reply(functions: &[FunctionDescriptor], reply: &str) -> Option<FunctionMatch> {
    FunctionMatcher::new(functions).match_reply(reply)
}

/// Finds a JSON object with a `"function"` entry anywhere in `reply`.
fn structured_selection(reply: &str) -> Option<(String, Option<Value>)> {
    for (_, _, value) in json_fragments(reply, 0) {
        if let Value::Object(mut object) = value {
            if let Some(selected) = object.remove("function") {
                match selected {
                    Value::String(name) => return Some((name, take_arguments(&mut object))),
                    Value::Object(mut inner) => {
                        if let Some(Value::String(name)) = inner.remove("name") {
                            let arguments =
                                take_arguments(&mut inner).or_else(|| take_arguments(&mut object));
                            return Some((name, arguments));
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    None
}

fn take_arguments(object: &mut Map<String, Value>) -> Option<Value> {
    ARGUMENT_KEYS.iter().find_map(|key| object.remove(*key))
}

/// `{"parameters": {...}}` without a function key still carries arguments.
fn unwrap_argument_object(value: Value) -> Value {
    if let Value::Object(object) = &value {
        if object.len() == 1 {
            if let Some(inner) = ARGUMENT_KEYS.iter().find_map(|key| object.get(*key)) {
                if inner.is_object() || inner.is_array() {
                    return inner.clone();
                }
            }
        }
    }
    value
}

fn bind_arguments(function: &FunctionDescriptor, value: Value) -> Map<String, Value> {
    match value {
        Value::Object(object) => {
            let mut arguments = Map::new();
            for (key, value) in object {
                let declared = function
                    .params
                    .iter()
                    .find(|param| param.name == key)
                    .or_else(|| {
                        function
                            .params
                            .iter()
                            .find(|param| param.name.eq_ignore_ascii_case(&key))
                    });
                let key = declared.map_or(key, |param| param.name.clone());
                arguments.insert(key, value);
            }
            arguments
        }
        Value::Array(items) => {
            if let [param] = function.params.as_slice() {
                if param.kind == ParamType::Array {
                    return Map::from_iter([(param.name.clone(), Value::Array(items))]);
                }
            }
            if items.len() > function.params.len() {
                debug!(
                    function = %function.name,
                    extra = items.len() - function.params.len(),
                    "dropping positional arguments beyond the declared parameters"
                );
            }
            function
                .params
                .iter()
                .zip(items)
                .map(|(param, value)| (param.name.clone(), value))
                .collect()
        }
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => bind_arguments(function, parsed),
            _ => fallback_arguments(function, &raw),
        },
        Value::Null => Map::new(),
        scalar => match function.params.first() {
            Some(param) => Map::from_iter([(param.name.clone(), scalar)]),
            None => Map::new(),
        },
    }
}

/// The whole reply becomes the first parameter.
fn fallback_arguments(function: &FunctionDescriptor, reply: &str) -> Map<String, Value> {
    match function.params.first() {
        Some(param) => {
            debug!(function = %function.name, "no argument fragment, using the whole reply");
            Map::from_iter([(param.name.clone(), Value::String(reply.trim().to_string()))])
        }
        None => Map::new(),
    }
}

/// Applies declared types and defaults.
fn finish(function: &FunctionDescriptor, mut arguments: Map<String, Value>) -> FunctionMatch {
    for param in &function.params {
        match arguments.remove(&param.name) {
            Some(value) => {
                arguments.insert(param.name.clone(), param.kind.cast(value));
            }
            None => {
                if let Some(default) = &param.default {
                    arguments.insert(param.name.clone(), default.clone());
                }
            }
        }
    }
    FunctionMatch {
        name: function.name.clone(),
        arguments,
    }
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Byte offset of the first occurrence of `name` not embedded in a longer identifier.
fn first_identifier_occurrence(text: &str, name: &str) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    text.match_indices(name).map(|(pos, _)| pos).find(|&pos| {
        let before = text[..pos].chars().next_back();
        let after = text[pos + name.len()..].chars().next();
        !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
    })
}
