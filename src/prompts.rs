use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::{Error, Result};

const SYSTEM_PROMPTS: &str = include_str!("../prompts/system_prompts.toml");

#[derive(Debug, Deserialize)]
struct PromptEntry {
    prompt: String,
}

type Catalogue = std::result::Result<HashMap<String, PromptEntry>, String>;

fn catalogue() -> Result<&'static HashMap<String, PromptEntry>> {
    static CATALOGUE: OnceLock<Catalogue> = OnceLock::new();
    CATALOGUE
        .get_or_init(|| toml::from_str(SYSTEM_PROMPTS).map_err(|err| err.to_string()))
        .as_ref()
        .map_err(|message| Error::Config(format!("bundled system prompts are invalid: {message}")))
}

/// Loads a premade prompt template by name, e.g. `"FunctionCaller"`.
pub fn system_prompt(name: &str) -> Result<&'static str> {
    catalogue()?
        .get(name)
        .map(|entry| entry.prompt.trim())
        .ok_or_else(|| Error::UnknownPrompt(name.to_string()))
}

/// Names of every premade prompt, sorted.
pub fn prompt_names() -> Result<Vec<&'static str>> {
    let mut names: Vec<&'static str> = catalogue()?.keys().map(String::as_str).collect();
    names.sort_unstable();
    Ok(names)
}

/// Substitutes `{name}` placeholders in `template`.
///
/// `{{` and `}}` render as literal braces. Placeholders without a value are
/// left as written, and substituted values are never re-scanned.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('{') {
            if let Some(close) = tail.find('}') {
                let key = &tail[1..close];
                if let Some((_, value)) = vars.iter().find(|(name, _)| *name == key) {
                    out.push_str(value);
                    rest = &tail[close + 1..];
                    continue;
                }
            }
        }
        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

/// Loads and renders a premade prompt in one step.
pub fn render_system_prompt(name: &str, vars: &[(&str, &str)]) -> Result<String> {
    Ok(render(system_prompt(name)?, vars).trim().to_string())
}
