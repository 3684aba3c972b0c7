//! Flag, environment and profile resolution shared by the subcommands.

use std::env;
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use serde_json::{Value, json};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::agents::SharedModel;
use crate::chain::provider::{
    AskOptions, ChatMessage, DEFAULT_RETRY_DELAY_MS, Provider, ProviderClient, ReplyFormat, Usage,
    is_api_key_present,
};
use crate::config::{self, ProfileConfig};

#[derive(Debug, Args, Clone, Default)]
pub struct ModelArgs {
    #[arg(long, help = "LLM provider: openai, fireworks or ollama")]
    pub provider: Option<String>,
    #[arg(long, help = "Model identifier")]
    pub model: Option<String>,
    #[arg(long, help = "Server base URL, e.g. a remote Ollama host")]
    pub host: Option<String>,
    #[arg(long)]
    pub temperature: Option<f32>,
    #[arg(long)]
    pub max_tokens: Option<u32>,
    #[arg(long, help = "Request timeout in seconds")]
    pub timeout: Option<u64>,
    #[arg(long, help = "Retries for transient failures")]
    pub retries: Option<u32>,
    #[arg(long, help = "Initial retry delay in milliseconds")]
    pub retry_delay: Option<u64>,
    #[arg(long, help = "Profile from the config file")]
    pub profile: Option<String>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct OutputArgs {
    #[arg(long, help = "Shorthand for --output json")]
    pub json: bool,
    #[arg(long, value_enum)]
    pub output: Option<OutputMode>,
    #[arg(long, help = "Print the request as JSON instead of sending it")]
    pub dry_run: bool,
    #[arg(long, help = "Also write the output to this file")]
    pub save: Option<PathBuf>,
    #[arg(long, help = "Print token usage on stderr")]
    pub show_usage: bool,
    #[arg(long, short = 'v')]
    pub verbose: bool,
    #[arg(long, short = 'q', help = "Only print fatal errors on stderr")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    #[default]
    Text,
    Json,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Everything a subcommand needs to talk to a model.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub provider: Provider,
    pub model: String,
    pub base_url: Option<String>,
    pub system: Option<String>,
    pub options: AskOptions,
    pub output: OutputMode,
    pub show_usage: bool,
    pub quiet: bool,
    pub dry_run: bool,
    pub save: Option<PathBuf>,
}

impl Resolved {
    pub fn client(&self) -> ProviderClient {
        let client = ProviderClient::new(self.provider, &self.model).with_defaults(self.options);
        match &self.base_url {
            Some(url) => client.with_base_url(url),
            None => client,
        }
    }

    pub fn shared_model(&self) -> SharedModel {
        Arc::new(self.client())
    }

    /// Dry-run description of a request carrying `messages`.
    pub fn dry_run_body(&self, messages: &[ChatMessage], format: ReplyFormat) -> Value {
        let client = self.client();
        json!({
            "dry_run": true,
            "provider": self.provider.as_str(),
            "model": self.model,
            "base_url": client.base_url(),
            "messages": messages,
            "request": {
                "temperature": self.options.temperature.and_then(shortest_f64),
                "max_tokens": self.options.max_tokens,
                "timeout_secs": self.options.timeout_secs,
                "retries": self.options.retries,
                "retry_delay_ms": self.options.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
                "format": match format {
                    ReplyFormat::Text => "text",
                    ReplyFormat::Json => "json",
                },
            },
            "output": self.output.as_str(),
        })
    }

    pub fn report_usage(&self, usage: Option<&Usage>, latency_ms: u64) {
        if !self.show_usage || self.quiet {
            return;
        }
        match usage {
            Some(usage) => eprintln!(
                "usage: prompt_tokens={} completion_tokens={} total_tokens={} latency_ms={latency_ms}",
                count(usage.prompt_tokens),
                count(usage.completion_tokens),
                count(usage.total_tokens),
            ),
            None if self.dry_run => eprintln!("usage: unavailable latency_ms=0 (dry-run)"),
            None => eprintln!("usage: unavailable latency_ms={latency_ms}"),
        }
    }
}

// f32 widened directly would print as 0.6000000238418579.
fn shortest_f64(value: f32) -> Option<f64> {
    value.to_string().parse().ok()
}

fn count(tokens: Option<u32>) -> String {
    tokens.map_or_else(|| "?".to_string(), |tokens| tokens.to_string())
}

/// Installs the stderr log subscriber. `RUST_LOG` wins unless `--verbose` or `--quiet` is set.
pub fn init_logging(output: &OutputArgs) {
    let filter = if output.quiet {
        EnvFilter::new("off")
    } else if output.verbose {
        EnvFilter::new("llm_axe=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("llm_axe=warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .without_time()
        .try_init();
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parsed<T: FromStr>(name: &str) -> Result<Option<T>, String> {
    match env_value(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| format!("Invalid {name} '{raw}'.")),
        None => Ok(None),
    }
}

fn parse_provider(raw: &str, source: &str) -> Result<Provider, String> {
    raw.parse().map_err(|_| {
        format!(
            "Invalid {source} '{raw}'. Supported values: {}.",
            Provider::SUPPORTED
        )
    })
}

/// Merges CLI flags, `AXE_*` variables and the selected profile, in that order.
pub fn resolve(
    model: &ModelArgs,
    output: &OutputArgs,
    system: Option<String>,
) -> Result<Resolved, String> {
    let profile = match &model.profile {
        Some(name) => {
            let profile = config::load_profile(name)?;
            config::validate_profile(&profile)?;
            profile
        }
        None => ProfileConfig::default(),
    };

    let provider = if let Some(raw) = &model.provider {
        parse_provider(raw, "--provider")?
    } else if let Some(raw) = env_value("AXE_PROVIDER") {
        parse_provider(&raw, "AXE_PROVIDER")?
    } else if let Some(raw) = &profile.provider {
        parse_provider(raw, "profile provider")?
    } else {
        Provider::Ollama
    };

    let model_name = model
        .model
        .clone()
        .or_else(|| env_value("AXE_MODEL"))
        .or_else(|| profile.model.clone())
        .ok_or_else(|| "No model provided. Use --model or set AXE_MODEL.".to_string())?;

    let temperature = match model.temperature {
        Some(value) => Some(value),
        None => env_parsed("AXE_TEMPERATURE")?.or(profile.temperature),
    };
    if let Some(value) = temperature
        && !(0.0..=2.0).contains(&value)
    {
        return Err(format!(
            "Invalid temperature '{value}'. Expected a value between 0 and 2."
        ));
    }

    let defaults = AskOptions::default();
    let options = AskOptions {
        temperature,
        max_tokens: pick(model.max_tokens, "AXE_MAX_TOKENS", profile.max_tokens)?,
        timeout_secs: pick(model.timeout, "AXE_TIMEOUT", profile.timeout)?,
        retries: pick(model.retries, "AXE_RETRIES", profile.retries)?.unwrap_or(defaults.retries),
        retry_delay_ms: pick(model.retry_delay, "AXE_RETRY_DELAY", profile.retry_delay)?,
        format: ReplyFormat::Text,
    };

    let output_mode = if output.json {
        OutputMode::Json
    } else if let Some(mode) = output.output {
        mode
    } else {
        match profile.output.as_deref() {
            Some("json") => OutputMode::Json,
            _ => OutputMode::Text,
        }
    };

    let base_url = model
        .host
        .clone()
        .or_else(|| env_value("AXE_HOST"))
        .or_else(|| profile.host.clone());

    debug!(
        provider = provider.as_str(),
        model = %model_name,
        api_key_present = is_api_key_present(provider),
        profile = model.profile.as_deref().unwrap_or("none"),
        "request settings resolved"
    );

    Ok(Resolved {
        provider,
        model: model_name,
        base_url,
        system: system.or(profile.system),
        options,
        output: output_mode,
        show_usage: output.show_usage || profile.show_usage.unwrap_or(false),
        quiet: output.quiet,
        dry_run: output.dry_run,
        save: output.save.clone(),
    })
}

fn pick<T: FromStr>(cli: Option<T>, env_name: &str, profile: Option<T>) -> Result<Option<T>, String> {
    match cli {
        Some(value) => Ok(Some(value)),
        None => Ok(env_parsed(env_name)?.or(profile)),
    }
}

/// `argument` when given, else all of stdin.
pub fn read_prompt(argument: Option<String>) -> Result<String, String> {
    if let Some(prompt) = argument.filter(|prompt| !prompt.trim().is_empty()) {
        return Ok(prompt);
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|err| format!("Failed to read prompt from stdin: {err}"))?;
    if buffer.trim().is_empty() {
        return Err("No prompt provided. Pass it as an argument or on stdin.".to_string());
    }
    Ok(buffer)
}

/// Prints `text` on stdout and mirrors it into `--save` when set.
pub fn emit(resolved: &Resolved, text: &str) -> Result<(), String> {
    println!("{text}");
    if let Some(path) = &resolved.save {
        save_output(path, text)?;
    }
    Ok(())
}

/// Writes an agent reply in the selected output mode.
pub fn emit_reply(resolved: &Resolved, reply: &str) -> Result<(), String> {
    match resolved.output {
        OutputMode::Text => emit(resolved, reply),
        OutputMode::Json => {
            let body = json!({
                "provider": resolved.provider.as_str(),
                "model": resolved.model,
                "content": reply,
            });
            emit(resolved, &body.to_string())
        }
    }
}

fn save_output(path: &Path, text: &str) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create output directory '{}': {err}",
                parent.display()
            )
        })?;
    }
    fs::write(path, format!("{text}\n"))
        .map_err(|err| format!("Failed to write output file '{}': {err}", path.display()))
}
