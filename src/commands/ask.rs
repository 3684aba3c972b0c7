use std::time::Instant;

use clap::Args;
use serde_json::json;

use crate::chain::provider::{ChatMessage, ChatModel, ReplyFormat};
use crate::commands::common::{self, ModelArgs, OutputArgs, OutputMode, Resolved};

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
    #[command(flatten)]
    pub model: ModelArgs,
    #[command(flatten)]
    pub output: OutputArgs,
    #[arg(long, help = "System prompt")]
    pub system: Option<String>,
    #[arg(long, help = "Ask the model to reply with a JSON object")]
    pub json_reply: bool,
    #[arg(help = "Prompt; read from stdin when omitted")]
    pub prompt: Option<String>,
}

pub async fn run(args: AskArgs) -> Result<(), String> {
    common::init_logging(&args.output);
    let resolved = common::resolve(&args.model, &args.output, args.system)?;
    let prompt = common::read_prompt(args.prompt)?;

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &resolved.system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt));
    let format = if args.json_reply {
        ReplyFormat::Json
    } else {
        ReplyFormat::Text
    };

    send(&resolved, &messages, format).await
}

/// Sends `messages`, or prints them as a dry run, and writes the reply.
pub(crate) async fn send(
    resolved: &Resolved,
    messages: &[ChatMessage],
    format: ReplyFormat,
) -> Result<(), String> {
    if resolved.dry_run {
        let body = resolved.dry_run_body(messages, format);
        resolved.report_usage(None, 0);
        return common::emit(resolved, &body.to_string());
    }

    let options = resolved.options.with_format(format);
    let started = Instant::now();
    let response = resolved
        .client()
        .ask(messages, &options)
        .await
        .map_err(|err| err.to_string())?;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    resolved.report_usage(response.usage.as_ref(), latency_ms);

    let text = match resolved.output {
        OutputMode::Text => response.content,
        OutputMode::Json => json!({
            "provider": resolved.provider.as_str(),
            "model": resolved.model,
            "content": response.content,
            "usage": response.usage.map(|usage| json!({
                "prompt_tokens": usage.prompt_tokens,
                "completion_tokens": usage.completion_tokens,
                "total_tokens": usage.total_tokens,
            })),
            "latency_ms": latency_ms,
        })
        .to_string(),
    };
    common::emit(resolved, &text)
}
