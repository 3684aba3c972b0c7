use clap::{Args, ValueEnum};

use crate::agents::{Agent, AgentKind};
use crate::chain::provider::ReplyFormat;
use crate::commands::common::{self, ModelArgs, OutputArgs};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Planner,
    Summarizer,
    Responder,
    Validator,
}

impl From<KindArg> for AgentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Planner => AgentKind::Planner,
            KindArg::Summarizer => AgentKind::Summarizer,
            KindArg::Responder => AgentKind::GenericResponder,
            KindArg::Validator => AgentKind::Validator,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct AgentArgs {
    #[arg(long, value_enum, default_value = "responder")]
    pub kind: KindArg,
    #[arg(long, help = "Appended to the premade system prompt")]
    pub instructions: Option<String>,
    #[command(flatten)]
    pub model: ModelArgs,
    #[command(flatten)]
    pub output: OutputArgs,
    #[arg(help = "Prompt; read from stdin when omitted")]
    pub prompt: Option<String>,
}

pub async fn run(args: AgentArgs) -> Result<(), String> {
    common::init_logging(&args.output);
    let resolved = common::resolve(&args.model, &args.output, None)?;
    let prompt = common::read_prompt(args.prompt)?;

    let mut agent =
        Agent::new(resolved.shared_model(), args.kind.into()).map_err(|err| err.to_string())?;
    if let Some(instructions) = args.instructions {
        agent = agent.with_instructions(instructions);
    }
    if let Some(temperature) = resolved.options.temperature {
        agent = agent.with_temperature(temperature);
    }

    if resolved.dry_run {
        let body = resolved.dry_run_body(&agent.prompt_for(&prompt), ReplyFormat::Text);
        return common::emit(&resolved, &body.to_string());
    }

    let reply = agent.ask(&prompt).await.map_err(|err| err.to_string())?;
    common::emit_reply(&resolved, &reply)
}
