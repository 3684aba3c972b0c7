use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::agents::DataExtractor;
use crate::chain::provider::ReplyFormat;
use crate::commands::common::{self, ModelArgs, OutputArgs};
use crate::documents::{self, FileLoader};

#[derive(Debug, Args, Clone)]
pub struct ExtractArgs {
    #[arg(long = "field", required = true, help = "Data point to extract; repeatable")]
    pub fields: Vec<String>,
    #[arg(long, help = "Ask for a JSON object keyed by field")]
    pub json_reply: bool,
    #[arg(long, help = "Appended to the premade system prompt")]
    pub instructions: Option<String>,
    #[command(flatten)]
    pub model: ModelArgs,
    #[command(flatten)]
    pub output: OutputArgs,
    #[arg(help = "Text or PDF file; stdin when omitted")]
    pub file: Option<PathBuf>,
}

pub async fn run(args: ExtractArgs) -> Result<(), String> {
    common::init_logging(&args.output);
    let resolved = common::resolve(&args.model, &args.output, None)?;
    let content = match &args.file {
        Some(path) => documents::load_all(Arc::new(FileLoader), vec![path.clone()])
            .await
            .map_err(|err| err.to_string())?
            .concat(),
        None => common::read_prompt(None)?,
    };

    let mut extractor = DataExtractor::new(resolved.shared_model(), args.json_reply)
        .map_err(|err| err.to_string())?;
    if let Some(instructions) = args.instructions {
        extractor = extractor.with_instructions(instructions);
    }
    if let Some(temperature) = resolved.options.temperature {
        extractor = extractor.with_temperature(temperature);
    }

    if resolved.dry_run {
        let format = if args.json_reply {
            ReplyFormat::Json
        } else {
            ReplyFormat::Text
        };
        let body = resolved.dry_run_body(&extractor.prompt_for(&content, &args.fields), format);
        return common::emit(&resolved, &body.to_string());
    }

    let reply = extractor
        .ask(&content, &args.fields)
        .await
        .map_err(|err| err.to_string())?;
    common::emit_reply(&resolved, &reply)
}
