use std::process;

use clap::Parser;
use llm_axe::commands::LONG_VERSION;
use llm_axe::commands::ask::{self, AskArgs};

#[derive(Debug, Parser)]
#[command(
    name = "axask",
    about = "Ask a question to an LLM provider",
    version = LONG_VERSION
)]
struct Cli {
    #[command(flatten)]
    ask: AskArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = ask::run(cli.ask).await {
        eprintln!("{err}");
        process::exit(1);
    }
}
