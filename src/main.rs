use std::io::{self, IsTerminal};
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use llm_axe::commands::LONG_VERSION;
use llm_axe::commands::agent::{self, AgentArgs};
use llm_axe::commands::ask::{self, AskArgs};
use llm_axe::commands::config::{self, ConfigArgs};
use llm_axe::commands::extract::{self, ExtractArgs};
use owo_colors::OwoColorize;

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  axe ask --provider ollama --model llama3 \"2+2?\"\n  echo \"2+2?\" | axe ask --provider openai --model gpt-4o-mini\n  axe agent --kind planner --model llama3 \"Plan a trip to Rome\"\n  axe extract --model llama3 --field name --field email --json-reply contact.txt\n  axe config check\n  axe completion bash > ~/.local/share/bash-completion/completions/axe";

const ASK_HELP_EXAMPLES: &str = "Examples:\n  axe ask --provider ollama --model llama3 \"2+2?\"\n  echo \"2+2?\" | axe ask --provider openai --model gpt-4o-mini\n  axe ask --provider fireworks --model accounts/fireworks/models/llama-v3p1-8b-instruct --dry-run --json \"Explain retries\"";

#[derive(Debug, Parser)]
#[command(
    name = "axe",
    about = "Prompt templates and small agents over LLM chat endpoints",
    version = LONG_VERSION,
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(
        about = "Ask a question to an LLM provider",
        version = LONG_VERSION,
        after_help = ASK_HELP_EXAMPLES
    )]
    Ask(AskArgs),
    #[command(about = "Answer with a premade agent")]
    Agent(AgentArgs),
    #[command(about = "Extract data points from a text or PDF file")]
    Extract(ExtractArgs),
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "axe", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "axe", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "axe", &mut io::stdout()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ask(args) => ask::run(args).await,
        Commands::Agent(args) => agent::run(args).await,
        Commands::Extract(args) => extract::run(args).await,
        Commands::Config(args) => config::run(args),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        if io::stderr().is_terminal() {
            eprintln!("{} {err}", "error:".red().bold());
        } else {
            eprintln!("{err}");
        }
        process::exit(1);
    }
}
