use clap::{Args, Subcommand};

use crate::config;
use crate::prompts;

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ConfigSubcommand {
    /// Validate the config file, or one of its profiles.
    Check {
        #[arg(long)]
        profile: Option<String>,
    },
    /// Print where the config file is looked up.
    Path,
    /// List the premade system prompts.
    Prompts,
}

pub fn run(args: ConfigArgs) -> Result<(), String> {
    match args.command {
        ConfigSubcommand::Check { profile } => {
            let path = config::validate_config(profile.as_deref())?;
            println!("config OK: {}", path.display());
            Ok(())
        }
        ConfigSubcommand::Path => {
            println!("{}", config::config_path()?.display());
            Ok(())
        }
        ConfigSubcommand::Prompts => {
            for name in prompts::prompt_names().map_err(|err| err.to_string())? {
                println!("{name}");
            }
            Ok(())
        }
    }
}
