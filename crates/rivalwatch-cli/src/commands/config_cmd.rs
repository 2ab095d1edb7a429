//! Config subcommand handlers.

use rivalwatch_config::{self as cfg, Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let config = cfg::load_config_or_default();
            let rendered = toml::to_string_pretty(&config)?;
            print!("{rendered}");
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", cfg::config_path().display());
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = cfg::config_path();
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let mut config = Config::default();
            config.profiles.insert(
                "default".into(),
                Profile {
                    endpoint: global
                        .endpoint
                        .clone()
                        .unwrap_or_else(|| "wss://push.example.com".into()),
                    project: global
                        .project
                        .clone()
                        .unwrap_or_else(|| "your-project-id".into()),
                    user: global.user.clone(),
                    auth_token_env: Some("RIVALWATCH_TOKEN".into()),
                    ..Profile::default()
                },
            );

            cfg::save_config(&config)?;
            eprintln!("wrote {}", path.display());
            Ok(())
        }
    }
}
