//! Configuration view and validation commands: `taskboard config`.

use std::path::Path;

use anyhow::Result;

use taskboard::config::{CONFIG_FILE, CliOverrides, ClientConfig};

use super::super::ConfigCommands;

pub fn cmd_config(
    path: Option<&Path>,
    overrides: &CliOverrides,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let source = match path {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let local = Path::new(CONFIG_FILE);
            local.exists().then(|| local.to_path_buf())
        }
    };

    match command {
        None | Some(ConfigCommands::Show) => {
            let config = ClientConfig::load(path, overrides)?;
            println!();
            println!("Taskboard Configuration");
            println!("=======================");
            println!();
            match &source {
                Some(file) => println!("Config file: {}", file.display()),
                None => println!("No {} found, using defaults.", CONFIG_FILE),
            }
            println!("State directory: {}", config.state_dir().display());
            println!();
            println!("Effective values (with env/CLI overrides):");
            println!();
            print!("{}", config.to_toml()?);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();
            ClientConfig::load(path, overrides)?;
            match &source {
                Some(file) => println!("{} is valid.", file.display()),
                None => println!("No {} found. Using defaults (valid).", CONFIG_FILE),
            }
            println!();
        }
    }

    Ok(())
}
