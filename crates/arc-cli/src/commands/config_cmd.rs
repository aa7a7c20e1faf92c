//! `arc config`: manage switch profiles in `config.toml`.

use dialoguer::{Input, Select};

use arc_config::Profile;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util::{self, prompt_err};

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = util::config_path(global);

    match args.command {
        ConfigCommand::Init => {
            let mut cfg = util::load_config(global)?;
            eprintln!("arc configuration wizard");
            eprintln!("   Config path: {}\n", path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile (device) name")
                .default("switch-1".into())
                .interact_text()
                .map_err(prompt_err)?;

            let host: String = Input::new()
                .with_prompt("Switch address")
                .default("https://10.0.0.2".into())
                .interact_text()
                .map_err(prompt_err)?;
            arc_config::switch_url(&host)?;

            let username: String = Input::new()
                .with_prompt("Username")
                .default("manager".into())
                .interact_text()
                .map_err(prompt_err)?;

            let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }

            let store_choices = &[
                "OS keyring",
                "config.toml (plaintext)",
            ];
            let store_selection = Select::new()
                .with_prompt("Keep the password in")
                .items(store_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            let password_field = if store_selection == 0 {
                arc_config::store_password(&profile_name, &password)?;
                eprintln!("   ✓ Password saved to the OS keyring");
                None
            } else {
                Some(password)
            };

            cfg.profiles.insert(
                profile_name.clone(),
                Profile {
                    host,
                    username: Some(username),
                    password: password_field,
                    ..Profile::default()
                },
            );
            cfg.default_profile = Some(profile_name.clone());
            arc_config::save_config_to(&cfg, &path)?;

            eprintln!("\n✓ Configuration written to {}", path.display());
            eprintln!("  Default switch: {profile_name}");
            eprintln!("\n  Test it: arc login {profile_name}");
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = arc_config::load_config_from(&path).unwrap_or_default();
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|_| format!("{c:#?}")),
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = util::load_config(global)?;
            if cfg.profiles.is_empty() {
                eprintln!("No switches configured. Run: arc config init");
            }
            let active = util::active_profile_name(global, &cfg);
            for (name, profile) in &cfg.profiles {
                let mark = if *name == active { "*" } else { " " };
                println!("{mark} {name}\t{}", profile.host);
            }
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = util::load_config(global)?;
            let profile_name = profile.unwrap_or_else(|| util::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(util::profile_not_found(&profile_name, &cfg));
            }

            let secret = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "an empty password is not accepted".into(),
                });
            }

            arc_config::store_password(&profile_name, &secret)?;
            eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}
