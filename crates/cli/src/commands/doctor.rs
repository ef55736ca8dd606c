//! `banterbot doctor` — Diagnose configuration and credentials.

use banterbot_channels::{SlackChannel, SlackConfig};
use banterbot_config::{AppConfig, ConfigError};
use banterbot_core::channel::Channel;
use banterbot_core::provider::Provider;
use banterbot_providers::GeminiProvider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Banterbot Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ⚠️  No config file — using defaults (run `banterbot onboard` to create one)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    let credentials = match config.credentials() {
        Ok(credentials) => {
            println!("  ✅ All credentials present");
            Some(credentials)
        }
        Err(ConfigError::MissingCredentials(missing)) => {
            for name in &missing {
                println!("  ❌ {name} is not set");
            }
            issues += missing.len();
            None
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
            None
        }
    };

    if let Some(credentials) = credentials {
        let slack = SlackChannel::new(SlackConfig::from_app_config(
            &config.slack,
            credentials.slack_bot_token.clone(),
            credentials.slack_app_token.clone(),
        ));
        match slack.health_check().await {
            Ok(true) => println!("  ✅ Slack accepted the bot token"),
            Ok(false) => {
                println!("  ❌ Slack rejected the bot token");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Slack unreachable: {e}");
                issues += 1;
            }
        }

        let gemini = GeminiProvider::from_config(&config.gemini, credentials.gemini_api_key.clone());
        match gemini.health_check().await {
            Ok(true) => println!("  ✅ Gemini reachable (model {})", config.gemini.model),
            Ok(false) => {
                println!("  ❌ Gemini rejected the API key");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Gemini unreachable: {e}");
                issues += 1;
            }
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
