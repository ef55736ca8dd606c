//! `banterbot onboard` — First-time setup.

use banterbot_config::{AppConfig, ENV_GEMINI_API_KEY, ENV_SLACK_APP_TOKEN, ENV_SLACK_BOT_TOKEN};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("🤖 Banterbot — First-Time Setup");
    println!("===============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Export {ENV_SLACK_BOT_TOKEN}, {ENV_SLACK_APP_TOKEN} and {ENV_GEMINI_API_KEY}");
    println!("      (or put them in a .env file)");
    println!("   2. Run: banterbot doctor");
    println!("   3. Run: banterbot run\n");

    Ok(())
}
