//! `banterbot prompt` — Render saved history as model context.

use std::path::Path;

use banterbot_core::message::HistoricalMessage;
use banterbot_responder::PromptBuilder;

pub async fn run(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    println!("{}", render(&raw)?);
    Ok(())
}

/// Parse a JSON array of messages and build the context text.
fn render(json: &str) -> Result<String, serde_json::Error> {
    let messages: Vec<HistoricalMessage> = serde_json::from_str(json)?;
    Ok(PromptBuilder::build(&messages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_oldest_first() {
        let json = r#"[
            {"author": "bob", "text": "second", "timestamp": "2024-05-01T10:00:05Z"},
            {"author": "alice", "text": "first", "timestamp": "2024-05-01T10:00:00Z"}
        ]"#;
        assert_eq!(render(json).unwrap(), "alice: first\nbob: second");
    }

    #[test]
    fn missing_author_gets_placeholder() {
        let json = r#"[{"author": null, "text": "hm", "timestamp": "2024-05-01T10:00:00Z"}]"#;
        assert_eq!(render(json).unwrap(), "unknown: hm");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(render("{not json").is_err());
    }

    #[tokio::test]
    async fn reads_history_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(
            &path,
            r#"[{"author": "alice", "text": "hi", "timestamp": "2024-05-01T10:00:00Z"}]"#,
        )
        .unwrap();

        assert!(run(&path).await.is_ok());
        assert!(run(&dir.path().join("missing.json")).await.is_err());
    }
}
