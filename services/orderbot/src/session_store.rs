use anyhow::{Context, Result};
use order_core::conversation::Conversation;
use std::fs;
use std::path::Path;

/// Returns `None` when no conversation has been saved yet.
pub fn load_conversation(path: &Path) -> Result<Option<Conversation>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file: {}", path.display()))?;
    let conversation = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse session file: {}", path.display()))?;
    Ok(Some(conversation))
}

pub fn save_conversation(path: &Path, conversation: &Conversation) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create session directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(conversation)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write session file: {}", path.display()))
}
