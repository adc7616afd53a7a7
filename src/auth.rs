use std::path::{Path, PathBuf};

use crate::error::{AckError, Result};

/// Default token location: ~/.config/ackboard/token
pub fn default_token_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("ackboard").join("token"))
}

/// Read a GitHub token from the first line of `path`.
/// A leading `bearer ` (any case) is accepted and stripped.
pub fn load_token_file(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AckError::Auth(format!("cannot read token file {}: {}", path.display(), e))
    })?;
    parse_token(&content)
        .ok_or_else(|| AckError::Auth(format!("token file {} is empty", path.display())))
}

fn parse_token(content: &str) -> Option<String> {
    let line = content.lines().next()?.trim();
    let token = match line.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if line.eq_ignore_ascii_case("bearer") => "",
        _ => line,
    };
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
