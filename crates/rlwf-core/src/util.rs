//! Env file helpers
//!
//! `rlwf.env` seeds the process environment before any workflow is loaded,
//! so `RLWF__*` overrides can live in a file. Component environments written
//! by `rlwf prepare` use the same format.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// File name looked up by [`load_env_file`]
pub const ENV_FILE_NAME: &str = "rlwf.env";

/// Where [`load_env_file`] looks, first match wins
pub fn env_file_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("/usr/local/etc/rlwf").join(ENV_FILE_NAME)];
    candidates.extend(dirs::config_dir().map(|dir| dir.join("rlwf").join(ENV_FILE_NAME)));
    candidates.extend(
        dirs::home_dir().map(|dir| dir.join(".config").join("rlwf").join(ENV_FILE_NAME)),
    );
    candidates.dedup();
    candidates
}

/// Apply the first `rlwf.env` found; variables already set are kept.
/// Returns the file that was applied.
pub fn load_env_file() -> Option<PathBuf> {
    let path = env_file_candidates().into_iter().find(|p| p.is_file())?;
    match fs::read_to_string(&path) {
        Ok(contents) => {
            let applied = apply_env_pairs(parse_env_pairs(&contents));
            tracing::debug!("Applied {applied} variable(s) from {}", path.display());
            Some(path)
        }
        Err(err) => {
            tracing::warn!("Cannot read {}: {err}", path.display());
            None
        }
    }
}

/// Set each variable that is not already present in the environment,
/// returning how many were set
pub fn apply_env_pairs(pairs: Vec<(String, String)>) -> usize {
    let mut applied = 0;
    for (key, value) in pairs {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(key, value);
            applied += 1;
        }
    }
    applied
}

/// Parse `KEY=value` lines. Blank lines and `#` comments are skipped, an
/// `export ` prefix is allowed. Values may be double-quoted (with `\"` and
/// `\\` escapes) or single-quoted (literal).
pub fn parse_env_pairs(contents: &str) -> Vec<(String, String)> {
    contents.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim())))
}

fn unquote(value: &str) -> String {
    let quoted_with = |q: char| value.len() >= 2 && value.starts_with(q) && value.ends_with(q);

    if quoted_with('\'') {
        return value[1..value.len() - 1].to_string();
    }
    if !quoted_with('"') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut chars = value[1..value.len() - 1].chars();
    while let Some(c) = chars.next() {
        match (c, chars.clone().next()) {
            ('\\', Some(next @ ('"' | '\\'))) => {
                out.push(next);
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

fn quote(value: &str) -> Cow<'_, str> {
    let plain = !value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\'));
    if plain {
        return Cow::Borrowed(value);
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    Cow::Owned(format!("\"{escaped}\""))
}

/// Render variables as `KEY=value` lines that [`parse_env_pairs`] reads back
/// unchanged
pub fn render_env_file(vars: &BTreeMap<String, String>) -> String {
    vars.iter()
        .map(|(key, value)| format!("{key}={}\n", quote(value)))
        .collect()
}
