use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Expand `{{ env.VAR }}` placeholders in raw config text
///
/// `{{ env.VAR | default("value") }}` falls back to `value` when `VAR` is unset.
/// Comment lines are copied through untouched so disabled entries may
/// reference variables that do not exist.
pub fn expand_env(input: &str) -> Result<String, String> {
    fn placeholder() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
                .expect("placeholder pattern is valid")
        })
    }

    let mut failure: Option<String> = None;

    let lines: Vec<String> = input
        .split_inclusive('\n')
        .map(|line| {
            if line.trim_start().starts_with('#') {
                return line.to_owned();
            }

            placeholder()
                .replace_all(line, |caps: &Captures<'_>| {
                    match lookup(&caps[1], caps.get(2).map(|m| m.as_str())) {
                        Ok(value) => value,
                        Err(e) => {
                            failure.get_or_insert(e);
                            String::new()
                        }
                    }
                })
                .into_owned()
        })
        .collect();

    match failure {
        Some(e) => Err(e),
        None => Ok(lines.concat()),
    }
}

fn lookup(key: &str, fallback: Option<&str>) -> Result<String, String> {
    let Some(var) = key.strip_prefix("env.").filter(|var| !var.contains('.')) else {
        return Err(format!("only variables scoped with 'env.' are supported: `{key}`"));
    };

    match (std::env::var(var), fallback) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_owned()),
        (Err(_), None) => Err(format!("environment variable not found: `{var}`")),
    }
}

/// Split a comma-separated token list, dropping blank entries
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Read `VAR` as a single token or comma-separated list
pub fn read_list(var: &str) -> Vec<String> {
    std::env::var(var).map(|raw| split_list(&raw)).unwrap_or_default()
}

/// Read the numbered series `VAR_1`..`VAR_max`, skipping gaps
pub fn read_numbered(var: &str, max: usize) -> Vec<String> {
    (1..=max).flat_map(|n| read_list(&format!("{var}_{n}"))).collect()
}
