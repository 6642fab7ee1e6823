use std::time::Duration;

use serde::Deserialize;

/// CORS configuration for browser clients hosted elsewhere
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    #[serde(default)]
    pub origins: AllowList,
    #[serde(default)]
    pub methods: AllowList,
    #[serde(default)]
    pub headers: AllowList,
    /// Preflight cache lifetime in seconds
    #[serde(default)]
    pub max_age: Option<u64>,
}

impl CorsConfig {
    pub fn max_age_duration(&self) -> Option<Duration> {
        self.max_age.map(Duration::from_secs)
    }
}

/// `"*"` or an explicit list; a `"*"` entry inside a list widens it to any
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawAllowList")]
pub enum AllowList {
    #[default]
    Any,
    Only(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAllowList {
    One(String),
    Many(Vec<String>),
}

impl From<RawAllowList> for AllowList {
    fn from(raw: RawAllowList) -> Self {
        let values = match raw {
            RawAllowList::One(value) => vec![value],
            RawAllowList::Many(values) => values,
        };

        if values.iter().any(|v| v == "*") {
            Self::Any
        } else {
            Self::Only(values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_string_is_any() {
        let config: CorsConfig = toml::from_str(r#"origins = "*""#).unwrap();
        assert_eq!(config.origins, AllowList::Any);
        assert_eq!(config.methods, AllowList::Any);
    }

    #[test]
    fn explicit_list_is_kept() {
        let config: CorsConfig = toml::from_str(
            r#"
                origins = ["https://forge.example"]
                methods = ["GET", "POST"]
                max_age = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.origins, AllowList::Only(vec!["https://forge.example".to_owned()]));
        assert_eq!(config.methods, AllowList::Only(vec!["GET".to_owned(), "POST".to_owned()]));
        assert_eq!(config.max_age_duration(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn wildcard_inside_list_widens_to_any() {
        let config: CorsConfig = toml::from_str(r#"headers = ["content-type", "*"]"#).unwrap();
        assert_eq!(config.headers, AllowList::Any);
    }
}
