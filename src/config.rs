//! Loading operation settings from TOML or JSON files.
//!
//! Every settings struct implements `Default`, so a file only needs the keys
//! it changes.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Read settings from `path`; `.json` files use JSON, everything else TOML.
///
/// # Example
///
/// ```no_run
/// use redoc::config;
/// use redoc::xlsx::FillConfig;
///
/// let settings: FillConfig = config::load("fill.toml")?;
/// # Ok::<(), redoc::Error>(())
/// ```
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    parse(&content, is_json)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Load settings when a path is given, defaults otherwise.
pub fn load_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => load(path),
        None => Ok(T::default()),
    }
}

fn parse<T: DeserializeOwned>(content: &str, is_json: bool) -> Result<T> {
    if is_json {
        serde_json::from_str(content).map_err(|e| Error::Config(e.to_string()))
    } else {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        name: String,
        size: f64,
        enabled: bool,
    }

    #[test]
    fn test_parse_toml_and_json() {
        let from_toml: Sample = parse("name = \"正文\"\nsize = 10.5", false).unwrap();
        assert_eq!(from_toml.name, "正文");
        assert_eq!(from_toml.size, 10.5);
        assert!(!from_toml.enabled);

        let from_json: Sample = parse(r#"{"enabled": true}"#, true).unwrap();
        assert!(from_json.enabled);
        assert_eq!(from_json.name, "");
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "name = ").unwrap();
        let err = load::<Sample>(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_load_or_default() {
        let sample: Sample = load_or_default(None).unwrap();
        assert_eq!(sample, Sample::default());
    }
}
