//! # Config Loader
//!
//! Reads a router topology from TOML or JSON and turns it into a checked
//! [`RouterBlueprint`]. Fatal problems (bad keys, duplicate names, impossible
//! rates) fail the load; topology smells such as keys nobody consumes are
//! reported separately through [`ConfigLoader::warnings`].
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("router.toml"))?;
//! for warning in ConfigLoader::warnings(&blueprint) {
//!     eprintln!("{warning}");
//! }
//! # Ok::<(), contracts::ContractError>(())
//! ```

mod parser;
mod validator;

use std::path::Path;

use contracts::ContractError;

pub use contracts::RouterBlueprint;
pub use parser::ConfigFormat;
pub use validator::ConfigWarning;

/// Entry point for reading and writing topology files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read, parse and validate a topology file.
    ///
    /// The format comes from the extension (`.toml` or `.json`).
    ///
    /// # Errors
    /// Unknown extension, unreadable file, malformed content (including
    /// measurement keys) or a failed validation rule.
    pub fn load_from_path(path: &Path) -> Result<RouterBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Parse and validate topology text
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RouterBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Non-fatal topology findings for a blueprint that already loaded
    pub fn warnings(blueprint: &RouterBlueprint) -> Vec<ConfigWarning> {
        validator::warnings(blueprint)
    }

    pub fn to_toml(blueprint: &RouterBlueprint) -> Result<String, ContractError> {
        parser::render(blueprint, ConfigFormat::Toml)
    }

    pub fn to_json(blueprint: &RouterBlueprint) -> Result<String, ContractError> {
        parser::render(blueprint, ConfigFormat::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[engine]
readiness_timeout_ms = 250

[[producers]]
name = "pmu_a"
outputs = ["PPA:1", "PPA:2"]
frequency_hz = 30.0
auto_start = false

[[processors]]
name = "avg"
inputs = ["PPA:1"]
outputs = ["CALC:1"]

[[sinks]]
name = "archive"
kind = "counting"
inputs = ["PPA:2", "CALC:1"]
auto_start = false
queue_capacity = 64
"#;

    #[test]
    fn test_load_from_str_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml)
            .expect("minimal topology loads");
        assert_eq!(bp.engine.readiness_timeout_ms, 250);
        assert_eq!(bp.adapter_names().count(), 3);
        assert!(ConfigLoader::warnings(&bp).is_empty());
    }

    #[test]
    fn test_rendered_forms_reload() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();

        let from_toml =
            ConfigLoader::load_from_str(&ConfigLoader::to_toml(&bp).unwrap(), ConfigFormat::Toml)
                .unwrap();
        assert_eq!(bp.provided_keys(), from_toml.provided_keys());
        assert_eq!(bp.demanded_keys(), from_toml.demanded_keys());
        assert_eq!(from_toml.sinks[0].queue_capacity, 64);

        let from_json =
            ConfigLoader::load_from_str(&ConfigLoader::to_json(&bp).unwrap(), ConfigFormat::Json)
                .unwrap();
        assert_eq!(from_json.producers[0].name, "pmu_a");
        assert!(!from_json.producers[0].auto_start);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[[producers]]
name = "dup"
outputs = ["PPA:1"]

[[sinks]]
name = "dup"
inputs = ["PPA:1"]
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_extension_decides_format() {
        let err = ConfigLoader::load_from_path(Path::new("router.yaml")).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));

        let err = ConfigLoader::load_from_path(Path::new("router")).unwrap_err();
        assert!(err.to_string().contains("no file extension"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ConfigLoader::load_from_path(Path::new("/nonexistent/router.toml")).unwrap_err();
        assert!(matches!(err, ContractError::Io(_)));
    }
}
