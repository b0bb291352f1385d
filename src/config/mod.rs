use std::{fmt, fs};

use log::{debug, trace};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{config_error, core::RuntimeResult};

static ZONE_PATTERN: OnceCell<Regex> = OnceCell::new();

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub runtime: Runtime,

    #[validate(nested)]
    pub log: Option<Log>,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> RuntimeResult<Self>
    where
        P: AsRef<std::path::Path> + fmt::Display,
    {
        let conf_str = fs::read_to_string(&path)
            .map_err(|e| config_error!("Unable to read conf file from {path}: {e}"))?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> RuntimeResult<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str)
            .map_err(|e| config_error!("Unable to parse yaml conf: {e}"))?;

        trace!("Loaded conf: {conf:?}");

        conf.validate()?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> RuntimeResult<String> {
        serde_yaml::to_string(self).map_err(|e| config_error!("Unable to serialize conf: {e}"))
    }
}

/// How the local process takes part in a deployment
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Single node; leadership gating is bypassed
    #[default]
    Vm,
    /// Participant in a multi-node zone
    Node,
    /// Controller of a distributed domain
    Controller,
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            RuntimeMode::Vm => "vm",
            RuntimeMode::Node => "node",
            RuntimeMode::Controller => "controller",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Runtime {
    #[serde(default)]
    pub mode: RuntimeMode,

    #[serde(default = "Runtime::default_zone")]
    #[validate(custom(function = "Runtime::validate_zone"))]
    pub zone: String,

    #[serde(default = "Runtime::default_async_workers")]
    #[validate(range(min = 1, max = 512))]
    pub async_workers: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::default(),
            zone: Self::default_zone(),
            async_workers: Self::default_async_workers(),
        }
    }
}

impl Runtime {
    fn default_zone() -> String {
        "default.zone".to_string()
    }

    fn default_async_workers() -> usize {
        4
    }

    fn validate_zone(zone: &str) -> Result<(), ValidationError> {
        let re = ZONE_PATTERN
            .get_or_try_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$"))
            .map_err(|_| ValidationError::new("invalid_zone_pattern"))?;

        if re.is_match(zone) {
            Ok(())
        } else {
            let mut err = ValidationError::new("invalid_zone");
            err.add_param("zone".into(), &zone.to_string());
            Err(err)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Log {
    #[validate(length(min = 1))]
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_load_file() {
        init_log();
        let conf_str = r#"
---
runtime:
  mode: node
  zone: zone-a.east
  async_workers: 8

log:
  path: /tmp/assembly-runtime/runtime.log
        "#;
        let conf = Config::from_yaml(conf_str).unwrap();
        assert_eq!(RuntimeMode::Node, conf.runtime.mode);
        assert_eq!("zone-a.east", conf.runtime.zone);
        assert_eq!(8, conf.runtime.async_workers);
        assert_eq!(
            "/tmp/assembly-runtime/runtime.log",
            conf.log.as_ref().unwrap().path
        );
    }

    #[test]
    fn test_defaults() {
        init_log();
        let conf = Config::from_yaml("---\n{}\n").unwrap();
        assert_eq!(RuntimeMode::Vm, conf.runtime.mode);
        assert_eq!("default.zone", conf.runtime.zone);
        assert_eq!(4, conf.runtime.async_workers);
        assert!(conf.log.is_none());
    }

    #[test]
    fn test_valid_zone_name() {
        init_log();
        let conf_str = r#"
---
runtime:
  zone: "bad zone!"
        "#;
        let err = Config::from_yaml(conf_str).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_valid_async_workers_range() {
        init_log();
        let conf_str = r#"
---
runtime:
  async_workers: 0
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }

    #[test]
    fn test_valid_log_path_length() {
        init_log();
        let conf_str = r#"
---
log:
  path: ""
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        init_log();
        let conf_str = r#"
---
runtime:
  mode: cluster
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }

    #[test]
    fn test_load_from_yaml_file() {
        init_log();
        let path = std::env::temp_dir().join(format!("runtime-{}.yaml", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "runtime:\n  mode: controller").unwrap();

        let conf = Config::load_from_yaml(path.display().to_string()).unwrap();
        assert_eq!(RuntimeMode::Controller, conf.runtime.mode);
        fs::remove_file(&path).unwrap();

        let yaml = conf.to_yaml().unwrap();
        assert!(yaml.contains("controller"));
    }
}
