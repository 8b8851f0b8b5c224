use crate::adapters::dust_map::DEFAULT_SCALING;
use crate::adapters::rpc::{DEFAULT_CALL_TIMEOUT, DEFAULT_CONNECT_TIMEOUT};
use crate::core::backoff::BackoffPolicy;
use crate::utils::error::{ClassifyError, Result};
use crate::utils::validation::{
    validate_address, validate_path, validate_positive_number, validate_range, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub classify: ClassifySection,
    pub dust_map: DustMapSection,
    #[serde(default)]
    pub retry: RetrySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifySection {
    /// Address of the classification service, `tcp://host:port`
    pub default: String,
    pub call_timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DustMapSection {
    pub path: String,
    pub scaling: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySection {
    pub initial_interval_ms: Option<u64>,
    pub multiplier: Option<f64>,
    pub max_elapsed_seconds: Option<u64>,
    pub jitter_factor: Option<f64>,
}

impl ClassifierConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ClassifyError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replace `${VAR}` with the value of the environment variable; unknown variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ClassifyError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_address("classify.default", &self.classify.default)?;
        validate_path("dust_map.path", &self.dust_map.path)?;

        if let Some(timeout) = self.classify.call_timeout_seconds {
            validate_positive_number("classify.call_timeout_seconds", timeout, 1)?;
        }
        if let Some(timeout) = self.classify.connect_timeout_seconds {
            validate_positive_number("classify.connect_timeout_seconds", timeout, 1)?;
        }
        if let Some(scaling) = self.dust_map.scaling {
            validate_range("dust_map.scaling", scaling, 0.0, 10.0)?;
        }
        if let Some(initial) = self.retry.initial_interval_ms {
            validate_positive_number("retry.initial_interval_ms", initial, 1)?;
        }
        if let Some(multiplier) = self.retry.multiplier {
            validate_range("retry.multiplier", multiplier, 1.0, 10.0)?;
        }
        if let Some(max_elapsed) = self.retry.max_elapsed_seconds {
            validate_positive_number("retry.max_elapsed_seconds", max_elapsed, 1)?;
        }
        if let Some(jitter) = self.retry.jitter_factor {
            validate_range("retry.jitter_factor", jitter, 0.0, 1.0)?;
        }

        Ok(())
    }

    pub fn default_address(&self) -> &str {
        &self.classify.default
    }

    pub fn call_timeout(&self) -> Duration {
        self.classify
            .call_timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CALL_TIMEOUT)
    }

    pub fn connect_timeout(&self) -> Duration {
        self.classify
            .connect_timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn dust_map_path(&self) -> &str {
        &self.dust_map.path
    }

    pub fn dust_map_scaling(&self) -> f64 {
        self.dust_map.scaling.unwrap_or(DEFAULT_SCALING)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        let defaults = BackoffPolicy::default();
        BackoffPolicy {
            initial_interval: self
                .retry
                .initial_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_interval),
            multiplier: self.retry.multiplier.unwrap_or(defaults.multiplier),
            max_elapsed: self
                .retry
                .max_elapsed_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_elapsed),
            jitter_factor: self.retry.jitter_factor.unwrap_or(defaults.jitter_factor),
        }
    }
}

impl Validate for ClassifierConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let toml_content = r#"
[classify]
default = "tcp://127.0.0.1:4242"

[dust_map]
path = "data/sfd_ebv.csv"
"#;

        let config = ClassifierConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.default_address(), "tcp://127.0.0.1:4242");
        assert_eq!(config.dust_map_scaling(), 0.86);
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.backoff_policy(), BackoffPolicy::default());
        assert_eq!(config.backoff_policy().max_elapsed, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[classify]
default = "tcp://classifier.internal:4242"
call_timeout_seconds = 10
connect_timeout_seconds = 3

[dust_map]
path = "/data/sfd.csv"
scaling = 1.0

[retry]
initial_interval_ms = 250
multiplier = 3.0
max_elapsed_seconds = 60
jitter_factor = 0.2
"#;

        let config = ClassifierConfig::from_toml_str(toml_content).unwrap();
        let policy = config.backoff_policy();

        assert_eq!(config.call_timeout(), Duration::from_secs(10));
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.dust_map_scaling(), 1.0);
        assert_eq!(policy.initial_interval, Duration::from_millis(250));
        assert_eq!(policy.multiplier, 3.0);
        assert_eq!(policy.max_elapsed, Duration::from_secs(60));
        assert_eq!(policy.jitter_factor, 0.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("LC_CLASSIFY_TEST_ADDRESS", "tcp://10.0.0.5:4242");

        let toml_content = r#"
[classify]
default = "${LC_CLASSIFY_TEST_ADDRESS}"

[dust_map]
path = "${LC_CLASSIFY_TEST_UNSET_DIR}/sfd.csv"
"#;

        let config = ClassifierConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.default_address(), "tcp://10.0.0.5:4242");
        assert_eq!(config.dust_map_path(), "${LC_CLASSIFY_TEST_UNSET_DIR}/sfd.csv");

        std::env::remove_var("LC_CLASSIFY_TEST_ADDRESS");
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[classify]
default = "udp://host:1"

[dust_map]
path = "data/sfd_ebv.csv"
"#;

        let config = ClassifierConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = r#"
[classify]
default = "tcp://host:1"

[dust_map]
path = "data/sfd_ebv.csv"

[retry]
jitter_factor = 2.5
"#;

        let config = ClassifierConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_must_back_off() {
        let with_retry = |retry: &str| {
            ClassifierConfig::from_toml_str(&format!(
                "[classify]\ndefault = \"tcp://host:1\"\n\n[dust_map]\npath = \"sfd.csv\"\n\n[retry]\n{}\n",
                retry
            ))
            .unwrap()
        };

        let zero_wait = with_retry("initial_interval_ms = 0\nmax_elapsed_seconds = 1");
        match zero_wait.validate() {
            Err(ClassifyError::InvalidConfigValueError { field, .. }) => {
                assert_eq!(field, "retry.initial_interval_ms")
            }
            other => panic!("expected invalid initial interval, got {:?}", other),
        }

        assert!(with_retry("multiplier = 0.0").validate().is_err());
        assert!(with_retry("jitter_factor = nan").validate().is_err());
        assert!(with_retry("initial_interval_ms = 1").validate().is_ok());
    }

    #[test]
    fn test_missing_section_is_a_parse_error() {
        let result = ClassifierConfig::from_toml_str("[classify]\ndefault = \"tcp://h:1\"\n");
        assert!(matches!(result, Err(ClassifyError::TomlError(_))));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[classify]
default = "tcp://127.0.0.1:5555"

[dust_map]
path = "sfd.csv"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = ClassifierConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.default_address(), "tcp://127.0.0.1:5555");
    }
}
