//! Factory configuration.
//!
//! [`FactoryConfiguration`] is what the resource generators consume. It can be
//! loaded from a YAML file and patched with [`ConfigOverrides`] coming from
//! the environment or the command line. Validation is a separate, explicit
//! step: the generators themselves accept anything.
//!
//! Example:
//! ```yaml
//! namespace: cdi
//! imageRepository: quay.io/kubevirt
//! controllerImageName: cdi-controller
//! importerImageName: cdi-importer
//! clonerImageName: cdi-cloner
//! uploadServerImageName: cdi-uploadserver
//! imageTag: v1.2.3
//! logVerbosity: "1"
//! imagePullPolicy: IfNotPresent
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Whether the container runtime re-fetches an image before starting it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum PullPolicy {
    Always,
    #[default]
    IfNotPresent,
    Never,
}

impl PullPolicy {
    /// The Kubernetes spelling of the policy
    pub fn as_str(&self) -> &'static str {
        match self {
            PullPolicy::Always => "Always",
            PullPolicy::IfNotPresent => "IfNotPresent",
            PullPolicy::Never => "Never",
        }
    }
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PullPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Always" => Ok(PullPolicy::Always),
            "IfNotPresent" => Ok(PullPolicy::IfNotPresent),
            "Never" => Ok(PullPolicy::Never),
            other => Err(Error::InvalidPullPolicy(other.to_string())),
        }
    }
}

/// Inputs to the CDI controller resource generators.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FactoryConfiguration {
    /// Namespace CDI is installed into.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Registry and organisation prefix of every CDI image.
    #[serde(default = "default_image_repository")]
    pub image_repository: String,

    #[serde(default = "default_controller_image")]
    pub controller_image_name: String,

    #[serde(default = "default_importer_image")]
    pub importer_image_name: String,

    #[serde(default = "default_cloner_image")]
    pub cloner_image_name: String,

    #[serde(default = "default_upload_server_image")]
    pub upload_server_image_name: String,

    /// Tag shared by every CDI image.
    #[serde(default = "default_image_tag")]
    pub image_tag: String,

    /// Passed to the controller as `-v=<level>`.
    #[serde(default = "default_log_verbosity")]
    pub log_verbosity: String,

    #[serde(default)]
    pub image_pull_policy: PullPolicy,
}

impl Default for FactoryConfiguration {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            image_repository: default_image_repository(),
            controller_image_name: default_controller_image(),
            importer_image_name: default_importer_image(),
            cloner_image_name: default_cloner_image(),
            upload_server_image_name: default_upload_server_image(),
            image_tag: default_image_tag(),
            log_verbosity: default_log_verbosity(),
            image_pull_policy: PullPolicy::default(),
        }
    }
}

fn default_namespace() -> String {
    "cdi".to_string()
}

fn default_image_repository() -> String {
    "kubevirt".to_string()
}

fn default_controller_image() -> String {
    "cdi-controller".to_string()
}

fn default_importer_image() -> String {
    "cdi-importer".to_string()
}

fn default_cloner_image() -> String {
    "cdi-cloner".to_string()
}

fn default_upload_server_image() -> String {
    "cdi-uploadserver".to_string()
}

fn default_image_tag() -> String {
    "latest".to_string()
}

fn default_log_verbosity() -> String {
    "1".to_string()
}

impl FactoryConfiguration {
    /// Parse a configuration from YAML. Missing keys take their defaults;
    /// unknown or miscased keys are rejected.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading factory configuration");
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Check the configuration before handing it to the generators.
    ///
    /// Required fields must not be empty or whitespace-only. Returns the first
    /// problem found. The generators never call this.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("namespace", &self.namespace),
            ("imageRepository", &self.image_repository),
            ("controllerImageName", &self.controller_image_name),
            ("importerImageName", &self.importer_image_name),
            ("clonerImageName", &self.cloner_image_name),
            ("uploadServerImageName", &self.upload_server_image_name),
            ("imageTag", &self.image_tag),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::validation(field, "must not be empty"));
            }
        }

        if self.log_verbosity.parse::<u32>().is_err() {
            return Err(Error::validation(
                "logVerbosity",
                format!("expected a non-negative integer, got {:?}", self.log_verbosity),
            ));
        }

        Ok(())
    }
}

pub const NAMESPACE_ENV: &str = "CDI_NAMESPACE";
pub const IMAGE_REPOSITORY_ENV: &str = "DOCKER_REPO";
pub const CONTROLLER_IMAGE_ENV: &str = "CONTROLLER_IMAGE";
pub const IMPORTER_IMAGE_ENV: &str = "IMPORTER_IMAGE";
pub const CLONER_IMAGE_ENV: &str = "CLONER_IMAGE";
pub const UPLOAD_SERVER_IMAGE_ENV: &str = "UPLOADSERVER_IMAGE";
pub const IMAGE_TAG_ENV: &str = "DOCKER_TAG";
pub const VERBOSITY_ENV: &str = "VERBOSITY";
pub const PULL_POLICY_ENV: &str = "PULL_POLICY";

/// Field-by-field replacements layered on top of a loaded configuration.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub namespace: Option<String>,
    pub image_repository: Option<String>,
    pub controller_image_name: Option<String>,
    pub importer_image_name: Option<String>,
    pub cloner_image_name: Option<String>,
    pub upload_server_image_name: Option<String>,
    pub image_tag: Option<String>,
    pub log_verbosity: Option<String>,
    pub image_pull_policy: Option<String>,
}

impl ConfigOverrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, keyed by the `*_ENV` variable names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        ConfigOverrides {
            namespace: lookup(NAMESPACE_ENV),
            image_repository: lookup(IMAGE_REPOSITORY_ENV),
            controller_image_name: lookup(CONTROLLER_IMAGE_ENV),
            importer_image_name: lookup(IMPORTER_IMAGE_ENV),
            cloner_image_name: lookup(CLONER_IMAGE_ENV),
            upload_server_image_name: lookup(UPLOAD_SERVER_IMAGE_ENV),
            image_tag: lookup(IMAGE_TAG_ENV),
            log_verbosity: lookup(VERBOSITY_ENV),
            image_pull_policy: lookup(PULL_POLICY_ENV),
        }
    }

    /// Merge with a lower-precedence set; fields set on `self` win.
    pub fn or(self, lower: ConfigOverrides) -> Self {
        ConfigOverrides {
            namespace: self.namespace.or(lower.namespace),
            image_repository: self.image_repository.or(lower.image_repository),
            controller_image_name: self.controller_image_name.or(lower.controller_image_name),
            importer_image_name: self.importer_image_name.or(lower.importer_image_name),
            cloner_image_name: self.cloner_image_name.or(lower.cloner_image_name),
            upload_server_image_name: self
                .upload_server_image_name
                .or(lower.upload_server_image_name),
            image_tag: self.image_tag.or(lower.image_tag),
            log_verbosity: self.log_verbosity.or(lower.log_verbosity),
            image_pull_policy: self.image_pull_policy.or(lower.image_pull_policy),
        }
    }

    /// Apply every set override to `config`.
    ///
    /// Fails only if the pull policy override is not a recognised policy.
    pub fn apply(self, mut config: FactoryConfiguration) -> Result<FactoryConfiguration> {
        fn replace(target: &mut String, value: Option<String>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        replace(&mut config.namespace, self.namespace);
        replace(&mut config.image_repository, self.image_repository);
        replace(&mut config.controller_image_name, self.controller_image_name);
        replace(&mut config.importer_image_name, self.importer_image_name);
        replace(&mut config.cloner_image_name, self.cloner_image_name);
        replace(
            &mut config.upload_server_image_name,
            self.upload_server_image_name,
        );
        replace(&mut config.image_tag, self.image_tag);
        replace(&mut config.log_verbosity, self.log_verbosity);
        if let Some(policy) = self.image_pull_policy {
            config.image_pull_policy = policy.parse()?;
        }

        Ok(config)
    }
}

/// Resolve the effective configuration.
///
/// Precedence, lowest first: built-in defaults, the YAML file at `path`,
/// `env`, then `flags`.
pub fn load_config(
    path: Option<&Path>,
    env: ConfigOverrides,
    flags: ConfigOverrides,
) -> Result<FactoryConfiguration> {
    let base = match path {
        Some(path) => FactoryConfiguration::from_yaml_file(path)?,
        None => {
            debug!("No configuration file given, using defaults");
            FactoryConfiguration::default()
        }
    };
    flags.or(env).apply(base)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::get_unwrap
)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_policy_display() {
        assert_eq!(PullPolicy::Always.to_string(), "Always");
        assert_eq!(PullPolicy::IfNotPresent.to_string(), "IfNotPresent");
        assert_eq!(PullPolicy::Never.to_string(), "Never");
    }

    #[test]
    fn test_pull_policy_from_str() {
        assert_eq!("Never".parse::<PullPolicy>().unwrap(), PullPolicy::Never);
        let err = "always".parse::<PullPolicy>().unwrap_err();
        assert!(matches!(err, Error::InvalidPullPolicy(ref s) if s == "always"));
    }

    #[test]
    fn test_pull_policy_default() {
        assert_eq!(PullPolicy::default(), PullPolicy::IfNotPresent);
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = FactoryConfiguration::from_yaml_str(
            "namespace: storage\nimageTag: v1.2.3\nimagePullPolicy: Always\n",
        )
        .unwrap();

        assert_eq!(config.namespace, "storage");
        assert_eq!(config.image_tag, "v1.2.3");
        assert_eq!(config.image_pull_policy, PullPolicy::Always);
        assert_eq!(config.image_repository, "kubevirt");
        assert_eq!(config.importer_image_name, "cdi-importer");
    }

    #[test]
    fn test_from_yaml_unknown_pull_policy() {
        let result = FactoryConfiguration::from_yaml_str("imagePullPolicy: Sometimes\n");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn test_from_yaml_unknown_key() {
        let result = FactoryConfiguration::from_yaml_str("image_tag: v2\n");
        assert!(matches!(result, Err(Error::Yaml(_))));

        let result =
            FactoryConfiguration::from_yaml_str("imageTag: v2.0.0\nimagePullpolicy: Always\n");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn test_validate_default() {
        assert!(FactoryConfiguration::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_field() {
        let config = FactoryConfiguration {
            importer_image_name: String::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("importerImageName"));
    }

    #[test]
    fn test_validate_whitespace_field() {
        let config = FactoryConfiguration {
            image_tag: "  ".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("imageTag"));
    }

    #[test]
    fn test_validate_verbosity() {
        let config = FactoryConfiguration {
            log_verbosity: "loud".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logVerbosity"));
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = ConfigOverrides {
            image_repository: Some("quay.io/org".to_string()),
            image_pull_policy: Some("Never".to_string()),
            ..Default::default()
        };
        let config = overrides.apply(FactoryConfiguration::default()).unwrap();

        assert_eq!(config.image_repository, "quay.io/org");
        assert_eq!(config.image_pull_policy, PullPolicy::Never);
        assert_eq!(config.namespace, "cdi");
    }

    #[test]
    fn test_overrides_reject_bad_pull_policy() {
        let overrides = ConfigOverrides {
            image_pull_policy: Some("Sometimes".to_string()),
            ..Default::default()
        };
        assert!(overrides.apply(FactoryConfiguration::default()).is_err());
    }

    #[test]
    fn test_overrides_or_prefers_self() {
        let flags = ConfigOverrides {
            image_tag: Some("flag".to_string()),
            ..Default::default()
        };
        let env = ConfigOverrides {
            image_tag: Some("env".to_string()),
            namespace: Some("env-ns".to_string()),
            ..Default::default()
        };
        let merged = flags.or(env);

        assert_eq!(merged.image_tag.as_deref(), Some("flag"));
        assert_eq!(merged.namespace.as_deref(), Some("env-ns"));
        assert!(merged.image_repository.is_none());
    }

    #[test]
    fn test_from_lookup_variable_names() {
        let overrides = ConfigOverrides::from_lookup(|key| match key {
            "DOCKER_REPO" => Some("quay.io/org".to_string()),
            "UPLOADSERVER_IMAGE" => Some("upload".to_string()),
            _ => None,
        });

        assert_eq!(overrides.image_repository.as_deref(), Some("quay.io/org"));
        assert_eq!(overrides.upload_server_image_name.as_deref(), Some("upload"));
        assert!(overrides.namespace.is_none());
    }
}
