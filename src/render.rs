//! Manifest rendering.
//!
//! Serializes generated resources for the installer: either a multi-document
//! YAML stream or a single JSON `v1/List`.

use std::fmt;
use std::io::{ErrorKind, Write};
use std::str::FromStr;

use serde_json::json;
use tracing::{debug, info};

use crate::config::FactoryConfiguration;
use crate::error::Result;
use crate::resources::{ResourceDescription, ResourceFactory};

/// Output format of rendered manifests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Yaml => f.write_str("yaml"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format {:?}", other)),
        }
    }
}

/// Render resources in the given format
pub fn render(resources: &[ResourceDescription], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => to_yaml(resources),
        OutputFormat::Json => to_json_list(resources),
    }
}

/// Produce the `render` command's output for `config`.
///
/// Validates first unless `skip_validation` is set. With
/// `with_metrics_service` the metrics Service is appended after the
/// namespaced resources.
pub fn render_command(
    factory: &ResourceFactory,
    config: &FactoryConfiguration,
    format: OutputFormat,
    with_metrics_service: bool,
    skip_validation: bool,
) -> Result<String> {
    if !skip_validation {
        config.validate()?;
    }

    let mut resources = factory.build_namespaced_resources(config);
    if with_metrics_service {
        resources.push(ResourceDescription::from(factory.metrics_service()));
    }

    info!(
        namespace = %config.namespace,
        count = resources.len(),
        format = %format,
        "Rendering resources"
    );
    render(&resources, format)
}

/// Write rendered output, treating a closed reader as a clean finish.
pub fn write_output(out: &mut impl Write, text: &str) -> Result<()> {
    match out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!("Output closed by reader");
            Ok(())
        }
        result => Ok(result?),
    }
}

/// One YAML document per resource, each preceded by `---`.
pub fn to_yaml(resources: &[ResourceDescription]) -> Result<String> {
    let mut out = String::new();
    for resource in resources {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(resource)?);
    }
    Ok(out)
}

/// Pretty-printed `v1/List` wrapping every resource.
pub fn to_json_list(resources: &[ResourceDescription]) -> Result<String> {
    let items = serde_json::to_value(resources)?;
    let list = json!({
        "apiVersion": "v1",
        "kind": "List",
        "items": items,
    });
    let mut out = serde_json::to_string_pretty(&list)?;
    out.push('\n');
    Ok(out)
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

    fn resources() -> Vec<ResourceDescription> {
        ResourceFactory::default().build_namespaced_resources(&FactoryConfiguration::default())
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("yaml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!("YML".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("toml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_yaml_documents() {
        let yaml = to_yaml(&resources()).unwrap();

        assert_eq!(yaml.matches("---\n").count(), 3);
        assert!(yaml.contains("kind: ServiceAccount"));
        assert!(yaml.contains("kind: Deployment"));
        assert!(yaml.contains("kind: ConfigMap"));
        assert!(yaml.contains("apiVersion: apps/v1"));
    }

    #[test]
    fn test_json_list() {
        let rendered = to_json_list(&resources()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["kind"], "List");
        let items = value["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["kind"], "ServiceAccount");
        assert_eq!(items[1]["kind"], "Deployment");
        assert_eq!(items[1]["metadata"]["name"], "cdi-deployment");
        assert_eq!(items[2]["kind"], "ConfigMap");
        assert!(items[2].get("data").is_none());
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[], OutputFormat::Yaml).unwrap(), "");
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::StorageFull))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_output() {
        let mut buf = Vec::new();
        write_output(&mut buf, "kind: List\n").unwrap();
        assert_eq!(buf, b"kind: List\n");
    }

    #[test]
    fn test_write_output_broken_pipe_is_clean() {
        assert!(write_output(&mut ClosedPipe, "---\n").is_ok());
    }

    #[test]
    fn test_write_output_other_errors_propagate() {
        let err = write_output(&mut FullDisk, "---\n").unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }
}
