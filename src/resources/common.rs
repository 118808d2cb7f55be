//! Common resource generation utilities.
//!
//! Skeleton builders shared by the CDI component generators: label merging,
//! ServiceAccounts, Deployments and containers.

use k8s_openapi::api::{
    apps::v1::{Deployment, DeploymentSpec},
    core::v1::{Container, PodSecurityContext, PodSpec, PodTemplateSpec, ServiceAccount},
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

use crate::config::PullPolicy;
use crate::resources::names::CDI_LABEL;

/// Labels applied to every CDI resource
pub fn common_labels() -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(CDI_LABEL.to_string(), String::new());
    labels
}

/// Merge the common labels into `labels`.
///
/// `None` is treated as an empty map. Keys already present in `labels` keep
/// their value.
pub fn with_common_labels(labels: Option<BTreeMap<String, String>>) -> BTreeMap<String, String> {
    let mut labels = labels.unwrap_or_default();
    for (key, value) in common_labels() {
        labels.entry(key).or_insert(value);
    }
    labels
}

/// Format a container image reference as `<repository>/<image>:<tag>`.
///
/// Empty segments are kept as-is.
pub fn image_reference(repository: &str, image: &str, tag: &str) -> String {
    format!("{}/{}:{}", repository, image, tag)
}

/// Generate a labelled ServiceAccount
pub fn create_service_account(name: &str) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(with_common_labels(None)),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Generate a Deployment skeleton with an empty container list.
///
/// The selector matches `{match_key: match_value}`; the Deployment and its pod
/// template carry the same pair plus the common labels. An empty
/// `service_account` leaves the pod on the namespace default account.
pub fn create_deployment(
    name: &str,
    match_key: &str,
    match_value: &str,
    service_account: &str,
    replicas: i32,
) -> Deployment {
    let mut match_labels = BTreeMap::new();
    match_labels.insert(match_key.to_string(), match_value.to_string());
    let labels = with_common_labels(Some(match_labels.clone()));

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(match_labels),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: if service_account.is_empty() {
                        None
                    } else {
                        Some(service_account.to_string())
                    },
                    security_context: Some(PodSecurityContext {
                        run_as_non_root: Some(true),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Generate a container running `<repository>/<image>:<tag>` at the given
/// log verbosity.
pub fn create_container(
    name: &str,
    repository: &str,
    image: &str,
    tag: &str,
    verbosity: &str,
    pull_policy: PullPolicy,
) -> Container {
    Container {
        name: name.to_string(),
        image: Some(image_reference(repository, image, tag)),
        image_pull_policy: Some(pull_policy.to_string()),
        args: Some(vec![format!("-v={}", verbosity)]),
        ..Default::default()
    }
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
    fn test_with_common_labels_none() {
        let labels = with_common_labels(None);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels.get(CDI_LABEL), Some(&String::new()));
    }

    #[test]
    fn test_with_common_labels_keeps_existing_values() {
        let mut existing = BTreeMap::new();
        existing.insert(CDI_LABEL.to_string(), "custom".to_string());
        existing.insert("app".to_string(), "x".to_string());

        let labels = with_common_labels(Some(existing));
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get(CDI_LABEL), Some(&"custom".to_string()));
        assert_eq!(labels.get("app"), Some(&"x".to_string()));
    }

    #[test]
    fn test_image_reference() {
        assert_eq!(
            image_reference("quay.io/org", "cdi-importer", "v1.2.3"),
            "quay.io/org/cdi-importer:v1.2.3"
        );
        assert_eq!(image_reference("", "", ""), "/:");
    }

    #[test]
    fn test_create_service_account() {
        let sa = create_service_account("cdi-sa");
        assert_eq!(sa.metadata.name, Some("cdi-sa".to_string()));
        assert_eq!(sa.metadata.labels, Some(common_labels()));
    }

    #[test]
    fn test_create_deployment_skeleton() {
        let deployment = create_deployment("d", "app", "v", "sa", 1);

        let labels = deployment.metadata.labels.unwrap();
        assert_eq!(labels.get("app"), Some(&"v".to_string()));
        assert!(labels.contains_key(CDI_LABEL));

        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(1));
        let selector = spec.selector.match_labels.unwrap();
        assert_eq!(selector.len(), 1);
        assert_eq!(selector.get("app"), Some(&"v".to_string()));

        let template_labels = spec.template.metadata.unwrap().labels.unwrap();
        assert_eq!(template_labels, labels);

        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.service_account_name, Some("sa".to_string()));
        assert!(pod.containers.is_empty());
        assert_eq!(pod.security_context.unwrap().run_as_non_root, Some(true));
    }

    #[test]
    fn test_create_deployment_without_service_account() {
        let deployment = create_deployment("d", "app", "v", "", 1);
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.service_account_name, None);
    }

    #[test]
    fn test_create_container() {
        let container = create_container("c", "repo", "img", "v1", "3", PullPolicy::Always);
        assert_eq!(container.name, "c");
        assert_eq!(container.image, Some("repo/img:v1".to_string()));
        assert_eq!(container.image_pull_policy, Some("Always".to_string()));
        assert_eq!(container.args, Some(vec!["-v=3".to_string()]));
    }
}
