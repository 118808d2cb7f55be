// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for cdi-manifests.
//!
//! Uses proptest to generate random configurations and verify the invariants
//! of the generated resources.

use proptest::prelude::*;

use cdi_manifests::{FactoryConfiguration, PullPolicy, ResourceDescription, ResourceFactory};

/// Strategy for image-name-like strings, including the empty string.
fn image_segment() -> impl Strategy<Value = String> {
    "[a-z0-9./-]{0,24}"
}

fn any_pull_policy() -> impl Strategy<Value = PullPolicy> {
    prop_oneof![
        Just(PullPolicy::Always),
        Just(PullPolicy::IfNotPresent),
        Just(PullPolicy::Never),
    ]
}

/// Strategy for arbitrary (not necessarily valid) configurations.
fn any_config() -> impl Strategy<Value = FactoryConfiguration> {
    (
        "[a-z0-9-]{0,16}",
        image_segment(),
        image_segment(),
        image_segment(),
        image_segment(),
        image_segment(),
        "[a-zA-Z0-9._-]{0,16}",
        "[0-9]{0,2}",
        any_pull_policy(),
    )
        .prop_map(
            |(
                namespace,
                image_repository,
                controller_image_name,
                importer_image_name,
                cloner_image_name,
                upload_server_image_name,
                image_tag,
                log_verbosity,
                image_pull_policy,
            )| FactoryConfiguration {
                namespace,
                image_repository,
                controller_image_name,
                importer_image_name,
                cloner_image_name,
                upload_server_image_name,
                image_tag,
                log_verbosity,
                image_pull_policy,
            },
        )
}

proptest! {
    /// Property: the aggregate is always ServiceAccount, Deployment, ConfigMap.
    #[test]
    fn test_fixed_shape(config in any_config()) {
        let resources = ResourceFactory::default().build_namespaced_resources(&config);
        let kinds: Vec<&str> = resources.iter().map(|r| r.kind()).collect();
        prop_assert_eq!(kinds, vec!["ServiceAccount", "Deployment", "ConfigMap"]);
    }

    /// Property: one container, one volume mount, one volume, whatever the input.
    #[test]
    fn test_single_container_and_mount(config in any_config()) {
        let deployment = ResourceFactory::default().deployment(&config);
        let pod = deployment.spec.unwrap().template.spec.unwrap();

        prop_assert_eq!(pod.containers.len(), 1);
        prop_assert_eq!(pod.volumes.as_ref().map(Vec::len), Some(1));
        prop_assert_eq!(pod.containers[0].volume_mounts.as_ref().map(Vec::len), Some(1));
    }

    /// Property: env vars follow the fixed order and formatting rules.
    #[test]
    fn test_env_formatting(config in any_config()) {
        let deployment = ResourceFactory::default().deployment(&config);
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let env: Vec<(String, String)> = pod.containers[0]
            .env
            .clone()
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.value.unwrap_or_default()))
            .collect();

        let repo = &config.image_repository;
        let tag = &config.image_tag;
        let expected = vec![
            ("IMPORTER_IMAGE".to_string(), format!("{}/{}:{}", repo, config.importer_image_name, tag)),
            ("CLONER_IMAGE".to_string(), format!("{}/{}:{}", repo, config.cloner_image_name, tag)),
            ("UPLOADSERVER_IMAGE".to_string(), format!("{}/{}:{}", repo, config.upload_server_image_name, tag)),
            ("UPLOADPROXY_SERVICE".to_string(), "cdi-uploadproxy".to_string()),
            ("PULL_POLICY".to_string(), config.image_pull_policy.to_string()),
        ];
        prop_assert_eq!(env, expected);
    }

    /// Property: generation is deterministic.
    #[test]
    fn test_deterministic(config in any_config()) {
        let factory = ResourceFactory::default();
        prop_assert_eq!(
            factory.build_namespaced_resources(&config),
            factory.build_namespaced_resources(&config)
        );
    }

    /// Property: exactly one privileged name, built from the namespace.
    #[test]
    fn test_privileged_name(config in any_config()) {
        let names = ResourceFactory::default().privileged_service_account_names(&config);
        prop_assert_eq!(names, vec![format!("system:serviceaccount:{}:cdi-sa", config.namespace)]);
    }
}

/// The metrics Service selector must be a subset of its own labels.
#[test]
fn test_metrics_selector_subset_of_labels() {
    let svc = ResourceFactory::default().metrics_service();
    let labels = svc.metadata.labels.clone().unwrap();
    let selector = svc.spec.unwrap().selector.unwrap();

    assert!(!selector.is_empty());
    for (key, value) in &selector {
        assert_eq!(labels.get(key), Some(value), "selector key {} not in labels", key);
    }
    assert!(matches!(
        ResourceDescription::from(ResourceFactory::default().metrics_service()),
        ResourceDescription::Service(_)
    ));
}
