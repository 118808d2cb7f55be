// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for cdi-manifests.
//!
//! These tests exercise the public API end to end without a Kubernetes
//! cluster: configuration in, resources and rendered manifests out.

#[path = "../common/fixtures.rs"]
mod fixtures;

mod factory_tests {
    use cdi_manifests::{ResourceDescription, ResourceFactory};

    use crate::fixtures::{FactoryConfigurationBuilder, test_config};

    #[test]
    fn test_three_resources_in_order() {
        let resources = ResourceFactory::default().build_namespaced_resources(&test_config());

        assert_eq!(resources.len(), 3);
        assert!(matches!(
            resources[0],
            ResourceDescription::ServiceAccount(_)
        ));
        assert!(matches!(resources[1], ResourceDescription::Deployment(_)));
        assert!(matches!(resources[2], ResourceDescription::ConfigMap(_)));
    }

    #[test]
    fn test_deployment_references_service_account() {
        let resources = ResourceFactory::default().build_namespaced_resources(&test_config());

        let ResourceDescription::ServiceAccount(sa) = &resources[0] else {
            panic!("expected a ServiceAccount first");
        };
        let ResourceDescription::Deployment(deployment) = &resources[1] else {
            panic!("expected a Deployment second");
        };

        let pod = deployment
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap();
        assert_eq!(pod.service_account_name, sa.metadata.name);
    }

    #[test]
    fn test_importer_image_env() {
        let config = FactoryConfigurationBuilder::new()
            .repository("quay.io/org")
            .importer_image("cdi-importer")
            .tag("v1.2.3")
            .build();
        let deployment = ResourceFactory::default().deployment(&config);

        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let container = &pod.containers[0];
        let importer = &container.env.as_ref().unwrap()[0];
        assert_eq!(importer.name, "IMPORTER_IMAGE");
        assert_eq!(
            importer.value.as_deref(),
            Some("quay.io/org/cdi-importer:v1.2.3")
        );
    }

    #[test]
    fn test_identical_config_identical_output() {
        let factory = ResourceFactory::default();
        let config = test_config();

        let first = factory.build_namespaced_resources(&config);
        let second = factory.build_namespaced_resources(&config);
        assert_eq!(first, second);
        assert_eq!(factory.metrics_service(), factory.metrics_service());
    }

    #[test]
    fn test_privileged_names_follow_namespace() {
        let factory = ResourceFactory::default();

        let cdi = FactoryConfigurationBuilder::new().namespace("cdi").build();
        assert_eq!(
            factory.privileged_service_account_names(&cdi),
            vec!["system:serviceaccount:cdi:cdi-sa".to_string()]
        );

        let other = FactoryConfigurationBuilder::new()
            .namespace("storage-system")
            .build();
        assert_eq!(
            factory.privileged_service_account_names(&other),
            vec!["system:serviceaccount:storage-system:cdi-sa".to_string()]
        );
    }

    #[test]
    fn test_factory_shared_across_threads() {
        let factory = std::sync::Arc::new(ResourceFactory::default());
        let expected = factory.build_namespaced_resources(&test_config());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let factory = factory.clone();
                std::thread::spawn(move || factory.build_namespaced_resources(&test_config()))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}

mod permissive_input_tests {
    use cdi_manifests::ResourceFactory;

    use crate::fixtures::FactoryConfigurationBuilder;

    #[test]
    fn test_empty_repository_and_images() {
        let config = FactoryConfigurationBuilder::new()
            .repository("")
            .controller_image("")
            .cloner_image("")
            .build();
        let deployment = ResourceFactory::default().deployment(&config);
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let container = &pod.containers[0];

        assert_eq!(container.image.as_deref(), Some("/:v1.2.3"));
        let cloner = &container.env.as_ref().unwrap()[1];
        assert_eq!(cloner.value.as_deref(), Some("/:v1.2.3"));
    }

    #[test]
    fn test_trailing_slash_repository_with_empty_image() {
        let config = FactoryConfigurationBuilder::new()
            .repository("quay.io/org/")
            .upload_server_image("")
            .build();
        let deployment = ResourceFactory::default().deployment(&config);
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let container = &pod.containers[0];

        let upload = &container.env.as_ref().unwrap()[2];
        assert_eq!(upload.name, "UPLOADSERVER_IMAGE");
        assert_eq!(upload.value.as_deref(), Some("quay.io/org//:v1.2.3"));
    }

    #[test]
    fn test_empty_namespace_privileged_name() {
        let config = FactoryConfigurationBuilder::new().namespace("").build();
        assert_eq!(
            ResourceFactory::default().privileged_service_account_names(&config),
            vec!["system:serviceaccount::cdi-sa".to_string()]
        );
    }
}

mod config_tests {
    use std::io::Write;

    use cdi_manifests::{ConfigOverrides, Error, FactoryConfiguration, PullPolicy};

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "namespace: storage\nimageRepository: quay.io/org\nimageTag: v1.60.0\nlogVerbosity: \"3\"\nimagePullPolicy: Always"
        )
        .unwrap();

        let config = FactoryConfiguration::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.namespace, "storage");
        assert_eq!(config.image_repository, "quay.io/org");
        assert_eq!(config.image_tag, "v1.60.0");
        assert_eq!(config.log_verbosity, "3");
        assert_eq!(config.image_pull_policy, PullPolicy::Always);
        assert_eq!(config.controller_image_name, "cdi-controller");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = FactoryConfiguration::from_yaml_file(dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let base = FactoryConfiguration::from_yaml_str("imageTag: v1\n").unwrap();
        let overrides = ConfigOverrides {
            image_tag: Some("v2".to_string()),
            ..Default::default()
        };
        assert_eq!(overrides.apply(base).unwrap().image_tag, "v2");
    }

    #[test]
    fn test_validation_is_separate_from_generation() {
        let config = FactoryConfiguration {
            namespace: String::new(),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_validation());

        // The factory still produces output for the same input
        let resources = cdi_manifests::ResourceFactory::default().build_namespaced_resources(&config);
        assert_eq!(resources.len(), 3);
    }
}

mod render_tests {
    use cdi_manifests::render::{OutputFormat, render};
    use cdi_manifests::{ResourceDescription, ResourceFactory};

    use crate::fixtures::test_config;

    #[test]
    fn test_yaml_round_trips_through_documents() {
        let factory = ResourceFactory::default();
        let mut resources = factory.build_namespaced_resources(&test_config());
        resources.push(ResourceDescription::from(factory.metrics_service()));

        let yaml = render(&resources, OutputFormat::Yaml).unwrap();
        let documents: Vec<serde_yaml::Value> = yaml
            .split("---\n")
            .filter(|doc| !doc.trim().is_empty())
            .map(|doc| serde_yaml::from_str(doc).unwrap())
            .collect();

        assert_eq!(documents.len(), 4);
        let kinds: Vec<&str> = documents
            .iter()
            .map(|doc| doc["kind"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec!["ServiceAccount", "Deployment", "ConfigMap", "Service"]
        );

        let deployment = &documents[1];
        let container = &deployment["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(
            container["readinessProbe"]["exec"]["command"][1].as_str(),
            Some("/tmp/ready")
        );
        assert_eq!(
            container["volumeMounts"][0]["mountPath"].as_str(),
            Some("/var/run/cdi/apiserver/key")
        );
    }

    #[test]
    fn test_json_list_metrics_service() {
        let factory = ResourceFactory::default();
        let resources = vec![ResourceDescription::from(factory.metrics_service())];

        let rendered = render(&resources, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        let svc = &value["items"][0];

        assert_eq!(svc["apiVersion"], "v1");
        assert_eq!(svc["metadata"]["name"], "kubevirt-prometheus-metrics");
        assert_eq!(svc["spec"]["ports"][0]["port"], 443);
        assert_eq!(svc["spec"]["ports"][0]["targetPort"], "metrics");
        assert_eq!(svc["spec"]["ports"][0]["protocol"], "TCP");
    }
}

mod command_tests {
    use std::collections::HashMap;
    use std::io::Write;

    use cdi_manifests::render::{OutputFormat, render_command};
    use cdi_manifests::{ConfigOverrides, FactoryConfiguration, ResourceFactory, load_config};

    use crate::fixtures::{FactoryConfigurationBuilder, test_config};

    fn env(vars: &[(&str, &str)]) -> ConfigOverrides {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigOverrides::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_file_or_overrides() {
        let config = load_config(None, env(&[]), ConfigOverrides::default()).unwrap();
        assert_eq!(config, FactoryConfiguration::default());
    }

    #[test]
    fn test_precedence_defaults_file_env_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "namespace: from-file\nimageRepository: file.io/org\nimageTag: file-tag"
        )
        .unwrap();

        let env = env(&[
            ("DOCKER_REPO", "env.io/org"),
            ("DOCKER_TAG", "env-tag"),
            ("PULL_POLICY", "Never"),
        ]);
        let flags = ConfigOverrides {
            image_tag: Some("flag-tag".to_string()),
            ..Default::default()
        };

        let config = load_config(Some(file.path()), env, flags).unwrap();
        // default
        assert_eq!(config.controller_image_name, "cdi-controller");
        // file
        assert_eq!(config.namespace, "from-file");
        // env over file
        assert_eq!(config.image_repository, "env.io/org");
        assert_eq!(config.image_pull_policy, cdi_manifests::PullPolicy::Never);
        // flag over env
        assert_eq!(config.image_tag, "flag-tag");
    }

    #[test]
    fn test_bad_env_pull_policy_fails_load() {
        let result = load_config(
            None,
            env(&[("PULL_POLICY", "Sometimes")]),
            ConfigOverrides::default(),
        );
        assert!(matches!(
            result,
            Err(cdi_manifests::Error::InvalidPullPolicy(_))
        ));
    }

    #[test]
    fn test_render_refuses_invalid_config() {
        let factory = ResourceFactory::default();
        let config = FactoryConfigurationBuilder::new().tag("").build();

        let err = render_command(&factory, &config, OutputFormat::Yaml, false, false).unwrap_err();
        assert!(err.is_validation());

        let rendered = render_command(&factory, &config, OutputFormat::Yaml, false, true).unwrap();
        assert_eq!(rendered.matches("---\n").count(), 3);
    }

    #[test]
    fn test_render_metrics_service_last() {
        let factory = ResourceFactory::default();

        let rendered =
            render_command(&factory, &test_config(), OutputFormat::Json, true, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        let kinds: Vec<&str> = value["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["kind"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec!["ServiceAccount", "Deployment", "ConfigMap", "Service"]
        );

        let rendered =
            render_command(&factory, &test_config(), OutputFormat::Json, false, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["items"].as_array().unwrap().len(), 3);
    }
}
