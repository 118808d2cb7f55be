//! Deployment generation for the CDI controller.
//!
//! The controller Deployment carries:
//! - One `cdi-controller` container built from the shared container skeleton
//! - Image references for the worker pods it launches, passed through env vars
//! - A file-based readiness probe
//! - The API server's public signing key, mounted from an external Secret

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    EnvVar, ExecAction, KeyToPath, Probe, SecretVolumeSource, Volume, VolumeMount,
};

use crate::config::FactoryConfiguration;
use crate::resources::common::{create_container, create_deployment, image_reference};
use crate::resources::names::{
    API_SIGNING_KEY_FILE, DEPLOYMENT_MATCH_KEY, DEPLOYMENT_MATCH_VALUE, ENV_CLONER_IMAGE,
    ENV_IMPORTER_IMAGE, ENV_PULL_POLICY, ENV_UPLOADPROXY_SERVICE, ENV_UPLOADSERVER_IMAGE,
    READINESS_COMMAND, READINESS_INITIAL_DELAY_SECONDS, READINESS_PERIOD_SECONDS, ResourceNames,
};

/// Controller replica count
const CONTROLLER_REPLICAS: i32 = 1;

/// Generate the CDI controller Deployment.
///
/// Inputs are used verbatim: an empty image name or tag ends up as an empty
/// segment of the image reference.
pub fn generate_controller_deployment(
    config: &FactoryConfiguration,
    names: &ResourceNames,
) -> Deployment {
    let mut deployment = create_deployment(
        &names.controller_deployment,
        DEPLOYMENT_MATCH_KEY,
        DEPLOYMENT_MATCH_VALUE,
        &names.controller_service_account,
        CONTROLLER_REPLICAS,
    );

    let mut container = create_container(
        &names.controller_container,
        &config.image_repository,
        &config.controller_image_name,
        &config.image_tag,
        &config.log_verbosity,
        config.image_pull_policy,
    );
    container.env = Some(generate_env_vars(config, names));
    container.readiness_probe = Some(generate_readiness_probe());
    container.volume_mounts = Some(vec![VolumeMount {
        name: names.signing_key_secret.clone(),
        mount_path: names.signing_key_mount_path.clone(),
        ..Default::default()
    }]);

    if let Some(pod) = deployment
        .spec
        .as_mut()
        .and_then(|spec| spec.template.spec.as_mut())
    {
        pod.volumes = Some(vec![generate_signing_key_volume(names)]);
        pod.containers = vec![container];
    }

    deployment
}

/// Environment for the controller.
///
/// Order is fixed so rendered manifests diff cleanly.
fn generate_env_vars(config: &FactoryConfiguration, names: &ResourceNames) -> Vec<EnvVar> {
    let repo = &config.image_repository;
    let tag = &config.image_tag;

    vec![
        env_var(
            ENV_IMPORTER_IMAGE,
            image_reference(repo, &config.importer_image_name, tag),
        ),
        env_var(
            ENV_CLONER_IMAGE,
            image_reference(repo, &config.cloner_image_name, tag),
        ),
        env_var(
            ENV_UPLOADSERVER_IMAGE,
            image_reference(repo, &config.upload_server_image_name, tag),
        ),
        env_var(ENV_UPLOADPROXY_SERVICE, names.upload_proxy_service.clone()),
        env_var(ENV_PULL_POLICY, config.image_pull_policy.to_string()),
    ]
}

fn env_var(name: &str, value: String) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value),
        ..Default::default()
    }
}

/// Generate readiness probe.
///
/// The controller creates `/tmp/ready` once it has started its informers.
/// No liveness probe is set.
fn generate_readiness_probe() -> Probe {
    Probe {
        exec: Some(ExecAction {
            command: Some(READINESS_COMMAND.iter().map(|s| s.to_string()).collect()),
        }),
        initial_delay_seconds: Some(READINESS_INITIAL_DELAY_SECONDS),
        period_seconds: Some(READINESS_PERIOD_SECONDS),
        ..Default::default()
    }
}

/// Secret volume projecting only the public key file.
fn generate_signing_key_volume(names: &ResourceNames) -> Volume {
    Volume {
        name: names.signing_key_secret.clone(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(names.signing_key_secret.clone()),
            items: Some(vec![KeyToPath {
                key: API_SIGNING_KEY_FILE.to_string(),
                path: API_SIGNING_KEY_FILE.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
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
    use crate::config::PullPolicy;
    use k8s_openapi::api::core::v1::{Container, PodSpec};

    fn test_config() -> FactoryConfiguration {
        FactoryConfiguration {
            namespace: "cdi".to_string(),
            image_repository: "quay.io/org".to_string(),
            controller_image_name: "cdi-controller".to_string(),
            importer_image_name: "cdi-importer".to_string(),
            cloner_image_name: "cdi-cloner".to_string(),
            upload_server_image_name: "cdi-uploadserver".to_string(),
            image_tag: "v1.2.3".to_string(),
            log_verbosity: "2".to_string(),
            image_pull_policy: PullPolicy::Always,
        }
    }

    fn pod_spec(deployment: &Deployment) -> &PodSpec {
        deployment
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
    }

    fn container(deployment: &Deployment) -> &Container {
        pod_spec(deployment).containers.first().unwrap()
    }

    #[test]
    fn test_generate_controller_deployment() {
        let deployment = generate_controller_deployment(&test_config(), &ResourceNames::default());

        assert_eq!(deployment.metadata.name, Some("cdi-deployment".to_string()));
        let spec = deployment.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(1));
        assert_eq!(
            spec.selector.match_labels.as_ref().unwrap().get("app"),
            Some(&"containerized-data-importer".to_string())
        );

        let pod = pod_spec(&deployment);
        assert_eq!(pod.service_account_name, Some("cdi-sa".to_string()));
        assert_eq!(pod.containers.len(), 1);
        assert_eq!(pod.volumes.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_controller_container() {
        let deployment = generate_controller_deployment(&test_config(), &ResourceNames::default());
        let container = container(&deployment);

        assert_eq!(container.name, "cdi-controller");
        assert_eq!(
            container.image,
            Some("quay.io/org/cdi-controller:v1.2.3".to_string())
        );
        assert_eq!(container.image_pull_policy, Some("Always".to_string()));
        assert_eq!(container.args, Some(vec!["-v=2".to_string()]));
        assert!(container.liveness_probe.is_none());
    }

    #[test]
    fn test_env_var_order_and_values() {
        let deployment = generate_controller_deployment(&test_config(), &ResourceNames::default());
        let env = container(&deployment).env.clone().unwrap();

        let pairs: Vec<(String, String)> = env
            .into_iter()
            .map(|e| (e.name, e.value.unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (
                    "IMPORTER_IMAGE".to_string(),
                    "quay.io/org/cdi-importer:v1.2.3".to_string()
                ),
                (
                    "CLONER_IMAGE".to_string(),
                    "quay.io/org/cdi-cloner:v1.2.3".to_string()
                ),
                (
                    "UPLOADSERVER_IMAGE".to_string(),
                    "quay.io/org/cdi-uploadserver:v1.2.3".to_string()
                ),
                (
                    "UPLOADPROXY_SERVICE".to_string(),
                    "cdi-uploadproxy".to_string()
                ),
                ("PULL_POLICY".to_string(), "Always".to_string()),
            ]
        );
    }

    #[test]
    fn test_readiness_probe() {
        let probe = generate_readiness_probe();

        assert_eq!(
            probe.exec.unwrap().command,
            Some(vec!["cat".to_string(), "/tmp/ready".to_string()])
        );
        assert_eq!(probe.initial_delay_seconds, Some(2));
        assert_eq!(probe.period_seconds, Some(5));
    }

    #[test]
    fn test_signing_key_mount() {
        let deployment = generate_controller_deployment(&test_config(), &ResourceNames::default());

        let mounts = container(&deployment).volume_mounts.clone().unwrap();
        assert_eq!(mounts.len(), 1);
        let mount = mounts.first().unwrap();
        assert_eq!(mount.name, "cdi-api-signing-key");
        assert_eq!(mount.mount_path, "/var/run/cdi/apiserver/key");

        let volume = pod_spec(&deployment).volumes.as_ref().unwrap().first().unwrap();
        assert_eq!(volume.name, mount.name);
        let secret = volume.secret.as_ref().unwrap();
        assert_eq!(secret.secret_name, Some("cdi-api-signing-key".to_string()));
        let items = secret.items.as_ref().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().unwrap().key, "id_rsa.pub");
        assert_eq!(items.first().unwrap().path, "id_rsa.pub");
    }

    #[test]
    fn test_empty_image_names_are_not_rejected() {
        let config = FactoryConfiguration {
            image_repository: "quay.io/org".to_string(),
            controller_image_name: String::new(),
            importer_image_name: String::new(),
            image_tag: String::new(),
            ..test_config()
        };
        let deployment = generate_controller_deployment(&config, &ResourceNames::default());
        let container = container(&deployment);

        assert_eq!(container.image, Some("quay.io/org/:".to_string()));
        let importer = container.env.as_ref().unwrap().first().unwrap();
        assert_eq!(importer.value, Some("quay.io/org/:".to_string()));
    }
}
