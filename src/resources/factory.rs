//! Resource factory for the CDI controller.
//!
//! [`ResourceFactory`] turns a [`FactoryConfiguration`] into the objects the
//! installer applies. Each call allocates fresh objects; nothing is cached and
//! nothing is validated.

use k8s_openapi::Resource as _;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use serde::Serialize;
use tracing::debug;

use crate::config::FactoryConfiguration;
use crate::resources::common::create_service_account;
use crate::resources::configmap::generate_insecure_registry_config_map;
use crate::resources::deployment::generate_controller_deployment;
use crate::resources::names::{PRIVILEGED_ACCOUNT_PREFIX, ResourceNames};
use crate::resources::services::generate_metrics_service;

/// One generated cluster object.
///
/// Serializes as the wrapped object, so `apiVersion` and `kind` come from the
/// object itself. The Deployment is boxed to keep the variants close in size.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceDescription {
    ServiceAccount(ServiceAccount),
    Deployment(Box<Deployment>),
    ConfigMap(ConfigMap),
    Service(Service),
}

impl ResourceDescription {
    /// Kubernetes kind of the wrapped object
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceDescription::ServiceAccount(_) => ServiceAccount::KIND,
            ResourceDescription::Deployment(_) => Deployment::KIND,
            ResourceDescription::ConfigMap(_) => ConfigMap::KIND,
            ResourceDescription::Service(_) => Service::KIND,
        }
    }

    /// Kubernetes apiVersion of the wrapped object
    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceDescription::ServiceAccount(_) => ServiceAccount::API_VERSION,
            ResourceDescription::Deployment(_) => Deployment::API_VERSION,
            ResourceDescription::ConfigMap(_) => ConfigMap::API_VERSION,
            ResourceDescription::Service(_) => Service::API_VERSION,
        }
    }

    /// Metadata of the wrapped object
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            ResourceDescription::ServiceAccount(sa) => &sa.metadata,
            ResourceDescription::Deployment(deployment) => &deployment.metadata,
            ResourceDescription::ConfigMap(cm) => &cm.metadata,
            ResourceDescription::Service(svc) => &svc.metadata,
        }
    }

    /// Object name, empty if unset
    pub fn name(&self) -> String {
        match self {
            ResourceDescription::ServiceAccount(sa) => sa.name_any(),
            ResourceDescription::Deployment(deployment) => deployment.name_any(),
            ResourceDescription::ConfigMap(cm) => cm.name_any(),
            ResourceDescription::Service(svc) => svc.name_any(),
        }
    }
}

impl From<ServiceAccount> for ResourceDescription {
    fn from(sa: ServiceAccount) -> Self {
        ResourceDescription::ServiceAccount(sa)
    }
}

impl From<Deployment> for ResourceDescription {
    fn from(deployment: Deployment) -> Self {
        ResourceDescription::Deployment(Box::new(deployment))
    }
}

impl From<ConfigMap> for ResourceDescription {
    fn from(cm: ConfigMap) -> Self {
        ResourceDescription::ConfigMap(cm)
    }
}

impl From<Service> for ResourceDescription {
    fn from(svc: Service) -> Self {
        ResourceDescription::Service(svc)
    }
}

/// Builds the CDI controller resources from a configuration.
///
/// Holds only the read-only [`ResourceNames`] table and can be shared freely
/// between threads.
#[derive(Clone, Debug, Default)]
pub struct ResourceFactory {
    names: ResourceNames,
}

impl ResourceFactory {
    /// Create a factory stamping the given names onto its resources
    pub fn new(names: ResourceNames) -> Self {
        Self { names }
    }

    /// Names stamped onto generated resources
    pub fn names(&self) -> &ResourceNames {
        &self.names
    }

    /// Generate the namespaced controller resources.
    ///
    /// Always returns the ServiceAccount, the Deployment and the ConfigMap, in
    /// that order. The metrics Service is not included; see
    /// [`ResourceFactory::metrics_service`].
    pub fn build_namespaced_resources(
        &self,
        config: &FactoryConfiguration,
    ) -> Vec<ResourceDescription> {
        debug!(
            namespace = %config.namespace,
            repository = %config.image_repository,
            tag = %config.image_tag,
            "Generating CDI controller resources"
        );

        vec![
            self.service_account().into(),
            self.deployment(config).into(),
            self.config_map().into(),
        ]
    }

    /// User names that must be granted elevated permissions.
    ///
    /// One entry: `system:serviceaccount:<namespace>:<controller account>`.
    pub fn privileged_service_account_names(&self, config: &FactoryConfiguration) -> Vec<String> {
        vec![format!(
            "{}:{}:{}",
            PRIVILEGED_ACCOUNT_PREFIX, config.namespace, self.names.controller_service_account
        )]
    }

    pub fn service_account(&self) -> ServiceAccount {
        create_service_account(&self.names.controller_service_account)
    }

    pub fn deployment(&self, config: &FactoryConfiguration) -> Deployment {
        generate_controller_deployment(config, &self.names)
    }

    pub fn config_map(&self) -> ConfigMap {
        generate_insecure_registry_config_map(&self.names)
    }

    /// Generate the Prometheus metrics Service
    pub fn metrics_service(&self) -> Service {
        generate_metrics_service(&self.names)
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
    fn test_build_order() {
        let factory = ResourceFactory::default();
        let resources = factory.build_namespaced_resources(&FactoryConfiguration::default());

        let kinds: Vec<&str> = resources.iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, vec!["ServiceAccount", "Deployment", "ConfigMap"]);

        let names: Vec<String> = resources.iter().map(|r| r.name()).collect();
        assert_eq!(
            names,
            vec!["cdi-sa", "cdi-deployment", "cdi-insecure-registries"]
        );
    }

    #[test]
    fn test_api_versions() {
        let factory = ResourceFactory::default();
        let resources = factory.build_namespaced_resources(&FactoryConfiguration::default());

        let versions: Vec<&str> = resources.iter().map(|r| r.api_version()).collect();
        assert_eq!(versions, vec!["v1", "apps/v1", "v1"]);
    }

    #[test]
    fn test_privileged_service_account_names() {
        let factory = ResourceFactory::default();
        let config = FactoryConfiguration {
            namespace: "cdi".to_string(),
            ..Default::default()
        };

        assert_eq!(
            factory.privileged_service_account_names(&config),
            vec!["system:serviceaccount:cdi:cdi-sa".to_string()]
        );
    }

    #[test]
    fn test_custom_names_flow_through() {
        let names = ResourceNames {
            controller_service_account: "other-sa".to_string(),
            ..Default::default()
        };
        let factory = ResourceFactory::new(names);
        let config = FactoryConfiguration::default();

        assert_eq!(factory.service_account().name_any(), "other-sa");
        let deployment = factory.deployment(&config);
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.service_account_name, Some("other-sa".to_string()));
        assert_eq!(
            factory.privileged_service_account_names(&config),
            vec!["system:serviceaccount:cdi:other-sa".to_string()]
        );
    }

    #[test]
    fn test_metrics_service_not_in_aggregate() {
        let factory = ResourceFactory::default();
        let resources = factory.build_namespaced_resources(&FactoryConfiguration::default());
        assert!(
            !resources
                .iter()
                .any(|r| matches!(r, ResourceDescription::Service(_)))
        );
        assert_eq!(
            ResourceDescription::from(factory.metrics_service()).kind(),
            "Service"
        );
    }

    #[test]
    fn test_metadata_carries_common_labels() {
        let factory = ResourceFactory::default();
        let mut resources = factory.build_namespaced_resources(&FactoryConfiguration::default());
        resources.push(factory.metrics_service().into());

        for resource in &resources {
            let labels = resource.metadata().labels.as_ref().unwrap();
            assert_eq!(
                labels.get("cdi.kubevirt.io").map(String::as_str),
                Some(""),
                "{} is missing the common label",
                resource.kind()
            );
            assert_eq!(resource.metadata().name, Some(resource.name()));
        }
    }

    #[test]
    fn test_names_accessor() {
        let names = ResourceNames {
            controller_deployment: "other-deployment".to_string(),
            ..Default::default()
        };
        let factory = ResourceFactory::new(names.clone());

        assert_eq!(factory.names(), &names);
        assert_eq!(
            factory.deployment(&FactoryConfiguration::default()).name_any(),
            factory.names().controller_deployment
        );
    }
}
