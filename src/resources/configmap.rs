//! Insecure registry ConfigMap.
//!
//! Created empty; administrators add the registries that may be reached
//! without TLS.

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::resources::common::with_common_labels;
use crate::resources::names::ResourceNames;

/// Generate the insecure registry ConfigMap (labels only, no data)
pub fn generate_insecure_registry_config_map(names: &ResourceNames) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(names.insecure_registry_config_map.clone()),
            labels: Some(with_common_labels(None)),
            ..Default::default()
        },
        ..Default::default()
    }
}
