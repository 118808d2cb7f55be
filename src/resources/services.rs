//! Service generation for CDI metrics.
//!
//! The metrics Service is shared with KubeVirt: any pod carrying the
//! Prometheus label is scraped through it.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::resources::names::{KUBEVIRT_LABEL, METRICS_PORT, METRICS_PORT_NAME, ResourceNames};

/// Generate the Prometheus metrics Service.
///
/// The Service labels itself with the same label it selects on.
pub fn generate_metrics_service(names: &ResourceNames) -> Service {
    let mut selector = BTreeMap::new();
    selector.insert(names.prometheus_label.clone(), String::new());

    let mut labels = selector.clone();
    labels.insert(KUBEVIRT_LABEL.to_string(), String::new());

    Service {
        metadata: ObjectMeta {
            name: Some(names.metrics_service.clone()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(selector),
            ports: Some(vec![ServicePort {
                port: METRICS_PORT,
                target_port: Some(IntOrString::String(METRICS_PORT_NAME.to_string())),
                name: Some(METRICS_PORT_NAME.to_string()),
                protocol: Some("TCP".to_string()),
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

    #[test]
    fn test_generate_metrics_service() {
        let svc = generate_metrics_service(&ResourceNames::default());

        assert_eq!(
            svc.metadata.name,
            Some("kubevirt-prometheus-metrics".to_string())
        );

        let spec = svc.spec.unwrap();
        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        let port = ports.first().unwrap();
        assert_eq!(port.name, Some("metrics".to_string()));
        assert_eq!(port.port, 443);
        assert_eq!(port.protocol, Some("TCP".to_string()));
        assert_eq!(
            port.target_port,
            Some(IntOrString::String("metrics".to_string()))
        );
    }

    #[test]
    fn test_metrics_service_selects_itself() {
        let svc = generate_metrics_service(&ResourceNames::default());

        let labels = svc.metadata.labels.unwrap();
        let selector = svc.spec.unwrap().selector.unwrap();
        assert_eq!(selector.len(), 1);
        assert_eq!(
            selector.get("kubevirt.io-prometheus-label"),
            Some(&String::new())
        );
        for (key, value) in &selector {
            assert_eq!(labels.get(key), Some(value));
        }
        assert_eq!(labels.get("kubevirt.io"), Some(&String::new()));
    }
}
