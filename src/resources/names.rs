//! Well-known names shared by the CDI controller resources.
//!
//! Every literal that downstream consumers match byte-for-byte lives here as a
//! named constant. [`ResourceNames`] collects the ones a caller may want to
//! override into a read-only table that is handed to the generators.

/// Service account the controller pod runs as.
pub const CONTROLLER_SERVICE_ACCOUNT: &str = "cdi-sa";
/// Name of the controller Deployment.
pub const CONTROLLER_DEPLOYMENT: &str = "cdi-deployment";
/// Name of the controller container inside the Deployment.
pub const CONTROLLER_CONTAINER: &str = "cdi-controller";
/// Service the controller hands to upload pods.
pub const UPLOAD_PROXY_SERVICE: &str = "cdi-uploadproxy";
/// Marker ConfigMap listing registries that may be reached without TLS.
pub const INSECURE_REGISTRY_CONFIG_MAP: &str = "cdi-insecure-registries";
/// Metrics Service scraped by Prometheus.
pub const METRICS_SERVICE: &str = "kubevirt-prometheus-metrics";

/// Selector key/value of the controller Deployment.
pub const DEPLOYMENT_MATCH_KEY: &str = "app";
pub const DEPLOYMENT_MATCH_VALUE: &str = "containerized-data-importer";

/// Label carried by every CDI resource.
pub const CDI_LABEL: &str = "cdi.kubevirt.io";
/// Label selecting pods that expose Prometheus metrics.
pub const PROMETHEUS_LABEL: &str = "kubevirt.io-prometheus-label";
pub const KUBEVIRT_LABEL: &str = "kubevirt.io";

/// Secret holding the API server's public signing key.
pub const API_SIGNING_KEY_SECRET: &str = "cdi-api-signing-key";
pub const API_SIGNING_KEY_FILE: &str = "id_rsa.pub";
/// Directory the signing key is mounted into.
pub const API_SIGNING_KEY_MOUNT_PATH: &str = "/var/run/cdi/apiserver/key";

/// Readiness check: the controller touches this file once it is serving.
pub const READINESS_COMMAND: [&str; 2] = ["cat", "/tmp/ready"];
pub const READINESS_INITIAL_DELAY_SECONDS: i32 = 2;
pub const READINESS_PERIOD_SECONDS: i32 = 5;

pub const METRICS_PORT_NAME: &str = "metrics";
pub const METRICS_PORT: i32 = 443;

/// Prefix of Kubernetes service account user names.
pub const PRIVILEGED_ACCOUNT_PREFIX: &str = "system:serviceaccount";

/// Environment variables handed to the controller container.
pub const ENV_IMPORTER_IMAGE: &str = "IMPORTER_IMAGE";
pub const ENV_CLONER_IMAGE: &str = "CLONER_IMAGE";
pub const ENV_UPLOADSERVER_IMAGE: &str = "UPLOADSERVER_IMAGE";
pub const ENV_UPLOADPROXY_SERVICE: &str = "UPLOADPROXY_SERVICE";
pub const ENV_PULL_POLICY: &str = "PULL_POLICY";

/// Read-only table of the names the generators stamp onto resources.
///
/// Built once (usually via [`Default`]) and injected into
/// [`ResourceFactory`](crate::resources::ResourceFactory).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceNames {
    pub controller_service_account: String,
    pub controller_deployment: String,
    pub controller_container: String,
    pub upload_proxy_service: String,
    pub insecure_registry_config_map: String,
    pub metrics_service: String,
    pub prometheus_label: String,
    pub signing_key_secret: String,
    pub signing_key_mount_path: String,
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self {
            controller_service_account: CONTROLLER_SERVICE_ACCOUNT.to_string(),
            controller_deployment: CONTROLLER_DEPLOYMENT.to_string(),
            controller_container: CONTROLLER_CONTAINER.to_string(),
            upload_proxy_service: UPLOAD_PROXY_SERVICE.to_string(),
            insecure_registry_config_map: INSECURE_REGISTRY_CONFIG_MAP.to_string(),
            metrics_service: METRICS_SERVICE.to_string(),
            prometheus_label: PROMETHEUS_LABEL.to_string(),
            signing_key_secret: API_SIGNING_KEY_SECRET.to_string(),
            signing_key_mount_path: API_SIGNING_KEY_MOUNT_PATH.to_string(),
        }
    }
}
