//! cdi-manifests library crate
//!
//! Generates the Kubernetes resources that stand up the CDI controller:
//! a ServiceAccount, the controller Deployment, the insecure registry
//! ConfigMap and, separately, the Prometheus metrics Service.
//!
//! Generation is pure. Nothing here talks to a cluster; the caller decides
//! whether to create, update or discard what comes back.
//!
//! ```
//! use cdi_manifests::{FactoryConfiguration, ResourceFactory};
//!
//! let factory = ResourceFactory::default();
//! let resources = factory.build_namespaced_resources(&FactoryConfiguration::default());
//! assert_eq!(resources.len(), 3);
//! ```

pub mod config;
pub mod error;
pub mod render;
pub mod resources;

pub use config::{ConfigOverrides, FactoryConfiguration, PullPolicy, load_config};
pub use error::{Error, Result};
pub use render::OutputFormat;
pub use resources::{ResourceDescription, ResourceFactory, ResourceNames};
