//! Resource generation module.
//!
//! Contains the generators for the Kubernetes resources of the CDI controller.
//!
//! ## Resources Generated
//!
//! | Resource | Purpose |
//! |----------|---------|
//! | ServiceAccount | Identity the controller pod runs as |
//! | Deployment | The controller itself |
//! | ConfigMap | Insecure registry list, created empty |
//! | Service | Prometheus metrics endpoint (generated separately) |

pub mod common;
pub mod configmap;
pub mod deployment;
pub mod factory;
pub mod names;
pub mod services;

pub use common::{image_reference, with_common_labels};
pub use factory::{ResourceDescription, ResourceFactory};
pub use names::ResourceNames;
