//! # kstrike-core
//!
//! Direct kubelet API auditing: pod enumeration over the node's
//! privileged HTTPS endpoint, SA token harvesting via the multiplexed
//! exec WebSocket, RBAC probing through SelfSubjectAccessReview, and
//! rule-driven risk classification.
//!
//! For authorized security assessments of clusters you are permitted to
//! test. The crate only observes what the upstream authorizer already
//! permits; the sole cluster mutation it can perform is an exec the
//! operator requests.

pub mod config;
pub mod error;
pub mod k8s;
pub mod kubelet;
pub mod pod;
pub mod rbac;
pub mod runtime;
pub mod scan;
pub mod session;
pub mod store;
pub mod token;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
