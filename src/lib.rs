//! holmes-playbooks - Kubernetes diagnostic playbooks backed by HolmesGPT

pub mod api;
pub mod config;
pub mod domain;
pub mod integrations;
pub mod pipeline;
pub mod playbooks;
