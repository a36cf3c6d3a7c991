//! Integration tests
//!
//! These tests require a real Kubernetes cluster and are marked with
//! #[ignore]. Run them with: cargo test -- --ignored

mod config_channel_test;
mod deploy_test;
