//! AWS resource provider: the `aws/lambda/function` resource and the
//! derivation of client settings from provider configuration.

pub mod archive;
pub mod config;
pub mod lambda;
pub mod provider;
pub mod services;
