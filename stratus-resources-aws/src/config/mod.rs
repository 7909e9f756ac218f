//! Derivation of AWS client configuration from provider config values and the
//! process environment.

pub mod definition;
pub mod validation;

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use stratus_resource::{
    config_store::{ConfigLoader, SessionConfigStore},
    context::ProviderContext,
    error::ProviderError,
    value::ScalarValue,
};
use tracing::debug;

use crate::services::resolve_endpoints;
use validation::parse_duration;

pub type AwsConfigStore = SessionConfigStore<AwsConfig, AwsConfigLoader>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    Standard,
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Ec2MetadataEndpointMode {
    #[default]
    Unset,
    IPv4,
    IPv6,
}

impl Ec2MetadataEndpointMode {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ipv4" => Ec2MetadataEndpointMode::IPv4,
            "ipv6" => Ec2MetadataEndpointMode::IPv6,
            _ => Ec2MetadataEndpointMode::Unset,
        }
    }
}

/// A value that must not end up in logs or command output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCredentials {
    pub access_key_id: String,
    #[serde(skip)]
    pub secret_access_key: Secret,
    #[serde(skip)]
    pub session_token: Option<Secret>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssumeRoleOptions {
    pub role_arn: String,
    pub external_id: Option<String>,
    pub duration: Option<Duration>,
    pub policy: Option<String>,
    pub policy_arns: Vec<String>,
    pub session_name: Option<String>,
    pub source_identity: Option<String>,
    pub tags: Vec<(String, String)>,
    pub transitive_tag_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebIdentityOptions {
    pub role_arn: String,
    #[serde(skip)]
    pub token: Option<Secret>,
    /// Takes precedence over `token` when both are set.
    pub token_file: Option<String>,
    pub duration: Option<Duration>,
    pub policy: Option<String>,
    pub policy_arns: Vec<String>,
    pub session_name: Option<String>,
}

/// Everything needed to build AWS service clients for one session.
///
/// Secrets are never serialised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsConfig {
    pub region: Option<String>,
    pub retry_mode: Option<RetryMode>,
    pub max_retries: Option<i64>,
    pub credentials: Option<StaticCredentials>,
    pub shared_config_files: Vec<String>,
    pub shared_credentials_files: Vec<String>,
    pub profile: Option<String>,
    pub use_fips_endpoint: Option<bool>,
    pub use_dual_stack_endpoint: Option<bool>,
    pub s3_use_path_style: Option<bool>,
    #[serde(skip)]
    pub custom_ca_bundle: Option<Vec<u8>>,
    pub insecure: bool,
    pub proxy: Option<String>,
    pub ec2_metadata_endpoint: Option<String>,
    pub ec2_metadata_endpoint_mode: Ec2MetadataEndpointMode,
    pub endpoints: std::collections::BTreeMap<String, String>,
    pub assume_role: Option<AssumeRoleOptions>,
    pub web_identity: Option<WebIdentityOptions>,
}

/// Reads settings from provider config, falling back to the captured
/// environment where a variable exists for the setting.
struct Settings<'a> {
    provider: &'a ProviderContext,
    env: &'a HashMap<String, String>,
}

impl<'a> Settings<'a> {
    fn string(&self, key: &str) -> Option<String> {
        self.provider
            .provider_config_variable(key)
            .map(ScalarValue::stringify)
    }

    fn string_or_env(&self, key: &str, env_key: &str) -> Option<String> {
        self.string(key).or_else(|| self.env.get(env_key).cloned())
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.provider
            .provider_config_variable(key)
            .and_then(|v| match v {
                ScalarValue::Bool(b) => Some(*b),
                ScalarValue::String(s) => s.parse().ok(),
                _ => None,
            })
    }

    fn int(&self, key: &str) -> Option<i64> {
        self.provider
            .provider_config_variable(key)
            .and_then(|v| match v {
                ScalarValue::Int(i) => Some(*i),
                ScalarValue::String(s) => s.parse().ok(),
                _ => None,
            })
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.string(key).map(|s| split_list(&s)).unwrap_or_default()
    }

    fn duration(&self, key: &str) -> Result<Option<Duration>, ProviderError> {
        self.string(key)
            .map(|s| {
                parse_duration(&s).map_err(|e| {
                    ProviderError::Configuration(format!("invalid value for {}: {}", key, e))
                })
            })
            .transpose()
    }

    /// Values of `<prefix>.<index>` keys in index order.
    fn indexed(&self, prefix: &str) -> Vec<String> {
        let prefix = format!("{}.", prefix);
        let mut values: Vec<(u64, String)> = self
            .provider
            .provider_config_with_prefix(&prefix)
            .filter_map(|(index, value)| Some((index.parse().ok()?, value.stringify())))
            .collect();
        values.sort_by_key(|(index, _)| *index);
        values.into_iter().map(|(_, v)| v).collect()
    }

    fn keyed(&self, prefix: &str) -> Vec<(String, String)> {
        let prefix = format!("{}.", prefix);
        self.provider
            .provider_config_with_prefix(&prefix)
            .map(|(key, value)| (key.to_string(), value.stringify()))
            .collect()
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Derives an [`AwsConfig`]. Fails when a referenced file cannot be read or
/// a value cannot be interpreted.
pub async fn aws_config_from_provider_context(
    provider: &ProviderContext,
    env: &HashMap<String, String>,
) -> Result<AwsConfig, ProviderError> {
    let settings = Settings { provider, env };

    let retry_mode = match settings.string_or_env("retryMode", "AWS_RETRY_MODE") {
        None => None,
        Some(mode) => Some(match mode.as_str() {
            "standard" => RetryMode::Standard,
            "adaptive" => RetryMode::Adaptive,
            other => {
                return Err(ProviderError::Configuration(format!(
                    "unsupported retry mode {:?}",
                    other
                )))
            }
        }),
    };

    let credentials = match (
        settings.string("accessKeyId"),
        settings.string("secretAccessKey"),
    ) {
        (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
            access_key_id,
            secret_access_key: Secret(secret_access_key),
            session_token: settings.string("sessionToken").map(Secret),
        }),
        _ => None,
    };

    let custom_ca_bundle = match settings.string_or_env("customCABundle", "AWS_CA_BUNDLE") {
        None => None,
        Some(path) => Some(tokio::fs::read(&path).await.map_err(|e| {
            ProviderError::Configuration(format!("failed to read CA bundle {}: {}", path, e))
        })?),
    };

    let proxy = settings
        .string("httpProxy")
        .or_else(|| settings.string("httpsProxy"))
        .or_else(|| env.get("HTTP_PROXY").cloned())
        .or_else(|| env.get("HTTPS_PROXY").cloned())
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    let assume_role = match settings.string("assumeRole.roleArn") {
        None => None,
        Some(role_arn) => Some(AssumeRoleOptions {
            role_arn,
            external_id: settings.string("assumeRole.externalId"),
            duration: settings.duration("assumeRole.duration")?,
            policy: settings.string("assumeRole.policy"),
            policy_arns: settings.indexed("assumeRole.policyArns"),
            session_name: settings.string("assumeRole.sessionName"),
            source_identity: settings.string("assumeRole.sourceIdentity"),
            tags: settings.keyed("assumeRole.tags"),
            transitive_tag_keys: settings.list("assumeRole.transitiveTagKeys"),
        }),
    };

    let web_identity = match settings.string("assumeRoleWithWebIdentity.roleArn") {
        None => None,
        Some(role_arn) => Some(WebIdentityOptions {
            role_arn,
            token: settings
                .string("assumeRoleWithWebIdentity.webIdentityToken")
                .map(Secret),
            token_file: settings.string("assumeRoleWithWebIdentity.webIdentityTokenFile"),
            duration: settings.duration("assumeRoleWithWebIdentity.duration")?,
            policy: settings.string("assumeRoleWithWebIdentity.policy"),
            policy_arns: settings.indexed("assumeRoleWithWebIdentity.policyArns"),
            session_name: settings.string("assumeRoleWithWebIdentity.sessionName"),
        }),
    };

    Ok(AwsConfig {
        region: settings.string("region"),
        retry_mode,
        max_retries: settings.int("maxRetries"),
        credentials,
        shared_config_files: settings.list("sharedConfigFiles"),
        shared_credentials_files: settings.list("sharedCredentialsFiles"),
        profile: settings.string("profile"),
        use_fips_endpoint: settings.bool("useFIPSEndpoint"),
        use_dual_stack_endpoint: settings.bool("useDualStackEndpoint"),
        s3_use_path_style: settings.bool("s3UsePathStyle"),
        custom_ca_bundle,
        insecure: settings.bool("insecure").unwrap_or(false),
        proxy,
        ec2_metadata_endpoint: settings
            .string_or_env("ec2MetadataServiceEndpoint", "AWS_EC2_METADATA_SERVICE_ENDPOINT"),
        ec2_metadata_endpoint_mode: settings
            .string_or_env(
                "ec2MetadataServiceEndpointMode",
                "AWS_EC2_METADATA_SERVICE_ENDPOINT_MODE",
            )
            .map(|mode| Ec2MetadataEndpointMode::parse(&mode))
            .unwrap_or_default(),
        endpoints: resolve_endpoints(provider),
        assume_role,
        web_identity,
    })
}

/// The [`ConfigLoader`] used by the config store.
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsConfigLoader;

#[async_trait]
impl ConfigLoader<AwsConfig> for AwsConfigLoader {
    async fn load(
        &self,
        provider: &ProviderContext,
        env: &HashMap<String, String>,
    ) -> Result<AwsConfig, ProviderError> {
        let config = aws_config_from_provider_context(provider, env).await?;
        debug!(region = ?config.region, "derived AWS config");
        Ok(config)
    }
}
