//! The provider configuration fields users may set, and validation of a
//! supplied configuration against them.

use std::collections::BTreeMap;

use serde::Serialize;
use stratus_resource::value::ScalarValue;

use super::validation::{
    validate_arn, validate_assume_role_duration, validate_external_id, validate_policy_json,
    validate_session_name, validate_web_identity_token, Diagnostic, Validator,
};
use crate::services::{find_service, service_list};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Integer,
    Float,
    Bool,
}

impl ScalarType {
    fn name(self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Integer => "integer",
            ScalarType::Float => "float",
            ScalarType::Bool => "bool",
        }
    }

    fn accepts(self, value: &ScalarValue) -> bool {
        matches!(
            (self, value),
            (ScalarType::String, ScalarValue::String(_))
                | (ScalarType::Integer, ScalarValue::Int(_))
                | (ScalarType::Float, ScalarValue::Float(_) | ScalarValue::Int(_))
                | (ScalarType::Bool, ScalarValue::Bool(_))
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFieldDefinition {
    #[serde(rename = "type")]
    pub scalar_type: ScalarType,
    pub label: String,
    pub description: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub secret: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ScalarValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<ScalarValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ScalarValue>,
    #[serde(skip)]
    pub validate: Option<Validator>,
}

impl ConfigFieldDefinition {
    pub fn new(scalar_type: ScalarType, label: &str, description: &str) -> Self {
        ConfigFieldDefinition {
            scalar_type,
            label: label.to_string(),
            description: description.to_string(),
            secret: false,
            default_value: None,
            allowed_values: vec![],
            examples: vec![],
            validate: None,
        }
    }

    pub fn string(label: &str, description: &str) -> Self {
        Self::new(ScalarType::String, label, description)
    }

    pub fn bool(label: &str, description: &str) -> Self {
        Self::new(ScalarType::Bool, label, description)
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<ScalarValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn allowed_values(mut self, values: &[&str]) -> Self {
        self.allowed_values = values.iter().map(|v| ScalarValue::from(*v)).collect();
        self
    }

    pub fn examples(mut self, values: &[&str]) -> Self {
        self.examples = values.iter().map(|v| ScalarValue::from(*v)).collect();
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validate = Some(validator);
        self
    }
}

/// Field definitions keyed by name. A name may end in a `<placeholder>`
/// segment, e.g. `endpoint.<serviceOrAlias>`, which matches any key with the
/// same prefix.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigDefinition {
    pub fields: BTreeMap<String, ConfigFieldDefinition>,
}

impl ConfigDefinition {
    /// The definition for `key`, and the placeholder value when `key` matched
    /// a templated name.
    pub fn lookup<'a>(
        &'a self,
        key: &'a str,
    ) -> Option<(&'a str, &'a ConfigFieldDefinition, Option<&'a str>)> {
        if let Some((name, field)) = self.fields.get_key_value(key) {
            return Some((name.as_str(), field, None));
        }
        self.fields.iter().find_map(|(name, field)| {
            template_match(name, key).map(|placeholder| (name.as_str(), field, Some(placeholder)))
        })
    }
}

fn template_match<'k>(template: &str, key: &'k str) -> Option<&'k str> {
    let (prefix, placeholder) = template.split_once('<')?;
    let rest = key.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }
    match placeholder {
        "index>" if !rest.chars().all(|c| c.is_ascii_digit()) => None,
        _ => Some(rest),
    }
}

const DURATION_DESCRIPTION: &str = "The duration between 15 minutes and 12 hours for which the \
    assumed role session will be valid. Valid units of time are ns, us (or µs), ms, s, m, h.";

pub fn provider_config_definition() -> ConfigDefinition {
    let fields = [
        (
            "accessKeyId",
            ConfigFieldDefinition::string(
                "Access Key ID",
                "The access key ID for API operations. This can be retrieved from the \
                 'Security & Credentials' section of the AWS console.",
            ),
        ),
        (
            "secretAccessKey",
            ConfigFieldDefinition::string(
                "Secret Access Key",
                "The secret access key for API operations. This can be retrieved from the \
                 'Security & Credentials' section of the AWS console.",
            )
            .secret(),
        ),
        (
            "sessionToken",
            ConfigFieldDefinition::string(
                "Session Token",
                "The session token. This is only required if you are using temporary \
                 security credentials.",
            )
            .secret(),
        ),
        (
            "customCABundle",
            ConfigFieldDefinition::string(
                "Custom CA Bundle",
                "The path to a custom CA bundle file to use for TLS connections to AWS \
                 services. This can also be configured using the `AWS_CA_BUNDLE` environment \
                 variable.",
            ),
        ),
        (
            "ec2MetadataServiceEndpoint",
            ConfigFieldDefinition::string(
                "EC2 Metadata Service Endpoint",
                "The address of the EC2 metadata service endpoint to use. This can also be \
                 configured using the `AWS_EC2_METADATA_SERVICE_ENDPOINT` environment variable.",
            ),
        ),
        (
            "ec2MetadataServiceEndpointMode",
            ConfigFieldDefinition::string(
                "EC2 Metadata Service Endpoint Mode",
                "The protocol to use for the EC2 metadata service endpoint. This can also be \
                 configured using the `AWS_EC2_METADATA_SERVICE_ENDPOINT_MODE` environment \
                 variable.",
            )
            .allowed_values(&["IPv4", "IPv6"]),
        ),
        (
            "endpoint.<serviceOrAlias>",
            ConfigFieldDefinition::string(
                "Custom Service Endpoints",
                &format!(
                    "The addresses to use to override the default service endpoint URL. \
                     <serviceOrAlias> must match a valid service string or an alias for a \
                     service. The following is a list of all the supported services and their \
                     aliases:\n{}",
                    service_list()
                ),
            ),
        ),
        (
            "httpProxy",
            ConfigFieldDefinition::string(
                "HTTP Proxy",
                "URL of a proxy to use for HTTP requests when accessing the AWS API. This can \
                 also be set using the `HTTP_PROXY` environment variable.",
            ),
        ),
        (
            "httpsProxy",
            ConfigFieldDefinition::string(
                "HTTPS Proxy",
                "URL of a proxy to use for HTTPS requests when accessing the AWS API. This can \
                 also be set using the `HTTPS_PROXY` environment variable.",
            ),
        ),
        (
            "insecure",
            ConfigFieldDefinition::bool(
                "Insecure",
                "If true, the provider will not verify the TLS certificate of the AWS API. If \
                 omitted, the default value is `false`.",
            ),
        ),
        (
            "maxRetries",
            ConfigFieldDefinition::new(
                ScalarType::Integer,
                "Max Retries",
                "The maximum number of retries to attempt when a request to an AWS API fails. \
                 If not set, the AWS SDK defaults will be used.",
            ),
        ),
        (
            "profile",
            ConfigFieldDefinition::string(
                "Profile",
                "The name of the AWS profile to use for API operations. If not set, the \
                 default profile created with `aws configure` will be used.",
            ),
        ),
        (
            "region",
            ConfigFieldDefinition::string(
                "Region",
                "The AWS region to use for API operations. If not set, the default region \
                 will be used based on the environment.",
            ),
        ),
        (
            "retryMode",
            ConfigFieldDefinition::string(
                "Retry Mode",
                "Determines how retries are attempted. Valid values are `standard` and \
                 `adaptive`. This can also be configured using the `AWS_RETRY_MODE` \
                 environment variable.",
            )
            .allowed_values(&["standard", "adaptive"]),
        ),
        (
            "s3UsePathStyle",
            ConfigFieldDefinition::bool(
                "S3 Use Path Style",
                "If true, the provider will use the path-style addressing for S3 URLs. If \
                 false, the virtual hosted-style addressing will be used.",
            ),
        ),
        (
            "sharedConfigFiles",
            ConfigFieldDefinition::string(
                "Shared Config Files",
                "A comma-separated list of paths to shared AWS config files to use for API \
                 operations.",
            )
            .default_value("~/.aws/config"),
        ),
        (
            "sharedCredentialsFiles",
            ConfigFieldDefinition::string(
                "Shared Credentials Files",
                "A comma-separated list of paths to shared AWS credentials files to use for \
                 API operations.",
            )
            .default_value("~/.aws/credentials"),
        ),
        (
            "useDualStackEndpoint",
            ConfigFieldDefinition::bool(
                "Use Dual Stack Endpoint",
                "If true, the provider will resolve an endpoint with DualStack capability.",
            ),
        ),
        (
            "useFIPSEndpoint",
            ConfigFieldDefinition::bool(
                "Use FIPS Endpoint",
                "If true, the provider will resolve an endpoint with FIPS capability.",
            ),
        ),
        (
            "assumeRole.duration",
            ConfigFieldDefinition::string("Assume Role Duration", DURATION_DESCRIPTION)
                .default_value("1h")
                .examples(&["15m", "1h", "12h"])
                .validate(validate_assume_role_duration),
        ),
        (
            "assumeRole.externalId",
            ConfigFieldDefinition::string(
                "Assume Role External ID",
                "An optional unique identifier that may be required when assuming a role in \
                 another account.",
            )
            .validate(validate_external_id),
        ),
        (
            "assumeRole.roleArn",
            ConfigFieldDefinition::string(
                "Assume Role ARN",
                "The ARN of the IAM role to assume for API operations.",
            )
            .validate(validate_arn),
        ),
        (
            "assumeRole.policy",
            ConfigFieldDefinition::string(
                "Assume Role Policy",
                "The IAM policy JSON document containing further restrictions for the IAM \
                 role being assumed.",
            )
            .validate(validate_policy_json),
        ),
        (
            "assumeRole.policyArns.<index>",
            ConfigFieldDefinition::string(
                "Assume Role Policy ARNs",
                "Amazon Resource Names (ARNs) of IAM Policies for further restricting \
                 permissions for the IAM Role being assumed.",
            )
            .validate(validate_arn),
        ),
        (
            "assumeRole.sessionName",
            ConfigFieldDefinition::string(
                "Assume Role Session Name",
                "A unique identifier for the assumed role session.",
            )
            .validate(validate_session_name),
        ),
        (
            "assumeRole.sourceIdentity",
            ConfigFieldDefinition::string(
                "Assume Role Source Identity",
                "Source identity defined by the principal that is assuming the role.",
            )
            .validate(validate_session_name),
        ),
        (
            "assumeRole.tags.<tagName>",
            ConfigFieldDefinition::string(
                "Assume Role Tags",
                "Tags to apply to the assumed role session.",
            ),
        ),
        (
            "assumeRole.transitiveTagKeys",
            ConfigFieldDefinition::string(
                "Assume Role Transitive Tag Keys",
                "A comma-separated list of tag keys to pass to any subsequent sessions.",
            ),
        ),
        (
            "assumeRoleWithWebIdentity.duration",
            ConfigFieldDefinition::string(
                "Assume Role With Web Identity Duration",
                DURATION_DESCRIPTION,
            )
            .default_value("1h")
            .examples(&["15m", "1h", "12h"])
            .validate(validate_assume_role_duration),
        ),
        (
            "assumeRoleWithWebIdentity.policy",
            ConfigFieldDefinition::string(
                "Assume Role With Web Identity Policy",
                "The IAM policy JSON document containing further restrictions for the IAM \
                 role being assumed with web identity.",
            )
            .validate(validate_policy_json),
        ),
        (
            "assumeRoleWithWebIdentity.policyArns.<index>",
            ConfigFieldDefinition::string(
                "Assume Role With Web Identity Policy ARNs",
                "Amazon Resource Names (ARNs) of IAM Policies for further restricting \
                 permissions for the IAM Role being assumed with web identity.",
            )
            .validate(validate_arn),
        ),
        (
            "assumeRoleWithWebIdentity.roleArn",
            ConfigFieldDefinition::string(
                "Assume Role With Web Identity ARN",
                "The ARN of the IAM role to assume for API operations when using web \
                 identity.",
            )
            .validate(validate_arn),
        ),
        (
            "assumeRoleWithWebIdentity.sessionName",
            ConfigFieldDefinition::string(
                "Assume Role With Web Identity Session Name",
                "A unique identifier for the assumed role session when using web identity.",
            )
            .validate(validate_session_name),
        ),
        (
            "assumeRoleWithWebIdentity.webIdentityToken",
            ConfigFieldDefinition::string(
                "Assume Role With Web Identity Web Identity Token",
                "The web identity token to use when assuming the role when using web identity.",
            )
            .secret()
            .validate(validate_web_identity_token),
        ),
        (
            "assumeRoleWithWebIdentity.webIdentityTokenFile",
            ConfigFieldDefinition::string(
                "Assume Role With Web Identity Web Identity Token File",
                "The path to the file containing the web identity token to use when assuming \
                 the role when using web identity.",
            ),
        ),
    ];

    ConfigDefinition {
        fields: fields
            .into_iter()
            .map(|(name, field)| (name.to_string(), field))
            .collect(),
    }
}

/// Checks every supplied value against its definition. Null values are
/// treated as unset and not checked.
pub fn validate_provider_config(
    definition: &ConfigDefinition,
    config: &BTreeMap<String, ScalarValue>,
) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];

    for (key, value) in config.iter().filter(|(_, v)| !v.is_null()) {
        let Some((name, field, placeholder)) = definition.lookup(key) else {
            diagnostics.push(Diagnostic::warning(format!(
                "{:?} is not a known provider configuration field",
                key
            )));
            continue;
        };

        if !field.scalar_type.accepts(value) {
            diagnostics.push(Diagnostic::error(format!(
                "The value of field {:?} must be of type {}",
                key,
                field.scalar_type.name()
            )));
            continue;
        }

        if !field.allowed_values.is_empty() && !field.allowed_values.contains(value) {
            let allowed: Vec<String> = field
                .allowed_values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            diagnostics.push(Diagnostic::error(format!(
                "The value of field {:?} must be one of: {}",
                key,
                allowed.join(", ")
            )));
        }

        if name == "endpoint.<serviceOrAlias>" {
            if let Some(service) = placeholder.filter(|s| find_service(s).is_none()) {
                diagnostics.push(Diagnostic::error(format!(
                    "{:?} in field {:?} is not a supported service or alias",
                    service, key
                )));
            }
        }

        if let Some(validate) = field.validate {
            diagnostics.extend(validate(key, value));
        }
    }

    diagnostics
}
