use std::collections::BTreeMap;

use stratus_resource::context::ProviderContext;

/// An AWS service whose endpoint can be overridden with
/// `endpoint.<serviceOrAlias>` in the provider configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwsService {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

/// Supported services, sorted by name.
pub const SERVICES: &[AwsService] = &[
    AwsService {
        name: "account",
        aliases: &[],
    },
    AwsService {
        name: "dynamodb",
        aliases: &[],
    },
    AwsService {
        name: "lambda",
        aliases: &[],
    },
    AwsService {
        name: "sqs",
        aliases: &[],
    },
];

pub fn find_service(name_or_alias: &str) -> Option<&'static AwsService> {
    SERVICES
        .iter()
        .find(|s| s.name == name_or_alias || s.aliases.iter().any(|a| *a == name_or_alias))
}

/// A markdown list of the services and their aliases.
pub fn service_list() -> String {
    SERVICES
        .iter()
        .map(|service| {
            if service.aliases.is_empty() {
                format!("- {}\n", service.name)
            } else {
                format!("- {} ({})\n", service.name, service.aliases.join(", "))
            }
        })
        .collect()
}

/// The endpoint override for `service`. The service name takes precedence
/// over its aliases, which are tried in order.
pub fn endpoint_from_provider_config<'a>(
    provider: &'a ProviderContext,
    service: &AwsService,
) -> Option<&'a str> {
    std::iter::once(service.name)
        .chain(service.aliases.iter().copied())
        .find_map(|key| {
            provider
                .provider_config_variable(&format!("endpoint.{}", key))
                .and_then(|v| v.as_str())
        })
}

/// All endpoint overrides present in the provider configuration, keyed by
/// service name.
pub fn resolve_endpoints(provider: &ProviderContext) -> BTreeMap<String, String> {
    SERVICES
        .iter()
        .filter_map(|service| {
            endpoint_from_provider_config(provider, service)
                .map(|endpoint| (service.name.to_string(), endpoint.to_string()))
        })
        .collect()
}
