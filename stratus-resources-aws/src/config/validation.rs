//! Validators for individual provider configuration values.
//!
//! Validators never fail fast; each returns every problem it finds as a
//! [`Diagnostic`].

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use stratus_resource::value::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            level: DiagnosticLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            level: DiagnosticLevel::Warning,
            message: message.into(),
        }
    }
}

/// Checks one provider config value. `key` is the full config key the value
/// was supplied under.
pub type Validator = fn(key: &str, value: &ScalarValue) -> Vec<Diagnostic>;

lazy_static! {
    static ref PARTITION: Regex = Regex::new(r"^aws(-[a-z]+)*$").unwrap();
    static ref REGION: Regex = Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d{1,2}$").unwrap();
    static ref ACCOUNT_ID: Regex =
        Regex::new(r"^(aws|aws-managed|third-party|aws-marketplace|\d{12}|cw.{10})$").unwrap();
    static ref SESSION_NAME: Regex = Regex::new(r"^[\w+=,.@-]*$").unwrap();
    static ref EXTERNAL_ID: Regex = Regex::new(r"^[\w+=,.@:/-]*$").unwrap();
}

const MIN_ASSUME_ROLE_DURATION: Duration = Duration::from_secs(15 * 60);
const MAX_ASSUME_ROLE_DURATION: Duration = Duration::from_secs(12 * 60 * 60);

/// Parses a duration such as `1h`, `15m`, `1h30m` or `2.5s`.
///
/// Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`; a bare `0`
/// is also accepted. Negative durations are rejected.
///
/// Follows Go's `time.ParseDuration`, which accepts fractional values and
/// unit sequences that `humantime` does not.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.strip_prefix('+').unwrap_or(input);
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        return Err(format!("negative duration {:?}", input));
    }
    if s.is_empty() {
        return Err(format!("invalid duration {:?}", input));
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut rest = s;
    let mut nanos = 0f64;
    while !rest.is_empty() {
        let number_len = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid duration {:?}", input))?;
        rest = &rest[number_len..];

        let unit_len = rest.find(is_number).unwrap_or(rest.len());
        let unit_nanos = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration {:?}", input)),
            unit => return Err(format!("unknown unit {:?} in duration {:?}", unit, input)),
        };
        rest = &rest[unit_len..];
        nanos += value * unit_nanos;
    }

    if nanos > u64::MAX as f64 {
        return Err(format!("duration {:?} is too large", input));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

pub fn validate_assume_role_duration(key: &str, value: &ScalarValue) -> Vec<Diagnostic> {
    let s = value.stringify();
    match parse_duration(&s) {
        Err(e) => vec![Diagnostic::error(format!(
            "Invalid duration {:?} for field {:?}: {}",
            s, key, e
        ))],
        Ok(d) if !(MIN_ASSUME_ROLE_DURATION..=MAX_ASSUME_ROLE_DURATION).contains(&d) => {
            vec![Diagnostic::error(format!(
                "Duration {:?} for field {:?} must be between 15 minutes and 12 hours",
                s, key
            ))]
        }
        Ok(_) => vec![],
    }
}

/// The sections of an ARN, `arn:partition:service:region:account-id:resource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn<'a> {
    pub partition: &'a str,
    pub service: &'a str,
    pub region: &'a str,
    pub account_id: &'a str,
    pub resource: &'a str,
}

impl<'a> Arn<'a> {
    pub fn parse(s: &'a str) -> Result<Arn<'a>, String> {
        let rest = s
            .strip_prefix("arn:")
            .ok_or_else(|| "arn: invalid prefix".to_string())?;
        let sections: Vec<&str> = rest.splitn(5, ':').collect();
        match sections.as_slice() {
            [partition, service, region, account_id, resource] => Ok(Arn {
                partition,
                service,
                region,
                account_id,
                resource,
            }),
            _ => Err("arn: not enough sections".to_string()),
        }
    }
}

pub fn validate_arn(key: &str, value: &ScalarValue) -> Vec<Diagnostic> {
    let s = value.stringify();
    let arn = match Arn::parse(&s) {
        Ok(arn) => arn,
        Err(e) => {
            return vec![Diagnostic::error(format!(
                "Invalid ARN {:?} for field {:?}: {}",
                s, key, e
            ))]
        }
    };

    let mut diagnostics = vec![];
    if arn.partition.is_empty() {
        diagnostics.push(Diagnostic::error(format!(
            "ARN {:?} for field {:?} is missing a partition value",
            s, key
        )));
    } else if !PARTITION.is_match(arn.partition) {
        diagnostics.push(Diagnostic::error(format!(
            "ARN {:?} for field {:?} has an invalid partition value: {}",
            s, key, arn.partition
        )));
    }
    if !arn.region.is_empty() && !REGION.is_match(arn.region) {
        diagnostics.push(Diagnostic::error(format!(
            "ARN {:?} for field {:?} has an invalid region value: {}",
            s, key, arn.region
        )));
    }
    if !arn.account_id.is_empty() && !ACCOUNT_ID.is_match(arn.account_id) {
        diagnostics.push(Diagnostic::error(format!(
            "ARN {:?} for field {:?} has an invalid account ID: {}",
            s, key, arn.account_id
        )));
    }
    if arn.resource.is_empty() {
        diagnostics.push(Diagnostic::error(format!(
            "ARN {:?} for field {:?} is missing a resource value",
            s, key
        )));
    }
    diagnostics
}

/// Applies to both session names and source identities.
pub fn validate_session_name(key: &str, value: &ScalarValue) -> Vec<Diagnostic> {
    let s = value.stringify();
    let mut diagnostics = length_range(key, &s, 2, 64);
    diagnostics.extend(pattern(key, &s, &SESSION_NAME));
    diagnostics
}

pub fn validate_external_id(key: &str, value: &ScalarValue) -> Vec<Diagnostic> {
    let s = value.stringify();
    let mut diagnostics = length_range(key, &s, 2, 1224);
    diagnostics.extend(pattern(key, &s, &EXTERNAL_ID));
    diagnostics
}

pub fn validate_web_identity_token(key: &str, value: &ScalarValue) -> Vec<Diagnostic> {
    length_range(key, &value.stringify(), 4, 20000)
}

pub fn validate_policy_json(key: &str, value: &ScalarValue) -> Vec<Diagnostic> {
    match serde_json::from_str::<serde_json::Value>(&value.stringify()) {
        Ok(_) => vec![],
        Err(e) => vec![Diagnostic::error(format!(
            "The value of field {:?} must be a valid JSON document: {}",
            key, e
        ))],
    }
}

fn length_range(key: &str, s: &str, min: usize, max: usize) -> Vec<Diagnostic> {
    let len = s.chars().count();
    if len < min || len > max {
        vec![Diagnostic::error(format!(
            "The value of field {:?} must be between {} and {} characters long, got {}",
            key, min, max, len
        ))]
    } else {
        vec![]
    }
}

fn pattern(key: &str, s: &str, re: &Regex) -> Vec<Diagnostic> {
    if re.is_match(s) {
        vec![]
    } else {
        vec![Diagnostic::error(format!(
            "The value of field {:?} must match the pattern {}",
            key,
            re.as_str()
        ))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> ScalarValue {
        ScalarValue::from(v)
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("1.5h"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("3µs"), Ok(Duration::from_micros(3)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("-1h").is_err());
        assert!(parse_duration("h").is_err());
    }

    #[test]
    fn test_assume_role_duration_bounds() {
        assert!(validate_assume_role_duration("assumeRole.duration", &s("15m")).is_empty());
        assert!(validate_assume_role_duration("assumeRole.duration", &s("12h")).is_empty());
        assert_eq!(
            validate_assume_role_duration("assumeRole.duration", &s("14m59s")).len(),
            1
        );
        assert_eq!(
            validate_assume_role_duration("assumeRole.duration", &s("12h1s")).len(),
            1
        );
        let diagnostics = validate_assume_role_duration("assumeRole.duration", &s("soon"));
        assert!(diagnostics[0].message.starts_with("Invalid duration"));
    }

    #[test]
    fn test_valid_arns() {
        for arn in [
            "arn:aws:iam::123456789012:role/deploy",
            "arn:aws-us-gov:lambda:us-gov-west-1:123456789012:function:f",
            "arn:aws:iam::aws:policy/ReadOnlyAccess",
        ] {
            assert!(validate_arn("assumeRole.roleArn", &s(arn)).is_empty(), "{}", arn);
        }
    }

    #[test]
    fn test_invalid_arns() {
        let diagnostics = validate_arn("assumeRole.roleArn", &s("role/deploy"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("invalid prefix"));

        let diagnostics = validate_arn("assumeRole.roleArn", &s("arn:aws:iam"));
        assert!(diagnostics[0].message.contains("not enough sections"));

        // every section wrong at once
        let diagnostics = validate_arn("k", &s("arn:gcp:iam:moon:12:"));
        let messages: Vec<_> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages.len(), 4, "{:?}", messages);
        assert!(messages[0].contains("invalid partition"));
        assert!(messages[1].contains("invalid region"));
        assert!(messages[2].contains("invalid account ID"));
        assert!(messages[3].contains("missing a resource"));

        let diagnostics = validate_arn("k", &s("arn::iam::123456789012:role/x"));
        assert!(diagnostics[0].message.contains("missing a partition"));
    }

    #[test]
    fn test_session_name() {
        assert!(validate_session_name("k", &s("deploy-session@ci")).is_empty());
        assert_eq!(validate_session_name("k", &s("x")).len(), 1);
        assert_eq!(validate_session_name("k", &s("has space")).len(), 1);
        assert_eq!(validate_session_name("k", &s(&"a".repeat(65))).len(), 1);
    }

    #[test]
    fn test_external_id_and_token() {
        assert!(validate_external_id("k", &s("urn:example/ext-1")).is_empty());
        assert_eq!(validate_external_id("k", &s("a")).len(), 1);
        assert!(validate_web_identity_token("k", &s("abcd")).is_empty());
        assert_eq!(validate_web_identity_token("k", &s("abc")).len(), 1);
    }

    #[test]
    fn test_policy_json() {
        assert!(validate_policy_json("k", &s(r#"{"Version": "2012-10-17"}"#)).is_empty());
        assert_eq!(validate_policy_json("k", &s("{not json")).len(), 1);
    }
}
