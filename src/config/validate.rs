//! Pre-flight configuration checks.
//!
//! Catches obviously misconfigured runs before they turn into a wall of
//! network-error results. Every problem is reported as its own
//! [`ConfigIssue`] so the user can fix them all in one pass.

use std::fmt;
use url::Url;

use super::{TesterConfig, PLACEHOLDER_API_KEYS, PLACEHOLDER_BASE_URL, PLACEHOLDER_ZONE_IDS};

/// Minimum length of a real anonymous access key.
pub const MIN_API_KEY_LEN: usize = 50;

/// Which checks apply to a given entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// The run reports readings into a preconfigured zone.
    pub require_zone_id: bool,
    /// Only `https://` backends are accepted.
    pub require_https: bool,
    /// Shortest access key accepted.
    pub min_api_key_len: usize,
}

impl ValidationPolicy {
    /// Policy for the fixed-configuration connection test.
    pub fn connection() -> Self {
        Self {
            require_zone_id: true,
            require_https: true,
            min_api_key_len: MIN_API_KEY_LEN,
        }
    }

    /// Policy for the interactive integration test, which discovers its own zone.
    pub fn integration() -> Self {
        Self {
            require_zone_id: false,
            ..Self::connection()
        }
    }

    /// Accept plain `http://` backends, e.g. a local mock.
    pub fn allow_http(mut self, allow: bool) -> Self {
        self.require_https = !allow;
        self
    }
}

/// A single problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    /// No backend URL was given.
    MissingBaseUrl,
    /// No access key was given.
    MissingApiKey,
    /// The policy needs a zone and none was given.
    MissingZoneId,
    /// The backend URL is still the template value.
    PlaceholderBaseUrl,
    /// The access key is still the template value.
    PlaceholderApiKey,
    /// The zone id is still one of the template values.
    PlaceholderZoneId,
    /// The backend URL does not parse.
    InvalidBaseUrl { reason: String },
    /// The backend URL is not `https` and the policy requires it.
    InsecureScheme { scheme: String },
    /// The access key is shorter than the policy minimum.
    ApiKeyTooShort { length: usize, minimum: usize },
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBaseUrl => write!(f, "Backend URL is missing"),
            Self::MissingApiKey => write!(f, "API key is missing"),
            Self::MissingZoneId => write!(f, "Zone ID is missing"),
            Self::PlaceholderBaseUrl => write!(f, "Backend URL not configured (template value)"),
            Self::PlaceholderApiKey => write!(f, "API key not configured (template value)"),
            Self::PlaceholderZoneId => write!(f, "Zone ID not configured (template value)"),
            Self::InvalidBaseUrl { reason } => write!(f, "Backend URL is not a valid URL: {reason}"),
            Self::InsecureScheme { scheme } => {
                write!(f, "Backend URL should start with https:// (found {scheme}://)")
            },
            Self::ApiKeyTooShort { length, minimum } => write!(
                f,
                "API key seems too short ({length} characters, expected at least {minimum})"
            ),
        }
    }
}

/// Outcome of the pre-flight checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ConfigIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[ConfigIssue] {
        &self.issues
    }

    pub fn contains(&self, issue: &ConfigIssue) -> bool {
        self.issues.contains(issue)
    }
}

pub(super) fn validate(config: &TesterConfig, policy: &ValidationPolicy) -> ValidationReport {
    let mut issues = Vec::new();

    if config.base_url.is_empty() {
        issues.push(ConfigIssue::MissingBaseUrl);
    } else {
        if config.base_url == PLACEHOLDER_BASE_URL {
            issues.push(ConfigIssue::PlaceholderBaseUrl);
        }
        match Url::parse(&config.base_url) {
            Ok(url) => {
                if policy.require_https && url.scheme() != "https" {
                    issues.push(ConfigIssue::InsecureScheme {
                        scheme: url.scheme().to_string(),
                    });
                }
            },
            Err(e) => issues.push(ConfigIssue::InvalidBaseUrl {
                reason: e.to_string(),
            }),
        }
    }

    if config.api_key.is_empty() {
        issues.push(ConfigIssue::MissingApiKey);
    } else {
        if PLACEHOLDER_API_KEYS.contains(&config.api_key.as_str()) {
            issues.push(ConfigIssue::PlaceholderApiKey);
        }
        let length = config.api_key.chars().count();
        if length < policy.min_api_key_len {
            issues.push(ConfigIssue::ApiKeyTooShort {
                length,
                minimum: policy.min_api_key_len,
            });
        }
    }

    if policy.require_zone_id {
        match config.zone_id.as_deref() {
            None => issues.push(ConfigIssue::MissingZoneId),
            Some(zone) if PLACEHOLDER_ZONE_IDS.contains(&zone) => {
                issues.push(ConfigIssue::PlaceholderZoneId)
            },
            Some(_) => {},
        }
    }

    ValidationReport { issues }
}
