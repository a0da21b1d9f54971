use std::collections::HashMap;
use std::time::Duration;

use serde_derive::Deserialize;
use serde_repr::Deserialize_repr;
use thiserror::Error;

use crate::http::{HttpSettings, Method};
use crate::util::one_or_more_string;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    #[serde(default)]
    pub general: General,

    #[serde(default)]
    pub provider: HashMap<Box<str>, ProviderConfig>,

    #[serde(default)]
    pub host: HashMap<Box<str>, HostTarget>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct General {
    #[serde(default = "default_ip_echo_url")]
    pub ip_echo_url: Box<str>,

    /// Per-request timeout in seconds, applied to the IP-echo call and to
    /// the provider update call alike.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: Box<str>,
}

impl Default for General {
    fn default() -> Self {
        Self {
            ip_echo_url: default_ip_echo_url(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl General {
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.timeout),
            user_agent: self.user_agent.clone(),
        }
    }
}

fn default_ip_echo_url() -> Box<str> {
    Box::from("https://api.ipify.org")
}

fn default_timeout() -> u64 {
    10
}

fn default_user_agent() -> Box<str> {
    Box::from(concat!("ddns-sync/", env!("CARGO_PKG_VERSION")))
}

/// One `[provider.<name>]` table: everything the generic executor needs to
/// speak to a DDNS service, as data. The pattern fields accept a single
/// string or an array of strings.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
    pub url: Box<str>,

    #[serde(default = "default_method")]
    pub method: Method,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default, deserialize_with = "one_or_more_string")]
    pub success: Vec<Box<str>>,

    #[serde(default, deserialize_with = "one_or_more_string")]
    pub nochg: Vec<Box<str>>,

    #[serde(default, deserialize_with = "one_or_more_string")]
    pub badauth: Vec<Box<str>>,

    #[serde(default, deserialize_with = "one_or_more_string")]
    pub nohost: Vec<Box<str>>,

    /// Statuses that count as success when no `success` pattern is given.
    #[serde(default = "default_success_status")]
    pub success_status: Vec<u16>,
}

fn default_method() -> Method {
    Method::Get
}

fn default_success_status() -> Vec<u16> {
    vec![200]
}

/// Exactly one authentication mechanism per provider, chosen by the
/// definition and never inferred from the supplied credentials.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(tag = "mode")]
#[serde(rename_all = "kebab-case")]
pub enum AuthConfig {
    #[default]
    None,

    /// Basic auth header from the host entry's username and password.
    Basic,

    /// Token appended to the query string under `param`.
    TokenQuery { param: Box<str> },

    /// Token carried in a header; `value` is a template so schemes like
    /// `Bearer {token}` stay a configuration concern.
    TokenHeader {
        header: Box<str>,

        #[serde(default = "default_token_value")]
        value: Box<str>,
    },
}

fn default_token_value() -> Box<str> {
    Box::from("{token}")
}

#[derive(Deserialize_repr, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum IpVersion {
    V4 = 4,
    V6 = 6,
}

impl Default for IpVersion {
    fn default() -> Self {
        IpVersion::V4
    }
}

/// One `[host.<name>]` table: the record being kept in sync, which provider
/// updates it, and the credentials that provider's template may reference.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HostTarget {
    pub host: Box<str>,
    pub domain: Box<str>,
    pub provider: Box<str>,

    #[serde(default)]
    pub username: Option<Box<str>>,

    #[serde(default)]
    pub password: Option<Box<str>>,

    #[serde(default)]
    pub token: Option<Box<str>>,

    /// Which record type is kept in sync: 4 for A, 6 for AAAA.
    #[serde(default)]
    pub record: IpVersion,
}

impl HostTarget {
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.host, self.domain)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("[host.{0}]: '{1}' is not a syntactically valid domain name")]
    InvalidDomain(Box<str>, Box<str>),

    #[error("[host.{0}]: '{1}' is not a valid DNS host name")]
    InvalidHost(Box<str>, Box<str>),
}

impl Config {
    /// Rejects host entries whose names could never resolve, before any
    /// network traffic happens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, target) in &self.host {
            if !is_valid_domain(&target.domain) {
                return Err(ConfigError::InvalidDomain(
                    name.clone(),
                    target.domain.clone(),
                ));
            }
            if !is_valid_host(&target.host) {
                return Err(ConfigError::InvalidHost(name.clone(), target.host.clone()));
            }
        }

        Ok(())
    }
}

/// Validity per RFCs 1034/1123/952: overall length up to 253, labels of
/// 1..=63 letters/digits/hyphens not starting or ending with a hyphen, and
/// an alphabetic TLD of at least two characters.
pub(crate) fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|l| is_valid_label(l)) {
        return false;
    }

    let tld = labels[labels.len() - 1];
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// A host name is one or more labels, without the TLD requirement.
pub(crate) fn is_valid_host(host: &str) -> bool {
    !host.is_empty() && host.len() <= 253 && host.split('.').all(is_valid_label)
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !label.starts_with('-')
        && !label.ends_with('-')
}
