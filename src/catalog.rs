use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

use crate::config::{AuthConfig, ProviderConfig};
use crate::http::Method;
use crate::template::{Template, TemplateError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no provider named '{0}' is configured")]
    UnknownProvider(Box<str>),

    #[error("[provider.{0}]: update URL template is empty")]
    EmptyTemplate(Box<str>),

    #[error("[provider.{0}]: the template never references the new IP ({{ip}})")]
    MissingIpPlaceholder(Box<str>),

    #[error("[provider.{0}]: pattern '{1}' does not compile: {2}")]
    BadPattern(Box<str>, Box<str>, regex::Error),

    #[error("[provider.{0}]: {1}")]
    Template(Box<str>, TemplateError),
}

/// Authentication mechanism, compiled from [`AuthConfig`].
#[derive(Debug, Clone)]
pub enum AuthMode {
    None,
    Basic,
    TokenQuery { param: Box<str> },
    TokenHeader { header: Box<str>, value: Template },
}

/// Response partitioning rule: pattern lists plus the status set that counts
/// as success when no success pattern is configured.
#[derive(Debug, Clone)]
pub struct SuccessRule {
    pub success: Vec<Regex>,
    pub nochg: Vec<Regex>,
    pub badauth: Vec<Regex>,
    pub nohost: Vec<Regex>,
    pub success_status: Vec<u16>,
}

/// One DDNS service, fully described as data. Immutable once built.
#[derive(Debug, Clone)]
pub struct ProviderDefinition {
    pub name: Box<str>,
    pub template: Template,
    pub method: Method,
    pub auth: AuthMode,
    pub rule: SuccessRule,
}

#[derive(Debug)]
pub struct ProviderCatalog {
    providers: HashMap<Box<str>, ProviderDefinition>,
}

impl ProviderCatalog {
    /// Compiles every `[provider.*]` table, failing fast on a malformed
    /// entry so update time can't trip over configuration mistakes.
    pub fn from_config(
        config: &HashMap<Box<str>, ProviderConfig>,
    ) -> Result<Self, CatalogError> {
        let mut providers = HashMap::with_capacity(config.len());

        for (name, entry) in config {
            let template = Template::parse(&entry.url)
                .map_err(|e| CatalogError::Template(name.clone(), e))?;
            if template.is_empty() {
                return Err(CatalogError::EmptyTemplate(name.clone()));
            }
            if !template.contains("ip") {
                return Err(CatalogError::MissingIpPlaceholder(name.clone()));
            }

            let auth = match &entry.auth {
                AuthConfig::None => AuthMode::None,
                AuthConfig::Basic => AuthMode::Basic,
                AuthConfig::TokenQuery { param } => AuthMode::TokenQuery {
                    param: param.clone(),
                },
                AuthConfig::TokenHeader { header, value } => AuthMode::TokenHeader {
                    header: header.clone(),
                    value: Template::parse(value)
                        .map_err(|e| CatalogError::Template(name.clone(), e))?,
                },
            };

            let rule = SuccessRule {
                success: compile_patterns(name, &entry.success)?,
                nochg: compile_patterns(name, &entry.nochg)?,
                badauth: compile_patterns(name, &entry.badauth)?,
                nohost: compile_patterns(name, &entry.nohost)?,
                success_status: entry.success_status.clone(),
            };

            providers.insert(
                name.clone(),
                ProviderDefinition {
                    name: name.clone(),
                    template,
                    method: entry.method,
                    auth,
                    rule,
                },
            );
        }

        Ok(Self { providers })
    }

    pub fn lookup(&self, name: &str) -> Result<&ProviderDefinition, CatalogError> {
        self.providers
            .get(name)
            .ok_or_else(|| CatalogError::UnknownProvider(name.into()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }
}

fn compile_patterns(name: &str, patterns: &[Box<str>]) -> Result<Vec<Regex>, CatalogError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| CatalogError::BadPattern(name.into(), p.clone(), e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn catalog(toml: &str) -> Result<ProviderCatalog, CatalogError> {
        let config = toml::from_str::<Config>(toml).unwrap();
        ProviderCatalog::from_config(&config.provider)
    }

    #[test]
    fn lookup_finds_compiled_entry() {
        let catalog = catalog(
            r#"
            [provider.namecheap]
            url = "https://dyn.example.com/update?host={host}&ip={ip}"
            success = "good"
        "#,
        )
        .unwrap();

        let def = catalog.lookup("namecheap").unwrap();
        assert_eq!(def.name.as_ref(), "namecheap");
        assert_eq!(def.method, Method::Get);
        assert_eq!(def.rule.success.len(), 1);
        assert!(matches!(def.auth, AuthMode::None));
    }

    #[test]
    fn lookup_of_missing_entry_is_unknown_provider() {
        let catalog = catalog("").unwrap();
        assert!(matches!(
            catalog.lookup("nope"),
            Err(CatalogError::UnknownProvider(name)) if name.as_ref() == "nope"
        ));
    }

    #[test]
    fn empty_template_fails_at_load() {
        let err = catalog(
            r#"
            [provider.broken]
            url = ""
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::EmptyTemplate(..)));
    }

    #[test]
    fn template_without_ip_placeholder_fails_at_load() {
        let err = catalog(
            r#"
            [provider.broken]
            url = "https://dyn.example.com/update?host={host}"
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::MissingIpPlaceholder(..)));
    }

    #[test]
    fn bad_success_pattern_fails_at_load() {
        let err = catalog(
            r#"
            [provider.broken]
            url = "https://dyn.example.com/update?ip={ip}"
            success = "good ["
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::BadPattern(..)));
    }

    #[test]
    fn bad_token_header_template_fails_at_load() {
        let err = catalog(
            r#"
            [provider.broken]
            url = "https://dyn.example.com/update?ip={ip}"
            auth = { mode = "token-header", header = "Authorization", value = "Bearer {nonsense}" }
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::Template(..)));
    }
}
