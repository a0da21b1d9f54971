use thiserror::Error;

/// Placeholder names a provider endpoint template may use.
pub const RECOGNIZED_PLACEHOLDERS: [&str; 6] =
    ["host", "domain", "ip", "username", "password", "token"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unrecognized placeholder {{{0}}} in template")]
    UnknownPlaceholder(Box<str>),

    #[error("unterminated '{{' in template")]
    Unterminated,

    #[error("no value supplied for placeholder {{{0}}}")]
    MissingValue(Box<str>),

    #[error("provider requires a {0}, but the host entry supplies none")]
    MissingCredential(&'static str),
}

/// A string with `{placeholder}` markers, validated once at load time so
/// update time can only fail on a missing *value*, never on syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: Box<str>,
}

impl Template {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut rest = raw;
        while let Some(open) = rest.find('{') {
            let tail = &rest[open + 1..];
            let close = tail.find('}').ok_or(TemplateError::Unterminated)?;
            let name = &tail[..close];
            if !RECOGNIZED_PLACEHOLDERS.contains(&name) {
                return Err(TemplateError::UnknownPlaceholder(name.into()));
            }
            rest = &tail[close + 1..];
        }

        Ok(Self { raw: raw.into() })
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Whether the template references the given placeholder.
    pub fn contains(&self, name: &str) -> bool {
        let marker = format!("{{{}}}", name);
        self.raw.contains(&marker)
    }

    /// Renders for use as a URL: substituted values are percent-encoded so
    /// credentials with reserved characters survive the query string.
    pub fn render_url<'v>(
        &self,
        lookup: impl Fn(&str) -> Option<&'v str>,
    ) -> Result<String, TemplateError> {
        self.render(lookup, true)
    }

    /// Renders verbatim, for header values such as `Bearer {token}`.
    pub fn render_raw<'v>(
        &self,
        lookup: impl Fn(&str) -> Option<&'v str>,
    ) -> Result<String, TemplateError> {
        self.render(lookup, false)
    }

    fn render<'v>(
        &self,
        lookup: impl Fn(&str) -> Option<&'v str>,
        encode: bool,
    ) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.raw.len());
        let mut rest: &str = &self.raw;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open + 1..];
            // parse() guarantees a closing brace and a recognized name
            let close = tail.find('}').ok_or(TemplateError::Unterminated)?;
            let name = &tail[..close];

            let value = lookup(name).ok_or_else(|| TemplateError::MissingValue(name.into()))?;
            if encode {
                out.push_str(&urlencoding::encode(value));
            } else {
                out.push_str(value);
            }

            rest = &tail[close + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(name: &str) -> Option<&'static str> {
        match name {
            "host" => Some("myhost"),
            "domain" => Some("mydomain.com"),
            "ip" => Some("1.2.3.4"),
            "password" => Some("p&ss=word"),
            _ => None,
        }
    }

    #[test]
    fn renders_all_placeholders() {
        let t = Template::parse("https://u.example/set?h={host}&d={domain}&ip={ip}").unwrap();
        assert_eq!(
            t.render_url(vars).unwrap(),
            "https://u.example/set?h=myhost&d=mydomain.com&ip=1.2.3.4"
        );
    }

    #[test]
    fn url_render_percent_encodes_values() {
        let t = Template::parse("p={password}").unwrap();
        assert_eq!(t.render_url(vars).unwrap(), "p=p%26ss%3Dword");
    }

    #[test]
    fn raw_render_keeps_values_verbatim() {
        let t = Template::parse("p={password}").unwrap();
        assert_eq!(t.render_raw(vars).unwrap(), "p=p&ss=word");
    }

    #[test]
    fn missing_value_is_reported_by_name() {
        let t = Template::parse("t={token}").unwrap();
        assert_eq!(
            t.render_url(vars).unwrap_err(),
            TemplateError::MissingValue("token".into())
        );
    }

    #[test]
    fn unknown_placeholder_rejected_at_parse() {
        assert_eq!(
            Template::parse("ip={ip}&x={bogus}").unwrap_err(),
            TemplateError::UnknownPlaceholder("bogus".into())
        );
    }

    #[test]
    fn unterminated_placeholder_rejected_at_parse() {
        assert_eq!(
            Template::parse("ip={ip").unwrap_err(),
            TemplateError::Unterminated
        );
    }

    #[test]
    fn contains_matches_whole_names_only() {
        let t = Template::parse("ip={ip}").unwrap();
        assert!(t.contains("ip"));
        assert!(!t.contains("domain"));
    }

    #[test]
    fn text_without_placeholders_passes_through() {
        let t = Template::parse("https://u.example/ping").unwrap();
        assert_eq!(t.render_url(vars).unwrap(), "https://u.example/ping");
    }
}
