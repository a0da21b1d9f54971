use std::net::{IpAddr, SocketAddr};

use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::Resolver;
use thiserror::Error;

use crate::config::IpVersion;
use crate::http::{HttpSettings, Request};
use crate::util::excerpt;

#[derive(Debug, Error, Clone)]
pub enum PublicIpError {
    #[error("IP-echo endpoint unreachable: {0}")]
    Unreachable(Box<str>),

    #[error("IP-echo endpoint returned a malformed body: {0:?}")]
    Malformed(Box<str>),
}

#[derive(Debug, Error, Clone)]
pub enum RegisteredIpError {
    #[error("DNS lookup for {0} failed: {1}")]
    LookupFailed(Box<str>, Box<str>),

    #[error("{0} resolves, but has no {1} record")]
    NoRecord(Box<str>, &'static str),
}

/// Where the synchronizer gets its two IP addresses from. Split out so the
/// decision logic can be driven by stub sources in tests.
pub trait IpSource {
    /// The address outgoing packets currently carry, according to a
    /// configured IP-echo endpoint.
    fn public_ip(&self) -> Result<IpAddr, PublicIpError>;

    /// The address DNS currently serves for `host.domain`.
    fn registered_ip(
        &self,
        host: &str,
        domain: &str,
        version: IpVersion,
    ) -> Result<IpAddr, RegisteredIpError>;
}

/// Production source: HTTP echo for the public IP, and an A/AAAA lookup
/// against the domain's own nameserver for the registered IP. Asking the
/// authoritative server directly keeps recursive caches from serving the
/// pre-update value; if NS discovery fails we fall back to the system
/// resolver.
pub struct SystemResolver {
    echo_url: Box<str>,
    settings: HttpSettings,
}

impl SystemResolver {
    pub fn new(echo_url: Box<str>, settings: HttpSettings) -> Self {
        Self { echo_url, settings }
    }

    fn authoritative_resolver(
        &self,
        system: &Resolver,
        domain: &str,
    ) -> Result<Resolver, ResolveError> {
        let ns = system.ns_lookup(format!("{}.", domain))?;
        let ns_name = ns
            .iter()
            .next()
            .ok_or_else(|| ResolveError::from("domain has no NS records"))?;

        let ns_ip = system
            .lookup_ip(ns_name.0.to_utf8())?
            .iter()
            .next()
            .ok_or_else(|| ResolveError::from("nameserver has no address"))?;

        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(
            SocketAddr::new(ns_ip, 53),
            Protocol::Udp,
        ));
        Resolver::new(config, ResolverOpts::default()).map_err(ResolveError::from)
    }
}

impl IpSource for SystemResolver {
    fn public_ip(&self) -> Result<IpAddr, PublicIpError> {
        let response = Request::get(&self.echo_url, &self.settings)
            .call()
            .map_err(|e| PublicIpError::Unreachable(e.to_string().into()))?;

        let status = response.status();
        if status != 200 {
            return Err(PublicIpError::Unreachable(
                format!("HTTP status {}", status).into(),
            ));
        }

        let body = response
            .into_string()
            .map_err(|e| PublicIpError::Malformed(e.to_string().into()))?;

        parse_echo_body(&body)
    }

    fn registered_ip(
        &self,
        host: &str,
        domain: &str,
        version: IpVersion,
    ) -> Result<IpAddr, RegisteredIpError> {
        let name = format!("{}.{}", host, domain);
        let fqdn = format!("{}.", name);

        let system = Resolver::from_system_conf()
            .map_err(|e| RegisteredIpError::LookupFailed(name.clone().into(), e.to_string().into()))?;

        let resolver = match self.authoritative_resolver(&system, domain) {
            Ok(authority) => authority,
            Err(e) => {
                log::debug!("NS discovery for {} failed ({}), using system resolver", domain, e);
                system
            }
        };

        lookup_record(&resolver, &name, &fqdn, version)
    }
}

fn parse_echo_body(body: &str) -> Result<IpAddr, PublicIpError> {
    body.trim()
        .parse::<IpAddr>()
        .map_err(|_| PublicIpError::Malformed(excerpt(body)))
}

fn lookup_record(
    resolver: &Resolver,
    name: &str,
    fqdn: &str,
    version: IpVersion,
) -> Result<IpAddr, RegisteredIpError> {
    match version {
        IpVersion::V4 => match resolver.ipv4_lookup(fqdn) {
            Ok(lookup) => lookup
                .iter()
                .next()
                .map(|a| IpAddr::V4(a.0))
                .ok_or_else(|| RegisteredIpError::NoRecord(name.into(), "A")),
            Err(e) => Err(classify_resolve_error(name, "A", e)),
        },

        IpVersion::V6 => match resolver.ipv6_lookup(fqdn) {
            Ok(lookup) => lookup
                .iter()
                .next()
                .map(|aaaa| IpAddr::V6(aaaa.0))
                .ok_or_else(|| RegisteredIpError::NoRecord(name.into(), "AAAA")),
            Err(e) => Err(classify_resolve_error(name, "AAAA", e)),
        },
    }
}

/// NODATA (the name exists, the record type doesn't) becomes `NoRecord`;
/// NXDOMAIN and transport problems become `LookupFailed`.
fn classify_resolve_error(
    name: &str,
    record_type: &'static str,
    error: ResolveError,
) -> RegisteredIpError {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code != ResponseCode::NXDomain =>
        {
            RegisteredIpError::NoRecord(name.into(), record_type)
        }
        _ => RegisteredIpError::LookupFailed(name.into(), error.to_string().into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(2),
            user_agent: "ddns-sync/test".into(),
        }
    }

    #[test]
    fn echo_body_parses_bare_ipv4() {
        assert_eq!(
            parse_echo_body("1.2.3.4\n").unwrap(),
            "1.2.3.4".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn echo_body_parses_bare_ipv6() {
        assert!(parse_echo_body("2001:db8::1").unwrap().is_ipv6());
    }

    #[test]
    fn echo_body_rejects_garbage() {
        assert!(matches!(
            parse_echo_body("not-an-ip"),
            Err(PublicIpError::Malformed(body)) if body.as_ref() == "not-an-ip"
        ));
    }

    #[test]
    fn public_ip_from_echo_endpoint() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body("203.0.113.7")
            .create();

        let resolver = SystemResolver::new(server.url().into(), settings());
        let ip = resolver.public_ip().unwrap();

        assert_eq!(ip, "203.0.113.7".parse::<IpAddr>().unwrap());
        mock.assert();
    }

    #[test]
    fn malformed_echo_body_is_an_error() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create();

        let resolver = SystemResolver::new(server.url().into(), settings());
        assert!(matches!(
            resolver.public_ip(),
            Err(PublicIpError::Malformed(..))
        ));
    }

    #[test]
    fn echo_http_error_is_unreachable() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/").with_status(503).create();

        let resolver = SystemResolver::new(server.url().into(), settings());
        assert!(matches!(
            resolver.public_ip(),
            Err(PublicIpError::Unreachable(..))
        ));
    }

    #[test]
    fn echo_connection_refused_is_unreachable() {
        // Reserved port with nothing listening.
        let resolver = SystemResolver::new("http://127.0.0.1:9".into(), settings());
        assert!(matches!(
            resolver.public_ip(),
            Err(PublicIpError::Unreachable(..))
        ));
    }
}
