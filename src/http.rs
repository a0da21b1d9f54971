use std::io::{self, Read};
use std::time::Duration;

use serde_derive::Deserialize;
use thiserror::Error;

/// HTTP method a provider's update endpoint expects.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn verb(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Knobs shared by every outbound request. Built once from `[general]`.
#[derive(Clone, Debug)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: Box<str>,
}

#[derive(Debug, Error, Clone)]
#[error("HTTP transport error: {0}")]
pub struct TransportError(pub Box<str>);

pub struct Response {
    status: u16,
    reader: Box<dyn Read + Send + Sync>,
}

impl Response {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn into_string(self) -> Result<String, io::Error> {
        let mut vec = Vec::with_capacity(1024);
        let read = self.reader.take(2 * 1024 * 1024).read_to_end(&mut vec)?;
        vec.resize(read, 0);
        String::from_utf8(vec).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

pub struct Request {
    inner: ureq::Request,
}

impl Request {
    pub fn new(method: Method, url: &str, settings: &HttpSettings) -> Self {
        let inner = ureq::request(method.verb(), url)
            .timeout(settings.timeout)
            .set("User-Agent", &settings.user_agent);
        Self { inner }
    }

    pub fn get(url: &str, settings: &HttpSettings) -> Self {
        Self::new(Method::Get, url, settings)
    }

    pub fn query(mut self, param: &str, value: &str) -> Self {
        self.inner = self.inner.query(param, value);
        self
    }

    pub fn set(mut self, header: &str, value: &str) -> Self {
        self.inner = self.inner.set(header, value);
        self
    }

    /// Sends the request without a body. Non-2xx statuses are still a
    /// response here; only connect/TLS/timeout failures are errors, so the
    /// caller classifies status and body in one place.
    pub fn call(self) -> Result<Response, TransportError> {
        match self.inner.call() {
            Ok(resp) => Ok(Response {
                status: resp.status(),
                reader: resp.into_reader(),
            }),
            Err(ureq::Error::Status(code, resp)) => Ok(Response {
                status: code,
                reader: resp.into_reader(),
            }),
            Err(ureq::Error::Transport(t)) => Err(TransportError(t.to_string().into())),
        }
    }
}
