//! Store endpoint descriptors

use crate::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::{Host, Url};

/// Default store host
pub const DEFAULT_HOST: &str = "localhost";

/// Default store port
pub const DEFAULT_PORT: u16 = 27017;

/// Database credentials are checked against when the URI names none
pub const DEFAULT_AUTH_SOURCE: &str = "admin";

const SCHEMES: &[&str] = &["store", "mongodb"];

/// Credentials carried in an endpoint URI
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Database the credentials belong to
    pub source: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Host and port of a store server, plus optional credentials
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
        }
    }

    /// Parse `scheme://[user:pass@]host[:port][/db][?authSource=db]`,
    /// `host:port` or `host`. IPv6 hosts are written in brackets.
    ///
    /// An empty string yields the default endpoint.
    pub fn parse(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let invalid = |reason: &str| StoreError::InvalidEndpoint(format!("{reason} in {uri}"));

        let url = if trimmed.contains("://") {
            Url::parse(trimmed)
        } else {
            Url::parse(&format!("{}://{trimmed}", SCHEMES[0]))
        }
        .map_err(|e| invalid(&e.to_string()))?;

        if !SCHEMES.contains(&url.scheme()) {
            return Err(invalid("unsupported scheme"));
        }

        let host = match url.host() {
            Some(Host::Domain(host)) if !host.is_empty() => host.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(invalid("missing host")),
        };
        let port = url.port().unwrap_or(DEFAULT_PORT);

        Ok(Self {
            host,
            port,
            credentials: credentials(&url).map_err(invalid)?,
        })
    }

    /// `host:port`, never including credentials
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn credentials(url: &Url) -> std::result::Result<Option<Credentials>, &'static str> {
    let (username, password) = match (url.username(), url.password()) {
        ("", None) => return Ok(None),
        ("", Some(_)) => return Err("missing username"),
        (_, None) => return Err("missing password"),
        (username, Some(password)) => (username, password),
    };
    let decode = |raw: &str| {
        urlencoding::decode(raw)
            .map(|s| s.into_owned())
            .map_err(|_| "invalid percent-encoding")
    };

    let path_db = url.path().trim_start_matches('/');
    let source = url
        .query_pairs()
        .find(|(key, _)| key == "authSource")
        .map(|(_, value)| value.into_owned())
        .or_else(|| (!path_db.is_empty()).then(|| path_db.to_string()))
        .unwrap_or_else(|| DEFAULT_AUTH_SOURCE.to_string());

    Ok(Some(Credentials {
        username: decode(username)?,
        password: decode(password)?,
        source,
    }))
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}
