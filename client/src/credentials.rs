//! Endpoint, region and credentials of a DynamoDB connection.

use std::{env, fmt};

use url::{ParseError, Url};

use crate::error::DynoError;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const LOCAL_ENDPOINT: &str = "http://localhost:8000";

/// DynamoDB Local accepts any key pair, but it still expects a signed request.
const LOCAL_ACCESS_KEY: &str = "local";
const LOCAL_SECRET_KEY: &str = "local";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl Credentials {
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    #[must_use]
    pub fn with_session_token(mut self, token: Option<String>) -> Self {
        self.session_token = token.filter(|t| !t.is_empty());
        self
    }

    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub(crate) fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

// Manual Debug impl to keep secrets out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field(
                "session_token",
                &if self.session_token.is_some() { "[REDACTED]" } else { "None" },
            )
            .finish()
    }
}

/// Where requests go and how they are signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectConfig {
    endpoint: Url,
    region: String,
    credentials: Credentials,
}

impl ConnectConfig {
    pub fn new(endpoint: &str, region: impl Into<String>, credentials: Credentials) -> Result<Self, DynoError> {
        let endpoint = Url::parse(endpoint).map_err(|source| DynoError::Endpoint {
            endpoint: endpoint.to_string(),
            source,
        })?;
        if endpoint.host_str().is_none() {
            return Err(DynoError::Endpoint {
                endpoint: endpoint.to_string(),
                source: ParseError::EmptyHost,
            });
        }
        Ok(Self {
            endpoint,
            region: region.into(),
            credentials,
        })
    }

    /// A DynamoDB Local instance, `http://localhost:8000` unless a host is given.
    pub fn local(host: Option<&str>) -> Result<Self, DynoError> {
        Self::new(
            host.unwrap_or(LOCAL_ENDPOINT),
            DEFAULT_REGION,
            Credentials::new(LOCAL_ACCESS_KEY, LOCAL_SECRET_KEY),
        )
    }

    /// The regional AWS endpoint.
    pub fn aws(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: Option<&str>,
    ) -> Result<Self, DynoError> {
        let region = region.unwrap_or(DEFAULT_REGION);
        Self::new(
            &aws_endpoint(region),
            region,
            Credentials::new(access_key_id, secret_access_key),
        )
    }

    /// Read `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`,
    /// `AWS_REGION` (or `AWS_DEFAULT_REGION`) and `DYNO_ENDPOINT`.
    ///
    /// With an explicit endpoint and no keys the local credentials are used.
    pub fn from_env() -> Result<Self, DynoError> {
        Self::from_lookup(|name| env::var(name).ok().filter(|v| !v.is_empty()))
    }

    /// Same as [`ConnectConfig::from_env`] over any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DynoError> {
        let region = lookup("AWS_REGION")
            .or_else(|| lookup("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = lookup("DYNO_ENDPOINT");
        let keys = lookup("AWS_ACCESS_KEY_ID").zip(lookup("AWS_SECRET_ACCESS_KEY"));

        let credentials = match (keys, &endpoint) {
            (Some((access, secret)), _) => {
                Credentials::new(access, secret).with_session_token(lookup("AWS_SESSION_TOKEN"))
            }
            (None, Some(_)) => Credentials::new(LOCAL_ACCESS_KEY, LOCAL_SECRET_KEY),
            (None, None) => return Err(DynoError::MissingCredentials),
        };
        let endpoint = endpoint.unwrap_or_else(|| aws_endpoint(&region));
        Self::new(&endpoint, region, credentials)
    }

    #[must_use]
    pub fn with_session_token(mut self, token: Option<String>) -> Self {
        self.credentials = self.credentials.with_session_token(token);
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Value of the `Host` header the transport sends, port included when not default.
    #[must_use]
    pub fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.credentials.access_key_id == LOCAL_ACCESS_KEY
    }
}

impl fmt::Display for ConnectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.endpoint, self.region)
    }
}

fn aws_endpoint(region: &str) -> String {
    format!("https://dynamodb.{region}.amazonaws.com")
}
