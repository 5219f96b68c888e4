//! Request authentication for the exchange's private endpoints.
//!
//! Every private call carries four `CB-ACCESS-*` headers. The signature is
//! `base64(HMAC-SHA256(base64_decode(secret), timestamp + METHOD + path + body))`
//! where `path` includes the query string and `body` is empty for bodyless
//! requests.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac as _};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Body, Method, Request};
use secrecy::{ExposeSecret as _, SecretString};
use sha2::Sha256;
use url::Position;

use crate::error::{Error, Kind};
use crate::{Result, Timestamp};

pub const CB_ACCESS_KEY: &str = "CB-ACCESS-KEY";
pub const CB_ACCESS_SIGN: &str = "CB-ACCESS-SIGN";
pub const CB_ACCESS_TIMESTAMP: &str = "CB-ACCESS-TIMESTAMP";
pub const CB_ACCESS_PASSPHRASE: &str = "CB-ACCESS-PASSPHRASE";

pub const API_KEY_VAR: &str = "COINBASE_API_KEY";
pub const API_SECRET_VAR: &str = "COINBASE_API_SECRET";
pub const API_PASSPHRASE_VAR: &str = "COINBASE_API_PASSPHRASE";

/// API key, secret and passphrase issued by the exchange.
///
/// All three are validated when constructed, so a [`Credentials`] value can
/// always produce headers.
#[derive(Clone)]
pub struct Credentials {
    key: String,
    secret: SecretString,
    passphrase: SecretString,
}

impl Credentials {
    pub fn new<K, S, P>(key: K, secret: S, passphrase: P) -> Result<Self>
    where
        K: Into<String>,
        S: Into<String>,
        P: Into<String>,
    {
        let key = key.into();
        let secret = secret.into();
        let passphrase = passphrase.into();

        if key.trim().is_empty() {
            return Err(Error::missing_credential("key"));
        }
        if secret.trim().is_empty() {
            return Err(Error::missing_credential("secret"));
        }
        if passphrase.trim().is_empty() {
            return Err(Error::missing_credential("passphrase"));
        }

        STANDARD
            .decode(secret.trim())
            .map_err(|e| Error::with_source(Kind::Configuration, e))?;
        HeaderValue::from_str(&key).map_err(|e| Error::with_source(Kind::Configuration, e))?;
        HeaderValue::from_str(&passphrase)
            .map_err(|e| Error::with_source(Kind::Configuration, e))?;

        Ok(Self {
            key,
            secret: SecretString::from(secret.trim().to_owned()),
            passphrase: SecretString::from(passphrase),
        })
    }

    /// Reads `COINBASE_API_KEY`, `COINBASE_API_SECRET` and `COINBASE_API_PASSPHRASE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`Credentials::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read =
            |var: &str, name: &str| lookup(var).ok_or_else(|| Error::missing_credential(name));

        Self::new(
            read(API_KEY_VAR, "key")?,
            read(API_SECRET_VAR, "secret")?,
            read(API_PASSPHRASE_VAR, "passphrase")?,
        )
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Signs with the current wall-clock time.
    pub fn sign(&self, method: &Method, path: &str, body: &str) -> Result<AuthHeaders> {
        self.sign_at(Utc::now().timestamp(), method, path, body)
    }

    /// Signs with a fixed `timestamp`; deterministic for identical inputs.
    pub fn sign_at(
        &self,
        timestamp: Timestamp,
        method: &Method,
        path: &str,
        body: &str,
    ) -> Result<AuthHeaders> {
        let signature = hmac(&self.secret, &to_message(timestamp, method, path, body))?;

        Ok(AuthHeaders {
            key: self.key.clone(),
            signature,
            timestamp,
            passphrase: self.passphrase.clone(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// Header values for one signed request.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct AuthHeaders {
    pub key: String,
    pub signature: String,
    pub timestamp: Timestamp,
    pub passphrase: SecretString,
}

impl AuthHeaders {
    pub fn into_header_map(self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();

        map.insert(CB_ACCESS_KEY, HeaderValue::from_str(&self.key)?);
        map.insert(CB_ACCESS_SIGN, HeaderValue::from_str(&self.signature)?);
        map.insert(CB_ACCESS_TIMESTAMP, HeaderValue::from(self.timestamp));

        let mut passphrase = HeaderValue::from_str(self.passphrase.expose_secret())?;
        passphrase.set_sensitive(true);
        map.insert(CB_ACCESS_PASSPHRASE, passphrase);

        map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(map)
    }
}

/// Builds the authentication headers for an already-built `request`.
pub(crate) fn create_headers(
    credentials: &Credentials,
    request: &Request,
    timestamp: Timestamp,
) -> Result<HeaderMap> {
    let path = &request.url()[Position::BeforePath..];
    let body = request
        .body()
        .and_then(Body::as_bytes)
        .map(String::from_utf8_lossy)
        .unwrap_or_default();

    credentials
        .sign_at(timestamp, request.method(), path, &body)?
        .into_header_map()
}

pub(crate) fn hmac(secret: &SecretString, message: &str) -> Result<String> {
    let decoded_secret = STANDARD
        .decode(secret.expose_secret())
        .map_err(|e| Error::with_source(Kind::Configuration, e))?;
    let mut mac = Hmac::<Sha256>::new_from_slice(&decoded_secret)
        .map_err(|e| Error::with_source(Kind::Internal, e))?;
    mac.update(message.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn to_message(timestamp: Timestamp, method: &Method, path: &str, body: &str) -> String {
    format!("{timestamp}{}{path}{body}", method.as_str())
}
