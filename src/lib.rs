#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod policy;
pub mod transfer;
pub mod types;

use reqwest::header::HeaderMap;
use reqwest::{Client as ReqwestClient, Request};
use serde::de::DeserializeOwned;

pub use client::Client;
pub use config::{Config, Environment};
pub use error::{Error, Kind as ErrorKind};
pub use transfer::{TransferOutcome, TransferRequest};

pub type Result<T> = std::result::Result<T, Error>;

/// Unix seconds used for request signing.
pub type Timestamp = i64;

/// The asset this crate cashes out.
pub const ASSET: &str = "BTC";

/// Executes `request` with optional extra `headers` and decodes a JSON body.
///
/// Non-success statuses become [`ErrorKind::Status`] errors carrying the
/// response text; nothing is retried.
pub(crate) async fn request<Response: DeserializeOwned>(
    client: &ReqwestClient,
    mut request: Request,
    headers: Option<HeaderMap>,
) -> Result<Response> {
    let method = request.method().clone();
    let path = request.url().path().to_owned();

    if let Some(headers) = headers {
        request.headers_mut().extend(headers);
    }

    let response = match client.execute(request).await {
        Ok(response) => response,
        Err(e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(%method, %path, error = %e, "request failed to send");
            return Err(e.into());
        }
    };

    let status_code = response.status();
    if !status_code.is_success() {
        let message = match response.text().await {
            Ok(message) => message,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    %method,
                    %path,
                    error = %e,
                    "unable to read error response body"
                );
                format!("<unreadable response body: {e}>")
            }
        };

        #[cfg(feature = "tracing")]
        tracing::warn!(
            status = %status_code,
            %method,
            %path,
            message = %message,
            "exchange returned an error response"
        );

        return Err(Error::status(status_code, method, path, message));
    }

    let body = response.bytes().await?;
    serde_json::from_slice::<Response>(&body).map_err(|e| {
        #[cfg(feature = "tracing")]
        tracing::warn!(%method, %path, error = %e, "unable to decode response body");
        Error::from(e)
    })
}
