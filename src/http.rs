//! Shared HTTP client for geocoding and weather providers

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;

use crate::error::LocatorError;

pub const USER_AGENT: &str = concat!("pickup-locator/", env!("CARGO_PKG_VERSION"));

/// Build a client that retries transient failures with exponential backoff
pub fn build_client(timeout: Duration, max_retries: u32) -> Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .with_context(|| "Failed to create HTTP client")?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Outcome of a GET whose 404 means "nothing here" rather than an error
pub(crate) enum Fetched<T> {
    Body(T),
    NotFound,
}

/// GET a URL and decode its JSON body, mapping failures to provider errors
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &ClientWithMiddleware,
    provider: &str,
    url: &str,
) -> crate::Result<Fetched<T>> {
    tracing::debug!(provider, "Calling the API");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LocatorError::provider(provider, format!("Request failed: {e}")))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(Fetched::NotFound);
    }
    if !status.is_success() {
        return Err(LocatorError::provider(
            provider,
            format!("API returned status: {status}"),
        ));
    }

    response
        .json::<T>()
        .await
        .map(Fetched::Body)
        .map_err(|e| LocatorError::provider(provider, format!("Failed to parse response: {e}")))
}

/// Parse a coordinate component that some APIs send as a string
pub(crate) fn parse_degrees(provider: &str, value: &str) -> crate::Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| LocatorError::provider(provider, format!("Invalid coordinate '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client() {
        assert!(build_client(Duration::from_secs(5), 1).is_ok());
    }

    #[test]
    fn test_parse_degrees() {
        assert_eq!(parse_degrees("p", " 29.6488 ").unwrap(), 29.6488);
        assert!(parse_degrees("p", "north").is_err());
    }

    #[tokio::test]
    async fn test_get_json_statuses() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value": 3}"#)
            .create_async()
            .await;
        let _missing = server.mock("GET", "/missing").with_status(404).create_async().await;
        let _broken = server.mock("GET", "/broken").with_status(400).create_async().await;

        #[derive(serde::Deserialize)]
        struct Body {
            value: u32,
        }

        let client = build_client(Duration::from_secs(5), 0).unwrap();

        let ok: Fetched<Body> = get_json(&client, "test", &format!("{}/ok", server.url()))
            .await
            .unwrap();
        assert!(matches!(ok, Fetched::Body(Body { value: 3 })));

        let missing: Fetched<Body> =
            get_json(&client, "test", &format!("{}/missing", server.url()))
                .await
                .unwrap();
        assert!(matches!(missing, Fetched::NotFound));

        let broken = get_json::<Body>(&client, "test", &format!("{}/broken", server.url())).await;
        assert!(matches!(broken, Err(LocatorError::Provider { .. })));
    }
}
