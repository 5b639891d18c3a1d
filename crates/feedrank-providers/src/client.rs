//! HTTP plumbing shared by the feed adapters.

use anyhow::Context;
use std::time::Duration;

use crate::retry::{classify_status, classify_transport_error, RetryDisposition, RetryPolicy};
use crate::ProviderError;

/// Builds the per-provider HTTP client with its request timeout.
pub(crate) fn build_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .gzip(true)
        .timeout(timeout)
        .build()
        .context("building provider http client")
}

/// GETs `url`, retrying on network errors and 5xx responses per `retry`.
/// Returns the response body on the first 2xx. 4xx responses are terminal.
pub(crate) async fn get_with_retry(
    client: &reqwest::Client,
    url: &str,
    accept: Option<&str>,
    retry: &RetryPolicy,
) -> Result<Vec<u8>, ProviderError> {
    let max_attempts = retry.max_attempts.max(1);

    let mut attempt = 0;
    loop {
        attempt += 1;

        let mut request = client.get(url);
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }

        let outcome = match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .bytes()
                        .await
                        .map(|body| body.to_vec())
                        .map_err(|source| ProviderError::Request {
                            attempts: attempt,
                            source,
                        });
                }
                let terminal = ProviderError::Status {
                    status: status.as_u16(),
                    url: response.url().to_string(),
                };
                (classify_status(status), terminal)
            }
            Err(source) => {
                let disposition = classify_transport_error(&source);
                (
                    disposition,
                    ProviderError::Request {
                        attempts: attempt,
                        source,
                    },
                )
            }
        };

        match outcome {
            (RetryDisposition::Retryable, err) if attempt < max_attempts => {
                tracing::debug!(url, attempt, error = %err, "retrying provider request");
                tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
            }
            (_, err) => return Err(err),
        }
    }
}
