// ABOUTME: Timeout-bounded JSON helpers shared by the network-backed providers.
// ABOUTME: Distinguishes deadline expiry from non-2xx responses; no timer state survives a call.

use std::time::Duration;

use serde_json::Value;

use crate::error::ProviderError;

/// POST a JSON body and parse the JSON response, bounded by a hard deadline.
///
/// The deadline is enforced independently of any timeout configured on the
/// client: when it expires the request future is dropped, which aborts the
/// in-flight call. Nothing is left pending between invocations, so the
/// router can issue these at high rate without leaking handles.
///
/// Credentials go in `headers`, never in the URL: transport errors carry the
/// URL in their `Display` and end up in logs.
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, &str)],
    body: &Value,
    deadline: Duration,
) -> Result<Value, ProviderError> {
    let mut request = client.post(url).json(body);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    bounded(deadline, async {
        let resp = request
            .send()
            .await
            .map_err(|e| map_transport(e, deadline))?;
        decode(resp, deadline).await
    })
    .await
}

/// GET a JSON document, bounded by a hard deadline.
pub async fn get_json(
    client: &reqwest::Client,
    url: &str,
    deadline: Duration,
) -> Result<Value, ProviderError> {
    bounded(deadline, async {
        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|e| map_transport(e, deadline))?;
        decode(resp, deadline).await
    })
    .await
}

async fn bounded<F>(deadline: Duration, fut: F) -> Result<Value, ProviderError>
where
    F: std::future::Future<Output = Result<Value, ProviderError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(deadline)),
    }
}

async fn decode(resp: reqwest::Response, deadline: Duration) -> Result<Value, ProviderError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ProviderError::Http {
            status: status.as_u16(),
        });
    }
    resp.json::<Value>()
        .await
        .map_err(|e| map_transport(e, deadline))
}

fn map_transport(e: reqwest::Error, deadline: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(deadline)
    } else {
        ProviderError::Api(e.to_string())
    }
}
