use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use once_cell::sync::{Lazy, OnceCell};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::logging::Logger;

/// A singleton instance of the reqwest client.
static CLIENT: OnceCell<Client> = OnceCell::new();

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// Returns the reqwest client singleton instance or creates one if it doesn't exist.
///
/// # Returns
///
/// * Result<&'static Client>: A reference to the reqwest client instance,
///   or an error if the client cannot be created.
fn get_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            // ===== 壓縮 =====
            .gzip(true)
            // ===== 超時設置 =====
            .connect_timeout(Duration::from_secs(8))
            .timeout(Duration::from_secs(15))
            // ===== TCP 優化 =====
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            // ===== 連接池 =====
            .pool_idle_timeout(Duration::from_secs(90))
            // ===== 重定向 =====
            // Google Apps Script 的 exec 網址會先轉址一次
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
    })
}

/// Performs an HTTP GET request with query parameters and deserializes the JSON
/// response into the specified type.
///
/// The body is parsed regardless of the status code, since quote APIs report
/// their own errors inside the JSON envelope.
pub async fn get_json<RES, Q>(
    url: &str,
    headers: Option<header::HeaderMap>,
    query: &Q,
) -> Result<RES>
where
    RES: DeserializeOwned,
    Q: Serialize + ?Sized,
{
    let res_body = send(Method::GET, url, headers, Some(|rb: RequestBuilder| rb.query(query)))
        .await?
        .text()
        .await
        .map_err(|e| anyhow!("Error reading response body: {:?}", e))?;

    serde_json::from_str(&res_body)
        .map_err(|e| anyhow!("Error parsing response JSON({}): {:?}", &res_body, e))
}

/// Performs an HTTP GET request with query parameters and returns the response
/// as text. A non-success status is an error.
pub async fn get<Q>(url: &str, headers: Option<header::HeaderMap>, query: &Q) -> Result<String>
where
    Q: Serialize + ?Sized,
{
    let response = send(Method::GET, url, headers, Some(|rb: RequestBuilder| rb.query(query)))
        .await?
        .error_for_status()
        .map_err(|e| anyhow!("Unexpected response status: {:?}", e))?;

    response
        .text()
        .await
        .map_err(|e| anyhow!("Error parsing response text: {:?}", e))
}

/// Performs an HTTP POST request with JSON request and response, and specified headers.
///
/// # Type Parameters
///
/// * `REQ`: The request type to serialize as JSON. It must implement `Serialize`.
/// * `RES`: The response type to deserialize from JSON. It must implement `DeserializeOwned`.
///
/// # Arguments
///
/// * `url`: The URL to send the POST request to.
/// * `headers`: An optional set of headers to include with the request.
/// * `req`: An optional reference to the request object to be serialized as JSON.
pub async fn post_use_json<REQ, RES>(
    url: &str,
    headers: Option<header::HeaderMap>,
    req: Option<&REQ>,
) -> Result<RES>
where
    REQ: Serialize,
    RES: DeserializeOwned,
{
    let res = send(
        Method::POST,
        url,
        headers,
        Some(|rb: RequestBuilder| {
            if let Some(r) = req {
                rb.json(r)
            } else {
                rb
            }
        }),
    )
    .await?;

    let status = res.status();
    let res_body = res
        .text()
        .await
        .map_err(|e| anyhow!("Error reading response body: {}", e))?;

    if !status.is_success() {
        return Err(anyhow!("POST {} returned {}: {}", url, status, res_body));
    }

    serde_json::from_str(&res_body)
        .map_err(|e| anyhow!("Error parsing response JSON({}): {:?}", &res_body, e))
}

/// Sends a single HTTP request. There is no retry: a connect error, timeout or
/// redirect loop is returned to the caller as is.
async fn send(
    method: Method,
    url: &str,
    headers: Option<header::HeaderMap>,
    body: Option<impl FnOnce(RequestBuilder) -> RequestBuilder>,
) -> Result<Response> {
    let visit_log = format!("{method}:{url}");
    let client = get_client()?;
    let mut rb = client.request(method, url);

    if let Some(h) = headers {
        rb = rb.headers(h);
    }

    if let Some(body_fn) = body {
        rb = body_fn(rb);
    }

    let start = Instant::now();
    let res = rb.send().await;
    let elapsed = start.elapsed().as_millis();

    match res {
        Ok(response) => {
            LOGGER.info(format!("{} {} {} ms", visit_log, response.status(), elapsed));
            Ok(response)
        }
        Err(why) => {
            LOGGER.error(format!("{} failed because {:?}. {} ms", visit_log, why, elapsed));
            Err(anyhow!("Failed to send request to {} because {:?}", url, why))
        }
    }
}
