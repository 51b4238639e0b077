//! HTTP transport collaborator.
//!
//! The engine only needs a request/response round trip; retries, TLS and connection handling
//! belong to the [`HttpClient`] implementation.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Method, StatusCode};

use crate::{api::Problem, error::*};

const JOSE_JSON: &str = "application/jose+json";
const PROBLEM_JSON: &str = "application/problem+json";

/// A request issued by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,

    /// Serialized JWS for signed requests.
    pub body: Option<String>,
}

impl HttpRequest {
    pub(crate) fn get(url: &str) -> Self {
        HttpRequest {
            method: Method::GET,
            url: url.to_owned(),
            body: None,
        }
    }

    pub(crate) fn head(url: &str) -> Self {
        HttpRequest {
            method: Method::HEAD,
            url: url.to_owned(),
            body: None,
        }
    }

    pub(crate) fn post(url: &str, body: String) -> Self {
        HttpRequest {
            method: Method::POST,
            url: url.to_owned(),
            body: Some(body),
        }
    }
}

/// A response as seen by the engine.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns a header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn content_type(&self) -> Option<&str> {
        self.header("content-type")
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }
}

/// Capability to perform one HTTP round trip.
///
/// Implementations report network failures as [`Error::Transport`]; any response the server
/// produced, including 4xx and 5xx, is returned as `Ok`.
#[async_trait]
pub trait HttpClient: fmt::Debug + Send + Sync {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse>;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Client with 30 second connect and request timeouts.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }

    /// Uses a caller configured `reqwest` client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        log::trace!("{} {}", req.method, req.url);

        let mut builder = self.client.request(req.method, &req.url);

        if let Some(body) = req.body {
            builder = builder.header("content-type", JOSE_JSON).body(body);
        }

        let res = builder.send().await?;
        let status = res.status();
        let headers = res.headers().clone();

        // letsencrypt sometimes closes the TLS abruptly causing io error
        // even though we did capture the body.
        let body = res.bytes().await.map(|b| b.to_vec()).unwrap_or_default();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Turns non-2xx responses into errors.
///
/// `badNonce` problems map to [`Error::BadNonce`] so the signed request path can retry them.
pub(crate) fn req_handle_error(res: HttpResponse) -> Result<HttpResponse> {
    // ok responses pass through
    if res.status.is_success() {
        return Ok(res);
    }

    let body = String::from_utf8_lossy(&res.body);

    let problem = if res.content_type() == Some(PROBLEM_JSON) {
        // if we were sent a problem+json, deserialize it
        serde_json::from_str(&body).unwrap_or_else(|err| Problem {
            _type: "problemJsonFail".to_owned(),
            detail: Some(format!(
                "Failed to deserialize application/problem+json ({err}) body: {body}"
            )),
            status: Some(res.status.as_u16()),
            subproblems: None,
        })
    } else {
        // some other problem
        Problem {
            _type: "httpReqError".to_owned(),
            detail: Some(format!("{} body: {body}", res.status)),
            status: Some(res.status.as_u16()),
            subproblems: None,
        }
    };

    if problem.is_bad_nonce() {
        Err(Error::BadNonce(problem))
    } else {
        Err(Error::Protocol(problem))
    }
}

pub(crate) fn req_expect_header(res: &HttpResponse, name: &str) -> Result<String> {
    res.header(name)
        .map(ToOwned::to_owned)
        .ok_or_else(|| Error::UnexpectedResponse(format!("missing header: {name}")))
}

/// Parses a `Retry-After` header given either as delta-seconds or as an HTTP-date.
pub(crate) fn retry_after(res: &HttpResponse) -> Option<Duration> {
    let value = res.header("retry-after")?.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let format = time::format_description::well_known::Rfc2822;
    let at = time::OffsetDateTime::parse(value, &format).ok()?;
    let delta = at - time::OffsetDateTime::now_utc();

    Some(delta.try_into().unwrap_or(Duration::ZERO))
}
