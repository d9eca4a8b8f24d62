use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, COOKIE, RANGE, USER_AGENT};

use crate::error::ArchiveError;

/// User-Agent sent when the caller asks for browser impersonation. Some
/// hosts refuse HEAD or range requests from non-browser clients.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/122 Safari/537.36";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one job, carrying the caller's authentication hints.
///
/// All requests of a job share the same underlying connection pool so the
/// many small ranged GETs of an extraction reuse connections. Redirects are
/// followed (reqwest default policy).
pub struct RemoteClient {
    http: reqwest::Client,
    cookie: Option<String>,
    impersonate_ua: bool,
}

impl RemoteClient {
    pub fn new(cookie: Option<String>, impersonate_ua: bool) -> Result<Self, ArchiveError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(RemoteClient {
            http,
            cookie,
            impersonate_ua,
        })
    }

    fn apply_headers(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.impersonate_ua {
            req = req.header(USER_AGENT, BROWSER_USER_AGENT);
        }
        if let Some(cookie) = self.cookie.as_deref().filter(|c| !c.is_empty()) {
            req = req.header(COOKIE, cookie);
        }
        req
    }

    /// Discover the total size of the object behind `url` with a HEAD request.
    pub async fn content_length(&self, url: &str) -> Result<u64, ArchiveError> {
        let resp = self.apply_headers(self.http.head(url)).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(ArchiveError::UpstreamStatus(resp.status().as_u16()));
        }

        resp.headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&n| n > 0)
            .ok_or(ArchiveError::MissingContentLength)
    }

    /// Fetch the inclusive byte range `[start, end_inclusive]` of `url`.
    ///
    /// Servers that ignore the Range header answer 200 with the whole body;
    /// the requested slice is cut out of it. A 206 body is trusted to begin
    /// at `start` and is clipped to the requested length. Short responses
    /// are returned as-is; callers validate the exact lengths they need.
    pub async fn get_range(
        &self,
        url: &str,
        start: u64,
        end_inclusive: u64,
    ) -> Result<Bytes, ArchiveError> {
        let resp = self
            .apply_headers(self.http.get(url))
            .header(RANGE, format!("bytes={start}-{end_inclusive}"))
            .send()
            .await?;

        let status = resp.status();
        let wanted = (end_inclusive - start + 1) as usize;
        match status {
            StatusCode::PARTIAL_CONTENT => {
                let mut body = resp.bytes().await?;
                if body.len() > wanted {
                    body.truncate(wanted);
                }
                Ok(body)
            }
            StatusCode::OK => {
                let body = resp.bytes().await?;
                let lo = (start as usize).min(body.len());
                let hi = (lo + wanted).min(body.len());
                Ok(body.slice(lo..hi))
            }
            _ => Err(ArchiveError::UpstreamStatus(status.as_u16())),
        }
    }
}
