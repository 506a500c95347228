//! S3 `ListObjectsV2` over plain HTTP.
//!
//! Implements [`ObjectLister`] against any S3-compatible endpoint with
//! path-style addressing (`<endpoint>/<bucket>?list-type=2&...`). Requests are
//! unsigned: the hazard output bucket is publicly listable, and credentials
//! are not handled by this tool.
//!
//! The response body is XML; only `CommonPrefixes/Prefix`, `IsTruncated` and
//! `NextContinuationToken` are read.

use std::time::Duration;

use async_trait::async_trait;
use hazout_core::store::{ListPage, ListRequest, ObjectLister};
use hazout_core::StoreError;
use regex::Regex;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct S3Client {
    http: reqwest::Client,
    endpoint: String,
    parser: ListResultParser,
}

impl S3Client {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, StoreError> {
        let endpoint = endpoint.into();
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                e
            })?;
        let parser = ListResultParser::new()?;
        tracing::info!(endpoint = %endpoint, "Initialized S3 client");
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            parser,
        })
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("{}/{}", self.endpoint, bucket)
    }
}

#[async_trait]
impl ObjectLister for S3Client {
    async fn list_objects_v2(&self, request: &ListRequest) -> Result<ListPage, StoreError> {
        let url = self.bucket_url(&request.bucket);
        let mut query: Vec<(&str, &str)> = vec![
            ("list-type", "2"),
            ("delimiter", request.delimiter.as_str()),
        ];
        if let Some(token) = &request.continuation_token {
            query.push(("continuation-token", token.as_str()));
        }
        tracing::debug!(url = %url, delimiter = %request.delimiter, "[S3] ListObjectsV2");

        let resp = self.http.get(&url).query(&query).send().await.map_err(|e| {
            tracing::error!(error = ?e, url = %url, "[S3] ListObjectsV2 request failed");
            e
        })?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let code = self
                .parser
                .error_code(&body)
                .unwrap_or_else(|| "UnknownError".into());
            tracing::error!(status = %status, code = %code, url = %url, "[S3] ListObjectsV2 returned error");
            return Err(format!(
                "ListObjectsV2 on bucket {} failed with HTTP {}: {}",
                request.bucket, status, code
            )
            .into());
        }
        self.parser.parse(&body)
    }
}

/// Compiled patterns for the parts of a `ListObjectsV2` response we read.
pub struct ListResultParser {
    list_result: Regex,
    common_prefix: Regex,
    truncated: Regex,
    next_token: Regex,
    error_code: Regex,
}

impl ListResultParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            list_result: Regex::new(r"<ListBucketResult[\s>]")?,
            common_prefix: Regex::new(
                r"(?s)<CommonPrefixes>\s*<Prefix>(.*?)</Prefix>\s*</CommonPrefixes>",
            )?,
            truncated: Regex::new(r"<IsTruncated>\s*(true|false)\s*</IsTruncated>")?,
            next_token: Regex::new(r"(?s)<NextContinuationToken>(.*?)</NextContinuationToken>")?,
            error_code: Regex::new(r"(?s)<Code>(.*?)</Code>")?,
        })
    }

    /// Extracts a [`ListPage`] from a `ListBucketResult` document.
    pub fn parse(&self, xml: &str) -> Result<ListPage, StoreError> {
        if !self.list_result.is_match(xml) {
            return Err("response is not a ListBucketResult document".into());
        }
        let common_prefixes = self
            .common_prefix
            .captures_iter(xml)
            .filter_map(|c| c.get(1))
            .map(|m| element_text(m.as_str()))
            .collect();
        let is_truncated = capture(&self.truncated, xml).as_deref() == Some("true");
        let next_continuation_token = capture(&self.next_token, xml).filter(|t| !t.is_empty());

        Ok(ListPage {
            common_prefixes,
            is_truncated,
            next_continuation_token,
        })
    }

    /// The `<Code>` of an S3 error document.
    pub fn error_code(&self, xml: &str) -> Option<String> {
        capture(&self.error_code, xml)
    }
}

fn capture(re: &Regex, body: &str) -> Option<String> {
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| element_text(m.as_str()))
}

/// Character data of an element: CDATA sections verbatim, the rest unescaped.
fn element_text(raw: &str) -> String {
    const OPEN: &str = "<![CDATA[";
    const CLOSE: &str = "]]>";

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&unescape(&rest[..start]));
        let body = &rest[start + OPEN.len()..];
        match body.find(CLOSE) {
            Some(end) => {
                out.push_str(&body[..end]);
                rest = &body[end + CLOSE.len()..];
            }
            None => {
                out.push_str(body);
                return out;
            }
        }
    }
    out.push_str(&unescape(rest));
    out
}

/// Decodes the five predefined XML entities and numeric character references.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..=semi]),
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    out
}
