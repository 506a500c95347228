//! Response envelopes returned by the results catalog.
//!
//! Success: `{"status": "SUCCESS", "date": ..., "result": {...}}`.
//! Failure: `{"status": "ERROR", "message": ..., "date": ...}`.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, FixedOffset, Local};
use serde::Serialize;

use crate::group::HazardRun;

/// Format of the `date` field.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Upper bound on the length of an error message, in characters.
pub const MAX_MESSAGE_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Error,
}

/// A key left out of the catalog in skip mode, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedKey {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub skipped_keys: Vec<SkippedKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResult {
    pub users: BTreeSet<String>,
    pub hazard_results: Vec<HazardRun>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CatalogResult>,
}

impl Response {
    pub fn success(result: CatalogResult, generated: DateTime<FixedOffset>) -> Self {
        Response {
            status: Status::Success,
            message: None,
            date: format_date(generated),
            result: Some(result),
        }
    }

    /// Error envelope carrying the bounded display text of `error`.
    pub fn error(error: &dyn fmt::Display, generated: DateTime<FixedOffset>) -> Self {
        Response {
            status: Status::Error,
            message: Some(bounded_message(&error.to_string())),
            date: format_date(generated),
            result: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Current local time, as stamped on generated responses.
pub fn now() -> DateTime<FixedOffset> {
    Local::now().into()
}

pub fn format_date(date: DateTime<FixedOffset>) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn bounded_message(message: &str) -> String {
    message.chars().take(MAX_MESSAGE_LEN).collect()
}
