//! Request building and response parsing for the readings resource.
//!
//! # Design
//! `ReadingRequests` is bound to one resolved URL prefix and carries no other
//! state. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`, so
//! the whole mapping between queries, paths and typed results can be checked
//! without a network.

use std::borrow::Cow;

use tracing::{debug, warn};

use crate::error::ClientError;
use crate::http::{HttpRequest, HttpResponse};
use crate::model::Reading;

/// The list queries supported by the readings resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingQuery<'a> {
    All,
    Device {
        device_id: &'a str,
        limit: u32,
    },
    NameAndDevice {
        name: &'a str,
        device_id: &'a str,
        limit: u32,
    },
    Name {
        name: &'a str,
        limit: u32,
    },
    UomLabel {
        uom_label: &'a str,
        limit: u32,
    },
    Label {
        label: &'a str,
        limit: u32,
    },
    Type {
        reading_type: &'a str,
        limit: u32,
    },
    /// Readings created between `start` and `end`, epoch milliseconds.
    Interval {
        start: i64,
        end: i64,
        limit: u32,
    },
}

impl ReadingQuery<'_> {
    /// Path of the query relative to the resource prefix. Free-text
    /// parameters are percent-encoded.
    pub fn path(&self) -> String {
        match *self {
            ReadingQuery::All => String::new(),
            ReadingQuery::Device { device_id, limit } => {
                format!("/device/{}/{limit}", segment(device_id))
            }
            ReadingQuery::NameAndDevice {
                name,
                device_id,
                limit,
            } => format!(
                "/name/{}/device/{}/{limit}",
                segment(name),
                segment(device_id)
            ),
            ReadingQuery::Name { name, limit } => format!("/name/{}/{limit}", segment(name)),
            ReadingQuery::UomLabel { uom_label, limit } => {
                format!("/uomlabel/{}/{limit}", segment(uom_label))
            }
            ReadingQuery::Label { label, limit } => format!("/label/{}/{limit}", segment(label)),
            ReadingQuery::Type {
                reading_type,
                limit,
            } => format!("/type/{}/{limit}", segment(reading_type)),
            ReadingQuery::Interval { start, end, limit } => format!("/{start}/{end}/{limit}"),
        }
    }
}

/// Percent-encode one path segment. Only RFC 3986 unreserved characters are
/// left as-is, so `/` and spaces cannot change the shape of the path.
pub fn segment(raw: &str) -> Cow<'_, str> {
    urlencoding::encode(raw)
}

/// Builds requests against, and parses responses from, one resource prefix.
#[derive(Debug, Clone)]
pub struct ReadingRequests {
    prefix: String,
}

impl ReadingRequests {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn build_list(&self, query: &ReadingQuery<'_>) -> HttpRequest {
        HttpRequest::get(format!("{}{}", self.prefix, query.path()))
    }

    pub fn build_count(&self) -> HttpRequest {
        HttpRequest::get(format!("{}/count", self.prefix))
    }

    pub fn build_get(&self, id: &str) -> HttpRequest {
        HttpRequest::get(format!("{}/{}", self.prefix, segment(id)))
    }

    pub fn build_add(&self, reading: &Reading) -> Result<HttpRequest, ClientError> {
        let body =
            serde_json::to_string(reading).map_err(|e| ClientError::Serialization(e.to_string()))?;
        Ok(HttpRequest::post_json(self.prefix.clone(), body))
    }

    pub fn build_delete(&self, id: &str) -> HttpRequest {
        HttpRequest::delete(format!("{}/id/{}", self.prefix, segment(id)))
    }

    /// An empty or `null` body is an empty list.
    pub fn parse_list(&self, response: HttpResponse) -> Result<Vec<Reading>, ClientError> {
        check_status(&response)?;
        let body = response.body.trim();
        if body.is_empty() {
            return Ok(Vec::new());
        }
        let readings: Option<Vec<Reading>> = serde_json::from_str(body)
            .map_err(|e| ClientError::Deserialization(e.to_string()))?;
        Ok(readings.unwrap_or_default())
    }

    pub fn parse_reading(&self, response: HttpResponse) -> Result<Reading, ClientError> {
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| ClientError::Deserialization(e.to_string()))
    }

    /// The count endpoint answers with a bare decimal integer.
    pub fn parse_count(&self, response: HttpResponse) -> Result<u64, ClientError> {
        check_status(&response)?;
        let body = response.body.trim();
        body.parse()
            .map_err(|e| ClientError::Deserialization(format!("invalid count `{body}`: {e}")))
    }

    /// The add endpoint answers with the new id as plain text, which is
    /// returned byte for byte. A body that is exactly one JSON string literal
    /// is unwrapped instead; nothing is trimmed.
    pub fn parse_add(&self, response: HttpResponse) -> Result<String, ClientError> {
        check_status(&response)?;
        let body = response.body;
        if body.starts_with('"') && body.ends_with('"') {
            if let Ok(id) = serde_json::from_str::<String>(&body) {
                return Ok(id);
            }
        }
        Ok(body)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<(), ClientError> {
        check_status(&response)
    }
}

/// Map non-2xx status codes to the matching `ClientError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ClientError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 404 {
        debug!("service answered 404");
        return Err(ClientError::NotFound {
            body: response.body.clone(),
        });
    }
    warn!(status = response.status, body = %response.body, "service answered with an error");
    Err(ClientError::HttpStatus {
        status: response.status,
        body: response.body.clone(),
    })
}
