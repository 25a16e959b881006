//! Image transform options accepted on the CDN path.
//!
//! Options are validated and echoed back; the bytes are served as stored.

use serde::Deserialize;
use std::fmt;

use crate::error::{GatewayError, GatewayResult, ValidationRule};

const MAX_DIMENSION: u32 = 4096;
const FORMATS: [&str; 5] = ["auto", "webp", "avif", "jpeg", "png"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageTransform {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u8>,
    pub format: Option<String>,
}

impl ImageTransform {
    /// Parse and validate the query string of a CDN request.
    pub fn from_query(query: Option<&str>) -> GatewayResult<Self> {
        let transform: Self = parse_query(query.unwrap_or_default())?;
        transform.validate()?;
        Ok(transform)
    }

    fn validate(&self) -> GatewayResult<()> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if let Some(v) = value {
                if !(1..=MAX_DIMENSION).contains(&v) {
                    return Err(invalid(format!("{name} must be within 1..={MAX_DIMENSION}")));
                }
            }
        }
        if let Some(q) = self.quality {
            if !(1..=100).contains(&q) {
                return Err(invalid("quality must be within 1..=100".to_string()));
            }
        }
        if let Some(format) = &self.format {
            if !FORMATS.contains(&format.as_str()) {
                return Err(invalid(format!(
                    "format must be one of {}",
                    FORMATS.join(", ")
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl fmt::Display for ImageTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(w) = self.width {
            parts.push(format!("width={w}"));
        }
        if let Some(h) = self.height {
            parts.push(format!("height={h}"));
        }
        if let Some(q) = self.quality {
            parts.push(format!("quality={q}"));
        }
        if let Some(format) = &self.format {
            parts.push(format!("format={format}"));
        }
        write!(f, "{}", parts.join(","))
    }
}

fn invalid(message: String) -> GatewayError {
    GatewayError::validation(ValidationRule::InvalidTransform, message)
}

/// Decode `query` through axum's query extractor, keeping its message.
fn parse_query(query: &str) -> GatewayResult<ImageTransform> {
    let uri: axum::http::Uri = format!("/?{query}")
        .parse()
        .map_err(|_| invalid("malformed query string".to_string()))?;
    axum::extract::Query::<ImageTransform>::try_from_uri(&uri)
        .map(|axum::extract::Query(t)| t)
        .map_err(|e| invalid(e.body_text()))
}
