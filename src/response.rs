use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
};
use std::collections::BTreeMap;

pub const LOCATION: &str = "Location";

/// Successful routing outcome, serialised by the request boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterResponse {
    pub status_code: StatusCode,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

impl RouterResponse {
    pub fn new(status_code: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).map(String::as_str)
    }
}

/// Retrieval URL for a message: `<endpoint_base>/m/<version>`
pub fn message_location(endpoint_base: &str, version: &str) -> String {
    format!("{}/m/{}", endpoint_base.trim_end_matches('/'), version)
}

impl IntoResponse for RouterResponse {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status_code, self.body).into_response();

        for (name, value) in &self.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => {
                    tracing::warn!(header = %name, "Dropping unrepresentable response header");
                }
            }
        }

        response
    }
}
