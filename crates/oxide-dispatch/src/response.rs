//! HTTP response sink.

use std::collections::HashMap;

/// An HTTP response being built by handlers.
///
/// Handlers receive it by mutable reference. Once a body is sent the
/// response reports [`Response::is_sent`], which the router consults before
/// writing automatic responses.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
    /// Scratch values shared between handlers of one request.
    pub locals: serde_json::Map<String, serde_json::Value>,
    sent: bool,
}

impl Response {
    /// Creates an unsent 200 response.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
            locals: serde_json::Map::new(),
            sent: false,
        }
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    /// Sets a header, replacing any value stored under the same name
    /// regardless of case.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&key));
        self.headers.insert(key, value.into());
        self
    }

    /// Gets a header value.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Sends a raw body and marks the response as sent.
    pub fn send(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
        self.sent = true;
    }

    /// Sends a plain text body.
    pub fn send_text(&mut self, body: impl Into<String>) {
        if self.header("Content-Type").is_none() {
            self.set_header("Content-Type", "text/plain; charset=utf-8");
        }
        self.send(body.into().into_bytes());
    }

    /// Sends a JSON body.
    pub fn json<T: serde::Serialize>(&mut self, data: &T) -> Result<(), serde_json::Error> {
        let body = serde_json::to_vec(data)?;
        self.set_header("Content-Type", "application/json");
        self.send(body);
        Ok(())
    }

    /// Ends the response without a body.
    pub fn end(&mut self) {
        self.sent = true;
    }

    /// Returns whether the response has been sent.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Returns the body as a string.
    #[must_use]
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    /// Returns the status text for the current status code.
    #[must_use]
    pub fn status_text(&self) -> &'static str {
        status_text(self.status)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text() {
        let mut res = Response::new();
        assert!(!res.is_sent());
        res.send_text("hello");
        assert!(res.is_sent());
        assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(res.body_string(), Some("hello".to_string()));
    }

    #[test]
    fn test_response_json() {
        let mut res = Response::new();
        res.json(&serde_json::json!({"name": "test"})).unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(res.header("Content-Type"), Some("application/json"));
        assert_eq!(res.body_string(), Some(r#"{"name":"test"}"#.to_string()));
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut res = Response::new();
        res.set_header("allow", "GET").set_header("Allow", "PUT");
        assert_eq!(res.headers.len(), 1);
        assert_eq!(res.header("ALLOW"), Some("PUT"));
    }

    #[test]
    fn test_status_text() {
        let mut res = Response::new();
        res.set_status(404);
        assert_eq!(res.status_text(), "Not Found");
    }
}
