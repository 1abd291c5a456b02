//! HTTP request type and the dispatch state it carries.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RouterError;

/// HTTP request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    /// CONNECT method
    Connect,
    /// DELETE method
    Delete,
    /// GET method
    Get,
    /// HEAD method
    Head,
    /// OPTIONS method
    Options,
    /// PATCH method
    Patch,
    /// POST method
    Post,
    /// PUT method
    Put,
    /// TRACE method
    Trace,
}

impl Method {
    /// Returns the method as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Trace => "TRACE",
        }
    }
}

impl FromStr for Method {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CONNECT" => Ok(Self::Connect),
            "DELETE" => Ok(Self::Delete),
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH" => Ok(Self::Patch),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "TRACE" => Ok(Self::Trace),
            _ => Err(RouterError::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path parameters captured from the URL.
///
/// Named captures keep declaration order. Unnamed regex groups and bare
/// wildcards are positional; an optional group that did not participate in
/// the match leaves a `None` slot so later indices stay stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    named: Vec<(String, String)>,
    positional: Vec<Option<String>>,
}

impl PathParams {
    /// Creates new empty path params.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a named parameter, replacing the value in place if the name
    /// already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.named.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.named.push((key, value)),
        }
    }

    /// Removes a named parameter.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.named.iter().position(|(k, _)| k == key)?;
        Some(self.named.remove(pos).1)
    }

    /// Appends a positional capture.
    pub fn push_positional(&mut self, value: Option<String>) {
        self.positional.push(value);
    }

    /// Gets a parameter value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.named
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Gets a positional capture by index.
    #[must_use]
    pub fn index(&self, i: usize) -> Option<&str> {
        self.positional.get(i)?.as_deref()
    }

    /// Gets a parameter value or returns an error.
    pub fn require(&self, key: &str) -> Result<&str, RouterError> {
        self.get(key)
            .ok_or_else(|| RouterError::status(400, format!("missing path parameter: {key}")))
    }

    /// Parses a parameter as a specific type.
    #[must_use]
    pub fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Returns an iterator over the named parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.named.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of positional slots.
    #[must_use]
    pub fn positional_len(&self) -> usize {
        self.positional.len()
    }

    /// Returns `true` when there are neither named nor positional captures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.positional.is_empty()
    }

    /// Overlays `self` on top of `parent`.
    ///
    /// Named values from `self` win; positional captures of `self` are
    /// renumbered to follow the parent's.
    #[must_use]
    pub fn merged_onto(self, parent: &Self) -> Self {
        let mut merged = parent.clone();
        for (k, v) in self.named {
            merged.insert(k, v);
        }
        merged.positional.extend(self.positional);
        merged
    }
}

/// An HTTP request.
///
/// Besides the usual request data it carries the dispatch state that the
/// router mutates while the request travels through nested routers: `url`
/// is rewritten as mount prefixes are stripped, `base_url` accumulates the
/// stripped prefixes, and `params` is swapped per matched layer.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Current URL, relative to the router currently dispatching.
    pub url: String,
    /// URL as received. Never rewritten by the router.
    pub original_url: String,
    /// Prefix consumed by the routers the request has been mounted through.
    pub base_url: String,
    /// Path parameters of the layer currently running.
    pub params: PathParams,
    /// Path of the route currently dispatching, if any.
    pub route: Option<String>,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Vec<u8>,
}

impl Request {
    /// Creates a new request.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            method,
            original_url: url.clone(),
            url,
            base_url: String::new(),
            params: PathParams::new(),
            route: None,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Creates a PUT request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    /// Creates a DELETE request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Creates a HEAD request.
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::Head, url)
    }

    /// Creates an OPTIONS request.
    pub fn options(url: impl Into<String>) -> Self {
        Self::new(Method::Options, url)
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Gets a header value.
    #[must_use]
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the pathname of the current URL.
    ///
    /// The query string and any `scheme://host` prefix are left out.
    #[must_use]
    pub fn path(&self) -> &str {
        pathname(&self.url, protohost(&self.url).len())
    }

    /// Returns the body as a string.
    #[must_use]
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }
}

/// Returns the `scheme://host` prefix of an absolute-form URL, or `""`.
pub(crate) fn protohost(url: &str) -> &str {
    if url.is_empty() || url.starts_with('/') {
        return "";
    }
    let path_len = url.find('?').unwrap_or(url.len());
    let Some(fqdn) = url[..path_len].find("://") else {
        return "";
    };
    match url[fqdn + 3..].find('/') {
        Some(slash) => &url[..fqdn + 3 + slash],
        None => &url[..path_len],
    }
}

/// Returns the pathname of `url` once `skip` leading bytes are dropped.
pub(crate) fn pathname(url: &str, skip: usize) -> &str {
    let rest = url.get(skip..).unwrap_or("");
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    match &rest[..end] {
        "" => "/",
        path => path,
    }
}
