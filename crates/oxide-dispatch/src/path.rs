//! Path pattern matching.
//!
//! Patterns are compiled once into an anchored [`Regex`]. Pattern syntax:
//!
//! - `/users` - literal text
//! - `/users/:id` - one segment captured under `id`
//! - `/users/:id?` - optional segment
//! - `/files/:path+` / `/files/:path*` - one-or-more / zero-or-more segments
//! - `/users/:id(\d+)` - capture with a custom expression
//! - `/page/(\d+)` - unnamed group, captured positionally; groups nested
//!   inside it are captured positionally too
//! - `/(?:a|b)` - non-capturing group
//! - `/ab?cd`, `/ab+cd` - `?` and `+` quantify the preceding character
//! - `*` - anything, captured positionally
//! - `\(` - a backslash escapes the next character

use std::borrow::Cow;
use std::iter::Peekable;
use std::str::CharIndices;

use regex::Regex;

use crate::error::{Result, RouterError};
use crate::request::PathParams;

const DEFAULT_SEGMENT: &str = "[^/]+?";
const PREFIX_GROUP: &str = "matched";

/// How a pattern is compiled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternOptions {
    /// Match letters case-sensitively.
    pub case_sensitive: bool,
    /// Do not tolerate a trailing slash the pattern does not have.
    pub strict: bool,
    /// Match a leading portion of the path instead of the whole path.
    pub prefix: bool,
}

/// A capture key, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKey {
    /// A `:name` capture.
    Named(String),
    /// An unnamed group or bare wildcard, numbered from zero.
    Positional(usize),
}

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// Length of the matched portion of the path. Prefix patterns that only
    /// ever match `/` report zero.
    pub len: usize,
    /// Decoded captures.
    pub params: PathParams,
}

/// A compiled path pattern for matching URLs.
#[derive(Debug, Clone)]
pub struct PathPattern {
    /// The original pattern string.
    pattern: String,
    options: PatternOptions,
    regex: Regex,
    keys: Vec<PathKey>,
    /// Regex group name for each key.
    groups: Vec<String>,
    /// Prefix pattern `/`: every path matches without consuming anything.
    fast_slash: bool,
}

impl PathPattern {
    /// Compiles a pattern.
    ///
    /// # Example
    ///
    /// ```
    /// use oxide_dispatch::{PathPattern, PatternOptions};
    ///
    /// let pattern = PathPattern::new("/posts/:id/comments/:comment_id", PatternOptions::default()).unwrap();
    /// let m = pattern.match_path("/posts/123/comments/456").unwrap().unwrap();
    /// assert_eq!(m.params.get("id"), Some("123"));
    /// assert_eq!(m.params.get("comment_id"), Some("456"));
    /// ```
    pub fn new(pattern: &str, options: PatternOptions) -> Result<Self> {
        let compiled = Compiler::new(pattern).compile()?;

        let flags = if options.case_sensitive { "" } else { "(?i)" };
        let mut body = compiled.body;
        if !options.strict {
            body.push_str(if compiled.ends_with_slash { "?" } else { "/?" });
        }
        let source = if options.prefix {
            let boundary = if options.strict && compiled.ends_with_slash {
                ""
            } else {
                "(?:/|$)"
            };
            format!("{flags}^(?P<{PREFIX_GROUP}>{body}){boundary}")
        } else {
            format!("{flags}^{body}$")
        };

        let regex = Regex::new(&source).map_err(|e| RouterError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let groups = (0..compiled.keys.len()).map(|i| format!("p{i}")).collect();

        Ok(Self {
            pattern: pattern.to_string(),
            options,
            regex,
            keys: compiled.keys,
            groups,
            fast_slash: options.prefix && pattern == "/",
        })
    }

    /// Attempts to match a path against this pattern.
    ///
    /// Returns `Ok(None)` when the path does not match and an error when a
    /// captured segment holds malformed percent-encoding.
    pub fn match_path(&self, path: &str) -> Result<Option<PathMatch>> {
        if self.fast_slash {
            return Ok(Some(PathMatch {
                len: 0,
                params: PathParams::new(),
            }));
        }
        let Some(caps) = self.regex.captures(path) else {
            return Ok(None);
        };

        let len = if self.options.prefix {
            caps.name(PREFIX_GROUP).map_or(0, |m| m.end())
        } else {
            caps.get(0).map_or(0, |m| m.end())
        };

        let mut params = PathParams::new();
        for (key, group) in self.keys.iter().zip(&self.groups) {
            let value = caps
                .name(group)
                .map(|m| decode_param(m.as_str()))
                .transpose()?;
            match key {
                PathKey::Named(name) => {
                    if let Some(value) = value {
                        params.insert(name.clone(), value);
                    }
                }
                PathKey::Positional(_) => params.push_positional(value),
            }
        }

        Ok(Some(PathMatch { len, params }))
    }

    /// Returns the original pattern string.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the options the pattern was compiled with.
    #[must_use]
    pub fn options(&self) -> PatternOptions {
        self.options
    }

    /// Returns the capture keys in declaration order.
    #[must_use]
    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    /// Returns the names of the named captures in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().filter_map(|k| match k {
            PathKey::Named(name) => Some(name.as_str()),
            PathKey::Positional(_) => None,
        })
    }
}

/// Percent-decodes a captured segment.
pub(crate) fn decode_param(raw: &str) -> Result<String> {
    if !raw.contains('%') {
        return Ok(raw.to_string());
    }
    let malformed = || RouterError::ParamDecode {
        value: raw.to_string(),
    };

    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3);
            if !hex.is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit)) {
                return Err(malformed());
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .map_err(|_| malformed())
}

struct Compiled {
    body: String,
    keys: Vec<PathKey>,
    ends_with_slash: bool,
}

struct Compiler<'p> {
    pattern: &'p str,
    chars: Peekable<CharIndices<'p>>,
    out: String,
    keys: Vec<PathKey>,
    positional: usize,
    /// Offset in `out` of a trailing literal `/`, if the last token was one.
    slash_at: Option<usize>,
    /// The last token was a single literal character.
    after_literal: bool,
}

impl<'p> Compiler<'p> {
    fn new(pattern: &'p str) -> Self {
        Self {
            pattern,
            chars: pattern.char_indices().peekable(),
            out: String::new(),
            keys: Vec::new(),
            positional: 0,
            slash_at: None,
            after_literal: false,
        }
    }

    fn compile(mut self) -> Result<Compiled> {
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => {
                    let Some((_, escaped)) = self.chars.next() else {
                        return Err(self.invalid("trailing escape"));
                    };
                    self.literal(escaped);
                }
                ':' => {
                    let name = self.identifier();
                    if name.is_empty() {
                        self.literal(':');
                        continue;
                    }
                    let custom = if self.chars.next_if(|&(_, c)| c == '(').is_some() {
                        Some(self.group_body()?)
                    } else {
                        None
                    };
                    let modifier = self.modifier();
                    self.capture(PathKey::Named(name), custom, modifier)?;
                }
                '(' if self.chars.peek().is_some_and(|&(_, c)| c == '?') => {
                    let body = self.group_body()?;
                    let group = self.inner_groups(&format!("({body})"), true)?;
                    self.out.push_str(&group);
                    if let Some(modifier) = self.modifier() {
                        self.out.push(modifier);
                    }
                    self.slash_at = None;
                    self.after_literal = false;
                }
                '(' => {
                    let body = self.group_body()?;
                    let modifier = self.modifier();
                    let key = PathKey::Positional(self.positional);
                    self.positional += 1;
                    self.capture(key, Some(body), modifier)?;
                }
                '*' => {
                    let key = PathKey::Positional(self.positional);
                    self.positional += 1;
                    let group = format!("(?P<p{}>.*)", self.keys.len());
                    self.out.push_str(&group);
                    self.keys.push(key);
                    self.slash_at = None;
                    self.after_literal = false;
                }
                '?' | '+' if self.after_literal => {
                    self.out.push(c);
                    self.slash_at = None;
                    self.after_literal = false;
                }
                '?' | '+' => return Err(self.invalid("nothing to repeat")),
                ')' => return Err(self.invalid("unbalanced ')'")),
                c => self.literal(c),
            }
        }

        Ok(Compiled {
            ends_with_slash: self.slash_at.is_some(),
            body: self.out,
            keys: self.keys,
        })
    }

    fn literal(&mut self, c: char) {
        let at = self.out.len();
        let mut buf = [0; 4];
        self.out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
        self.slash_at = (c == '/').then_some(at);
        self.after_literal = true;
    }

    fn identifier(&mut self) -> String {
        let mut name = String::new();
        while let Some((_, c)) = self
            .chars
            .next_if(|&(_, c)| c.is_ascii_alphanumeric() || c == '_')
        {
            name.push(c);
        }
        name
    }

    fn modifier(&mut self) -> Option<char> {
        self.chars
            .next_if(|&(_, c)| matches!(c, '?' | '+' | '*'))
            .map(|(_, c)| c)
    }

    /// Reads a group body up to its matching `)`; the `(` is already consumed.
    fn group_body(&mut self) -> Result<String> {
        let mut depth = 1;
        let mut in_class = false;
        let mut body = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => {
                    body.push(c);
                    if let Some((_, escaped)) = self.chars.next() {
                        body.push(escaped);
                    }
                    continue;
                }
                '[' if !in_class => in_class = true,
                ']' if in_class => in_class = false,
                '(' if !in_class => depth += 1,
                ')' if !in_class => {
                    depth -= 1;
                    if depth == 0 {
                        if body.is_empty() {
                            return Err(self.invalid("empty group"));
                        }
                        return Ok(body);
                    }
                }
                _ => {}
            }
            body.push(c);
        }
        Err(self.invalid("unclosed '('"))
    }

    /// Rewrites the groups inside a group body. Capturing groups become
    /// positional captures when `capture` is set and non-capturing otherwise.
    fn inner_groups(&mut self, body: &str, capture: bool) -> Result<String> {
        let mut out = String::with_capacity(body.len());
        let mut chars = body.chars().peekable();
        let mut in_class = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    out.push(c);
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '[' if !in_class => {
                    in_class = true;
                    out.push(c);
                }
                ']' if in_class => {
                    in_class = false;
                    out.push(c);
                }
                '(' if !in_class && chars.peek() == Some(&'?') => {
                    let flags: String = chars.clone().take(3).collect();
                    let named = flags.starts_with("?P<")
                        || (flags.starts_with("?<") && !flags.ends_with(['=', '!']));
                    if named {
                        return Err(self.invalid("named groups are not supported, use ':name'"));
                    }
                    out.push(c);
                }
                '(' if !in_class && capture => {
                    out.push_str(&format!("(?P<p{}>", self.keys.len()));
                    self.keys.push(PathKey::Positional(self.positional));
                    self.positional += 1;
                }
                '(' if !in_class => out.push_str("(?:"),
                c => out.push(c),
            }
        }
        Ok(out)
    }

    fn capture(
        &mut self,
        key: PathKey,
        custom: Option<String>,
        modifier: Option<char>,
    ) -> Result<()> {
        // A slash right before the capture belongs to it, so an optional
        // capture can drop the slash as well.
        let prefix = match self.slash_at.take() {
            Some(at) => {
                self.out.truncate(at);
                "/"
            }
            None => "",
        };
        let group = format!("(?P<p{}>", self.keys.len());
        self.keys.push(key);
        let (inner, repeat) = match custom {
            Some(body) => {
                let body = if body.starts_with('?') {
                    format!("({body})")
                } else {
                    body
                };
                (self.inner_groups(&body, true)?, self.inner_groups(&body, false)?)
            }
            None => (DEFAULT_SEGMENT.to_string(), DEFAULT_SEGMENT.to_string()),
        };
        // Groups inside the repeated tail stay non-capturing so every group
        // name appears once.
        let capture = match modifier {
            Some('+' | '*') => format!("{group}(?:{inner})(?:/(?:{repeat}))*)"),
            _ => format!("{group}{inner})"),
        };
        let token = match modifier {
            Some('?' | '*') => format!("(?:{prefix}{capture})?"),
            _ => format!("{prefix}{capture}"),
        };
        self.out.push_str(&token);
        self.after_literal = false;
        Ok(())
    }

    fn invalid(&self, reason: &str) -> RouterError {
        RouterError::InvalidPattern {
            pattern: self.pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(pattern: &str) -> PathPattern {
        PathPattern::new(pattern, PatternOptions::default()).unwrap()
    }

    fn prefix(pattern: &str) -> PathPattern {
        let options = PatternOptions {
            prefix: true,
            ..PatternOptions::default()
        };
        PathPattern::new(pattern, options).unwrap()
    }

    fn params(pattern: &PathPattern, path: &str) -> PathParams {
        pattern.match_path(path).unwrap().unwrap().params
    }

    #[test]
    fn test_literal_path() {
        let pattern = exact("/users");
        assert!(pattern.match_path("/users").unwrap().is_some());
        assert!(pattern.match_path("/users/").unwrap().is_some());
        assert!(pattern.match_path("/USERS").unwrap().is_some());
        assert!(pattern.match_path("/posts").unwrap().is_none());
        assert!(pattern.match_path("/users/1").unwrap().is_none());
    }

    #[test]
    fn test_strict_and_case_sensitive() {
        let options = PatternOptions {
            case_sensitive: true,
            strict: true,
            prefix: false,
        };
        let pattern = PathPattern::new("/users", options).unwrap();
        assert!(pattern.match_path("/users").unwrap().is_some());
        assert!(pattern.match_path("/users/").unwrap().is_none());
        assert!(pattern.match_path("/Users").unwrap().is_none());

        let pattern = PathPattern::new("/users/", options).unwrap();
        assert!(pattern.match_path("/users/").unwrap().is_some());
        assert!(pattern.match_path("/users").unwrap().is_none());
    }

    #[test]
    fn test_single_param() {
        let pattern = exact("/users/:id");
        assert_eq!(params(&pattern, "/users/123").get("id"), Some("123"));
        assert_eq!(params(&pattern, "/users/123/").get("id"), Some("123"));
        assert!(pattern.match_path("/users").unwrap().is_none());
        assert!(pattern.match_path("/users/1/2").unwrap().is_none());
    }

    #[test]
    fn test_multiple_params_keep_order() {
        let pattern = exact("/posts/:post_id/comments/:comment_id");
        let captured = params(&pattern, "/posts/42/comments/7");
        let pairs: Vec<_> = captured.iter().collect();
        assert_eq!(pairs, vec![("post_id", "42"), ("comment_id", "7")]);
        let names: Vec<_> = pattern.param_names().collect();
        assert_eq!(names, vec!["post_id", "comment_id"]);
    }

    #[test]
    fn test_optional_param() {
        let pattern = exact("/users/:id?");
        assert_eq!(params(&pattern, "/users").get("id"), None);
        assert_eq!(params(&pattern, "/users/5").get("id"), Some("5"));
    }

    #[test]
    fn test_repeat_params() {
        let one_or_more = exact("/files/:path+");
        assert_eq!(
            params(&one_or_more, "/files/a/b/c").get("path"),
            Some("a/b/c")
        );
        assert!(one_or_more.match_path("/files").unwrap().is_none());

        let zero_or_more = exact("/files/:path*");
        assert_eq!(params(&zero_or_more, "/files").get("path"), None);
        assert_eq!(params(&zero_or_more, "/files/a/b").get("path"), Some("a/b"));
    }

    #[test]
    fn test_custom_param_expression() {
        let pattern = exact(r"/users/:id(\d+)");
        assert_eq!(params(&pattern, "/users/42").get("id"), Some("42"));
        assert!(pattern.match_path("/users/tj").unwrap().is_none());
    }

    #[test]
    fn test_unnamed_groups_are_positional() {
        let pattern = exact(r"/page/(\d+)/(\w+)");
        assert_eq!(
            pattern.keys(),
            &[PathKey::Positional(0), PathKey::Positional(1)]
        );
        let captured = params(&pattern, "/page/3/intro");
        assert_eq!(captured.index(0), Some("3"));
        assert_eq!(captured.index(1), Some("intro"));
    }

    #[test]
    fn test_optional_group_keeps_slot() {
        let pattern = exact("/ab(cd)?e/(x)");
        let captured = params(&pattern, "/abe/x");
        assert_eq!(captured.positional_len(), 2);
        assert_eq!(captured.index(0), None);
        assert_eq!(captured.index(1), Some("x"));
    }

    #[test]
    fn test_non_capturing_group() {
        let pattern = exact(r"/commits/(\w+)(?:\.\.(\w+))?");
        assert_eq!(
            pattern.keys(),
            &[PathKey::Positional(0), PathKey::Positional(1)]
        );
        let range = params(&pattern, "/commits/abc..def");
        assert_eq!(range.index(0), Some("abc"));
        assert_eq!(range.index(1), Some("def"));
        let single = params(&pattern, "/commits/abc");
        assert_eq!(single.positional_len(), 2);
        assert_eq!(single.index(0), Some("abc"));
        assert_eq!(single.index(1), None);
    }

    #[test]
    fn test_nested_groups_are_positional() {
        let pattern = exact("/x/((a)|(b))");
        assert_eq!(
            pattern.keys(),
            &[
                PathKey::Positional(0),
                PathKey::Positional(1),
                PathKey::Positional(2)
            ]
        );
        let captured = params(&pattern, "/x/b");
        assert_eq!(captured.index(0), Some("b"));
        assert_eq!(captured.index(1), None);
        assert_eq!(captured.index(2), Some("b"));

        let named = exact(r"/v/:version((\d+)\.(\d+))");
        let captured = params(&named, "/v/1.2");
        assert_eq!(captured.get("version"), Some("1.2"));
        assert_eq!(captured.index(0), Some("1"));
        assert_eq!(captured.index(1), Some("2"));
    }

    #[test]
    fn test_parentheses_in_character_class() {
        let pattern = exact(r"/fn/([()a-z]+)");
        assert_eq!(pattern.keys(), &[PathKey::Positional(0)]);
        assert_eq!(params(&pattern, "/fn/f(x)").index(0), Some("f(x)"));
    }

    #[test]
    fn test_quantified_literals() {
        let optional = exact("/ab?cd");
        assert!(optional.match_path("/acd").unwrap().is_some());
        assert!(optional.match_path("/abcd").unwrap().is_some());
        assert!(optional.match_path("/abbcd").unwrap().is_none());

        let repeated = exact("/ab+cd");
        assert!(repeated.match_path("/abcd").unwrap().is_some());
        assert!(repeated.match_path("/abbbcd").unwrap().is_some());
        assert!(repeated.match_path("/acd").unwrap().is_none());
    }

    #[test]
    fn test_escaped_parentheses_are_literal() {
        let pattern = exact(r"/fn\(x\)");
        assert!(pattern.keys().is_empty());
        assert!(pattern.match_path("/fn(x)").unwrap().is_some());
        assert!(pattern.match_path("/fnx").unwrap().is_none());
    }

    #[test]
    fn test_wildcard() {
        let pattern = exact("*");
        assert_eq!(params(&pattern, "/any/thing").index(0), Some("/any/thing"));
        let pattern = exact("/static/*");
        assert_eq!(params(&pattern, "/static/css/app.css").index(0), Some("css/app.css"));
    }

    #[test]
    fn test_params_are_decoded() {
        let pattern = exact("/users/:name");
        assert_eq!(params(&pattern, "/users/t%20j").get("name"), Some("t j"));
        assert_eq!(params(&pattern, "/users/a+b").get("name"), Some("a+b"));
    }

    #[test]
    fn test_malformed_encoding_is_an_error() {
        let pattern = exact("/users/:name");
        let err = pattern.match_path("/users/%zz").unwrap_err();
        assert!(matches!(err, RouterError::ParamDecode { ref value } if value == "%zz"));
        assert_eq!(err.status_code(), 400);
        assert!(pattern.match_path("/users/50%").is_err());
    }

    #[test]
    fn test_invalid_utf8_encoding_is_an_error() {
        let pattern = exact("/u/:name");
        let err = pattern.match_path("/u/%E9").unwrap_err();
        assert!(matches!(err, RouterError::ParamDecode { ref value } if value == "%E9"));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_prefix_stops_on_segment_boundary() {
        let pattern = prefix("/user");
        assert!(pattern.match_path("/users").unwrap().is_none());
        assert_eq!(pattern.match_path("/user").unwrap().unwrap().len, 5);
        assert_eq!(pattern.match_path("/user/").unwrap().unwrap().len, 6);
        assert_eq!(pattern.match_path("/user/tj").unwrap().unwrap().len, 5);
    }

    #[test]
    fn test_prefix_with_params() {
        let pattern = prefix("/user/:id");
        let m = pattern.match_path("/user/tj/edit").unwrap().unwrap();
        assert_eq!(m.len, "/user/tj".len());
        assert_eq!(m.params.get("id"), Some("tj"));
    }

    #[test]
    fn test_prefix_root_consumes_nothing() {
        let pattern = prefix("/");
        assert_eq!(pattern.match_path("/").unwrap().unwrap().len, 0);
        assert_eq!(pattern.match_path("/anything").unwrap().unwrap().len, 0);
    }

    #[test]
    fn test_invalid_patterns() {
        let options = PatternOptions::default();
        assert!(PathPattern::new("/a(b", options).is_err());
        assert!(PathPattern::new("/a)b", options).is_err());
        assert!(PathPattern::new("/a()", options).is_err());
        assert!(PathPattern::new(r"/a\", options).is_err());
        assert!(PathPattern::new("/:id([)", options).is_err());
        assert!(PathPattern::new("/(?P<id>a)", options).is_err());
        assert!(PathPattern::new("?a", options).is_err());
        assert!(PathPattern::new("/*+", options).is_err());
    }

    #[test]
    fn test_compiling_twice_matches_identically() {
        let a = exact("/users/:id?");
        let b = exact("/users/:id?");
        for path in ["/users", "/users/1", "/users/1/2", "/other"] {
            assert_eq!(a.match_path(path).unwrap(), b.match_path(path).unwrap());
        }
    }
}
