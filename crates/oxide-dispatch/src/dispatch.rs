//! The dispatch loop.
//!
//! Nested routers and routes do not recurse. Each one becomes a frame on an
//! explicit stack and the loop in [`run`] feeds the signal returned by one
//! step into the next, so stack depth stays flat however long the chain is
//! or however deep routers are nested.

use std::mem;

use crate::error::{Result, RouterError};
use crate::handler::Next;
use crate::layer::{Endpoint, Invocation, Layer};
use crate::param::CalledParams;
use crate::path::PathMatch;
use crate::request::{protohost, Method, PathParams, Request};
use crate::response::Response;
use crate::route::{Callback, Route};
use crate::router::{Outcome, Router};

/// Dispatches `req` through `router` until a handler ends the chain or every
/// frame has finished.
pub(crate) async fn run(router: &Router, req: &mut Request, res: &mut Response) -> Result<Outcome> {
    let mut frames = vec![Frame::Router(RouterFrame::enter(router, req))];
    let mut signal = Next::Continue;

    while let Some(frame) = frames.last_mut() {
        let step = match frame {
            Frame::Router(frame) => frame.step(signal, req, res).await,
            Frame::Route(frame) => frame.step(signal, req, res).await,
        };
        signal = match step {
            Step::Resume(Next::End) | Step::Halt => return Ok(Outcome::Handled),
            Step::Resume(next) => next,
            Step::Push(child) => {
                frames.push(child);
                Next::Continue
            }
            Step::Pop(next) => {
                frames.pop();
                next
            }
        };
    }

    match signal {
        Next::Fail(err) => Err(err),
        _ => Ok(Outcome::Unhandled),
    }
}

enum Frame<'r> {
    Router(RouterFrame<'r>),
    Route(RouteFrame<'r>),
}

/// What the loop does after a frame has taken one step.
enum Step<'r> {
    /// Feed the signal back into the same frame.
    Resume(Next),
    /// Start a child frame on top of this one.
    Push(Frame<'r>),
    /// The frame is finished; feed the signal into its parent.
    Pop(Next),
    /// The request was answered; stop dispatching.
    Halt,
}

/// One router dispatching one request.
struct RouterFrame<'r> {
    router: &'r Router,
    /// Index of the next layer to try.
    idx: usize,
    /// `scheme://host` of the URL the router was entered with.
    protohost: String,
    /// Prefix stripped for the layer currently running.
    removed: String,
    /// A `/` was prepended after stripping and has to go again.
    slash_added: bool,
    parent_url: String,
    parent_params: PathParams,
    /// Methods of routes that matched the path but not an OPTIONS request.
    allowed: Vec<Method>,
    called: CalledParams,
}

impl<'r> RouterFrame<'r> {
    fn enter(router: &'r Router, req: &Request) -> Self {
        tracing::debug!(method = %req.method, url = %req.url, base_url = %req.base_url, "dispatching");
        Self {
            router,
            idx: 0,
            protohost: protohost(&req.url).to_string(),
            removed: String::new(),
            slash_added: false,
            parent_url: req.base_url.clone(),
            parent_params: req.params.clone(),
            allowed: Vec::new(),
            called: CalledParams::default(),
        }
    }

    async fn step(&mut self, signal: Next, req: &mut Request, res: &mut Response) -> Step<'r> {
        self.restore(req);

        let mut pending = match signal {
            Next::Continue | Next::SkipRoute => None,
            Next::Fail(err) => Some(err),
            Next::SkipRouter => return self.done(None, req, res),
            Next::End => return Step::Halt,
        };

        let path = req.path().to_string();
        let Some((layer, matched)) = self.scan(&path, req.method, &mut pending) else {
            return self.done(pending, req, res);
        };
        let len = matched.len;

        let router = self.router;
        req.params = if router.settings().merge_params {
            matched.params.merged_onto(&self.parent_params)
        } else {
            matched.params
        };

        if let Some(stopped) = router
            .param_registry()
            .process(&mut self.called, layer.pattern(), req, res)
            .await
        {
            return match (stopped, pending) {
                (Next::End, _) => Step::Halt,
                (_, Some(err)) => Step::Resume(Next::Fail(err)),
                (stopped, None) => Step::Resume(stopped),
            };
        }

        match layer.endpoint() {
            Endpoint::Route(route) => Step::Push(Frame::Route(RouteFrame::enter(route, req))),
            endpoint => {
                self.trim_prefix(&path[..len], req);
                match (endpoint, pending) {
                    (Endpoint::Handler(handler), None) => {
                        Step::Resume(Invocation::Handler(handler.as_ref()).run(req, res).await)
                    }
                    (Endpoint::ErrorHandler(handler), Some(err)) => Step::Resume(
                        Invocation::ErrorHandler(handler.as_ref(), err)
                            .run(req, res)
                            .await,
                    ),
                    (Endpoint::Router(router), None) => {
                        Step::Push(Frame::Router(RouterFrame::enter(router, req)))
                    }
                    (Endpoint::Mounted(route), None) => {
                        Step::Push(Frame::Route(RouteFrame::enter(route, req)))
                    }
                    // Not reached: `scan` only returns endpoints that can run
                    // with the pending error.
                    (_, pending) => Step::Resume(pending.map_or(Next::Continue, Next::Fail)),
                }
            }
        }
    }

    /// Finds the next layer that matches `path` and can run given the
    /// pending error.
    fn scan(
        &mut self,
        path: &str,
        method: Method,
        pending: &mut Option<RouterError>,
    ) -> Option<(&'r Layer, PathMatch)> {
        let router = self.router;
        while let Some(layer) = router.layers().get(self.idx) {
            self.idx += 1;

            let matched = match layer.attempt_match(path) {
                Ok(Some(matched)) => matched,
                Ok(None) => continue,
                Err(err) => {
                    pending.get_or_insert(err);
                    continue;
                }
            };

            match layer.endpoint() {
                Endpoint::Route(route) => {
                    if pending.is_some() {
                        continue;
                    }
                    if !route.handles_method(method) {
                        if method == Method::Options {
                            self.allowed.extend(route.allowed_methods());
                        }
                        continue;
                    }
                }
                endpoint => {
                    if endpoint.is_error_handler() != pending.is_some() {
                        continue;
                    }
                }
            }

            tracing::trace!(pattern = layer.pattern().pattern(), path, "layer matched");
            return Some((layer, matched));
        }
        None
    }

    /// Strips the matched prefix from `req.url` and appends it to
    /// `req.base_url`.
    fn trim_prefix(&mut self, removed: &str, req: &mut Request) {
        if removed.is_empty() {
            return;
        }
        let rest = req
            .url
            .get(self.protohost.len() + removed.len()..)
            .unwrap_or_default();
        let mut url = format!("{}{rest}", self.protohost);
        if self.protohost.is_empty() && !url.starts_with('/') {
            url.insert(0, '/');
            self.slash_added = true;
        }
        req.url = url;

        let base = if removed == "/" {
            removed
        } else {
            removed.strip_suffix('/').unwrap_or(removed)
        };
        req.base_url = format!("{}{base}", self.parent_url);
        self.removed = removed.to_string();
        tracing::trace!(removed, url = %req.url, base_url = %req.base_url, "trimmed prefix");
    }

    /// Puts back what `trim_prefix` took away.
    fn restore(&mut self, req: &mut Request) {
        if self.slash_added {
            if !req.url.is_empty() {
                req.url.remove(0);
            }
            self.slash_added = false;
        }
        if !self.removed.is_empty() {
            let rest = req.url.get(self.protohost.len()..).unwrap_or_default();
            req.url = format!("{}{}{rest}", self.protohost, self.removed);
            req.base_url.clone_from(&self.parent_url);
            self.removed.clear();
        }
    }

    fn done(&mut self, err: Option<RouterError>, req: &mut Request, res: &mut Response) -> Step<'r> {
        req.base_url.clone_from(&self.parent_url);
        req.params = mem::take(&mut self.parent_params);

        if err.is_none() && req.method == Method::Options && !self.allowed.is_empty() && !res.is_sent() {
            self.allowed.sort();
            self.allowed.dedup();
            let allow = self
                .allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            tracing::debug!(allow = %allow, "answering OPTIONS");
            res.set_status(200)
                .set_header("Allow", allow.as_str())
                .set_header("Content-Type", "text/plain; charset=utf-8");
            res.send(allow.into_bytes());
            return Step::Halt;
        }

        Step::Pop(err.map_or(Next::Continue, Next::Fail))
    }
}

/// One route dispatching one request.
struct RouteFrame<'r> {
    route: &'r Route,
    idx: usize,
    /// Method the stages are filtered by; HEAD becomes GET when the route has
    /// no HEAD handler.
    method: Method,
}

impl<'r> RouteFrame<'r> {
    fn enter(route: &'r Route, req: &mut Request) -> Self {
        req.route = Some(route.path().to_string());
        Self {
            route,
            idx: 0,
            method: route.effective_method(req.method),
        }
    }

    async fn step(&mut self, signal: Next, req: &mut Request, res: &mut Response) -> Step<'r> {
        let pending = match signal {
            Next::Continue => None,
            Next::SkipRoute => return Step::Pop(Next::Continue),
            Next::SkipRouter => return Step::Pop(Next::SkipRouter),
            Next::Fail(err) => Some(err),
            Next::End => return Step::Halt,
        };

        while let Some(stage) = self.route.stage(self.idx) {
            self.idx += 1;
            if stage.method.is_some_and(|m| m != self.method) {
                continue;
            }
            let invocation = match (&stage.callback, &pending) {
                (Callback::Handler(handler), None) => Invocation::Handler(handler.as_ref()),
                (Callback::ErrorHandler(handler), Some(err)) => {
                    Invocation::ErrorHandler(handler.as_ref(), err.clone())
                }
                _ => continue,
            };
            return Step::Resume(invocation.run(req, res).await);
        }

        Step::Pop(pending.map_or(Next::Continue, Next::Fail))
    }
}
