//! Main router implementation.

use std::fmt;
use std::mem;
use std::sync::Arc;

use crate::dispatch;
use crate::error::Result;
use crate::handler::{BoxFuture, ErrorHandler, Handler, ParamHandler};
use crate::layer::{Endpoint, Layer};
use crate::options::RouterOptions;
use crate::param::ParamRegistry;
use crate::path::PatternOptions;
use crate::request::{pathname, protohost, Method, Request};
use crate::response::{status_text, Response};
use crate::route::Route;

/// How a dispatch ended when no error was left over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A handler ended the chain.
    Handled,
    /// Every layer passed the request on.
    Unhandled,
}

/// An ordered stack of layers with its param callbacks.
///
/// Layers run in registration order. Middleware and nested routers match a
/// path prefix, which is stripped from `req.url` while they run; routes
/// match the whole remaining path.
///
/// Routers are built with `&mut self` methods and are read-only while
/// dispatching, so a built router can be shared behind an [`Arc`] and mounted
/// under several parents.
///
/// # Panics
///
/// Registration methods panic when given an invalid path pattern.
#[derive(Default)]
pub struct Router {
    options: RouterOptions,
    stack: Vec<Layer>,
    params: ParamRegistry,
}

impl Router {
    /// Creates a router with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router with the given options.
    #[must_use]
    pub fn with_options(options: RouterOptions) -> Self {
        let mut router = Self::default();
        router.options = options;
        router
    }

    /// Returns the options the router was created with.
    #[must_use]
    pub fn settings(&self) -> RouterOptions {
        self.options
    }

    /// Adds middleware that runs for every path.
    pub fn middleware(&mut self, handler: impl Handler) -> &mut Self {
        self.middleware_at("/", handler)
    }

    /// Adds middleware under a path prefix.
    pub fn middleware_at(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.push(path, true, Endpoint::Handler(Arc::new(handler)));
        self
    }

    /// Adds error-handling middleware that runs for every path.
    pub fn error_middleware(&mut self, handler: impl ErrorHandler) -> &mut Self {
        self.error_middleware_at("/", handler)
    }

    /// Adds error-handling middleware under a path prefix.
    pub fn error_middleware_at(&mut self, path: &str, handler: impl ErrorHandler) -> &mut Self {
        self.push(path, true, Endpoint::ErrorHandler(Arc::new(handler)));
        self
    }

    /// Mounts a router under a path prefix.
    ///
    /// The same router may be mounted any number of times.
    pub fn nest(&mut self, path: &str, router: impl Into<Arc<Router>>) -> &mut Self {
        self.push(path, true, Endpoint::Router(router.into()));
        self
    }

    /// Mounts a standalone route under a path prefix.
    pub fn mount_route(&mut self, path: &str, route: impl Into<Arc<Route>>) -> &mut Self {
        self.push(path, true, Endpoint::Mounted(route.into()));
        self
    }

    /// Adds a route matching `path` exactly and returns it for handler
    /// registration.
    ///
    /// ```ignore
    /// router.route("/users/:id").get(show_user).put(update_user);
    /// ```
    pub fn route(&mut self, path: &str) -> &mut Route {
        let layer = self.push(path, false, Endpoint::Route(Route::new(path)));
        match layer.endpoint_mut() {
            Endpoint::Route(route) => route,
            _ => unreachable!("route layers hold a route"),
        }
    }

    /// Adds a GET route.
    pub fn get(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.method(Method::Get, path, handler)
    }

    /// Adds a POST route.
    pub fn post(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.method(Method::Post, path, handler)
    }

    /// Adds a PUT route.
    pub fn put(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.method(Method::Put, path, handler)
    }

    /// Adds a PATCH route.
    pub fn patch(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.method(Method::Patch, path, handler)
    }

    /// Adds a DELETE route.
    pub fn delete(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.method(Method::Delete, path, handler)
    }

    /// Adds a HEAD route.
    pub fn head(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.method(Method::Head, path, handler)
    }

    /// Adds an OPTIONS route.
    pub fn options(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.method(Method::Options, path, handler)
    }

    /// Adds a route for every method.
    pub fn all(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(path).all(handler);
        self
    }

    /// Adds a route for one method.
    pub fn method(&mut self, method: Method, path: &str, handler: impl Handler) -> &mut Self {
        self.route(path).method(method, handler);
        self
    }

    /// Adds a callback for a named param.
    ///
    /// The callback runs before the first layer capturing the param, at most
    /// once per value per request in this router.
    pub fn param(&mut self, name: &str, callback: impl ParamHandler) -> &mut Self {
        self.params.register(name, Arc::new(callback));
        self
    }

    /// Dispatches a request.
    ///
    /// Resolves to `Ok(Outcome::Handled)` when a handler ended the chain,
    /// `Ok(Outcome::Unhandled)` when the request fell through every layer,
    /// and `Err` when an error was still propagating at the end.
    pub fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Outcome>> {
        Box::pin(dispatch::run(self, req, res))
    }

    /// Dispatches a request and answers whatever the handlers left open.
    ///
    /// Unhandled requests get `404 Cannot <METHOD> <path>`. Errors get their
    /// status code with the status text as body.
    pub async fn serve(&self, mut req: Request) -> Response {
        let mut res = Response::new();
        let outcome = self.handle(&mut req, &mut res).await;
        if res.is_sent() {
            return res;
        }
        match outcome {
            Ok(Outcome::Handled) => {}
            Ok(Outcome::Unhandled) => {
                let path = pathname(&req.original_url, protohost(&req.original_url).len());
                res.set_status(404)
                    .send_text(format!("Cannot {} {path}", req.method));
            }
            Err(err) => {
                let status = err.status_code();
                tracing::debug!(status, error = %err, "request failed");
                res.set_status(status).send_text(status_text(status));
            }
        }
        res
    }

    pub(crate) fn layers(&self) -> &[Layer] {
        &self.stack
    }

    pub(crate) fn param_registry(&self) -> &ParamRegistry {
        &self.params
    }

    fn push(&mut self, path: &str, prefix: bool, endpoint: Endpoint) -> &mut Layer {
        let options = PatternOptions {
            case_sensitive: self.options.case_sensitive,
            strict: !prefix && self.options.strict,
            prefix,
        };
        let layer = match Layer::new(path, options, endpoint) {
            Ok(layer) => layer,
            Err(e) => panic!("{e}"),
        };
        tracing::debug!(path, prefix, "layer registered");
        self.stack.push(layer);
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }
}

// Nested routers are torn down from a worklist so dropping a deep tree does
// not recurse once per level.
impl Drop for Router {
    fn drop(&mut self) {
        let mut layers = mem::take(&mut self.stack);
        while let Some(layer) = layers.pop() {
            if let Endpoint::Router(child) = layer.into_endpoint() {
                if let Ok(mut child) = Arc::try_unwrap(child) {
                    layers.append(&mut child.stack);
                }
            }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: Vec<_> = self.stack.iter().map(|l| l.pattern().pattern()).collect();
        f.debug_struct("Router")
            .field("options", &self.options)
            .field("layers", &patterns)
            .field("params", &self.params)
            .finish()
    }
}
