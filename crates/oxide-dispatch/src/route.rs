//! Per-method handler chains anchored at one path.

use std::fmt;
use std::sync::Arc;

use crate::handler::{ErrorHandler, Handler};
use crate::request::Method;

/// A handler registered on a route.
pub(crate) enum Callback {
    Handler(Arc<dyn Handler>),
    ErrorHandler(Arc<dyn ErrorHandler>),
}

/// One stage of a route. `method` is `None` for stages registered with
/// [`Route::all`] or [`Route::error_handler`].
pub(crate) struct Stage {
    pub(crate) method: Option<Method>,
    pub(crate) callback: Callback,
}

/// A path-anchored collection of per-method handler chains.
///
/// Stages run in registration order across methods: `get`, then `all`,
/// then `get` again yields three sequential stages for a GET request.
///
/// ```ignore
/// router
///     .route("/users/:id")
///     .all(handler_fn(load_user))
///     .get(handler_fn(show_user))
///     .put(handler_fn(update_user));
/// ```
pub struct Route {
    path: String,
    stack: Vec<Stage>,
    methods: Vec<Method>,
    all: bool,
}

impl Route {
    /// Creates an empty route for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stack: Vec::new(),
            methods: Vec::new(),
            all: false,
        }
    }

    /// Returns the path the route was registered at.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Adds a handler for every method.
    pub fn all(&mut self, handler: impl Handler) -> &mut Self {
        self.all = true;
        self.push(None, Callback::Handler(Arc::new(handler)))
    }

    /// Adds a handler for one method.
    pub fn method(&mut self, method: Method, handler: impl Handler) -> &mut Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self.push(Some(method), Callback::Handler(Arc::new(handler)))
    }

    /// Adds an error handler that runs for every method.
    pub fn error_handler(&mut self, handler: impl ErrorHandler) -> &mut Self {
        self.push(None, Callback::ErrorHandler(Arc::new(handler)))
    }

    /// Adds a GET handler.
    pub fn get(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::Get, handler)
    }

    /// Adds a POST handler.
    pub fn post(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::Post, handler)
    }

    /// Adds a PUT handler.
    pub fn put(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::Put, handler)
    }

    /// Adds a PATCH handler.
    pub fn patch(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::Patch, handler)
    }

    /// Adds a DELETE handler.
    pub fn delete(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::Delete, handler)
    }

    /// Adds a HEAD handler.
    pub fn head(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::Head, handler)
    }

    /// Adds an OPTIONS handler.
    pub fn options(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::Options, handler)
    }

    /// Returns whether any stage would run for `method`. HEAD falls back to
    /// GET when no HEAD handler is registered.
    #[must_use]
    pub fn handles_method(&self, method: Method) -> bool {
        self.all || self.methods.contains(&self.effective_method(method))
    }

    /// Returns the methods with explicit handlers, plus HEAD when only GET is
    /// registered.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        let mut methods = self.methods.clone();
        if methods.contains(&Method::Get) && !methods.contains(&Method::Head) {
            methods.push(Method::Head);
        }
        methods
    }

    pub(crate) fn effective_method(&self, method: Method) -> Method {
        if method == Method::Head && !self.methods.contains(&Method::Head) {
            Method::Get
        } else {
            method
        }
    }

    pub(crate) fn stage(&self, idx: usize) -> Option<&Stage> {
        self.stack.get(idx)
    }

    fn push(&mut self, method: Option<Method>, callback: Callback) -> &mut Self {
        tracing::trace!(path = %self.path, method = ?method, "route stage");
        self.stack.push(Stage { method, callback });
        self
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("stages", &self.stack.len())
            .field("methods", &self.methods)
            .field("all", &self.all)
            .finish()
    }
}
