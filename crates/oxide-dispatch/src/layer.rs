//! A layer pairs one path pattern with one endpoint.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;

use crate::error::{Result, RouterError};
use crate::handler::{ErrorHandler, Handler, Next, ParamHandler};
use crate::path::{PathMatch, PathPattern, PatternOptions};
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;
use crate::router::Router;

/// What a layer dispatches to.
pub(crate) enum Endpoint {
    /// Normal middleware.
    Handler(Arc<dyn Handler>),
    /// Error-handling middleware.
    ErrorHandler(Arc<dyn ErrorHandler>),
    /// A router mounted under a prefix.
    Router(Arc<Router>),
    /// A route mounted as middleware under a prefix.
    Mounted(Arc<Route>),
    /// A route registered with `Router::route`; matches the whole path.
    Route(Route),
}

impl Endpoint {
    pub(crate) fn is_error_handler(&self) -> bool {
        matches!(self, Self::ErrorHandler(_))
    }
}

pub(crate) struct Layer {
    pattern: PathPattern,
    endpoint: Endpoint,
}

impl Layer {
    pub(crate) fn new(path: &str, options: PatternOptions, endpoint: Endpoint) -> Result<Self> {
        tracing::trace!(path, prefix = options.prefix, "new layer");
        Ok(Self {
            pattern: PathPattern::new(path, options)?,
            endpoint,
        })
    }

    pub(crate) fn attempt_match(&self, path: &str) -> Result<Option<PathMatch>> {
        self.pattern.match_path(path)
    }

    pub(crate) fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub(crate) fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(crate) fn endpoint_mut(&mut self) -> &mut Endpoint {
        &mut self.endpoint
    }

    pub(crate) fn into_endpoint(self) -> Endpoint {
        self.endpoint
    }
}

/// One pending handler call.
pub(crate) enum Invocation<'r> {
    Handler(&'r dyn Handler),
    ErrorHandler(&'r dyn ErrorHandler, RouterError),
    Param {
        callback: &'r dyn ParamHandler,
        value: String,
    },
}

impl Invocation<'_> {
    /// Runs the call and turns every way it can fail into [`Next::Fail`].
    ///
    /// A returned `Err`, a panic while building the future, and a panic
    /// while polling it all propagate the same way as an explicit
    /// `Next::Fail`.
    pub(crate) async fn run(self, req: &mut Request, res: &mut Response) -> Next {
        let started = panic::catch_unwind(AssertUnwindSafe(move || match self {
            Self::Handler(h) => h.call(req, res),
            Self::ErrorHandler(h, err) => h.call(err, req, res),
            Self::Param { callback, value } => callback.call(req, res, value),
        }));
        let future = match started {
            Ok(future) => future,
            Err(payload) => return Next::Fail(RouterError::from_panic(payload.as_ref())),
        };
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(next)) => next,
            Ok(Err(err)) => Next::Fail(err),
            Err(payload) => Next::Fail(RouterError::from_panic(payload.as_ref())),
        }
    }
}
