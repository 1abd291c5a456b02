//! # oxide-dispatch
//!
//! A request-dispatch engine with prefix-mounted middleware, nested routers
//! and per-method routes.
//!
//! This crate provides:
//! - Path pattern matching with named, optional, repeated and regex captures
//! - Middleware and error middleware mounted under path prefixes
//! - Nested routers with `base_url` bookkeeping and URL restoration
//! - Per-method routes with HEAD fallback and automatic OPTIONS answers
//! - Param callbacks memoized per request
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxide_dispatch::{handler_fn, Next, Request, Router};
//!
//! let mut router = Router::new();
//! router
//!     .get("/", handler_fn(|_req, res| {
//!         res.send_text("Hello, World!");
//!         Ok(Next::End)
//!     }))
//!     .get("/users/:id", handler_fn(|req, res| {
//!         res.json(&serde_json::json!({"id": req.params.require("id")?}))?;
//!         Ok(Next::End)
//!     }));
//!
//! let response = router.serve(Request::get("/users/123")).await;
//! ```
//!
//! ## Handlers
//!
//! A handler returns a [`Next`] that tells the router how to go on:
//!
//! - `Next::Continue` runs the next matching layer
//! - `Next::SkipRoute` leaves the current route
//! - `Next::SkipRouter` leaves the current router and resumes in its parent
//! - `Next::Fail(err)` (or returning `Err(err)`) propagates an error
//! - `Next::End` stops dispatching; the handler answered the request
//!
//! Panics inside handlers are caught and propagate like errors.
//!
//! ## Nesting
//!
//! ```ignore
//! let mut api = Router::new();
//! api.get("/users", list_users);
//!
//! let mut app = Router::new();
//! app.middleware(log_requests)
//!     .nest("/api/v1", api)
//!     .error_middleware(render_error);
//! ```
//!
//! Inside `api`, `req.url` is `/users` and `req.base_url` is `/api/v1`. Both
//! are restored once `api` passes the request on.
//!
//! ## Params
//!
//! ```ignore
//! router.param("user", async_param(|req, _res, id| Box::pin(async move {
//!     let user = load_user(&id).await?;
//!     req.params.insert("user", user.name);
//!     Ok(Next::Continue)
//! })));
//! ```

mod dispatch;
mod error;
mod handler;
mod layer;
mod options;
mod param;
mod path;
mod request;
mod response;
mod route;
mod router;

pub use error::{Result, RouterError};
pub use handler::{
    async_error_handler, async_handler, async_param, error_handler_fn, handler_fn, param_fn,
    AsyncFnErrorHandler, AsyncFnHandler, AsyncFnParamHandler, BoxFuture, ErrorHandler,
    FnErrorHandler, FnHandler, FnParamHandler, Handler, HandlerResult, Next, ParamHandler,
};
pub use options::RouterOptions;
pub use path::{PathKey, PathMatch, PathPattern, PatternOptions};
pub use request::{Method, PathParams, Request};
pub use response::Response;
pub use route::Route;
pub use router::{Outcome, Router};
