//! Handlers and the signal they hand back to the router.

use std::future::{ready, Future};
use std::pin::Pin;

use crate::error::RouterError;
use crate::request::Request;
use crate::response::Response;

/// A boxed future for async handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler returns. `Err(e)` is handled exactly like
/// `Ok(Next::Fail(e))`, so `?` can be used freely inside handlers.
pub type HandlerResult = Result<Next, RouterError>;

/// How dispatch continues after a handler.
#[derive(Debug, Clone)]
pub enum Next {
    /// Continue with the next matching layer.
    Continue,
    /// Skip the remaining handlers of the current route. Outside a route
    /// this behaves like [`Next::Continue`].
    SkipRoute,
    /// Skip the remaining layers of the current router and resume in its
    /// parent. Not an error.
    SkipRouter,
    /// Propagate an error; only error handlers run until it is consumed.
    Fail(RouterError),
    /// The handler finished the request. Nothing else runs.
    End,
}

impl From<RouterError> for Next {
    fn from(err: RouterError) -> Self {
        Self::Fail(err)
    }
}

/// A request handler.
///
/// Implemented for async closures of the right shape; use [`handler_fn`]
/// for synchronous ones.
///
/// ```ignore
/// router.get("/users/:id", async_handler(|req, res| Box::pin(async move {
///     let user = load_user(req.params.require("id")?).await?;
///     res.json(&user)?;
///     Ok(Next::End)
/// })));
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Runs the handler.
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response)
        -> BoxFuture<'a, HandlerResult>;
}

/// An error handler. Only runs while an error is propagating.
pub trait ErrorHandler: Send + Sync + 'static {
    /// Runs the handler. Returning [`Next::Continue`] consumes the error.
    fn call<'a>(
        &'a self,
        err: RouterError,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, HandlerResult>;
}

/// A param callback, run before the first layer that captures the param.
pub trait ParamHandler: Send + Sync + 'static {
    /// Runs the callback with the decoded value of the param.
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        value: String,
    ) -> BoxFuture<'a, HandlerResult>;
}

/// Handler built from a synchronous closure.
pub struct FnHandler<F>(F);

/// Handler built from a closure returning a boxed future.
pub struct AsyncFnHandler<F>(F);

/// Wraps a synchronous closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
{
    FnHandler(f)
}

/// Wraps an async closure as a [`Handler`].
pub fn async_handler<F>(f: F) -> AsyncFnHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    AsyncFnHandler(f)
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(ready((self.0)(req, res)))
    }
}

impl<F> Handler for AsyncFnHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, HandlerResult> {
        (self.0)(req, res)
    }
}

/// Error handler built from a synchronous closure.
pub struct FnErrorHandler<F>(F);

/// Error handler built from a closure returning a boxed future.
pub struct AsyncFnErrorHandler<F>(F);

/// Wraps a synchronous closure as an [`ErrorHandler`].
pub fn error_handler_fn<F>(f: F) -> FnErrorHandler<F>
where
    F: Fn(RouterError, &mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
{
    FnErrorHandler(f)
}

/// Wraps an async closure as an [`ErrorHandler`].
pub fn async_error_handler<F>(f: F) -> AsyncFnErrorHandler<F>
where
    F: for<'a> Fn(RouterError, &'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    AsyncFnErrorHandler(f)
}

impl<F> ErrorHandler for FnErrorHandler<F>
where
    F: Fn(RouterError, &mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
{
    fn call<'a>(
        &'a self,
        err: RouterError,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(ready((self.0)(err, req, res)))
    }
}

impl<F> ErrorHandler for AsyncFnErrorHandler<F>
where
    F: for<'a> Fn(RouterError, &'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        err: RouterError,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, HandlerResult> {
        (self.0)(err, req, res)
    }
}

/// Param callback built from a synchronous closure.
pub struct FnParamHandler<F>(F);

/// Param callback built from a closure returning a boxed future.
pub struct AsyncFnParamHandler<F>(F);

/// Wraps a synchronous closure as a [`ParamHandler`].
pub fn param_fn<F>(f: F) -> FnParamHandler<F>
where
    F: Fn(&mut Request, &mut Response, String) -> HandlerResult + Send + Sync + 'static,
{
    FnParamHandler(f)
}

/// Wraps an async closure as a [`ParamHandler`].
pub fn async_param<F>(f: F) -> AsyncFnParamHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, String) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    AsyncFnParamHandler(f)
}

impl<F> ParamHandler for FnParamHandler<F>
where
    F: Fn(&mut Request, &mut Response, String) -> HandlerResult + Send + Sync + 'static,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        value: String,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(ready((self.0)(req, res, value)))
    }
}

impl<F> ParamHandler for AsyncFnParamHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, String) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        value: String,
    ) -> BoxFuture<'a, HandlerResult> {
        (self.0)(req, res, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_handler() {
        let h = handler_fn(|req, res| {
            res.send_text(format!("hello {}", req.url));
            Ok(Next::End)
        });
        let mut req = Request::get("/x");
        let mut res = Response::new();
        let next = h.call(&mut req, &mut res).await.unwrap();
        assert!(matches!(next, Next::End));
        assert_eq!(res.body_string(), Some("hello /x".to_string()));
    }

    #[tokio::test]
    async fn test_async_handler_borrows_request() {
        let h = async_handler(|req, _res| {
            Box::pin(async move {
                tokio::task::yield_now().await;
                req.params.insert("seen", "yes");
                Ok::<_, RouterError>(Next::Continue)
            })
        });
        let mut req = Request::get("/x");
        let mut res = Response::new();
        h.call(&mut req, &mut res).await.unwrap();
        assert_eq!(req.params.get("seen"), Some("yes"));
    }

    #[tokio::test]
    async fn test_error_handler_receives_error() {
        let h = error_handler_fn(|err, _req, res| {
            res.set_status(err.status_code());
            Ok(Next::End)
        });
        let mut req = Request::get("/x");
        let mut res = Response::new();
        h.call(RouterError::status(418, "teapot"), &mut req, &mut res)
            .await
            .unwrap();
        assert_eq!(res.status, 418);
    }

    #[tokio::test]
    async fn test_param_handler_receives_value() {
        let h = param_fn(|req, _res, value| {
            req.params.insert("upper", value.to_uppercase());
            Ok(Next::Continue)
        });
        let mut req = Request::get("/x");
        let mut res = Response::new();
        h.call(&mut req, &mut res, "tj".to_string()).await.unwrap();
        assert_eq!(req.params.get("upper"), Some("TJ"));
    }
}
