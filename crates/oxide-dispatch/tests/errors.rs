//! Error propagation, error handlers and panics.

mod common;

use common::{dispatch, render_error, reply, Log};
use oxide_dispatch::{
    async_handler, error_handler_fn, handler_fn, Next, Outcome, Request, Router, RouterError,
};

#[tokio::test]
async fn test_panic_reaches_error_handler() {
    let mut app = Router::new();
    app.get("/boom", handler_fn(|_, _| panic!("kaboom")))
        .error_middleware(render_error());

    let res = app.serve(Request::get("/boom")).await;
    assert_eq!(res.status, 500);
    assert_eq!(res.body_string(), Some("handler panicked: kaboom".to_string()));
}

#[tokio::test]
async fn test_panic_while_polling_reaches_error_handler() {
    let mut app = Router::new();
    app.middleware(async_handler(|_req, _res| {
        Box::pin(async move {
            tokio::task::yield_now().await;
            let broken = true;
            if broken {
                panic!("after yield");
            }
            Ok::<_, RouterError>(Next::Continue)
        })
    }))
    .error_middleware(render_error());

    let res = app.serve(Request::get("/")).await;
    assert_eq!(res.body_string(), Some("handler panicked: after yield".to_string()));
}

#[tokio::test]
async fn test_async_error_after_await() {
    let log = Log::new();
    let mut app = Router::new();
    app.get(
        "/slow",
        async_handler(|_req, _res| {
            Box::pin(async move {
                tokio::task::yield_now().await;
                Err::<Next, _>(RouterError::status(504, "upstream timed out"))
            })
        }),
    )
    .get("/slow", log.visit("next route"))
    .error_middleware(render_error());

    let res = app.serve(Request::get("/slow")).await;
    assert_eq!(res.status, 504);
    assert_eq!(res.body_string(), Some("upstream timed out".to_string()));
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn test_errors_skip_normal_layers_and_routes() {
    let log = Log::new();
    let mut app = Router::new();
    app.middleware(handler_fn(|_, _| Err(RouterError::status(403, "forbidden"))))
        .middleware(log.visit("middleware"))
        .get("/", log.visit("route"))
        .error_middleware(render_error());

    let res = app.serve(Request::get("/")).await;
    assert_eq!(res.status, 403);
    assert_eq!(res.body_string(), Some("forbidden".to_string()));
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn test_error_handlers_skipped_without_error() {
    let log = Log::new();
    let mut app = Router::new();
    app.error_middleware(log.visit_error("early"))
        .get("/", reply("fine"));

    let res = app.serve(Request::get("/")).await;
    assert_eq!(res.body_string(), Some("fine".to_string()));
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn test_error_handler_can_recover() {
    let log = Log::new();
    let mut app = Router::new();
    app.middleware(handler_fn(|_, _| Ok(Next::Fail(RouterError::status(409, "conflict")))))
        .error_middleware(error_handler_fn(|_err, _req, _res| Ok(Next::Continue)))
        .middleware(log.visit("recovered"));

    let (_req, _res, outcome) = dispatch(&app, Request::get("/")).await;
    assert_eq!(outcome.unwrap(), Outcome::Unhandled);
    assert_eq!(log.entries(), vec!["recovered / []"]);
}

#[tokio::test]
async fn test_failing_error_handler_replaces_error() {
    let log = Log::new();
    let mut app = Router::new();
    app.middleware(handler_fn(|_, _| Err(RouterError::status(400, "first"))))
        .error_middleware(log.visit_error("seen"))
        .error_middleware(error_handler_fn(|_err, _req, _res| {
            Err(RouterError::status(502, "second"))
        }))
        .error_middleware(log.visit_error("then"));

    let (_req, _res, outcome) = dispatch(&app, Request::get("/")).await;
    let err = outcome.unwrap_err();
    assert_eq!(err.status_code(), 502);
    assert_eq!(log.entries(), vec!["seen: first", "then: second"]);
}

#[tokio::test]
async fn test_malformed_param_is_bad_request() {
    let log = Log::new();
    let mut app = Router::new();
    app.get("/users/:name", log.visit("route"));

    let res = app.serve(Request::get("/users/%zz")).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body_string(), Some("Bad Request".to_string()));
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn test_route_error_handler() {
    let mut app = Router::new();
    app.route("/orders")
        .post(handler_fn(|_, _| Err(RouterError::status(409, "duplicate"))))
        .error_handler(error_handler_fn(|err, _req, res| {
            res.set_status(err.status_code()).send_text("route caught");
            Ok(Next::End)
        }));

    let res = app.serve(Request::post("/orders")).await;
    assert_eq!(res.status, 409);
    assert_eq!(res.body_string(), Some("route caught".to_string()));
}

#[tokio::test]
async fn test_nested_error_reaches_parent_with_restored_url() {
    let mut api = Router::new();
    api.get("/users", handler_fn(|_, _| Err(RouterError::status(503, "db down"))));

    let mut app = Router::new();
    app.nest("/api", api).error_middleware(error_handler_fn(|err, req, res| {
        res.set_status(err.status_code())
            .send_text(format!("{} {err}", req.url));
        Ok(Next::End)
    }));

    let res = app.serve(Request::get("/api/users")).await;
    assert_eq!(res.status, 503);
    assert_eq!(res.body_string(), Some("/api/users db down".to_string()));
}

#[tokio::test]
async fn test_unhandled_error_surfaces_from_handle() {
    let mut app = Router::new();
    app.middleware(handler_fn(|_, _| {
        Err(RouterError::handler(std::io::Error::other("socket closed")))
    }));

    let (_req, res, outcome) = dispatch(&app, Request::get("/")).await;
    let err = outcome.unwrap_err();
    assert_eq!(err.to_string(), "socket closed");
    assert!(!res.is_sent());

    let res = app.serve(Request::get("/")).await;
    assert_eq!(res.status, 500);
    assert_eq!(res.body_string(), Some("Internal Server Error".to_string()));
}
