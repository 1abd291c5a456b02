#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use oxide_dispatch::{
    error_handler_fn, handler_fn, ErrorHandler, Handler, Next, Outcome, Request, Response, Result,
    Router,
};

/// Records what handlers saw, in call order.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Handler that records `label url [base_url]` and continues.
    pub fn visit(&self, label: &str) -> impl Handler {
        let log = self.clone();
        let label = label.to_string();
        handler_fn(move |req, _res| {
            log.push(format!("{label} {} [{}]", req.url, req.base_url));
            Ok(Next::Continue)
        })
    }

    /// Error handler that records `label: error` and passes the error on.
    pub fn visit_error(&self, label: &str) -> impl ErrorHandler {
        let log = self.clone();
        let label = label.to_string();
        error_handler_fn(move |err, _req, _res| {
            log.push(format!("{label}: {err}"));
            Ok(Next::Fail(err))
        })
    }
}

/// Shared call counter.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handler that answers with a text body.
pub fn reply(body: &str) -> impl Handler {
    let body = body.to_string();
    handler_fn(move |_req, res| {
        res.send_text(body.clone());
        Ok(Next::End)
    })
}

/// Error handler that renders the error with its status code.
pub fn render_error() -> impl ErrorHandler {
    error_handler_fn(|err, _req, res| {
        res.set_status(err.status_code()).send_text(err.to_string());
        Ok(Next::End)
    })
}

/// Runs `req` through `router` and hands back everything afterwards.
pub async fn dispatch(router: &Router, mut req: Request) -> (Request, Response, Result<Outcome>) {
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res).await;
    (req, res, outcome)
}
