//! Param callbacks and their per-request memoization.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handler::{Next, ParamHandler};
use crate::layer::Invocation;
use crate::path::PathPattern;
use crate::request::Request;
use crate::response::Response;

/// Callbacks registered with `Router::param`, keyed by param name.
#[derive(Default)]
pub(crate) struct ParamRegistry {
    callbacks: HashMap<String, Vec<Arc<dyn ParamHandler>>>,
}

/// What a router remembers about a param it already processed while
/// dispatching one request.
struct Called {
    /// Value the callbacks ran for.
    matched: String,
    /// Value left in `req.params` after the last callback.
    value: Option<String>,
    /// Signal that stopped the callbacks, re-raised for the same value.
    stopped: Option<Next>,
}

/// Params processed by one router during one request.
#[derive(Default)]
pub(crate) struct CalledParams {
    called: HashMap<String, Called>,
}

impl ParamRegistry {
    /// Appends a callback for `name`. A leading `:` is ignored.
    pub(crate) fn register(&mut self, name: &str, callback: Arc<dyn ParamHandler>) {
        let name = name.strip_prefix(':').unwrap_or(name);
        tracing::debug!(param = name, "param callback registered");
        self.callbacks
            .entry(name.to_string())
            .or_default()
            .push(callback);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Runs the callbacks for every named capture of `pattern`.
    ///
    /// Returns `None` once all params are processed, or the signal that
    /// stopped processing. A param whose value was already processed by this
    /// router in the current request is not run again: its stored value is
    /// put back and any stored stop signal is raised again.
    pub(crate) async fn process(
        &self,
        called: &mut CalledParams,
        pattern: &PathPattern,
        req: &mut Request,
        res: &mut Response,
    ) -> Option<Next> {
        if self.is_empty() {
            return None;
        }

        for name in pattern.param_names() {
            let Some(value) = req.params.get(name).map(str::to_string) else {
                continue;
            };
            let Some(callbacks) = self.callbacks.get(name) else {
                continue;
            };

            if let Some(prev) = called.called.get(name) {
                if prev.matched == value {
                    restore(req, name, prev.value.as_deref());
                    match &prev.stopped {
                        Some(signal) => return Some(signal.clone()),
                        None => continue,
                    }
                }
            }

            let mut entry = Called {
                matched: value.clone(),
                value: Some(value.clone()),
                stopped: None,
            };
            let mut stopped = None;
            for callback in callbacks {
                tracing::trace!(param = name, value = %value, "running param callback");
                let next = Invocation::Param {
                    callback: callback.as_ref(),
                    value: value.clone(),
                }
                .run(req, res)
                .await;
                entry.value = req.params.get(name).map(str::to_string);
                match next {
                    Next::Continue => {}
                    Next::End => {
                        stopped = Some(Next::End);
                        break;
                    }
                    signal => {
                        entry.stopped = Some(signal.clone());
                        stopped = Some(signal);
                        break;
                    }
                }
            }
            called.called.insert(name.to_string(), entry);
            if stopped.is_some() {
                return stopped;
            }
        }
        None
    }
}

fn restore(req: &mut Request, name: &str, value: Option<&str>) {
    match value {
        Some(value) => req.params.insert(name, value),
        None => {
            req.params.remove(name);
        }
    }
}

impl fmt::Debug for ParamRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.callbacks.keys().collect();
        names.sort();
        f.debug_struct("ParamRegistry").field("params", &names).finish()
    }
}
