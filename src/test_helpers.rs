//! Shared test helpers: an in-memory transport that replays scripted replies
//! and records every request it receives.

use crate::error::{Error, Result};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted reply
#[derive(Clone, Debug)]
pub(crate) enum Reply {
    /// Return this status and body
    Respond(u16, Vec<u8>),
    /// Fail with a transport fault
    Fault(String),
}

impl Reply {
    pub(crate) fn json(status: u16, value: serde_json::Value) -> Self {
        Reply::Respond(status, serde_json::to_vec(&value).unwrap())
    }

    pub(crate) fn status(status: u16) -> Self {
        Reply::Respond(status, Vec::new())
    }

    pub(crate) fn bytes(body: impl Into<Vec<u8>>) -> Self {
        Reply::Respond(200, body.into())
    }
}

struct Route {
    method: Method,
    url: String,
    replies: VecDeque<Reply>,
}

/// Transport that answers by exact method + URL
///
/// Each route holds a queue of replies; the last reply repeats once the queue
/// drains. Unrouted requests get a 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(&self, method: Method, url: impl Into<String>, replies: Vec<Reply>) {
        self.routes.lock().unwrap().push(Route {
            method,
            url: url.into(),
            replies: replies.into(),
        });
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// "METHOD url" for every recorded request, in order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            routes
                .iter_mut()
                .find(|r| r.method == request.method && r.url == request.url)
                .map(|route| {
                    if route.replies.len() > 1 {
                        route.replies.pop_front().unwrap()
                    } else {
                        route.replies.front().cloned().unwrap()
                    }
                })
        };

        match reply {
            Some(Reply::Respond(status, body)) => Ok(HttpResponse { status, body }),
            Some(Reply::Fault(message)) => Err(Error::Transport {
                url: request.url,
                message,
            }),
            None => Ok(HttpResponse {
                status: 404,
                body: Vec::new(),
            }),
        }
    }
}
