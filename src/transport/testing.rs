//! Scripted in-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::protocol::{Request, Response};

use super::Transport;

type Responder = Box<dyn FnMut(&Request) -> Result<Response> + Send>;

struct ScriptState {
    responder: Responder,
    sent: Vec<Request>,
    pending: VecDeque<Result<String>>,
    closed: bool,
}

/// Answers each request with the result of a responder closure.
///
/// Clones share state, so a test can keep one handle while the connection
/// owns the other.
#[derive(Clone)]
pub(crate) struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    pub(crate) fn new(responder: impl FnMut(&Request) -> Result<Response> + Send + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                responder: Box::new(responder),
                sent: Vec::new(),
                pending: VecDeque::new(),
                closed: false,
            })),
        }
    }

    /// A server that accepts login v2 and answers every other call with
    /// `{"Request": <method>}`.
    pub(crate) fn server(facades: Value) -> Self {
        Self::new(move |request| {
            if request.facade == "Admin" && request.method == "Login" {
                Ok(Response::success(json!({ "facades": facades.clone() })))
            } else {
                Ok(Response::success(json!({ "Request": request.method })))
            }
        })
    }

    pub(crate) fn sent(&self) -> Vec<Request> {
        self.state.lock().sent.clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        let mut state = self.state.lock();
        let request: Request = serde_json::from_str(&text)?;
        let reply = (state.responder)(&request)
            .and_then(|response| serde_json::to_string(&response).map_err(Error::from));
        state.sent.push(request);
        state.pending.push_back(reply);
        Ok(())
    }

    async fn receive(&mut self) -> Result<String> {
        self.state
            .lock()
            .pending
            .pop_front()
            .unwrap_or(Err(Error::ConnectionClosed))
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}
