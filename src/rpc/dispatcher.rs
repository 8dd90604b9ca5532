//! Request dispatch and upgrade retry.
//!
//! The dispatcher turns one call into one envelope exchange. It owns the
//! transport and the connection's request id counter.
//!
//! # Upgrade Retry
//!
//! While the server is being upgraded it answers most requests with an
//! error containing `"upgrade in progress"`. Such responses are retried
//! with the same envelope (same request id) after a fixed delay, up to
//! [`RetryPolicy::max_retries`] times. When retries run out the last
//! upgrading error is returned to the caller.
//!
//! # Failure
//!
//! Responses are matched to requests by arrival order, so a transport error
//! or a response echoing another request's id leaves the stream out of
//! step. The dispatcher then refuses every further call with
//! [`Error::ConnectionClosed`].

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::{Value, from_str, to_string};
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Request, Response, params_from_value};
use crate::transport::Transport;

// ============================================================================
// Constants
// ============================================================================

/// Default number of retries while the server is upgrading.
pub const DEFAULT_UPGRADE_RETRIES: u32 = 60;

/// Default delay between upgrade retries.
pub const DEFAULT_UPGRADE_RETRY_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// RetryPolicy
// ============================================================================

/// Bounds for the upgrade retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial send.
    pub max_retries: u32,
    /// Wait before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_UPGRADE_RETRIES,
            delay: DEFAULT_UPGRADE_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a retry policy.
    #[inline]
    #[must_use]
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Retries without waiting.
    #[inline]
    #[must_use]
    pub const fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO)
    }

    /// Never retries.
    #[inline]
    #[must_use]
    pub const fn disabled() -> Self {
        Self::immediate(0)
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Sends calls over a transport, one at a time.
///
/// Request ids start at 0 and are incremented for every call, whether it
/// succeeds or fails. Calls rejected before anything is sent use no id.
pub struct Dispatcher<T> {
    /// Transport carrying the envelopes.
    transport: T,
    /// Id for the next call.
    next_id: RequestId,
    /// Upgrade retry bounds.
    retry: RetryPolicy,
    /// Set once the response stream can no longer be trusted.
    broken: bool,
}

impl<T> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("next_id", &self.next_id)
            .field("retry", &self.retry)
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher whose first call gets id 0.
    #[must_use]
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        Self {
            transport,
            next_id: RequestId::FIRST,
            retry,
            broken: false,
        }
    }

    /// Returns the id the next call will use.
    #[inline]
    #[must_use]
    pub fn next_request_id(&self) -> RequestId {
        self.next_id
    }

    /// Returns `true` once a transport error or a mismatched response made
    /// the dispatcher unusable.
    #[inline]
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Returns the upgrade retry policy.
    #[inline]
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Calls `facade.method` and returns the response payload.
    ///
    /// `params` must be a JSON object or `null`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if an earlier call broke the dispatcher (no id is used)
    /// - [`Error::InvalidArgument`](crate::Error::InvalidArgument) if `params` is not an object (no id is used)
    /// - [`Error::Protocol`](crate::Error::Protocol) if the response echoes another request's id
    /// - [`Error::UnimplementedMethod`](crate::Error::UnimplementedMethod) if the server does not know the method
    /// - [`Error::Server`](crate::Error::Server) for other server errors, including an upgrade that outlasted the retries
    /// - transport and JSON errors from the exchange
    pub async fn call(
        &mut self,
        facade: &str,
        method: &str,
        params: Value,
        version: Option<u32>,
    ) -> Result<Value> {
        if self.broken {
            return Err(Error::ConnectionClosed);
        }

        let params = params_from_value(params)?;
        let request = Request::new(self.allocate_id(), facade, method, params, version);

        self.send_with_upgrade_retry(&request)
            .await?
            .into_result()
    }

    /// Sends `request`, resending it while the server reports an upgrade.
    ///
    /// Returns the first response that is not an upgrade error, or the last
    /// upgrade error once the retry budget is spent.
    async fn send_with_upgrade_retry(&mut self, request: &Request) -> Result<Response> {
        let mut retries = 0;

        loop {
            let response = self.round_trip(request).await?;

            if !response.is_upgrade_in_progress() || retries >= self.retry.max_retries {
                return Ok(response);
            }

            retries += 1;
            info!(
                request_id = %request.id,
                retry = retries,
                max_retries = self.retry.max_retries,
                "Juju upgrade in progress"
            );
            sleep(self.retry.delay).await;
        }
    }

    /// Closes the transport.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }

    /// Consumes the dispatcher, returning the transport.
    #[must_use]
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Post-increments the request id counter.
    fn allocate_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    /// Exchanges one envelope pair, marking the dispatcher broken when the
    /// stream falls out of step.
    async fn round_trip(&mut self, request: &Request) -> Result<Response> {
        let result = self.exchange(request).await;

        if let Err(e) = &result
            && (e.is_transport_error() || matches!(e, Error::Protocol { .. }))
        {
            warn!(request_id = %request.id, error = %e, "Dispatcher unusable after error");
            self.broken = true;
        }

        result
    }

    async fn exchange(&mut self, request: &Request) -> Result<Response> {
        let json = to_string(request)?;

        debug!(
            request_id = %request.id,
            facade = %request.facade,
            method = %request.method,
            version = ?request.version,
            "rpc request"
        );

        self.transport.send(json).await?;
        let raw = self.transport.receive().await?;

        trace!(request_id = %request.id, body = %raw, "rpc response");

        let response: Response = from_str(&raw)?;

        if let Some(echoed) = response.id
            && echoed != request.id
        {
            return Err(Error::protocol(format!(
                "response for request {echoed} arrived while waiting for {}",
                request.id
            )));
        }

        debug!(
            request_id = %request.id,
            error = ?response.error,
            "rpc response"
        );

        Ok(response)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    use crate::transport::testing::ScriptedTransport;

    fn dispatcher(transport: &ScriptedTransport, retry: RetryPolicy) -> Dispatcher<ScriptedTransport> {
        Dispatcher::new(transport.clone(), retry)
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 60);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_call_builds_envelope() {
        let transport = ScriptedTransport::new(|_| Ok(Response::success(json!({"x": 1}))));
        let mut rpc = dispatcher(&transport, RetryPolicy::disabled());

        let result = rpc
            .call("Client", "FullStatus", json!({"Patterns": []}), Some(1))
            .await
            .expect("call");

        assert_eq!(result, json!({"x": 1}));
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].facade, "Client");
        assert_eq!(sent[0].method, "FullStatus");
        assert_eq!(sent[0].id, RequestId::FIRST);
        assert_eq!(sent[0].version, Some(1));
        assert_eq!(sent[0].params.get("Patterns"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_null_params_become_empty_object() {
        let transport = ScriptedTransport::new(|_| Ok(Response::success(json!({}))));
        let mut rpc = dispatcher(&transport, RetryPolicy::disabled());

        rpc.call("Pinger", "Ping", Value::Null, None).await.expect("call");

        assert!(transport.sent()[0].params.is_empty());
        assert_eq!(transport.sent()[0].version, None);
    }

    #[tokio::test]
    async fn test_invalid_params_do_not_consume_id() {
        let transport = ScriptedTransport::new(|_| Ok(Response::success(json!({}))));
        let mut rpc = dispatcher(&transport, RetryPolicy::disabled());

        let err = rpc.call("Client", "X", json!([1, 2]), None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert_eq!(rpc.next_request_id(), RequestId::FIRST);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_error_response_raises_server_error() {
        let transport =
            ScriptedTransport::new(|_| Ok(Response::failure(Some("boom"), "bad")));
        let mut rpc = dispatcher(&transport, RetryPolicy::disabled());

        match rpc.call("Client", "FullStatus", Value::Null, None).await {
            Err(Error::Server { code, message }) => {
                assert_eq!(code.as_deref(), Some("boom"));
                assert_eq!(message, "bad");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upgrade_retry_then_success() {
        const K: usize = 5;
        let mut answered = 0;
        let transport = ScriptedTransport::new(move |_| {
            answered += 1;
            if answered <= K {
                Ok(Response::failure(None, "upgrade in progress"))
            } else {
                Ok(Response::success(json!({"ok": true})))
            }
        });
        let mut rpc = dispatcher(&transport, RetryPolicy::immediate(60));

        let result = rpc
            .call("Client", "FullStatus", Value::Null, None)
            .await
            .expect("call");

        assert_eq!(result, json!({"ok": true}));
        let sent = transport.sent();
        assert_eq!(sent.len(), K + 1);
        assert!(sent.iter().all(|r| r.id == RequestId::FIRST));
        assert_eq!(rpc.next_request_id(), RequestId::new(1));
    }

    #[tokio::test]
    async fn test_upgrade_retry_exhausted() {
        let transport = ScriptedTransport::new(|_| {
            Ok(Response::failure(None, "upgrade in progress"))
        });
        let mut rpc = dispatcher(&transport, RetryPolicy::immediate(60));

        let err = rpc
            .call("Client", "FullStatus", Value::Null, None)
            .await
            .unwrap_err();

        assert!(err.is_upgrade_in_progress());
        assert_eq!(transport.sent().len(), 61);
    }

    #[tokio::test]
    async fn test_upgrade_retry_returns_last_envelope() {
        let transport = ScriptedTransport::new(|_| {
            Ok(Response::failure(Some("upgrading"), "upgrade in progress"))
        });
        let mut rpc = dispatcher(&transport, RetryPolicy::immediate(3));

        let err = rpc.call("Client", "X", Value::Null, None).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Server { code: Some(ref code), .. } if code == "upgrading"
        ));
        assert_eq!(transport.sent().len(), 4);
        assert!(!rpc.is_broken());
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let transport =
            ScriptedTransport::new(|_| Ok(Response::failure(None, "permission denied")));
        let mut rpc = dispatcher(&transport, RetryPolicy::immediate(60));

        let _ = rpc.call("Client", "FullStatus", Value::Null, None).await;
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let transport = ScriptedTransport::new(|_| Err(Error::ConnectionClosed));
        let mut rpc = dispatcher(&transport, RetryPolicy::disabled());

        let err = rpc.call("Client", "X", Value::Null, None).await.unwrap_err();
        assert!(err.is_transport_error());
    }

    #[tokio::test]
    async fn test_transport_error_breaks_dispatcher() {
        let mut answered = 0;
        let transport = ScriptedTransport::new(move |_| {
            answered += 1;
            if answered == 1 {
                Err(Error::timeout("receive response", 50))
            } else {
                Ok(Response::success(json!({"late": true})))
            }
        });
        let mut rpc = dispatcher(&transport, RetryPolicy::disabled());

        let first = rpc.call("Client", "Slow", Value::Null, None).await;
        assert!(matches!(first, Err(Error::Timeout { .. })));
        assert!(rpc.is_broken());

        let second = rpc.call("Client", "Fast", Value::Null, None).await;
        assert!(matches!(second, Err(Error::ConnectionClosed)));
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(rpc.next_request_id(), RequestId::new(1));
    }

    #[tokio::test]
    async fn test_mismatched_response_id_breaks_dispatcher() {
        let transport = ScriptedTransport::new(|_| {
            Ok(Response {
                id: Some(RequestId::new(7)),
                ..Response::success(json!({}))
            })
        });
        let mut rpc = dispatcher(&transport, RetryPolicy::disabled());

        let err = rpc.call("Client", "X", Value::Null, None).await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));

        let err = rpc.call("Client", "X", Value::Null, None).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_matching_response_id_accepted() {
        let transport = ScriptedTransport::new(|request| {
            Ok(Response {
                id: Some(request.id),
                ..Response::success(json!({"ok": true}))
            })
        });
        let mut rpc = dispatcher(&transport, RetryPolicy::disabled());

        for _ in 0..3 {
            rpc.call("Client", "X", Value::Null, None).await.expect("call");
        }
        assert!(!rpc.is_broken());
    }

    #[tokio::test]
    async fn test_server_error_keeps_dispatcher_usable() {
        let transport =
            ScriptedTransport::new(|_| Ok(Response::failure(Some("boom"), "bad")));
        let mut rpc = dispatcher(&transport, RetryPolicy::disabled());

        let _ = rpc.call("Client", "X", Value::Null, None).await;
        let _ = rpc.call("Client", "X", Value::Null, None).await;

        assert!(!rpc.is_broken());
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_close_closes_transport() {
        let transport = ScriptedTransport::new(|_| Ok(Response::success(json!({}))));
        let mut rpc = dispatcher(&transport, RetryPolicy::disabled());

        rpc.close().await.expect("close");
        assert!(transport.is_closed());
    }

    proptest! {
        #[test]
        fn prop_request_ids_are_sequential(outcomes in proptest::collection::vec(any::<bool>(), 1..40)) {
            let script = outcomes.clone();
            let mut index = 0;
            let transport = ScriptedTransport::new(move |_| {
                let ok = script[index];
                index += 1;
                if ok {
                    Ok(Response::success(json!({})))
                } else {
                    Ok(Response::failure(Some("boom"), "bad"))
                }
            });
            let mut rpc = dispatcher(&transport, RetryPolicy::disabled());

            tokio_test::block_on(async {
                for _ in &outcomes {
                    let _ = rpc.call("Client", "X", Value::Null, None).await;
                }
            });

            let ids: Vec<u64> = transport.sent().iter().map(|r| r.id.get()).collect();
            let expected: Vec<u64> = (0..outcomes.len() as u64).collect();
            prop_assert_eq!(ids, expected);
        }
    }
}
