//! Dispatch overhead benchmark.
//!
//! Measures one `Connection::call` round trip over an in-memory transport:
//! envelope encoding, id allocation, response decoding and error mapping.
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::collections::VecDeque;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use jujulib::{AuthCredentials, Connection, Error, Result, RetryPolicy, Transport};
use serde_json::{Value, json};
use tokio::runtime::Runtime;

// ============================================================================
// Loopback Transport
// ============================================================================

/// Answers every request immediately with a payload of `payload_len` entries.
struct Loopback {
    payload: Value,
    replies: VecDeque<String>,
}

impl Loopback {
    fn new(payload_len: usize) -> Self {
        let machines: serde_json::Map<String, Value> = (0..payload_len)
            .map(|i| (i.to_string(), json!({"Id": i.to_string(), "InstanceId": "i-0"})))
            .collect();

        Self {
            payload: json!({"Machines": machines}),
            replies: VecDeque::new(),
        }
    }
}

#[async_trait]
impl Transport for Loopback {
    async fn send(&mut self, text: String) -> Result<()> {
        let request: Value = serde_json::from_str(&text)?;

        let reply = if request["Request"] == "Login" {
            json!({
                "RequestId": request["RequestId"],
                "Response": {"facades": [{"Name": "Client", "Versions": [0, 1]}]}
            })
        } else {
            json!({"RequestId": request["RequestId"], "Response": self.payload})
        };

        self.replies.push_back(reply.to_string());
        Ok(())
    }

    async fn receive(&mut self) -> Result<String> {
        self.replies.pop_front().ok_or(Error::ConnectionClosed)
    }
}

// ============================================================================
// Benchmark Parameters
// ============================================================================

const PAYLOAD_SIZES: &[usize] = &[0, 10, 1000];

// ============================================================================
// Benchmark: Call Round Trip
// ============================================================================

fn bench_call(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("call");

    for &size in PAYLOAD_SIZES {
        let credentials = AuthCredentials::new("user-admin", "pw");
        let conn = rt
            .block_on(Connection::from_transport(
                Loopback::new(size),
                &credentials,
                RetryPolicy::disabled(),
            ))
            .expect("login");

        group.bench_with_input(BenchmarkId::new("full_status", size), &conn, |b, conn| {
            b.to_async(&rt).iter(|| async {
                conn.call("Client", "FullStatus", json!({}), Some(1))
                    .await
                    .expect("call")
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_call);
criterion_main!(benches);
