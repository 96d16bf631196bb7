//! Benchmarks the Request Multiplexer's id-correlation hot path (§4.2):
//! round-tripping a `call()` against a `MockTransport` that echoes every
//! outbound frame straight back as its own response. Continues the
//! teacher workspace's `benches/` convention of a criterion harness per
//! hot path rather than one monolithic suite.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use mcp_gateway_client::RequestMultiplexer;
use mcp_gateway_transport::{MockTransport, Transport};

async fn round_trip(mux: &RequestMultiplexer, mock: &MockTransport) {
    let call = mux.call(
        "ping",
        None,
        Duration::from_secs(5),
        &CancellationToken::new(),
    );
    tokio::pin!(call);

    loop {
        tokio::select! {
            result = &mut call => {
                result.expect("mock transport always answers its own request");
                return;
            }
            (id, _method) = mock.await_next_request() => {
                mock.deliver(format!(r#"{{"jsonrpc":"2.0","id":"{id}","result":{{}}}}"#)).await;
            }
        }
    }
}

fn bench_call_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");

    c.bench_function("multiplexer_call_round_trip", |b| {
        b.to_async(&rt).iter(|| async {
            let mock = Arc::new(MockTransport::new());
            let inbound = mock.open().await.expect("mock open never fails");
            let (notif_tx, _notif_rx) = tokio::sync::mpsc::channel(8);
            let mux = RequestMultiplexer::spawn(Arc::clone(&mock) as Arc<dyn Transport>, inbound, notif_tx);
            black_box(round_trip(&mux, &mock).await);
        });
    });
}

criterion_group!(benches, bench_call_round_trip);
criterion_main!(benches);
