//! # Request Processor Benchmarks
//!
//! Round-trip cost of `send` over the in-process loopback peer:
//!
//! | Benchmark | Measures |
//! |-----------|----------|
//! | `send_single` | One caller, one request at a time |
//! | `send_concurrent` | N callers in flight at once |
//! | `pending_table` | Register + resolve without any transport |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::future::join_all;
use mux_core::{
    LoopbackConfig, LoopbackTransport, PendingCallTable, ProcessorConfig, Request, RequestId,
    RequestProcessor, RequestProcessorApi, Response,
};
use tokio_util::sync::CancellationToken;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

fn processor(rt: &tokio::runtime::Runtime) -> Arc<RequestProcessor<LoopbackTransport>> {
    let transport = Arc::new(LoopbackTransport::new(LoopbackConfig {
        queue_capacity: 1024,
        ..LoopbackConfig::for_testing()
    }));
    let processor = RequestProcessor::new(transport, ProcessorConfig::default()).unwrap();
    rt.block_on(processor.start(&CancellationToken::new()))
        .unwrap();
    Arc::new(processor)
}

fn bench_send_single(c: &mut Criterion) {
    let rt = runtime();
    let processor = processor(&rt);
    let cancel = CancellationToken::new();

    let mut group = c.benchmark_group("send");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(1));

    group.bench_function("send_single", |b| {
        b.iter(|| {
            rt.block_on(async {
                let response = processor.send(Request::fresh(), &cancel).await.unwrap();
                black_box(response)
            })
        })
    });
    group.finish();

    rt.block_on(processor.stop(&CancellationToken::new()))
        .unwrap();
}

fn bench_send_concurrent(c: &mut Criterion) {
    let rt = runtime();
    let processor = processor(&rt);

    let mut group = c.benchmark_group("send_concurrent");
    group.measurement_time(Duration::from_secs(5));

    for callers in [8usize, 64, 256] {
        group.throughput(Throughput::Elements(callers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(callers), &callers, |b, &n| {
            b.iter(|| {
                rt.block_on(async {
                    let calls = (0..n).map(|_| {
                        let processor = Arc::clone(&processor);
                        tokio::spawn(async move {
                            processor
                                .send(Request::fresh(), &CancellationToken::new())
                                .await
                        })
                    });
                    for joined in join_all(calls).await {
                        black_box(joined.unwrap().unwrap());
                    }
                })
            })
        });
    }
    group.finish();

    rt.block_on(processor.stop(&CancellationToken::new()))
        .unwrap();
}

fn bench_pending_table(c: &mut Criterion) {
    let table = PendingCallTable::new();

    c.bench_function("pending_table/register_resolve", |b| {
        b.iter(|| {
            let id = RequestId::new();
            let mut slot = table.register(id).unwrap();
            table.resolve(Response::new(id, Vec::new()));
            black_box(slot.try_take())
        })
    });
}

criterion_group!(
    benches,
    bench_send_single,
    bench_send_concurrent,
    bench_pending_table
);
criterion_main!(benches);
