//! Performance benchmarks for tailing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use msgtail::{Batch, LocalRequestor, MessageModel, Notice, Server, TailCallback, Timestamp};
use parking_lot::Mutex;
use std::sync::Arc;

fn create_server(messages: i64) -> Arc<Server> {
    let server = Arc::new(Server::new());
    for i in 1..=messages {
        server.publish_at(Notice::new("bench", "", format!("message {}", i)), Timestamp(i));
    }
    server
}

fn counting_callback() -> (TailCallback, Arc<Mutex<usize>>) {
    let count = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&count);
    (
        Box::new(move |outcome: msgtail::Result<Batch>| {
            if let Ok(batch) = outcome {
                *sink.lock() += batch.len();
            }
        }),
        count,
    )
}

/// Benchmark full scrollback with varying page sizes
fn bench_reverse_scrollback(c: &mut Criterion) {
    let mut group = c.benchmark_group("reverse_scrollback");
    let server = create_server(5_000);
    let model = MessageModel::new(
        Arc::new(server.connect()),
        Arc::new(LocalRequestor::new(Arc::clone(&server))),
    );

    for page in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("page", page), &page, |b, &page| {
            b.iter(|| {
                let (callback, count) = counting_callback();
                let tail = model.new_reverse_tail(None, callback);
                let mut target = 0;
                while !tail.is_closed() {
                    target += page;
                    tail.expand_to(target);
                }
                black_box(*count.lock());
            });
        });
    }

    group.finish();
}

/// Benchmark forward catch-up over the local channel
fn bench_forward_catch_up(c: &mut Criterion) {
    let server = create_server(2_000);

    c.bench_function("forward_catch_up_2000", |b| {
        b.iter(|| {
            let channel = Arc::new(server.connect());
            let model = MessageModel::new(
                channel.clone(),
                Arc::new(LocalRequestor::new(Arc::clone(&server))),
            );
            let (callback, count) = counting_callback();
            let tail = model.new_tail(None, callback).unwrap();
            tail.expand_to(2_000).unwrap();
            server.serve_pending();
            channel.pump().unwrap();
            black_box(*count.lock());
        });
    });
}

criterion_group!(benches, bench_reverse_scrollback, bench_forward_catch_up);
criterion_main!(benches);
