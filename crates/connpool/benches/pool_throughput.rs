// Pool throughput benchmarks.
//
// Measures raw checkout/check-in overhead with a zero-cost handle
// (no I/O, instant dial and close).

use std::hint::black_box;

use connpool::{BoxError, Config, Factory, Handle, Pool};
use criterion::{Criterion, criterion_group, criterion_main};

// -- Minimal no-op handle for benchmarking pool overhead only --

struct NoOpHandle;

impl Handle for NoOpHandle {
    async fn close(self) -> Result<(), BoxError> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

struct NoOpFactory;

impl Factory for NoOpFactory {
    type Handle = NoOpHandle;
    type Param = ();

    async fn create(&self, _param: &()) -> Result<NoOpHandle, BoxError> {
        Ok(NoOpHandle)
    }
}

fn pool(max_active: usize, wait: bool) -> Pool<NoOpFactory> {
    Pool::new(
        "bench-noop",
        Config::new(NoOpFactory, ())
            .max_idle(64)
            .max_active(max_active)
            .wait(wait),
    )
}

fn single_thread_get_put(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");
    let pool = pool(0, false);

    c.bench_function("single_thread_get_put", |b| {
        b.to_async(&rt).iter(|| {
            let pool = pool.clone();
            async move {
                let h = pool.get().await.unwrap();
                pool.put(black_box(h)).await.unwrap();
            }
        });
    });
}

fn contended_waiting_get_put(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("failed to build runtime");

    // Small bound to create contention on the admission semaphore.
    let pool = pool(4, true);

    c.bench_function("contended_get_put_4slots", |b| {
        b.to_async(&rt).iter(|| {
            let pool = pool.clone();
            async move {
                let mut set = tokio::task::JoinSet::new();
                for _ in 0..8 {
                    let pool = pool.clone();
                    set.spawn(async move {
                        let h = pool.get().await.unwrap();
                        tokio::task::yield_now().await;
                        pool.put(h).await.unwrap();
                    });
                }
                while set.join_next().await.is_some() {}
            }
        });
    });
}

criterion_group!(benches, single_thread_get_put, contended_waiting_get_put);
criterion_main!(benches);
