//! TCP connection pool example
//!
//! Starts a local echo server and pools client connections to it.
//!
//! ```text
//! RUST_LOG=connpool=trace cargo run --example tcp_pool
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use connpool::{BoxError, Config, Context, Handle, Pool, factory_fn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

/// Pooled client connection.
struct TcpHandle {
    stream: TcpStream,
    broken: Arc<AtomicBool>,
}

impl TcpHandle {
    async fn echo(&mut self, msg: &[u8]) -> std::io::Result<Vec<u8>> {
        let result = async {
            self.stream.write_all(msg).await?;
            let mut buf = vec![0; msg.len()];
            self.stream.read_exact(&mut buf).await?;
            Ok::<_, std::io::Error>(buf)
        }
        .await;
        if result.is_err() {
            self.broken.store(true, Ordering::SeqCst);
        }
        result
    }
}

impl Handle for TcpHandle {
    async fn close(mut self) -> Result<(), BoxError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }
}

async fn echo_server() -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut rd, mut wr) = socket.split();
                let _ = tokio::io::copy(&mut rd, &mut wr).await;
            });
        }
    });
    Ok(addr)
}

/// Dial a pooled client connection.
///
/// A named `async fn` rather than a closure inside `main`: a closure there
/// makes the pool type fail the `Send` check for `JoinSet::spawn`.
async fn connect(addr: String) -> Result<TcpHandle, BoxError> {
    let stream = TcpStream::connect(&addr).await?;
    Ok(TcpHandle {
        stream,
        broken: Arc::new(AtomicBool::new(false)),
    })
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr = echo_server().await?;

    let factory = factory_fn(connect);
    let pool = Pool::new(
        "echo",
        Config::new(factory, addr).max_idle(2).max_active(4).wait(true),
    );

    let mut workers = tokio::task::JoinSet::new();
    for worker in 0..8u8 {
        let pool = pool.clone();
        workers.spawn(async move {
            let ctx = Context::background().with_timeout(Duration::from_secs(2));
            let mut conn = pool.get_with(&ctx).await?;
            let reply = conn.echo(&[worker; 4]).await?;
            assert_eq!(reply, [worker; 4]);
            pool.put(conn).await?;
            Ok::<_, BoxError>(())
        });
    }
    while let Some(result) = workers.join_next().await {
        result??;
    }

    let stats = pool.stats();
    println!(
        "active={} idle={} created={} waits={} waited={:?}",
        stats.active, stats.idle, stats.created, stats.wait_count, stats.wait_duration
    );

    pool.close().await;
    Ok(())
}
