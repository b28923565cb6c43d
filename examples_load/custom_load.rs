use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use opentelemetry::Context;
use tracing_jsonlog::{Attr, BufferPool, Handler, Level, Record};

const TASKS: u64 = 8;
const PER_TASK: u64 = 50_000;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let pool = Arc::new(BufferPool::new());
    let root = Handler::with_pool(Level::INFO, io::sink(), Arc::clone(&pool))
        .with_attrs(&[Attr::new("service", "load")])
        .with_group("worker");

    let start = Instant::now();

    let mut tasks = Vec::new();
    for task in 0..TASKS {
        let handler = root.with_attrs(&[Attr::new("task", task)]);
        tasks.push(tokio::spawn(async move {
            let cx = Context::new();
            for i in 0..PER_TASK {
                let record = Record::new(Level::ERROR, "custom load test error")
                    .attr(Attr::new("iteration", i))
                    .attr(Attr::group("empty", []));
                if let Err(e) = handler.emit(&cx, &record) {
                    eprintln!("emit failed: {}", e);
                }
            }
        }));
    }
    for task in tasks {
        task.await.expect("load task panicked");
    }

    let n = TASKS * PER_TASK;
    let elapsed = start.elapsed();
    println!("custom config: wrote {} events from {} tasks in {:?} (~{:.0} ev/s)",
        n,
        TASKS,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
    println!("buffer pool: acquired={} reused={} released={} discarded={} idle={}",
        pool.acquired.load(Ordering::Relaxed),
        pool.reused.load(Ordering::Relaxed),
        pool.released.load(Ordering::Relaxed),
        pool.discarded.load(Ordering::Relaxed),
        pool.idle()
    );
}
