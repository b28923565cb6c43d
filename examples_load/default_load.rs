use std::io;
use std::time::Instant;
use tracing::error;

use tracing_jsonlog::init::{init_tracing_with_config, LogConfig};

#[tokio::main]
async fn main() {
    init_tracing_with_config(io::sink(), LogConfig::default()).expect("install subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    {
        let span = tracing::info_span!("request", id = 7, route = "/login");
        let _guard = span.enter();
        for i in 0..n {
            error!(iteration = i, "default load test error");
        }
    }

    let elapsed = start.elapsed();
    println!("default config: wrote {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}
