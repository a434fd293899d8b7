use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use clap::Parser;
use gate_limit::Gate;
use gate_limit::LimiterConfig;
use hdrhistogram::Histogram;
use rand::Rng;
use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceExt;
use tower::service_fn;
use tower_gate::GateError;
use tower_gate::GateLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Drive simulated clients through a gated service and report the outcome.
#[derive(Debug, Parser)]
struct Args {
    /// Number of distinct client addresses, all inside 10.0.0.0/8
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=0x00ff_ffff))]
    clients: u32,

    /// Total number of requests to fire
    #[arg(long, default_value_t = 50_000)]
    requests: usize,

    /// Ceiling per client per window
    #[arg(long, default_value_t = 5)]
    max_requests: u32,

    /// Window length in milliseconds
    #[arg(long, default_value_t = 60_000)]
    window_ms: u64,

    /// Share of requests sent to an unlimited route, between 0 and 1
    #[arg(long, default_value_t = 0.2, value_parser = parse_share)]
    unlimited_share: f64,
}

fn parse_share(value: &str) -> Result<f64, String> {
    let share: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&share) {
        Ok(share)
    } else {
        Err(format!("{share} is not between 0 and 1"))
    }
}

async fn mock_handler(_req: http::Request<()>) -> Result<&'static str, BoxError> {
    // Simulate a little real-world work
    sleep(Duration::from_millis(5)).await;
    Ok("success")
}

#[derive(Default)]
struct Outcomes {
    forwarded: usize,
    rejected: usize,
    unknown: usize,
}

fn build_request(path: &str, client: u32) -> Result<http::Request<()>, BoxError> {
    let mut req = http::Request::builder().uri(path).body(())?;
    let ip = IpAddr::V4(Ipv4Addr::from(0x0a00_0000 | client));
    req.extensions_mut().insert(SocketAddr::new(ip, 40_000));
    Ok(req)
}

async fn run_load_test<S>(name: &str, svc: S, args: &Args) -> Result<(), BoxError>
where
    S: Service<http::Request<()>, Response = &'static str, Error = BoxError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    let mut hist_elapsed = Histogram::<u64>::new_with_bounds(1, 60_000_000, 3)?;
    let mut tasks = JoinSet::new();
    let mut outcomes = Outcomes::default();
    let barrier = Arc::new(Barrier::new(args.requests));
    let mut rng = rand::rng();

    let start = Instant::now();

    for _ in 0..args.requests {
        let client = rng.random_range(0..args.clients);
        let path = if rng.random_bool(args.unlimited_share) {
            "/static/app.js"
        } else {
            "/api/orders"
        };
        let req = build_request(path, client)?;
        let mut local_svc = svc.clone();
        let bar = barrier.clone();
        tasks.spawn(async move {
            bar.wait().await;
            let req_start = Instant::now();
            let res = match local_svc.ready().await {
                Ok(ready_svc) => ready_svc.call(req).await,
                Err(e) => Err(e),
            };
            (res, req_start.elapsed())
        });
    }

    while let Some(task) = tasks.join_next().await {
        let (res, elapsed) = task?;
        match res {
            Ok(_) => {
                outcomes.forwarded += 1;
                hist_elapsed.record(elapsed.as_micros() as u64)?;
            }
            Err(e) if e.is::<GateError>() => outcomes.rejected += 1,
            Err(_) => outcomes.unknown += 1,
        }
    }

    let total_duration = start.elapsed();
    let throughput = args.requests as f64 / total_duration.as_secs_f64();

    println!("--- {} ---", name);
    println!("Total Duration:  {:.2?}", total_duration);
    println!("Forwarded:       {}/{}", outcomes.forwarded, args.requests);
    println!("Rejected (429):  {}", outcomes.rejected);
    if outcomes.unknown > 0 {
        println!("Other errors:    {}", outcomes.unknown);
    }
    println!("Total Rate:      {:.2} req/sec", throughput);

    if outcomes.forwarded > 0 {
        println!("P50 (Elapsed):   {}µs", hist_elapsed.value_at_quantile(0.5));
        println!(
            "P99 (Elapsed):   {}µs",
            hist_elapsed.value_at_quantile(0.99)
        );
    }
    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    info!(?args, "starting stress test");

    let config = LimiterConfig::default()
        .with_window(Duration::from_millis(args.window_ms))
        .with_max_requests(args.max_requests)
        .deny("/api/*");

    // 1. Gate in front of the handler
    let gate = Arc::new(Gate::new(config)?);
    let gated = GateLayer::from_gate(gate.clone()).layer(service_fn(mock_handler));
    run_load_test("Gated", gated, &args).await?;
    info!(tracked_clients = gate.tracked_clients(), "registry size after run");

    // 2. Baseline without a gate
    run_load_test("Ungated", service_fn(mock_handler), &args).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_accepts_defaults_and_bounds() {
        let args = Args::try_parse_from(["stress_test"]).unwrap();
        assert_eq!(args.clients, 100);
        assert_eq!(args.unlimited_share, 0.2);

        let args =
            Args::try_parse_from(["stress_test", "--clients", "1", "--unlimited-share", "1"])
                .unwrap();
        assert_eq!(args.clients, 1);
        assert_eq!(args.unlimited_share, 1.0);
    }

    #[test]
    fn it_rejects_out_of_range_arguments() {
        assert!(Args::try_parse_from(["stress_test", "--clients", "0"]).is_err());
        assert!(Args::try_parse_from(["stress_test", "--clients", "16777216"]).is_err());
        assert!(Args::try_parse_from(["stress_test", "--unlimited-share", "1.5"]).is_err());
        assert!(Args::try_parse_from(["stress_test", "--unlimited-share", "-0.1"]).is_err());
        assert!(Args::try_parse_from(["stress_test", "--unlimited-share", "NaN"]).is_err());
    }
}
