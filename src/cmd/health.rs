//! `matchbridge health` - check the health of a running instance.
//!
//! Sends a `GET /health` request to the admin listener and displays
//! the response as formatted text or raw JSON.

use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cli::HealthArgs;
use crate::error::BridgeError;
use crate::health::HealthResponse;

pub async fn execute(args: HealthArgs) -> Result<(), BridgeError> {
    let url = format!("{}/health", args.url.trim_end_matches('/'));
    let uri: hyper::Uri = url
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| BridgeError::UriParse {
            source: Box::new(e),
        })?;

    let connector = hyper_util::client::legacy::connect::HttpConnector::new();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let req = hyper::Request::builder()
        .uri(uri)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| BridgeError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(std::time::Duration::from_secs(10), client.request(req))
        .await
        .map_err(|_| BridgeError::HttpRequest {
            source: "health check timed out after 10s".into(),
        })?
        .map_err(|e| BridgeError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| BridgeError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();

    if !status.is_success() {
        return Err(BridgeError::HealthCheckFailed(status));
    }

    if args.json {
        println!("{}", String::from_utf8_lossy(&body));
        return Ok(());
    }

    match serde_json::from_slice::<HealthResponse>(&body) {
        Ok(health) => print_summary(&args.url, &health),
        Err(e) => {
            eprintln!("Failed to parse health response: {e}");
            println!("{}", String::from_utf8_lossy(&body));
        }
    }

    Ok(())
}

fn print_summary(url: &str, health: &HealthResponse) {
    let stats = &health.stats;
    println!("\u{2713} matchbridge is {} ({url})", health.status);
    println!("  uptime:         {}", format_uptime(health.uptime_seconds));
    println!("  config source:  {}", health.config.source);
    println!(
        "  config version: {} (loaded {}s ago)",
        health.config.version, health.config.loaded_ago_seconds
    );
    println!(
        "  routes:         {} routes, {} reference feeds",
        health.config.routes, health.config.reference_feeds
    );
    println!("  cached values:  {}", health.cache.total);
    for (route, size) in &health.cache.routes {
        println!("    {route}: {size}");
    }
    println!(
        "  references:     {} ingested, {} rejected",
        stats.references_ingested, stats.references_rejected
    );
    println!(
        "  source:         {} seen, {} forwarded, {} dropped, {} invalid, {} write failures",
        stats.source_messages,
        stats.forwarded,
        stats.dropped,
        stats.invalid_payloads,
        stats.write_failures
    );
    if stats.loops_failed > 0 {
        println!("  stopped loops:  {}", stats.loops_failed);
    }
}

fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
