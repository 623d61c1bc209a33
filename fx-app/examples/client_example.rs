//! Client example exercising every endpoint against an in-process server.
//!
//! A stub exchange-rate provider stands in for the real upstream, so the
//! example runs offline.
//!
//! Run with: cargo run -p fx-app --example client_example

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::routing::get;
use axum::{Json, Router};
use fx_client::FxClient;
use fx_hex::{ConversionService, ServiceConfig, inbound::HttpServer};
use fx_resilience::{CircuitBreaker, CircuitBreakerConfig, RateCache};
use fx_upstream::{HttpRateClient, UpstreamConfig};
use rust_decimal_macros::dec;
use serde_json::json;
use tokio::net::TcpListener;

async fn stub_latest(Query(params): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
    let base = params.get("base").cloned().unwrap_or_else(|| "EUR".into());
    let rates = match params.get("symbols") {
        Some(symbol) => {
            let mut rates = serde_json::Map::new();
            rates.insert(symbol.clone(), json!(0.9132));
            serde_json::Value::Object(rates)
        }
        None => json!({ "GBP": 0.7843, "JPY": 148.21, "USD": 1.0951 }),
    };
    Json(json!({ "amount": 1.0, "base": base, "date": "2024-01-15", "rates": rates }))
}

async fn stub_range(
    Path(range): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let (start, end) = range.split_once("..").unwrap_or(("", ""));
    let rates: serde_json::Map<String, serde_json::Value> = (1..=12)
        .map(|day| {
            let rate = 0.91 + f64::from(day) / 1000.0;
            (format!("2024-01-{day:02}"), json!({ "EUR": rate }))
        })
        .collect();
    Json(json!({
        "amount": 1.0,
        "base": params.get("base").cloned().unwrap_or_default(),
        "start_date": start,
        "end_date": end,
        "rates": rates,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Stub upstream provider
    let upstream = TcpListener::bind("127.0.0.1:0").await?;
    let upstream_url = format!("http://{}", upstream.local_addr()?);
    let upstream_routes = Router::new()
        .route("/latest", get(stub_latest))
        .route("/{range}", get(stub_range));
    tokio::spawn(async move {
        if let Err(e) = axum::serve(upstream, upstream_routes).await {
            eprintln!("stub upstream stopped: {e}");
        }
    });

    println!("🚀 Stub upstream on {upstream_url}");

    // Conversion service wired like the server binary
    let provider = HttpRateClient::new(
        UpstreamConfig::new(upstream_url).with_timeout(Duration::from_secs(2)),
    )?;
    let breaker = Arc::new(CircuitBreaker::new(
        "upstream",
        CircuitBreakerConfig::default(),
    ));
    let service = ConversionService::new(
        provider,
        ServiceConfig::default(),
        Arc::new(RateCache::new()),
        breaker,
    );
    let router = HttpServer::new(service).router();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router.into_make_service()).await {
            eprintln!("server stopped: {e}");
        }
    });

    println!("🚀 Currency API on {base_url}");

    let client = FxClient::new(&base_url);

    // ─────────────────────────────────────────────────────────────────────────
    // Demo: every endpoint
    // ─────────────────────────────────────────────────────────────────────────

    let health = client.health().await?;
    println!("✅ Server health: {health}");

    let latest = client.latest(Some("usd")).await?;
    println!(
        "✅ Latest rates for {} on {}: {} currencies",
        latest.base(),
        latest.date(),
        latest.rates().len()
    );

    // Second call is served from the cache
    let cached = client.latest(Some("USD")).await?;
    println!("✅ Cached snapshot matches: {}", cached == latest);

    let converted = client.convert("USD", "EUR", dec!(250)).await?;
    for (target, value) in converted.rates() {
        println!("✅ {} {} = {} {}", converted.amount(), converted.base(), value, target);
    }

    let refused = client.convert("USD", "TRY", dec!(10)).await;
    assert!(refused.is_err());
    println!("✅ Disallowed target refused: {}", refused.unwrap_err());

    let page = client
        .historical("USD", "2024-01-01", "2024-01-12", 2, 5)
        .await?;
    let dates: Vec<String> = page.rates().keys().map(|d| d.to_string()).collect();
    println!("✅ Historical page 2: {}", dates.join(", "));

    let circuit = client.circuit().await?;
    println!(
        "✅ Circuit {} with {} consecutive failures",
        circuit.state, circuit.consecutive_failures
    );

    println!("\n🎉 All operations completed successfully!");

    Ok(())
}
