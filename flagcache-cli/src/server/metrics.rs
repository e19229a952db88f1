use std::sync::OnceLock;
use std::time::Instant;

use axum::extract::MatchedPath;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global metrics registry
static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// All application metrics
pub struct Metrics {
    // Evaluation
    pub eval_total: IntCounterVec,
    pub eval_duration: HistogramVec,
    pub eval_errors: IntCounterVec,

    // Administration
    pub admin_writes: IntCounterVec,
    pub flags_total: IntGauge,

    // Evaluation cache sweeps
    pub cache_purged: IntCounterVec,

    // HTTP request metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    fn new(registry: &Registry) -> Self {
        let eval_total = IntCounterVec::new(
            Opts::new("flagcache_eval_total", "Flag evaluations by result source"),
            &["source"],
        )
        .expect("failed to create eval_total metric");

        let eval_duration = HistogramVec::new(
            HistogramOpts::new(
                "flagcache_eval_duration_seconds",
                "Flag evaluation latency",
            )
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            &["source"],
        )
        .expect("failed to create eval_duration metric");

        let eval_errors = IntCounterVec::new(
            Opts::new("flagcache_eval_errors_total", "Failed flag evaluations"),
            &["kind"],
        )
        .expect("failed to create eval_errors metric");

        let admin_writes = IntCounterVec::new(
            Opts::new("flagcache_admin_writes_total", "Flag create/update/delete operations"),
            &["op", "result"],
        )
        .expect("failed to create admin_writes metric");

        let flags_total = IntGauge::new("flagcache_flags_total", "Flags in the store at last listing")
            .expect("failed to create flags_total metric");

        let cache_purged = IntCounterVec::new(
            Opts::new("flagcache_cache_purged_total", "Expired evaluation cache entries swept"),
            &["backend"],
        )
        .expect("failed to create cache_purged metric");

        let http_requests_total = IntCounterVec::new(
            Opts::new("flagcache_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("failed to create http_requests_total metric");

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "flagcache_http_request_duration_seconds",
                "HTTP request latency",
            ),
            &["method", "path"],
        )
        .expect("failed to create http_request_duration metric");

        registry.register(Box::new(eval_total.clone())).expect("register eval_total");
        registry.register(Box::new(eval_duration.clone())).expect("register eval_duration");
        registry.register(Box::new(eval_errors.clone())).expect("register eval_errors");
        registry.register(Box::new(admin_writes.clone())).expect("register admin_writes");
        registry.register(Box::new(flags_total.clone())).expect("register flags_total");
        registry.register(Box::new(cache_purged.clone())).expect("register cache_purged");
        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("register http_requests_total");
        registry
            .register(Box::new(http_request_duration.clone()))
            .expect("register http_request_duration");

        Self {
            eval_total,
            eval_duration,
            eval_errors,
            admin_writes,
            flags_total,
            cache_purged,
            http_requests_total,
            http_request_duration,
        }
    }
}

/// Get or initialize the global metrics instance
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let registry = REGISTRY.get_or_init(Registry::new);
        Metrics::new(registry)
    })
}

/// Axum handler for GET /metrics — returns Prometheus text format
pub async fn handle_metrics() -> Response {
    // Ensure all metric collectors are registered on first call.
    let _ = metrics();
    let registry = REGISTRY.get_or_init(Registry::new);
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Axum middleware that records HTTP request count and duration.
pub async fn track_metrics(request: Request<axum::body::Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    let m = metrics();
    m.http_requests_total
        .with_label_values(&[&method, &path, &status])
        .inc();
    m.http_request_duration
        .with_label_values(&[&method, &path])
        .observe(elapsed);

    response
}
