use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Encoder, Histogram,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Session lifecycle
    pub static ref SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_sessions_total",
        "Total number of assessment sessions by terminal status",
        &["status"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "proctor_sessions_active",
        "Number of sessions currently in progress"
    )
    .unwrap();

    pub static ref ANSWERS_RECORDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_answers_recorded_total",
        "Total number of answers stored",
        &["kind"]
    )
    .unwrap();

    pub static ref ATTEMPT_SCORE_PERCENTAGE: Histogram = register_histogram!(
        "proctor_attempt_score_percentage",
        "Distribution of scored attempt percentages",
        vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]
    )
    .unwrap();

    // Integrity
    pub static ref INTEGRITY_VIOLATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_integrity_violations_total",
        "Total number of integrity violations detected",
        &["violation_type"]
    )
    .unwrap();

    // Gate and delivery
    pub static ref ATTEMPT_GATE_DECISIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_attempt_gate_decisions_total",
        "Attempt gate outcomes",
        &["decision"]
    )
    .unwrap();

    pub static ref RESULT_DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_result_deliveries_total",
        "Result sink deliveries by outcome",
        &["status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}
