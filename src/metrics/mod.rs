//! Prometheus counters for the pricing, conversion and settlement flows,
//! exposed in text format at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref BUDGETS_CREATED: IntCounter = IntCounter::new(
        "budgets_created_total",
        "Total number of budgets created"
    )
    .expect("metric can be created");
    pub static ref BUDGETS_HELD: IntCounter = IntCounter::new(
        "budgets_held_for_approval_total",
        "Budgets moved to awaiting_approval by the discount guard"
    )
    .expect("metric can be created");
    pub static ref LINES_PRICED: IntCounter = IntCounter::new(
        "budget_lines_priced_total",
        "Total number of budget lines priced"
    )
    .expect("metric can be created");
    pub static ref DISCOUNT_CLAMPS: IntCounter = IntCounter::new(
        "budget_discount_clamps_total",
        "Total number of discounts clamped to the minimum total"
    )
    .expect("metric can be created");
    pub static ref CONVERSIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "budget_conversions_total",
            "Budget conversion attempts by outcome"
        ),
        &["outcome"]
    )
    .expect("metric can be created");
    pub static ref SEQUENCE_RETRIES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sequence_number_retries_total",
            "Number collisions retried while allocating budget and order numbers"
        ),
        &["prefix"]
    )
    .expect("metric can be created");
    pub static ref PAYMENTS_RECORDED: IntCounter = IntCounter::new(
        "payments_recorded_total",
        "Total number of payments recorded"
    )
    .expect("metric can be created");
    pub static ref COMMISSION_RECALCULATIONS: IntCounter = IntCounter::new(
        "commission_recalculations_total",
        "Total number of commission recalculations"
    )
    .expect("metric can be created");
    pub static ref EVENTS_PROCESSED: IntCounterVec = IntCounterVec::new(
        Opts::new("events_processed_total", "Domain events processed by name"),
        &["event"]
    )
    .expect("metric can be created");
}

/// Registers every collector once; repeated calls are harmless.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BUDGETS_CREATED.clone()),
        Box::new(BUDGETS_HELD.clone()),
        Box::new(LINES_PRICED.clone()),
        Box::new(DISCOUNT_CLAMPS.clone()),
        Box::new(CONVERSIONS.clone()),
        Box::new(SEQUENCE_RETRIES.clone()),
        Box::new(PAYMENTS_RECORDED.clone()),
        Box::new(COMMISSION_RECALCULATIONS.clone()),
        Box::new(EVENTS_PROCESSED.clone()),
    ];
    for collector in collectors {
        // AlreadyReg on a second call
        let _ = REGISTRY.register(collector);
    }
}

/// Renders the registry in Prometheus text exposition format.
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
