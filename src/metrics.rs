//! Prometheus metrics exposed on `/metrics`.

use lazy_static::lazy_static;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

lazy_static! {
    pub static ref REGISTRATIONS_TOTAL: IntCounter = register_int_counter!(
        "workshop_registrations_total",
        "Total number of successful registrations"
    )
    .unwrap();
    pub static ref LOGINS_TOTAL: IntCounter = register_int_counter!(
        "workshop_logins_total",
        "Total number of successful logins"
    )
    .unwrap();
    pub static ref CHECKINS_TOTAL: IntCounter = register_int_counter!(
        "workshop_checkins_total",
        "Total number of successful daily check-ins"
    )
    .unwrap();
    pub static ref CHECKIN_DROPS_TOTAL: IntCounter = register_int_counter!(
        "workshop_checkin_drops_total",
        "Total drops granted through daily check-ins"
    )
    .unwrap();
}

/// Render all registered metrics in the Prometheus text format.
pub fn metrics_handler() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let before = CHECKINS_TOTAL.get();
        CHECKINS_TOTAL.inc();
        assert_eq!(CHECKINS_TOTAL.get(), before + 1);
    }

    #[test]
    fn test_handler_renders_text_format() {
        REGISTRATIONS_TOTAL.inc();
        let body = metrics_handler().unwrap();
        assert!(body.contains("workshop_registrations_total"));
    }
}
