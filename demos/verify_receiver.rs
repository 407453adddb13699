//! What a receiving service does to verify one of our deliveries.

use webhook_relay::{is_timestamp_fresh, verify_signature};

fn main() {
    // Values pulled from the incoming request.
    let signature = "sha256=abcd..."; // X-Webhook-Signature
    let timestamp = "1700000000"; // X-Webhook-Timestamp
    let payload = br#"{"event":"session.failed","payload":{}}"#;
    let now_secs = 1_700_000_200u64;

    let fresh = timestamp
        .parse::<u64>()
        .map(|ts| is_timestamp_fresh(ts, now_secs, 300))
        .unwrap_or(false);

    let valid = fresh && verify_signature(b"supersecret", timestamp, payload, signature);
    println!("signature valid: {valid}");
}
