use chrono::{DateTime, Utc};
use rand::RngCore;

/// Random bytes appended after the timestamp; 48 bits keeps same-second collisions negligible.
const SUFFIX_BYTES: usize = 6;

/// Human readable, time ordered order number, e.g. `ORD-20251031191045-4fa2b39c01de`.
pub fn generate_order_number(prefix: &str) -> String {
    generate_order_number_at(prefix, Utc::now())
}

pub fn generate_order_number_at(prefix: &str, now: DateTime<Utc>) -> String {
    let mut suffix = [0u8; SUFFIX_BYTES];
    rand::thread_rng().fill_bytes(&mut suffix);

    let timestamp = now.format("%Y%m%d%H%M%S");
    let suffix = hex::encode(suffix);

    let prefix = prefix.trim();
    if prefix.is_empty() {
        format!("{timestamp}-{suffix}")
    } else {
        format!("{prefix}-{timestamp}-{suffix}")
    }
}
