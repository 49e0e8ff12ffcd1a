use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Current wall-clock time in seconds, the unit every game timestamp uses
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs_f64()
}

// Placeholder for players who joined without a name
pub fn placeholder_name(id: i64) -> String {
    format!("possum{}", id)
}

// Display name for an item type, used in chat and logs
pub fn item_name(item_type: i64) -> &'static str {
    match item_type {
        0 => "cube",
        1 => "banana",
        2 => "fish",
        3 => "pipe",
        4 => "flag",
        5 => "bottle",
        _ => "item",
    }
}
