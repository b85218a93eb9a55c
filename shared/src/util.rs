/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate an opaque entity id (UUID v4)
///
/// Order and operation ids are generated on the device so that a retried
/// request carries the same id as the original.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
