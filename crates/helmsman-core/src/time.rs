use time::OffsetDateTime;

/// Current UTC timestamp, the single time source used across the controller.
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
