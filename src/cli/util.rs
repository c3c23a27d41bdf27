use std::time::Duration;

/// Elapsed time in the largest unit that keeps the value readable: ms, s, m or h.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let ms = elapsed.as_secs_f64() * 1_000.0;
    if ms < 1_000.0 {
        format!("{}ms", elapsed.as_millis())
    } else if ms < 60_000.0 {
        format!("{:.2}s", ms / 1_000.0)
    } else if ms < 3_600_000.0 {
        format!("{:.2}m", ms / 60_000.0)
    } else {
        format!("{:.2}h", ms / 3_600_000.0)
    }
}
