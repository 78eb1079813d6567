use crate::data::types::QueryWindow;

/// Blocks kept between the chain head and the newest block we query.
///
/// Explorer indexes trail the head; anything newer may be missing or reorged.
pub const CONFIRMATION_LAG: u64 = 12;

/// Window ending at `current_block`, starting `lag` blocks back (floored at 0).
pub fn compute_window(current_block: u64, lag: u64) -> QueryWindow {
    QueryWindow {
        from_block: current_block.saturating_sub(lag),
        current_block,
        confirmation_lag: lag,
    }
}

pub fn safe_window(current_block: u64) -> QueryWindow {
    compute_window(current_block, CONFIRMATION_LAG)
}
