//! Index-offset pagination over result streams.
//!
//! Implemented by zipping the stream against a monotonically increasing
//! counter, dropping indices below the window start and truncating at the
//! window end.

/// An optional `[start, end)` pagination window over item indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    /// First index to include (defaults to 0).
    pub start: Option<u64>,
    /// Exclusive upper index bound (unbounded when absent).
    pub end: Option<u64>,
}

impl Window {
    /// A window covering everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// A bounded `[start, end)` window.
    pub fn range(start: u64, end: u64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}

/// Apply a pagination window to an iterator.
///
/// Equivalent to index-offset slicing; with an empty window the stream
/// passes through unmodified.
pub fn paginate<T>(
    items: impl Iterator<Item = T>,
    window: Window,
) -> impl Iterator<Item = T> {
    let start = window.start.unwrap_or(0);
    let end = window.end;

    items
        .zip(0u64..)
        .filter(move |(_, index)| *index >= start)
        .take_while(move |(_, index)| end.map(|e| *index < e).unwrap_or(true))
        .map(|(item, _)| item)
}
