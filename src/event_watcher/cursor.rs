use std::ops::RangeInclusive;

/// Bookmark of how far into the chain a watch has already looked.
///
/// Stores the next block height that has *not* been queried (direct mode) or delivered
/// (filter mode). The value only ever moves forward.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
    next: u64,
}

impl Cursor {
    /// Cursor that treats `head` as already seen, so only later blocks are reported.
    #[must_use]
    pub fn after(head: u64) -> Self {
        Self { next: head.saturating_add(1) }
    }

    /// Cursor whose first reported block is `block`.
    #[must_use]
    pub fn starting_at(block: u64) -> Self {
        Self { next: block }
    }

    /// The first block height not covered yet.
    #[must_use]
    pub fn next_block(self) -> u64 {
        self.next
    }

    /// The inclusive range `(cursor, head]` still to be queried, or `None` if `head` has not
    /// moved past the cursor.
    #[must_use]
    pub fn pending_range(self, head: u64) -> Option<RangeInclusive<u64>> {
        (head >= self.next).then(|| self.next..=head)
    }

    /// Returns the cursor moved past `block`. Never moves backwards.
    #[must_use]
    pub fn advanced_past(self, block: u64) -> Self {
        Self { next: self.next.max(block.saturating_add(1)) }
    }

    /// The earlier of two cursors.
    #[must_use]
    pub fn min(self, other: Cursor) -> Self {
        Self { next: self.next.min(other.next) }
    }
}

/// Splits `range` into consecutive inclusive pieces of at most `max_block_range` blocks, oldest
/// first.
pub(crate) fn chunked(
    range: RangeInclusive<u64>,
    max_block_range: u64,
) -> impl Iterator<Item = RangeInclusive<u64>> {
    let (start, end) = range.into_inner();
    let span = max_block_range.max(1) - 1;
    let mut next = (start <= end).then_some(start);

    std::iter::from_fn(move || {
        let from = next?;
        let to = from.saturating_add(span).min(end);
        next = (to < end).then(|| to + 1);
        Some(from..=to)
    })
}
