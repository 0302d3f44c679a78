//! Dense zero-based position index for ordered sequences.

use crate::models::SequenceItem;

/// Rewrite every `position` to match the item's index in `items`.
///
/// Relative order is preserved; only positions change. Empty input yields empty output.
pub fn normalize<P>(mut items: Vec<SequenceItem<P>>) -> Vec<SequenceItem<P>> {
    normalize_in_place(&mut items);
    items
}

/// In-place variant of [`normalize`].
pub fn normalize_in_place<P>(items: &mut [SequenceItem<P>]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.position = index;
    }
}

/// Returns `true` when positions are exactly `0..len` in sequence order.
pub fn is_dense<P>(items: &[SequenceItem<P>]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.position == index)
}
