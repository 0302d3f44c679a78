//! Structural reorder operations applied to a settled sequence.
//!
//! Every operation returns a new, re-normalized sequence together with the keys whose
//! position changed. Failed operations leave the input untouched.

use crate::error::SequenceError;
use crate::models::{ItemKey, ParentId, SequenceItem};
use crate::normalize::normalize;
use std::collections::HashMap;

/// A single logical mutation of an ordered collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation<P> {
    /// Relocate the item at `from` to `to`, shifting the items in between by one.
    Move { from: usize, to: usize },
    /// Add a new placeholder item at `at`, or append when `at` is `None`.
    Insert { payload: P, at: Option<usize> },
    /// Remove the item addressed by `key`.
    Delete { key: ItemKey },
}

/// Summary of a successfully applied operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    /// Keys whose position changed, inserted item included.
    pub changed: Vec<ItemKey>,
    pub inserted: Option<ItemKey>,
    pub removed: Option<ItemKey>,
}

impl Applied {
    /// `true` when the operation left the sequence untouched.
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty() && self.inserted.is_none() && self.removed.is_none()
    }
}

/// A computed next state, not yet committed to a store.
#[derive(Debug, Clone)]
pub struct Transition<P> {
    pub items: Vec<SequenceItem<P>>,
    pub applied: Applied,
}

/// Apply `op` to `items`, returning the settled successor state.
///
/// # Errors
/// [`SequenceError::InvalidIndex`] for out-of-range indices and
/// [`SequenceError::ItemNotFound`] when a delete targets an unknown key.
pub fn apply<P: Clone>(
    items: &[SequenceItem<P>],
    parent_id: &ParentId,
    op: Operation<P>,
) -> Result<Transition<P>, SequenceError> {
    match op {
        Operation::Move { from, to } => move_item(items, from, to),
        Operation::Insert { payload, at } => {
            insert_item(items, SequenceItem::placeholder(parent_id.clone(), payload), at)
        }
        Operation::Delete { key } => delete_item(items, &key),
    }
}

fn check_index(index: usize, len: usize) -> Result<(), SequenceError> {
    if index < len {
        Ok(())
    } else {
        Err(SequenceError::InvalidIndex { index, len })
    }
}

/// Move the item at `from` to `to`. `from == to` is a no-op.
pub fn move_item<P: Clone>(
    items: &[SequenceItem<P>],
    from: usize,
    to: usize,
) -> Result<Transition<P>, SequenceError> {
    check_index(from, items.len())?;
    check_index(to, items.len())?;
    if from == to {
        return Ok(Transition {
            items: items.to_vec(),
            applied: Applied::default(),
        });
    }

    let mut next = items.to_vec();
    let moved = next.remove(from);
    next.insert(to, moved);
    let next = normalize(next);
    let changed = changed_positions(items, &next);
    Ok(Transition {
        items: next,
        applied: Applied {
            changed,
            ..Applied::default()
        },
    })
}

/// Insert `item` at `at` (append when `None`). Items at or after `at` shift down.
pub fn insert_item<P: Clone>(
    items: &[SequenceItem<P>],
    item: SequenceItem<P>,
    at: Option<usize>,
) -> Result<Transition<P>, SequenceError> {
    let at = at.unwrap_or(items.len());
    if at > items.len() {
        return Err(SequenceError::InvalidIndex {
            index: at,
            len: items.len(),
        });
    }
    let key = item.key.clone();
    let mut next = items.to_vec();
    next.insert(at, item);
    let next = normalize(next);
    let changed = changed_positions(items, &next);
    Ok(Transition {
        items: next,
        applied: Applied {
            changed,
            inserted: Some(key),
            removed: None,
        },
    })
}

/// Remove the item addressed by `key`. Items after it shift up.
pub fn delete_item<P: Clone>(
    items: &[SequenceItem<P>],
    key: &ItemKey,
) -> Result<Transition<P>, SequenceError> {
    let index = items
        .iter()
        .position(|item| &item.key == key)
        .ok_or_else(|| SequenceError::ItemNotFound(key.clone()))?;

    let mut next = items.to_vec();
    next.remove(index);
    let next = normalize(next);
    let changed = changed_positions(items, &next);
    Ok(Transition {
        items: next,
        applied: Applied {
            changed,
            inserted: None,
            removed: Some(key.clone()),
        },
    })
}

/// Keys in `after` whose position differs from `before` (new keys included).
pub fn changed_positions<P>(before: &[SequenceItem<P>], after: &[SequenceItem<P>]) -> Vec<ItemKey> {
    let previous: HashMap<&ItemKey, usize> = before
        .iter()
        .map(|item| (&item.key, item.position))
        .collect();
    after
        .iter()
        .filter(|item| previous.get(&item.key) != Some(&item.position))
        .map(|item| item.key.clone())
        .collect()
}
