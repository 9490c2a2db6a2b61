//! Deep merge of bags.
//!
//! Bags at the same key are merged recursively. Every other pairing is
//! resolved by the incoming value replacing the existing one, so lists are
//! replaced entirely rather than concatenated.

use super::{Bag, Value};

/// Fold `overlay` into `base`, with `overlay` taking precedence.
pub fn merge_into(base: &mut Bag, overlay: &Bag) {
    for (key, incoming) in overlay.iter() {
        if let (Some(Value::Bag(existing)), Value::Bag(nested)) = (base.entry_mut(key), incoming) {
            merge_into(existing, nested);
            continue;
        }
        base.insert(key.clone(), incoming.clone());
    }
}

/// Merge bags in order, with later bags taking precedence.
///
/// Equivalent to folding [`merge_into`] over the list starting from an empty bag.
pub fn merge_all<'a>(bags: impl IntoIterator<Item = &'a Bag>) -> Bag {
    bags.into_iter().fold(Bag::new(), |mut acc, bag| {
        merge_into(&mut acc, bag);
        acc
    })
}
