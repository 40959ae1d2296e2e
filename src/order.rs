//! Key extraction and direction.

use std::cmp::Ordering;

/// Compares two keys.
pub type Comparator<K> = fn(&K, &K) -> Ordering;

pub fn natural<K: Ord>(a: &K, b: &K) -> Ordering {
    a.cmp(b)
}

/// Inverts the ordering of two keys: `<` becomes `>` and `<=` becomes `>=`.
/// Equal keys stay equal.
pub fn reversed<K: Ord>(a: &K, b: &K) -> Ordering {
    b.cmp(a)
}

pub fn comparator<K: Ord>(reverse: bool) -> Comparator<K> {
    if reverse {
        reversed::<K>
    } else {
        natural::<K>
    }
}

/// A key function together with a direction.
#[derive(Clone, Copy)]
pub struct KeyOrder<F> {
    key: F,
    reverse: bool,
}

impl<F> KeyOrder<F> {
    pub fn new(key: F, reverse: bool) -> Self {
        Self { key, reverse }
    }

    pub fn compare<T, K>(&self, a: &T, b: &T) -> Ordering
    where
        F: Fn(&T) -> K,
        K: Ord,
    {
        comparator::<K>(self.reverse)(&(self.key)(a), &(self.key)(b))
    }

    /// Stable in-memory sort of one chunk.
    pub fn sort<T, K>(&self, records: &mut [T])
    where
        F: Fn(&T) -> K,
        K: Ord,
    {
        let compare = comparator::<K>(self.reverse);
        records.sort_by(|a, b| compare(&(self.key)(a), &(self.key)(b)));
    }

    pub(crate) fn into_parts(self) -> (F, bool) {
        (self.key, self.reverse)
    }
}
