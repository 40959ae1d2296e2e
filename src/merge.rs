use std::{cmp::Ordering, collections::BinaryHeap};

use log::trace;

use crate::{
    order::{comparator, Comparator},
    Result,
};

enum Slot<K, T> {
    /// The stream has not been polled yet.
    Unprimed,
    Primed { key: K, record: T },
}

struct HeapItem<K, T> {
    slot: Slot<K, T>,
    stream_idx: usize,
    compare: Comparator<K>,
}

impl<K, T> HeapItem<K, T> {
    fn priority(&self, other: &Self) -> Ordering {
        match (&self.slot, &other.slot) {
            (Slot::Unprimed, Slot::Unprimed) => Ordering::Equal,
            (Slot::Unprimed, Slot::Primed { .. }) => Ordering::Less,
            (Slot::Primed { .. }, Slot::Unprimed) => Ordering::Greater,
            (Slot::Primed { key: a, .. }, Slot::Primed { key: b, .. }) => (self.compare)(a, b),
        }
        .then_with(|| self.stream_idx.cmp(&other.stream_idx))
    }
}

// BinaryHeap is a max-heap, so the smallest priority must compare greatest.
impl<K, T> Ord for HeapItem<K, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority(self)
    }
}

impl<K, T> PartialOrd for HeapItem<K, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K, T> Eq for HeapItem<K, T> {}

impl<K, T> PartialEq for HeapItem<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

/// K-way merge of sorted streams, see [`merge_by_key`].
pub struct Merge<T, K, I, F> {
    streams: Vec<I>,
    heap: BinaryHeap<HeapItem<K, T>>,
    key: F,
    compare: Comparator<K>,
    /// Stream whose entry was popped last and still has to be polled.
    refill: Option<usize>,
    failed: bool,
}

impl<T, K, I, F> Merge<T, K, I, F>
where
    K: Ord,
{
    pub(crate) fn new(streams: Vec<I>, key: F, reverse: bool) -> Self {
        let compare = comparator::<K>(reverse);
        let heap = (0..streams.len())
            .map(|stream_idx| HeapItem {
                slot: Slot::Unprimed,
                stream_idx,
                compare,
            })
            .collect();
        Self {
            streams,
            heap,
            key,
            compare,
            refill: None,
            failed: false,
        }
    }

    /// Number of streams that can still produce records.
    pub fn active_streams(&self) -> usize {
        self.heap.len() + usize::from(self.refill.is_some())
    }
}

impl<T, K, I, F> Iterator for Merge<T, K, I, F>
where
    K: Ord,
    I: Iterator<Item = Result<T>>,
    F: Fn(&T) -> K,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(stream_idx) = self.refill.take() {
                match self.streams[stream_idx].next() {
                    Some(Ok(record)) => self.heap.push(HeapItem {
                        slot: Slot::Primed {
                            key: (self.key)(&record),
                            record,
                        },
                        stream_idx,
                        compare: self.compare,
                    }),
                    Some(Err(e)) => {
                        self.failed = true;
                        self.heap.clear();
                        self.streams.clear();
                        return Some(Err(e));
                    }
                    None => trace!("Stream {} exhausted", stream_idx),
                }
            }

            let HeapItem {
                slot, stream_idx, ..
            } = self.heap.pop()?;
            self.refill = Some(stream_idx);
            if let Slot::Primed { record, .. } = slot {
                return Some(Ok(record));
            }
        }
    }
}

/// Merges sorted streams into one stream ordered by `key`.
///
/// Every stream must already be sorted by the same key and direction. Records with equal
/// keys come out in stream order. Streams are pulled lazily: each one is polled once before
/// anything is emitted, then once after each of its records is emitted. The first stream
/// error is yielded and ends the merge.
pub fn merge_by_key<T, K, I, F>(
    streams: impl IntoIterator<Item = I>,
    key: F,
    reverse: bool,
) -> Merge<T, K, I, F>
where
    K: Ord,
    I: Iterator<Item = Result<T>>,
    F: Fn(&T) -> K,
{
    Merge::new(streams.into_iter().collect(), key, reverse)
}

/// Merges streams sorted by the records' natural order.
pub fn merge<T, I>(
    streams: impl IntoIterator<Item = I>,
    reverse: bool,
) -> Merge<T, T, I, fn(&T) -> T>
where
    T: Ord + Clone,
    I: Iterator<Item = Result<T>>,
{
    merge_by_key(streams, T::clone as fn(&T) -> T, reverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn stream(records: Vec<i32>) -> std::vec::IntoIter<Result<i32>> {
        records.into_iter().map(Ok).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn unprimed_entries_pop_first_in_stream_order() {
        let compare = comparator::<i32>(false);
        let mut heap = BinaryHeap::new();
        heap.push(HeapItem {
            slot: Slot::Primed { key: -5, record: () },
            stream_idx: 0,
            compare,
        });
        heap.push(HeapItem {
            slot: Slot::Unprimed,
            stream_idx: 2,
            compare,
        });
        heap.push(HeapItem {
            slot: Slot::Unprimed,
            stream_idx: 1,
            compare,
        });

        let order: Vec<_> = std::iter::from_fn(|| heap.pop().map(|item| item.stream_idx)).collect();
        assert_eq!(order, [1, 2, 0]);
    }

    #[test]
    fn merges_sorted_streams() {
        let merged = merge(
            vec![stream(vec![1, 4, 7]), stream(vec![2, 5, 8]), stream(vec![3, 6, 9, 10])],
            false,
        );
        let merged = merged.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(merged, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn merges_in_reverse() {
        let merged = merge(vec![stream(vec![9, 5, 1]), stream(vec![8, 2]), stream(vec![])], true);
        let merged = merged.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(merged, [9, 8, 5, 2, 1]);
    }

    #[test]
    fn equal_keys_follow_stream_index() {
        let streams = vec![
            vec![(1, 'a'), (2, 'a')].into_iter().map(Ok),
            vec![(1, 'b'), (2, 'b')].into_iter().map(Ok),
        ];
        let merged = merge_by_key(streams, |(k, _): &(i32, char)| *k, false)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(merged, [(1, 'a'), (1, 'b'), (2, 'a'), (2, 'b')]);
    }

    #[test]
    fn no_streams_yield_nothing() {
        let mut merged = merge(Vec::<std::vec::IntoIter<Result<i32>>>::new(), false);
        assert_eq!(merged.active_streams(), 0);
        assert!(merged.next().is_none());
    }

    #[test]
    fn stream_error_ends_the_merge() {
        let failing = vec![
            Ok(1),
            Err(Error::InvalidArgument("boom".into())),
            Ok(3),
        ]
        .into_iter();
        let mut merged = merge(vec![stream(vec![2, 4]), failing], false);

        assert_eq!(merged.next().unwrap().unwrap(), 1);
        assert!(matches!(merged.next(), Some(Err(Error::InvalidArgument(_)))));
        assert!(merged.next().is_none());
    }
}
