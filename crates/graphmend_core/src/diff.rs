//! Set difference between desired and current collections, keyed by
//! canonical primary key.

use graphmend_store::KeyValue;

/// Partition of a desired collection against a current collection.
#[derive(Debug, Clone)]
pub struct Delta<D, C> {
    /// Desired elements with no key match in the current collection.
    pub added: Vec<D>,
    /// Current elements with no key match in the desired collection.
    pub removed: Vec<C>,
    /// Pairs sharing a key. The desired side may be scalar-identical to
    /// the current side or carry changes; the caller decides what
    /// "existing" means.
    pub existing: Vec<(D, C)>,
}

/// Partitions `desired` against `current` by key.
///
/// Keys are optional: an element with no key never matches anything — a
/// keyless desired element is always `added`. Source order is preserved
/// in every output sequence; no other ordering is guaranteed.
pub fn diff<D, C>(
    desired: Vec<D>,
    current: Vec<C>,
    desired_key: impl Fn(&D) -> Option<KeyValue>,
    current_key: impl Fn(&C) -> Option<KeyValue>,
) -> Delta<D, C> {
    let mut remaining: Vec<Option<(Option<KeyValue>, C)>> = current
        .into_iter()
        .map(|c| {
            let key = current_key(&c);
            Some((key, c))
        })
        .collect();

    let mut added = Vec::new();
    let mut existing = Vec::new();

    for d in desired {
        let key = desired_key(&d);
        let matched = key.as_ref().and_then(|k| {
            remaining.iter().position(|slot| {
                slot.as_ref()
                    .and_then(|(ck, _)| ck.as_ref())
                    .is_some_and(|ck| ck == k)
            })
        });
        match matched {
            Some(index) => {
                let (_, c) = remaining[index].take().expect("slot matched above");
                existing.push((d, c));
            }
            None => added.push(d),
        }
    }

    let removed = remaining
        .into_iter()
        .flatten()
        .map(|(_, c)| c)
        .collect();

    Delta {
        added,
        removed,
        existing,
    }
}
