use crate::render::Payload;
use std::collections::BTreeSet;

/// Splits `items` into `n` contiguous chunks.
///
/// Chunk `i` is `items[i*len/n .. (i+1)*len/n]`: chunks are disjoint, cover
/// every item and differ in size by at most one. With fewer items than chunks
/// some chunks are empty.
pub fn partition<T: Clone>(items: &[T], n: usize) -> Vec<Vec<T>> {
    if n == 0 {
        return Vec::new();
    }
    let len = items.len();
    (0..n)
        .map(|i| items[i * len / n..(i + 1) * len / n].to_vec())
        .collect()
}

/// Builds the `n` per-executor payloads for `payload`.
///
/// Balanced fields are partitioned; all other fields are copied to every
/// shard. A balanced field missing from `payload` stays missing. Each shard
/// records where its part of a balanced field starts in `payload`.
pub fn shard_payload(payload: &Payload, balanced: &BTreeSet<String>, n: usize) -> Vec<Payload> {
    let mut shards = vec![Payload::new(); n];

    for (name, shapes) in payload.fields() {
        if balanced.contains(name) {
            let len = shapes.len();
            for (i, (shard, part)) in shards.iter_mut().zip(partition(shapes, n)).enumerate() {
                shard.insert(name, part);
                shard.set_index_base(name, i * len / n);
            }
        } else {
            for shard in shards.iter_mut() {
                shard.insert(name, shapes.to_vec());
            }
        }
    }

    shards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Color, Shape};

    fn rects(n: usize) -> Vec<Shape> {
        (0..n)
            .map(|i| Shape::rectangle(i as f64, 0.0, 1.0, 1.0, Color::BLACK).with_id(format!("r{i}")))
            .collect()
    }

    #[test]
    fn partition_covers_every_item_once() {
        for len in [0usize, 1, 3, 7, 100] {
            for n in 1..=6 {
                let items: Vec<usize> = (0..len).collect();
                let parts = partition(&items, n);
                assert_eq!(parts.len(), n);

                let joined: Vec<usize> = parts.iter().flatten().copied().collect();
                assert_eq!(joined, items, "len={len} n={n}");

                let sizes: Vec<usize> = parts.iter().map(Vec::len).collect();
                let (lo, hi) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
                assert!(hi - lo <= 1, "len={len} n={n} sizes={sizes:?}");
            }
        }
    }

    #[test]
    fn fewer_items_than_shards_leaves_empty_shards() {
        let parts = partition(&[1, 2], 4);
        assert_eq!(parts, vec![vec![], vec![1], vec![], vec![2]]);
    }

    #[test]
    fn shards_keep_full_payload_indices() {
        let unkeyed: Vec<Shape> = (0..7)
            .map(|i| Shape::rectangle(i as f64, 0.0, 1.0, 1.0, Color::BLACK))
            .collect();
        let payload = Payload::new()
            .with_field("rectangles", unkeyed)
            .with_field("texts", vec![Shape::text(0.0, 0.0, "label", 12.0, Color::BLACK)]);
        let balanced = BTreeSet::from(["rectangles".to_string()]);

        let shards = shard_payload(&payload, &balanced, 3);
        let bases: Vec<usize> = shards.iter().map(|s| s.index_base("rectangles")).collect();
        assert_eq!(bases, vec![0, 2, 4]);
        assert!(shards.iter().all(|s| s.index_base("texts") == 0));
    }

    #[test]
    fn unbalanced_fields_are_copied() {
        let payload = Payload::new()
            .with_field("rectangles", rects(10))
            .with_field("texts", vec![Shape::text(0.0, 0.0, "label", 12.0, Color::BLACK)]);
        let balanced = BTreeSet::from(["rectangles".to_string()]);

        let shards = shard_payload(&payload, &balanced, 3);
        assert_eq!(shards.len(), 3);

        let total: usize = shards.iter().map(|s| s.field("rectangles").unwrap().len()).sum();
        assert_eq!(total, 10);
        for shard in &shards {
            assert_eq!(shard.field("texts").unwrap().len(), 1);
        }
    }
}
