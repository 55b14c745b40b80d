//! Deterministic range assignment of partitions to group members
//!
//! Every member computes its own slice of the partition list from the same
//! inputs, so no coordinator round-trip is needed to agree on the split:
//! member ids sort lexicographically and the sorted position alone decides
//! the range.

use std::ops::RangeInclusive;

/// Pick the contiguous range of partition slots owned by `id`.
///
/// `partition_count` is the number of available partitions, `member_ids` the
/// ids of live members in any order, `id` the caller's member id. Returns
/// `None` when `id` is not among the members or no slots remain for it.
///
/// The first `partition_count % k` members (in sorted order, `k` members
/// total) receive one slot more than the rest, keeping ranges contiguous
/// and jointly covering `0..partition_count` exactly once.
pub fn pick(
    partition_count: usize,
    member_ids: &[String],
    id: &str,
) -> Option<RangeInclusive<usize>> {
    if member_ids.is_empty() {
        return None;
    }
    let mut sorted: Vec<&str> = member_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let pos = sorted.iter().position(|member| *member == id)? as i64;

    let pnum = partition_count as i64;
    let members = sorted.len() as i64;
    let remainder = pnum % members;
    let step = pnum / members + 1;
    let secondary_step = step - 1;
    let secondary_start = remainder * step;

    let (first, mut last) = if pos < remainder {
        (pos * step, (pos + 1) * step - 1)
    } else {
        let shifted = pos - remainder;
        (
            secondary_start + shifted * secondary_step,
            secondary_start + (shifted + 1) * secondary_step - 1,
        )
    };
    last = last.min(pnum - 1);
    if last < 0 || last < first {
        return None;
    }
    Some(first as usize..=last as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn worked_examples() {
        let cases: &[(usize, &[&str], &str, Option<(usize, usize)>)] = &[
            (3, &["N1", "N2", "N3"], "N1", Some((0, 0))),
            (3, &["N1", "N2", "N3"], "N2", Some((1, 1))),
            (3, &["N1", "N2", "N3"], "N3", Some((2, 2))),
            (4, &["N2", "N4", "N3", "N1"], "N3", Some((2, 2))),
            (3, &["N1", "N2", "N3"], "N4", None),
            (5, &["N1", "N2", "N3"], "N1", Some((0, 1))),
            (5, &["N1", "N2", "N3"], "N2", Some((2, 3))),
            (5, &["N1", "N2", "N3"], "N3", Some((4, 4))),
            (1, &["N1", "N2", "N3"], "N2", None),
            (5, &["N1", "N2"], "N1", Some((0, 2))),
            (5, &["N1", "N2"], "N2", Some((3, 4))),
        ];
        for (pnum, ids, id, expected) in cases {
            let expected = expected.map(|(first, last)| first..=last);
            assert_eq!(
                pick(*pnum, &members(ids), id),
                expected,
                "pick({pnum}, {ids:?}, {id})"
            );
        }
    }

    #[test]
    fn unknown_member_gets_none() {
        assert_eq!(pick(8, &members(&["a", "b"]), "c"), None);
        assert_eq!(pick(8, &[], "a"), None);
    }

    #[test]
    fn zero_partitions_gets_none() {
        for id in ["a", "b", "c"] {
            assert_eq!(pick(0, &members(&["a", "b", "c"]), id), None);
        }
    }

    #[test]
    fn ranges_cover_all_partitions_without_overlap() {
        for pnum in 1..40 {
            for member_count in 1..10 {
                let ids: Vec<String> = (0..member_count).map(|i| format!("m{i:02}")).collect();
                let mut covered = vec![0u8; pnum];
                for id in &ids {
                    if let Some(range) = pick(pnum, &ids, id) {
                        for slot in range {
                            covered[slot] += 1;
                        }
                    }
                }
                assert!(
                    covered.iter().all(|&count| count == 1),
                    "pnum={pnum} members={member_count} coverage={covered:?}"
                );
            }
        }
    }

    #[test]
    fn surplus_members_get_nothing() {
        let ids: Vec<String> = (0..7).map(|i| format!("m{i}")).collect();
        let assigned: Vec<_> = ids.iter().filter_map(|id| pick(3, &ids, id)).collect();
        assert_eq!(assigned.len(), 3);
        assert!(assigned.iter().all(|range| range.clone().count() == 1));
        for id in &ids[3..] {
            assert_eq!(pick(3, &ids, id), None);
        }
    }

    #[test]
    fn input_order_is_irrelevant() {
        let sorted = members(&["a", "b", "c", "d"]);
        let shuffled = members(&["c", "a", "d", "b"]);
        for id in ["a", "b", "c", "d"] {
            assert_eq!(pick(10, &sorted, id), pick(10, &shuffled, id));
        }
    }
}
