//! Property-based tests for the partition assignment function
//!
//! Uses proptest to generate member sets and partition counts, verifying
//! the assignment invariants hold far beyond the worked examples.

use proptest::prelude::*;
use shepherd::pick;

fn member_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("member-{i:03}")).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: the per-member ranges are disjoint and jointly cover
    /// every partition exactly once.
    #[test]
    fn ranges_partition_the_whole_topic(
        partition_count in 1usize..96,
        member_count in 1usize..16,
    ) {
        let ids = member_ids(member_count);
        let mut covered = vec![0u32; partition_count];
        for id in &ids {
            if let Some(range) = pick(partition_count, &ids, id) {
                for slot in range {
                    covered[slot] += 1;
                }
            }
        }
        prop_assert!(
            covered.iter().all(|&count| count == 1),
            "coverage: {:?}",
            covered
        );
    }

    /// Property: only the sorted view of the member list matters.
    #[test]
    fn input_permutation_is_irrelevant(
        partition_count in 0usize..64,
        (sorted, shuffled) in (1usize..16).prop_flat_map(|count| {
            let ids = member_ids(count);
            (Just(ids.clone()), Just(ids).prop_shuffle())
        }),
    ) {
        for id in &sorted {
            prop_assert_eq!(
                pick(partition_count, &sorted, id),
                pick(partition_count, &shuffled, id)
            );
        }
    }

    /// Property: with more members than partitions, the first
    /// `partition_count` members get exactly one partition each and the
    /// rest get nothing.
    #[test]
    fn oversubscribed_groups_starve_the_tail(
        partition_count in 1usize..8,
        surplus in 1usize..8,
    ) {
        let ids = member_ids(partition_count + surplus);
        let mut assigned = 0usize;
        for (index, id) in ids.iter().enumerate() {
            match pick(partition_count, &ids, id) {
                Some(range) => {
                    prop_assert_eq!(range.count(), 1);
                    prop_assert!(index < partition_count);
                    assigned += 1;
                }
                None => prop_assert!(index >= partition_count),
            }
        }
        prop_assert_eq!(assigned, partition_count);
    }

    /// Property: an id outside the member list never receives a range.
    #[test]
    fn outsiders_get_nothing(
        partition_count in 0usize..64,
        member_count in 1usize..16,
    ) {
        let ids = member_ids(member_count);
        prop_assert_eq!(pick(partition_count, &ids, "zz-outsider"), None);
    }
}
