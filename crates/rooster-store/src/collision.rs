//! Overlap clustering of time intervals.

use std::ops::Range;

/// Group `spans` into collision groups.
///
/// `spans` are `(start, end)` pairs sorted by start, then end. A span joins
/// the open group when it starts strictly before the latest end seen in that
/// group, so touching intervals do not collide and a chain of overlaps forms
/// one group even when its first and last members are disjoint. Each group is
/// a contiguous index range into `spans`.
pub fn collision_groups<T: Ord + Copy>(spans: &[(T, T)]) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let Some(&(_, first_end)) = spans.first() else {
        return groups;
    };

    let mut group_start = 0;
    let mut group_end = first_end;
    for (index, &(start, end)) in spans.iter().enumerate().skip(1) {
        if start < group_end {
            group_end = group_end.max(end);
        } else {
            groups.push(group_start..index);
            group_start = index;
            group_end = end;
        }
    }
    groups.push(group_start..spans.len());
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert!(collision_groups::<i64>(&[]).is_empty());
    }

    #[test]
    fn test_overlapping_pair_and_separate_span() {
        let groups = collision_groups(&[(0, 10), (5, 15), (20, 30)]);
        assert_eq!(groups, vec![0..2, 2..3]);
    }

    #[test]
    fn test_touching_spans_do_not_collide() {
        let groups = collision_groups(&[(0, 10), (10, 20)]);
        assert_eq!(groups, vec![0..1, 1..2]);
    }

    #[test]
    fn test_chained_overlaps_form_one_group() {
        // A and C are disjoint but both overlap B.
        let groups = collision_groups(&[(0, 10), (8, 20), (15, 17)]);
        assert_eq!(groups, vec![0..3]);
    }

    #[test]
    fn test_long_span_covers_later_short_ones() {
        let groups = collision_groups(&[(0, 100), (10, 20), (30, 40), (100, 110)]);
        assert_eq!(groups, vec![0..3, 3..4]);
    }

    #[test]
    fn test_zero_length_spans() {
        let groups = collision_groups(&[(5, 5), (5, 5), (5, 6)]);
        assert_eq!(groups, vec![0..1, 1..2, 2..3]);
    }
}
