//! Longest increasing subsequence over an index map.

/// Positions (ascending) of a longest strictly increasing subsequence of
/// `values`, skipping negative entries.
///
/// Patience sorting with predecessor links, `O(n log n)`.
pub fn longest_increasing_subsequence(values: &[isize]) -> Vec<usize> {
    // tails[k] = position of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessor: Vec<Option<usize>> = vec![None; values.len()];

    for (position, &value) in values.iter().enumerate() {
        if value < 0 {
            continue;
        }
        let length = tails.partition_point(|&tail| values[tail] < value);
        if length > 0 {
            predecessor[position] = Some(tails[length - 1]);
        }
        if length == tails.len() {
            tails.push(position);
        } else {
            tails[length] = position;
        }
    }

    let mut sequence = Vec::with_capacity(tails.len());
    let mut current = tails.last().copied();
    while let Some(position) = current {
        sequence.push(position);
        current = predecessor[position];
    }
    sequence.reverse();
    sequence
}
