use std::cmp::Ordering;

/// Standard competition ranking over a cohort's averages, descending.
/// Equal averages share a rank and the next distinct average takes its
/// 1-based position in the sorted sequence ("1,2,2,4", never "1,2,2,3").
/// Students without an average are left unranked, not placed last.
///
/// The returned vector is parallel to the input.
pub fn competition_ranks(averages: &[Option<f64>]) -> Vec<Option<usize>> {
    let mut graded: Vec<(usize, f64)> = averages
        .iter()
        .enumerate()
        .filter_map(|(idx, avg)| avg.map(|v| (idx, v)))
        .collect();
    graded.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut ranks = vec![None; averages.len()];
    let mut prev: Option<(f64, usize)> = None;
    for (position, (idx, value)) in graded.iter().enumerate() {
        let rank = match prev {
            Some((prev_value, prev_rank)) if *value == prev_value => prev_rank,
            _ => position + 1,
        };
        ranks[*idx] = Some(rank);
        prev = Some((*value, rank));
    }
    ranks
}
