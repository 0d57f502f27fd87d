//! Bounded edit-distance lookup backing every "did you mean" error.

/// Maximum edit distance at which a candidate is offered as a correction.
pub const MAX_SUGGESTION_DISTANCE: usize = 2;

/// Find the closest candidate within [`MAX_SUGGESTION_DISTANCE`] of `given`.
///
/// Ties are broken in favour of the earliest candidate, which keeps
/// suggestions deterministic for a fixed candidate order.
pub fn nearest_match<'a, I>(given: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, &str)> = None;
    for candidate in candidates {
        let dist = edit_distance(given, candidate);
        if dist <= MAX_SUGGESTION_DISTANCE {
            match best {
                Some((best_dist, _)) if best_dist <= dist => {}
                _ => best = Some((dist, candidate)),
            }
        }
    }
    best.map(|(_, c)| c.to_string())
}

/// Levenshtein distance over unicode scalar values.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            cur[j + 1] = substitution.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}
