/// Closest candidate to `target` by edit distance, if any is close enough.
pub fn find_best_match<I, S>(target: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let threshold = if target.len() < 3 { 1 } else { 3 };
    let mut best = None;
    let mut min_distance = usize::MAX;

    for candidate in candidates {
        let candidate = candidate.into();
        let distance = levenshtein_distance(target, &candidate);
        if distance <= threshold && distance < min_distance {
            min_distance = distance;
            best = Some(candidate);
        }
    }

    best
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
