//! Edit-distance similarity between item names

use super::normalize::normalize;

/// Similarity of two raw names on a 0-100 scale.
///
/// Both names are normalized first. Two empty names are identical (100);
/// an empty name never resembles a non-empty one (0). Symmetric.
pub fn score(a: &str, b: &str) -> u8 {
    score_normalized(&normalize(a), &normalize(b))
}

/// Same as [`score`] for names that are already normalized
pub fn score_normalized(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 100,
        (true, false) | (false, true) => return 0,
        _ => {}
    }

    let distance = levenshtein(&a, &b);
    let longest = a.len().max(b.len());
    let ratio = 1.0 - distance as f64 / longest as f64;

    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Levenshtein distance over chars, single-row
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev_row: Vec<usize> = (0..=b.len()).collect();
    let mut curr_row = vec![0; b.len() + 1];

    for (i, a_char) in a.iter().enumerate() {
        curr_row[0] = i + 1;

        for (j, b_char) in b.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr_row[j + 1] = (curr_row[j] + 1) // insertion
                .min(prev_row[j + 1] + 1) // deletion
                .min(prev_row[j] + cost); // substitution
        }

        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b.len()]
}
