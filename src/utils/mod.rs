use std::collections::HashMap;
use std::hash::Hash;
use std::cmp::Ordering;

use crate::models::Recommendation;

pub mod validation;

/// Cosine similarity over the union of keys of two sparse vectors.
/// Missing keys count as zero.
pub fn cosine_similarity<K>(a: &HashMap<K, f64>, b: &HashMap<K, f64>) -> f64
where
    K: Eq + Hash,
{
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }

    // Keys present in only one vector add nothing to the dot product.
    let dot_product: f64 = a
        .iter()
        .filter_map(|(key, x)| b.get(key).map(|y| x * y))
        .sum();
    let norm_a: f64 = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

/// Pearson correlation over the keys both maps share. Fewer than two shared
/// keys, or zero variance on either side, yields 0.0.
pub fn pearson_correlation<K>(a: &HashMap<K, f64>, b: &HashMap<K, f64>) -> f64
where
    K: Eq + Hash,
{
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .filter_map(|(key, x)| b.get(key).map(|y| (*x, *y)))
        .collect();

    if pairs.len() < 2 {
        return 0.0;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut sum_sq_a = 0.0;
    let mut sum_sq_b = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_a;
        let dy = y - mean_b;
        numerator += dx * dy;
        sum_sq_a += dx * dx;
        sum_sq_b += dy * dy;
    }

    let denominator = (sum_sq_a * sum_sq_b).sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

pub fn common_keys<K, V, W>(a: &HashMap<K, V>, b: &HashMap<K, W>) -> usize
where
    K: Eq + Hash,
{
    a.keys().filter(|key| b.contains_key(*key)).count()
}

/// Divides every weight by the largest one. Leaves the map untouched when the
/// maximum is not positive.
pub fn max_normalize<K>(weights: &mut HashMap<K, f64>) {
    let max_weight = weights.values().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_weight > 0.0 {
        for weight in weights.values_mut() {
            *weight /= max_weight;
        }
    }
}

/// Same as [`max_normalize`] for a ranked list, applied to `recommendation_score`.
pub fn normalize_scores(recommendations: &mut [Recommendation]) {
    let max_score = recommendations
        .iter()
        .map(|rec| rec.recommendation_score)
        .fold(f64::NEG_INFINITY, f64::max);

    if max_score > 0.0 {
        for rec in recommendations.iter_mut() {
            rec.recommendation_score /= max_score;
        }
    }
}

/// Descending by score; equal scores are ordered by key so output does not
/// depend on hash map iteration order.
pub fn compare_scores_desc<T: Ord>(a: (f64, &T), b: (f64, &T)) -> Ordering {
    b.0.partial_cmp(&a.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.1.cmp(b.1))
}

pub fn rank_recommendations(recommendations: &mut Vec<Recommendation>, limit: usize) {
    recommendations.sort_by(|a, b| {
        compare_scores_desc(
            (a.recommendation_score, &a.item.id),
            (b.recommendation_score, &b.item.id),
        )
    });
    recommendations.truncate(limit);
}

pub fn top_k_by_score<K: Ord + Clone>(scores: &HashMap<K, f64>, k: usize) -> Vec<(K, f64)> {
    let mut indexed: Vec<(K, f64)> = scores.iter().map(|(key, s)| (key.clone(), *s)).collect();
    indexed.sort_by(|a, b| compare_scores_desc((a.1, &a.0), (b.1, &b.0)));
    indexed.truncate(k);
    indexed
}
