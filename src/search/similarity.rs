//! Cosine similarity and top-k ranking

/// Cosine similarity between two embeddings; 0.0 for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

/// Linear scan: score every candidate against `query` and keep the best `k`.
///
/// The sort is stable, so equal scores keep candidate order. NaN scores sink
/// to the bottom.
pub fn rank<'a, K, I>(query: &[f32], candidates: I, k: usize) -> Vec<(K, f32)>
where
    I: IntoIterator<Item = (K, &'a [f32])>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(K, f32)> = candidates
        .into_iter()
        .map(|(key, vector)| {
            let score = cosine_similarity(query, vector);
            (key, if score.is_nan() { f32::NEG_INFINITY } else { score })
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_self_similarity_is_one() {
        let v = vec![0.3, -1.7, 2.25, 0.0, 9.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let query = [1.0, 0.0];
        let vectors = [vec![0.0, 1.0], vec![1.0, 0.1], vec![1.0, 0.0], vec![1.0, 1.0]];
        let ranked = rank(&query, vectors.iter().enumerate().map(|(i, v)| (i, v.as_slice())), 3);

        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_rank_ties_keep_candidate_order() {
        let query = [1.0, 0.0];
        let same = vec![2.0, 0.0];
        let candidates = vec![("c", same.as_slice()), ("a", same.as_slice()), ("b", same.as_slice())];
        let ranked = rank(&query, candidates, 10);
        let order: Vec<&str> = ranked.iter().map(|(k, _)| *k).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_rank_zero_k() {
        let query = [1.0];
        let v = vec![1.0];
        assert!(rank(&query, vec![(0, v.as_slice())], 0).is_empty());
    }
}
