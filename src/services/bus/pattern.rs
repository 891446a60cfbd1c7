//! Topic validation, wildcard matching, and cosine similarity.
//!
//! `**` is accepted only as the final pattern component. An earlier
//! Python matcher accepted it anywhere, inconsistently; this module
//! implements the corrected, final-only behavior.

use crate::domain::error::{CoreError, CoreResult};

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

/// Reject topics that contain reserved wildcard segments; published topics
/// must be fully literal.
pub fn validate_topic(topic: &str) -> CoreResult<()> {
    if topic.is_empty() {
        return Err(CoreError::InvalidPattern("topic must not be empty".into()));
    }
    for segment in topic.split('.') {
        if segment == "*" || segment == "**" || !is_valid_segment(segment) {
            return Err(CoreError::InvalidPattern(format!(
                "invalid topic segment: {segment}"
            )));
        }
    }
    Ok(())
}

/// Validate a subscription pattern: segments must be literal, `*`, or a
/// trailing `**`.
pub fn validate_pattern(pattern: &str) -> CoreResult<()> {
    if pattern.is_empty() {
        return Err(CoreError::InvalidPattern(
            "pattern must not be empty".into(),
        ));
    }
    let segments: Vec<&str> = pattern.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        let is_last = i == segments.len() - 1;
        match *segment {
            "**" if is_last => {}
            "**" => {
                return Err(CoreError::InvalidPattern(
                    "`**` must be the final pattern component".into(),
                ))
            }
            "*" => {}
            literal if is_valid_segment(literal) => {}
            other => {
                return Err(CoreError::InvalidPattern(format!(
                    "invalid pattern segment: {other}"
                )))
            }
        }
    }
    Ok(())
}

/// Whether `topic` is selected by `pattern`.
///
/// `pattern` is assumed already validated by [`validate_pattern`]. A fully
/// literal pattern matches exactly; `*` matches exactly one segment; a
/// trailing `**` matches one or more remaining segments.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('.').collect();
    let topic_segments: Vec<&str> = topic.split('.').collect();

    let mut p = pattern_segments.iter();
    let mut t = topic_segments.iter();

    loop {
        match (p.next(), t.next()) {
            (Some(&"**"), Some(_)) => return true,
            (Some(&"**"), None) => return false,
            (Some(&"*"), Some(_)) => {}
            (Some(ps), Some(ts)) => {
                if ps != ts {
                    return false;
                }
            }
            (Some(_), None) | (None, Some(_)) => return false,
            (None, None) => return true,
        }
    }
}

/// Cosine similarity between two vectors. Zero if either has zero norm or
/// the vectors differ in length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches_exactly() {
        assert!(topic_matches("task.available", "task.available"));
        assert!(!topic_matches("task.available", "task.claimed"));
    }

    #[test]
    fn single_star_matches_one_segment_only() {
        assert!(topic_matches("task.*", "task.claimed"));
        assert!(!topic_matches("task.*", "task"));
        assert!(!topic_matches("task.*", "task.a.b"));
    }

    #[test]
    fn double_star_matches_every_topic_under_prefix() {
        assert!(topic_matches("task.**", "task.available"));
        assert!(topic_matches("task.**", "task.a.b.c"));
        assert!(topic_matches("**", "anything.at.all"));
        assert!(!topic_matches("task.**", "build.success"));
    }

    #[test]
    fn trailing_double_star_requires_at_least_one_segment() {
        assert!(!topic_matches("task.**", "task"));
    }

    #[test]
    fn validate_pattern_rejects_non_terminal_double_star() {
        assert!(validate_pattern("**.task").is_err());
        assert!(validate_pattern("task.**").is_ok());
        assert!(validate_pattern("**").is_ok());
    }

    #[test]
    fn validate_topic_rejects_wildcards() {
        assert!(validate_topic("task.*").is_err());
        assert!(validate_topic("task.**").is_err());
        assert!(validate_topic("task.available").is_ok());
    }

    #[test]
    fn cosine_similarity_zero_norm_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(sim.abs() < 1e-6);
    }

    proptest::proptest! {
        #[test]
        fn literal_topics_always_match_themselves(
            segments in proptest::collection::vec("[a-z][a-z0-9_-]{0,6}", 1..5)
        ) {
            let topic = segments.join(".");
            proptest::prop_assert!(topic_matches(&topic, &topic));
        }

        #[test]
        fn cosine_similarity_is_bounded_and_symmetric(
            a in proptest::collection::vec(-10.0f32..10.0, 1..6),
            b in proptest::collection::vec(-10.0f32..10.0, 1..6),
        ) {
            if a.len() == b.len() {
                let sim = cosine_similarity(&a, &b);
                proptest::prop_assert!(sim >= -1.0001 && sim <= 1.0001);
                proptest::prop_assert!((sim - cosine_similarity(&b, &a)).abs() < 1e-4);
            }
        }
    }
}
