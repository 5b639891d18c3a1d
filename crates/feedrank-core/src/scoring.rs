//! Popularity scoring for content records.
//!
//! The score is a pure function of the record's own fields and the wall
//! clock, recomputed on every ingest:
//!
//! ```text
//! score = round2(base * type_coefficient + recency_bonus + engagement)
//! ```
//!
//! Base score:
//! - video:   views/1000 + likes/100
//! - article: reading_time + reactions/50
//!
//! Type coefficient (applies to the base term only):
//! - video: 1.5, article: 1.0, anything else: 1.0
//!
//! Recency bonus (days since publication, future dates clamp to day zero):
//! - within 7 days: +5, within 30: +3, within 90: +1, older: +0
//!
//! Engagement bonus:
//! - video:   (likes/views) * 10, zero when views is zero
//! - article: (reactions/reading_time) * 5, zero when reading_time is zero
//!
//! The engagement term is deliberately unbounded above: an article whose
//! reactions dwarf its reading time may out-score its own base term.

use crate::content::{Content, ContentType};

/// Scoring coefficient for a content type. Video outranks article.
#[must_use]
pub fn type_coefficient(content_type: ContentType) -> f64 {
    match content_type {
        ContentType::Video => 1.5,
        ContentType::Article => 1.0,
        ContentType::Unknown => 1.0,
    }
}

/// Computes the popularity score for a content record, rounded to two
/// decimal places. Never negative.
#[must_use]
pub fn calculate_score(content: &Content) -> f64 {
    let base = base_score(content);
    let coefficient = type_coefficient(content.content_type);
    let recency = recency_bonus(content);
    let engagement = engagement_bonus(content);

    round_to_2(base * coefficient + recency + engagement)
}

fn base_score(content: &Content) -> f64 {
    match content.content_type {
        ContentType::Video => content.views as f64 / 1000.0 + content.likes as f64 / 100.0,
        ContentType::Article => content.reading_time as f64 + content.reactions as f64 / 50.0,
        ContentType::Unknown => 0.0,
    }
}

fn recency_bonus(content: &Content) -> f64 {
    match content.days_since_published() {
        0..=7 => 5.0,
        8..=30 => 3.0,
        31..=90 => 1.0,
        _ => 0.0,
    }
}

fn engagement_bonus(content: &Content) -> f64 {
    match content.content_type {
        ContentType::Video => {
            if content.views == 0 {
                return 0.0;
            }
            (content.likes as f64 / content.views as f64) * 10.0
        }
        ContentType::Article => {
            if content.reading_time == 0 {
                return 0.0;
            }
            (content.reactions as f64 / content.reading_time as f64) * 5.0
        }
        ContentType::Unknown => 0.0,
    }
}

/// Half-up rounding to two decimals: `floor(x * 100 + 0.5) / 100`.
fn round_to_2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn video(views: i64, likes: i64, days_ago: i64) -> Content {
        Content {
            content_type: ContentType::Video,
            views,
            likes,
            published_at: Utc::now() - Duration::days(days_ago),
            ..Content::default()
        }
    }

    fn article(reading_time: i64, reactions: i64, days_ago: i64) -> Content {
        Content {
            content_type: ContentType::Article,
            reading_time,
            reactions,
            published_at: Utc::now() - Duration::days(days_ago),
            ..Content::default()
        }
    }

    #[test]
    fn popular_recent_video() {
        // base 100 + 100 = 200, *1.5 = 300, recency +5, engagement +1
        assert_eq!(calculate_score(&video(100_000, 10_000, 0)), 306.0);
    }

    #[test]
    fn low_engagement_video() {
        // base 10 + 1 = 11, *1.5 = 16.5, recency +5, engagement +0.1
        assert_eq!(calculate_score(&video(10_000, 100, 0)), 21.6);
    }

    #[test]
    fn month_old_video() {
        // base 50 + 50 = 100, *1.5 = 150, recency +3, engagement +1
        assert_eq!(calculate_score(&video(50_000, 5_000, 15)), 154.0);
    }

    #[test]
    fn stale_video_gets_no_recency_bonus() {
        assert_eq!(calculate_score(&video(50_000, 5_000, 100)), 151.0);
    }

    #[test]
    fn popular_recent_article() {
        // base 8 + 10 = 18, *1.0, recency +5, engagement (500/8)*5 = 312.5
        assert_eq!(calculate_score(&article(8, 500, 0)), 335.5);
    }

    #[test]
    fn low_reactions_article() {
        // base 5 + 1 = 6, recency +5, engagement (50/5)*5 = 50
        assert_eq!(calculate_score(&article(5, 50, 0)), 61.0);
    }

    #[test]
    fn engagement_may_exceed_base() {
        // One-minute read with a reaction storm: engagement dominates.
        let content = article(1, 10_000, 0);
        // base 1 + 200 = 201, recency +5, engagement (10000/1)*5 = 50000
        assert_eq!(calculate_score(&content), 50_206.0);
    }

    #[test]
    fn future_publication_counts_as_day_zero() {
        let mut content = video(1_000, 100, 0);
        content.published_at = Utc::now() + Duration::days(1);
        // base 1 + 1 = 2, *1.5 = 3, recency +5, engagement +1
        assert_eq!(calculate_score(&content), 9.0);
    }

    #[test]
    fn zero_views_guard() {
        let content = video(0, 100, 0);
        // base 0 + 1 = 1, *1.5 = 1.5, recency +5, engagement 0
        assert_eq!(calculate_score(&content), 6.5);
    }

    #[test]
    fn zero_reading_time_guard() {
        let content = article(0, 100, 0);
        // base 0 + 2 = 2, recency +5, engagement 0
        assert_eq!(calculate_score(&content), 7.0);
    }

    #[test]
    fn unknown_type_scores_recency_only() {
        let content = Content {
            views: 100_000,
            likes: 10_000,
            published_at: Utc::now(),
            ..Content::default()
        };
        assert_eq!(calculate_score(&content), 5.0);
    }

    #[test]
    fn score_is_never_negative() {
        assert!(calculate_score(&Content::default()) >= 0.0);
        assert!(calculate_score(&video(0, 0, 1000)) >= 0.0);
    }

    #[test]
    fn score_ignores_tag_ordering() {
        let mut a = video(12_345, 678, 3);
        let mut b = a.clone();
        a.tags = vec!["rust".into(), "async".into(), "tokio".into()];
        b.tags = vec!["tokio".into(), "rust".into(), "async".into()];
        assert_eq!(calculate_score(&a), calculate_score(&b));
    }

    #[test]
    fn recency_bonus_boundaries() {
        let cases = [
            (0, 5.0),
            (5, 5.0),
            (7, 5.0),
            (8, 3.0),
            (30, 3.0),
            (31, 1.0),
            (90, 1.0),
            (91, 0.0),
            (365, 0.0),
        ];
        for (days_ago, expected) in cases {
            let content = video(0, 0, days_ago);
            assert_eq!(
                recency_bonus(&content),
                expected,
                "days_ago = {days_ago}"
            );
        }
    }

    #[test]
    fn round_to_2_is_idempotent() {
        for value in [0.0, 0.004_999, 1.005, 21.6, 306.0, 335.499_9, 99_999.999] {
            let once = round_to_2(value);
            assert_eq!(round_to_2(once), once, "value = {value}");
        }
    }

    #[test]
    fn round_to_2_rounds_half_up() {
        // 0.125 and 0.375 are exact in binary, so the half-way case is real.
        assert_eq!(round_to_2(0.125), 0.13);
        assert_eq!(round_to_2(0.375), 0.38);
        assert_eq!(round_to_2(1.004), 1.0);
        assert_eq!(round_to_2(21.599_9), 21.6);
    }
}
