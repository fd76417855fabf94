//! Candidate scoring and manual disambiguation.
//!
//! When several providers return a plausible record for one query, the
//! candidates are ranked by title similarity and year proximity. In
//! interactive mode a [`UserPrompt`] picks from the ranked list instead.

use async_trait::async_trait;
use metaforged_common::{ProviderQuery, Record};
use tracing::{debug, info};

use crate::fuzzy::similarity;

/// Interactive chooser, e.g. a select dialog in the host UI.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Index of the chosen option, or `None` when the user cancelled.
    async fn select(&self, heading: &str, options: &[String]) -> Option<usize>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub record: Record,
    pub score: f64,
}

impl Candidate {
    /// Line shown to the user: `Title (year) [source]`.
    pub fn label(&self) -> String {
        let mut label = self.record.get_str("title").unwrap_or("?").to_string();
        if let Some(year) = record_year(&self.record) {
            label.push_str(&format!(" ({year})"));
        }
        if let Some(source) = self.record.get_str("source") {
            label.push_str(&format!(" [{source}]"));
        }
        label
    }
}

/// Score `record` against `query`: title similarity weighted to 0.7 plus a
/// year bonus of 0.3 for an exact year and 0.15 for one year off.
pub fn score_candidate(query: &ProviderQuery, record: &Record) -> f64 {
    let title = record.get_str("title").unwrap_or_default();
    let base = similarity(&query.title, title) * 0.7;

    let year_bonus = match (query.year, record_year(record)) {
        (Some(q), Some(r)) if q == r => 0.3,
        (Some(q), Some(r)) if q.abs_diff(r) <= 1 => 0.15,
        _ => 0.0,
    };

    base + year_bonus
}

/// Candidates sorted by descending score. Ties keep their input order.
pub fn rank_candidates(query: &ProviderQuery, candidates: Vec<Record>) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = candidates
        .into_iter()
        .filter(|record| !record.is_empty())
        .map(|record| Candidate {
            score: score_candidate(query, &record),
            record,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// Pick one record out of `candidates`.
///
/// Without a prompt the top-ranked candidate wins. With a prompt the user
/// chooses from the ranked list; cancelling yields `None`.
pub async fn select_best_match(
    query: &ProviderQuery,
    candidates: Vec<Record>,
    prompt: Option<&dyn UserPrompt>,
) -> Option<Record> {
    let mut ranked = rank_candidates(query, candidates);
    if ranked.is_empty() {
        return None;
    }

    let Some(prompt) = prompt else {
        let best = ranked.swap_remove(0);
        debug!(title = %query.title, score = best.score, "Selected top candidate");
        return Some(best.record);
    };

    let labels: Vec<String> = ranked.iter().map(Candidate::label).collect();
    let heading = format!("Select match for {}", query.title);
    match prompt.select(&heading, &labels).await {
        Some(idx) if idx < ranked.len() => {
            info!(title = %query.title, choice = %labels[idx], "User selected candidate");
            Some(ranked.swap_remove(idx).record)
        }
        Some(idx) => {
            debug!(idx, options = labels.len(), "Prompt returned out-of-range choice");
            None
        }
        None => {
            info!(title = %query.title, "User cancelled selection");
            None
        }
    }
}

fn record_year(record: &Record) -> Option<u16> {
    record
        .get("year")
        .and_then(|v| v.as_i64())
        .and_then(|y| u16::try_from(y).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaforged_common::MediaKind;
    use parking_lot::Mutex;

    /// Prompt that records what it was shown and answers with a fixed choice.
    struct FixedPrompt {
        answer: Option<usize>,
        shown: Mutex<Vec<String>>,
    }

    impl FixedPrompt {
        fn new(answer: Option<usize>) -> Self {
            Self {
                answer,
                shown: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UserPrompt for FixedPrompt {
        async fn select(&self, _heading: &str, options: &[String]) -> Option<usize> {
            *self.shown.lock() = options.to_vec();
            self.answer
        }
    }

    fn candidates() -> Vec<Record> {
        vec![
            Record::new().with("title", "Heat").with("year", 1986).with("source", "omdb"),
            Record::new().with("title", "Heat").with("year", 1995).with("source", "tmdb"),
            Record::new().with("title", "Heat Wave").with("year", 1995),
        ]
    }

    fn query() -> ProviderQuery {
        ProviderQuery::new(MediaKind::Movie, "Heat").with_year(1995)
    }

    #[test]
    fn test_score_prefers_exact_title_and_year() {
        let q = query();
        let exact = score_candidate(&q, &candidates()[1]);
        let wrong_year = score_candidate(&q, &candidates()[0]);
        let near_year = score_candidate(&q, &Record::new().with("title", "Heat").with("year", 1996));
        assert!((exact - 1.0).abs() < 1e-9);
        assert!((wrong_year - 0.7).abs() < 1e-9);
        assert!(near_year > wrong_year && near_year < exact);
    }

    #[tokio::test]
    async fn test_automatic_selection_takes_top_ranked() {
        let chosen = select_best_match(&query(), candidates(), None).await.unwrap();
        assert_eq!(chosen.get_str("source"), Some("tmdb"));
    }

    #[tokio::test]
    async fn test_prompt_sees_ranked_labels() {
        let prompt = FixedPrompt::new(Some(2));
        let chosen = select_best_match(&query(), candidates(), Some(&prompt))
            .await
            .unwrap();

        let shown = prompt.shown.lock().clone();
        assert_eq!(shown[0], "Heat (1995) [tmdb]");
        assert_eq!(shown.len(), 3);
        assert_eq!(chosen.get_str("source"), Some("omdb"));
    }

    #[tokio::test]
    async fn test_cancel_yields_none() {
        let prompt = FixedPrompt::new(None);
        assert!(select_best_match(&query(), candidates(), Some(&prompt))
            .await
            .is_none());

        let out_of_range = FixedPrompt::new(Some(7));
        assert!(select_best_match(&query(), candidates(), Some(&out_of_range))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_no_candidates() {
        assert!(select_best_match(&query(), vec![Record::new()], None).await.is_none());
    }
}
