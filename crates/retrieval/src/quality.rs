//! Sufficiency checks for a category's search results.

use crate::types::{Category, EvidenceItem, QualityVerdict};

/// Items wanted for a trip of `days` days.
///
/// Missing, zero or negative day counts count as a single day.
pub fn needed_count(days: Option<i64>, items_per_day: usize) -> usize {
    let days = days.filter(|d| *d >= 1).unwrap_or(1);
    usize::try_from(days)
        .unwrap_or(usize::MAX)
        .saturating_mul(items_per_day)
}

/// Judges quantity against the target and quality by average length.
#[derive(Debug, Clone, Copy)]
pub struct QualityAssessor {
    min_avg_content_chars: usize,
}

impl QualityAssessor {
    pub fn new(min_avg_content_chars: usize) -> Self {
        Self {
            min_avg_content_chars,
        }
    }

    pub fn assess(&self, category: Category, items: &[EvidenceItem], needed_count: usize) -> QualityVerdict {
        let observed_count = items.len();
        let sufficient_quantity = observed_count >= needed_count;

        let average = if items.is_empty() {
            0.0
        } else {
            items.iter().map(EvidenceItem::char_len).sum::<usize>() as f64 / observed_count as f64
        };
        let sufficient_quality = average > self.min_avg_content_chars as f64;

        let verdict = QualityVerdict {
            category,
            observed_count,
            needed_count,
            sufficient_quantity,
            sufficient_quality,
            needs_augmentation: !(sufficient_quantity && sufficient_quality),
        };

        tracing::info!(
            %category,
            observed = observed_count,
            needed = needed_count,
            avg_chars = average,
            augment = verdict.needs_augmentation,
            "quality verdict"
        );
        verdict
    }
}

impl Default for QualityAssessor {
    fn default() -> Self {
        Self::new(50)
    }
}
