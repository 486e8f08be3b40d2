//! Exact / fuzzy / new classification of a receipt line against the pantry

use serde::{Deserialize, Serialize};

use super::normalize::normalize;
use super::similarity::score_normalized;
use crate::error::{Error, Result};
use crate::models::{PantryItem, ReceiptItem};

/// Matching thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Minimum score treated as the same product
    pub exact_threshold: u8,
    /// Minimum score worth suggesting to the user
    pub fuzzy_threshold: u8,
    /// Prefer a candidate in the receipt item's category when scores tie
    pub category_tiebreak: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            exact_threshold: 90,
            fuzzy_threshold: 60,
            category_tiebreak: true,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.exact_threshold > 100 {
            return Err(Error::Config(format!(
                "exact_threshold must be at most 100, got {}",
                self.exact_threshold
            )));
        }
        if self.fuzzy_threshold > self.exact_threshold {
            return Err(Error::Config(format!(
                "fuzzy_threshold ({}) must not exceed exact_threshold ({})",
                self.fuzzy_threshold, self.exact_threshold
            )));
        }
        Ok(())
    }

    /// Map a score onto a decision
    pub fn decision_for(&self, score: u8) -> MatchDecision {
        if score >= self.exact_threshold {
            MatchDecision::Exact
        } else if score >= self.fuzzy_threshold {
            MatchDecision::Fuzzy
        } else {
            MatchDecision::New
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchDecision {
    Exact,
    Fuzzy,
    New,
}

impl MatchDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::New => "new",
        }
    }
}

/// Result of classifying one receipt line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub decision: MatchDecision,
    /// Best candidate, absent for `New`
    pub matched_id: Option<String>,
    pub score: u8,
}

/// Scores receipt lines against candidate pantry items
#[derive(Debug, Clone, Default)]
pub struct MatchClassifier {
    config: MatchConfig,
}

impl MatchClassifier {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Classify `item` against `candidates`.
    ///
    /// The highest score wins. Among equal scores a candidate in the item's
    /// category is preferred (when enabled), then the earliest candidate.
    pub fn classify(&self, item: &ReceiptItem, candidates: &[PantryItem]) -> Classification {
        self.classify_refs(item, candidates.iter())
    }

    pub(crate) fn classify_refs<'p>(
        &self,
        item: &ReceiptItem,
        candidates: impl Iterator<Item = &'p PantryItem>,
    ) -> Classification {
        let name = normalize(&item.name);
        let category = item
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let mut best: Option<(&PantryItem, u8, bool)> = None;

        for candidate in candidates {
            let score = score_normalized(&name, &normalize(&candidate.name));
            let same_category = self.config.category_tiebreak
                && category.is_some_and(|c| c.eq_ignore_ascii_case(candidate.category.trim()));

            let better = match best {
                None => true,
                Some((_, best_score, best_same)) => {
                    score > best_score || (score == best_score && same_category && !best_same)
                }
            };
            if better {
                best = Some((candidate, score, same_category));
            }
        }

        match best {
            Some((candidate, score, _)) => {
                let decision = self.config.decision_for(score);
                Classification {
                    decision,
                    matched_id: (decision != MatchDecision::New).then(|| candidate.id.clone()),
                    score,
                }
            }
            None => Classification {
                decision: MatchDecision::New,
                matched_id: None,
                score: 0,
            },
        }
    }
}
