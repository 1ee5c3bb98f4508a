//! Global min-max normalization of edge scores and step importances.
//!
//! Scores are first mapped through a [`SignMode`] and then rescaled into
//! `[0, 1]` against the extremes of the whole set. Extremes are found with a
//! single explicit pass so very large score lists never need sorting or
//! intermediate buffers.

/// Floor applied to the maximum so a range over all-zero scores never
/// divides by zero.
pub const MIN_SCORE_CEILING: f32 = 0.001;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SignMode {
    /// Negative influence counts as much as positive influence.
    #[default]
    Absolute,
    /// Negative influence is treated as no influence.
    PositiveClamped,
}

impl SignMode {
    pub fn transform(self, score: f32) -> f32 {
        match self {
            Self::Absolute => score.abs(),
            Self::PositiveClamped => score.max(0.0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Absolute => "Absolute",
            Self::PositiveClamped => "Positive only",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreRange {
    pub min: f32,
    pub max: f32,
    degenerate: bool,
}

impl ScoreRange {
    /// Computes the range of the transformed scores, or `None` for an empty
    /// input. Non-finite scores are ignored.
    pub fn from_scores<I>(scores: I, mode: SignMode) -> Option<Self>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut extremes: Option<(f32, f32)> = None;
        for score in scores {
            if !score.is_finite() {
                continue;
            }
            let value = mode.transform(score);
            extremes = Some(match extremes {
                Some((min, max)) => (min.min(value), max.max(value)),
                None => (value, value),
            });
        }

        let (min, max) = extremes?;
        Some(Self {
            min: min.max(0.0),
            max: max.max(MIN_SCORE_CEILING),
            degenerate: max == min,
        })
    }

    /// True when every transformed score was equal.
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    pub fn normalize(&self, score: f32, mode: SignMode) -> f32 {
        let span = self.max - self.min;
        if self.degenerate || span <= 0.0 {
            return 0.5;
        }

        ((mode.transform(score) - self.min) / span).clamp(0.0, 1.0)
    }
}

/// Normalizes every score in `scores` against the range of the whole slice.
pub fn normalize_all(scores: &[f32], mode: SignMode) -> Vec<f32> {
    match ScoreRange::from_scores(scores.iter().copied(), mode) {
        Some(range) => scores
            .iter()
            .map(|score| range.normalize(*score, mode))
            .collect(),
        None => Vec::new(),
    }
}
