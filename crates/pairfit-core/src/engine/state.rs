use crate::core::histogram::table::PairHistogram;
use crate::core::transform::observable::Population;
use crate::core::weighting::scheme::WeightingScheme;
use std::fmt;

/// Accepted histogram and everything needed to turn it into an observable.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedData {
    pub histogram: PairHistogram,
    pub scheme: WeightingScheme,
    pub population: Population,
    pub standard_error: f64,
    pub scale_factor: f64,
    /// Number of atoms the committed histogram describes.
    pub atom_count: usize,
}

/// Snapshot of the first full computation, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginalData {
    pub histogram: PairHistogram,
    pub scheme: WeightingScheme,
    pub population: Population,
    pub scale_factor: f64,
}

/// Histogram and fit results of a trial, waiting for accept or reject.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedEvaluation {
    pub histogram: PairHistogram,
    pub standard_error: f64,
    pub scale_factor: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmputationState {
    pub atom: usize,
    pub scheme: WeightingScheme,
    pub population: Population,
    pub staged: StagedEvaluation,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    BeforeComputed {
        subset: Vec<usize>,
        before: PairHistogram,
    },
    AfterComputed {
        subset: Vec<usize>,
        before: PairHistogram,
        after: PairHistogram,
        staged: StagedEvaluation,
    },
    Amputation(AmputationState),
}

impl TransactionState {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::BeforeComputed { .. } => Phase::BeforeComputed,
            Self::AfterComputed { .. } => Phase::AfterComputed,
            Self::Amputation(_) => Phase::Amputation,
        }
    }
}

/// Public view of where a constraint is in its move lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    BeforeComputed,
    AfterComputed,
    Amputation,
}

impl Phase {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BeforeComputed => "holding a before-move delta",
            Self::AfterComputed => "holding an evaluated move",
            Self::Amputation => "holding an amputation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
