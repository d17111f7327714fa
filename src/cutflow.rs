//! Cut-flow accounting
//!
//! This module accumulates per-stage pass counters and jet diagnostics
//! across the event loop, then derives the final efficiency figures.

use crate::{
    numeric::Float,
    selection::{BQuarkMatch, Verdict},
};
use prefix_num_ops::real::*;
use serde::Serialize;

/// Number of counter slots in the cut-flow array
///
/// The pipeline defines 7 stages, the spare slots stay at zero.
pub const NUM_COUNTERS: usize = 20;

/// Selection stages, in pipeline order
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    /// A generator-level Z -> ee decay was found
    GenZToEe,

    /// A generator-level H -> bb decay was found
    GenHToBb,

    /// A single-lepton trigger path fired
    Trigger,

    /// At least one primary vertex was reconstructed
    Vertex,

    /// A qualifying opposite-charge electron pair was formed
    LeptonPair,

    /// A cleaned fat jet survived in the soft-drop window
    VJet,

    /// The reconstructed resonance mass cleared the threshold
    ResonanceMass,
}
//
impl Stage {
    /// Every stage, in pipeline order
    pub const ALL: [Stage; 7] = [
        Stage::GenZToEe,
        Stage::GenHToBb,
        Stage::Trigger,
        Stage::Vertex,
        Stage::LeptonPair,
        Stage::VJet,
        Stage::ResonanceMass,
    ];

    /// Position of this stage in the pipeline, which is also its counter slot
    pub fn index(self) -> usize {
        self as usize
    }

    /// Label of this stage in the cut-flow histogram
    pub fn label(self) -> &'static str {
        match self {
            Stage::GenZToEe => "Z->ee in Gen",
            Stage::GenHToBb => "H->bb in Gen",
            Stage::Trigger => "HLT",
            Stage::Vertex => "Vertex",
            Stage::LeptonPair => "Leptons",
            Stage::VJet => "V-jet",
            Stage::ResonanceMass => "Zprime mass",
        }
    }
}

/// Tally of accepted jets by number of spatially matched truth b-quarks
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct BMatchTally {
    /// Jets matching neither truth b-quark
    pub neither: u64,

    /// Jets matching exactly one truth b-quark
    pub one: u64,

    /// Jets matching both truth b-quarks
    pub both: u64,
}
//
impl BMatchTally {
    /// Record one classified jet
    pub fn record(&mut self, class: BQuarkMatch) {
        match class {
            BQuarkMatch::Neither => self.neither += 1,
            BQuarkMatch::One => self.one += 1,
            BQuarkMatch::Both => self.both += 1,
        }
    }

    /// Number of jets classified so far
    pub fn classified(&self) -> u64 {
        self.neither + self.one + self.both
    }
}

/// This struct accumulates cut-flow statistics during the event loop, and
/// ultimately computes the final results (see FinalResults below).
pub struct CutflowCounters {
    /// Number of processed events
    n_total: u64,

    /// Events that passed stage k, for each k
    n_pass: [u64; NUM_COUNTERS],

    /// Selected jets across all events that reached the jet stage
    n_jets_selected: u64,

    /// Selected jets across accepted events only
    n_jets_filled: u64,

    /// Truth b-quark matches among accepted jets
    b_match: BMatchTally,
}
//
impl CutflowCounters {
    /// Prepare for accumulation
    pub fn new() -> Self {
        CutflowCounters {
            n_total: 0,
            n_pass: [0; NUM_COUNTERS],
            n_jets_selected: 0,
            n_jets_filled: 0,
            b_match: BMatchTally::default(),
        }
    }

    /// Fold in the verdict of one processed event
    pub fn record(&mut self, verdict: &Verdict) {
        self.n_total += 1;
        match verdict {
            Verdict::Rejected { stage, n_jets } => {
                for passed in &mut self.n_pass[..stage.index()] {
                    *passed += 1;
                }
                self.n_jets_selected += *n_jets as u64;
            }
            Verdict::Accepted(selected) => {
                for stage in Stage::ALL {
                    self.n_pass[stage.index()] += 1;
                }
                let n_jets = selected.jets.len() as u64;
                self.n_jets_selected += n_jets;
                self.n_jets_filled += n_jets;
                if let Some(classes) = &selected.b_matches {
                    for &class in classes {
                        self.b_match.record(class);
                    }
                }
            }
        }
    }

    /// Fold in counters accumulated over another batch of events
    #[allow(dead_code)] // the event loop is currently sequential
    pub fn merge(&mut self, other: Self) {
        self.n_total += other.n_total;
        for (mine, theirs) in self.n_pass.iter_mut().zip(other.n_pass) {
            *mine += theirs;
        }
        self.n_jets_selected += other.n_jets_selected;
        self.n_jets_filled += other.n_jets_filled;
        self.b_match.neither += other.b_match.neither;
        self.b_match.one += other.b_match.one;
        self.b_match.both += other.b_match.both;
    }

    /// Turn the accumulated tallies into finalized results
    pub fn finalize(self) -> FinalResults {
        let pass = self.n_pass[Stage::ResonanceMass.index()] as Float;
        let fail = self.n_total as Float - pass;

        // Binomial efficiency uncertainty propagated through the fail/pass
        // odds ratio. The boundary cases (no passing or no failing events)
        // yield non-finite values, which propagate to the output.
        let f_over_p = fail / pass;
        let f_over_p_error = f_over_p * sqrt(1. / fail + 1. / pass);
        let efficiency = pass / self.n_pass[Stage::GenHToBb.index()] as Float;
        let efficiency_err = f_over_p_error / (1. + f_over_p).powi(2);

        let classified = self.b_match.classified() as Float;
        let match_at_least_one_rate = (self.b_match.one + self.b_match.both) as Float / classified;
        let match_both_rate = self.b_match.both as Float / classified;

        FinalResults {
            n_total: self.n_total,
            n_pass: self.n_pass,
            n_jets_selected: self.n_jets_selected,
            n_jets_filled: self.n_jets_filled,
            b_match: self.b_match,
            efficiency,
            efficiency_err,
            match_at_least_one_rate,
            match_both_rate,
        }
    }
}

/// Final cut-flow results of one analysis run
#[derive(Clone, Debug, Serialize)]
pub struct FinalResults {
    /// Number of processed events
    pub n_total: u64,

    /// Events that passed stage k, for each k
    pub n_pass: [u64; NUM_COUNTERS],

    /// Selected jets across all events that reached the jet stage
    pub n_jets_selected: u64,

    /// Selected jets across accepted events only
    pub n_jets_filled: u64,

    /// Truth b-quark matches among accepted jets
    pub b_match: BMatchTally,

    /// Accepted events over generator-matched events
    pub efficiency: Float,

    /// Uncertainty on the efficiency
    pub efficiency_err: Float,

    /// Fraction of classified jets matching at least one truth b-quark
    pub match_at_least_one_rate: Float,

    /// Fraction of classified jets matching both truth b-quarks
    pub match_both_rate: Float,
}
//
impl FinalResults {
    /// Events that passed the given stage
    pub fn passed(&self, stage: Stage) -> u64 {
        self.n_pass[stage.index()]
    }
}
