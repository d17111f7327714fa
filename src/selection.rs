//! Event selection pipeline
//!
//! Each decoded event passes through a fixed sequence of gates: generator
//! truth matching, trigger, vertex, electron pairing, fat jet selection with
//! lepton cleaning, and finally a cut on the reconstructed resonance mass.
//! The first failed gate rejects the event, later gates are not evaluated.

use crate::{
    config::WorkingPoint,
    cutflow::Stage,
    event::{Electron, Event, GenParticle, Muon, TriggerDecision},
    momentum::{delta_r, invariant_mass, pseudorapidity, transverse_momentum, Momentum},
    numeric::Float,
};
use particle_id::ParticleID;
use prefix_num_ops::real::*;
use tracing::warn;

// ### PHYSICS CONSTANTS ###

/// PDG identity code of the Z boson
const Z_BOSON: ParticleID = ParticleID::new(23);

/// PDG identity code of the Higgs boson
const HIGGS_BOSON: ParticleID = ParticleID::new(25);

/// PDG identity code of the electron
const ELECTRON: ParticleID = ParticleID::new(11);

/// PDG identity code of the bottom quark
const BOTTOM_QUARK: ParticleID = ParticleID::new(5);

/// Name prefix of the accepted single-electron trigger paths
const ELECTRON_TRIGGER: &str = "HLT_Ele105";

/// Name prefix of the accepted single-muon trigger paths
const MUON_TRIGGER: &str = "HLT_Mu45";

// ### SELECTION CONSTANTS ###

/// Pseudorapidity acceptance of quality electrons
const ELECTRON_ETA_MAX: Float = 2.5;

/// Supercluster |eta| range of the barrel/endcap transition, excluded
const TRANSITION_GAP: (Float, Float) = (1.442, 1.566);

/// Maximum mini-isolation of quality electrons and muons
const MINI_ISO_MAX: Float = 0.1;

/// Pseudorapidity acceptance of quality muons
const MUON_ETA_MAX: Float = 2.1;

/// Minimum transverse momentum of quality muons (GeV)
const MUON_PT_MIN: Float = 50.;

/// Invariant mass window [low, high) of electron pairs (GeV)
const PAIR_MASS_WINDOW: (Float, Float) = (70., 110.);

/// Minimum transverse momentum of selected jets (GeV)
const JET_PT_MIN: Float = 200.;

/// Pseudorapidity acceptance of selected jets
const JET_ETA_MAX: Float = 2.4;

/// Angular separation below which a jet overlaps a quality lepton
const OVERLAP_DELTA_R: Float = 0.8;

/// Minimum mass of the (leading jet + Z candidate) system (GeV)
const RESONANCE_MASS_MIN: Float = 400.;

/// Angular separation below which a truth b-quark matches a jet
const B_MATCH_DELTA_R: Float = 0.8;

/// Soft-drop mass window [low, high) of jets entering the b-match counts (GeV)
const B_MATCH_SD_WINDOW: (Float, Float) = (20., 220.);

// ### SELECTION OUTCOME ###

/// One qualifying electron pair
#[derive(Clone, Copy, Debug)]
pub struct LeptonPair {
    /// Invariant mass of the pair (GeV)
    pub mass: Float,

    /// Transverse momentum of the pair (GeV)
    pub pt: Float,
}

/// One jet that survived the jet selection
#[derive(Clone, Copy, Debug)]
pub struct SelectedJet {
    /// Position of the jet in the event's jet list
    pub index: usize,

    /// Soft-drop groomed mass (GeV)
    pub soft_drop_mass: Float,
}

/// Number of truth b-quarks spatially matched to one jet
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BQuarkMatch {
    /// Neither b-quark lies within the matching cone
    Neither,

    /// Exactly one b-quark lies within the matching cone
    One,

    /// Both b-quarks lie within the matching cone
    Both,
}

/// Quantities retained from an accepted event
#[derive(Clone, Debug)]
pub struct Selected {
    /// Transverse momentum of every quality electron (GeV)
    pub electron_pts: Vec<Float>,

    /// Every qualifying electron pair
    pub pairs: Vec<LeptonPair>,

    /// Every jet that survived the jet selection
    pub jets: Vec<SelectedJet>,

    /// Truth b-quark match of each surviving jet in the matching mass window,
    /// or None when the truth record did not hold exactly two b-quarks
    pub b_matches: Option<Vec<BQuarkMatch>>,
}

/// Outcome of running the selection pipeline over one event
#[derive(Clone, Debug)]
pub enum Verdict {
    /// The event failed one of the gates
    Rejected {
        /// First gate that the event did not survive
        stage: Stage,

        /// Jets that had survived the jet selection at rejection time
        n_jets: usize,
    },

    /// The event survived every gate
    Accepted(Selected),
}

// ### SELECTION PIPELINE ###

/// This struct applies the selection pipeline to decoded events
pub struct EventSelection<'cfg> {
    /// Kinematic working point applied by the pT and mass cuts
    working_point: &'cfg WorkingPoint,
}
//
impl<'cfg> EventSelection<'cfg> {
    /// Set up the selection for one kinematic working point
    pub fn new(working_point: &'cfg WorkingPoint) -> Self {
        Self { working_point }
    }

    /// Run the full gate sequence over one event
    pub fn select(&self, event: &Event) -> Verdict {
        // Generator-level truth matching comes first, so that the efficiency
        // denominator only counts events with the targeted decay chain
        if !z_to_electrons_found(&event.gen_particles) {
            return Verdict::Rejected {
                stage: Stage::GenZToEe,
                n_jets: 0,
            };
        }
        let truth_b = higgs_to_b_daughters(&event.gen_particles);
        if truth_b.is_empty() {
            return Verdict::Rejected {
                stage: Stage::GenHToBb,
                n_jets: 0,
            };
        }

        if !single_lepton_trigger_fired(&event.triggers) {
            return Verdict::Rejected {
                stage: Stage::Trigger,
                n_jets: 0,
            };
        }

        if event.num_vertices < 1 {
            return Verdict::Rejected {
                stage: Stage::Vertex,
                n_jets: 0,
            };
        }

        let good_electrons = self.quality_electrons(&event.electrons);
        let (pairs, z_candidate) = self.electron_pairs(&event.electrons, &good_electrons);
        let Some(z_candidate) = z_candidate else {
            return Verdict::Rejected {
                stage: Stage::LeptonPair,
                n_jets: 0,
            };
        };

        let good_muons = quality_muons(&event.muons);
        let jets = self.cleaned_jets(event, &good_electrons, &good_muons);
        let Some(leading) = jets.first() else {
            return Verdict::Rejected {
                stage: Stage::VJet,
                n_jets: 0,
            };
        };
        let leading_jet = event.jets[leading.index].p4;

        let resonance_mass = invariant_mass(&(leading_jet + z_candidate));
        if resonance_mass < RESONANCE_MASS_MIN {
            return Verdict::Rejected {
                stage: Stage::ResonanceMass,
                n_jets: jets.len(),
            };
        }

        let electron_pts = good_electrons
            .iter()
            .map(|&ie| transverse_momentum(&event.electrons[ie].p4))
            .collect();
        let b_matches = classify_b_matches(event, &truth_b, &jets);
        Verdict::Accepted(Selected {
            electron_pts,
            pairs,
            jets,
            b_matches,
        })
    }

    /// Indices of the electrons passing the quality cuts, in input order
    fn quality_electrons(&self, electrons: &[Electron]) -> Vec<usize> {
        let mut good = Vec::new();
        for (ie, electron) in electrons.iter().enumerate() {
            if abs(pseudorapidity(&electron.p4)) > ELECTRON_ETA_MAX {
                continue;
            }
            let sc_eta = abs(electron.sc_eta);
            if !(sc_eta < TRANSITION_GAP.0 || sc_eta > TRANSITION_GAP.1) {
                continue;
            }
            if transverse_momentum(&electron.p4) < self.working_point.electron_pt_min {
                continue;
            }
            if !electron.passes_heep_id {
                continue;
            }
            if electron.mini_iso > MINI_ISO_MAX {
                continue;
            }
            good.push(ie);
        }
        good
    }

    /// Form every qualifying electron pair, and the Z candidate momentum from
    /// the first one
    fn electron_pairs(
        &self,
        electrons: &[Electron],
        good_electrons: &[usize],
    ) -> (Vec<LeptonPair>, Option<Momentum>) {
        let mut pairs = Vec::new();
        let mut z_candidate = None;
        for (rank, &ie) in good_electrons.iter().enumerate() {
            for &je in &good_electrons[..rank] {
                if electrons[ie].charge * electrons[je].charge > 0 {
                    continue;
                }
                let pair_p4 = electrons[ie].p4 + electrons[je].p4;
                let mass = invariant_mass(&pair_p4);
                if mass < PAIR_MASS_WINDOW.0 || mass >= PAIR_MASS_WINDOW.1 {
                    continue;
                }
                let pt = transverse_momentum(&pair_p4);
                if let Some(pair_pt_min) = self.working_point.pair_pt_min {
                    if pt < pair_pt_min {
                        continue;
                    }
                }
                pairs.push(LeptonPair { mass, pt });
                if z_candidate.is_none() {
                    z_candidate = Some(pair_p4);
                }
            }
        }
        (pairs, z_candidate)
    }

    /// Jets in the soft-drop window that pass lepton cleaning and the
    /// kinematic cuts, in input order
    fn cleaned_jets(
        &self,
        event: &Event,
        good_electrons: &[usize],
        good_muons: &[usize],
    ) -> Vec<SelectedJet> {
        let (sd_low, sd_high) = self.working_point.soft_drop_window;
        let mut selected = Vec::new();
        for (ij, jet) in event.jets.iter().enumerate() {
            if jet.soft_drop_mass < sd_low || jet.soft_drop_mass >= sd_high {
                continue;
            }
            let mut lepton_momenta = good_electrons
                .iter()
                .map(|&ie| &event.electrons[ie].p4)
                .chain(good_muons.iter().map(|&im| &event.muons[im].p4));
            if lepton_momenta.any(|lepton_p4| delta_r(&jet.p4, lepton_p4) < OVERLAP_DELTA_R) {
                continue;
            }
            if transverse_momentum(&jet.p4) < JET_PT_MIN {
                continue;
            }
            if abs(pseudorapidity(&jet.p4)) > JET_ETA_MAX {
                continue;
            }
            selected.push(SelectedJet {
                index: ij,
                soft_drop_mass: jet.soft_drop_mass,
            });
        }
        selected
    }
}

// ### STAGE HELPERS ###

/// Truth of "the generator record holds a Z decaying to electrons"
///
/// The scan stops at the first Z boson with two valid daughter links of which
/// at least one is an electron. Z bosons decaying to other flavours do not
/// stop the scan.
fn z_to_electrons_found(gen_particles: &[GenParticle]) -> bool {
    for particle in gen_particles {
        if particle.id != Z_BOSON {
            continue;
        }
        let Some((da1, da2)) = particle.daughter_indices(gen_particles.len()) else {
            continue;
        };
        let da1_id = gen_particles[da1].id.id();
        let da2_id = gen_particles[da2].id.id();
        if da1_id.abs() == ELECTRON.id() || da2_id.abs() == ELECTRON.id() {
            return true;
        }
    }
    false
}

/// Daughter indices of the first Higgs boson decaying to b-quarks, or an
/// empty list when the generator record holds none
fn higgs_to_b_daughters(gen_particles: &[GenParticle]) -> Vec<usize> {
    for particle in gen_particles {
        if particle.id != HIGGS_BOSON {
            continue;
        }
        let Some((da1, da2)) = particle.daughter_indices(gen_particles.len()) else {
            continue;
        };
        let da1_id = gen_particles[da1].id.id();
        let da2_id = gen_particles[da2].id.id();
        if da1_id.abs() == BOTTOM_QUARK.id() || da2_id.abs() == BOTTOM_QUARK.id() {
            return vec![da1, da2];
        }
    }
    Vec::new()
}

/// Truth of "one of the accepted single-lepton trigger paths fired"
fn single_lepton_trigger_fired(triggers: &[TriggerDecision]) -> bool {
    triggers.iter().any(|trigger| {
        (trigger.name.contains(ELECTRON_TRIGGER) || trigger.name.contains(MUON_TRIGGER))
            && trigger.fired
    })
}

/// Indices of the muons passing the quality cuts, in input order
fn quality_muons(muons: &[Muon]) -> Vec<usize> {
    let mut good = Vec::new();
    for (im, muon) in muons.iter().enumerate() {
        if !muon.is_high_pt && !muon.is_custom_tracker {
            continue;
        }
        if muon.mini_iso > MINI_ISO_MAX {
            continue;
        }
        if good.len() == 1 {
            // Cross-quality check for the second muon. The reference is the
            // muon in detector slot 0, which need not be the one already
            // accepted.
            let first = &muons[0];
            let high_pt_and_tracker = first.is_high_pt && muon.is_custom_tracker;
            let tracker_and_high_pt = muon.is_high_pt && first.is_custom_tracker;
            if !(high_pt_and_tracker || tracker_and_high_pt) {
                continue;
            }
        }
        if abs(pseudorapidity(&muon.p4)) > MUON_ETA_MAX {
            continue;
        }
        if transverse_momentum(&muon.p4) < MUON_PT_MIN {
            continue;
        }
        good.push(im);
    }
    good
}

/// Classify each surviving jet in the matching mass window by the number of
/// truth b-quarks within its matching cone
///
/// Returns None (and warns) when the truth record does not hold exactly two
/// b-quark daughters, as the match rates are then undefined.
fn classify_b_matches(
    event: &Event,
    truth_b: &[usize],
    jets: &[SelectedJet],
) -> Option<Vec<BQuarkMatch>> {
    let &[b1, b2] = truth_b else {
        warn!(
            count = truth_b.len(),
            "unexpected number of truth b-quarks, skipping jet matching"
        );
        return None;
    };
    let b1_p4 = &event.gen_particles[b1].p4;
    let b2_p4 = &event.gen_particles[b2].p4;
    let mut classes = Vec::with_capacity(jets.len());
    for jet in jets {
        if jet.soft_drop_mass < B_MATCH_SD_WINDOW.0 || jet.soft_drop_mass >= B_MATCH_SD_WINDOW.1 {
            continue;
        }
        let jet_p4 = &event.jets[jet.index].p4;
        let matches_b1 = delta_r(jet_p4, b1_p4) < B_MATCH_DELTA_R;
        let matches_b2 = delta_r(jet_p4, b2_p4) < B_MATCH_DELTA_R;
        classes.push(match (matches_b1, matches_b2) {
            (false, false) => BQuarkMatch::Neither,
            (true, true) => BQuarkMatch::Both,
            _ => BQuarkMatch::One,
        });
    }
    Some(classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::WorkingPoint,
        cutflow::CutflowCounters,
        event::{EventId, FatJet},
        momentum::from_pt_eta_phi_m,
        numeric::floats::consts::PI,
    };

    fn working_point(region: u32) -> &'static WorkingPoint {
        WorkingPoint::for_region(region).unwrap()
    }

    fn electron(pt: Float, eta: Float, phi: Float, charge: i32) -> Electron {
        Electron {
            p4: from_pt_eta_phi_m(pt, eta, phi, 0.),
            sc_eta: eta,
            mini_iso: 0.01,
            passes_heep_id: true,
            charge,
        }
    }

    fn muon(pt: Float, eta: Float, phi: Float, is_high_pt: bool, is_custom_tracker: bool) -> Muon {
        Muon {
            p4: from_pt_eta_phi_m(pt, eta, phi, 0.),
            is_high_pt,
            is_custom_tracker,
            mini_iso: 0.01,
        }
    }

    fn jet(pt: Float, eta: Float, phi: Float, soft_drop_mass: Float) -> FatJet {
        FatJet {
            p4: from_pt_eta_phi_m(pt, eta, phi, soft_drop_mass),
            soft_drop_mass,
        }
    }

    fn gen_particle(id: i32, daughters: [i32; 2], p4: Momentum) -> GenParticle {
        GenParticle {
            id: ParticleID::new(id),
            status: 62,
            mother_id: ParticleID::new(32),
            daughters,
            p4,
        }
    }

    /// Generator record with a Z -> ee and an H -> bb decay, with the
    /// b-quarks at the requested (eta, phi) positions
    fn truth_record(b1: (Float, Float), b2: (Float, Float)) -> Vec<GenParticle> {
        let origin = Momentum::zeros();
        vec![
            gen_particle(23, [2, 3], origin),
            gen_particle(25, [4, 5], origin),
            gen_particle(11, [-1, -1], origin),
            gen_particle(-11, [-1, -1], origin),
            gen_particle(5, [-1, -1], from_pt_eta_phi_m(150., b1.0, b1.1, 4.8)),
            gen_particle(-5, [-1, -1], from_pt_eta_phi_m(140., b2.0, b2.1, 4.8)),
        ]
    }

    fn ele_trigger() -> Vec<TriggerDecision> {
        vec![TriggerDecision {
            name: "HLT_Ele105_CaloIdVT_GsfTrkIdT_v1".to_owned(),
            fired: true,
        }]
    }

    fn empty_event() -> Event {
        Event {
            id: EventId {
                run: 1,
                lumi: 1,
                event: 1,
            },
            num_vertices: 1,
            gen_particles: vec![],
            triggers: vec![],
            electrons: vec![],
            muons: vec![],
            jets: vec![],
        }
    }

    /// Event that survives the full pipeline at working point 5: a 130/120
    /// GeV opposite-charge electron pair at mass 91 and combined pT 250, and
    /// one clean 300 GeV jet of soft-drop mass 110 with both truth b-quarks
    /// inside its matching cone
    fn golden_event() -> Event {
        let cosh_eta2 = 1. + 91_f64.powi(2) / (2. * 130. * 120.);
        let eta2 = cosh_eta2.acosh();
        Event {
            id: EventId {
                run: 100,
                lumi: 200,
                event: 300,
            },
            num_vertices: 1,
            gen_particles: truth_record((1., PI - 0.1), (1.2, PI + 0.2)),
            triggers: ele_trigger(),
            electrons: vec![electron(130., 0., 0., 1), electron(120., eta2, 0., -1)],
            muons: vec![],
            jets: vec![jet(300., 1., PI, 110.)],
        }
    }

    #[test]
    fn boson_scan_skips_invalid_daughters_and_other_flavours() {
        let origin = Momentum::zeros();
        let mut gen = vec![
            gen_particle(23, [-1, -1], origin), // no daughter links
            gen_particle(23, [3, 4], origin),   // Z -> mumu
            gen_particle(23, [5, 6], origin),   // Z -> ee
            gen_particle(13, [-1, -1], origin),
            gen_particle(-13, [-1, -1], origin),
            gen_particle(11, [-1, -1], origin),
            gen_particle(-11, [-1, -1], origin),
        ];
        assert!(z_to_electrons_found(&gen));
        // Out-of-range daughter links disqualify the last Z as well
        gen[2].daughters = [5, 99];
        assert!(!z_to_electrons_found(&gen));
    }

    #[test]
    fn higgs_scan_records_both_daughter_indices() {
        let gen = truth_record((0.5, 0.), (-0.5, 1.));
        assert_eq!(higgs_to_b_daughters(&gen), vec![4, 5]);

        // A Higgs decaying to charm does not count
        let origin = Momentum::zeros();
        let no_bb = vec![
            gen_particle(25, [2, 3], origin),
            gen_particle(32, [-1, -1], origin),
            gen_particle(4, [-1, -1], origin),
            gen_particle(-4, [-1, -1], origin),
        ];
        assert!(higgs_to_b_daughters(&no_bb).is_empty());
    }

    #[test]
    fn trigger_needs_a_matching_path_that_fired() {
        let trig = |name: &str, fired| TriggerDecision {
            name: name.to_owned(),
            fired,
        };
        assert!(single_lepton_trigger_fired(&[trig(
            "HLT_Ele105_CaloIdVT_GsfTrkIdT_v1",
            true
        )]));
        assert!(single_lepton_trigger_fired(&[trig("HLT_Mu45_eta2p1_v2", true)]));
        assert!(!single_lepton_trigger_fired(&[trig(
            "HLT_Ele105_CaloIdVT_GsfTrkIdT_v1",
            false
        )]));
        assert!(!single_lepton_trigger_fired(&[trig("HLT_Ele27_WPTight_v7", true)]));
        assert!(single_lepton_trigger_fired(&[
            trig("HLT_Ele27_WPTight_v7", true),
            trig("HLT_Mu45_eta2p1_v2", true),
        ]));
    }

    #[test]
    fn electron_quality_rejects_the_transition_region() {
        let selection = EventSelection::new(working_point(1));
        let barrel = electron(120., 1.0, 0., 1);
        let mut gap_low = electron(120., 1.0, 0., 1);
        gap_low.sc_eta = 1.442;
        let mut gap_high = electron(120., 1.0, 0., 1);
        gap_high.sc_eta = -1.566;
        let mut endcap = electron(120., 2.0, 0., 1);
        endcap.sc_eta = 2.0;
        let mut forward = electron(120., 2.6, 0., 1);
        forward.sc_eta = 2.0;
        let mut dirty = electron(120., 1.0, 0., 1);
        dirty.mini_iso = 0.2;
        let mut unidentified = electron(120., 1.0, 0., 1);
        unidentified.passes_heep_id = false;
        let electrons = vec![barrel, gap_low, gap_high, endcap, forward, dirty, unidentified];
        assert_eq!(selection.quality_electrons(&electrons), vec![0, 3]);
    }

    #[test]
    fn electron_pt_threshold_follows_the_working_point() {
        let electrons = vec![
            electron(80., 0.5, 0., 1),
            electron(90., 0.5, 0., 1),
            electron(105., 0.5, 0., 1),
            electron(120., 0.5, 0., 1),
        ];
        let good = |region| {
            EventSelection::new(working_point(region)).quality_electrons(&electrons)
        };
        assert_eq!(good(1), vec![0, 1, 2, 3]);
        assert_eq!(good(2), vec![1, 2, 3]);
        assert_eq!(good(4), vec![2, 3]);
        assert_eq!(good(5), vec![3]);
    }

    #[test]
    fn pair_mass_window_is_half_open() {
        let selection = EventSelection::new(working_point(1));
        let pair_count = |mass: Float| {
            let half = mass / 2.;
            let electrons = vec![
                Electron {
                    p4: Momentum::new(half, 0., 0., half),
                    sc_eta: 0.,
                    mini_iso: 0.,
                    passes_heep_id: true,
                    charge: 1,
                },
                Electron {
                    p4: Momentum::new(-half, 0., 0., half),
                    sc_eta: 0.,
                    mini_iso: 0.,
                    passes_heep_id: true,
                    charge: -1,
                },
            ];
            selection.electron_pairs(&electrons, &[0, 1]).0.len()
        };
        assert_eq!(pair_count(69.9), 0);
        assert_eq!(pair_count(70.0), 1);
        assert_eq!(pair_count(109.9), 1);
        assert_eq!(pair_count(110.0), 0);
    }

    #[test]
    fn pairs_require_non_positive_charge_product() {
        let selection = EventSelection::new(working_point(1));
        let with_charges = |c1, c2| {
            let electrons = vec![
                Electron {
                    p4: Momentum::new(45.5, 0., 0., 45.5),
                    sc_eta: 0.,
                    mini_iso: 0.,
                    passes_heep_id: true,
                    charge: c1,
                },
                Electron {
                    p4: Momentum::new(-45.5, 0., 0., 45.5),
                    sc_eta: 0.,
                    mini_iso: 0.,
                    passes_heep_id: true,
                    charge: c2,
                },
            ];
            selection.electron_pairs(&electrons, &[0, 1]).0.len()
        };
        assert_eq!(with_charges(1, 1), 0);
        assert_eq!(with_charges(-1, -1), 0);
        assert_eq!(with_charges(1, -1), 1);
        // A charge of zero can pair with anything
        assert_eq!(with_charges(0, 1), 1);
    }

    #[test]
    fn first_qualifying_pair_becomes_the_z_candidate() {
        let selection = EventSelection::new(working_point(1));
        let towards = |px: Float, energy: Float, charge| Electron {
            p4: Momentum::new(px, 0., 0., energy),
            sc_eta: 0.,
            mini_iso: 0.,
            passes_heep_id: true,
            charge,
        };
        let electrons = vec![
            towards(35., 35., 1),
            towards(-8281. / 140., 8281. / 140., -1), // pairs at mass 91
            towards(-9025. / 140., 9025. / 140., -1), // pairs at mass 95
        ];
        let (pairs, z_candidate) = selection.electron_pairs(&electrons, &[0, 1, 2]);
        assert_eq!(pairs.len(), 2);
        assert!((pairs[0].mass - 91.).abs() < 1e-9);
        assert!((pairs[1].mass - 95.).abs() < 1e-9);
        assert!((invariant_mass(&z_candidate.unwrap()) - 91.).abs() < 1e-9);
    }

    #[test]
    fn second_muon_check_reads_detector_slot_zero() {
        // Slot 0 fails isolation, but still serves as the reference of the
        // second-muon cross-quality check
        let mut dirty_tracker = muon(60., 0., 0., false, true);
        dirty_tracker.mini_iso = 0.5;
        let muons = vec![
            dirty_tracker,
            muon(60., 0.5, 1., true, false),
            muon(60., -0.5, 2., true, false),
            muon(49., 0., 0., true, true),  // too soft
            muon(60., 2.2, 0., true, true), // too forward
        ];
        assert_eq!(quality_muons(&muons), vec![1, 2]);

        // With a high-pT-only muon in slot 0, the second candidate is dropped
        let mut flipped = muons.clone();
        flipped[0].is_high_pt = true;
        flipped[0].is_custom_tracker = false;
        assert_eq!(quality_muons(&flipped), vec![1]);
    }

    #[test]
    fn jet_lepton_overlap_boundary_is_strict() {
        let selection = EventSelection::new(working_point(1));
        let mut event = empty_event();
        event.electrons = vec![electron(120., 0., 0., 1)];
        event.muons = vec![muon(60., -0.5, 0., true, false)];
        event.jets = vec![
            jet(300., 0.79, 0., 100.),  // within 0.8 of the electron
            jet(300., 0.81, 0., 100.),  // clear of both leptons
            jet(300., -0.9, 0., 100.),  // within 0.8 of the muon
        ];
        let jets = selection.cleaned_jets(&event, &[0], &[0]);
        assert_eq!(jets.len(), 1);
        assert_eq!(jets[0].index, 1);
    }

    #[test]
    fn jets_exactly_at_the_overlap_threshold_survive() {
        let selection = EventSelection::new(working_point(1));
        let mut event = empty_event();
        event.electrons = vec![electron(120., 0., 0., 1)];
        let reference = event.electrons[0].p4;

        // At phi = 0 everywhere and with the electron at eta = 0, the
        // separation reduces to the jet's computed pseudorapidity. The builder
        // does not round-trip eta exactly, so scan its ulp neighbourhood, over
        // a few jet momenta, for an input whose separation lands exactly on
        // the threshold.
        let ulp = Float::EPSILON / 2.;
        let (pt, eta) = [250., 275., 300., 325., 350.]
            .into_iter()
            .find_map(|pt| {
                (-1000..=1000)
                    .map(|k| OVERLAP_DELTA_R + k as Float * ulp)
                    .find(|&eta| {
                        delta_r(&jet(pt, eta, 0., 100.).p4, &reference) == OVERLAP_DELTA_R
                    })
                    .map(|eta| (pt, eta))
            })
            .expect("some jet should land exactly on the separation threshold");

        event.jets = vec![jet(pt, eta, 0., 100.)];
        let jets = selection.cleaned_jets(&event, &[0], &[]);
        assert_eq!(jets.len(), 1);
        assert_eq!(jets[0].index, 0);
    }

    #[test]
    fn jet_cuts_apply_the_window_then_the_kinematics() {
        let selection = EventSelection::new(working_point(2));
        let mut event = empty_event();
        event.jets = vec![
            jet(300., 0., 0., 39.9), // below the soft-drop window
            jet(300., 0., 0., 140.), // at the upper edge, excluded
            jet(199., 0., 0., 100.), // too soft
            jet(300., 2.5, 0., 100.), // too forward
            jet(300., 1., 0., 40.),  // at the lower edge, included
        ];
        let jets = selection.cleaned_jets(&event, &[], &[]);
        assert_eq!(jets.len(), 1);
        assert_eq!(jets[0].index, 4);
        assert!((jets[0].soft_drop_mass - 40.).abs() < 1e-12);
    }

    #[test]
    fn b_match_covers_every_window_jet_exactly_once() {
        let mut event = empty_event();
        event.gen_particles = truth_record((0., 0.), (0., 0.5));
        event.jets = vec![
            jet(300., 0., 0.25, 100.), // within 0.8 of both
            jet(300., 0., 2.5, 20.),   // clear of both
            jet(300., 0., -0.5, 100.), // within 0.8 of the first only
            jet(300., 0., 0.25, 19.9),
            jet(300., 0., 0.25, 220.),
        ];
        let jets: Vec<_> = event
            .jets
            .iter()
            .enumerate()
            .map(|(index, jet)| SelectedJet {
                index,
                soft_drop_mass: jet.soft_drop_mass,
            })
            .collect();
        let classes = classify_b_matches(&event, &[4, 5], &jets).unwrap();
        // The last two jets fall outside the matching mass window
        assert_eq!(
            classes,
            vec![BQuarkMatch::Both, BQuarkMatch::Neither, BQuarkMatch::One]
        );

        // Anything but two truth b-quarks disables the matching
        assert_eq!(classify_b_matches(&event, &[4], &jets), None);
    }

    #[test]
    fn full_selection_chain_accepts_a_golden_event() {
        let selection = EventSelection::new(working_point(5));
        let event = golden_event();
        let verdict = selection.select(&event);
        let Verdict::Accepted(selected) = verdict else {
            panic!("the golden event should survive the full pipeline");
        };
        assert_eq!(selected.electron_pts.len(), 2);
        assert_eq!(selected.pairs.len(), 1);
        assert!((selected.pairs[0].mass - 91.).abs() < 1e-6);
        assert!((selected.pairs[0].pt - 250.).abs() < 1e-6);
        assert_eq!(selected.jets.len(), 1);
        assert_eq!(selected.jets[0].index, 0);
        let resonance =
            event.jets[selected.jets[0].index].p4 + event.electrons[0].p4 + event.electrons[1].p4;
        assert!(invariant_mass(&resonance) >= RESONANCE_MASS_MIN);
        assert_eq!(selected.b_matches, Some(vec![BQuarkMatch::Both]));
    }

    #[test]
    fn rejection_reports_the_first_failing_stage() {
        let selection = EventSelection::new(working_point(5));

        let mut event = golden_event();
        event.gen_particles[0].daughters = [-1, -1];
        assert!(matches!(
            selection.select(&event),
            Verdict::Rejected {
                stage: Stage::GenZToEe,
                ..
            }
        ));

        let mut event = golden_event();
        event.gen_particles[1].id = ParticleID::new(24);
        assert!(matches!(
            selection.select(&event),
            Verdict::Rejected {
                stage: Stage::GenHToBb,
                ..
            }
        ));

        let mut event = golden_event();
        event.triggers[0].fired = false;
        assert!(matches!(
            selection.select(&event),
            Verdict::Rejected {
                stage: Stage::Trigger,
                ..
            }
        ));

        let mut event = golden_event();
        event.num_vertices = 0;
        assert!(matches!(
            selection.select(&event),
            Verdict::Rejected {
                stage: Stage::Vertex,
                ..
            }
        ));

        let mut event = golden_event();
        event.electrons[1].charge = 1;
        assert!(matches!(
            selection.select(&event),
            Verdict::Rejected {
                stage: Stage::LeptonPair,
                ..
            }
        ));

        let mut event = golden_event();
        event.jets[0].soft_drop_mass = 150.;
        assert!(matches!(
            selection.select(&event),
            Verdict::Rejected {
                stage: Stage::VJet,
                n_jets: 0,
            }
        ));

        // A jet close to the Z candidate drags the resonance mass below 400
        let mut event = golden_event();
        event.jets[0] = jet(210., 0.6, 1.2, 110.);
        assert!(matches!(
            selection.select(&event),
            Verdict::Rejected {
                stage: Stage::ResonanceMass,
                n_jets: 1,
            }
        ));
    }

    #[test]
    fn stage_counters_stay_monotonic_over_a_mixed_batch() {
        let selection = EventSelection::new(working_point(5));
        let mut events = vec![golden_event()];
        let degraded = |patch: fn(&mut Event)| {
            let mut event = golden_event();
            patch(&mut event);
            event
        };
        events.push(degraded(|ev| ev.gen_particles[0].daughters = [-1, -1]));
        events.push(degraded(|ev| ev.gen_particles[1].id = ParticleID::new(24)));
        events.push(degraded(|ev| ev.triggers[0].fired = false));
        events.push(degraded(|ev| ev.num_vertices = 0));
        events.push(degraded(|ev| ev.electrons[1].charge = 1));
        events.push(degraded(|ev| ev.jets[0].soft_drop_mass = 150.));
        events.push(degraded(|ev| ev.jets[0] = jet(210., 0.6, 1.2, 110.)));

        let mut counters = CutflowCounters::new();
        for event in &events {
            counters.record(&selection.select(event));
        }
        let results = counters.finalize();
        assert_eq!(results.n_total, 8);
        assert_eq!(&results.n_pass[..7], &[7, 6, 5, 4, 3, 2, 1]);
        for window in results.n_pass[..7].windows(2) {
            assert!(window[1] <= window[0]);
        }
        assert!(results.n_pass[0] <= results.n_total);
    }
}
