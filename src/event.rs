//! This module defines the structured per-event data model
//!
//! One `Event` is assembled from the branch-parallel arrays of an ntuple
//! record (see the ntuple module) and then fed through the selection.

use crate::{momentum::Momentum, numeric::Float};
use particle_id::ParticleID;
use std::fmt;

/// Identifier of one recorded collision
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EventId {
    /// Run number
    pub run: i32,

    /// Luminosity section within the run
    pub lumi: i32,

    /// Event number within the luminosity section
    pub event: i64,
}
//
impl fmt::Display for EventId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{} {} {}", self.run, self.lumi, self.event)
    }
}

/// One generator-level particle
#[derive(Clone, Copy, Debug)]
pub struct GenParticle {
    /// PDG identity code
    pub id: ParticleID,

    /// Generator status code (not consulted by the selection)
    #[allow(dead_code)]
    pub status: i32,

    /// PDG identity code of the mother particle (not consulted either)
    #[allow(dead_code)]
    pub mother_id: ParticleID,

    /// Positions of the two daughters in the event's particle list, negative
    /// when the generator recorded no such link
    pub daughters: [i32; 2],

    /// 4-momentum
    pub p4: Momentum,
}
//
impl GenParticle {
    /// Resolve the daughter links into indices of the event's particle list,
    /// or None when either link is missing or out of range
    pub fn daughter_indices(&self, num_particles: usize) -> Option<(usize, usize)> {
        let [da1, da2] = self.daughters;
        if da1 < 0 || da2 < 0 {
            return None;
        }
        let (da1, da2) = (da1 as usize, da2 as usize);
        if da1 >= num_particles || da2 >= num_particles {
            return None;
        }
        Some((da1, da2))
    }
}

/// Decision of one high-level trigger path
#[derive(Clone, Debug)]
pub struct TriggerDecision {
    /// Versioned trigger path name
    pub name: String,

    /// Truth of "this path accepted the event"
    pub fired: bool,
}

/// One reconstructed electron
#[derive(Clone, Copy, Debug)]
pub struct Electron {
    /// 4-momentum
    pub p4: Momentum,

    /// Pseudorapidity of the matched supercluster
    pub sc_eta: Float,

    /// Mini-isolation variable
    pub mini_iso: Float,

    /// Truth of "this electron passes the HEEP identification"
    pub passes_heep_id: bool,

    /// Electric charge in units of the positron charge
    pub charge: i32,
}

/// One reconstructed muon
#[derive(Clone, Copy, Debug)]
pub struct Muon {
    /// 4-momentum
    pub p4: Momentum,

    /// Truth of "this muon passes the high-pT identification"
    pub is_high_pt: bool,

    /// Truth of "this muon passes the custom tracker identification"
    pub is_custom_tracker: bool,

    /// Mini-isolation variable
    pub mini_iso: Float,
}

/// One reconstructed large-radius jet
#[derive(Clone, Copy, Debug)]
pub struct FatJet {
    /// 4-momentum
    pub p4: Momentum,

    /// Soft-drop groomed mass
    pub soft_drop_mass: Float,
}

/// Storage for one fully decoded collision event
#[derive(Clone, Debug)]
pub struct Event {
    /// Identifier of the recorded collision
    pub id: EventId,

    /// Number of reconstructed primary vertices
    pub num_vertices: i32,

    /// Generator-level particles
    pub gen_particles: Vec<GenParticle>,

    /// High-level trigger decisions
    pub triggers: Vec<TriggerDecision>,

    /// Reconstructed electrons
    pub electrons: Vec<Electron>,

    /// Reconstructed muons
    pub muons: Vec<Muon>,

    /// Reconstructed large-radius jets
    pub jets: Vec<FatJet>,
}
