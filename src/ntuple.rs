//! Flat-ntuple input layer
//!
//! Events come in as one JSON object per line, with branch-parallel arrays
//! named after the ntuple branches of the upstream event export. This module
//! decodes the raw records and assembles them into structured events.

use crate::{
    event::{Electron, Event, EventId, FatJet, GenParticle, Muon, TriggerDecision},
    momentum::Momentum,
    numeric::Float,
    Result,
};
use eyre::{ensure, WrapErr};
use particle_id::ParticleID;
use serde::Deserialize;

use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::Path,
};

/// One event record in raw branch-parallel form
///
/// Field names mirror the branch names of the upstream ntuple, so a record is
/// exactly one exported tree entry.
#[derive(Clone, Debug, Deserialize)]
pub struct EventRecord {
    /// Run number
    #[serde(rename = "runId")]
    pub run: i32,

    /// Luminosity section within the run
    #[serde(rename = "lumiSection")]
    pub lumi: i32,

    /// Event number within the luminosity section
    #[serde(rename = "eventId")]
    pub event: i64,

    /// Number of reconstructed primary vertices
    #[serde(rename = "nVtx")]
    pub num_vertices: i32,

    /// PDG identity code of each generator-level particle
    #[serde(rename = "genParId")]
    pub gen_id: Vec<i32>,

    /// Generator status code of each generator-level particle
    #[serde(rename = "genParSt")]
    pub gen_status: Vec<i32>,

    /// PDG identity code of each particle's mother
    #[serde(rename = "genMomParId")]
    pub gen_mother_id: Vec<i32>,

    /// Position of each particle's first daughter, negative when absent
    #[serde(rename = "genDa1")]
    pub gen_da1: Vec<i32>,

    /// Position of each particle's second daughter, negative when absent
    #[serde(rename = "genDa2")]
    pub gen_da2: Vec<i32>,

    /// 4-momentum of each generator-level particle, as [px, py, pz, E]
    #[serde(rename = "genParP4")]
    pub gen_p4: Vec<[Float; 4]>,

    /// Versioned name of each high-level trigger path
    #[serde(rename = "hlt_trigName")]
    pub trigger_names: Vec<String>,

    /// Decision of each high-level trigger path
    #[serde(rename = "hlt_trigResult")]
    pub trigger_results: Vec<bool>,

    /// 4-momentum of each reconstructed electron, as [px, py, pz, E]
    #[serde(rename = "eleP4")]
    pub ele_p4: Vec<[Float; 4]>,

    /// Supercluster pseudorapidity of each electron
    #[serde(rename = "eleScEta")]
    pub ele_sc_eta: Vec<Float>,

    /// Mini-isolation variable of each electron
    #[serde(rename = "eleMiniIso")]
    pub ele_mini_iso: Vec<Float>,

    /// Electric charge of each electron
    #[serde(rename = "eleCharge")]
    pub ele_charge: Vec<i32>,

    /// HEEP identification decision for each electron
    #[serde(rename = "eleIsPassHEEPNoIso")]
    pub ele_passes_heep: Vec<bool>,

    /// 4-momentum of each reconstructed muon, as [px, py, pz, E]
    #[serde(rename = "muP4")]
    pub mu_p4: Vec<[Float; 4]>,

    /// High-pT identification decision for each muon
    #[serde(rename = "isHighPtMuon")]
    pub mu_is_high_pt: Vec<bool>,

    /// Custom tracker identification decision for each muon
    #[serde(rename = "isCustomTrackerMuon")]
    pub mu_is_custom_tracker: Vec<bool>,

    /// Mini-isolation variable of each muon
    #[serde(rename = "muMiniIso")]
    pub mu_mini_iso: Vec<Float>,

    /// 4-momentum of each large-radius jet, as [px, py, pz, E]
    #[serde(rename = "FATjetP4")]
    pub jet_p4: Vec<[Float; 4]>,

    /// Soft-drop groomed mass of each large-radius jet
    #[serde(rename = "FATjetSDmass")]
    pub jet_sd_mass: Vec<Float>,
}
//
impl EventRecord {
    /// Check the parallel-array invariants, then assemble the structured event
    pub fn build(self) -> Result<Event> {
        let num_gen = self.gen_id.len();
        ensure!(
            [
                self.gen_status.len(),
                self.gen_mother_id.len(),
                self.gen_da1.len(),
                self.gen_da2.len(),
                self.gen_p4.len(),
            ]
            .iter()
            .all(|&len| len == num_gen),
            "generator branches disagree on the particle count"
        );
        ensure!(
            self.trigger_results.len() == self.trigger_names.len(),
            "trigger branches disagree on the path count"
        );
        let num_ele = self.ele_p4.len();
        ensure!(
            [
                self.ele_sc_eta.len(),
                self.ele_mini_iso.len(),
                self.ele_charge.len(),
                self.ele_passes_heep.len(),
            ]
            .iter()
            .all(|&len| len == num_ele),
            "electron branches disagree on the electron count"
        );
        let num_mu = self.mu_p4.len();
        ensure!(
            [
                self.mu_is_high_pt.len(),
                self.mu_is_custom_tracker.len(),
                self.mu_mini_iso.len(),
            ]
            .iter()
            .all(|&len| len == num_mu),
            "muon branches disagree on the muon count"
        );
        ensure!(
            self.jet_sd_mass.len() == self.jet_p4.len(),
            "jet branches disagree on the jet count"
        );

        let gen_particles = (0..num_gen)
            .map(|ig| GenParticle {
                id: ParticleID::new(self.gen_id[ig]),
                status: self.gen_status[ig],
                mother_id: ParticleID::new(self.gen_mother_id[ig]),
                daughters: [self.gen_da1[ig], self.gen_da2[ig]],
                p4: Momentum::from(self.gen_p4[ig]),
            })
            .collect();
        let triggers = self
            .trigger_names
            .into_iter()
            .zip(self.trigger_results)
            .map(|(name, fired)| TriggerDecision { name, fired })
            .collect();
        let electrons = (0..num_ele)
            .map(|ie| Electron {
                p4: Momentum::from(self.ele_p4[ie]),
                sc_eta: self.ele_sc_eta[ie],
                mini_iso: self.ele_mini_iso[ie],
                passes_heep_id: self.ele_passes_heep[ie],
                charge: self.ele_charge[ie],
            })
            .collect();
        let muons = (0..num_mu)
            .map(|im| Muon {
                p4: Momentum::from(self.mu_p4[im]),
                is_high_pt: self.mu_is_high_pt[im],
                is_custom_tracker: self.mu_is_custom_tracker[im],
                mini_iso: self.mu_mini_iso[im],
            })
            .collect();
        let jets = self
            .jet_p4
            .into_iter()
            .zip(self.jet_sd_mass)
            .map(|(p4, soft_drop_mass)| FatJet {
                p4: Momentum::from(p4),
                soft_drop_mass,
            })
            .collect();

        Ok(Event {
            id: EventId {
                run: self.run,
                lumi: self.lumi,
                event: self.event,
            },
            num_vertices: self.num_vertices,
            gen_particles,
            triggers,
            electrons,
            muons,
            jets,
        })
    }
}

/// Streaming event source yielding one raw record per non-blank input line
pub struct JsonLinesSource<R> {
    /// Line iterator over the underlying reader
    lines: Lines<R>,

    /// 1-based number of the last line read, for error reporting
    line_number: usize,
}
//
impl JsonLinesSource<BufReader<File>> {
    /// Open an event file
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open the event file {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}
//
impl<R: BufRead> JsonLinesSource<R> {
    /// Wrap an already-open reader
    pub fn new(reader: R) -> Self {
        JsonLinesSource {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}
//
impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line_number += 1;
            match self.lines.next()? {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record = serde_json::from_str(&line).wrap_err_with(|| {
                        format!("malformed event record on line {}", self.line_number)
                    });
                    return Some(record);
                }
                Err(err) => return Some(Err(err).wrap_err("failed to read the event file")),
            }
        }
    }
}
