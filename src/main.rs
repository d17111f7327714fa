//! Z' -> Zh -> llbb event selection, electron channel
//!
//!
//! # Introduction (for the physicist)
//!
//! This program runs the electron-channel event selection of a search for a
//! heavy Z' boson decaying to a Z boson and a Higgs boson, with Z -> e+e-
//! and h -> bb. The focus is on the rate at which the selected large-radius
//! jet matches the truth-level b-quarks from the Higgs decay, next to the
//! usual cut-flow and selection efficiency figures.
//!
//! Events are read from a flat ntuple export of simulated collisions. Each
//! event passes through a fixed sequence of gates: generator-level truth
//! matching, trigger, vertex, electron pairing, fat jet selection with
//! lepton cleaning, and a cut on the reconstructed Z' mass. Nine kinematic
//! working points, selected by a region flag, vary the electron pT, pair pT
//! and soft-drop mass requirements.
//!
//!
//! # Introduction (for the computer guy)
//!
//! The program is a single sequential pipeline:
//!
//! * parse the command line and resolve the kinematic working point,
//! * loop over events,
//!     * decode the branch-parallel record into per-object structs,
//!     * run the selection gates in order, stopping at the first failure,
//!     * fold the verdict into the cut-flow accumulator, and for accepted
//!       events fill histograms and append to the event log,
//! * then finalize the counters and write the summary and shape artifact.

#![warn(missing_docs)]

mod config;
mod cutflow;
mod event;
mod histogram;
mod momentum;
mod ntuple;
mod numeric;
mod output;
mod selection;

use clap::Parser;
use eyre::WrapErr;
use tracing::info;

use crate::{
    config::{Args, Configuration},
    cutflow::{CutflowCounters, Stage},
    ntuple::JsonLinesSource,
    output::{AnalysisHistograms, EventLog},
    selection::{EventSelection, Verdict},
};

use std::time::Instant;

/// We'll use eyre's type-erased result type throughout the application
type Result<T> = eyre::Result<T>;

/// Number of events between two progress reports
const PROGRESS_INTERVAL: usize = 50_000;

/// This will act as our main function, with suitable error handling
fn main() -> Result<()> {
    // ### CONFIGURATION READOUT ###

    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .init();
    let cfg = Configuration::new(args).wrap_err("failed to resolve the configuration")?;

    // ### ANALYSIS INITIALIZATION ###

    // NOTE: The clock starts after configuration I/O, to avoid IO-induced
    //       timing fluctuations
    let saved_time = Instant::now();

    let selection = EventSelection::new(cfg.working_point);
    let mut counters = CutflowCounters::new();
    let mut histograms = AnalysisHistograms::new(cfg.mass_point);
    let mut event_log = EventLog::create(&cfg.event_log)?;

    // ### EVENT LOOP ###

    let events = JsonLinesSource::open(&cfg.input)?;
    for (index, record) in events.enumerate() {
        if index % PROGRESS_INTERVAL == 0 {
            info!(event = index + 1, "processing");
        }

        let event = record?
            .build()
            .wrap_err_with(|| format!("failed to decode event record {index}"))?;

        let verdict = selection.select(&event);
        counters.record(&verdict);
        if let Verdict::Accepted(selected) = &verdict {
            histograms.fill(selected);
            event_log.append(&event.id)?;
        }
    }

    // ### RESULTS DISPLAY AND STORAGE ###

    // Measure how much time has elapsed
    let elapsed_time = saved_time.elapsed();

    let results = counters.finalize();
    info!(
        accepted = results.passed(Stage::ResonanceMass),
        total = results.n_total,
        "selection complete"
    );

    // Send the results to the standard output and to disk
    event_log.finish()?;
    output::dump_results(&cfg, &results, &histograms, elapsed_time)
        .wrap_err("failed to output the results")?;

    // ...and we're done
    Ok(())
}
