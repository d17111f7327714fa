//! Mechanism for resolving and sharing the analysis configuration

use crate::{numeric::Float, Result};
use clap::Parser;
use eyre::eyre;
use serde::Serialize;

use std::path::PathBuf;

/// Number of kinematic working points selectable through the region flag
pub const NUM_REGIONS: usize = 9;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(about = "Z' -> Zh -> llbb event selection, electron channel", version)]
pub struct Args {
    /// Event file to process (JSON lines, one record per event)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Region flag selecting the kinematic working point (1 to 9)
    #[arg(short, long)]
    pub region: u32,

    /// Z' mass hypothesis in GeV, used in titles and file names
    #[arg(short, long)]
    pub mass_point: u32,

    /// Directory receiving the JSON shape artifact
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// File receiving the identifiers of accepted events
    #[arg(long, default_value = "selected_events.txt")]
    pub event_log: PathBuf,

    /// Log verbosity (trace, debug, info, warn or error)
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,
}

/// One kinematic working point of the selection
#[derive(Debug, Serialize)]
pub struct WorkingPoint {
    /// Short name summarizing the cuts, for reports
    pub name: &'static str,

    /// Minimum transverse momentum of a quality electron (GeV)
    pub electron_pt_min: Float,

    /// Minimum transverse momentum of an electron pair (GeV), when enforced
    pub pair_pt_min: Option<Float>,

    /// Soft-drop mass acceptance window [low, high) of the jet selection (GeV)
    pub soft_drop_window: (Float, Float),
}
//
impl WorkingPoint {
    /// Look up the working point selected by a region flag
    pub fn for_region(region: u32) -> Result<&'static Self> {
        region
            .checked_sub(1)
            .and_then(|idx| WORKING_POINTS.get(idx as usize))
            .ok_or_else(|| eyre!("unknown region flag {region}, expected a value from 1 to 9"))
    }
}

/// Kinematic working points, indexed by region flag minus one
static WORKING_POINTS: [WorkingPoint; NUM_REGIONS] = [
    WorkingPoint {
        name: "threeCutsOff",
        electron_pt_min: 0.,
        pair_pt_min: Some(0.),
        soft_drop_window: (0., 9999.),
    },
    WorkingPoint {
        name: "sd40to140_elePt85_llPt200",
        electron_pt_min: 85.,
        pair_pt_min: Some(200.),
        soft_drop_window: (40., 140.),
    },
    WorkingPoint {
        name: "sd50to140_elePt85_llPt200",
        electron_pt_min: 85.,
        pair_pt_min: Some(200.),
        soft_drop_window: (50., 140.),
    },
    WorkingPoint {
        name: "sd60to140_elePt100_llPt200",
        electron_pt_min: 100.,
        pair_pt_min: Some(200.),
        soft_drop_window: (60., 140.),
    },
    WorkingPoint {
        name: "sd60to140_elePt115_llPt200",
        electron_pt_min: 115.,
        pair_pt_min: Some(200.),
        soft_drop_window: (60., 140.),
    },
    WorkingPoint {
        name: "sd60to140_elePt85_llPt200",
        electron_pt_min: 85.,
        pair_pt_min: Some(200.),
        soft_drop_window: (60., 140.),
    },
    WorkingPoint {
        name: "sd93to143_elePt115",
        electron_pt_min: 115.,
        pair_pt_min: None,
        soft_drop_window: (93., 143.),
    },
    WorkingPoint {
        name: "sd95to145_elePt115",
        electron_pt_min: 115.,
        pair_pt_min: None,
        soft_drop_window: (95., 145.),
    },
    WorkingPoint {
        name: "sd91to141_elePt115",
        electron_pt_min: 115.,
        pair_pt_min: None,
        soft_drop_window: (91., 141.),
    },
];

/// Analysis configuration
#[derive(Debug, Serialize)]
pub struct Configuration {
    /// Event file to process
    pub input: PathBuf,

    /// Region flag that selected the working point
    pub region: u32,

    /// Kinematic working point applied by the selection
    pub working_point: &'static WorkingPoint,

    /// Z' mass hypothesis (GeV)
    pub mass_point: u32,

    /// Directory receiving the JSON shape artifact
    pub output_dir: PathBuf,

    /// File receiving the identifiers of accepted events
    pub event_log: PathBuf,
}
//
impl Configuration {
    /// Resolve the command-line arguments, check them, and print them out
    pub fn new(args: Args) -> Result<Self> {
        let working_point = WorkingPoint::for_region(args.region)?;
        let config = Configuration {
            input: args.input,
            region: args.region,
            working_point,
            mass_point: args.mass_point,
            output_dir: args.output_dir,
            event_log: args.event_log,
        };
        config.print();
        Ok(config)
    }

    /// Display the configuration as an aligned key-value block
    pub fn print(&self) {
        println!("input          : {}", self.input.display());
        println!("region         : {} ({})", self.region, self.working_point.name);
        println!("mass point     : {}", self.mass_point);
        println!("ele pT min     : {}", self.working_point.electron_pt_min);
        match self.working_point.pair_pt_min {
            Some(pair_pt_min) => println!("pair pT min    : {pair_pt_min}"),
            None => println!("pair pT min    : none"),
        }
        let (sd_low, sd_high) = self.working_point.soft_drop_window;
        println!("SD mass window : [{sd_low}, {sd_high})");
        println!("event log      : {}", self.event_log.display());
        println!("output dir     : {}", self.output_dir.display());
    }
}
