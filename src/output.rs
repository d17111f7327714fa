//! This module is in charge of outputting the final analysis results to the
//! standard output and various files

use crate::{
    config::Configuration,
    cutflow::{FinalResults, Stage},
    event::EventId,
    histogram::Hist1D,
    numeric::Float,
    selection::Selected,
    Result,
};
use eyre::WrapErr;
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    time::Duration,
};

/// Distribution histograms filled for every accepted event
pub struct AnalysisHistograms {
    /// Transverse momentum of quality electrons
    pub electron_pt: Hist1D,

    /// Transverse momentum of qualifying electron pairs
    pub pair_pt: Hist1D,

    /// Soft-drop mass of selected jets
    pub soft_drop_mass: Hist1D,

    /// Invariant mass of qualifying electron pairs
    pub pair_mass: Hist1D,
}
//
impl AnalysisHistograms {
    /// Create the empty histogram set, titled after the mass hypothesis
    pub fn new(mass_point: u32) -> Self {
        AnalysisHistograms {
            electron_pt: Hist1D::new(
                "h_ele_pT",
                &format!("ele pT for Zprime mass = {mass_point}"),
                300,
                0.,
                3000.,
            ),
            pair_pt: Hist1D::new(
                "h_lepton_pair_pT",
                &format!("lepton pairs' pT for Zprime mass = {mass_point}"),
                400,
                0.,
                4000.,
            ),
            soft_drop_mass: Hist1D::new(
                "h_SD",
                &format!("SD mass for Zprime mass = {mass_point}"),
                100,
                0.,
                200.,
            ),
            pair_mass: Hist1D::new(
                "h_Z_mass",
                &format!("Z mass for Zprime mass = {mass_point}"),
                250,
                0.,
                500.,
            ),
        }
    }

    /// Fill every distribution from one accepted event
    pub fn fill(&mut self, selected: &Selected) {
        for &pt in &selected.electron_pts {
            self.electron_pt.fill(pt);
        }
        for pair in &selected.pairs {
            self.pair_pt.fill(pair.pt);
            self.pair_mass.fill(pair.mass);
        }
        for jet in &selected.jets {
            self.soft_drop_mass.fill(jet.soft_drop_mass);
        }
    }
}

/// Log of accepted event identifiers, one "run lumi event" line each
pub struct EventLog<W: Write> {
    /// Destination of the log lines
    out: W,
}
//
impl EventLog<BufWriter<File>> {
    /// Create the log file at the given path
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .wrap_err_with(|| format!("failed to create the event log {}", path.display()))?;
        Ok(EventLog::new(BufWriter::new(file)))
    }
}
//
impl<W: Write> EventLog<W> {
    /// Wrap an already-open writer
    pub fn new(out: W) -> Self {
        EventLog { out }
    }

    /// Append one accepted event
    pub fn append(&mut self, id: &EventId) -> Result<()> {
        writeln!(self.out, "{id}")?;
        Ok(())
    }

    /// Flush the log before dropping it
    pub fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Shape artifact written at the end of a run
#[derive(Serialize)]
struct ShapeArtifact<'run> {
    /// Moment the run ended, in RFC 3339 form
    timestamp: String,

    /// Wall-clock duration of the event loop (seconds)
    elapsed_seconds: Float,

    /// Configuration the run was taken with
    config: &'run Configuration,

    /// Cut-flow counters and derived rates
    summary: &'run FinalResults,

    /// Cut-flow and distribution histograms
    histograms: [&'run Hist1D; 5],
}

/// Output the analysis results to the console and to disk
pub fn dump_results(
    cfg: &Configuration,
    results: &FinalResults,
    hists: &AnalysisHistograms,
    elapsed_time: Duration,
) -> Result<()> {
    // Print out the counters and rates on stdout
    print_summary(results);

    // Counter-valued cut-flow histogram, rebuilt from the final counters
    let cut_flow = cutflow_histogram(cfg, results);

    // Compute a timestamp of when the run ended
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .wrap_err("failed to format the run timestamp")?;

    // Write the shape artifact
    let artifact = ShapeArtifact {
        timestamp,
        elapsed_seconds: elapsed_time.as_secs_f64(),
        config: cfg,
        summary: results,
        histograms: [
            &cut_flow,
            &hists.electron_pt,
            &hists.pair_pt,
            &hists.soft_drop_mass,
            &hists.pair_mass,
        ],
    };
    std::fs::create_dir_all(&cfg.output_dir).wrap_err_with(|| {
        format!(
            "failed to create the output directory {}",
            cfg.output_dir.display()
        )
    })?;
    let path = cfg
        .output_dir
        .join(format!("Zprime_shape_M-{}.json", cfg.mass_point));
    let file = File::create(&path)
        .wrap_err_with(|| format!("failed to create the shape artifact {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &artifact)
        .wrap_err("failed to serialize the shape artifact")?;
    println!();
    println!("shape artifact : {}", path.display());

    // ...and we're done
    Ok(())
}

/// Print the counters and derived rates to the standard output
fn print_summary(results: &FinalResults) {
    println!();
    println!("nTotal    = {}", results.n_total);
    for (slot, &n_pass) in results.n_pass.iter().enumerate() {
        if n_pass > 0 {
            println!("nPass[{slot}]= {n_pass}");
        }
    }

    println!();
    println!("{:<16}{:>10}", "Began", results.n_total);
    for stage in Stage::ALL {
        println!("{:<16}{:>10}", stage.label(), results.passed(stage));
    }

    println!();
    println!("nJetsSelected : {}", results.n_jets_selected);
    println!("nJetsFilled   : {}", results.n_jets_filled);
    println!("nMatchZeroB   : {}", results.b_match.neither);
    println!("nMatchOneB    : {}", results.b_match.one);
    println!("nMatchTwoB    : {}", results.b_match.both);
    println!("match_at_least_1_rate : {}", results.match_at_least_one_rate);
    println!("match_2_rate          : {}", results.match_both_rate);

    println!();
    println!(
        "efficiency = {:.6} +/- {:.6}",
        results.efficiency, results.efficiency_err
    );
}

/// Build the labeled cut-flow histogram from the final counters
fn cutflow_histogram(cfg: &Configuration, results: &FinalResults) -> Hist1D {
    let title = format!(
        "Cut Flow for Zprime mass = {}, eff={:.6} +/- {:.6}",
        cfg.mass_point, results.efficiency, results.efficiency_err
    );
    let num_bins = Stage::ALL.len() + 1;
    let mut hist = Hist1D::new("h_CutFlow", &title, num_bins, 0., num_bins as Float);
    hist.set_bin_content(0, results.n_total as Float);
    hist.set_bin_label(0, "Began");
    for (bin, stage) in Stage::ALL.into_iter().enumerate() {
        hist.set_bin_content(bin + 1, results.passed(stage) as Float);
        hist.set_bin_label(bin + 1, stage.label());
    }
    hist
}
