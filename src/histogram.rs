//! Uniformly binned 1-D histograms
//!
//! These mirror the layout that plotting tools expect from a ROOT export:
//! named bins between x_min and x_max, with under/overflow kept separately.

use crate::numeric::Float;
use serde::Serialize;

/// A 1-D histogram with uniform binning
#[derive(Clone, Debug, Serialize)]
pub struct Hist1D {
    /// Histogram name
    pub name: String,

    /// Histogram title
    pub title: String,

    /// Number of bins between x_min and x_max
    pub n_bins: usize,

    /// Lower edge of the first bin
    pub x_min: Float,

    /// Upper edge of the last bin
    pub x_max: Float,

    /// Per-bin content, of length n_bins
    pub bin_content: Vec<Float>,

    /// Content below the first bin
    pub underflow: Float,

    /// Content at or above the upper edge
    pub overflow: Float,

    /// Total number of fill calls
    pub entries: u64,

    /// Per-bin labels, for counter-valued axes such as the cut flow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}
//
impl Hist1D {
    /// Create an empty histogram
    pub fn new(name: &str, title: &str, n_bins: usize, x_min: Float, x_max: Float) -> Self {
        Hist1D {
            name: name.to_owned(),
            title: title.to_owned(),
            n_bins,
            x_min,
            x_max,
            bin_content: vec![0.; n_bins],
            underflow: 0.,
            overflow: 0.,
            entries: 0,
            labels: None,
        }
    }

    /// Add one entry
    pub fn fill(&mut self, x: Float) {
        self.entries += 1;
        if x < self.x_min {
            self.underflow += 1.;
        } else if x >= self.x_max {
            self.overflow += 1.;
        } else {
            let bin_width = (self.x_max - self.x_min) / self.n_bins as Float;
            // Round-off can push values sitting just below x_max one bin out
            let bin = (((x - self.x_min) / bin_width) as usize).min(self.n_bins - 1);
            self.bin_content[bin] += 1.;
        }
    }

    /// Set one bin directly, for counter-valued histograms
    pub fn set_bin_content(&mut self, bin: usize, value: Float) {
        self.bin_content[bin] = value;
    }

    /// Attach a label to one bin
    pub fn set_bin_label(&mut self, bin: usize, label: &str) {
        let labels = self
            .labels
            .get_or_insert_with(|| vec![String::new(); self.n_bins]);
        labels[bin] = label.to_owned();
    }
}
