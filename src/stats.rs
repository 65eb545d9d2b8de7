//! Latency sample aggregation and report rendering.
//!
//! Operations under test report elapsed times in microseconds as
//! `Option<u64>`; `None` means the timing was unavailable (the operation did
//! not complete) and is discarded rather than counted. Samples accumulate in
//! named [`Series`], one per operation category, possibly one set per run;
//! after all runs finish the per-run sets are merged and the whole thing is
//! sorted, summarized and printed as one comparative table with a sparkline
//! histogram per row.

use std::fmt::Write as _;
use std::str::FromStr;

/// Bins in every sparkline histogram.
pub const NUM_BINS: usize = 32;
/// Display levels a bin frequency is quantized to.
pub const NUM_LEVELS: usize = 8;

const BARS: [char; NUM_LEVELS] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Outcome of feeding one timing to a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Sampled,
    Discarded,
}

/// A named ordered collection of latency samples for one operation category.
#[derive(Debug, Clone)]
pub struct Series {
    name: String,
    samples: Vec<u64>,
}

impl Series {
    pub fn new(name: impl Into<String>) -> Self {
        Series {
            name: name.into(),
            samples: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Appends a timing unless it is unavailable, in which case it is
    /// dropped. Never treat [`Recorded::Discarded`] as an end-of-anything
    /// signal; scans terminate via [`crate::ScanCursor::valid`].
    pub fn record(&mut self, timing: Option<u64>) -> Recorded {
        match timing {
            Some(lat) => {
                self.samples.push(lat);
                Recorded::Sampled
            }
            None => Recorded::Discarded,
        }
    }

    /// Folds another same-named series into this one. Sample order does not
    /// affect any computed statistic, so plain concatenation suffices; every
    /// sample is kept exactly once.
    pub fn absorb(&mut self, other: Series) {
        debug_assert_eq!(self.name, other.name);
        self.samples.extend(other.samples);
    }

    pub fn samples(&self) -> &[u64] {
        &self.samples
    }
}

/// Insertion-ordered set of series, keyed by name.
///
/// The workload driver builds one of these per run and merges them with
/// [`SeriesSet::absorb`] once all runs have finished; render order follows
/// first insertion.
#[derive(Debug, Default)]
pub struct SeriesSet {
    series: Vec<Series>,
}

impl SeriesSet {
    pub fn new() -> Self {
        SeriesSet::default()
    }

    /// The series with this name, created empty on first use.
    pub fn series_mut(&mut self, name: &str) -> &mut Series {
        if let Some(idx) = self.series.iter().position(|s| s.name == name) {
            return &mut self.series[idx];
        }
        self.series.push(Series::new(name));
        self.series.last_mut().unwrap()
    }

    /// Merges another set into this one, series by name.
    pub fn absorb(&mut self, other: SeriesSet) {
        for s in other.series {
            self.series_mut(&s.name).samples.extend(s.samples);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        self.series.iter()
    }

    pub fn total_samples(&self) -> usize {
        self.series.iter().map(|s| s.len()).sum()
    }
}

/// Descriptive statistics of one finalized series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
    pub median: u64,
    pub p5: u64,
    pub p95: u64,
    pub p99: u64,
}

impl Summary {
    /// Computes the summary of an ascending-sorted sample slice, or `None`
    /// when it is empty (empty series never reach the report).
    pub fn of(sorted: &[u64]) -> Option<Summary> {
        if sorted.is_empty() {
            return None;
        }
        let n = sorted.len();
        let mean = sorted.iter().sum::<u64>() as f64 / n as f64;
        // Sample stddev (n - 1 denominator); undefined for a single sample,
        // reported as 0.0 rather than NaN.
        let stddev = if n > 1 {
            let ssq = sorted
                .iter()
                .map(|&s| {
                    let d = s as f64 - mean;
                    d * d
                })
                .sum::<f64>();
            (ssq / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        Some(Summary {
            count: n,
            mean,
            stddev,
            median: percentile(sorted, 0.50),
            p5: percentile(sorted, 0.05),
            p95: percentile(sorted, 0.95),
            p99: percentile(sorted, 0.99),
        })
    }
}

/// Sample at rank `floor(n * p)`, clamped into the slice.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    let n = sorted.len();
    assert!(n > 0, "percentile of an empty series");
    let rank = ((n as f64 * p) as usize).min(n - 1);
    sorted[rank]
}

/// Per-bin frequencies of `sorted` over the axis `[start, end]`.
///
/// Each boundary counts samples at or below it with a cursor that only moves
/// forward; a bin's frequency is the increment since the previous boundary.
/// Samples below the axis land in the first bin, samples above it in none.
pub fn bin_frequencies(sorted: &[u64], start: u64, end: u64) -> [usize; NUM_BINS] {
    let width = (end.saturating_sub(start)) as f64 / NUM_BINS as f64;
    let mut freqs = [0usize; NUM_BINS];
    let mut cursor = 0usize;
    for (i, freq) in freqs.iter_mut().enumerate() {
        let boundary = start as f64 + width * (i + 1) as f64;
        let mut reached = cursor;
        while reached < sorted.len() && sorted[reached] as f64 <= boundary {
            reached += 1;
        }
        *freq = reached - cursor;
        cursor = reached;
    }
    freqs
}

/// Renders one series' histogram as a row of graduated glyphs over the
/// shared axis. Bar heights are scaled to that series' own min/max bin
/// frequency; an all-equal distribution maps every bin to full height.
pub fn sparkline(sorted: &[u64], start: u64, end: u64) -> String {
    let freqs = bin_frequencies(sorted, start, end);
    let min = *freqs.iter().min().unwrap();
    let max = *freqs.iter().max().unwrap();
    freqs
        .iter()
        .map(|&f| {
            let level = (f - min + 1) * (NUM_LEVELS - 1) / (max - min + 1);
            BARS[level]
        })
        .collect()
}

/// Display unit for the report. Samples are recorded in microseconds; the
/// scale is applied uniformly to every printed numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Micros,
    Millis,
    Seconds,
}

impl Unit {
    pub fn scale(self) -> f64 {
        match self {
            Unit::Micros => 1.0,
            Unit::Millis => 1e-3,
            Unit::Seconds => 1e-6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Unit::Micros => "us",
            Unit::Millis => "ms",
            Unit::Seconds => "s",
        }
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "us" | "micros" => Ok(Unit::Micros),
            "ms" | "millis" => Ok(Unit::Millis),
            "s" | "secs" => Ok(Unit::Seconds),
            other => Err(format!("unknown unit {other:?} (expected us, ms or s)")),
        }
    }
}

/// Renders the comparative latency report.
///
/// One fixed-width row per non-empty series, in insertion order, followed by
/// the shared histogram axis. The axis spans the minimum 5th percentile to
/// the maximum 95th percentile across all rows so every sparkline is
/// comparable.
pub fn render_report(title: &str, unit: Unit, set: &SeriesSet) -> String {
    let mut rows = Vec::new();
    for series in set.iter() {
        let mut sorted = series.samples().to_vec();
        sorted.sort_unstable();
        if let Some(summary) = Summary::of(&sorted) {
            rows.push((series.name().to_string(), summary, sorted));
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "=== {} ({} samples) ===", title, set.total_samples());
    let _ = writeln!(
        out,
        "{:<12} {:>8} {:>10} {:>10} {:>10} {:>10}  {}",
        "stat", "n", "median", "p95", "p99", "stddev", "histogram"
    );
    if rows.is_empty() {
        return out;
    }

    let axis_start = rows.iter().map(|r| r.1.p5).min().unwrap();
    let axis_end = rows.iter().map(|r| r.1.p95).max().unwrap();
    let scale = unit.scale();

    for (name, summary, sorted) in &rows {
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>10.2} {:>10.2} {:>10.2} {:>10.2}  {}",
            name,
            summary.count,
            summary.median as f64 * scale,
            summary.p95 as f64 * scale,
            summary.p99 as f64 * scale,
            summary.stddev * scale,
            sparkline(sorted, axis_start, axis_end),
        );
    }
    let _ = writeln!(
        out,
        "{:>65}  {:.2} .. {:.2} ({})",
        "axis:",
        axis_start as f64 * scale,
        axis_end as f64 * scale,
        unit.label(),
    );
    out
}
