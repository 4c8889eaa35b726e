//! Fragment length and sequence bias models.
//!
//! Parameters are given, not estimated: a Gaussian or an empirical length
//! distribution, and an optional positional bias table.
use crate::error::{QuantError, Result};
use crate::weight_builder::MIN_FRAG_LEN_PR;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-position sequence bias of read starts.
pub trait SeqBias: Send + Sync {
    /// Bases needed upstream of a read start.
    fn left_flank(&self) -> usize;
    /// Bases needed downstream of a read start.
    fn right_flank(&self) -> usize;
    /// Bias of a mate1 read starting at `seq[pos]`. `pos` is at least `left_flank`
    /// and at most `seq.len() - right_flank - 1`.
    fn mate1_bias(&self, seq: &[u8], pos: usize) -> f32;
    fn mate2_bias(&self, seq: &[u8], pos: usize) -> f32;
}

pub trait FragmentModel: Send + Sync {
    /// Probability of a fragment of length `len`.
    fn frag_len_pr(&self, len: u64) -> f32;
    fn frag_len_median(&self) -> f32;
    /// Probability that mate1 aligns to the transcript's own strand.
    fn strand_specificity(&self) -> f32;
    fn seq_bias(&self) -> Option<&dyn SeqBias> {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianFragmentModel {
    pub mean: f64,
    pub sd: f64,
    pub strand_specificity: f32,
    #[serde(default)]
    pub bias: Option<PositionalBias>,
}

impl Default for GaussianFragmentModel {
    fn default() -> Self {
        Self {
            mean: 200f64,
            sd: 20f64,
            strand_specificity: 0.5,
            bias: None,
        }
    }
}

impl GaussianFragmentModel {
    pub fn new(mean: f64, sd: f64, strand_specificity: f32) -> Result<Self> {
        if !(mean > 0f64 && sd > 0f64 && mean.is_finite() && sd.is_finite()) {
            let msg = format!("fragment length mean {} and sd {} must be positive", mean, sd);
            return Err(QuantError::Config(msg));
        }
        check_strand_specificity(strand_specificity)?;
        Ok(Self {
            mean,
            sd,
            strand_specificity,
            bias: None,
        })
    }
    pub fn with_bias(mut self, bias: PositionalBias) -> Self {
        self.bias = Some(bias);
        self
    }
}

impl FragmentModel for GaussianFragmentModel {
    fn frag_len_pr(&self, len: u64) -> f32 {
        let z = (len as f64 - self.mean) / self.sd;
        let norm = self.sd * (2f64 * std::f64::consts::PI).sqrt();
        ((-z * z / 2f64).exp() / norm) as f32
    }
    fn frag_len_median(&self) -> f32 {
        self.mean as f32
    }
    fn strand_specificity(&self) -> f32 {
        self.strand_specificity
    }
    fn seq_bias(&self) -> Option<&dyn SeqBias> {
        self.bias.as_ref().map(|b| b as &dyn SeqBias)
    }
}

/// Fragment length distribution given as a histogram of observed lengths.
#[derive(Debug, Clone)]
pub struct EmpiricalFragmentModel {
    /// `pr[len]`, zero beyond the end.
    pr: Vec<f32>,
    median: f32,
    strand_specificity: f32,
    bias: Option<PositionalBias>,
}

impl EmpiricalFragmentModel {
    /// Build from `(length, count)` pairs. Lengths whose frequency is below
    /// the minimum fragment length probability are dropped.
    pub fn from_counts(counts: &[(u64, u64)], strand_specificity: f32) -> Result<Self> {
        check_strand_specificity(strand_specificity)?;
        let total: u64 = counts.iter().map(|&(_, c)| c).sum();
        if total == 0 {
            return Err(QuantError::Config("empty fragment length histogram".to_string()));
        }
        let max_len = counts.iter().map(|&(len, _)| len).max().unwrap_or(0) as usize;
        let mut pr = vec![0f32; max_len + 1];
        for &(len, count) in counts {
            pr[len as usize] += (count as f64 / total as f64) as f32;
        }
        pr.iter_mut()
            .filter(|p| **p < MIN_FRAG_LEN_PR)
            .for_each(|p| *p = 0f32);
        let kept: f32 = pr.iter().sum();
        if kept <= 0f32 {
            return Err(QuantError::Config("every fragment length was pruned".to_string()));
        }
        pr.iter_mut().for_each(|p| *p /= kept);
        let mut acc = 0f32;
        let median = pr
            .iter()
            .position(|&p| {
                acc += p;
                0.5 <= acc
            })
            .unwrap_or(max_len) as f32;
        debug!("FRAGLEN\t{}\t{}", total, median);
        Ok(Self {
            pr,
            median,
            strand_specificity,
            bias: None,
        })
    }
    pub fn with_bias(mut self, bias: PositionalBias) -> Self {
        self.bias = Some(bias);
        self
    }
}

impl FragmentModel for EmpiricalFragmentModel {
    fn frag_len_pr(&self, len: u64) -> f32 {
        self.pr.get(len as usize).copied().unwrap_or(0f32)
    }
    fn frag_len_median(&self) -> f32 {
        self.median
    }
    fn strand_specificity(&self) -> f32 {
        self.strand_specificity
    }
    fn seq_bias(&self) -> Option<&dyn SeqBias> {
        self.bias.as_ref().map(|b| b as &dyn SeqBias)
    }
}

fn check_strand_specificity(ss: f32) -> Result<()> {
    match (0f32..=1f32).contains(&ss) {
        true => Ok(()),
        false => Err(QuantError::Config(format!(
            "strand specificity {} is not in [0,1]",
            ss
        ))),
    }
}

/// Position weight tables around read starts. Each table has `left + right + 1`
/// rows of natural-log weights for A, C, G and T; the bias of a start is the
/// exponential of the summed weights over its window. Other bases weigh zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionalBias {
    pub left: usize,
    pub right: usize,
    pub mate1: Vec<[f32; 4]>,
    pub mate2: Vec<[f32; 4]>,
}

impl PositionalBias {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| QuantError::io(e, path))?;
        let bias: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        bias.validate()?;
        debug!("BIAS\t{}\t{}", bias.left, bias.right);
        Ok(bias)
    }
    pub fn validate(&self) -> Result<()> {
        let width = self.left + self.right + 1;
        if self.mate1.len() != width || self.mate2.len() != width {
            return Err(QuantError::Config(format!(
                "bias tables must have {} rows, found {} and {}",
                width,
                self.mate1.len(),
                self.mate2.len()
            )));
        }
        let all_finite = self.mate1.iter().chain(self.mate2.iter()).flatten().all(|x| x.is_finite());
        match all_finite {
            true => Ok(()),
            false => Err(QuantError::Config("bias weights must be finite".to_string())),
        }
    }
    fn score(&self, table: &[[f32; 4]], seq: &[u8], pos: usize) -> f32 {
        if pos < self.left || seq.len() <= pos + self.right {
            return 1f32;
        }
        let window = &seq[pos - self.left..=pos + self.right];
        let logw: f32 = window
            .iter()
            .zip(table.iter())
            .map(|(base, row)| match base {
                b'A' | b'a' => row[0],
                b'C' | b'c' => row[1],
                b'G' | b'g' => row[2],
                b'T' | b't' => row[3],
                _ => 0f32,
            })
            .sum();
        logw.exp()
    }
}

impl SeqBias for PositionalBias {
    fn left_flank(&self) -> usize {
        self.left
    }
    fn right_flank(&self) -> usize {
        self.right
    }
    fn mate1_bias(&self, seq: &[u8], pos: usize) -> f32 {
        self.score(&self.mate1, seq, pos)
    }
    fn mate2_bias(&self, seq: &[u8], pos: usize) -> f32 {
        self.score(&self.mate2, seq, pos)
    }
}
