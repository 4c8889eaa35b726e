//! Posterior summaries of sampled abundances.
use serde::{Deserialize, Serialize};

/// Draws of every transcript, one column per transcript.
#[derive(Debug, Clone, Default)]
pub struct PosteriorSummary {
    /// `samples[i]` holds the draws of transcript i.
    samples: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

impl PosteriorSummary {
    pub fn new(num_transcripts: usize) -> Self {
        Self {
            samples: vec![vec![]; num_transcripts],
        }
    }
    pub fn push(&mut self, draw: &[f64]) {
        assert_eq!(draw.len(), self.samples.len());
        for (samples, &x) in self.samples.iter_mut().zip(draw.iter()) {
            samples.push(x);
        }
    }
    /// Number of draws.
    pub fn len(&self) -> usize {
        self.samples.first().map_or(0, |xs| xs.len())
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn draws(&self, i: usize) -> &[f64] {
        &self.samples[i]
    }
    pub fn mean(&self, i: usize) -> f64 {
        let xs = &self.samples[i];
        match xs.is_empty() {
            true => 0f64,
            false => xs.iter().sum::<f64>() / xs.len() as f64,
        }
    }
    /// Linearly interpolated quantile of transcript i, `q` in [0, 1].
    pub fn quantile(&self, i: usize, q: f64) -> f64 {
        let mut xs = self.samples[i].clone();
        xs.sort_by(|a, b| a.total_cmp(b));
        quantile_of_sorted(&xs, q)
    }
    /// Mean and central interval of mass `level` for every transcript.
    pub fn summarize(&self, level: f64) -> Vec<Estimate> {
        let lo = (1f64 - level) / 2f64;
        let hi = 1f64 - lo;
        self.samples
            .iter()
            .enumerate()
            .map(|(i, xs)| {
                let mut sorted = xs.clone();
                sorted.sort_by(|a, b| a.total_cmp(b));
                Estimate {
                    mean: self.mean(i),
                    lower: quantile_of_sorted(&sorted, lo),
                    upper: quantile_of_sorted(&sorted, hi),
                }
            })
            .collect()
    }
}

fn quantile_of_sorted(xs: &[f64], q: f64) -> f64 {
    if xs.is_empty() {
        return 0f64;
    }
    let pos = q.clamp(0f64, 1f64) * (xs.len() - 1) as f64;
    let (floor, ceil) = (pos.floor() as usize, pos.ceil() as usize);
    let frac = pos - floor as f64;
    xs[floor] * (1f64 - frac) + xs[ceil] * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn quantiles() {
        let mut summary = PosteriorSummary::new(2);
        for k in 0..5 {
            summary.push(&[k as f64, 1f64]);
        }
        assert_eq!(summary.len(), 5);
        assert_eq!(summary.mean(0), 2f64);
        assert_eq!(summary.quantile(0, 0.5), 2f64);
        assert_eq!(summary.quantile(0, 0.125), 0.5);
        assert_eq!(summary.quantile(0, 1f64), 4f64);
        let est = summary.summarize(0.5);
        assert_eq!(est[0].lower, 1f64);
        assert_eq!(est[0].upper, 3f64);
        assert_eq!(est[1].mean, 1f64);
    }
    #[test]
    fn empty_summary() {
        let summary = PosteriorSummary::new(3);
        assert!(summary.is_empty());
        let est = summary.summarize(0.95);
        assert_eq!(est.len(), 3);
        assert_eq!(est[0].mean, 0f64);
    }
}
