//! Per-round resolution of reads with several candidate alignments.
use crate::components::Components;
use crate::sampler::task_rng;
use crate::worker_pool::WorkerPool;
use rand::Rng;

/// Stream tag separating multiread blocks from component tasks.
const MULTIREAD_STREAM: u64 = 1 << 40;

/// Candidate fragment columns of every multiread.
#[derive(Debug, Clone, Default)]
pub struct Multireads {
    /// Candidates of read r are `columns[offsets[r]..offsets[r+1]]`.
    offsets: Vec<usize>,
    columns: Vec<u32>,
}

impl Multireads {
    /// Group `(multiread number, column)` pairs by multiread.
    pub fn new(mut pairs: Vec<(u32, u32)>) -> Self {
        pairs.sort_unstable();
        let mut offsets = vec![0];
        let mut columns = Vec::with_capacity(pairs.len());
        for (k, &(num, col)) in pairs.iter().enumerate() {
            if 0 < k && pairs[k - 1].0 != num {
                offsets.push(columns.len());
            }
            columns.push(col);
        }
        if !columns.is_empty() {
            offsets.push(columns.len());
        }
        Self { offsets, columns }
    }
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn candidates(&self, r: usize) -> &[u32] {
        &self.columns[self.offsets[r]..self.offsets[r + 1]]
    }
    pub fn columns(&self) -> &[u32] {
        &self.columns
    }
    /// Pick one candidate per multiread with probability proportional to the
    /// candidate's fragment probability scaled by its component mass, then set
    /// the count of the chosen column to one and of its siblings to zero.
    /// Candidates may lie in different components, whose fragment probabilities
    /// are relative to their own component, so the component mass puts them on
    /// one scale.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        &self,
        pool: &WorkerPool,
        (seed, round): (u64, u64),
        block: usize,
        frag_probs: &[f64],
        cmix: &[f64],
        components: &Components,
        frag_counts: &mut [f64],
    ) {
        if self.is_empty() {
            return;
        }
        let mut choices = vec![0u32; self.len()];
        pool.run_queue(
            None,
            |sender| {
                for (b, chunk) in choices.chunks_mut(block).enumerate() {
                    // Fails only if every worker has panicked.
                    let _ = sender.send((b, chunk));
                }
            },
            |_| Vec::<f64>::new(),
            |probs: &mut Vec<f64>, (b, chunk)| {
                let mut rng = task_rng(seed, round, MULTIREAD_STREAM | b as u64);
                let chunk: &mut [u32] = chunk;
                for (k, choice) in chunk.iter_mut().enumerate() {
                    probs.clear();
                    probs.extend(self.candidates(b * block + k).iter().map(|&j| {
                        let j = j as usize;
                        frag_probs[j] * cmix[components.column_component(j)]
                    }));
                    *choice = choose_alignment(probs, &mut rng) as u32;
                }
            },
        );
        for (r, &choice) in choices.iter().enumerate() {
            for (k, &j) in self.candidates(r).iter().enumerate() {
                frag_counts[j as usize] = if k == choice as usize { 1f64 } else { 0f64 };
            }
        }
    }
}

/// Draw an index with probability proportional to `probs`. Zero-probability
/// candidates are never chosen unless every candidate has zero probability,
/// in which case the last one is.
pub fn choose_alignment<R: Rng>(probs: &[f64], rng: &mut R) -> usize {
    let sum: f64 = probs.iter().sum();
    let mut r = sum * rng.gen::<f64>();
    for (k, &p) in probs.iter().enumerate() {
        if r < p {
            return k;
        }
        r -= p;
    }
    probs
        .iter()
        .rposition(|&p| 0f64 < p)
        .unwrap_or(probs.len().saturating_sub(1))
}
