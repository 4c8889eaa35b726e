//! MCMC over transcript mixtures.
//!
//! Every round resolves multireads, then visits every component in random
//! order: transcript pairs are slice-sampled within the component, and the
//! component mass is drawn from its Gamma conditional. Components are spread
//! over the worker pool in batches; each owns disjoint slices of the mixture
//! and fragment probability vectors, so no locking is needed.
pub mod config;
pub mod slice;
use crate::components::{decompose, Components};
use crate::error::{QuantError, Result};
use crate::multireads::Multireads;
use crate::weight_builder::FragmentWeights;
use crate::weight_matrix::WeightMatrix;
use crate::worker_pool::WorkerPool;
pub use config::SamplerConfig;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use slice::McmcStep;

/// Stream tag of the per-round shuffle of component order.
const ROUND_STREAM: u64 = 1 << 41;

/// Random stream of one task, fixed by the master seed, the round, and a key
/// naming the task. Independent of which thread runs it.
pub fn task_rng(seed: u64, round: u64, key: u64) -> Xoshiro256PlusPlus {
    let mix = |mut z: u64| {
        z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    };
    Xoshiro256PlusPlus::seed_from_u64(mix(mix(mix(seed) ^ round) ^ key))
}

/// One component, with exclusive access to its part of the sampler state.
pub(crate) struct ComponentWork<'a> {
    pub component: usize,
    pub transcripts: &'a [u32],
    /// Mixture of `transcripts`, same order.
    pub tmix: &'a mut [f64],
    pub frag_probs: &'a mut [f64],
    pub frag_counts: &'a [f64],
    /// First column of the component.
    pub frag_start: usize,
    pub count_sum: f64,
    pub cmix: &'a mut f64,
    pub rng: Xoshiro256PlusPlus,
}

#[derive(Debug, Clone)]
pub struct Sampler {
    config: SamplerConfig,
    weights: WeightMatrix,
    components: Components,
    transcript_weights: Vec<f32>,
    /// By column.
    frag_counts: Vec<f64>,
    /// By column, `sum_i weight(i, j) * tmix[i]`.
    frag_probs: Vec<f64>,
    /// By component.
    frag_count_sums: Vec<f64>,
    /// By transcript slot (see [Components::slot]).
    tmix: Vec<f64>,
    cmix: Vec<f64>,
    multireads: Multireads,
    round: u64,
}

impl Sampler {
    /// Decompose the weights into components and set the uniform initial state.
    pub fn new(weights: FragmentWeights, config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        let FragmentWeights {
            mut matrix,
            transcript_weights,
            frag_counts,
            multiread_frags,
        } = weights;
        if transcript_weights.len() != matrix.nrow() {
            return Err(QuantError::Config(format!(
                "{} transcript weights for {} transcripts",
                transcript_weights.len(),
                matrix.nrow()
            )));
        }
        // A column without entries would form a component without transcripts.
        let colmap = matrix.compact();
        let (components, idxmap) = decompose(&mut matrix);
        let remap = |j: u32| -> Option<u32> {
            let j = colmap.get(j as usize).copied().flatten()?;
            Some(idxmap[j as usize])
        };
        let mut counts = vec![1f64; matrix.ncol()];
        for (j, count) in frag_counts {
            if let Some(j) = remap(j) {
                counts[j as usize] = count as f64;
            }
        }
        let multireads = Multireads::new(
            multiread_frags
                .into_iter()
                .filter_map(|(num, j)| Some((num, remap(j)?)))
                .collect(),
        );
        let num_components = components.len();
        let mut tmix = vec![0f64; components.num_transcripts()];
        for c in 0..num_components {
            let slots = components.slots(c);
            let share = 1f64 / slots.len() as f64;
            tmix[slots].iter_mut().for_each(|x| *x = share);
        }
        let cmix = vec![1f64 / num_components.max(1) as f64; num_components];
        info!(
            "SAMPLER\t{}\t{}\t{}\t{}",
            matrix.nrow(),
            matrix.ncol(),
            num_components,
            multireads.len()
        );
        let mut sampler = Self {
            config,
            weights: matrix,
            components,
            transcript_weights,
            frag_counts: counts,
            frag_probs: vec![],
            frag_count_sums: vec![0f64; num_components],
            tmix,
            cmix,
            multireads,
            round: 0,
        };
        sampler.init_frag_probs();
        sampler.recompute_count_sums();
        Ok(sampler)
    }
    fn init_frag_probs(&mut self) {
        let mut probs = vec![0f64; self.weights.ncol()];
        for (i, row) in self.weights.rows().iter().enumerate() {
            let tmix = self.tmix[self.components.slot(i)];
            for (j, w) in row.iter() {
                probs[j as usize] += tmix * w as f64;
            }
        }
        self.frag_probs = probs;
    }
    fn recompute_count_sums(&mut self) {
        for (c, sum) in self.frag_count_sums.iter_mut().enumerate() {
            *sum = self.frag_counts[self.components.frag_range(c)].iter().sum();
        }
    }
    /// Run one full round of multiread resolution and MCMC.
    pub fn sample_round(&mut self, pool: &WorkerPool) -> Result<()> {
        let (seed, round) = (self.config.seed, self.round);
        self.multireads.resolve(
            pool,
            (seed, round),
            self.config.multiread_block,
            &self.frag_probs,
            &self.cmix,
            &self.components,
            &mut self.frag_counts,
        );
        self.recompute_count_sums();
        let components = &self.components;
        let frag_counts = &self.frag_counts;
        let mut works = Vec::with_capacity(components.len());
        let mut tmix_rest: &mut [f64] = &mut self.tmix;
        let mut probs_rest: &mut [f64] = &mut self.frag_probs;
        for (c, cmix) in self.cmix.iter_mut().enumerate() {
            let transcripts = components.transcripts(c);
            let frags = components.frag_range(c);
            let (tmix, rest) = std::mem::take(&mut tmix_rest).split_at_mut(transcripts.len());
            tmix_rest = rest;
            let (frag_probs, rest) = std::mem::take(&mut probs_rest).split_at_mut(frags.len());
            probs_rest = rest;
            works.push(ComponentWork {
                component: c,
                transcripts,
                tmix,
                frag_probs,
                frag_counts: &frag_counts[frags.clone()],
                frag_start: frags.start,
                count_sum: self.frag_count_sums[c],
                cmix,
                rng: task_rng(seed, round, transcripts[0] as u64),
            });
        }
        works.shuffle(&mut task_rng(seed, round, ROUND_STREAM));
        let batch_size = self.config.component_batch;
        let (weights, prior) = (&self.weights, self.config.prior_precision);
        let (sent, _) = pool.run_queue(
            None,
            |sender| {
                let mut works = works.into_iter();
                loop {
                    let batch: Vec<ComponentWork> = works.by_ref().take(batch_size).collect();
                    if batch.is_empty() {
                        break Ok(());
                    }
                    if sender.send(batch).is_err() {
                        break Err(QuantError::QueueClosed);
                    }
                }
            },
            |_| McmcStep::new(weights, prior),
            |step: &mut McmcStep, mut batch: Vec<ComponentWork>| {
                for work in batch.iter_mut() {
                    step.run_intra_component(work);
                }
                for work in batch.iter_mut() {
                    step.run_component(work);
                }
            },
        );
        sent?;
        self.normalize_cmix();
        self.round += 1;
        Ok(())
    }
    fn normalize_cmix(&mut self) {
        let total: f64 = self.cmix.iter().sum();
        if 0f64 < total && total.is_finite() {
            self.cmix.iter_mut().for_each(|x| *x /= total);
        } else {
            warn!("CMIX\t{}\tReset", total);
            let n = self.cmix.len() as f64;
            self.cmix.iter_mut().for_each(|x| *x = 1f64 / n);
        }
    }
    /// Run `burn_in` unreported rounds, then `num_samples` rounds, calling
    /// `sink(sample_index, self)` after each of the latter.
    pub fn run<F>(&mut self, pool: &WorkerPool, burn_in: usize, num_samples: usize, mut sink: F) -> Result<()>
    where
        F: FnMut(usize, &Sampler),
    {
        for i in 0..burn_in {
            debug!("BURNIN\t{}", i);
            self.sample_round(pool)?;
        }
        for i in 0..num_samples {
            debug!("ROUND\t{}", i);
            self.sample_round(pool)?;
            sink(i, self);
        }
        info!("SAMPLED\t{}\t{}", burn_in, num_samples);
        Ok(())
    }
    /// `tmix[i] * cmix[component(i)]` for every transcript.
    pub fn abundance(&self) -> Vec<f64> {
        (0..self.components.num_transcripts())
            .map(|i| self.tmix(i) * self.cmix[self.components.component(i)])
            .collect()
    }
    /// Share of transcript `i` within its component.
    pub fn tmix(&self, i: usize) -> f64 {
        self.tmix[self.components.slot(i)]
    }
    pub fn cmix(&self) -> &[f64] {
        &self.cmix
    }
    pub fn frag_count_sums(&self) -> &[f64] {
        &self.frag_count_sums
    }
    pub fn frag_counts(&self) -> &[f64] {
        &self.frag_counts
    }
    pub fn frag_probs(&self) -> &[f64] {
        &self.frag_probs
    }
    pub fn components(&self) -> &Components {
        &self.components
    }
    pub fn transcript_component(&self) -> &[u32] {
        self.components.transcript_component()
    }
    pub fn transcript_weights(&self) -> &[f32] {
        &self.transcript_weights
    }
    pub fn weights(&self) -> &WeightMatrix {
        &self.weights
    }
    pub fn multireads(&self) -> &Multireads {
        &self.multireads
    }
    pub fn round(&self) -> u64 {
        self.round
    }
}
