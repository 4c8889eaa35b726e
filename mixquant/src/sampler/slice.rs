//! One MCMC step over a component: slice sampling of transcript pairs, then a
//! Gibbs draw of the component mass.
use super::ComponentWork;
use crate::weight_matrix::{Row, WeightMatrix};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Gamma};

/// Pairs with less mass than this are left alone.
pub const ZERO_EPS: f64 = 1e-12;
const XMIN: f64 = 1e-12;
const XMAX: f64 = 1f64 - 1e-12;
/// Tolerance on the slice edge.
const XEPS: f64 = 1e-4;
/// Tolerance on the log-likelihood residual.
const LEPS: f64 = 1e-10;
const MAX_ITER: usize = 100;

/// Log-likelihood of the fragments touched by transcripts u and v, as a function
/// of the share θ of u in their joint mass. Other fragments do not move.
pub(crate) struct PairLikelihood<'a> {
    /// (local fragment, count, weight in u, weight in v), counts positive.
    entries: &'a [(usize, f64, f64, f64)],
    probs: &'a [f64],
    tmix_u: f64,
    tmix_v: f64,
}

impl<'a> PairLikelihood<'a> {
    fn mass(&self) -> f64 {
        self.tmix_u + self.tmix_v
    }
    /// Log-likelihood at the current mixture.
    pub fn current(&self) -> f64 {
        self.entries
            .iter()
            .map(|&(j, count, _, _)| count * self.probs[j].ln())
            .sum()
    }
    pub fn eval(&self, theta: f64) -> f64 {
        let z = self.mass();
        let du = theta * z - self.tmix_u;
        let dv = (1f64 - theta) * z - self.tmix_v;
        let mut lk = 0f64;
        for &(j, count, wu, wv) in self.entries.iter() {
            let prob = self.probs[j] + du * wu + dv * wv;
            if prob <= 0f64 {
                return f64::NEG_INFINITY;
            }
            lk += count * prob.ln();
        }
        lk
    }
}

/// Walk two sorted rows together, keeping fragments with a positive count.
fn merge_rows(merged: &mut Vec<(usize, f64, f64, f64)>, u: &Row, v: &Row, counts: &[f64], offset: usize) {
    merged.clear();
    let (iu, iv) = (u.idxs(), v.idxs());
    let (wu, wv) = (u.weights(), v.weights());
    let (mut a, mut b) = (0, 0);
    loop {
        let (j, x, y) = match (iu.get(a), iv.get(b)) {
            (Some(&ja), Some(&jb)) if ja == jb => {
                a += 1;
                b += 1;
                (ja, wu[a - 1], wv[b - 1])
            }
            (Some(&ja), Some(&jb)) if ja < jb => {
                a += 1;
                (ja, wu[a - 1], 0f32)
            }
            (Some(&ja), None) => {
                a += 1;
                (ja, wu[a - 1], 0f32)
            }
            (_, Some(&jb)) => {
                b += 1;
                (jb, 0f32, wv[b - 1])
            }
            (None, None) => break,
        };
        let local = j as usize - offset;
        let count = counts[local];
        if 0f64 < count {
            merged.push((local, count, x as f64, y as f64));
        }
    }
}

/// `probs += delta * row`, floored at zero.
fn axpy(probs: &mut [f64], row: &Row, delta: f64, offset: usize) {
    for (j, w) in row.iter() {
        let prob = &mut probs[j as usize - offset];
        *prob = (*prob + delta * w as f64).max(0f64);
    }
}

/// Find where `f` crosses `height` on one side of `z0` with a Brent-Dekker search
/// (inverse quadratic interpolation, secant, bisection). `p0 = f(z0)`.
pub(crate) fn slice_edge<F: Fn(f64) -> f64>(f: F, height: f64, z0: f64, p0: f64, left: bool) -> f64 {
    let (mut low, mut high) = match left {
        true => (XMIN, z0),
        false => (z0, XMAX),
    };
    let mut lowp = if left { f(low) } else { p0 } - height;
    if left && 0f64 <= lowp {
        return low;
    }
    let mut highp = if left { p0 } else { f(high) } - height;
    if !left && 0f64 <= highp {
        return high;
    }
    if lowp.abs() < highp.abs() {
        std::mem::swap(&mut low, &mut high);
        std::mem::swap(&mut lowp, &mut highp);
    }
    let mut mflag = true;
    let mut s = high;
    let mut d = 0f64;
    let (mut c, mut cp) = (low, lowp);
    let mut iter = 0;
    while XEPS < (high - low).abs() && LEPS < lowp.abs() && LEPS < highp.abs() {
        if iter == MAX_ITER {
            warn!("SLICE\tNotConverged\t{:.3e}\t{:.3e}", low, high);
            break;
        }
        iter += 1;
        if !lowp.is_finite() || !highp.is_finite() {
            s = (high + low) / 2f64;
            mflag = true;
        } else {
            s = if lowp != cp && highp != cp {
                low * highp * cp / ((lowp - highp) * (lowp - cp))
                    + high * lowp * cp / ((highp - lowp) * (highp - cp))
                    + c * lowp * highp / ((cp - lowp) * (cp - highp))
            } else {
                high - highp * (high - low) / (highp - lowp)
            };
            let quarter = (3f64 * low + high) / 4f64;
            let outside = !((quarter < s && s < high) || (high < s && s < quarter));
            let bisect = outside
                || (mflag && (high - c).abs() / 2f64 <= (s - high).abs())
                || (!mflag && (c - d).abs() / 2f64 <= (s - high).abs())
                || (mflag && (high - c).abs() < XEPS)
                || (!mflag && (c - d).abs() < XEPS)
                || !s.is_finite();
            if bisect {
                s = (high + low) / 2f64;
            }
            mflag = bisect;
        }
        let sp = f(s) - height;
        d = c;
        c = high;
        cp = highp;
        if lowp * sp < 0f64 {
            high = s;
            highp = sp;
        } else {
            low = s;
            lowp = sp;
        }
        if lowp.abs() < highp.abs() {
            std::mem::swap(&mut low, &mut high);
            std::mem::swap(&mut lowp, &mut highp);
        }
    }
    s.clamp(XMIN, XMAX)
}

/// Per-worker MCMC state.
pub(crate) struct McmcStep<'a> {
    weights: &'a WeightMatrix,
    prior_precision: f64,
    merged: Vec<(usize, f64, f64, f64)>,
    order: Vec<usize>,
}

impl<'a> McmcStep<'a> {
    pub fn new(weights: &'a WeightMatrix, prior_precision: f64) -> Self {
        Self {
            weights,
            prior_precision,
            merged: vec![],
            order: vec![],
        }
    }
    /// Shuffle the transcripts of the component and slice-sample each consecutive pair.
    pub fn run_intra_component(&mut self, work: &mut ComponentWork) {
        let n = work.transcripts.len();
        if n <= 1 {
            return;
        }
        self.order.clear();
        self.order.extend(0..n);
        self.order.shuffle(&mut work.rng);
        for k in 0..n - 1 {
            let (a, b) = (self.order[k], self.order[k + 1]);
            self.run_inter_transcript(work, a, b);
        }
    }
    /// Slice-sample the split of mass between the transcripts in slots `a` and `b`.
    pub fn run_inter_transcript(&mut self, work: &mut ComponentWork, a: usize, b: usize) {
        let (tmix_u, tmix_v) = (work.tmix[a], work.tmix[b]);
        let z = tmix_u + tmix_v;
        if z < ZERO_EPS {
            return;
        }
        let weights = self.weights;
        let row_u = weights.row(work.transcripts[a] as usize);
        let row_v = weights.row(work.transcripts[b] as usize);
        merge_rows(&mut self.merged, row_u, row_v, work.frag_counts, work.frag_start);
        let theta = {
            let lk = PairLikelihood {
                entries: &self.merged,
                probs: work.frag_probs,
                tmix_u,
                tmix_v,
            };
            let p0 = lk.current();
            let height = work.rng.gen::<f64>().ln() + p0;
            if height.is_finite() {
                let z0 = tmix_u / z;
                let s0 = slice_edge(|x| lk.eval(x), height, z0, p0, true);
                let s1 = slice_edge(|x| lk.eval(x), height, z0, p0, false);
                s0 + work.rng.gen::<f64>() * (s1 - s0)
            } else {
                trace!("SLICE\tFallback\t{}\t{}", work.component, p0);
                work.rng.gen_range(XMIN..XMAX)
            }
        };
        let (new_u, new_v) = (theta * z, (1f64 - theta) * z);
        axpy(work.frag_probs, row_u, new_u - tmix_u, work.frag_start);
        axpy(work.frag_probs, row_v, new_v - tmix_v, work.frag_start);
        work.tmix[a] = new_u;
        work.tmix[b] = new_v;
    }
    /// Draw the unnormalised component mass.
    pub fn run_component(&self, work: &mut ComponentWork) {
        let shape = work.count_sum + work.transcripts.len() as f64 * self.prior_precision;
        // Gamma(0, 1) is a point mass at zero.
        if shape <= 0f64 {
            *work.cmix = 0f64;
            return;
        }
        match Gamma::new(shape, 1f64) {
            Ok(gamma) => *work.cmix = gamma.sample(&mut work.rng),
            Err(why) => warn!("GIBBS\t{}\t{}\t{:?}", work.component, shape, why),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    #[test]
    fn edges_of_a_concave_slice() {
        let f = |x: f64| -100f64 * (x - 0.5).powi(2);
        let left = slice_edge(f, -1f64, 0.5, 0f64, true);
        let right = slice_edge(f, -1f64, 0.5, 0f64, false);
        assert!((left - 0.4).abs() < 1e-3, "{}", left);
        assert!((right - 0.6).abs() < 1e-3, "{}", right);
    }
    #[test]
    fn edges_at_the_boundary() {
        let f = |_: f64| 0f64;
        assert_eq!(slice_edge(f, -1f64, 0.3, 0f64, true), XMIN);
        assert_eq!(slice_edge(f, -1f64, 0.3, 0f64, false), XMAX);
    }
    #[test]
    fn non_finite_likelihood_bisects() {
        let f = |x: f64| if x < 0.2 { f64::NEG_INFINITY } else { 0f64 };
        let left = slice_edge(f, -1f64, 0.5, 0f64, true);
        assert!((left - 0.2).abs() < 1e-3, "{}", left);
    }
    fn matrix(rows: &[&[(u32, f32)]]) -> WeightMatrix {
        let mut m = WeightMatrix::new(rows.len());
        for (i, row) in rows.iter().enumerate() {
            row.iter().for_each(|&(j, w)| m.push(i, j, w));
        }
        m.compact();
        m
    }
    #[test]
    fn pair_likelihood_matches_full() {
        let m = matrix(&[&[(0, 0.5), (1, 0.2)], &[(1, 0.4), (2, 0.9)]]);
        let counts = vec![2f64, 1f64, 0f64];
        let tmix = [0.3, 0.7];
        let full = |tu: f64, tv: f64| -> f64 {
            let probs = [0.5 * tu, 0.2 * tu + 0.4 * tv, 0.9 * tv];
            probs
                .iter()
                .zip(counts.iter())
                .filter(|(_, c)| 0f64 < **c)
                .map(|(p, c)| c * p.ln())
                .sum()
        };
        let probs: Vec<f64> = vec![0.5 * 0.3, 0.2 * 0.3 + 0.4 * 0.7, 0.9 * 0.7];
        let mut merged = vec![];
        merge_rows(&mut merged, m.row(0), m.row(1), &counts, 0);
        assert_eq!(merged.len(), 2);
        let lk = PairLikelihood {
            entries: &merged,
            probs: &probs,
            tmix_u: tmix[0],
            tmix_v: tmix[1],
        };
        assert!((lk.current() - full(0.3, 0.7)).abs() < 1e-6);
        assert!((lk.eval(0.8) - full(0.8, 0.2)).abs() < 1e-6);
        assert_eq!(lk.eval(0f64 - 1f64), f64::NEG_INFINITY);
    }
    struct Fixture {
        m: WeightMatrix,
        transcripts: Vec<u32>,
        tmix: Vec<f64>,
        probs: Vec<f64>,
        counts: Vec<f64>,
        cmix: f64,
    }
    impl Fixture {
        fn new(tmix: Vec<f64>) -> Self {
            let m = matrix(&[&[(0, 0.5), (1, 0.2)], &[(1, 0.4), (2, 0.9)], &[(2, 0.1)]]);
            let mut probs = vec![0f64; 3];
            for (i, &t) in tmix.iter().enumerate() {
                m.row(i).iter().for_each(|(j, w)| probs[j as usize] += t * w as f64);
            }
            Self {
                m,
                transcripts: vec![0, 1, 2],
                tmix,
                probs,
                counts: vec![3f64, 1f64, 2f64],
                cmix: 1f64,
            }
        }
        fn work(&mut self, seed: u64) -> ComponentWork<'_> {
            ComponentWork {
                component: 0,
                transcripts: &self.transcripts,
                tmix: &mut self.tmix,
                frag_probs: &mut self.probs,
                frag_counts: &self.counts,
                frag_start: 0,
                count_sum: 6f64,
                cmix: &mut self.cmix,
                rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            }
        }
    }
    #[test]
    fn slice_step_keeps_pair_mass() {
        let mut fixture = Fixture::new(vec![0.2, 0.5, 0.3]);
        let m = fixture.m.clone();
        let mut step = McmcStep::new(&m, 0.1);
        for seed in 0..50 {
            let mut work = fixture.work(seed);
            step.run_inter_transcript(&mut work, 0, 1);
            let (u, v) = (work.tmix[0], work.tmix[1]);
            assert!((u + v - 0.7).abs() < 1e-9);
            assert!(0f64 < u && u < 1f64 && 0f64 < v && v < 1f64);
        }
        // Fragment probabilities follow the mixture.
        for j in 0..3 {
            let expected: f64 = (0..3)
                .map(|i| {
                    let row = fixture.m.row(i);
                    let w = row.iter().find(|&(k, _)| k == j).map_or(0f64, |(_, w)| w as f64);
                    fixture.tmix[i] * w
                })
                .sum();
            assert!((fixture.probs[j as usize] - expected).abs() < 1e-9);
        }
    }
    #[test]
    fn negligible_pair_is_untouched() {
        let mut fixture = Fixture::new(vec![1e-13, 1e-13, 1f64 - 2e-13]);
        let m = fixture.m.clone();
        let before = (fixture.tmix.clone(), fixture.probs.clone());
        let mut step = McmcStep::new(&m, 0.1);
        let mut work = fixture.work(1);
        step.run_inter_transcript(&mut work, 0, 1);
        assert_eq!(fixture.tmix, before.0);
        assert_eq!(fixture.probs, before.1);
    }
    #[test]
    fn intra_and_gibbs() {
        let mut fixture = Fixture::new(vec![1f64 / 3f64; 3]);
        let m = fixture.m.clone();
        let mut step = McmcStep::new(&m, 0.1);
        let mut work = fixture.work(7);
        for _ in 0..20 {
            step.run_intra_component(&mut work);
        }
        step.run_component(&mut work);
        let total: f64 = fixture.tmix.iter().sum();
        assert!((total - 1f64).abs() < 1e-9);
        assert!(0f64 < fixture.cmix);
    }
    #[test]
    fn empty_component_without_prior() {
        let mut fixture = Fixture::new(vec![1f64 / 3f64; 3]);
        let m = fixture.m.clone();
        let step = McmcStep::new(&m, 0f64);
        let mut work = fixture.work(3);
        work.count_sum = 0f64;
        step.run_component(&mut work);
        assert_eq!(fixture.cmix, 0f64);
    }
}
