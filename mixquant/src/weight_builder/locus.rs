use super::{MIN_FRAG_LEN_PR, MIN_FRAG_WEIGHT, MIN_TRANSCRIPT_WEIGHT};
use crate::fragment_model::{FragmentModel, SeqBias};
use crate::indexer::Indexer;
use crate::reads::ReadClasses;
use crate::weight_matrix::Row;
use definitions::{reverse_complement, Alignment, AlignmentPair, Locus, Strand, Transcript, TranscriptSet};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A locus whose alignments are all collected.
pub(super) struct FinishedLocus {
    pub locus: Locus,
    /// Contig sequence, present when bias correction is on.
    pub seq: Option<Arc<Vec<u8>>>,
    pub alignments: Vec<Alignment>,
}

/// Per-worker state: scratch space and the rows built so far.
pub(super) struct LocusWorker<'a> {
    transcripts: &'a TranscriptSet,
    model: &'a dyn FragmentModel,
    bias: Option<&'a dyn SeqBias>,
    reads: &'a ReadClasses,
    indexer: &'a Indexer,
    /// Bias of mate1/mate2 5' ends, by strand, at each transcript offset.
    mate1_bias: [Vec<f32>; 2],
    mate2_bias: [Vec<f32>; 2],
    pub rows: Vec<(usize, Row)>,
    pub transcript_weights: Vec<(usize, f32)>,
    /// Column to (locus key, ordinal within locus).
    pub frag_keys: Vec<(u32, (u32, u32))>,
    pub frag_counts: Vec<(u32, u32)>,
    pub multiread_frags: Vec<(u32, u32)>,
}

impl<'a> LocusWorker<'a> {
    pub fn new(
        transcripts: &'a TranscriptSet,
        model: &'a dyn FragmentModel,
        use_bias: bool,
        reads: &'a ReadClasses,
        indexer: &'a Indexer,
    ) -> Self {
        let bias = model.seq_bias().filter(|_| use_bias);
        Self {
            transcripts,
            model,
            bias,
            reads,
            indexer,
            mate1_bias: [vec![], vec![]],
            mate2_bias: [vec![], vec![]],
            rows: vec![],
            transcript_weights: vec![],
            frag_keys: vec![],
            frag_counts: vec![],
            multiread_frags: vec![],
        }
    }
    fn next_index(&mut self, key: u32, ordinal: &mut u32) -> u32 {
        let j = self.indexer.get();
        self.frag_keys.push((j, (key, *ordinal)));
        *ordinal += 1;
        j
    }
    pub fn process(&mut self, finished: FinishedLocus) {
        let FinishedLocus {
            locus,
            seq,
            alignments,
        } = finished;
        let set: &'a TranscriptSet = self.transcripts;
        let transcripts: Vec<&'a Transcript> = locus.transcripts.iter().map(|&i| &set[i]).collect();
        let key = locus.transcripts.iter().min().copied().unwrap_or(0) as u32;
        let mut ordinal = 0;
        // Unique fragments: column and number of copies.
        let mut frags: BTreeMap<&AlignmentPair, (u32, u32)> = BTreeMap::new();
        let mut excluded: BTreeSet<&AlignmentPair> = BTreeSet::new();
        let mut multireads: Vec<(u32, &AlignmentPair)> = vec![];
        for aln in alignments.iter() {
            if self.reads.is_blacklisted(&aln.read) {
                continue;
            }
            if let Some(num) = self.reads.multiread(&aln.read) {
                multireads.push((num, &aln.pair));
                continue;
            }
            if excluded.contains(&aln.pair) {
                continue;
            }
            if let Some((_, count)) = frags.get_mut(&aln.pair) {
                *count += 1;
                continue;
            }
            if transcripts.iter().any(|t| aln.pair.frag_len(t).is_some()) {
                let j = self.next_index(key, &mut ordinal);
                frags.insert(&aln.pair, (j, 1));
            } else {
                excluded.insert(&aln.pair);
            }
        }
        self.frag_counts.extend(frags.values().filter(|&&(_, count)| 1 < count).copied());
        multireads.sort();
        // (multiread, transcript, weight)
        let mut multiread_entries: Vec<(u32, usize, f32)> = vec![];
        let mut rows: Vec<(usize, Row)> = Vec::with_capacity(transcripts.len());
        for t in transcripts.iter() {
            let biased = self.transcript_sequence_bias(t, seq.as_deref().map(|s| s.as_slice()));
            let tw = self.transcript_weight(t, biased).max(MIN_TRANSCRIPT_WEIGHT);
            self.transcript_weights.push((t.id, tw));
            for &(num, pair) in multireads.iter() {
                let w = self.fragment_weight(t, pair);
                if MIN_FRAG_WEIGHT < w {
                    multiread_entries.push((num, t.id, w / tw));
                }
            }
            let mut row = Row::new();
            for (pair, &(j, _)) in frags.iter() {
                let w = self.fragment_weight(t, pair);
                if MIN_FRAG_WEIGHT < w {
                    row.push(j, w / tw);
                }
            }
            rows.push((t.id, row));
        }
        // One synthetic fragment per multiread, weights on the same transcript summed.
        multiread_entries.sort_by_key(|&(num, t, _)| (num, t));
        let mut start = 0;
        while start < multiread_entries.len() {
            let num = multiread_entries[start].0;
            let end = start
                + multiread_entries[start..]
                    .iter()
                    .take_while(|e| e.0 == num)
                    .count();
            let group = &multiread_entries[start..end];
            start = end;
            if group.iter().map(|e| e.2).sum::<f32>() <= 0f32 {
                continue;
            }
            let j = self.next_index(key, &mut ordinal);
            self.multiread_frags.push((num, j));
            let mut k = 0;
            while k < group.len() {
                let t = group[k].1;
                let w: f32 = group[k..].iter().take_while(|e| e.1 == t).map(|e| e.2).sum();
                k += group[k..].iter().take_while(|e| e.1 == t).count();
                if MIN_FRAG_WEIGHT < w {
                    if let Some((_, row)) = rows.iter_mut().find(|(id, _)| *id == t) {
                        row.push(j, w);
                    }
                }
            }
        }
        trace!(
            "LOCUS\t{}\t{}\t{}\t{}\t{}",
            locus.seqname,
            locus.min_start,
            transcripts.len(),
            frags.len(),
            multireads.len()
        );
        self.rows.extend(rows);
    }
    /// Fill the bias arrays for `t`. Returns false (all ones) without bias or sequence.
    fn transcript_sequence_bias(&mut self, t: &Transcript, seq: Option<&[u8]>) -> bool {
        let tlen = t.exonic_length() as usize;
        for arr in self.mate1_bias.iter_mut().chain(self.mate2_bias.iter_mut()) {
            arr.clear();
            arr.resize(tlen, 1f32);
        }
        let (bias, seq) = match (self.bias, seq) {
            (Some(bias), Some(seq)) => (bias, seq),
            _ => return false,
        };
        let (left, right) = (bias.left_flank(), bias.right_flank());
        let fwd = t.extract_sequence(seq, left, right);
        let rev = reverse_complement(&t.extract_sequence(seq, right, left));
        for pos in 0..tlen {
            self.mate1_bias[0][pos] = bias.mate1_bias(&fwd, pos + left);
            self.mate1_bias[1][pos] = bias.mate1_bias(&rev, pos + left);
            self.mate2_bias[0][pos] = bias.mate2_bias(&fwd, pos + left);
            self.mate2_bias[1][pos] = bias.mate2_bias(&rev, pos + left);
        }
        // Reverse strand arrays are indexed by genomic offset as well.
        self.mate1_bias[1].reverse();
        self.mate2_bias[1].reverse();
        true
    }
    /// Expected number of fragment placements on `t`, weighted by length probability
    /// and, for FR libraries, by the bias at both fragment ends.
    fn transcript_weight(&self, t: &Transcript, biased: bool) -> f32 {
        let tlen = t.exonic_length();
        let ss = self.model.strand_specificity();
        let (sp_fwd, sp_rev) = match t.strand {
            Strand::Forward => (ss, 1f32 - ss),
            Strand::Reverse => (1f32 - ss, ss),
        };
        let mut w = 0f64;
        for frag_len in 1..=tlen {
            let pr = self.model.frag_len_pr(frag_len);
            let positions = (tlen - frag_len + 1) as usize;
            let ws = if !biased || pr < MIN_FRAG_LEN_PR {
                positions as f32
            } else {
                let span = frag_len as usize - 1;
                let fwd: f32 = (0..positions)
                    .map(|pos| self.mate1_bias[0][pos] * self.mate2_bias[1][pos + span])
                    .sum();
                let rev: f32 = (0..positions)
                    .map(|pos| self.mate2_bias[0][pos] * self.mate1_bias[1][pos + span])
                    .sum();
                sp_fwd * fwd + sp_rev * rev
            };
            w += pr as f64 * ws as f64;
        }
        w as f32
    }
    fn fragment_weight(&self, t: &Transcript, pair: &AlignmentPair) -> f32 {
        let tlen = t.exonic_length();
        let frag_len = match pair.frag_len(t) {
            None => return 0f32,
            Some(0) => tlen.min(self.model.frag_len_median().round().max(1f32) as u64),
            Some(len) => len,
        };
        let mut w = self.model.frag_len_pr(frag_len);
        let mates = [(&pair.mate1, &self.mate1_bias), (&pair.mate2, &self.mate2_bias)];
        for (mate, bias) in mates {
            if let Some(mate) = mate {
                if let Some(offset) = t.offset(mate.five_prime()) {
                    w *= bias[mate.strand.index()][offset as usize];
                }
            }
        }
        w
    }
}
