//! Build the fragment weight matrix from a sorted alignment stream.
//!
//! The calling thread scans the stream once, hands every alignment to the
//! loci that contain it, and queues each locus as soon as the scan has
//! passed its end. Workers turn finished loci into weight matrix rows.
mod locus;
use crate::error::{QuantError, Result};
use crate::fragment_model::FragmentModel;
use crate::indexer::Indexer;
use crate::reads::ReadClasses;
use crate::reference::ReferenceSequences;
use crate::weight_matrix::WeightMatrix;
use crate::worker_pool::WorkerPool;
use definitions::{Alignment, AlignmentHeader, Locus, TranscriptSet};
use locus::{FinishedLocus, LocusWorker};
use std::collections::{HashMap, VecDeque};

/// Entries with a smaller weight are dropped.
pub const MIN_FRAG_WEIGHT: f32 = 1e-10;
/// Floor of a transcript weight.
pub const MIN_TRANSCRIPT_WEIGHT: f32 = 1.0;
/// Fragment lengths less likely than this are not corrected for bias.
pub const MIN_FRAG_LEN_PR: f32 = 1e-16;
/// Finished loci waiting for a worker.
pub const LOCUS_QUEUE_CAPACITY: usize = 100;

/// Output of the builder. Column indices refer to the compacted matrix.
#[derive(Debug, Clone, Default)]
pub struct FragmentWeights {
    pub matrix: WeightMatrix,
    /// Indexed by transcript.
    pub transcript_weights: Vec<f32>,
    /// `(column, count)` for collapsed fragments seen more than once.
    pub frag_counts: Vec<(u32, u32)>,
    /// `(multiread number, column)` for every synthetic multiread fragment.
    pub multiread_frags: Vec<(u32, u32)>,
}

pub struct WeightBuilder<'a> {
    transcripts: &'a TranscriptSet,
    model: &'a dyn FragmentModel,
    reads: &'a ReadClasses,
    reference: Option<&'a dyn ReferenceSequences>,
}

struct PendingLocus {
    tid: usize,
    locus: Locus,
    alignments: Vec<Alignment>,
}

impl<'a> WeightBuilder<'a> {
    pub fn new(
        transcripts: &'a TranscriptSet,
        model: &'a dyn FragmentModel,
        reads: &'a ReadClasses,
    ) -> Self {
        Self {
            transcripts,
            model,
            reads,
            reference: None,
        }
    }
    pub fn with_reference(mut self, reference: &'a dyn ReferenceSequences) -> Self {
        self.reference = Some(reference);
        self
    }
    /// Bias correction needs both a bias model and a reference.
    fn use_bias(&self) -> bool {
        match (self.model.seq_bias().is_some(), self.reference.is_some()) {
            (true, true) => true,
            (true, false) => {
                warn!("No reference sequence is given. Sequence bias correction is disabled.");
                false
            }
            _ => false,
        }
    }
    /// Scan `alignments`, sorted by the contig order of `header` and then by start,
    /// and build the weights of every fragment against every transcript of its locus.
    pub fn build<I>(&self, pool: &WorkerPool, header: &AlignmentHeader, alignments: I) -> Result<FragmentWeights>
    where
        I: IntoIterator<Item = Result<Alignment>>,
    {
        let use_bias = self.use_bias();
        let indexer = Indexer::new();
        let (scanned, workers) = pool.run_queue(
            Some(LOCUS_QUEUE_CAPACITY),
            |sender| {
                let mut send = |pending: PendingLocus| -> Result<()> {
                    // Loci without reads need no sequence.
                    let seq = match use_bias && !pending.alignments.is_empty() {
                        true => Some(self.fetch(&pending.locus.seqname)?),
                        false => None,
                    };
                    let finished = FinishedLocus {
                        locus: pending.locus,
                        seq,
                        alignments: pending.alignments,
                    };
                    sender.send(finished).map_err(|_| QuantError::QueueClosed)
                };
                self.scan(header, alignments, &mut send)
            },
            |_| LocusWorker::new(self.transcripts, self.model, use_bias, self.reads, &indexer),
            |worker: &mut LocusWorker, locus: FinishedLocus| worker.process(locus),
        );
        scanned?;
        let ncol = indexer.count() as usize;
        let mut matrix = WeightMatrix::new(self.transcripts.len());
        matrix.set_ncol(ncol);
        let mut transcript_weights = vec![MIN_TRANSCRIPT_WEIGHT; self.transcripts.len()];
        let mut frag_keys = vec![(u32::MAX, u32::MAX); ncol];
        let (mut frag_counts, mut multiread_frags) = (vec![], vec![]);
        for worker in workers {
            for (t, row) in worker.rows {
                matrix.extend_row(t, row);
            }
            for (t, w) in worker.transcript_weights {
                transcript_weights[t] = w;
            }
            for (j, key) in worker.frag_keys {
                frag_keys[j as usize] = key;
            }
            frag_counts.extend(worker.frag_counts);
            multiread_frags.extend(worker.multiread_frags);
        }
        // Columns were handed out in scheduling order. Renumber them by (locus, ordinal).
        let mut order: Vec<u32> = (0..ncol as u32).collect();
        order.sort_by_key(|&j| frag_keys[j as usize]);
        let mut perm = vec![0; ncol];
        for (new, &old) in order.iter().enumerate() {
            perm[old as usize] = new as u32;
        }
        matrix.reorder_columns(&perm);
        let map = matrix.compact();
        let remap = |j: u32| map[perm[j as usize] as usize];
        let mut frag_counts: Vec<(u32, u32)> = frag_counts
            .into_iter()
            .filter_map(|(j, count)| Some((remap(j)?, count)))
            .collect();
        frag_counts.sort_unstable();
        let mut multiread_frags: Vec<(u32, u32)> = multiread_frags
            .into_iter()
            .filter_map(|(num, j)| Some((num, remap(j)?)))
            .collect();
        multiread_frags.sort_unstable();
        debug!(
            "WEIGHTS\t{}\t{}\t{}\t{}",
            matrix.nrow(),
            matrix.ncol(),
            matrix.nnz(),
            multiread_frags.len()
        );
        Ok(FragmentWeights {
            matrix,
            transcript_weights,
            frag_counts,
            multiread_frags,
        })
    }
    fn fetch(&self, seqname: &str) -> Result<std::sync::Arc<Vec<u8>>> {
        self.reference
            .and_then(|r| r.fetch(seqname))
            .ok_or_else(|| QuantError::MissingReference(seqname.to_string()))
    }
    /// One forward pass over the alignments. Loci are passed to `finish` in order,
    /// each holding exactly the alignments that fall inside it.
    fn scan<I, F>(&self, header: &AlignmentHeader, alignments: I, finish: &mut F) -> Result<()>
    where
        I: IntoIterator<Item = Result<Alignment>>,
        F: FnMut(PendingLocus) -> Result<()>,
    {
        let contig_ids: HashMap<&str, usize> = header
            .contigs
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        // Loci on contigs missing from the header receive no alignments and are finished last.
        let mut loci: Vec<PendingLocus> = self
            .transcripts
            .loci()
            .into_iter()
            .map(|locus| PendingLocus {
                tid: contig_ids
                    .get(locus.seqname.as_str())
                    .copied()
                    .unwrap_or(header.contigs.len()),
                locus,
                alignments: vec![],
            })
            .collect();
        loci.sort_by_key(|l| (l.tid, l.locus.min_start));
        debug!("LOCI\t{}", loci.len());
        let mut pending: VecDeque<PendingLocus> = loci.into();
        let mut prev: Option<(usize, u64)> = None;
        let mut count = 0;
        for aln in alignments {
            let aln = aln?;
            if aln.pair.is_unmapped() {
                continue;
            }
            let tid = *contig_ids
                .get(aln.seqname.as_str())
                .ok_or_else(|| QuantError::UnknownContig(aln.seqname.clone()))?;
            let (start, end) = (aln.pair.start(), aln.pair.end());
            if let Some((prev_tid, prev_start)) = prev {
                if (tid, start) < (prev_tid, prev_start) {
                    return Err(QuantError::Unsorted {
                        read: aln.read,
                        seqname: aln.seqname,
                        start,
                        prev_seqname: header.contigs[prev_tid].clone(),
                        prev_start,
                    });
                }
            }
            prev = Some((tid, start));
            count += 1;
            while pending.front().map_or(false, |l| {
                l.tid < tid || (l.tid == tid && l.locus.max_end <= start)
            }) {
                if let Some(done) = pending.pop_front() {
                    finish(done)?;
                }
            }
            // Loci are disjoint, so at most one of them contains the alignment.
            if let Some(locus) = pending
                .iter_mut()
                .take_while(|l| l.tid == tid && l.locus.min_start <= start)
                .find(|l| end <= l.locus.max_end)
            {
                locus.alignments.push(aln);
            }
        }
        debug!("ALIGNMENTS\t{}", count);
        while let Some(done) = pending.pop_front() {
            finish(done)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
