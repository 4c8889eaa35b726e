//! Definitions -- the data model shared by the quantifier and its command line interface.
//! Transcripts, aligned read pairs, and transcript loci are plain serde structures, so that
//! any front-end can hand them to the sampler as JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// 0 for the forward strand, 1 for the reverse strand.
    pub fn index(&self) -> usize {
        match self {
            Strand::Forward => 0,
            Strand::Reverse => 1,
        }
    }
}

/// Half-open genomic interval, `[start, end)`, 0-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
    /// True if `other` lies entirely within this interval.
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Index of the transcript. It is given by [TranscriptSet] and is dense in `[0, N)`.
    #[serde(default)]
    pub id: usize,
    pub name: String,
    #[serde(default)]
    pub gene_id: String,
    pub seqname: String,
    pub strand: Strand,
    /// Exons, sorted by position and non-overlapping.
    pub exons: Vec<Interval>,
    /// Index of the transcript group (transcripts sharing a gene).
    #[serde(default)]
    pub tgroup: usize,
}

impl Transcript {
    pub fn start(&self) -> u64 {
        self.exons.first().map(|e| e.start).unwrap_or(0)
    }
    pub fn end(&self) -> u64 {
        self.exons.last().map(|e| e.end).unwrap_or(0)
    }
    pub fn exonic_length(&self) -> u64 {
        self.exons.iter().map(|e| e.len()).sum()
    }
    /// Offset of the genomic position `pos` from the first exonic base,
    /// counted in genomic orientation over exonic bases only.
    /// Returns None if `pos` is not exonic.
    pub fn offset(&self, pos: u64) -> Option<u64> {
        let mut acc = 0;
        for exon in self.exons.iter() {
            if exon.start <= pos && pos < exon.end {
                return Some(acc + pos - exon.start);
            }
            acc += exon.len();
        }
        None
    }
    fn exon_containing(&self, block: &Interval) -> Option<usize> {
        self.exons.iter().position(|exon| exon.contains(block))
    }
    /// True if every aligned block of the mate sits inside an exon and every gap
    /// between consecutive blocks is exactly an intron of this transcript.
    pub fn is_compatible(&self, mate: &Mate) -> bool {
        if mate.blocks.is_empty() {
            return false;
        }
        let mut prev: Option<usize> = None;
        for (k, block) in mate.blocks.iter().enumerate() {
            let exon = match self.exon_containing(block) {
                Some(exon) => exon,
                None => return false,
            };
            if let Some(p) = prev {
                let spliced = exon == p + 1
                    && self.exons[p].end == mate.blocks[k - 1].end
                    && self.exons[exon].start == block.start;
                if !spliced {
                    return false;
                }
            }
            prev = Some(exon);
        }
        true
    }
    /// The exonic sequence in genomic orientation with `left` bases of upstream
    /// and `right` bases of downstream flank. Positions beyond the contig are `N`.
    pub fn extract_sequence(&self, contig: &[u8], left: usize, right: usize) -> Vec<u8> {
        let base_at = |pos: i64| -> u8 {
            if 0 <= pos && (pos as usize) < contig.len() {
                contig[pos as usize].to_ascii_uppercase()
            } else {
                b'N'
            }
        };
        let mut seq = Vec::with_capacity(self.exonic_length() as usize + left + right);
        let (start, end) = (self.start() as i64, self.end() as i64);
        seq.extend((start - left as i64..start).map(base_at));
        for exon in self.exons.iter() {
            seq.extend((exon.start as i64..exon.end as i64).map(base_at));
        }
        seq.extend((end..end + right as i64).map(base_at));
        seq
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match b.to_ascii_uppercase() {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            _ => b'N',
        })
        .collect()
}

/// A set of overlapping transcripts on one contig. The unit of work while building weights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Locus {
    pub seqname: String,
    pub min_start: u64,
    pub max_end: u64,
    /// Transcript indices.
    pub transcripts: Vec<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptSet {
    transcripts: Vec<Transcript>,
}

impl TranscriptSet {
    /// Index transcripts in the given order and assign tgroups by gene id.
    pub fn new(mut transcripts: Vec<Transcript>) -> Result<Self, String> {
        let mut tgroups: HashMap<String, usize> = HashMap::new();
        for (id, t) in transcripts.iter_mut().enumerate() {
            if t.exons.is_empty() {
                return Err(format!("transcript {} has no exons", t.name));
            }
            t.exons.sort();
            if t.exons.windows(2).any(|w| w[1].start < w[0].end) {
                return Err(format!("transcript {} has overlapping exons", t.name));
            }
            if t.exons.iter().any(|e| e.is_empty()) {
                return Err(format!("transcript {} has an empty exon", t.name));
            }
            t.id = id;
            let key = match t.gene_id.is_empty() {
                true => t.name.clone(),
                false => t.gene_id.clone(),
            };
            let len = tgroups.len();
            t.tgroup = *tgroups.entry(key).or_insert(len);
        }
        Ok(Self { transcripts })
    }
    pub fn len(&self) -> usize {
        self.transcripts.len()
    }
    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Transcript> {
        self.transcripts.iter()
    }
    pub fn num_tgroups(&self) -> usize {
        self.transcripts
            .iter()
            .map(|t| t.tgroup + 1)
            .max()
            .unwrap_or(0)
    }
    /// Group transcripts into loci: maximal runs of transcripts on the same contig
    /// whose genomic spans overlap.
    pub fn loci(&self) -> Vec<Locus> {
        let mut order: Vec<usize> = (0..self.transcripts.len()).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (&self.transcripts[a], &self.transcripts[b]);
            (&a.seqname, a.start(), a.end()).cmp(&(&b.seqname, b.start(), b.end()))
        });
        let mut loci: Vec<Locus> = vec![];
        for idx in order {
            let t = &self.transcripts[idx];
            match loci.last_mut() {
                Some(locus) if locus.seqname == t.seqname && t.start() < locus.max_end => {
                    locus.max_end = locus.max_end.max(t.end());
                    locus.transcripts.push(idx);
                }
                _ => loci.push(Locus {
                    seqname: t.seqname.clone(),
                    min_start: t.start(),
                    max_end: t.end(),
                    transcripts: vec![idx],
                }),
            }
        }
        loci
    }
}

impl std::ops::Index<usize> for TranscriptSet {
    type Output = Transcript;
    fn index(&self, idx: usize) -> &Transcript {
        &self.transcripts[idx]
    }
}

/// One aligned mate. Blocks are gapless aligned segments, split at introns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mate {
    pub strand: Strand,
    pub blocks: Vec<Interval>,
}

impl Mate {
    pub fn start(&self) -> u64 {
        self.blocks.first().map(|b| b.start).unwrap_or(0)
    }
    pub fn end(&self) -> u64 {
        self.blocks.last().map(|b| b.end).unwrap_or(0)
    }
    /// Genomic position of the 5' end of the mate.
    pub fn five_prime(&self) -> u64 {
        match self.strand {
            Strand::Forward => self.start(),
            Strand::Reverse => self.end().saturating_sub(1),
        }
    }
}

/// The placement of a read pair, without the read name. Identical pairs are
/// collapsed into one fragment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlignmentPair {
    #[serde(default)]
    pub mate1: Option<Mate>,
    #[serde(default)]
    pub mate2: Option<Mate>,
}

impl AlignmentPair {
    pub fn is_unmapped(&self) -> bool {
        self.mates().all(|m| m.blocks.is_empty())
    }
    pub fn mates(&self) -> impl Iterator<Item = &Mate> {
        self.mate1.iter().chain(self.mate2.iter())
    }
    pub fn start(&self) -> u64 {
        self.mates().map(|m| m.start()).min().unwrap_or(0)
    }
    pub fn end(&self) -> u64 {
        self.mates().map(|m| m.end()).max().unwrap_or(0)
    }
    /// Fragment length on the transcript.
    /// None if the pair is incompatible with `t`, Some(0) if only one mate is aligned
    /// and the length is therefore unknown.
    pub fn frag_len(&self, t: &Transcript) -> Option<u64> {
        match (&self.mate1, &self.mate2) {
            (None, None) => None,
            (Some(m), None) | (None, Some(m)) => t.is_compatible(m).then_some(0),
            (Some(m1), Some(m2)) => {
                if !t.is_compatible(m1) || !t.is_compatible(m2) {
                    return None;
                }
                let start = t.offset(self.start())?;
                let end = t.offset(self.end().checked_sub(1)?)?;
                Some(end + 1 - start)
            }
        }
    }
}

/// One alignment record of a read. A read with more than one record is a multiread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alignment {
    pub read: String,
    pub seqname: String,
    #[serde(flatten)]
    pub pair: AlignmentPair,
}

/// The first line of an alignment stream: the contig order the stream is sorted by.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlignmentHeader {
    pub contigs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    fn two_exon(strand: Strand) -> Transcript {
        Transcript {
            id: 0,
            name: "tx".to_string(),
            gene_id: "g".to_string(),
            seqname: "chr1".to_string(),
            strand,
            exons: vec![Interval::new(100, 200), Interval::new(300, 400)],
            tgroup: 0,
        }
    }
    fn mate(strand: Strand, blocks: &[(u64, u64)]) -> Mate {
        let blocks = blocks.iter().map(|&(s, e)| Interval::new(s, e)).collect();
        Mate { strand, blocks }
    }
    #[test]
    fn offsets() {
        let t = two_exon(Strand::Forward);
        assert_eq!(t.exonic_length(), 200);
        assert_eq!(t.offset(100), Some(0));
        assert_eq!(t.offset(199), Some(99));
        assert_eq!(t.offset(250), None);
        assert_eq!(t.offset(300), Some(100));
        assert_eq!(t.offset(400), None);
    }
    #[test]
    fn compatibility() {
        let t = two_exon(Strand::Forward);
        assert!(t.is_compatible(&mate(Strand::Forward, &[(120, 170)])));
        assert!(t.is_compatible(&mate(Strand::Forward, &[(170, 200), (300, 320)])));
        // Junction does not match the intron.
        assert!(!t.is_compatible(&mate(Strand::Forward, &[(170, 199), (300, 321)])));
        // Reads into the intron.
        assert!(!t.is_compatible(&mate(Strand::Forward, &[(180, 220)])));
        assert!(!t.is_compatible(&mate(Strand::Forward, &[])));
    }
    #[test]
    fn fragment_length() {
        let t = two_exon(Strand::Forward);
        let pair = AlignmentPair {
            mate1: Some(mate(Strand::Forward, &[(150, 180)])),
            mate2: Some(mate(Strand::Reverse, &[(320, 350)])),
        };
        // 150..200 is 50 bases, 300..350 is 50 bases.
        assert_eq!(pair.frag_len(&t), Some(100));
        let single = AlignmentPair {
            mate1: Some(mate(Strand::Forward, &[(150, 180)])),
            mate2: None,
        };
        assert_eq!(single.frag_len(&t), Some(0));
        let off = AlignmentPair {
            mate1: Some(mate(Strand::Forward, &[(210, 240)])),
            mate2: None,
        };
        assert_eq!(off.frag_len(&t), None);
    }
    #[test]
    fn five_prime_end() {
        assert_eq!(mate(Strand::Forward, &[(10, 20)]).five_prime(), 10);
        assert_eq!(mate(Strand::Reverse, &[(10, 20), (30, 40)]).five_prime(), 39);
    }
    #[test]
    fn loci_merge_overlaps() {
        let mut a = two_exon(Strand::Forward);
        a.name = "a".to_string();
        let mut b = two_exon(Strand::Reverse);
        b.name = "b".to_string();
        b.exons = vec![Interval::new(350, 500)];
        let mut c = two_exon(Strand::Forward);
        c.name = "c".to_string();
        c.exons = vec![Interval::new(600, 700)];
        let mut d = two_exon(Strand::Forward);
        d.name = "d".to_string();
        d.seqname = "chr2".to_string();
        let ts = TranscriptSet::new(vec![c, a, d, b]).unwrap();
        let loci = ts.loci();
        assert_eq!(loci.len(), 3);
        assert_eq!(loci[0].transcripts, vec![1, 3]);
        assert_eq!((loci[0].min_start, loci[0].max_end), (100, 500));
        assert_eq!(loci[1].transcripts, vec![0]);
        assert_eq!(loci[2].seqname, "chr2");
    }
    #[test]
    fn tgroups_follow_gene_ids() {
        let mut a = two_exon(Strand::Forward);
        a.gene_id = "g1".to_string();
        let mut b = a.clone();
        b.name = "b".to_string();
        let mut c = a.clone();
        c.gene_id = "g2".to_string();
        let ts = TranscriptSet::new(vec![a, b, c]).unwrap();
        let groups: Vec<_> = ts.iter().map(|t| t.tgroup).collect();
        assert_eq!(groups, vec![0, 0, 1]);
        assert_eq!(ts.num_tgroups(), 2);
    }
    #[test]
    fn reject_bad_exons() {
        let mut t = two_exon(Strand::Forward);
        t.exons = vec![Interval::new(100, 200), Interval::new(150, 250)];
        assert!(TranscriptSet::new(vec![t]).is_err());
    }
    #[test]
    fn sequence_extraction() {
        let contig = b"aaccggttAACCGGTT";
        let t = Transcript {
            exons: vec![Interval::new(2, 4), Interval::new(6, 8)],
            ..two_exon(Strand::Forward)
        };
        assert_eq!(t.extract_sequence(contig, 1, 2), b"ACCTTAA".to_vec());
        assert_eq!(t.extract_sequence(contig, 3, 0), b"NAACCTT".to_vec());
        assert_eq!(reverse_complement(b"ACGTN"), b"NACGT".to_vec());
    }
    #[test]
    fn alignment_json() {
        let line = r#"{"read":"r1","seqname":"chr1","mate1":{"strand":"Forward","blocks":[{"start":5,"end":10}]}}"#;
        let aln: Alignment = serde_json::from_str(line).unwrap();
        assert_eq!(aln.pair.mate2, None);
        assert_eq!(aln.pair.start(), 5);
        assert_eq!(aln.pair.end(), 10);
    }
}
