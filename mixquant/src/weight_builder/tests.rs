use super::*;
use crate::fragment_model::{GaussianFragmentModel, PositionalBias};
use crate::reference::ReferenceTable;
use definitions::{AlignmentPair, Interval, Mate, Strand, Transcript};

fn transcript(name: &str, seqname: &str, exons: &[(u64, u64)]) -> Transcript {
    Transcript {
        id: 0,
        name: name.to_string(),
        gene_id: name.to_string(),
        seqname: seqname.to_string(),
        strand: Strand::Forward,
        exons: exons.iter().map(|&(s, e)| Interval::new(s, e)).collect(),
        tgroup: 0,
    }
}

fn transcripts() -> TranscriptSet {
    TranscriptSet::new(vec![
        transcript("t0", "chr1", &[(0, 1000)]),
        transcript("t1", "chr1", &[(0, 500), (700, 1000)]),
        transcript("t2", "chr1", &[(5000, 6000)]),
        transcript("t3", "chr2", &[(0, 1000)]),
    ])
    .unwrap()
}

fn aln(read: &str, seqname: &str, start: u64, end: u64) -> Result<Alignment> {
    let mate1 = Mate {
        strand: Strand::Forward,
        blocks: vec![Interval::new(start, start + 50)],
    };
    let mate2 = Mate {
        strand: Strand::Reverse,
        blocks: vec![Interval::new(end - 50, end)],
    };
    Ok(Alignment {
        read: read.to_string(),
        seqname: seqname.to_string(),
        pair: AlignmentPair {
            mate1: Some(mate1),
            mate2: Some(mate2),
        },
    })
}

fn alignments() -> Vec<Result<Alignment>> {
    vec![
        aln("r1", "chr1", 100, 200),
        aln("r2", "chr1", 100, 200),
        aln("m1", "chr1", 100, 200),
        aln("r3", "chr1", 600, 700),
        aln("r4", "chr1", 5100, 5200),
        aln("m1", "chr2", 100, 200),
    ]
}

fn header() -> AlignmentHeader {
    AlignmentHeader {
        contigs: vec!["chr1".to_string(), "chr2".to_string()],
    }
}

fn model() -> GaussianFragmentModel {
    GaussianFragmentModel::new(100f64, 10f64, 0.5).unwrap()
}

fn read_classes(max_alignments: usize) -> ReadClasses {
    let names = ["r1", "r2", "m1", "r3", "r4", "m1"];
    ReadClasses::from_names(names.iter(), max_alignments)
}

#[test]
fn build_weights() {
    let ts = transcripts();
    let model = model();
    let reads = read_classes(200);
    let pool = WorkerPool::new(2).unwrap();
    let fw = WeightBuilder::new(&ts, &model, &reads)
        .build(&pool, &header(), alignments())
        .unwrap();
    let matrix = &fw.matrix;
    assert_eq!(matrix.ncol(), 5);
    assert_eq!(matrix.row(0).idxs(), &[0, 1, 2]);
    assert_eq!(matrix.row(1).idxs(), &[0, 2]);
    assert_eq!(matrix.row(2).idxs(), &[3]);
    assert_eq!(matrix.row(3).idxs(), &[4]);
    assert_eq!(fw.frag_counts, vec![(0, 2)]);
    assert_eq!(fw.multiread_frags, vec![(0, 2), (0, 4)]);
    // The shorter transcript has fewer placements, so each fragment weighs more.
    assert!(matrix.row(0).weights()[0] < matrix.row(1).weights()[0]);
    let expected = model.frag_len_pr(100) / 901f32;
    assert!((matrix.row(0).weights()[0] - expected).abs() / expected < 0.01);
    assert!((fw.transcript_weights[0] - 901f32).abs() < 1f32);
    assert!((fw.transcript_weights[1] - 701f32).abs() < 1f32);
}

#[test]
fn deterministic_columns() {
    let ts = transcripts();
    let model = model();
    let reads = read_classes(200);
    let single = WorkerPool::new(1).unwrap();
    let multi = WorkerPool::new(4).unwrap();
    let a = WeightBuilder::new(&ts, &model, &reads)
        .build(&single, &header(), alignments())
        .unwrap();
    let b = WeightBuilder::new(&ts, &model, &reads)
        .build(&multi, &header(), alignments())
        .unwrap();
    assert_eq!(a.matrix.rows(), b.matrix.rows());
    assert_eq!(a.multiread_frags, b.multiread_frags);
}

#[test]
fn unsorted_input_is_fatal() {
    let ts = transcripts();
    let model = model();
    let reads = read_classes(200);
    let pool = WorkerPool::new(2).unwrap();
    let mut input = alignments();
    input.swap(0, 3);
    let result = WeightBuilder::new(&ts, &model, &reads).build(&pool, &header(), input);
    assert!(matches!(result, Err(QuantError::Unsorted { .. })));
}

#[test]
fn unknown_contig_is_fatal() {
    let ts = transcripts();
    let model = model();
    let reads = read_classes(200);
    let pool = WorkerPool::new(1).unwrap();
    let mut input = alignments();
    input.push(aln("r9", "chrX", 0, 100));
    let result = WeightBuilder::new(&ts, &model, &reads).build(&pool, &header(), input);
    assert!(matches!(result, Err(QuantError::UnknownContig(_))));
}

#[test]
fn blacklisted_reads_are_skipped() {
    let ts = transcripts();
    let model = model();
    let reads = read_classes(1);
    let pool = WorkerPool::new(2).unwrap();
    let fw = WeightBuilder::new(&ts, &model, &reads)
        .build(&pool, &header(), alignments())
        .unwrap();
    assert!(fw.multiread_frags.is_empty());
    assert_eq!(fw.matrix.ncol(), 3);
    assert!(fw.matrix.row(3).is_empty());
}

fn flat_bias() -> PositionalBias {
    PositionalBias {
        left: 2,
        right: 2,
        mate1: vec![[0f32; 4]; 5],
        mate2: vec![[0f32; 4]; 5],
    }
}

#[test]
fn missing_reference_with_bias_is_fatal() {
    let ts = transcripts();
    let model = model().with_bias(flat_bias());
    let reads = read_classes(200);
    let pool = WorkerPool::new(2).unwrap();
    let reference: ReferenceTable = vec![("chr2".to_string(), vec![b'A'; 1000])].into_iter().collect();
    let result = WeightBuilder::new(&ts, &model, &reads)
        .with_reference(&reference)
        .build(&pool, &header(), alignments());
    assert!(matches!(result, Err(QuantError::MissingReference(name)) if name == "chr1"));
}

#[test]
fn flat_bias_matches_no_bias() {
    let ts = transcripts();
    let reads = read_classes(200);
    let pool = WorkerPool::new(2).unwrap();
    let plain = WeightBuilder::new(&ts, &model(), &reads)
        .build(&pool, &header(), alignments())
        .unwrap();
    let biased_model = model().with_bias(flat_bias());
    let reference: ReferenceTable = vec![
        ("chr1".to_string(), b"ACGT".repeat(2000)),
        ("chr2".to_string(), b"ACGT".repeat(300)),
    ]
    .into_iter()
    .collect();
    let biased = WeightBuilder::new(&ts, &biased_model, &reads)
        .with_reference(&reference)
        .build(&pool, &header(), alignments())
        .unwrap();
    for (a, b) in plain.matrix.iter().zip(biased.matrix.iter()) {
        assert_eq!((a.i, a.j), (b.i, b.j));
        assert!((a.w - b.w).abs() <= a.w * 1e-4);
    }
    for (a, b) in plain.transcript_weights.iter().zip(biased.transcript_weights.iter()) {
        assert!((a - b).abs() <= a * 1e-4);
    }
}

#[test]
fn bias_without_reference_is_disabled() {
    let ts = transcripts();
    let model = model().with_bias(flat_bias());
    let reads = read_classes(200);
    let pool = WorkerPool::new(1).unwrap();
    let fw = WeightBuilder::new(&ts, &model, &reads)
        .build(&pool, &header(), alignments())
        .unwrap();
    assert_eq!(fw.matrix.ncol(), 5);
}

#[test]
fn readless_contig_needs_no_reference() {
    let ts = transcripts();
    let model = model().with_bias(flat_bias());
    let input: Vec<_> = alignments()
        .into_iter()
        .filter(|a| a.as_ref().map_or(true, |a| a.seqname == "chr1"))
        .collect();
    let names = ["r1", "r2", "m1", "r3", "r4"];
    let reads = ReadClasses::from_names(names.iter(), 200);
    let pool = WorkerPool::new(2).unwrap();
    let reference: ReferenceTable = vec![("chr1".to_string(), b"ACGT".repeat(2000))].into_iter().collect();
    let fw = WeightBuilder::new(&ts, &model, &reads)
        .with_reference(&reference)
        .build(&pool, &header(), input)
        .unwrap();
    assert!(!fw.matrix.row(0).is_empty());
    assert!(fw.matrix.row(3).is_empty());
    // Without reads the chr2 transcript keeps its unbiased weight.
    assert!((fw.transcript_weights[3] - 901f32).abs() < 1f32);
}

#[test]
fn mate2_table_is_used_for_mate2() {
    let ts = transcripts();
    let reads = read_classes(200);
    let pool = WorkerPool::new(2).unwrap();
    let plain = WeightBuilder::new(&ts, &model(), &reads)
        .build(&pool, &header(), alignments())
        .unwrap();
    // Every mate2 start weighs 2, every mate1 start weighs 1.
    let bias = PositionalBias {
        left: 0,
        right: 0,
        mate1: vec![[0f32; 4]],
        mate2: vec![[2f32.ln(); 4]],
    };
    let biased_model = model().with_bias(bias);
    let reference: ReferenceTable = vec![
        ("chr1".to_string(), b"ACGT".repeat(2000)),
        ("chr2".to_string(), b"ACGT".repeat(300)),
    ]
    .into_iter()
    .collect();
    let biased = WeightBuilder::new(&ts, &biased_model, &reads)
        .with_reference(&reference)
        .build(&pool, &header(), alignments())
        .unwrap();
    // Both fragment ends appear in every placement, so transcript weights double.
    for (a, b) in plain.transcript_weights.iter().zip(biased.transcript_weights.iter()) {
        assert!((2f32 * a - b).abs() <= a * 1e-3, "{} {}", a, b);
    }
    // Each fragment carries one mate2 end, so its raw weight doubles too.
    for (a, b) in plain.matrix.iter().zip(biased.matrix.iter()) {
        assert_eq!((a.i, a.j), (b.i, b.j));
        let raw_a = a.w * plain.transcript_weights[a.i as usize];
        let raw_b = b.w * biased.transcript_weights[b.i as usize];
        assert!((2f32 * raw_a - raw_b).abs() <= raw_a * 1e-3, "{} {}", raw_a, raw_b);
    }
}
