//! Connected components of the transcript-fragment incidence graph.
//!
//! Transcripts and fragments that never share an entry can be sampled
//! independently. After decomposition the columns of the weight matrix are
//! reordered so that every component owns one contiguous column range.
use crate::find_union::FindUnion;
use crate::weight_matrix::WeightMatrix;
use std::ops::Range;

#[derive(Debug, Clone, Default)]
pub struct Components {
    /// Transcripts grouped by component, ascending within a component.
    transcripts: Vec<u32>,
    /// Transcripts of component c are `transcripts[offsets[c]..offsets[c+1]]`.
    offsets: Vec<usize>,
    transcript_component: Vec<u32>,
    /// Position of each transcript in `transcripts`.
    transcript_slot: Vec<u32>,
    /// Columns of component c are `frag_offsets[c]..frag_offsets[c+1]`.
    frag_offsets: Vec<u32>,
}

impl Components {
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn num_transcripts(&self) -> usize {
        self.transcripts.len()
    }
    pub fn transcripts(&self, c: usize) -> &[u32] {
        &self.transcripts[self.offsets[c]..self.offsets[c + 1]]
    }
    /// Slots of component c in the flattened transcript order.
    pub fn slots(&self, c: usize) -> Range<usize> {
        self.offsets[c]..self.offsets[c + 1]
    }
    pub fn component(&self, transcript: usize) -> usize {
        self.transcript_component[transcript] as usize
    }
    pub fn transcript_component(&self) -> &[u32] {
        &self.transcript_component
    }
    pub fn slot(&self, transcript: usize) -> usize {
        self.transcript_slot[transcript] as usize
    }
    pub fn frag_range(&self, c: usize) -> Range<usize> {
        self.frag_offsets[c] as usize..self.frag_offsets[c + 1] as usize
    }
    pub fn num_frags(&self) -> usize {
        self.frag_offsets.last().map_or(0, |&x| x as usize)
    }
    /// Component owning column `j`.
    pub fn column_component(&self, j: usize) -> usize {
        self.frag_offsets.partition_point(|&start| start as usize <= j) - 1
    }
}

/// Label the components of `matrix`, reorder its columns so components are
/// contiguous, and return the components with the old-to-new column map.
pub fn decompose(matrix: &mut WeightMatrix) -> (Components, Vec<u32>) {
    let (nrow, ncol) = (matrix.nrow(), matrix.ncol());
    let mut fu = FindUnion::new(ncol + nrow);
    for entry in matrix.iter() {
        fu.unite(entry.j as usize, ncol + entry.i as usize);
    }
    let (labels, num_components) = fu.labels();
    let transcript_component: Vec<u32> = labels[ncol..].to_vec();
    let mut order: Vec<u32> = (0..nrow as u32).collect();
    order.sort_by_key(|&i| transcript_component[i as usize]);
    let mut offsets = vec![0; num_components + 1];
    for &c in transcript_component.iter() {
        offsets[c as usize + 1] += 1;
    }
    for c in 0..num_components {
        offsets[c + 1] += offsets[c];
    }
    let mut transcript_slot = vec![0; nrow];
    for (slot, &i) in order.iter().enumerate() {
        transcript_slot[i as usize] = slot as u32;
    }
    let column_component = &labels[..ncol];
    let mut columns: Vec<u32> = (0..ncol as u32).collect();
    columns.sort_by_key(|&j| column_component[j as usize]);
    let mut idxmap = vec![0; ncol];
    for (new, &old) in columns.iter().enumerate() {
        idxmap[old as usize] = new as u32;
    }
    let mut frag_offsets = vec![0u32; num_components + 1];
    for &c in column_component.iter() {
        frag_offsets[c as usize + 1] += 1;
    }
    for c in 0..num_components {
        frag_offsets[c + 1] += frag_offsets[c];
    }
    matrix.reorder_columns(&idxmap);
    debug!("COMPONENTS\t{}\t{}\t{}", num_components, nrow, ncol);
    let components = Components {
        transcripts: order,
        offsets,
        transcript_component,
        transcript_slot,
        frag_offsets,
    };
    (components, idxmap)
}
