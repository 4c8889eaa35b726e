use std::collections::HashMap;
use std::sync::Arc;

/// Contig name to sequence lookup.
pub trait ReferenceSequences: Send + Sync {
    fn fetch(&self, seqname: &str) -> Option<Arc<Vec<u8>>>;
}

/// In-memory reference, one entry per contig.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    contigs: HashMap<String, Arc<Vec<u8>>>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(&mut self, name: String, seq: Vec<u8>) {
        self.contigs.insert(name, Arc::new(seq));
    }
    pub fn len(&self) -> usize {
        self.contigs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }
    pub fn total_length(&self) -> usize {
        self.contigs.values().map(|s| s.len()).sum()
    }
}

impl FromIterator<(String, Vec<u8>)> for ReferenceTable {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, seq) in iter {
            table.insert(name, seq);
        }
        table
    }
}

impl ReferenceSequences for ReferenceTable {
    fn fetch(&self, seqname: &str) -> Option<Arc<Vec<u8>>> {
        self.contigs.get(seqname).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn lookup() {
        let table: ReferenceTable = vec![
            ("chr1".to_string(), b"ACGT".to_vec()),
            ("chr2".to_string(), b"GG".to_vec()),
        ]
        .into_iter()
        .collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.total_length(), 6);
        assert_eq!(table.fetch("chr2").unwrap().as_slice(), b"GG");
        assert!(table.fetch("chrM").is_none());
    }
}
