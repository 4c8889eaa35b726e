//! Classification of reads by their number of alignments.
use std::collections::HashMap;

/// Reads with more alignments than this are ignored.
pub const MAX_ALIGNMENTS: usize = 200;

#[derive(Debug, Clone, Default)]
pub struct ReadClasses {
    /// Read name to multiread number. Numbers are dense and follow name order.
    multireads: HashMap<String, u32>,
    blacklist: HashMap<String, usize>,
    total_reads: usize,
}

impl ReadClasses {
    /// Count the alignments of every read name and classify: one alignment is a
    /// unique read, `2..=max_alignments` a multiread, more is blacklisted.
    pub fn from_names<I, S>(names: I, max_alignments: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for name in names {
            let name = name.as_ref();
            match counts.get_mut(name) {
                Some(count) => *count += 1,
                None => {
                    counts.insert(name.to_string(), 1);
                }
            }
        }
        let total_reads = counts.len();
        let mut multi: Vec<String> = vec![];
        let mut blacklist = HashMap::new();
        for (name, count) in counts {
            if max_alignments < count {
                blacklist.insert(name, count);
            } else if 1 < count {
                multi.push(name);
            }
        }
        multi.sort();
        let multireads: HashMap<_, _> = multi
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, i as u32))
            .collect();
        if total_reads > 0 {
            let frac = 100f64 * multireads.len() as f64 / total_reads as f64;
            info!("READS\t{}\t{:.1}%\tMultireads", total_reads, frac);
            debug!("READS\t{}\tBlacklisted", blacklist.len());
        }
        Self {
            multireads,
            blacklist,
            total_reads,
        }
    }
    pub fn multiread(&self, name: &str) -> Option<u32> {
        self.multireads.get(name).copied()
    }
    pub fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist.contains_key(name)
    }
    pub fn num_multireads(&self) -> usize {
        self.multireads.len()
    }
    pub fn num_blacklisted(&self) -> usize {
        self.blacklist.len()
    }
    pub fn total_reads(&self) -> usize {
        self.total_reads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn classify() {
        let names = ["b", "a", "c", "b", "d", "d", "d", "c", "e"];
        let classes = ReadClasses::from_names(names.iter(), 2);
        assert_eq!(classes.total_reads(), 5);
        assert_eq!(classes.multiread("a"), None);
        assert_eq!(classes.multiread("b"), Some(0));
        assert_eq!(classes.multiread("c"), Some(1));
        assert_eq!(classes.multiread("d"), None);
        assert!(classes.is_blacklisted("d"));
        assert!(!classes.is_blacklisted("b"));
        assert_eq!(classes.num_multireads(), 2);
        assert_eq!(classes.num_blacklisted(), 1);
    }
    #[test]
    fn empty() {
        let classes = ReadClasses::default();
        assert_eq!(classes.multiread("x"), None);
        assert!(!classes.is_blacklisted("x"));
    }
}
