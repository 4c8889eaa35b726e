//! Loading of the annotation, alignments, reference and fragment length histogram.
use definitions::{Alignment, AlignmentHeader, Transcript, TranscriptSet};
use mixquant::{QuantError, ReferenceTable, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| QuantError::io(e, path))
}

pub fn load_transcripts(path: &Path) -> Result<TranscriptSet> {
    debug!("Opening {:?}", path);
    let transcripts: Vec<Transcript> = serde_json::from_reader(open(path)?)?;
    let transcripts = TranscriptSet::new(transcripts).map_err(QuantError::Parse)?;
    info!("TRANSCRIPTS\t{}\t{}", transcripts.len(), transcripts.num_tgroups());
    Ok(transcripts)
}

/// Alignment file in JSON lines. The first line is the [AlignmentHeader],
/// every following non-empty line one [Alignment]. The file is read once to
/// classify reads and once more to build weights.
#[derive(Debug, Clone)]
pub struct AlignmentFile {
    path: PathBuf,
}

#[derive(Deserialize)]
struct ReadName {
    read: String,
}

impl AlignmentFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
    fn lines(&self) -> Result<Lines<BufReader<File>>> {
        Ok(open(&self.path)?.lines())
    }
    pub fn header(&self) -> Result<AlignmentHeader> {
        match self.lines()?.next() {
            Some(line) => Ok(serde_json::from_str(&line?)?),
            None => Err(QuantError::Parse(format!("{:?} is empty", self.path))),
        }
    }
    /// Read name of every record.
    pub fn read_names(&self) -> Result<Vec<String>> {
        self.lines()?
            .skip(1)
            .filter(|line| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
            .map(|line| -> Result<String> {
                let name: ReadName = serde_json::from_str(&line?)?;
                Ok(name.read)
            })
            .collect()
    }
    pub fn alignments(&self) -> Result<impl Iterator<Item = Result<Alignment>>> {
        let records = self
            .lines()?
            .skip(1)
            .filter(|line| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
            .map(|line| -> Result<Alignment> { Ok(serde_json::from_str(&line?)?) });
        Ok(records)
    }
}

pub fn load_reference(path: &Path) -> Result<ReferenceTable> {
    debug!("Opening {:?}", path);
    let reference: ReferenceTable = bio_utils::fasta::parse_into_vec_from(open(path)?)
        .map_err(|e| QuantError::io(e, path))?
        .into_iter()
        .map(|record| {
            let (id, _, seq) = record.into();
            (id, seq.into_bytes())
        })
        .collect();
    info!("REFERENCE\t{}\t{}", reference.len(), reference.total_length());
    Ok(reference)
}

/// Tab-separated `length count` lines. Lines starting with `#` are skipped.
pub fn load_frag_len_hist(path: &Path) -> Result<Vec<(u64, u64)>> {
    let mut hist = vec![];
    for line in open(path)?.lines() {
        let line = line?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace().map(|x| x.parse::<u64>());
        match (fields.next(), fields.next()) {
            (Some(Ok(len)), Some(Ok(count))) => hist.push((len, count)),
            _ => return Err(QuantError::Parse(format!("invalid histogram line: {}", line))),
        }
    }
    Ok(hist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }
    #[test]
    fn alignment_file() {
        let content = r#"{"contigs":["chr1"]}
{"read":"r1","seqname":"chr1","mate1":{"strand":"Forward","blocks":[{"start":10,"end":60}]},"mate2":null}

{"read":"r2","seqname":"chr1","mate1":null,"mate2":null}
"#;
        let tmp = write_temp(content);
        let file = AlignmentFile::new(tmp.path());
        assert_eq!(file.header().unwrap().contigs, vec!["chr1".to_string()]);
        assert_eq!(file.read_names().unwrap(), vec!["r1".to_string(), "r2".to_string()]);
        let alignments: Vec<_> = file.alignments().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(alignments.len(), 2);
        assert_eq!(alignments[0].pair.start(), 10);
        assert!(alignments[1].pair.is_unmapped());
    }
    #[test]
    fn empty_alignment_file() {
        let tmp = write_temp("");
        let file = AlignmentFile::new(tmp.path());
        assert!(matches!(file.header(), Err(QuantError::Parse(_))));
    }
    #[test]
    fn histogram() {
        let tmp = write_temp("# length\tcount\n100\t3\n150\t10\n");
        assert_eq!(load_frag_len_hist(tmp.path()).unwrap(), vec![(100, 3), (150, 10)]);
        let tmp = write_temp("100\tx\n");
        assert!(matches!(load_frag_len_hist(tmp.path()), Err(QuantError::Parse(_))));
    }
    #[test]
    fn missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = load_transcripts(&dir.path().join("transcripts.json"));
        assert!(matches!(result, Err(QuantError::Io { .. })));
    }
}
