//! Pipeline -- the whole quantification run.
//!
//! Load the annotation and alignments, build fragment weights, sample, and
//! write per-transcript posterior summaries as TSV.
use crate::input::{load_frag_len_hist, load_reference, load_transcripts, AlignmentFile};
use definitions::TranscriptSet;
use mixquant::*;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// The configuration of a run.
/// Everything a user can set. Other parameters are fixed in the library.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct PipelineConfig {
    /// JSON array of transcripts.
    pub transcripts: PathBuf,
    /// JSON lines, header first.
    pub alignments: PathBuf,
    pub reference: Option<PathBuf>,
    pub bias: Option<PathBuf>,
    /// If given, replaces the Gaussian fragment length model.
    pub frag_len_hist: Option<PathBuf>,
    pub frag_len_mean: f64,
    pub frag_len_sd: f64,
    pub strand_specificity: f32,
    pub max_alignments: usize,
    pub threads: usize,
    pub seed: u64,
    pub prior_precision: f64,
    pub burn_in: usize,
    pub num_samples: usize,
    /// Mass of the credible interval.
    pub interval: f64,
    /// STDOUT if None.
    pub output: Option<PathBuf>,
    pub verbose: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transcripts: PathBuf::new(),
            alignments: PathBuf::new(),
            reference: None,
            bias: None,
            frag_len_hist: None,
            frag_len_mean: 200f64,
            frag_len_sd: 20f64,
            strand_specificity: 0.5,
            max_alignments: reads::MAX_ALIGNMENTS,
            threads: 1,
            seed: 42,
            prior_precision: 0.1,
            burn_in: 250,
            num_samples: 250,
            interval: 0.95,
            output: None,
            verbose: 0,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(profile: &str) -> Result<Self> {
        toml::from_str(profile).map_err(|why| QuantError::Config(why.to_string()))
    }
    /// Build the configuration from the arguments of `quantify`.
    pub fn from_matches(matches: &clap::ArgMatches) -> Result<Self> {
        fn parse<T: std::str::FromStr>(matches: &clap::ArgMatches, id: &str) -> Result<T> {
            let value = matches
                .get_one::<String>(id)
                .ok_or_else(|| QuantError::Config(format!("--{} is missing", id)))?;
            value
                .parse()
                .map_err(|_| QuantError::Config(format!("--{}: invalid value {}", id, value)))
        }
        let path = |id: &str| matches.get_one::<String>(id).map(PathBuf::from);
        Ok(Self {
            transcripts: parse(matches, "transcripts")?,
            alignments: parse(matches, "alignments")?,
            reference: path("reference"),
            bias: path("bias"),
            frag_len_hist: path("frag_len_hist"),
            frag_len_mean: parse(matches, "frag_len_mean")?,
            frag_len_sd: parse(matches, "frag_len_sd")?,
            strand_specificity: parse(matches, "strand_specificity")?,
            max_alignments: parse(matches, "max_alignments")?,
            threads: parse(matches, "threads")?,
            seed: parse(matches, "seed")?,
            prior_precision: parse(matches, "prior_precision")?,
            burn_in: parse(matches, "burn_in")?,
            num_samples: parse(matches, "num_samples")?,
            interval: parse(matches, "interval")?,
            output: path("output"),
            verbose: matches.get_count("verbose") as usize,
        })
    }
    fn fragment_model(&self) -> Result<Box<dyn FragmentModel>> {
        let bias = self.bias.as_ref().map(PositionalBias::load).transpose()?;
        let model: Box<dyn FragmentModel> = match &self.frag_len_hist {
            Some(path) => {
                let hist = load_frag_len_hist(path)?;
                let model = EmpiricalFragmentModel::from_counts(&hist, self.strand_specificity)?;
                match bias {
                    Some(bias) => Box::new(model.with_bias(bias)),
                    None => Box::new(model),
                }
            }
            None => {
                let (mean, sd, ss) = (self.frag_len_mean, self.frag_len_sd, self.strand_specificity);
                let model = GaussianFragmentModel::new(mean, sd, ss)?;
                match bias {
                    Some(bias) => Box::new(model.with_bias(bias)),
                    None => Box::new(model),
                }
            }
        };
        Ok(model)
    }
}

pub fn run_pipeline(config: &PipelineConfig) -> Result<()> {
    let PipelineConfig {
        transcripts,
        alignments,
        reference,
        max_alignments,
        threads,
        seed,
        prior_precision,
        burn_in,
        num_samples,
        interval,
        output,
        verbose,
        ..
    } = config.clone();
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // The logger may already be set by an embedding program.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).try_init();
    if !(0f64 < interval && interval < 1f64) {
        return Err(QuantError::Config(format!("interval {} is not in (0, 1)", interval)));
    }
    let model = config.fragment_model()?;
    let transcripts = load_transcripts(&transcripts)?;
    let alignments = AlignmentFile::new(alignments);
    let header = alignments.header()?;
    debug!("START\tReadClasses");
    let reads = ReadClasses::from_names(alignments.read_names()?, max_alignments);
    let reference = reference.as_deref().map(load_reference).transpose()?;
    let pool = WorkerPool::new(threads)?;
    debug!("START\tWeights");
    let mut builder = WeightBuilder::new(&transcripts, model.as_ref(), &reads);
    if let Some(reference) = reference.as_ref() {
        builder = builder.with_reference(reference);
    }
    let weights = builder.build(&pool, &header, alignments.alignments()?)?;
    debug!("START\tSampling");
    let mut sampler = Sampler::new(weights, SamplerConfig::new(seed, prior_precision))?;
    let mut summary = PosteriorSummary::new(transcripts.len());
    sampler.run(&pool, burn_in, num_samples, |_, s| summary.push(&s.abundance()))?;
    let estimates = summary.summarize(interval);
    match output {
        Some(path) => {
            let file = std::fs::File::create(&path).map_err(|e| QuantError::io(e, &path))?;
            let mut wtr = BufWriter::new(file);
            write_estimates(&mut wtr, &transcripts, &sampler, &estimates)
                .and_then(|_| wtr.flush())
                .map_err(|e| QuantError::io(e, &path))
        }
        None => {
            let stdout = std::io::stdout();
            let mut wtr = BufWriter::new(stdout.lock());
            write_estimates(&mut wtr, &transcripts, &sampler, &estimates)?;
            Ok(wtr.flush()?)
        }
    }
}

/// One line per transcript, in transcript order.
pub fn write_estimates<W: Write>(
    wtr: &mut W,
    transcripts: &TranscriptSet,
    sampler: &Sampler,
    estimates: &[Estimate],
) -> std::io::Result<()> {
    writeln!(wtr, "transcript\tgene\ttgroup\tcomponent\tweight\tmean\tlower\tupper")?;
    let components = sampler.transcript_component();
    let weights = sampler.transcript_weights();
    for (t, est) in transcripts.iter().zip(estimates.iter()) {
        writeln!(
            wtr,
            "{}\t{}\t{}\t{}\t{:.2}\t{:.6e}\t{:.6e}\t{:.6e}",
            t.name,
            t.gene_id,
            t.tgroup,
            components[t.id],
            weights[t.id],
            est.mean,
            est.lower,
            est.upper
        )?;
    }
    Ok(())
}
