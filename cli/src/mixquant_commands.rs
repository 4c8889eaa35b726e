use clap::{Arg, ArgAction, Command};

fn verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .action(ArgAction::Count)
        .help("Debug mode")
}

fn subcommand_quantify() -> Command {
    Command::new("quantify")
        .version("0.1")
        .about("Sample transcript abundances from sorted alignments.")
        .arg(verbose())
        .arg(
            Arg::new("transcripts")
                .short('x')
                .long("transcripts")
                .value_name("JSON")
                .required(true)
                .help("Transcript annotation, a JSON array of transcripts."),
        )
        .arg(
            Arg::new("alignments")
                .short('a')
                .long("alignments")
                .value_name("JSONL")
                .required(true)
                .help("Alignments, one JSON record per line after the header line."),
        )
        .arg(
            Arg::new("reference")
                .short('r')
                .long("reference")
                .value_name("FASTA")
                .help("Reference genome. Required for sequence bias correction."),
        )
        .arg(
            Arg::new("bias")
                .short('b')
                .long("bias")
                .value_name("JSON")
                .help("Positional sequence bias table."),
        )
        .arg(
            Arg::new("frag_len_hist")
                .long("frag_len_hist")
                .value_name("TSV")
                .help("Fragment length histogram (length, count). Overrides mean and sd."),
        )
        .arg(
            Arg::new("frag_len_mean")
                .long("frag_len_mean")
                .default_value("200")
                .help("Mean fragment length"),
        )
        .arg(
            Arg::new("frag_len_sd")
                .long("frag_len_sd")
                .default_value("20")
                .help("Standard deviation of the fragment length"),
        )
        .arg(
            Arg::new("strand_specificity")
                .long("strand_specificity")
                .default_value("0.5")
                .help("Probability that mate1 comes from the transcript strand."),
        )
        .arg(
            Arg::new("max_alignments")
                .long("max_alignments")
                .default_value("200")
                .help("Reads with more alignments are ignored."),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .default_value("1")
                .help("number of threads"),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .default_value("42")
                .help("Seed"),
        )
        .arg(
            Arg::new("prior_precision")
                .long("prior_precision")
                .default_value("0.1")
                .help("Prior precision of each transcript mixture."),
        )
        .arg(
            Arg::new("burn_in")
                .long("burn_in")
                .default_value("250")
                .help("Rounds discarded before sampling."),
        )
        .arg(
            Arg::new("num_samples")
                .short('n')
                .long("num_samples")
                .default_value("250")
                .help("Rounds to sample."),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .default_value("0.95")
                .help("Mass of the reported credible interval."),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("PATH")
                .help("Output TSV. STDOUT if not given."),
        )
}

fn subcommand_pipeline() -> Command {
    Command::new("pipeline")
        .version("0.1")
        .about("Run quantification from a TOML profile.")
        .arg(
            Arg::new("profile")
                .short('p')
                .required(true)
                .help("TOML configuration file. See mixquant.toml at the repository root for an example."),
        )
}

pub fn mixquant_parser() -> Command {
    Command::new("mixquant")
        .version("0.1")
        .about("MCMC transcript abundance sampler")
        .arg_required_else_help(true)
        .subcommand(subcommand_quantify())
        .subcommand(subcommand_pipeline())
}
