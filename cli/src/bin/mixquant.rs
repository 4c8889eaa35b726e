use mixquant_cli::pipeline::{run_pipeline, PipelineConfig};
#[macro_use]
extern crate log;

fn main() {
    let matches = mixquant_cli::mixquant_commands::mixquant_parser().get_matches();
    let config = match matches.subcommand() {
        Some(("pipeline", sub_m)) => {
            let path: &String = match sub_m.get_one("profile") {
                Some(path) => path,
                None => unreachable!(),
            };
            std::fs::read_to_string(path)
                .map_err(|e| mixquant::QuantError::io(e, path))
                .and_then(|profile| PipelineConfig::from_toml(&profile))
        }
        Some(("quantify", sub_m)) => PipelineConfig::from_matches(sub_m),
        _ => unreachable!(),
    };
    let config = match config {
        Ok(config) => config,
        Err(why) => {
            eprintln!("{}", why);
            eprintln!("Invalid configuration.");
            std::process::exit(1);
        }
    };
    if let Err(why) = run_pipeline(&config) {
        error!("{}", why);
        std::process::exit(1);
    }
}
