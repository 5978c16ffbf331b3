use std::path::PathBuf;

use clap::Parser;
use log::info;

use nsta_rs::dot::to_dot;
use nsta_rs::network::Network;
use nsta_rs::oracle::{verifyta, Oracle, VerifytaOracle};
use nsta_rs::replay::TextPresenter;
use nsta_rs::validate::{ValidationSpec, Validator};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Network in JSON form.
    #[arg(value_name = "FILE")]
    network: PathBuf,

    /// Validation spec: a JSON object with a list of checks.
    #[arg(value_name = "FILE")]
    spec: PathBuf,

    /// Path to `verifyta`. Defaults to `$VERIFYTA` or `$UPPAAL_ROOT/bin-<OS>/verifyta`.
    #[clap(long, value_name = "PATH")]
    verifyta: Option<PathBuf>,

    /// Write the network in DOT format.
    #[clap(long, value_name = "FILE")]
    dot: Option<PathBuf>,

    /// Print witnesses of failed checks.
    #[clap(long)]
    traces: bool,

    /// Log level.
    #[clap(long, value_name = "LEVEL", default_value = "info")]
    log_level: simplelog::LevelFilter,
}

fn run(oracle: &mut dyn Oracle, network: &Network, spec: &ValidationSpec, traces: bool) -> color_eyre::Result<usize> {
    let results = Validator::new(oracle).run(network, spec)?;

    let mut failed = 0;
    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(result) => {
                println!("#{} {}", i, result);
                if !result.satisfied {
                    failed += 1;
                    if traces {
                        if let Some(replay) = &result.replay {
                            let mut presenter = TextPresenter::default();
                            replay.present(&mut presenter);
                            println!("{}", presenter.output);
                        }
                    }
                }
            }
            Err(e) => {
                println!("#{} [skipped] {}", i, e);
            }
        }
    }
    Ok(failed)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    simplelog::TermLogger::init(
        args.log_level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let network: Network = serde_json::from_str(&std::fs::read_to_string(&args.network)?)?;
    let spec = ValidationSpec::from_json(&std::fs::read_to_string(&args.spec)?)?;
    info!(
        "Loaded {} templates and {} checks",
        network.template_count(),
        spec.checks.len()
    );

    if let Some(path) = &args.dot {
        std::fs::write(path, to_dot(&network)?)?;
        info!("Network written to {}", path.display());
    }

    let failed = match &args.verifyta {
        Some(path) => run(&mut VerifytaOracle::new(path), &network, &spec, args.traces)?,
        None => {
            let mut oracle = verifyta::shared()?
                .lock()
                .map_err(|_| color_eyre::eyre::eyre!("oracle lock poisoned"))?;
            run(&mut *oracle, &network, &spec, args.traces)?
        }
    };

    println!("{} of {} checks failed", failed, spec.checks.len());
    println!("Done in {:.3} s", time_total.elapsed().as_secs_f64());
    Ok(())
}
