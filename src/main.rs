use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use haversine::cli::{Cli, Command, Distribution};
use haversine::{generate, global, haversine as formula, pairs, profile_block, ProfilerConfig};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Environment settings overridden by command line flags
fn profiler_config(args: &Cli) -> ProfilerConfig {
    let mut config = ProfilerConfig::from_env();
    config.enabled |= args.profile;
    config.format = args.format;
    if let Some(ms) = args.calibration_ms {
        config.calibration_wait_ms = ms;
    }
    config
}

fn run_generate(distribution: Distribution, seed: u64, count: u64, out_dir: &Path) -> Result<()> {
    println!(
        "Distribution: {}",
        match distribution {
            Distribution::Uniform => "uniform",
            Distribution::Cluster => "cluster",
        }
    );
    println!("Random seed: {}", seed);
    println!("Number of coordinate pairs: {}", count);

    let generated = {
        profile_block!("Generate");
        generate::generate_to(out_dir, distribution, seed, count)
            .with_context(|| format!("writing output to {}", out_dir.display()))?
    };
    tracing::debug!(
        pairs = %generated.pairs_path.display(),
        answers = %generated.answer_path.display(),
        "wrote data files"
    );

    println!("Expected sum: {}", generated.expected_mean);
    Ok(())
}

fn run_process(input: &Path, answers: Option<&Path>) -> Result<()> {
    let json = {
        profile_block!("Haversine Pairs File Read");
        fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?
    };

    let pairs = {
        profile_block!("Parse Pairs");
        pairs::parse_pairs(&json).with_context(|| format!("parsing {}", input.display()))?
    };

    let sum = formula::mean_distance(&pairs);

    println!("Input size: {}", json.len());
    println!("Pair count: {}", pairs.len());
    println!("Haversine sum: {}", sum);

    if let Some(answers) = answers {
        profile_block!("Haversine Answer File Read");
        let reference = pairs::read_answer(answers)
            .with_context(|| format!("reading {}", answers.display()))?;
        println!("Reference sum: {}", reference);
        println!("Difference: {}", reference - sum);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    global::init(profiler_config(&args));

    match &args.command {
        Command::Generate {
            distribution,
            seed,
            count,
            out_dir,
        } => run_generate(*distribution, *seed, *count, out_dir)?,
        Command::Process { input, answers } => run_process(input, answers.as_deref())?,
    }

    global::print_report()?;
    Ok(())
}
