use clap::{Parser, ValueEnum};
use color_eyre::eyre::eyre;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use bn_rs::bif;
use bn_rs::engine::{BestEngine, InferenceEngine, RecursiveConditioning, SimpleConditioning, VariableElimination};
use bn_rs::network::Network;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineKind {
    Simple,
    Elimination,
    Recursive,
    Best,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Observations, as `variable=value`.
    #[arg(short, long = "evidence", value_name = "VAR=VALUE")]
    evidence: Vec<String>,

    /// Inference engine.
    #[clap(long, value_enum, default_value = "best")]
    engine: EngineKind,

    /// Load the network from an XMLBIF file instead of using the built-in sprinkler network.
    #[clap(long, value_name = "FILE")]
    bif: Option<std::path::PathBuf>,

    /// Number of samples to draw from the posterior.
    #[clap(long, value_name = "INT", default_value = "0")]
    samples: usize,

    /// Seed for sampling.
    #[clap(long, value_name = "INT", default_value = "42")]
    seed: u64,

    /// Print the network in DOT format and exit.
    #[clap(long)]
    dot: bool,
}

/// rain -> sprinkler, {sprinkler, rain} -> grass_wet
fn sprinkler() -> bn_rs::error::Result<Network> {
    let mut net = Network::new("sprinkler");
    let rain = net.add_variable("rain", ["true", "false"])?;
    let sprinkler = net.add_variable("sprinkler", ["true", "false"])?;
    let grass = net.add_variable("grass_wet", ["true", "false"])?;
    net.add_parent(sprinkler, rain)?;
    net.add_parent(grass, sprinkler)?;
    net.add_parent(grass, rain)?;
    net.set_probabilities(rain, &[0.2, 0.8])?;
    net.set_probabilities(sprinkler, &[0.01, 0.99, 0.4, 0.6])?;
    net.set_probabilities(grass, &[0.99, 0.01, 0.9, 0.1, 0.8, 0.2, 0.0, 1.0])?;
    Ok(net)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let net = match &args.bif {
        Some(path) => bif::read_file(path)?,
        None => sprinkler()?,
    };
    println!("Network `{}` with {} variables", net.name(), net.len());
    for (var, problems) in net.problems() {
        println!("warning: {} is invalid: {}", net.variable(var).name(), problems.join("; "));
    }

    if args.dot {
        print!("{}", net.to_dot()?);
        return Ok(());
    }

    let mut engine: Box<dyn InferenceEngine + '_> = match args.engine {
        EngineKind::Simple => Box::new(SimpleConditioning::new(&net)),
        EngineKind::Elimination => Box::new(VariableElimination::new(&net)),
        EngineKind::Recursive => Box::new(RecursiveConditioning::new(&net)),
        EngineKind::Best => Box::new(BestEngine::new(&net)),
    };

    for pair in &args.evidence {
        let (name, label) = pair
            .split_once('=')
            .ok_or_else(|| eyre!("evidence must look like `variable=value`, got `{}`", pair))?;
        engine.set_evidence_by_name(name.trim(), label.trim())?;
    }

    let time_query = std::time::Instant::now();
    println!("Pr(e) = {:.6}", engine.evidence_probability()?);
    for var in net.variables() {
        let dist = engine.distribution(var.id())?;
        let entries: Vec<String> = var
            .domain()
            .iter()
            .zip(&dist)
            .map(|(label, p)| format!("{}={:.4}", label, p))
            .collect();
        println!("  {:<12} {}", var.name(), entries.join("  "));
    }
    println!("Queries done in {:.3} s", time_query.elapsed().as_secs_f64());

    if args.samples > 0 {
        let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
        println!("Drawing {} samples", args.samples);
        for _ in 0..args.samples {
            let sample = engine.sample(&mut rng)?;
            let labels: Vec<String> = net
                .labels(&sample)
                .into_iter()
                .map(|(name, label)| format!("{}={}", name, label))
                .collect();
            println!("  {}", labels.join(", "));
        }
    }

    println!("\nAll done in {:.3} s", time_total.elapsed().as_secs_f64());

    Ok(())
}
