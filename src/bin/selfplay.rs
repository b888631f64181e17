use anyhow::Context;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use xiangqi_zero::board::Side;
use xiangqi_zero::evaluator::{Evaluator, MaterialEvaluator, RandomEvaluator, UniformEvaluator};
use xiangqi_zero::selfplay::{game_seed, generate_games, write_shards, SelfPlayParams};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EvalKind {
    Uniform,
    Random,
    Material,
}

#[derive(Parser, Debug)]
#[command(name = "xiangqi-selfplay", about = "Generate self-play games and write shards")]
struct Args {
    /// JSON file with SelfPlayParams; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    games: Option<usize>,
    #[arg(long)]
    max_plies: Option<usize>,
    #[arg(long)]
    simulations: Option<usize>,
    #[arg(long)]
    c_puct: Option<f32>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    temperature_tau: Option<f32>,
    #[arg(long)]
    temperature_tau_final: Option<f32>,
    #[arg(long)]
    temperature_moves: Option<usize>,
    #[arg(long)]
    dirichlet_alpha: Option<f32>,
    #[arg(long)]
    dirichlet_epsilon: Option<f32>,
    /// Start with black to move
    #[arg(long, default_value_t = false)]
    black_first: bool,
    #[arg(long, value_enum, default_value_t = EvalKind::Material)]
    evaluator: EvalKind,
    /// Worker threads; 0 uses rayon's default
    #[arg(long, default_value_t = 0)]
    threads: usize,
    #[arg(long, default_value = "out/shards")]
    out: PathBuf,
    #[arg(long, default_value_t = 100_000)]
    max_records_per_shard: usize,
    /// Also write one replay JSON per game here
    #[arg(long)]
    replays: Option<PathBuf>,
}

fn load_params(a: &Args) -> anyhow::Result<SelfPlayParams> {
    let mut p = match &a.config {
        Some(path) => {
            let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parsing {}", path.display()))?
        }
        None => SelfPlayParams::default(),
    };
    if let Some(v) = a.games { p.games = v; }
    if let Some(v) = a.max_plies { p.max_plies = v; }
    if let Some(v) = a.simulations { p.simulations = v; }
    if let Some(v) = a.c_puct { p.c_puct = v; }
    if let Some(v) = a.seed { p.seed = v; }
    if let Some(v) = a.temperature_tau { p.temperature_tau = v; }
    if let Some(v) = a.temperature_tau_final { p.temperature_tau_final = v; }
    if let Some(v) = a.temperature_moves { p.temperature_moves = v; }
    if let Some(v) = a.dirichlet_alpha { p.dirichlet_alpha = v; }
    if let Some(v) = a.dirichlet_epsilon { p.dirichlet_epsilon = v; }
    if a.black_first { p.start_player = Side::Black; }
    Ok(p)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let a = Args::parse();
    let params = load_params(&a)?;
    if a.threads > 0 {
        rayon::ThreadPoolBuilder::new().num_threads(a.threads).build_global()?;
    }
    info!(
        "Generating {} games (sims={}, c_puct={}, tau={}, dir_eps={}, evaluator={:?})",
        params.games, params.simulations, params.c_puct, params.temperature_tau, params.dirichlet_epsilon, a.evaluator
    );

    let pb = ProgressBar::new(params.games as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} games ({eta})")?
            .progress_chars("#>-"),
    );
    let kind = a.evaluator;
    let seed = params.seed;
    let games = generate_games(
        &params,
        |gi| -> Box<dyn Evaluator> {
            match kind {
                EvalKind::Uniform => Box::new(UniformEvaluator),
                EvalKind::Random => Box::new(RandomEvaluator::new(game_seed(seed, gi).wrapping_add(1))),
                EvalKind::Material => Box::new(MaterialEvaluator::default()),
            }
        },
        |_| pb.inc(1),
    )?;
    pb.finish_with_message("done");

    let mut wins = [0usize; 2];
    let mut ties = 0usize;
    for g in &games {
        match g.outcome {
            xiangqi_zero::Outcome::Win(s) => wins[s.index()] += 1,
            _ => ties += 1,
        }
    }
    info!("red {} / black {} / tie {}", wins[0], wins[1], ties);

    if let Some(dir) = &a.replays {
        for (i, g) in games.iter().enumerate() {
            g.replay.save(dir.join(format!("game_{:05}.json", i)))?;
        }
        info!("Wrote {} replays to {}", games.len(), dir.display());
    }

    info!("Writing shards to {}", a.out.display());
    let shards = write_shards(&games, &a.out, a.max_records_per_shard)?;
    info!("Wrote {} shards", shards.len());
    Ok(())
}
