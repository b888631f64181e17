use clap::Parser;
use rayon::prelude::*;
use std::time::Instant;
use xiangqi_zero::board::{Board, RulesConfig, Side};
use xiangqi_zero::perft::{perft, perft_divide};

#[derive(Parser, Debug)]
#[command(name = "perft", about = "Perft driver for the Xiangqi move generator")]
struct Args {
    /// Search depth
    #[arg(value_name = "DEPTH")]
    depth: u32,
    /// Start with black to move
    #[arg(long, default_value_t = false)]
    black_first: bool,
    /// Reject moves that leave the mover's general attacked
    #[arg(long, default_value_t = false)]
    forbid_self_check: bool,
    /// Number of threads for root-split
    #[arg(long, default_value_t = 1)]
    threads: usize,
    /// Print node counts per root move
    #[arg(long, default_value_t = false)]
    divide: bool,
    /// Report elapsed time and NPS
    #[arg(long, default_value_t = false)]
    nps: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let side = if args.black_first { Side::Black } else { Side::Red };
    let rules = RulesConfig { forbid_self_check: args.forbid_self_check, ..Default::default() };
    let base = Board::with_config(side, rules);
    let depth = args.depth;

    if args.divide {
        for (mv, n) in perft_divide(&base, depth) {
            println!("{mv}: {n}");
        }
    }

    let pool = rayon::ThreadPoolBuilder::new().num_threads(args.threads.max(1)).build()?;
    let (nodes, dt) = pool.install(|| {
        let t0 = Instant::now();
        let nodes = if args.threads <= 1 || depth <= 1 {
            perft(&base, depth)
        } else {
            base.legal_moves(base.side_to_move())
                .par_iter()
                .map(|&mv| {
                    let mut b = base.clone();
                    match b.apply(mv) {
                        Ok(()) => perft(&b, depth - 1),
                        Err(_) => 0,
                    }
                })
                .sum()
        };
        (nodes, t0.elapsed().as_secs_f64())
    });

    if args.nps { println!("nodes: {nodes} elapsed: {:.3}s nps: {:.1}", dt, nodes as f64 / dt.max(f64::EPSILON)); }
    else { println!("nodes: {nodes}"); }
    Ok(())
}
