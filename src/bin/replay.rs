use clap::Parser;
use std::path::PathBuf;
use xiangqi_zero::replay::Replay;

#[derive(Parser, Debug)]
#[command(name = "replay", about = "Step through a saved Xiangqi game")]
struct Args {
    /// Replay JSON file
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Only print the final position
    #[arg(long, default_value_t = false)]
    last: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let replay = Replay::load(&args.file)?;
    let boards = replay.boards()?;
    let moves = replay.moves();

    if args.last {
        if let Some(b) = boards.last() {
            println!("{b}");
        }
    } else {
        for (i, b) in boards.iter().enumerate() {
            match i.checked_sub(1).and_then(|j| moves.get(j)) {
                Some(mv) => println!("\nstep {i}: {mv}"),
                None => println!("\nstart, {:?} to move", replay.start_side()),
            }
            println!("{b}");
        }
    }
    if let Some(b) = boards.last() {
        println!("\n{} steps, outcome {:?}", moves.len(), b.outcome());
    }
    Ok(())
}
