use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use xiangqi_zero::board::{Board, Coord, Outcome, RulesConfig, Side};
use xiangqi_zero::gameplay::{GameMode, GameSession, HumanInput, Selection, SelectionEvent};
use xiangqi_zero::mcts::MctsConfig;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    /// Two humans share the terminal
    Hvh,
    /// You play red against the bot
    Hvb,
    /// Bot against bot
    Bvb,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Play Xiangqi against the MCTS bot", long_about = None)]
struct Args {
    #[arg(long, value_enum, default_value_t = Mode::Hvb)]
    mode: Mode,

    /// Side that moves first: 'r' or 'b'
    #[arg(long, default_value = "r")]
    start: String,

    /// Simulations per bot move
    #[arg(long, default_value_t = 100)]
    simulations: usize,

    #[arg(long, default_value_t = 5.0)]
    c_puct: f32,

    /// Reject moves that leave the mover's general attacked
    #[arg(long)]
    forbid_self_check: bool,

    /// Directory for the replay of the finished game
    #[arg(long, default_value = "replays")]
    replay_dir: PathBuf,

    /// Log bot search statistics and every simulation batch
    #[arg(long)]
    verbose: bool,
}

fn parse_side(s: &str) -> Result<Side> {
    match s.to_lowercase().as_str() {
        "r" | "red" => Ok(Side::Red),
        "b" | "black" => Ok(Side::Black),
        _ => anyhow::bail!("Invalid side: use 'r' or 'b'"),
    }
}

fn parse_coord(line: &str) -> Option<Coord> {
    let mut it = line.split(|c: char| c == ',' || c.is_whitespace()).filter(|t| !t.is_empty());
    let row = it.next()?.parse().ok()?;
    let col = it.next()?.parse().ok()?;
    let c = Coord::new(row, col);
    c.is_valid().then_some(c)
}

// Reads "row col" clicks from stdin and forwards completed moves to the
// human whose turn it is. "q" ends the session.
fn read_input(shared: Arc<Mutex<Board>>, inputs: [Option<HumanInput>; 2], stop: Arc<AtomicBool>) {
    let mut selection = Selection::new();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line == "q" || line == "quit" {
            break;
        }
        let Ok(board) = shared.lock().map(|b| b.clone()) else { break };
        let Some(coord) = parse_coord(line) else {
            println!("Enter a square as 'row col', or 'q' to quit");
            continue;
        };
        match selection.select_coord(&board, coord) {
            SelectionEvent::Selected(p) => {
                let dests: Vec<String> = selection.destinations(&board).iter().map(|c| c.to_string()).collect();
                println!("Selected {p}, can move to {}", dests.join(" "));
            }
            SelectionEvent::Moved(mv) => {
                let side = board.side_to_move();
                match &inputs[side.index()] {
                    Some(input) if input.submit(mv) => {}
                    Some(_) => println!("A move is already pending"),
                    None => println!("It is not your turn"),
                }
            }
            SelectionEvent::Ignored => println!("Ignored {coord}"),
        }
    }
    stop.store(true, Ordering::Relaxed);
    // dropping the inputs releases a human agent blocked on its turn
    drop(inputs);
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let start = parse_side(&args.start)?;
    let mode = match args.mode {
        Mode::Hvh => GameMode::HumanVsHuman,
        Mode::Hvb => GameMode::HumanVsBot,
        Mode::Bvb => GameMode::BotVsBot,
    };
    let rules = RulesConfig { forbid_self_check: args.forbid_self_check, ..Default::default() };
    let mcts = MctsConfig { c_puct: args.c_puct, simulations: args.simulations };
    let stop = Arc::new(AtomicBool::new(false));

    let (mut session, inputs) = GameSession::for_mode(mode, start, rules, mcts, stop.clone());
    let shared = Arc::new(Mutex::new(session.board().clone()));
    println!("\n{}", session.board());

    if inputs.iter().any(Option::is_some) {
        println!("Select a piece, then its destination, as 'row col'");
        io::stdout().flush()?;
        let (shared, stop) = (shared.clone(), stop.clone());
        std::thread::spawn(move || read_input(shared, inputs, stop));
    }

    let record = session.play_observed(&stop, |board, mv| {
        println!("\n{mv}\n{board}");
        if let Ok(mut b) = shared.lock() {
            *b = board.clone();
        }
    })?;

    match record.outcome {
        Outcome::Win(side) => println!("\n{side:?} wins!"),
        Outcome::Tie => println!("\nGame is a tie!"),
        Outcome::Ongoing => println!("\nGame abandoned"),
    }

    let stamp = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    let path = args.replay_dir.join(format!("{stamp}.json"));
    record.replay.save(&path)?;
    println!("Replay saved to {}", path.display());
    Ok(())
}
