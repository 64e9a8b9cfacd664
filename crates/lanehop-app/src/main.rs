use anyhow::Result;
use clap::Parser;
use lanehop_core::{Board, BoardConfig, Direction};
use rand::{rngs::SmallRng, seq::IndexedRandom, SeedableRng};
use tracing::{info, warn};

const POLICY_MOVES: [Direction; 5] = [
    Direction::Stay,
    Direction::Left,
    Direction::Right,
    Direction::Up,
    Direction::Down,
];

/// Headless driver: runs random-policy episodes against the simulation and
/// logs per-episode summaries.
#[derive(Debug, Parser)]
#[command(name = "lanehop", about = "Headless driver for the lanehop crossing simulation")]
struct Args {
    /// Curriculum level to run (1..=17).
    #[arg(long, default_value_t = 1)]
    level: u8,

    /// Use the smaller mini board and level tables.
    #[arg(long)]
    mini: bool,

    /// RNG seed for reproducible boards and policies.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of level attempts to run.
    #[arg(long, default_value_t = 5)]
    episodes: u64,

    /// Maximum ticks per episode.
    #[arg(long, default_value_t = 400)]
    max_ticks: u64,
}

struct EpisodeSummary {
    ticks: u64,
    deaths: u64,
    won: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    info!(
        level = args.level,
        mini = args.mini,
        episodes = args.episodes,
        "starting lanehop driver"
    );

    let mut wins = 0u64;
    let mut deaths = 0u64;
    for episode in 0..args.episodes {
        let summary = run_episode(&args, episode)?;
        deaths += summary.deaths;
        if summary.won {
            wins += 1;
        }
        info!(
            episode,
            ticks = summary.ticks,
            deaths = summary.deaths,
            won = summary.won,
            "episode finished"
        );
    }

    if wins == 0 {
        warn!("the random policy never reached the finish line");
    }
    info!(wins, deaths, "run complete");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn run_episode(args: &Args, episode: u64) -> Result<EpisodeSummary> {
    let board_seed = args.seed.map(|seed| seed.wrapping_add(episode));
    let mut config = if args.mini {
        BoardConfig::mini(args.level)
    } else {
        BoardConfig {
            level: args.level,
            ..BoardConfig::default()
        }
    };
    config.rng_seed = board_seed;

    let mut board = Board::new(config)?;
    let mut policy =
        SmallRng::seed_from_u64(board_seed.unwrap_or(0x51E5_EED5).wrapping_add(episode));

    let mut deaths = 0u64;
    for tick in 1..=args.max_ticks {
        let direction = *POLICY_MOVES.choose(&mut policy).expect("move set is non-empty");
        board.move_agent(direction);

        let outcome = board.tick();
        if outcome.death {
            deaths += 1;
        }
        if outcome.win {
            return Ok(EpisodeSummary {
                ticks: tick,
                deaths,
                won: true,
            });
        }
    }

    Ok(EpisodeSummary {
        ticks: args.max_ticks,
        deaths,
        won: false,
    })
}
