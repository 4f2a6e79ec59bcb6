//! Sectorfall simulation harness: plays a whole game with bot participants
//! against a console platform and prints the transcript.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sectorfall_core::{
    ChoicePrompts, DeliveryError, GameConfig, GameSession, ItemCatalog, Membership,
    MessageHandle, Messenger, Participant, ParticipantId, Platform, RoleError, SessionState,
};
use tracing::{info, Level};

/// Sectorfall - headless game simulation with bot players
#[derive(Parser, Debug)]
#[command(name = "sectorfall-sim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of bot players
    #[arg(short, long, default_value = "6")]
    players: u64,

    /// Number of map sectors (overrides the config file)
    #[arg(long)]
    sectors: Option<u32>,

    /// Random seed for the game and the bots (default: random)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Game config JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Item catalog JSON file (default: medkits only)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Give up after this many ticks
    #[arg(long, default_value = "1000")]
    max_ticks: u32,

    /// Print the final session snapshot as JSON
    #[arg(long)]
    dump: bool,

    /// Engine log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// =============================================================================
// Console platform
// =============================================================================

/// Where an open prompt was posted.
#[derive(Debug, Clone, Copy)]
enum PromptOwner {
    Channel,
    Direct(ParticipantId),
}

#[derive(Debug, Default)]
struct Console {
    next_handle: u64,
    owners: BTreeMap<MessageHandle, PromptOwner>,
    open_prompts: BTreeMap<MessageHandle, (PromptOwner, usize)>,
    role: BTreeSet<ParticipantId>,
}

/// Prints every message and keeps track of open prompts for the bots.
#[derive(Debug, Clone, Default)]
struct ConsolePlatform {
    console: Arc<Mutex<Console>>,
}

impl ConsolePlatform {
    fn console(&self) -> MutexGuard<'_, Console> {
        self.console.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, owner: PromptOwner) -> MessageHandle {
        let mut console = self.console();
        console.next_handle += 1;
        let handle = MessageHandle::new(console.next_handle);
        console.owners.insert(handle, owner);
        handle
    }

    fn open_prompts(&self) -> Vec<(MessageHandle, PromptOwner, usize)> {
        self.console()
            .open_prompts
            .iter()
            .map(|(handle, (owner, options))| (*handle, *owner, *options))
            .collect()
    }
}

impl Messenger for ConsolePlatform {
    fn send_to_channel(&mut self, text: &str) -> Result<MessageHandle, DeliveryError> {
        println!("[channel] {}", text.replace('\n', "\n          "));
        Ok(self.deliver(PromptOwner::Channel))
    }

    fn send_direct(
        &mut self,
        participant: ParticipantId,
        text: &str,
    ) -> Result<MessageHandle, DeliveryError> {
        println!("[dm {participant:>3}] {}", text.replace('\n', "\n         "));
        Ok(self.deliver(PromptOwner::Direct(participant)))
    }

    fn delete_message(&mut self, handle: MessageHandle) {
        self.console().owners.remove(&handle);
    }
}

impl ChoicePrompts for ConsolePlatform {
    fn present_choices(&mut self, message: MessageHandle, option_count: usize) {
        let mut console = self.console();
        if let Some(owner) = console.owners.get(&message).copied() {
            console.open_prompts.insert(message, (owner, option_count));
        }
    }

    fn stop_choices(&mut self, message: MessageHandle) {
        self.console().open_prompts.remove(&message);
    }
}

impl Membership for ConsolePlatform {
    fn role_mention(&self) -> String {
        "@sectorfall".to_string()
    }

    fn role_members(&self) -> Vec<ParticipantId> {
        self.console().role.iter().copied().collect()
    }

    fn grant_role(&mut self, participant: ParticipantId) -> Result<(), RoleError> {
        self.console().role.insert(participant);
        Ok(())
    }

    fn revoke_role(&mut self, participant: ParticipantId) -> Result<(), RoleError> {
        self.console().role.remove(&participant);
        Ok(())
    }
}

// =============================================================================
// Game loop
// =============================================================================

fn bot(id: u64) -> Participant {
    Participant::new(id, format!("bot-{id}"))
}

fn load_config(args: &Args) -> Result<GameConfig> {
    let mut config = match &args.config {
        Some(path) => GameConfig::from_json(&read(path)?)
            .with_context(|| format!("invalid config {}", path.display()))?,
        None => GameConfig::default(),
    };
    if let Some(sectors) = args.sectors {
        config.num_sectors = sectors;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate().context("invalid game config")?;
    Ok(config)
}

fn load_catalog(path: Option<&Path>) -> Result<ItemCatalog> {
    match path {
        Some(path) => ItemCatalog::from_json(&read(path)?)
            .with_context(|| format!("invalid item catalog {}", path.display())),
        None => Ok(ItemCatalog::default()),
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Answers every open prompt at random on behalf of the bots.
fn answer_prompts(session: &mut GameSession, platform: &ConsolePlatform, bots: &mut ChaCha8Rng) {
    let players: Vec<Participant> = session
        .players()
        .filter(|p| p.is_alive())
        .map(|p| Participant::new(p.id(), p.name()))
        .collect();

    for (handle, owner, options) in platform.open_prompts() {
        if options == 0 {
            continue;
        }
        let result = match owner {
            PromptOwner::Channel => players.iter().try_for_each(|player| {
                session.handle_choice(handle, player.clone(), bots.gen_range(0..options))
            }),
            PromptOwner::Direct(id) => match players.iter().find(|p| p.id == id) {
                Some(player) => {
                    session.handle_choice(handle, player.clone(), bots.gen_range(0..options))
                }
                None => Ok(()),
            },
        };
        if let Err(err) = result {
            info!(%err, "bot choice rejected");
        }
    }
}

fn run(args: &Args) -> Result<()> {
    if args.players < 2 {
        bail!("a game needs at least 2 players, got {}", args.players);
    }

    let config = load_config(args)?;
    let catalog = load_catalog(args.catalog.as_deref())?;
    let bot_seed = config.seed.unwrap_or_else(rand::random);
    let mut bots = ChaCha8Rng::seed_from_u64(bot_seed.wrapping_add(1));

    let platform = ConsolePlatform::default();
    let mut session = GameSession::new(
        config,
        catalog,
        Platform::new(platform.clone(), platform.clone(), platform.clone()),
    )
    .context("failed to create session")?;

    for id in 1..=args.players {
        session
            .join(bot(id))
            .with_context(|| format!("bot {id} could not join"))?;
    }
    session.resume_game().context("failed to start game")?;

    let mut ticks = 0;
    while session.state() == SessionState::InProgress && ticks < args.max_ticks {
        answer_prompts(&mut session, &platform, &mut bots);
        session.tick();
        ticks += 1;
    }

    let snapshot = session.snapshot();
    println!();
    if session.state() == SessionState::Complete {
        let winner = snapshot.living().next().map(|p| p.name.as_str());
        println!(
            "Game finished after {ticks} ticks. Winner: {}",
            winner.unwrap_or("nobody")
        );
    } else {
        println!("No winner after {ticks} ticks.");
    }
    print!("{snapshot}");

    if args.dump {
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).context("failed to serialize snapshot")?
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
