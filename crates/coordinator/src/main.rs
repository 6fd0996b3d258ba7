//! Generative Town demo driver
//!
//! Seeds a handful of agents backed by the offline scripted model, walks
//! them around a small map, advances their plans each tick and lets the
//! coordinator arbitrate whoever ends up close together.

use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use coordinator::{CoordinatorConfig, InteractionCoordinator, InteractionLog};
use town_core::{Agent, LanguageModel, MindConfig, ScriptedModel};
use town_events::{AgentProfile, InteractionKind, Position, SimTime};

/// Agents used when no `--agents` file is given
const DEFAULT_AGENTS: &str = include_str!("../data/town_agents.json");

/// Side length of the square map
const MAP_SIZE: f32 = 400.0;

/// Largest per-axis step of the random walk, per tick
const MAX_STEP: f32 = 25.0;

/// Command line arguments for the demo town
#[derive(Parser, Debug)]
#[command(name = "town_sim")]
#[command(about = "Runs a small generative town against an offline model")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 48)]
    ticks: u64,

    /// Simulated minutes per tick
    #[arg(long, default_value_t = 15)]
    minutes_per_tick: u64,

    /// Hour of day 1 the simulation starts at
    #[arg(long, default_value_t = 7)]
    start_hour: u32,

    /// JSON file with agent profiles
    #[arg(long)]
    agents: Option<PathBuf>,

    /// TOML file with cognition settings
    #[arg(long)]
    mind_config: Option<PathBuf>,

    /// TOML file with coordinator settings
    #[arg(long)]
    coordinator_config: Option<PathBuf>,

    /// Write interactions as JSONL to this file
    #[arg(long)]
    log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    println!("Generative Town");
    println!("===============");
    println!("Seed: {}", args.seed);
    println!("Ticks: {} x {} min", args.ticks, args.minutes_per_tick);
    println!();

    let mind = match &args.mind_config {
        Some(path) => MindConfig::from_file(path)?,
        None => MindConfig::default(),
    };
    let coordinator_config = match &args.coordinator_config {
        Some(path) => CoordinatorConfig::from_file(path)?,
        None => CoordinatorConfig::default(),
    };
    let profiles: Vec<AgentProfile> = match &args.agents {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => serde_json::from_str(DEFAULT_AGENTS)?,
    };

    let model: Arc<dyn LanguageModel> = Arc::new(ScriptedModel::new());
    let mut town = InteractionCoordinator::new(coordinator_config, model.clone());
    if let Some(path) = &args.log {
        town = town.with_log(InteractionLog::new(path)?);
    }
    for profile in profiles {
        town.add_agent(Agent::from_profile(profile, model.clone(), &mind))
            .await;
    }
    info!(agents = town.agent_ids().len(), "town seeded");

    let mut rng = SmallRng::seed_from_u64(args.seed);
    let start = SimTime::from_day_clock(1, args.start_hour, 0);

    for tick in 0..args.ticks {
        let now = start.plus_minutes(tick * args.minutes_per_tick);
        tick_agents(&town, &mut rng, now).await?;
        run_encounters(&town, &mut rng, now).await;

        if tick % 8 == 0 {
            debug!(%now, interactions = town.recent_interactions(usize::MAX).len(), "tick");
        }
    }

    town.flush_log()?;
    print_summary(&town).await;
    Ok(())
}

/// Moves every agent and advances its plan, one task per agent.
async fn tick_agents(
    town: &InteractionCoordinator,
    rng: &mut SmallRng,
    now: SimTime,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut tasks = JoinSet::new();
    for id in town.agent_ids() {
        // Steps are drawn in ID order so runs are reproducible
        let step = (rng.gen_range(-MAX_STEP..=MAX_STEP), rng.gen_range(-MAX_STEP..=MAX_STEP));
        let handle = town.handle(&id)?;
        tasks.spawn(async move {
            let mut agent = handle.lock().await;
            let here = agent.location();
            let there = Position::new(
                (here.x + step.0).clamp(0.0, MAP_SIZE),
                (here.y + step.1).clamp(0.0, MAP_SIZE),
            );
            agent.set_location(there, now);
            let result = agent.advance_current_task(now).await.map(|action| action.clone());
            (id, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, Ok(action))) => debug!(agent = %id, status = %action.status, "advanced"),
            Ok((id, Err(err))) => warn!(agent = %id, error = %err, "could not advance plan"),
            Err(err) => error!(error = %err, "agent task failed"),
        }
    }
    Ok(())
}

/// Lets nearby pairs notice each other and interact.
async fn run_encounters(town: &InteractionCoordinator, rng: &mut SmallRng, now: SimTime) {
    let snapshots = town.snapshots().await;
    for (i, a) in snapshots.iter().enumerate() {
        for b in &snapshots[i + 1..] {
            if !town.can_interact(&a.location, &b.location) {
                continue;
            }
            let (initiator, target) = if rng.gen_bool(0.5) { (a, b) } else { (b, a) };

            if let Ok(handle) = town.handle(&initiator.agent_id) {
                let mut agent = handle.lock().await;
                if agent.can_see(&target.location) {
                    let seen = format!("{} is {}", target.name, target.action.status);
                    if let Err(err) = agent
                        .observe_about(&seen, target.agent_id.clone(), now)
                        .await
                    {
                        warn!(agent = %initiator.agent_id, error = %err, "observation lost");
                    }
                }
            }

            let kind = match rng.gen_range(0..3) {
                0 => InteractionKind::Conversation,
                1 => InteractionKind::Observation,
                _ => InteractionKind::Rumor,
            };
            if let Some(interaction) = town
                .create_interaction(&initiator.agent_id, &target.agent_id, kind, now)
                .await
            {
                debug!(id = %interaction.id, content = %interaction.content, "encounter");
            }
        }
    }
}

async fn print_summary(town: &InteractionCoordinator) {
    println!();
    println!("Agents");
    println!("------");
    for snapshot in town.snapshots().await {
        println!(
            "{:<20} {} {:<40} memories: {:>4}  plan iteration: {}",
            snapshot.name,
            snapshot.action.marker,
            snapshot.action.status,
            snapshot.total_memories(),
            snapshot.latest_plan_iteration
        );
    }

    println!();
    println!("Recent interactions");
    println!("-------------------");
    for interaction in town.recent_interactions(5) {
        println!(
            "[{}] {} {} -> {}: {}{}",
            interaction.created_at,
            interaction.kind,
            interaction.initiator,
            interaction.target,
            interaction.content,
            if interaction.degraded { " (degraded)" } else { "" }
        );
    }
}
