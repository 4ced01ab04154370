use std::ops::ControlFlow;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use swarmsim::{Environment, ExecutionStatsStore, Scenario, SimulationSnapshot, TickResult};

mod scenario;

use scenario::{ScenarioCommand, run_scenario};

#[derive(Parser)]
#[command(
    name = "swarmsim",
    version,
    about = "Swarm robot command engine and discrete-time simulator",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a scenario file for its configured duration
    Run {
        /// Scenario JSON (see `swarmsim scenario template`)
        scenario: PathBuf,
        /// Seconds per tick (overrides the scenario)
        #[arg(long)]
        dt: Option<f64>,
        /// Total simulated seconds (overrides the scenario)
        #[arg(short = 't', long)]
        time: Option<f64>,
        /// Number of agents to spawn (overrides the scenario)
        #[arg(short = 'n', long)]
        agents: Option<usize>,
        /// RNG seed for placement and random commands
        #[arg(long)]
        seed: Option<u64>,
        /// Wall-clock delay between ticks in milliseconds
        #[arg(short = 'd', long, default_value_t = 0)]
        delay_ms: u64,
        /// Print one JSON snapshot per tick instead of text
        #[arg(long, action = ArgAction::SetTrue, default_value_t = false)]
        json: bool,
        /// Also print every event emitted during a tick
        #[arg(long, action = ArgAction::SetTrue, default_value_t = false)]
        events: bool,
    },
    /// Scenario file helpers
    Scenario {
        #[command(subcommand)]
        command: ScenarioCommand,
    },
}

pub fn run() {
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli.command) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn dispatch(command: Command) -> Result<(), String> {
    match command {
        Command::Run {
            scenario,
            dt,
            time,
            agents,
            seed,
            delay_ms,
            json,
            events,
        } => {
            let mut loaded = swarmsim::scenario::load(&scenario).map_err(|e| e.to_string())?;
            apply_overrides(&mut loaded, dt, time, agents, seed);
            run_simulation(&loaded, delay_ms, json, events)
        }
        Command::Scenario { command } => run_scenario(command),
    }
}

fn apply_overrides(
    scenario: &mut Scenario,
    dt: Option<f64>,
    time: Option<f64>,
    agents: Option<usize>,
    seed: Option<u64>,
) {
    let config = &mut scenario.config;
    if let Some(dt) = dt {
        config.dt = dt;
    }
    if let Some(time) = time {
        config.total_time = time;
    }
    if let Some(agents) = agents {
        config.agents = agents;
    }
    if seed.is_some() {
        config.seed = seed;
    }
}

fn run_simulation(
    scenario: &Scenario,
    delay_ms: u64,
    json: bool,
    show_events: bool,
) -> Result<(), String> {
    let mut simulator = scenario.build().map_err(|e| e.to_string())?;
    let mut stats = ExecutionStatsStore::default();
    let delay = Duration::from_millis(delay_ms);

    if !json {
        println!(
            "Running {} agent(s) over {} region(s): dt={} total_time={} ticks={}",
            simulator.environment().agent_count(),
            simulator.environment().region_count(),
            simulator.config().dt,
            simulator.config().total_time,
            simulator.config().tick_count()
        );
    }

    let mut output_error = None;
    let summary = simulator.run_with(|result, environment| {
        stats.record_events(&result.events);
        if let Err(err) = print_tick(result, environment, json, show_events) {
            output_error = Some(err);
            return ControlFlow::Break(());
        }
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        ControlFlow::Continue(())
    });
    if let Some(err) = output_error {
        return Err(err);
    }

    if json {
        return Ok(());
    }
    println!(
        "Finished: ticks={} elapsed={:.3}s finished_agents={}/{}{}",
        summary.ticks,
        summary.elapsed,
        summary.finished_agents,
        simulator.environment().agent_count(),
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    print_stats(&stats);
    Ok(())
}

fn print_tick(
    result: &TickResult,
    environment: &Environment,
    json: bool,
    show_events: bool,
) -> Result<(), String> {
    if json {
        let snapshot = SimulationSnapshot {
            tick: result.tick,
            time: result.time,
            agents: environment.snapshot(),
        };
        let line = serde_json::to_string(&snapshot).map_err(|e| e.to_string())?;
        println!("{}", line);
    } else {
        println!("-- tick {} (t={:.3}s)", result.tick, result.time);
        for agent in environment.snapshot() {
            println!("  {}", agent);
        }
    }

    if show_events {
        for event in &result.events {
            let line = serde_json::to_string(event).map_err(|e| e.to_string())?;
            println!("{}", line);
        }
    }
    Ok(())
}

fn print_stats(stats: &ExecutionStatsStore) {
    if stats.per_agent.is_empty() {
        println!("No commands executed.");
        return;
    }
    println!("Executed commands per agent:");
    for (agent_id, s) in &stats.per_agent {
        println!(
            "  agent {}: total={} move={} move_random={} signal={} unsignal={} stop={} follow={} continue={}",
            agent_id,
            s.total(),
            s.move_count,
            s.move_random_count,
            s.signal_count,
            s.unsignal_count,
            s.stop_count,
            s.follow_count,
            s.continue_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "swarmsim", "run", "demo.json", "--dt", "0.5", "-t", "3", "-n", "4", "--seed", "9",
            "--json",
        ])
        .unwrap();
        let Command::Run {
            scenario,
            dt,
            time,
            agents,
            seed,
            delay_ms,
            json,
            events,
        } = cli.command
        else {
            panic!("expected run command");
        };
        assert_eq!(scenario, PathBuf::from("demo.json"));
        assert_eq!(dt, Some(0.5));
        assert_eq!(time, Some(3.0));
        assert_eq!(agents, Some(4));
        assert_eq!(seed, Some(9));
        assert_eq!(delay_ms, 0);
        assert!(json);
        assert!(!events);
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut loaded = swarmsim::scenario::template();
        apply_overrides(&mut loaded, Some(0.25), None, Some(2), None);
        assert_eq!(loaded.config.dt, 0.25);
        assert_eq!(loaded.config.total_time, 30.0);
        assert_eq!(loaded.config.agents, 2);
        assert_eq!(loaded.config.seed, Some(42));
    }
}
