use std::ops::ControlFlow;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::modules::agent::{Agent, AgentId};
use crate::modules::command::{Command, CommandKind, Progress, TickContext};
use crate::modules::environment::Environment;
use crate::modules::error::ConfigError;
use crate::modules::geometry::Point;
use crate::modules::view::SimulationSnapshot;

/// Ratios closer than this to an integer count as that integer.
const TICK_RATIO_EPSILON: f64 = 1e-9;

/// Upper bound on the ticks a single run may schedule.
pub const MAX_TICKS: u64 = 1_000_000_000;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    TickStarted {
        tick: u64,
    },
    TickCompleted {
        tick: u64,
    },
    CommandExecuted {
        agent_id: AgentId,
        command: CommandKind,
    },
    AgentMoved {
        agent_id: AgentId,
        from: Point,
        to: Point,
    },
    AgentStopped {
        agent_id: AgentId,
    },
    SignalRaised {
        agent_id: AgentId,
        label: String,
    },
    SignalCleared {
        agent_id: AgentId,
        label: String,
    },
    FollowResolved {
        agent_id: AgentId,
        label: String,
        followed: Vec<AgentId>,
        target: Point,
    },
    RegionReached {
        agent_id: AgentId,
        label: String,
    },
    CommandCompleted {
        agent_id: AgentId,
        index: usize,
        command: CommandKind,
    },
    ProgramFinished {
        agent_id: AgentId,
    },
    AllProgramsFinished {
        tick: u64,
    },
}

/// How `total_time / dt` becomes a whole number of ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickRounding {
    #[default]
    Ceil,
    Round,
    Floor,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Simulated seconds per tick.
    pub dt: f64,
    /// Simulated seconds for a full run.
    pub total_time: f64,
    #[serde(default)]
    pub tick_rounding: TickRounding,
    /// Seed for the shared random source; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn new(dt: f64, total_time: f64) -> Self {
        Self {
            dt,
            total_time,
            tick_rounding: TickRounding::default(),
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::InvalidTimeStep(self.dt));
        }
        if !self.total_time.is_finite() || self.total_time <= 0.0 {
            return Err(ConfigError::InvalidTotalTime(self.total_time));
        }
        let ratio = self.total_time / self.dt;
        if !ratio.is_finite() || ratio > MAX_TICKS as f64 {
            return Err(ConfigError::TooManyTicks {
                ratio,
                max: MAX_TICKS,
            });
        }
        Ok(())
    }

    pub fn tick_count(&self) -> u64 {
        let ratio = self.total_time / self.dt;
        let nearest = ratio.round();
        let ticks = if (ratio - nearest).abs() < TICK_RATIO_EPSILON {
            nearest
        } else {
            match self.tick_rounding {
                TickRounding::Ceil => ratio.ceil(),
                TickRounding::Round => nearest,
                TickRounding::Floor => ratio.floor(),
            }
        };
        ticks.max(0.0) as u64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickResult {
    pub tick: u64,
    /// Simulated time at the end of the tick.
    pub time: f64,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub elapsed: f64,
    pub finished_agents: usize,
    pub cancelled: bool,
}

/// Discrete-time driver of an [`Environment`].
///
/// Each tick dispatches one top-level decision step per agent, in insertion
/// order. Agents later in the order observe positions already updated earlier
/// in the same tick.
#[derive(Debug)]
pub struct Simulator {
    environment: Environment,
    config: SimulationConfig,
    tick: u64,
    rng: StdRng,
    all_finished_reported: bool,
}

impl Simulator {
    pub fn new(environment: Environment, config: SimulationConfig) -> Result<Self, ConfigError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(environment, config, rng)
    }

    pub fn with_rng(
        environment: Environment,
        config: SimulationConfig,
        rng: StdRng,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            environment,
            config,
            tick: 0,
            rng,
            all_finished_reported: false,
        })
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn elapsed(&self) -> f64 {
        self.tick as f64 * self.config.dt
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            tick: self.tick,
            time: self.elapsed(),
            agents: self.environment.snapshot(),
        }
    }

    /// Advances every agent by one tick.
    pub fn step(&mut self) -> TickResult {
        let tick = self.tick + 1;
        let dt = self.config.dt;
        let mut events = vec![Event::TickStarted { tick }];

        for index in 0..self.environment.agent_count() {
            let Some((agent, neighbors, regions)) = self.environment.dispatch_view(index) else {
                continue;
            };
            if agent.is_finished() {
                continue;
            }

            let mut program = agent.take_program();
            let program_index = agent.cursor.program_index;
            let command = &mut program[program_index];
            let kind = command.kind();
            debug!(tick, agent = agent.id(), program_index, command = %kind, "dispatch");

            let progress = {
                let mut ctx = TickContext {
                    dt,
                    regions,
                    neighbors,
                    rng: &mut self.rng,
                    events: &mut events,
                };
                dispatch_top_level(command, agent, &mut ctx)
            };
            agent.restore_program(program);

            if progress.is_done() {
                agent.cursor.program_index += 1;
                events.push(Event::CommandCompleted {
                    agent_id: agent.id(),
                    index: program_index,
                    command: kind,
                });
                if agent.is_finished() {
                    debug!(tick, agent = agent.id(), "program finished");
                    events.push(Event::ProgramFinished {
                        agent_id: agent.id(),
                    });
                }
            }
        }

        if !self.all_finished_reported
            && self.environment.agent_count() > 0
            && self.environment.all_finished()
        {
            self.all_finished_reported = true;
            info!(tick, "all agents have completed their programs");
            events.push(Event::AllProgramsFinished { tick });
        }

        events.push(Event::TickCompleted { tick });
        self.tick = tick;

        TickResult {
            tick,
            time: self.elapsed(),
            events,
        }
    }

    pub fn run(&mut self) -> RunSummary {
        self.run_with(|_, _| ControlFlow::Continue(()))
    }

    /// Runs the ticks still left in the configured duration, calling
    /// `observer` after each one.
    ///
    /// Returning `ControlFlow::Break` from the observer stops the run; state is
    /// consistent at every tick boundary.
    pub fn run_with<F>(&mut self, mut observer: F) -> RunSummary
    where
        F: FnMut(&TickResult, &Environment) -> ControlFlow<()>,
    {
        let ticks = self.config.tick_count().saturating_sub(self.tick);
        info!(
            agents = self.environment.agent_count(),
            regions = self.environment.region_count(),
            dt = self.config.dt,
            total_time = self.config.total_time,
            ticks,
            "simulation started"
        );

        let mut completed = 0;
        let mut cancelled = false;
        for _ in 0..ticks {
            let result = self.step();
            completed += 1;
            if observer(&result, &self.environment).is_break() {
                cancelled = true;
                break;
            }
        }

        let finished_agents = self
            .environment
            .agents()
            .iter()
            .filter(|a| a.is_finished())
            .count();
        info!(
            ticks = completed,
            elapsed = self.elapsed(),
            finished_agents,
            cancelled,
            "simulation finished"
        );

        RunSummary {
            ticks: completed,
            elapsed: self.elapsed(),
            finished_agents,
            cancelled,
        }
    }
}

/// Top-level dispatch. A timed command keeps its progress in the agent's
/// cursor, which is cleared once the command completes.
fn dispatch_top_level(
    command: &mut Command,
    agent: &mut Agent,
    ctx: &mut TickContext<'_>,
) -> Progress {
    if let Command::Continue(timed) = command {
        timed.resume_from(agent.cursor.timed_elapsed);
    }
    let progress = command.dispatch(agent, ctx);
    if let Command::Continue(timed) = command {
        agent.cursor.timed_elapsed = if progress.is_done() {
            0.0
        } else {
            timed.elapsed()
        };
    }
    progress
}
