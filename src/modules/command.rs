use std::fmt;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::modules::agent::{Agent, AgentId};
use crate::modules::environment::Neighborhood;
use crate::modules::error::CommandError;
use crate::modules::geometry::{Point, Region};
use crate::modules::simulator::Event;

/// Outcome of dispatching a command once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// The command has nothing left to do.
    Done,
    /// The command needs further dispatches on later ticks.
    Pending,
}

impl Progress {
    pub const fn is_done(self) -> bool {
        matches!(self, Progress::Done)
    }

    const fn from_done(done: bool) -> Self {
        if done { Progress::Done } else { Progress::Pending }
    }
}

/// Everything a command may read or write besides the agent it runs on.
pub struct TickContext<'a> {
    pub dt: f64,
    pub regions: &'a [Region],
    pub neighbors: Neighborhood<'a>,
    pub rng: &'a mut dyn RngCore,
    pub events: &'a mut Vec<Event>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Move,
    MoveRandom,
    Signal,
    Unsignal,
    Stop,
    Follow,
    Continue,
    Repeat,
    Forever,
    Until,
}

impl CommandKind {
    pub const fn label(self) -> &'static str {
        match self {
            CommandKind::Move => "move",
            CommandKind::MoveRandom => "move_random",
            CommandKind::Signal => "signal",
            CommandKind::Unsignal => "unsignal",
            CommandKind::Stop => "stop",
            CommandKind::Follow => "follow",
            CommandKind::Continue => "continue",
            CommandKind::Repeat => "repeat",
            CommandKind::Forever => "forever",
            CommandKind::Until => "until",
        }
    }

    pub const fn is_composite(self) -> bool {
        matches!(
            self,
            CommandKind::Repeat | CommandKind::Forever | CommandKind::Until
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A node of an agent program.
///
/// Composite variants own their body and the progress made through it, so
/// every agent needs its own copy of the tree (`Clone` is deep).
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Move(Move),
    MoveRandom(MoveRandom),
    Signal(String),
    Unsignal(String),
    Stop,
    Follow(Follow),
    Continue(Continue),
    Repeat(Repeat),
    Forever(Forever),
    Until(Until),
}

impl Command {
    pub fn moving(dx: f64, dy: f64, speed: f64) -> Result<Self, CommandError> {
        Move::new(dx, dy, speed).map(Command::Move)
    }

    pub fn move_random(x1: f64, x2: f64, y1: f64, y2: f64, speed: f64) -> Result<Self, CommandError> {
        MoveRandom::new(x1, x2, y1, y2, speed).map(Command::MoveRandom)
    }

    pub fn signal(label: impl Into<String>) -> Self {
        Command::Signal(label.into())
    }

    pub fn unsignal(label: impl Into<String>) -> Self {
        Command::Unsignal(label.into())
    }

    pub fn stop() -> Self {
        Command::Stop
    }

    pub fn follow(label: impl Into<String>, range: f64, speed: f64) -> Result<Self, CommandError> {
        Follow::new(label, range, speed).map(Command::Follow)
    }

    pub fn continue_for(duration: f64) -> Result<Self, CommandError> {
        Continue::new(duration).map(Command::Continue)
    }

    pub fn repeat(count: u32, body: Vec<Command>) -> Self {
        Command::Repeat(Repeat::new(count, body))
    }

    pub fn forever(body: Vec<Command>) -> Self {
        Command::Forever(Forever::new(body))
    }

    pub fn until(label: impl Into<String>, body: Vec<Command>) -> Self {
        Command::Until(Until::new(label, body))
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Move(_) => CommandKind::Move,
            Command::MoveRandom(_) => CommandKind::MoveRandom,
            Command::Signal(_) => CommandKind::Signal,
            Command::Unsignal(_) => CommandKind::Unsignal,
            Command::Stop => CommandKind::Stop,
            Command::Follow(_) => CommandKind::Follow,
            Command::Continue(_) => CommandKind::Continue,
            Command::Repeat(_) => CommandKind::Repeat,
            Command::Forever(_) => CommandKind::Forever,
            Command::Until(_) => CommandKind::Until,
        }
    }

    /// Nested commands of a composite, empty for leaves.
    pub fn body(&self) -> &[Command] {
        match self {
            Command::Repeat(r) => &r.body,
            Command::Forever(f) => &f.body,
            Command::Until(u) => &u.body,
            _ => &[],
        }
    }

    /// Runs one decision step of this command for `agent`.
    ///
    /// Leaf commands other than `Continue` always report [`Progress::Done`].
    pub fn dispatch(&mut self, agent: &mut Agent, ctx: &mut TickContext<'_>) -> Progress {
        let kind = self.kind();
        // Continue reports itself only when it still has time left to run.
        if !kind.is_composite() && kind != CommandKind::Continue {
            ctx.events.push(Event::CommandExecuted {
                agent_id: agent.id(),
                command: kind,
            });
        }

        match self {
            Command::Move(cmd) => {
                cmd.execute(agent, ctx);
                Progress::Done
            }
            Command::MoveRandom(cmd) => {
                cmd.execute(agent, ctx);
                Progress::Done
            }
            Command::Signal(label) => {
                if agent.signal_label(label) {
                    ctx.events.push(Event::SignalRaised {
                        agent_id: agent.id(),
                        label: label.clone(),
                    });
                }
                Progress::Done
            }
            Command::Unsignal(label) => {
                if agent.remove_label(label) {
                    ctx.events.push(Event::SignalCleared {
                        agent_id: agent.id(),
                        label: label.clone(),
                    });
                }
                Progress::Done
            }
            Command::Stop => {
                agent.set_speed(0.0);
                ctx.events.push(Event::AgentStopped {
                    agent_id: agent.id(),
                });
                Progress::Done
            }
            Command::Follow(cmd) => {
                cmd.execute(agent, ctx);
                Progress::Done
            }
            Command::Continue(cmd) => cmd.advance(agent, ctx),
            Command::Repeat(cmd) => cmd.dispatch(agent, ctx),
            Command::Forever(cmd) => cmd.dispatch(agent, ctx),
            Command::Until(cmd) => cmd.dispatch(agent, ctx),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Move(m) => write!(f, "move ({}, {}) speed {}", m.dx, m.dy, m.speed),
            Command::MoveRandom(m) => write!(
                f,
                "move random x[{}, {}] y[{}, {}] speed {}",
                m.x1, m.x2, m.y1, m.y2, m.speed
            ),
            Command::Signal(label) => write!(f, "signal {}", label),
            Command::Unsignal(label) => write!(f, "unsignal {}", label),
            Command::Stop => write!(f, "stop"),
            Command::Follow(c) => write!(
                f,
                "follow {} within {} speed {}",
                c.label, c.range, c.speed
            ),
            Command::Continue(c) => write!(f, "continue {}s", c.duration),
            Command::Repeat(r) => write!(f, "repeat {} ({} commands)", r.count, r.body.len()),
            Command::Forever(l) => write!(f, "forever ({} commands)", l.body.len()),
            Command::Until(u) => write!(f, "until {} ({} commands)", u.label, u.body.len()),
        }
    }
}

fn check_speed(command: &'static str, speed: f64) -> Result<(), CommandError> {
    if !speed.is_finite() || speed < 0.0 {
        return Err(CommandError::InvalidSpeed { command, speed });
    }
    Ok(())
}

/// Moves the agent `distance` along `heading` and records the displacement.
fn travel(agent: &mut Agent, heading: f64, distance: f64, ctx: &mut TickContext<'_>) {
    let from = agent.position();
    let to = from.advance(heading, distance);
    agent.set_position(to, ctx.regions);
    if from != to {
        ctx.events.push(Event::AgentMoved {
            agent_id: agent.id(),
            from,
            to,
        });
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Move {
    dx: f64,
    dy: f64,
    speed: f64,
}

impl Move {
    pub fn new(dx: f64, dy: f64, speed: f64) -> Result<Self, CommandError> {
        let in_range = |v: f64| (-1.0..=1.0).contains(&v);
        if (dx == 0.0 && dy == 0.0) || !in_range(dx) || !in_range(dy) {
            return Err(CommandError::InvalidDirection { dx, dy });
        }
        check_speed("move", speed)?;
        Ok(Self { dx, dy, speed })
    }

    pub fn heading(&self) -> f64 {
        self.dy.atan2(self.dx).to_degrees()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    fn execute(&self, agent: &mut Agent, ctx: &mut TickContext<'_>) {
        let heading = self.heading();
        travel(agent, heading, self.speed * ctx.dt, ctx);
        agent.set_heading(heading);
        agent.set_speed(self.speed);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MoveRandom {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
    speed: f64,
}

impl MoveRandom {
    pub fn new(x1: f64, x2: f64, y1: f64, y2: f64, speed: f64) -> Result<Self, CommandError> {
        if ![x1, x2, y1, y2].iter().all(|v| v.is_finite()) {
            return Err(CommandError::InvalidBounds);
        }
        check_speed("move_random", speed)?;
        Ok(Self {
            x1,
            x2,
            y1,
            y2,
            speed,
        })
    }

    fn sample_target(&self, rng: &mut dyn RngCore) -> Point {
        Point {
            x: self.x1 + rng.gen_range(0.0..1.0) * (self.x2 - self.x1),
            y: self.y1 + rng.gen_range(0.0..1.0) * (self.y2 - self.y1),
        }
    }

    fn execute(&self, agent: &mut Agent, ctx: &mut TickContext<'_>) {
        let target = self.sample_target(&mut *ctx.rng);
        let heading = agent.position().bearing_to(target);
        travel(agent, heading, self.speed * ctx.dt, ctx);
        agent.set_heading(heading);
        agent.set_speed(self.speed);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Follow {
    label: String,
    range: f64,
    speed: f64,
}

impl Follow {
    pub fn new(label: impl Into<String>, range: f64, speed: f64) -> Result<Self, CommandError> {
        if !range.is_finite() || range < 0.0 {
            return Err(CommandError::InvalidRange { range });
        }
        check_speed("follow", speed)?;
        Ok(Self {
            label: label.into(),
            range,
            speed,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn execute(&self, agent: &mut Agent, ctx: &mut TickContext<'_>) {
        let origin = agent.position();
        let signaling: Vec<&Agent> = ctx
            .neighbors
            .within_range(origin, self.range)
            .filter(|other| other.is_signaling(&self.label))
            .collect();

        let target = if signaling.is_empty() {
            // Nobody to follow: wander inside a square of side 2*range.
            Point {
                x: origin.x + ctx.rng.gen_range(-1.0..=1.0) * self.range,
                y: origin.y + ctx.rng.gen_range(-1.0..=1.0) * self.range,
            }
        } else {
            let n = signaling.len() as f64;
            Point {
                x: signaling.iter().map(|a| a.position().x).sum::<f64>() / n,
                y: signaling.iter().map(|a| a.position().y).sum::<f64>() / n,
            }
        };
        let followed: Vec<AgentId> = signaling.iter().map(|a| a.id()).collect();

        let heading = origin.bearing_to(target);
        agent.set_heading(heading);
        agent.set_speed(self.speed);
        travel(agent, heading, self.speed * ctx.dt, ctx);

        ctx.events.push(Event::FollowResolved {
            agent_id: agent.id(),
            label: self.label.clone(),
            followed,
            target,
        });
    }
}

/// Straight-line motion at the current heading and speed for a fixed time.
#[derive(Clone, Debug, PartialEq)]
pub struct Continue {
    duration: f64,
    elapsed: f64,
}

impl Continue {
    pub fn new(duration: f64) -> Result<Self, CommandError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(CommandError::InvalidDuration { duration });
        }
        Ok(Self {
            duration,
            elapsed: 0.0,
        })
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Continues from an externally tracked elapsed time.
    pub(crate) fn resume_from(&mut self, elapsed: f64) {
        self.elapsed = elapsed;
    }

    fn advance(&mut self, agent: &mut Agent, ctx: &mut TickContext<'_>) -> Progress {
        if self.is_complete() {
            return Progress::Done;
        }
        ctx.events.push(Event::CommandExecuted {
            agent_id: agent.id(),
            command: CommandKind::Continue,
        });
        let step = ctx.dt.min(self.duration - self.elapsed);
        travel(agent, agent.heading(), agent.speed() * step, ctx);
        self.elapsed += step;
        trace!(
            agent = agent.id(),
            elapsed = self.elapsed,
            duration = self.duration,
            "continue advanced"
        );
        Progress::from_done(self.is_complete())
    }
}

/// Runs `body[index]` and returns the next cyclic index. Empty bodies do nothing.
fn run_body_step(
    body: &mut [Command],
    index: usize,
    agent: &mut Agent,
    ctx: &mut TickContext<'_>,
) -> usize {
    let Some(command) = body.get_mut(index) else {
        return 0;
    };
    trace!(agent = agent.id(), index, command = %command.kind(), "nested dispatch");
    command.dispatch(agent, ctx);
    (index + 1) % body.len()
}

#[derive(Clone, Debug, PartialEq)]
pub struct Repeat {
    count: u32,
    body: Vec<Command>,
    index: usize,
    iterations: u32,
}

impl Repeat {
    pub fn new(count: u32, body: Vec<Command>) -> Self {
        Self {
            count,
            body,
            index: 0,
            iterations: 0,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_complete(&self) -> bool {
        self.iterations >= self.count
    }

    fn dispatch(&mut self, agent: &mut Agent, ctx: &mut TickContext<'_>) -> Progress {
        if self.is_complete() {
            return Progress::Done;
        }
        if self.body.is_empty() {
            self.iterations = self.count;
            return Progress::Done;
        }
        self.index = run_body_step(&mut self.body, self.index, agent, ctx);
        if self.index == 0 {
            self.iterations += 1;
        }
        Progress::from_done(self.is_complete())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Forever {
    body: Vec<Command>,
    index: usize,
}

impl Forever {
    pub fn new(body: Vec<Command>) -> Self {
        Self { body, index: 0 }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn dispatch(&mut self, agent: &mut Agent, ctx: &mut TickContext<'_>) -> Progress {
        self.index = run_body_step(&mut self.body, self.index, agent, ctx);
        Progress::Pending
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Until {
    label: String,
    body: Vec<Command>,
    index: usize,
    completed: bool,
}

impl Until {
    pub fn new(label: impl Into<String>, body: Vec<Command>) -> Self {
        Self {
            label: label.into(),
            body,
            index: 0,
            completed: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    fn dispatch(&mut self, agent: &mut Agent, ctx: &mut TickContext<'_>) -> Progress {
        if self.completed {
            return Progress::Done;
        }
        self.index = run_body_step(&mut self.body, self.index, agent, ctx);
        // Membership is checked only after the body step has run.
        if agent.is_in_region(&self.label) {
            self.completed = true;
            ctx.events.push(Event::RegionReached {
                agent_id: agent.id(),
                label: self.label.clone(),
            });
        }
        Progress::from_done(self.completed)
    }
}
