pub mod modules;

pub use modules::agent::{Agent, AgentId, Cursor};
pub use modules::command::{
    Command, CommandKind, Continue, Follow, Forever, Move, MoveRandom, Progress, Repeat,
    TickContext, Until,
};
pub use modules::environment::{
    Environment, Neighborhood, ShapeDescriptor, ShapeKind, build_environment,
};
pub use modules::error::{CommandError, ConfigError, ProgramError, RegionError, ScenarioError};
pub use modules::geometry::{Point, Region, distance};
pub use modules::program::{ProgramBuilder, ProgramEvent, load_program};
pub use modules::scenario::{self, Scenario, ScenarioConfig, SpawnArea};
pub use modules::simulator::{
    Event, MAX_TICKS, RunSummary, SimulationConfig, Simulator, TickResult, TickRounding,
};
pub use modules::stats::{ExecutionStats, ExecutionStatsStore};
pub use modules::view::{AgentSnapshot, SimulationSnapshot};
