use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::modules::command::Command;
use crate::modules::environment::{Environment, ShapeDescriptor, ShapeKind, build_environment};
use crate::modules::error::{ConfigError, ScenarioError};
use crate::modules::geometry::Point;
use crate::modules::program::{ProgramEvent, load_program};
use crate::modules::simulator::{SimulationConfig, Simulator, TickRounding};

fn default_dt() -> f64 {
    1.0
}

fn default_total_time() -> f64 {
    10.0
}

fn default_agents() -> usize {
    1
}

/// Rectangle `[0, width] x [0, height]` agents are dropped into.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnArea {
    pub width: f64,
    pub height: f64,
}

impl Default for SpawnArea {
    fn default() -> Self {
        Self {
            width: 50.0,
            height: 50.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_total_time")]
    pub total_time: f64,
    #[serde(default = "default_agents")]
    pub agents: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub spawn: SpawnArea,
    #[serde(default)]
    pub tick_rounding: TickRounding,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            total_time: default_total_time(),
            agents: default_agents(),
            seed: None,
            spawn: SpawnArea::default(),
            tick_rounding: TickRounding::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            dt: self.dt,
            total_time: self.total_time,
            tick_rounding: self.tick_rounding,
            seed: self.seed,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation().validate()?;
        let SpawnArea { width, height } = self.spawn;
        if !width.is_finite() || !height.is_finite() || width < 0.0 || height < 0.0 {
            return Err(ConfigError::InvalidSpawnArea { width, height });
        }
        Ok(())
    }
}

/// Everything needed to start a run: regions, the shared program and settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub shapes: Vec<ShapeDescriptor>,
    #[serde(default)]
    pub program: Vec<ProgramEvent>,
    #[serde(default)]
    pub config: ScenarioConfig,
}

impl Scenario {
    pub fn environment(&self) -> Result<Environment, ScenarioError> {
        Ok(build_environment(&self.shapes)?)
    }

    pub fn commands(&self) -> Vec<Command> {
        load_program(self.program.iter().cloned())
    }

    /// Builds the environment, places agents at random integer coordinates in
    /// the spawn area and hands each its own copy of the program.
    pub fn build(&self) -> Result<Simulator, ScenarioError> {
        self.config.validate()?;
        let mut environment = self.environment()?;
        let program = self.commands();
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let max_x = self.config.spawn.width.floor() as i64;
        let max_y = self.config.spawn.height.floor() as i64;
        for _ in 0..self.config.agents {
            let position = Point::new(
                rng.gen_range(0..=max_x) as f64,
                rng.gen_range(0..=max_y) as f64,
            );
            let id = environment.add_agent(position);
            debug!(agent = id, %position, "agent placed");
        }
        environment.assign_program_to_all(&program);

        Ok(Simulator::with_rng(
            environment,
            self.config.simulation(),
            rng,
        )?)
    }
}

pub fn parse(json: &str, origin: &str) -> Result<Scenario, ScenarioError> {
    serde_json::from_str(json).map_err(|source| ScenarioError::Json {
        path: origin.to_string(),
        source,
    })
}

pub fn load(path: &Path) -> Result<Scenario, ScenarioError> {
    let display = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: display.clone(),
        source,
    })?;
    parse(&text, &display)
}

/// A small scenario showing every command, used by `scenario template`.
pub fn template() -> Scenario {
    Scenario {
        shapes: vec![
            ShapeDescriptor {
                shape: ShapeKind::Circle,
                label: "nest".into(),
                args: vec![25.0, 25.0, 5.0],
            },
            ShapeDescriptor {
                shape: ShapeKind::Rectangle,
                label: "field".into(),
                args: vec![0.0, 0.0, 50.0, 50.0],
            },
        ],
        program: vec![
            ProgramEvent::SequenceStart,
            ProgramEvent::Signal {
                label: "swarm".into(),
            },
            ProgramEvent::UntilStart {
                label: "nest".into(),
            },
            ProgramEvent::MoveRandom {
                args: vec![20.0, 30.0, 20.0, 30.0, 1.0],
            },
            ProgramEvent::BlockEnd,
            ProgramEvent::RepeatStart { count: 3 },
            ProgramEvent::Move {
                args: vec![1.0, 0.0, 0.5],
            },
            ProgramEvent::Continue { seconds: 2.0 },
            ProgramEvent::BlockEnd,
            ProgramEvent::Unsignal {
                label: "swarm".into(),
            },
            ProgramEvent::ForeverStart,
            ProgramEvent::Follow {
                label: "swarm".into(),
                args: vec![10.0, 1.0],
            },
            ProgramEvent::Stop,
            ProgramEvent::BlockEnd,
            ProgramEvent::SequenceEnd,
        ],
        config: ScenarioConfig {
            agents: 5,
            total_time: 30.0,
            seed: Some(42),
            ..ScenarioConfig::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::command::CommandKind;
    use crate::modules::error::RegionError;

    #[test]
    fn missing_fields_take_defaults() {
        let scenario = parse("{}", "inline").unwrap();
        assert!(scenario.shapes.is_empty());
        assert_eq!(scenario.config, ScenarioConfig::default());
        assert_eq!(scenario.config.spawn.width, 50.0);
    }

    #[test]
    fn parses_full_scenario() {
        let json = r#"{
            "shapes": [
                {"shape": "circle", "label": "nest", "args": [1, 1, 2]},
                {"shape": "RECTANGLE", "label": "zone", "args": [0, 0, 4, 4]}
            ],
            "program": [
                {"op": "forever_start"},
                {"op": "move", "args": [0, 1, 1]},
                {"op": "block_end"}
            ],
            "config": {"dt": 0.5, "total_time": 2, "agents": 3, "seed": 9,
                       "spawn": {"width": 4, "height": 4}}
        }"#;
        let scenario = parse(json, "inline").unwrap();
        let mut sim = scenario.build().unwrap();

        assert_eq!(sim.environment().region_count(), 2);
        assert_eq!(sim.environment().agent_count(), 3);
        for agent in sim.environment().agents() {
            let p = agent.position();
            assert!((0.0..=4.0).contains(&p.x) && (0.0..=4.0).contains(&p.y));
            assert_eq!(p.x.fract(), 0.0);
            assert_eq!(agent.program()[0].kind(), CommandKind::Forever);
        }

        let start: Vec<_> = sim.environment().agents().iter().map(|a| a.position()).collect();
        let summary = sim.run();
        assert_eq!(summary.ticks, 4);
        for (agent, before) in sim.environment().agents().iter().zip(start) {
            assert!((agent.position().y - before.y - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn bad_shapes_and_config_are_rejected() {
        let bad_shape = r#"{"shapes": [{"shape": "circle", "label": "c", "args": [0, 0, -1]}]}"#;
        assert!(matches!(
            parse(bad_shape, "inline").unwrap().build(),
            Err(ScenarioError::Region(RegionError::InvalidRadius { .. }))
        ));

        let bad_dt = r#"{"config": {"dt": 0}}"#;
        assert!(matches!(
            parse(bad_dt, "inline").unwrap().build(),
            Err(ScenarioError::Config(ConfigError::InvalidTimeStep(_)))
        ));

        assert!(matches!(
            parse("{ not json", "inline"),
            Err(ScenarioError::Json { .. })
        ));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let err = load(Path::new("definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ScenarioError::Io { .. }));
        assert!(err.to_string().contains("definitely/not/here.json"));
    }

    #[test]
    fn template_round_trips_and_builds() {
        let scenario = template();
        let json = serde_json::to_string_pretty(&scenario).unwrap();
        let parsed = parse(&json, "template").unwrap();
        assert_eq!(parsed, scenario);

        let commands = parsed.commands();
        let kinds: Vec<_> = commands.iter().map(Command::kind).collect();
        assert_eq!(
            kinds,
            vec![
                CommandKind::Signal,
                CommandKind::Until,
                CommandKind::Repeat,
                CommandKind::Unsignal,
                CommandKind::Forever,
            ]
        );
        assert_eq!(parsed.build().unwrap().environment().agent_count(), 5);
    }
}
