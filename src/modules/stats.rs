use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::modules::agent::AgentId;
use crate::modules::command::CommandKind;
use crate::modules::simulator::Event;

/// Leaf command executions of one agent, nested ones included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub move_count: u64,
    pub move_random_count: u64,
    pub signal_count: u64,
    pub unsignal_count: u64,
    pub stop_count: u64,
    pub follow_count: u64,
    pub continue_count: u64,
}

impl ExecutionStats {
    pub fn record(&mut self, kind: CommandKind) {
        let slot = match kind {
            CommandKind::Move => &mut self.move_count,
            CommandKind::MoveRandom => &mut self.move_random_count,
            CommandKind::Signal => &mut self.signal_count,
            CommandKind::Unsignal => &mut self.unsignal_count,
            CommandKind::Stop => &mut self.stop_count,
            CommandKind::Follow => &mut self.follow_count,
            CommandKind::Continue => &mut self.continue_count,
            CommandKind::Repeat | CommandKind::Forever | CommandKind::Until => return,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u64 {
        self.move_count
            + self.move_random_count
            + self.signal_count
            + self.unsignal_count
            + self.stop_count
            + self.follow_count
            + self.continue_count
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionStatsStore {
    pub per_agent: BTreeMap<AgentId, ExecutionStats>,
}

impl ExecutionStatsStore {
    pub fn record_events(&mut self, events: &[Event]) {
        for event in events {
            if let Event::CommandExecuted { agent_id, command } = event {
                self.per_agent.entry(*agent_id).or_default().record(*command);
            }
        }
    }

    pub fn agent(&self, agent_id: AgentId) -> Option<&ExecutionStats> {
        self.per_agent.get(&agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::command::Command;
    use crate::modules::environment::Environment;
    use crate::modules::geometry::Point;
    use crate::modules::simulator::{SimulationConfig, Simulator};

    #[test]
    fn counts_leaf_executions_per_agent() {
        let events = vec![
            Event::TickStarted { tick: 1 },
            Event::CommandExecuted {
                agent_id: 1,
                command: CommandKind::Move,
            },
            Event::CommandExecuted {
                agent_id: 1,
                command: CommandKind::Move,
            },
            Event::CommandExecuted {
                agent_id: 2,
                command: CommandKind::Follow,
            },
            Event::CommandExecuted {
                agent_id: 2,
                command: CommandKind::Repeat,
            },
        ];
        let mut store = ExecutionStatsStore::default();
        store.record_events(&events);

        assert_eq!(store.agent(1).unwrap().move_count, 2);
        assert_eq!(store.agent(2).unwrap().follow_count, 1);
        assert_eq!(store.agent(2).unwrap().total(), 1);
        assert!(store.agent(3).is_none());
    }

    #[test]
    fn completed_timed_steps_are_not_counted() {
        let mut env = Environment::new();
        let id = env.add_agent(Point::origin());
        let mut config = SimulationConfig::new(1.0, 5.0);
        config.seed = Some(3);
        let mut sim = Simulator::new(env, config).unwrap();
        sim.environment_mut().agent_mut(id).unwrap().assign_program(&[
            Command::moving(1.0, 0.0, 1.0).unwrap(),
            Command::forever(vec![Command::continue_for(1.0).unwrap()]),
        ]);

        let mut store = ExecutionStatsStore::default();
        sim.run_with(|tick, _| {
            store.record_events(&tick.events);
            std::ops::ControlFlow::Continue(())
        });

        let stats = store.agent(id).unwrap();
        assert_eq!(stats.move_count, 1);
        assert_eq!(stats.continue_count, 1);
        let position = sim.environment().agent(id).unwrap().position();
        assert!(position.distance_to(Point::new(2.0, 0.0)) < 1e-9);
    }
}
