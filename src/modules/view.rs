use std::fmt;

use serde::{Deserialize, Serialize};

use crate::modules::agent::{Agent, AgentId};
use crate::modules::geometry::Point;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub position: Point,
    pub heading: f64,
    pub speed: f64,
    pub signals: Vec<String>,
    pub regions: Vec<String>,
    pub program_index: usize,
    pub program_len: usize,
    pub finished: bool,
}

impl From<&Agent> for AgentSnapshot {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id(),
            position: agent.position(),
            heading: agent.heading(),
            speed: agent.speed(),
            signals: agent.signals().iter().cloned().collect(),
            regions: agent.occupied_regions().iter().cloned().collect(),
            program_index: agent.cursor().program_index,
            program_len: agent.program().len(),
            finished: agent.is_finished(),
        }
    }
}

impl fmt::Display for AgentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regions = if self.regions.is_empty() {
            "none".to_string()
        } else {
            self.regions.join(", ")
        };
        let signals = if self.signals.is_empty() {
            "none".to_string()
        } else {
            self.signals.join(", ")
        };
        write!(
            f,
            "agent {} at {} heading {:.1}° speed {:.2} | regions: {} | signals: {} | command {}/{}",
            self.id,
            self.position,
            self.heading,
            self.speed,
            regions,
            signals,
            self.program_index.min(self.program_len),
            self.program_len
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub tick: u64,
    pub time: f64,
    pub agents: Vec<AgentSnapshot>,
}
