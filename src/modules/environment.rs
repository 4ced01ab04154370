use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::modules::agent::{Agent, AgentId};
use crate::modules::command::Command;
use crate::modules::error::RegionError;
use crate::modules::geometry::{Point, Region};
use crate::modules::view::AgentSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[serde(alias = "CIRCLE")]
    Circle,
    #[serde(alias = "RECTANGLE")]
    Rectangle,
}

impl ShapeKind {
    pub const fn label(self) -> &'static str {
        match self {
            ShapeKind::Circle => "circle",
            ShapeKind::Rectangle => "rectangle",
        }
    }

    pub const fn arity(self) -> usize {
        match self {
            ShapeKind::Circle => 3,
            ShapeKind::Rectangle => 4,
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ShapeKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "circle" => Ok(ShapeKind::Circle),
            "rectangle" => Ok(ShapeKind::Rectangle),
            _ => Err(()),
        }
    }
}

/// Shape record as produced by the environment parser.
///
/// Circle args are `[cx, cy, radius]`, rectangle args `[x, y, width, height]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDescriptor {
    pub shape: ShapeKind,
    pub label: String,
    pub args: Vec<f64>,
}

impl ShapeDescriptor {
    pub fn to_region(&self) -> Result<Region, RegionError> {
        let expected = self.shape.arity();
        if self.args.len() != expected {
            return Err(RegionError::Arity {
                shape: self.shape.label(),
                label: self.label.clone(),
                expected,
                actual: self.args.len(),
            });
        }
        let a = &self.args;
        match self.shape {
            ShapeKind::Circle => Region::circle(Point::new(a[0], a[1]), a[2], self.label.clone()),
            ShapeKind::Rectangle => {
                Region::rectangle(Point::new(a[0], a[1]), a[2], a[3], self.label.clone())
            }
        }
    }
}

pub fn build_environment(shapes: &[ShapeDescriptor]) -> Result<Environment, RegionError> {
    let mut environment = Environment::new();
    for shape in shapes {
        environment.add_region(shape.to_region()?);
    }
    Ok(environment)
}

/// Labeled regions plus the agents living among them.
///
/// Agents are kept in insertion order, which is also the dispatch order of
/// the simulator.
#[derive(Debug, Clone)]
pub struct Environment {
    regions: Vec<Region>,
    agents: Vec<Agent>,
    next_agent_id: AgentId,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            agents: Vec::new(),
            next_agent_id: 1,
        }
    }

    /// Adds a region and refreshes every agent's cached region labels.
    pub fn add_region(&mut self, region: Region) {
        self.regions.push(region);
        for agent in &mut self.agents {
            agent.refresh_regions(&self.regions);
        }
    }

    pub fn add_agent(&mut self, position: Point) -> AgentId {
        let id = self.next_agent_id;
        self.next_agent_id += 1;
        self.agents.push(Agent::new(id, position, &self.regions));
        id
    }

    /// Copy of the current regions.
    pub fn regions(&self) -> Vec<Region> {
        self.regions.clone()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id() == id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.id() == id)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn regions_containing(&self, point: Point) -> Vec<&Region> {
        self.regions.iter().filter(|r| r.contains(point)).collect()
    }

    /// Other agents within `range` of agent `id` (inclusive).
    pub fn agents_within_range(&self, id: AgentId, range: f64) -> Vec<&Agent> {
        let Some(index) = self.agents.iter().position(|a| a.id() == id) else {
            return Vec::new();
        };
        let origin = self.agents[index].position();
        Neighborhood {
            before: &self.agents[..index],
            after: &self.agents[index + 1..],
        }
        .within_range(origin, range)
        .collect()
    }

    /// Gives the same program copy to every agent.
    pub fn assign_program_to_all(&mut self, program: &[Command]) {
        for agent in &mut self.agents {
            agent.assign_program(program);
        }
    }

    pub fn all_finished(&self) -> bool {
        self.agents.iter().all(Agent::is_finished)
    }

    pub fn snapshot(&self) -> Vec<AgentSnapshot> {
        self.agents.iter().map(AgentSnapshot::from).collect()
    }

    /// Splits out the agent at `index` for mutation while exposing everyone
    /// else read-only.
    pub(crate) fn dispatch_view(
        &mut self,
        index: usize,
    ) -> Option<(&mut Agent, Neighborhood<'_>, &[Region])> {
        if index >= self.agents.len() {
            return None;
        }
        let (before, rest) = self.agents.split_at_mut(index);
        let (agent, after) = rest.split_first_mut()?;
        Some((
            agent,
            Neighborhood {
                before: &*before,
                after: &*after,
            },
            &self.regions,
        ))
    }
}

/// Every agent except the one being dispatched.
#[derive(Clone, Copy, Debug)]
pub struct Neighborhood<'a> {
    before: &'a [Agent],
    after: &'a [Agent],
}

impl<'a> Neighborhood<'a> {
    pub fn from_agents(agents: &'a [Agent]) -> Self {
        Self {
            before: agents,
            after: &[],
        }
    }

    pub fn iter(self) -> impl Iterator<Item = &'a Agent> + 'a {
        self.before.iter().chain(self.after.iter())
    }

    pub fn within_range(self, origin: Point, range: f64) -> impl Iterator<Item = &'a Agent> + 'a {
        self.iter()
            .filter(move |a| a.position().distance_to(origin) <= range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shapes() -> Vec<ShapeDescriptor> {
        vec![
            ShapeDescriptor {
                shape: ShapeKind::Circle,
                label: "pond".into(),
                args: vec![0.0, 0.0, 2.0],
            },
            ShapeDescriptor {
                shape: ShapeKind::Rectangle,
                label: "field".into(),
                args: vec![-1.0, -1.0, 10.0, 10.0],
            },
        ]
    }

    #[test]
    fn builds_regions_from_descriptors() {
        let mut env = build_environment(&shapes()).unwrap();
        assert_eq!(env.region_count(), 2);
        let mut copy = env.regions();
        copy.clear();
        assert_eq!(env.region_count(), 2);
        env.add_region(Region::circle(Point::new(50.0, 50.0), 1.0, "far").unwrap());
        assert_eq!(env.regions().len(), 3);
        let labels: Vec<_> = env
            .regions_containing(Point::new(1.0, 1.0))
            .iter()
            .map(|r| r.label().to_string())
            .collect();
        assert_eq!(labels, vec!["pond", "field"]);
        assert!(env.regions_containing(Point::new(5.0, 5.0)).len() == 1);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let bad = ShapeDescriptor {
            shape: ShapeKind::Rectangle,
            label: "bad".into(),
            args: vec![0.0, 0.0, 1.0],
        };
        assert!(matches!(
            build_environment(&[bad]),
            Err(RegionError::Arity {
                expected: 4,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn shape_kind_parses_case_insensitively() {
        assert_eq!("CIRCLE".parse::<ShapeKind>(), Ok(ShapeKind::Circle));
        assert_eq!(" rectangle ".parse::<ShapeKind>(), Ok(ShapeKind::Rectangle));
        assert!("triangle".parse::<ShapeKind>().is_err());
    }

    #[test]
    fn range_query_excludes_self_and_far_agents() {
        let mut env = Environment::new();
        let a = env.add_agent(Point::new(0.0, 0.0));
        let b = env.add_agent(Point::new(3.0, 4.0));
        let _c = env.add_agent(Point::new(10.0, 0.0));

        let near: Vec<_> = env.agents_within_range(a, 5.0).iter().map(|x| x.id()).collect();
        assert_eq!(near, vec![b]);
        assert!(env.agents_within_range(a, 4.9).is_empty());
        assert!(env.agents_within_range(99, 100.0).is_empty());
    }

    #[test]
    fn adding_a_region_refreshes_agent_labels() {
        let mut env = Environment::new();
        let id = env.add_agent(Point::new(1.0, 1.0));
        assert!(env.agent(id).unwrap().occupied_regions().is_empty());

        env.add_region(Region::circle(Point::new(1.0, 1.0), 0.5, "spot").unwrap());
        assert!(env.agent(id).unwrap().is_in_region("spot"));
    }

    #[test]
    fn dispatch_view_hides_the_dispatched_agent() {
        let mut env = Environment::new();
        env.add_agent(Point::new(0.0, 0.0));
        env.add_agent(Point::new(1.0, 0.0));
        env.add_agent(Point::new(2.0, 0.0));

        let (agent, neighbors, _) = env.dispatch_view(1).unwrap();
        assert_eq!(agent.id(), 2);
        let ids: Vec<_> = neighbors.iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(env.dispatch_view(3).is_none());
    }
}
