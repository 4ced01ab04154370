use std::collections::BTreeSet;

use crate::modules::command::Command;
use crate::modules::geometry::{Point, Region};

pub type AgentId = u64;

/// Resumable top-level execution position of an agent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Cursor {
    pub program_index: usize,
    /// Time already spent on the timed command at `program_index`.
    pub timed_elapsed: f64,
}

/// A simulated robot: physical state, emitted signals and its own program copy.
#[derive(Clone, Debug)]
pub struct Agent {
    id: AgentId,
    position: Point,
    heading: f64,
    speed: f64,
    signals: BTreeSet<String>,
    occupied_regions: BTreeSet<String>,
    program: Vec<Command>,
    pub(crate) cursor: Cursor,
}

impl Agent {
    pub fn new(id: AgentId, position: Point, regions: &[Region]) -> Self {
        let mut agent = Self {
            id,
            position,
            heading: 0.0,
            speed: 0.0,
            signals: BTreeSet::new(),
            occupied_regions: BTreeSet::new(),
            program: Vec::new(),
            cursor: Cursor::default(),
        };
        agent.refresh_regions(regions);
        agent
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Moves the agent and recomputes which regions it occupies.
    pub fn set_position(&mut self, position: Point, regions: &[Region]) {
        self.position = position;
        self.refresh_regions(regions);
    }

    pub fn set_heading(&mut self, heading: f64) {
        self.heading = heading;
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    /// Returns true when the label was not already emitted.
    pub fn signal_label(&mut self, label: &str) -> bool {
        self.signals.insert(label.to_string())
    }

    /// Returns true when the label was being emitted.
    pub fn remove_label(&mut self, label: &str) -> bool {
        self.signals.remove(label)
    }

    pub fn is_signaling(&self, label: &str) -> bool {
        self.signals.contains(label)
    }

    pub fn signals(&self) -> &BTreeSet<String> {
        &self.signals
    }

    pub fn occupied_regions(&self) -> &BTreeSet<String> {
        &self.occupied_regions
    }

    pub fn is_in_region(&self, label: &str) -> bool {
        self.occupied_regions.contains(label)
    }

    /// Installs an independent deep copy of `program` and rewinds the cursor.
    pub fn assign_program(&mut self, program: &[Command]) {
        self.program = program.to_vec();
        self.cursor = Cursor::default();
    }

    pub fn program(&self) -> &[Command] {
        &self.program
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor.program_index >= self.program.len()
    }

    pub(crate) fn refresh_regions(&mut self, regions: &[Region]) {
        self.occupied_regions.clear();
        for region in regions {
            if region.contains(self.position) {
                self.occupied_regions.insert(region.label().to_string());
            }
        }
    }

    pub(crate) fn take_program(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.program)
    }

    pub(crate) fn restore_program(&mut self, program: Vec<Command>) {
        self.program = program;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions() -> Vec<Region> {
        vec![
            Region::circle(Point::new(0.0, 0.0), 1.0, "home").unwrap(),
            Region::rectangle(Point::new(5.0, 5.0), 2.0, 2.0, "dock").unwrap(),
        ]
    }

    #[test]
    fn set_position_recomputes_occupied_regions() {
        let regions = regions();
        let mut agent = Agent::new(1, Point::origin(), &regions);
        assert!(agent.is_in_region("home"));
        assert!(!agent.is_in_region("dock"));

        agent.set_position(Point::new(6.0, 6.0), &regions);
        assert!(!agent.is_in_region("home"));
        assert!(agent.is_in_region("dock"));

        agent.set_position(Point::new(20.0, 20.0), &regions);
        assert!(agent.occupied_regions().is_empty());
    }

    #[test]
    fn signals_are_idempotent() {
        let mut agent = Agent::new(1, Point::origin(), &[]);
        assert!(agent.signal_label("beacon"));
        assert!(!agent.signal_label("beacon"));
        assert!(agent.is_signaling("beacon"));
        assert_eq!(agent.signals().len(), 1);

        assert!(agent.remove_label("beacon"));
        assert!(!agent.remove_label("beacon"));
        assert!(!agent.is_signaling("beacon"));
    }

    #[test]
    fn assign_program_rewinds_cursor() {
        let mut agent = Agent::new(1, Point::origin(), &[]);
        assert!(agent.is_finished());

        agent.assign_program(&[Command::stop(), Command::stop()]);
        agent.cursor.program_index = 1;
        agent.cursor.timed_elapsed = 0.5;
        agent.assign_program(&[Command::stop()]);
        assert_eq!(agent.cursor(), Cursor::default());
        assert!(!agent.is_finished());
    }
}
