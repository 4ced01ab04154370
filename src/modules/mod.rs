pub mod agent;
pub mod command;
pub mod environment;
pub mod error;
pub mod geometry;
pub mod program;
pub mod scenario;
pub mod simulator;
pub mod stats;
pub mod view;
