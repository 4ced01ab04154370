use std::path::PathBuf;

use clap::Subcommand;
use swarmsim::{Command, Scenario};

#[derive(Subcommand)]
pub enum ScenarioCommand {
    /// Validate a scenario and print its regions and program tree
    Check {
        /// Scenario JSON file
        path: PathBuf,
    },
    /// Print a starter scenario as JSON
    Template,
}

pub fn run_scenario(command: ScenarioCommand) -> Result<(), String> {
    match command {
        ScenarioCommand::Check { path } => run_check(path),
        ScenarioCommand::Template => run_template(),
    }
}

fn run_check(path: PathBuf) -> Result<(), String> {
    let scenario = swarmsim::scenario::load(&path).map_err(|e| e.to_string())?;
    let environment = scenario.environment().map_err(|e| e.to_string())?;
    scenario.config.validate().map_err(|e| e.to_string())?;

    println!("Scenario {}", path.display());
    println!(
        "Config: dt={} total_time={} ticks={} agents={} spawn={}x{} seed={}",
        scenario.config.dt,
        scenario.config.total_time,
        scenario.config.simulation().tick_count(),
        scenario.config.agents,
        scenario.config.spawn.width,
        scenario.config.spawn.height,
        scenario
            .config
            .seed
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into())
    );

    let regions = environment.regions();
    if regions.is_empty() {
        println!("Regions: none");
    } else {
        println!("Regions:");
        for region in &regions {
            println!("  {}", region);
        }
    }

    let program = scenario.commands();
    println!("Program ({} top-level commands):", program.len());
    print!("{}", render_program(&program));
    Ok(())
}

fn run_template() -> Result<(), String> {
    let template: Scenario = swarmsim::scenario::template();
    let json = serde_json::to_string_pretty(&template).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn render_program(program: &[Command]) -> String {
    let mut out = String::new();
    render_into(program, 1, &mut out);
    out
}

fn render_into(commands: &[Command], depth: usize, out: &mut String) {
    for (index, command) in commands.iter().enumerate() {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("{}. {}\n", index, command));
        render_into(command.body(), depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_tree_is_indented_by_depth() {
        let program = vec![
            Command::signal("a"),
            Command::repeat(2, vec![Command::forever(vec![Command::stop()])]),
        ];
        let text = render_program(&program);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("  0. "));
        assert!(lines[1].starts_with("  1. repeat 2"));
        assert!(lines[2].starts_with("    0. forever"));
        assert!(lines[3].starts_with("      0. "));
    }
}
