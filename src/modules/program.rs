use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::modules::command::Command;
use crate::modules::error::ProgramError;

/// One call of the parser's push interface, in serializable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ProgramEvent {
    SequenceStart,
    SequenceEnd,
    Move { args: Vec<f64> },
    MoveRandom { args: Vec<f64> },
    Signal { label: String },
    Unsignal { label: String },
    Follow { label: String, args: Vec<f64> },
    Stop,
    Continue { seconds: f64 },
    RepeatStart { count: u32 },
    UntilStart { label: String },
    ForeverStart,
    BlockEnd,
}

#[derive(Debug)]
enum Opener {
    Repeat(u32),
    Until(String),
    Forever,
}

#[derive(Debug)]
struct Frame {
    opener: Opener,
    body: Vec<Command>,
}

impl Frame {
    fn close(self) -> Command {
        match self.opener {
            Opener::Repeat(count) => Command::repeat(count, self.body),
            Opener::Until(label) => Command::until(label, self.body),
            Opener::Forever => Command::forever(self.body),
        }
    }
}

fn expect_args<'a>(
    command: &'static str,
    args: &'a [f64],
    expected: usize,
) -> Result<&'a [f64], ProgramError> {
    if args.len() != expected {
        return Err(ProgramError::Arity {
            command,
            expected,
            actual: args.len(),
        });
    }
    Ok(args)
}

/// Assembles a command tree from parser callbacks.
///
/// Nesting is tracked with an explicit stack of open blocks: a block start
/// pushes a frame, `block_end` pops it and appends the finished composite to
/// the enclosing sequence.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    root: Vec<Command>,
    frames: Vec<Frame>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting depth (0 at top level).
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn current(&mut self) -> &mut Vec<Command> {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.body,
            None => &mut self.root,
        }
    }

    fn push(&mut self, command: Command) {
        self.current().push(command);
    }

    fn open(&mut self, opener: Opener) {
        self.frames.push(Frame {
            opener,
            body: Vec::new(),
        });
    }

    pub fn sequence_start(&mut self) {
        self.root.clear();
        self.frames.clear();
    }

    pub fn sequence_end(&mut self) {
        debug!(
            commands = self.root.len(),
            open_blocks = self.frames.len(),
            "program sequence ended"
        );
    }

    /// `args` = `[dx, dy, speed]`.
    pub fn move_command(&mut self, args: &[f64]) -> Result<(), ProgramError> {
        let a = expect_args("move", args, 3)?;
        self.push(Command::moving(a[0], a[1], a[2])?);
        Ok(())
    }

    /// `args` = `[x1, x2, y1, y2, speed]`.
    pub fn move_random(&mut self, args: &[f64]) -> Result<(), ProgramError> {
        let a = expect_args("move_random", args, 5)?;
        self.push(Command::move_random(a[0], a[1], a[2], a[3], a[4])?);
        Ok(())
    }

    pub fn signal(&mut self, label: impl Into<String>) {
        self.push(Command::signal(label));
    }

    pub fn unsignal(&mut self, label: impl Into<String>) {
        self.push(Command::unsignal(label));
    }

    /// `args` = `[range, speed]`.
    pub fn follow(&mut self, label: impl Into<String>, args: &[f64]) -> Result<(), ProgramError> {
        let a = expect_args("follow", args, 2)?;
        self.push(Command::follow(label, a[0], a[1])?);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.push(Command::stop());
    }

    pub fn continue_for(&mut self, seconds: f64) -> Result<(), ProgramError> {
        self.push(Command::continue_for(seconds)?);
        Ok(())
    }

    pub fn repeat_start(&mut self, count: u32) {
        self.open(Opener::Repeat(count));
    }

    pub fn until_start(&mut self, label: impl Into<String>) {
        self.open(Opener::Until(label.into()));
    }

    pub fn forever_start(&mut self) {
        self.open(Opener::Forever);
    }

    pub fn block_end(&mut self) -> Result<(), ProgramError> {
        let frame = self.frames.pop().ok_or(ProgramError::UnbalancedBlockEnd)?;
        let command = frame.close();
        self.push(command);
        Ok(())
    }

    pub fn apply(&mut self, event: ProgramEvent) -> Result<(), ProgramError> {
        match event {
            ProgramEvent::SequenceStart => self.sequence_start(),
            ProgramEvent::SequenceEnd => self.sequence_end(),
            ProgramEvent::Move { args } => self.move_command(&args)?,
            ProgramEvent::MoveRandom { args } => self.move_random(&args)?,
            ProgramEvent::Signal { label } => self.signal(label),
            ProgramEvent::Unsignal { label } => self.unsignal(label),
            ProgramEvent::Follow { label, args } => self.follow(label, &args)?,
            ProgramEvent::Stop => self.stop(),
            ProgramEvent::Continue { seconds } => self.continue_for(seconds)?,
            ProgramEvent::RepeatStart { count } => self.repeat_start(count),
            ProgramEvent::UntilStart { label } => self.until_start(label),
            ProgramEvent::ForeverStart => self.forever_start(),
            ProgramEvent::BlockEnd => self.block_end()?,
        }
        Ok(())
    }

    /// Returns the top-level sequence, closing any block left open.
    pub fn finish(mut self) -> Vec<Command> {
        if !self.frames.is_empty() {
            warn!(open_blocks = self.frames.len(), "closing unterminated blocks");
        }
        while let Some(frame) = self.frames.pop() {
            let command = frame.close();
            self.push(command);
        }
        self.root
    }
}

/// Builds a program from `events`, logging and skipping events that fail.
pub fn load_program(events: impl IntoIterator<Item = ProgramEvent>) -> Vec<Command> {
    let mut builder = ProgramBuilder::new();
    for (position, event) in events.into_iter().enumerate() {
        if let Err(err) = builder.apply(event) {
            warn!(position, error = %err, "skipping program event");
        }
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::command::CommandKind;

    #[test]
    fn nested_blocks_attach_to_their_opener() {
        let mut b = ProgramBuilder::new();
        b.sequence_start();
        b.move_command(&[1.0, 0.0, 1.0]).unwrap();
        b.repeat_start(3);
        b.signal("a");
        b.until_start("goal");
        b.stop();
        b.block_end().unwrap();
        assert_eq!(b.depth(), 1);
        b.block_end().unwrap();
        b.forever_start();
        b.continue_for(2.0).unwrap();
        b.block_end().unwrap();
        b.sequence_end();
        let program = b.finish();

        let kinds: Vec<_> = program.iter().map(Command::kind).collect();
        assert_eq!(
            kinds,
            vec![CommandKind::Move, CommandKind::Repeat, CommandKind::Forever]
        );
        let repeat_body: Vec<_> = program[1].body().iter().map(Command::kind).collect();
        assert_eq!(repeat_body, vec![CommandKind::Signal, CommandKind::Until]);
        assert_eq!(program[1].body()[1].body(), &[Command::stop()]);
        assert_eq!(program[2].body(), &[Command::continue_for(2.0).unwrap()]);
    }

    #[test]
    fn arity_and_construction_errors_surface() {
        let mut b = ProgramBuilder::new();
        assert_eq!(
            b.move_command(&[1.0, 0.0]),
            Err(ProgramError::Arity {
                command: "move",
                expected: 3,
                actual: 2
            })
        );
        assert!(matches!(
            b.move_command(&[0.0, 0.0, 1.0]),
            Err(ProgramError::Command(_))
        ));
        assert_eq!(b.block_end(), Err(ProgramError::UnbalancedBlockEnd));
        assert!(b.finish().is_empty());
    }

    #[test]
    fn load_program_skips_bad_events_and_closes_blocks() {
        let events = vec![
            ProgramEvent::SequenceStart,
            ProgramEvent::Move {
                args: vec![1.0, 0.0, 1.0],
            },
            ProgramEvent::Move {
                args: vec![2.0, 0.0, 1.0],
            },
            ProgramEvent::RepeatStart { count: 2 },
            ProgramEvent::Follow {
                label: "x".into(),
                args: vec![3.0, 1.0],
            },
            ProgramEvent::BlockEnd,
            ProgramEvent::BlockEnd,
            ProgramEvent::ForeverStart,
            ProgramEvent::Stop,
            ProgramEvent::SequenceEnd,
        ];
        let program = load_program(events);
        let kinds: Vec<_> = program.iter().map(Command::kind).collect();
        assert_eq!(
            kinds,
            vec![CommandKind::Move, CommandKind::Repeat, CommandKind::Forever]
        );
        // The out-of-range move is dropped, the valid one kept.
        assert_eq!(program[0], Command::moving(1.0, 0.0, 1.0).unwrap());
        assert_eq!(program[1].body()[0].kind(), CommandKind::Follow);
        assert_eq!(program[2].body(), &[Command::stop()]);
    }

    #[test]
    fn events_use_snake_case_tags() {
        let json = r#"[
            {"op": "repeat_start", "count": 2},
            {"op": "move_random", "args": [0, 10, 0, 10, 1]},
            {"op": "block_end"}
        ]"#;
        let events: Vec<ProgramEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(events[0], ProgramEvent::RepeatStart { count: 2 });
        let program = load_program(events);
        assert_eq!(program[0].body()[0].kind(), CommandKind::MoveRandom);
    }
}
