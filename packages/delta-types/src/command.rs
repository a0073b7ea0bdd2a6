use serde::{Deserialize, Serialize};

use crate::error::DeltaError;
use crate::model::CurrentPivot;

/// Lines longer than this are a formatting overflow, mirroring the
/// source's fixed line buffer.
const CMD_LINE_MAX_LEN: usize = 128;

/// One command-stream opcode. 1-based pivot numbers throughout, matching
/// the exchange format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename = "MF")]
    MoveFibre { pivot: u32, xf: i64, yf: i64, theta: f64 },
    #[serde(rename = "PF")]
    ParkFibre { pivot: u32 },
    #[serde(rename = "!")]
    CommentSilent { text: String },
    #[serde(rename = "*")]
    CommentEcho { text: String },
}

impl Command {
    /// Build a comment command from its opcode string, the one place a
    /// command is addressed by a dynamic opcode rather than constructed
    /// directly — mirrors the source's variadic emit function dispatching
    /// on an opcode string and rejecting unknown ones.
    pub fn comment(opcode: &str, text: impl Into<String>) -> Result<Command, DeltaError> {
        match opcode {
            "!" => Ok(Command::CommentSilent { text: text.into() }),
            "*" => Ok(Command::CommentEcho { text: text.into() }),
            other => Err(DeltaError::NoSuchCommand(other.to_string())),
        }
    }

    fn pivot(&self) -> u32 {
        match self {
            Command::MoveFibre { pivot, .. } => *pivot,
            Command::ParkFibre { pivot } => *pivot,
            Command::CommentSilent { .. } | Command::CommentEcho { .. } => 0,
        }
    }

    /// Render to the line-buffer text the source would have written, and
    /// enforce the fixed line-buffer length the way `ErsSPrintf` did.
    pub fn render(&self) -> Result<String, DeltaError> {
        let line = match self {
            Command::MoveFibre { pivot, xf, yf, theta } => {
                format!("MF {pivot} {xf} {yf} {theta:.6}")
            }
            Command::ParkFibre { pivot } => format!("PF {pivot}"),
            Command::CommentSilent { text } => format!("! {text}"),
            Command::CommentEcho { text } => format!("* {text}"),
        };
        if line.len() > CMD_LINE_MAX_LEN {
            return Err(DeltaError::SprintfOverflow { pivot: self.pivot() });
        }
        Ok(line)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandLine {
    pub line_number: u32,
    #[serde(flatten)]
    pub command: Command,
}

/// Append-only command file. Snapshots the plan's starting `xf`/`yf`/
/// `theta` and the original `above` array at construction, so a consumer
/// can reconstruct the starting conditions without the live, now-mutated
/// Current state (SPEC_FULL.md S4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandStream {
    pub xf: Vec<i64>,
    pub yf: Vec<i64>,
    pub theta: Vec<f64>,
    pub above: Vec<i64>,
    pub lines: Vec<CommandLine>,
    pub num_moves: u32,
    pub num_parks: u32,
    #[serde(default)]
    pub num_spring_out_parks: Option<u32>,
    #[serde(skip)]
    next_line: u32,
}

impl CommandStream {
    pub fn new(starting_current: &[CurrentPivot], above_array: Vec<i64>) -> Self {
        Self {
            xf: starting_current.iter().map(|p| p.xf).collect(),
            yf: starting_current.iter().map(|p| p.yf).collect(),
            theta: starting_current.iter().map(|p| p.theta).collect(),
            above: above_array,
            lines: Vec::new(),
            num_moves: 0,
            num_parks: 0,
            num_spring_out_parks: None,
            next_line: 1,
        }
    }

    pub fn add_cmd(&mut self, command: Command) -> Result<(), DeltaError> {
        command.render()?;
        let line_number = self.next_line;
        self.next_line += 1;
        self.lines.push(CommandLine { line_number, command });
        Ok(())
    }

    pub fn add_moves(&mut self, num_moves: u32, num_parks: u32) {
        self.num_moves = num_moves;
        self.num_parks = num_parks;
    }

    pub fn add_spring_out_parks(&mut self, n: u32) {
        self.num_spring_out_parks = Some(n);
    }
}
