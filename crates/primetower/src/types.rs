use serde::{Deserialize, Serialize};

/// Slicer annotation emitted right after the Z move of a new layer (`[layer_num, z]`).
pub const AFTER_LAYER_CHANGE: &str = "AFTER_LAYER_CHANGE";
/// Slicer annotation emitted right before a layer change (`[layer_num, z]`).
pub const BEFORE_LAYER_CHANGE: &str = "BEFORE_LAYER_CHANGE";
/// Start of the section printed by one tool (`[tool_id]`, `-1` when unset).
pub const TOOL_BLOCK_START: &str = "TOOL_BLOCK_START";
/// End of the section printed by one tool (`[tool_id]`, `-1` when unset).
pub const TOOL_BLOCK_END: &str = "TOOL_BLOCK_END";

/// Filament retraction status tracked by the state annotator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Retraction {
    Retracted,
    Unretracted,
    #[default]
    Unknown,
}

/// Snapshot of the machine state before or after a token executes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MachineState {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub feed_rate: f64,
    pub retraction: Retraction,
}

impl MachineState {
    /// XY position, if both axes are known.
    pub fn xy(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}

/// A single machine instruction, e.g. `G1 X10 Y5 E0.3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GCodeCommand {
    pub code: String,
    /// Parameters in output order.
    #[serde(default)]
    pub params: Vec<(char, f64)>,
}

impl GCodeCommand {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            params: Vec::new(),
        }
    }

    /// Builder-style parameter append.
    pub fn with(mut self, letter: char, value: f64) -> Self {
        self.params.push((letter, value));
        self
    }

    /// Linear move.
    pub fn g1() -> Self {
        Self::new("G1")
    }

    /// Firmware retract.
    pub fn retract() -> Self {
        Self::new("G10")
    }

    /// Firmware detract (unretract).
    pub fn detract() -> Self {
        Self::new("G11")
    }

    pub fn param(&self, letter: char) -> Option<f64> {
        self.params
            .iter()
            .find(|(l, _)| *l == letter)
            .map(|(_, v)| *v)
    }

    pub fn is_retract(&self) -> bool {
        self.code == "G10"
    }

    pub fn is_detract(&self) -> bool {
        self.code == "G11"
    }
}

/// What a token represents in the instruction stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    /// Any motion or filament instruction (`G0`/`G1`/`G10`/`G11`, ...).
    Move(GCodeCommand),
    /// Labelled slicer annotation with numeric parameters.
    Params { label: String, params: Vec<f64> },
    /// Tool change; `-1` marks a no-op change.
    ToolChange { next_tool: i64 },
}

/// A state-annotated node of the instruction stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub state_pre: MachineState,
    #[serde(default)]
    pub state_post: MachineState,
}

impl Token {
    /// A token with no state annotation (used for injected instructions).
    pub fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            comment: None,
            state_pre: MachineState::default(),
            state_post: MachineState::default(),
        }
    }

    pub fn command(command: GCodeCommand) -> Self {
        Self::new(TokenKind::Move(command))
    }

    pub fn params(label: impl Into<String>, params: Vec<f64>) -> Self {
        Self::new(TokenKind::Params {
            label: label.into(),
            params,
        })
    }

    pub fn tool_change(next_tool: i64) -> Self {
        Self::new(TokenKind::ToolChange { next_tool })
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Label of a `Params` token.
    pub fn label(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Params { label, .. } => Some(label.as_str()),
            _ => None,
        }
    }

    pub fn is_label(&self, expected: &str) -> bool {
        self.label() == Some(expected)
    }

    pub fn as_command(&self) -> Option<&GCodeCommand> {
        match &self.kind {
            TokenKind::Move(command) => Some(command),
            _ => None,
        }
    }
}

/// Represents the final G-code text output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GCode {
    /// A list of G-code command strings.
    pub lines: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = GCodeCommand::g1().with('X', 1.5).with('Y', 2.0);
        assert_eq!(cmd.code, "G1");
        assert_eq!(cmd.param('X'), Some(1.5));
        assert_eq!(cmd.param('Z'), None);
    }

    #[test]
    fn test_token_label() {
        let token = Token::params(AFTER_LAYER_CHANGE, vec![0.0, 0.2]);
        assert!(token.is_label(AFTER_LAYER_CHANGE));
        assert!(!token.is_label(BEFORE_LAYER_CHANGE));
        assert!(Token::tool_change(1).label().is_none());
    }

    #[test]
    fn test_state_xy() {
        let mut state = MachineState::default();
        assert_eq!(state.xy(), None);
        state.x = Some(1.0);
        assert_eq!(state.xy(), None);
        state.y = Some(2.0);
        assert_eq!(state.xy(), Some((1.0, 2.0)));
        assert_eq!(state.retraction, Retraction::Unknown);
    }

    #[test]
    fn test_token_serialization() {
        let token = Token::tool_change(2).with_comment("switch");
        let json = serde_json::to_string(&token).expect("serialize");
        let back: Token = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(token, back);
    }
}
