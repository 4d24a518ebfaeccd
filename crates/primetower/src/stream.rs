use crate::sequence::{InstructionList, NodeId};
use crate::types::{
    GCodeCommand, MachineState, Retraction, Token, TokenKind, AFTER_LAYER_CHANGE,
    BEFORE_LAYER_CHANGE, TOOL_BLOCK_END, TOOL_BLOCK_START,
};

/// Builds a state-annotated instruction list from structured commands.
///
/// Every pushed token gets the machine state before it (`state_pre`) and
/// after it (`state_post`), the way a G-code state annotator would tag a
/// parsed file.
#[derive(Debug, Clone, Default)]
pub struct StreamBuilder {
    tokens: InstructionList,
    state: MachineState,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known machine state instead of the all-unknown default.
    pub fn with_state(state: MachineState) -> Self {
        Self {
            tokens: InstructionList::new(),
            state,
        }
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// Append a token, applying its effect on the tracked state.
    pub fn push(&mut self, kind: TokenKind) -> NodeId {
        let state_pre = self.state;
        if let TokenKind::Move(command) = &kind {
            apply(&mut self.state, command);
        }
        let mut token = Token::new(kind);
        token.state_pre = state_pre;
        token.state_post = self.state;
        self.tokens.push_back(token)
    }

    pub fn command(&mut self, command: GCodeCommand) -> NodeId {
        self.push(TokenKind::Move(command))
    }

    /// Attach a comment to the last pushed token.
    pub fn comment(&mut self, comment: impl Into<String>) -> &mut Self {
        if let Some(token) = self.tokens.back().and_then(|id| self.tokens.get_mut(id)) {
            token.comment = Some(comment.into());
        }
        self
    }

    pub fn travel_to(&mut self, x: f64, y: f64) -> NodeId {
        self.command(GCodeCommand::g1().with('X', x).with('Y', y))
    }

    pub fn extrude_to(&mut self, x: f64, y: f64, e: f64) -> NodeId {
        self.command(GCodeCommand::g1().with('X', x).with('Y', y).with('E', e))
    }

    pub fn move_z(&mut self, z: f64) -> NodeId {
        self.command(GCodeCommand::g1().with('Z', z))
    }

    pub fn feed(&mut self, feed_rate: f64) -> NodeId {
        self.command(GCodeCommand::g1().with('F', feed_rate))
    }

    pub fn retract(&mut self) -> NodeId {
        self.command(GCodeCommand::retract())
    }

    pub fn detract(&mut self) -> NodeId {
        self.command(GCodeCommand::detract())
    }

    /// `-1` emits a no-op tool change.
    pub fn tool_change(&mut self, next_tool: i64) -> NodeId {
        self.push(TokenKind::ToolChange { next_tool })
    }

    pub fn annotation(&mut self, label: &str, params: Vec<f64>) -> NodeId {
        self.push(TokenKind::Params {
            label: label.to_string(),
            params,
        })
    }

    pub fn after_layer_change(&mut self, layer_num: usize, z: f64) -> NodeId {
        self.annotation(AFTER_LAYER_CHANGE, vec![layer_num as f64, z])
    }

    pub fn before_layer_change(&mut self, layer_num: usize, z: f64) -> NodeId {
        self.annotation(BEFORE_LAYER_CHANGE, vec![layer_num as f64, z])
    }

    pub fn tool_block_start(&mut self, tool: i64) -> NodeId {
        self.annotation(TOOL_BLOCK_START, vec![tool as f64])
    }

    pub fn tool_block_end(&mut self, tool: i64) -> NodeId {
        self.annotation(TOOL_BLOCK_END, vec![tool as f64])
    }

    /// Z move, `AFTER_LAYER_CHANGE`, the layer body, then `BEFORE_LAYER_CHANGE`.
    pub fn layer<F>(&mut self, layer_num: usize, z: f64, body: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        self.move_z(z);
        self.after_layer_change(layer_num, z);
        body(self);
        self.before_layer_change(layer_num, z);
        self
    }

    /// Body wrapped in `TOOL_BLOCK_START` / `TOOL_BLOCK_END` for `tool`.
    pub fn tool_block<F>(&mut self, tool: i64, body: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        self.tool_block_start(tool);
        body(self);
        self.tool_block_end(tool);
        self
    }

    pub fn finish(self) -> InstructionList {
        self.tokens
    }
}

fn apply(state: &mut MachineState, command: &GCodeCommand) {
    if command.is_retract() {
        state.retraction = Retraction::Retracted;
        return;
    }
    if command.is_detract() {
        state.retraction = Retraction::Unretracted;
        return;
    }
    if !matches!(command.code.as_str(), "G0" | "G1") {
        return;
    }
    for &(letter, value) in &command.params {
        match letter {
            'X' => state.x = Some(value),
            'Y' => state.y = Some(value),
            'Z' => state.z = Some(value),
            'F' => state.feed_rate = value,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_tracks_moves() {
        let mut b = StreamBuilder::new();
        b.feed(1500.0);
        b.move_z(0.3);
        let id = b.travel_to(4.0, 5.0);
        let tokens = b.finish();

        let token = tokens.get(id).unwrap();
        assert_eq!(token.state_pre.xy(), None);
        assert_eq!(token.state_post.xy(), Some((4.0, 5.0)));
        assert_eq!(token.state_post.z, Some(0.3));
        assert_eq!(token.state_post.feed_rate, 1500.0);
    }

    #[test]
    fn test_retraction_state() {
        let mut b = StreamBuilder::new();
        let first = b.travel_to(0.0, 0.0);
        let retract = b.retract();
        let detract = b.detract();
        let tokens = b.finish();

        assert_eq!(tokens.get(first).unwrap().state_post.retraction, Retraction::Unknown);
        assert_eq!(tokens.get(retract).unwrap().state_post.retraction, Retraction::Retracted);
        assert_eq!(tokens.get(detract).unwrap().state_pre.retraction, Retraction::Retracted);
        assert_eq!(tokens.get(detract).unwrap().state_post.retraction, Retraction::Unretracted);
    }

    #[test]
    fn test_layer_wraps_body() {
        let mut b = StreamBuilder::new();
        b.layer(2, 0.6, |b| {
            b.tool_block(1, |b| {
                b.extrude_to(1.0, 1.0, 0.05);
            });
        });
        let labels: Vec<Option<String>> = b
            .finish()
            .tokens()
            .map(|t| t.label().map(str::to_string))
            .collect();

        assert_eq!(
            labels,
            vec![
                None,
                Some(AFTER_LAYER_CHANGE.to_string()),
                Some(TOOL_BLOCK_START.to_string()),
                None,
                Some(TOOL_BLOCK_END.to_string()),
                Some(BEFORE_LAYER_CHANGE.to_string()),
            ]
        );
    }

    #[test]
    fn test_annotations_carry_state() {
        let mut b = StreamBuilder::new();
        b.move_z(1.2);
        let marker = b.after_layer_change(5, 1.2);
        let tokens = b.finish();
        let token = tokens.get(marker).unwrap();
        assert_eq!(token.state_post.z, Some(1.2));
        assert!(token.is_label(AFTER_LAYER_CHANGE));
    }
}
