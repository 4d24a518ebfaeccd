use crate::sequence::InstructionList;
use crate::types::{GCode, GCodeCommand, Token, TokenKind};

/// Render the instruction list back to G-code text, one line per node.
pub fn render_gcode(tokens: &InstructionList) -> GCode {
    GCode {
        lines: tokens.tokens().map(render_token).collect(),
    }
}

pub fn render_token(token: &Token) -> String {
    let line = match &token.kind {
        TokenKind::Move(command) => render_command(command),
        TokenKind::Params { label, params } => {
            let mut line = format!(";{label}");
            for value in params {
                line.push_str(&format!(" {value}"));
            }
            line
        }
        TokenKind::ToolChange { next_tool } if *next_tool >= 0 => format!("T{next_tool}"),
        TokenKind::ToolChange { .. } => ";T-1 (no tool change)".to_string(),
    };

    match &token.comment {
        Some(comment) if line.starts_with(';') => format!("{line} {comment}"),
        Some(comment) => format!("{line} ; {comment}"),
        None => line,
    }
}

fn render_command(command: &GCodeCommand) -> String {
    let mut line = command.code.clone();
    for &(letter, value) in &command.params {
        let value = match letter {
            'E' => format!("{value:.5}"),
            'F' => format!("{}", value.round() as i64),
            _ => format!("{value:.3}"),
        };
        line.push(' ');
        line.push(letter);
        line.push_str(&value);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AFTER_LAYER_CHANGE;

    #[test]
    fn test_command_precision() {
        let token = Token::command(
            GCodeCommand::g1()
                .with('X', 10.0)
                .with('Y', 2.34567)
                .with('E', 0.0123456)
                .with('F', 1800.4),
        );
        assert_eq!(render_token(&token), "G1 X10.000 Y2.346 E0.01235 F1800");
    }

    #[test]
    fn test_comments_and_annotations() {
        let retract = Token::command(GCodeCommand::retract()).with_comment("move-in retract");
        assert_eq!(render_token(&retract), "G10 ; move-in retract");

        let marker = Token::params(AFTER_LAYER_CHANGE, vec![3.0, 0.8]);
        assert_eq!(render_token(&marker), ";AFTER_LAYER_CHANGE 3 0.8");

        assert_eq!(render_token(&Token::tool_change(1)), "T1");
        assert!(render_token(&Token::tool_change(-1)).starts_with(';'));
    }

    #[test]
    fn test_render_follows_sequence_order() {
        let mut list = InstructionList::new();
        let first = list.push_back(Token::tool_change(0));
        list.push_back(Token::command(GCodeCommand::detract()));
        list.insert_after(first, Token::command(GCodeCommand::retract()))
            .unwrap();

        let gcode = render_gcode(&list);
        assert_eq!(gcode.lines, vec!["T0", "G10", "G11"]);
    }
}
