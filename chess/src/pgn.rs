//! PGN export of a played game.

use std::fmt::Write;

use crate::game::{Game, StartPosition};
use crate::types::Side;

/// Seven Tag Roster values. Unknown values are written as `?`.
#[derive(Debug, Clone, Default)]
pub struct PgnTags {
    pub event: Option<String>,
    pub site: Option<String>,
    pub date: Option<String>,
    pub round: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgnResult {
    WhiteWins,
    BlackWins,
    Draw,
    Ongoing,
}

impl PgnResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WhiteWins => "1-0",
            Self::BlackWins => "0-1",
            Self::Draw => "1/2-1/2",
            Self::Ongoing => "*",
        }
    }

    pub fn win_for(side: Side) -> Self {
        match side {
            Side::White => Self::WhiteWins,
            Side::Black => Self::BlackWins,
        }
    }
}

/// Render `game` as PGN text.
pub fn export_pgn(game: &Game, tags: &PgnTags, result: PgnResult) -> String {
    let mut out = String::new();
    let tag = |v: &Option<String>| v.clone().unwrap_or_else(|| "?".to_string());

    let _ = writeln!(out, "[Event \"{}\"]", escape(&tag(&tags.event)));
    let _ = writeln!(out, "[Site \"{}\"]", escape(&tag(&tags.site)));
    let _ = writeln!(
        out,
        "[Date \"{}\"]",
        escape(&tags.date.clone().unwrap_or_else(|| "????.??.??".to_string()))
    );
    let _ = writeln!(out, "[Round \"{}\"]", escape(&tag(&tags.round)));
    let _ = writeln!(out, "[White \"{}\"]", escape(&tag(&tags.white)));
    let _ = writeln!(out, "[Black \"{}\"]", escape(&tag(&tags.black)));
    let _ = writeln!(out, "[Result \"{}\"]", result.as_str());
    if let StartPosition::Fen(_) = game.start_position() {
        let _ = writeln!(out, "[SetUp \"1\"]");
        let _ = writeln!(out, "[FEN \"{}\"]", game.start_fen());
    }
    out.push('\n');

    let start = game.start_board();
    let mut number = start.fullmove_number();
    let mut tokens = Vec::new();
    for (i, entry) in game.history().iter().enumerate() {
        match entry.side {
            Side::White => tokens.push(format!("{}.", number)),
            Side::Black if i == 0 => tokens.push(format!("{}...", number)),
            Side::Black => {}
        }
        tokens.push(entry.san.clone());
        if entry.side == Side::Black {
            number += 1;
        }
    }
    tokens.push(result.as_str().to_string());

    // Wrap movetext at 80 columns.
    let mut line_len = 0;
    for token in tokens {
        if line_len > 0 && line_len + 1 + token.len() > 80 {
            out.push('\n');
            line_len = 0;
        } else if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        line_len += token.len();
        out.push_str(&token);
    }
    out.push('\n');
    out
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_standard_game() {
        let mut game = Game::new();
        for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            game.play_uci(mv).unwrap();
        }
        let tags = PgnTags {
            white: Some("Guest 1".to_string()),
            black: Some("Guest 2".to_string()),
            ..Default::default()
        };
        let pgn = export_pgn(&game, &tags, PgnResult::BlackWins);
        assert!(pgn.contains("[White \"Guest 1\"]"));
        assert!(pgn.contains("[Result \"0-1\"]"));
        assert!(!pgn.contains("[FEN"));
        assert!(pgn.ends_with("1. f3 e5 2. g4 Qh4# 0-1\n"));
    }

    #[test]
    fn test_export_from_fen_with_black_to_move() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        let mut game = Game::from_fen(fen).unwrap();
        game.play_uci("e7e5").unwrap();
        game.play_uci("g1f3").unwrap();
        let pgn = export_pgn(&game, &PgnTags::default(), PgnResult::Ongoing);
        assert!(pgn.contains("[SetUp \"1\"]"));
        assert!(pgn.contains(&format!("[FEN \"{}\"]", fen)));
        assert!(pgn.contains("1... e5 2. Nf3 *"));
    }
}
