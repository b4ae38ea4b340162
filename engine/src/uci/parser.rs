/// Token preceding the engine's chosen move.
pub const BEST_MOVE_TOKEN: &str = "bestmove";

/// Engine output the adapter acts on. Everything else is diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciMessage {
    UciOk,
    ReadyOk,
    BestMove { mv: String, ponder: Option<String> },
}

/// Parse a UCI message line
pub fn parse_uci_message(line: &str) -> Result<UciMessage, super::UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"uciok") => Ok(UciMessage::UciOk),
        Some(&"readyok") => Ok(UciMessage::ReadyOk),

        // 0:bestmove 1:<move> 2:ponder 3:<move>
        Some(&BEST_MOVE_TOKEN) => {
            let mv = tokens
                .get(1)
                .filter(|t| is_move_token(t))
                .ok_or_else(|| super::UciError::MalformedMessage(line.to_string()))?;
            let ponder = match (tokens.get(2), tokens.get(3)) {
                (Some(&"ponder"), Some(p)) if is_move_token(p) => Some(p.to_string()),
                _ => None,
            };
            Ok(UciMessage::BestMove {
                mv: mv.to_string(),
                ponder,
            })
        }

        _ => Err(super::UciError::UnknownMessage(line.to_string())),
    }
}

/// Move tokens are 4-5 ASCII characters; "(none)" is what engines print
/// when there is nothing to play.
fn is_move_token(token: &str) -> bool {
    token.is_ascii() && (4..=5).contains(&token.len()) && token != "ponder"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uci::UciError;

    #[test]
    fn test_parse_bestmove() {
        let msg = parse_uci_message("bestmove e2e4 ponder e7e5").unwrap();
        assert_eq!(
            msg,
            UciMessage::BestMove {
                mv: "e2e4".into(),
                ponder: Some("e7e5".into())
            }
        );
    }

    #[test]
    fn test_parse_bestmove_without_ponder() {
        let msg = parse_uci_message("bestmove a7a8q").unwrap();
        assert!(matches!(msg, UciMessage::BestMove { ref mv, ponder: None } if mv == "a7a8q"));
    }

    #[test]
    fn test_bestmove_missing_move_is_malformed() {
        assert!(matches!(
            parse_uci_message("bestmove"),
            Err(UciError::MalformedMessage(_))
        ));
        assert!(matches!(
            parse_uci_message("bestmove (none)"),
            Err(UciError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_handshake_replies() {
        assert_eq!(parse_uci_message("uciok").unwrap(), UciMessage::UciOk);
        assert_eq!(parse_uci_message(" readyok ").unwrap(), UciMessage::ReadyOk);
    }

    #[test]
    fn test_diagnostics_are_unknown() {
        for line in [
            "Lc0 v0.30 built Jan 1",
            "info depth 12 score cp 35 nodes 15234 pv e2e4 e7e5",
            "id name Lc0",
        ] {
            assert!(matches!(
                parse_uci_message(line),
                Err(UciError::UnknownMessage(_))
            ));
        }
    }
}
