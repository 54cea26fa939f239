//! FEN/SAN helpers on top of shakmaty.

use shakmaty::{fen::Fen, san::San, uci::UciMove, CastlingMode, Chess, Color, EnPassantMode, Position};

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// SAN placeholder for "no move", also the key of the root entry.
pub const NULL_MOVE: &str = "--";

#[derive(Debug, thiserror::Error)]
pub enum PositionError {
    #[error("Invalid FEN '{fen}': {message}")]
    InvalidFen { fen: String, message: String },

    #[error("Illegal move '{mv}' in '{fen}'")]
    IllegalMove { fen: String, mv: String },
}

pub fn parse_fen(fen: &str) -> Result<Chess, PositionError> {
    let invalid = |message: String| PositionError::InvalidFen {
        fen: fen.to_string(),
        message,
    };
    let parsed: Fen = fen.parse().map_err(|e| invalid(format!("{e}")))?;
    parsed
        .into_position::<Chess>(CastlingMode::Standard)
        .map_err(|e| invalid(format!("{e}")))
}

pub fn side_to_move(fen: &str) -> Result<Color, PositionError> {
    Ok(parse_fen(fen)?.turn())
}

/// Canonical SAN of `san` in the position, e.g. "Ngf3" -> "Nf3" when unambiguous.
pub fn normalize_san(fen: &str, san: &str) -> Result<String, PositionError> {
    let pos = parse_fen(fen)?;
    let illegal = || PositionError::IllegalMove {
        fen: fen.to_string(),
        mv: san.to_string(),
    };
    let parsed: San = san.parse().map_err(|_| illegal())?;
    let mv = parsed.to_move(&pos).map_err(|_| illegal())?;
    Ok(San::from_move(&pos, mv).to_string())
}

pub fn uci_to_san(fen: &str, uci: &str) -> Result<String, PositionError> {
    let pos = parse_fen(fen)?;
    let illegal = || PositionError::IllegalMove {
        fen: fen.to_string(),
        mv: uci.to_string(),
    };
    let parsed: UciMove = uci.parse().map_err(|_| illegal())?;
    let mv = parsed.to_move(&pos).map_err(|_| illegal())?;
    Ok(San::from_move(&pos, mv).to_string())
}

/// SAN of every legal move in the position.
pub fn legal_sans(fen: &str) -> Result<Vec<String>, PositionError> {
    let pos = parse_fen(fen)?;
    Ok(pos
        .legal_moves()
        .into_iter()
        .map(|mv| San::from_move(&pos, mv).to_string())
        .collect())
}

/// FEN after playing `san`.
pub fn play_san(fen: &str, san: &str) -> Result<String, PositionError> {
    let pos = parse_fen(fen)?;
    let illegal = || PositionError::IllegalMove {
        fen: fen.to_string(),
        mv: san.to_string(),
    };
    let parsed: San = san.parse().map_err(|_| illegal())?;
    let mv = parsed.to_move(&pos).map_err(|_| illegal())?;
    let next = pos.play(mv).map_err(|_| illegal())?;
    Ok(Fen::from_position(&next, EnPassantMode::Legal).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_to_move() {
        assert_eq!(side_to_move(STARTING_FEN).unwrap(), Color::White);
        let after_e4 = play_san(STARTING_FEN, "e4").unwrap();
        assert_eq!(side_to_move(&after_e4).unwrap(), Color::Black);
    }

    #[test]
    fn test_legal_sans_from_start() {
        let moves = legal_sans(STARTING_FEN).unwrap();
        assert_eq!(moves.len(), 20);
        assert!(moves.contains(&"Nf3".to_string()));
        assert!(moves.contains(&"e4".to_string()));
    }

    #[test]
    fn test_normalize_and_uci() {
        assert_eq!(normalize_san(STARTING_FEN, "Ngf3").unwrap(), "Nf3");
        assert_eq!(uci_to_san(STARTING_FEN, "g1f3").unwrap(), "Nf3");
        assert!(normalize_san(STARTING_FEN, "Ke2").is_err());
    }

    #[test]
    fn test_invalid_fen() {
        assert!(matches!(
            parse_fen("not a fen"),
            Err(PositionError::InvalidFen { .. })
        ));
    }
}
