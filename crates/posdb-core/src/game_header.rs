use serde::{Deserialize, Serialize};

use crate::origin::GameResult;

/// Metadata of a representative game, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameHeader {
    #[serde(default)]
    pub game_id: Option<u32>,
    #[serde(default)]
    pub result: Option<GameResult>,
    #[serde(default)]
    pub date: Option<String>, // "2019.??.??" style, unknown parts as '?'
    #[serde(default)]
    pub eco: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub white: Option<String>,
    #[serde(default)]
    pub black: Option<String>,
    #[serde(default)]
    pub ply_count: Option<u16>,
}

impl GameHeader {
    /// Date with unknown trailing components dropped: "2019.??.??" -> "2019".
    pub fn date_omit_unknown(&self) -> Option<String> {
        let date = self.date.as_deref()?;
        let known: Vec<&str> = date
            .split('.')
            .take_while(|part| !part.is_empty() && !part.contains('?'))
            .collect();
        if known.is_empty() {
            None
        } else {
            Some(known.join("."))
        }
    }

    /// One-line summary: "White - Black 1-0 [C20] (34)".
    pub fn summary(&self) -> String {
        format!(
            "{} - {} {} [{}] ({})",
            self.white.as_deref().unwrap_or("?"),
            self.black.as_deref().unwrap_or("?"),
            self.result.map(|r| r.pgn()).unwrap_or("*"),
            self.eco.as_deref().unwrap_or("?"),
            self.ply_count.unwrap_or(0) / 2,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_partial_header() {
        let header: GameHeader = serde_json::from_str(
            r#"{"game_id": 7, "result": "draw", "white": "Carlsen", "black": "Caruana", "ply_count": 81}"#,
        )
        .unwrap();
        assert_eq!(header.game_id, Some(7));
        assert_eq!(header.result, Some(GameResult::Draw));
        assert_eq!(header.summary(), "Carlsen - Caruana 1/2-1/2 [?] (40)");
    }

    #[test]
    fn test_date_omit_unknown() {
        let mut header: GameHeader = serde_json::from_str("{}").unwrap();
        header.date = Some("2019.05.??".into());
        assert_eq!(header.date_omit_unknown().as_deref(), Some("2019.05"));
        header.date = Some("????.??.??".into());
        assert_eq!(header.date_omit_unknown(), None);
    }
}
