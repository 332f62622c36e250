//! FEN loading and formatting.

use std::fmt::Write as _;
use std::str::FromStr;

use super::error::FenError;
use super::position::Position;
use super::state::GameState;
use super::types::{
    Color, Piece, Square, CASTLE_BLACK_K, CASTLE_BLACK_Q, CASTLE_WHITE_K, CASTLE_WHITE_Q,
};

impl Position {
    /// Parse a six-field FEN. The clock fields are optional and default to
    /// `0 1` when missing.
    pub fn from_fen(fen: &str) -> Result<Position, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(FenError::TooFewFields {
                found: fields.len(),
            });
        }

        let mut pos = Position::empty();

        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::BadRankCount { found: ranks.len() });
        }
        for (i, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - i;
            let mut file = 0usize;
            for ch in rank_str.chars() {
                if let Some(skip) = ch.to_digit(10) {
                    file += skip as usize;
                } else {
                    let piece = Piece::from_char(ch).ok_or(FenError::InvalidPiece { ch })?;
                    let color = if ch.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    if file >= 8 {
                        return Err(FenError::RankOverflow { rank });
                    }
                    pos.board.set_piece(Square::new(rank, file), color, piece);
                    file += 1;
                }
            }
            if file > 8 {
                return Err(FenError::RankOverflow { rank });
            }
        }

        if pos.board.pieces(Color::White, Piece::King).count() != 1
            || pos.board.pieces(Color::Black, Piece::King).count() != 1
        {
            return Err(FenError::BadKingCount);
        }

        let side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(FenError::InvalidSideToMove {
                    found: other.to_string(),
                })
            }
        };

        let mut castling_rights = 0u8;
        if fields[2] != "-" {
            for ch in fields[2].chars() {
                castling_rights |= match ch {
                    'K' => CASTLE_WHITE_K,
                    'Q' => CASTLE_WHITE_Q,
                    'k' => CASTLE_BLACK_K,
                    'q' => CASTLE_BLACK_Q,
                    _ => return Err(FenError::InvalidCastling { ch }),
                };
            }
        }

        let en_passant = if fields[3] == "-" {
            None
        } else {
            Some(
                Square::from_str(fields[3]).map_err(|_| FenError::InvalidEnPassant {
                    found: fields[3].to_string(),
                })?,
            )
        };

        let halfmove_clock = fields
            .get(4)
            .and_then(|f| f.parse::<u32>().ok())
            .unwrap_or(0);
        let fullmove_number = fields
            .get(5)
            .and_then(|f| f.parse::<u32>().ok())
            .unwrap_or(1)
            .max(1);

        pos.state = GameState {
            side_to_move,
            castling_rights,
            en_passant,
            halfmove_clock,
            fullmove_number,
            pawn_hash: 0,
        };
        pos.refresh_derived_state();
        Ok(pos)
    }

    /// Format the position as a six-field FEN string.
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut fen = String::with_capacity(90);
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.board.piece_at(Square::new(rank, file)) {
                    Some((color, piece)) => {
                        if empty > 0 {
                            let _ = write!(fen, "{empty}");
                            empty = 0;
                        }
                        fen.push(piece.to_fen_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                let _ = write!(fen, "{empty}");
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.state.side_to_move == Color::White {
            'w'
        } else {
            'b'
        });

        fen.push(' ');
        if self.state.castling_rights == 0 {
            fen.push('-');
        } else {
            if self.state.castling_rights & CASTLE_WHITE_K != 0 {
                fen.push('K');
            }
            if self.state.castling_rights & CASTLE_WHITE_Q != 0 {
                fen.push('Q');
            }
            if self.state.castling_rights & CASTLE_BLACK_K != 0 {
                fen.push('k');
            }
            if self.state.castling_rights & CASTLE_BLACK_Q != 0 {
                fen.push('q');
            }
        }

        match self.state.en_passant {
            Some(ep) => {
                let _ = write!(fen, " {ep}");
            }
            None => fen.push_str(" -"),
        }

        let _ = write!(
            fen,
            " {} {}",
            self.state.halfmove_clock, self.state.fullmove_number
        );
        fen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_round_trip() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.to_fen(), fen);
        assert_eq!(pos.board().occupied().count(), 32);
        assert_eq!(pos.side_to_move(), Color::White);
    }

    #[test]
    fn tolerates_missing_clocks() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - -").unwrap();
        assert_eq!(pos.halfmove_clock(), 0);
        assert_eq!(pos.fullmove_number(), 1);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Position::from_fen("").is_err());
        assert!(Position::from_fen("4k3/8/8/8/8/8/8/4K3").is_err());
        assert!(Position::from_fen("9k3/8/8/8/8/8/8/4K3 w - - 0 1").is_err());
        assert!(Position::from_fen("4k3/8/8/8/8/8/8/4K3 x - - 0 1").is_err());
        assert!(Position::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
    }

    #[test]
    fn kiwipete_piece_count() {
        let pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        assert_eq!(pos.board().occupied().count(), 32);
        assert_eq!(pos.castling_rights(), 0b1111);
    }
}
