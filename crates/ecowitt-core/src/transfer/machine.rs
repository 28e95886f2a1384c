//! Transfer-channel state machine.
//!
//! Pure transition logic; the service loop in `service.rs` performs the
//! I/O each transition calls for.

use std::fmt;

use super::error::TransferError;
use super::image::ImageSlot;
use crate::protocol::constants::CHUNK_SIZE;
use crate::protocol::TransferToken;

/// Where the conversation with the device stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferState {
    /// Waiting for `user1.bin` / `user2.bin`.
    #[default]
    Base,
    GotImage1,
    GotImage2,
    GotStart,
    GotContinue,
    /// Terminal.
    GotEnd,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Base => write!(f, "state_base"),
            TransferState::GotImage1 => write!(f, "got_user1"),
            TransferState::GotImage2 => write!(f, "got_user2"),
            TransferState::GotStart => write!(f, "got_start"),
            TransferState::GotContinue => write!(f, "got_continue"),
            TransferState::GotEnd => write!(f, "got_end"),
        }
    }
}

impl TransferState {
    pub const ALL: [TransferState; 6] = [
        TransferState::Base,
        TransferState::GotImage1,
        TransferState::GotImage2,
        TransferState::GotStart,
        TransferState::GotContinue,
        TransferState::GotEnd,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::GotEnd)
    }
}

/// What the service loop must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    /// Reply with the selected image's size, 4 bytes big-endian.
    AnnounceSize(ImageSlot),
    /// Send the next chunk of the selected image.
    SendChunk(ImageSlot),
    /// Device said `end`; nothing to send.
    Finish,
}

/// Per-connection transfer state.
#[derive(Debug, Default)]
pub struct TransferSession {
    state: TransferState,
    selected: Option<ImageSlot>,
    second_available: bool,
    packets_sent: u32,
    bytes_sent: u64,
}

impl TransferSession {
    pub fn new(second_available: bool) -> Self {
        Self {
            second_available,
            ..Self::default()
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn selected(&self) -> Option<ImageSlot> {
        self.selected
    }

    pub fn packets_sent(&self) -> u32 {
        self.packets_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply a token. On error the state is left untouched.
    pub fn on_token(&mut self, token: TransferToken) -> Result<TransferAction, TransferError> {
        use TransferState::*;

        let (next, action) = match (self.state, token) {
            (Base, TransferToken::User1) => (GotImage1, TransferAction::AnnounceSize(ImageSlot::First)),
            (Base, TransferToken::User2) => {
                if !self.second_available {
                    return Err(TransferError::ImageUnavailable {
                        slot: ImageSlot::Second,
                    });
                }
                (GotImage2, TransferAction::AnnounceSize(ImageSlot::Second))
            }
            (GotImage1 | GotImage2, TransferToken::Start) => (GotStart, self.chunk_action(token)?),
            (GotStart | GotContinue, TransferToken::Continue) => {
                (GotContinue, self.chunk_action(token)?)
            }
            (GotStart | GotContinue, TransferToken::End) => (GotEnd, TransferAction::Finish),
            (state, token) => {
                return Err(TransferError::ProtocolViolation {
                    state,
                    token: token.to_string(),
                });
            }
        };

        if let TransferAction::AnnounceSize(slot) = action {
            self.selected = Some(slot);
        }
        self.goto_state(next);
        Ok(action)
    }

    /// Account for a chunk that was sent.
    pub fn record_chunk(&mut self, len: usize) {
        self.packets_sent += 1;
        self.bytes_sent += len as u64;
    }

    fn chunk_action(&self, token: TransferToken) -> Result<TransferAction, TransferError> {
        self.selected
            .map(TransferAction::SendChunk)
            .ok_or_else(|| TransferError::ProtocolViolation {
                state: self.state,
                token: token.to_string(),
            })
    }

    fn goto_state(&mut self, next: TransferState) {
        if next != self.state {
            tracing::debug!(from = %self.state, to = %next, "Transfer state transition");
            self.state = next;
        }
    }
}

/// Number of chunks an image of `size` bytes is sent in.
pub fn chunk_count(size: u64) -> u64 {
    size.div_ceil(CHUNK_SIZE as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(state: TransferState, token: TransferToken) -> bool {
        use TransferState::*;
        matches!(
            (state, token),
            (Base, TransferToken::User1)
                | (Base, TransferToken::User2)
                | (GotImage1 | GotImage2, TransferToken::Start)
                | (GotStart | GotContinue, TransferToken::Continue)
                | (GotStart | GotContinue, TransferToken::End)
        )
    }

    /// Drive a fresh session into `target` along the happy path.
    fn session_in(target: TransferState) -> TransferSession {
        use TransferToken::*;
        let path: &[TransferToken] = match target {
            TransferState::Base => &[],
            TransferState::GotImage1 => &[User1],
            TransferState::GotImage2 => &[User2],
            TransferState::GotStart => &[User1, Start],
            TransferState::GotContinue => &[User1, Start, Continue],
            TransferState::GotEnd => &[User1, Start, End],
        };
        let mut session = TransferSession::new(true);
        for token in path {
            session.on_token(*token).unwrap();
        }
        assert_eq!(session.state(), target);
        session
    }

    #[test]
    fn test_happy_path() {
        let mut session = TransferSession::new(false);
        assert_eq!(
            session.on_token(TransferToken::User1).unwrap(),
            TransferAction::AnnounceSize(ImageSlot::First)
        );
        assert_eq!(session.state(), TransferState::GotImage1);
        assert_eq!(
            session.on_token(TransferToken::Start).unwrap(),
            TransferAction::SendChunk(ImageSlot::First)
        );
        assert_eq!(
            session.on_token(TransferToken::Continue).unwrap(),
            TransferAction::SendChunk(ImageSlot::First)
        );
        assert_eq!(
            session.on_token(TransferToken::Continue).unwrap(),
            TransferAction::SendChunk(ImageSlot::First)
        );
        assert_eq!(
            session.on_token(TransferToken::End).unwrap(),
            TransferAction::Finish
        );
        assert!(session.is_finished());
    }

    #[test]
    fn test_second_image_selected() {
        let mut session = TransferSession::new(true);
        session.on_token(TransferToken::User2).unwrap();
        assert_eq!(session.state(), TransferState::GotImage2);
        assert_eq!(session.selected(), Some(ImageSlot::Second));
        assert_eq!(
            session.on_token(TransferToken::Start).unwrap(),
            TransferAction::SendChunk(ImageSlot::Second)
        );
    }

    #[test]
    fn test_second_image_unavailable() {
        let mut session = TransferSession::new(false);
        let err = session.on_token(TransferToken::User2).unwrap_err();
        assert!(matches!(
            err,
            TransferError::ImageUnavailable {
                slot: ImageSlot::Second
            }
        ));
        assert_eq!(session.state(), TransferState::Base);
        assert_eq!(session.selected(), None);
    }

    #[test]
    fn test_invalid_tokens_are_violations_and_do_not_advance() {
        let non_terminal = [
            TransferState::Base,
            TransferState::GotImage1,
            TransferState::GotImage2,
            TransferState::GotStart,
            TransferState::GotContinue,
        ];
        for state in non_terminal {
            for token in TransferToken::ALL {
                if valid(state, token) {
                    continue;
                }
                let mut session = session_in(state);
                let err = session.on_token(token).unwrap_err();
                assert!(
                    matches!(err, TransferError::ProtocolViolation { .. }),
                    "{state} + {token} gave {err:?}"
                );
                assert_eq!(session.state(), state, "{state} + {token} advanced");
            }
        }
    }

    #[test]
    fn test_terminal_state_accepts_nothing() {
        for token in TransferToken::ALL {
            let mut session = session_in(TransferState::GotEnd);
            assert!(session.on_token(token).is_err());
            assert!(session.is_finished());
        }
    }

    #[test]
    fn test_record_chunk() {
        let mut session = TransferSession::new(false);
        session.record_chunk(1024);
        session.record_chunk(476);
        assert_eq!(session.packets_sent(), 2);
        assert_eq!(session.bytes_sent(), 1500);
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(0), 0);
        assert_eq!(chunk_count(1), 1);
        assert_eq!(chunk_count(1024), 1);
        assert_eq!(chunk_count(1025), 2);
        assert_eq!(chunk_count(1500), 2);
        assert_eq!(chunk_count(4096), 4);
    }

    #[test]
    fn test_state_names() {
        let names: Vec<String> = TransferState::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            [
                "state_base",
                "got_user1",
                "got_user2",
                "got_start",
                "got_continue",
                "got_end"
            ]
        );
    }
}
