//! Transfer-channel request tokens.
//!
//! The device sends each token as ASCII followed by a single NUL. The
//! terminator is part of the token: `b"start"` without it does not match.

use std::fmt;

use super::constants::{TOKEN_CONTINUE, TOKEN_END, TOKEN_START, TOKEN_USER1, TOKEN_USER2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferToken {
    /// `user1.bin` - first firmware image.
    User1,
    /// `user2.bin` - second firmware image (dual-image devices only).
    User2,
    Start,
    Continue,
    End,
}

impl TransferToken {
    pub const ALL: [TransferToken; 5] = [
        TransferToken::User1,
        TransferToken::User2,
        TransferToken::Start,
        TransferToken::Continue,
        TransferToken::End,
    ];

    /// Match a raw token, terminator included.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_bytes() == raw)
    }

    /// Wire form, terminator included.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            TransferToken::User1 => TOKEN_USER1,
            TransferToken::User2 => TOKEN_USER2,
            TransferToken::Start => TOKEN_START,
            TransferToken::Continue => TOKEN_CONTINUE,
            TransferToken::End => TOKEN_END,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransferToken::User1 => "user1.bin",
            TransferToken::User2 => "user2.bin",
            TransferToken::Start => "start",
            TransferToken::Continue => "continue",
            TransferToken::End => "end",
        }
    }
}

impl fmt::Display for TransferToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Printable rendering of an arbitrary token for logs and errors.
pub fn printable(raw: &[u8]) -> String {
    let trimmed = raw.strip_suffix(&[0]).unwrap_or(raw);
    trimmed
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}
