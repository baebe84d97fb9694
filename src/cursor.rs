//! Input cursor and savepoints.
//!
//! Mirrors the reference implementation's `position`/`savepoint`/`read`: the cursor tracks
//! an offset, a 1-based line/col, and the rune currently under the cursor along with its
//! UTF-8 byte width, so that restoring a savepoint is an O(1) struct copy.

use std::char::REPLACEMENT_CHARACTER;

/// A line/column/byte-offset position in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
    pub offset: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} ({})", self.line, self.col, self.offset)
    }
}

/// A snapshot of the cursor, cheap to copy and restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint {
    pub position: Position,
    pub rune: char,
    pub width: usize,
}

impl Savepoint {
    pub fn offset(&self) -> usize {
        self.position.offset
    }
}

/// Walks `data` one code point at a time, tracking line/col and exposing
/// snapshot/restore for backtracking.
pub struct Cursor<'a> {
    data: &'a [u8],
    pt: Savepoint,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let mut c = Cursor {
            data,
            pt: Savepoint {
                position: Position { line: 1, col: 0, offset: 0 },
                rune: REPLACEMENT_CHARACTER,
                width: 0,
            },
        };
        c.read();
        c
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn save(&self) -> Savepoint {
        self.pt
    }

    pub fn restore(&mut self, pt: Savepoint) {
        self.pt = pt;
    }

    pub fn position(&self) -> Position {
        self.pt.position
    }

    pub fn rune(&self) -> char {
        self.pt.rune
    }

    pub fn at_eof(&self) -> bool {
        self.pt.rune == REPLACEMENT_CHARACTER && self.pt.width == 0
    }

    /// Returns `true` if the byte at the *current* position begins an invalid UTF-8
    /// sequence (as opposed to legitimately being end-of-input).
    fn current_is_invalid_encoding(&self) -> bool {
        self.pt.rune == REPLACEMENT_CHARACTER
            && self.pt.width == 1
            && self.pt.position.offset < self.data.len()
    }

    /// Advance the cursor past the rune under it and decode the next one. Returns `true`
    /// if the rune just consumed was an invalid-encoding byte (width 1, replacement char)
    /// rather than legitimate end-of-input.
    pub fn read(&mut self) -> bool {
        let invalid = self.current_is_invalid_encoding();
        self.pt.position.offset += self.pt.width;
        let rest = &self.data[self.pt.position.offset.min(self.data.len())..];
        let (rune, width) = decode_rune(rest);
        self.pt.rune = rune;
        self.pt.width = width;
        self.pt.position.col += 1;
        if rune == '\n' {
            self.pt.position.line += 1;
            self.pt.position.col = 0;
        }
        invalid
    }

    /// Byte slice from `start` to the current position.
    pub fn slice_from(&self, start: Savepoint) -> &'a [u8] {
        &self.data[start.offset()..self.pt.position.offset]
    }
}

/// Decodes the first code point of `bytes`. Mirrors `utf8.DecodeRune`: an empty slice
/// decodes to `(REPLACEMENT_CHARACTER, 0)`; an invalid leading byte decodes to
/// `(REPLACEMENT_CHARACTER, 1)`.
fn decode_rune(bytes: &[u8]) -> (char, usize) {
    if bytes.is_empty() {
        return (REPLACEMENT_CHARACTER, 0);
    }
    match std::str::from_utf8(&bytes[..bytes.len().min(4)]) {
        Ok(s) => {
            let c = s.chars().next().unwrap();
            (c, c.len_utf8())
        }
        Err(e) => {
            if e.valid_up_to() > 0 {
                let s = unsafe { std::str::from_utf8_unchecked(&bytes[..e.valid_up_to()]) };
                let c = s.chars().next().unwrap();
                (c, c.len_utf8())
            } else {
                (REPLACEMENT_CHARACTER, 1)
            }
        }
    }
}
