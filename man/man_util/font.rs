//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::io::Write;

use super::buffer::{BoundedBuf, WORD_CAPACITY};
use super::formatter::{is_space, FormatError, Formatter};

/// Fonts a request or escape can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Font {
    #[default]
    Roman,
    Bold,
    Italic,
    Small,
}

impl Font {
    /// Font named by the letter of a `\fX` escape. Unknown letters select Roman.
    pub fn from_letter(letter: u8) -> Font {
        match letter {
            b'B' => Font::Bold,
            b'I' => Font::Italic,
            b'S' => Font::Small,
            _ => Font::Roman,
        }
    }

    pub fn letter(self) -> u8 {
        match self {
            Font::Roman => b'R',
            Font::Bold => b'B',
            Font::Italic => b'I',
            Font::Small => b'S',
        }
    }
}

/// One cell of the line buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Char { font: Font, byte: u8 },
    /// Justifiable inter-word space.
    Gap,
}

impl Glyph {
    pub fn byte(self) -> Option<u8> {
        match self {
            Glyph::Char { byte, .. } => Some(byte),
            Glyph::Gap => None,
        }
    }

    /// Terminal bytes for this glyph. Gaps are expanded by the caller.
    pub fn render(self, out: &mut Vec<u8>) {
        match self {
            Glyph::Char {
                font: Font::Bold,
                byte,
            } => out.extend_from_slice(&[byte, b'\x08', byte]),
            Glyph::Char {
                font: Font::Italic,
                byte,
            } => out.extend_from_slice(&[b'_', b'\x08', byte]),
            Glyph::Char { byte, .. } => out.push(byte),
            Glyph::Gap => {}
        }
    }
}

/// Translates the escapes of `word` and tags every produced byte with the
/// active font. `\fX` updates `font` in place, so a font switch carries over
/// to the following words. Without `overstrike`, font escapes are consumed
/// but the font never changes.
pub fn encode(word: &[u8], font: &mut Font, overstrike: bool) -> Vec<Glyph> {
    let mut glyphs = Vec::with_capacity(word.len());
    let mut i = 0;

    while i < word.len() {
        let b = word[i];
        i += 1;

        if b == b'\n' {
            continue;
        }
        if b != b'\\' {
            put(&mut glyphs, *font, b);
            continue;
        }

        let Some(&esc) = word.get(i) else {
            break;
        };
        i += 1;

        match esc {
            b'f' => {
                if let Some(&letter) = word.get(i) {
                    i += 1;
                    if overstrike {
                        *font = Font::from_letter(letter);
                    }
                }
            }
            b's' => {
                while word
                    .get(i)
                    .is_some_and(|c| matches!(c, b'+' | b'-' | b'0'..=b'9'))
                {
                    i += 1;
                }
            }
            b'(' => {
                let name = &word[i..word.len().min(i + 2)];
                i += name.len();
                let out = if name == b"mi" { b'-' } else { b'*' };
                put(&mut glyphs, *font, out);
            }
            b'*' => {
                if word.get(i) == Some(&b'(') {
                    i = word.len().min(i + 3);
                } else if i < word.len() {
                    i += 1;
                }
                put(&mut glyphs, *font, b'*');
            }
            c if c.is_ascii_alphabetic() || b"!&^[]|~".contains(&c) => {}
            c => put(&mut glyphs, *font, c),
        }
    }

    glyphs
}

fn put(glyphs: &mut Vec<Glyph>, font: Font, byte: u8) {
    glyphs.push(Glyph::Char { font, byte });
}

impl<W: Write> Formatter<W> {
    /// Renders the rest of the current request line, alternating between
    /// `this_font` and `other_font` at each unquoted word boundary. With
    /// `early_exit` only the first word is rendered and the remainder of the
    /// line is left in the input. The newline ending the line is pushed back.
    pub(crate) fn alternate(
        &mut self,
        mut this_font: Font,
        mut other_font: Font,
        early_exit: bool,
    ) -> Result<(), FormatError> {
        let mut word: BoundedBuf<u8> = BoundedBuf::with_terminator(WORD_CAPACITY);
        // text since the last font switch, and since the last flush
        let mut pending = false;
        let mut has_text = false;
        let mut in_quote = false;

        self.state.no_nl = false;

        let last = loop {
            if word.is_empty() {
                insert_font(&mut word, this_font);
                pending = false;
                has_text = false;
            }
            // a step appends at most five bytes and a flush needs three more
            if word.len() + 9 >= WORD_CAPACITY {
                self.flush_font_word(&mut word)?;
                continue;
            }

            let ch = self.input.read_byte()?;
            let c = match ch {
                None | Some(b'\n') => break ch,
                Some(c) => c,
            };

            if c == b'"' {
                in_quote = !in_quote;
                continue;
            }

            if in_quote || !is_space(c) {
                if is_space(c) && has_text {
                    self.flush_font_word(&mut word)?;
                    if self.state.no_fill {
                        self.emit_word(b" ")?;
                    }
                    continue;
                }
                word.push(c);
                pending = true;
                has_text = true;
                if c == b'\\' {
                    match self.input.read_byte()? {
                        None => break None,
                        Some(b'\n') => break Some(b'\n'),
                        Some(next) => {
                            word.push(next);
                        }
                    }
                }
                continue;
            }

            if pending {
                if early_exit {
                    break ch;
                }
                if this_font == other_font {
                    self.flush_font_word(&mut word)?;
                }
                std::mem::swap(&mut this_font, &mut other_font);
                if !word.is_empty() {
                    insert_font(&mut word, this_font);
                    pending = false;
                }
            }
        };
        self.input.unget_byte(last);

        if has_text {
            self.flush_font_word(&mut word)?;
        }
        Ok(())
    }

    /// Emits the accumulated word closed by a switch back to Roman.
    fn flush_font_word(&mut self, word: &mut BoundedBuf<u8>) -> Result<(), FormatError> {
        word.extend_from_slice(b"\\fR");
        self.emit_word(&word[..])?;
        word.clear();
        Ok(())
    }
}

fn insert_font(word: &mut BoundedBuf<u8>, font: Font) {
    word.extend_from_slice(&[b'\\', b'f', font.letter()]);
}
