//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::io;

use super::buffer::{BoundedBuf, WHITESPACE_CAPACITY, WORD_CAPACITY};
use super::formatter::{is_space, FormatterState};
use super::input::PageInput;

/// Result of [`Tokenizer::next_token`]. The word and the whitespace in
/// front of it stay in the tokenizer until the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Word { line_start: bool },
    EndOfInput,
}

/// Splits the input into words and the whitespace preceding them.
#[derive(Debug)]
pub struct Tokenizer {
    word: BoundedBuf<u8>,
    whitespace: BoundedBuf<u8>,
    column: usize,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            word: BoundedBuf::with_terminator(WORD_CAPACITY),
            whitespace: BoundedBuf::with_terminator(WHITESPACE_CAPACITY),
            column: 0,
        }
    }

    pub fn word(&self) -> &[u8] {
        &self.word
    }

    pub fn whitespace(&self) -> &[u8] {
        &self.whitespace
    }

    pub fn next_token(
        &mut self,
        input: &mut PageInput,
        state: &mut FormatterState,
    ) -> io::Result<Token> {
        // last blank was a newline
        let mut nl = false;
        // a newline was crossed anywhere in the run
        let mut crossed = false;
        // fill mode drops blanks between words, only indentation after a
        // newline is kept
        let mut discard = !state.catmode && !state.no_fill;
        self.whitespace.clear();

        let mut ch = input.read_byte()?;
        while let Some(c) = ch.filter(|&c| is_space(c)) {
            if nl && state.no_fill && c != b'\n' {
                break;
            }
            if nl && !state.catmode && c == b'\n' {
                self.whitespace.clear();
                self.word.set(b".sp".iter().copied());
                input.unget_byte(Some(c));
                return Ok(Token::Word { line_start: true });
            }

            nl = c == b'\n' || c == b'\r';
            if nl {
                crossed = true;
                self.column = 0;
            } else {
                self.column += 1;
            }

            if state.no_fill && nl && !self.whitespace.is_empty() {
                // trailing blanks of a no-fill line
                self.word.clear();
                input.unget_byte(Some(c));
                return Ok(Token::Word { line_start: false });
            }

            if !discard && (!nl || state.catmode) {
                if c == b'\t' && !state.catmode {
                    self.expand_tab(state.input_tab);
                } else if !self.whitespace.push(c) {
                    log::debug!("whitespace run truncated at {} bytes", self.whitespace.limit());
                }
            } else if c == b'\t' && !state.catmode {
                self.column = next_tab_stop(self.column - 1, state.input_tab);
            }

            if nl && !state.catmode && !state.no_fill {
                self.whitespace.clear();
                discard = false;
            }

            ch = input.read_byte()?;
        }

        if state.catmode && ch == Some(b'.') && nl {
            log::debug!("request line seen, leaving catmode");
            state.catmode = false;
        }

        self.word.clear();
        if ch.is_none() {
            return Ok(Token::EndOfInput);
        }
        input.unget_byte(ch);

        let mut truncated = false;
        loop {
            let Some(c) = input.read_byte()? else {
                break;
            };
            if is_space(c) {
                input.unget_byte(Some(c));
                break;
            }
            truncated |= !self.word.push(c);
            self.column += 1;
            if c == b'\\' {
                let Some(escaped) = input.read_byte()? else {
                    break;
                };
                truncated |= !self.word.push(escaped);
                self.column += 1;
            }
        }
        if truncated {
            log::debug!("word truncated at {} bytes", self.word.limit());
        }

        Ok(Token::Word {
            line_start: crossed,
        })
    }

    /// Replaces a tab with blanks up to the next tab stop.
    fn expand_tab(&mut self, input_tab: usize) {
        // the tab itself already advanced the column by one
        let stop = next_tab_stop(self.column - 1, input_tab);
        let blanks = stop.saturating_sub(self.column) + 1;
        self.column = self.column.max(stop);
        for _ in 0..blanks.min(self.whitespace.remaining()) {
            self.whitespace.push(b' ');
        }
    }

    /// Reads the rest of the line without the newline, which is pushed back.
    pub fn read_to_eol(&mut self, input: &mut PageInput) -> io::Result<Vec<u8>> {
        let mut rest = BoundedBuf::with_terminator(WORD_CAPACITY);
        loop {
            match input.read_byte()? {
                None => break,
                Some(b'\n') => {
                    input.unget_byte(Some(b'\n'));
                    break;
                }
                Some(c) => {
                    rest.push(c);
                }
            }
        }
        Ok(rest.to_vec())
    }
}

/// Column of the next tab stop after `column`.
fn next_tab_stop(column: usize, tab: usize) -> usize {
    (column / tab + 1) * tab
}
