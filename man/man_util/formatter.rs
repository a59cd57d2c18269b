//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::io::{self, Read, Write};
use std::path::PathBuf;
use thiserror::Error;

use super::composer::{LineBuffer, RightAdjust};
use super::font::Font;
use super::input::{PageInput, PageOpener};
use super::pagination::PageState;
use super::tokenizer::{Token, Tokenizer};

/// Widest line the composer will produce.
pub const MAX_RIGHT_MARGIN: usize = 250;

/// Shortest page that still fits header, footer and some text.
pub const MIN_PAGE_LENGTH: usize = 16;

/// Formatting settings supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct FormattingSettings {
    /// Last column text may occupy
    pub right_margin: usize,
    /// Lines per page; 0 disables pagination
    pub page_length: usize,
    /// Report unknown requests inline
    pub verbose: bool,
    /// Indent step of `RS`, `IP`, `TP` and friends
    pub standard_tab: usize,
    /// Initial input tab width
    pub input_tab: usize,
    /// Render bold and italic with backspace overstrikes
    pub overstrike: bool,
}

impl Default for FormattingSettings {
    fn default() -> Self {
        Self {
            right_margin: 78,
            page_length: 0,
            verbose: true,
            standard_tab: 5,
            input_tab: 8,
            overstrike: false,
        }
    }
}

impl FormattingSettings {
    /// Clamps values the engine can not honour.
    pub fn normalized(mut self) -> Self {
        self.right_margin = self.right_margin.clamp(1, MAX_RIGHT_MARGIN);
        if self.page_length != 0 {
            self.page_length = self.page_length.max(MIN_PAGE_LENGTH);
        }
        if self.input_tab == 0 {
            self.input_tab = 8;
        }
        self.standard_tab = self.standard_tab.min(self.right_margin);
        self
    }
}

/// Errors that abort formatting of a document.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Target of a `.so` request could not be opened
    #[error("cannot open .so file {}", .0.display())]
    IncludeNotFound(PathBuf),

    /// Reading the page or writing the output failed
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Formatting state shared by the request interpreter and the composer.
#[derive(Debug)]
pub struct FormatterState {
    /// Preformatted pass-through; left for good at the first `.` line
    pub catmode: bool,
    pub no_fill: bool,
    /// Newlines that still force a break
    pub keep_nl: usize,
    /// The next kept newline may pad to the hanging indent instead
    pub optional_keep: bool,
    /// The newline ending the current request line is not significant
    pub no_nl: bool,
    pub left_indent: usize,
    /// Indent restored by `PP`
    pub old_para_indent: usize,
    /// Indent applied after the next line break
    pub next_line_indent: Option<usize>,
    pub right_adjust: RightAdjust,
    pub current_font: Font,
    /// Blank lines owed before the next line
    pub pending_nl: usize,
    pub gaps_on_line: usize,
    pub input_tab: usize,
}

impl FormatterState {
    pub(crate) fn new(settings: &FormattingSettings) -> Self {
        Self {
            catmode: true,
            no_fill: false,
            keep_nl: 0,
            optional_keep: false,
            no_nl: true,
            left_indent: 0,
            old_para_indent: 0,
            next_line_indent: None,
            right_adjust: RightAdjust::On,
            current_font: Font::Roman,
            pending_nl: 0,
            gaps_on_line: 0,
            input_tab: settings.input_tab,
        }
    }
}

/// Single-pass `-man` formatter writing to `W`.
pub struct Formatter<W: Write> {
    pub(crate) settings: FormattingSettings,
    pub(crate) state: FormatterState,
    pub(crate) page: PageState,
    pub(crate) line: LineBuffer,
    pub(crate) tokenizer: Tokenizer,
    pub(crate) input: PageInput,
    pub(crate) opener: Box<dyn PageOpener>,
    /// Directory `.so` paths are relative to
    pub(crate) document_dir: PathBuf,
    pub(crate) out: W,
}

impl<W: Write> Formatter<W> {
    pub fn new(
        settings: FormattingSettings,
        input: Box<dyn Read>,
        opener: Box<dyn PageOpener>,
        document_dir: PathBuf,
        out: W,
    ) -> Self {
        let settings = settings.normalized();
        Self {
            state: FormatterState::new(&settings),
            page: PageState::new(settings.page_length),
            line: LineBuffer::new(),
            tokenizer: Tokenizer::new(),
            input: PageInput::new(input),
            opener,
            document_dir,
            out,
            settings,
        }
    }

    /// Formats the whole document. On error, output already written stays.
    pub fn run(&mut self) -> Result<(), FormatError> {
        self.input.unget_byte(Some(b'\r'));
        let mut at_start = true;

        loop {
            let was_catmode = self.state.catmode;
            let token = self.tokenizer.next_token(&mut self.input, &mut self.state)?;

            if was_catmode {
                // whitespace before the first request still belongs to the
                // preformatted text
                let ws = self.tokenizer.whitespace();
                let ws = if at_start { strip_primer(ws) } else { ws };
                let skip = self.state.catmode && is_catmode_hint(self.tokenizer.word());
                if !skip {
                    self.out.write_all(ws)?;
                }
            }
            at_start = false;

            let line_start = match token {
                Token::Word { line_start } => line_start,
                Token::EndOfInput => break,
            };

            if self.state.catmode {
                if is_catmode_hint(self.tokenizer.word()) {
                    self.skip_to_eol()?;
                } else {
                    self.out.write_all(self.tokenizer.word())?;
                }
            } else {
                self.process_formatted(line_start)?;
            }
        }

        if !self.state.catmode {
            self.print_doc_footer()?;
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn process_formatted(&mut self, line_start: bool) -> Result<(), FormatError> {
        let mut padded = false;
        if self.state.keep_nl > 0 && line_start && !self.state.no_nl {
            if self.state.optional_keep {
                self.state.optional_keep = false;
                padded = self.keep_or_pad()?;
            } else {
                self.line_break()?;
            }
            self.state.keep_nl -= 1;
        }

        if line_start && self.state.no_fill {
            self.line_break()?;
        }

        let ws = self.tokenizer.whitespace();
        if line_start && is_request(self.tokenizer.word()) && !is_indented(ws) {
            self.state.no_nl = true;
            self.do_command()
        } else {
            let ws = self.tokenizer.whitespace().to_vec();
            let word = self.tokenizer.word().to_vec();
            if !ws.is_empty() && !padded {
                self.emit_word(&ws)?;
            }
            self.emit_word(&word)?;
            self.state.no_nl = false;
            Ok(())
        }
    }

    /// Hanging tag: pad the tag up to the armed indent when it fits,
    /// otherwise break the line. Returns whether the tag was padded.
    fn keep_or_pad(&mut self) -> Result<bool, FormatError> {
        let target = match self.state.next_line_indent {
            Some(indent) if !self.line.is_empty() => indent,
            _ => {
                self.line_break()?;
                return Ok(false);
            }
        };
        if self.state.left_indent + self.line.len() + 1 > target {
            self.line_break()?;
            return Ok(false);
        }
        while self.state.left_indent + self.line.len() + 1 <= target && !self.line.is_full() {
            self.line.push_space(self.state.current_font);
        }
        Ok(true)
    }

    /// Discards the rest of the input line and returns it. The newline is
    /// pushed back.
    pub(crate) fn skip_to_eol(&mut self) -> Result<Vec<u8>, FormatError> {
        let rest = self.tokenizer.read_to_eol(&mut self.input)?;
        Ok(rest)
    }
}

/// A word at the start of a line that names a request.
fn is_request(word: &[u8]) -> bool {
    matches!(word.first(), Some(b'.') | Some(b'\''))
}

/// Blanks after the last newline; an indented control character is text.
fn is_indented(ws: &[u8]) -> bool {
    ws.rsplit(|&b| b == b'\n' || b == b'\r')
        .next()
        .is_some_and(|tail| !tail.is_empty())
}

/// Preprocessor hints such as `'\" t` found in preformatted pages.
fn is_catmode_hint(word: &[u8]) -> bool {
    word == b"'\\\"" || word == b"'''"
}

/// The formatter primes every stream with `\r`; it is never output.
fn strip_primer(ws: &[u8]) -> &[u8] {
    ws.strip_prefix(b"\r").unwrap_or(ws)
}

/// `isspace` in the C locale.
pub fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}
