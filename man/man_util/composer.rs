//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::io::Write;

use super::buffer::{BoundedBuf, LINE_CAPACITY};
use super::font::{encode, Font, Glyph};
use super::formatter::{FormatError, Formatter};

/// Right margin adjustment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightAdjust {
    Off,
    On,
    /// Justify the line being flushed, then return to `On`
    Pending,
}

/// Glyphs of the line under composition.
#[derive(Debug)]
pub struct LineBuffer {
    glyphs: BoundedBuf<Glyph>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            glyphs: BoundedBuf::new(LINE_CAPACITY),
        }
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.glyphs.is_full()
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    fn last_byte(&self) -> Option<u8> {
        self.glyphs.last().and_then(|g| g.byte())
    }

    pub fn push_space(&mut self, font: Font) {
        self.glyphs.push(Glyph::Char { font, byte: b' ' });
    }

    fn push(&mut self, glyph: Glyph) {
        self.glyphs.push(glyph);
    }

    fn extend(&mut self, glyphs: &[Glyph]) -> bool {
        self.glyphs.extend_from_slice(glyphs)
    }

    fn clear(&mut self) {
        self.glyphs.clear();
    }
}

/// Extra spaces each gap receives so the line ends at the right margin.
///
/// Every gap gets `slack / gaps`; the `slack % gaps` leftover spaces go to the
/// first gaps on even page lines and to the last gaps on odd ones, so the
/// wider gaps do not stack up on one side of the page.
pub fn justify_extra(gaps: usize, slack: usize, line_on_page: usize) -> Vec<usize> {
    if gaps == 0 {
        return Vec::new();
    }
    let base = slack / gaps;
    let remainder = slack % gaps;
    (0..gaps)
        .map(|gap| {
            let wide = if line_on_page % 2 == 0 {
                gap < remainder
            } else {
                gap >= gaps - remainder
            };
            base + usize::from(wide)
        })
        .collect()
}

impl<W: Write> Formatter<W> {
    /// Appends a word (or a run of literal whitespace) to the line, wrapping
    /// first if it would reach the right margin.
    pub(crate) fn emit_word(&mut self, word: &[u8]) -> Result<(), FormatError> {
        let mut glyphs = encode(word, &mut self.state.current_font, self.settings.overstrike);
        if glyphs.is_empty() {
            return Ok(());
        }

        if !self.line.is_empty() {
            let after_period = usize::from(self.line.last_byte() == Some(b'.'));
            let available = self
                .settings
                .right_margin
                .saturating_sub(self.state.left_indent);
            if self.line.len() + after_period + glyphs.len() >= available {
                if self.state.right_adjust == RightAdjust::On {
                    self.state.right_adjust = RightAdjust::Pending;
                }
                self.line_break()?;
            }
        }

        // room for a sentence space and a gap
        if self.line.len() + 2 + glyphs.len() > LINE_CAPACITY {
            self.line_break()?;
        }

        if !self.line.is_empty()
            && !self.state.no_fill
            && self.line.last_byte().is_some_and(|b| b > b' ')
        {
            if self.line.last_byte() == Some(b'.') {
                self.line.push_space(self.state.current_font);
            }
            self.line.push(Glyph::Gap);
            self.state.gaps_on_line += 1;
        }

        if glyphs.len() > LINE_CAPACITY {
            log::debug!("word of {} glyphs truncated", glyphs.len());
            glyphs.truncate(LINE_CAPACITY);
        }
        self.line.extend(&glyphs);

        Ok(())
    }

    /// Writes out the composed line, justified if a wrap requested it.
    pub(crate) fn line_break(&mut self) -> Result<(), FormatError> {
        if self.line.is_empty() {
            return Ok(());
        }

        self.check_page_overflow()?;
        if self.page.top_of_page {
            self.print_header()?;
        }

        self.page.line_on_page += 1 + self.state.pending_nl;
        let mut out = Vec::with_capacity(2 * self.settings.right_margin);
        for _ in 0..self.state.pending_nl {
            out.push(b'\n');
        }
        self.state.pending_nl = 0;

        let gaps = self.state.gaps_on_line;
        let extra = if self.state.right_adjust == RightAdjust::Pending {
            self.state.right_adjust = RightAdjust::On;
            let slack = self
                .settings
                .right_margin
                .saturating_sub(self.state.left_indent + self.line.len());
            justify_extra(gaps, slack, self.page.line_on_page)
        } else {
            Vec::new()
        };

        out.resize(out.len() + self.state.left_indent, b' ');
        let mut gap = 0;
        for glyph in self.line.glyphs() {
            match glyph {
                Glyph::Gap => {
                    let n = 1 + extra.get(gap).copied().unwrap_or(0);
                    out.resize(out.len() + n, b' ');
                    gap += 1;
                }
                g => g.render(&mut out),
            }
        }
        out.push(b'\n');
        self.out.write_all(&out)?;

        self.line.clear();
        if let Some(indent) = self.state.next_line_indent.take() {
            self.state.left_indent = indent;
        }
        self.state.gaps_on_line = 0;
        Ok(())
    }
}
