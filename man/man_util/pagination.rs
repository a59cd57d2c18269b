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

/// Lines of the page header block and of the footer block.
const HEADER_LINES: usize = 6;
const FOOTER_LINES: usize = 3;

const HEADER_CAPACITY: usize = 255;

/// Page bookkeeping and the strings built from `.TH`.
#[derive(Debug)]
pub struct PageState {
    /// Lines written on the current page, header included
    pub line_on_page: usize,
    /// Nothing has been written on the current page yet
    pub top_of_page: bool,
    pub page_number: usize,
    pub header: String,
    /// Page footer without the page number
    pub footer: String,
    pub doc_footer: String,
    /// 0 disables pagination
    pub page_length: usize,
}

impl PageState {
    pub fn new(page_length: usize) -> Self {
        Self {
            line_on_page: 0,
            top_of_page: true,
            page_number: 1,
            header: String::new(),
            footer: String::new(),
            doc_footer: String::new(),
            page_length,
        }
    }

    pub fn paginated(&self) -> bool {
        self.page_length != 0
    }

    /// Last line text may occupy on a page.
    fn body_limit(&self) -> usize {
        self.page_length.saturating_sub(HEADER_LINES)
    }
}

/// Fields of a `.TH` line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TitleFields {
    pub title: String,
    pub section: String,
    pub date: String,
    pub source: String,
    pub manual: String,
}

impl TitleFields {
    fn from_slots(slots: [BoundedBuf<u8>; 5]) -> Self {
        let [title, section, date, source, manual] =
            slots.map(|s| String::from_utf8_lossy(&s).into_owned());
        Self {
            title,
            section,
            date,
            source,
            manual,
        }
    }

    fn name(&self) -> String {
        format!("{}({})", self.title, self.section)
    }

    /// Widths of the centered field and of the trailing title field, for a
    /// line that starts with `left_len` bytes and centers `middle_len` bytes.
    /// A negative width left-aligns.
    fn widths(&self, width: usize, left_len: usize, middle_len: usize) -> (isize, isize) {
        let half = (width / 2) as isize;
        let left = left_len as isize;
        let middle = middle_len as isize;
        let name = self.name().len() as isize;
        let title = self.title.len() as isize;
        let odd = middle & 1;
        (
            half - left + middle / 2 + odd,
            half - middle / 2 - name + title - odd,
        )
    }

    /// `title(section)`, manual name centered, `title(section)` again.
    pub fn header(&self, width: usize) -> String {
        let name = self.name();
        let (center, right) = self.widths(width, name.len(), self.manual.len());
        clip(format!(
            "{name}{}{}({})",
            pad(&self.manual, center),
            pad(&self.title, right),
            self.section
        ))
    }

    /// Source on the left, date centered, `title(section)` on the right.
    pub fn doc_footer(&self, width: usize) -> String {
        let (center, right) = self.widths(width, self.source.len(), self.date.len());
        clip(format!(
            "{}{}{}({})",
            self.source,
            pad(&self.date, center),
            pad(&self.title, right),
            self.section
        ))
    }

    /// Source on the left and date centered; the page number follows.
    pub fn page_footer(&self, width: usize) -> String {
        let (center, _) = self.widths(width, self.source.len(), self.date.len());
        clip(format!("{}{}", self.source, pad(&self.date, center)))
    }
}

/// Right-aligns `s` in `width` columns; a negative width left-aligns.
fn pad(s: &str, width: isize) -> String {
    let w = width.unsigned_abs();
    if width >= 0 {
        format!("{s:>w$}")
    } else {
        format!("{s:<w$}")
    }
}

/// Limits a header line to what the line slot holds.
fn clip(mut line: String) -> String {
    let mut end = line.len().min(HEADER_CAPACITY);
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    line.truncate(end);
    line
}

impl<W: Write> Formatter<W> {
    /// Parses the `.TH` arguments on the rest of the line and rebuilds the
    /// header and footers. The rest of the line is consumed.
    pub(crate) fn build_headers(&mut self) -> Result<(), FormatError> {
        let mut slots: [BoundedBuf<u8>; 5] =
            std::array::from_fn(|_| BoundedBuf::with_terminator(WORD_CAPACITY));
        let mut field = 0;
        let mut last = 0u8;
        let mut in_quote = false;

        let stop = loop {
            let ch = self.input.read_byte()?;
            let c = match ch {
                None | Some(b'\n') => break ch,
                Some(c) => c,
            };
            if c == b'"' {
                if last == b'\\' {
                    // \" starts a comment
                    slots[field].pop();
                    break ch;
                }
                in_quote = !in_quote;
                continue;
            }
            last = c;
            if in_quote || !is_space(c) {
                slots[field].push(c);
                continue;
            }
            if !slots[field].is_empty() {
                field += 1;
                if field == slots.len() {
                    break ch;
                }
            }
        };
        self.input.unget_byte(stop);

        let fields = TitleFields::from_slots(slots);
        log::debug!("title fields {fields:?}");
        let width = self.settings.right_margin;
        self.page.header = fields.header(width);
        self.page.footer = fields.page_footer(width);
        self.page.doc_footer = fields.doc_footer(width);

        self.skip_to_eol()?;
        Ok(())
    }

    pub(crate) fn print_header(&mut self) -> Result<(), FormatError> {
        self.page.top_of_page = false;
        self.page.line_on_page = 0;
        self.state.pending_nl = 0;

        if self.page.paginated() {
            write!(self.out, "\n\n\n{}\n\n\n", self.page.header)?;
            self.page.line_on_page = HEADER_LINES;
        } else if !self.page.header.is_empty() {
            write!(self.out, "{}\n\n", self.page.header)?;
            self.page.line_on_page = 2;
        }
        Ok(())
    }

    pub(crate) fn print_footer(&mut self) -> Result<(), FormatError> {
        if !self.page.paginated() {
            return Ok(());
        }

        let footer_at = self.page.page_length - FOOTER_LINES;
        let mut out = Vec::new();
        while self.page.line_on_page < footer_at {
            out.push(b'\n');
            self.page.line_on_page += 1;
        }
        let number = self.page.page_number.to_string();
        let width = self.settings.right_margin.saturating_sub(self.page.footer.len());
        write!(out, "{}{number:>width$}\n\n\n", self.page.footer)?;
        self.out.write_all(&out)?;

        log::debug!("finished page {}", self.page.page_number);
        self.page.page_number += 1;
        self.page.line_on_page = 0;
        self.page.top_of_page = true;
        Ok(())
    }

    /// Starts a new page if the next line (and the blank lines owed before
    /// it) would run into the footer.
    pub(crate) fn check_page_overflow(&mut self) -> Result<(), FormatError> {
        if !self.page.paginated() || self.page.top_of_page {
            return Ok(());
        }
        if self.page.line_on_page + self.state.pending_nl + 1 > self.page.body_limit() {
            self.print_footer()?;
        }
        Ok(())
    }

    pub(crate) fn page_break(&mut self) -> Result<(), FormatError> {
        self.line_break()?;
        if !self.page.top_of_page {
            self.print_footer()?;
        }
        Ok(())
    }

    pub(crate) fn print_doc_footer(&mut self) -> Result<(), FormatError> {
        self.line_break()?;
        self.out.write_all(b"\n\n\n")?;
        if !self.page.doc_footer.is_empty() {
            writeln!(self.out, "{}", self.page.doc_footer)?;
        }
        Ok(())
    }
}
