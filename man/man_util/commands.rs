//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::io::Write;

use super::buffer::WHITESPACE_CAPACITY;
use super::composer::RightAdjust;
use super::font::Font;
use super::formatter::{is_space, FormatError, Formatter};

/// Requests that read the rest of their line as an optional argument and
/// flush the current line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakRequest {
    NoFill,
    Fill,
    Space,
    Break,
    PageBreak,
    Paragraph,
    RelativeStart,
    RelativeEnd,
    HangingParagraph,
    Adjust,
    NoAdjust,
    Tab,
}

/// Requests whose behaviour depends on whether arguments follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRequest {
    Title,
    Section,
    Subsection,
    IndentedParagraph,
    TaggedParagraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Comments and requests without an effect on plain text
    Ignore,
    Break(BreakRequest),
    Header(HeaderRequest),
    /// Alternating font pair
    Fonts(Font, Font),
    Include,
}

lazy_static::lazy_static! {
    static ref REQUESTS: HashMap<&'static str, Request> = {
        use BreakRequest::*;
        use Font::{Bold, Italic, Roman, Small};
        use HeaderRequest::*;

        HashMap::from([
            ("\\\"", Request::Ignore),
            ("nh", Request::Ignore),
            ("hy", Request::Ignore),
            ("PD", Request::Ignore),
            ("DT", Request::Ignore),
            ("IX", Request::Ignore),
            ("Id", Request::Ignore),
            ("BY", Request::Ignore),
            ("nf", Request::Break(NoFill)),
            ("fi", Request::Break(Fill)),
            ("sp", Request::Break(Space)),
            ("br", Request::Break(Break)),
            ("bp", Request::Break(PageBreak)),
            ("PP", Request::Break(Paragraph)),
            ("LP", Request::Break(Paragraph)),
            ("P", Request::Break(Paragraph)),
            ("RS", Request::Break(RelativeStart)),
            ("RE", Request::Break(RelativeEnd)),
            ("HP", Request::Break(HangingParagraph)),
            ("ad", Request::Break(Adjust)),
            ("na", Request::Break(NoAdjust)),
            ("ta", Request::Break(Tab)),
            ("TH", Request::Header(Title)),
            ("SH", Request::Header(Section)),
            ("SS", Request::Header(Subsection)),
            ("IP", Request::Header(IndentedParagraph)),
            ("TP", Request::Header(TaggedParagraph)),
            ("B", Request::Fonts(Bold, Bold)),
            ("BI", Request::Fonts(Bold, Italic)),
            ("BR", Request::Fonts(Bold, Roman)),
            ("I", Request::Fonts(Italic, Italic)),
            ("IB", Request::Fonts(Italic, Bold)),
            ("IR", Request::Fonts(Italic, Roman)),
            ("RB", Request::Fonts(Roman, Bold)),
            ("RI", Request::Fonts(Roman, Italic)),
            ("SB", Request::Fonts(Small, Bold)),
            ("SM", Request::Fonts(Small, Small)),
            // HP-UX constant width
            ("C", Request::Fonts(Bold, Bold)),
            ("CI", Request::Fonts(Bold, Italic)),
            ("CR", Request::Fonts(Bold, Roman)),
            ("IC", Request::Fonts(Italic, Bold)),
            ("RC", Request::Fonts(Roman, Bold)),
            ("so", Request::Include),
        ])
    };
}

/// Looks up a request by its name (the word after the control character).
pub fn lookup(name: &[u8]) -> Option<Request> {
    // comments need no space after the marker
    if name.is_empty() || name.starts_with(b"\\\"") || name.starts_with(b"''") {
        return Some(Request::Ignore);
    }
    std::str::from_utf8(name)
        .ok()
        .and_then(|name| REQUESTS.get(name))
        .copied()
}

/// `atoi`-style argument of `.ta`; anything not positive selects 8. Stops
/// past a whitespace run are never reached.
fn parse_tab(arg: &[u8]) -> usize {
    let arg = String::from_utf8_lossy(arg);
    let arg = arg.trim_start();
    let end = arg
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(arg.len(), |(i, _)| i);
    match arg[..end].parse::<i64>() {
        Ok(n) if n > 0 => n.min(WHITESPACE_CAPACITY as i64) as usize,
        _ => 8,
    }
}

impl<W: Write> Formatter<W> {
    /// Executes the request named by the current word.
    pub(crate) fn do_command(&mut self) -> Result<(), FormatError> {
        let word = self.tokenizer.word().to_vec();
        let name = &word[1..];

        let request = match lookup(name) {
            Some(request) => request,
            None => {
                self.unknown_request(name)?;
                Request::Ignore
            }
        };
        log::trace!("request .{} {:?}", String::from_utf8_lossy(name), request);

        match request {
            Request::Ignore => {
                self.skip_to_eol()?;
                Ok(())
            }
            Request::Break(request) => {
                let arg = self.skip_to_eol()?;
                self.do_break(request, &arg)
            }
            Request::Header(request) => self.do_header(request),
            Request::Fonts(this_font, other_font) => self.alternate(this_font, other_font, false),
            Request::Include => self.include(),
        }
    }

    fn unknown_request(&mut self, name: &[u8]) -> Result<(), FormatError> {
        let shown = String::from_utf8_lossy(&name[..name.len().min(3)]).into_owned();
        log::warn!(
            "line {}: unknown request .{}",
            self.input.line_number(),
            shown
        );
        if !self.settings.verbose {
            return Ok(());
        }

        self.line_break()?;
        let indent = std::mem::replace(&mut self.state.left_indent, 0);
        let armed = self.state.next_line_indent.take();
        let message = format!("**** Unknown formatter command: .{shown}");
        self.emit_word(message.as_bytes())?;
        self.line_break()?;
        self.state.left_indent = indent;
        self.state.next_line_indent = armed;
        self.state.pending_nl = 1;
        Ok(())
    }

    fn do_break(&mut self, request: BreakRequest, arg: &[u8]) -> Result<(), FormatError> {
        self.line_break()?;

        let tab = self.settings.standard_tab;
        match request {
            BreakRequest::NoFill => self.state.no_fill = true,
            BreakRequest::Fill => self.state.no_fill = false,
            BreakRequest::Space => self.state.pending_nl = 1,
            BreakRequest::Break => {}
            BreakRequest::PageBreak => self.page_break()?,
            BreakRequest::Paragraph => {
                self.state.left_indent = self.state.old_para_indent;
                self.state.pending_nl = 1;
            }
            BreakRequest::RelativeStart => {
                self.state.pending_nl = 1;
                self.state.left_indent += tab;
                self.state.old_para_indent += tab;
            }
            BreakRequest::RelativeEnd => {
                self.state.pending_nl = 1;
                self.state.left_indent = self.state.left_indent.saturating_sub(tab);
                self.state.old_para_indent = self.state.old_para_indent.saturating_sub(tab);
            }
            BreakRequest::HangingParagraph => {
                self.state.pending_nl = 1;
                self.state.left_indent = self.state.old_para_indent;
                self.state.next_line_indent = Some(self.state.old_para_indent + tab);
            }
            BreakRequest::Adjust => self.state.right_adjust = RightAdjust::On,
            BreakRequest::NoAdjust => self.state.right_adjust = RightAdjust::Off,
            BreakRequest::Tab => {
                self.state.input_tab = parse_tab(arg);
                log::debug!("input tab set to {}", self.state.input_tab);
            }
        }
        Ok(())
    }

    fn do_header(&mut self, request: HeaderRequest) -> Result<(), FormatError> {
        self.line_break()?;

        let next = loop {
            match self.input.read_byte()? {
                Some(b' ') | Some(b'\t') => continue,
                other => break other,
            }
        };
        self.input.unget_byte(next);
        let has_args = next != Some(b'\n');

        let tab = self.settings.standard_tab;
        match request {
            HeaderRequest::Title => {
                self.page_break()?;
                self.state.left_indent = tab;
                self.state.old_para_indent = tab;
                if has_args {
                    self.build_headers()?;
                }
            }
            HeaderRequest::Section | HeaderRequest::Subsection => {
                let (indent, font) = if request == HeaderRequest::Section {
                    (0, Font::Bold)
                } else {
                    (tab / 2, Font::Italic)
                };
                self.state.left_indent = indent;
                self.state.next_line_indent = Some(tab);
                self.state.old_para_indent = tab;
                self.state.keep_nl = 1;
                self.state.pending_nl = 1;
                if has_args {
                    self.alternate(font, font, false)?;
                }
            }
            HeaderRequest::IndentedParagraph if has_args => {
                self.arm_hanging_indent();
                self.alternate(Font::Roman, Font::Roman, true)?;
                self.skip_to_eol()?;
            }
            HeaderRequest::IndentedParagraph => {
                self.state.pending_nl = 1;
                self.state.left_indent = self.state.old_para_indent + tab;
            }
            HeaderRequest::TaggedParagraph => {
                self.skip_to_eol()?;
                self.arm_hanging_indent();
            }
        }
        Ok(())
    }

    /// The next line is a tag at the paragraph indent; text continues one
    /// tab further in.
    fn arm_hanging_indent(&mut self) {
        let base = self.state.old_para_indent;
        self.state.next_line_indent = Some(base + self.settings.standard_tab);
        self.state.left_indent = base;
        self.state.pending_nl = 1;
        self.state.keep_nl = 1;
        self.state.optional_keep = true;
    }

    /// `.so path`: continues with the named page in place of the current
    /// stream.
    fn include(&mut self) -> Result<(), FormatError> {
        let mut name = Vec::new();
        loop {
            match self.input.read_byte()? {
                Some(c) if c != b'\n' && is_space(c) && name.is_empty() => continue,
                Some(c) if !is_space(c) => name.push(c),
                _ => break,
            }
        }
        let path = self
            .document_dir
            .join(String::from_utf8_lossy(&name).as_ref());
        self.input.close();

        log::debug!("including {}", path.display());
        let reader = match self.opener.open(&path) {
            Ok(reader) => reader,
            Err(e) => {
                log::debug!("{}: {}", path.display(), e);
                return Err(FormatError::IncludeNotFound(path));
            }
        };
        self.input.switch_to(reader);
        self.input.unget_byte(Some(b'\r'));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::man_util::formatter::tests::{body, format_page, format_with, TEST_SETTINGS};
    use crate::man_util::formatter::FormattingSettings;
    use crate::man_util::input::MemoryOpener;
    use rstest::rstest;
    use std::io::Cursor;
    use std::path::PathBuf;

    #[rstest]
    #[case(b"B", Some(Request::Fonts(Font::Bold, Font::Bold)))]
    #[case(b"SB", Some(Request::Fonts(Font::Small, Font::Bold)))]
    #[case(b"CR", Some(Request::Fonts(Font::Bold, Font::Roman)))]
    #[case(b"LP", Some(Request::Break(BreakRequest::Paragraph)))]
    #[case(b"\\\" anything", Some(Request::Ignore))]
    #[case(b"\\\"", Some(Request::Ignore))]
    #[case(b"''", Some(Request::Ignore))]
    #[case(b"so", Some(Request::Include))]
    #[case(b"sh", None)]
    #[case(b"XY", None)]
    fn looks_up_requests(#[case] name: &[u8], #[case] expected: Option<Request>) {
        assert_eq!(lookup(name), expected);
    }

    #[rstest]
    #[case(b" 4", 4)]
    #[case(b"  12 24", 12)]
    #[case(b" +3", 3)]
    #[case(b"", 8)]
    #[case(b" 0", 8)]
    #[case(b" -4", 8)]
    #[case(b" x", 8)]
    #[case(b" 100000000000", WHITESPACE_CAPACITY)]
    fn parses_tab_argument(#[case] arg: &[u8], #[case] expected: usize) {
        assert_eq!(parse_tab(arg), expected);
    }

    #[test]
    fn unknown_request_is_reported_at_column_zero() {
        assert_eq!(
            body(".br\nword\n.RS\n.XYZ arg\nmore\n"),
            "word\n\n**** Unknown formatter command: .XYZ\n\n     more\n"
        );
    }

    #[test]
    fn unknown_request_is_silent_when_quiet() {
        let settings = FormattingSettings {
            verbose: false,
            ..TEST_SETTINGS
        };
        assert_eq!(
            format_with(settings, ".br\nword\n.XY arg\nmore\n"),
            "word more\n\n\n\n"
        );
    }

    #[test]
    fn section_titles() {
        assert_eq!(
            body(".SH NAME\nls \\- list\n"),
            "NAME\n     ls - list\n"
        );
        assert_eq!(
            body(".br\nx\n.SS \"Sub title\"\ny\n"),
            "x\n\n  Sub title\n     y\n"
        );
    }

    #[test]
    fn section_title_on_next_line() {
        assert_eq!(body(".SH\nNAME\nls\n"), "NAME\n     ls\n");
    }

    #[test]
    fn tagged_paragraph_hangs() {
        assert_eq!(
            body(".br\nfirst\n.TP\n.B \\-a\nall entries\n.TP\n\\-\\-long\nthe long option\n"),
            "first\n\n-a   all entries\n\n--long\n     the long option\n"
        );
    }

    #[test]
    fn indented_paragraph_renders_first_word_of_tag() {
        assert_eq!(
            body(".br\nfirst\n.IP tag rest\ntext\n"),
            "first\n\ntag  text\n"
        );
        assert_eq!(body(".br\nfirst\n.IP\ntext\n"), "first\n\n     text\n");
    }

    #[test]
    fn relative_indent_nests_and_saturates() {
        assert_eq!(
            body(".br\none\n.RS\ntwo\n.RE\nthree\n.RE\nfour\n"),
            "one\n\n     two\n\nthree\n\nfour\n"
        );
    }

    #[test]
    fn paragraph_returns_to_base_indent() {
        assert_eq!(
            body(".br\na\n.RS\nb\n.PP\nc\n"),
            "a\n\n     b\n\n     c\n"
        );
    }

    #[test]
    fn hanging_paragraph() {
        let settings = FormattingSettings {
            right_margin: 20,
            ..TEST_SETTINGS
        };
        let out = format_with(settings, ".br\nx\n.HP\naaaa bbbb cccc dddd eeee\n");
        let lines: Vec<&str> = out.lines().collect();
        // third line on the page is odd, the spare column goes to the last gap
        assert_eq!(lines[2], "aaaa bbbb cccc  dddd");
        assert_eq!(lines[3], "     eeee");
    }

    #[test]
    fn tab_request_changes_input_tabs() {
        assert_eq!(body(".ta 4\n.nf\na\tb\n"), "a   b\n");
    }

    #[test]
    fn indented_body_after_tag_joins_padded_tag() {
        assert_eq!(
            body(".br\nfirst\n.TP\ntag\n   body text\n"),
            "first\n\ntag  body text\n"
        );
    }

    #[test]
    fn huge_tab_stop_is_clamped() {
        assert_eq!(
            body(".ta 100000000000\n.nf\na\tb\n"),
            format!("a\n{}\nb\n", " ".repeat(WHITESPACE_CAPACITY - 1))
        );
    }

    #[test]
    fn font_pairs_alternate_and_end_in_roman() {
        let settings = FormattingSettings {
            overstrike: true,
            ..TEST_SETTINGS
        };
        let out = format_with(settings, ".br\n.B w1\n.I w2\nplain\n.BR bold roman\n");
        assert_eq!(
            out.lines().next(),
            Some("w\x08w1\x081 _\x08w_\x082 plain b\x08bo\x08ol\x08ld\x08droman")
        );
    }

    #[test]
    fn quoted_font_argument_is_one_word() {
        let settings = FormattingSettings {
            overstrike: true,
            ..TEST_SETTINGS
        };
        let out = format_with(settings, ".br\n.IR \"a b\" c\n");
        assert_eq!(out.lines().next(), Some("_\x08a _\x08bc"));
    }

    #[test]
    fn include_matches_standalone_page() {
        let sub = ".SH NAME\nsub \\- an included page\n.SH DESCRIPTION\nText.\n";
        let opener = MemoryOpener::new().with_page("/man/man1/sub.1", sub);
        let included = format_page(
            TEST_SETTINGS,
            Box::new(Cursor::new(b".so man1/sub.1\n".to_vec())),
            Box::new(opener),
            PathBuf::from("/man"),
        )
        .unwrap();
        assert_eq!(String::from_utf8(included).unwrap(), format_with(TEST_SETTINGS, sub));
    }

    #[test]
    fn nested_include_resolves_against_document_dir() {
        let opener = MemoryOpener::new()
            .with_page("/man/man1/a.1", ".so man7/b.7\n")
            .with_page("/man/man7/b.7", ".br\nfrom b\n");
        let out = format_page(
            TEST_SETTINGS,
            Box::new(Cursor::new(b".so man1/a.1\n".to_vec())),
            Box::new(opener),
            PathBuf::from("/man"),
        )
        .unwrap();
        assert_eq!(out, b"from b\n\n\n\n");
    }
}
