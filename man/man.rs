//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use clap::{ArgAction, Parser};
use gettextrs::{bind_textdomain_codeset, gettext, setlocale, textdomain, LocaleCategory};
use man_util::config::{parse_config_file, ManConfig};
use man_util::formatter::{FormatError, Formatter, FormattingSettings, MAX_RIGHT_MARGIN};
use man_util::input::PageOpener;
use man_util::locator::{self, SearchPath, SystemOpener};
use std::io::{self, BufWriter, IsTerminal, Read, Write};
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use terminfo::Database;
use thiserror::Error;

mod man_util;

/// Possible default config file paths to check if `-C` is not provided.
const MAN_CONFS: [&str; 3] = [
    "/etc/man.conf",
    "/etc/examples/man.conf",
    "/etc/manpath.config",
];

/// Pagers tried after `$PAGER`.
const PAGERS: [&str; 2] = ["less", "more"];

/// Width used when the terminal size is unknown.
const DEFAULT_WIDTH: usize = 78;

#[derive(Parser, Debug, Default)]
#[command(
    version,
    disable_help_flag = true,
    about = gettext("man - format and display the on-line manual pages")
)]
struct Args {
    #[arg(
        short = 'w',
        help = gettext("Only print the locations of matching manual pages")
    )]
    list_pathnames: bool,

    #[arg(
        short = 'v',
        overrides_with = "quiet",
        help = gettext("Report unknown formatter requests (default)")
    )]
    verbose: bool,

    #[arg(
        short = 'q',
        overrides_with = "verbose",
        help = gettext("Silently ignore unknown formatter requests")
    )]
    quiet: bool,

    #[arg(short = 'P', help = gettext("Disable the manpp preprocessor"))]
    no_preprocessor: bool,

    #[arg(short, long, help = gettext("Copy the manual page to the standard output"))]
    copy: bool,

    #[arg(
        short = 'C',
        long,
        help = gettext("Use the specified file instead of the default configuration file")
    )]
    config_file: Option<PathBuf>,

    #[arg(
        short = 'l',
        long,
        help = gettext("Paginate the output with the given number of lines per page")
    )]
    lines: Option<usize>,

    #[arg(
        long = "help",
        action = ArgAction::Help,
        help = gettext("Print help information")
    )]
    help: Option<bool>,

    #[arg(
        help = gettext("Optional section followed by the manual page name; - reads standard input"),
        required = true,
        num_args = 1..=2
    )]
    operands: Vec<String>,
}

/// Common errors that might occur.
#[derive(Error, Debug)]
enum ManError {
    /// Man can't find documentation for choosen command
    #[error("no manual entry for {0}")]
    PageNotFound(String),

    /// Nothing for the name in the requested section
    #[error("no entry for {0} in section {1} of the manual")]
    SectionPageNotFound(String, String),

    /// Configuration file was not found
    #[error("configuration file was not found: {0}")]
    ConfigFileNotFound(String),

    /// Can't execute command; read/write file
    #[error("failed to execute command: {0}")]
    Io(#[from] io::Error),

    /// Formatting of the page was aborted
    #[error("{0}")]
    Format(#[from] FormatError),

    /// Parsing error
    #[error("parsing error: {0}")]
    ParseError(#[from] ParseError),
}

/// Parsing error types
#[derive(Error, Debug)]
enum ParseError {
    #[error("{0}")]
    ParseIntError(#[from] ParseIntError),

    #[error("invalid value for output {0}: {1}")]
    InvalidValue(String, String),
}

//
// ──────────────────────────────────────────────────────────────────────────────
//  HELPER FUNCTIONS
// ──────────────────────────────────────────────────────────────────────────────
//

/// Try to locate the configuration file:
/// - If `path` is Some, check if it exists; error if not.
/// - If `path` is None, try each of MAN_CONFS; no file is not an error.
fn get_config_file_path(path: &Option<PathBuf>) -> Result<Option<PathBuf>, ManError> {
    if let Some(user_path) = path {
        if user_path.exists() {
            Ok(Some(user_path.clone()))
        } else {
            Err(ManError::ConfigFileNotFound(
                user_path.display().to_string(),
            ))
        }
    } else {
        Ok(MAN_CONFS.iter().map(PathBuf::from).find(|p| p.exists()))
    }
}

/// Terminal width of standard output, if it is a terminal.
fn terminal_width() -> Option<usize> {
    let mut winsize = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    let ret = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut winsize) };
    if ret != 0 || winsize.ws_col == 0 {
        return None;
    }
    Some(usize::from(winsize.ws_col).saturating_sub(2).clamp(1, MAX_RIGHT_MARGIN))
}

/// Whether the terminal renders backspace overstrikes as bold or underline.
fn terminal_overstrikes() -> bool {
    match Database::from_env() {
        Ok(info) => info.raw("os").is_some() || info.raw("bold").is_some(),
        Err(_) => false,
    }
}

/// Starts the first available pager with a piped standard input.
fn spawn_pager() -> Option<Child> {
    let from_env = std::env::var("PAGER").ok().filter(|p| !p.trim().is_empty());

    for pager in from_env.iter().map(String::as_str).chain(PAGERS) {
        let mut words = pager.split_whitespace();
        let Some(program) = words.next() else {
            continue;
        };
        match Command::new(program)
            .args(words)
            .stdin(Stdio::piped())
            .spawn()
        {
            Ok(child) => {
                log::debug!("paging through {pager}");
                return Some(child);
            }
            Err(e) => log::debug!("cannot start pager {pager}: {e}"),
        }
    }
    None
}

/// A pager that quit before reading everything is not an error.
fn ignore_broken_pipe(result: Result<(), FormatError>) -> Result<(), FormatError> {
    match result {
        Err(FormatError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Formats `input` into `out`.
fn format_to<W: Write>(
    settings: FormattingSettings,
    input: Box<dyn Read>,
    opener: Box<dyn PageOpener>,
    document_dir: PathBuf,
    out: W,
) -> Result<(), FormatError> {
    let mut formatter = Formatter::new(settings, input, opener, document_dir, out);
    formatter.run()
}

/// Splits the operands into the optional section and the page name.
fn split_operands(operands: &[String]) -> (Option<&str>, &str) {
    match operands {
        [section, name] => (Some(section.as_str()), name.as_str()),
        [name] => (None, name.as_str()),
        _ => (None, "-"),
    }
}

/// Man formatting state structure
struct Man {
    args: Args,
    search: SearchPath,
    settings: FormattingSettings,
    opener: SystemOpener,
    /// Output goes through a pager
    paging: bool,
}

impl Man {
    fn new(args: Args) -> Result<Self, ManError> {
        let config = match get_config_file_path(&args.config_file)? {
            Some(path) => {
                log::debug!("reading configuration {}", path.display());
                parse_config_file(&path)?
            }
            None => ManConfig::default(),
        };

        let paging = !args.copy && io::stdout().is_terminal();
        let mut settings = FormattingSettings::default();
        if paging {
            settings.right_margin = terminal_width().unwrap_or(DEFAULT_WIDTH);
            settings.overstrike = true;
        }
        config.apply_output_options(&mut settings)?;
        if args.quiet {
            settings.verbose = false;
        } else if args.verbose {
            settings.verbose = true;
        }
        if let Some(lines) = args.lines {
            settings.page_length = lines;
        }

        let manpaths = match std::env::var("MANPATH") {
            Ok(list) if !list.is_empty() => {
                locator::split_list(&list).into_iter().map(PathBuf::from).collect()
            }
            _ if !config.manpaths.is_empty() => config.manpaths.clone(),
            _ => locator::split_list(locator::DEFAULT_MANPATH)
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        };

        let (section, _) = split_operands(&args.operands);
        let sections = match section {
            Some(section) => locator::split_list(section),
            None => match std::env::var("MANSECT") {
                Ok(list) if !list.is_empty() => locator::split_list(&list),
                _ => locator::split_list(locator::DEFAULT_SECTIONS),
            },
        };

        log::debug!("search paths {manpaths:?}, sections {sections:?}");

        Ok(Self {
            opener: SystemOpener::new(!args.no_preprocessor),
            search: SearchPath::new(manpaths, sections),
            settings,
            paging,
            args,
        })
    }

    fn not_found(&self, name: &str) -> ManError {
        match split_operands(&self.args.operands) {
            (Some(section), _) => ManError::SectionPageNotFound(name.to_string(), section.to_string()),
            (None, _) => ManError::PageNotFound(name.to_string()),
        }
    }

    /// Finds the page, returning its path and the root of its manual tree.
    fn locate(&self, name: &str) -> Result<(PathBuf, PathBuf), ManError> {
        let found = if name.contains('/') {
            locator::find_direct(Path::new(name))
        } else {
            self.search.find(name)
        };
        let path = found.ok_or_else(|| self.not_found(name))?;
        let root = locator::document_dir(&path);
        log::debug!("found {}", path.display());
        Ok((path, root))
    }

    /// Prints the path of every matching page (`-w`).
    fn display_paths(&self, name: &str) -> Result<(), ManError> {
        let paths = if name.contains('/') {
            locator::find_direct(Path::new(name)).into_iter().collect()
        } else {
            self.search.find_all(name)
        };
        if paths.is_empty() {
            return Err(self.not_found(name));
        }

        let mut stdout = io::stdout().lock();
        for path in paths {
            writeln!(stdout, "{}", path.display())?;
        }
        Ok(())
    }

    /// Formats the page into the pager, or to standard output.
    fn display(&self, input: Box<dyn Read>, document_dir: PathBuf) -> Result<(), ManError> {
        let opener = Box::new(self.opener);

        if self.paging {
            if let Some(mut pager) = spawn_pager() {
                let result = match pager.stdin.take() {
                    Some(stdin) => ignore_broken_pipe(format_to(
                        self.settings,
                        input,
                        opener,
                        document_dir,
                        BufWriter::new(stdin),
                    )),
                    None => Err(io::Error::other("failed to open pager stdin").into()),
                };
                pager.wait()?;
                return Ok(result?);
            }
        }

        let mut settings = self.settings;
        if self.paging {
            settings.overstrike = terminal_overstrikes();
        }
        let stdout = BufWriter::new(io::stdout().lock());
        ignore_broken_pipe(format_to(settings, input, opener, document_dir, stdout))?;
        Ok(())
    }

    //
    // ──────────────────────────────────────────────────────────────────────────────
    //  MAIN LOGIC FUNCTION
    // ──────────────────────────────────────────────────────────────────────────────
    //

    /// Locates the requested page and displays it, or only lists its
    /// locations with `-w`.
    fn man(&self) -> Result<(), ManError> {
        let (_, name) = split_operands(&self.args.operands);

        if name == "-" {
            return self.display(Box::new(io::stdin()), PathBuf::new());
        }

        if self.args.list_pathnames {
            return self.display_paths(name);
        }

        let (path, root) = self.locate(name)?;
        let input = self.opener.open_page(&path)?;
        self.display(input, root)
    }
}

//
// ──────────────────────────────────────────────────────────────────────────────
//  MAIN ENTRY POINT
// ──────────────────────────────────────────────────────────────────────────────
//

// Exit code:
//     0 - Successful completion.
//     >0 - An error occurred.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    setlocale(LocaleCategory::LcAll, "");
    textdomain("posixutils-rs")?;
    bind_textdomain_codeset("posixutils-rs", "UTF-8")?;
    env_logger::init();

    // parse command line arguments
    let args = Args::parse();

    let exit_code = match Man::new(args).and_then(|man| man.man()) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("man: {err}");
            1
        }
    };

    std::process::exit(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operands_with_and_without_section() {
        let one = vec!["ls".to_string()];
        assert_eq!(split_operands(&one), (None, "ls"));
        let two = vec!["3".to_string(), "printf".to_string()];
        assert_eq!(split_operands(&two), (Some("3"), "printf"));
    }

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from(["man", "-w", "-q", "-l", "40", "1", "ls"]).unwrap();
        assert!(args.list_pathnames);
        assert!(args.quiet);
        assert_eq!(args.lines, Some(40));
        assert_eq!(args.operands, vec!["1", "ls"]);
    }

    #[test]
    fn last_of_verbose_and_quiet_wins() {
        let args = Args::try_parse_from(["man", "-q", "-v", "ls"]).unwrap();
        assert!(args.verbose);
        assert!(!args.quiet);
    }

    #[test]
    fn dash_reads_stdin() {
        let args = Args::try_parse_from(["man", "-"]).unwrap();
        assert_eq!(split_operands(&args.operands), (None, "-"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let missing = Some(PathBuf::from("/nonexistent/man.conf"));
        assert!(matches!(
            get_config_file_path(&missing),
            Err(ManError::ConfigFileNotFound(_))
        ));
    }

    #[test]
    fn broken_pipe_is_not_an_error() {
        let broken = Err(FormatError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(ignore_broken_pipe(broken).is_ok());
        let other = Err(FormatError::Io(io::Error::from(io::ErrorKind::Other)));
        assert!(ignore_broken_pipe(other).is_err());
    }
}
