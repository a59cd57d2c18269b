//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::env;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use super::input::PageOpener;

/// Search path used when neither `MANPATH` nor the configuration names one.
pub const DEFAULT_MANPATH: &str = "/usr/local/share/man:/usr/share/man";

/// Sections in search order.
pub const DEFAULT_SECTIONS: &str = "1p:1:1perl:2:3p:3:3perl:4:5:6:7:8:9:0p";

/// Optional filter every page is piped through.
pub const PREPROCESSOR: &str = "manpp";

const SUFFIXES: [&str; 3] = ["", ".gz", ".xz"];

/// Source pages first, then preformatted ones.
const DIR_KINDS: [&str; 2] = ["man", "cat"];

/// Splits a colon separated list, skipping empty entries.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(':')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Directories and sections to look for pages in.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    pub manpaths: Vec<PathBuf>,
    pub sections: Vec<String>,
}

impl SearchPath {
    pub fn new(manpaths: Vec<PathBuf>, sections: Vec<String>) -> Self {
        Self { manpaths, sections }
    }

    /// Every path a page called `name` may live at, in search order.
    pub fn candidates<'a>(&'a self, name: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
        DIR_KINDS.iter().flat_map(move |kind| {
            self.sections.iter().flat_map(move |section| {
                self.manpaths.iter().flat_map(move |dir| {
                    let page = dir
                        .join(format!("{kind}{section}"))
                        .join(format!("{name}.{section}"));
                    SUFFIXES.iter().map(move |suffix| with_suffix(&page, suffix))
                })
            })
        })
    }

    /// First existing page called `name`.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.candidates(name).find(|path| path.exists())
    }

    /// Every existing page called `name`.
    pub fn find_all(&self, name: &str) -> Vec<PathBuf> {
        self.candidates(name).filter(|path| path.exists()).collect()
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// First of `path`, `path.gz` and `path.xz` that exists.
pub fn find_direct(path: &Path) -> Option<PathBuf> {
    SUFFIXES
        .iter()
        .map(|suffix| with_suffix(path, suffix))
        .find(|candidate| candidate.exists())
}

/// Root of the manual tree holding `page`; `.so` paths are relative to it.
///
/// `/usr/share/man/man1/ls.1` gives `/usr/share/man`.
pub fn document_dir(page: &Path) -> PathBuf {
    page.parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Looks up an executable in `PATH`.
pub fn find_program(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| {
            candidate
                .metadata()
                .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        })
}

fn decompressor(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(OsStr::to_str) {
        Some("gz") => Some("gzip"),
        Some("xz") => Some("xzcat"),
        _ => None,
    }
}

/// Output end of a chain of filter processes. Dropping it closes the pipe
/// and reaps the processes.
struct PipelineReader {
    stdout: Option<ChildStdout>,
    children: Vec<Child>,
}

impl Read for PipelineReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stdout.as_mut() {
            Some(stdout) => stdout.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for PipelineReader {
    fn drop(&mut self) {
        self.stdout.take();
        for child in &mut self.children {
            match child.wait() {
                Ok(status) if !status.success() => log::debug!("filter exited with {status}"),
                Ok(_) => {}
                Err(e) => log::debug!("failed to wait for filter: {e}"),
            }
        }
    }
}

/// Opens pages from the filesystem, decompressing `.gz` and `.xz` pages and
/// piping them through the preprocessor when one is installed.
#[derive(Debug, Clone, Copy)]
pub struct SystemOpener {
    preprocessor: bool,
}

impl SystemOpener {
    pub fn new(use_preprocessor: bool) -> Self {
        let preprocessor = use_preprocessor && find_program(PREPROCESSOR).is_some();
        log::debug!("preprocessor {}", if preprocessor { "enabled" } else { "disabled" });
        Self { preprocessor }
    }

    /// Opens the page at exactly `path`.
    pub fn open_page(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        let file = File::open(path)?;

        let mut stages = Vec::new();
        if let Some(program) = decompressor(path) {
            let mut command = Command::new(program);
            command.arg("-dc");
            stages.push(command);
        }
        if self.preprocessor {
            stages.push(Command::new(PREPROCESSOR));
        }
        if stages.is_empty() {
            return Ok(Box::new(file));
        }

        let last = stages.len() - 1;
        let mut children = Vec::with_capacity(stages.len());
        let mut input = Stdio::from(file);
        let mut stdout = None;
        for (i, mut stage) in stages.into_iter().enumerate() {
            let program = stage.get_program().to_string_lossy().into_owned();
            let mut child = stage
                .stdin(input)
                .stdout(Stdio::piped())
                .spawn()
                .map_err(|e| io::Error::new(e.kind(), format!("{program}: {e}")))?;
            let out = child
                .stdout
                .take()
                .ok_or_else(|| io::Error::other(format!("failed to open {program} stdout")))?;
            children.push(child);
            if i == last {
                stdout = Some(out);
                break;
            }
            input = Stdio::from(out);
        }

        Ok(Box::new(PipelineReader { stdout, children }))
    }
}

impl PageOpener for SystemOpener {
    fn open(&mut self, path: &Path) -> io::Result<Box<dyn Read>> {
        match find_direct(path) {
            Some(found) => self.open_page(&found),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn candidates_follow_search_order() {
        let search = SearchPath::new(
            vec![PathBuf::from("/a"), PathBuf::from("/b")],
            split_list("1:8"),
        );
        let paths: Vec<PathBuf> = search.candidates("ls").collect();
        assert_eq!(paths.len(), 2 * 2 * 2 * 3);
        assert_eq!(paths[0], PathBuf::from("/a/man1/ls.1"));
        assert_eq!(paths[1], PathBuf::from("/a/man1/ls.1.gz"));
        assert_eq!(paths[2], PathBuf::from("/a/man1/ls.1.xz"));
        assert_eq!(paths[3], PathBuf::from("/b/man1/ls.1"));
        assert_eq!(paths[6], PathBuf::from("/a/man8/ls.8"));
        assert_eq!(paths[12], PathBuf::from("/a/cat1/ls.1"));
    }

    #[test]
    fn split_list_skips_empty_entries() {
        assert_eq!(split_list("1::2:"), vec!["1", "2"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn finds_source_before_preformatted() {
        let tmp = TempDir::new().unwrap();
        let cat = touch(tmp.path(), "cat1/foo.1", "formatted");
        let man = touch(tmp.path(), "man1/foo.1.gz", "");
        let search = SearchPath::new(vec![tmp.path().to_path_buf()], split_list("1"));
        assert_eq!(search.find("foo"), Some(man.clone()));
        assert_eq!(search.find_all("foo"), vec![man, cat]);
        assert_eq!(search.find("bar"), None);
    }

    #[test]
    fn section_order_wins_over_path_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        touch(first.path(), "man3/foo.3", "");
        let expected = touch(second.path(), "man1/foo.1", "");
        let search = SearchPath::new(
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
            split_list("1:3"),
        );
        assert_eq!(search.find("foo"), Some(expected));
    }

    #[test]
    fn document_dir_is_tree_root() {
        assert_eq!(
            document_dir(Path::new("/usr/share/man/man1/ls.1")),
            PathBuf::from("/usr/share/man")
        );
        assert_eq!(document_dir(Path::new("ls.1")), PathBuf::new());
    }

    #[test]
    fn direct_paths_try_suffixes() {
        let tmp = TempDir::new().unwrap();
        let page = touch(tmp.path(), "page.1.xz", "");
        assert_eq!(find_direct(&tmp.path().join("page.1")), Some(page));
        assert_eq!(find_direct(&tmp.path().join("other.1")), None);
    }

    #[test]
    fn opens_plain_pages_and_reports_missing_ones() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "man1/foo.1", ".TH FOO 1\n");
        let mut opener = SystemOpener { preprocessor: false };

        let mut content = String::new();
        opener
            .open(&tmp.path().join("man1/foo.1"))
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, ".TH FOO 1\n");

        let err = opener.open(&tmp.path().join("man1/bar.1")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn finds_programs_in_path() {
        assert!(find_program("sh").is_some());
        assert!(find_program("surely-not-an-installed-program").is_none());
    }
}
