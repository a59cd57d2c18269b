//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

#[cfg(test)]
use std::collections::HashMap;
use std::io::{self, BufReader, Read};
use std::path::Path;
#[cfg(test)]
use std::path::PathBuf;

/// Opens manual page sources by path. Used for `.so` inclusion.
pub trait PageOpener {
    /// Returns a reader over the (decompressed) page, or an error of kind
    /// [`io::ErrorKind::NotFound`] when no such page exists.
    fn open(&mut self, path: &Path) -> io::Result<Box<dyn Read>>;
}

/// Byte source with a single byte of pushback.
pub struct PageInput {
    reader: Option<BufReader<Box<dyn Read>>>,
    pushback: Option<u8>,
    line_number: usize,
}

impl PageInput {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self {
            reader: Some(BufReader::new(reader)),
            pushback: None,
            line_number: 1,
        }
    }

    /// Next byte, or `None` at end of input.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(b) = self.pushback.take() {
            return Ok(Some(b));
        }

        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let mut buf = [0u8; 1];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if buf[0] == b'\n' {
            self.line_number += 1;
        }
        Ok(Some(buf[0]))
    }

    /// Pushes one byte back. Ungetting end of input is a no-op.
    pub fn unget_byte(&mut self, byte: Option<u8>) {
        if let Some(b) = byte {
            debug_assert!(self.pushback.is_none(), "only one byte of pushback");
            self.pushback = Some(b);
        }
    }

    /// Replaces the underlying stream, dropping (closing) the old one along
    /// with any pushed back byte.
    pub fn switch_to(&mut self, reader: Box<dyn Read>) {
        self.reader = Some(BufReader::new(reader));
        self.pushback = None;
        self.line_number = 1;
    }

    pub fn close(&mut self) {
        self.reader = None;
        self.pushback = None;
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

/// Opener that serves pages from memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryOpener {
    pages: HashMap<PathBuf, Vec<u8>>,
}

#[cfg(test)]
impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.pages.insert(path.into(), content.into());
        self
    }
}

#[cfg(test)]
impl PageOpener for MemoryOpener {
    fn open(&mut self, path: &Path) -> io::Result<Box<dyn Read>> {
        match self.pages.get(path) {
            Some(content) => Ok(Box::new(io::Cursor::new(content.clone()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )),
        }
    }
}
