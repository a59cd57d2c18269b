//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Fixed-capacity buffers used while tokenizing and composing lines.
//!
//! Pushing past the capacity never grows the buffer: the element is dropped
//! and the push reports the truncation to the caller.

use std::ops::Deref;

/// Word buffer capacity, including the slot reserved for a terminator.
pub const WORD_CAPACITY: usize = 80;

/// Whitespace buffer capacity, including the slot reserved for a terminator.
pub const WHITESPACE_CAPACITY: usize = 256;

/// Line buffer capacity in glyphs.
pub const LINE_CAPACITY: usize = 256;

/// A vector that never holds more than `limit` elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedBuf<T> {
    items: Vec<T>,
    limit: usize,
}

impl<T> BoundedBuf<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            items: Vec::with_capacity(limit),
            limit,
        }
    }

    /// Byte buffer sized like the C-style buffers it replaces: one slot of
    /// `capacity` is kept free, as a terminator would occupy it.
    pub fn with_terminator(capacity: usize) -> Self {
        Self::new(capacity.saturating_sub(1))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.items.len()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.limit
    }

    /// Appends `item`; returns `false` if it was dropped.
    pub fn push(&mut self, item: T) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Replaces the whole content, truncating to the limit.
    pub fn set(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.clear();
        self.extend(items);
    }

    /// Appends as many items as fit. Returns `false` if anything was dropped.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) -> bool {
        let mut complete = true;
        for item in items {
            if !self.push(item) {
                complete = false;
                break;
            }
        }
        complete
    }
}

impl<T: Copy> BoundedBuf<T> {
    /// Appends a slice, truncating at the limit.
    pub fn extend_from_slice(&mut self, items: &[T]) -> bool {
        let n = items.len().min(self.remaining());
        self.items.extend_from_slice(&items[..n]);
        n == items.len()
    }
}

impl<T> Deref for BoundedBuf<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}
