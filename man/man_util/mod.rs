//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

/// Fixed-capacity buffers that truncate instead of growing
pub mod buffer;
/// Request table and request execution
pub mod commands;
/// Line composition and justification
pub mod composer;
/// man.conf parsing
pub mod config;
/// Font escapes and overstrike rendering
pub mod font;
/// Formatter state and the main pass
pub mod formatter;
/// Byte input with pushback and `.so` openers
pub mod input;
/// Page search and decompression
pub mod locator;
/// Page header, footers and page breaks
pub mod pagination;
/// Words and whitespace of the input
pub mod tokenizer;
