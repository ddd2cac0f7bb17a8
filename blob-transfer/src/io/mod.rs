/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

pub(crate) mod part_reader;
mod path_body;
pub(crate) mod sink;
mod stream;

/// Error types related to I/O abstractions
pub mod error;
mod size_hint;

// re-exports
pub use self::path_body::PathBodyBuilder;
pub use self::sink::OutputStream;
pub use self::size_hint::SizeHint;
pub use self::stream::InputStream;
