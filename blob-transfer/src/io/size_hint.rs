/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/// The bounds on the remaining length of a source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeHint {
    lower: u64,
    upper: Option<u64>,
}

impl SizeHint {
    /// Exactly `size` bytes remain
    pub fn exact(size: u64) -> Self {
        Self {
            lower: size,
            upper: Some(size),
        }
    }

    /// Nothing is known about the remaining length
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Lower bound
    pub fn lower(&self) -> u64 {
        self.lower
    }

    /// Upper bound, `None` if unbounded
    pub fn upper(&self) -> Option<u64> {
        self.upper
    }

    /// The exact remaining length if known
    pub fn exact_size(&self) -> Option<u64> {
        match self.upper {
            Some(upper) if upper == self.lower => Some(upper),
            _ => None,
        }
    }
}
