/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::value::Value;

/// Read-only view of the slots the collector starts marking from: the
/// occupied prefix of the operand stack and the whole memory array.
#[derive(Debug, Clone, Copy)]
pub struct RootSet<'a> {
    pub stack: &'a [Value],
    pub memory: &'a [Value],
}

impl<'a> RootSet<'a> {
    pub fn new(stack: &'a [Value], memory: &'a [Value]) -> Self {
        Self { stack, memory }
    }

    pub fn empty() -> Self {
        Self {
            stack: &[],
            memory: &[],
        }
    }

    pub fn iter(self) -> impl Iterator<Item = &'a Value> {
        // memory is scanned in full, used or not
        self.stack.iter().chain(self.memory.iter())
    }
}
