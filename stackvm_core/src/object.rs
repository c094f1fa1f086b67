/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::value::{Value, ValueKind};

/// Non-owning handle to an object in the heap arena.
///
/// The generation changes every time a slot is freed, so a handle to a
/// swept object never resolves to whatever is allocated in that slot later.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ObjRef {
    index: u32,
    generation: u32,
}

impl ObjRef {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone)]
pub struct HeapObject {
    pub(crate) kind: ObjectKind,
    pub(crate) marked: bool,
    // all-objects list, only walked by the sweeper
    pub(crate) next: Option<ObjRef>,
}

impl HeapObject {
    pub(crate) fn new(kind: ObjectKind, next: Option<ObjRef>) -> Self {
        Self {
            kind,
            marked: false,
            next,
        }
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    Pair { head: Value, tail: Value },
    Function { arity: u8 },
    // upvalues may be any kind of object
    Closure { function: ObjRef, upvalues: ObjRef },
}

impl ObjectKind {
    /// Outgoing references of this object. This is all the collector knows
    /// about an object's layout.
    pub fn references(&self) -> References {
        match self {
            ObjectKind::Pair { head, tail } => References([head.obj_ref(), tail.obj_ref()]),
            ObjectKind::Function { .. } => References([None, None]),
            ObjectKind::Closure { function, upvalues } => {
                References([Some(*function), Some(*upvalues)])
            }
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            ObjectKind::Pair { .. } => ValueKind::Pair,
            ObjectKind::Function { .. } => ValueKind::Function,
            ObjectKind::Closure { .. } => ValueKind::Closure,
        }
    }
}

/// At most two edges per object for every kind we have today.
#[derive(Debug, Clone, Copy)]
pub struct References([Option<ObjRef>; 2]);

impl IntoIterator for References {
    type Item = ObjRef;
    type IntoIter = std::iter::Flatten<std::array::IntoIter<Option<ObjRef>, 2>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter().flatten()
    }
}
