/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::object::ObjRef;
use std::fmt::{self, Display, Formatter};

pub type VmInt = i32;

/// A stack or memory slot. Either an inline integer or a reference to an
/// object owned by the heap.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Value {
    Int(VmInt),
    Obj(ObjRef),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Pair,
    Function,
    Closure,
    Object,
}

impl Value {
    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_obj(&self) -> bool {
        matches!(self, Value::Obj(_))
    }

    /// Only valid after checking `is_int`.
    pub fn as_int(&self) -> VmInt {
        match self {
            Value::Int(n) => *n,
            Value::Obj(_) => panic!("as_int called on an object reference"),
        }
    }

    /// Only valid after checking `is_obj`.
    pub fn as_obj(&self) -> ObjRef {
        match self {
            Value::Obj(r) => *r,
            Value::Int(_) => panic!("as_obj called on an integer"),
        }
    }

    pub(crate) fn obj_ref(&self) -> Option<ObjRef> {
        match self {
            Value::Obj(r) => Some(*r),
            Value::Int(_) => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl From<VmInt> for Value {
    fn from(n: VmInt) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(if b { 1 } else { 0 })
    }
}

impl From<ObjRef> for Value {
    fn from(r: ObjRef) -> Self {
        Value::Obj(r)
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ValueKind::Int => write!(f, "int"),
            ValueKind::Pair => write!(f, "pair"),
            ValueKind::Function => write!(f, "function"),
            ValueKind::Closure => write!(f, "closure"),
            ValueKind::Object => write!(f, "object"),
        }
    }
}
