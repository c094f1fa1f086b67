/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! A stack-based bytecode virtual machine with a stop-the-world,
//! non-moving mark-sweep collector.
//!
//! The heap owns every object. Values on the operand stack and in the
//! memory cells are the roots; anything not reachable from them when a
//! collection runs is freed.

mod assembly;
pub mod heap;
pub mod object;
pub mod opcode;
pub mod program;
pub mod roots;
pub mod value;
pub mod vm;

pub use assembly::{AssembleError, AssembleErrorKind, assemble, disassemble};
pub use heap::{CycleReport, GcPhase, GcStats, Heap, HeapConfig};
pub use object::{HeapObject, ObjRef, ObjectKind};
pub use program::{Program, ProgramError};
pub use roots::RootSet;
pub use value::{Value, ValueKind};
pub use vm::{Vm, VmError, VmErrorKind, VmStatus};
