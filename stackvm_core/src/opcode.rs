/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use strum::{Display, EnumIter, EnumString, FromRepr};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, EnumIter, FromRepr)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[repr(u8)]
pub enum Opcode {
    // Stack manipulation
    Push = 0x01,
    Pop = 0x02,
    Dup = 0x03,

    // Arithmetic
    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    Cmp = 0x14,

    // Control Flow
    Jmp = 0x20,
    Jz = 0x21,
    Jnz = 0x22,

    // Memory
    Store = 0x30,
    Load = 0x31,

    // Functions
    Call = 0x40,
    Ret = 0x41,

    // Objects
    Cons = 0x50,
    Head = 0x51,
    Tail = 0x52,
    SetHead = 0x53,
    SetTail = 0x54,
    Func = 0x55,
    Closure = 0x56,
    Gc = 0x5F,

    Halt = 0xFF,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operand {
    None,
    // little-endian
    I32,
    U8,
}

impl Operand {
    pub fn size(&self) -> usize {
        match self {
            Operand::None => 0,
            Operand::I32 => 4,
            Operand::U8 => 1,
        }
    }
}

impl Opcode {
    pub fn operand(&self) -> Operand {
        match self {
            Opcode::Push | Opcode::Jmp | Opcode::Jz | Opcode::Jnz | Opcode::Call => Operand::I32,
            Opcode::Store | Opcode::Load | Opcode::Func => Operand::U8,
            _ => Operand::None,
        }
    }

    /// Whether the operand is a code address (and may be written as a label).
    pub fn takes_address(&self) -> bool {
        matches!(
            self,
            Opcode::Jmp | Opcode::Jz | Opcode::Jnz | Opcode::Call
        )
    }

    /// Total encoded size including the opcode byte.
    pub fn width(&self) -> usize {
        1 + self.operand().size()
    }
}
