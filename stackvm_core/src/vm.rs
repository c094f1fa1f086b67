/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::heap::{CycleReport, Heap, HeapConfig};
use crate::object::{ObjRef, ObjectKind};
use crate::opcode::Opcode;
use crate::program::Program;
use crate::roots::RootSet;
use crate::value::{Value, ValueKind, VmInt};
use core::fmt;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use utils::dlog;

pub const STACK_SIZE: usize = 1024;
pub const MEM_SIZE: usize = 256;
pub const CODE_SIZE: usize = 4096;
pub const CALLSTACK_SIZE: usize = 256;

pub type VmResult<T> = std::result::Result<T, Box<VmError>>;
type Result<T> = VmResult<T>;

pub struct Vm {
    code: Vec<u8>,
    pc: usize,
    // start of the instruction being executed, for error reporting
    instr_start: usize,
    value_stack: Vec<Value>,
    call_stack: Vec<usize>,
    memory: Vec<Value>,
    heap: Heap,

    halted: bool,
    error: Option<Box<VmError>>,

    instr_count: u64,
    byte_count: u64,
}

pub enum VmStatus {
    Halted,
    OutOfSteps,
    Error(Box<VmError>),
}

#[derive(Clone, Debug)]
pub struct VmError {
    kind: VmErrorKind,
    pc: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VmErrorKind {
    // program errors
    DivisionByZero,
    IntegerOverflow,
    WrongType { expected: ValueKind },
    MemoryOutOfBounds(usize),

    StackUnderflow,
    StackOverflow,
    CallStackUnderflow,
    CallStackOverflow,

    // malformed bytecode
    InvalidOpcode(u8),
    TruncatedOperand,
    PcOutOfBounds(i64),
}

impl VmError {
    pub fn kind(&self) -> &VmErrorKind {
        &self.kind
    }

    pub fn pc(&self) -> usize {
        self.pc
    }
}

impl Vm {
    pub fn new(program: Program) -> Self {
        Self::with_config(program, HeapConfig::default())
    }

    pub fn with_config(program: Program, config: HeapConfig) -> Self {
        Self {
            code: program.code().to_vec(),
            pc: 0,
            instr_start: 0,
            value_stack: Vec::with_capacity(STACK_SIZE),
            call_stack: Vec::with_capacity(CALLSTACK_SIZE),
            memory: vec![Value::default(); MEM_SIZE],
            heap: Heap::new(config),

            halted: false,
            error: None,

            instr_count: 0,
            byte_count: 0,
        }
    }

    pub fn status(&self) -> VmStatus {
        if self.halted {
            VmStatus::Halted
        } else {
            match &self.error {
                Some(err) => VmStatus::Error(err.clone()),
                None => VmStatus::OutOfSteps,
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.halted
    }

    pub fn get_error(&self) -> Option<Box<VmError>> {
        self.error.clone()
    }

    pub fn top(&self) -> Result<Value> {
        match self.value_stack.last() {
            Some(v) => Ok(*v),
            None => self.make_error(VmErrorKind::StackUnderflow),
        }
    }

    pub fn pop(&mut self) -> Result<Value> {
        match self.value_stack.pop() {
            Some(v) => Ok(v),
            None => self.make_error(VmErrorKind::StackUnderflow),
        }
    }

    pub fn push(&mut self, x: impl Into<Value>) -> Result<()> {
        if self.value_stack.len() >= STACK_SIZE {
            return self.make_error(VmErrorKind::StackOverflow);
        }
        self.value_stack.push(x.into());
        Ok(())
    }

    pub fn pop_int(&mut self) -> Result<VmInt> {
        match self.pop()? {
            Value::Int(n) => Ok(n),
            Value::Obj(_) => self.wrong_type(ValueKind::Int),
        }
    }

    fn pop_obj(&mut self, expected: ValueKind) -> Result<ObjRef> {
        match self.pop()? {
            Value::Obj(r) => Ok(r),
            Value::Int(_) => self.wrong_type(expected),
        }
    }

    // n = 0 is the top of the stack
    fn peek(&self, n: usize) -> Result<Value> {
        let len = self.value_stack.len();
        if n >= len {
            return self.make_error(VmErrorKind::StackUnderflow);
        }
        Ok(self.value_stack[len - 1 - n])
    }

    /// The occupied part of the operand stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.value_stack
    }

    pub fn memory(&self) -> &[Value] {
        &self.memory
    }

    pub fn store(&mut self, idx: usize, v: impl Into<Value>) -> Result<()> {
        match self.memory.get_mut(idx) {
            Some(slot) => {
                *slot = v.into();
                Ok(())
            }
            None => self.make_error(VmErrorKind::MemoryOutOfBounds(idx)),
        }
    }

    pub fn roots(&self) -> RootSet<'_> {
        RootSet::new(&self.value_stack, &self.memory)
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Every object the interpreter or an embedder creates goes through
    /// here, so the collection policy can't be bypassed.
    pub fn allocate(&mut self, kind: ObjectKind) -> ObjRef {
        let roots = RootSet::new(&self.value_stack, &self.memory);
        self.heap.allocate(kind, roots)
    }

    pub fn collect(&mut self) -> CycleReport {
        let roots = RootSet::new(&self.value_stack, &self.memory);
        self.heap.collect(roots)
    }

    pub fn new_pair(&mut self, head: Value, tail: Value) -> ObjRef {
        self.allocate(ObjectKind::Pair { head, tail })
    }

    pub fn new_function(&mut self, arity: u8) -> ObjRef {
        self.allocate(ObjectKind::Function { arity })
    }

    pub fn new_closure(&mut self, function: ObjRef, upvalues: ObjRef) -> ObjRef {
        self.allocate(ObjectKind::Closure { function, upvalues })
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn instr_count(&self) -> u64 {
        self.instr_count
    }

    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    fn make_error<T>(&self, kind: VmErrorKind) -> Result<T> {
        Err(Box::new(VmError {
            kind,
            pc: self.instr_start,
        }))
    }

    fn wrong_type<T>(&self, expected: ValueKind) -> Result<T> {
        self.make_error(VmErrorKind::WrongType { expected })
    }
}

impl Vm {
    pub fn run(&mut self) {
        while !self.halted && self.error.is_none() {
            let _ = self.step();
        }
    }

    pub fn run_n_steps(&mut self, steps: u32) {
        let mut steps = steps;
        while steps > 0 && !self.halted && self.error.is_none() {
            let _ = self.step();
            steps -= 1;
        }
    }

    /// Executes one instruction. A fault is also recorded in the VM. Once
    /// the VM has halted or faulted this does nothing.
    pub fn step(&mut self) -> Result<()> {
        if self.halted || self.error.is_some() {
            return Ok(());
        }
        let result = self.execute_instr();
        if let Err(err) = &result {
            self.error = Some(err.clone());
        }
        result
    }

    fn execute_instr(&mut self) -> Result<()> {
        self.instr_start = self.pc;
        let byte = self.fetch_u8()?;
        self.instr_count += 1;
        let Some(op) = Opcode::from_repr(byte) else {
            return self.make_error(VmErrorKind::InvalidOpcode(byte));
        };

        match op {
            Opcode::Push => {
                let n = self.fetch_i32()?;
                self.push(n)?;
            }
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::Dup => {
                let v = self.top()?;
                self.push(v)?;
            }
            Opcode::Add => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                match a.checked_add(b) {
                    Some(n) => self.push(n)?,
                    None => return self.make_error(VmErrorKind::IntegerOverflow),
                }
            }
            Opcode::Sub => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                match a.checked_sub(b) {
                    Some(n) => self.push(n)?,
                    None => return self.make_error(VmErrorKind::IntegerOverflow),
                }
            }
            Opcode::Mul => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                match a.checked_mul(b) {
                    Some(n) => self.push(n)?,
                    None => return self.make_error(VmErrorKind::IntegerOverflow),
                }
            }
            Opcode::Div => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                if b == 0 {
                    return self.make_error(VmErrorKind::DivisionByZero);
                }
                match a.checked_div(b) {
                    Some(n) => self.push(n)?,
                    None => return self.make_error(VmErrorKind::IntegerOverflow),
                }
            }
            Opcode::Cmp => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(a < b)?;
            }
            Opcode::Jmp => {
                let target = self.fetch_i32()?;
                self.jump(target)?;
            }
            Opcode::Jz => {
                let target = self.fetch_i32()?;
                if self.pop()? == Value::Int(0) {
                    self.jump(target)?;
                }
            }
            Opcode::Jnz => {
                let target = self.fetch_i32()?;
                if self.pop()? != Value::Int(0) {
                    self.jump(target)?;
                }
            }
            Opcode::Store => {
                let idx = self.fetch_u8()? as usize;
                let v = self.pop()?;
                self.store(idx, v)?;
            }
            Opcode::Load => {
                let idx = self.fetch_u8()? as usize;
                let v = match self.memory.get(idx) {
                    Some(v) => *v,
                    None => return self.make_error(VmErrorKind::MemoryOutOfBounds(idx)),
                };
                self.push(v)?;
            }
            Opcode::Call => {
                let target = self.fetch_i32()?;
                if self.call_stack.len() >= CALLSTACK_SIZE {
                    return self.make_error(VmErrorKind::CallStackOverflow);
                }
                self.call_stack.push(self.pc);
                self.jump(target)?;
            }
            Opcode::Ret => match self.call_stack.pop() {
                Some(ret) => self.pc = ret,
                None => return self.make_error(VmErrorKind::CallStackUnderflow),
            },
            Opcode::Cons => {
                // operands stay on the stack, and therefore rooted, until the pair exists
                let tail = self.peek(0)?;
                let head = self.peek(1)?;
                let pair = self.new_pair(head, tail);
                self.value_stack.truncate(self.value_stack.len() - 2);
                self.push(pair)?;
            }
            Opcode::Head => {
                let r = self.pop_obj(ValueKind::Pair)?;
                match self.heap.kind(r) {
                    Some(ObjectKind::Pair { head, .. }) => {
                        let head = *head;
                        self.push(head)?;
                    }
                    _ => return self.wrong_type(ValueKind::Pair),
                }
            }
            Opcode::Tail => {
                let r = self.pop_obj(ValueKind::Pair)?;
                match self.heap.kind(r) {
                    Some(ObjectKind::Pair { tail, .. }) => {
                        let tail = *tail;
                        self.push(tail)?;
                    }
                    _ => return self.wrong_type(ValueKind::Pair),
                }
            }
            Opcode::SetHead => {
                let v = self.pop()?;
                let r = self.pop_obj(ValueKind::Pair)?;
                if !self.heap.set_head(r, v) {
                    return self.wrong_type(ValueKind::Pair);
                }
            }
            Opcode::SetTail => {
                let v = self.pop()?;
                let r = self.pop_obj(ValueKind::Pair)?;
                if !self.heap.set_tail(r, v) {
                    return self.wrong_type(ValueKind::Pair);
                }
            }
            Opcode::Func => {
                let arity = self.fetch_u8()?;
                if self.value_stack.len() >= STACK_SIZE {
                    return self.make_error(VmErrorKind::StackOverflow);
                }
                let f = self.new_function(arity);
                self.push(f)?;
            }
            Opcode::Closure => {
                let function = match self.peek(1)? {
                    Value::Obj(r) if matches!(self.heap.kind(r), Some(ObjectKind::Function { .. })) => r,
                    _ => return self.wrong_type(ValueKind::Function),
                };
                let upvalues = match self.peek(0)? {
                    Value::Obj(r) => r,
                    Value::Int(_) => return self.wrong_type(ValueKind::Object),
                };
                let closure = self.new_closure(function, upvalues);
                self.value_stack.truncate(self.value_stack.len() - 2);
                self.push(closure)?;
            }
            Opcode::Gc => {
                let report = self.collect();
                dlog!("gc opcode at {}: freed {}", self.instr_start, report.freed);
            }
            Opcode::Halt => {
                self.halted = true;
            }
        }
        Ok(())
    }

    fn jump(&mut self, target: i32) -> Result<()> {
        match usize::try_from(target) {
            Ok(target) => {
                self.pc = target;
                Ok(())
            }
            Err(_) => self.make_error(VmErrorKind::PcOutOfBounds(target as i64)),
        }
    }

    fn fetch_u8(&mut self) -> Result<u8> {
        let Some(&byte) = self.code.get(self.pc) else {
            // running off the end of the code or into it mid-operand
            let kind = if self.pc == self.instr_start {
                VmErrorKind::PcOutOfBounds(self.pc as i64)
            } else {
                VmErrorKind::TruncatedOperand
            };
            return self.make_error(kind);
        };
        self.pc += 1;
        self.byte_count += 1;
        Ok(byte)
    }

    fn fetch_i32(&mut self) -> Result<i32> {
        let Some(bytes) = self.code.get(self.pc..self.pc + 4) else {
            return self.make_error(VmErrorKind::TruncatedOperand);
        };
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        self.pc += 4;
        self.byte_count += 4;
        Ok(i32::from_le_bytes(buf))
    }
}

impl Debug for Vm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("pc", &self.pc)
            .field("value_stack", &format!("{:?}", self.value_stack))
            .field("call_stack", &format!("{:?}", self.call_stack))
            .field("live_objects", &self.heap.live_count())
            .field("halted", &self.halted)
            .finish()
    }
}

impl Error for VmError {}

impl Display for VmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte offset {}", self.kind, self.pc)
    }
}

impl Display for VmErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            VmErrorKind::DivisionByZero => write!(f, "division by zero"),
            VmErrorKind::IntegerOverflow => write!(f, "integer overflow/underflow"),
            VmErrorKind::WrongType { expected } => {
                write!(f, "wrong type on top of stack, expected: {expected}")
            }
            VmErrorKind::MemoryOutOfBounds(idx) => {
                write!(f, "memory index {idx} out of bounds")
            }
            VmErrorKind::StackUnderflow => write!(f, "stack underflow"),
            VmErrorKind::StackOverflow => write!(f, "stack overflow"),
            VmErrorKind::CallStackUnderflow => write!(f, "return with empty call stack"),
            VmErrorKind::CallStackOverflow => write!(f, "call stack overflow"),
            VmErrorKind::InvalidOpcode(op) => write!(f, "invalid opcode: 0x{op:x}"),
            VmErrorKind::TruncatedOperand => write!(f, "operand runs past end of code"),
            VmErrorKind::PcOutOfBounds(pc) => {
                write!(f, "jumped outside of the program: {pc}")
            }
        }
    }
}
