/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::helper::{run_src, top_int};
use stackvm_core::vm::{STACK_SIZE, Vm, VmErrorKind, VmStatus};
use stackvm_core::{Program, Value, ValueKind};

fn expect_error(vm: &Vm) -> VmErrorKind {
    match vm.status() {
        VmStatus::Error(err) => err.kind().clone(),
        VmStatus::Halted => panic!("expected an error, vm halted"),
        VmStatus::OutOfSteps => panic!("expected an error, vm still running"),
    }
}

#[test]
fn arithmetic() {
    let vm = run_src(
        "
PUSH 3
PUSH 4
SUB         ; -1
PUSH 6
MUL         ; -6
PUSH 4
ADD         ; -2
PUSH -2
DIV         ; 1
HALT
",
    );
    assert!(matches!(vm.status(), VmStatus::Halted));
    assert_eq!(top_int(&vm), 1);
}

#[test]
fn compare() {
    let vm = run_src("PUSH 1 PUSH 2 CMP PUSH 2 PUSH 1 CMP HALT");
    assert_eq!(vm.stack(), &[Value::Int(1), Value::Int(0)]);
}

#[test]
fn dup_store_load() {
    let vm = run_src("PUSH 21 DUP ADD STORE 9 LOAD 9 LOAD 9 ADD HALT");
    assert_eq!(top_int(&vm), 84);
    assert_eq!(vm.memory()[9], Value::Int(42));
}

#[test]
fn countdown_loop() {
    // sum 1..=10
    let src = "
    PUSH 0
    STORE 0
    PUSH 10
    STORE 1
loop:
    LOAD 1
    JZ done
    LOAD 0
    LOAD 1
    ADD
    STORE 0
    LOAD 1
    PUSH 1
    SUB
    STORE 1
    JMP loop
done:
    LOAD 0
    HALT
";
    let vm = run_src(src);
    assert_eq!(top_int(&vm), 55);
}

#[test]
fn jnz_treats_objects_as_true() {
    let src = "
    PUSH 0
    PUSH 0
    CONS
    JNZ yes
    PUSH 0
    HALT
yes:
    PUSH 1
    HALT
";
    let vm = run_src(src);
    assert_eq!(top_int(&vm), 1);
}

#[test]
fn call_and_return() {
    let src = "
    PUSH 5
    CALL double
    CALL double
    HALT
double:
    DUP
    ADD
    RET
";
    let vm = run_src(src);
    assert_eq!(top_int(&vm), 20);
}

#[test]
fn absolute_addresses() {
    // JMP 10 skips over PUSH 1
    let vm = run_src("JMP 10 PUSH 1 PUSH 2 HALT");
    assert_eq!(vm.stack(), &[Value::Int(2)]);
}

#[test]
fn pair_accessors() {
    let vm = run_src("PUSH 3 PUSH 4 CONS DUP HEAD STORE 0 TAIL LOAD 0 HALT");
    assert_eq!(vm.stack(), &[Value::Int(4), Value::Int(3)]);
}

#[test]
fn division_by_zero() {
    let vm = run_src("PUSH 1 PUSH 0 DIV HALT");
    assert_eq!(expect_error(&vm), VmErrorKind::DivisionByZero);
    assert_eq!(vm.get_error().unwrap().pc(), 10);
}

#[test]
fn overflow() {
    let vm = run_src("PUSH 2147483647 PUSH 1 ADD HALT");
    assert_eq!(expect_error(&vm), VmErrorKind::IntegerOverflow);
}

#[test]
fn stack_underflow() {
    let vm = run_src("PUSH 1 ADD HALT");
    assert_eq!(expect_error(&vm), VmErrorKind::StackUnderflow);
    let vm = run_src("POP HALT");
    assert_eq!(expect_error(&vm), VmErrorKind::StackUnderflow);
}

#[test]
fn stack_overflow() {
    let vm = run_src("top: PUSH 1 JMP top");
    assert_eq!(expect_error(&vm), VmErrorKind::StackOverflow);
    assert_eq!(vm.stack().len(), STACK_SIZE);
}

#[test]
fn type_mismatch() {
    let vm = run_src("PUSH 1 PUSH 2 CONS PUSH 1 ADD HALT");
    assert_eq!(
        expect_error(&vm),
        VmErrorKind::WrongType {
            expected: ValueKind::Int
        }
    );

    let vm = run_src("PUSH 1 HEAD HALT");
    assert_eq!(
        expect_error(&vm),
        VmErrorKind::WrongType {
            expected: ValueKind::Pair
        }
    );

    let vm = run_src("PUSH 1 PUSH 2 CONS PUSH 0 PUSH 0 CONS CLOSURE HALT");
    assert_eq!(
        expect_error(&vm),
        VmErrorKind::WrongType {
            expected: ValueKind::Function
        }
    );
}

#[test]
fn ret_without_call() {
    let vm = run_src("RET");
    assert_eq!(expect_error(&vm), VmErrorKind::CallStackUnderflow);
}

#[test]
fn runaway_recursion() {
    let vm = run_src("f: CALL f");
    assert_eq!(expect_error(&vm), VmErrorKind::CallStackOverflow);
}

#[test]
fn malformed_bytecode() {
    let mut vm = Vm::new(Program::from_bytes(vec![0x07]).unwrap());
    vm.run();
    assert_eq!(expect_error(&vm), VmErrorKind::InvalidOpcode(0x07));

    let mut vm = Vm::new(Program::from_bytes(vec![0x01, 0x02]).unwrap());
    vm.run();
    assert_eq!(expect_error(&vm), VmErrorKind::TruncatedOperand);

    // no HALT: running off the end
    let mut vm = Vm::new(Program::from_bytes(vec![0x01, 0, 0, 0, 0]).unwrap());
    vm.run();
    assert_eq!(expect_error(&vm), VmErrorKind::PcOutOfBounds(5));

    let vm = run_src("JMP -4");
    assert_eq!(expect_error(&vm), VmErrorKind::PcOutOfBounds(-4));
}

#[test]
fn heap_stays_collectible_after_a_fault() {
    let mut vm = run_src("PUSH 1 PUSH 2 CONS STORE 0 PUSH 1 PUSH 2 CONS PUSH 0 DIV HALT");
    assert_eq!(
        expect_error(&vm),
        VmErrorKind::WrongType {
            expected: ValueKind::Int
        }
    );
    assert_eq!(vm.heap().live_count(), 2);

    // the second pair was popped by the failed DIV
    vm.collect();
    assert_eq!(vm.heap().live_count(), 1);
}

#[test]
fn run_n_steps() {
    let program = stackvm_core::assemble("PUSH 1 PUSH 2 ADD HALT").unwrap();
    let mut vm = Vm::new(program);
    vm.run_n_steps(2);
    assert!(matches!(vm.status(), VmStatus::OutOfSteps));
    assert_eq!(vm.stack().len(), 2);
    vm.run_n_steps(10);
    assert!(vm.is_done());
    assert_eq!(top_int(&vm), 3);
    assert_eq!(vm.instr_count(), 4);
    assert_eq!(vm.byte_count(), 12);
}

#[test]
fn step_stops_after_halt() {
    let program = stackvm_core::assemble("HALT PUSH 9 HALT").unwrap();
    let mut vm = Vm::new(program);
    assert!(vm.step().is_ok());
    assert!(vm.is_done());

    // the bytes after HALT are never executed
    assert!(vm.step().is_ok());
    assert!(vm.stack().is_empty());
    assert_eq!(vm.instr_count(), 1);
    assert_eq!(vm.pc(), 1);
}

#[test]
fn step_records_faults() {
    let program = stackvm_core::assemble("POP PUSH 9 HALT").unwrap();
    let mut vm = Vm::new(program);
    let err = vm.step().unwrap_err();
    assert_eq!(err.kind(), &VmErrorKind::StackUnderflow);
    assert_eq!(expect_error(&vm), VmErrorKind::StackUnderflow);

    assert!(vm.step().is_ok());
    assert!(vm.stack().is_empty());
    assert_eq!(vm.instr_count(), 1);
}
