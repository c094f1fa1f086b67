/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

// functions used for testing

use stackvm_core::vm::Vm;
use stackvm_core::{HeapConfig, assemble};

pub fn unwrap_or_panic<T>(result: Result<T, stackvm_core::AssembleError>, src: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            panic!("{}", e.render("test.asm", src));
        }
    }
}

pub fn run_src(src: &str) -> Vm {
    run_src_with_config(src, HeapConfig::default())
}

pub fn run_src_with_config(src: &str, config: HeapConfig) -> Vm {
    let program = unwrap_or_panic(assemble(src), src);
    let mut vm = Vm::with_config(program, config);
    vm.run();
    vm
}

pub fn top_int(vm: &Vm) -> i32 {
    vm.top().unwrap().as_int()
}
