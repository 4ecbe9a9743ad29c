#![allow(dead_code)]

use mipsim_vm::{Register, VirtualMachine, VmConfig};

pub const TEXT: u32 = 0x0040_0000;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A VM with `program` stored from `base` and PC pointing at it.
pub fn machine_at(base: u32, program: &[u32]) -> VirtualMachine {
    init_logging();
    let mut vm = VirtualMachine::new(VmConfig::default()).unwrap();
    load(&mut vm, base, program);
    vm.set_pc(base);
    vm
}

pub fn machine(program: &[u32]) -> VirtualMachine {
    machine_at(TEXT, program)
}

pub fn load(vm: &mut VirtualMachine, base: u32, program: &[u32]) {
    for (i, word) in program.iter().enumerate() {
        vm.write_word(base + 4 * i as u32, *word);
    }
}

pub fn steps(vm: &mut VirtualMachine, n: usize) {
    for _ in 0..n {
        vm.step().unwrap();
    }
}

pub fn r(num: u32) -> Register {
    Register::from_field(num)
}
