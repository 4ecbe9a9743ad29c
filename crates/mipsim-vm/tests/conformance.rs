//! Architectural conformance fixtures: small hand-assembled programs run
//! through the public single-step surface.

mod common;

use common::*;

/// addi $v0..$a1 = 200, 500, -200, -500
const OPERANDS: [u32; 4] = [0x2002_00C8, 0x2003_01F4, 0x2004_FF38, 0x2005_FE0C];

fn with_operands(body: &[u32]) -> Vec<u32> {
    OPERANDS.iter().chain(body).copied().collect()
}

fn signed(vm: &mipsim_vm::VirtualMachine, num: u32) -> i32 {
    vm.reg(r(num)) as i32
}

#[test]
fn add() {
    let mut vm = machine(&with_operands(&[
        0x0043_6020, // add $t4, $v0, $v1
        0x0045_6820, // add $t5, $v0, $a1
        0x0083_7020, // add $t6, $a0, $v1
        0x0085_7820, // add $t7, $a0, $a1
    ]));
    steps(&mut vm, 8);
    assert_eq!(signed(&vm, 12), 700);
    assert_eq!(signed(&vm, 13), -300);
    assert_eq!(signed(&vm, 14), 300);
    assert_eq!(signed(&vm, 15), -700);
}

#[test]
fn addi() {
    let mut vm = machine(&with_operands(&[
        0x2048_01F4, // addi $t0, $v0, 500
        0x2049_FE0C, // addi $t1, $v0, -500
        0x208A_01F4, // addi $t2, $a0, 500
        0x208B_FE0C, // addi $t3, $a0, -500
    ]));
    steps(&mut vm, 8);
    assert_eq!(signed(&vm, 2), 200);
    assert_eq!(signed(&vm, 3), 500);
    assert_eq!(signed(&vm, 4), -200);
    assert_eq!(signed(&vm, 5), -500);
    assert_eq!(signed(&vm, 8), 700);
    assert_eq!(signed(&vm, 9), -300);
    assert_eq!(signed(&vm, 10), 300);
    assert_eq!(signed(&vm, 11), -700);
}

#[test]
fn addiu() {
    let mut vm = machine(&with_operands(&[
        0x2448_01F4,
        0x2449_FE0C,
        0x248A_01F4,
        0x248B_FE0C,
    ]));
    steps(&mut vm, 8);
    assert_eq!(signed(&vm, 8), 700);
    assert_eq!(signed(&vm, 9), -300);
    assert_eq!(signed(&vm, 10), 300);
    assert_eq!(signed(&vm, 11), -700);
}

#[test]
fn addu() {
    let mut vm = machine(&with_operands(&[
        0x0043_4021,
        0x0045_4821,
        0x0083_5021,
        0x0085_5821,
    ]));
    steps(&mut vm, 8);
    assert_eq!(signed(&vm, 8), 700);
    assert_eq!(signed(&vm, 9), -300);
    assert_eq!(signed(&vm, 10), 300);
    assert_eq!(signed(&vm, 11), -700);
}

#[test]
fn sub_and_subu() {
    let mut vm = machine(&with_operands(&[
        0x0043_6022, // sub  $t4, $v0, $v1
        0x0045_6822, // sub  $t5, $v0, $a1
        0x0083_7023, // subu $t6, $a0, $v1
        0x0085_7823, // subu $t7, $a0, $a1
    ]));
    steps(&mut vm, 8);
    assert_eq!(signed(&vm, 12), -300);
    assert_eq!(signed(&vm, 13), 700);
    assert_eq!(signed(&vm, 14), -700);
    assert_eq!(signed(&vm, 15), 300);
}

#[test]
fn and() {
    let mut vm = machine(&with_operands(&[
        0x0043_4024,
        0x0045_4824,
        0x0083_5024,
        0x0085_5824,
    ]));
    steps(&mut vm, 8);
    assert_eq!(vm.reg(r(8)), 192);
    assert_eq!(vm.reg(r(9)), 8);
    assert_eq!(vm.reg(r(10)), 304);
    assert_eq!(vm.reg(r(11)), 0xFFFF_FE08);
}

#[test]
fn andi() {
    let mut vm = machine(&with_operands(&[
        0x3048_01F4,
        0x3049_FE0C,
        0x308A_01F4,
        0x308B_FE0C,
    ]));
    steps(&mut vm, 8);
    assert_eq!(vm.reg(r(8)), 192);
    assert_eq!(vm.reg(r(9)), 8);
    assert_eq!(vm.reg(r(10)), 304);
    assert_eq!(vm.reg(r(11)), 65032);
}

/// Two setup instructions, a branch back to the start and a nop in the
/// delay slot. Five cycles later the first instruction has been fetched
/// again.
fn branch_back(first: u32, branch: u32) -> mipsim_vm::VirtualMachine {
    let mut vm = machine(&[first, 0x2003_00C8, branch, 0x0000_0000]);
    steps(&mut vm, 5);
    assert_eq!(
        vm.pc() - 4,
        TEXT,
        "branch {:#010x} did not return to the start",
        branch
    );
    vm
}

const EQUAL: u32 = 0x2002_00C8; // $v0 = 200 = $v1
const NEGATIVE: u32 = 0x2002_FF38; // $v0 = -200

#[test]
fn branches_taken() {
    for branch in [
        0x1043_FFFD, // beq
        0x5043_FFFD, // beql
        0x0441_FFFD, // bgez
        0x0443_FFFD, // bgezl
        0x1C40_FFFD, // bgtz
        0x5C40_FFFD, // bgtzl
    ] {
        branch_back(EQUAL, branch);
    }
    for branch in [
        0x1840_FFFD, // blez
        0x5840_FFFD, // blezl
        0x0440_FFFD, // bltz
        0x0442_FFFD, // bltzl
        0x1443_FFFD, // bne
        0x5443_FFFD, // bnel
    ] {
        branch_back(NEGATIVE, branch);
    }
}

#[test]
fn branch_and_link() {
    for (first, branch) in [
        (EQUAL, 0x0451_FFFD),    // bgezal
        (EQUAL, 0x0453_FFFD),    // bgezall
        (NEGATIVE, 0x0450_FFFD), // bltzal
        (NEGATIVE, 0x0452_FFFD), // bltzall
    ] {
        let vm = branch_back(first, branch);
        assert_eq!(vm.reg(r(31)), 0x0040_0010);
    }
}

#[test]
fn clo() {
    let mut vm = machine(&[NEGATIVE, 0x2003_00C8, 0x7040_2021, 0x7060_2821]);
    steps(&mut vm, 4);
    assert_eq!(vm.reg(r(4)), 0x18);
    assert_eq!(vm.reg(r(5)), 0);
}

#[test]
fn clz() {
    let mut vm = machine(&[NEGATIVE, 0x2003_00C8, 0x7040_2020, 0x7060_2820]);
    steps(&mut vm, 4);
    assert_eq!(vm.reg(r(4)), 0);
    assert_eq!(vm.reg(r(5)), 0x18);
}

#[test]
fn div() {
    // $v0 = -53, $v1 = 200
    let mut vm = machine(&[0x2002_FFCB, 0x2003_00C8, 0x0043_001A]);
    steps(&mut vm, 3);
    assert_eq!(vm.hi(), 0xFFFF_FFCB);
    assert_eq!(vm.lo(), 0);

    vm.write_word(0x0040_000C, 0x0062_001A);
    steps(&mut vm, 1);
    assert_eq!(vm.hi(), 0x29);
    assert_eq!(vm.lo(), 0xFFFF_FFFD);
}

#[test]
fn divu() {
    let mut vm = machine(&[0x2002_FFCB, 0x2003_00C8, 0x0043_001B]);
    steps(&mut vm, 3);
    assert_eq!(vm.hi(), 0x2B);
    assert_eq!(vm.lo(), 0x0147_AE14);

    vm.write_word(0x0040_000C, 0x0062_001B);
    steps(&mut vm, 1);
    assert_eq!(vm.hi(), 0xC8);
    assert_eq!(vm.lo(), 0);
}

fn jump_fixture(jump: u32) -> mipsim_vm::VirtualMachine {
    let mut program = vec![0; 10];
    program.push(jump);
    program.push(0);
    let mut vm = machine(&program);
    steps(&mut vm, 13);
    assert_eq!(vm.pc() - 4, TEXT);
    vm
}

#[test]
fn j() {
    jump_fixture(0x0810_0000);
}

#[test]
fn jal() {
    let vm = jump_fixture(0x0C10_0000);
    assert_eq!(vm.reg(r(31)), 0x0040_0030);
}

#[test]
fn jalr_links_through_rd() {
    let mut vm = machine(&[
        0x3C19_0040, // lui  $t9, 0x0040
        0x3739_0100, // ori  $t9, $t9, 0x0100
        0x0320_8009, // jalr $s0, $t9
        0x0000_0000,
    ]);
    steps(&mut vm, 5);
    assert_eq!(vm.pc() - 4, 0x0040_0100);
    assert_eq!(vm.reg(r(16)), 0x0040_0010);
    assert_eq!(vm.reg(r(31)), 0);
}

#[test]
fn multiply_family() {
    let mut vm = machine(&[
        0x2002_FFFE, // addi  $v0, $zero, -2
        0x2003_0003, // addi  $v1, $zero, 3
        0x0043_0018, // mult  $v0, $v1
        0x0000_2010, // mfhi  $a0
        0x0000_2812, // mflo  $a1
        0x7043_0000, // madd  $v0, $v1
        0x0043_0019, // multu $v0, $v1
        0x7043_3002, // mul   $a2, $v0, $v1
    ]);
    steps(&mut vm, 5);
    assert_eq!(vm.reg(r(4)), 0xFFFF_FFFF);
    assert_eq!(vm.reg(r(5)), 0xFFFF_FFFA);

    steps(&mut vm, 1);
    assert_eq!((vm.hi(), vm.lo()), (0xFFFF_FFFF, 0xFFFF_FFF4));

    steps(&mut vm, 1);
    assert_eq!((vm.hi(), vm.lo()), (2, 0xFFFF_FFFA));

    steps(&mut vm, 1);
    assert_eq!(vm.reg(r(6)) as i32, -6);
    assert_eq!((vm.hi(), vm.lo()), (2, 0xFFFF_FFFA));
}

#[test]
fn shifts_mask_variable_amounts() {
    let mut vm = machine(&[
        0x2002_FFF0, // addi $v0, $zero, -16
        0x0002_1883, // sra  $v1, $v0, 2
        0x0002_2702, // srl  $a0, $v0, 28
        0x2005_0021, // addi $a1, $zero, 33
        0x00A2_3004, // sllv $a2, $v0, $a1
    ]);
    steps(&mut vm, 5);
    assert_eq!(vm.reg(r(3)), 0xFFFF_FFFC);
    assert_eq!(vm.reg(r(4)), 0xF);
    assert_eq!(vm.reg(r(6)), 0xFFFF_FFE0);
}

#[test]
fn set_less_than_immediate() {
    let mut vm = machine(&[
        0x2002_0005, // addi  $v0, $zero, 5
        0x2C43_FFFF, // sltiu $v1, $v0, -1
        0x2844_FFFF, // slti  $a0, $v0, -1
    ]);
    steps(&mut vm, 3);
    assert_eq!(vm.reg(r(3)), 1);
    assert_eq!(vm.reg(r(4)), 0);
}

#[test]
fn bit_field_operations() {
    let mut vm = machine(&[
        0x3C02_1234, // lui  $v0, 0x1234
        0x3442_5678, // ori  $v0, $v0, 0x5678
        0x7C43_3900, // ext  $v1, $v0, 4, 8
        0x7C44_7A04, // ins  $a0, $v0, 8, 8
        0x7C02_2C20, // seb  $a1, $v0
        0x7C02_30A0, // wsbh $a2, $v0
    ]);
    steps(&mut vm, 6);
    assert_eq!(vm.reg(r(3)), 0x67);
    assert_eq!(vm.reg(r(4)), 0x7800);
    assert_eq!(vm.reg(r(5)), 0x78);
    assert_eq!(vm.reg(r(6)), 0x3412_7856);
}

#[test]
fn loads_extend_correctly() {
    let mut vm = machine(&[
        0x3C02_1000, // lui $v0, 0x1000
        0x8043_0000, // lb  $v1, 0($v0)
        0x9044_0000, // lbu $a0, 0($v0)
        0xA443_0002, // sh  $v1, 2($v0)
        0x8445_0002, // lh  $a1, 2($v0)
        0x9446_0002, // lhu $a2, 2($v0)
        0xAC44_0004, // sw  $a0, 4($v0)
        0x8C47_0004, // lw  $a3, 4($v0)
    ]);
    vm.write_byte(0x1000_0000, 0x80);
    steps(&mut vm, 8);
    assert_eq!(vm.reg(r(3)), 0xFFFF_FF80);
    assert_eq!(vm.reg(r(4)), 0x80);
    assert_eq!(vm.read_half(0x1000_0002), 0xFF80);
    assert_eq!(vm.reg(r(5)), 0xFFFF_FF80);
    assert_eq!(vm.reg(r(6)), 0xFF80);
    assert_eq!(vm.reg(r(7)), 0x80);
}

#[test]
fn unaligned_word_access() {
    let mut vm = machine(&[
        0x3C02_1000, // lui $v0, 0x1000
        0x8843_0001, // lwl $v1, 1($v0)
        0x9843_0004, // lwr $v1, 4($v0)
        0xA843_0011, // swl $v1, 0x11($v0)
        0xB843_0014, // swr $v1, 0x14($v0)
    ]);
    vm.write_word(0x1000_0000, 0x1122_3344);
    vm.write_word(0x1000_0004, 0x5566_7788);
    steps(&mut vm, 3);
    assert_eq!(vm.reg(r(3)), 0x2233_4455);

    steps(&mut vm, 2);
    assert_eq!(vm.read_word(0x1000_0011), 0x2233_4455);
    assert_eq!(vm.read_byte(0x1000_0010), 0);
    assert_eq!(vm.read_byte(0x1000_0015), 0);
}

#[test]
fn load_linked_store_conditional() {
    let mut vm = machine(&[
        0x3C02_1000, // lui   $v0, 0x1000
        0xC043_0000, // ll    $v1, 0($v0)
        0x2463_0001, // addiu $v1, $v1, 1
        0xE043_0000, // sc    $v1, 0($v0)
        0xE044_0000, // sc    $a0, 0($v0)
    ]);
    vm.write_word(0x1000_0000, 41);
    steps(&mut vm, 4);
    assert_eq!(vm.reg(r(3)), 1);
    assert_eq!(vm.read_word(0x1000_0000), 42);
    assert_eq!(
        vm.cop0().read(mipsim_vm::Cop0Reg::LL_ADDR),
        0x1000_0000 >> 4
    );

    vm.set_reg(r(4), 7);
    steps(&mut vm, 1);
    assert_eq!(vm.reg(r(4)), 0);
    assert_eq!(vm.read_word(0x1000_0000), 42);
}

#[test]
fn conditional_moves() {
    let mut vm = machine(&[
        0x2002_0007, // addi $v0, $zero, 7
        0x0040_200A, // movz $a0, $v0, $zero
        0x0040_280B, // movn $a1, $v0, $zero
    ]);
    steps(&mut vm, 3);
    assert_eq!(vm.reg(r(4)), 7);
    assert_eq!(vm.reg(r(5)), 0);
}

#[test]
fn register_zero_is_never_written() {
    let mut vm = machine(&[
        0x2000_0005, // addi $zero, $zero, 5
        0x3C00_FFFF, // lui  $zero, 0xffff
        0x0000_0827, // nor  $at, $zero, $zero
        0x0001_0021, // addu $zero, $zero, $at
    ]);
    steps(&mut vm, 4);
    assert_eq!(vm.reg(r(0)), 0);
    assert_eq!(vm.reg(r(1)), 0xFFFF_FFFF);
}
