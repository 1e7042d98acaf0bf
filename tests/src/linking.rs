use common::asm::{Ins, Opcode::*, Reg::*};
use emu_lib::{Status, Vm, VmConfig};
use link_lib::{LinkError, link};
use objfile::{Executable, Module, Symbol};

fn sym(name: &str, addr: u32) -> Symbol {
    Symbol::new(name, addr).unwrap()
}

// mainx20: call square; load r2, value; halt
fn main_module() -> Module {
    Module {
        insymbols: vec![sym("mainx20", 0)],
        outsymbols: vec![sym("square", 0), sym("value", 1)],
        code: vec![
            Ins::jump(Call, 0).encode(),
            Ins::reg_addr(Load, R2, 0).encode(),
            Ins::no_operand(Halt).encode(),
        ],
    }
}

// square: r1 = 7 * 7; ret. value: 5
fn lib_module() -> Module {
    Module {
        insymbols: vec![sym("square", 0), sym("value", 3)],
        outsymbols: vec![],
        code: vec![
            Ins::reg_addr(Ldimm, R1, 7).encode(),
            Ins::reg_reg(Muli, R1, R1).encode(),
            Ins::no_operand(Ret).encode(),
            5,
        ],
    }
}

fn run_exe(exe: Executable) -> emu_lib::ProcessorReport {
    let mut vm = Vm::initialize(VmConfig::default().with_mem_words(1024)).unwrap();
    vm.load(&exe.to_bytes()).unwrap();
    let mut report = vm.run(1, &[1024], false).unwrap();
    report.processors.remove(0)
}

#[test]
fn link_then_run() {
    let exe = link(&[main_module(), lib_module()]).unwrap();
    assert_eq!(exe.lookup("square"), Some(3));
    assert_eq!(exe.lookup("value"), Some(6));

    let p = run_exe(exe);
    assert_eq!(p.status, Status::NormalTermination);
    assert_eq!(p.regs.get(R1), 49);
    assert_eq!(p.regs.get(R2), 5);
    assert_eq!(p.regs.get(SP), 1024);
}

#[test]
fn module_order_sets_layout() {
    let mut lib = lib_module();
    lib.insymbols.push(sym("mainx20", 4));
    lib.code.push(Ins::jump(Jmp, 0).encode());
    lib.outsymbols.push(sym("start", 4));

    let mut main = main_module();
    main.insymbols = vec![sym("start", 0)];

    // lib first: 0..4 lib code, 4: jmp start, 5..8 main
    let exe = link(&[lib, main]).unwrap();
    assert_eq!(exe.lookup("mainx20"), Some(4));
    assert_eq!(exe.lookup("start"), Some(5));

    // jmp at 4 to start at 5; call at 5 back to square at 0.
    assert_eq!(Ins::decode(exe.code[4]).unwrap(), Ins::jump(Jmp, 0));
    assert_eq!(Ins::decode(exe.code[5]).unwrap(), Ins::jump(Call, -6));
}

#[test]
fn executable_round_trip() {
    let exe = link(&[main_module(), lib_module()]).unwrap();
    let bytes = exe.to_bytes();
    let back = Executable::from_bytes(&bytes).unwrap();
    assert_eq!(back.code, exe.code);
    assert_eq!(back.symbols, exe.symbols);
    assert_eq!(back.to_bytes(), bytes);
}

#[test]
fn linking_is_deterministic() {
    let a = link(&[main_module(), lib_module()]).unwrap().to_bytes();
    let b = link(&[main_module(), lib_module()]).unwrap().to_bytes();
    assert_eq!(a, b);
}

// 16-bit fields are patched relative to the word before the instruction,
// so a linked branch lands two words past its label.
#[test]
fn narrow_branch_lands_past_label() {
    let main = Module {
        insymbols: vec![sym("mainx20", 0)],
        outsymbols: vec![sym("target", 0)],
        code: vec![Ins::reg_reg_addr(Beq, R0, R0, 0).encode()],
    };
    let lib = Module {
        insymbols: vec![sym("target", 0)],
        outsymbols: vec![],
        code: vec![
            Ins::reg_addr(Ldimm, R1, 1).encode(),
            Ins::reg_addr(Ldimm, R2, 1).encode(),
            Ins::reg_addr(Ldimm, R3, 1).encode(),
        ],
    };
    let p = run_exe(link(&[main, lib]).unwrap());
    assert_eq!(p.status, Status::NormalTermination);
    assert_eq!((p.regs.get(R1), p.regs.get(R2), p.regs.get(R3)), (0, 0, 1));
}

#[test]
fn link_errors() {
    assert!(matches!(link(&[main_module()]), Err(LinkError::UnresolvedSymbol { .. })));
    assert!(matches!(
        link(&[main_module(), lib_module(), lib_module()]),
        Err(LinkError::DuplicateSymbol(_))
    ));
    assert!(matches!(link(&[lib_module()]), Err(LinkError::MissingEntryPoint)));
}

#[test]
fn module_is_not_an_executable() {
    let bytes = main_module().to_bytes();
    assert!(Executable::from_bytes(&bytes).is_err());

    let mut vm = Vm::initialize(VmConfig::default().with_mem_words(64)).unwrap();
    assert!(matches!(vm.load(&bytes), Err(emu_lib::VmError::Format(_))));
}
