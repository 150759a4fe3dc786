//! Render a machine word back to assembly text.

use super::regs::abi_name;
use super::table::{decode, Family};
use super::{branch_imm, field, jump_imm, store_imm, MachineCode};

/// Disassemble one word. Words that decode render with ABI register
/// names; anything else renders as a raw `.word`.
pub fn disasm(code: MachineCode) -> String {
    let def = match decode(code) {
        Some(def) => def,
        None => return format!(".word {:#010x}", code.word()),
    };
    let rd = abi_name(code.rd());
    let rs1 = abi_name(code.rs1());
    let rs2 = abi_name(code.rs2());
    match def.family {
        Family::Register => format!("{} {rd}, {rs1}, {rs2}", def.name),
        Family::ArithImm => {
            format!("{} {rd}, {rs1}, {}", def.name, code.get_signed(field::IMM_11_0))
        }
        Family::Shift => format!("{} {rd}, {rs1}, {}", def.name, code.get(field::SHAMT)),
        Family::Load => {
            format!("{} {rd}, {}({rs1})", def.name, code.get_signed(field::IMM_11_0))
        }
        Family::Store => format!("{} {rs2}, {}({rs1})", def.name, store_imm(code)),
        Family::Branch => format!("{} {rs1}, {rs2}, {}", def.name, branch_imm(code)),
        Family::Upper => format!("{} {rd}, {:#x}", def.name, code.get(field::IMM_31_12)),
        Family::Jump => format!("{} {rd}, {}", def.name, jump_imm(code)),
        Family::System => def.name.to_string(),
    }
}
