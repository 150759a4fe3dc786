//! The RV32IM instruction table.
//!
//! One entry per opcode: the mnemonic, the format (fixed bits), the
//! operand family pass two parses by, and the implementation executed by
//! the simulator. Decoding scans the table for the unique format a word
//! matches.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::field;
use super::format::{FieldEqual, InstructionFormat};
use super::{branch_imm, jump_imm, store_imm, MachineCode};
use crate::errors::SimError;
use crate::sim::state::SimulatorState;

pub const OPC_OP: u32 = 0b0110011;
pub const OPC_OPIMM: u32 = 0b0010011;
pub const OPC_LOAD: u32 = 0b0000011;
pub const OPC_STORE: u32 = 0b0100011;
pub const OPC_BRANCH: u32 = 0b1100011;
pub const OPC_JAL: u32 = 0b1101111;
pub const OPC_JALR: u32 = 0b1100111;
pub const OPC_LUI: u32 = 0b0110111;
pub const OPC_AUIPC: u32 = 0b0010111;
pub const OPC_SYSTEM: u32 = 0b1110011;

/// Operand shape of an instruction, used by the pass-two parser and the
/// disassembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// `op rd, rs1, rs2`
    Register,
    /// `op rd, rs1, imm`
    ArithImm,
    /// `op rd, rs1, shamt`
    Shift,
    /// `op rd, imm(rs1)` — loads and `jalr`
    Load,
    /// `op rs2, imm(rs1)`
    Store,
    /// `op rs1, rs2, label`
    Branch,
    /// `op rd, imm`
    Upper,
    /// `op rd, label`
    Jump,
    /// no operands
    System,
}

/// What a single executed instruction asks of the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// An environment call; the simulator dispatches on `a7`.
    Ecall,
    /// Clean halt (`ebreak`).
    Halt,
}

pub type ExecFn = fn(MachineCode, &mut SimulatorState) -> Result<Outcome, SimError>;

pub struct InstructionDef {
    pub name: &'static str,
    pub format: InstructionFormat,
    pub family: Family,
    pub exec: ExecFn,
}

const fn fe(field: super::BitField, value: u32) -> FieldEqual {
    FieldEqual::new(field, value)
}

/// Look up an instruction by (already lowercased) mnemonic.
pub fn lookup(mnemonic: &str) -> Option<&'static InstructionDef> {
    static BY_NAME: Lazy<HashMap<&'static str, &'static InstructionDef>> =
        Lazy::new(|| TABLE.iter().map(|def| (def.name, def)).collect());
    BY_NAME.get(mnemonic).copied()
}

/// Find the unique table entry whose format matches `code`.
pub fn decode(code: MachineCode) -> Option<&'static InstructionDef> {
    TABLE.iter().find(|def| def.format.matches(code))
}

// ---------- implementations ----------

fn step_pc(state: &mut SimulatorState) {
    let pc = state.pc();
    state.set_pc(pc.wrapping_add(MachineCode::LENGTH));
}

/// Shared shape of the register-register ALU group.
fn rtype(code: MachineCode, state: &mut SimulatorState, op: fn(u32, u32) -> u32) {
    let a = state.reg(code.rs1());
    let b = state.reg(code.rs2());
    state.set_reg(code.rd(), op(a, b));
    step_pc(state);
}

/// Shared shape of the register-immediate ALU group.
fn itype(code: MachineCode, state: &mut SimulatorState, op: fn(u32, i32) -> u32) {
    let a = state.reg(code.rs1());
    let imm = code.get_signed(field::IMM_11_0);
    state.set_reg(code.rd(), op(a, imm));
    step_pc(state);
}

fn branch(code: MachineCode, state: &mut SimulatorState, taken: fn(u32, u32) -> bool) {
    let a = state.reg(code.rs1());
    let b = state.reg(code.rs2());
    if taken(a, b) {
        let pc = state.pc();
        state.set_pc(pc.wrapping_add(branch_imm(code) as u32));
    } else {
        step_pc(state);
    }
}

fn load_addr(code: MachineCode, state: &SimulatorState) -> u32 {
    state
        .reg(code.rs1())
        .wrapping_add(code.get_signed(field::IMM_11_0) as u32)
}

fn exec_add(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| a.wrapping_add(b));
    Ok(Outcome::Continue)
}
fn exec_sub(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| a.wrapping_sub(b));
    Ok(Outcome::Continue)
}
fn exec_sll(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| a << (b & 0x1F));
    Ok(Outcome::Continue)
}
fn exec_slt(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| ((a as i32) < (b as i32)) as u32);
    Ok(Outcome::Continue)
}
fn exec_sltu(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| (a < b) as u32);
    Ok(Outcome::Continue)
}
fn exec_xor(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| a ^ b);
    Ok(Outcome::Continue)
}
fn exec_srl(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| a >> (b & 0x1F));
    Ok(Outcome::Continue)
}
fn exec_sra(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| ((a as i32) >> (b & 0x1F)) as u32);
    Ok(Outcome::Continue)
}
fn exec_or(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| a | b);
    Ok(Outcome::Continue)
}
fn exec_and(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| a & b);
    Ok(Outcome::Continue)
}

// RV32M. 64-bit intermediates; division edge cases follow the ISA manual:
// divide by zero gives (-1, dividend), INT_MIN / -1 gives (INT_MIN, 0).
fn exec_mul(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| {
        (a as i32 as i64).wrapping_mul(b as i32 as i64) as u32
    });
    Ok(Outcome::Continue)
}
fn exec_mulh(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| {
        ((a as i32 as i64).wrapping_mul(b as i32 as i64) >> 32) as u32
    });
    Ok(Outcome::Continue)
}
fn exec_mulhsu(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| {
        ((a as i32 as i64).wrapping_mul(b as i64) >> 32) as u32
    });
    Ok(Outcome::Continue)
}
fn exec_mulhu(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| ((a as u64).wrapping_mul(b as u64) >> 32) as u32);
    Ok(Outcome::Continue)
}
fn exec_div(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| {
        let (num, den) = (a as i32, b as i32);
        if den == 0 {
            -1i32 as u32
        } else if num == i32::MIN && den == -1 {
            i32::MIN as u32
        } else {
            num.wrapping_div(den) as u32
        }
    });
    Ok(Outcome::Continue)
}
fn exec_divu(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| if b == 0 { u32::MAX } else { a / b });
    Ok(Outcome::Continue)
}
fn exec_rem(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| {
        let (num, den) = (a as i32, b as i32);
        if den == 0 {
            num as u32
        } else if num == i32::MIN && den == -1 {
            0
        } else {
            num.wrapping_rem(den) as u32
        }
    });
    Ok(Outcome::Continue)
}
fn exec_remu(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    rtype(c, s, |a, b| if b == 0 { a } else { a % b });
    Ok(Outcome::Continue)
}

fn exec_addi(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    itype(c, s, |a, imm| a.wrapping_add(imm as u32));
    Ok(Outcome::Continue)
}
fn exec_slti(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    itype(c, s, |a, imm| ((a as i32) < imm) as u32);
    Ok(Outcome::Continue)
}
fn exec_sltiu(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    itype(c, s, |a, imm| (a < imm as u32) as u32);
    Ok(Outcome::Continue)
}
fn exec_xori(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    itype(c, s, |a, imm| a ^ imm as u32);
    Ok(Outcome::Continue)
}
fn exec_ori(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    itype(c, s, |a, imm| a | imm as u32);
    Ok(Outcome::Continue)
}
fn exec_andi(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    itype(c, s, |a, imm| a & imm as u32);
    Ok(Outcome::Continue)
}

fn exec_slli(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let v = s.reg(c.rs1()) << c.get(field::SHAMT);
    s.set_reg(c.rd(), v);
    step_pc(s);
    Ok(Outcome::Continue)
}
fn exec_srli(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let v = s.reg(c.rs1()) >> c.get(field::SHAMT);
    s.set_reg(c.rd(), v);
    step_pc(s);
    Ok(Outcome::Continue)
}
fn exec_srai(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let v = (s.reg(c.rs1()) as i32) >> c.get(field::SHAMT);
    s.set_reg(c.rd(), v as u32);
    step_pc(s);
    Ok(Outcome::Continue)
}

fn exec_lb(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let v = s.load8(load_addr(c, s))? as i8 as i32 as u32;
    s.set_reg(c.rd(), v);
    step_pc(s);
    Ok(Outcome::Continue)
}
fn exec_lh(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let v = s.load16(load_addr(c, s))? as i16 as i32 as u32;
    s.set_reg(c.rd(), v);
    step_pc(s);
    Ok(Outcome::Continue)
}
fn exec_lw(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let v = s.load32(load_addr(c, s))?;
    s.set_reg(c.rd(), v);
    step_pc(s);
    Ok(Outcome::Continue)
}
fn exec_lbu(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let v = s.load8(load_addr(c, s))? as u32;
    s.set_reg(c.rd(), v);
    step_pc(s);
    Ok(Outcome::Continue)
}
fn exec_lhu(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let v = s.load16(load_addr(c, s))? as u32;
    s.set_reg(c.rd(), v);
    step_pc(s);
    Ok(Outcome::Continue)
}

fn store_addr(code: MachineCode, state: &SimulatorState) -> u32 {
    state.reg(code.rs1()).wrapping_add(store_imm(code) as u32)
}

fn exec_sb(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let v = s.reg(c.rs2()) as u8;
    s.store8(store_addr(c, s), v)?;
    step_pc(s);
    Ok(Outcome::Continue)
}
fn exec_sh(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let v = s.reg(c.rs2()) as u16;
    s.store16(store_addr(c, s), v)?;
    step_pc(s);
    Ok(Outcome::Continue)
}
fn exec_sw(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let v = s.reg(c.rs2());
    s.store32(store_addr(c, s), v)?;
    step_pc(s);
    Ok(Outcome::Continue)
}

fn exec_beq(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    branch(c, s, |a, b| a == b);
    Ok(Outcome::Continue)
}
fn exec_bne(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    branch(c, s, |a, b| a != b);
    Ok(Outcome::Continue)
}
fn exec_blt(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    branch(c, s, |a, b| (a as i32) < (b as i32));
    Ok(Outcome::Continue)
}
fn exec_bge(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    branch(c, s, |a, b| (a as i32) >= (b as i32));
    Ok(Outcome::Continue)
}
fn exec_bltu(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    branch(c, s, |a, b| a < b);
    Ok(Outcome::Continue)
}
fn exec_bgeu(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    branch(c, s, |a, b| a >= b);
    Ok(Outcome::Continue)
}

fn exec_lui(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    s.set_reg(c.rd(), c.get(field::IMM_31_12) << 12);
    step_pc(s);
    Ok(Outcome::Continue)
}
fn exec_auipc(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let v = s.pc().wrapping_add(c.get(field::IMM_31_12) << 12);
    s.set_reg(c.rd(), v);
    step_pc(s);
    Ok(Outcome::Continue)
}

fn exec_jal(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let pc = s.pc();
    s.set_reg(c.rd(), pc.wrapping_add(4));
    s.set_pc(pc.wrapping_add(jump_imm(c) as u32));
    Ok(Outcome::Continue)
}
fn exec_jalr(c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    let pc = s.pc();
    let target = s
        .reg(c.rs1())
        .wrapping_add(c.get_signed(field::IMM_11_0) as u32)
        & !1;
    s.set_reg(c.rd(), pc.wrapping_add(4));
    s.set_pc(target);
    Ok(Outcome::Continue)
}

fn exec_ecall(_c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    step_pc(s);
    Ok(Outcome::Ecall)
}
fn exec_ebreak(_c: MachineCode, s: &mut SimulatorState) -> Result<Outcome, SimError> {
    step_pc(s);
    Ok(Outcome::Halt)
}

// ---------- the table ----------

macro_rules! def {
    ($name:literal, $family:expr, $exec:ident, [$($f:expr),+ $(,)?]) => {
        InstructionDef {
            name: $name,
            format: InstructionFormat::new(&[$($f),+]),
            family: $family,
            exec: $exec,
        }
    };
}

pub static TABLE: &[InstructionDef] = &[
    // RV32I register-register
    def!("add", Family::Register, exec_add,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b000), fe(field::FUNCT7, 0)]),
    def!("sub", Family::Register, exec_sub,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b000), fe(field::FUNCT7, 0b0100000)]),
    def!("sll", Family::Register, exec_sll,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b001), fe(field::FUNCT7, 0)]),
    def!("slt", Family::Register, exec_slt,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b010), fe(field::FUNCT7, 0)]),
    def!("sltu", Family::Register, exec_sltu,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b011), fe(field::FUNCT7, 0)]),
    def!("xor", Family::Register, exec_xor,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b100), fe(field::FUNCT7, 0)]),
    def!("srl", Family::Register, exec_srl,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b101), fe(field::FUNCT7, 0)]),
    def!("sra", Family::Register, exec_sra,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b101), fe(field::FUNCT7, 0b0100000)]),
    def!("or", Family::Register, exec_or,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b110), fe(field::FUNCT7, 0)]),
    def!("and", Family::Register, exec_and,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b111), fe(field::FUNCT7, 0)]),
    // RV32M
    def!("mul", Family::Register, exec_mul,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b000), fe(field::FUNCT7, 1)]),
    def!("mulh", Family::Register, exec_mulh,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b001), fe(field::FUNCT7, 1)]),
    def!("mulhsu", Family::Register, exec_mulhsu,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b010), fe(field::FUNCT7, 1)]),
    def!("mulhu", Family::Register, exec_mulhu,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b011), fe(field::FUNCT7, 1)]),
    def!("div", Family::Register, exec_div,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b100), fe(field::FUNCT7, 1)]),
    def!("divu", Family::Register, exec_divu,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b101), fe(field::FUNCT7, 1)]),
    def!("rem", Family::Register, exec_rem,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b110), fe(field::FUNCT7, 1)]),
    def!("remu", Family::Register, exec_remu,
         [fe(field::OPCODE, OPC_OP), fe(field::FUNCT3, 0b111), fe(field::FUNCT7, 1)]),
    // register-immediate
    def!("addi", Family::ArithImm, exec_addi,
         [fe(field::OPCODE, OPC_OPIMM), fe(field::FUNCT3, 0b000)]),
    def!("slti", Family::ArithImm, exec_slti,
         [fe(field::OPCODE, OPC_OPIMM), fe(field::FUNCT3, 0b010)]),
    def!("sltiu", Family::ArithImm, exec_sltiu,
         [fe(field::OPCODE, OPC_OPIMM), fe(field::FUNCT3, 0b011)]),
    def!("xori", Family::ArithImm, exec_xori,
         [fe(field::OPCODE, OPC_OPIMM), fe(field::FUNCT3, 0b100)]),
    def!("ori", Family::ArithImm, exec_ori,
         [fe(field::OPCODE, OPC_OPIMM), fe(field::FUNCT3, 0b110)]),
    def!("andi", Family::ArithImm, exec_andi,
         [fe(field::OPCODE, OPC_OPIMM), fe(field::FUNCT3, 0b111)]),
    def!("slli", Family::Shift, exec_slli,
         [fe(field::OPCODE, OPC_OPIMM), fe(field::FUNCT3, 0b001), fe(field::FUNCT7, 0)]),
    def!("srli", Family::Shift, exec_srli,
         [fe(field::OPCODE, OPC_OPIMM), fe(field::FUNCT3, 0b101), fe(field::FUNCT7, 0)]),
    def!("srai", Family::Shift, exec_srai,
         [fe(field::OPCODE, OPC_OPIMM), fe(field::FUNCT3, 0b101), fe(field::FUNCT7, 0b0100000)]),
    // loads
    def!("lb", Family::Load, exec_lb,
         [fe(field::OPCODE, OPC_LOAD), fe(field::FUNCT3, 0b000)]),
    def!("lh", Family::Load, exec_lh,
         [fe(field::OPCODE, OPC_LOAD), fe(field::FUNCT3, 0b001)]),
    def!("lw", Family::Load, exec_lw,
         [fe(field::OPCODE, OPC_LOAD), fe(field::FUNCT3, 0b010)]),
    def!("lbu", Family::Load, exec_lbu,
         [fe(field::OPCODE, OPC_LOAD), fe(field::FUNCT3, 0b100)]),
    def!("lhu", Family::Load, exec_lhu,
         [fe(field::OPCODE, OPC_LOAD), fe(field::FUNCT3, 0b101)]),
    // stores
    def!("sb", Family::Store, exec_sb,
         [fe(field::OPCODE, OPC_STORE), fe(field::FUNCT3, 0b000)]),
    def!("sh", Family::Store, exec_sh,
         [fe(field::OPCODE, OPC_STORE), fe(field::FUNCT3, 0b001)]),
    def!("sw", Family::Store, exec_sw,
         [fe(field::OPCODE, OPC_STORE), fe(field::FUNCT3, 0b010)]),
    // branches
    def!("beq", Family::Branch, exec_beq,
         [fe(field::OPCODE, OPC_BRANCH), fe(field::FUNCT3, 0b000)]),
    def!("bne", Family::Branch, exec_bne,
         [fe(field::OPCODE, OPC_BRANCH), fe(field::FUNCT3, 0b001)]),
    def!("blt", Family::Branch, exec_blt,
         [fe(field::OPCODE, OPC_BRANCH), fe(field::FUNCT3, 0b100)]),
    def!("bge", Family::Branch, exec_bge,
         [fe(field::OPCODE, OPC_BRANCH), fe(field::FUNCT3, 0b101)]),
    def!("bltu", Family::Branch, exec_bltu,
         [fe(field::OPCODE, OPC_BRANCH), fe(field::FUNCT3, 0b110)]),
    def!("bgeu", Family::Branch, exec_bgeu,
         [fe(field::OPCODE, OPC_BRANCH), fe(field::FUNCT3, 0b111)]),
    // upper immediates, jumps, system
    def!("lui", Family::Upper, exec_lui, [fe(field::OPCODE, OPC_LUI)]),
    def!("auipc", Family::Upper, exec_auipc, [fe(field::OPCODE, OPC_AUIPC)]),
    def!("jal", Family::Jump, exec_jal, [fe(field::OPCODE, OPC_JAL)]),
    def!("jalr", Family::Load, exec_jalr,
         [fe(field::OPCODE, OPC_JALR), fe(field::FUNCT3, 0b000)]),
    def!("ecall", Family::System, exec_ecall,
         [fe(field::OPCODE, OPC_SYSTEM), fe(field::FUNCT3, 0b000), fe(field::IMM_11_0, 0)]),
    def!("ebreak", Family::System, exec_ebreak,
         [fe(field::OPCODE, OPC_SYSTEM), fe(field::FUNCT3, 0b000), fe(field::IMM_11_0, 1)]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_sensitive_lowercase() {
        assert!(lookup("add").is_some());
        assert!(lookup("ADD").is_none());
        assert!(lookup("mulhsu").is_some());
        assert!(lookup("nop").is_none(), "pseudo, not TAL");
    }

    #[test]
    fn every_fill_satisfies_its_own_format() {
        for def in TABLE {
            let code = def.format.fill();
            assert!(def.format.matches(code), "{}", def.name);
        }
    }

    #[test]
    fn filled_formats_decode_to_themselves() {
        for def in TABLE {
            let decoded = decode(def.format.fill()).expect(def.name);
            assert_eq!(decoded.name, def.name);
        }
    }

    #[test]
    fn each_word_matches_exactly_one_format() {
        for def in TABLE {
            let code = def.format.fill();
            let matching: Vec<_> = TABLE
                .iter()
                .filter(|other| other.format.matches(code))
                .map(|other| other.name)
                .collect();
            assert_eq!(matching, vec![def.name]);
        }
    }

    #[test]
    fn undecodable_word_is_rejected() {
        assert!(decode(MachineCode::new(0)).is_none());
        assert!(decode(MachineCode::new(0xFFFF_FFFF)).is_none());
    }
}
