//! Assembler pass two: `.equiv` chain resolution, then one `MachineCode`
//! per TAL line via the instruction table.

use std::collections::{HashMap, HashSet};

use crate::arch::TEXT_BEGIN;
use crate::asm::parse::{resolve_offset, split_symbol_offset, user_string_to_int};
use crate::asm::program::{Program, TalLine};
use crate::errors::AsmError;
use crate::isa::regs::parse_register;
use crate::isa::table::{lookup, Family};
use crate::isa::{field, set_branch_imm, set_jump_imm, set_store_imm, MachineCode};
use crate::relocate::Relocator;

pub fn pass_two(program: &mut Program, tal: &[TalLine]) -> Vec<AsmError> {
    let mut errors = resolve_equivs(program);

    for (i, tal_line) in tal.iter().enumerate() {
        let offset = TEXT_BEGIN + (i as u32) * MachineCode::LENGTH;
        let line = tal_line.debug.line;
        let mnemonic = tal_line.tokens[0].to_lowercase();
        let code = match lookup(&mnemonic) {
            Some(def) => {
                let mut code = def.format.fill();
                let mut ctx = ParseCtx {
                    program: &mut *program,
                    offset,
                    line,
                };
                if let Err(e) = parse_operands(def.family, &mut code, &tal_line.tokens[1..], &mut ctx)
                {
                    errors.push(e);
                }
                code
            }
            None => {
                errors.push(AsmError::parse(
                    line,
                    format!("unknown instruction {mnemonic}"),
                ));
                MachineCode::default()
            }
        };
        program.insts.push(code);
        program.debug_info.push(tal_line.debug.clone());
    }
    debug_assert_eq!(program.insts.len() * 4, program.text_size as usize);
    errors
}

/// Chase every `.equiv` right-hand side down to a value and install the
/// results as labels. Cycles and label collisions are errors.
fn resolve_equivs(program: &mut Program) -> Vec<AsmError> {
    let mut errors = Vec::new();
    let mut resolved: HashMap<String, u32> = HashMap::new();
    let names: Vec<String> = program.equivs.keys().cloned().collect();
    for name in &names {
        let mut visiting = HashSet::new();
        match chase(name, program, &mut resolved, &mut visiting) {
            Ok(_) => {}
            Err(e) => errors.push(e),
        }
    }
    for (name, value) in resolved {
        if program.labels.contains_key(&name) {
            let line = program.equiv_lines.get(&name).copied().unwrap_or_default();
            errors.push(AsmError::label(
                line,
                format!("{name} defined as both a label and an alias"),
            ));
            continue;
        }
        program.labels.insert(name, value);
    }
    errors
}

fn chase(
    name: &str,
    program: &Program,
    resolved: &mut HashMap<String, u32>,
    visiting: &mut HashSet<String>,
) -> Result<u32, AsmError> {
    if let Some(&v) = resolved.get(name) {
        return Ok(v);
    }
    let line = program.equiv_lines.get(name).copied().unwrap_or_default();
    if !visiting.insert(name.to_string()) {
        return Err(AsmError::label(
            line,
            format!("circularity in definition of {name}"),
        ));
    }
    let rhs = &program.equivs[name];
    let value = if let Some(v) = user_string_to_int(rhs) {
        v as u32
    } else if let Some(&v) = program.labels.get(rhs) {
        v
    } else if program.equivs.contains_key(rhs) {
        chase(rhs, program, resolved, visiting)?
    } else {
        return Err(AsmError::label(
            line,
            format!("undefined symbol {rhs} in definition of {name}"),
        ));
    };
    resolved.insert(name.to_string(), value);
    Ok(value)
}

/// Shared context for the operand parsers: the unit under construction,
/// the address of the instruction being parsed, and its source line.
pub struct ParseCtx<'a> {
    pub program: &'a mut Program,
    pub offset: u32,
    pub line: usize,
}

impl ParseCtx<'_> {
    fn reg(&self, tok: &str) -> Result<u32, AsmError> {
        parse_register(tok)
            .ok_or_else(|| AsmError::parse(self.line, format!("invalid register: {tok}")))
    }

    /// Resolve an immediate operand: numeral, or `sym±offset` against the
    /// unit's labels. An unresolved symbol becomes a relocation request
    /// when the family supports one.
    fn immediate(
        &mut self,
        tok: &str,
        min: i64,
        max: i64,
        reloc: Option<Relocator>,
    ) -> Result<i32, AsmError> {
        let value = match user_string_to_int(tok) {
            Some(v) => v as i64,
            None => {
                let (symbol, offset_expr) = split_symbol_offset(tok);
                match self.program.labels.get(symbol) {
                    Some(&base) => {
                        let off = resolve_offset(offset_expr, &self.program.labels).ok_or_else(
                            || AsmError::parse(self.line, format!("invalid offset: {tok}")),
                        )?;
                        base as i64 + off as i64
                    }
                    None => match reloc {
                        Some(relocator) => {
                            self.program.add_relocation(
                                relocator,
                                self.offset,
                                symbol,
                                offset_expr,
                                self.line,
                            );
                            return Ok(0);
                        }
                        None => {
                            return Err(AsmError::label(
                                self.line,
                                format!("undefined symbol {symbol}"),
                            ))
                        }
                    },
                }
            }
        };
        if value < min || value > max {
            return Err(AsmError::range(
                self.line,
                format!("immediate {value} out of range [{min}, {max}]"),
            ));
        }
        Ok(value as i32)
    }

    /// Resolve a branch/jump target to a PC-relative byte offset, or emit
    /// `relocator` for symbols this unit does not define.
    fn pc_relative(
        &mut self,
        tok: &str,
        min: i64,
        max: i64,
        relocator: Relocator,
    ) -> Result<i32, AsmError> {
        let offset = match user_string_to_int(tok) {
            Some(v) => v as i64,
            None => {
                let (symbol, offset_expr) = split_symbol_offset(tok);
                match self.program.labels.get(symbol) {
                    Some(&base) => {
                        let off = resolve_offset(offset_expr, &self.program.labels).ok_or_else(
                            || AsmError::parse(self.line, format!("invalid offset: {tok}")),
                        )?;
                        base as i64 + off as i64 - self.offset as i64
                    }
                    None => {
                        self.program.add_relocation(
                            relocator,
                            self.offset,
                            symbol,
                            offset_expr,
                            self.line,
                        );
                        return Ok(0);
                    }
                }
            }
        };
        if offset < min || offset > max {
            return Err(AsmError::range(
                self.line,
                format!("target offset {offset} out of range [{min}, {max}]"),
            ));
        }
        if offset % 2 != 0 {
            return Err(AsmError::range(
                self.line,
                format!("target offset {offset} must be even"),
            ));
        }
        Ok(offset as i32)
    }
}

fn expect(args: &[String], n: usize, usage: &str, line: usize) -> Result<(), AsmError> {
    if args.len() != n {
        return Err(AsmError::parse(line, format!("expected '{usage}'")));
    }
    Ok(())
}

pub fn parse_operands(
    family: Family,
    code: &mut MachineCode,
    args: &[String],
    ctx: &mut ParseCtx<'_>,
) -> Result<(), AsmError> {
    match family {
        Family::Register => {
            expect(args, 3, "rd, rs1, rs2", ctx.line)?;
            code.set(field::RD, ctx.reg(&args[0])?);
            code.set(field::RS1, ctx.reg(&args[1])?);
            code.set(field::RS2, ctx.reg(&args[2])?);
        }
        Family::ArithImm => {
            expect(args, 3, "rd, rs1, imm", ctx.line)?;
            code.set(field::RD, ctx.reg(&args[0])?);
            code.set(field::RS1, ctx.reg(&args[1])?);
            let imm = ctx.immediate(&args[2], -2048, 2047, Some(Relocator::ImmAbs))?;
            code.set(field::IMM_11_0, imm as u32);
        }
        Family::Shift => {
            expect(args, 3, "rd, rs1, shamt", ctx.line)?;
            code.set(field::RD, ctx.reg(&args[0])?);
            code.set(field::RS1, ctx.reg(&args[1])?);
            let shamt = ctx.immediate(&args[2], 0, 31, None)?;
            code.set(field::SHAMT, shamt as u32);
        }
        Family::Load => {
            expect(args, 3, "rd, imm(rs1)", ctx.line)?;
            code.set(field::RD, ctx.reg(&args[0])?);
            let imm = ctx.immediate(&args[1], -2048, 2047, Some(Relocator::ImmAbs))?;
            code.set(field::IMM_11_0, imm as u32);
            code.set(field::RS1, ctx.reg(&args[2])?);
        }
        Family::Store => {
            expect(args, 3, "rs2, imm(rs1)", ctx.line)?;
            // both operand orders are accepted: `sw rs2, imm(rs1)` and
            // `sw imm(rs1), rs2`
            let (rs2, imm_tok, rs1) = if parse_register(&args[0]).is_some() {
                (&args[0], &args[1], &args[2])
            } else {
                (&args[2], &args[0], &args[1])
            };
            code.set(field::RS2, ctx.reg(rs2)?);
            code.set(field::RS1, ctx.reg(rs1)?);
            let imm = ctx.immediate(imm_tok, -2048, 2047, Some(Relocator::ImmAbsStore))?;
            set_store_imm(code, imm);
        }
        Family::Branch => {
            expect(args, 3, "rs1, rs2, label", ctx.line)?;
            code.set(field::RS1, ctx.reg(&args[0])?);
            code.set(field::RS2, ctx.reg(&args[1])?);
            let offset = ctx.pc_relative(&args[2], -4096, 4095, Relocator::Branch)?;
            set_branch_imm(code, offset);
        }
        Family::Upper => {
            expect(args, 2, "rd, imm", ctx.line)?;
            code.set(field::RD, ctx.reg(&args[0])?);
            let imm = ctx.immediate(&args[1], -(1 << 19), (1 << 20) - 1, None)?;
            code.set(field::IMM_31_12, imm as u32 & 0xFFFFF);
        }
        Family::Jump => {
            expect(args, 2, "rd, label", ctx.line)?;
            code.set(field::RD, ctx.reg(&args[0])?);
            let offset = ctx.pc_relative(&args[1], -(1 << 20), (1 << 20) - 1, Relocator::Jal)?;
            set_jump_imm(code, offset);
        }
        Family::System => {
            expect(args, 0, "no operands", ctx.line)?;
        }
    }
    Ok(())
}
