//! Linker: concatenate unlinked programs, resolve globals, apply
//! relocations.

use std::collections::HashMap;

use crate::arch::{CONST_BEGIN, HEAP_BEGIN, STATIC_BEGIN, TEXT_BEGIN};
use crate::asm::parse::resolve_offset;
use crate::asm::program::Program;
use crate::errors::LinkError;
use crate::isa::MachineCode;
use crate::relocate::Relocator;

/// Combined debug info: the originating unit plus the unit's own record.
#[derive(Debug, Clone)]
pub struct LinkedDebugInfo {
    pub unit: String,
    pub line: usize,
    pub source: String,
}

/// The fully linked image, ready for the simulator.
#[derive(Debug, Clone, Default)]
pub struct LinkedProgram {
    pub insts: Vec<MachineCode>,
    pub rodata: Vec<u8>,
    pub data: Vec<u8>,
    /// All labels at absolute addresses; first definition wins across
    /// units.
    pub labels: HashMap<String, u32>,
    pub debug_info: Vec<LinkedDebugInfo>,
    /// Absolute address of the global `main`, or `TEXT_BEGIN` when no
    /// unit exports one.
    pub start_pc: u32,
}

impl LinkedProgram {
    pub fn text_size(&self) -> u32 {
        (self.insts.len() * 4) as u32
    }
}

/// Convenience for the single-unit case.
pub fn link_one(program: Program) -> Result<LinkedProgram, LinkError> {
    link(vec![("unit".to_string(), program)])
}

pub fn link(units: Vec<(String, Program)>) -> Result<LinkedProgram, LinkError> {
    let mut out = LinkedProgram {
        start_pc: TEXT_BEGIN,
        ..LinkedProgram::default()
    };
    let mut globals: HashMap<String, u32> = HashMap::new();
    let mut main_in_text = true;

    // patches that need another unit's symbol
    let mut deferred_text: Vec<(usize, u32, Relocator, String, i32)> = Vec::new();
    let mut deferred_bytes: Vec<(bool, usize, String, i32)> = Vec::new();

    for (unit_name, program) in &units {
        let text_base = out.text_size();
        let rodata_base = out.rodata.len() as u32;
        let data_base = out.data.len() as u32;

        // translate every label to an absolute address by segment range
        let translate = |offset: u32| -> u32 {
            if offset < CONST_BEGIN {
                offset + text_base
            } else if offset < STATIC_BEGIN {
                offset + rodata_base
            } else {
                offset + data_base
            }
        };
        for (name, &offset) in &program.labels {
            out.labels.entry(name.clone()).or_insert(translate(offset));
        }
        for name in &program.global_labels {
            let &offset = program
                .labels
                .get(name)
                .ok_or_else(|| LinkError::Undefined(name.clone()))?;
            if globals.insert(name.clone(), translate(offset)).is_some() {
                return Err(LinkError::DuplicateGlobal(name.clone()));
            }
            if name == "main" && offset >= CONST_BEGIN {
                main_in_text = false;
            }
        }

        out.insts.extend_from_slice(&program.insts);
        out.debug_info.extend(program.debug_info.iter().map(|d| {
            LinkedDebugInfo {
                unit: unit_name.clone(),
                line: d.line,
                source: d.source.clone(),
            }
        }));
        out.rodata.extend_from_slice(&program.rodata);
        out.data.extend_from_slice(&program.data);

        // text relocations: local targets now, cross-unit in pass two
        for entry in &program.relocation_table {
            let pc = entry.offset + text_base;
            let addend = resolve_offset(&entry.offset_expr, &program.labels).ok_or_else(|| {
                LinkError::Relocation {
                    addr: pc,
                    msg: format!("invalid offset expression {}", entry.offset_expr),
                }
            })?;
            if entry.label.is_empty() {
                apply_text(&mut out.insts, entry.relocator, pc, addend as u32)?;
            } else if let Some(&offset) = program.labels.get(&entry.label) {
                let target = translate(offset).wrapping_add(addend as u32);
                apply_text(&mut out.insts, entry.relocator, pc, target)?;
            } else {
                deferred_text.push((
                    ((pc - TEXT_BEGIN) / 4) as usize,
                    pc,
                    entry.relocator,
                    entry.label.clone(),
                    addend,
                ));
            }
        }

        // data relocations write the resolved address little-endian
        for (is_rodata, table) in [
            (true, &program.rodata_relocation_table),
            (false, &program.data_relocation_table),
        ] {
            for entry in table {
                let pos = entry.offset as usize
                    + if is_rodata {
                        rodata_base as usize
                    } else {
                        data_base as usize
                    };
                let addend =
                    resolve_offset(&entry.offset_expr, &program.labels).ok_or_else(|| {
                        LinkError::Relocation {
                            addr: pos as u32,
                            msg: format!("invalid offset expression {}", entry.offset_expr),
                        }
                    })?;
                if let Some(&offset) = program.labels.get(&entry.label) {
                    let target = translate(offset).wrapping_add(addend as u32);
                    let bytes = if is_rodata { &mut out.rodata } else { &mut out.data };
                    bytes[pos..pos + 4].copy_from_slice(&target.to_le_bytes());
                } else {
                    deferred_bytes.push((is_rodata, pos, entry.label.clone(), addend));
                }
            }
        }
    }

    if out.text_size() > CONST_BEGIN - TEXT_BEGIN {
        return Err(LinkError::SegmentOverflow("text"));
    }
    if out.rodata.len() as u32 > STATIC_BEGIN - CONST_BEGIN {
        return Err(LinkError::SegmentOverflow("rodata"));
    }
    if out.data.len() as u32 > HEAP_BEGIN - STATIC_BEGIN {
        return Err(LinkError::SegmentOverflow("data"));
    }

    // second pass: everything left resolves through the global table
    for (index, pc, relocator, label, addend) in deferred_text {
        let &target = globals
            .get(&label)
            .ok_or(LinkError::Undefined(label))?;
        let code = &mut out.insts[index];
        relocator
            .apply(code, pc, target.wrapping_add(addend as u32))
            .map_err(|msg| LinkError::Relocation { addr: pc, msg })?;
    }
    for (is_rodata, pos, label, addend) in deferred_bytes {
        let &target = globals
            .get(&label)
            .ok_or(LinkError::Undefined(label))?;
        let value = target.wrapping_add(addend as u32);
        let bytes = if is_rodata { &mut out.rodata } else { &mut out.data };
        bytes[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    if let Some(&main) = globals.get("main") {
        if !main_in_text {
            return Err(LinkError::MainOutsideText);
        }
        out.start_pc = main;
    }
    for (name, addr) in globals {
        out.labels.insert(name, addr);
    }
    Ok(out)
}

fn apply_text(
    insts: &mut [MachineCode],
    relocator: Relocator,
    pc: u32,
    target: u32,
) -> Result<(), LinkError> {
    let index = ((pc - TEXT_BEGIN) / 4) as usize;
    relocator
        .apply(&mut insts[index], pc, target)
        .map_err(|msg| LinkError::Relocation { addr: pc, msg })
}
