//! The assembler's output for one compilation unit.

use std::collections::{HashMap, HashSet};

use crate::arch::{CONST_BEGIN, STATIC_BEGIN, TEXT_BEGIN};
use crate::isa::MachineCode;
use crate::relocate::Relocator;

/// Which segment the assembler is currently emitting into. Label offsets
/// encode the segment through the address range they fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Text,
    Rodata,
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    /// 1-based source line.
    pub line: usize,
    pub source: String,
}

/// A pending patch of one text-segment instruction.
#[derive(Debug, Clone)]
pub struct RelocationEntry {
    pub relocator: Relocator,
    /// Unit-relative address of the instruction to patch.
    pub offset: u32,
    /// Referenced symbol; empty means the resolved offset expression alone
    /// is the target (pure `auipc, 0`).
    pub label: String,
    /// `±N` / `±absSym` tail, resolved against the unit's labels at link
    /// time.
    pub offset_expr: String,
    pub line: usize,
}

/// A `.word label` placeholder in rodata/data: four bytes to overwrite
/// little-endian with the resolved address.
#[derive(Debug, Clone)]
pub struct DataRelocationEntry {
    /// Byte offset within the owning segment's vector.
    pub offset: u32,
    pub label: String,
    pub offset_expr: String,
    pub line: usize,
}

/// One token line of true assembly language, queued for pass two.
#[derive(Debug, Clone)]
pub struct TalLine {
    pub tokens: Vec<String>,
    pub debug: DebugInfo,
}

/// An unlinked program: one assembled compilation unit with unresolved
/// relocation requests.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub insts: Vec<MachineCode>,
    /// Label name -> unit-relative address (segment encoded by range).
    pub labels: HashMap<String, u32>,
    /// `.equiv`/`.equ`/`.set` right-hand sides, resolved in pass two.
    pub equivs: HashMap<String, String>,
    /// Source line of each alias definition, for diagnostics.
    pub equiv_lines: HashMap<String, usize>,
    pub global_labels: HashSet<String>,
    pub rodata: Vec<u8>,
    pub data: Vec<u8>,
    pub relocation_table: Vec<RelocationEntry>,
    pub rodata_relocation_table: Vec<DataRelocationEntry>,
    pub data_relocation_table: Vec<DataRelocationEntry>,
    /// Parallel to `insts` after pass two.
    pub debug_info: Vec<DebugInfo>,
    /// Advanced by pass one as TAL lines are queued; equals
    /// `4 * insts.len()` once pass two has run.
    pub text_size: u32,
}

impl Program {
    pub fn rodata_size(&self) -> u32 {
        self.rodata.len() as u32
    }

    pub fn data_size(&self) -> u32 {
        self.data.len() as u32
    }

    /// Unit-relative address of the next emission in `segment`.
    pub fn segment_offset(&self, segment: Segment) -> u32 {
        match segment {
            Segment::Text => TEXT_BEGIN + self.text_size,
            Segment::Rodata => CONST_BEGIN + self.rodata_size(),
            Segment::Data => STATIC_BEGIN + self.data_size(),
        }
    }

    /// Record a label at `offset`. `false` if the name is already taken;
    /// the caller reports the duplicate (the map is probed explicitly,
    /// never trusted to signal through insert).
    pub fn add_label(&mut self, name: &str, offset: u32) -> bool {
        if self.labels.contains_key(name) {
            return false;
        }
        self.labels.insert(name.to_string(), offset);
        true
    }

    pub fn add_relocation(
        &mut self,
        relocator: Relocator,
        offset: u32,
        label: &str,
        offset_expr: &str,
        line: usize,
    ) {
        self.relocation_table.push(RelocationEntry {
            relocator,
            offset,
            label: label.to_string(),
            offset_expr: offset_expr.to_string(),
            line,
        });
    }
}
