//! Instruction formats as ordered lists of field constraints.

use super::{BitField, MachineCode};

/// A single `field == value` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldEqual {
    pub field: BitField,
    pub value: u32,
}

impl FieldEqual {
    pub const fn new(field: BitField, value: u32) -> Self {
        FieldEqual { field, value }
    }
}

/// The fixed bits of one instruction encoding.
///
/// `fill` produces the canonical empty word for the format; a word
/// `matches` iff every constraint holds, which is what decoding searches
/// for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionFormat {
    pub fields: &'static [FieldEqual],
}

impl InstructionFormat {
    pub const fn new(fields: &'static [FieldEqual]) -> Self {
        InstructionFormat { fields }
    }

    pub fn fill(&self) -> MachineCode {
        let mut code = MachineCode::default();
        for fe in self.fields {
            code.set(fe.field, fe.value);
        }
        code
    }

    pub fn matches(&self, code: MachineCode) -> bool {
        self.fields.iter().all(|fe| code.get(fe.field) == fe.value)
    }
}
