//! Register file, PC, memory and the undo journal.

use std::collections::VecDeque;

use crate::arch::{CONST_BEGIN, HEAP_BEGIN, STACK_END, STATIC_BEGIN, TEXT_BEGIN, UNDO_LIMIT};
use crate::errors::SimError;
use crate::isa::regs::abi_name;
use crate::linker::LinkedProgram;
use crate::sim::memory::{Memory, OutOfRange};

/// Everything one step may overwrite: the prior PC, prior register
/// values, prior memory bytes and the prior heap break.
#[derive(Debug, Clone, Default)]
struct StepDiff {
    pc: u32,
    regs: Vec<(u32, u32)>,
    mem: Vec<(u32, u8)>,
    brk: Option<u32>,
}

#[derive(Debug)]
pub struct SimulatorState {
    regs: [u32; 32],
    pc: u32,
    mem: Memory,
    brk: u32,
    /// Bounded ring of step diffs; oldest entries are discarded first.
    journal: VecDeque<StepDiff>,
    /// PC of the instruction currently executing, for fault context.
    fault_pc: u32,
}

impl SimulatorState {
    pub fn new() -> Self {
        let mut regs = [0u32; 32];
        regs[2] = STACK_END; // sp
        SimulatorState {
            regs,
            pc: TEXT_BEGIN,
            mem: Memory::new(),
            brk: HEAP_BEGIN,
            journal: VecDeque::new(),
            fault_pc: TEXT_BEGIN,
        }
    }

    /// Install a linked image: text, rodata and data at their segment
    /// bases, PC at the program's entry point.
    pub fn load_program(&mut self, program: &LinkedProgram) {
        let mut text = Vec::with_capacity(program.insts.len() * 4);
        for inst in &program.insts {
            text.extend_from_slice(&inst.word().to_le_bytes());
        }
        // the image always fits: the linker bounds each segment
        self.mem.write_block(TEXT_BEGIN, &text).unwrap();
        self.mem.write_block(CONST_BEGIN, &program.rodata).unwrap();
        self.mem.write_block(STATIC_BEGIN, &program.data).unwrap();
        self.pc = program.start_pc;
    }

    /// Reads of x0 always return zero.
    pub fn reg(&self, index: u32) -> u32 {
        if index == 0 {
            0
        } else {
            self.regs[(index & 0x1F) as usize]
        }
    }

    /// Writes to x0 are silently dropped; all other writes are journaled.
    pub fn set_reg(&mut self, index: u32, value: u32) {
        if index == 0 {
            return;
        }
        let index = (index & 0x1F) as usize;
        if let Some(diff) = self.journal.back_mut() {
            diff.regs.push((index as u32, self.regs[index]));
        }
        self.regs[index] = value;
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    pub fn brk(&self) -> u32 {
        self.brk
    }

    pub fn set_brk(&mut self, brk: u32) {
        if let Some(diff) = self.journal.back_mut() {
            diff.brk.get_or_insert(self.brk);
        }
        self.brk = brk;
    }

    fn fault(&self, e: OutOfRange) -> SimError {
        SimError::Access {
            pc: self.fault_pc,
            addr: e.addr,
            size: e.size,
        }
    }

    pub fn load8(&self, addr: u32) -> Result<u8, SimError> {
        self.mem.load8(addr).map_err(|e| self.fault(e))
    }

    pub fn load16(&self, addr: u32) -> Result<u16, SimError> {
        self.mem.load16(addr).map_err(|e| self.fault(e))
    }

    pub fn load32(&self, addr: u32) -> Result<u32, SimError> {
        self.mem.load32(addr).map_err(|e| self.fault(e))
    }

    pub fn store8(&mut self, addr: u32, value: u8) -> Result<(), SimError> {
        let old = self.mem.load8(addr).map_err(|e| self.fault(e))?;
        if let Some(diff) = self.journal.back_mut() {
            diff.mem.push((addr, old));
        }
        self.mem.store8(addr, value).map_err(|e| self.fault(e))
    }

    pub fn store16(&mut self, addr: u32, value: u16) -> Result<(), SimError> {
        // bounds-check the whole access before journaling any byte
        self.mem.load16(addr).map_err(|e| self.fault(e))?;
        for (i, b) in value.to_le_bytes().iter().enumerate() {
            self.store8(addr + i as u32, *b)?;
        }
        Ok(())
    }

    pub fn store32(&mut self, addr: u32, value: u32) -> Result<(), SimError> {
        self.mem.load32(addr).map_err(|e| self.fault(e))?;
        for (i, b) in value.to_le_bytes().iter().enumerate() {
            self.store8(addr + i as u32, *b)?;
        }
        Ok(())
    }

    /// Open a fresh diff for the step about to execute. Writes between
    /// here and the next `begin_step` are captured for undo.
    pub fn begin_step(&mut self) {
        self.fault_pc = self.pc;
        if self.journal.len() >= UNDO_LIMIT {
            self.journal.pop_front();
        }
        self.journal.push_back(StepDiff {
            pc: self.pc,
            ..StepDiff::default()
        });
    }

    /// Rewind one step. `false` when the journal is exhausted.
    pub fn undo(&mut self) -> bool {
        let diff = match self.journal.pop_back() {
            Some(diff) => diff,
            None => return false,
        };
        for &(addr, byte) in diff.mem.iter().rev() {
            // restoring within the journaled range cannot fault
            self.mem.store8(addr, byte).unwrap();
        }
        for &(index, value) in diff.regs.iter().rev() {
            self.regs[index as usize] = value;
        }
        if let Some(brk) = diff.brk {
            self.brk = brk;
        }
        self.pc = diff.pc;
        true
    }

    pub fn history_len(&self) -> usize {
        self.journal.len()
    }

    /// PC plus all nonzero registers, ABI-named. Host diagnostics only.
    pub fn dump(&self) -> String {
        let mut out = format!("pc = {:#010x}\n", self.pc);
        for i in 0..32 {
            let v = self.reg(i);
            if v != 0 {
                out.push_str(&format!(
                    "{:>4} (x{i}) = {:#010x} ({})\n",
                    abi_name(i),
                    v,
                    v as i32
                ));
            }
        }
        out
    }
}

impl Default for SimulatorState {
    fn default() -> Self {
        SimulatorState::new()
    }
}
