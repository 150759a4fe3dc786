//! Single-core simulator: fetch, decode, execute, with reversible
//! stepping and breakpoints.

pub mod ecall;
pub mod memory;
pub mod state;

use std::collections::HashSet;

use crate::arch::{DEFAULT_FUEL, TEXT_BEGIN};
use crate::errors::SimError;
use crate::isa::table::{decode, Outcome};
use crate::isa::MachineCode;
use crate::linker::LinkedProgram;

pub use ecall::{BufferConsole, Console, StdConsole};
pub use state::SimulatorState;

/// Why a `run` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    /// The program terminated (exit ecall, `ebreak`, or PC leaving the
    /// text segment) with this status.
    Exited(i32),
    /// The PC matched a breakpoint at the start of a step; the
    /// instruction there has not executed.
    Breakpoint,
    /// The step limit ran out before the program stopped.
    OutOfFuel,
}

pub struct Simulator<C: Console = StdConsole> {
    pub state: SimulatorState,
    program: LinkedProgram,
    console: C,
    breakpoints: HashSet<u32>,
    line_buffer: Vec<u8>,
    exit_code: Option<i32>,
}

impl Simulator<StdConsole> {
    pub fn new(program: LinkedProgram) -> Self {
        Simulator::with_console(program, StdConsole)
    }
}

impl<C: Console> Simulator<C> {
    pub fn with_console(program: LinkedProgram, console: C) -> Self {
        let mut state = SimulatorState::new();
        state.load_program(&program);
        Simulator {
            state,
            program,
            console,
            breakpoints: HashSet::new(),
            line_buffer: Vec::new(),
            exit_code: None,
        }
    }

    pub fn program(&self) -> &LinkedProgram {
        &self.program
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    /// Exit status once the program has terminated.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Execute one instruction. `Ok(true)` while execution can continue,
    /// `Ok(false)` once the program has terminated.
    pub fn step(&mut self) -> Result<bool, SimError> {
        if self.exit_code.is_some() {
            return Ok(false);
        }
        let pc = self.state.pc();
        if pc.wrapping_sub(TEXT_BEGIN) >= self.program.text_size() {
            // running off the text segment ends the program
            self.exit_code = Some(0);
            return Ok(false);
        }
        self.state.begin_step();
        let word = self.state.load32(pc)?;
        let code = MachineCode::new(word);
        let def = decode(code).ok_or(SimError::InvalidInstruction { pc, word })?;
        match (def.exec)(code, &mut self.state)? {
            Outcome::Continue => Ok(true),
            Outcome::Halt => {
                self.exit_code = Some(0);
                Ok(false)
            }
            Outcome::Ecall => {
                match ecall::dispatch(&mut self.state, &mut self.console, &mut self.line_buffer)? {
                    ecall::EcallEffect::Continue => Ok(true),
                    ecall::EcallEffect::Exit(status) => {
                        self.exit_code = Some(status);
                        Ok(false)
                    }
                }
            }
        }
    }

    /// Step until termination, a breakpoint, or the default fuel runs
    /// out.
    pub fn run(&mut self) -> Result<RunResult, SimError> {
        self.run_limited(DEFAULT_FUEL)
    }

    pub fn run_limited(&mut self, max_steps: u64) -> Result<RunResult, SimError> {
        for _ in 0..max_steps {
            if self.breakpoints.contains(&self.state.pc()) {
                return Ok(RunResult::Breakpoint);
            }
            if !self.step()? {
                return Ok(RunResult::Exited(self.exit_code.unwrap_or(0)));
            }
        }
        Ok(RunResult::OutOfFuel)
    }

    /// Rewind one step. Termination is also undone. `false` when the
    /// journal is exhausted.
    pub fn undo(&mut self) -> bool {
        if self.state.undo() {
            self.exit_code = None;
            true
        } else {
            false
        }
    }

    pub fn add_breakpoint(&mut self, addr: u32) -> bool {
        self.breakpoints.insert(addr)
    }

    pub fn remove_breakpoint(&mut self, addr: u32) -> bool {
        self.breakpoints.remove(&addr)
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = u32> + '_ {
        self.breakpoints.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{HEAP_BEGIN, STATIC_BEGIN};
    use crate::asm::assemble;
    use crate::linker::link_one;

    fn simulate(source: &str) -> Simulator<BufferConsole> {
        simulate_io(source, &[])
    }

    fn simulate_io(source: &str, input: &[&str]) -> Simulator<BufferConsole> {
        let program = assemble(source).into_result().expect("assembles");
        let linked = link_one(program).expect("links");
        Simulator::with_console(linked, BufferConsole::with_input(input))
    }

    #[test]
    fn arithmetic_and_logic() {
        let mut sim = simulate("addi x1 x0 5\naddi x2 x1 5\nadd x3 x1 x2\nandi x3 x3 8");
        for _ in 0..4 {
            assert!(sim.step().unwrap());
        }
        assert_eq!(sim.state.reg(1), 5);
        assert_eq!(sim.state.reg(2), 10);
        assert_eq!(sim.state.reg(3), 8);
    }

    #[test]
    fn load_store_round_trip() {
        let mut sim = simulate("addi x1 x0 100\nsw 60(x0) x1\nlw x2 -40(x1)");
        for _ in 0..3 {
            assert!(sim.step().unwrap());
        }
        assert_eq!(sim.state.reg(1), 100);
        assert_eq!(sim.state.load32(60).unwrap(), 100);
        assert_eq!(sim.state.reg(2), 100);
    }

    #[test]
    fn narrow_loads_extend_by_width() {
        let mut sim = simulate(concat!(
            "li t0, -1\n",
            "sb t0, 64(x0)\n",
            "lb t1, 64(x0)\n",
            "lbu t2, 64(x0)\n",
            "li t3, -2\n",
            "sh t3, 66(x0)\n",
            "lh t4, 66(x0)\n",
            "lhu t5, 66(x0)\n",
        ));
        sim.run().unwrap();
        assert_eq!(sim.state.reg(6) as i32, -1); // lb sign-extends
        assert_eq!(sim.state.reg(7), 0xFF); // lbu zero-extends
        assert_eq!(sim.state.reg(29) as i32, -2); // lh sign-extends
        assert_eq!(sim.state.reg(30), 0xFFFE); // lhu zero-extends
        // sb truncated: only one byte landed
        assert_eq!(sim.state.load8(65).unwrap(), 0);
    }

    #[test]
    fn branch_loop_accumulates() {
        let mut sim = simulate(
            "add x2 x2 x3\naddi x1 x0 5\nstart: add x2 x2 x3\naddi x3 x3 1\nbne x3 x1 start",
        );
        assert_eq!(sim.run().unwrap(), RunResult::Exited(0));
        assert_eq!(sim.state.reg(2), 10);
        assert_eq!(sim.state.pc(), 20, "one past the bne");
    }

    #[test]
    fn equiv_chain_reaches_the_register() {
        let mut sim = simulate(".equiv A, 3\n.equiv B, A\n.equiv C, B\nli x1, C");
        sim.run().unwrap();
        assert_eq!(sim.state.reg(1), 3);
    }

    #[test]
    fn pcrel_pair_finds_data() {
        let mut sim = simulate(".data\nv: .word 42\n.text\nla x5, v\nlw x6, 0(x5)");
        sim.run().unwrap();
        assert_eq!(sim.state.reg(5), STATIC_BEGIN);
        assert_eq!(sim.state.reg(6), 42);
    }

    #[test]
    fn unsigned_compare_is_not_fooled_by_sign() {
        // x1 = 0xFFFFFFFF is a huge unsigned value, so bltu must fall
        // through
        let mut sim =
            simulate("addi x1 x0 -1\naddi x2 x0 1\nbltu x1 x2 done\naddi x3 x0 7\ndone:");
        sim.run().unwrap();
        assert_eq!(sim.state.reg(3), 7);
    }

    #[test]
    fn signed_compare_still_works() {
        let mut sim = simulate("addi x1 x0 -1\naddi x2 x0 1\nblt x1 x2 done\naddi x3 x0 7\ndone:");
        sim.run().unwrap();
        assert_eq!(sim.state.reg(3), 0);
    }

    #[test]
    fn division_edge_cases() {
        let mut sim = simulate(concat!(
            "li t0, 10\n",
            "li t1, 0\n",
            "div t2, t0, t1\n",
            "rem t3, t0, t1\n",
            "li t4, -0x80000000\n",
            "li t5, -1\n",
            "div s0, t4, t5\n",
            "rem s1, t4, t5\n",
            "divu s2, t0, t1\n",
            "remu s3, t0, t1\n",
        ));
        sim.run().unwrap();
        assert_eq!(sim.state.reg(7) as i32, -1); // t2: div by zero
        assert_eq!(sim.state.reg(28), 10); // t3: rem by zero keeps dividend
        assert_eq!(sim.state.reg(8) as i32, i32::MIN); // s0: overflow quotient
        assert_eq!(sim.state.reg(9), 0); // s1: overflow remainder
        assert_eq!(sim.state.reg(18), u32::MAX); // s2: divu by zero
        assert_eq!(sim.state.reg(19), 10); // s3: remu by zero
    }

    #[test]
    fn wide_multiplies_use_64_bit_intermediates() {
        let mut sim = simulate(concat!(
            "li a0, -1\n",
            "mulhu a1, a0, a0\n",
            "mulh a2, a0, a0\n",
            "li a3, -2\n",
            "mulhsu a4, a3, a0\n",
        ));
        sim.run().unwrap();
        assert_eq!(sim.state.reg(11), 0xFFFF_FFFE); // mulhu(-1, -1)
        assert_eq!(sim.state.reg(12), 0); // mulh(-1, -1) = high of 1
        assert_eq!(sim.state.reg(14), 0xFFFF_FFFE); // mulhsu(-2, 0xFFFFFFFF)
    }

    #[test]
    fn print_ecalls_reach_the_console() {
        let mut sim = simulate(concat!(
            ".data\nmsg: .asciiz \"hi\"\n",
            ".text\n",
            "li a0, -42\nli a7, 1\necall\n",
            "li a0, 33\nli a7, 11\necall\n",
            "la a0, msg\nli a7, 4\necall\n",
            "li a0, 3\nli a7, 17\necall\n",
        ));
        assert_eq!(sim.run().unwrap(), RunResult::Exited(3));
        assert_eq!(sim.exit_code(), Some(3));
        assert_eq!(sim.console().output, "-42!hi");
    }

    #[test]
    fn exit_ecall_reports_status_zero() {
        let mut sim = simulate("li a7, 10\necall\nli x1, 9");
        assert_eq!(sim.run().unwrap(), RunResult::Exited(0));
        // the instruction after the exit never ran
        assert_eq!(sim.state.reg(1), 0);
    }

    #[test]
    fn line_buffer_feeds_read_string() {
        let mut sim = simulate_io(
            concat!(
                ".data\nbuf: .space 8\n",
                ".text\n",
                "li a7, 18\necall\nmv s0, a0\n",
                "la a1, buf\nli a2, 3\nli a7, 8\necall\nmv s1, a0\n",
                "li a7, 18\necall\n",
            ),
            &["hello"],
        );
        sim.run().unwrap();
        assert_eq!(sim.state.reg(8), 5, "fill returned the line length");
        assert_eq!(sim.state.reg(9), 3, "read_string honored the cap");
        assert_eq!(sim.state.load8(STATIC_BEGIN).unwrap(), b'h');
        assert_eq!(sim.state.load8(STATIC_BEGIN + 2).unwrap(), b'l');
        // second fill hit end of input
        assert_eq!(sim.state.reg(10) as i32, -1);
    }

    #[test]
    fn sbrk_advances_the_break() {
        let mut sim = simulate("li a0, 16\nli a7, 9\necall\nmv s0, a0\nli a0, 4\necall");
        sim.run().unwrap();
        assert_eq!(sim.state.reg(8), HEAP_BEGIN);
        assert_eq!(sim.state.reg(10), HEAP_BEGIN + 16);
        assert_eq!(sim.state.brk(), HEAP_BEGIN + 20);
    }

    #[test]
    fn unknown_ecall_is_a_runtime_error() {
        let mut sim = simulate("li a7, 999\necall");
        let err = sim.run().unwrap_err();
        assert_eq!(err, SimError::UnknownEcall { pc: 4, number: 999 });
    }

    #[test]
    fn breakpoint_halts_before_executing() {
        let mut sim = simulate("addi x1 x0 1\naddi x2 x0 2\naddi x3 x0 3");
        assert!(sim.add_breakpoint(4));
        assert_eq!(sim.run().unwrap(), RunResult::Breakpoint);
        assert_eq!(sim.state.pc(), 4);
        assert_eq!(sim.state.reg(1), 1);
        assert_eq!(sim.state.reg(2), 0, "breakpoint instruction did not run");
        // stepping moves past the breakpoint, then run finishes
        assert!(sim.step().unwrap());
        assert_eq!(sim.run().unwrap(), RunResult::Exited(0));
        assert_eq!(sim.state.reg(3), 3);
        assert!(sim.remove_breakpoint(4));
        assert!(!sim.remove_breakpoint(4));
    }

    #[test]
    fn undo_rewinds_deterministically() {
        let mut sim = simulate("addi x1 x0 1\nsw 8(x0) x1\naddi x1 x1 1");
        sim.step().unwrap();
        sim.step().unwrap();
        sim.step().unwrap();
        assert_eq!(sim.state.reg(1), 2);

        assert!(sim.undo());
        assert_eq!(sim.state.reg(1), 1);
        assert_eq!(sim.state.pc(), 8);
        assert!(sim.undo());
        assert_eq!(sim.state.load32(8).unwrap(), 0, "store was rewound");
        assert!(sim.undo());
        assert_eq!(sim.state.reg(1), 0);
        assert_eq!(sim.state.pc(), 0);
        assert!(!sim.undo());

        // replay is identical
        sim.step().unwrap();
        sim.step().unwrap();
        sim.step().unwrap();
        assert_eq!(sim.state.reg(1), 2);
        assert_eq!(sim.state.load32(8).unwrap(), 1);
    }

    #[test]
    fn undo_revives_a_terminated_program() {
        let mut sim = simulate("li a0, 7\nli a7, 17\necall");
        assert_eq!(sim.run().unwrap(), RunResult::Exited(7));
        assert!(sim.undo());
        assert_eq!(sim.exit_code(), None);
        assert!(!sim.step().unwrap(), "re-executing the ecall exits again");
        assert_eq!(sim.exit_code(), Some(7));
    }

    #[test]
    fn access_error_carries_step_context() {
        let mut sim = simulate("li t0, -1\nlw t1, 0(t0)");
        let err = sim.run().unwrap_err();
        assert_eq!(
            err,
            SimError::Access {
                pc: 4,
                addr: 0xFFFF_FFFF,
                size: 4
            }
        );
        // the failing step is still on the journal, so the state can be
        // rewound past it
        assert!(sim.undo());
        assert_eq!(sim.state.pc(), 4);
    }

    #[test]
    fn runaway_loops_exhaust_fuel() {
        let mut sim = simulate("loop: j loop");
        assert_eq!(sim.run_limited(10).unwrap(), RunResult::OutOfFuel);
        assert_eq!(sim.state.pc(), 0);
    }

    #[test]
    fn ebreak_halts_cleanly() {
        let mut sim = simulate("addi x1 x0 1\nebreak\naddi x2 x0 2");
        assert_eq!(sim.run().unwrap(), RunResult::Exited(0));
        assert_eq!(sim.state.reg(1), 1);
        assert_eq!(sim.state.reg(2), 0);
    }

    #[test]
    fn undecodable_word_faults() {
        let mut linked = LinkedProgram::default();
        linked.insts.push(MachineCode::new(0));
        let mut sim = Simulator::with_console(linked, BufferConsole::default());
        assert_eq!(
            sim.step().unwrap_err(),
            SimError::InvalidInstruction { pc: 0, word: 0 }
        );
    }

    #[test]
    fn x0_stays_zero_through_execution() {
        let mut sim = simulate("addi x0 x0 5\nadd x1 x0 x0\nlui x0 4");
        assert_eq!(sim.state.reg(0), 0);
        while sim.step().unwrap() {
            assert_eq!(sim.state.reg(0), 0);
        }
        assert_eq!(sim.state.reg(0), 0);
        assert_eq!(sim.state.reg(1), 0);
    }

    #[test]
    fn jal_and_jalr_link_and_return() {
        let mut sim = simulate(concat!(
            "main: call helper\n",
            "addi x5 x5 100\n",
            "j end\n",
            "helper: addi x5 x0 1\n",
            "ret\n",
            "end:\n",
        ));
        sim.run().unwrap();
        assert_eq!(sim.state.reg(5), 101);
    }
}
