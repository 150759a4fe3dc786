//! The environment-call layer.
//!
//! ECALL dispatches on `a7`; results land in `a0`. All user-visible I/O
//! goes through the [`Console`] seam so hosts decide where output lands
//! and where input lines come from.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use crate::errors::SimError;
use crate::sim::state::SimulatorState;

pub const PRINT_INT: u32 = 1;
pub const PRINT_STRING: u32 = 4;
pub const READ_STRING: u32 = 8;
pub const SBRK: u32 = 9;
pub const EXIT: u32 = 10;
pub const PRINT_CHAR: u32 = 11;
pub const EXIT2: u32 = 17;
pub const FILL_LINE_BUFFER: u32 = 18;

const A0: u32 = 10;
const A1: u32 = 11;
const A2: u32 = 12;
const A7: u32 = 17;

/// Where simulated output goes and where input lines come from.
///
/// `read_line` may block; it returns `None` on end of input. The returned
/// line carries no terminator.
pub trait Console {
    fn put_str(&mut self, s: &str);
    fn read_line(&mut self) -> Option<String>;
}

/// Locked stdout / stdin lines.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn put_str(&mut self, s: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(s.as_bytes());
        let _ = out.flush();
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                Some(line)
            }
        }
    }
}

/// In-memory console for tests and embedding hosts.
#[derive(Debug, Default)]
pub struct BufferConsole {
    pub input: VecDeque<String>,
    pub output: String,
}

impl BufferConsole {
    pub fn with_input(lines: &[&str]) -> Self {
        BufferConsole {
            input: lines.iter().map(|l| l.to_string()).collect(),
            output: String::new(),
        }
    }
}

impl Console for BufferConsole {
    fn put_str(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn read_line(&mut self) -> Option<String> {
        self.input.pop_front()
    }
}

/// What the simulator should do after an ECALL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcallEffect {
    Continue,
    Exit(i32),
}

pub fn dispatch(
    state: &mut SimulatorState,
    console: &mut dyn Console,
    line_buffer: &mut Vec<u8>,
) -> Result<EcallEffect, SimError> {
    let number = state.reg(A7);
    match number {
        PRINT_INT => {
            console.put_str(&(state.reg(A0) as i32).to_string());
        }
        PRINT_STRING => {
            let mut addr = state.reg(A0);
            let mut bytes = Vec::new();
            loop {
                let b = state.load8(addr)?;
                if b == 0 {
                    break;
                }
                bytes.push(b);
                addr = addr.wrapping_add(1);
            }
            console.put_str(&String::from_utf8_lossy(&bytes));
        }
        READ_STRING => {
            let addr = state.reg(A1);
            let max = state.reg(A2) as usize;
            let count = max.min(line_buffer.len());
            for (i, b) in line_buffer.drain(..count).enumerate() {
                state.store8(addr.wrapping_add(i as u32), b)?;
            }
            state.set_reg(A0, count as u32);
        }
        SBRK => {
            let previous = state.brk();
            state.set_brk(previous.wrapping_add(state.reg(A0)));
            state.set_reg(A0, previous);
        }
        EXIT => return Ok(EcallEffect::Exit(0)),
        PRINT_CHAR => {
            console.put_str(&((state.reg(A0) as u8) as char).to_string());
        }
        EXIT2 => return Ok(EcallEffect::Exit(state.reg(A0) as i32)),
        FILL_LINE_BUFFER => match console.read_line() {
            Some(line) => {
                *line_buffer = line.into_bytes();
                state.set_reg(A0, line_buffer.len() as u32);
            }
            None => state.set_reg(A0, -1i32 as u32),
        },
        _ => {
            return Err(SimError::UnknownEcall {
                pc: state.pc().wrapping_sub(4),
                number,
            })
        }
    }
    Ok(EcallEffect::Continue)
}
