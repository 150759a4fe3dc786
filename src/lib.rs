//! kestrel — an educational RV32IM toolchain and simulator.
//!
//! Assembly text goes through a two-pass assembler into an unlinked
//! [`Program`], one or more of which link into a [`LinkedProgram`] the
//! [`Simulator`] interprets cycle by cycle, with breakpoints and undo.
//!
//! ```
//! use kestrel::{assemble, link_one, sim::BufferConsole, Simulator};
//!
//! let unit = assemble("li a0, 7\nli a7, 1\necall\nli a7, 10\necall")
//!     .into_result()
//!     .unwrap();
//! let linked = link_one(unit).unwrap();
//! let mut sim = Simulator::with_console(linked, BufferConsole::default());
//! sim.run().unwrap();
//! assert_eq!(sim.exit_code(), Some(0));
//! ```

pub mod arch;
pub mod asm;
pub mod errors;
pub mod isa;
pub mod linker;
pub mod relocate;
pub mod sim;

pub use asm::{assemble, Assembled, Program};
pub use errors::{AsmError, AsmWarning, LinkError, SimError};
pub use isa::disasm::disasm;
pub use isa::MachineCode;
pub use linker::{link, link_one, LinkedProgram};
pub use relocate::Relocator;
pub use sim::{RunResult, Simulator};
