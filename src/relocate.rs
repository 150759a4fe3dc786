//! Relocators: patches applied to already-encoded words once the linker
//! knows the target address.
//!
//! Each kind rewrites the immediate fields of one `MachineCode` in place
//! given the absolute PC of that instruction and the resolved target. The
//! 64-bit counterparts are reserved for RV64 and not implemented.

use crate::isa::{field, set_branch_imm, set_jump_imm, set_store_imm, MachineCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocator {
    /// Low 12 bits of the absolute target into IMM\[11:0\].
    ImmAbs,
    /// Absolute target split across the S-type immediate; must fit 12
    /// signed bits.
    ImmAbsStore,
    /// High 20 bits of `target - pc`, biased by +0x800 so the paired low
    /// half's sign extension cancels out.
    PcRelHi,
    /// Low 12 bits of the distance from the paired `auipc` four bytes
    /// earlier.
    PcRelLo,
    /// Same as `PcRelLo`, split across the S-type immediate.
    PcRelLoStore,
    /// J-type split offset.
    Jal,
    /// B-type split offset.
    Branch,
}

impl Relocator {
    pub fn apply(self, code: &mut MachineCode, pc: u32, target: u32) -> Result<(), String> {
        match self {
            Relocator::ImmAbs => {
                code.set(field::IMM_11_0, target & 0xFFF);
            }
            Relocator::ImmAbsStore => {
                let value = target as i32;
                if !(-2048..=2047).contains(&value) {
                    return Err(format!("absolute store target {value} does not fit 12 bits"));
                }
                set_store_imm(code, value);
            }
            Relocator::PcRelHi => {
                let hi = target.wrapping_sub(pc).wrapping_add(0x800) >> 12;
                code.set(field::IMM_31_12, hi & 0xFFFFF);
            }
            Relocator::PcRelLo => {
                let lo = target.wrapping_sub(pc.wrapping_sub(4));
                code.set(field::IMM_11_0, lo & 0xFFF);
            }
            Relocator::PcRelLoStore => {
                let lo = target.wrapping_sub(pc.wrapping_sub(4));
                set_store_imm(code, lo as i32);
            }
            Relocator::Jal => {
                let offset = target.wrapping_sub(pc) as i32;
                if !((-(1 << 20))..(1 << 20)).contains(&offset) {
                    return Err(format!("jump offset {offset} does not fit 21 bits"));
                }
                if offset % 2 != 0 {
                    return Err(format!("jump offset {offset} is odd"));
                }
                set_jump_imm(code, offset);
            }
            Relocator::Branch => {
                let offset = target.wrapping_sub(pc) as i32;
                if !(-4096..=4095).contains(&offset) {
                    return Err(format!("branch offset {offset} does not fit 13 bits"));
                }
                if offset % 2 != 0 {
                    return Err(format!("branch offset {offset} is odd"));
                }
                set_branch_imm(code, offset);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{branch_imm, jump_imm, store_imm, table::lookup};

    #[test]
    fn pcrel_pair_reconstructs_target() {
        // auipc at pc, addi at pc + 4; hi + lo must add back to target.
        for (pc, target) in [
            (0u32, 0x1000_0000u32),
            (0x40, 0x8),
            (0x2000, 0x1FFF),
            (0x1000, 0x0FFF_F800),
            (0x7FFC, 0x10),
        ] {
            let mut auipc = lookup("auipc").unwrap().format.fill();
            let mut addi = lookup("addi").unwrap().format.fill();
            Relocator::PcRelHi.apply(&mut auipc, pc, target).unwrap();
            Relocator::PcRelLo.apply(&mut addi, pc + 4, target).unwrap();

            let hi = auipc.get(field::IMM_31_12) << 12;
            let lo = addi.get_signed(field::IMM_11_0);
            let got = pc.wrapping_add(hi).wrapping_add(lo as u32);
            assert_eq!(got, target, "pc={pc:#x} target={target:#x}");
        }
    }

    #[test]
    fn imm_abs_store_range() {
        let mut sw = lookup("sw").unwrap().format.fill();
        assert!(Relocator::ImmAbsStore.apply(&mut sw, 0, 60).is_ok());
        assert_eq!(store_imm(sw), 60);
        assert!(Relocator::ImmAbsStore.apply(&mut sw, 0, 4096).is_err());
    }

    #[test]
    fn branch_and_jump_reject_out_of_range() {
        let mut beq = lookup("beq").unwrap().format.fill();
        assert!(Relocator::Branch.apply(&mut beq, 0x1000, 0x1000 + 4096).is_err());
        assert!(Relocator::Branch.apply(&mut beq, 0x1000, 0x1000 - 4096).is_ok());
        assert_eq!(branch_imm(beq), -4096);

        let mut jal = lookup("jal").unwrap().format.fill();
        assert!(Relocator::Jal.apply(&mut jal, 0, 1 << 20).is_err());
        assert!(Relocator::Jal.apply(&mut jal, 1 << 20, 0).is_ok());
        assert_eq!(jump_imm(jal), -(1 << 20));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn imm_abs_recovers_low_bits(target in any::<u32>()) {
                let mut code = lookup("addi").unwrap().format.fill();
                Relocator::ImmAbs.apply(&mut code, 0, target).unwrap();
                prop_assert_eq!(code.get(field::IMM_11_0), target & 0xFFF);
            }

            #[test]
            fn pcrel_pair_recovers_target(pc in 0u32..0x4000_0000, target in 0u32..0x4000_0000) {
                let pc = pc & !3;
                let mut auipc = lookup("auipc").unwrap().format.fill();
                let mut lo = lookup("lw").unwrap().format.fill();
                Relocator::PcRelHi.apply(&mut auipc, pc, target).unwrap();
                Relocator::PcRelLo.apply(&mut lo, pc + 4, target).unwrap();
                let hi = auipc.get(field::IMM_31_12) << 12;
                let sum = pc
                    .wrapping_add(hi)
                    .wrapping_add(lo.get_signed(field::IMM_11_0) as u32);
                prop_assert_eq!(sum, target);
            }

            #[test]
            fn pcrel_store_pair_recovers_target(pc in 0u32..0x4000_0000, target in 0u32..0x4000_0000) {
                let pc = pc & !3;
                let mut auipc = lookup("auipc").unwrap().format.fill();
                let mut sw = lookup("sw").unwrap().format.fill();
                Relocator::PcRelHi.apply(&mut auipc, pc, target).unwrap();
                Relocator::PcRelLoStore.apply(&mut sw, pc + 4, target).unwrap();
                let hi = auipc.get(field::IMM_31_12) << 12;
                let sum = pc.wrapping_add(hi).wrapping_add(store_imm(sw) as u32);
                prop_assert_eq!(sum, target);
            }

            #[test]
            fn branch_recovers_even_offsets(offset in (-2048i32..=2047).prop_map(|o| o * 2)) {
                let pc = 0x10_0000u32;
                let mut code = lookup("bne").unwrap().format.fill();
                Relocator::Branch
                    .apply(&mut code, pc, pc.wrapping_add(offset as u32))
                    .unwrap();
                prop_assert_eq!(branch_imm(code), offset);
            }

            #[test]
            fn jal_recovers_even_offsets(offset in ((-(1i32 << 19))..(1 << 19)).prop_map(|o| o * 2)) {
                let pc = 0x20_0000u32;
                let mut code = lookup("jal").unwrap().format.fill();
                Relocator::Jal
                    .apply(&mut code, pc, pc.wrapping_add(offset as u32))
                    .unwrap();
                prop_assert_eq!(jump_imm(code), offset);
            }
        }
    }
}
