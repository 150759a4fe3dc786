//! Pseudo-instruction expansion.
//!
//! The dispatcher maps a mnemonic to an expander; each expander turns one
//! source line into one or more TAL token lines, appending relocation
//! requests for symbolic operands as it goes. Mnemonics without an
//! expander fall through to pass two untouched.

use crate::asm::parse::{split_symbol_offset, user_string_to_int};
use crate::asm::program::{Program, Segment};
use crate::errors::AsmError;
use crate::relocate::Relocator;

type Tal = Vec<Vec<String>>;

fn line_of(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn expect_args(tokens: &[String], n: usize, usage: &str, line: usize) -> Result<(), AsmError> {
    if tokens.len() != n {
        return Err(AsmError::parse(line, format!("expected '{usage}'")));
    }
    Ok(())
}

/// Expand `tokens` (mnemonic first) if it names a pseudo-instruction.
///
/// `raw_line` is consulted only to tell the bracketed store form
/// `sw rs, sym(rt)` apart from the three-operand `sw rs, sym, rt`, which
/// lex to the same tokens.
pub fn expand(
    program: &mut Program,
    raw_line: &str,
    tokens: &[String],
    line: usize,
) -> Result<Option<Tal>, AsmError> {
    let mnemonic = tokens[0].to_lowercase();
    let args = &tokens[1..];
    let expanded = match mnemonic.as_str() {
        "nop" => {
            expect_args(args, 0, "nop", line)?;
            vec![line_of(&["addi", "x0", "x0", "0"])]
        }
        "li" => {
            expect_args(args, 2, "li rd, imm", line)?;
            expand_li(&args[0], &args[1])
        }
        "mv" => {
            expect_args(args, 2, "mv rd, rs", line)?;
            vec![line_of(&["addi", &args[0], &args[1], "0"])]
        }
        "not" => {
            expect_args(args, 2, "not rd, rs", line)?;
            vec![line_of(&["xori", &args[0], &args[1], "-1"])]
        }
        "neg" => {
            expect_args(args, 2, "neg rd, rs", line)?;
            vec![line_of(&["sub", &args[0], "x0", &args[1]])]
        }
        "seqz" => {
            expect_args(args, 2, "seqz rd, rs", line)?;
            vec![line_of(&["sltiu", &args[0], &args[1], "1"])]
        }
        "snez" => {
            expect_args(args, 2, "snez rd, rs", line)?;
            vec![line_of(&["sltu", &args[0], "x0", &args[1]])]
        }
        "sltz" => {
            expect_args(args, 2, "sltz rd, rs", line)?;
            vec![line_of(&["slt", &args[0], &args[1], "x0"])]
        }
        "sgtz" => {
            expect_args(args, 2, "sgtz rd, rs", line)?;
            vec![line_of(&["slt", &args[0], "x0", &args[1]])]
        }
        "beqz" | "bnez" | "blez" | "bgez" | "bltz" | "bgtz" => {
            expect_args(args, 2, &format!("{mnemonic} rs, label"), line)?;
            let (rs, target) = (&args[0], &args[1]);
            match mnemonic.as_str() {
                "beqz" => vec![line_of(&["beq", rs, "x0", target])],
                "bnez" => vec![line_of(&["bne", rs, "x0", target])],
                "blez" => vec![line_of(&["bge", "x0", rs, target])],
                "bgez" => vec![line_of(&["bge", rs, "x0", target])],
                "bltz" => vec![line_of(&["blt", rs, "x0", target])],
                _ => vec![line_of(&["blt", "x0", rs, target])],
            }
        }
        "ble" | "bgt" | "bleu" | "bgtu" => {
            expect_args(args, 3, &format!("{mnemonic} rs, rt, label"), line)?;
            let (a, b, target) = (&args[0], &args[1], &args[2]);
            let swapped = match mnemonic.as_str() {
                "ble" => "bge",
                "bgt" => "blt",
                "bleu" => "bgeu",
                _ => "bltu",
            };
            vec![line_of(&[swapped, b, a, target])]
        }
        "j" => {
            expect_args(args, 1, "j label", line)?;
            vec![line_of(&["jal", "x0", &args[0]])]
        }
        "jal" if args.len() == 1 => vec![line_of(&["jal", "x1", &args[0]])],
        "jr" => {
            expect_args(args, 1, "jr rs", line)?;
            vec![line_of(&["jalr", "x0", "0", &args[0]])]
        }
        "ret" => {
            expect_args(args, 0, "ret", line)?;
            vec![line_of(&["jalr", "x0", "0", "x1"])]
        }
        "call" => {
            expect_args(args, 1, "call label", line)?;
            pcrel_pair(
                program,
                line,
                &args[0],
                Relocator::PcRelLo,
                line_of(&["auipc", "x1", "0"]),
                line_of(&["jalr", "x1", "0", "x1"]),
            )
        }
        "la" => {
            expect_args(args, 2, "la rd, label", line)?;
            let rd = &args[0];
            pcrel_pair(
                program,
                line,
                &args[1],
                Relocator::PcRelLo,
                line_of(&["auipc", rd, "0"]),
                line_of(&["addi", rd, rd, "0"]),
            )
        }
        "lb" | "lh" | "lw" | "lbu" | "lhu" if args.len() == 2 => {
            let rd = &args[0];
            if user_string_to_int(&args[1]).is_some() {
                vec![line_of(&[&mnemonic, rd, &args[1], "x0"])]
            } else {
                pcrel_pair(
                    program,
                    line,
                    &args[1],
                    Relocator::PcRelLo,
                    line_of(&["auipc", rd, "0"]),
                    line_of(&[&mnemonic, rd, "0", rd]),
                )
            }
        }
        "sb" | "sh" | "sw"
            if args.len() == 3
                && user_string_to_int(&args[1]).is_none()
                && crate::isa::regs::parse_register(&args[1]).is_none()
                && !raw_line.split('#').next().unwrap_or("").contains('(') =>
        {
            // sw rs, label, rt — rt is a scratch register for the pair
            let (rs, rt) = (&args[0], &args[2]);
            pcrel_pair(
                program,
                line,
                &args[1],
                Relocator::PcRelLoStore,
                line_of(&["auipc", rt, "0"]),
                line_of(&[&mnemonic, rs, "0", rt]),
            )
        }
        _ => return Ok(None),
    };
    Ok(Some(expanded))
}

/// `auipc` + paired low-half instruction, with PCRel-Hi/Lo relocations at
/// the current text cursor.
fn pcrel_pair(
    program: &mut Program,
    line: usize,
    target: &str,
    lo_relocator: Relocator,
    hi_line: Vec<String>,
    lo_line: Vec<String>,
) -> Tal {
    let cur = program.segment_offset(Segment::Text);
    let (symbol, offset_expr) = split_symbol_offset(target);
    program.add_relocation(Relocator::PcRelHi, cur, symbol, offset_expr, line);
    program.add_relocation(lo_relocator, cur + 4, symbol, offset_expr, line);
    vec![hi_line, lo_line]
}

/// `li` with the classic high/low split. The +0x800 bias compensates for
/// the sign extension of the low half.
fn expand_li(rd: &str, imm_tok: &str) -> Tal {
    let imm = match user_string_to_int(imm_tok) {
        Some(v) => v,
        // symbolic (e.g. an .equiv name): resolved by pass two, must fit
        // the single-instruction form
        None => return vec![line_of(&["addi", rd, "x0", imm_tok])],
    };
    if (-2048..=2047).contains(&imm) {
        return vec![line_of(&["addi", rd, "x0", &imm.to_string()])];
    }
    let hi = ((imm as i64 + 0x800) >> 12) as u32 & 0xFFFFF;
    let lo = imm.wrapping_sub((hi << 12) as i32);
    vec![
        line_of(&["lui", rd, &hi.to_string()]),
        line_of(&["addi", rd, rd, &lo.to_string()]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_text(line: &str) -> Tal {
        let mut program = Program::default();
        let (_, tokens) = crate::asm::lexer::lex(line, 1).unwrap();
        expand(&mut program, line, &tokens, 1)
            .unwrap()
            .expect("should be a pseudo")
    }

    #[test]
    fn small_li_is_one_addi() {
        assert_eq!(expand_text("li x5, 42"), vec![vec!["addi", "x5", "x0", "42"]]);
        assert_eq!(
            expand_text("li x5, -2048"),
            vec![vec!["addi", "x5", "x0", "-2048"]]
        );
    }

    #[test]
    fn large_li_splits_with_bias() {
        // 0x7FFFF800 needs hi = 0x80000 and lo = -2048
        assert_eq!(
            expand_text("li x5, 0x7FFFF800"),
            vec![
                vec!["lui", "x5", "524288"],
                vec!["addi", "x5", "x5", "-2048"]
            ]
        );
        assert_eq!(
            expand_text("li x5, -0x80000000"),
            vec![vec!["lui", "x5", "524288"], vec!["addi", "x5", "x5", "0"]]
        );
        assert_eq!(
            expand_text("li x5, 0x12345678"),
            vec![
                vec!["lui", "x5", "74565"],
                vec!["addi", "x5", "x5", "1656"]
            ]
        );
    }

    #[test]
    fn branch_aliases_swap_operands() {
        assert_eq!(expand_text("beqz t0, done"), vec![vec!["beq", "t0", "x0", "done"]]);
        assert_eq!(expand_text("blez t0, done"), vec![vec!["bge", "x0", "t0", "done"]]);
        assert_eq!(expand_text("bgt t0, t1, done"), vec![vec!["blt", "t1", "t0", "done"]]);
        assert_eq!(expand_text("bleu t0, t1, done"), vec![vec!["bgeu", "t1", "t0", "done"]]);
    }

    #[test]
    fn jumps_and_returns() {
        assert_eq!(expand_text("j loop"), vec![vec!["jal", "x0", "loop"]]);
        assert_eq!(expand_text("jr ra"), vec![vec!["jalr", "x0", "0", "ra"]]);
        assert_eq!(expand_text("ret"), vec![vec!["jalr", "x0", "0", "x1"]]);
        assert_eq!(expand_text("jal func"), vec![vec!["jal", "x1", "func"]]);
    }

    #[test]
    fn la_emits_pcrel_pair() {
        let mut program = Program::default();
        program.text_size = 8;
        let (_, tokens) = crate::asm::lexer::lex("la t0, v+4", 1).unwrap();
        let tal = expand(&mut program, "la t0, v+4", &tokens, 1).unwrap().unwrap();
        assert_eq!(
            tal,
            vec![vec!["auipc", "t0", "0"], vec!["addi", "t0", "t0", "0"]]
        );
        assert_eq!(program.relocation_table.len(), 2);
        assert_eq!(program.relocation_table[0].relocator, Relocator::PcRelHi);
        assert_eq!(program.relocation_table[0].offset, 8);
        assert_eq!(program.relocation_table[0].label, "v");
        assert_eq!(program.relocation_table[0].offset_expr, "+4");
        assert_eq!(program.relocation_table[1].relocator, Relocator::PcRelLo);
        assert_eq!(program.relocation_table[1].offset, 12);
    }

    #[test]
    fn load_pseudo_forms() {
        // numeric operand: plain load off x0
        assert_eq!(expand_text("lw t1, 60"), vec![vec!["lw", "t1", "60", "x0"]]);
        // symbolic operand: auipc + load through rd
        let mut program = Program::default();
        let (_, tokens) = crate::asm::lexer::lex("lw t1, value", 1).unwrap();
        let tal = expand(&mut program, "lw t1, value", &tokens, 1).unwrap().unwrap();
        assert_eq!(tal, vec![vec!["auipc", "t1", "0"], vec!["lw", "t1", "0", "t1"]]);
        assert_eq!(program.relocation_table[1].relocator, Relocator::PcRelLo);
        // explicit base register: not a pseudo
        let (_, tokens) = crate::asm::lexer::lex("lw t1, 0(t2)", 1).unwrap();
        assert!(expand(&mut program, "lw t1, 0(t2)", &tokens, 1).unwrap().is_none());
    }

    #[test]
    fn store_pseudo_forms() {
        let mut program = Program::default();
        let (_, tokens) = crate::asm::lexer::lex("sw a0, value, t6", 1).unwrap();
        let tal = expand(&mut program, "sw a0, value, t6", &tokens, 1).unwrap().unwrap();
        assert_eq!(tal, vec![vec!["auipc", "t6", "0"], vec!["sw", "a0", "0", "t6"]]);
        assert_eq!(program.relocation_table[1].relocator, Relocator::PcRelLoStore);

        // bracketed symbolic form stays a single store; pass two attaches
        // the absolute relocation
        let (_, tokens) = crate::asm::lexer::lex("sw a0, value(t6)", 1).unwrap();
        assert!(expand(&mut program, "sw a0, value(t6)", &tokens, 1).unwrap().is_none());

        // plain numeric store is untouched
        let (_, tokens) = crate::asm::lexer::lex("sw a0, 60(t6)", 1).unwrap();
        assert!(expand(&mut program, "sw a0, 60(t6)", &tokens, 1).unwrap().is_none());
    }
}
