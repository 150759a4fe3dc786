//! Assembler pass one: labels, directives, pseudo expansion, TAL
//! emission.
//!
//! Errors are collected, not thrown; the pass keeps going so one run
//! reports as much as possible. Pass two is only entered when this pass
//! produced no errors.

use crate::arch::{CONST_BEGIN, TEXT_BEGIN};
use crate::asm::lexer::lex;
use crate::asm::parse::{split_symbol_offset, unescape_string, user_string_to_int};
use crate::asm::program::{DataRelocationEntry, DebugInfo, Program, Segment, TalLine};
use crate::asm::pseudo;
use crate::errors::{AsmError, AsmWarning};

pub struct PassOneOutput {
    pub program: Program,
    pub tal: Vec<TalLine>,
    pub errors: Vec<AsmError>,
    pub warnings: Vec<AsmWarning>,
}

pub fn pass_one(source: &str) -> PassOneOutput {
    let mut pass = PassOne {
        program: Program::default(),
        segment: Segment::Text,
        tal: Vec::new(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };
    for (i, raw) in source.lines().enumerate() {
        pass.line(i + 1, raw);
    }
    PassOneOutput {
        program: pass.program,
        tal: pass.tal,
        errors: pass.errors,
        warnings: pass.warnings,
    }
}

struct PassOne {
    program: Program,
    segment: Segment,
    tal: Vec<TalLine>,
    errors: Vec<AsmError>,
    warnings: Vec<AsmWarning>,
}

impl PassOne {
    fn line(&mut self, line: usize, raw: &str) {
        let (labels, tokens) = match lex(raw, line) {
            Ok(parts) => parts,
            Err(e) => {
                self.errors.push(e);
                return;
            }
        };
        for name in labels {
            let offset = self.program.segment_offset(self.segment);
            if !self.program.add_label(&name, offset) {
                self.errors
                    .push(AsmError::label(line, format!("label {name} defined twice")));
            }
        }
        if tokens.is_empty() {
            return;
        }
        if tokens[0].starts_with('.') {
            self.directive(line, &tokens);
        } else {
            self.instruction(line, raw, &tokens);
        }
    }

    fn instruction(&mut self, line: usize, raw: &str, tokens: &[String]) {
        if self.segment != Segment::Text {
            self.errors.push(AsmError::directive(
                line,
                "instructions may only appear in the text segment",
            ));
            return;
        }
        let expanded = match pseudo::expand(&mut self.program, raw, tokens, line) {
            Ok(Some(lines)) => lines,
            Ok(None) => vec![tokens.to_vec()],
            Err(e) => {
                self.errors.push(e);
                return;
            }
        };
        for tal_tokens in expanded {
            if TEXT_BEGIN + self.program.text_size >= CONST_BEGIN {
                self.errors
                    .push(AsmError::range(line, "text segment overflow"));
                return;
            }
            self.tal.push(TalLine {
                tokens: tal_tokens,
                debug: DebugInfo {
                    line,
                    source: raw.trim().to_string(),
                },
            });
            self.program.text_size += 4;
        }
    }

    fn directive(&mut self, line: usize, tokens: &[String]) {
        let name = tokens[0].as_str();
        let args = &tokens[1..];
        match name {
            ".text" => self.segment = Segment::Text,
            ".data" => self.segment = Segment::Data,
            ".rodata" => self.segment = Segment::Rodata,
            ".byte" => self.emit_values(line, name, args, 1),
            ".word" => self.emit_values(line, name, args, 4),
            ".string" | ".asciiz" | ".asciz" => self.emit_string(line, name, args, true),
            ".ascii" => self.emit_string(line, name, args, false),
            ".space" | ".zero" => match args {
                [n] => match user_string_to_int(n) {
                    Some(count) if count >= 0 => self.emit_bytes(line, &vec![0u8; count as usize]),
                    Some(count) => self.errors.push(AsmError::directive(
                        line,
                        format!("{name} size must be non-negative, got {count}"),
                    )),
                    None => self
                        .errors
                        .push(AsmError::directive(line, format!("invalid {name} size: {n}"))),
                },
                _ => self
                    .errors
                    .push(AsmError::directive(line, format!("{name} expects one size"))),
            },
            ".align" => self.align(line, args),
            ".globl" => {
                if args.is_empty() {
                    self.errors
                        .push(AsmError::directive(line, ".globl expects a label name"));
                }
                for name in args {
                    self.program.global_labels.insert(name.clone());
                }
            }
            ".equiv" | ".equ" | ".set" => self.equiv(line, name, args),
            ".float" | ".double" => {
                self.warnings.push(AsmWarning {
                    line,
                    msg: format!("{name} is not supported and was ignored"),
                });
            }
            _ => self
                .errors
                .push(AsmError::directive(line, format!("unknown directive {name}"))),
        }
    }

    /// `.byte` / `.word` value lists. `.word` arguments may be labels,
    /// which emit a data relocation instead of bytes.
    fn emit_values(&mut self, line: usize, name: &str, args: &[String], width: u32) {
        if args.is_empty() {
            self.errors
                .push(AsmError::directive(line, format!("{name} expects values")));
            return;
        }
        for arg in args {
            match user_string_to_int(arg) {
                Some(v) if width == 1 => {
                    // Historical quirk, kept on purpose: the low bound is
                    // -127, not -128.
                    if !(-127..=255).contains(&v) {
                        self.errors.push(AsmError::range(
                            line,
                            format!(".byte value {v} out of range -127..255"),
                        ));
                        continue;
                    }
                    self.emit_bytes(line, &[v as u8]);
                }
                Some(v) => self.emit_bytes(line, &(v as u32).to_le_bytes()),
                None if width == 4 => {
                    let (symbol, offset_expr) = split_symbol_offset(arg);
                    let entry = DataRelocationEntry {
                        offset: match self.segment {
                            Segment::Rodata => self.program.rodata_size(),
                            _ => self.program.data_size(),
                        },
                        label: symbol.to_string(),
                        offset_expr: offset_expr.to_string(),
                        line,
                    };
                    match self.segment {
                        Segment::Text => {
                            self.errors.push(AsmError::directive(
                                line,
                                ".word is not allowed in the text segment",
                            ));
                            return;
                        }
                        Segment::Rodata => self.program.rodata_relocation_table.push(entry),
                        Segment::Data => self.program.data_relocation_table.push(entry),
                    }
                    self.emit_bytes(line, &[0, 0, 0, 0]);
                }
                None => self.errors.push(AsmError::directive(
                    line,
                    format!("invalid {name} value: {arg}"),
                )),
            }
        }
    }

    fn emit_string(&mut self, line: usize, name: &str, args: &[String], nul: bool) {
        let body = match args {
            [tok] if tok.len() >= 2 && tok.starts_with('"') && tok.ends_with('"') => {
                &tok[1..tok.len() - 1]
            }
            _ => {
                self.errors.push(AsmError::directive(
                    line,
                    format!("{name} expects one string literal"),
                ));
                return;
            }
        };
        let decoded = match unescape_string(body) {
            Some(s) => s,
            None => {
                self.errors
                    .push(AsmError::directive(line, format!("invalid escape in {name}")));
                return;
            }
        };
        if decoded.chars().any(|c| !c.is_ascii()) {
            self.errors.push(AsmError::directive(
                line,
                format!("{name} only accepts ASCII (0..127)"),
            ));
            return;
        }
        let mut bytes = decoded.into_bytes();
        if nul {
            bytes.push(0);
        }
        self.emit_bytes(line, &bytes);
    }

    fn align(&mut self, line: usize, args: &[String]) {
        let k = match args {
            [k] => user_string_to_int(k),
            _ => None,
        };
        let k = match k {
            Some(k) if (0..=8).contains(&k) => k as u32,
            Some(k) => {
                self.errors.push(AsmError::directive(
                    line,
                    format!(".align exponent {k} out of range 0..8"),
                ));
                return;
            }
            None => {
                self.errors
                    .push(AsmError::directive(line, ".align expects an exponent in 0..8"));
                return;
            }
        };
        let step = 1u32 << k;
        let used = match self.segment {
            Segment::Text => {
                self.errors.push(AsmError::directive(
                    line,
                    ".align is not allowed in the text segment",
                ));
                return;
            }
            Segment::Rodata => self.program.rodata_size(),
            Segment::Data => self.program.data_size(),
        };
        let pad = (step - used % step) % step;
        self.emit_bytes(line, &vec![0u8; pad as usize]);
    }

    fn emit_bytes(&mut self, line: usize, bytes: &[u8]) {
        match self.segment {
            Segment::Text => self.errors.push(AsmError::directive(
                line,
                "data emission is not allowed in the text segment",
            )),
            Segment::Rodata => self.program.rodata.extend_from_slice(bytes),
            Segment::Data => self.program.data.extend_from_slice(bytes),
        }
    }

    fn equiv(&mut self, line: usize, name: &str, args: &[String]) {
        let (alias, value) = match args {
            [alias, value] => (alias, value),
            _ => {
                self.errors.push(AsmError::directive(
                    line,
                    format!("{name} expects a name and a value"),
                ));
                return;
            }
        };
        if name == ".equiv"
            && (self.program.equivs.contains_key(alias) || self.program.labels.contains_key(alias))
        {
            self.errors
                .push(AsmError::label(line, format!("{alias} already defined")));
            return;
        }
        self.program.equivs.insert(alias.clone(), value.clone());
        self.program.equiv_lines.insert(alias.clone(), line);
    }
}
