//! Line lexer: one source line in, `(labels, tokens)` out.
//!
//! No semantic interpretation happens here; register names, numerals and
//! literals pass through verbatim (literals keep their quotes).

use crate::errors::AsmError;

pub fn lex(line: &str, line_no: usize) -> Result<(Vec<String>, Vec<String>), AsmError> {
    let mut labels = Vec::new();
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '#' => break,
            '\'' => {
                current.push('\'');
                let body = chars
                    .next()
                    .ok_or_else(|| AsmError::lex(line_no, "unterminated character literal"))?;
                current.push(body);
                if body == '\\' {
                    let esc = chars
                        .next()
                        .ok_or_else(|| AsmError::lex(line_no, "unterminated character literal"))?;
                    current.push(esc);
                }
                match chars.next() {
                    Some('\'') => current.push('\''),
                    _ => return Err(AsmError::lex(line_no, "unterminated character literal")),
                }
            }
            '"' => {
                current.push('"');
                loop {
                    match chars.next() {
                        Some('\\') => {
                            current.push('\\');
                            let esc = chars.next().ok_or_else(|| {
                                AsmError::lex(line_no, "unterminated string literal")
                            })?;
                            current.push(esc);
                        }
                        Some('"') => {
                            current.push('"');
                            break;
                        }
                        Some(other) => current.push(other),
                        None => {
                            return Err(AsmError::lex(line_no, "unterminated string literal"))
                        }
                    }
                }
            }
            ':' => {
                let name = if current.is_empty() {
                    tokens
                        .pop()
                        .ok_or_else(|| AsmError::lex(line_no, "unexpected ':'"))?
                } else {
                    std::mem::take(&mut current)
                };
                if !tokens.is_empty() {
                    return Err(AsmError::lex(
                        line_no,
                        format!("label {name} in the middle of an instruction"),
                    ));
                }
                labels.push(name);
            }
            ' ' | '\t' | ',' | '(' | ')' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            other => current.push(other),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok((labels, tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(line: &str) -> (Vec<String>, Vec<String>) {
        lex(line, 1).expect("lex")
    }

    #[test]
    fn plain_instruction() {
        let (labels, tokens) = tok("addi x1, x0, 5");
        assert!(labels.is_empty());
        assert_eq!(tokens, ["addi", "x1", "x0", "5"]);
    }

    #[test]
    fn base_register_syntax_flattens() {
        let (_, tokens) = tok("lw x2, -40(x1)");
        assert_eq!(tokens, ["lw", "x2", "-40", "x1"]);
    }

    #[test]
    fn labels_before_instruction() {
        let (labels, tokens) = tok("start: add x2 x2 x3");
        assert_eq!(labels, ["start"]);
        assert_eq!(tokens, ["add", "x2", "x2", "x3"]);

        let (labels, tokens) = tok("a: b:");
        assert_eq!(labels, ["a", "b"]);
        assert!(tokens.is_empty());

        // whitespace before the colon is allowed
        let (labels, _) = tok("loop : j loop");
        assert_eq!(labels, ["loop"]);
    }

    #[test]
    fn label_mid_instruction_is_an_error() {
        assert!(lex("add x1 x2 oops: x3", 3).is_err());
    }

    #[test]
    fn comments_stop_the_scan() {
        let (_, tokens) = tok("add x1 x2 x3 # trailing words");
        assert_eq!(tokens, ["add", "x1", "x2", "x3"]);
        let (_, tokens) = tok("# whole line");
        assert!(tokens.is_empty());
    }

    #[test]
    fn hash_inside_literals_is_text() {
        let (_, tokens) = tok(".string \"a#b\"");
        assert_eq!(tokens, [".string", "\"a#b\""]);
        let (_, tokens) = tok("li x1 '#'");
        assert_eq!(tokens, ["li", "x1", "'#'"]);
    }

    #[test]
    fn delimiter_runs_collapse() {
        let (_, tokens) = tok("add  x1 ,,  x2   x3");
        assert_eq!(tokens, ["add", "x1", "x2", "x3"]);
    }

    #[test]
    fn unterminated_literals_error() {
        assert!(lex(".string \"abc", 1).is_err());
        assert!(lex("li x1 'a", 1).is_err());
        assert!(lex("li x1 '", 1).is_err());
    }

    #[test]
    fn string_escapes_pass_through_raw() {
        let (_, tokens) = tok(r#".asciiz "a\"b\\" "#);
        assert_eq!(tokens, [".asciiz", r#""a\"b\\""#]);
    }
}
