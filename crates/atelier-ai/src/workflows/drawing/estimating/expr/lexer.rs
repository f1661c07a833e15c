use super::EvalError;

/// Lexical tokens of the condition/yield expression language.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Dot,
    EqEq,
    BangEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '=' => {
                chars.next();
                match chars.peek() {
                    Some((_, '=')) => {
                        chars.next();
                        tokens.push(Token::EqEq);
                    }
                    _ => {
                        return Err(EvalError::Syntax(format!(
                            "unexpected '=' at offset {start}, expected '=='"
                        )))
                    }
                }
            }
            '!' => {
                chars.next();
                match chars.peek() {
                    Some((_, '=')) => {
                        chars.next();
                        tokens.push(Token::BangEq);
                    }
                    _ => tokens.push(Token::Bang),
                }
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some((_, '=')) => {
                        chars.next();
                        tokens.push(Token::Le);
                    }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                match chars.peek() {
                    Some((_, '=')) => {
                        chars.next();
                        tokens.push(Token::Ge);
                    }
                    _ => tokens.push(Token::Gt),
                }
            }
            '&' => {
                chars.next();
                match chars.peek() {
                    Some((_, '&')) => {
                        chars.next();
                        tokens.push(Token::AndAnd);
                    }
                    _ => {
                        return Err(EvalError::Syntax(format!(
                            "unexpected '&' at offset {start}, expected '&&'"
                        )))
                    }
                }
            }
            '|' => {
                chars.next();
                match chars.peek() {
                    Some((_, '|')) => {
                        chars.next();
                        tokens.push(Token::OrOr);
                    }
                    _ => {
                        return Err(EvalError::Syntax(format!(
                            "unexpected '|' at offset {start}, expected '||'"
                        )))
                    }
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    literal.push(c);
                }
                if !closed {
                    return Err(EvalError::Syntax(format!(
                        "unterminated string literal starting at offset {start}"
                    )));
                }
                tokens.push(Token::Text(literal));
            }
            c if c.is_ascii_digit() => {
                let mut literal = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = literal.parse::<f64>().map_err(|_| {
                    EvalError::Syntax(format!("invalid number '{literal}' at offset {start}"))
                })?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(EvalError::Syntax(format!(
                    "unexpected character '{other}' at offset {start}"
                )))
            }
        }
    }

    Ok(tokens)
}
