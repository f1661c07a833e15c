use super::lexer::{tokenize, Token};
use super::EvalError;

/// Aggregate functions usable over array-valued bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Aggregate {
    Sum,
    Avg,
    Max,
    Min,
    Count,
}

impl Aggregate {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            "count" => Some(Self::Count),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

/// Parsed expression tree. Identifier references resolve against the binding
/// map by whole name; a path is an identifier plus an optional property used
/// by aggregates over record lists.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Text(String),
    Path(Path),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Aggregate,
        argument: Path,
    },
}

/// `ident` or dotted `ident.property`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Path {
    pub root: String,
    pub property: Option<String>,
}

pub(crate) fn parse(source: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, cursor: 0 };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(EvalError::Syntax(format!(
            "unexpected trailing token {token:?}"
        )));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), EvalError> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(EvalError::Syntax(format!(
                "expected {expected:?}, found {token:?}"
            ))),
            None => Err(EvalError::Syntax(format!(
                "expected {expected:?}, found end of expression"
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::OrOr)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek(), Some(Token::AndAnd)) {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::BangEq) => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_factor()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        match self.peek() {
            Some(Token::Bang) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            Some(Token::Minus) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Text(value)) => Ok(Expr::Text(value)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    let function = Aggregate::from_name(&name)
                        .ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;
                    self.advance();
                    let argument = self.parse_path()?;
                    self.expect(Token::RParen)?;
                    return Ok(Expr::Call { function, argument });
                }
                let path = self.continue_path(name)?;
                Ok(Expr::Path(path))
            }
            Some(token) => Err(EvalError::Syntax(format!(
                "unexpected token {token:?}"
            ))),
            None => Err(EvalError::Syntax("empty expression".to_string())),
        }
    }

    fn parse_path(&mut self) -> Result<Path, EvalError> {
        match self.advance() {
            Some(Token::Ident(root)) => self.continue_path(root),
            Some(token) => Err(EvalError::Syntax(format!(
                "expected identifier, found {token:?}"
            ))),
            None => Err(EvalError::Syntax(
                "expected identifier, found end of expression".to_string(),
            )),
        }
    }

    fn continue_path(&mut self, root: String) -> Result<Path, EvalError> {
        if !matches!(self.peek(), Some(Token::Dot)) {
            return Ok(Path {
                root,
                property: None,
            });
        }
        self.advance();
        match self.advance() {
            Some(Token::Ident(property)) => Ok(Path {
                root,
                property: Some(property),
            }),
            Some(token) => Err(EvalError::Syntax(format!(
                "expected property name after '.', found {token:?}"
            ))),
            None => Err(EvalError::Syntax(
                "expected property name after '.'".to_string(),
            )),
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_binds_multiplication_before_addition() {
        let expr = parse("1 + 2 * 3").expect("parses");

        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                rhs,
                ..
            } => assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. })),
            other => panic!("expected addition at the root, got {other:?}"),
        }
    }

    #[test]
    fn boolean_operators_bind_loosest() {
        let expr = parse("a == 1 && b == 2 || !c").expect("parses");

        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Or, .. }));
    }

    #[test]
    fn aggregate_calls_take_dotted_paths() {
        let expr = parse("sum(percages.diametre) > 40").expect("parses");

        match expr {
            Expr::Binary { lhs, .. } => match *lhs {
                Expr::Call { function, argument } => {
                    assert_eq!(function, Aggregate::Sum);
                    assert_eq!(argument.root, "percages");
                    assert_eq!(argument.property.as_deref(), Some("diametre"));
                }
                other => panic!("expected aggregate call, got {other:?}"),
            },
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn unknown_functions_are_rejected_at_parse_time() {
        let result = parse("median(percages.diametre)");

        assert!(matches!(result, Err(EvalError::UnknownFunction(name)) if name == "median"));
    }

    #[test]
    fn trailing_tokens_are_syntax_errors() {
        assert!(parse("1 + 2 3").is_err());
        assert!(parse("(1 + 2").is_err());
        assert!(parse("").is_err());
    }
}
