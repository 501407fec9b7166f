//! A small, hand-written recursive-descent evaluator for `conditional` node
//! `condition_expression` strings.
//!
//! Supports boolean operators (`&&`, `||`, `!`), arithmetic (`+ - * / %`),
//! comparisons (`== != < <= > >=`), member access (`.field`, `[index]`), the
//! `len(...)` builtin, and read-only access to exactly three roots:
//! `output`, `nodes`, `input`. No other function calls, no imports, no
//! attribute lookup outside those roots — a syntax or evaluation error
//! yields a [`ConditionError`], treated by the interpreter as a
//! non-retryable failure for that step.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConditionError {
    #[error("condition syntax error: {0}")]
    Syntax(String),
    #[error("condition evaluation error: {0}")]
    Eval(String),
}

pub struct EvalRoots<'a> {
    pub output: &'a Value,
    pub nodes: &'a Value,
    pub input: &'a Value,
}

/// Parse and evaluate `source` against `roots`, returning its boolean result.
pub fn evaluate(source: &str, roots: &EvalRoots<'_>) -> Result<bool, ConditionError> {
    let tokens = lex(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let ast = parser.parse_expr()?;
    parser.expect_end()?;
    let value = eval_node(&ast, roots)?;
    as_bool(&value)
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Punct(&'static str),
    Eof,
}

fn lex(source: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let num_str: String = chars[start..i].iter().collect();
            let n = num_str
                .parse::<f64>()
                .map_err(|_| ConditionError::Syntax(format!("invalid number '{num_str}'")))?;
            tokens.push(Token::Number(n));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let start = i;
            while i < chars.len() && chars[i] != quote {
                i += 1;
            }
            if i >= chars.len() {
                return Err(ConditionError::Syntax("unterminated string literal".to_string()));
            }
            tokens.push(Token::Str(chars[start..i].iter().collect()));
            i += 1;
            continue;
        }

        let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        let punct2 = match two.as_str() {
            "&&" | "||" | "==" | "!=" | "<=" | ">=" => Some(two),
            _ => None,
        };
        if let Some(p) = punct2 {
            tokens.push(Token::Punct(match p.as_str() {
                "&&" => "&&",
                "||" => "||",
                "==" => "==",
                "!=" => "!=",
                "<=" => "<=",
                ">=" => ">=",
                _ => unreachable!(),
            }));
            i += 2;
            continue;
        }

        let one = match c {
            '!' => "!",
            '+' => "+",
            '-' => "-",
            '*' => "*",
            '/' => "/",
            '%' => "%",
            '<' => "<",
            '>' => ">",
            '.' => ".",
            '[' => "[",
            ']' => "]",
            '(' => "(",
            ')' => ")",
            other => return Err(ConditionError::Syntax(format!("unexpected character '{other}'"))),
        };
        tokens.push(Token::Punct(one));
        i += 1;
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Ast {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Root(String),
    Field(Box<Ast>, String),
    Index(Box<Ast>, Box<Ast>),
    Not(Box<Ast>),
    Neg(Box<Ast>),
    Len(Box<Ast>),
    BinOp(&'static str, Box<Ast>, Box<Ast>),
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), ConditionError> {
        match self.advance() {
            Token::Punct(found) if found == p => Ok(()),
            other => Err(ConditionError::Syntax(format!("expected '{p}', found {other:?}"))),
        }
    }

    fn expect_end(&self) -> Result<(), ConditionError> {
        match self.peek() {
            Token::Eof => Ok(()),
            other => Err(ConditionError::Syntax(format!("unexpected trailing token {other:?}"))),
        }
    }

    fn parse_expr(&mut self) -> Result<Ast, ConditionError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Ast, ConditionError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Token::Punct("||")) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Ast::BinOp("||", Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Ast, ConditionError> {
        let mut lhs = self.parse_not()?;
        while matches!(self.peek(), Token::Punct("&&")) {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Ast::BinOp("&&", Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Ast, ConditionError> {
        if matches!(self.peek(), Token::Punct("!")) {
            self.advance();
            return Ok(Ast::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Ast, ConditionError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Token::Punct(op @ ("==" | "!=" | "<" | "<=" | ">" | ">=")) => Some(*op),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let rhs = self.parse_additive()?;
            return Ok(Ast::BinOp(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Ast, ConditionError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Punct(op @ ("+" | "-")) => *op,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Ast::BinOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Ast, ConditionError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Punct(op @ ("*" | "/" | "%")) => *op,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Ast::BinOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Ast, ConditionError> {
        if matches!(self.peek(), Token::Punct("-")) {
            self.advance();
            return Ok(Ast::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Ast, ConditionError> {
        let mut node = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Punct(".") => {
                    self.advance();
                    let field = match self.advance() {
                        Token::Ident(name) => name,
                        other => return Err(ConditionError::Syntax(format!("expected field name, found {other:?}"))),
                    };
                    node = Ast::Field(Box::new(node), field);
                }
                Token::Punct("[") => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect_punct("]")?;
                    node = Ast::Index(Box::new(node), Box::new(index));
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Ast, ConditionError> {
        match self.advance() {
            Token::Number(n) => Ok(Ast::Number(n)),
            Token::Str(s) => Ok(Ast::Str(s)),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Ast::Bool(true)),
                "false" => Ok(Ast::Bool(false)),
                "null" => Ok(Ast::Null),
                "len" => {
                    self.expect_punct("(")?;
                    let inner = self.parse_expr()?;
                    self.expect_punct(")")?;
                    Ok(Ast::Len(Box::new(inner)))
                }
                "output" | "nodes" | "input" => Ok(Ast::Root(name)),
                other => Err(ConditionError::Syntax(format!(
                    "unknown identifier '{other}' (only output/nodes/input/len are permitted)"
                ))),
            },
            Token::Punct("(") => {
                let inner = self.parse_expr()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            other => Err(ConditionError::Syntax(format!("unexpected token {other:?}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

fn eval_node(ast: &Ast, roots: &EvalRoots<'_>) -> Result<Value, ConditionError> {
    match ast {
        Ast::Number(n) => Ok(Value::from(*n)),
        Ast::Str(s) => Ok(Value::String(s.clone())),
        Ast::Bool(b) => Ok(Value::Bool(*b)),
        Ast::Null => Ok(Value::Null),
        Ast::Root(name) => Ok(match name.as_str() {
            "output" => roots.output.clone(),
            "nodes" => roots.nodes.clone(),
            "input" => roots.input.clone(),
            other => return Err(ConditionError::Eval(format!("unknown root '{other}'"))),
        }),
        Ast::Field(base, field) => {
            let v = eval_node(base, roots)?;
            Ok(v.get(field).cloned().unwrap_or(Value::Null))
        }
        Ast::Index(base, idx) => {
            let v = eval_node(base, roots)?;
            let idx = eval_node(idx, roots)?;
            if let Some(i) = idx.as_u64() {
                Ok(v.get(i as usize).cloned().unwrap_or(Value::Null))
            } else if let Some(s) = idx.as_str() {
                Ok(v.get(s).cloned().unwrap_or(Value::Null))
            } else {
                Err(ConditionError::Eval("index must be a number or string".to_string()))
            }
        }
        Ast::Not(inner) => Ok(Value::Bool(!as_bool(&eval_node(inner, roots)?)?)),
        Ast::Neg(inner) => {
            let v = eval_node(inner, roots)?;
            let n = as_number(&v)?;
            Ok(Value::from(-n))
        }
        Ast::Len(inner) => {
            let v = eval_node(inner, roots)?;
            let len = match &v {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                Value::Null => 0,
                other => return Err(ConditionError::Eval(format!("len() not supported for {other}"))),
            };
            Ok(Value::from(len as u64))
        }
        Ast::BinOp(op, lhs, rhs) => eval_binop(op, lhs, rhs, roots),
    }
}

fn eval_binop(op: &str, lhs: &Ast, rhs: &Ast, roots: &EvalRoots<'_>) -> Result<Value, ConditionError> {
    match op {
        "&&" => {
            let l = as_bool(&eval_node(lhs, roots)?)?;
            if !l {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(as_bool(&eval_node(rhs, roots)?)?))
        }
        "||" => {
            let l = as_bool(&eval_node(lhs, roots)?)?;
            if l {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(as_bool(&eval_node(rhs, roots)?)?))
        }
        "==" => Ok(Value::Bool(eval_node(lhs, roots)? == eval_node(rhs, roots)?)),
        "!=" => Ok(Value::Bool(eval_node(lhs, roots)? != eval_node(rhs, roots)?)),
        "<" | "<=" | ">" | ">=" => {
            let l = as_number(&eval_node(lhs, roots)?)?;
            let r = as_number(&eval_node(rhs, roots)?)?;
            Ok(Value::Bool(match op {
                "<" => l < r,
                "<=" => l <= r,
                ">" => l > r,
                ">=" => l >= r,
                _ => unreachable!(),
            }))
        }
        "+" | "-" | "*" | "/" | "%" => {
            let l = as_number(&eval_node(lhs, roots)?)?;
            let r = as_number(&eval_node(rhs, roots)?)?;
            let result = match op {
                "+" => l + r,
                "-" => l - r,
                "*" => l * r,
                "/" => {
                    if r == 0.0 {
                        return Err(ConditionError::Eval("division by zero".to_string()));
                    }
                    l / r
                }
                "%" => {
                    if r == 0.0 {
                        return Err(ConditionError::Eval("modulo by zero".to_string()));
                    }
                    l % r
                }
                _ => unreachable!(),
            };
            Ok(Value::from(result))
        }
        other => Err(ConditionError::Eval(format!("unsupported operator '{other}'"))),
    }
}

fn as_bool(v: &Value) -> Result<bool, ConditionError> {
    match v {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(ConditionError::Eval(format!("expected boolean, found {other}"))),
    }
}

fn as_number(v: &Value) -> Result<f64, ConditionError> {
    v.as_f64().ok_or_else(|| ConditionError::Eval(format!("expected number, found {v}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roots<'a>(output: &'a Value, nodes: &'a Value, input: &'a Value) -> EvalRoots<'a> {
        EvalRoots { output, nodes, input }
    }

    #[test]
    fn evaluates_field_comparison() {
        let output = json!({"score": 0.9});
        let nodes = json!({});
        let input = json!({});
        assert!(evaluate("output.score >= 0.8", &roots(&output, &nodes, &input)).unwrap());
    }

    #[test]
    fn evaluates_len_and_logical_ops() {
        let output = json!({"items": [1, 2, 3]});
        let nodes = json!({});
        let input = json!({});
        assert!(evaluate("len(output.items) == 3 && true", &roots(&output, &nodes, &input)).unwrap());
    }

    #[test]
    fn rejects_unknown_identifiers() {
        let output = json!({});
        let nodes = json!({});
        let input = json!({});
        let err = evaluate("process.exit()", &roots(&output, &nodes, &input)).unwrap_err();
        assert!(matches!(err, ConditionError::Syntax(_)));
    }

    #[test]
    fn evaluates_nested_index_access() {
        let output = json!({"nodes_list": ["a", "b", "c"]});
        let nodes = json!({});
        let input = json!({});
        assert!(evaluate(
            "output.nodes_list[1] == 'b'",
            &roots(&output, &nodes, &input)
        )
        .unwrap());
    }

    #[test]
    fn negation_and_not() {
        let output = json!({"flag": false});
        let nodes = json!({});
        let input = json!({});
        assert!(evaluate("!output.flag", &roots(&output, &nodes, &input)).unwrap());
    }
}
