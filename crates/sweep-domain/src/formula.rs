//! Evaluador de fórmulas aritméticas sobre los valores de un punto.
//!
//! Gramática cerrada: literales numéricos, `+ - * /`, signo unario,
//! paréntesis e identificadores que nombran parámetros declarados. No hay
//! funciones, atributos ni acceso al entorno.
//!
//! Dos entradas:
//! - `resolve`: estricta, devuelve `FormulaError` tipado.
//! - `evaluate`: tolerante, ante cualquier error devuelve el texto original
//!   (`ResolvedValue::Text`) para que el llamador decida.
use indexmap::IndexMap;
use logos::Logos;
use serde_json::{Number, Value};
use thiserror::Error;

use crate::ParameterPoint;

/// Profundidad máxima de anidamiento (paréntesis y signos unarios).
pub const MAX_DEPTH: usize = 64;

/// Longitud máxima, en bytes, de una expresión.
pub const MAX_LEN: usize = 4096;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    #[error("malformed expression '{expr}': {reason}")]
    Malformed { expr: String, reason: String },
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("expression does not evaluate to a finite number")]
    NonFinite,
    #[error("expression nesting deeper than {0}")]
    TooDeep(usize),
    #[error("expression longer than {0} bytes")]
    TooLong(usize),
}

/// Resultado de resolver un valor de configuración contra un punto.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Number(f64),
    /// Texto sin evaluar: literal o expresión que no pudo resolverse.
    Text(String),
    /// Booleanos, null, arrays u objetos: no son expresiones.
    Unsupported(Value),
}

impl ResolvedValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ResolvedValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ResolvedValue::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            ResolvedValue::Text(s) => Value::String(s.clone()),
            ResolvedValue::Unsupported(v) => v.clone(),
        }
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token<'src> {
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice())]
    Number(&'src str),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice())]
    Ident(&'src str),
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    fn apply(self, l: f64, r: f64) -> Result<f64, FormulaError> {
        match self {
            BinOp::Add => Ok(l + r),
            BinOp::Sub => Ok(l - r),
            BinOp::Mul => Ok(l * r),
            BinOp::Div if r == 0.0 => Err(FormulaError::DivisionByZero),
            BinOp::Div => Ok(l / r),
        }
    }
}

/// AST. Los operadores de igual precedencia se guardan como una cadena
/// plana que se pliega de izquierda a derecha, así la altura del árbol sólo
/// crece con paréntesis y signos unarios (acotados por `MAX_DEPTH`).
#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Chain(Box<Expr>, Vec<(BinOp, Expr)>),
}

impl Expr {
    fn chain(first: Expr, rest: Vec<(BinOp, Expr)>) -> Expr {
        if rest.is_empty() {
            first
        } else {
            Expr::Chain(Box::new(first), rest)
        }
    }

    fn eval(&self, bindings: &IndexMap<&str, f64>) -> Result<f64, FormulaError> {
        match self {
            Expr::Num(n) => Ok(*n),
            Expr::Var(name) => bindings.get(name.as_str())
                                       .copied()
                                       .ok_or_else(|| FormulaError::UnknownVariable(name.clone())),
            Expr::Neg(inner) => Ok(-inner.eval(bindings)?),
            Expr::Chain(first, rest) => {
                let mut acc = first.eval(bindings)?;
                for (op, operand) in rest {
                    acc = op.apply(acc, operand.eval(bindings)?)?;
                }
                Ok(acc)
            }
        }
    }
}

/// Expresión ya analizada, reutilizable contra varios puntos.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    ast: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        check_len(source)?;
        let tokens = tokenize(source)?;
        let ast = Parser::new(source, &tokens).parse()?;
        Ok(Self { source: source.to_string(),
                  ast })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evalúa contra una tabla nombre → valor.
    pub fn eval(&self, bindings: &IndexMap<&str, f64>) -> Result<f64, FormulaError> {
        let value = self.ast.eval(bindings)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite)
        }
    }
}

fn check_len(source: &str) -> Result<(), FormulaError> {
    if source.len() > MAX_LEN {
        return Err(FormulaError::TooLong(MAX_LEN));
    }
    Ok(())
}

fn tokenize(source: &str) -> Result<Vec<Token<'_>>, FormulaError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(t) => tokens.push(t),
            Err(()) => {
                return Err(FormulaError::Malformed { expr: source.to_string(),
                                                     reason: format!("unexpected character at {}", lexer.span().start) })
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a, 'src> {
    source: &'a str,
    tokens: &'a [Token<'src>],
    pos: usize,
    depth: usize,
}

impl<'a, 'src> Parser<'a, 'src> {
    fn new(source: &'a str, tokens: &'a [Token<'src>]) -> Self {
        Self { source,
               tokens,
               pos: 0,
               depth: 0 }
    }

    fn parse(mut self) -> Result<Expr, FormulaError> {
        if self.tokens.is_empty() {
            return Err(self.malformed("empty expression"));
        }
        let expr = self.expr()?;
        if self.pos != self.tokens.len() {
            return Err(self.malformed(format!("unexpected token at position {}", self.pos)));
        }
        Ok(expr)
    }

    fn malformed(&self, reason: impl Into<String>) -> FormulaError {
        FormulaError::Malformed { expr: self.source.to_string(),
                                  reason: reason.into() }
    }

    fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos)
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let first = self.term()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(Expr::chain(first, rest)),
            };
            self.pos += 1;
            rest.push((op, self.term()?));
        }
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Expr, FormulaError> {
        let first = self.unary()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(Expr::chain(first, rest)),
            };
            self.pos += 1;
            rest.push((op, self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        let negate = match self.peek() {
            Some(Token::Minus) => true,
            Some(Token::Plus) => false,
            _ => return self.primary(),
        };
        self.pos += 1;
        self.enter()?;
        let inner = self.unary()?;
        self.depth -= 1;
        Ok(if negate { Expr::Neg(Box::new(inner)) } else { inner })
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let token = self.peek().cloned().ok_or_else(|| self.malformed("unexpected end of expression"))?;
        self.pos += 1;
        match token {
            Token::Number(raw) => raw.parse::<f64>()
                                     .map(Expr::Num)
                                     .map_err(|_| self.malformed(format!("invalid number '{raw}'"))),
            Token::Ident(name) => Ok(Expr::Var(name.to_string())),
            Token::LParen => {
                self.enter()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(self.malformed("missing ')'")),
                }
            }
            other => Err(self.malformed(format!("unexpected token {other:?}"))),
        }
    }
}

/// Resolución estricta. Un texto que no es una expresión (caracteres fuera
/// de la gramática, o un único identificador que no es parámetro) se devuelve
/// como literal `Text`.
pub fn resolve(value: &Value, point: &ParameterPoint) -> Result<ResolvedValue, FormulaError> {
    match value {
        Value::Number(n) => Ok(n.as_f64()
                                .map(ResolvedValue::Number)
                                .unwrap_or_else(|| ResolvedValue::Unsupported(value.clone()))),
        Value::String(text) => resolve_str(text, point),
        other => Ok(ResolvedValue::Unsupported(other.clone())),
    }
}

fn resolve_str(text: &str, point: &ParameterPoint) -> Result<ResolvedValue, FormulaError> {
    let tokens = match tokenize(text) {
        Ok(tokens) => tokens,
        Err(_) => return Ok(ResolvedValue::Text(text.to_string())),
    };
    match tokens.as_slice() {
        [] => return Ok(ResolvedValue::Text(text.to_string())),
        [Token::Ident(name)] if point.get(name).is_none() => return Ok(ResolvedValue::Text(text.to_string())),
        _ => {}
    }
    check_len(text)?;
    let ast = Parser::new(text, &tokens).parse()?;
    let value = ast.eval(&point.bindings())?;
    if !value.is_finite() {
        return Err(FormulaError::NonFinite);
    }
    Ok(ResolvedValue::Number(value))
}

/// Resolución tolerante: cualquier fallo devuelve el texto original.
pub fn evaluate(value: &Value, point: &ParameterPoint) -> ResolvedValue {
    match resolve(value, point) {
        Ok(resolved) => resolved,
        Err(err) => {
            let original = value.as_str().unwrap_or_default().to_string();
            log::debug!("formula '{original}' left unresolved: {err}");
            ResolvedValue::Text(original)
        }
    }
}
