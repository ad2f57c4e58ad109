use std::fmt;

use winnow::ascii::multispace0;
use winnow::combinator::{alt, cut_err, opt};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{literal, take_while};

use crate::error::ScriptError;
use crate::item::{FieldValue, WorkItem};

use super::catalog::SnippetCatalog;
use super::{EngineKind, ScriptEngine};

/// Arithmetic backend: a snippet is a list of `field = expression` lines.
///
/// One assignment per line; lines starting with `#` are comments. An
/// expression combines number, string and bool literals, field references
/// and `+ - * / %` with the usual precedence. `+` concatenates strings.
/// Assignments apply in order, so later lines see earlier results.
pub struct CalcEngine {
    catalog: SnippetCatalog<Vec<Assign>>,
}

impl CalcEngine {
    pub fn new() -> Self {
        Self {
            catalog: SnippetCatalog::new(),
        }
    }
}

impl Default for CalcEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for CalcEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Calc
    }

    fn load(&mut self, name: &str, source: &str) -> Result<(), ScriptError> {
        let program = compile(name, source)?;
        self.catalog.insert(name, program)
    }

    fn load_completed(&mut self) -> Result<(), ScriptError> {
        self.catalog.seal()
    }

    fn run(&mut self, name: &str, item: &mut WorkItem) -> Result<(), ScriptError> {
        let program = self.catalog.get(name)?;
        for assign in program {
            let value = eval_expr(&assign.expr, item).map_err(|message| {
                ScriptError::Execution {
                    name: name.to_string(),
                    message: format!("assignment to {:?}: {message}", assign.field),
                }
            })?;
            // Applied before the next line evaluates.
            item.set_field(&assign.field, value);
        }
        Ok(())
    }
}

fn compile(name: &str, source: &str) -> Result<Vec<Assign>, ScriptError> {
    let mut program = Vec::new();
    for (no, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let assign = assignment.parse(line).map_err(|e| ScriptError::Compile {
            name: name.to_string(),
            message: format!("line {}: {e}", no + 1),
        })?;
        program.push(assign);
    }
    Ok(program)
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Assign {
    field: String,
    expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Field(String),
    Neg(Box<Expr>),
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        };
        write!(f, "{sym}")
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// `assignment = ident "=" add_expr`
fn assignment(input: &mut &str) -> ModalResult<Assign> {
    multispace0.parse_next(input)?;
    let field = ident.parse_next(input)?.to_string();
    multispace0.parse_next(input)?;
    cut_err(literal("="))
        .context(StrContext::Expected(StrContextValue::Description(
            "= after field name",
        )))
        .parse_next(input)?;
    multispace0.parse_next(input)?;
    let expr = cut_err(add_expr).parse_next(input)?;
    multispace0.parse_next(input)?;
    Ok(Assign { field, expr })
}

/// `add_expr = mul_expr { ("+" | "-") mul_expr }`
fn add_expr(input: &mut &str) -> ModalResult<Expr> {
    binop_chain(input, mul_expr, add_op)
}

fn add_op(input: &mut &str) -> ModalResult<BinOp> {
    alt((
        literal("+").value(BinOp::Add),
        literal("-").value(BinOp::Sub),
    ))
    .parse_next(input)
}

/// `mul_expr = unary_expr { ("*" | "/" | "%") unary_expr }`
fn mul_expr(input: &mut &str) -> ModalResult<Expr> {
    binop_chain(input, unary_expr, mul_op)
}

fn mul_op(input: &mut &str) -> ModalResult<BinOp> {
    alt((
        literal("*").value(BinOp::Mul),
        literal("/").value(BinOp::Div),
        literal("%").value(BinOp::Mod),
    ))
    .parse_next(input)
}

/// Left-associative operator chain. Stops at the first token that is not
/// one of the level's operators; a missing right operand after an operator
/// is a hard error.
fn binop_chain(
    input: &mut &str,
    operand: fn(&mut &str) -> ModalResult<Expr>,
    operator: fn(&mut &str) -> ModalResult<BinOp>,
) -> ModalResult<Expr> {
    let mut left = operand(input)?;
    loop {
        multispace0.parse_next(input)?;
        let Some(op) = opt(operator).parse_next(input)? else {
            return Ok(left);
        };
        multispace0.parse_next(input)?;
        let right = cut_err(operand).parse_next(input)?;
        left = Expr::BinOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
    }
}

/// `unary_expr = ["-"] primary`
fn unary_expr(input: &mut &str) -> ModalResult<Expr> {
    if opt(literal("-")).parse_next(input)?.is_some() {
        multispace0.parse_next(input)?;
        let inner = primary.parse_next(input)?;
        Ok(Expr::Neg(Box::new(inner)))
    } else {
        primary.parse_next(input)
    }
}

fn primary(input: &mut &str) -> ModalResult<Expr> {
    alt((
        number_literal.map(Expr::Number),
        quoted_string.map(Expr::Str),
        kw("true").map(|_| Expr::Bool(true)),
        kw("false").map(|_| Expr::Bool(false)),
        paren_expr,
        ident.map(|name: &str| Expr::Field(name.to_string())),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "expression",
    )))
    .parse_next(input)
}

fn paren_expr(input: &mut &str) -> ModalResult<Expr> {
    literal("(").parse_next(input)?;
    multispace0.parse_next(input)?;
    let inner = cut_err(add_expr).parse_next(input)?;
    multispace0.parse_next(input)?;
    cut_err(literal(")")).parse_next(input)?;
    Ok(inner)
}

fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    // First character must be alphabetic or underscore, not a digit.
    if !input.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

fn quoted_string(input: &mut &str) -> ModalResult<String> {
    literal("\"").parse_next(input)?;
    let content = take_while(0.., |c: char| c != '"').parse_next(input)?;
    cut_err(literal("\""))
        .context(StrContext::Expected(StrContextValue::Description(
            "closing quote",
        )))
        .parse_next(input)?;
    Ok(content.to_string())
}

fn number_literal(input: &mut &str) -> ModalResult<f64> {
    let integer_part = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    let has_dot = opt(literal(".")).parse_next(input)?.is_some();
    if has_dot {
        let frac_part = take_while(1.., |c: char| c.is_ascii_digit())
            .context(StrContext::Expected(StrContextValue::Description(
                "digits after decimal point",
            )))
            .parse_next(input)?;
        let s = format!("{integer_part}.{frac_part}");
        let v: f64 = s.parse().map_err(|_| ErrMode::Cut(ContextError::new()))?;
        Ok(v)
    } else {
        let v: f64 = integer_part
            .parse()
            .map_err(|_| ErrMode::Cut(ContextError::new()))?;
        Ok(v)
    }
}

/// Match a keyword that is not a prefix of a longer identifier.
fn kw<'a>(keyword: &'static str) -> impl FnMut(&mut &'a str) -> ModalResult<()> {
    move |input: &mut &'a str| {
        let saved = *input;
        literal(keyword).parse_next(input)?;
        if input.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
            *input = saved;
            return Err(ErrMode::Backtrack(ContextError::new()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn eval_expr(expr: &Expr, item: &WorkItem) -> Result<FieldValue, String> {
    match expr {
        Expr::Number(n) => Ok(FieldValue::Number(*n)),
        Expr::Str(s) => Ok(FieldValue::Str(s.clone())),
        Expr::Bool(b) => Ok(FieldValue::Bool(*b)),
        Expr::Field(name) => item
            .field(name)
            .cloned()
            .ok_or_else(|| format!("unknown field {name:?}")),
        Expr::Neg(inner) => match eval_expr(inner, item)? {
            FieldValue::Number(n) => Ok(FieldValue::Number(-n)),
            other => Err(format!("cannot negate a {}", other.type_name())),
        },
        Expr::BinOp { op, left, right } => {
            let left = eval_expr(left, item)?;
            let right = eval_expr(right, item)?;
            apply_binop(*op, left, right)
        }
    }
}

fn apply_binop(op: BinOp, left: FieldValue, right: FieldValue) -> Result<FieldValue, String> {
    use FieldValue::{Number, Str};
    match (op, left, right) {
        (BinOp::Add, Number(a), Number(b)) => Ok(Number(a + b)),
        (BinOp::Add, Str(a), Str(b)) => Ok(Str(format!("{a}{b}"))),
        (BinOp::Sub, Number(a), Number(b)) => Ok(Number(a - b)),
        (BinOp::Mul, Number(a), Number(b)) => Ok(Number(a * b)),
        (BinOp::Div, Number(a), Number(b)) => {
            if b == 0.0 {
                Err("division by zero".to_string())
            } else {
                Ok(Number(a / b))
            }
        }
        (BinOp::Mod, Number(a), Number(b)) => {
            if b == 0.0 {
                Err("division by zero".to_string())
            } else {
                Ok(Number(a % b))
            }
        }
        (op, left, right) => Err(format!(
            "{op} is not defined for {} and {}",
            left.type_name(),
            right.type_name()
        )),
    }
}
