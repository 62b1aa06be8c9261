//! Expression parsing and evaluation for string-defined parameters
//!
//! Parameters may be defined by mathematical expression strings over other
//! parameter names, e.g. `"x^2 + sin(theta)"`. This module parses such
//! strings into an [`Expression`] tree that reports its free variables and
//! evaluates against any [`EvaluationContext`].

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::recognize,
    multi::many0,
    number::complete::double,
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};
use std::collections::HashMap;
use thiserror::Error;

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression: {message}")]
    ParseError { message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },
}

type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Variable reference; a leading underscore requests the dimensional
    /// form of the parameter
    Variable(String),

    /// Unary operations
    Unary(UnaryOp, Box<Expression>),

    /// Binary operations
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Function call
    Function(String, Vec<Expression>),
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    /// Addition (+)
    Add,

    /// Subtraction (-)
    Sub,

    /// Multiplication (*)
    Mul,

    /// Division (/)
    Div,

    /// Power (^)
    Pow,
}

/// Context for expression evaluation, providing variable values
pub trait EvaluationContext {
    /// Get the value of a variable
    fn get_variable(&self, name: &str) -> ExprResult<f64>;

    /// Check if a variable exists
    fn has_variable(&self, name: &str) -> bool;
}

impl EvaluationContext for HashMap<String, f64> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}

/// Built-in functions callable from expressions.
fn call_builtin(name: &str, args: &[f64]) -> ExprResult<f64> {
    let unary = |f: fn(f64) -> f64| {
        if args.len() != 1 {
            Err(ExpressionError::InvalidOperation {
                message: format!("{}() requires 1 argument, got {}", name, args.len()),
            })
        } else {
            Ok(f(args[0]))
        }
    };

    match name {
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "exp" => unary(f64::exp),
        "log" | "ln" => unary(f64::ln),
        "log10" => unary(f64::log10),
        "sqrt" => unary(f64::sqrt),
        "abs" => unary(f64::abs),
        "max" | "min" => {
            if args.len() < 2 {
                return Err(ExpressionError::InvalidOperation {
                    message: format!("{}() requires at least 2 arguments, got {}", name, args.len()),
                });
            }
            Ok(if name == "max" {
                args.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b))
            } else {
                args.iter().fold(f64::INFINITY, |a, &b| a.min(b))
            })
        }
        _ => Err(ExpressionError::UndefinedFunction {
            name: name.to_string(),
        }),
    }
}

impl Expression {
    /// Parse an expression from a string
    pub fn parse(input: &str) -> ExprResult<Self> {
        match expr_parser(input.trim()) {
            Ok((remainder, expr)) => {
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(ExpressionError::ParseError {
                        message: format!("Unexpected trailing characters: '{}'", remainder),
                    })
                }
            }
            Err(e) => Err(ExpressionError::ParseError {
                message: format!("{:?}", e),
            }),
        }
    }

    /// Evaluate the expression with the given context
    pub fn evaluate<C: EvaluationContext>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),

            Self::Variable(name) => context.get_variable(name),

            Self::Unary(op, expr) => {
                let value = expr.evaluate(context)?;
                match op {
                    UnaryOp::Neg => Ok(-value),
                }
            }

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;

                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div => {
                        if rhs == 0.0 {
                            Err(ExpressionError::DivisionByZero)
                        } else {
                            Ok(lhs / rhs)
                        }
                    }
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }

            Self::Function(name, args) => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(arg.evaluate(context)?);
                }
                call_builtin(name, &evaluated)
            }
        }
    }

    /// Find all variable names used in the expression, sorted and deduplicated
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars.sort();
        vars.dedup();
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Self::Number(_) => {}

            Self::Variable(name) => {
                vars.push(name.clone());
            }

            Self::Unary(_, expr) => {
                expr.collect_variables(vars);
            }

            Self::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }

            Self::Function(_, args) => {
                for arg in args {
                    arg.collect_variables(vars);
                }
            }
        }
    }
}

// Parser functions using nom

/// Parse an identifier (variable or function name)
fn identifier(input: &str) -> IResult<&str, String> {
    let mut parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));

    let (input, matched) = parser.parse(input)?;
    Ok((input, matched.to_string()))
}

/// Parse a comma-separated list of expressions (for function arguments)
fn args_list(input: &str) -> IResult<&str, Vec<Expression>> {
    let (input, first) = expr_parser(input)?;
    let mut res = vec![first];

    let mut remainder = input;
    loop {
        let mut comma_parser = delimited(
            multispace0::<&str, nom::error::Error<&str>>,
            char::<&str, nom::error::Error<&str>>(','),
            multispace0::<&str, nom::error::Error<&str>>,
        );

        match comma_parser.parse(remainder) {
            Ok((after_comma, _)) => match expr_parser(after_comma) {
                Ok((after_expr, expr)) => {
                    res.push(expr);
                    remainder = after_expr;
                }
                Err(_) => break,
            },
            Err(_) => break,
        }
    }

    Ok((remainder, res))
}

/// Parse a function call
fn function_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    let (input, _) = multispace0::<&str, nom::error::Error<&str>>.parse(input)?;
    let (input, _) = char::<&str, nom::error::Error<&str>>('(').parse(input)?;
    let (input, _) = multispace0::<&str, nom::error::Error<&str>>.parse(input)?;

    // Empty argument list
    if let Ok((input, _)) = char::<&str, nom::error::Error<&str>>(')').parse(input) {
        return Ok((input, Expression::Function(name, vec![])));
    }

    let (input, args) = args_list(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char::<&str, nom::error::Error<&str>>(')').parse(input)?;

    Ok((input, Expression::Function(name, args)))
}

/// Parse a number
fn number(input: &str) -> IResult<&str, Expression> {
    let (input, num) = double(input)?;
    Ok((input, Expression::Number(num)))
}

/// Parse a variable reference
fn variable(input: &str) -> IResult<&str, Expression> {
    let (input, var_name) = identifier(input)?;
    Ok((input, Expression::Variable(var_name)))
}

/// Parse a parenthesized expression
fn parens(input: &str) -> IResult<&str, Expression> {
    let (input, _) = char('(').parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, expr) = expr_parser(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char::<_, nom::error::Error<_>>(')').parse(input)?;
    Ok((input, expr))
}

/// Parse a primary expression (number, variable, function call, or parens)
fn primary(input: &str) -> IResult<&str, Expression> {
    if let Ok(result) = number(input) {
        return Ok(result);
    }
    if let Ok(result) = function_call(input) {
        return Ok(result);
    }
    if let Ok(result) = variable(input) {
        return Ok(result);
    }
    parens(input)
}

/// Parse a unary expression (-expr)
fn unary(input: &str) -> IResult<&str, Expression> {
    let (input, _) = multispace0.parse(input)?;

    let mut neg_parser = preceded(char('-'), primary);
    match neg_parser.parse(input) {
        Ok((remaining, expr)) => Ok((remaining, Expression::Unary(UnaryOp::Neg, Box::new(expr)))),
        Err(_) => primary(input),
    }
}

/// Parse a power expression (expr ^ expr), right associative
fn power(input: &str) -> IResult<&str, Expression> {
    let (input, left) = unary(input)?;
    let (input, _) = multispace0.parse(input)?;

    match char::<_, nom::error::Error<_>>('^').parse(input) {
        Ok((after_op, _)) => {
            let (after_op, _) = multispace0.parse(after_op)?;
            let (after_right, right) = power(after_op)?;
            Ok((
                after_right,
                Expression::Binary(BinaryOp::Pow, Box::new(left), Box::new(right)),
            ))
        }
        Err(_) => Ok((input, left)),
    }
}

/// Parse a multiplicative expression (expr * expr, expr / expr),
/// left associative.
fn term(input: &str) -> IResult<&str, Expression> {
    let (input, first) = power(input)?;
    let (input, rest) = many0(pair(
        delimited(multispace0, alt((char('*'), char('/'))), multispace0),
        power,
    ))
    .parse(input)?;

    let expr = rest.into_iter().fold(first, |left, (op, right)| {
        let op = if op == '*' { BinaryOp::Mul } else { BinaryOp::Div };
        Expression::Binary(op, Box::new(left), Box::new(right))
    });
    Ok((input, expr))
}

/// Parse an additive expression (expr + expr, expr - expr),
/// left associative.
fn expr_parser(input: &str) -> IResult<&str, Expression> {
    let (input, _) = multispace0.parse(input)?;
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(
        delimited(multispace0, alt((char('+'), char('-'))), multispace0),
        term,
    ))
    .parse(input)?;

    let expr = rest.into_iter().fold(first, |left, (op, right)| {
        let op = if op == '+' { BinaryOp::Add } else { BinaryOp::Sub };
        Expression::Binary(op, Box::new(left), Box::new(right))
    });
    Ok((input, expr))
}
