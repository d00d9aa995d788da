use crate::polynomial::{Polynomial, PolynomialError};
use crate::traits::{Scalar, UnivariateFunction};
use num_complex::Complex64;
use std::cell::RefCell;
use std::collections::HashMap;
use thiserror::Error;

/// Largest integer exponent accepted in `x^n`.
pub const MAX_EXPONENT: u32 = 64;

/// Largest degree an expression may expand to, however its powers and products nest.
pub const MAX_DEGREE: usize = 64;

/// Deepest nesting of parentheses, unary signs, powers and operator chains the parser accepts.
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("Unexpected character '{character}' at position {position}.")]
    UnexpectedCharacter { character: char, position: usize },
    #[error("Invalid number literal '{0}'.")]
    InvalidNumber(String),
    #[error("Unexpected token {0}.")]
    UnexpectedToken(String),
    #[error("Unexpected end of input.")]
    UnexpectedEnd,
    #[error("Expected ')'.")]
    ExpectedClosingParen,
    #[error("Unexpected trailing input starting at {0}.")]
    TrailingInput(String),
    #[error("Unknown variable or parameter: {0}")]
    UnknownIdentifier(String),
    #[error("Unsupported function: {0}")]
    UnsupportedFunction(String),
    #[error("Expression is not a polynomial: {0}")]
    NotPolynomial(String),
    #[error("Expression expands to degree {degree}, above the limit of {max}.")]
    DegreeTooLarge { degree: usize, max: usize },
    #[error("Expression nests deeper than {0} levels.")]
    TooDeep(usize),
    #[error("Parameter count mismatch. Expected {expected} values, got {got}.")]
    ParameterCountMismatch { expected: usize, got: usize },
    #[error("Parameter index {0} is out of range.")]
    ParameterOutOfRange(usize),
    #[error("Bytecode left the stack unbalanced.")]
    StackUnderflow,
    #[error(transparent)]
    Coefficients(#[from] PolynomialError),
}

/// OpCodes for the stack-based virtual machine.
/// The VM operates on a stack of `Scalar` values (f64 or Complex64).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant onto the stack.
    LoadConst(f64),
    /// Pushes the value of the polynomial variable.
    LoadVar,
    /// Pushes the value of a parameter (by index).
    LoadParam(usize),
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b).
    Div,
    /// Pops top value (a), pushes a^n.
    PowI(u32),
    /// Pops top value (a), pushes -a.
    Neg,
}

/// Represents a compiled sequence of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Stack-based virtual machine for evaluating compiled expressions.
///
/// The VM is stateless; `execute` takes all necessary context:
/// - `bytecode`: Instructions to run.
/// - `x`: Value of the polynomial variable.
/// - `params`: Parameter vector (read-only).
/// - `stack`: A mutable buffer for intermediate computations.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(
        bytecode: &Bytecode,
        x: T,
        params: &[T],
        stack: &mut Vec<T>,
    ) -> Result<T, ExpressionError> {
        stack.clear();

        for op in &bytecode.ops {
            match *op {
                OpCode::LoadConst(val) => stack.push(T::from(val)),
                OpCode::LoadVar => stack.push(x),
                OpCode::LoadParam(idx) => {
                    let value = params
                        .get(idx)
                        .copied()
                        .ok_or(ExpressionError::ParameterOutOfRange(idx))?;
                    stack.push(value);
                }
                OpCode::Add => {
                    let (a, b) = pop_pair(stack)?;
                    stack.push(a + b);
                }
                OpCode::Sub => {
                    let (a, b) = pop_pair(stack)?;
                    stack.push(a - b);
                }
                OpCode::Mul => {
                    let (a, b) = pop_pair(stack)?;
                    stack.push(a * b);
                }
                OpCode::Div => {
                    let (a, b) = pop_pair(stack)?;
                    stack.push(a / b);
                }
                OpCode::PowI(n) => {
                    let a = stack.pop().ok_or(ExpressionError::StackUnderflow)?;
                    stack.push(num_traits::pow(a, n as usize));
                }
                OpCode::Neg => {
                    let a = stack.pop().ok_or(ExpressionError::StackUnderflow)?;
                    stack.push(-a);
                }
            }
        }

        let result = stack.pop().ok_or(ExpressionError::StackUnderflow)?;
        if !stack.is_empty() {
            return Err(ExpressionError::StackUnderflow);
        }
        Ok(result)
    }
}

fn pop_pair<T: Scalar>(stack: &mut Vec<T>) -> Result<(T, T), ExpressionError> {
    let b = stack.pop().ok_or(ExpressionError::StackUnderflow)?;
    let a = stack.pop().ok_or(ExpressionError::StackUnderflow)?;
    Ok((a, b))
}

// --- AST & Parser ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Abstract syntax tree nodes for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Neg(Box<Expr>),
    /// Parsed so that `sin(x)` reports a useful error instead of a syntax error.
    Call(String, Box<Expr>),
}

/// Exponents must be non-negative integer literals, optionally parenthesized.
fn literal_exponent(expr: &Expr) -> Result<u32, ExpressionError> {
    match expr {
        Expr::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_EXPONENT as f64 => {
            Ok(*n as u32)
        }
        Expr::Number(n) => Err(ExpressionError::NotPolynomial(format!(
            "exponent {n} is not an integer between 0 and {MAX_EXPONENT}"
        ))),
        _ => Err(ExpressionError::NotPolynomial(
            "exponents must be integer literals".to_string(),
        )),
    }
}

/// Compiles an AST (`Expr`) into `Bytecode`.
/// Resolves the variable and parameter names to slots.
pub struct Compiler {
    pub variable: String,
    pub param_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(variable: &str, param_names: &[String]) -> Self {
        let mut param_map = HashMap::new();
        for (i, name) in param_names.iter().enumerate() {
            param_map.insert(name.clone(), i);
        }

        Self {
            variable: variable.to_string(),
            param_map,
        }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode, ExpressionError> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<(), ExpressionError> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => {
                if *name == self.variable {
                    ops.push(OpCode::LoadVar);
                } else if let Some(&idx) = self.param_map.get(name) {
                    ops.push(OpCode::LoadParam(idx));
                } else {
                    return Err(ExpressionError::UnknownIdentifier(name.clone()));
                }
            }
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops)?;
                let code = match op {
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Sub => OpCode::Sub,
                    BinaryOp::Mul => OpCode::Mul,
                    BinaryOp::Div => OpCode::Div,
                    // The exponent is folded into the opcode.
                    BinaryOp::Pow => OpCode::PowI(literal_exponent(right)?),
                };
                if *op != BinaryOp::Pow {
                    self.compile_recursive(right, ops)?;
                }
                ops.push(code);
            }
            Expr::Neg(operand) => {
                self.compile_recursive(operand, ops)?;
                ops.push(OpCode::Neg);
            }
            Expr::Call(func, _) => return Err(ExpressionError::UnsupportedFunction(func.clone())),
        }
        Ok(())
    }
}

// --- Expansion ---

/// Expands an expression into the coefficients of a polynomial in `variable`.
/// Parameters are substituted by value.
pub fn expand(
    expr: &Expr,
    variable: &str,
    param_names: &[String],
    params: &[f64],
) -> Result<Polynomial, ExpressionError> {
    if param_names.len() != params.len() {
        return Err(ExpressionError::ParameterCountMismatch {
            expected: param_names.len(),
            got: params.len(),
        });
    }
    let expanded = expand_recursive(expr, variable, param_names, params)?;
    Ok(Polynomial::new(expanded.coefficients().to_vec())?)
}

fn expand_recursive(
    expr: &Expr,
    variable: &str,
    param_names: &[String],
    params: &[f64],
) -> Result<Polynomial, ExpressionError> {
    let recurse = |e: &Expr| expand_recursive(e, variable, param_names, params);
    match expr {
        Expr::Number(n) => Ok(Polynomial::constant(*n)?),
        Expr::Variable(name) => {
            if name == variable {
                Ok(Polynomial::monomial(1.0, 1)?)
            } else if let Some(idx) = param_names.iter().position(|p| p == name) {
                Ok(Polynomial::constant(params[idx])?)
            } else {
                Err(ExpressionError::UnknownIdentifier(name.clone()))
            }
        }
        Expr::Binary(left, op, right) => match op {
            BinaryOp::Add => Ok(&recurse(left.as_ref())? + &recurse(right.as_ref())?),
            BinaryOp::Sub => Ok(&recurse(left.as_ref())? - &recurse(right.as_ref())?),
            BinaryOp::Mul => {
                let (left, right) = (recurse(left.as_ref())?, recurse(right.as_ref())?);
                check_degree(left.degree() + right.degree())?;
                Ok(&left * &right)
            }
            BinaryOp::Div => {
                let divisor = recurse(right.as_ref())?;
                if divisor.degree() > 0 {
                    return Err(ExpressionError::NotPolynomial(format!(
                        "division by an expression in {variable}"
                    )));
                }
                if divisor.is_zero() {
                    return Err(ExpressionError::NotPolynomial(
                        "division by zero".to_string(),
                    ));
                }
                Ok(recurse(left.as_ref())?.scale(1.0 / divisor.leading_coefficient())?)
            }
            BinaryOp::Pow => {
                let exponent = literal_exponent(right)?;
                let base = recurse(left.as_ref())?;
                check_degree(base.degree() * exponent as usize)?;
                Ok(base.pow(exponent))
            }
        },
        Expr::Neg(operand) => Ok(-recurse(operand.as_ref())?),
        Expr::Call(func, _) => Err(ExpressionError::UnsupportedFunction(func.clone())),
    }
}

fn check_degree(degree: usize) -> Result<(), ExpressionError> {
    if degree > MAX_DEGREE {
        return Err(ExpressionError::DegreeTooLarge {
            degree,
            max: MAX_DEGREE,
        });
    }
    Ok(())
}

// --- Simple Parser ---

/// Parses a string expression into an AST.
///
/// Precedence, loosest first: `+ -`, `* /`, unary `-`, `^` (right associative).
pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ExpressionError::TrailingInput(token.describe())),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("'{n}'"),
            Token::Identifier(name) => format!("'{name}'"),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else if (d == 'e' || d == 'E') && exponent_follows(&input[position..], num_str.len()) {
                    num_str.push(d);
                    chars.next();
                    if let Some(&(_, sign)) = chars.peek() {
                        if sign == '+' || sign == '-' {
                            num_str.push(sign);
                            chars.next();
                        }
                    }
                } else {
                    break;
                }
            }
            let value = num_str
                .parse()
                .map_err(|_| ExpressionError::InvalidNumber(num_str.clone()))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            let token = match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                _ => {
                    return Err(ExpressionError::UnexpectedCharacter {
                        character: c,
                        position,
                    })
                }
            };
            tokens.push(token);
            chars.next();
        }
    }
    Ok(tokens)
}

/// True when the `e` at byte offset `offset` of `literal` starts an exponent (`e5`, `e-3`).
fn exponent_follows(literal: &str, offset: usize) -> bool {
    let mut rest = literal[offset..].chars().skip(1);
    match rest.next() {
        Some(d) if d.is_ascii_digit() => true,
        Some('+') | Some('-') => rest.next().is_some_and(|d| d.is_ascii_digit()),
        _ => false,
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Every recursive path and every chained operator passes through here,
    /// so `depth` bounds both the parser's stack and the height of the tree.
    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ExpressionError::TooDeep(MAX_NESTING));
        }
        Ok(())
    }

    fn parse_expression(&mut self) -> Result<Expr, ExpressionError> {
        let entry_depth = self.depth;
        let mut left = self.parse_term()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.consume();
            self.descend()?;
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        self.depth = entry_depth;
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ExpressionError> {
        let entry_depth = self.depth;
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.consume();
            self.descend()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        self.depth = entry_depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        self.descend()?;
        let expr = match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                Expr::Neg(Box::new(self.parse_unary()?))
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()?
            }
            _ => self.parse_power()?,
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), BinaryOp::Pow, Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume(); // eat '('
                    let arg = self.parse_expression()?;
                    self.expect_closing_paren()?;
                    Ok(Expr::Call(name, Box::new(arg)))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect_closing_paren()?;
                Ok(expr)
            }
            Some(token) => Err(ExpressionError::UnexpectedToken(token.describe())),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn expect_closing_paren(&mut self) -> Result<(), ExpressionError> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err(ExpressionError::ExpectedClosingParen),
        }
    }
}

// --- CompiledExpression ---

/// A compiled expression evaluated through the VM.
/// Keeps the expression exactly as written, so it can check the expanded coefficients.
#[derive(Debug)]
pub struct CompiledExpression<T: Scalar> {
    pub bytecode: Bytecode,
    pub params: Vec<T>,
    degree: usize,
    // Interior mutability for the VM stack to avoid allocation per evaluation.
    // This makes the expression !Sync.
    stack: RefCell<Vec<T>>,
}

impl<T: Scalar> CompiledExpression<T> {
    pub fn new(bytecode: Bytecode, params: Vec<T>, degree: usize) -> Self {
        Self {
            bytecode,
            params,
            degree,
            stack: RefCell::new(Vec::with_capacity(32)),
        }
    }

    pub fn try_evaluate(&self, x: T) -> Result<T, ExpressionError> {
        let mut stack = self.stack.borrow_mut();
        VM::execute(&self.bytecode, x, &self.params, &mut stack)
    }
}

impl<T: Scalar> UnivariateFunction<T> for CompiledExpression<T> {
    fn degree(&self) -> usize {
        self.degree
    }

    /// Malformed bytecode evaluates to NaN.
    fn evaluate(&self, x: T) -> T {
        self.try_evaluate(x).unwrap_or_else(|_| T::from(f64::NAN))
    }
}

// --- PolynomialExpression ---

/// A polynomial given as text, kept both expanded and compiled.
#[derive(Debug)]
pub struct PolynomialExpression {
    pub source: String,
    pub variable: String,
    pub polynomial: Polynomial,
    pub compiled: CompiledExpression<Complex64>,
}

impl PolynomialExpression {
    pub fn parse(
        source: &str,
        variable: &str,
        param_names: &[String],
        params: &[f64],
    ) -> Result<Self, ExpressionError> {
        let expr = parse(source)?;
        let polynomial = expand(&expr, variable, param_names, params)?;
        let bytecode = Compiler::new(variable, param_names).compile(&expr)?;
        let compiled = CompiledExpression::new(
            bytecode,
            params.iter().map(|&p| Complex64::from(p)).collect(),
            polynomial.degree(),
        );

        Ok(Self {
            source: source.to_string(),
            variable: variable.to_string(),
            polynomial,
            compiled,
        })
    }
}

impl UnivariateFunction<Complex64> for PolynomialExpression {
    fn degree(&self) -> usize {
        self.polynomial.degree()
    }

    fn evaluate(&self, x: Complex64) -> Complex64 {
        self.compiled.evaluate(x)
    }
}

/// Parses `source` and expands it into a polynomial in `variable`.
pub fn parse_polynomial(
    source: &str,
    variable: &str,
    param_names: &[String],
    params: &[f64],
) -> Result<Polynomial, ExpressionError> {
    let expr = parse(source)?;
    expand(&expr, variable, param_names, params)
}
