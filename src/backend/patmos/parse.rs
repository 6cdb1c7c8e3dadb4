//! # Assembly Reader
//!
//! Reads the assembly printed by [MContext::display] back into a machine
//! context.
//!
//! ```ebnf
//! REG -> r"\$(r|p|s)[0-9]+" | "$srb" | "$sro"
//! IDENT -> r"[a-zA-Z_.][a-zA-Z0-9_.]*"
//! NUMBER -> r"[0-9]+" | r"0x[0-9a-fA-F]+"
//! IMM -> "-"? NUMBER | IDENT
//! GUARD -> "(" "!"? REG ")"
//! ADDR -> "[" REG (("+" | "-") IMM)? "]" | "[" IMM "]"
//! INST -> "{"? GUARD? MNEMONIC OPERANDS "}"?
//! LINE -> LABEL ":" | DIRECTIVE | INST (";" INST)*
//! ```
//!
//! `.type NAME, @function` announces a function, and the following `NAME:`
//! opens it. Every other label opens a block in the current function. A label
//! seen outside of any function opens a function. Instructions before the
//! first block label of a function go into a block named after the function.
//! Other directives are ignored.

use thiserror::Error;

use super::{
    inst::{AluOp, CmpOp, Guard, Imm, LoadOp, PatmosInst, StoreOp},
    regs,
};
use crate::backend::{
    block::MBlock,
    bundle::Bundle,
    context::MContext,
    func::{MFunc, MLabel},
    regs::{PReg, RegKind},
    schedule::ScheduleError,
};

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),

    #[error("invalid register `{0}`")]
    InvalidRegister(String),

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),

    #[error("expected a {expected:?} register, found {found}")]
    RegisterKind { expected: RegKind, found: PReg },

    #[error("instruction outside of a function")]
    NoFunction,

    #[error("unbalanced bundle delimiter")]
    UnbalancedBundle,

    #[error(transparent)]
    Bundle(#[from] ScheduleError),
}

#[derive(Debug, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

/// Parse an assembly file.
pub fn parse(src: &str) -> Result<MContext<PatmosInst>, ParseError> {
    let mut reader = Reader::default();
    let mut last_line = 0;

    for (idx, line) in src.lines().enumerate() {
        last_line = idx + 1;
        reader
            .read_line(line)
            .map_err(|kind| ParseError { line: idx + 1, kind })?;
    }

    if reader.open_bundle.is_some() {
        return Err(ParseError {
            line: last_line,
            kind: ParseErrorKind::UnbalancedBundle,
        });
    }

    Ok(reader.mctx)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Reg(PReg),
    Number(i64),
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Equal,
    Plus,
    Minus,
    Bang,
    Semicolon,
}

impl Token {
    fn describe(token: Option<&Token>) -> String {
        match token {
            Some(Token::Ident(ident)) => format!("`{}`", ident),
            Some(Token::Reg(reg)) => format!("`{}`", reg),
            Some(Token::Number(value)) => format!("`{}`", value),
            Some(token) => format!("{:?}", token),
            None => "end of line".to_string(),
        }
    }
}

/// Drop `#` and `//` comments.
fn strip_comment(line: &str) -> &str {
    let end = [line.find('#'), line.find("//")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    &line[..end]
}

fn is_ident_start(c: char) -> bool { c.is_ascii_alphabetic() || c == '_' || c == '.' }

fn is_ident_char(c: char) -> bool { c.is_ascii_alphanumeric() || c == '_' || c == '.' }

/// The label defined by `line`, if it is a label, and the rest of the line.
fn split_label(line: &str) -> Option<(&str, &str)> {
    let (label, rest) = line.split_once(':')?;
    let mut chars = label.chars();
    if chars.next().is_some_and(is_ident_start) && chars.all(is_ident_char) {
        Some((label, rest))
    } else {
        None
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self { Self { src, pos: 0 } }

    fn curr_char(&self) -> Option<char> { self.src[self.pos..].chars().next() }

    fn next_char(&mut self) {
        if let Some(c) = self.curr_char() {
            self.pos += c.len_utf8();
        }
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.curr_char().is_some_and(&f) {
            self.next_char();
        }
        &self.src[start..self.pos]
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ParseErrorKind> {
        let mut tokens = Vec::new();

        while let Some(c) = self.curr_char() {
            if c.is_whitespace() {
                self.next_char();
                continue;
            }

            let token = match c {
                '$' => self.handle_reg()?,
                '0'..='9' => self.handle_number()?,
                c if is_ident_start(c) => Token::Ident(self.take_while(is_ident_char).to_string()),
                _ => {
                    self.next_char();
                    match c {
                        '{' => Token::LeftBrace,
                        '}' => Token::RightBrace,
                        '(' => Token::LeftParen,
                        ')' => Token::RightParen,
                        '[' => Token::LeftBracket,
                        ']' => Token::RightBracket,
                        ',' => Token::Comma,
                        '=' => Token::Equal,
                        '+' => Token::Plus,
                        '-' => Token::Minus,
                        '!' => Token::Bang,
                        ';' => Token::Semicolon,
                        _ => return Err(ParseErrorKind::UnexpectedChar(c)),
                    }
                }
            };
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn handle_reg(&mut self) -> Result<Token, ParseErrorKind> {
        self.next_char();
        let name = self.take_while(|c| c.is_ascii_alphanumeric());
        regs::parse(name)
            .map(Token::Reg)
            .ok_or_else(|| ParseErrorKind::InvalidRegister(format!("${}", name)))
    }

    fn handle_number(&mut self) -> Result<Token, ParseErrorKind> {
        let text = self.take_while(|c| c.is_ascii_alphanumeric());
        let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16),
            None => text.parse::<i64>(),
        };
        value
            .map(Token::Number)
            .map_err(|_| ParseErrorKind::InvalidNumber(text.to_string()))
    }
}

/// Cursor over the tokens of one line.
struct Tokens {
    tokens: Vec<Token>,
    pos: usize,
}

impl Tokens {
    fn peek(&self) -> Option<&Token> { self.tokens.get(self.pos) }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// Consume the next token if it is `token`.
    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseErrorKind {
        ParseErrorKind::UnexpectedToken {
            expected,
            found: Token::describe(self.peek()),
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), ParseErrorKind> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_reg(&mut self, kind: RegKind) -> Result<PReg, ParseErrorKind> {
        match self.peek() {
            Some(&Token::Reg(reg)) => {
                self.pos += 1;
                if reg.kind() == kind {
                    Ok(reg)
                } else {
                    Err(ParseErrorKind::RegisterKind {
                        expected: kind,
                        found: reg,
                    })
                }
            }
            _ => Err(self.unexpected("a register")),
        }
    }

    fn expect_imm(&mut self) -> Result<Imm, ParseErrorKind> {
        let negative = self.eat(&Token::Minus);
        match self.peek().cloned() {
            Some(Token::Number(value)) => {
                self.pos += 1;
                Ok(Imm::Value(if negative { -value } else { value }))
            }
            Some(Token::Ident(ident)) if !negative => {
                self.pos += 1;
                Ok(Imm::Sym(MLabel::from(ident)))
            }
            _ => Err(self.unexpected("an immediate")),
        }
    }

    /// `[REG (+|- IMM)?]` or `[IMM]`, the latter based on `r0`.
    fn expect_addr(&mut self) -> Result<(PReg, Imm), ParseErrorKind> {
        self.expect(Token::LeftBracket, "`[`")?;

        let addr = if let Some(Token::Reg(_)) = self.peek() {
            let base = self.expect_reg(RegKind::General)?;
            let offset = if self.eat(&Token::Plus) {
                self.expect_imm()?
            } else if self.eat(&Token::Minus) {
                match self.expect_imm()? {
                    Imm::Value(value) => Imm::Value(-value),
                    Imm::Sym(_) => return Err(self.unexpected("a number")),
                }
            } else {
                Imm::Value(0)
            };
            (base, offset)
        } else {
            (regs::zero(), self.expect_imm()?)
        };

        self.expect(Token::RightBracket, "`]`")?;
        Ok(addr)
    }

    /// `REG = REG, REG` with the destination of kind `dst`.
    fn expect_rrr(&mut self, dst: RegKind) -> Result<(PReg, PReg, PReg), ParseErrorKind> {
        let rd = self.expect_reg(dst)?;
        self.expect(Token::Equal, "`=`")?;
        let rs1 = self.expect_reg(RegKind::General)?;
        self.expect(Token::Comma, "`,`")?;
        let rs2 = self.expect_reg(RegKind::General)?;
        Ok((rd, rs1, rs2))
    }
}

fn alu_op(name: &str) -> Option<AluOp> {
    let op = match name {
        "add" => AluOp::Add,
        "sub" => AluOp::Sub,
        "xor" => AluOp::Xor,
        "or" => AluOp::Or,
        "and" => AluOp::And,
        "nor" => AluOp::Nor,
        "sl" => AluOp::Sl,
        "sr" => AluOp::Sr,
        "sra" => AluOp::Sra,
        _ => return None,
    };
    Some(op)
}

fn cmp_op(name: &str) -> Option<CmpOp> {
    let op = match name {
        "cmpeq" => CmpOp::Eq,
        "cmpneq" => CmpOp::Neq,
        "cmplt" => CmpOp::Lt,
        "cmple" => CmpOp::Le,
        "cmpult" => CmpOp::Ult,
        "cmpule" => CmpOp::Ule,
        _ => return None,
    };
    Some(op)
}

fn load_op(name: &str) -> Option<LoadOp> {
    let op = match name {
        "lwc" => LoadOp::Lwc,
        "lhc" => LoadOp::Lhc,
        "lbc" => LoadOp::Lbc,
        "lhuc" => LoadOp::Lhuc,
        "lbuc" => LoadOp::Lbuc,
        _ => return None,
    };
    Some(op)
}

fn store_op(name: &str) -> Option<StoreOp> {
    let op = match name {
        "swc" => StoreOp::Swc,
        "shc" => StoreOp::Shc,
        "sbc" => StoreOp::Sbc,
        _ => return None,
    };
    Some(op)
}

#[derive(Default)]
struct Reader {
    mctx: MContext<PatmosInst>,
    /// Announced by `.type NAME, @function`, opened by `NAME:`.
    pending_func: Option<String>,
    curr_func: Option<MFunc<PatmosInst>>,
    curr_block: Option<MBlock<PatmosInst>>,
    /// A bundle whose closing `}` has not been seen yet.
    open_bundle: Option<Bundle<PatmosInst>>,
}

impl Reader {
    fn read_line(&mut self, line: &str) -> Result<(), ParseErrorKind> {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            return Ok(());
        }

        let line = if let Some((label, rest)) = split_label(line) {
            self.open_label(label)?;
            rest.trim()
        } else if line.starts_with('.') {
            self.read_directive(line);
            return Ok(());
        } else {
            line
        };

        if line.is_empty() {
            return Ok(());
        }

        let mut tokens = Tokens {
            tokens: Lexer::new(line).tokenize()?,
            pos: 0,
        };

        loop {
            self.read_inst(&mut tokens)?;
            if tokens.peek().is_none() {
                break;
            }
            tokens.expect(Token::Semicolon, "`;`")?;
            if tokens.peek().is_none() {
                break;
            }
        }

        Ok(())
    }

    fn read_directive(&mut self, line: &str) {
        let Some(rest) = line.strip_prefix(".type") else {
            return;
        };
        let mut parts = rest.split(',').map(str::trim);
        if let (Some(name), Some("@function")) = (parts.next(), parts.next()) {
            self.pending_func = Some(name.to_string());
        }
    }

    fn open_label(&mut self, label: &str) -> Result<(), ParseErrorKind> {
        if self.open_bundle.is_some() {
            return Err(ParseErrorKind::UnbalancedBundle);
        }

        match self.curr_func {
            Some(func) if self.pending_func.as_deref() != Some(label) => {
                let block = MBlock::new(&mut self.mctx, label);
                func.push_back(&mut self.mctx, block);
                self.curr_block = Some(block);
            }
            _ => {
                self.pending_func = None;
                self.curr_func = Some(MFunc::new(&mut self.mctx, label));
                self.curr_block = None;
            }
        }

        Ok(())
    }

    /// The block instructions are appended to, created on demand for
    /// instructions right after the function label.
    fn block(&mut self) -> Result<MBlock<PatmosInst>, ParseErrorKind> {
        if let Some(block) = self.curr_block {
            return Ok(block);
        }
        let func = self.curr_func.ok_or(ParseErrorKind::NoFunction)?;
        let label = func.label(&self.mctx).clone();
        let block = MBlock::new(&mut self.mctx, label);
        func.push_back(&mut self.mctx, block);
        self.curr_block = Some(block);
        Ok(block)
    }

    fn read_inst(&mut self, tokens: &mut Tokens) -> Result<(), ParseErrorKind> {
        let block = self.block()?;

        if tokens.eat(&Token::LeftBrace) {
            if self.open_bundle.is_some() {
                return Err(ParseErrorKind::UnbalancedBundle);
            }
            self.open_bundle = Some(Bundle::new());
        }

        let guard = if tokens.eat(&Token::LeftParen) {
            let negated = tokens.eat(&Token::Bang);
            let reg = tokens.expect_reg(RegKind::Predicate)?;
            tokens.expect(Token::RightParen, "`)`")?;
            Guard::new(reg, negated)
        } else {
            Guard::default()
        };

        let inst = self.read_op(tokens)?.set_guard(&mut self.mctx, guard);

        let closes = tokens.eat(&Token::RightBrace);
        match self.open_bundle.as_mut() {
            Some(bundle) => {
                bundle.push(inst)?;
                if closes {
                    let bundle = *bundle;
                    self.open_bundle = None;
                    block.push_bundle(&mut self.mctx, bundle);
                }
            }
            None if closes => return Err(ParseErrorKind::UnbalancedBundle),
            None => block.push_back(&mut self.mctx, inst),
        }

        Ok(())
    }

    fn read_op(&mut self, tokens: &mut Tokens) -> Result<PatmosInst, ParseErrorKind> {
        let mnemonic = match tokens.next() {
            Some(Token::Ident(mnemonic)) => mnemonic,
            token => {
                return Err(ParseErrorKind::UnexpectedToken {
                    expected: "a mnemonic",
                    found: Token::describe(token.as_ref()),
                })
            }
        };
        let mctx = &mut self.mctx;

        if let Some(op) = alu_op(&mnemonic) {
            let (rd, rs1, rs2) = tokens.expect_rrr(RegKind::General)?;
            return Ok(PatmosInst::build_alu_r(mctx, op, rd, rs1, rs2));
        }
        if let Some(op) = mnemonic
            .strip_suffix('i')
            .and_then(alu_op)
            .filter(AluOp::has_imm_form)
        {
            let rd = tokens.expect_reg(RegKind::General)?;
            tokens.expect(Token::Equal, "`=`")?;
            let rs1 = tokens.expect_reg(RegKind::General)?;
            tokens.expect(Token::Comma, "`,`")?;
            let imm = tokens.expect_imm()?;
            return Ok(PatmosInst::build_alu_i(mctx, op, rd, rs1, imm));
        }
        if let Some(op) = cmp_op(&mnemonic) {
            let (pd, rs1, rs2) = tokens.expect_rrr(RegKind::Predicate)?;
            return Ok(PatmosInst::build_cmp(mctx, op, pd, rs1, rs2));
        }
        if let Some(op) = load_op(&mnemonic) {
            let rd = tokens.expect_reg(RegKind::General)?;
            tokens.expect(Token::Equal, "`=`")?;
            let (base, offset) = tokens.expect_addr()?;
            return Ok(PatmosInst::build_load(mctx, op, rd, base, offset));
        }
        if let Some(op) = store_op(&mnemonic) {
            let (base, offset) = tokens.expect_addr()?;
            tokens.expect(Token::Equal, "`=`")?;
            let rs = tokens.expect_reg(RegKind::General)?;
            return Ok(PatmosInst::build_store(mctx, op, base, offset, rs));
        }

        let inst = match mnemonic.as_str() {
            "li" => {
                let rd = tokens.expect_reg(RegKind::General)?;
                tokens.expect(Token::Equal, "`=`")?;
                let imm = tokens.expect_imm()?;
                PatmosInst::build_li(mctx, rd, imm)
            }
            "mul" => {
                let (rd, rs1, rs2) = tokens.expect_rrr(RegKind::General)?;
                PatmosInst::build_mul(mctx, rd, rs1, rs2)
            }
            "br" | "brnd" => {
                let target = tokens.expect_imm()?;
                PatmosInst::build_br(mctx, target, mnemonic == "br")
            }
            "call" | "callnd" => {
                let target = tokens.expect_imm()?;
                PatmosInst::build_call(mctx, target, mnemonic == "call")
            }
            "ret" => PatmosInst::build_ret(mctx, true),
            "retnd" => PatmosInst::build_ret(mctx, false),
            "nop" => PatmosInst::build_nop(mctx),
            _ => return Err(ParseErrorKind::UnknownMnemonic(mnemonic)),
        };

        Ok(inst)
    }
}
