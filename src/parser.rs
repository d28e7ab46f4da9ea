// ABOUTME: Pratt-style expression parser turning the token stream into an AST

use crate::ast::{
    AssignOp, BinOp, ClosureExpr, ClosureStyle, CollectOp, DictKey, ExistsKey, Expr, ExprKind,
    LoopCheck, ParamSpec, PipeRhs, Program, SourceLocation, StrPart, UnOp,
};
use crate::error::{codes, RillError};
use crate::lexer::{lex, Reserved, StringSegment, Token, TokenKind};
use std::rc::Rc;

/// Parse rill source text into a [`Program`].
pub fn parse(source: &str) -> Result<Program, RillError> {
    let tokens = lex(source)?;
    Parser::new(tokens).parse_program()
}

// Binding powers, lowest to highest. The operator with the lowest power
// sits highest in the tree.
const BP_PIPE: u8 = 1;
const BP_ASSIGN: u8 = 2;
const BP_TERNARY: u8 = 3;
const BP_OR: u8 = 4;
const BP_AND: u8 = 5;
const BP_EQ: u8 = 6;
const BP_CMP: u8 = 7;
const BP_COALESCE: u8 = 8;
const BP_ADD: u8 = 9;
const BP_MUL: u8 = 10;

/// Whether `break` / `continue` are legal in the current lexical position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopCtx {
    Allowed,
    Forbidden,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    loops: Vec<LoopCtx>,
    eof_loc: SourceLocation,
}

type PResult<T> = Result<T, RillError>;

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        let eof_loc = tokens
            .last()
            .map(|t| t.loc)
            .unwrap_or(SourceLocation { line: 1, column: 1 });
        Parser {
            tokens,
            pos: 0,
            loops: Vec::new(),
            eof_loc,
        }
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek2_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos + 1).map(|t| &t.kind)
    }

    fn here(&self) -> SourceLocation {
        self.tokens
            .get(self.pos)
            .map(|t| t.loc)
            .unwrap_or(self.eof_loc)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        tok
    }

    fn advance_or_eof(&mut self, what: &str) -> PResult<Token> {
        if self.at_eof() {
            return Err(RillError::parse(
                codes::UNEXPECTED_EOF,
                format!("unexpected end of input, expected {}", what),
                self.eof_loc,
            ));
        }
        Ok(self.advance())
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<Token> {
        if self.at_eof() {
            return Err(RillError::parse(
                codes::UNEXPECTED_EOF,
                format!("unexpected end of input, expected {}", what),
                self.eof_loc,
            ));
        }
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(RillError::parse(
                codes::UNEXPECTED_TOKEN,
                format!("expected {}", what),
                self.here(),
            ))
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.pos += 1;
        }
    }

    // ------------------------------------------------------------------
    // Program structure
    // ------------------------------------------------------------------

    fn parse_program(&mut self) -> PResult<Program> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.at_eof() {
            statements.push(self.parse_statement()?);
            match self.peek_kind() {
                None => break,
                Some(TokenKind::Newline) => self.skip_newlines(),
                Some(_) => {
                    return Err(RillError::parse(
                        codes::UNEXPECTED_TOKEN,
                        "expected end of statement",
                        self.here(),
                    ));
                }
            }
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> PResult<Expr> {
        self.parse_expr(BP_PIPE)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expr(&mut self, min_bp: u8) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some(kind) = self.peek_kind() else { break };
            let bp = match kind {
                TokenKind::Arrow => BP_PIPE,
                TokenKind::Capture | TokenKind::FatArrow | TokenKind::CondCapture => BP_ASSIGN,
                TokenKind::Question => BP_TERNARY,
                TokenKind::PipePipe => BP_OR,
                TokenKind::AmpAmp => BP_AND,
                TokenKind::EqEq | TokenKind::BangEq => BP_EQ,
                TokenKind::Lt | TokenKind::Gt | TokenKind::Le | TokenKind::Ge => BP_CMP,
                TokenKind::Coalesce => BP_COALESCE,
                TokenKind::Plus | TokenKind::Minus => BP_ADD,
                TokenKind::Star | TokenKind::Slash | TokenKind::Percent => BP_MUL,
                _ => break,
            };
            if bp < min_bp {
                break;
            }
            let loc = lhs.loc;
            let op_tok = self.advance();
            match &op_tok.kind {
                TokenKind::Arrow => {
                    if matches!(lhs.kind, ExprKind::Pass) {
                        return Err(RillError::parse(
                            codes::RESERVED_WORD,
                            "'pass' cannot be the source of a pipe",
                            lhs.loc,
                        ));
                    }
                    let rhs = self.parse_pipe_rhs()?;
                    lhs = Expr::new(
                        ExprKind::Pipe {
                            lhs: Box::new(lhs),
                            rhs,
                        },
                        loc,
                    );
                }
                TokenKind::Capture | TokenKind::FatArrow | TokenKind::CondCapture => {
                    self.skip_newlines();
                    let target = self.advance_or_eof("a variable")?;
                    let name = match target.kind {
                        TokenKind::Var(name) => name,
                        _ => {
                            return Err(RillError::parse(
                                codes::BAD_ASSIGN_TARGET,
                                "assignment target must be a variable",
                                target.loc,
                            ));
                        }
                    };
                    if name == "$" || name == "$@" {
                        return Err(RillError::parse(
                            codes::BAD_ASSIGN_TARGET,
                            format!("cannot assign to '{}'", name),
                            target.loc,
                        ));
                    }
                    let op = if op_tok.kind == TokenKind::CondCapture {
                        AssignOp::CondCapture
                    } else {
                        AssignOp::Capture
                    };
                    lhs = Expr::new(
                        ExprKind::Assign {
                            name,
                            value: Box::new(lhs),
                            op,
                        },
                        loc,
                    );
                }
                TokenKind::Question => {
                    self.skip_newlines();
                    let then_branch = self.parse_expr(BP_TERNARY + 1)?;
                    let else_branch = if self.eat(&TokenKind::Bang) {
                        self.skip_newlines();
                        Some(Box::new(self.parse_expr(BP_TERNARY + 1)?))
                    } else {
                        None
                    };
                    lhs = Expr::new(
                        ExprKind::Ternary {
                            cond: Box::new(lhs),
                            then_branch: Box::new(then_branch),
                            else_branch,
                        },
                        loc,
                    );
                }
                TokenKind::Coalesce => {
                    self.skip_newlines();
                    let rhs = self.parse_expr(BP_COALESCE + 1)?;
                    lhs = Expr::new(
                        ExprKind::Coalesce {
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        loc,
                    );
                }
                other => {
                    let op = match other {
                        TokenKind::PipePipe => BinOp::Or,
                        TokenKind::AmpAmp => BinOp::And,
                        TokenKind::EqEq => BinOp::Eq,
                        TokenKind::BangEq => BinOp::Ne,
                        TokenKind::Lt => BinOp::Lt,
                        TokenKind::Gt => BinOp::Gt,
                        TokenKind::Le => BinOp::Le,
                        TokenKind::Ge => BinOp::Ge,
                        TokenKind::Plus => BinOp::Add,
                        TokenKind::Minus => BinOp::Sub,
                        TokenKind::Star => BinOp::Mul,
                        TokenKind::Slash => BinOp::Div,
                        TokenKind::Percent => BinOp::Mod,
                        _ => unreachable!(),
                    };
                    self.skip_newlines();
                    let rhs = self.parse_expr(bp + 1)?;
                    lhs = Expr::new(
                        ExprKind::Binary {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        loc,
                    );
                }
            }
        }
        Ok(lhs)
    }

    // ------------------------------------------------------------------
    // Pipe right-hand sides
    // ------------------------------------------------------------------

    fn parse_pipe_rhs(&mut self) -> PResult<PipeRhs> {
        self.skip_newlines();
        let Some(kind) = self.peek_kind() else {
            return Err(RillError::parse(
                codes::UNEXPECTED_EOF,
                "unexpected end of input after '->'",
                self.eof_loc,
            ));
        };
        match kind {
            TokenKind::LBrace => {
                let stmts = self.parse_brace_block()?;
                Ok(PipeRhs::Block(stmts))
            }
            TokenKind::Reserved(Reserved::Each) => self.parse_collect(CollectOp::Each),
            TokenKind::Reserved(Reserved::Map) => self.parse_collect(CollectOp::Map),
            TokenKind::Reserved(Reserved::Filter) => self.parse_collect(CollectOp::Filter),
            TokenKind::Reserved(Reserved::Fold) => self.parse_collect(CollectOp::Fold),
            TokenKind::Reserved(Reserved::Error) => {
                // `x -> error "msg"` raises eagerly via the literal form;
                // bare `-> error` pipes the incoming value into the sink
                if matches!(self.peek2_kind(), Some(TokenKind::Str(_))) {
                    let e = self.parse_expr(BP_ASSIGN)?;
                    Ok(PipeRhs::Expr(Box::new(e)))
                } else {
                    self.advance();
                    Ok(PipeRhs::ErrorSink)
                }
            }
            TokenKind::At => {
                self.advance();
                let body = self.parse_loop_body()?;
                self.skip_newlines();
                self.expect(&TokenKind::Question, "'?' before the loop condition")?;
                let cond = self.parse_paren_cond()?;
                Ok(PipeRhs::Loop {
                    check: LoopCheck::Post,
                    cond: Box::new(cond),
                    body,
                })
            }
            TokenKind::AtQuestion => {
                self.advance();
                let body = self.parse_loop_body()?;
                self.skip_newlines();
                let cond = self.parse_paren_cond()?;
                Ok(PipeRhs::Loop {
                    check: LoopCheck::Post,
                    cond: Box::new(cond),
                    body,
                })
            }
            TokenKind::QuestionAt => {
                self.advance();
                let cond = self.parse_paren_cond()?;
                self.skip_newlines();
                let body = self.parse_loop_body()?;
                Ok(PipeRhs::Loop {
                    check: LoopCheck::Pre,
                    cond: Box::new(cond),
                    body,
                })
            }
            _ => {
                let e = self.parse_expr(BP_ASSIGN)?;
                if self.eat(&TokenKind::At) {
                    let body = self.parse_loop_body()?;
                    Ok(PipeRhs::Loop {
                        check: LoopCheck::Pre,
                        cond: Box::new(e),
                        body,
                    })
                } else {
                    Ok(PipeRhs::Expr(Box::new(e)))
                }
            }
        }
    }

    fn parse_paren_cond(&mut self) -> PResult<Expr> {
        self.skip_newlines();
        self.expect(&TokenKind::LParen, "'(' around the loop condition")?;
        self.skip_newlines();
        let cond = self.parse_expr(BP_PIPE)?;
        self.skip_newlines();
        self.expect(&TokenKind::RParen, "')' after the loop condition")?;
        Ok(cond)
    }

    fn parse_loop_body(&mut self) -> PResult<Vec<Expr>> {
        self.skip_newlines();
        self.loops.push(LoopCtx::Allowed);
        let body = self.parse_brace_block();
        self.loops.pop();
        body
    }

    fn parse_collect(&mut self, op: CollectOp) -> PResult<PipeRhs> {
        let op_tok = self.advance();
        let mut seed: Option<Expr> = None;
        let mut body: Option<Expr> = None;

        // `each(seed)` / `fold(seed)`: a parenthesized expression right after
        // the operator is a seed when a body form follows, otherwise it is a
        // grouped body.
        if matches!(op, CollectOp::Each | CollectOp::Fold) && self.check(&TokenKind::LParen) {
            self.advance();
            self.skip_newlines();
            let e = self.parse_expr(BP_PIPE)?;
            self.skip_newlines();
            self.expect(&TokenKind::RParen, "')' after seed")?;
            if self.peek_is_body_start() {
                seed = Some(e);
            } else {
                body = Some(e);
            }
        }

        if op == CollectOp::Fold && seed.is_none() {
            return Err(RillError::parse(
                codes::UNEXPECTED_TOKEN,
                "fold requires a seed: fold(seed) { body }",
                op_tok.loc,
            ));
        }

        let body = match body {
            Some(b) => b,
            None => self.parse_op_body(op)?,
        };
        Ok(PipeRhs::Collect {
            op,
            seed: seed.map(Box::new),
            body: Box::new(body),
        })
    }

    fn peek_is_body_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::LBrace
                    | TokenKind::Pipe
                    | TokenKind::PipePipe
                    | TokenKind::Var(_)
                    | TokenKind::Dot
                    | TokenKind::LParen
            )
        )
    }

    /// Operator bodies: `{ … }`, `|p| expr`, `( … )`, `.method` shorthand,
    /// bare `$`, or a variable holding a closure.
    fn parse_op_body(&mut self, op: CollectOp) -> PResult<Expr> {
        self.loops.push(if op == CollectOp::Each {
            LoopCtx::Allowed
        } else {
            LoopCtx::Forbidden
        });
        let result = self.parse_op_body_inner(op);
        self.loops.pop();
        result
    }

    fn parse_op_body_inner(&mut self, op: CollectOp) -> PResult<Expr> {
        self.skip_newlines();
        let loc = self.here();
        match self.peek_kind() {
            Some(TokenKind::LBrace) => {
                let stmts = self.parse_brace_block()?;
                Ok(Expr::new(
                    ExprKind::Closure(ClosureExpr {
                        params: Vec::new(),
                        body: Rc::new(stmts),
                        style: ClosureStyle::Block,
                        property_style: false,
                    }),
                    loc,
                ))
            }
            Some(TokenKind::Pipe) => self.parse_param_closure(),
            Some(TokenKind::PipePipe) => self.parse_zero_closure(),
            Some(TokenKind::LParen) => {
                self.advance();
                self.skip_newlines();
                let e = self.parse_expr(BP_PIPE)?;
                self.skip_newlines();
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(e)
            }
            Some(TokenKind::Dot) => {
                let implicit = Expr::new(ExprKind::Variable("$".to_string()), loc);
                self.parse_postfix_ops(implicit)
            }
            Some(TokenKind::Var(_)) => self.parse_unary(),
            _ => Err(RillError::parse(
                codes::UNEXPECTED_TOKEN,
                format!("expected a body for '{}'", op.name()),
                loc,
            )),
        }
    }

    fn parse_brace_block(&mut self) -> PResult<Vec<Expr>> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            if self.at_eof() {
                return Err(RillError::parse(
                    codes::UNEXPECTED_EOF,
                    "unexpected end of input in block",
                    self.eof_loc,
                ));
            }
            stmts.push(self.parse_statement()?);
            match self.peek_kind() {
                Some(TokenKind::Newline) | Some(TokenKind::RBrace) => {}
                None => {
                    return Err(RillError::parse(
                        codes::UNEXPECTED_EOF,
                        "unexpected end of input in block",
                        self.eof_loc,
                    ));
                }
                Some(_) => {
                    return Err(RillError::parse(
                        codes::UNEXPECTED_TOKEN,
                        "expected newline or '}' after statement",
                        self.here(),
                    ));
                }
            }
        }
        Ok(stmts)
    }

    // ------------------------------------------------------------------
    // Unary, postfix, primary
    // ------------------------------------------------------------------

    fn parse_unary(&mut self) -> PResult<Expr> {
        let loc = self.here();
        if self.eat(&TokenKind::Bang) {
            let expr = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnOp::Not,
                    expr: Box::new(expr),
                },
                loc,
            ));
        }
        if self.eat(&TokenKind::Minus) {
            let expr = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnOp::Neg,
                    expr: Box::new(expr),
                },
                loc,
            ));
        }
        let primary = self.parse_primary()?;
        self.parse_postfix_ops(primary)
    }

    fn parse_postfix_ops(&mut self, mut expr: Expr) -> PResult<Expr> {
        loop {
            let is_postfix = matches!(
                self.peek_kind(),
                Some(
                    TokenKind::Dot
                        | TokenKind::DotQuestion
                        | TokenKind::LBracket
                        | TokenKind::LParen
                )
            );
            if !is_postfix {
                break;
            }
            if matches!(expr.kind, ExprKind::Pass) {
                return Err(RillError::parse(
                    codes::RESERVED_WORD,
                    "'pass' cannot be used as a receiver or callee",
                    expr.loc,
                ));
            }
            let loc = expr.loc;
            match self.peek_kind().unwrap() {
                TokenKind::Dot => {
                    self.advance();
                    match self.peek_kind().cloned() {
                        Some(TokenKind::LParen) => {
                            self.advance();
                            self.skip_newlines();
                            let key = self.parse_expr(BP_PIPE)?;
                            self.skip_newlines();
                            self.expect(&TokenKind::RParen, "')' after computed field")?;
                            expr = Expr::new(
                                ExprKind::ComputedMember {
                                    recv: Box::new(expr),
                                    key: Box::new(key),
                                },
                                loc,
                            );
                        }
                        Some(TokenKind::Ident(name)) => {
                            self.advance();
                            let args = if self.check(&TokenKind::LParen) {
                                Some(self.parse_args()?)
                            } else {
                                None
                            };
                            expr = Expr::new(
                                ExprKind::Member {
                                    recv: Box::new(expr),
                                    name,
                                    args,
                                },
                                loc,
                            );
                        }
                        Some(TokenKind::Reserved(r)) => {
                            self.advance();
                            let args = if self.check(&TokenKind::LParen) {
                                Some(self.parse_args()?)
                            } else {
                                None
                            };
                            expr = Expr::new(
                                ExprKind::Member {
                                    recv: Box::new(expr),
                                    name: r.as_str().to_string(),
                                    args,
                                },
                                loc,
                            );
                        }
                        _ => {
                            return Err(RillError::parse(
                                codes::UNEXPECTED_TOKEN,
                                "expected member name after '.'",
                                self.here(),
                            ));
                        }
                    }
                }
                TokenKind::DotQuestion => {
                    self.advance();
                    let key = match self.peek_kind().cloned() {
                        Some(TokenKind::Ident(name)) => {
                            self.advance();
                            ExistsKey::Static(name)
                        }
                        Some(TokenKind::Reserved(r)) => {
                            self.advance();
                            ExistsKey::Static(r.as_str().to_string())
                        }
                        Some(TokenKind::Var(name)) if name != "$" && name != "$@" => {
                            self.advance();
                            ExistsKey::Var(name)
                        }
                        Some(TokenKind::LParen) => {
                            self.advance();
                            self.skip_newlines();
                            let e = self.parse_expr(BP_PIPE)?;
                            self.skip_newlines();
                            self.expect(&TokenKind::RParen, "')' after computed key")?;
                            ExistsKey::Computed(Box::new(e))
                        }
                        _ => {
                            return Err(RillError::parse(
                                codes::UNEXPECTED_TOKEN,
                                "expected key after '.?'",
                                self.here(),
                            ));
                        }
                    };
                    let type_tag = if self.eat(&TokenKind::Amp) {
                        match self.peek_kind().cloned() {
                            Some(TokenKind::Ident(tag)) => {
                                self.advance();
                                Some(tag)
                            }
                            _ => {
                                return Err(RillError::parse(
                                    codes::UNEXPECTED_TOKEN,
                                    "expected type tag after '&'",
                                    self.here(),
                                ));
                            }
                        }
                    } else {
                        None
                    };
                    expr = Expr::new(
                        ExprKind::Exists {
                            recv: Box::new(expr),
                            key,
                            type_tag,
                        },
                        loc,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_expr(BP_PIPE)?;
                    self.skip_newlines();
                    self.expect(&TokenKind::RBracket, "']' after index")?;
                    expr = Expr::new(
                        ExprKind::Index {
                            recv: Box::new(expr),
                            index: Box::new(index),
                        },
                        loc,
                    );
                }
                TokenKind::LParen => {
                    let args = self.parse_args()?;
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        loc,
                    );
                }
                _ => unreachable!(),
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen, "'('")?;
        self.skip_newlines();
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr(BP_PIPE)?);
            self.skip_newlines();
            if self.eat(&TokenKind::Comma) {
                self.skip_newlines();
                if self.eat(&TokenKind::RParen) {
                    break;
                }
                continue;
            }
            self.expect(&TokenKind::RParen, "')' after arguments")?;
            break;
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let Some(tok) = self.tokens.get(self.pos).cloned() else {
            return Err(RillError::parse(
                codes::UNEXPECTED_EOF,
                "unexpected end of input, expected an expression",
                self.eof_loc,
            ));
        };
        let loc = tok.loc;
        match tok.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Number(n), loc))
            }
            TokenKind::Str(segments) => {
                self.advance();
                let parts = self.convert_string_segments(segments, loc)?;
                Ok(Expr::new(ExprKind::Str(parts), loc))
            }
            TokenKind::Ident(name) => {
                self.advance();
                let kind = match name.as_str() {
                    "true" => ExprKind::Bool(true),
                    "false" => ExprKind::Bool(false),
                    "null" => ExprKind::Null,
                    _ => ExprKind::FunctionRef(name),
                };
                Ok(Expr::new(kind, loc))
            }
            TokenKind::Var(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Variable(name), loc))
            }
            TokenKind::Reserved(Reserved::Pass) => {
                self.advance();
                Ok(Expr::new(ExprKind::Pass, loc))
            }
            TokenKind::Reserved(Reserved::Break) => {
                self.advance();
                self.require_loop_ctx("break", loc)?;
                Ok(Expr::new(ExprKind::Break, loc))
            }
            TokenKind::Reserved(Reserved::Continue) => {
                self.advance();
                self.require_loop_ctx("continue", loc)?;
                Ok(Expr::new(ExprKind::Continue, loc))
            }
            TokenKind::Reserved(Reserved::Error) => {
                self.advance();
                match self.peek_kind().cloned() {
                    Some(TokenKind::Str(segments)) => {
                        self.advance();
                        match segments.as_slice() {
                            [StringSegment::Text(text)] => {
                                Ok(Expr::new(ExprKind::Raise(text.clone()), loc))
                            }
                            _ => Err(RillError::parse(
                                codes::WRONG_LITERAL,
                                "error requires a literal string without interpolation",
                                loc,
                            )),
                        }
                    }
                    _ => Err(RillError::parse(
                        codes::WRONG_LITERAL,
                        "error requires a literal string",
                        loc,
                    )),
                }
            }
            TokenKind::Reserved(r) => Err(RillError::parse(
                codes::RESERVED_WORD,
                format!("reserved word '{}' cannot start an expression", r.as_str()),
                loc,
            )),
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let e = self.parse_expr(BP_PIPE)?;
                self.skip_newlines();
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(e)
            }
            TokenKind::LBrace => {
                let stmts = self.parse_brace_block()?;
                Ok(Expr::new(
                    ExprKind::Closure(ClosureExpr {
                        params: Vec::new(),
                        body: Rc::new(stmts),
                        style: ClosureStyle::Block,
                        property_style: false,
                    }),
                    loc,
                ))
            }
            TokenKind::LBracket => self.parse_bracket_literal(),
            TokenKind::Pipe => self.parse_param_closure(),
            TokenKind::PipePipe => self.parse_zero_closure(),
            other => Err(RillError::parse(
                codes::UNEXPECTED_TOKEN,
                format!("unexpected token {:?}", other),
                loc,
            )),
        }
    }

    fn require_loop_ctx(&self, word: &str, loc: SourceLocation) -> PResult<()> {
        if self.loops.last() == Some(&LoopCtx::Allowed) {
            Ok(())
        } else {
            Err(RillError::parse(
                codes::STRAY_LOOP_CONTROL,
                format!("'{}' outside of a loop or each body", word),
                loc,
            ))
        }
    }

    fn convert_string_segments(
        &self,
        segments: Vec<StringSegment>,
        loc: SourceLocation,
    ) -> PResult<Vec<StrPart>> {
        let mut parts = Vec::new();
        for segment in segments {
            match segment {
                StringSegment::Text(text) => parts.push(StrPart::Text(text)),
                StringSegment::Expr(tokens) => {
                    let mut sub = Parser::new(tokens);
                    let expr = sub.parse_expr(BP_PIPE)?;
                    if !sub.at_eof() {
                        return Err(RillError::parse(
                            codes::BAD_INTERPOLATION,
                            "unexpected token in interpolation",
                            loc,
                        ));
                    }
                    parts.push(StrPart::Interp(Box::new(expr)));
                }
            }
        }
        Ok(parts)
    }

    // ------------------------------------------------------------------
    // Closure literals
    // ------------------------------------------------------------------

    fn parse_param_closure(&mut self) -> PResult<Expr> {
        let loc = self.expect(&TokenKind::Pipe, "'|'")?.loc;
        let mut params = Vec::new();
        self.skip_newlines();
        if !self.check(&TokenKind::Pipe) {
            loop {
                let name_tok = self.advance_or_eof("a parameter name")?;
                let name = match name_tok.kind {
                    TokenKind::Ident(n) => n,
                    _ => {
                        return Err(RillError::parse(
                            codes::UNEXPECTED_TOKEN,
                            "expected parameter name",
                            name_tok.loc,
                        ));
                    }
                };
                let default = if self.eat(&TokenKind::Eq) {
                    Some(self.parse_expr(BP_TERNARY)?)
                } else {
                    None
                };
                params.push(ParamSpec { name, default });
                self.skip_newlines();
                if self.eat(&TokenKind::Comma) {
                    self.skip_newlines();
                    continue;
                }
                break;
            }
        }
        self.expect(&TokenKind::Pipe, "closing '|' after parameters")?;
        self.skip_newlines();
        let body = if self.check(&TokenKind::LBrace) {
            self.parse_brace_block()?
        } else {
            vec![self.parse_expr(BP_TERNARY)?]
        };
        Ok(Expr::new(
            ExprKind::Closure(ClosureExpr {
                params,
                body: Rc::new(body),
                style: ClosureStyle::Params,
                property_style: false,
            }),
            loc,
        ))
    }

    fn parse_zero_closure(&mut self) -> PResult<Expr> {
        let loc = self.expect(&TokenKind::PipePipe, "'||'")?.loc;
        let body = match self.peek_kind() {
            Some(TokenKind::LParen) => {
                self.advance();
                self.skip_newlines();
                let e = self.parse_expr(BP_PIPE)?;
                self.skip_newlines();
                self.expect(&TokenKind::RParen, "')'")?;
                vec![e]
            }
            Some(TokenKind::LBrace) => self.parse_brace_block()?,
            _ => {
                return Err(RillError::parse(
                    codes::UNEXPECTED_TOKEN,
                    "expected '(' or '{' after '||'",
                    self.here(),
                ));
            }
        };
        Ok(Expr::new(
            ExprKind::Closure(ClosureExpr {
                params: Vec::new(),
                body: Rc::new(body),
                style: ClosureStyle::ZeroArg,
                property_style: false,
            }),
            loc,
        ))
    }

    // ------------------------------------------------------------------
    // List and dict literals
    // ------------------------------------------------------------------

    fn parse_bracket_literal(&mut self) -> PResult<Expr> {
        let loc = self.expect(&TokenKind::LBracket, "'['")?.loc;
        self.skip_newlines();

        // `[:]` is the empty dict, `[]` the empty list
        if self.check(&TokenKind::Colon) && self.peek2_kind() == Some(&TokenKind::RBracket) {
            self.advance();
            self.advance();
            return Ok(Expr::new(ExprKind::DictLit(Vec::new()), loc));
        }
        if self.eat(&TokenKind::RBracket) {
            return Ok(Expr::new(ExprKind::ListLit(Vec::new()), loc));
        }

        if self.looks_like_dict_entry() {
            self.parse_dict_entries(loc)
        } else {
            self.parse_list_elements(loc)
        }
    }

    fn looks_like_dict_entry(&self) -> bool {
        match self.peek_kind() {
            Some(TokenKind::Ident(_)) | Some(TokenKind::Reserved(_)) | Some(TokenKind::Var(_)) => {
                self.peek2_kind() == Some(&TokenKind::Colon)
            }
            Some(TokenKind::Str(_)) => self.peek2_kind() == Some(&TokenKind::Colon),
            Some(TokenKind::LParen) => {
                // Scan to the matching ')' and look for a ':' after it
                let mut depth = 0usize;
                let mut i = self.pos;
                while let Some(tok) = self.tokens.get(i) {
                    match tok.kind {
                        TokenKind::LParen => depth += 1,
                        TokenKind::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self.tokens.get(i + 1).map(|t| &t.kind)
                                    == Some(&TokenKind::Colon);
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                false
            }
            _ => false,
        }
    }

    fn parse_dict_entries(&mut self, loc: SourceLocation) -> PResult<Expr> {
        let mut entries = Vec::new();
        loop {
            self.skip_newlines();
            let key = self.parse_dict_key()?;
            self.expect(&TokenKind::Colon, "':' after dict key")?;
            self.skip_newlines();
            let mut value = self.parse_expr(BP_PIPE)?;
            // A `||` closure written directly as a dict value reads back
            // property-style: `d.key` auto-invokes it
            if let ExprKind::Closure(ref mut c) = value.kind {
                if c.style == ClosureStyle::ZeroArg {
                    c.property_style = true;
                }
            }
            entries.push((key, value));
            self.skip_newlines();
            if self.eat(&TokenKind::Comma) {
                self.skip_newlines();
                if self.eat(&TokenKind::RBracket) {
                    break;
                }
                continue;
            }
            self.expect(&TokenKind::RBracket, "']' after dict entries")?;
            break;
        }
        Ok(Expr::new(ExprKind::DictLit(entries), loc))
    }

    fn parse_dict_key(&mut self) -> PResult<DictKey> {
        let Some(tok) = self.tokens.get(self.pos).cloned() else {
            return Err(RillError::parse(
                codes::UNEXPECTED_EOF,
                "unexpected end of input, expected a dict key",
                self.eof_loc,
            ));
        };
        match tok.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(DictKey::Static(name))
            }
            TokenKind::Reserved(r) => {
                self.advance();
                Ok(DictKey::Static(r.as_str().to_string()))
            }
            TokenKind::Str(segments) => {
                self.advance();
                match segments.as_slice() {
                    [StringSegment::Text(text)] => Ok(DictKey::Static(text.clone())),
                    _ => Err(RillError::parse(
                        codes::UNEXPECTED_TOKEN,
                        "dict keys must be literal strings",
                        tok.loc,
                    )),
                }
            }
            TokenKind::Var(name) if name != "$" && name != "$@" => {
                self.advance();
                Ok(DictKey::Var(name))
            }
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let e = self.parse_expr(BP_PIPE)?;
                self.skip_newlines();
                self.expect(&TokenKind::RParen, "')' after computed key")?;
                Ok(DictKey::Computed(Box::new(e)))
            }
            _ => Err(RillError::parse(
                codes::UNEXPECTED_TOKEN,
                "expected a dict key",
                tok.loc,
            )),
        }
    }

    fn parse_list_elements(&mut self, loc: SourceLocation) -> PResult<Expr> {
        let mut elements = Vec::new();
        loop {
            self.skip_newlines();
            elements.push(self.parse_expr(BP_PIPE)?);
            self.skip_newlines();
            if self.eat(&TokenKind::Comma) {
                self.skip_newlines();
                if self.eat(&TokenKind::RBracket) {
                    break;
                }
                continue;
            }
            self.expect(&TokenKind::RBracket, "']' after list elements")?;
            break;
        }
        Ok(Expr::new(ExprKind::ListLit(elements), loc))
    }
}
