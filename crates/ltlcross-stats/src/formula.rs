//! Syntactic canonicalization of LTL formula text.
//!
//! ltlcross echoes formulas the way each input file spelled them, so `F(a)`,
//! `F a` and `(Fa)` would otherwise end up as different rows. [`normalize`]
//! re-prints a formula with the minimum number of parentheses under a fixed
//! precedence table. Nothing here knows what the operators mean; no
//! simplification beyond flattening `&`/`|` chains is performed.

use std::fmt;
use std::str::FromStr;

use logos::Logos;

/// 演算子の結合強度（大きいほど強い）
const PREC_EQUIV: u8 = 1;
const PREC_IMPLIES: u8 = 2;
const PREC_XOR: u8 = 3;
const PREC_OR: u8 = 4;
const PREC_AND: u8 = 5;
const PREC_TEMPORAL: u8 = 6;
const PREC_ATOM: u8 = 7;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse formula at byte {pos}: {message}")]
pub struct ParseFormulaError {
    pub pos: usize,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UnOp {
    Not,
    Next,
    Finally,
    Globally,
}

impl UnOp {
    fn symbol(self) -> &'static str {
        match self {
            UnOp::Not => "!",
            UnOp::Next => "X",
            UnOp::Finally => "F",
            UnOp::Globally => "G",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BinOp {
    Equiv,
    Implies,
    Xor,
    Or,
    And,
    Until,
    Release,
    WeakUntil,
    StrongRelease,
}

impl BinOp {
    fn prec(self) -> u8 {
        match self {
            BinOp::Equiv => PREC_EQUIV,
            BinOp::Implies => PREC_IMPLIES,
            BinOp::Xor => PREC_XOR,
            BinOp::Or => PREC_OR,
            BinOp::And => PREC_AND,
            BinOp::Until | BinOp::Release | BinOp::WeakUntil | BinOp::StrongRelease => {
                PREC_TEMPORAL
            }
        }
    }

    fn right_assoc(self) -> bool {
        matches!(
            self,
            BinOp::Implies
                | BinOp::Until
                | BinOp::Release
                | BinOp::WeakUntil
                | BinOp::StrongRelease
        )
    }

    fn is_chain(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    fn symbol(self) -> &'static str {
        match self {
            BinOp::Equiv => "<->",
            BinOp::Implies => "->",
            BinOp::Xor => "xor",
            BinOp::Or => "|",
            BinOp::And => "&",
            BinOp::Until => "U",
            BinOp::Release => "R",
            BinOp::WeakUntil => "W",
            BinOp::StrongRelease => "M",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Atom(String),
    Const(bool),
    Unary(UnOp),
    Binary(BinOp),
    LParen,
    RParen,
}

/// Splits a bare word into tokens. Leading `F`/`G`/`X` letters are prefix
/// operators (`GFa` is `G F a`), the rest is a proposition or constant.
/// Positions are byte offsets into the word.
fn word_tokens(word: &str) -> Vec<(usize, Token)> {
    let binary = match word {
        "U" => Some(BinOp::Until),
        "R" | "V" => Some(BinOp::Release),
        "W" => Some(BinOp::WeakUntil),
        "M" => Some(BinOp::StrongRelease),
        "xor" => Some(BinOp::Xor),
        _ => None,
    };
    if let Some(op) = binary {
        return vec![(0, Token::Binary(op))];
    }
    let split = word.find(|c| !matches!(c, 'F' | 'G' | 'X')).unwrap_or(word.len());
    let mut out: Vec<(usize, Token)> = word[..split]
        .char_indices()
        .map(|(i, c)| {
            let op = match c {
                'F' => UnOp::Finally,
                'G' => UnOp::Globally,
                _ => UnOp::Next,
            };
            (i, Token::Unary(op))
        })
        .collect();
    let tok = match &word[split..] {
        "" => return out,
        "true" | "1" => Token::Const(true),
        "false" | "0" => Token::Const(false),
        rest => Token::Atom(rest.to_owned()),
    };
    out.push((split, tok));
    out
}

/// 字句（`logos` で切り出す単位）
#[derive(Logos, Clone, Debug, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum Lexeme {
    #[token("<->", |_| BinOp::Equiv)]
    #[token("<-->", |_| BinOp::Equiv)]
    #[token("<=>", |_| BinOp::Equiv)]
    #[token("->", |_| BinOp::Implies)]
    #[token("-->", |_| BinOp::Implies)]
    #[token("=>", |_| BinOp::Implies)]
    #[token("&", |_| BinOp::And)]
    #[token("&&", |_| BinOp::And)]
    #[token("/\\", |_| BinOp::And)]
    #[token("|", |_| BinOp::Or)]
    #[token("||", |_| BinOp::Or)]
    #[token("\\/", |_| BinOp::Or)]
    #[token("^", |_| BinOp::Xor)]
    Binary(BinOp),

    #[token("!", |_| UnOp::Not)]
    #[token("~", |_| UnOp::Not)]
    #[token("[]", |_| UnOp::Globally)]
    #[token("<>", |_| UnOp::Finally)]
    Unary(UnOp),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    /// `"..."` proposition, quotes included
    #[regex(r#""[^"]*""#, |lex| lex.slice().to_owned())]
    Quoted(String),

    #[regex(r"[A-Za-z0-9_]+", |lex| word_tokens(lex.slice()))]
    Word(Vec<(usize, Token)>),
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, ParseFormulaError> {
    let mut out = Vec::new();
    for (lexeme, span) in Lexeme::lexer(text).spanned() {
        let pos = span.start;
        let Ok(lexeme) = lexeme else {
            let c = text[pos..].chars().next().unwrap_or_default();
            let message = if c == '"' {
                "unterminated quoted proposition".to_owned()
            } else {
                format!("unexpected character `{c}`")
            };
            return Err(ParseFormulaError { pos, message });
        };
        match lexeme {
            Lexeme::Binary(op) => out.push((pos, Token::Binary(op))),
            Lexeme::Unary(op) => out.push((pos, Token::Unary(op))),
            Lexeme::LParen => out.push((pos, Token::LParen)),
            Lexeme::RParen => out.push((pos, Token::RParen)),
            Lexeme::Quoted(name) => out.push((pos, Token::Atom(name))),
            Lexeme::Word(parts) => out.extend(parts.into_iter().map(|(i, t)| (pos + i, t))),
        }
    }
    Ok(out)
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Node {
    Const(bool),
    Atom(String),
    Unary(UnOp, Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    /// Flattened `&` / `|` chain
    Chain(BinOp, Vec<Node>),
}

impl Node {
    fn binary(op: BinOp, lhs: Node, rhs: Node) -> Node {
        if !op.is_chain() {
            return Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        let mut kids = Vec::new();
        for side in [lhs, rhs] {
            match side {
                Node::Chain(inner, children) if inner == op => kids.extend(children),
                other => kids.push(other),
            }
        }
        Node::Chain(op, kids)
    }

    fn prec(&self) -> u8 {
        match self {
            Node::Const(_) | Node::Atom(_) | Node::Unary(..) => PREC_ATOM,
            Node::Binary(op, ..) | Node::Chain(op, _) => op.prec(),
        }
    }

    fn write_operand(&self, f: &mut fmt::Formatter<'_>, paren: bool) -> fmt::Result {
        if paren {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Const(true) => f.write_str("1"),
            Node::Const(false) => f.write_str("0"),
            Node::Atom(name) => f.write_str(name),
            Node::Unary(op, child) => {
                f.write_str(op.symbol())?;
                child.write_operand(f, child.prec() < PREC_ATOM)
            }
            Node::Chain(op, kids) => {
                for (i, kid) in kids.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.symbol())?;
                    }
                    kid.write_operand(f, kid.prec() <= op.prec())?;
                }
                Ok(())
            }
            Node::Binary(op, lhs, rhs) => {
                let p = op.prec();
                let (lp, rp) = if op.right_assoc() {
                    (lhs.prec() <= p, rhs.prec() < p)
                } else {
                    (lhs.prec() < p, rhs.prec() <= p)
                };
                lhs.write_operand(f, lp)?;
                write!(f, " {} ", op.symbol())?;
                rhs.write_operand(f, rp)
            }
        }
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    idx: usize,
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.idx).map(|(_, t)| t)
    }

    fn pos(&self) -> usize {
        self.tokens.get(self.idx).map_or(self.len, |(p, _)| *p)
    }

    fn error(&self, message: &str) -> ParseFormulaError {
        ParseFormulaError { pos: self.pos(), message: message.to_owned() }
    }

    fn parse_expr(&mut self, min_prec: u8) -> Result<Node, ParseFormulaError> {
        let mut lhs = self.parse_operand()?;
        while let Some(Token::Binary(op)) = self.peek() {
            let op = *op;
            if op.prec() < min_prec {
                break;
            }
            self.idx += 1;
            let next_min = if op.right_assoc() { op.prec() } else { op.prec() + 1 };
            let rhs = self.parse_expr(next_min)?;
            lhs = Node::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_operand(&mut self) -> Result<Node, ParseFormulaError> {
        let Some((_, tok)) = self.tokens.get(self.idx).cloned() else {
            return Err(self.error("unexpected end of formula"));
        };
        self.idx += 1;
        match tok {
            Token::Atom(name) => Ok(Node::Atom(name)),
            Token::Const(b) => Ok(Node::Const(b)),
            Token::Unary(op) => Ok(Node::Unary(op, Box::new(self.parse_operand()?))),
            Token::LParen => {
                let inner = self.parse_expr(0)?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(self.error("expected `)`"));
                }
                self.idx += 1;
                Ok(inner)
            }
            Token::Binary(_) | Token::RParen => {
                self.idx -= 1;
                Err(self.error("expected an operand"))
            }
        }
    }
}

/// A parsed formula; `Display` yields the canonical text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formula(Node);

impl FromStr for Formula {
    type Err = ParseFormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { tokens: tokenize(s)?, idx: 0, len: s.len() };
        let node = parser.parse_expr(0)?;
        if parser.idx != parser.tokens.len() {
            return Err(parser.error("trailing input"));
        }
        Ok(Formula(node))
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Canonical text of `text`. Unparsable input is returned trimmed.
pub fn normalize(text: &str) -> String {
    match text.parse::<Formula>() {
        Ok(formula) => formula.to_string(),
        Err(e) => {
            log::warn!("keeping formula verbatim ({e}): {}", text.trim());
            text.trim().to_owned()
        }
    }
}
