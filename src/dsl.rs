//! Parser for the property graph's pattern language:
//!
//! ```text
//! MATCH (m:Movie {title: $title})-[:DIRECTED_BY]->(d:Director)
//! WHERE m.rating >= 8.5 AND d.name <> 'Nobody'
//! RETURN d.name AS director, count(m) AS movies, avg(m.rating)
//! ORDER BY movies DESC, director
//! LIMIT 5
//! ```
//!
//! Keywords are case-insensitive. `//` starts a comment running to end of line.

use crate::{backend::QueryValue, errors::MovieKgError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePattern {
    pub var: Option<String>,
    pub label: Option<String>,
    pub props: Vec<(String, Operand)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelPattern {
    pub var: Option<String>,
    pub edge_type: Option<String>,
    pub direction: Direction,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Hop {
    pub rel: RelPattern,
    pub node: NodePattern,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Param(String),
    Literal(QueryValue),
    Property { var: String, key: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub left: Operand,
    pub op: CompareOp,
    pub right: Operand,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Collect,
}

impl AggregateFn {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(AggregateFn::Count),
            "sum" => Some(AggregateFn::Sum),
            "avg" => Some(AggregateFn::Avg),
            "min" => Some(AggregateFn::Min),
            "max" => Some(AggregateFn::Max),
            "collect" => Some(AggregateFn::Collect),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            AggregateFn::Count => "count",
            AggregateFn::Sum => "sum",
            AggregateFn::Avg => "avg",
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
            AggregateFn::Collect => "collect",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReturnExpr {
    Variable(String),
    Property {
        var: String,
        key: String,
    },
    /// `arg` is `None` for `count(*)`.
    Aggregate {
        func: AggregateFn,
        distinct: bool,
        arg: Option<Box<ReturnExpr>>,
    },
}

impl ReturnExpr {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, ReturnExpr::Aggregate { .. })
    }

    /// Canonical source text, used as the default column name.
    pub fn source(&self) -> String {
        match self {
            ReturnExpr::Variable(var) => var.clone(),
            ReturnExpr::Property { var, key } => format!("{var}.{key}"),
            ReturnExpr::Aggregate {
                func,
                distinct,
                arg,
            } => {
                let inner = arg.as_ref().map_or_else(|| "*".to_owned(), |a| a.source());
                if *distinct {
                    format!("{}(DISTINCT {inner})", func.as_str())
                } else {
                    format!("{}({inner})", func.as_str())
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnItem {
    pub expr: ReturnExpr,
    pub alias: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderKey {
    /// Column alias or expression source text.
    pub column: String,
    pub descending: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PatternQuery {
    pub start: NodePattern,
    pub hops: Vec<Hop>,
    pub filters: Vec<Condition>,
    pub returns: Vec<ReturnItem>,
    pub order_by: Vec<OrderKey>,
    pub limit: Option<usize>,
}

pub fn parse_query(input: &str) -> Result<PatternQuery, MovieKgError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(MovieKgError::query("empty pattern query"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let query = parser.query()?;
    if let Some(token) = parser.peek() {
        return Err(MovieKgError::query(format!(
            "unexpected {token:?} after end of query"
        )));
    }
    Ok(query)
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Dot,
    Star,
    Dash,
    Arrow,
    LeftArrow,
    Op(CompareOp),
    Ident(String),
    Param(String),
    Str(String),
    Int(i64),
    Float(f64),
}

fn tokenize(input: &str) -> Result<Vec<Token>, MovieKgError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '/' if next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '(' | ')' | '[' | ']' | '{' | '}' | ':' | ',' | '.' | '*' | '=' => {
                tokens.push(match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    ':' => Token::Colon,
                    ',' => Token::Comma,
                    '.' => Token::Dot,
                    '*' => Token::Star,
                    _ => Token::Op(CompareOp::Eq),
                });
                i += 1;
            }
            '-' if next == Some('>') => {
                tokens.push(Token::Arrow);
                i += 2;
            }
            '-' if next.is_some_and(|n| n.is_ascii_digit()) && expects_operand(&tokens) => {
                let (token, end) = lex_number(&chars, i + 1, true)?;
                tokens.push(token);
                i = end;
            }
            '-' => {
                tokens.push(Token::Dash);
                i += 1;
            }
            '<' => match next {
                Some('-') => {
                    tokens.push(Token::LeftArrow);
                    i += 2;
                }
                Some('=') => {
                    tokens.push(Token::Op(CompareOp::Le));
                    i += 2;
                }
                Some('>') => {
                    tokens.push(Token::Op(CompareOp::Ne));
                    i += 2;
                }
                _ => {
                    tokens.push(Token::Op(CompareOp::Lt));
                    i += 1;
                }
            },
            '>' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Ge));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Op(CompareOp::Gt));
                i += 1;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += 2;
            }
            '$' => {
                let end = ident_end(&chars, i + 1);
                if end == i + 1 {
                    return Err(MovieKgError::query("expected parameter name after '$'"));
                }
                tokens.push(Token::Param(chars[i + 1..end].iter().collect()));
                i = end;
            }
            '\'' | '"' => {
                let (text, end) = lex_string(&chars, i)?;
                tokens.push(Token::Str(text));
                i = end;
            }
            c if c.is_ascii_digit() => {
                let (token, end) = lex_number(&chars, i, false)?;
                tokens.push(token);
                i = end;
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = ident_end(&chars, i);
                tokens.push(Token::Ident(chars[i..end].iter().collect()));
                i = end;
            }
            '`' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == '`')
                    .ok_or_else(|| MovieKgError::query("unterminated quoted identifier"))?;
                tokens.push(Token::Ident(chars[i + 1..i + 1 + close].iter().collect()));
                i += close + 2;
            }
            other => {
                return Err(MovieKgError::query(format!(
                    "unexpected character {other:?} at offset {i}"
                )));
            }
        }
    }
    Ok(tokens)
}

fn expects_operand(tokens: &[Token]) -> bool {
    matches!(
        tokens.last(),
        None | Some(Token::Op(_) | Token::Colon | Token::Comma | Token::LBrace | Token::LParen)
    )
}

fn ident_end(chars: &[char], start: usize) -> usize {
    let mut end = start;
    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
        end += 1;
    }
    end
}

fn lex_number(
    chars: &[char],
    start: usize,
    negative: bool,
) -> Result<(Token, usize), MovieKgError> {
    let mut end = start;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    let mut is_float = false;
    if end + 1 < chars.len() && chars[end] == '.' && chars[end + 1].is_ascii_digit() {
        is_float = true;
        end += 1;
        while end < chars.len() && chars[end].is_ascii_digit() {
            end += 1;
        }
    }
    let mut text: String = chars[start..end].iter().collect();
    if negative {
        text.insert(0, '-');
    }
    let token = if is_float {
        Token::Float(
            text.parse()
                .map_err(|_| MovieKgError::query(format!("invalid number {text}")))?,
        )
    } else {
        Token::Int(
            text.parse()
                .map_err(|_| MovieKgError::query(format!("invalid number {text}")))?,
        )
    };
    Ok((token, end))
}

fn lex_string(chars: &[char], start: usize) -> Result<(String, usize), MovieKgError> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| MovieKgError::query("unterminated string literal"))?;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(MovieKgError::query("unterminated string literal"))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn query(&mut self) -> Result<PatternQuery, MovieKgError> {
        self.expect_keyword("MATCH")?;
        let start = self.node()?;
        let mut hops = Vec::new();
        while matches!(self.peek(), Some(Token::Dash | Token::LeftArrow)) {
            let rel = self.relationship()?;
            let node = self.node()?;
            hops.push(Hop { rel, node });
        }

        let mut filters = Vec::new();
        if self.keyword("WHERE") {
            filters.push(self.condition()?);
            while self.keyword("AND") {
                filters.push(self.condition()?);
            }
        }

        self.expect_keyword("RETURN")?;
        let mut returns = vec![self.return_item()?];
        while self.eat(&Token::Comma) {
            returns.push(self.return_item()?);
        }

        let mut order_by = Vec::new();
        if self.keyword("ORDER") {
            self.expect_keyword("BY")?;
            order_by.push(self.order_key()?);
            while self.eat(&Token::Comma) {
                order_by.push(self.order_key()?);
            }
        }

        let mut limit = None;
        if self.keyword("LIMIT") {
            match self.next() {
                Some(Token::Int(value)) if value >= 0 => limit = Some(value as usize),
                other => {
                    return Err(MovieKgError::query(format!(
                        "LIMIT expects a non-negative integer, found {other:?}"
                    )));
                }
            }
        }

        Ok(PatternQuery {
            start,
            hops,
            filters,
            returns,
            order_by,
            limit,
        })
    }

    fn node(&mut self) -> Result<NodePattern, MovieKgError> {
        self.expect(&Token::LParen, "'(' to open a node pattern")?;
        let mut node = NodePattern::default();
        if let Some(Token::Ident(_)) = self.peek() {
            node.var = Some(self.ident("node variable")?);
        }
        if self.eat(&Token::Colon) {
            node.label = Some(self.ident("node label")?);
        }
        if self.eat(&Token::LBrace) {
            loop {
                let key = self.ident("property name")?;
                self.expect(&Token::Colon, "':' after property name")?;
                let value = self.operand()?;
                node.props.push((key, value));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RBrace, "'}' to close node properties")?;
        }
        self.expect(&Token::RParen, "')' to close a node pattern")?;
        Ok(node)
    }

    fn relationship(&mut self) -> Result<RelPattern, MovieKgError> {
        let incoming = match self.next() {
            Some(Token::LeftArrow) => true,
            Some(Token::Dash) => false,
            other => {
                return Err(MovieKgError::query(format!(
                    "expected relationship, found {other:?}"
                )));
            }
        };
        let mut var = None;
        let mut edge_type = None;
        if self.eat(&Token::LBracket) {
            if let Some(Token::Ident(_)) = self.peek() {
                var = Some(self.ident("relationship variable")?);
            }
            if self.eat(&Token::Colon) {
                edge_type = Some(self.ident("relationship type")?);
            }
            self.expect(&Token::RBracket, "']' to close a relationship")?;
        }
        if incoming {
            self.expect(&Token::Dash, "'-' to close an incoming relationship")?;
            Ok(RelPattern {
                var,
                edge_type,
                direction: Direction::Incoming,
            })
        } else {
            self.expect(&Token::Arrow, "'->' (undirected patterns are not supported)")?;
            Ok(RelPattern {
                var,
                edge_type,
                direction: Direction::Outgoing,
            })
        }
    }

    fn condition(&mut self) -> Result<Condition, MovieKgError> {
        let left = self.operand()?;
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            other => {
                return Err(MovieKgError::query(format!(
                    "expected comparison operator, found {other:?}"
                )));
            }
        };
        let right = self.operand()?;
        Ok(Condition { left, op, right })
    }

    fn operand(&mut self) -> Result<Operand, MovieKgError> {
        match self.next() {
            Some(Token::Param(name)) => Ok(Operand::Param(name)),
            Some(Token::Str(text)) => Ok(Operand::Literal(QueryValue::Text(text))),
            Some(Token::Int(value)) => Ok(Operand::Literal(QueryValue::Integer(value))),
            Some(Token::Float(value)) => Ok(Operand::Literal(QueryValue::Float(value))),
            Some(Token::Ident(word)) => match word.to_ascii_lowercase().as_str() {
                "true" => Ok(Operand::Literal(QueryValue::Bool(true))),
                "false" => Ok(Operand::Literal(QueryValue::Bool(false))),
                "null" => Ok(Operand::Literal(QueryValue::Null)),
                _ => {
                    self.expect(&Token::Dot, "'.' in property access")?;
                    let key = self.ident("property name")?;
                    Ok(Operand::Property { var: word, key })
                }
            },
            other => Err(MovieKgError::query(format!(
                "expected value, parameter or property, found {other:?}"
            ))),
        }
    }

    fn return_item(&mut self) -> Result<ReturnItem, MovieKgError> {
        let expr = self.return_expr()?;
        let alias = if self.keyword("AS") {
            self.ident("column alias")?
        } else {
            expr.source()
        };
        Ok(ReturnItem { expr, alias })
    }

    fn return_expr(&mut self) -> Result<ReturnExpr, MovieKgError> {
        let name = self.ident("return expression")?;
        if self.eat(&Token::LParen) {
            let func = AggregateFn::from_name(&name)
                .ok_or_else(|| MovieKgError::query(format!("unknown function {name}")))?;
            let distinct = self.keyword("DISTINCT");
            let arg = if self.eat(&Token::Star) {
                if func != AggregateFn::Count {
                    return Err(MovieKgError::query(format!("{name}(*) is not supported")));
                }
                None
            } else {
                let inner = self.return_expr()?;
                if inner.is_aggregate() {
                    return Err(MovieKgError::query("aggregates cannot be nested"));
                }
                Some(Box::new(inner))
            };
            self.expect(&Token::RParen, "')' to close function call")?;
            return Ok(ReturnExpr::Aggregate {
                func,
                distinct,
                arg,
            });
        }
        if self.eat(&Token::Dot) {
            let key = self.ident("property name")?;
            return Ok(ReturnExpr::Property { var: name, key });
        }
        Ok(ReturnExpr::Variable(name))
    }

    fn order_key(&mut self) -> Result<OrderKey, MovieKgError> {
        let expr = self.return_expr()?;
        let descending = if self.keyword("DESC") || self.keyword("DESCENDING") {
            true
        } else {
            let _ = self.keyword("ASC") || self.keyword("ASCENDING");
            false
        };
        Ok(OrderKey {
            column: expr.source(),
            descending,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), MovieKgError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(MovieKgError::query(format!(
                "expected {what}, found {:?}",
                self.peek()
            )))
        }
    }

    fn keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), MovieKgError> {
        if self.keyword(keyword) {
            Ok(())
        } else {
            Err(MovieKgError::query(format!(
                "expected {keyword}, found {:?}",
                self.peek()
            )))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, MovieKgError> {
        match self.next() {
            Some(Token::Ident(word)) => Ok(word),
            other => Err(MovieKgError::query(format!(
                "expected {what}, found {other:?}"
            ))),
        }
    }
}
