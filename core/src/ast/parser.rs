use crate::ast::{Block, Expr, Program, Stmt};
use crate::token::{ParseError, Token};

/// Recursive-descent parser over a token slice, one method per precedence
/// level. Fails fast on the first error.
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        while !self.eof() {
            statements.push(self.parse_stmt()?);
        }
        Ok(Program { statements })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.current() {
            Some(Token::Let) => self.parse_let_stmt(),
            Some(Token::Return) => self.parse_return_stmt(),
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_let_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1; // let
        let name = match self.current() {
            Some(Token::Ident(name)) => name.clone(),
            other => return Err(unexpected("an identifier", other)),
        };
        self.pos += 1;
        self.expect(&Token::Assign)?;
        let mut value = self.parse_expr()?;
        // Tag the literal with its binding name so the body can refer to
        // the function being defined.
        if let Expr::Function { name: fn_name, .. } = &mut value {
            *fn_name = Some(name.clone());
        }
        self.skip_semicolon();
        Ok(Stmt::Let { name, value })
    }

    fn parse_return_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1; // return
        let value = self.parse_expr()?;
        self.skip_semicolon();
        Ok(Stmt::Return { value })
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt, ParseError> {
        let expression = self.parse_expr()?;
        self.skip_semicolon();
        Ok(Stmt::Expr { expression })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.expect(&Token::LBrace)?;
        let mut statements = Vec::new();
        loop {
            match self.current() {
                Some(Token::RBrace) => {
                    self.pos += 1;
                    return Ok(Block { statements });
                }
                Some(_) => statements.push(self.parse_stmt()?),
                None => return Err(unexpected("}", None)),
            }
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_equality()
    }

    /// `==` and `!=`, left-associative.
    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_comparison()?;
        while let Some(op) = self.match_operator(&[(Token::Eq, "=="), (Token::NotEq, "!=")]) {
            let right = self.parse_comparison()?;
            expr = infix(expr, op, right);
        }
        Ok(expr)
    }

    /// `<` and `>`.
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_sum()?;
        while let Some(op) = self.match_operator(&[(Token::Lt, "<"), (Token::Gt, ">")]) {
            let right = self.parse_sum()?;
            expr = infix(expr, op, right);
        }
        Ok(expr)
    }

    /// `+` and `-`.
    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_product()?;
        while let Some(op) = self.match_operator(&[(Token::Plus, "+"), (Token::Minus, "-")]) {
            let right = self.parse_product()?;
            expr = infix(expr, op, right);
        }
        Ok(expr)
    }

    /// `*` and `/`.
    fn parse_product(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_unary()?;
        while let Some(op) = self.match_operator(&[(Token::Asterisk, "*"), (Token::Slash, "/")]) {
            let right = self.parse_unary()?;
            expr = infix(expr, op, right);
        }
        Ok(expr)
    }

    /// Prefix `!` and `-`, right-associative.
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let operator = match self.current() {
            Some(Token::Bang) => "!",
            Some(Token::Minus) => "-",
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        let right = self.parse_unary()?;
        Ok(Expr::Prefix {
            operator: operator.to_string(),
            right: Box::new(right),
        })
    }

    /// Call and index expressions bind tighter than any operator and
    /// chain: `f(1)(2)[0]`.
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current() {
                Some(Token::LParen) => {
                    let arguments = self.parse_expr_list(&Token::LParen, &Token::RParen)?;
                    expr = Expr::Call {
                        function: Box::new(expr),
                        arguments,
                    };
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expr()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index {
                        left: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current() {
            Some(Token::Int(value)) => {
                let value = *value;
                self.pos += 1;
                Ok(Expr::Int(value))
            }
            Some(Token::Str(value)) => {
                let value = value.clone();
                self.pos += 1;
                Ok(Expr::Str(value))
            }
            Some(Token::True) => {
                self.pos += 1;
                Ok(Expr::Bool(true))
            }
            Some(Token::False) => {
                self.pos += 1;
                Ok(Expr::Bool(false))
            }
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(Expr::Ident(name))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::If) => self.parse_if(),
            Some(Token::Function) => self.parse_function(),
            Some(Token::LBracket) => {
                let elements = self.parse_expr_list(&Token::LBracket, &Token::RBracket)?;
                Ok(Expr::Array(elements))
            }
            Some(Token::LBrace) => self.parse_hash(),
            other => Err(ParseError::new(format!(
                "no prefix parse function for {} found",
                describe(other)
            ))),
        }
    }

    fn parse_if(&mut self) -> Result<Expr, ParseError> {
        self.pos += 1; // if
        self.expect(&Token::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let consequence = self.parse_block()?;
        let alternative = if matches!(self.current(), Some(Token::Else)) {
            self.pos += 1;
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Expr::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    fn parse_function(&mut self) -> Result<Expr, ParseError> {
        self.pos += 1; // fn
        self.expect(&Token::LParen)?;
        let mut parameters = Vec::new();
        if !matches!(self.current(), Some(Token::RParen)) {
            loop {
                match self.current() {
                    Some(Token::Ident(name)) => {
                        parameters.push(name.clone());
                        self.pos += 1;
                    }
                    other => return Err(unexpected("a parameter name", other)),
                }
                if matches!(self.current(), Some(Token::Comma)) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        let body = self.parse_block()?;
        Ok(Expr::Function {
            name: None,
            parameters,
            body,
        })
    }

    fn parse_hash(&mut self) -> Result<Expr, ParseError> {
        self.pos += 1; // {
        let mut pairs = Vec::new();
        if !matches!(self.current(), Some(Token::RBrace)) {
            loop {
                let key = self.parse_expr()?;
                self.expect(&Token::Colon)?;
                let value = self.parse_expr()?;
                pairs.push((key, value));
                if matches!(self.current(), Some(Token::Comma)) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Expr::Hash(pairs))
    }

    /// Comma-separated expressions between `open` and `close`; used for
    /// call arguments and array literals.
    fn parse_expr_list(&mut self, open: &Token, close: &Token) -> Result<Vec<Expr>, ParseError> {
        self.expect(open)?;
        let mut list = Vec::new();
        if !self.current_is(close) {
            loop {
                list.push(self.parse_expr()?);
                if matches!(self.current(), Some(Token::Comma)) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.expect(close)?;
        Ok(list)
    }

    #[inline]
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    #[inline]
    fn current_is(&self, token: &Token) -> bool {
        self.current() == Some(token)
    }

    #[inline]
    fn eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn expect(&mut self, token: &Token) -> Result<(), ParseError> {
        if self.current_is(token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(unexpected(&token.to_string(), self.current()))
        }
    }

    fn skip_semicolon(&mut self) {
        if matches!(self.current(), Some(Token::Semicolon)) {
            self.pos += 1;
        }
    }

    fn match_operator(&mut self, table: &[(Token, &'static str)]) -> Option<&'static str> {
        let text = table
            .iter()
            .find_map(|(token, text)| (self.current() == Some(token)).then_some(*text))?;
        self.pos += 1;
        Some(text)
    }
}

fn infix(left: Expr, operator: &str, right: Expr) -> Expr {
    Expr::Infix {
        operator: operator.to_string(),
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn describe(token: Option<&Token>) -> String {
    match token {
        Some(token) => token.to_string(),
        None => "end of input".to_string(),
    }
}

fn unexpected(wanted: &str, got: Option<&Token>) -> ParseError {
    ParseError::new(format!(
        "expected next token to be {wanted}, got {} instead",
        describe(got)
    ))
}
