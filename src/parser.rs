use crate::ast::{
    BinaryOp, ClassDecl, Expr, FunctionBody, FunctionDecl, Literal, Program, Segment,
    StepDirection, Stmt, UnaryOp, VariableDecl,
};
use crate::error::{ParseError, Span};
use crate::lexer::{tokenize, Token, TokenType};
use std::rc::Rc;

/// Tokenizes and parses a whole source unit.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    Parser::new(tokenize(source)).parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if self.check(&TokenType::FileSeparator) {
                statements.push(self.file_block()?);
            } else {
                statements.push(self.declaration()?);
            }
        }

        Ok(Program { statements })
    }

    /// A separator, an optional (dotted) name on the same line, then every
    /// statement up to the next separator.
    fn file_block(&mut self) -> Result<Stmt, ParseError> {
        let separator = self.advance().clone();

        let mut name = None;
        if self.check(&TokenType::Identifier) && self.peek().line == separator.line {
            let mut file_name = self.advance().lexeme.clone();
            while self.check(&TokenType::Dot)
                && self.check_next(&TokenType::Identifier)
                && self.peek().line == separator.line
            {
                self.advance();
                file_name.push('.');
                file_name.push_str(&self.advance().lexeme);
            }
            name = Some(file_name);
        }

        // `===== name.db =====` style decoration belongs to the header
        while self.peek().line == separator.line
            && matches!(
                self.peek().token_type,
                TokenType::FileSeparator
                    | TokenType::Equal
                    | TokenType::EqualEqual
                    | TokenType::EqualEqualEqual
                    | TokenType::EqualEqualEqualEqual
            )
        {
            self.advance();
        }

        let mut body = Vec::new();
        while !self.check(&TokenType::FileSeparator) && !self.is_at_end() {
            body.push(self.declaration()?);
        }

        Ok(Stmt::FileBlock {
            name,
            body,
            span: separator.span.to(self.previous().span),
        })
    }

    fn declaration(&mut self) -> Result<Stmt, ParseError> {
        match self.peek().token_type {
            TokenType::Const | TokenType::Var | TokenType::ConstConstConst => {
                self.variable_declaration()
            }
            TokenType::Function => self.function_declaration(false),
            TokenType::Async => {
                let async_token = self.advance().clone();
                if self.check(&TokenType::Function) {
                    self.function_declaration(true)
                } else {
                    Err(self.error_at_current("Expected function declaration after 'async'")
                        .with_help(format!(
                            "'{}' can only mark a function: async func name() => ...!",
                            async_token.lexeme
                        )))
                }
            }
            TokenType::Class => self.class_declaration(),
            _ => self.statement(),
        }
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.match_types(&[TokenType::If]) {
            self.if_statement()
        } else if self.match_types(&[TokenType::When]) {
            self.when_statement()
        } else if self.match_types(&[TokenType::Return]) {
            self.return_statement()
        } else if self.match_types(&[TokenType::Delete]) {
            let start = self.previous().span;
            let target = self.expression()?;
            self.terminator();
            Ok(Stmt::Delete {
                span: start.to(target.span()),
                target,
            })
        } else if self.match_types(&[TokenType::Import]) {
            let start = self.previous().span;
            let name = self.consume_identifier("Expected import name")?;
            self.terminator();
            Ok(Stmt::Import {
                name,
                span: start.to(self.previous().span),
            })
        } else if self.match_types(&[TokenType::Export]) {
            self.export_statement()
        } else if self.match_types(&[TokenType::Reverse]) {
            let span = self.previous().span;
            self.terminator();
            Ok(Stmt::Reverse { span })
        } else if self.match_types(&[TokenType::String, TokenType::Noop]) {
            let token = self.previous().clone();
            self.terminator();
            Ok(Stmt::Noop {
                content: token.lexeme,
                span: token.span,
            })
        } else if self.is_assignment_ahead() {
            self.assignment_statement()
        } else {
            self.expression_statement()
        }
    }

    /// Consumes an optional terminator and returns its priority and debug flag.
    fn terminator(&mut self) -> (i32, bool) {
        if self.match_types(&[TokenType::Exclamation, TokenType::InvertedExclamation]) {
            (self.previous().priority, false)
        } else if self.match_types(&[TokenType::Question]) {
            while self.match_types(&[TokenType::Question]) {}
            (0, true)
        } else {
            (0, false)
        }
    }

    fn variable_declaration(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek().span;

        if self.match_types(&[TokenType::ConstConstConst]) {
            let name = self.consume_identifier("Expected variable name")?;
            self.consume_with_help(
                TokenType::Equal,
                "Expected '=' in const const const declaration",
                "Global constants need a value: const const const pi = 3.14!".to_string(),
            )?;
            let value = self.expression()?;
            let (priority, _) = self.terminator();
            return Ok(Stmt::GlobalConstant {
                name,
                span: start.to(self.previous().span),
                value,
                priority,
            });
        }

        let mut const_count = 0;
        let mut var_count = 0;
        while self.match_types(&[TokenType::Const, TokenType::Var]) {
            if self.previous().token_type == TokenType::Const {
                const_count += 1;
            } else {
                var_count += 1;
            }
        }

        let name = self.consume_identifier("Expected variable name")?;

        let mut lifetime = None;
        let mut assignment_consumed = false;
        if self.match_types(&[TokenType::Less]) {
            let (text, glued_equals) = self.lifetime_annotation()?;
            lifetime = Some(text);
            assignment_consumed = glued_equals;
        }

        let mut type_annotation = None;
        if !assignment_consumed && self.match_types(&[TokenType::Colon]) {
            let mut type_name = self.consume_identifier("Expected type name")?;
            while self.check(&TokenType::LeftBracket) && self.check_next(&TokenType::RightBracket) {
                self.advance();
                self.advance();
                type_name.push_str("[]");
            }
            type_annotation = Some(type_name);
        }

        let value = if assignment_consumed || self.match_types(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };

        let (priority, debug) = self.terminator();

        Ok(Stmt::VariableDeclaration(VariableDecl {
            const_count,
            var_count,
            name,
            value,
            lifetime,
            type_annotation,
            priority,
            debug,
            span: start.to(self.previous().span),
        }))
    }

    /// Raw text between `<` and `>`. Returns true when the closing bracket was
    /// lexed together with the assignment as `>=`.
    fn lifetime_annotation(&mut self) -> Result<(String, bool), ParseError> {
        let mut text = String::new();
        while !self.check(&TokenType::Greater)
            && !self.check(&TokenType::GreaterEqual)
            && !self.is_at_end()
        {
            text.push_str(&self.advance().lexeme);
        }

        if text.is_empty() {
            return Err(self.error_at_current("Expected lifetime").with_help(
                "Lifetimes look like <2>, <20s>, <5m>, <1h>, <-1> or <Infinity>.".to_string(),
            ));
        }

        if self.match_types(&[TokenType::GreaterEqual]) {
            return Ok((text, true));
        }
        self.consume(TokenType::Greater, "Expected '>' after lifetime")?;
        Ok((text, false))
    }

    fn function_declaration(&mut self, is_async: bool) -> Result<Stmt, ParseError> {
        let keyword_token = self.advance().clone();
        let name = self.consume_identifier("Expected function name")?;

        let mut parameters = Vec::new();
        if self.match_types(&[TokenType::LeftParen]) {
            if !self.check(&TokenType::RightParen) {
                loop {
                    parameters.push(self.consume_identifier("Expected parameter name")?);
                    if !self.match_types(&[TokenType::Comma]) {
                        break;
                    }
                }
            }
            self.consume(TokenType::RightParen, "Expected ')' after parameters")?;
        }

        self.consume_with_help(
            TokenType::Arrow,
            "Expected '=>' after function signature",
            "Functions are declared as: function add(a, b) => a + b!".to_string(),
        )?;

        let body = if self.match_types(&[TokenType::LeftBrace]) {
            FunctionBody::Block(self.block("function body")?)
        } else {
            FunctionBody::Expression(self.expression()?)
        };

        self.terminator();

        Ok(Stmt::Function(Rc::new(FunctionDecl {
            keyword: keyword_token.lexeme,
            name,
            parameters,
            body,
            is_async,
            span: keyword_token.span.to(self.previous().span),
        })))
    }

    fn class_declaration(&mut self) -> Result<Stmt, ParseError> {
        let keyword_token = self.advance().clone();
        let name = self.consume_identifier("Expected class name")?;

        self.consume(TokenType::LeftBrace, "Expected '{' after class name")?;
        let body = self.block("class body")?;
        self.terminator();

        Ok(Stmt::Class(Rc::new(ClassDecl {
            keyword: keyword_token.lexeme,
            name,
            body,
            span: keyword_token.span.to(self.previous().span),
        })))
    }

    fn block(&mut self, context: &str) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();

        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume_with_help(
            TokenType::RightBrace,
            &format!("Expected '}}' after {}", context),
            "Blocks must be closed with '}' after the opening '{'.".to_string(),
        )?;
        Ok(statements)
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.previous().span;

        self.consume_with_help(
            TokenType::LeftParen,
            "Expected '(' after 'if'",
            "If statements require parentheses around the condition: if (condition) { ... }".to_string(),
        )?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expected ')' after if condition")?;
        self.consume(TokenType::LeftBrace, "Expected '{' after if condition")?;
        let then_branch = self.block("if body")?;

        let else_branch = if self.match_types(&[TokenType::Else]) {
            if self.match_types(&[TokenType::If]) {
                Some(vec![self.if_statement()?])
            } else {
                self.consume(TokenType::LeftBrace, "Expected '{' after 'else'")?;
                Some(self.block("else body")?)
            }
        } else {
            None
        };

        self.terminator();

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            span: start.to(self.previous().span),
        })
    }

    fn when_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.previous().span;

        self.consume(TokenType::LeftParen, "Expected '(' after 'when'")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expected ')' after when condition")?;
        self.consume(TokenType::LeftBrace, "Expected '{' after when condition")?;
        let body = self.block("when body")?;
        self.terminator();

        Ok(Stmt::When {
            condition,
            body,
            span: start.to(self.previous().span),
        })
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.previous().span;

        let value = if self.check(&TokenType::Exclamation)
            || self.check(&TokenType::InvertedExclamation)
            || self.check(&TokenType::Question)
            || self.check(&TokenType::RightBrace)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.expression()?)
        };

        self.terminator();
        Ok(Stmt::Return {
            value,
            span: start.to(self.previous().span),
        })
    }

    fn export_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.previous().span;
        let name = self.consume_identifier("Expected export name")?;
        self.consume(TokenType::To, "Expected 'to' after export name")?;
        let target_file = self
            .consume_with_help(
                TokenType::String,
                "Expected target file name",
                "Exports name their destination: export add to \"main.db\"!".to_string(),
            )?
            .lexeme
            .clone();
        self.terminator();

        Ok(Stmt::Export {
            name,
            target_file,
            span: start.to(self.previous().span),
        })
    }

    /// An identifier, any `.name` / `[index]` postfixes, then a lone `=`.
    fn is_assignment_ahead(&self) -> bool {
        if !self.check(&TokenType::Identifier) {
            return false;
        }

        let mut pos = self.current + 1;
        loop {
            match self.tokens.get(pos).map(|token| &token.token_type) {
                Some(TokenType::Equal) => return true,
                Some(TokenType::Dot) => {
                    match self.tokens.get(pos + 1).map(|token| &token.token_type) {
                        Some(TokenType::Identifier) => pos += 2,
                        _ => return false,
                    }
                }
                Some(TokenType::LeftBracket) => {
                    let mut depth = 0usize;
                    loop {
                        match self.tokens.get(pos).map(|token| &token.token_type) {
                            Some(TokenType::LeftBracket) => depth += 1,
                            Some(TokenType::RightBracket) => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            Some(TokenType::Eof) | None => return false,
                            _ => {}
                        }
                        pos += 1;
                    }
                    pos += 1;
                }
                _ => return false,
            }
        }
    }

    fn assignment_statement(&mut self) -> Result<Stmt, ParseError> {
        let target = self.postfix()?;
        self.consume(TokenType::Equal, "Expected '=' in assignment")?;
        let value = self.expression()?;
        let (priority, debug) = self.terminator();

        Ok(Stmt::Assignment {
            span: target.span().to(self.previous().span),
            target,
            value,
            priority,
            debug,
        })
    }

    fn expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.expression()?;
        let (priority, debug) = self.terminator();

        Ok(Stmt::Expression {
            span: expr.span().to(self.previous().span),
            expr,
            priority,
            debug,
        })
    }

    pub fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or()
    }

    fn binary(left: Expr, operator: BinaryOp, right: Expr) -> Expr {
        let span = left.span().to(right.span());
        Expr::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            span,
        }
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.and()?;

        while self.match_types(&[TokenType::OrOr]) {
            let right = self.and()?;
            expr = Self::binary(expr, BinaryOp::Or, right);
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;

        while self.match_types(&[TokenType::AndAnd]) {
            let right = self.equality()?;
            expr = Self::binary(expr, BinaryOp::And, right);
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.comparison()?;

        while self.match_types(&[
            TokenType::Equal,
            TokenType::EqualEqual,
            TokenType::EqualEqualEqual,
            TokenType::EqualEqualEqualEqual,
            TokenType::BangEqual,
        ]) {
            let operator = match self.previous().token_type {
                TokenType::Equal => BinaryOp::VeryLooseEqual,
                TokenType::EqualEqual => BinaryOp::LooseEqual,
                TokenType::EqualEqualEqual => BinaryOp::StrictEqual,
                TokenType::EqualEqualEqualEqual => BinaryOp::SuperStrictEqual,
                _ => BinaryOp::NotEqual,
            };
            let right = self.comparison()?;
            expr = Self::binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.term()?;

        while self.match_types(&[
            TokenType::Less,
            TokenType::LessEqual,
            TokenType::Greater,
            TokenType::GreaterEqual,
        ]) {
            let operator = match self.previous().token_type {
                TokenType::Less => BinaryOp::Less,
                TokenType::LessEqual => BinaryOp::LessEqual,
                TokenType::Greater => BinaryOp::Greater,
                _ => BinaryOp::GreaterEqual,
            };
            let right = self.term()?;
            expr = Self::binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.factor()?;

        while self.match_types(&[TokenType::Plus, TokenType::Minus]) {
            let operator = if self.previous().token_type == TokenType::Plus {
                BinaryOp::Add
            } else {
                BinaryOp::Subtract
            };
            let right = self.factor()?;
            expr = Self::binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.power()?;

        while self.match_types(&[TokenType::Star, TokenType::Slash, TokenType::Percent]) {
            let operator = match self.previous().token_type {
                TokenType::Star => BinaryOp::Multiply,
                TokenType::Slash => BinaryOp::Divide,
                _ => BinaryOp::Modulo,
            };
            let right = self.power()?;
            expr = Self::binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;

        while self.match_types(&[TokenType::Caret]) {
            let right = self.unary()?;
            expr = Self::binary(expr, BinaryOp::Power, right);
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_types(&[TokenType::Not, TokenType::Minus, TokenType::Plus]) {
            let operator = match self.previous().token_type {
                TokenType::Not => UnaryOp::Not,
                TokenType::Minus => UnaryOp::Negate,
                _ => UnaryOp::Plus,
            };
            let start = self.previous().span;
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                span: start.to(operand.span()),
                operand: Box::new(operand),
            });
        }

        if self.match_types(&[
            TokenType::Previous,
            TokenType::Next,
            TokenType::Current,
            TokenType::Await,
        ]) {
            let keyword = self.previous().clone();
            let target = Box::new(self.unary()?);
            let span = keyword.span.to(target.span());
            return Ok(match keyword.token_type {
                TokenType::Previous => Expr::Previous { target, span },
                TokenType::Next => Expr::Next { target, span },
                TokenType::Current => Expr::Current { target, span },
                _ => Expr::Await { expr: target, span },
            });
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_types(&[TokenType::Dot]) {
                let property = self.consume_identifier("Expected property name after '.'")?;
                expr = Expr::Member {
                    span: expr.span().to(self.previous().span),
                    object: Box::new(expr),
                    property,
                };
            } else if self.match_types(&[TokenType::LeftBracket]) {
                let index = self.expression()?;
                self.consume(TokenType::RightBracket, "Expected ']' after array index")?;
                expr = Expr::Index {
                    span: expr.span().to(self.previous().span),
                    array: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.match_types(&[TokenType::LeftParen]) {
                let args = self.arguments("function arguments")?;
                expr = Expr::Call {
                    span: expr.span().to(self.previous().span),
                    callee: Box::new(expr),
                    args,
                };
            } else if matches!(expr, Expr::Identifier { .. })
                && self.match_types(&[TokenType::PlusPlus, TokenType::MinusMinus])
            {
                let direction = step_direction(&self.previous().token_type);
                expr = Expr::Step {
                    span: expr.span().to(self.previous().span),
                    target: Box::new(expr),
                    direction,
                    prefix: false,
                };
                break;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Comma separated expressions after an already consumed `(`.
    fn arguments(&mut self, context: &str) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();

        if !self.check(&TokenType::RightParen) {
            loop {
                if self.is_at_end() {
                    return Err(self
                        .error_at_current(&format!("Unexpected end of input in {}", context))
                        .with_help("Calls must be closed with ')' after the arguments. Example: print(a, b)!".to_string()));
                }
                args.push(self.expression()?);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, &format!("Expected ')' after {}", context))?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        if self.is_at_end() {
            return Err(self.error_at_current("Unexpected end of input").with_help(
                "Expected an expression here. Check for unmatched parentheses, brackets, or incomplete statements.".to_string(),
            ));
        }

        let token = self.advance().clone();

        match token.token_type {
            TokenType::Number => Ok(Expr::Literal {
                value: number_literal(&token)?,
                span: token.span,
            }),
            TokenType::String => string_literal(&token),
            TokenType::Boolean => Ok(Expr::Literal {
                value: Literal::Bool(token.lexeme.eq_ignore_ascii_case("true")),
                span: token.span,
            }),
            TokenType::Maybe => Ok(Expr::Literal {
                value: Literal::Maybe,
                span: token.span,
            }),
            TokenType::Identifier => Ok(match token.lexeme.as_str() {
                "undefined" => Expr::Literal {
                    value: Literal::Undefined,
                    span: token.span,
                },
                "null" => Expr::Literal {
                    value: Literal::Null,
                    span: token.span,
                },
                _ => Expr::Identifier {
                    name: token.lexeme,
                    span: token.span,
                },
            }),
            TokenType::LeftBracket => self.array_literal(token.span),
            TokenType::LeftParen => {
                // Parentheses only group
                let expr = self.expression()?;
                self.consume_with_help(
                    TokenType::RightParen,
                    "Expected ')' after expression",
                    "Every opening parenthesis '(' must have a matching closing parenthesis ')'.".to_string(),
                )?;
                Ok(expr)
            }
            TokenType::Use => {
                self.consume(TokenType::LeftParen, "Expected '(' after 'use'")?;
                let initial = self.expression()?;
                self.consume(TokenType::RightParen, "Expected ')' after use argument")?;
                Ok(Expr::Use {
                    initial: Box::new(initial),
                    span: token.span.to(self.previous().span),
                })
            }
            TokenType::New => {
                let class_name = self.consume_identifier("Expected class name after 'new'")?;
                self.consume(TokenType::LeftParen, "Expected '(' after class name")?;
                let args = self.arguments("new arguments")?;
                Ok(Expr::New {
                    class_name,
                    args,
                    span: token.span.to(self.previous().span),
                })
            }
            TokenType::PlusPlus | TokenType::MinusMinus => {
                let target = self.primary()?;
                Ok(Expr::Step {
                    span: token.span.to(target.span()),
                    target: Box::new(target),
                    direction: step_direction(&token.token_type),
                    prefix: true,
                })
            }
            _ => {
                let help_msg = match token.token_type {
                    TokenType::RightParen => "Found ')' without matching '('. Check for unbalanced parentheses.",
                    TokenType::RightBrace => "Found '}' without matching '{'. Check for unbalanced braces.",
                    TokenType::RightBracket => "Found ']' without matching '['. Check for unbalanced brackets.",
                    TokenType::Exclamation | TokenType::Question => {
                        "A terminator ends a statement; it cannot start an expression."
                    }
                    _ => "Expected a literal value, variable, or parenthesized expression here.",
                };

                Err(ParseError::new(
                    format!("Unexpected token {:?} '{}'", token.token_type, token.lexeme),
                    token.line,
                    token.column,
                    token.span,
                )
                .with_help(help_msg.to_string()))
            }
        }
    }

    fn array_literal(&mut self, start: Span) -> Result<Expr, ParseError> {
        let mut elements = Vec::new();

        if !self.check(&TokenType::RightBracket) {
            loop {
                elements.push(self.expression()?);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        self.consume_with_help(
            TokenType::RightBracket,
            "Expected ']' after array elements",
            "Array literals must be closed with ']' after the opening '['. Example: [1, 2, 3]".to_string(),
        )?;
        Ok(Expr::Array {
            elements,
            span: start.to(self.previous().span),
        })
    }

    fn match_types(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            false
        } else {
            &self.peek().token_type == token_type
        }
    }

    fn check_next(&self, token_type: &TokenType) -> bool {
        self.tokens
            .get(self.current + 1)
            .is_some_and(|token| &token.token_type == token_type)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    pub fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.current.min(last)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn error_at_current(&self, message: &str) -> ParseError {
        let token = self.peek();
        ParseError::new(message.to_string(), token.line, token.column, token.span)
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<&Token, ParseError> {
        if self.check(&token_type) {
            Ok(self.advance())
        } else {
            let found = &self.peek().lexeme;
            let message = if self.is_at_end() {
                format!("{}, found end of input", message)
            } else {
                format!("{}, found '{}'", message, found)
            };
            Err(self.error_at_current(&message))
        }
    }

    fn consume_with_help(&mut self, token_type: TokenType, message: &str, help: String) -> Result<&Token, ParseError> {
        self.consume(token_type, message)
            .map_err(|error| error.with_help(help))
    }

    fn consume_identifier(&mut self, message: &str) -> Result<String, ParseError> {
        Ok(self.consume(TokenType::Identifier, message)?.lexeme.clone())
    }
}

fn step_direction(token_type: &TokenType) -> StepDirection {
    if *token_type == TokenType::PlusPlus {
        StepDirection::Increment
    } else {
        StepDirection::Decrement
    }
}

fn number_literal(token: &Token) -> Result<Literal, ParseError> {
    let text = token.lexeme.as_str();
    let invalid = || {
        ParseError::new(
            format!("Invalid number literal '{}'", text),
            token.line,
            token.column,
            token.span,
        )
    };

    if text.contains('/') {
        Ok(Literal::Fraction(text.to_string()))
    } else if text.contains('.') {
        text.parse::<f64>().map(Literal::Float).map_err(|_| invalid())
    } else {
        match text.parse::<i64>() {
            Ok(value) => Ok(Literal::Int(value)),
            Err(_) => text.parse::<f64>().map(Literal::Float).map_err(|_| invalid()),
        }
    }
}

/// Splits `${expr}`, `£{expr}`, `¥{expr}` and `{expr}€` out of a string token.
fn string_literal(token: &Token) -> Result<Expr, ParseError> {
    let chars: Vec<char> = token.lexeme.chars().collect();
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if matches!(c, '$' | '£' | '¥') && chars.get(i + 1) == Some(&'{') {
            if let Some(close) = matching_brace(&chars, i + 1) {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                let expr = embedded_expression(&chars[i + 2..close], token)?;
                segments.push(Segment::Expr { expr, currency: c });
                i = close + 1;
                continue;
            }
        }

        if c == '{' {
            if let Some(close) = matching_brace(&chars, i) {
                if chars.get(close + 1) == Some(&'€') {
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    let expr = embedded_expression(&chars[i + 1..close], token)?;
                    segments.push(Segment::Expr { expr, currency: '€' });
                    i = close + 2;
                    continue;
                }
            }
        }

        text.push(c);
        i += 1;
    }

    if segments.is_empty() {
        return Ok(Expr::Literal {
            value: Literal::Str(token.lexeme.clone()),
            span: token.span,
        });
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(Expr::Interpolation {
        segments,
        span: token.span,
    })
}

fn matching_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, c) in chars[open..].iter().enumerate() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn embedded_expression(chars: &[char], token: &Token) -> Result<Expr, ParseError> {
    let source: String = chars.iter().collect();
    let invalid = |message: &str| {
        ParseError::new(
            format!("Invalid interpolation '{}': {}", source, message),
            token.line,
            token.column,
            token.span,
        )
    };

    let mut parser = Parser::new(tokenize(&source));
    if parser.is_at_end() {
        return Err(invalid("empty expression"));
    }
    let expr = parser.expression().map_err(|error| invalid(&error.message))?;
    if !parser.is_at_end() {
        return Err(invalid("trailing tokens"));
    }
    Ok(expr)
}
