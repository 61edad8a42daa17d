//! JavaScript parser
//!
//! A recursive descent parser producing the [`crate::ast`] tree for the
//! subset of JavaScript the sandbox executes. Syntax outside that subset
//! (generators, labels, modules, `with`) is rejected with a `SyntaxError`
//! rather than silently misparsed, so learners get a clear message.

use std::rc::Rc;

use crate::ast::*;
use crate::error::{Error, Result, SourceLocation};
use crate::lexer::numeric::parse_numeric_literal;
use crate::lexer::{Keyword, Lexer, Token, TokenKind};

/// Deepest syntactic nesting accepted. Each level of parentheses, blocks or
/// operands counts; the limit sits far above anything hand-written.
const MAX_NESTING: usize = 1000;
/// Remaining native stack below which parsing switches to a new segment
const STACK_RED_ZONE: usize = 256 * 1024;
/// Size of each additional stack segment
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Parser state flags
#[derive(Debug, Clone, Copy, Default)]
struct ParserFlags {
    in_function: bool,
    in_async: bool,
    in_loop: bool,
    in_switch: bool,
    /// Inside a class body, where `super` is meaningful
    in_class: bool,
    /// Parsing the head of a `for` statement, where `in` ends an expression
    no_in: bool,
}

/// A recursive descent parser for JavaScript
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token<'src>>,
    pos: usize,
    flags: ParserFlags,
    /// `var` names collected for each enclosing function (innermost last)
    var_scopes: Vec<Vec<String>>,
    /// Current syntactic nesting, bounded by [`MAX_NESTING`]
    depth: usize,
}

impl<'src> Parser<'src> {
    /// Create a new parser from source code
    pub fn new(source: &'src str) -> Result<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
            flags: ParserFlags::default(),
            var_scopes: Vec::new(),
            depth: 0,
        })
    }

    /// Parse the source as a complete script
    pub fn parse_program(&mut self) -> Result<Program> {
        self.var_scopes.push(Vec::new());
        let mut body = Vec::new();
        while !self.is_eof() {
            body.push(self.parse_statement()?);
        }
        let var_names = self.var_scopes.pop().unwrap_or_default();
        Ok(Program { body, var_names })
    }

    /// Parse a single expression
    pub fn parse_expression(&mut self) -> Result<Expression> {
        let expr = self.parse_sequence_expression()?;
        if !self.is_eof() {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    // ========== Token Access ==========

    fn current(&self) -> &Token<'src> {
        &self.tokens[self.pos]
    }

    fn peek(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn is_eof(&self) -> bool {
        self.peek() == TokenKind::Eof
    }

    fn location(&self) -> SourceLocation {
        self.current().location
    }

    fn error(&self, message: impl Into<String>, location: SourceLocation) -> Error {
        Error::parse_error_with_context(message, location, self.source)
    }

    /// Error for the current token, worded the way engines word it
    fn unexpected(&self) -> Error {
        let token = self.current();
        let message = match token.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::StringLiteral => "Unexpected string".to_string(),
            TokenKind::NumberLiteral => "Unexpected number".to_string(),
            TokenKind::Identifier => format!("Unexpected identifier '{}'", token.text),
            _ => format!("Unexpected token '{}'", token.text),
        };
        self.error(message, token.location)
    }

    /// Parse one level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.check_depth(0)?;
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || parse(self));
        self.depth -= 1;
        result
    }

    /// Fail when `extra` more levels (a left-nested operator or member
    /// chain being built) would pass [`MAX_NESTING`]
    fn check_depth(&self, extra: usize) -> Result<()> {
        if self.depth + extra >= MAX_NESTING {
            let loc = self.location();
            return Err(self.error("Maximum nesting depth exceeded", loc));
        }
        Ok(())
    }

    fn advance(&mut self) -> Token<'src> {
        let token = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'src>> {
        if self.peek() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> bool {
        self.consume(TokenKind::Keyword(keyword))
    }

    /// Automatic semicolon insertion: an explicit `;`, a `}`, end of input or
    /// a line break all terminate a statement.
    fn consume_semicolon(&mut self) -> Result<()> {
        if self.consume(TokenKind::Semicolon)
            || matches!(self.peek(), TokenKind::RightBrace | TokenKind::Eof)
            || self.current().newline_before
        {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn is_identifier_token(kind: TokenKind) -> bool {
        match kind {
            TokenKind::Identifier => true,
            TokenKind::Keyword(kw) => kw.is_contextual(),
            _ => false,
        }
    }

    fn parse_identifier(&mut self) -> Result<String> {
        if Self::is_identifier_token(self.peek()) {
            Ok(self.advance().text.to_string())
        } else {
            Err(self.unexpected())
        }
    }

    /// Identifier after `.`: keywords are allowed
    fn parse_identifier_name(&mut self) -> Result<String> {
        match self.peek() {
            TokenKind::Identifier | TokenKind::Keyword(_) => Ok(self.advance().text.to_string()),
            _ => Err(self.unexpected()),
        }
    }

    fn declare_var_names(&mut self, pattern: &Pattern) {
        if let Some(scope) = self.var_scopes.last_mut() {
            for name in pattern.bound_names() {
                if !scope.contains(&name) {
                    scope.push(name);
                }
            }
        }
    }

    // ========== Statements ==========

    fn parse_statement(&mut self) -> Result<Statement> {
        self.nested(Self::parse_statement_kind)
    }

    fn parse_statement_kind(&mut self) -> Result<Statement> {
        match self.peek() {
            TokenKind::LeftBrace => self.parse_block().map(Statement::Block),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            TokenKind::Keyword(Keyword::Var) => self.parse_declaration_statement(VariableKind::Var),
            TokenKind::Keyword(Keyword::Let) => self.parse_declaration_statement(VariableKind::Let),
            TokenKind::Keyword(Keyword::Const) => {
                self.parse_declaration_statement(VariableKind::Const)
            }
            TokenKind::Keyword(Keyword::Function) => self.parse_function_declaration(false),
            TokenKind::Keyword(Keyword::Async)
                if self.peek_at(1) == TokenKind::Keyword(Keyword::Function)
                    && !self.tokens[self.pos + 1].newline_before =>
            {
                self.advance();
                self.parse_function_declaration(true)
            }
            TokenKind::Keyword(Keyword::Class) => {
                let class = self.parse_class(true)?;
                Ok(Statement::ClassDeclaration(Rc::new(class)))
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement(),
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement(),
            TokenKind::Keyword(Keyword::Do) => self.parse_do_while_statement(),
            TokenKind::Keyword(Keyword::For) => self.parse_for_statement(),
            TokenKind::Keyword(Keyword::Switch) => self.parse_switch_statement(),
            TokenKind::Keyword(Keyword::Break) => self.parse_break_continue(true),
            TokenKind::Keyword(Keyword::Continue) => self.parse_break_continue(false),
            TokenKind::Keyword(Keyword::Return) => self.parse_return_statement(),
            TokenKind::Keyword(Keyword::Throw) => self.parse_throw_statement(),
            TokenKind::Keyword(Keyword::Try) => self.parse_try_statement(),
            TokenKind::Keyword(Keyword::Debugger) => {
                self.advance();
                self.consume_semicolon()?;
                Ok(Statement::Debugger)
            }
            TokenKind::Keyword(Keyword::Import | Keyword::Export) => {
                let loc = self.location();
                Err(self.error("Cannot use import statement outside a module", loc))
            }
            TokenKind::Keyword(Keyword::With) => {
                let loc = self.location();
                Err(self.error("'with' statements are not supported", loc))
            }
            TokenKind::Identifier if self.peek_at(1) == TokenKind::Colon => {
                let loc = self.location();
                Err(self.error("Labeled statements are not supported", loc))
            }
            _ => {
                let expr = self.parse_sequence_expression()?;
                self.consume_semicolon()?;
                Ok(Statement::Expression(expr))
            }
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>> {
        self.expect(TokenKind::LeftBrace)?;
        let mut body = Vec::new();
        while !self.consume(TokenKind::RightBrace) {
            if self.is_eof() {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_declaration_statement(&mut self, kind: VariableKind) -> Result<Statement> {
        self.advance();
        let declaration = self.parse_declarators(kind)?;
        self.consume_semicolon()?;
        Ok(Statement::VariableDeclaration(declaration))
    }

    /// Declarators after the `var`/`let`/`const` keyword
    fn parse_declarators(&mut self, kind: VariableKind) -> Result<VariableDeclaration> {
        let mut declarations = Vec::new();
        loop {
            let id = self.parse_binding_target()?;
            declarations.push(self.finish_declarator(kind, id)?);
            if !self.consume(TokenKind::Comma) {
                break;
            }
        }
        Ok(VariableDeclaration { kind, declarations })
    }

    fn finish_declarator(&mut self, kind: VariableKind, id: Pattern) -> Result<VariableDeclarator> {
        let loc = self.location();
        let init = if self.consume(TokenKind::Equals) {
            Some(self.parse_assignment_expression()?)
        } else {
            None
        };
        if init.is_none() {
            if kind == VariableKind::Const {
                return Err(self.error("Missing initializer in const declaration", loc));
            }
            if !matches!(id, Pattern::Identifier(_)) {
                return Err(self.error("Missing initializer in destructuring declaration", loc));
            }
        }
        if kind == VariableKind::Var {
            self.declare_var_names(&id);
        }
        Ok(VariableDeclarator { id, init })
    }

    // ========== Patterns ==========

    /// Identifier, array pattern or object pattern
    fn parse_binding_target(&mut self) -> Result<Pattern> {
        match self.peek() {
            TokenKind::LeftBracket => self.nested(Self::parse_array_pattern),
            TokenKind::LeftBrace => self.nested(Self::parse_object_pattern),
            _ => Ok(Pattern::Identifier(self.parse_identifier()?)),
        }
    }

    /// Binding target with an optional `= default`
    fn parse_binding_element(&mut self) -> Result<Pattern> {
        let target = self.parse_binding_target()?;
        if self.consume(TokenKind::Equals) {
            let default = self.parse_assignment_expression()?;
            return Ok(Pattern::Default {
                target: Box::new(target),
                default: Box::new(default),
            });
        }
        Ok(target)
    }

    fn parse_array_pattern(&mut self) -> Result<Pattern> {
        self.expect(TokenKind::LeftBracket)?;
        let mut elements = Vec::new();
        let mut rest = None;
        loop {
            match self.peek() {
                TokenKind::RightBracket => break,
                TokenKind::Comma => {
                    self.advance();
                    elements.push(None);
                    continue;
                }
                TokenKind::DotDotDot => {
                    self.advance();
                    rest = Some(Box::new(self.parse_binding_target()?));
                    break;
                }
                _ => elements.push(Some(self.parse_binding_element()?)),
            }
            if !self.consume(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightBracket)?;
        Ok(Pattern::Array { elements, rest })
    }

    fn parse_object_pattern(&mut self) -> Result<Pattern> {
        self.expect(TokenKind::LeftBrace)?;
        let mut properties = Vec::new();
        let mut rest = None;
        while self.peek() != TokenKind::RightBrace {
            if self.consume(TokenKind::DotDotDot) {
                rest = Some(Box::new(Pattern::Identifier(self.parse_identifier()?)));
                break;
            }
            let shorthand = Self::is_identifier_token(self.peek());
            let key = self.parse_property_key()?;
            let value = if self.consume(TokenKind::Colon) {
                self.parse_binding_element()?
            } else {
                let PropertyKey::Static(name) = &key else {
                    return Err(self.unexpected());
                };
                if !shorthand {
                    return Err(self.unexpected());
                }
                let target = Pattern::Identifier(name.clone());
                if self.consume(TokenKind::Equals) {
                    Pattern::Default {
                        target: Box::new(target),
                        default: Box::new(self.parse_assignment_expression()?),
                    }
                } else {
                    target
                }
            };
            properties.push(PatternProperty { key, value });
            if !self.consume(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightBrace)?;
        Ok(Pattern::Object { properties, rest })
    }

    fn parse_property_key(&mut self) -> Result<PropertyKey> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Identifier | TokenKind::Keyword(_) => {
                self.advance();
                Ok(PropertyKey::Static(token.text.to_string()))
            }
            TokenKind::StringLiteral => {
                self.advance();
                Ok(PropertyKey::Static(cook_string(strip_quotes(token.text))))
            }
            TokenKind::NumberLiteral => {
                self.advance();
                let value = self.number_value(&token)?;
                Ok(PropertyKey::Static(canonical_number_key(value)))
            }
            TokenKind::LeftBracket => {
                self.advance();
                let saved = self.flags.no_in;
                self.flags.no_in = false;
                let expr = self.parse_assignment_expression();
                self.flags.no_in = saved;
                let expr = expr?;
                self.expect(TokenKind::RightBracket)?;
                Ok(PropertyKey::Computed(Box::new(expr)))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Reinterpret an already parsed expression as an assignment target
    fn expression_to_pattern(&self, expr: Expression, loc: SourceLocation) -> Result<Pattern> {
        match expr {
            Expression::Identifier(name) => Ok(Pattern::Identifier(name)),
            member @ (Expression::Member { optional: false, .. } | Expression::SuperMember(_)) => {
                Ok(Pattern::Member(Box::new(member)))
            }
            Expression::Array(items) => {
                let mut elements = Vec::new();
                let mut rest = None;
                let count = items.len();
                for (i, item) in items.into_iter().enumerate() {
                    match item {
                        None => elements.push(None),
                        Some(Argument::Expression(e)) => {
                            elements.push(Some(self.expression_to_pattern(e, loc)?))
                        }
                        Some(Argument::Spread(e)) if i + 1 == count => {
                            rest = Some(Box::new(self.expression_to_pattern(e, loc)?));
                        }
                        Some(Argument::Spread(_)) => {
                            return Err(self.error("Rest element must be last element", loc))
                        }
                    }
                }
                Ok(Pattern::Array { elements, rest })
            }
            Expression::Object(props) => {
                let mut properties = Vec::new();
                let mut rest = None;
                for prop in props {
                    match prop {
                        ObjectProperty::KeyValue(key, value) => properties.push(PatternProperty {
                            key,
                            value: self.expression_to_pattern(value, loc)?,
                        }),
                        ObjectProperty::Spread(e) => {
                            rest = Some(Box::new(self.expression_to_pattern(e, loc)?))
                        }
                        _ => return Err(self.error("Invalid destructuring assignment target", loc)),
                    }
                }
                Ok(Pattern::Object { properties, rest })
            }
            Expression::Assignment {
                operator: AssignmentOperator::Assign,
                target,
                value,
            } => Ok(Pattern::Default {
                target,
                default: value,
            }),
            _ => Err(self.error("Invalid left-hand side in assignment", loc)),
        }
    }

    // ========== Functions and classes ==========

    fn parse_function_declaration(&mut self, is_async: bool) -> Result<Statement> {
        let function = self.parse_function(is_async, true)?;
        Ok(Statement::FunctionDeclaration(Rc::new(function)))
    }

    /// `function name(params) { body }` with the `async` prefix already consumed
    fn parse_function(&mut self, is_async: bool, require_name: bool) -> Result<Function> {
        let location = self.location();
        self.expect(TokenKind::Keyword(Keyword::Function))?;
        if self.peek() == TokenKind::Star {
            return Err(self.error("Generator functions are not supported", location));
        }
        let name = if Self::is_identifier_token(self.peek()) {
            Some(self.parse_identifier()?)
        } else if require_name {
            return Err(self.error("Function statements require a function name", location));
        } else {
            None
        };
        self.parse_function_rest(name, FunctionKind::Normal, is_async, location)
    }

    /// Parameters and body of any non-arrow function
    fn parse_function_rest(
        &mut self,
        name: Option<String>,
        kind: FunctionKind,
        is_async: bool,
        location: SourceLocation,
    ) -> Result<Function> {
        let saved = self.flags;
        self.flags = ParserFlags {
            in_function: true,
            in_async: is_async,
            in_class: saved.in_class && kind != FunctionKind::Normal,
            ..ParserFlags::default()
        };
        self.var_scopes.push(Vec::new());

        let result = self.parse_params_and_block();

        let var_names = self.var_scopes.pop().unwrap_or_default();
        self.flags = saved;
        let (params, rest, body) = result?;
        Ok(Function {
            name,
            params,
            rest,
            body: FunctionBody::Block(body),
            kind,
            is_async,
            var_names,
            location,
        })
    }

    fn parse_params_and_block(&mut self) -> Result<(Vec<Pattern>, Option<Pattern>, Vec<Statement>)> {
        let (params, rest) = self.parse_function_params()?;
        let body = self.parse_block()?;
        Ok((params, rest, body))
    }

    fn parse_function_params(&mut self) -> Result<(Vec<Pattern>, Option<Pattern>)> {
        self.expect(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        let mut rest = None;
        while self.peek() != TokenKind::RightParen {
            if self.consume(TokenKind::DotDotDot) {
                rest = Some(self.parse_binding_target()?);
                break;
            }
            params.push(self.parse_binding_element()?);
            if !self.consume(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok((params, rest))
    }

    fn parse_class(&mut self, require_name: bool) -> Result<Class> {
        let location = self.location();
        self.expect(TokenKind::Keyword(Keyword::Class))?;
        let name = if Self::is_identifier_token(self.peek()) {
            Some(self.parse_identifier()?)
        } else if require_name {
            return Err(self.error("Class statements require a class name", location));
        } else {
            None
        };
        let superclass = if self.consume_keyword(Keyword::Extends) {
            Some(self.parse_left_hand_side_expression()?)
        } else {
            None
        };

        let saved = self.flags;
        self.flags.in_class = true;
        let body = self.parse_class_body();
        self.flags = saved;
        let (constructor, members) = body?;

        Ok(Class {
            name,
            superclass,
            constructor,
            members,
        })
    }

    #[allow(clippy::type_complexity)]
    fn parse_class_body(&mut self) -> Result<(Option<Rc<Function>>, Vec<ClassMember>)> {
        self.expect(TokenKind::LeftBrace)?;
        let mut constructor = None;
        let mut members = Vec::new();

        while !self.consume(TokenKind::RightBrace) {
            if self.is_eof() {
                return Err(self.unexpected());
            }
            if self.consume(TokenKind::Semicolon) {
                continue;
            }
            let location = self.location();
            let is_static = self.peek() == TokenKind::Keyword(Keyword::Static)
                && !matches!(self.peek_at(1), TokenKind::LeftParen | TokenKind::Equals);
            if is_static {
                self.advance();
            }
            let (kind, is_async) = self.parse_method_prefix();
            if self.peek() == TokenKind::Star {
                return Err(self.error("Generator methods are not supported", location));
            }
            let key = self.parse_property_key()?;

            if self.peek() == TokenKind::LeftParen {
                let is_constructor = !is_static
                    && kind == MethodKind::Method
                    && matches!(&key, PropertyKey::Static(k) if k == "constructor");
                let fn_kind = if is_constructor {
                    FunctionKind::Constructor
                } else {
                    FunctionKind::Method
                };
                let name = match &key {
                    PropertyKey::Static(k) => Some(k.clone()),
                    PropertyKey::Computed(_) => None,
                };
                let function = Rc::new(self.parse_function_rest(name, fn_kind, is_async, location)?);
                if is_constructor {
                    if constructor.is_some() {
                        return Err(self.error("A class may only have one constructor", location));
                    }
                    constructor = Some(function);
                } else {
                    members.push(ClassMember::Method {
                        key,
                        kind,
                        is_static,
                        function,
                    });
                }
            } else {
                let value = if self.consume(TokenKind::Equals) {
                    Some(self.parse_field_initializer()?)
                } else {
                    None
                };
                self.consume_semicolon()?;
                members.push(ClassMember::Field {
                    key,
                    is_static,
                    value,
                });
            }
        }
        Ok((constructor, members))
    }

    /// Field initializers see `this` like a method body does
    fn parse_field_initializer(&mut self) -> Result<Expression> {
        let saved = self.flags;
        self.flags.in_function = true;
        self.flags.in_async = false;
        let value = self.parse_assignment_expression();
        self.flags = saved;
        value
    }

    /// `get`, `set` and `async` prefixes of a method definition. They are
    /// ordinary property names when followed by `(`, `:`, `=` or `,`.
    fn parse_method_prefix(&mut self) -> (MethodKind, bool) {
        let next_is_key = !matches!(
            self.peek_at(1),
            TokenKind::LeftParen
                | TokenKind::Colon
                | TokenKind::Equals
                | TokenKind::Comma
                | TokenKind::RightBrace
                | TokenKind::Semicolon
        );
        match self.peek() {
            TokenKind::Keyword(Keyword::Get) if next_is_key => {
                self.advance();
                (MethodKind::Getter, false)
            }
            TokenKind::Keyword(Keyword::Set) if next_is_key => {
                self.advance();
                (MethodKind::Setter, false)
            }
            TokenKind::Keyword(Keyword::Async)
                if next_is_key && !self.tokens[self.pos + 1].newline_before =>
            {
                self.advance();
                (MethodKind::Method, true)
            }
            _ => (MethodKind::Method, false),
        }
    }

    // ========== Control flow ==========

    fn parse_if_statement(&mut self) -> Result<Statement> {
        self.advance();
        self.expect(TokenKind::LeftParen)?;
        let test = self.parse_sequence_expression()?;
        self.expect(TokenKind::RightParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.consume_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_loop_body(&mut self) -> Result<Box<Statement>> {
        let saved = self.flags.in_loop;
        self.flags.in_loop = true;
        let body = self.parse_statement();
        self.flags.in_loop = saved;
        Ok(Box::new(body?))
    }

    fn parse_while_statement(&mut self) -> Result<Statement> {
        self.advance();
        self.expect(TokenKind::LeftParen)?;
        let test = self.parse_sequence_expression()?;
        self.expect(TokenKind::RightParen)?;
        let body = self.parse_loop_body()?;
        Ok(Statement::While { test, body })
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement> {
        self.advance();
        let body = self.parse_loop_body()?;
        if !self.consume_keyword(Keyword::While) {
            return Err(self.unexpected());
        }
        self.expect(TokenKind::LeftParen)?;
        let test = self.parse_sequence_expression()?;
        self.expect(TokenKind::RightParen)?;
        self.consume(TokenKind::Semicolon);
        Ok(Statement::DoWhile { body, test })
    }

    fn parse_for_statement(&mut self) -> Result<Statement> {
        let location = self.location();
        self.advance();
        if self.peek() == TokenKind::Keyword(Keyword::Await) {
            return Err(self.error("for await is not supported", location));
        }
        self.expect(TokenKind::LeftParen)?;

        let saved_no_in = self.flags.no_in;
        self.flags.no_in = true;
        let head = self.parse_for_head();
        self.flags.no_in = saved_no_in;
        let init = match head? {
            ForHead::Each { left, of, right } => {
                self.expect(TokenKind::RightParen)?;
                let body = self.parse_loop_body()?;
                return Ok(if of {
                    Statement::ForOf { left, right, body }
                } else {
                    Statement::ForIn { left, right, body }
                });
            }
            ForHead::Init(init) => init,
        };

        self.expect(TokenKind::Semicolon)?;
        let test = if self.peek() == TokenKind::Semicolon {
            None
        } else {
            Some(self.parse_sequence_expression()?)
        };
        self.expect(TokenKind::Semicolon)?;
        let update = if self.peek() == TokenKind::RightParen {
            None
        } else {
            Some(self.parse_sequence_expression()?)
        };
        self.expect(TokenKind::RightParen)?;
        let body = self.parse_loop_body()?;
        Ok(Statement::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_for_head(&mut self) -> Result<ForHead> {
        let location = self.location();
        let kind = match self.peek() {
            TokenKind::Semicolon => return Ok(ForHead::Init(None)),
            TokenKind::Keyword(Keyword::Var) => Some(VariableKind::Var),
            TokenKind::Keyword(Keyword::Let) => Some(VariableKind::Let),
            TokenKind::Keyword(Keyword::Const) => Some(VariableKind::Const),
            _ => None,
        };

        if let Some(kind) = kind {
            self.advance();
            let target = self.parse_binding_target()?;
            if let Some(of) = self.consume_for_each_keyword() {
                if kind == VariableKind::Var {
                    self.declare_var_names(&target);
                }
                let right = self.parse_for_each_right(of)?;
                return Ok(ForHead::Each {
                    left: ForBinding::Declaration(kind, target),
                    of,
                    right,
                });
            }
            let mut declarations = vec![self.finish_declarator(kind, target)?];
            while self.consume(TokenKind::Comma) {
                let id = self.parse_binding_target()?;
                declarations.push(self.finish_declarator(kind, id)?);
            }
            return Ok(ForHead::Init(Some(ForInit::Declaration(VariableDeclaration {
                kind,
                declarations,
            }))));
        }

        let expr = self.parse_sequence_expression()?;
        if let Some(of) = self.consume_for_each_keyword() {
            let target = self.expression_to_pattern(expr, location)?;
            let right = self.parse_for_each_right(of)?;
            return Ok(ForHead::Each {
                left: ForBinding::Target(target),
                of,
                right,
            });
        }
        Ok(ForHead::Init(Some(ForInit::Expression(expr))))
    }

    /// `Some(true)` after `of`, `Some(false)` after `in`
    fn consume_for_each_keyword(&mut self) -> Option<bool> {
        if self.consume_keyword(Keyword::Of) {
            Some(true)
        } else if self.consume_keyword(Keyword::In) {
            Some(false)
        } else {
            None
        }
    }

    fn parse_for_each_right(&mut self, of: bool) -> Result<Expression> {
        self.flags.no_in = false;
        if of {
            self.parse_assignment_expression()
        } else {
            self.parse_sequence_expression()
        }
    }

    fn parse_switch_statement(&mut self) -> Result<Statement> {
        self.advance();
        self.expect(TokenKind::LeftParen)?;
        let discriminant = self.parse_sequence_expression()?;
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::LeftBrace)?;

        let saved = self.flags.in_switch;
        self.flags.in_switch = true;
        let cases = self.parse_switch_cases();
        self.flags.in_switch = saved;

        Ok(Statement::Switch {
            discriminant,
            cases: cases?,
        })
    }

    fn parse_switch_cases(&mut self) -> Result<Vec<SwitchCase>> {
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.consume(TokenKind::RightBrace) {
            let location = self.location();
            let test = if self.consume_keyword(Keyword::Case) {
                Some(self.parse_sequence_expression()?)
            } else if self.consume_keyword(Keyword::Default) {
                if seen_default {
                    return Err(self.error(
                        "More than one default clause in switch statement",
                        location,
                    ));
                }
                seen_default = true;
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect(TokenKind::Colon)?;
            let mut consequent = Vec::new();
            while !matches!(
                self.peek(),
                TokenKind::Keyword(Keyword::Case | Keyword::Default)
                    | TokenKind::RightBrace
                    | TokenKind::Eof
            ) {
                consequent.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, consequent });
        }
        Ok(cases)
    }

    fn parse_break_continue(&mut self, is_break: bool) -> Result<Statement> {
        let location = self.location();
        self.advance();
        if Self::is_identifier_token(self.peek()) && !self.current().newline_before {
            return Err(self.error("Labeled statements are not supported", location));
        }
        if is_break && !(self.flags.in_loop || self.flags.in_switch) {
            return Err(self.error("Illegal break statement", location));
        }
        if !is_break && !self.flags.in_loop {
            return Err(self.error(
                "Illegal continue statement: no surrounding iteration statement",
                location,
            ));
        }
        self.consume_semicolon()?;
        Ok(if is_break {
            Statement::Break
        } else {
            Statement::Continue
        })
    }

    fn parse_return_statement(&mut self) -> Result<Statement> {
        let location = self.location();
        self.advance();
        if !self.flags.in_function {
            return Err(self.error("Illegal return statement", location));
        }
        let argument = if matches!(
            self.peek(),
            TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
        ) || self.current().newline_before
        {
            None
        } else {
            Some(self.parse_sequence_expression()?)
        };
        self.consume_semicolon()?;
        Ok(Statement::Return(argument))
    }

    fn parse_throw_statement(&mut self) -> Result<Statement> {
        self.advance();
        if self.current().newline_before {
            let loc = self.location();
            return Err(self.error("Illegal newline after throw", loc));
        }
        let argument = self.parse_sequence_expression()?;
        self.consume_semicolon()?;
        Ok(Statement::Throw(argument))
    }

    fn parse_try_statement(&mut self) -> Result<Statement> {
        let location = self.location();
        self.advance();
        let block = self.parse_block()?;

        let handler = if self.consume_keyword(Keyword::Catch) {
            let param = if self.consume(TokenKind::LeftParen) {
                let param = self.parse_binding_target()?;
                self.expect(TokenKind::RightParen)?;
                Some(param)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };

        let finalizer = if self.consume_keyword(Keyword::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try", location));
        }
        Ok(Statement::Try {
            block,
            handler,
            finalizer,
        })
    }

    // ========== Expressions ==========

    fn parse_sequence_expression(&mut self) -> Result<Expression> {
        let first = self.parse_assignment_expression()?;
        if self.peek() != TokenKind::Comma {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.consume(TokenKind::Comma) {
            expressions.push(self.parse_assignment_expression()?);
        }
        Ok(Expression::Sequence(expressions))
    }

    fn parse_assignment_expression(&mut self) -> Result<Expression> {
        self.nested(Self::parse_assignment)
    }

    fn parse_assignment(&mut self) -> Result<Expression> {
        if let Some(arrow) = self.try_parse_arrow_function()? {
            return Ok(arrow);
        }

        let location = self.location();
        let left = self.parse_conditional_expression()?;
        let Some(operator) = assignment_operator(self.peek()) else {
            return Ok(left);
        };
        self.advance();

        let target = if operator == AssignmentOperator::Assign {
            self.expression_to_pattern(left, location)?
        } else {
            match left {
                Expression::Identifier(name) => Pattern::Identifier(name),
                member @ (Expression::Member { optional: false, .. }
                | Expression::SuperMember(_)) => Pattern::Member(Box::new(member)),
                _ => {
                    return Err(self.error("Invalid left-hand side in assignment", location));
                }
            }
        };
        let value = self.parse_assignment_expression()?;
        Ok(Expression::Assignment {
            operator,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    /// Scan ahead from a `(` to its matching `)` and report whether `=>`
    /// follows on the same line.
    fn is_arrow_ahead(&self, open: usize) -> bool {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => depth += 1,
                TokenKind::TemplateHead => depth += 1,
                TokenKind::TemplateTail => depth = depth.saturating_sub(1),
                TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return self.tokens.get(i + 1).is_some_and(|next| {
                            next.kind == TokenKind::Arrow && !next.newline_before
                        });
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
        }
        false
    }

    fn try_parse_arrow_function(&mut self) -> Result<Option<Expression>> {
        let location = self.location();
        let is_async = self.peek() == TokenKind::Keyword(Keyword::Async)
            && !self.tokens.get(self.pos + 1).is_some_and(|t| t.newline_before)
            && match self.peek_at(1) {
                TokenKind::LeftParen => self.is_arrow_ahead(self.pos + 1),
                kind => Self::is_identifier_token(kind) && self.peek_at(2) == TokenKind::Arrow,
            };
        let offset = usize::from(is_async);

        let simple = Self::is_identifier_token(self.peek_at(offset))
            && self.peek_at(offset + 1) == TokenKind::Arrow;
        let parenthesized =
            self.peek_at(offset) == TokenKind::LeftParen && self.is_arrow_ahead(self.pos + offset);
        if !simple && !parenthesized {
            return Ok(None);
        }
        if is_async {
            self.advance();
        }

        let saved = self.flags;
        self.flags = ParserFlags {
            in_function: true,
            in_async: is_async,
            in_class: saved.in_class,
            ..ParserFlags::default()
        };
        self.var_scopes.push(Vec::new());
        let parsed = self.parse_arrow_rest(simple);
        let var_names = self.var_scopes.pop().unwrap_or_default();
        self.flags = saved;
        let (params, rest, body) = parsed?;

        Ok(Some(Expression::Function(Rc::new(Function {
            name: None,
            params,
            rest,
            body,
            kind: FunctionKind::Arrow,
            is_async,
            var_names,
            location,
        }))))
    }

    fn parse_arrow_rest(
        &mut self,
        simple: bool,
    ) -> Result<(Vec<Pattern>, Option<Pattern>, FunctionBody)> {
        let (params, rest) = if simple {
            (vec![Pattern::Identifier(self.parse_identifier()?)], None)
        } else {
            self.parse_function_params()?
        };
        self.expect(TokenKind::Arrow)?;
        let body = if self.peek() == TokenKind::LeftBrace {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expression(Box::new(self.parse_assignment_expression()?))
        };
        Ok((params, rest, body))
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression> {
        let test = self.parse_binary_expression(0)?;
        if !self.consume(TokenKind::Question) {
            return Ok(test);
        }
        let saved = self.flags.no_in;
        self.flags.no_in = false;
        let consequent = self.parse_assignment_expression();
        self.flags.no_in = saved;
        let consequent = consequent?;
        self.expect(TokenKind::Colon)?;
        let alternate = self.parse_assignment_expression()?;
        Ok(Expression::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_binary_expression(&mut self, min_prec: u8) -> Result<Expression> {
        let mut left = self.parse_unary_expression()?;

        for chain in 0.. {
            let prec = self.binary_precedence();
            if prec == 0 || prec < min_prec {
                break;
            }
            self.check_depth(chain)?;
            let kind = self.advance().kind;
            // `**` is right-associative
            let next_min = if kind == TokenKind::StarStar { prec } else { prec + 1 };
            let right = Box::new(self.nested(|p| p.parse_binary_expression(next_min))?);
            let left_box = Box::new(left);

            left = match kind {
                TokenKind::AmpersandAmpersand => logical(LogicalOperator::And, left_box, right),
                TokenKind::PipePipe => logical(LogicalOperator::Or, left_box, right),
                TokenKind::QuestionQuestion => {
                    logical(LogicalOperator::NullishCoalescing, left_box, right)
                }
                other => Expression::Binary {
                    operator: binary_operator(other).ok_or_else(|| self.unexpected())?,
                    left: left_box,
                    right,
                },
            };
        }
        Ok(left)
    }

    fn binary_precedence(&self) -> u8 {
        match self.peek() {
            TokenKind::PipePipe | TokenKind::QuestionQuestion => 4,
            TokenKind::AmpersandAmpersand => 5,
            TokenKind::Pipe => 6,
            TokenKind::Caret => 7,
            TokenKind::Ampersand => 8,
            TokenKind::EqualsEquals
            | TokenKind::BangEquals
            | TokenKind::EqualsEqualsEquals
            | TokenKind::BangEqualsEquals => 9,
            TokenKind::Less
            | TokenKind::Greater
            | TokenKind::LessEquals
            | TokenKind::GreaterEquals
            | TokenKind::Keyword(Keyword::Instanceof) => 10,
            TokenKind::Keyword(Keyword::In) if !self.flags.no_in => 10,
            TokenKind::LessLess | TokenKind::GreaterGreater | TokenKind::GreaterGreaterGreater => {
                11
            }
            TokenKind::Plus | TokenKind::Minus => 12,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 13,
            TokenKind::StarStar => 14,
            _ => 0,
        }
    }

    fn parse_unary_expression(&mut self) -> Result<Expression> {
        self.nested(Self::parse_unary)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let location = self.location();
        let operator = match self.peek() {
            TokenKind::Minus => Some(UnaryOperator::Minus),
            TokenKind::Plus => Some(UnaryOperator::Plus),
            TokenKind::Bang => Some(UnaryOperator::Not),
            TokenKind::Tilde => Some(UnaryOperator::BitwiseNot),
            TokenKind::Keyword(Keyword::Typeof) => Some(UnaryOperator::Typeof),
            TokenKind::Keyword(Keyword::Void) => Some(UnaryOperator::Void),
            TokenKind::Keyword(Keyword::Delete) => Some(UnaryOperator::Delete),
            _ => None,
        };
        if let Some(operator) = operator {
            self.advance();
            let argument = Box::new(self.parse_unary_expression()?);
            return Ok(Expression::Unary { operator, argument });
        }

        match self.peek() {
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let operator = if self.advance().kind == TokenKind::PlusPlus {
                    UpdateOperator::Increment
                } else {
                    UpdateOperator::Decrement
                };
                let argument = self.parse_unary_expression()?;
                self.check_update_target(&argument, location)?;
                Ok(Expression::Update {
                    operator,
                    prefix: true,
                    argument: Box::new(argument),
                })
            }
            TokenKind::Keyword(Keyword::Await) => {
                if !self.flags.in_async {
                    return Err(self.error(
                        "await is only valid in async functions and the top level bodies of modules",
                        location,
                    ));
                }
                self.advance();
                let argument = self.parse_unary_expression()?;
                Ok(Expression::Await(Box::new(argument)))
            }
            TokenKind::Keyword(Keyword::Yield) => {
                Err(self.error("Generator functions are not supported", location))
            }
            _ => self.parse_postfix_expression(),
        }
    }

    fn check_update_target(&self, target: &Expression, location: SourceLocation) -> Result<()> {
        match target {
            Expression::Identifier(_) | Expression::Member { optional: false, .. } => Ok(()),
            _ => Err(self.error(
                "Invalid left-hand side expression in update operation",
                location,
            )),
        }
    }

    fn parse_postfix_expression(&mut self) -> Result<Expression> {
        let location = self.location();
        let expr = self.parse_left_hand_side_expression()?;
        if matches!(self.peek(), TokenKind::PlusPlus | TokenKind::MinusMinus)
            && !self.current().newline_before
        {
            self.check_update_target(&expr, location)?;
            let operator = if self.advance().kind == TokenKind::PlusPlus {
                UpdateOperator::Increment
            } else {
                UpdateOperator::Decrement
            };
            return Ok(Expression::Update {
                operator,
                prefix: false,
                argument: Box::new(expr),
            });
        }
        Ok(expr)
    }

    fn parse_left_hand_side_expression(&mut self) -> Result<Expression> {
        let mut expr = match self.peek() {
            TokenKind::Keyword(Keyword::New) => self.parse_new_expression()?,
            TokenKind::Keyword(Keyword::Super) => self.parse_super()?,
            _ => self.parse_primary_expression()?,
        };

        let mut chain = 0;
        loop {
            self.check_depth(chain)?;
            chain += 1;
            expr = match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    Expression::Member {
                        object: Box::new(expr),
                        property: MemberProperty::Identifier(self.parse_identifier_name()?),
                        optional: false,
                    }
                }
                TokenKind::LeftBracket => Expression::Member {
                    object: Box::new(expr),
                    property: self.parse_computed_property()?,
                    optional: false,
                },
                TokenKind::LeftParen => Expression::Call {
                    callee: Box::new(expr),
                    arguments: self.parse_arguments()?,
                    optional: false,
                },
                TokenKind::QuestionDot => {
                    self.advance();
                    match self.peek() {
                        TokenKind::LeftParen => Expression::Call {
                            callee: Box::new(expr),
                            arguments: self.parse_arguments()?,
                            optional: true,
                        },
                        TokenKind::LeftBracket => Expression::Member {
                            object: Box::new(expr),
                            property: self.parse_computed_property()?,
                            optional: true,
                        },
                        _ => Expression::Member {
                            object: Box::new(expr),
                            property: MemberProperty::Identifier(self.parse_identifier_name()?),
                            optional: true,
                        },
                    }
                }
                TokenKind::TemplateLiteral | TokenKind::TemplateHead
                    if !self.current().newline_before =>
                {
                    let loc = self.location();
                    return Err(self.error("Tagged templates are not supported", loc));
                }
                _ => return Ok(expr),
            };
        }
    }

    fn parse_computed_property(&mut self) -> Result<MemberProperty> {
        self.expect(TokenKind::LeftBracket)?;
        let saved = self.flags.no_in;
        self.flags.no_in = false;
        let property = self.parse_sequence_expression();
        self.flags.no_in = saved;
        let property = property?;
        self.expect(TokenKind::RightBracket)?;
        Ok(MemberProperty::Computed(Box::new(property)))
    }

    /// `new Callee(args)`; member accesses bind tighter than the call
    fn parse_new_expression(&mut self) -> Result<Expression> {
        let location = self.location();
        self.advance();
        if self.peek() == TokenKind::Dot {
            return Err(self.error("new.target is not supported", location));
        }
        let mut callee = if self.peek() == TokenKind::Keyword(Keyword::New) {
            self.nested(Self::parse_new_expression)?
        } else {
            self.parse_primary_expression()?
        };
        for chain in 0.. {
            self.check_depth(chain)?;
            callee = match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    Expression::Member {
                        object: Box::new(callee),
                        property: MemberProperty::Identifier(self.parse_identifier_name()?),
                        optional: false,
                    }
                }
                TokenKind::LeftBracket => Expression::Member {
                    object: Box::new(callee),
                    property: self.parse_computed_property()?,
                    optional: false,
                },
                _ => break,
            };
        }
        let arguments = if self.peek() == TokenKind::LeftParen {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expression::New {
            callee: Box::new(callee),
            arguments,
        })
    }

    fn parse_super(&mut self) -> Result<Expression> {
        let location = self.location();
        self.advance();
        if !self.flags.in_class {
            return Err(self.error("'super' keyword unexpected here", location));
        }
        match self.peek() {
            TokenKind::LeftParen => Ok(Expression::SuperCall(self.parse_arguments()?)),
            TokenKind::Dot => {
                self.advance();
                Ok(Expression::SuperMember(MemberProperty::Identifier(
                    self.parse_identifier_name()?,
                )))
            }
            TokenKind::LeftBracket => Ok(Expression::SuperMember(self.parse_computed_property()?)),
            _ => Err(self.error("'super' keyword unexpected here", location)),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>> {
        self.expect(TokenKind::LeftParen)?;
        let saved = self.flags.no_in;
        self.flags.no_in = false;
        let mut arguments = Vec::new();
        let result = loop {
            if self.consume(TokenKind::RightParen) {
                break Ok(());
            }
            let spread = self.consume(TokenKind::DotDotDot);
            let value = match self.parse_assignment_expression() {
                Ok(value) => value,
                Err(e) => break Err(e),
            };
            arguments.push(if spread {
                Argument::Spread(value)
            } else {
                Argument::Expression(value)
            });
            if !self.consume(TokenKind::Comma) {
                break self.expect(TokenKind::RightParen).map(|_| ());
            }
        };
        self.flags.no_in = saved;
        result.map(|_| arguments)
    }

    fn parse_primary_expression(&mut self) -> Result<Expression> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::NumberLiteral => {
                self.advance();
                Ok(Expression::Number(self.number_value(&token)?))
            }
            TokenKind::StringLiteral => {
                self.advance();
                Ok(Expression::String(cook_string(strip_quotes(token.text))))
            }
            TokenKind::TemplateLiteral | TokenKind::TemplateHead => self.parse_template_literal(),
            TokenKind::RegexLiteral => {
                self.advance();
                let close = token.text.rfind('/').unwrap_or(0);
                Ok(Expression::Regex {
                    pattern: token.text[1..close].to_string(),
                    flags: token.text[close + 1..].to_string(),
                })
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expression::Boolean(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expression::Boolean(false))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expression::Null)
            }
            TokenKind::Keyword(Keyword::This) => {
                self.advance();
                Ok(Expression::This)
            }
            TokenKind::Keyword(Keyword::Function) => {
                let function = self.parse_function(false, false)?;
                Ok(Expression::Function(Rc::new(function)))
            }
            TokenKind::Keyword(Keyword::Async)
                if self.peek_at(1) == TokenKind::Keyword(Keyword::Function) =>
            {
                self.advance();
                let function = self.parse_function(true, false)?;
                Ok(Expression::Function(Rc::new(function)))
            }
            TokenKind::Keyword(Keyword::Class) => {
                let class = self.parse_class(false)?;
                Ok(Expression::Class(Rc::new(class)))
            }
            TokenKind::LeftParen => {
                self.advance();
                let saved = self.flags.no_in;
                self.flags.no_in = false;
                let expr = self.parse_sequence_expression();
                self.flags.no_in = saved;
                let expr = expr?;
                self.expect(TokenKind::RightParen)?;
                Ok(expr)
            }
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftBrace => self.parse_object_literal(),
            kind if Self::is_identifier_token(kind) => {
                self.advance();
                Ok(Expression::Identifier(token.text.to_string()))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expression> {
        self.expect(TokenKind::LeftBracket)?;
        let saved = self.flags.no_in;
        self.flags.no_in = false;
        let result = self.parse_array_elements();
        self.flags.no_in = saved;
        result.map(Expression::Array)
    }

    fn parse_array_elements(&mut self) -> Result<Vec<Option<Argument>>> {
        let mut elements = Vec::new();
        loop {
            match self.peek() {
                TokenKind::RightBracket => {
                    self.advance();
                    return Ok(elements);
                }
                TokenKind::Comma => {
                    self.advance();
                    elements.push(None);
                    continue;
                }
                TokenKind::DotDotDot => {
                    self.advance();
                    elements.push(Some(Argument::Spread(self.parse_assignment_expression()?)));
                }
                _ => elements.push(Some(Argument::Expression(
                    self.parse_assignment_expression()?,
                ))),
            }
            if !self.consume(TokenKind::Comma) {
                self.expect(TokenKind::RightBracket)?;
                return Ok(elements);
            }
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expression> {
        self.expect(TokenKind::LeftBrace)?;
        let saved = self.flags.no_in;
        self.flags.no_in = false;
        let result = self.parse_object_properties();
        self.flags.no_in = saved;
        result.map(Expression::Object)
    }

    fn parse_object_properties(&mut self) -> Result<Vec<ObjectProperty>> {
        let mut properties = Vec::new();
        while !self.consume(TokenKind::RightBrace) {
            properties.push(self.parse_object_property()?);
            if !self.consume(TokenKind::Comma) {
                self.expect(TokenKind::RightBrace)?;
                break;
            }
        }
        Ok(properties)
    }

    fn parse_object_property(&mut self) -> Result<ObjectProperty> {
        let location = self.location();
        if self.consume(TokenKind::DotDotDot) {
            return Ok(ObjectProperty::Spread(self.parse_assignment_expression()?));
        }

        let (kind, is_async) = self.parse_method_prefix();
        if self.peek() == TokenKind::Star {
            return Err(self.error("Generator methods are not supported", location));
        }
        let shorthand = Self::is_identifier_token(self.peek());
        let key = self.parse_property_key()?;
        let name = match &key {
            PropertyKey::Static(k) => Some(k.clone()),
            PropertyKey::Computed(_) => None,
        };

        if self.peek() == TokenKind::LeftParen {
            let function =
                Rc::new(self.parse_function_rest(name, FunctionKind::Method, is_async, location)?);
            return Ok(match kind {
                MethodKind::Getter => ObjectProperty::Getter(key, function),
                MethodKind::Setter => ObjectProperty::Setter(key, function),
                MethodKind::Method => ObjectProperty::KeyValue(key, Expression::Function(function)),
            });
        }

        if self.consume(TokenKind::Colon) {
            let value = self.parse_assignment_expression()?;
            return Ok(ObjectProperty::KeyValue(key, value));
        }

        match name {
            Some(name) if shorthand => {
                // `{a = 1}` only makes sense as a destructuring target
                if self.consume(TokenKind::Equals) {
                    let default = self.parse_assignment_expression()?;
                    return Ok(ObjectProperty::KeyValue(
                        key,
                        Expression::Assignment {
                            operator: AssignmentOperator::Assign,
                            target: Box::new(Pattern::Identifier(name)),
                            value: Box::new(default),
                        },
                    ));
                }
                Ok(ObjectProperty::KeyValue(key, Expression::Identifier(name)))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_template_literal(&mut self) -> Result<Expression> {
        let head = self.advance();
        if head.kind == TokenKind::TemplateLiteral {
            return Ok(Expression::Template {
                quasis: vec![cook_template(&head.text[1..head.text.len() - 1])],
                expressions: Vec::new(),
            });
        }

        let mut quasis = vec![cook_template(&head.text[1..head.text.len() - 2])];
        let mut expressions = Vec::new();
        let saved = self.flags.no_in;
        self.flags.no_in = false;
        let result = loop {
            match self.parse_sequence_expression() {
                Ok(expr) => expressions.push(expr),
                Err(e) => break Err(e),
            }
            let part = self.advance();
            match part.kind {
                TokenKind::TemplateMiddle => {
                    quasis.push(cook_template(&part.text[1..part.text.len() - 2]));
                }
                TokenKind::TemplateTail => {
                    quasis.push(cook_template(&part.text[1..part.text.len() - 1]));
                    break Ok(());
                }
                _ => {
                    let loc = part.location;
                    break Err(self.error("Unterminated template literal", loc));
                }
            }
        };
        self.flags.no_in = saved;
        result?;
        Ok(Expression::Template {
            quasis,
            expressions,
        })
    }

    fn number_value(&self, token: &Token<'src>) -> Result<f64> {
        parse_numeric_literal(token.text)
            .ok_or_else(|| self.error("Invalid or unexpected token", token.location))
    }
}

enum ForHead {
    Init(Option<ForInit>),
    Each {
        left: ForBinding,
        of: bool,
        right: Expression,
    },
}

fn logical(operator: LogicalOperator, left: Box<Expression>, right: Box<Expression>) -> Expression {
    Expression::Logical {
        operator,
        left,
        right,
    }
}

fn binary_operator(kind: TokenKind) -> Option<BinaryOperator> {
    Some(match kind {
        TokenKind::Plus => BinaryOperator::Add,
        TokenKind::Minus => BinaryOperator::Sub,
        TokenKind::Star => BinaryOperator::Mul,
        TokenKind::Slash => BinaryOperator::Div,
        TokenKind::Percent => BinaryOperator::Mod,
        TokenKind::StarStar => BinaryOperator::Pow,
        TokenKind::EqualsEquals => BinaryOperator::Eq,
        TokenKind::BangEquals => BinaryOperator::Ne,
        TokenKind::EqualsEqualsEquals => BinaryOperator::StrictEq,
        TokenKind::BangEqualsEquals => BinaryOperator::StrictNe,
        TokenKind::Less => BinaryOperator::Lt,
        TokenKind::LessEquals => BinaryOperator::Le,
        TokenKind::Greater => BinaryOperator::Gt,
        TokenKind::GreaterEquals => BinaryOperator::Ge,
        TokenKind::LessLess => BinaryOperator::Shl,
        TokenKind::GreaterGreater => BinaryOperator::Shr,
        TokenKind::GreaterGreaterGreater => BinaryOperator::UShr,
        TokenKind::Ampersand => BinaryOperator::BitwiseAnd,
        TokenKind::Pipe => BinaryOperator::BitwiseOr,
        TokenKind::Caret => BinaryOperator::BitwiseXor,
        TokenKind::Keyword(Keyword::In) => BinaryOperator::In,
        TokenKind::Keyword(Keyword::Instanceof) => BinaryOperator::Instanceof,
        _ => return None,
    })
}

fn assignment_operator(kind: TokenKind) -> Option<AssignmentOperator> {
    let op = match kind {
        TokenKind::Equals => return Some(AssignmentOperator::Assign),
        TokenKind::AmpersandAmpersandEquals => {
            return Some(AssignmentOperator::Logical(LogicalOperator::And))
        }
        TokenKind::PipePipeEquals => return Some(AssignmentOperator::Logical(LogicalOperator::Or)),
        TokenKind::QuestionQuestionEquals => {
            return Some(AssignmentOperator::Logical(
                LogicalOperator::NullishCoalescing,
            ))
        }
        TokenKind::PlusEquals => BinaryOperator::Add,
        TokenKind::MinusEquals => BinaryOperator::Sub,
        TokenKind::StarEquals => BinaryOperator::Mul,
        TokenKind::StarStarEquals => BinaryOperator::Pow,
        TokenKind::SlashEquals => BinaryOperator::Div,
        TokenKind::PercentEquals => BinaryOperator::Mod,
        TokenKind::LessLessEquals => BinaryOperator::Shl,
        TokenKind::GreaterGreaterEquals => BinaryOperator::Shr,
        TokenKind::GreaterGreaterGreaterEquals => BinaryOperator::UShr,
        TokenKind::AmpersandEquals => BinaryOperator::BitwiseAnd,
        TokenKind::PipeEquals => BinaryOperator::BitwiseOr,
        TokenKind::CaretEquals => BinaryOperator::BitwiseXor,
        _ => return None,
    };
    Some(AssignmentOperator::Binary(op))
}

fn strip_quotes(text: &str) -> &str {
    &text[1..text.len() - 1]
}

/// Integral keys print without a fraction, like property keys in engines
fn canonical_number_key(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Resolve escape sequences in a string literal body
fn cook_string(inner: &str) -> String {
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('b') => result.push('\u{8}'),
            Some('f') => result.push('\u{c}'),
            Some('v') => result.push('\u{b}'),
            Some('0') => result.push('\0'),
            Some('\n') => {}
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Some(c) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    result.push(c);
                }
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|&c| c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                if let Some(c) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    result.push(c);
                }
            }
            Some(other) => result.push(other),
            None => {}
        }
    }
    result
}

/// Template text uses the same escapes as strings plus `` \` `` and `\$`
fn cook_template(inner: &str) -> String {
    cook_string(&inner.replace("\r\n", "\n"))
}

/// Parse a script
pub fn parse(source: &str) -> Result<Program> {
    Parser::new(source)?.parse_program()
}

/// Parse a single expression
pub fn parse_expression(source: &str) -> Result<Expression> {
    Parser::new(source)?.parse_expression()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_statement(source: &str) -> Statement {
        parse(source).unwrap().body.into_iter().next().unwrap()
    }

    #[test]
    fn test_parse_literals() {
        assert!(matches!(parse_expression("42").unwrap(), Expression::Number(n) if n == 42.0));
        assert!(
            matches!(parse_expression("'a\\nb'").unwrap(), Expression::String(s) if s == "a\nb")
        );
        assert!(matches!(
            parse_expression("/a+/g").unwrap(),
            Expression::Regex { pattern, flags } if pattern == "a+" && flags == "g"
        ));
    }

    #[test]
    fn test_binary_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        match expr {
            Expression::Binary {
                operator: BinaryOperator::Add,
                right,
                ..
            } => assert!(matches!(
                *right,
                Expression::Binary {
                    operator: BinaryOperator::Mul,
                    ..
                }
            )),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_exponent_is_right_associative() {
        let expr = parse_expression("2 ** 3 ** 2").unwrap();
        let Expression::Binary { left, .. } = expr else {
            panic!("expected binary");
        };
        assert!(matches!(*left, Expression::Number(n) if n == 2.0));
    }

    #[test]
    fn test_var_names_hoisted_per_function() {
        let program = parse("var a = 1; function f() { var b; for (var i of []) {} }").unwrap();
        assert_eq!(program.var_names, vec!["a"]);
        let Statement::FunctionDeclaration(f) = &program.body[1] else {
            panic!("expected function");
        };
        assert_eq!(f.var_names, vec!["b", "i"]);
    }

    #[test]
    fn test_arrow_functions() {
        for source in ["x => x * 2", "(a, b) => a + b", "async () => { await p; }", "() => ({})"] {
            let expr = parse_expression(source).unwrap();
            assert!(
                matches!(&expr, Expression::Function(f) if f.kind == FunctionKind::Arrow),
                "{}",
                source
            );
        }
        // A parenthesized expression is not an arrow
        assert!(matches!(
            parse_expression("(1 + 2) * 3").unwrap(),
            Expression::Binary { .. }
        ));
    }

    #[test]
    fn test_destructuring_declaration() {
        let Statement::VariableDeclaration(decl) =
            first_statement("const { a, b: [c, ...d], e = 5 } = obj;")
        else {
            panic!("expected declaration");
        };
        assert_eq!(decl.declarations[0].id.bound_names(), vec!["a", "c", "d", "e"]);
    }

    #[test]
    fn test_destructuring_assignment_swap() {
        let Statement::Expression(Expression::Assignment { target, .. }) =
            first_statement("[a, b] = [b, a];")
        else {
            panic!("expected assignment");
        };
        assert!(matches!(*target, Pattern::Array { .. }));
    }

    #[test]
    fn test_class_members() {
        let Statement::ClassDeclaration(class) = first_statement(
            "class Counter extends Base { count = 0; static create() { return new Counter(); } get value() { return this.count; } constructor() { super(); } }",
        ) else {
            panic!("expected class");
        };
        assert!(class.superclass.is_some());
        assert!(class.constructor.is_some());
        assert_eq!(class.members.len(), 3);
    }

    #[test]
    fn test_template_with_substitutions() {
        let Expression::Template {
            quasis,
            expressions,
        } = parse_expression("`sum: ${a + b}!`").unwrap()
        else {
            panic!("expected template");
        };
        assert_eq!(quasis, vec!["sum: ", "!"]);
        assert_eq!(expressions.len(), 1);
    }

    #[test]
    fn test_for_variants() {
        assert!(matches!(first_statement("for (let i = 0; i < 3; i++) {}"), Statement::For { .. }));
        assert!(matches!(first_statement("for (const k in obj) {}"), Statement::ForIn { .. }));
        assert!(matches!(first_statement("for (x of xs) {}"), Statement::ForOf { .. }));
    }

    #[test]
    fn test_asi_on_newline() {
        let program = parse("let a = 1\nlet b = 2\na + b").unwrap();
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_optional_chain() {
        let expr = parse_expression("user?.profile?.name").unwrap();
        assert!(matches!(expr, Expression::Member { optional: true, .. }));
    }

    #[test]
    fn test_syntax_errors_are_reported() {
        for source in [
            "let = ;",
            "function* gen() {}",
            "return 1",
            "break;",
            "outer: for (;;) {}",
            "const x;",
            "await x",
            "if (x {",
        ] {
            let err = parse(source).unwrap_err();
            assert!(err.to_string().starts_with("SyntaxError"), "{}: {}", source, err);
        }
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        for source in [
            format!("const v = {}1{};", "(".repeat(1500), ")".repeat(1500)),
            format!("{}{}", "{".repeat(20_000), "}".repeat(20_000)),
            format!("x = {}1;", "!".repeat(5000)),
            format!("x = a{};", ".b".repeat(5000)),
            format!("x = 1{};", " + 1".repeat(5000)),
            format!("const {}a{} = v;", "[".repeat(3000), "]".repeat(3000)),
        ] {
            let err = parse(&source).unwrap_err();
            assert!(
                err.to_string().contains("Maximum nesting depth exceeded"),
                "{}",
                err
            );
        }
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let source = format!("const v = {}1{};", "(".repeat(100), ")".repeat(100));
        assert!(parse(&source).is_ok());
        assert!(parse(&format!("x = 1{};", " + 1".repeat(200))).is_ok());
    }

    #[test]
    fn test_unexpected_end_of_input() {
        let err = parse("function f() {").unwrap_err();
        assert!(err.to_string().contains("Unexpected end of input"));
    }
}
