//! Statement and expression evaluation
//!
//! A direct walk over the AST. Statements produce a [`Flow`] describing how
//! control leaves them; expressions produce values. Both return
//! [`Interrupt`] for exceptions and host aborts.

use super::interpreter::{
    Flow, Interpreter, Interrupt, JsResult, PreferredType, STACK_GROW_SIZE, STACK_RED_ZONE,
};
use super::object::{ClassInfo, Closure, FieldDefinition, Object, ObjectKind, PropertyFlags};
use super::scope::{self, Assignment, FunctionFrame, Lookup, Scope, ScopeRef};
use super::value::{to_int32, to_uint32, Value};
use crate::ast::*;
use crate::error::{messages, ErrorKind};
use std::rc::Rc;

/// How a pattern stores the values it destructures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    /// Plain assignment to existing bindings or properties
    Assign,
    /// Declaration in the current scope (`let`, `const`, parameters)
    Initialize { mutable: bool },
}

/// A resolved assignment target
enum Reference {
    Binding(String),
    Property(Value, String),
}

const SUPER_BEFORE_THIS: &str = "Must call super constructor in derived class before accessing 'this' or returning from derived constructor";

impl Interpreter {
    // ========== Programs and statements ==========

    /// Run a script, returning the value of its last expression statement
    pub fn exec_program(&mut self, program: &Program) -> JsResult<Value> {
        {
            let mut global = self.scope.borrow_mut();
            for name in &program.var_names {
                if !global.has_own(name) {
                    global.declare(name, Value::Undefined, true);
                }
            }
        }
        self.hoist_declarations(&program.body);

        let mut completion = Value::Undefined;
        for statement in &program.body {
            match statement {
                Statement::Expression(expr) => completion = self.eval(expr)?,
                other => {
                    self.exec_statement(other)?;
                }
            }
        }
        Ok(completion)
    }

    /// Put the lexical declarations of `body` into the current scope:
    /// `let`, `const` and classes in their dead zone, functions fully created
    pub(crate) fn hoist_declarations(&mut self, body: &[Statement]) {
        for statement in body {
            match statement {
                Statement::VariableDeclaration(decl) if decl.kind != VariableKind::Var => {
                    let mutable = decl.kind == VariableKind::Let;
                    let mut scope = self.scope.borrow_mut();
                    for declarator in &decl.declarations {
                        for name in declarator.id.bound_names() {
                            scope.declare_uninitialized(&name, mutable);
                        }
                    }
                }
                Statement::ClassDeclaration(class) => {
                    if let Some(name) = &class.name {
                        self.scope.borrow_mut().declare_uninitialized(name, true);
                    }
                }
                Statement::FunctionDeclaration(function) => {
                    let closure = self.create_closure(function, None);
                    if let Some(name) = &function.name {
                        self.scope.borrow_mut().declare(name, closure, true);
                    }
                }
                _ => {}
            }
        }
    }

    /// Run statements in order, stopping at the first abrupt completion
    pub(crate) fn exec_statements(&mut self, statements: &[Statement]) -> JsResult<Flow> {
        for statement in statements {
            match self.exec_statement(statement)? {
                Flow::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Flow::Normal)
    }

    /// Run a block in a fresh child scope
    fn exec_block(&mut self, statements: &[Statement]) -> JsResult<Flow> {
        let block_scope = Scope::child(&self.scope);
        self.with_scope(block_scope, |this| {
            this.hoist_declarations(statements);
            this.exec_statements(statements)
        })
    }

    fn exec_statement(&mut self, statement: &Statement) -> JsResult<Flow> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.exec_statement_kind(statement)
        })
    }

    fn exec_statement_kind(&mut self, statement: &Statement) -> JsResult<Flow> {
        self.tick()?;
        match statement {
            Statement::Expression(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            Statement::VariableDeclaration(decl) => {
                self.exec_declaration(decl)?;
                Ok(Flow::Normal)
            }
            Statement::FunctionDeclaration(_) | Statement::Debugger | Statement::Empty => {
                Ok(Flow::Normal)
            }
            Statement::ClassDeclaration(class) => {
                let value = self.eval_class(class, None)?;
                if let Some(name) = &class.name {
                    self.scope.borrow_mut().initialize(name, value);
                }
                Ok(Flow::Normal)
            }
            Statement::Block(body) => self.exec_block(body),
            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.to_boolean() {
                    self.exec_statement(consequent)
                } else if let Some(alternate) = alternate {
                    self.exec_statement(alternate)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::While { test, body } => {
                while self.eval(test)?.to_boolean() {
                    match self.exec_statement(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::DoWhile { body, test } => {
                loop {
                    match self.exec_statement(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(test)?.to_boolean() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::For {
                init,
                test,
                update,
                body,
            } => self.exec_for(init.as_ref(), test.as_ref(), update.as_ref(), body),
            Statement::ForIn { left, right, body } => {
                let target = self.eval(right)?;
                let keys = self.enumerable_keys(&target);
                let keys = keys.into_iter().map(Value::String).collect();
                self.exec_for_each(left, keys, body)
            }
            Statement::ForOf { left, right, body } => {
                let iterable = self.eval(right)?;
                let items = self.iterate(&iterable)?;
                self.exec_for_each(left, items, body)
            }
            Statement::Switch {
                discriminant,
                cases,
            } => self.exec_switch(discriminant, cases),
            Statement::Break => Ok(Flow::Break),
            Statement::Continue => Ok(Flow::Continue),
            Statement::Return(argument) => {
                let value = match argument {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Statement::Throw(expr) => {
                let value = self.eval(expr)?;
                Err(Interrupt::Throw(value))
            }
            Statement::Try {
                block,
                handler,
                finalizer,
            } => self.exec_try(block, handler.as_ref(), finalizer.as_deref()),
        }
    }

    fn exec_declaration(&mut self, decl: &VariableDeclaration) -> JsResult<()> {
        let mode = match decl.kind {
            VariableKind::Var => BindingMode::Assign,
            VariableKind::Let => BindingMode::Initialize { mutable: true },
            VariableKind::Const => BindingMode::Initialize { mutable: false },
        };
        for declarator in &decl.declarations {
            let value = match (&declarator.init, &declarator.id) {
                (Some(init), Pattern::Identifier(name)) => self.eval_named(init, name)?,
                (Some(init), _) => self.eval(init)?,
                // `var x;` leaves an existing value alone
                (None, _) if decl.kind == VariableKind::Var => continue,
                (None, _) => Value::Undefined,
            };
            self.bind_pattern(&declarator.id, value, mode)?;
        }
        Ok(())
    }

    fn exec_for(
        &mut self,
        init: Option<&ForInit>,
        test: Option<&Expression>,
        update: Option<&Expression>,
        body: &Statement,
    ) -> JsResult<Flow> {
        let outer = self.scope.clone();
        let loop_scope = Scope::child(&outer);
        self.with_scope(loop_scope.clone(), |this| {
            match init {
                Some(ForInit::Declaration(decl)) => this.exec_declaration(decl),
                Some(ForInit::Expression(expr)) => this.eval(expr).map(|_| ()),
                None => Ok(()),
            }
        })?;

        // `let` bindings get a fresh copy per iteration so closures capture
        // the value of their own iteration
        let per_iteration = matches!(
            init,
            Some(ForInit::Declaration(decl)) if decl.kind != VariableKind::Var
        );
        let copy_scope = |from: &ScopeRef| {
            let copy = Scope::child(&outer);
            for (name, binding) in from.borrow().bindings() {
                copy.borrow_mut().insert_binding(name, binding);
            }
            copy
        };

        let mut current = if per_iteration {
            copy_scope(&loop_scope)
        } else {
            loop_scope
        };
        loop {
            self.tick()?;
            let flow = self.with_scope(current.clone(), |this| {
                if let Some(test) = test {
                    if !this.eval(test)?.to_boolean() {
                        return Ok(None);
                    }
                }
                this.exec_statement(body).map(Some)
            })?;
            match flow {
                None | Some(Flow::Break) => break,
                Some(Flow::Return(value)) => return Ok(Flow::Return(value)),
                Some(Flow::Normal | Flow::Continue) => {}
            }
            if per_iteration {
                current = copy_scope(&current);
            }
            if let Some(update) = update {
                self.with_scope(current.clone(), |this| this.eval(update))?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for_each(
        &mut self,
        left: &ForBinding,
        items: Vec<Value>,
        body: &Statement,
    ) -> JsResult<Flow> {
        let (pattern, mode) = match left {
            ForBinding::Declaration(VariableKind::Var, pattern) | ForBinding::Target(pattern) => {
                (pattern, BindingMode::Assign)
            }
            ForBinding::Declaration(kind, pattern) => (
                pattern,
                BindingMode::Initialize {
                    mutable: *kind == VariableKind::Let,
                },
            ),
        };
        for item in items {
            self.tick()?;
            let iteration_scope = Scope::child(&self.scope);
            let flow = self.with_scope(iteration_scope, |this| {
                this.bind_pattern(pattern, item, mode)?;
                this.exec_statement(body)
            })?;
            match flow {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    /// Keys visited by `for…in`: own and inherited enumerable properties
    fn enumerable_keys(&self, target: &Value) -> Vec<String> {
        let Value::Object(obj) = target else {
            return self.own_keys(target);
        };
        let mut keys: Vec<String> = Vec::new();
        let mut current = Some(obj.clone());
        while let Some(o) = current {
            for key in o.borrow().own_enumerable_keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            current = o.borrow().prototype.clone();
        }
        keys
    }

    fn exec_switch(&mut self, discriminant: &Expression, cases: &[SwitchCase]) -> JsResult<Flow> {
        let value = self.eval(discriminant)?;
        let switch_scope = Scope::child(&self.scope);
        self.with_scope(switch_scope, |this| {
            for case in cases {
                this.hoist_declarations(&case.consequent);
            }

            let mut start = None;
            for (i, case) in cases.iter().enumerate() {
                if let Some(test) = &case.test {
                    if this.eval(test)?.strict_equals(&value) {
                        start = Some(i);
                        break;
                    }
                }
            }
            let start = start.or_else(|| cases.iter().position(|c| c.test.is_none()));
            let Some(start) = start else {
                return Ok(Flow::Normal);
            };

            for case in &cases[start..] {
                match this.exec_statements(&case.consequent)? {
                    Flow::Normal => {}
                    Flow::Break => return Ok(Flow::Normal),
                    abrupt => return Ok(abrupt),
                }
            }
            Ok(Flow::Normal)
        })
    }

    fn exec_try(
        &mut self,
        block: &[Statement],
        handler: Option<&CatchClause>,
        finalizer: Option<&[Statement]>,
    ) -> JsResult<Flow> {
        let mut result = self.exec_block(block);
        let thrown = match &result {
            Err(Interrupt::Throw(exception)) => Some(exception.clone()),
            _ => None,
        };
        if let (Some(exception), Some(handler)) = (thrown, handler) {
            let catch_scope = Scope::child(&self.scope);
            result = self.with_scope(catch_scope, |this| {
                if let Some(param) = &handler.param {
                    this.bind_pattern(param, exception, BindingMode::Initialize { mutable: true })?;
                }
                this.exec_block(&handler.body)
            });
        }
        if let Some(finalizer) = finalizer {
            // aborts skip `finally`; learner code must not outlive a timeout
            if matches!(result, Err(Interrupt::Abort(_))) {
                return result;
            }
            match self.exec_block(finalizer)? {
                Flow::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }

    // ========== Patterns ==========

    /// Store `value` into `pattern`, destructuring as needed
    pub(crate) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        mode: BindingMode,
    ) -> JsResult<()> {
        match pattern {
            Pattern::Identifier(name) => match mode {
                BindingMode::Assign => self.assign_identifier(name, value),
                BindingMode::Initialize { mutable } => {
                    let mut scope = self.scope.borrow_mut();
                    if scope.has_own(name) {
                        scope.initialize(name, value);
                    } else {
                        scope.declare(name, value, mutable);
                    }
                    Ok(())
                }
            },
            Pattern::Member(expr) => {
                let reference = self.eval_reference(expr)?;
                self.put_reference(reference, value)
            }
            Pattern::Default { target, default } => {
                let value = if value.is_undefined() {
                    match target.as_ref() {
                        Pattern::Identifier(name) => self.eval_named(default, name)?,
                        _ => self.eval(default)?,
                    }
                } else {
                    value
                };
                self.bind_pattern(target, value, mode)
            }
            Pattern::Array { elements, rest } => {
                let items = self.iterate(&value)?;
                for (i, element) in elements.iter().enumerate() {
                    if let Some(element) = element {
                        let item = items.get(i).cloned().unwrap_or_default();
                        self.bind_pattern(element, item, mode)?;
                    }
                }
                if let Some(rest) = rest {
                    let remaining = items.get(elements.len()..).unwrap_or(&[]).to_vec();
                    let array = self.new_array(remaining);
                    self.bind_pattern(rest, array, mode)?;
                }
                Ok(())
            }
            Pattern::Object { properties, rest } => {
                if value.is_nullish() {
                    return Err(self.type_error(format!(
                        "Cannot destructure '{}' as it is {}.",
                        value.to_js_string(),
                        value.to_js_string()
                    )));
                }
                let mut used = Vec::with_capacity(properties.len());
                for property in properties {
                    let key = self.eval_key(&property.key)?;
                    let item = self.get(&value, &key)?;
                    used.push(key);
                    self.bind_pattern(&property.value, item, mode)?;
                }
                if let Some(rest) = rest {
                    let remaining = self.new_object();
                    for key in self.own_keys(&value) {
                        if !used.contains(&key) {
                            let item = self.get(&value, &key)?;
                            remaining
                                .borrow_mut()
                                .define(&key, item, PropertyFlags::DEFAULT);
                        }
                    }
                    self.bind_pattern(rest, Value::Object(remaining), mode)?;
                }
                Ok(())
            }
        }
    }

    fn lookup_identifier(&self, name: &str) -> JsResult<Value> {
        match scope::lookup(&self.scope, name) {
            Lookup::Found(value) => Ok(value),
            Lookup::Uninitialized => Err(self.reference_error(messages::before_init(name))),
            Lookup::Missing => Err(self.reference_error(messages::not_defined(name))),
        }
    }

    fn assign_identifier(&mut self, name: &str, value: Value) -> JsResult<()> {
        match scope::assign(&self.scope, name, value.clone()) {
            Assignment::Assigned => Ok(()),
            Assignment::Constant => Err(self.type_error(messages::CONST_ASSIGNMENT)),
            Assignment::Uninitialized => Err(self.reference_error(messages::before_init(name))),
            Assignment::Missing => {
                // sloppy-mode implicit global
                self.global.borrow_mut().declare(name, value, true);
                Ok(())
            }
        }
    }

    fn eval_reference(&mut self, expr: &Expression) -> JsResult<Reference> {
        match expr {
            Expression::Identifier(name) => Ok(Reference::Binding(name.clone())),
            Expression::Member {
                object, property, ..
            } => {
                let base = self.eval(object)?;
                let key = self.eval_member_key(property)?;
                Ok(Reference::Property(base, key))
            }
            Expression::SuperMember(property) => {
                let this = self.this_value()?;
                let key = self.eval_member_key(property)?;
                Ok(Reference::Property(this, key))
            }
            _ => Err(self.throw(
                ErrorKind::SyntaxError,
                "Invalid left-hand side in assignment",
            )),
        }
    }

    fn pattern_reference(&mut self, pattern: &Pattern) -> JsResult<Reference> {
        match pattern {
            Pattern::Identifier(name) => Ok(Reference::Binding(name.clone())),
            Pattern::Member(expr) => self.eval_reference(expr),
            _ => Err(self.throw(
                ErrorKind::SyntaxError,
                "Invalid left-hand side in assignment",
            )),
        }
    }

    fn get_reference(&mut self, reference: &Reference) -> JsResult<Value> {
        match reference {
            Reference::Binding(name) => self.lookup_identifier(name),
            Reference::Property(base, key) => self.get(base, key),
        }
    }

    fn put_reference(&mut self, reference: Reference, value: Value) -> JsResult<()> {
        match reference {
            Reference::Binding(name) => self.assign_identifier(&name, value),
            Reference::Property(base, key) => self.set(&base, &key, value),
        }
    }

    // ========== Expressions ==========

    /// Evaluate an expression
    pub fn eval(&mut self, expr: &Expression) -> JsResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_expression(expr))
    }

    /// Evaluate `expr`, naming it `name` if it is an anonymous function or
    /// class
    pub(crate) fn eval_named(&mut self, expr: &Expression, name: &str) -> JsResult<Value> {
        match expr {
            Expression::Class(class) if class.name.is_none() => self.eval_class(class, Some(name)),
            _ => {
                let value = self.eval(expr)?;
                if expr.is_anonymous_definition() {
                    self.set_function_name(&value, name);
                }
                Ok(value)
            }
        }
    }

    fn eval_expression(&mut self, expr: &Expression) -> JsResult<Value> {
        match expr {
            Expression::Number(n) => Ok(Value::Number(*n)),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::Boolean(b) => Ok(Value::Boolean(*b)),
            Expression::Null => Ok(Value::Null),
            Expression::Template {
                quasis,
                expressions,
            } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = expressions.get(i) {
                        let value = self.eval(expr)?;
                        out.push_str(&self.to_string(&value)?);
                    }
                }
                Ok(Value::String(out))
            }
            Expression::Regex { pattern, flags } => {
                super::builtins::regexp::create_regexp(self, pattern, flags)
            }
            Expression::Identifier(name) => self.lookup_identifier(name),
            Expression::This => self.this_value(),
            Expression::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        None => values.push(Value::Undefined),
                        Some(Argument::Expression(expr)) => values.push(self.eval(expr)?),
                        Some(Argument::Spread(expr)) => {
                            let iterable = self.eval(expr)?;
                            values.extend(self.iterate(&iterable)?);
                        }
                    }
                }
                Ok(self.new_array(values))
            }
            Expression::Object(properties) => self.eval_object_literal(properties),
            Expression::Function(function) => Ok(self.eval_function_expression(function)),
            Expression::Class(class) => self.eval_class(class, None),
            Expression::Unary { operator, argument } => self.eval_unary(*operator, argument),
            Expression::Update {
                operator,
                prefix,
                argument,
            } => {
                let reference = self.eval_reference(argument)?;
                let old = self.get_reference(&reference)?;
                let old = self.to_number(&old)?;
                let new = match operator {
                    UpdateOperator::Increment => old + 1.0,
                    UpdateOperator::Decrement => old - 1.0,
                };
                self.put_reference(reference, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary_op(*operator, &left, &right)
            }
            Expression::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.eval(left)?;
                if short_circuits(*operator, &left) {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.to_boolean() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expression::Assignment {
                operator,
                target,
                value,
            } => self.eval_assignment(*operator, target, value),
            Expression::Sequence(expressions) => {
                let mut last = Value::Undefined;
                for expr in expressions {
                    last = self.eval(expr)?;
                }
                Ok(last)
            }
            Expression::Member { .. } | Expression::Call { .. } => {
                Ok(self.eval_chain(expr)?.unwrap_or_default())
            }
            Expression::SuperMember(property) => {
                let key = self.eval_member_key(property)?;
                self.super_get(&key)
            }
            Expression::SuperCall(arguments) => self.eval_super_call(arguments),
            Expression::New { callee, arguments } => {
                let constructor = self.eval(callee)?;
                let args = self.eval_arguments(arguments)?;
                if !constructor.is_callable() {
                    return Err(self.type_error(format!(
                        "{} is not a constructor",
                        describe_callee(callee)
                    )));
                }
                self.construct(&constructor, &args, None)
            }
            Expression::Await(argument) => {
                let value = self.eval(argument)?;
                self.await_value(value)
            }
        }
    }

    /// Evaluate a member or call chain. `None` means an optional link
    /// short-circuited the whole chain.
    fn eval_chain(&mut self, expr: &Expression) -> JsResult<Option<Value>> {
        match expr {
            Expression::Member {
                object,
                property,
                optional,
            } => {
                let Some(base) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval_member_key(property)?;
                self.get(&base, &key).map(Some)
            }
            Expression::Call {
                callee,
                arguments,
                optional,
            } => {
                let Some((this, function)) = self.eval_callee(callee)? else {
                    return Ok(None);
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_arguments(arguments)?;
                if !function.is_callable() {
                    return Err(self.type_error(messages::not_a_function(&describe_callee(callee))));
                }
                self.call(&function, this, &args).map(Some)
            }
            other => self.eval(other).map(Some),
        }
    }

    /// The function a call expression invokes, with its `this`
    fn eval_callee(&mut self, callee: &Expression) -> JsResult<Option<(Value, Value)>> {
        match callee {
            Expression::Member {
                object,
                property,
                optional,
            } => {
                let Some(base) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval_member_key(property)?;
                let function = self.get(&base, &key)?;
                Ok(Some((base, function)))
            }
            Expression::SuperMember(property) => {
                let key = self.eval_member_key(property)?;
                let function = self.super_get(&key)?;
                Ok(Some((self.this_value()?, function)))
            }
            other => Ok(self
                .eval_chain(other)?
                .map(|function| (Value::Undefined, function))),
        }
    }

    pub(crate) fn eval_arguments(&mut self, arguments: &[Argument]) -> JsResult<Vec<Value>> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match argument {
                Argument::Expression(expr) => values.push(self.eval(expr)?),
                Argument::Spread(expr) => {
                    let iterable = self.eval(expr)?;
                    values.extend(self.iterate(&iterable)?);
                }
            }
        }
        Ok(values)
    }

    fn eval_member_key(&mut self, property: &MemberProperty) -> JsResult<String> {
        match property {
            MemberProperty::Identifier(name) => Ok(name.clone()),
            MemberProperty::Computed(expr) => {
                let key = self.eval(expr)?;
                self.to_property_key(&key)
            }
        }
    }

    fn eval_key(&mut self, key: &PropertyKey) -> JsResult<String> {
        match key {
            PropertyKey::Static(name) => Ok(name.clone()),
            PropertyKey::Computed(expr) => {
                let key = self.eval(expr)?;
                self.to_property_key(&key)
            }
        }
    }

    /// Current `this`, following arrow functions outwards
    pub(crate) fn this_value(&self) -> JsResult<Value> {
        match scope::with_frame(&self.scope, |frame| frame.this.clone()) {
            Some(Some(this)) => Ok(this),
            Some(None) => Err(self.reference_error(SUPER_BEFORE_THIS)),
            None => Ok(Value::Undefined),
        }
    }

    fn super_get(&mut self, key: &str) -> JsResult<Value> {
        let home = scope::with_frame(&self.scope, |frame| frame.home_object.clone()).flatten();
        let Some(home) = home else {
            return Err(self.throw(ErrorKind::SyntaxError, "'super' keyword unexpected here"));
        };
        let this = self.this_value()?;
        let prototype = home.borrow().prototype.clone();
        match prototype {
            Some(prototype) => self.get_from(&prototype, key, &this),
            None => Ok(Value::Undefined),
        }
    }

    fn eval_super_call(&mut self, arguments: &[Argument]) -> JsResult<Value> {
        let frame = scope::with_frame(&self.scope, |frame| {
            (frame.new_target.clone(), frame.class.clone())
        });
        let (new_target, class) = match frame {
            Some((new_target, Some(class))) if class.parent.is_some() => (new_target, class),
            _ => {
                return Err(self.throw(ErrorKind::SyntaxError, "'super' keyword unexpected here"));
            }
        };
        let parent = class.parent.clone().unwrap_or_default();
        let args = self.eval_arguments(arguments)?;
        let this = self.construct(&parent, &args, new_target.as_ref())?;

        let already_bound = scope::with_frame(&self.scope, |frame| {
            if frame.this.is_some() {
                true
            } else {
                frame.this = Some(this.clone());
                false
            }
        })
        .unwrap_or(false);
        if already_bound {
            return Err(self.reference_error("Super constructor may only be called once"));
        }
        self.initialize_fields(&this, &class)?;
        Ok(Value::Undefined)
    }

    fn eval_function_expression(&mut self, function: &Rc<Function>) -> Value {
        match (&function.name, function.kind) {
            // named function expressions can refer to themselves
            (Some(name), FunctionKind::Normal) => {
                let own_scope = Scope::child(&self.scope);
                let saved = std::mem::replace(&mut self.scope, own_scope.clone());
                let closure = self.create_closure(function, None);
                self.scope = saved;
                own_scope.borrow_mut().declare(name, closure.clone(), false);
                closure
            }
            _ => self.create_closure(function, None),
        }
    }

    fn eval_object_literal(&mut self, properties: &[ObjectProperty]) -> JsResult<Value> {
        let obj = self.new_object();
        for property in properties {
            match property {
                ObjectProperty::KeyValue(key, value) => {
                    let key = self.eval_key(key)?;
                    let value = match value {
                        Expression::Function(f) if f.kind == FunctionKind::Method => {
                            let method = self.create_closure(f, Some(obj.clone()));
                            self.set_function_name(&method, &key);
                            method
                        }
                        other => self.eval_named(other, &key)?,
                    };
                    obj.borrow_mut().define(&key, value, PropertyFlags::DEFAULT);
                }
                ObjectProperty::Getter(key, f) => {
                    let key = self.eval_key(key)?;
                    let getter = self.create_closure(f, Some(obj.clone()));
                    obj.borrow_mut().define_accessor(&key, Some(getter), None);
                    mark_enumerable(&obj, &key);
                }
                ObjectProperty::Setter(key, f) => {
                    let key = self.eval_key(key)?;
                    let setter = self.create_closure(f, Some(obj.clone()));
                    obj.borrow_mut().define_accessor(&key, None, Some(setter));
                    mark_enumerable(&obj, &key);
                }
                ObjectProperty::Spread(expr) => {
                    let source = self.eval(expr)?;
                    for key in self.own_keys(&source) {
                        let value = self.get(&source, &key)?;
                        obj.borrow_mut().define(&key, value, PropertyFlags::DEFAULT);
                    }
                }
            }
        }
        Ok(Value::Object(obj))
    }

    fn eval_unary(&mut self, operator: UnaryOperator, argument: &Expression) -> JsResult<Value> {
        match operator {
            UnaryOperator::Typeof => {
                if let Expression::Identifier(name) = argument {
                    if let Lookup::Missing = scope::lookup(&self.scope, name) {
                        return Ok(Value::from("undefined"));
                    }
                }
                let value = self.eval(argument)?;
                Ok(Value::from(value.type_of()))
            }
            UnaryOperator::Delete => match argument {
                Expression::Member {
                    object, property, ..
                } => {
                    let base = self.eval(object)?;
                    let key = self.eval_member_key(property)?;
                    match base {
                        Value::Object(obj) => Ok(Value::Boolean(obj.borrow_mut().delete(&key))),
                        Value::Undefined | Value::Null => Err(self.type_error(format!(
                            "Cannot convert undefined or null to object (deleting '{}')",
                            key
                        ))),
                        _ => Ok(Value::Boolean(true)),
                    }
                }
                Expression::Identifier(_) => Ok(Value::Boolean(false)),
                other => {
                    self.eval(other)?;
                    Ok(Value::Boolean(true))
                }
            },
            _ => {
                let value = self.eval(argument)?;
                Ok(match operator {
                    UnaryOperator::Minus => Value::Number(-self.to_number(&value)?),
                    UnaryOperator::Plus => Value::Number(self.to_number(&value)?),
                    UnaryOperator::Not => Value::Boolean(!value.to_boolean()),
                    UnaryOperator::BitwiseNot => {
                        Value::Number(f64::from(!to_int32(self.to_number(&value)?)))
                    }
                    _ => Value::Undefined,
                })
            }
        }
    }

    fn eval_assignment(
        &mut self,
        operator: AssignmentOperator,
        target: &Pattern,
        value: &Expression,
    ) -> JsResult<Value> {
        match operator {
            AssignmentOperator::Assign => {
                let result = match target {
                    Pattern::Identifier(name) => self.eval_named(value, name)?,
                    _ => self.eval(value)?,
                };
                self.bind_pattern(target, result.clone(), BindingMode::Assign)?;
                Ok(result)
            }
            AssignmentOperator::Binary(op) => {
                let reference = self.pattern_reference(target)?;
                let current = self.get_reference(&reference)?;
                let rhs = self.eval(value)?;
                let result = self.binary_op(op, &current, &rhs)?;
                self.put_reference(reference, result.clone())?;
                Ok(result)
            }
            AssignmentOperator::Logical(op) => {
                let reference = self.pattern_reference(target)?;
                let current = self.get_reference(&reference)?;
                if short_circuits(op, &current) {
                    return Ok(current);
                }
                let result = match &reference {
                    Reference::Binding(name) => self.eval_named(value, name)?,
                    Reference::Property(..) => self.eval(value)?,
                };
                self.put_reference(reference, result.clone())?;
                Ok(result)
            }
        }
    }

    /// Apply a binary operator to evaluated operands
    pub fn binary_op(
        &mut self,
        operator: BinaryOperator,
        left: &Value,
        right: &Value,
    ) -> JsResult<Value> {
        use BinaryOperator::*;
        Ok(match operator {
            Add => {
                let l = self.to_primitive(left, PreferredType::Default)?;
                let r = self.to_primitive(right, PreferredType::Default)?;
                if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                    Value::String(format!("{}{}", l.to_js_string(), r.to_js_string()))
                } else {
                    Value::Number(l.to_number() + r.to_number())
                }
            }
            Sub | Mul | Div | Mod | Pow => {
                let l = self.to_number(left)?;
                let r = self.to_number(right)?;
                Value::Number(match operator {
                    Sub => l - r,
                    Mul => l * r,
                    Div => l / r,
                    Mod => l % r,
                    _ => js_pow(l, r),
                })
            }
            Eq => Value::Boolean(self.loose_equals(left, right)?),
            Ne => Value::Boolean(!self.loose_equals(left, right)?),
            StrictEq => Value::Boolean(left.strict_equals(right)),
            StrictNe => Value::Boolean(!left.strict_equals(right)),
            Lt | Le | Gt | Ge => {
                let l = self.to_primitive(left, PreferredType::Number)?;
                let r = self.to_primitive(right, PreferredType::Number)?;
                let result = match (&l, &r) {
                    (Value::String(a), Value::String(b)) => match operator {
                        Lt => a < b,
                        Le => a <= b,
                        Gt => a > b,
                        _ => a >= b,
                    },
                    _ => {
                        let (a, b) = (l.to_number(), r.to_number());
                        match operator {
                            Lt => a < b,
                            Le => a <= b,
                            Gt => a > b,
                            _ => a >= b,
                        }
                    }
                };
                Value::Boolean(result)
            }
            Shl | Shr | UShr | BitwiseAnd | BitwiseOr | BitwiseXor => {
                let l = self.to_number(left)?;
                let r = self.to_number(right)?;
                let shift = to_uint32(r) & 31;
                Value::Number(match operator {
                    Shl => f64::from(to_int32(l).wrapping_shl(shift)),
                    Shr => f64::from(to_int32(l) >> shift),
                    UShr => f64::from(to_uint32(l) >> shift),
                    BitwiseAnd => f64::from(to_int32(l) & to_int32(r)),
                    BitwiseOr => f64::from(to_int32(l) | to_int32(r)),
                    _ => f64::from(to_int32(l) ^ to_int32(r)),
                })
            }
            In => {
                let Value::Object(obj) = right else {
                    let key = self.to_string(left)?;
                    return Err(self.type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        key,
                        right.to_js_string()
                    )));
                };
                let key = self.to_property_key(left)?;
                Value::Boolean(self.has_property(obj, &key))
            }
            Instanceof => Value::Boolean(self.instance_of(left, right)?),
        })
    }

    // ========== Classes ==========

    fn eval_class(&mut self, class: &Rc<Class>, name_hint: Option<&str>) -> JsResult<Value> {
        let parent = match &class.superclass {
            Some(expr) => {
                let parent = self.eval(expr)?;
                if !parent.is_callable() {
                    return Err(self.type_error(format!(
                        "Class extends value {} is not a constructor or null",
                        super::inspect::inspect(&parent)
                    )));
                }
                Some(parent)
            }
            None => None,
        };
        let (prototype_parent, constructor_parent) = match &parent {
            Some(parent) => {
                let proto = match self.get(parent, "prototype")? {
                    Value::Object(proto) => Some(proto),
                    Value::Null => None,
                    _ => {
                        return Err(self.type_error(
                            "Class extends value does not have valid prototype property",
                        ));
                    }
                };
                (proto, parent.as_object().cloned())
            }
            None => (
                Some(self.intrinsics.object_prototype.clone()),
                Some(self.intrinsics.function_prototype.clone()),
            ),
        };

        let name = class
            .name
            .clone()
            .or_else(|| name_hint.map(str::to_string))
            .unwrap_or_default();
        let class_scope = Scope::child(&self.scope);
        if let Some(own_name) = &class.name {
            class_scope
                .borrow_mut()
                .declare_uninitialized(own_name, false);
        }

        self.with_scope(class_scope.clone(), |this| {
            let prototype =
                Object::with_prototype(ObjectKind::Ordinary, prototype_parent).into_ref();

            let mut fields = Vec::new();
            for member in &class.members {
                if let ClassMember::Field {
                    key,
                    is_static: false,
                    value,
                } = member
                {
                    fields.push(FieldDefinition {
                        key: this.eval_key(key)?,
                        value: value.clone(),
                    });
                }
            }

            let constructor_function = class
                .constructor
                .clone()
                .unwrap_or_else(|| implicit_constructor(parent.is_some()));
            let info = Rc::new(ClassInfo {
                parent: parent.clone(),
                fields,
                scope: class_scope.clone(),
                prototype: prototype.clone(),
            });
            let mut constructor_object = Object::with_prototype(
                ObjectKind::Function(Closure {
                    function: constructor_function.clone(),
                    scope: class_scope.clone(),
                    home_object: Some(prototype.clone()),
                    class: Some(info),
                }),
                constructor_parent,
            );
            constructor_object.define(
                "name",
                Value::String(name.clone()),
                PropertyFlags::CONFIGURABLE,
            );
            constructor_object.define(
                "length",
                Value::Number(constructor_function.arity() as f64),
                PropertyFlags::CONFIGURABLE,
            );
            constructor_object.define(
                "prototype",
                Value::Object(prototype.clone()),
                PropertyFlags::empty(),
            );
            let constructor_object = constructor_object.into_ref();
            let constructor = Value::Object(constructor_object.clone());
            prototype
                .borrow_mut()
                .define("constructor", constructor.clone(), PropertyFlags::HIDDEN);

            for member in &class.members {
                let ClassMember::Method {
                    key,
                    kind,
                    is_static,
                    function,
                } = member
                else {
                    continue;
                };
                let key = this.eval_key(key)?;
                let target = if *is_static {
                    constructor_object.clone()
                } else {
                    prototype.clone()
                };
                let method = this.create_closure(function, Some(target.clone()));
                match kind {
                    MethodKind::Method => {
                        this.set_function_name(&method, &key);
                        target
                            .borrow_mut()
                            .define(&key, method, PropertyFlags::HIDDEN);
                    }
                    MethodKind::Getter => target
                        .borrow_mut()
                        .define_accessor(&key, Some(method), None),
                    MethodKind::Setter => target
                        .borrow_mut()
                        .define_accessor(&key, None, Some(method)),
                }
            }

            if let Some(own_name) = &class.name {
                class_scope
                    .borrow_mut()
                    .initialize(own_name, constructor.clone());
            }

            for member in &class.members {
                if let ClassMember::Field {
                    key,
                    is_static: true,
                    value,
                } = member
                {
                    let key = this.eval_key(key)?;
                    let frame = FunctionFrame {
                        this: Some(constructor.clone()),
                        home_object: Some(constructor_object.clone()),
                        ..FunctionFrame::default()
                    };
                    let static_scope = Scope::function(&class_scope, Some(frame));
                    let value = match value {
                        Some(expr) => {
                            this.with_scope(static_scope, |this| this.eval_named(expr, &key))?
                        }
                        None => Value::Undefined,
                    };
                    constructor_object
                        .borrow_mut()
                        .define(&key, value, PropertyFlags::DEFAULT);
                }
            }
            Ok(constructor)
        })
    }
}

/// Constructor used when a class body declares none. Derived classes
/// forward every argument to the parent constructor.
fn implicit_constructor(derived: bool) -> Rc<Function> {
    let (rest, body) = if derived {
        (
            Some(Pattern::Identifier("args".to_string())),
            vec![Statement::Expression(Expression::SuperCall(vec![
                Argument::Spread(Expression::Identifier("args".to_string())),
            ]))],
        )
    } else {
        (None, Vec::new())
    };
    Rc::new(Function {
        name: Some("constructor".to_string()),
        params: Vec::new(),
        rest,
        body: FunctionBody::Block(body),
        kind: FunctionKind::Constructor,
        is_async: false,
        var_names: Vec::new(),
        location: Default::default(),
    })
}

fn mark_enumerable(obj: &super::object::ObjectRef, key: &str) {
    if let Some(property) = obj.borrow_mut().properties.get_mut(key) {
        property.flags.insert(PropertyFlags::ENUMERABLE);
    }
}

/// Whether a logical operator returns its left operand without evaluating
/// the right one
fn short_circuits(operator: LogicalOperator, left: &Value) -> bool {
    match operator {
        LogicalOperator::And => !left.to_boolean(),
        LogicalOperator::Or => left.to_boolean(),
        LogicalOperator::NullishCoalescing => !left.is_nullish(),
    }
}

/// `**` with the ECMAScript special cases `powf` disagrees on
pub(crate) fn js_pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        f64::NAN
    } else {
        base.powf(exponent)
    }
}

/// Source-like rendering of a callee for "is not a function" messages
pub(crate) fn describe_callee(expr: &Expression) -> String {
    match expr {
        Expression::Identifier(name) => name.clone(),
        Expression::This => "this".to_string(),
        Expression::Member {
            object, property, ..
        } => match property {
            MemberProperty::Identifier(name) => format!("{}.{}", describe_callee(object), name),
            MemberProperty::Computed(_) => format!("{}[...]", describe_callee(object)),
        },
        Expression::SuperMember(MemberProperty::Identifier(name)) => format!("super.{}", name),
        Expression::Call { callee, .. } => format!("{}(...)", describe_callee(callee)),
        _ => "expression".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::runtime::interpreter::Limits;

    fn run(source: &str) -> Value {
        let program = parse(source).expect("parse");
        let mut interpreter = Interpreter::new(Limits::default());
        match interpreter.exec_program(&program) {
            Ok(value) => value,
            Err(Interrupt::Throw(value)) => panic!("uncaught {}", crate::runtime::inspect::inspect(&value)),
            Err(Interrupt::Abort(abort)) => panic!("aborted: {:?}", abort),
        }
    }

    fn run_error(source: &str) -> String {
        let program = parse(source).expect("parse");
        let mut interpreter = Interpreter::new(Limits::default());
        match interpreter.exec_program(&program) {
            Err(err) => interpreter.interrupt_to_error(err).to_string(),
            Ok(value) => panic!("expected an error, got {:?}", value),
        }
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(run("1 + 2 * 3").to_number(), 7.0);
        assert_eq!(run("'a' + 1 + 2").to_js_string(), "a12");
        assert_eq!(run("2 ** 10").to_number(), 1024.0);
        assert_eq!(run("-7 % 3").to_number(), -1.0);
        assert_eq!(run("(5 >>> 1) | 8").to_number(), 10.0);
    }

    #[test]
    fn test_closures_capture_loop_iteration() {
        let source = "
            const fns = [];
            for (let i = 0; i < 3; i++) { fns.push(() => i); }
            fns.map(f => f()).join(',')
        ";
        assert_eq!(run(source).to_js_string(), "0,1,2");
    }

    #[test]
    fn test_destructuring_with_defaults_and_rest() {
        let source = "
            const { a, b: [x, , y = 9], ...others } = { a: 1, b: [2, 3], c: 4, d: 5 };
            [a, x, y, Object.keys(others).join('')].join('-')
        ";
        assert_eq!(run(source).to_js_string(), "1-2-9-cd");
    }

    #[test]
    fn test_classes_with_inheritance_and_fields() {
        let source = "
            class Animal {
                legs = 4;
                constructor(name) { this.name = name; }
                speak() { return this.name + ' makes a sound'; }
                static create(name) { return new this(name); }
            }
            class Dog extends Animal {
                speak() { return super.speak() + ' (woof)'; }
                get description() { return `${this.name} has ${this.legs} legs`; }
            }
            const d = Dog.create('Rex');
            [d.speak(), d.description, d instanceof Animal].join('|')
        ";
        assert_eq!(
            run(source).to_js_string(),
            "Rex makes a sound (woof)|Rex has 4 legs|true"
        );
    }

    #[test]
    fn test_switch_fallthrough_and_try_finally() {
        let source = "
            let log = '';
            switch (2) { case 1: log += 'a'; case 2: log += 'b'; case 3: log += 'c'; break; default: log += 'd'; }
            function f() { try { throw new Error('boom'); } catch (e) { log += e.message; return 1; } finally { log += '!'; } }
            f();
            log
        ";
        assert_eq!(run(source).to_js_string(), "bcboom!");
    }

    #[test]
    fn test_optional_chaining_and_nullish() {
        assert!(run("const o = null; o?.a.b.c").is_undefined());
        assert_eq!(run("const o = { f() { return 3; } }; o.g?.() ?? o.f()").to_number(), 3.0);
        assert_eq!(run("let x = 0; x ||= 5; x").to_number(), 5.0);
    }

    #[test]
    fn test_runtime_errors_are_worded_like_engines() {
        assert_eq!(run_error("missing + 1"), "ReferenceError: missing is not defined");
        assert_eq!(
            run_error("const c = 1; c = 2;"),
            "TypeError: Assignment to constant variable."
        );
        assert_eq!(
            run_error("const o = {}; o.run();"),
            "TypeError: o.run is not a function"
        );
        assert_eq!(
            run_error("let u; u.x"),
            "TypeError: Cannot read properties of undefined (reading 'x')"
        );
        assert_eq!(
            run_error("x; let x = 1;"),
            "ReferenceError: Cannot access 'x' before initialization"
        );
    }

    #[test]
    fn test_deep_recursion_hits_call_limit() {
        assert_eq!(
            run_error("function f() { return f(); } f();"),
            "RangeError: Maximum call stack size exceeded"
        );
    }

    #[test]
    fn test_for_in_includes_inherited_keys() {
        let source = "
            function Point() { this.own = 1; }
            Point.prototype.shared = 2;
            let keys = '';
            for (const k in new Point()) keys += k + ';';
            keys
        ";
        assert_eq!(run(source).to_js_string(), "own;shared;");
    }
}
