//! Abstract Syntax Tree (AST) types for the interpreted JavaScript subset
//!
//! The tree follows ESTree naming where it can. Function and class nodes are
//! reference counted so that closures created at runtime can share them with
//! the tree without copying bodies.

mod expr;
mod pattern;
mod stmt;

pub use expr::*;
pub use pattern::*;
pub use stmt::*;

use std::rc::Rc;

use crate::error::SourceLocation;

/// A complete script
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub body: Vec<Statement>,
    /// Names declared with `var` anywhere outside nested functions
    pub var_names: Vec<String>,
}

/// Variable declaration kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

/// A single declarator (`id = init`)
#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    pub id: Pattern,
    pub init: Option<Expression>,
}

/// `let a = 1, b = 2`
#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
}

/// What kind of callable a function node produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// `function` declaration or expression, callable and constructible
    Normal,
    /// Arrow function: lexical `this`, not constructible
    Arrow,
    /// Object or class method, not constructible
    Method,
    /// Explicit or implicit class constructor
    Constructor,
}

/// Function body
#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Vec<Statement>),
    /// Concise arrow body
    Expression(Box<Expression>),
}

/// A function definition shared by declarations, expressions, arrows and
/// methods
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<Pattern>,
    pub rest: Option<Pattern>,
    pub body: FunctionBody,
    pub kind: FunctionKind,
    pub is_async: bool,
    /// `var` names hoisted to the top of this function
    pub var_names: Vec<String>,
    pub location: SourceLocation,
}

impl Function {
    /// Number of parameters before the first default or rest, as
    /// `Function.prototype.length` reports it
    pub fn arity(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| !matches!(p, Pattern::Default { .. }))
            .count()
    }
}

/// A class definition
#[derive(Debug, Clone)]
pub struct Class {
    pub name: Option<String>,
    pub superclass: Option<Expression>,
    pub constructor: Option<Rc<Function>>,
    pub members: Vec<ClassMember>,
}

/// Method flavour for object literals and classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

/// A class body element
#[derive(Debug, Clone)]
pub enum ClassMember {
    Method {
        key: PropertyKey,
        kind: MethodKind,
        is_static: bool,
        function: Rc<Function>,
    },
    Field {
        key: PropertyKey,
        is_static: bool,
        value: Option<Expression>,
    },
}

/// A property name in an object literal, class body or object pattern
#[derive(Debug, Clone)]
pub enum PropertyKey {
    Static(String),
    Computed(Box<Expression>),
}
