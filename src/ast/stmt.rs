//! Statement AST node types

use super::*;

/// A statement node
#[derive(Debug, Clone)]
pub enum Statement {
    Expression(Expression),
    VariableDeclaration(VariableDeclaration),
    FunctionDeclaration(Rc<Function>),
    ClassDeclaration(Rc<Class>),
    Block(Vec<Statement>),
    If {
        test: Expression,
        consequent: Box<Statement>,
        alternate: Option<Box<Statement>>,
    },
    While {
        test: Expression,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        test: Expression,
    },
    For {
        init: Option<ForInit>,
        test: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
    },
    ForIn {
        left: ForBinding,
        right: Expression,
        body: Box<Statement>,
    },
    ForOf {
        left: ForBinding,
        right: Expression,
        body: Box<Statement>,
    },
    Switch {
        discriminant: Expression,
        cases: Vec<SwitchCase>,
    },
    Break,
    Continue,
    Return(Option<Expression>),
    Throw(Expression),
    Try {
        block: Vec<Statement>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Statement>>,
    },
    Debugger,
    Empty,
}

/// Initializer of a C-style `for`
#[derive(Debug, Clone)]
pub enum ForInit {
    Declaration(VariableDeclaration),
    Expression(Expression),
}

/// Left side of `for…in` / `for…of`
#[derive(Debug, Clone)]
pub enum ForBinding {
    /// `for (const x of …)`
    Declaration(VariableKind, Pattern),
    /// `for (x of …)`
    Target(Pattern),
}

/// `case test:` or `default:` followed by statements
#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub test: Option<Expression>,
    pub consequent: Vec<Statement>,
}

/// `catch (param) { body }`; the binding is optional
#[derive(Debug, Clone)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: Vec<Statement>,
}
