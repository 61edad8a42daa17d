//! Expression AST node types

use super::*;

/// An expression node
#[derive(Debug, Clone)]
pub enum Expression {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    /// Template literal; `quasis` has one more element than `expressions`
    Template {
        quasis: Vec<String>,
        expressions: Vec<Expression>,
    },
    Regex {
        pattern: String,
        flags: String,
    },
    Identifier(String),
    This,

    Array(Vec<Option<Argument>>),
    Object(Vec<ObjectProperty>),
    Function(Rc<Function>),
    Class(Rc<Class>),

    Unary {
        operator: UnaryOperator,
        argument: Box<Expression>,
    },
    Update {
        operator: UpdateOperator,
        prefix: bool,
        argument: Box<Expression>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logical {
        operator: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    Assignment {
        operator: AssignmentOperator,
        target: Box<Pattern>,
        value: Box<Expression>,
    },
    Sequence(Vec<Expression>),

    /// `object.property`, `object[expr]`, `object?.property`
    Member {
        object: Box<Expression>,
        property: MemberProperty,
        optional: bool,
    },
    /// `super.method` inside a class method
    SuperMember(MemberProperty),
    Call {
        callee: Box<Expression>,
        arguments: Vec<Argument>,
        optional: bool,
    },
    /// `super(...)` inside a derived constructor
    SuperCall(Vec<Argument>),
    New {
        callee: Box<Expression>,
        arguments: Vec<Argument>,
    },
    Await(Box<Expression>),
}

/// Call argument or array element
#[derive(Debug, Clone)]
pub enum Argument {
    Expression(Expression),
    Spread(Expression),
}

/// Object literal entry
#[derive(Debug, Clone)]
pub enum ObjectProperty {
    /// `key: value`, shorthand `key` and methods `key() {}`
    KeyValue(PropertyKey, Expression),
    Getter(PropertyKey, Rc<Function>),
    Setter(PropertyKey, Rc<Function>),
    Spread(Expression),
}

/// Member access property
#[derive(Debug, Clone)]
pub enum MemberProperty {
    /// `.name`
    Identifier(String),
    /// `[expr]`
    Computed(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// !
    Not,
    /// ~
    BitwiseNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    /// ++
    Increment,
    /// --
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    /// ==
    Eq,
    /// !=
    Ne,
    /// ===
    StrictEq,
    /// !==
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    UShr,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    In,
    Instanceof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    /// &&
    And,
    /// ||
    Or,
    /// ??
    NullishCoalescing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    /// =
    Assign,
    /// `+=`, `-=`, ...
    Binary(BinaryOperator),
    /// `&&=`, `||=`, `??=`
    Logical(LogicalOperator),
}

impl Expression {
    /// Anonymous function and class expressions take the name of the
    /// binding they are assigned to.
    pub fn is_anonymous_definition(&self) -> bool {
        match self {
            Expression::Function(f) => f.name.is_none(),
            Expression::Class(c) => c.name.is_none(),
            _ => false,
        }
    }
}
