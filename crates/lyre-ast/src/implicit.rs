//! The implicitly-typed surface tree, as delivered by the (external)
//! parser. Binding annotations are optional and no type applications are
//! present; the constraint generator fills both in.
use crate::defs::{ClassDefinition, InstanceHead, TypeDefinition};
use crate::names::{LabelName, TypeConName, TypeVarName, ValueName};
use crate::types::{ClassPredicate, Type};
use crate::Primitive;
use lyre_util::span::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    /// A mutually recursive group of type declarations
    Types(Vec<TypeDefinition>),
    /// A possibly recursive group of value definitions
    Definitions(BindingGroup),
    Class(ClassDefinition),
    /// A mutually recursive group of instances
    Instances(Vec<InstanceDefinition>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct InstanceDefinition {
    pub head: InstanceHead,
    pub members: Vec<MemberDef>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemberDef {
    pub span: Span,
    pub name: LabelName,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BindingGroup {
    pub span: Span,
    pub defs: Vec<ValueDef>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValueDef {
    pub span: Span,
    pub vars: Vec<TypeVarName>,
    pub predicates: Vec<ClassPredicate>,
    pub name: ValueName,
    pub annotation: Option<Type>,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Var(ValueName),
    Prim(Primitive),
    /// Parameter annotation is optional in the surface language
    Lambda(ValueName, Option<Type>, Box<Expr>),
    App(Box<Expr>, Box<Expr>),
    /// `e : ty`
    Ann(Box<Expr>, Type),
    Let(BindingGroup, Box<Expr>),
    /// Introduce flexible type variables scoped over annotations in the body
    Exists(Vec<TypeVarName>, Box<Expr>),
    /// Explicit type abstraction, legal only as the immediate body of a
    /// value definition
    Forall(Vec<TypeVarName>, Box<Expr>),
    /// Saturated data constructor application
    Con(LabelName, Vec<Expr>),
    /// Record construction; the constructor name is advisory and never
    /// consulted for typing
    Record(TypeConName, Vec<FieldBinding>),
    Access(Box<Expr>, LabelName),
    Match(Box<Expr>, Vec<Branch>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldBinding {
    pub span: Span,
    pub label: LabelName,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    pub span: Span,
    pub pat: Pat,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pat {
    pub span: Span,
    pub kind: PatKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PatKind {
    Wild,
    Lit(Primitive),
    Var(ValueName),
    /// Disjunction; every alternative must bind the same names
    Or(Vec<Pat>),
    /// Conjunction; the alternatives must bind disjoint names
    And(Vec<Pat>),
    Alias(ValueName, Box<Pat>),
    Ann(Box<Pat>, Type),
    Con(LabelName, Vec<Pat>),
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Expr {
        Expr { span, kind }
    }

    pub fn var(span: Span, name: ValueName) -> Expr {
        Expr::new(span, ExprKind::Var(name))
    }

    pub fn prim(span: Span, p: Primitive) -> Expr {
        Expr::new(span, ExprKind::Prim(p))
    }

    pub fn lambda(span: Span, param: ValueName, ann: Option<Type>, body: Expr) -> Expr {
        Expr::new(span, ExprKind::Lambda(param, ann, Box::new(body)))
    }

    pub fn app(span: Span, f: Expr, arg: Expr) -> Expr {
        Expr::new(span, ExprKind::App(Box::new(f), Box::new(arg)))
    }
}

impl Pat {
    pub fn new(span: Span, kind: PatKind) -> Pat {
        Pat { span, kind }
    }
}
