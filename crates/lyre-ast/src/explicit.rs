//! The explicitly-typed tree: every binder is annotated and every use of a
//! polymorphic name carries its type application. This is the language the
//! elaborator consumes and produces; elaborated output additionally
//! contains no class or instance blocks.
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
    Types(Vec<TypeDefinition>),
    Definitions(BindingGroup),
    Class(ClassDefinition),
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
    pub ty: Type,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// A use of a name, instantiated at the given types
    Var(ValueName, Vec<Type>),
    Prim(Primitive),
    Lambda(ValueName, Type, Box<Expr>),
    App(Box<Expr>, Box<Expr>),
    Ann(Box<Expr>, Type),
    Let(BindingGroup, Box<Expr>),
    /// Saturated data constructor application, instantiated at the given
    /// types
    Con(LabelName, Vec<Type>, Vec<Expr>),
    /// Record construction at an instantiation of the record type; the
    /// constructor name is advisory and preserved verbatim
    Record(TypeConName, Vec<Type>, Vec<FieldBinding>),
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
    Or(Vec<Pat>),
    And(Vec<Pat>),
    Alias(ValueName, Box<Pat>),
    Ann(Box<Pat>, Type),
    Con(LabelName, Vec<Type>, Vec<Pat>),
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Expr {
        Expr { span, kind }
    }

    pub fn var(span: Span, name: ValueName, tyapps: Vec<Type>) -> Expr {
        Expr::new(span, ExprKind::Var(name, tyapps))
    }

    pub fn prim(span: Span, p: Primitive) -> Expr {
        Expr::new(span, ExprKind::Prim(p))
    }

    pub fn lambda(span: Span, param: ValueName, ann: Type, body: Expr) -> Expr {
        Expr::new(span, ExprKind::Lambda(param, ann, Box::new(body)))
    }

    pub fn app(span: Span, f: Expr, arg: Expr) -> Expr {
        Expr::new(span, ExprKind::App(Box::new(f), Box::new(arg)))
    }

    /// Apply `f` to `args` left to right
    pub fn apps(span: Span, f: Expr, args: Vec<Expr>) -> Expr {
        args.into_iter().fold(f, |acc, a| Expr::app(span, acc, a))
    }

    pub fn access(span: Span, e: Expr, label: LabelName) -> Expr {
        Expr::new(span, ExprKind::Access(Box::new(e), label))
    }
}

impl Pat {
    pub fn new(span: Span, kind: PatKind) -> Pat {
        Pat { span, kind }
    }
}

impl Program {
    /// True when no class or instance block remains, i.e. the program is in
    /// the class-free output dialect
    pub fn is_class_free(&self) -> bool {
        self.blocks
            .iter()
            .all(|b| !matches!(b, Block::Class(_) | Block::Instances(_)))
    }
}
