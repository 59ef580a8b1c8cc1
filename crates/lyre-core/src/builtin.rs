//! Builtin type constructors and the types of primitives
use crate::env::{Environment, TypeDef};
use lyre_ast::types::{Kind, Type};
use lyre_ast::Primitive;
use lyre_util::span::Span;

pub mod tycons {
    use lyre_ast::names::TypeConName;
    use lyre_util::interner::{S_BOOL, S_INT, S_UNIT};

    pub use lyre_ast::types::ARROW as T_ARROW;
    pub const T_INT: TypeConName = TypeConName(S_INT);
    pub const T_BOOL: TypeConName = TypeConName(S_BOOL);
    pub const T_UNIT: TypeConName = TypeConName(S_UNIT);
}

pub fn int(span: Span) -> Type {
    Type::con(span, tycons::T_INT)
}

pub fn bool(span: Span) -> Type {
    Type::con(span, tycons::T_BOOL)
}

pub fn unit(span: Span) -> Type {
    Type::con(span, tycons::T_UNIT)
}

pub fn primitive_type(span: Span, p: &Primitive) -> Type {
    match p {
        Primitive::Unit => unit(span),
        Primitive::Int(_) => int(span),
        Primitive::Bool(_) => bool(span),
        Primitive::IntAdd | Primitive::IntSub | Primitive::IntMul => {
            Type::ntyarrow(span, vec![int(span), int(span)], int(span))
        }
        Primitive::IntEq | Primitive::IntLt => {
            Type::ntyarrow(span, vec![int(span), int(span)], bool(span))
        }
    }
}

/// Extend `env` with the builtin type constructors
pub fn populate_env(env: Environment) -> Environment {
    env.bind_type(tycons::T_ARROW, Kind::of_arity(2), TypeDef::Abstract)
        .bind_type(tycons::T_INT, Kind::Star, TypeDef::Abstract)
        .bind_type(tycons::T_BOOL, Kind::Star, TypeDef::Abstract)
        .bind_type(tycons::T_UNIT, Kind::Star, TypeDef::Abstract)
}
