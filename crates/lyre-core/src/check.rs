//! Well-formedness checks: kinding of types, type equality, and context
//! canonicity. Both the generator and the elaborator route through these.
use crate::env::Environment;
use crate::error::{ErrorKind, Result, TypeError};
use lyre_ast::names::TypeVarName;
use lyre_ast::types::{ClassPredicate, Kind, Type, TypeKind};
use lyre_util::span::Span;
use rustc_hash::FxHashMap;
use std::collections::HashMap;

/// The kinds of the type variables currently in scope
pub type TyVarKinds = FxHashMap<TypeVarName, Kind>;

pub fn star_kinds(vars: &[TypeVarName]) -> TyVarKinds {
    vars.iter().map(|v| (*v, Kind::Star)).collect()
}

/// Compute the kind of `ty`, checking each type constructor application for
/// arity and per-argument kinds along the way
pub fn kind_of(env: &Environment, tyvars: &TyVarKinds, ty: &Type) -> Result<Kind> {
    match &ty.kind {
        TypeKind::Var(v) => tyvars
            .get(v)
            .cloned()
            .ok_or_else(|| TypeError::new(ty.span, ErrorKind::UnboundTypeVariable(*v))),
        TypeKind::App(con, args) => {
            let mut kind = env.lookup_type_kind(ty.span, *con)?.clone();
            for arg in args {
                let got = kind_of(env, tyvars, arg)?;
                match kind {
                    Kind::Arrow(dom, cod) => {
                        check_equivalent_kind(arg.span, &dom, &got)?;
                        kind = *cod;
                    }
                    Kind::Star => {
                        return Err(TypeError::new(ty.span, ErrorKind::IllKindedType(ty.clone())))
                    }
                }
            }
            Ok(kind)
        }
    }
}

/// Check that `ty` is well-kinded with kind `expected`
pub fn check_wf_type(
    env: &Environment,
    tyvars: &TyVarKinds,
    ty: &Type,
    expected: &Kind,
) -> Result<()> {
    let got = kind_of(env, tyvars, ty)?;
    check_equivalent_kind(ty.span, expected, &got)
}

pub fn check_equivalent_kind(span: Span, expected: &Kind, got: &Kind) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(TypeError::new(
            span,
            ErrorKind::IncompatibleKinds(expected.clone(), got.clone()),
        ))
    }
}

pub fn check_equal_types(span: Span, expected: &Type, got: &Type) -> Result<()> {
    if expected.equivalent(got, &HashMap::new()) {
        Ok(())
    } else {
        Err(TypeError::new(
            span,
            ErrorKind::IncompatibleTypes(expected.clone(), got.clone()),
        ))
    }
}

/// Check a typing context: every predicate variable is quantified, every
/// class exists, and canonicity holds, meaning no two predicates constrain
/// the same variable with related classes
pub fn check_correct_context(
    env: &Environment,
    span: Span,
    quantified: &[TypeVarName],
    context: &[ClassPredicate],
) -> Result<()> {
    for pred in context {
        env.lookup_class(span, pred.class)?;
        if !quantified.contains(&pred.var) {
            return Err(TypeError::new(
                span,
                ErrorKind::UnboundTypeVariable(pred.var),
            ));
        }
    }
    for (i, p) in context.iter().enumerate() {
        for q in &context[i + 1..] {
            if p.var == q.var
                && (env.is_superclass(p.class, q.class) || env.is_superclass(q.class, p.class))
            {
                return Err(TypeError::new(
                    span,
                    ErrorKind::TheseTwoClassesMustNotBeInTheSameContext(p.class, q.class),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::builtin::{self, tycons};
    use crate::env::ClassInfo;
    use lyre_ast::names::TypeConName;

    fn base() -> Environment {
        builtin::populate_env(Environment::default())
    }

    fn class(env: Environment, name: &str, supers: &[&str]) -> Environment {
        env.bind_class(
            TypeConName::new(name),
            ClassInfo {
                span: Span::zero(),
                param: TypeVarName::new("a"),
                superclasses: supers.iter().map(|s| TypeConName::new(s)).collect(),
                members: Vec::new(),
                is_constructor_class: false,
            },
        )
    }

    #[test]
    fn arrow_types_are_star_kinded() {
        let env = base();
        let span = Span::zero();
        let ty = Type::arrow(span, builtin::int(span), builtin::bool(span));
        assert_eq!(kind_of(&env, &TyVarKinds::default(), &ty), Ok(Kind::Star));
    }

    #[test]
    fn underapplied_constructors_are_rejected() {
        let env = base();
        let span = Span::zero();
        let ty = Type::app(span, tycons::T_ARROW, vec![builtin::int(span)]);
        let got = kind_of(&env, &TyVarKinds::default(), &ty).unwrap();
        // one argument consumed, one still expected
        assert_eq!(got, Kind::of_arity(1));
        assert!(check_wf_type(&env, &TyVarKinds::default(), &ty, &Kind::Star).is_err());
    }

    #[test]
    fn overapplied_constructors_are_rejected() {
        let env = base();
        let span = Span::zero();
        let ty = Type::app(span, tycons::T_INT, vec![builtin::int(span)]);
        let err = kind_of(&env, &TyVarKinds::default(), &ty).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IllKindedType(_)));
    }

    #[test]
    fn unbound_type_variables_are_reported() {
        let env = base();
        let ty = Type::var(Span::zero(), TypeVarName::new("a"));
        let err = kind_of(&env, &TyVarKinds::default(), &ty).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnboundTypeVariable(_)));
    }

    #[test]
    fn related_classes_cannot_share_a_context() {
        let env = class(class(base(), "Eq", &[]), "Ord", &["Eq"]);
        let a = TypeVarName::new("a");
        let ctx = vec![
            ClassPredicate::new(TypeConName::new("Eq"), a),
            ClassPredicate::new(TypeConName::new("Ord"), a),
        ];
        let err = check_correct_context(&env, Span::zero(), &[a], &ctx).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::TheseTwoClassesMustNotBeInTheSameContext(_, _)
        ));
    }

    #[test]
    fn unrelated_classes_may_share_a_context() {
        let env = class(class(base(), "Eq", &[]), "Show", &[]);
        let a = TypeVarName::new("a");
        let ctx = vec![
            ClassPredicate::new(TypeConName::new("Eq"), a),
            ClassPredicate::new(TypeConName::new("Show"), a),
        ];
        assert!(check_correct_context(&env, Span::zero(), &[a], &ctx).is_ok());
    }

    #[test]
    fn context_variables_must_be_quantified() {
        let env = class(base(), "Eq", &[]);
        let ctx = vec![ClassPredicate::new(
            TypeConName::new("Eq"),
            TypeVarName::new("b"),
        )];
        let err =
            check_correct_context(&env, Span::zero(), &[TypeVarName::new("a")], &ctx).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnboundTypeVariable(_)));
    }
}
