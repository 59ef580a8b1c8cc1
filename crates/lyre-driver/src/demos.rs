//! Bundled demonstration programs.
//!
//! Parsing is an external collaborator, so the driver ships a few programs
//! built directly as explicit trees. They double as the end-to-end
//! fixtures for the integration tests.
use lyre_ast::defs::{
    ClassDefinition, ConstructorDef, FieldDef, InstanceHead, MemberSig, TypeDefBody,
    TypeDefinition,
};
use lyre_ast::explicit::{
    BindingGroup, Block, Branch, Expr, ExprKind, FieldBinding, InstanceDefinition, MemberDef,
    Pat, PatKind, Program, ValueDef,
};
use lyre_ast::names::{LabelName, TypeConName, TypeVarName, ValueName};
use lyre_ast::types::{ClassPredicate, Type};
use lyre_ast::Primitive;
use lyre_core::builtin;
use lyre_util::span::Span;

pub fn all() -> Vec<(&'static str, fn() -> Program)> {
    vec![
        ("eq-ord", eq_ord as fn() -> Program),
        ("option", option),
        ("records", records),
    ]
}

pub fn by_name(name: &str) -> Option<Program> {
    all()
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, f)| f())
}

fn sp() -> Span {
    Span::zero()
}

fn tv(s: &str) -> TypeVarName {
    TypeVarName::new(s)
}

fn compare_ty(arg: Type) -> Type {
    Type::ntyarrow(sp(), vec![arg.clone(), arg], builtin::bool(sp()))
}

fn int(n: i64) -> Expr {
    Expr::prim(sp(), Primitive::Int(n))
}

/// The classic pair of classes: `Eq` with an `Ord` subclass, instances at
/// `int`, one qualified function, and a ground use of it
fn eq_ord() -> Program {
    let a = tv("a");
    let va = Type::var(sp(), a);
    let eq = TypeConName::new("Eq");
    let ord = TypeConName::new("Ord");

    let class = |name, supers: Vec<TypeConName>, member: &str| {
        Block::Class(ClassDefinition {
            span: sp(),
            name,
            param: a,
            superclasses: supers,
            members: vec![MemberSig {
                span: sp(),
                name: LabelName::new(member),
                ty: compare_ty(va.clone()),
            }],
            is_constructor_class: false,
        })
    };
    let instance = |class, member: &str, prim| {
        Block::Instances(vec![InstanceDefinition {
            head: InstanceHead {
                span: sp(),
                class,
                head: builtin::tycons::T_INT,
                params: vec![],
                context: vec![],
            },
            members: vec![MemberDef {
                span: sp(),
                name: LabelName::new(member),
                body: Expr::prim(sp(), prim),
            }],
        }])
    };

    let x = ValueName::new("x");
    let y = ValueName::new("y");
    let f_body = Expr::lambda(
        sp(),
        x,
        va.clone(),
        Expr::lambda(
            sp(),
            y,
            va.clone(),
            Expr::apps(
                sp(),
                Expr::var(sp(), ValueName::new("lt"), vec![va.clone()]),
                vec![Expr::var(sp(), x, vec![]), Expr::var(sp(), y, vec![])],
            ),
        ),
    );
    let f = ValueDef {
        span: sp(),
        vars: vec![a],
        predicates: vec![ClassPredicate::new(ord, a)],
        name: ValueName::new("f"),
        ty: compare_ty(va.clone()),
        body: f_body,
    };
    let main = ValueDef {
        span: sp(),
        vars: vec![],
        predicates: vec![],
        name: ValueName::new("main"),
        ty: builtin::bool(sp()),
        body: Expr::apps(
            sp(),
            Expr::var(sp(), ValueName::new("f"), vec![builtin::int(sp())]),
            vec![int(2), int(3)],
        ),
    };

    Program {
        blocks: vec![
            class(eq, vec![], "eq"),
            instance(eq, "eq", Primitive::IntEq),
            class(ord, vec![eq], "lt"),
            instance(ord, "lt", Primitive::IntLt),
            Block::Definitions(BindingGroup {
                span: sp(),
                defs: vec![f],
            }),
            Block::Definitions(BindingGroup {
                span: sp(),
                defs: vec![main],
            }),
        ],
    }
}

/// An algebraic datatype with a polymorphic eliminator
fn option() -> Program {
    let a = tv("a");
    let va = Type::var(sp(), a);
    let option = TypeConName::new("option");
    let option_a = Type::app(sp(), option, vec![va.clone()]);
    let none = LabelName::new("None");
    let some = LabelName::new("Some");

    let types = Block::Types(vec![TypeDefinition {
        span: sp(),
        name: option,
        params: vec![a],
        body: TypeDefBody::Sum(vec![
            ConstructorDef {
                span: sp(),
                name: none,
                args: vec![],
            },
            ConstructorDef {
                span: sp(),
                name: some,
                args: vec![va.clone()],
            },
        ]),
    }]);

    let d = ValueName::new("d");
    let o = ValueName::new("o");
    let x = ValueName::new("x");
    let default_to = ValueDef {
        span: sp(),
        vars: vec![a],
        predicates: vec![],
        name: ValueName::new("default_to"),
        ty: Type::ntyarrow(sp(), vec![va.clone(), option_a.clone()], va.clone()),
        body: Expr::lambda(
            sp(),
            d,
            va.clone(),
            Expr::lambda(
                sp(),
                o,
                option_a.clone(),
                Expr::new(
                    sp(),
                    ExprKind::Match(
                        Box::new(Expr::var(sp(), o, vec![])),
                        vec![
                            Branch {
                                span: sp(),
                                pat: Pat::new(
                                    sp(),
                                    PatKind::Con(none, vec![va.clone()], vec![]),
                                ),
                                body: Expr::var(sp(), d, vec![]),
                            },
                            Branch {
                                span: sp(),
                                pat: Pat::new(
                                    sp(),
                                    PatKind::Con(
                                        some,
                                        vec![va.clone()],
                                        vec![Pat::new(sp(), PatKind::Var(x))],
                                    ),
                                ),
                                body: Expr::var(sp(), x, vec![]),
                            },
                        ],
                    ),
                ),
            ),
        ),
    };

    let fallback = ValueDef {
        span: sp(),
        vars: vec![],
        predicates: vec![],
        name: ValueName::new("fallback"),
        ty: builtin::int(sp()),
        body: Expr::apps(
            sp(),
            Expr::var(sp(), ValueName::new("default_to"), vec![builtin::int(sp())]),
            vec![
                int(0),
                Expr::new(
                    sp(),
                    ExprKind::Con(some, vec![builtin::int(sp())], vec![int(41)]),
                ),
            ],
        ),
    };

    Program {
        blocks: vec![
            types,
            Block::Definitions(BindingGroup {
                span: sp(),
                defs: vec![default_to],
            }),
            Block::Definitions(BindingGroup {
                span: sp(),
                defs: vec![fallback],
            }),
        ],
    }
}

/// A record type, a construction site, and field accesses
fn records() -> Program {
    let point = TypeConName::new("point");
    let x = LabelName::new("x");
    let y = LabelName::new("y");

    let types = Block::Types(vec![TypeDefinition {
        span: sp(),
        name: point,
        params: vec![],
        body: TypeDefBody::Record(vec![
            FieldDef {
                span: sp(),
                label: x,
                ty: builtin::int(sp()),
            },
            FieldDef {
                span: sp(),
                label: y,
                ty: builtin::int(sp()),
            },
        ]),
    }]);

    let origin = ValueDef {
        span: sp(),
        vars: vec![],
        predicates: vec![],
        name: ValueName::new("origin"),
        ty: Type::con(sp(), point),
        body: Expr::new(
            sp(),
            ExprKind::Record(
                point,
                vec![],
                vec![
                    FieldBinding {
                        span: sp(),
                        label: x,
                        expr: int(0),
                    },
                    FieldBinding {
                        span: sp(),
                        label: y,
                        expr: int(0),
                    },
                ],
            ),
        ),
    };

    let sum = ValueDef {
        span: sp(),
        vars: vec![],
        predicates: vec![],
        name: ValueName::new("sum"),
        ty: builtin::int(sp()),
        body: Expr::apps(
            sp(),
            Expr::prim(sp(), Primitive::IntAdd),
            vec![
                Expr::access(sp(), Expr::var(sp(), ValueName::new("origin"), vec![]), x),
                Expr::access(sp(), Expr::var(sp(), ValueName::new("origin"), vec![]), y),
            ],
        ),
    };

    Program {
        blocks: vec![
            types,
            Block::Definitions(BindingGroup {
                span: sp(),
                defs: vec![origin],
            }),
            Block::Definitions(BindingGroup {
                span: sp(),
                defs: vec![sum],
            }),
        ],
    }
}
