//! The typing context.
//!
//! Environments are immutable value objects: every `bind_*` operation
//! returns an extended copy, so scoped extension is a `clone` away and the
//! instance machinery can hold several snapshots of the same base
//! environment at once.
use crate::error::{ErrorKind, Result, TypeError};
use lyre_ast::defs::{MemberSig, TypeDefBody, TypeDefinition};
use lyre_ast::names::{LabelName, TypeConName, TypeVarName, ValueName};
use lyre_ast::types::{ClassPredicate, Kind, TyScheme, Type};
use lyre_util::span::Span;
use rustc_hash::FxHashMap;

/// What the environment knows about a class
#[derive(Clone, Debug)]
pub struct ClassInfo {
    pub span: Span,
    pub param: TypeVarName,
    pub superclasses: Vec<TypeConName>,
    pub members: Vec<MemberSig>,
    pub is_constructor_class: bool,
}

/// What the environment knows about an instance head
#[derive(Clone, Debug)]
pub struct InstanceInfo {
    pub span: Span,
    pub class: TypeConName,
    pub head: TypeConName,
    pub params: Vec<TypeVarName>,
    pub context: Vec<ClassPredicate>,
}

#[derive(Clone, Debug)]
pub struct ConstructorInfo {
    pub tycon: TypeConName,
    pub scheme: TyScheme,
    pub arity: usize,
}

#[derive(Clone, Debug)]
pub struct RecordInfo {
    pub name: TypeConName,
    pub params: Vec<TypeVarName>,
    pub fields: Vec<(LabelName, Type)>,
}

impl RecordInfo {
    pub fn field(&self, label: LabelName) -> Option<&Type> {
        self.fields
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, ty)| ty)
    }
}

#[derive(Clone, Debug)]
pub enum TypeDef {
    Abstract,
    Sum(Vec<LabelName>),
    Record(RecordInfo),
}

#[derive(Clone, Debug)]
pub struct TypeInfo {
    pub kind: Kind,
    pub def: TypeDef,
}

#[derive(Clone, Default, Debug)]
pub struct Environment {
    values: FxHashMap<ValueName, TyScheme>,
    types: FxHashMap<TypeConName, TypeInfo>,
    constructors: FxHashMap<LabelName, ConstructorInfo>,
    labels: FxHashMap<LabelName, TypeConName>,
    classes: FxHashMap<TypeConName, ClassInfo>,
    instances: FxHashMap<(TypeConName, TypeConName), InstanceInfo>,
}

impl Environment {
    pub fn lookup(&self, span: Span, name: ValueName) -> Result<&TyScheme> {
        self.values
            .get(&name)
            .ok_or_else(|| TypeError::new(span, ErrorKind::UnboundIdentifier(name)))
    }

    pub fn bind_scheme(
        &self,
        name: ValueName,
        vars: Vec<TypeVarName>,
        predicates: Vec<ClassPredicate>,
        ty: Type,
    ) -> Environment {
        let mut env = self.clone();
        env.values.insert(name, TyScheme::new(vars, predicates, ty));
        env
    }

    pub fn bind_simple(&self, name: ValueName, ty: Type) -> Environment {
        self.bind_scheme(name, Vec::new(), Vec::new(), ty)
    }

    pub fn bind_type(&self, name: TypeConName, kind: Kind, def: TypeDef) -> Environment {
        let mut env = self.clone();
        env.types.insert(name, TypeInfo { kind, def });
        env
    }

    pub fn lookup_type(&self, span: Span, name: TypeConName) -> Result<&TypeInfo> {
        self.types
            .get(&name)
            .ok_or_else(|| TypeError::new(span, ErrorKind::UnboundTypeConstructor(name)))
    }

    pub fn lookup_type_kind(&self, span: Span, name: TypeConName) -> Result<&Kind> {
        Ok(&self.lookup_type(span, name)?.kind)
    }

    pub fn bind_constructor(&self, name: LabelName, info: ConstructorInfo) -> Environment {
        let mut env = self.clone();
        env.constructors.insert(name, info);
        env
    }

    pub fn lookup_constructor(&self, span: Span, name: LabelName) -> Result<&ConstructorInfo> {
        self.constructors
            .get(&name)
            .ok_or_else(|| TypeError::new(span, ErrorKind::UnboundLabel(name)))
    }

    pub fn bind_label(&self, label: LabelName, tycon: TypeConName) -> Environment {
        let mut env = self.clone();
        env.labels.insert(label, tycon);
        env
    }

    /// The record type a label belongs to
    pub fn lookup_label(&self, span: Span, label: LabelName) -> Result<&RecordInfo> {
        let tycon = self
            .labels
            .get(&label)
            .ok_or_else(|| TypeError::new(span, ErrorKind::UnboundLabel(label)))?;
        match &self.lookup_type(span, *tycon)?.def {
            TypeDef::Record(info) => Ok(info),
            _ => Err(TypeError::new(span, ErrorKind::UnboundLabel(label))),
        }
    }

    pub fn bind_class(&self, name: TypeConName, info: ClassInfo) -> Environment {
        let mut env = self.clone();
        env.classes.insert(name, info);
        env
    }

    pub fn lookup_class(&self, span: Span, name: TypeConName) -> Result<&ClassInfo> {
        self.classes
            .get(&name)
            .ok_or_else(|| TypeError::new(span, ErrorKind::UnboundClass(name)))
    }

    /// Bind an instance, rejecting an overlap with one already present for
    /// the same class and head constructor
    pub fn bind_instance(&self, info: InstanceInfo) -> Result<Environment> {
        let key = (info.class, info.head);
        if self.instances.contains_key(&key) {
            return Err(TypeError::new(
                info.span,
                ErrorKind::OverlappingInstances(info.class, info.head),
            ));
        }
        let mut env = self.clone();
        env.instances.insert(key, info);
        Ok(env)
    }

    pub fn lookup_instance(&self, class: TypeConName, head: TypeConName) -> Option<&InstanceInfo> {
        self.instances.get(&(class, head))
    }

    /// Reflexive-transitive closure of the superclass relation: is `k1` a
    /// superclass of (or equal to) `k2`?
    pub fn is_superclass(&self, k1: TypeConName, k2: TypeConName) -> bool {
        if k1 == k2 {
            return true;
        }
        match self.classes.get(&k2) {
            None => false,
            Some(info) => info
                .superclasses
                .iter()
                .any(|s| self.is_superclass(k1, *s)),
        }
    }

    /// The chain of classes climbed from `from` (exclusive) to reach its
    /// superclass `to` (inclusive), if one exists
    pub fn superclass_path(&self, from: TypeConName, to: TypeConName) -> Option<Vec<TypeConName>> {
        if from == to {
            return Some(Vec::new());
        }
        let info = self.classes.get(&from)?;
        for s in &info.superclasses {
            if let Some(mut path) = self.superclass_path(*s, to) {
                path.insert(0, *s);
                return Some(path);
            }
        }
        None
    }

    /// Bind a mutually recursive group of type declarations: constructor
    /// kinds first, then data constructors and record labels
    pub fn bind_type_definitions(&self, defs: &[TypeDefinition]) -> Result<Environment> {
        let mut env = self.clone();
        for def in defs {
            let kind = Kind::of_arity(def.params.len());
            let type_def = match &def.body {
                TypeDefBody::Sum(cons) => TypeDef::Sum(cons.iter().map(|c| c.name).collect()),
                TypeDefBody::Record(fields) => TypeDef::Record(RecordInfo {
                    name: def.name,
                    params: def.params.clone(),
                    fields: fields.iter().map(|f| (f.label, f.ty.clone())).collect(),
                }),
            };
            env = env.bind_type(def.name, kind, type_def);
        }
        for def in defs {
            let result = Type::app(
                def.span,
                def.name,
                def.params
                    .iter()
                    .map(|p| Type::var(def.span, *p))
                    .collect(),
            );
            match &def.body {
                TypeDefBody::Sum(cons) => {
                    for con in cons {
                        if env.constructors.contains_key(&con.name) {
                            return Err(TypeError::new(
                                con.span,
                                ErrorKind::InvalidDataConstructorDefinition(con.name),
                            ));
                        }
                        for arg in &con.args {
                            check_leaves_bound(&def.params, arg)?;
                        }
                        let ty = Type::ntyarrow(con.span, con.args.clone(), result.clone());
                        env = env.bind_constructor(
                            con.name,
                            ConstructorInfo {
                                tycon: def.name,
                                scheme: TyScheme::new(def.params.clone(), Vec::new(), ty),
                                arity: con.args.len(),
                            },
                        );
                    }
                }
                TypeDefBody::Record(fields) => {
                    for field in fields {
                        check_leaves_bound(&def.params, &field.ty)?;
                        env = env.bind_label(field.label, def.name);
                    }
                }
            }
        }
        Ok(env)
    }
}

fn check_leaves_bound(params: &[TypeVarName], ty: &Type) -> Result<()> {
    for v in ty.free_vars() {
        if !params.contains(&v) {
            return Err(TypeError::new(ty.span, ErrorKind::UnboundTypeVariable(v)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use lyre_ast::defs::{ConstructorDef, FieldDef};

    fn class(name: &str, supers: &[&str]) -> (TypeConName, ClassInfo) {
        (
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

    fn with_classes(pairs: Vec<(TypeConName, ClassInfo)>) -> Environment {
        pairs
            .into_iter()
            .fold(Environment::default(), |env, (n, i)| env.bind_class(n, i))
    }

    #[test]
    fn superclass_closure_is_reflexive_and_transitive() {
        let eq = TypeConName::new("Eq");
        let ord = TypeConName::new("Ord");
        let num = TypeConName::new("Num");
        let env = with_classes(vec![
            class("Eq", &[]),
            class("Ord", &["Eq"]),
            class("Num", &["Ord"]),
        ]);
        assert!(env.is_superclass(eq, eq));
        assert!(env.is_superclass(eq, ord));
        assert!(env.is_superclass(eq, num));
        assert!(!env.is_superclass(num, eq));
        assert!(!env.is_superclass(ord, eq));
    }

    #[test]
    fn superclass_path_climbs_the_graph() {
        let eq = TypeConName::new("Eq");
        let ord = TypeConName::new("Ord");
        let num = TypeConName::new("Num");
        let env = with_classes(vec![
            class("Eq", &[]),
            class("Ord", &["Eq"]),
            class("Num", &["Ord"]),
        ]);
        assert_eq!(env.superclass_path(num, eq), Some(vec![ord, eq]));
        assert_eq!(env.superclass_path(eq, num), None);
    }

    #[test]
    fn overlapping_instances_are_rejected() {
        let info = InstanceInfo {
            span: Span::zero(),
            class: TypeConName::new("Eq"),
            head: TypeConName::new("int"),
            params: Vec::new(),
            context: Vec::new(),
        };
        let env = Environment::default().bind_instance(info.clone()).unwrap();
        let err = env.bind_instance(info).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::OverlappingInstances(_, _)));
    }

    #[test]
    fn extension_does_not_alter_the_original() {
        let env = Environment::default();
        let x = ValueName::new("x");
        let extended = env.bind_simple(x, Type::con(Span::zero(), TypeConName::new("int")));
        assert!(env.lookup(Span::zero(), x).is_err());
        assert!(extended.lookup(Span::zero(), x).is_ok());
    }

    #[test]
    fn type_definitions_bind_constructors_and_labels() {
        let span = Span::zero();
        let a = TypeVarName::new("a");
        let defs = vec![
            TypeDefinition {
                span,
                name: TypeConName::new("option"),
                params: vec![a],
                body: TypeDefBody::Sum(vec![
                    ConstructorDef {
                        span,
                        name: LabelName::new("None"),
                        args: vec![],
                    },
                    ConstructorDef {
                        span,
                        name: LabelName::new("Some"),
                        args: vec![Type::var(span, a)],
                    },
                ]),
            },
            TypeDefinition {
                span,
                name: TypeConName::new("point"),
                params: vec![],
                body: TypeDefBody::Record(vec![
                    FieldDef {
                        span,
                        label: LabelName::new("x"),
                        ty: Type::con(span, TypeConName::new("option")),
                    },
                ]),
            },
        ];
        // the record field deliberately under-applies `option`; kinding is
        // the checker's concern, binding is not
        let env = Environment::default().bind_type_definitions(&defs).unwrap();
        let some = env
            .lookup_constructor(span, LabelName::new("Some"))
            .unwrap();
        assert_eq!(some.arity, 1);
        assert_eq!(some.scheme.vars, vec![a]);
        let rec = env.lookup_label(span, LabelName::new("x")).unwrap();
        assert_eq!(rec.name, TypeConName::new("point"));
    }

    #[test]
    fn duplicate_constructors_are_rejected() {
        let span = Span::zero();
        let mk = |tyname: &str| TypeDefinition {
            span,
            name: TypeConName::new(tyname),
            params: vec![],
            body: TypeDefBody::Sum(vec![ConstructorDef {
                span,
                name: LabelName::new("Mk"),
                args: vec![],
            }]),
        };
        let err = Environment::default()
            .bind_type_definitions(&[mk("t"), mk("u")])
            .unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::InvalidDataConstructorDefinition(_)
        ));
    }
}
