//! A plain display form for explicit programs, used by the driver and in
//! test failure output. The production printer is a separate tool; this
//! one favors being unambiguous over being pretty.
use lyre_ast::defs::{TypeDefBody, TypeDefinition};
use lyre_ast::explicit::{Block, Expr, ExprKind, Pat, PatKind, Program, ValueDef};
use lyre_ast::types::Type;
use std::fmt::Write;

pub fn program_to_string(program: &Program) -> String {
    let mut buf = String::new();
    for block in &program.blocks {
        match block {
            Block::Types(defs) => {
                for def in defs {
                    write_type_def(&mut buf, def);
                }
            }
            Block::Definitions(group) => {
                for def in &group.defs {
                    write_value_def(&mut buf, def);
                }
            }
            Block::Class(def) => {
                let _ = writeln!(buf, "class {} {}", def.name, def.param);
            }
            Block::Instances(group) => {
                for inst in group {
                    let _ = writeln!(buf, "instance {} {}", inst.head.class, inst.head.head);
                }
            }
        }
    }
    buf
}

fn write_type_def(buf: &mut String, def: &TypeDefinition) {
    let _ = write!(buf, "type {}", def.name);
    for p in &def.params {
        let _ = write!(buf, " {}", p);
    }
    match &def.body {
        TypeDefBody::Sum(cons) => {
            let _ = write!(buf, " =");
            for (i, c) in cons.iter().enumerate() {
                let sep = if i == 0 { " " } else { " | " };
                let _ = write!(buf, "{}{}", sep, c.name);
                for arg in &c.args {
                    let _ = write!(buf, " {:?}", arg);
                }
            }
        }
        TypeDefBody::Record(fields) => {
            let _ = write!(buf, " = {{");
            for (i, f) in fields.iter().enumerate() {
                if i > 0 {
                    let _ = write!(buf, "; ");
                }
                let _ = write!(buf, " {} : {:?}", f.label, f.ty);
            }
            let _ = write!(buf, " }}");
        }
    }
    let _ = writeln!(buf);
}

fn write_value_def(buf: &mut String, def: &ValueDef) {
    let _ = write!(buf, "val {} : ", def.name);
    if !def.vars.is_empty() {
        let _ = write!(buf, "forall");
        for v in &def.vars {
            let _ = write!(buf, " {}", v);
        }
        let _ = write!(buf, ". ");
    }
    let _ = writeln!(buf, "{:?}", def.ty);
    let _ = write!(buf, "val {} = ", def.name);
    write_expr(buf, &def.body);
    let _ = writeln!(buf);
}

fn write_expr(buf: &mut String, e: &Expr) {
    match &e.kind {
        ExprKind::Var(x, apps) => {
            let _ = write!(buf, "{}", x);
            write_type_apps(buf, apps);
        }
        ExprKind::Prim(p) => {
            let _ = write!(buf, "{}", p.name());
        }
        ExprKind::Lambda(x, ann, body) => {
            let _ = write!(buf, "(fun ({} : {:?}) -> ", x, ann);
            write_expr(buf, body);
            let _ = write!(buf, ")");
        }
        ExprKind::App(f, a) => {
            let _ = write!(buf, "(");
            write_expr(buf, f);
            let _ = write!(buf, " ");
            write_expr(buf, a);
            let _ = write!(buf, ")");
        }
        ExprKind::Ann(inner, ty) => {
            let _ = write!(buf, "(");
            write_expr(buf, inner);
            let _ = write!(buf, " : {:?})", ty);
        }
        ExprKind::Let(group, body) => {
            let _ = write!(buf, "let ");
            for (i, def) in group.defs.iter().enumerate() {
                if i > 0 {
                    let _ = write!(buf, " and ");
                }
                let _ = write!(buf, "{} = ", def.name);
                write_expr(buf, &def.body);
            }
            let _ = write!(buf, " in ");
            write_expr(buf, body);
        }
        ExprKind::Con(k, apps, args) => {
            let _ = write!(buf, "{}", k);
            write_type_apps(buf, apps);
            for arg in args {
                let _ = write!(buf, " ");
                write_expr(buf, arg);
            }
        }
        ExprKind::Record(name, apps, fields) => {
            let _ = write!(buf, "{}", name);
            write_type_apps(buf, apps);
            let _ = write!(buf, " {{");
            for (i, f) in fields.iter().enumerate() {
                if i > 0 {
                    let _ = write!(buf, ";");
                }
                let _ = write!(buf, " {} = ", f.label);
                write_expr(buf, &f.expr);
            }
            let _ = write!(buf, " }}");
        }
        ExprKind::Access(inner, label) => {
            write_expr(buf, inner);
            let _ = write!(buf, ".{}", label);
        }
        ExprKind::Match(scrutinee, branches) => {
            let _ = write!(buf, "match ");
            write_expr(buf, scrutinee);
            let _ = write!(buf, " with");
            for branch in branches {
                let _ = write!(buf, " | ");
                write_pat(buf, &branch.pat);
                let _ = write!(buf, " -> ");
                write_expr(buf, &branch.body);
            }
        }
    }
}

fn write_pat(buf: &mut String, p: &Pat) {
    match &p.kind {
        PatKind::Wild => {
            let _ = write!(buf, "_");
        }
        PatKind::Lit(prim) => {
            let _ = write!(buf, "{}", prim.name());
        }
        PatKind::Var(x) => {
            let _ = write!(buf, "{}", x);
        }
        PatKind::Or(ps) => write_pat_list(buf, ps, " | "),
        PatKind::And(ps) => write_pat_list(buf, ps, " & "),
        PatKind::Alias(x, sub) => {
            write_pat(buf, sub);
            let _ = write!(buf, " as {}", x);
        }
        PatKind::Ann(sub, ty) => {
            let _ = write!(buf, "(");
            write_pat(buf, sub);
            let _ = write!(buf, " : {:?})", ty);
        }
        PatKind::Con(k, apps, ps) => {
            let _ = write!(buf, "{}", k);
            write_type_apps(buf, apps);
            for sub in ps {
                let _ = write!(buf, " ");
                write_pat(buf, sub);
            }
        }
    }
}

fn write_pat_list(buf: &mut String, ps: &[Pat], sep: &str) {
    let _ = write!(buf, "(");
    for (i, p) in ps.iter().enumerate() {
        if i > 0 {
            let _ = write!(buf, "{}", sep);
        }
        write_pat(buf, p);
    }
    let _ = write!(buf, ")");
}

fn write_type_apps(buf: &mut String, apps: &[Type]) {
    if apps.is_empty() {
        return;
    }
    let _ = write!(buf, " [");
    for (i, ty) in apps.iter().enumerate() {
        if i > 0 {
            let _ = write!(buf, ", ");
        }
        let _ = write!(buf, "{:?}", ty);
    }
    let _ = write!(buf, "]");
}
