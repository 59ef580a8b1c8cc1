//! A thread-local string interner for identifier symbols.
//!
//! All four source namespaces (values, type variables, type constructors,
//! labels) intern their spelling here and carry a cheap [`Symbol`] around.
//! The elaborator also mints new identifiers at runtime, either by
//! formatting a string and calling [`intern`], or with [`Symbol::Gensym`]
//! for names that never need a spelling.
use std::cell::RefCell;
use std::collections::HashMap;
use std::pin::Pin;

thread_local! {
    pub static INTERNER: RefCell<Interner> = RefCell::new(Interner::with_capacity(256));
}

macro_rules! globals {
    (@step $idx:expr, ) => {
        pub const S_TOTAL_GLOBALS: usize = $idx;
    };
    (@step $idx:expr, $it:ident, $($rest:ident,)*) => {
        pub const $it: Symbol = Symbol::Builtin($idx as u32);
        globals!(@step $idx+1usize, $($rest,)*);
    };
    ($($name:ident),+) => {
       globals!(@step 0usize, $($name,)*);
    };
}

globals!(S_ARROW, S_INT, S_BOOL, S_UNIT, S_TRUE, S_FALSE, S_WILD);

const BUILTIN_STRS: [&str; S_TOTAL_GLOBALS] = ["->", "int", "bool", "unit", "true", "false", "_"];

#[derive(Copy, Clone, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub enum Symbol {
    Builtin(u32),
    Interned(u32),
    Gensym(u32),
}

impl Symbol {
    pub const fn gensym(n: u32) -> Symbol {
        Symbol::Gensym(n)
    }

    pub fn builtin(self) -> bool {
        matches!(self, Symbol::Builtin(_))
    }
}

pub struct Interner {
    symbols: HashMap<&'static str, Symbol>,
    strings: Vec<Pin<Box<str>>>,
}

impl Interner {
    pub fn with_capacity(n: usize) -> Interner {
        let mut i = Interner {
            symbols: HashMap::with_capacity(n),
            strings: Vec::with_capacity(n),
        };
        for (idx, builtin) in BUILTIN_STRS.iter().enumerate() {
            i.symbols.insert(builtin, Symbol::Builtin(idx as u32));
        }
        i
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(sym) = self.symbols.get(s) {
            return *sym;
        }

        let sym = Symbol::Interned(self.strings.len() as u32);
        let pinned = Pin::new(String::into_boxed_str(s.into()));
        // Safety: the boxed str is pinned and never dropped while the map
        // lives, so handing out a 'static view of it is sound
        let ptr: &'static str = unsafe { std::mem::transmute(Pin::get_ref(pinned.as_ref())) };

        self.strings.push(pinned);
        self.symbols.insert(ptr, sym);
        sym
    }

    pub fn get(&self, symbol: Symbol) -> Option<&str> {
        match symbol {
            Symbol::Interned(n) => self
                .strings
                .get(n as usize)
                .map(|s| Pin::get_ref(s.as_ref())),
            Symbol::Builtin(n) => BUILTIN_STRS.get(n as usize).copied(),
            Symbol::Gensym(_) => None,
        }
    }
}

/// Intern `s` in the thread-local interner
pub fn intern(s: &str) -> Symbol {
    INTERNER.with(|i| i.borrow_mut().intern(s))
}

/// The spelling of `symbol`, generating one for gensyms
pub fn resolve(symbol: Symbol) -> String {
    match symbol {
        Symbol::Gensym(n) => gensym_name(n),
        _ => INTERNER.with(|i| {
            i.borrow()
                .get(symbol)
                .map(String::from)
                .unwrap_or_else(|| String::from("?"))
        }),
    }
}

fn gensym_name(x: u32) -> String {
    format!("%{}", x)
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Symbol::Builtin(n) => write!(f, "{}", BUILTIN_STRS[*n as usize]),
            Symbol::Gensym(n) => write!(f, "{}", gensym_name(*n)),
            Symbol::Interned(n) => INTERNER.with(|i| match i.try_borrow() {
                Ok(b) => match b.get(*self) {
                    Some(s) => write!(f, "{}", s),
                    None => write!(f, "?"),
                },
                Err(_) => write!(f, "#{}", n),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn intern_round_trip() {
        let a = intern("eq");
        let b = intern("lt");
        let c = intern("eq");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(resolve(a), "eq");
    }

    #[test]
    fn builtins_are_pre_interned() {
        assert_eq!(intern("->"), S_ARROW);
        assert_eq!(intern("int"), S_INT);
        assert!(S_ARROW.builtin());
    }
}
