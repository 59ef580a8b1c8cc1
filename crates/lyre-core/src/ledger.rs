//! The overload ledger: a monotone record of how each value name is used.
//!
//! A name bound with a non-empty predicate list is overloaded; a name bound
//! with an empty one is normal. Once a name has a mode it keeps it for the
//! whole program, so uses of a class member as an ordinary binding (or the
//! reverse) are rejected. The ledger is owned by the elaboration driver and
//! threaded through every binding introduction; a fresh one is created per
//! compilation run.
use crate::error::{ErrorKind, Result, TypeError};
use lyre_ast::names::ValueName;
use lyre_util::span::Span;
use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OverloadStatus {
    Normal,
    Overloaded,
}

#[derive(Default)]
pub struct NamespaceLedger {
    modes: FxHashMap<ValueName, OverloadStatus>,
}

impl NamespaceLedger {
    pub fn new() -> NamespaceLedger {
        NamespaceLedger::default()
    }

    /// Record a binding of `name`. Entries may be added but never change
    /// mode; a conflicting rebinding raises `OverloadedSymbolCannotBeBound`.
    pub fn record(&mut self, span: Span, name: ValueName, overloaded: bool) -> Result<()> {
        let mode = if overloaded {
            OverloadStatus::Overloaded
        } else {
            OverloadStatus::Normal
        };
        match self.modes.get(&name) {
            None => {
                self.modes.insert(name, mode);
                Ok(())
            }
            Some(prev) if *prev == mode => Ok(()),
            Some(_) => Err(TypeError::new(
                span,
                ErrorKind::OverloadedSymbolCannotBeBound(name),
            )),
        }
    }

    pub fn status(&self, name: ValueName) -> Option<OverloadStatus> {
        self.modes.get(&name).copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn modes_are_monotone() {
        let mut ledger = NamespaceLedger::new();
        let eq = ValueName::new("eq");
        ledger.record(Span::zero(), eq, true).unwrap();
        ledger.record(Span::zero(), eq, true).unwrap();
        let err = ledger.record(Span::zero(), eq, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OverloadedSymbolCannotBeBound(eq));
        assert_eq!(ledger.status(eq), Some(OverloadStatus::Overloaded));
    }

    #[test]
    fn normal_names_stay_normal() {
        let mut ledger = NamespaceLedger::new();
        let x = ValueName::new("x");
        ledger.record(Span::zero(), x, false).unwrap();
        assert!(ledger.record(Span::zero(), x, true).is_err());
    }
}
