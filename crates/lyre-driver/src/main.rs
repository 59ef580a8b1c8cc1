use lyre_core::elaborate;
use lyre_core::error::TypeError;
use lyre_core::pretty;
use lyre_util::diagnostics::Diagnostic;
use std::time::Instant;

use stats_alloc::{Region, StatsAlloc, INSTRUMENTED_SYSTEM};
use std::alloc::System;

#[global_allocator]
static GLOBAL: &StatsAlloc<System> = &INSTRUMENTED_SYSTEM;

mod config;

use lyre_driver::demos;

pub use config::{ArgParse, CompilerBuilder};

pub struct Compiler {
    pub measure: bool,
    pub verbosity: u8,
    pub times: Vec<String>,
}

impl Compiler {
    fn measure<T, F: FnOnce(&mut Compiler) -> T>(&mut self, name: &str, f: F) -> T {
        if self.measure {
            let region = Region::new(&GLOBAL);
            let start = Instant::now();
            let r = f(self);
            let stop = Instant::now().duration_since(start).as_micros();
            let stats = region.change();
            self.times.push(format!(
                "pass {}: {} us, {} allocations, {} allocated",
                name, stop, stats.allocations, stats.bytes_allocated
            ));
            r
        } else {
            f(self)
        }
    }

    pub fn run(&mut self, name: &str, program: &lyre_ast::explicit::Program) {
        let res: Result<lyre_ast::explicit::Program, TypeError> =
            self.measure("elaborate", |_| elaborate::elaborate_program(program));
        match res {
            Ok(out) => {
                debug_assert!(out.is_class_free());
                println!("-- {}", name);
                print!("{}", pretty::program_to_string(&out));
            }
            Err(err) => report(self.verbosity, vec![err.to_diagnostic()]),
        }
        for time in self.times.drain(..) {
            eprintln!("{}", time);
        }
    }
}

fn report(verbosity: u8, diags: Vec<Diagnostic>) {
    eprintln!("{} errors", diags.len());
    for diag in diags {
        eprintln!("{}", diag.report(verbosity, ""));
    }
}

fn main() {
    let args = ArgParse::parse(std::env::args());
    if args.list {
        for (name, _) in demos::all() {
            println!("{}", name);
        }
        return;
    }

    let mut compiler = args.builder.build();
    if args.demos.is_empty() {
        for (name, build) in demos::all() {
            compiler.run(name, &build());
        }
        return;
    }
    for name in &args.demos {
        match demos::by_name(name) {
            Some(program) => compiler.run(name, &program),
            None => eprintln!("no demo named '{}', try --list", name),
        }
    }
}
