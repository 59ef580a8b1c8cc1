use super::Compiler;
use std::env;

#[derive(Default)]
pub struct CompilerBuilder {
    measure: Option<bool>,
    verbosity: Option<u8>,
}

impl CompilerBuilder {
    pub fn build(self) -> Compiler {
        Compiler {
            measure: self.measure.unwrap_or(false),
            verbosity: self.verbosity.unwrap_or(0),
            times: Vec::new(),
        }
    }

    pub fn verbosity(mut self, val: u8) -> Self {
        self.verbosity = Some(val);
        self
    }

    pub fn measure(mut self, val: bool) -> Self {
        self.measure = Some(val);
        self
    }
}

pub struct ArgParse {
    pub builder: CompilerBuilder,
    pub demos: Vec<String>,
    pub list: bool,
}

impl ArgParse {
    pub fn parse(args: env::Args) -> ArgParse {
        let mut stack = args.skip(1).rev().collect::<Vec<String>>();
        let mut demos = Vec::new();
        let mut list = false;
        let mut builder = CompilerBuilder::default();
        while let Some(item) = stack.pop() {
            if item.starts_with("--") {
                match item.as_ref() {
                    "--silent" => {
                        builder = builder.verbosity(0);
                    }
                    "--v" => {
                        builder = builder.verbosity(1);
                    }
                    "--vv" => {
                        builder = builder.verbosity(2);
                    }
                    "--measure" => {
                        builder = builder.measure(true);
                    }
                    "--list" => {
                        list = true;
                    }
                    _ => panic!("unrecognized compiler flag: {}", item),
                }
            } else {
                demos.push(item);
            }
        }

        ArgParse {
            builder,
            demos,
            list,
        }
    }
}
