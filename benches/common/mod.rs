#![allow(dead_code)]
use std::path::Path;

use tagml::ast::Program;
use test_support::{Case, bench_cases};

pub fn workloads() -> Vec<Case> {
    bench_cases(Path::new("tests/programs")).unwrap_or_else(|err| panic!("load cases: {err:#}"))
}

pub fn load_source(case: &Case) -> String {
    case.source()
        .unwrap_or_else(|err| panic!("read {}: {err:#}", case.name))
}

pub fn load_program(case: &Case) -> Program {
    let source = load_source(case);
    tagml::load(&source).unwrap_or_else(|err| panic!("load {}: {err}", case.name))
}
