use std::collections::HashSet;

use serde_json::Value;

use crate::cfg::{BasicBlock, BlockId, Cfg};
use crate::error::Error;
use crate::opt::lvn::lvn_block;
use crate::program::{Code, Instruction, Program};

pub fn program(json: Value) -> Program {
    serde_json::from_value(json).unwrap()
}

pub fn build(json: Value) -> Cfg {
    Cfg::build(&program(json)).unwrap()
}

pub fn build_error(json: Value) -> Error {
    match Cfg::build(&program(json)) {
        Ok(_) => panic!("cfg was built"),
        Err(e) => e,
    }
}

pub fn instrs(json: Value) -> Vec<Code> {
    serde_json::from_value(json).unwrap()
}

/// A lone entry block of a function called `main`.
pub fn block(json: Value) -> BasicBlock {
    let mut b = BasicBlock::new(BlockId::entry("main"), true);
    b.instrs = instrs(json);
    b
}

/// Names used by a block, standing in for the names of its function.
pub fn names(block: &BasicBlock) -> HashSet<String> {
    let mut names = HashSet::new();
    for code in &block.instrs {
        if let Some(dest) = code.dest() {
            names.insert(dest.to_string());
        }
        names.extend(code.args().iter().cloned());
    }
    names
}

pub fn lvn(json: Value) -> Vec<Code> {
    let mut b = block(json);
    let reserved = names(&b);
    lvn_block(&mut b, &reserved);
    b.instrs
}

pub fn get_instr(code: &Code) -> &Instruction {
    code.as_instruction().unwrap()
}

pub fn ops(instrs: &[Code]) -> Vec<&str> {
    instrs
        .iter()
        .map(|c| match c {
            Code::Label { .. } => "label",
            Code::Instruction(i) => i.op.as_str(),
        })
        .collect()
}

pub fn block_names(cfg: &Cfg) -> Vec<String> {
    cfg.blocks().iter().map(|b| b.id.to_string()).collect()
}
