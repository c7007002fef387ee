use serde_json::{json, Value};

use crate::cfg::{BlockId, BlockName, Cfg};
use crate::error::Error;

use super::util::*;

fn branchy() -> Value {
    json!({
        "functions": [{
            "name": "main",
            "instrs": [
                {"op": "const", "dest": "a", "type": "int", "value": 1},
                {"op": "const", "dest": "b", "type": "int", "value": 2},
                {"op": "lt", "dest": "c", "type": "bool", "args": ["a", "b"]},
                {"op": "br", "args": ["c"], "labels": ["then", "else"]},
                {"label": "then"},
                {"op": "print", "args": ["a"]},
                {"op": "jmp", "labels": ["end"]},
                {"label": "else"},
                {"op": "print", "args": ["b"]},
                {"label": "end"},
                {"op": "ret"}
            ]
        }]
    })
}

fn calls() -> Value {
    json!({
        "functions": [
            {
                "name": "main",
                "instrs": [
                    {"op": "call", "dest": "v", "type": "int", "funcs": ["helper"]},
                    {"op": "print", "args": ["v"]},
                    {"op": "ret"}
                ]
            },
            {
                "name": "helper",
                "type": "int",
                "instrs": [
                    {"op": "const", "dest": "r", "type": "int", "value": 1},
                    {"op": "ret", "args": ["r"]}
                ]
            }
        ]
    })
}

fn single(instrs: Value) -> Value {
    json!({"functions": [{"name": "main", "instrs": instrs}]})
}

#[test]
fn test_partition_labels() {
    let cfg = build(branchy());
    assert_eq!(
        block_names(&cfg),
        vec!["main", "main.then", "main.else", "main.end"]
    );
    assert!(cfg.block(0).is_entry);
    assert!(cfg.blocks()[1..].iter().all(|b| !b.is_entry));
    assert_eq!(ops(&cfg.block(0).instrs), vec!["const", "const", "lt", "br"]);
    assert_eq!(ops(&cfg.block(1).instrs), vec!["label", "print", "jmp"]);
    assert_eq!(ops(&cfg.block(2).instrs), vec!["label", "print"]);
    assert_eq!(ops(&cfg.block(3).instrs), vec!["label", "ret"]);
}

#[test]
fn test_partition_complete() {
    for json in [branchy(), calls()] {
        let p = program(json);
        let cfg = Cfg::build(&p).unwrap();
        assert!(cfg.blocks().iter().all(|b| !b.is_empty()));
        assert_eq!(cfg.to_program(), p);
    }
}

#[test]
fn test_partition_after_terminator() {
    let cfg = build(single(json!([
        {"op": "const", "dest": "v", "type": "int", "value": 1},
        {"op": "jmp", "labels": ["l"]},
        {"op": "print", "args": ["v"]},
        {"label": "l"},
        {"op": "ret"}
    ])));
    assert_eq!(block_names(&cfg), vec!["main", "main#1", "main.l"]);
    assert_eq!(cfg.block(1).id.name, BlockName::Index(1));
    assert!(cfg.has_edge(&BlockId::entry("main"), &BlockId::by_label("main", "l")));
    assert_eq!(cfg.successors(1).count(), 0);
}

#[test]
fn test_numeric_label() {
    let cfg = build(single(json!([
        {"op": "const", "dest": "x", "type": "int", "value": 1},
        {"op": "jmp", "labels": ["1"]},
        {"op": "print", "args": ["x"]},
        {"label": "1"},
        {"op": "ret"}
    ])));
    assert_eq!(cfg.blocks().len(), 3);
    let by_index = BlockId::by_index("main", 1);
    let by_label = BlockId::by_label("main", "1");
    assert_ne!(cfg.find(&by_index), cfg.find(&by_label));
    assert!(cfg.has_edge(&BlockId::entry("main"), &by_label));
    assert!(!cfg.has_edge(&BlockId::entry("main"), &by_index));
}

#[test]
fn test_branch_edges() {
    let cfg = build(branchy());
    let succ: Vec<_> = cfg.successors(0).collect();
    assert_eq!(succ, vec![1, 2]);
    let main_then = BlockId::by_label("main", "then");
    let main_end = BlockId::by_label("main", "end");
    assert!(cfg.has_edge(&main_then, &main_end));
    // No fall-through edges.
    assert_eq!(cfg.successors(2).count(), 0);
    assert_eq!(cfg.successors(3).count(), 0);
}

#[test]
fn test_branch_same_target() {
    let cfg = build(single(json!([
        {"op": "br", "args": ["c"], "labels": ["l", "l"]},
        {"label": "l"},
        {"op": "ret"}
    ])));
    assert_eq!(cfg.successors(0).collect::<Vec<_>>(), vec![1]);
}

#[test]
fn test_call_edges() {
    let cfg = build(calls());
    let main = BlockId::entry("main");
    let helper = BlockId::entry("helper");
    assert_eq!(cfg.blocks().len(), 2);
    assert!(cfg.has_edge(&main, &helper));
    assert!(!cfg.has_edge(&helper, &main));
    assert_eq!(cfg.entry_of("helper"), Some(1));
    assert_eq!(cfg.functions()[1].blocks, 1..2);
}

#[test]
fn test_call_forward_and_empty() {
    let cfg = build(json!({
        "functions": [
            {"name": "main", "instrs": [
                {"op": "call", "funcs": ["later"]},
                {"op": "call", "funcs": ["nothing"]}
            ]},
            {"name": "nothing", "instrs": []},
            {"name": "later", "instrs": [{"op": "ret"}]}
        ]
    }));
    assert_eq!(block_names(&cfg), vec!["main", "later"]);
    assert_eq!(cfg.successors(0).collect::<Vec<_>>(), vec![1]);
    assert_eq!(cfg.entry_of("nothing"), None);
    assert!(cfg.functions()[1].blocks.is_empty());
}

#[test]
fn test_end_of_function() {
    let cfg = build(branchy());
    assert!(!cfg.end_of_function(0));
    assert!(!cfg.end_of_function(1));
    assert!(cfg.end_of_function(2));
    assert!(cfg.end_of_function(3));

    let cfg = build(calls());
    assert!(cfg.end_of_function(0));
    assert!(cfg.end_of_function(1));
}

#[test]
fn test_loop_to_entry_label() {
    let cfg = build(single(json!([
        {"label": "top"},
        {"op": "const", "dest": "x", "type": "int", "value": 1},
        {"op": "jmp", "labels": ["top"]}
    ])));
    assert_eq!(block_names(&cfg), vec!["main"]);
    assert_eq!(ops(&cfg.block(0).instrs), vec!["label", "const", "jmp"]);
    assert!(cfg.has_edge(&BlockId::entry("main"), &BlockId::entry("main")));
    assert!(!cfg.end_of_function(0));
}

#[test]
fn test_call_errors() {
    let e = build_error(single(json!([{"op": "call", "funcs": []}])));
    assert!(matches!(e, Error::CallTargetCount { count: 0, .. }));
    let e = build_error(single(json!([{"op": "call", "funcs": ["a", "b"]}])));
    assert!(matches!(e, Error::CallTargetCount { count: 2, .. }));
    let e = build_error(single(json!([{"op": "call", "funcs": ["nope"]}])));
    assert!(matches!(e, Error::UnknownBlock(name) if name == "nope"));
}

#[test]
fn test_jump_errors() {
    let e = build_error(single(json!([{"op": "jmp", "labels": []}])));
    assert!(matches!(e, Error::JumpLabelCount { count: 0, .. }));
    let e = build_error(single(json!([
        {"op": "br", "args": ["c"], "labels": ["a"]},
        {"label": "a"}
    ])));
    assert!(matches!(e, Error::BranchLabelCount { count: 1, .. }));
    let e = build_error(single(json!([{"op": "jmp", "labels": ["nowhere"]}])));
    assert!(matches!(e, Error::UnknownBlock(name) if name == "main.nowhere"));
    let e = build_error(single(json!([
        {"label": "a"},
        {"op": "nop"},
        {"label": "b"},
        {"op": "nop"},
        {"label": "b"},
        {"op": "nop"}
    ])));
    assert!(matches!(e, Error::DuplicateBlock(name) if name == "main.b"));
}

#[test]
fn test_display() {
    let cfg = build(calls());
    assert_eq!(
        format!("{}", cfg),
        "Basic Blocks
BB0 [main]:
  v: int = call @helper;
  print v;
  ret;
BB1 [helper]:
  r: int = const 1;
  ret r;
Edges
  main -> helper
"
    );
}

#[test]
fn test_recursive_call_is_terminal() {
    let cfg = build(json!({
        "functions": [{
            "name": "f",
            "instrs": [
                {"op": "const", "dest": "unused", "type": "int", "value": 1},
                {"op": "call", "funcs": ["f"]},
                {"op": "ret"}
            ]
        }]
    }));
    assert!(cfg.has_edge(&BlockId::entry("f"), &BlockId::entry("f")));
    assert!(cfg.end_of_function(0));
}

#[test]
fn test_call_and_loop_to_own_entry() {
    let cfg = build(json!({
        "functions": [{
            "name": "f",
            "instrs": [
                {"label": "top"},
                {"op": "call", "funcs": ["f"]},
                {"op": "jmp", "labels": ["top"]}
            ]
        }]
    }));
    assert_eq!(cfg.successors(0).collect::<Vec<_>>(), vec![0]);
    assert!(!cfg.end_of_function(0));
}
