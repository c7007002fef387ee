use assert_cmd::Command;
use std::{env::temp_dir, path::PathBuf};

pub fn write_program(json: &str) -> PathBuf {
    let mut filename = temp_dir();
    filename.push(format!("{:016X}.json", rand::random::<u64>()));
    std::fs::write(&filename, json).unwrap();
    filename
}

pub fn temp_output() -> PathBuf {
    let mut filename = temp_dir();
    filename.push(format!("{:016X}.out.json", rand::random::<u64>()));
    filename
}

pub fn lopt() -> Command {
    Command::cargo_bin("bril-lopt").unwrap()
}

pub const SUMS: &str = r#"{
  "functions": [{
    "name": "main",
    "instrs": [
      {"op": "const", "dest": "a", "type": "int", "value": 4},
      {"op": "const", "dest": "b", "type": "int", "value": 2},
      {"op": "add", "dest": "sum1", "type": "int", "args": ["a", "b"]},
      {"op": "add", "dest": "sum2", "type": "int", "args": ["b", "a"]},
      {"op": "mul", "dest": "prod", "type": "int", "args": ["sum1", "sum2"]},
      {"op": "print", "args": ["prod"]}
    ]
  }]
}"#;
