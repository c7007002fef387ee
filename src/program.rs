use std::collections::BTreeMap;
use std::fmt::Formatter;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufReader, Read, Write};
use std::path::Path;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<Function>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Argument>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<Type>,
    #[serde(default)]
    pub instrs: Vec<Code>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: Type,
}

/// One record of a function body: either a label marker or an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Code {
    Label { label: String },
    Instruction(Instruction),
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let record = serde_json::Value::deserialize(deserializer)?;
        match (record.get("label"), record.get("op")) {
            (Some(_), Some(_)) => Err(D::Error::custom(
                "a record can not be both a label and an operation",
            )),
            (Some(label), None) => match label.as_str() {
                Some(label) => Ok(Code::Label {
                    label: label.to_string(),
                }),
                None => Err(D::Error::custom("label name must be a string")),
            },
            (None, _) => Instruction::deserialize(record)
                .map(Code::Instruction)
                .map_err(D::Error::custom),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub instr_type: Option<Type>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub funcs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Literal>,
}

/// Declared type tag. Never inferred, only carried through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Type {
    Prim(String),
    Param(BTreeMap<String, Type>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(String),
}

impl Program {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).map_err(Error::Json)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let f = File::open(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self).map_err(Error::Json)
    }
}

impl Code {
    pub fn as_instruction(&self) -> Option<&Instruction> {
        match self {
            Code::Instruction(instr) => Some(instr),
            Code::Label { .. } => None,
        }
    }

    pub fn is_terminator(&self) -> bool {
        self.as_instruction().map_or(false, Instruction::is_terminator)
    }

    pub fn dest(&self) -> Option<&str> {
        self.as_instruction().and_then(|i| i.dest.as_deref())
    }

    pub fn args(&self) -> &[String] {
        match self {
            Code::Instruction(instr) => &instr.args,
            Code::Label { .. } => &[],
        }
    }
}

impl Instruction {
    /// A fresh operation with no operands; fill in the rest with struct update syntax.
    pub fn new(op: &str) -> Self {
        Self {
            op: op.to_string(),
            dest: None,
            instr_type: None,
            args: Vec::new(),
            funcs: Vec::new(),
            labels: Vec::new(),
            value: None,
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self.op.as_str(), "jmp" | "br" | "ret")
    }

    pub fn is_call(&self) -> bool {
        self.op == "call"
    }

    pub fn is_const(&self) -> bool {
        self.op == "const"
    }

    pub fn is_copy(&self) -> bool {
        self.op == "id" && self.args.len() == 1
    }

    pub fn is_commutative(&self) -> bool {
        is_commutative(&self.op)
    }

    /// Instructions that must be kept even if their result is never read,
    /// and that may not be merged with an equal-looking earlier instruction.
    pub fn has_side_effects(&self) -> bool {
        self.dest.is_none()
            || matches!(
                self.op.as_str(),
                "call" | "alloc" | "load" | "store" | "free" | "print"
            )
    }
}

pub fn is_commutative(op: &str) -> bool {
    matches!(op, "add" | "mul" | "eq" | "and" | "or")
}

impl Literal {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Bool(a), Literal::Bool(b)) => a == b,
            (Literal::Int(a), Literal::Int(b)) => a == b,
            (Literal::Float(a), Literal::Float(b)) => a.to_bits() == b.to_bits(),
            (Literal::Char(a), Literal::Char(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Literal::Bool(b) => b.hash(state),
            Literal::Int(i) => i.hash(state),
            Literal::Float(f) => f.to_bits().hash(state),
            Literal::Char(s) => s.hash(state),
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Char(c) => write!(f, "'{}'", c),
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Prim(name) => f.write_str(name),
            Type::Param(params) => {
                for (i, (name, inner)) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}<{}>", name, inner)?;
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(dest) = &self.dest {
            write!(f, "{}", dest)?;
            if let Some(t) = &self.instr_type {
                write!(f, ": {}", t)?;
            }
            f.write_str(" = ")?;
        }
        f.write_str(&self.op)?;
        if let Some(value) = &self.value {
            write!(f, " {}", value)?;
        }
        for func in &self.funcs {
            write!(f, " @{}", func)?;
        }
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        for label in &self.labels {
            write!(f, " .{}", label)?;
        }
        f.write_str(";")
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Code::Label { label } => write!(f, ".{}:", label),
            Code::Instruction(instr) => write!(f, "{}", instr),
        }
    }
}
