use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::cfg::{BasicBlock, FunctionLayout};
use crate::program::{Code, Instruction, Literal, Type};

/// A value as seen by the numbering table.
///
/// Rows sort before opaque names, and opaque names sort by name, which is the
/// order commutative operands are canonicalized to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Operand {
    Row(usize),
    /// A name that is not defined in this block before being read.
    Opaque(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Value {
    Label(String),
    Const {
        op: String,
        literal: Literal,
    },
    Expr {
        op: String,
        args: Vec<Operand>,
        funcs: Vec<String>,
        labels: Vec<String>,
    },
}

struct Row {
    value: Value,
    /// Variable holding the value; `None` for labels and instructions without a destination.
    home: Option<String>,
    ty: Option<Type>,
    /// First row that no longer sees the value under `home`, once the home
    /// variable has been assigned again.
    overwritten: Option<usize>,
}

struct Table<'a> {
    rows: Vec<Row>,
    /// First row holding each value. Only values free of side effects are here.
    lookup: HashMap<Value, usize>,
    vars: HashMap<String, Operand>,
    /// Row currently homed at each variable.
    homes: HashMap<String, usize>,
    /// Variables defined in this block, in order of first definition.
    defined: Vec<String>,
    types: HashMap<String, Option<Type>>,
    /// Position of the last definition of each variable in the block.
    last_def: HashMap<String, usize>,
    reserved: &'a HashSet<String>,
    taken: HashSet<String>,
}

/// Every variable name mentioned anywhere in a function, arguments included.
///
/// Fresh names generated while numbering a block of the function avoid these.
pub fn function_names(blocks: &[BasicBlock], layout: &FunctionLayout) -> HashSet<String> {
    let mut names: HashSet<String> = layout.args.iter().map(|a| a.name.clone()).collect();
    for block in &blocks[layout.blocks.clone()] {
        for code in &block.instrs {
            if let Some(dest) = code.dest() {
                names.insert(dest.to_string());
            }
            names.extend(code.args().iter().cloned());
        }
    }
    names
}

/// Run local value numbering on one block and regenerate its instructions.
///
/// `reserved` holds the names used by the enclosing function.
/// Returns true if the instruction sequence changed.
pub fn lvn_block(block: &mut BasicBlock, reserved: &HashSet<String>) -> bool {
    let mut table = Table::new(&block.instrs, reserved);
    for (pos, code) in block.instrs.iter().enumerate() {
        match code {
            Code::Label { label } => table.push_row(Value::Label(label.clone()), None, None),
            Code::Instruction(instr) => table.number(pos, instr),
        }
    }
    if log::log_enabled!(log::Level::Trace) {
        for (i, row) in table.rows.iter().enumerate() {
            trace!("{} row {}: {:?} in {:?}", block.id, i, row.value, row.home);
        }
    }
    table.rename_overwritten();
    let instrs = table.regenerate();
    if instrs == block.instrs {
        false
    } else {
        block.instrs = instrs;
        true
    }
}

impl<'a> Table<'a> {
    fn new(instrs: &[Code], reserved: &'a HashSet<String>) -> Self {
        let mut last_def = HashMap::new();
        for (pos, code) in instrs.iter().enumerate() {
            if let Some(dest) = code.dest() {
                last_def.insert(dest.to_string(), pos);
            }
        }
        Self {
            rows: Vec::new(),
            lookup: HashMap::new(),
            vars: HashMap::new(),
            homes: HashMap::new(),
            defined: Vec::new(),
            types: HashMap::new(),
            last_def,
            reserved,
            taken: HashSet::new(),
        }
    }

    fn number(&mut self, pos: usize, instr: &Instruction) {
        let dest = instr.dest.as_deref();

        if let (Some(dest), true) = (dest, instr.is_copy()) {
            let src = self.resolve(&instr.args[0]);
            // If the source is overwritten later in the block, keep the copy
            // so the value is captured while it is still available.
            let keep = matches!(&src, Operand::Opaque(name) if self.redefined_after(name, pos));
            if !keep {
                self.define(dest, src, &instr.instr_type);
                return;
            }
        }

        if let (true, Some(literal)) = (instr.is_const(), &instr.value) {
            let value = Value::Const {
                op: instr.op.clone(),
                literal: literal.clone(),
            };
            if dest.is_some() {
                let idx = self.rows.len();
                self.lookup.entry(value.clone()).or_insert(idx);
            }
            self.push_row(value, dest, instr.instr_type.clone());
            return;
        }

        let mut args: Vec<Operand> = instr.args.iter().map(|a| self.resolve(a)).collect();
        if instr.is_commutative() {
            args.sort();
        }
        let value = match self.fold(&instr.op, &args) {
            Some(literal) => {
                debug!("folded `{}' to {}", instr, literal);
                Value::Const {
                    op: "const".to_string(),
                    literal,
                }
            }
            None => Value::Expr {
                op: instr.op.clone(),
                args,
                funcs: instr.funcs.clone(),
                labels: instr.labels.clone(),
            },
        };

        if instr.has_side_effects() {
            self.push_row(value, dest, instr.instr_type.clone());
            return;
        }
        let hit = self.lookup.get(&value).copied();
        if let (Some(idx), Some(dest)) = (hit, dest) {
            debug!("`{}' is redundant with row {}", instr, idx);
            self.define(dest, Operand::Row(idx), &instr.instr_type);
            return;
        }
        let idx = self.rows.len();
        self.lookup.insert(value.clone(), idx);
        self.push_row(value, dest, instr.instr_type.clone());
    }

    /// Constant folding for the boolean operators.
    fn fold(&self, op: &str, args: &[Operand]) -> Option<Literal> {
        let known = |arg: &Operand| match arg {
            Operand::Row(i) => match &self.rows[*i].value {
                Value::Const { literal, .. } => literal.as_bool(),
                _ => None,
            },
            Operand::Opaque(_) => None,
        };
        match (op, args) {
            ("and", [a, b]) => match (known(a), known(b)) {
                (Some(false), _) | (_, Some(false)) => Some(Literal::Bool(false)),
                (Some(x), Some(y)) => Some(Literal::Bool(x && y)),
                _ => None,
            },
            ("or", [a, b]) => match (known(a), known(b)) {
                (Some(true), _) | (_, Some(true)) => Some(Literal::Bool(true)),
                (Some(x), Some(y)) => Some(Literal::Bool(x || y)),
                _ => None,
            },
            ("not", [a]) => known(a).map(|x| Literal::Bool(!x)),
            _ => None,
        }
    }

    fn resolve(&mut self, name: &str) -> Operand {
        self.vars
            .entry(name.to_string())
            .or_insert_with(|| Operand::Opaque(name.to_string()))
            .clone()
    }

    fn redefined_after(&self, name: &str, pos: usize) -> bool {
        self.last_def.get(name).map_or(false, |last| *last > pos)
    }

    /// Bind `dest` to an existing value without creating a row.
    fn define(&mut self, dest: &str, operand: Operand, ty: &Option<Type>) {
        if let Some(&idx) = self.homes.get(dest) {
            if operand != Operand::Row(idx) {
                self.overwrite(idx, self.rows.len());
            }
        }
        self.note_definition(dest, ty);
        self.vars.insert(dest.to_string(), operand);
    }

    fn push_row(&mut self, value: Value, dest: Option<&str>, ty: Option<Type>) {
        let idx = self.rows.len();
        let home = dest.map(str::to_string);
        if let Some(dest) = dest {
            // The new row still reads the old value.
            if let Some(&prev) = self.homes.get(dest) {
                self.overwrite(prev, idx + 1);
            }
            self.note_definition(dest, &ty);
            self.vars.insert(dest.to_string(), Operand::Row(idx));
            self.homes.insert(dest.to_string(), idx);
        }
        self.rows.push(Row {
            value,
            home,
            ty,
            overwritten: None,
        });
    }

    fn overwrite(&mut self, idx: usize, at: usize) {
        if let Some(old) = &self.rows[idx].home {
            self.homes.remove(old);
            self.rows[idx].overwritten = Some(at);
        }
    }

    /// Move overwritten rows that are still read afterwards to fresh
    /// variables, so that those readers keep seeing the earlier value.
    /// Rows nobody reads after the overwrite keep their name.
    fn rename_overwritten(&mut self) {
        let mut read_late = vec![false; self.rows.len()];
        let mut mark = |operand: &Operand, pos: usize, rows: &[Row]| {
            if let Operand::Row(i) = operand {
                if rows[*i].overwritten.map_or(false, |at| pos >= at) {
                    read_late[*i] = true;
                }
            }
        };
        for (pos, row) in self.rows.iter().enumerate() {
            if let Value::Expr { args, .. } = &row.value {
                for arg in args {
                    mark(arg, pos, &self.rows);
                }
            }
        }
        // Copies emitted at the end of the block read after everything.
        for name in &self.defined {
            mark(&self.vars[name], usize::MAX, &self.rows);
        }

        for idx in 0..self.rows.len() {
            if !read_late[idx] {
                continue;
            }
            let old = match &self.rows[idx].home {
                Some(old) => old.clone(),
                None => continue,
            };
            let mut n = 1;
            let fresh = loop {
                let candidate = format!("{}.{}", old, n);
                if !self.reserved.contains(&candidate) && !self.taken.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            };
            trace!("row {} moves from {} to {}", idx, old, fresh);
            self.taken.insert(fresh.clone());
            self.rows[idx].home = Some(fresh);
        }
    }

    fn note_definition(&mut self, dest: &str, ty: &Option<Type>) {
        if !self.types.contains_key(dest) {
            self.defined.push(dest.to_string());
        }
        self.types.insert(dest.to_string(), ty.clone());
    }

    fn name_of(&self, operand: &Operand) -> String {
        match operand {
            Operand::Row(i) => self.rows[*i]
                .home
                .clone()
                .expect("only rows with a destination are referenced"),
            Operand::Opaque(name) => name.clone(),
        }
    }

    fn regenerate(&self) -> Vec<Code> {
        let mut instrs: Vec<Code> = self
            .rows
            .iter()
            .map(|row| match &row.value {
                Value::Label(label) => Code::Label {
                    label: label.clone(),
                },
                Value::Const { op, literal } => Code::Instruction(Instruction {
                    dest: row.home.clone(),
                    instr_type: row.ty.clone(),
                    value: Some(literal.clone()),
                    ..Instruction::new(op)
                }),
                Value::Expr {
                    op,
                    args,
                    funcs,
                    labels,
                } => Code::Instruction(Instruction {
                    dest: row.home.clone(),
                    instr_type: row.ty.clone(),
                    args: args.iter().map(|a| self.name_of(a)).collect(),
                    funcs: funcs.clone(),
                    labels: labels.clone(),
                    ..Instruction::new(op)
                }),
            })
            .collect();

        // Variables whose final value lives under another name still have to
        // hold it when the block is left. Constants are loaded directly, ahead
        // of the copies, so that numbering the result again reproduces it.
        let (mut copies, ids): (Vec<Code>, Vec<Code>) = self
            .defined
            .iter()
            .filter_map(|name| {
                let operand = &self.vars[name];
                let home = self.name_of(operand);
                if home == *name {
                    return None;
                }
                let instr_type = self.types[name].clone();
                let instr = match operand {
                    Operand::Row(i) => match &self.rows[*i].value {
                        Value::Const { op, literal } => Instruction {
                            dest: Some(name.clone()),
                            instr_type,
                            value: Some(literal.clone()),
                            ..Instruction::new(op)
                        },
                        _ => Instruction {
                            dest: Some(name.clone()),
                            instr_type,
                            args: vec![home],
                            ..Instruction::new("id")
                        },
                    },
                    Operand::Opaque(_) => Instruction {
                        dest: Some(name.clone()),
                        instr_type,
                        args: vec![home],
                        ..Instruction::new("id")
                    },
                };
                Some(Code::Instruction(instr))
            })
            .partition(|code| code.as_instruction().map_or(false, Instruction::is_const));
        copies.extend(ids);
        let at = match instrs.last() {
            Some(last) if last.is_terminator() => instrs.len() - 1,
            _ => instrs.len(),
        };
        instrs.splice(at..at, copies);
        instrs
    }
}
