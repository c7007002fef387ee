use std::collections::{HashMap, HashSet};
use std::fmt::Formatter;
use std::ops::Range;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::graph::ObjectGraph;
use crate::program::{Argument, Code, Function, Program, Type};

/// Name of a block within its function.
///
/// Index-derived and label-derived names live in different variants, so a
/// label that looks like a number can never clash with an anonymous block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockName {
    Entry,
    /// Block following the terminator at this instruction index.
    Index(usize),
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockId {
    pub function: String,
    pub name: BlockName,
}

impl BlockId {
    pub fn entry(function: &str) -> Self {
        Self {
            function: function.to_string(),
            name: BlockName::Entry,
        }
    }

    pub fn by_index(function: &str, index: usize) -> Self {
        Self {
            function: function.to_string(),
            name: BlockName::Index(index),
        }
    }

    pub fn by_label(function: &str, label: &str) -> Self {
        Self {
            function: function.to_string(),
            name: BlockName::Label(label.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instrs: Vec<Code>,
    pub is_entry: bool,
}

impl BasicBlock {
    pub fn new(id: BlockId, is_entry: bool) -> Self {
        Self {
            id,
            instrs: Vec::new(),
            is_entry,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn terminator(&self) -> Option<&Code> {
        self.instrs.last().filter(|c| c.is_terminator())
    }
}

/// Where the blocks of one function live inside the CFG.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLayout {
    pub name: String,
    pub args: Vec<Argument>,
    pub return_type: Option<Type>,
    pub blocks: Range<usize>,
}

/// Control flow graph of a whole program.
///
/// Blocks are stored in program order; block `i` is node `i` of the edge graph.
/// Once built, the set of blocks and edges never changes, only the
/// instructions inside blocks do.
pub struct Cfg {
    blocks: Vec<BasicBlock>,
    edges: ObjectGraph<BlockId>,
    /// Edges added for jumps and branches, as opposed to calls.
    jumps: HashSet<(usize, usize)>,
    functions: Vec<FunctionLayout>,
}

/// Partitioning state that is only needed while the CFG is being built.
struct Builder {
    cfg: Cfg,
    /// Labels that open a function are folded into its entry block.
    aliases: HashMap<BlockId, BlockId>,
    /// Calls seen while partitioning: calling block and callee name.
    calls: Vec<(BlockId, String)>,
}

impl Cfg {
    pub fn build(program: &Program) -> Result<Self> {
        let mut builder = Builder {
            cfg: Cfg {
                blocks: Vec::new(),
                edges: ObjectGraph::new(),
                jumps: HashSet::new(),
                functions: Vec::new(),
            },
            aliases: HashMap::new(),
            calls: Vec::new(),
        };
        for function in &program.functions {
            builder.partition_function(function)?;
        }
        builder.add_call_edges()?;
        builder.add_jump_edges()?;
        debug!(
            "built cfg: {} functions, {} blocks",
            builder.cfg.functions.len(),
            builder.cfg.blocks.len()
        );
        Ok(builder.cfg)
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [BasicBlock] {
        &mut self.blocks
    }

    pub fn block(&self, index: usize) -> &BasicBlock {
        &self.blocks[index]
    }

    pub fn functions(&self) -> &[FunctionLayout] {
        &self.functions
    }

    pub fn find(&self, id: &BlockId) -> Option<usize> {
        self.edges.get_node_index(id)
    }

    pub fn entry_of(&self, function: &str) -> Option<usize> {
        self.find(&BlockId::entry(function))
    }

    pub fn successors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges.get_edges_from_index(index)
    }

    pub fn has_edge(&self, from: &BlockId, to: &BlockId) -> bool {
        self.edges.has_edge(from, to)
    }

    /// True if control can not reach another block of the same function
    /// from this one: it has no successors, or only function entries
    /// reached through calls.
    ///
    /// A jump to the entry of the block's own function is a loop back to its
    /// top and keeps the block non-terminal; a recursive call does not.
    pub fn end_of_function(&self, index: usize) -> bool {
        self.successors(index)
            .all(|s| self.blocks[s].is_entry && !self.jumps.contains(&(index, s)))
    }

    /// Reassemble the (possibly optimized) blocks into a program.
    pub fn to_program(&self) -> Program {
        let functions = self
            .functions
            .iter()
            .map(|layout| Function {
                name: layout.name.clone(),
                args: layout.args.clone(),
                return_type: layout.return_type.clone(),
                instrs: self.blocks[layout.blocks.clone()]
                    .iter()
                    .flat_map(|b| b.instrs.iter().cloned())
                    .collect(),
            })
            .collect();
        Program { functions }
    }
}

impl Builder {
    fn partition_function(&mut self, function: &Function) -> Result<()> {
        let fname = function.name.as_str();
        let first = self.cfg.blocks.len();
        let mut curr = BasicBlock::new(BlockId::entry(fname), true);
        for (i, code) in function.instrs.iter().enumerate() {
            match code {
                Code::Label { label } => {
                    if curr.is_entry && curr.is_empty() {
                        self.aliases
                            .insert(BlockId::by_label(fname, label), curr.id.clone());
                    } else {
                        self.add_block(curr)?;
                        curr = BasicBlock::new(BlockId::by_label(fname, label), false);
                    }
                    curr.instrs.push(code.clone());
                }
                Code::Instruction(instr) => {
                    curr.instrs.push(code.clone());
                    if instr.is_call() {
                        if instr.funcs.len() != 1 {
                            return Err(Error::CallTargetCount {
                                block: curr.id.to_string(),
                                count: instr.funcs.len(),
                            });
                        }
                        self.calls.push((curr.id.clone(), instr.funcs[0].clone()));
                    } else if instr.is_terminator() {
                        self.add_block(curr)?;
                        curr = BasicBlock::new(BlockId::by_index(fname, i), false);
                    }
                }
            }
        }
        self.add_block(curr)?;
        self.cfg.functions.push(FunctionLayout {
            name: function.name.clone(),
            args: function.args.clone(),
            return_type: function.return_type.clone(),
            blocks: first..self.cfg.blocks.len(),
        });
        Ok(())
    }

    fn add_block(&mut self, block: BasicBlock) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }
        if self.cfg.edges.get_node_index(&block.id).is_some() {
            return Err(Error::DuplicateBlock(block.id.to_string()));
        }
        let n = self.cfg.edges.add_node_unique(&block.id);
        debug_assert_eq!(n, self.cfg.blocks.len());
        trace!("block {} with {} instructions", block.id, block.instrs.len());
        self.cfg.blocks.push(block);
        Ok(())
    }

    fn add_call_edges(&mut self) -> Result<()> {
        let calls = std::mem::take(&mut self.calls);
        for (caller, callee) in calls {
            let entry = BlockId::entry(&callee);
            if self.cfg.edges.get_node_index(&entry).is_some() {
                self.cfg.edges.add_edge_unique(&caller, &entry);
            } else if self.cfg.functions.iter().any(|f| f.name == callee) {
                debug!("{} calls {} which has no body", caller, callee);
            } else {
                return Err(Error::UnknownBlock(entry.to_string()));
            }
        }
        Ok(())
    }

    fn add_jump_edges(&mut self) -> Result<()> {
        for index in 0..self.cfg.blocks.len() {
            let block = &self.cfg.blocks[index];
            let instr = match block.instrs.last().and_then(Code::as_instruction) {
                Some(instr) => instr,
                None => continue,
            };
            let targets = match instr.op.as_str() {
                "jmp" if instr.labels.len() == 1 => &instr.labels[..],
                "jmp" => {
                    return Err(Error::JumpLabelCount {
                        block: block.id.to_string(),
                        count: instr.labels.len(),
                    })
                }
                "br" if instr.labels.len() == 2 => &instr.labels[..],
                "br" => {
                    return Err(Error::BranchLabelCount {
                        block: block.id.to_string(),
                        count: instr.labels.len(),
                    })
                }
                _ => continue,
            };
            let from = block.id.clone();
            let targets: Vec<BlockId> = targets
                .iter()
                .map(|label| self.resolve_label(&from.function, label))
                .collect::<Result<_>>()?;
            for to in targets {
                self.cfg.edges.add_edge_unique(&from, &to);
                if let Some(to) = self.cfg.edges.get_node_index(&to) {
                    self.cfg.jumps.insert((index, to));
                }
            }
        }
        Ok(())
    }

    fn resolve_label(&self, function: &str, label: &str) -> Result<BlockId> {
        let id = BlockId::by_label(function, label);
        let id = self.aliases.get(&id).cloned().unwrap_or(id);
        if self.cfg.edges.get_node_index(&id).is_some() {
            Ok(id)
        } else {
            Err(Error::UnknownBlock(id.to_string()))
        }
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            BlockName::Entry => f.write_str(&self.function),
            BlockName::Index(n) => write!(f, "{}#{}", self.function, n),
            BlockName::Label(l) => write!(f, "{}.{}", self.function, l),
        }
    }
}

impl std::fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "[{}]:", self.id)?;
        for code in &self.instrs {
            writeln!(f, "  {}", code)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Cfg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Basic Blocks")?;
        for (i, block) in self.blocks.iter().enumerate() {
            write!(f, "BB{} {}", i, block)?;
        }
        writeln!(f, "Edges")?;
        write!(f, "{}", self.edges)
    }
}
