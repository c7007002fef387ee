pub mod dce;
pub mod lvn;

use log::info;

use crate::cfg::Cfg;

/// Which optimizations to run over a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Passes {
    /// Only build the graph.
    None,
    /// A single sweep of local value numbering.
    Lvn,
    /// A single sweep of dead code elimination.
    Dce,
    /// Alternate both until nothing changes.
    All,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub rounds: usize,
    /// Number of times value numbering rewrote a block.
    pub rewritten: usize,
    /// Instructions deleted by dead code elimination.
    pub removed: usize,
}

/// Value-number every block. Returns the number of blocks that changed.
pub fn run_lvn(cfg: &mut Cfg) -> usize {
    let layouts = cfg.functions().to_vec();
    let mut changed = 0;
    for layout in &layouts {
        let names = lvn::function_names(cfg.blocks(), layout);
        for block in &mut cfg.blocks_mut()[layout.blocks.clone()] {
            if lvn::lvn_block(block, &names) {
                changed += 1;
            }
        }
    }
    changed
}

/// Run dead code elimination to a fixed point in every block.
/// Returns the number of deleted instructions.
pub fn run_dce(cfg: &mut Cfg) -> usize {
    let mut removed = 0;
    for i in 0..cfg.blocks().len() {
        let end_of_function = cfg.end_of_function(i);
        removed += dce::dce_block(&mut cfg.blocks_mut()[i], end_of_function);
    }
    removed
}

pub fn optimize(cfg: &mut Cfg, passes: Passes) -> Stats {
    let mut stats = Stats::default();
    match passes {
        Passes::None => (),
        Passes::Lvn => {
            stats.rounds = 1;
            stats.rewritten = run_lvn(cfg);
        }
        Passes::Dce => {
            stats.rounds = 1;
            stats.removed = run_dce(cfg);
        }
        Passes::All => loop {
            stats.rounds += 1;
            let rewritten = run_lvn(cfg);
            let removed = run_dce(cfg);
            info!(
                "round {}: {} blocks renumbered, {} instructions deleted",
                stats.rounds, rewritten, removed
            );
            stats.rewritten += rewritten;
            stats.removed += removed;
            if removed == 0 {
                break;
            }
        },
    }
    stats
}
