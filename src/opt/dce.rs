use std::collections::HashMap;

use log::debug;
use replace_with::replace_with_or_abort;

use crate::cfg::BasicBlock;

/**
 * Single scan of trivial dead code elimination over a block.
 *
 * A definition is dead if its variable is written again before any read, or,
 * when `end_of_function` is set, if it is never read in the rest of the block.
 * Returns the number of deleted instructions.
 */
pub fn dce_scan(block: &mut BasicBlock, end_of_function: bool) -> usize {
    let mut dead = vec![false; block.instrs.len()];
    {
        // Unread definition of each variable.
        let mut candidates: HashMap<&str, usize> = HashMap::new();
        for (i, code) in block.instrs.iter().enumerate() {
            for arg in code.args() {
                candidates.remove(arg.as_str());
            }
            let instr = match code.as_instruction() {
                Some(instr) => instr,
                None => continue,
            };
            let dest = match instr.dest.as_deref() {
                Some(dest) => dest,
                None => continue,
            };
            let shadowed = if instr.has_side_effects() {
                candidates.remove(dest)
            } else {
                candidates.insert(dest, i)
            };
            if let Some(prev) = shadowed {
                dead[prev] = true;
            }
        }
        if end_of_function {
            for i in candidates.into_values() {
                dead[i] = true;
            }
        }
    }

    let removed = dead.iter().filter(|d| **d).count();
    if removed == 0 {
        return 0;
    }
    replace_with_or_abort(&mut block.instrs, |instrs| {
        instrs
            .into_iter()
            .zip(dead)
            .filter_map(|(code, dead)| {
                if dead {
                    debug!("{}: deleting `{}'", block.id, code);
                    None
                } else {
                    Some(code)
                }
            })
            .collect()
    });
    removed
}

/// Repeat `dce_scan` until it finds nothing more to delete.
pub fn dce_block(block: &mut BasicBlock, end_of_function: bool) -> usize {
    let mut total = 0;
    loop {
        let removed = dce_scan(block, end_of_function);
        if removed == 0 {
            return total;
        }
        total += removed;
    }
}
