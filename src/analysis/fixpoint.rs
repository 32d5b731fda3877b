use crate::class_graph::JavaClasses;
use crate::code::{BlockId, MethodBody};
use crate::frame::FrameState;
use crate::util::Offset;
use std::collections::VecDeque;

/// Frame states of one method, computed to a fixpoint
#[derive(Debug)]
pub struct MethodFlow<'g> {
    /// State on entry to each block, indexed the same way as [`MethodBody::blocks`]
    ///
    /// A block no path reaches keeps [`FrameState::Bottom`] here.
    pub block_entries: Vec<FrameState<'g>>,
}

impl<'g> MethodFlow<'g> {
    /// Run a method body to its dataflow fixpoint
    ///
    /// Starts from the parameter frame in the entry block, then keeps merging every block's
    /// out-state into its successors (and the exceptional state of every throwing instruction
    /// into the covering handlers) until nothing changes. Merging uses the frame join, so
    /// disagreeing locals degrade to unusable slots while disagreeing stacks turn the target
    /// block into an error state.
    pub fn compute(body: &MethodBody<'g>, java: &JavaClasses<'g>) -> MethodFlow<'g> {
        let cx = &body.context;
        let mut block_entries = vec![FrameState::Bottom; body.blocks.len()];
        block_entries[BlockId::ENTRY.0] = FrameState::entry(cx);

        let mut queued = vec![false; body.blocks.len()];
        let mut worklist = VecDeque::new();
        worklist.push_back(BlockId::ENTRY);
        queued[BlockId::ENTRY.0] = true;

        while let Some(block) = worklist.pop_front() {
            queued[block.0] = false;
            let block_data = &body.blocks[block.0];
            let mut state = block_entries[block.0].clone();

            for (position, instruction) in body.block_instructions(block).iter().enumerate() {
                // A throwing instruction hands its pre-state, with the stack replaced by the
                // thrown value, to every handler covering the block
                if instruction.can_throw() && matches!(state, FrameState::Concrete(_)) {
                    for handler in &block_data.handlers {
                        let thrown = state.clone().push_exception(cx, java, handler.guard);
                        merge(
                            handler.target,
                            thrown,
                            java,
                            &mut block_entries,
                            &mut queued,
                            &mut worklist,
                        );
                    }
                }
                let at = Offset(block_data.range.start + position);
                state = instruction.evaluate(state, at, cx, java);
            }

            for &successor in &block_data.successors {
                merge(
                    successor,
                    state.clone(),
                    java,
                    &mut block_entries,
                    &mut queued,
                    &mut worklist,
                );
            }
        }

        MethodFlow { block_entries }
    }
}

fn merge<'g>(
    target: BlockId,
    incoming: FrameState<'g>,
    java: &JavaClasses<'g>,
    block_entries: &mut [FrameState<'g>],
    queued: &mut [bool],
    worklist: &mut VecDeque<BlockId>,
) {
    let current = block_entries[target.0].clone();
    let merged = current.clone().join(incoming, java);
    if merged != current {
        log::trace!("entry of {:?} is now {:?}", target, merged);
        block_entries[target.0] = merged;
        if !queued[target.0] {
            queued[target.0] = true;
            worklist.push_back(target);
        }
    }
}
