use crate::class_graph::ClassId;
use crate::code::Instruction;
use crate::frame::MethodContext;
use std::fmt;
use std::ops::Range;

/// Opaque label for a basic block within one method
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BlockId(pub usize);

impl BlockId {
    /// Label for the first block in the method
    pub const ENTRY: BlockId = BlockId(0);
}

impl fmt::Debug for BlockId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("b{}", self.0))
    }
}

/// Exception handler covering a basic block
#[derive(Clone, Debug)]
pub struct ExceptionHandler<'g> {
    /// Class of exceptions routed to the handler, with `None` for a catch-all
    pub guard: Option<ClassId<'g>>,

    /// Block where handling starts
    pub target: BlockId,
}

/// A JVM method code body is made up of a linear sequence of basic blocks.
///
/// Each block covers a contiguous range of the method's instructions. Control flow is stored
/// here and not on the instructions: `successors` lists where the block's final instruction can
/// branch or fall through to, and `handlers` lists the exceptional edges live anywhere in the
/// block.
#[derive(Clone, Debug)]
pub struct BasicBlock<'g> {
    /// Positions of this block's instructions within the enclosing method body
    pub range: Range<usize>,

    /// Blocks that control can reach when this block ends normally
    pub successors: Vec<BlockId>,

    /// Exception handlers covering this block
    pub handlers: Vec<ExceptionHandler<'g>>,
}

/// Decoded body of one method, ready for frame analysis
///
/// The blocks partition `instructions` and [`BlockId::ENTRY`] is where execution starts. A
/// malformed body (block ranges out of bounds, edges to ids past the end of the block list) is
/// a bug in whatever produced it and panics; it is never reported as a verification failure.
#[derive(Clone, Debug)]
pub struct MethodBody<'g> {
    /// Method this is the body of, along with its declared limits
    pub context: MethodContext<'g>,

    /// Every instruction in the method, in order
    pub instructions: Vec<Instruction<'g>>,

    /// Basic blocks covering `instructions`
    pub blocks: Vec<BasicBlock<'g>>,
}

impl<'g> MethodBody<'g> {
    /// Instructions making up one block
    pub fn block_instructions(&self, block: BlockId) -> &[Instruction<'g>] {
        &self.instructions[self.blocks[block.0].range.clone()]
    }
}
