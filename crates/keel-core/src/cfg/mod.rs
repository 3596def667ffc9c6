//! Control-flow graphs over declaration bodies
//!
//! Each body is lowered into [`Pseudocode`], an instruction graph that may be
//! cyclic, and queried through a [`FlowInformationProvider`]. Graphs are built
//! per body resolution and dropped afterwards.

pub mod builder;
pub mod flow;
pub mod pseudocode;

pub use builder::ControlFlowBuilder;
pub use flow::{
    ControlFlowData, EmptyFlowInformation, FlowInformationProvider, ForbiddenFlowInformation,
    ReturnedInformation, collect_reachable, collect_reachable_recursive, reachable_from,
};
pub use pseudocode::{Instruction, InstructionId, InstructionKind, JumpKind, Label, Pseudocode};
