//! Instruction graph for one subroutine body
//!
//! Instructions are emitted in order by the builder; jumps name a [`Label`]
//! that is bound to a position later. [`Pseudocode::post_process`] turns the
//! ordered list into `next`/`previous` edges:
//! - fall-through to the following instruction
//! - jumps to their label (plus fall-through when conditional)
//! - returns straight to the subroutine exit

use std::collections::HashMap;

use id_arena::{Arena, Id};

use crate::error::AnalysisError;
use crate::tree::NodeId;

pub type InstructionId = Id<Instruction>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Unconditional,
    IfTrue,
    IfFalse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionKind {
    SubroutineEnter { subroutine: NodeId },
    SubroutineExit { subroutine: NodeId },
    ReadValue { element: NodeId },
    ReadUnitValue { element: NodeId },
    WriteValue { element: NodeId },
    ReturnValue { element: NodeId },
    ReturnNoValue { element: NodeId },
    Jump {
        kind: JumpKind,
        target: Label,
        element: Option<NodeId>,
    },
    UnsupportedElement { element: NodeId },
}

impl InstructionKind {
    /// Expression this instruction stands for; `None` for enter/exit and
    /// synthetic jumps.
    pub fn element(&self) -> Option<NodeId> {
        match self {
            InstructionKind::SubroutineEnter { .. } | InstructionKind::SubroutineExit { .. } => {
                None
            }
            InstructionKind::ReadValue { element }
            | InstructionKind::ReadUnitValue { element }
            | InstructionKind::WriteValue { element }
            | InstructionKind::ReturnValue { element }
            | InstructionKind::ReturnNoValue { element }
            | InstructionKind::UnsupportedElement { element } => Some(*element),
            InstructionKind::Jump { element, .. } => *element,
        }
    }
}

#[derive(Debug)]
pub struct Instruction {
    pub id: InstructionId,
    pub kind: InstructionKind,
    pub next: Vec<InstructionId>,
    pub previous: Vec<InstructionId>,
}

#[derive(Debug)]
pub struct Pseudocode {
    subroutine: NodeId,
    instructions: Arena<Instruction>,
    order: Vec<InstructionId>,
    labels: Vec<Option<usize>>,
    representatives: HashMap<NodeId, InstructionId>,
    enter: InstructionId,
    exit: InstructionId,
}

impl Pseudocode {
    pub(crate) fn new(subroutine: NodeId) -> Self {
        let mut instructions = Arena::new();
        let enter = instructions.alloc_with_id(|id| Instruction {
            id,
            kind: InstructionKind::SubroutineEnter { subroutine },
            next: Vec::new(),
            previous: Vec::new(),
        });
        // Allocated now so returns can target it; placed last on close.
        let exit = instructions.alloc_with_id(|id| Instruction {
            id,
            kind: InstructionKind::SubroutineExit { subroutine },
            next: Vec::new(),
            previous: Vec::new(),
        });
        Self {
            subroutine,
            instructions,
            order: vec![enter],
            labels: Vec::new(),
            representatives: HashMap::new(),
            enter,
            exit,
        }
    }

    pub(crate) fn push(&mut self, kind: InstructionKind) -> InstructionId {
        let element = kind.element();
        let id = self.instructions.alloc_with_id(|id| Instruction {
            id,
            kind,
            next: Vec::new(),
            previous: Vec::new(),
        });
        self.order.push(id);
        if let Some(element) = element {
            self.representatives.entry(element).or_insert(id);
        }
        id
    }

    pub(crate) fn create_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the next instruction emitted.
    pub(crate) fn bind_label(&mut self, label: Label) {
        self.labels[label.0] = Some(self.order.len());
    }

    /// Appends the exit instruction and links all edges.
    pub(crate) fn post_process(&mut self) -> Result<(), AnalysisError> {
        self.order.push(self.exit);

        for index in 0..self.order.len() {
            let id = self.order[index];
            let fall_through = self.order.get(index + 1).copied();
            let targets = match &self.instructions[id].kind {
                InstructionKind::SubroutineExit { .. } => Vec::new(),
                InstructionKind::ReturnValue { .. } | InstructionKind::ReturnNoValue { .. } => {
                    vec![self.exit]
                }
                InstructionKind::Jump { kind, target, .. } => {
                    let mut targets = vec![self.resolve(*target)?];
                    if *kind != JumpKind::Unconditional {
                        targets.extend(fall_through);
                    }
                    targets
                }
                _ => fall_through.into_iter().collect(),
            };
            for target in targets {
                self.add_edge(id, target);
            }
        }
        Ok(())
    }

    fn resolve(&self, label: Label) -> Result<InstructionId, AnalysisError> {
        self.labels
            .get(label.0)
            .copied()
            .flatten()
            .and_then(|position| self.order.get(position).copied())
            .ok_or_else(|| {
                AnalysisError::internal_at(
                    self.subroutine,
                    format!("label {} was never bound", label.0),
                )
            })
    }

    fn add_edge(&mut self, from: InstructionId, to: InstructionId) {
        if !self.instructions[from].next.contains(&to) {
            self.instructions[from].next.push(to);
        }
        if !self.instructions[to].previous.contains(&from) {
            self.instructions[to].previous.push(from);
        }
    }

    pub fn subroutine(&self) -> NodeId {
        self.subroutine
    }

    pub fn enter(&self) -> InstructionId {
        self.enter
    }

    pub fn exit(&self) -> InstructionId {
        self.exit
    }

    pub fn get(&self, id: InstructionId) -> &Instruction {
        &self.instructions[id]
    }

    /// Instructions in emission order, exit last.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.order.iter().map(|&id| &self.instructions[id])
    }

    pub fn instruction_count(&self) -> usize {
        self.order.len()
    }

    /// First instruction emitted for `element`.
    pub fn representative(&self, element: NodeId) -> Option<InstructionId> {
        self.representatives.get(&element).copied()
    }

    pub fn successors(&self, id: InstructionId) -> impl Iterator<Item = &Instruction> {
        self.instructions[id]
            .next
            .iter()
            .map(|&next| &self.instructions[next])
    }

    pub fn predecessors(&self, id: InstructionId) -> impl Iterator<Item = &Instruction> {
        self.instructions[id]
            .previous
            .iter()
            .map(|&prev| &self.instructions[prev])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_subroutine_links_enter_to_exit() {
        let mut code = Pseudocode::new(NodeId(1));
        code.post_process().unwrap();

        assert_eq!(code.instruction_count(), 2);
        assert_eq!(code.get(code.enter()).next, vec![code.exit()]);
        assert_eq!(code.get(code.exit()).previous, vec![code.enter()]);
        assert!(code.get(code.exit()).next.is_empty());
    }

    #[test]
    fn return_links_to_exit_and_not_to_next_instruction() {
        let mut code = Pseudocode::new(NodeId(1));
        let ret = code.push(InstructionKind::ReturnNoValue { element: NodeId(2) });
        let dead = code.push(InstructionKind::ReadValue { element: NodeId(3) });
        code.post_process().unwrap();

        assert_eq!(code.get(ret).next, vec![code.exit()]);
        assert!(code.get(dead).previous.is_empty());
        assert_eq!(code.get(dead).next, vec![code.exit()]);
    }

    #[test]
    fn conditional_jump_has_two_successors() {
        let mut code = Pseudocode::new(NodeId(1));
        let end = code.create_label();
        let jump = code.push(InstructionKind::Jump {
            kind: JumpKind::IfFalse,
            target: end,
            element: None,
        });
        let read = code.push(InstructionKind::ReadValue { element: NodeId(2) });
        code.bind_label(end);
        code.post_process().unwrap();

        assert_eq!(code.get(jump).next, vec![code.exit(), read]);
        let exit_preds: Vec<InstructionId> = code.predecessors(code.exit()).map(|i| i.id).collect();
        assert_eq!(exit_preds, vec![jump, read]);
    }

    #[test]
    fn unbound_label_is_an_internal_error() {
        let mut code = Pseudocode::new(NodeId(1));
        let nowhere = code.create_label();
        code.push(InstructionKind::Jump {
            kind: JumpKind::Unconditional,
            target: nowhere,
            element: None,
        });

        let err = code.post_process().unwrap_err();
        assert!(matches!(err, AnalysisError::Internal { .. }));
    }

    #[test]
    fn representative_is_first_instruction_for_element() {
        let mut code = Pseudocode::new(NodeId(1));
        let first = code.push(InstructionKind::ReadValue { element: NodeId(4) });
        code.push(InstructionKind::ReturnValue { element: NodeId(4) });

        assert_eq!(code.representative(NodeId(4)), Some(first));
        assert_eq!(code.representative(NodeId(5)), None);
    }
}
