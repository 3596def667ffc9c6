//! Lowers a body expression into [`Pseudocode`].

use tracing::trace;

use super::pseudocode::{InstructionKind, JumpKind, Label, Pseudocode};
use crate::error::AnalysisError;
use crate::tree::{BinaryOperator, Expression, ExpressionKind, NodeId};

#[derive(Debug, Clone, Copy)]
struct LoopInfo {
    /// `continue` target.
    head: Label,
    /// `break` target.
    exit: Label,
}

pub struct ControlFlowBuilder {
    code: Pseudocode,
    loops: Vec<LoopInfo>,
}

impl ControlFlowBuilder {
    pub fn build(subroutine: NodeId, body: &Expression) -> Result<Pseudocode, AnalysisError> {
        let mut builder = Self {
            code: Pseudocode::new(subroutine),
            loops: Vec::new(),
        };
        builder.generate(body);
        builder.code.post_process()?;
        trace!(
            subroutine = %subroutine,
            instructions = builder.code.instruction_count(),
            "built pseudocode"
        );
        Ok(builder.code)
    }

    fn emit(&mut self, kind: InstructionKind) {
        self.code.push(kind);
    }

    fn jump(&mut self, kind: JumpKind, target: Label, element: Option<NodeId>) {
        self.emit(InstructionKind::Jump {
            kind,
            target,
            element,
        });
    }

    fn generate(&mut self, expression: &Expression) {
        let element = expression.id;
        match &expression.kind {
            ExpressionKind::Constant { .. } | ExpressionKind::Name { .. } => {
                self.emit(InstructionKind::ReadValue { element });
            }
            ExpressionKind::Dot { receiver, .. } => {
                self.generate(receiver);
                self.emit(InstructionKind::ReadValue { element });
            }
            ExpressionKind::Block { statements } => {
                if statements.is_empty() {
                    self.emit(InstructionKind::ReadUnitValue { element });
                }
                for statement in statements {
                    self.generate(statement);
                }
            }
            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.generate(condition);
                let else_label = self.code.create_label();
                self.jump(JumpKind::IfFalse, else_label, None);
                self.generate(then_branch);
                let end_label = self.code.create_label();
                self.jump(JumpKind::Unconditional, end_label, None);
                self.code.bind_label(else_label);
                match else_branch {
                    Some(else_branch) => self.generate(else_branch),
                    None => self.emit(InstructionKind::ReadUnitValue { element }),
                }
                self.code.bind_label(end_label);
            }
            ExpressionKind::While { condition, body } => {
                let head = self.code.create_label();
                let exit = self.code.create_label();
                self.code.bind_label(head);
                self.generate(condition);
                self.jump(JumpKind::IfFalse, exit, None);
                self.loops.push(LoopInfo { head, exit });
                self.generate(body);
                self.loops.pop();
                self.jump(JumpKind::Unconditional, head, None);
                self.code.bind_label(exit);
                self.emit(InstructionKind::ReadUnitValue { element });
            }
            ExpressionKind::DoWhile { body, condition } => {
                let start = self.code.create_label();
                let check = self.code.create_label();
                let exit = self.code.create_label();
                self.code.bind_label(start);
                self.loops.push(LoopInfo { head: check, exit });
                self.generate(body);
                self.loops.pop();
                self.code.bind_label(check);
                self.generate(condition);
                self.jump(JumpKind::IfTrue, start, None);
                self.code.bind_label(exit);
                self.emit(InstructionKind::ReadUnitValue { element });
            }
            ExpressionKind::Break => match self.loops.last().copied() {
                Some(info) => self.jump(JumpKind::Unconditional, info.exit, Some(element)),
                None => self.emit(InstructionKind::UnsupportedElement { element }),
            },
            ExpressionKind::Continue => match self.loops.last().copied() {
                Some(info) => self.jump(JumpKind::Unconditional, info.head, Some(element)),
                None => self.emit(InstructionKind::UnsupportedElement { element }),
            },
            ExpressionKind::Return { value } => match value {
                Some(value) => {
                    self.generate(value);
                    self.emit(InstructionKind::ReturnValue { element });
                }
                None => self.emit(InstructionKind::ReturnNoValue { element }),
            },
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } if operator.is_short_circuit() => {
                self.generate(left);
                let end = self.code.create_label();
                let kind = if *operator == BinaryOperator::And {
                    JumpKind::IfFalse
                } else {
                    JumpKind::IfTrue
                };
                self.jump(kind, end, None);
                self.generate(right);
                self.code.bind_label(end);
                self.emit(InstructionKind::ReadValue { element });
            }
            ExpressionKind::Binary { left, right, .. } => {
                self.generate(left);
                self.generate(right);
                self.emit(InstructionKind::ReadValue { element });
            }
            ExpressionKind::Assign { target, value } => {
                if let ExpressionKind::Dot { receiver, .. } = &target.kind {
                    self.generate(receiver);
                }
                self.generate(value);
                self.emit(InstructionKind::WriteValue { element });
            }
            ExpressionKind::Call { arguments, .. } => {
                for argument in arguments {
                    self.generate(argument);
                }
                self.emit(InstructionKind::ReadValue { element });
            }
            ExpressionKind::LocalVariable { initializer, .. } => {
                if let Some(initializer) = initializer {
                    self.generate(initializer);
                }
                self.emit(InstructionKind::WriteValue { element });
            }
            ExpressionKind::Lambda { .. } => {
                self.emit(InstructionKind::UnsupportedElement { element });
            }
        }
    }
}
