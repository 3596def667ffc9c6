//! Flow queries over built pseudocode.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::builder::ControlFlowBuilder;
use super::pseudocode::{InstructionId, InstructionKind, Pseudocode};
use crate::diagnostic::{DiagnosticCode, ErrorHandler};
use crate::error::AnalysisError;
use crate::tree::{Expression, NodeId};

/// Where a subroutine's value comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnedInformation {
    /// Expressions whose value flows into the exit.
    pub returned_expressions: Vec<NodeId>,
    /// Elements after which the subroutine finishes without a value.
    pub unit_returning: Vec<NodeId>,
}

pub trait FlowInformationProvider {
    fn collect_returned_information(
        &self,
        subroutine: NodeId,
        errors: &mut dyn ErrorHandler,
    ) -> Result<ReturnedInformation, AnalysisError>;

    fn collect_unreachable_expressions(
        &self,
        subroutine: NodeId,
    ) -> Result<Vec<NodeId>, AnalysisError>;

    fn collect_dominated_expressions(&self, dominator: NodeId) -> Vec<NodeId>;
}

/// Answers nothing; used where no body graph exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyFlowInformation;

impl FlowInformationProvider for EmptyFlowInformation {
    fn collect_returned_information(
        &self,
        _subroutine: NodeId,
        _errors: &mut dyn ErrorHandler,
    ) -> Result<ReturnedInformation, AnalysisError> {
        Ok(ReturnedInformation::default())
    }

    fn collect_unreachable_expressions(
        &self,
        _subroutine: NodeId,
    ) -> Result<Vec<NodeId>, AnalysisError> {
        Ok(Vec::new())
    }

    fn collect_dominated_expressions(&self, _dominator: NodeId) -> Vec<NodeId> {
        Vec::new()
    }
}

/// For contexts that must never ask flow questions, such as import
/// resolution. Returned-information and unreachable-code queries fail with
/// an internal error. Dominated expressions come back empty, since
/// that query cannot fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForbiddenFlowInformation;

impl FlowInformationProvider for ForbiddenFlowInformation {
    fn collect_returned_information(
        &self,
        subroutine: NodeId,
        _errors: &mut dyn ErrorHandler,
    ) -> Result<ReturnedInformation, AnalysisError> {
        Err(AnalysisError::internal_at(
            subroutine,
            "flow information requested where none is available",
        ))
    }

    fn collect_unreachable_expressions(
        &self,
        subroutine: NodeId,
    ) -> Result<Vec<NodeId>, AnalysisError> {
        Err(AnalysisError::internal_at(
            subroutine,
            "flow information requested where none is available",
        ))
    }

    fn collect_dominated_expressions(&self, _dominator: NodeId) -> Vec<NodeId> {
        Vec::new()
    }
}

/// Flow information for the bodies built so far, keyed by subroutine node.
#[derive(Debug, Default)]
pub struct ControlFlowData {
    pseudocodes: HashMap<NodeId, Pseudocode>,
}

impl ControlFlowData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph for one body.
    pub fn build(subroutine: NodeId, body: &Expression) -> Result<Self, AnalysisError> {
        let mut data = Self::new();
        data.add(subroutine, body)?;
        Ok(data)
    }

    pub fn add(&mut self, subroutine: NodeId, body: &Expression) -> Result<(), AnalysisError> {
        let code = ControlFlowBuilder::build(subroutine, body)?;
        debug!(subroutine = %subroutine, instructions = code.instruction_count(), "computed flow data");
        self.pseudocodes.insert(subroutine, code);
        Ok(())
    }

    pub fn pseudocode(&self, subroutine: NodeId) -> Option<&Pseudocode> {
        self.pseudocodes.get(&subroutine)
    }

    fn require(&self, subroutine: NodeId) -> Result<&Pseudocode, AnalysisError> {
        self.pseudocode(subroutine).ok_or_else(|| {
            AnalysisError::internal_at(subroutine, "no pseudocode for subroutine")
        })
    }
}

impl FlowInformationProvider for ControlFlowData {
    fn collect_returned_information(
        &self,
        subroutine: NodeId,
        errors: &mut dyn ErrorHandler,
    ) -> Result<ReturnedInformation, AnalysisError> {
        let code = self.require(subroutine)?;
        let reachable = reachable_from(code, code.enter());

        let mut info = ReturnedInformation::default();
        let mut visited = HashSet::new();
        let mut pending = vec![code.exit()];
        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            for &previous in &code.get(current).previous {
                if !reachable.contains(&previous) {
                    continue;
                }
                match &code.get(previous).kind {
                    InstructionKind::ReadValue { element }
                    | InstructionKind::ReadUnitValue { element } => {
                        info.returned_expressions.push(*element);
                    }
                    InstructionKind::ReturnNoValue { element }
                    | InstructionKind::WriteValue { element } => {
                        info.unit_returning.push(*element);
                    }
                    InstructionKind::SubroutineEnter { subroutine } => {
                        info.unit_returning.push(*subroutine);
                    }
                    InstructionKind::Jump { .. } | InstructionKind::ReturnValue { .. } => {
                        pending.push(previous);
                    }
                    InstructionKind::UnsupportedElement { element } => {
                        errors.generic_error(
                            DiagnosticCode::UnsupportedConstruct,
                            *element,
                            "Unsupported by control-flow builder",
                        );
                    }
                    InstructionKind::SubroutineExit { .. } => {
                        return Err(AnalysisError::internal_at(
                            subroutine,
                            "subroutine exit precedes another instruction",
                        ));
                    }
                }
            }
        }
        Ok(info)
    }

    fn collect_unreachable_expressions(
        &self,
        subroutine: NodeId,
    ) -> Result<Vec<NodeId>, AnalysisError> {
        let code = self.require(subroutine)?;
        let reachable = reachable_from(code, code.enter());
        Ok(code
            .instructions()
            .filter(|instruction| !reachable.contains(&instruction.id))
            .filter(|instruction| {
                !matches!(instruction.kind, InstructionKind::ReadUnitValue { .. })
            })
            .filter_map(|instruction| instruction.kind.element())
            .collect())
    }

    fn collect_dominated_expressions(&self, dominator: NodeId) -> Vec<NodeId> {
        let Some((code, representative)) = self
            .pseudocodes
            .values()
            .find_map(|code| code.representative(dominator).map(|r| (code, r)))
        else {
            return Vec::new();
        };

        let all = reachable_from(code, code.enter());
        let mut prohibited = HashSet::from([representative]);
        collect_reachable(code, code.enter(), &mut prohibited);

        code.instructions()
            .filter(|instruction| all.contains(&instruction.id))
            .filter(|instruction| !prohibited.contains(&instruction.id))
            .filter_map(|instruction| instruction.kind.element())
            .collect()
    }
}

pub fn reachable_from(code: &Pseudocode, start: InstructionId) -> HashSet<InstructionId> {
    let mut visited = HashSet::new();
    collect_reachable(code, start, &mut visited);
    visited
}

/// Worklist reachability. Instructions already in `visited` act as walls.
pub fn collect_reachable(
    code: &Pseudocode,
    start: InstructionId,
    visited: &mut HashSet<InstructionId>,
) {
    if !visited.insert(start) {
        return;
    }
    let mut worklist = vec![start];
    while let Some(current) = worklist.pop() {
        for &next in &code.get(current).next {
            if visited.insert(next) {
                worklist.push(next);
            }
        }
    }
}

/// Recursive reachability; same contract as [`collect_reachable`].
pub fn collect_reachable_recursive(
    code: &Pseudocode,
    current: InstructionId,
    visited: &mut HashSet<InstructionId>,
) {
    if !visited.insert(current) {
        return;
    }
    for &next in &code.get(current).next {
        collect_reachable_recursive(code, next, visited);
    }
}
