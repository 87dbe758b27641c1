//! The operator trait and the predicates the operators evaluate.

pub mod dml;
pub mod filter;
pub mod join;
pub mod scan;

use crate::errors::ExecutionError;
use std::cmp::Ordering;
use strata::tuple::{Field, Schema, Tuple};

/// A pull-based operator. `next` yields one tuple per call until the
/// input is exhausted; `rewind` restarts the stream from the beginning.
pub trait Executor {
    fn schema(&self) -> &Schema;
    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError>;
    fn rewind(&mut self) -> Result<(), ExecutionError>;
}

/// Comparison operators for predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

fn field_of(tuple: &Tuple, index: usize) -> Result<&Field, ExecutionError> {
    tuple
        .field(index)
        .ok_or_else(|| ExecutionError::FieldNotFound(format!("no field at index {index}")))
}

fn compare(left: &Field, right: &Field) -> Result<Ordering, ExecutionError> {
    left.compare(right).ok_or_else(|| {
        ExecutionError::GenericError("cannot compare values of different kinds".to_string())
    })
}

/// Compares one tuple field against a constant.
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: CmpOp,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: CmpOp, operand: Field) -> Self {
        Self { field, op, operand }
    }

    pub fn matches(&self, tuple: &Tuple) -> Result<bool, ExecutionError> {
        let value = field_of(tuple, self.field)?;
        Ok(self.op.holds(compare(value, &self.operand)?))
    }
}

/// Compares a field of one tuple against a field of another.
#[derive(Debug, Clone, Copy)]
pub struct JoinPredicate {
    left_field: usize,
    op: CmpOp,
    right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: CmpOp, right_field: usize) -> Self {
        Self {
            left_field,
            op,
            right_field,
        }
    }

    pub fn matches(&self, left: &Tuple, right: &Tuple) -> Result<bool, ExecutionError> {
        let lhs = field_of(left, self.left_field)?;
        let rhs = field_of(right, self.right_field)?;
        Ok(self.op.holds(compare(lhs, rhs)?))
    }
}
