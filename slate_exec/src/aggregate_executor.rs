//! Aggregation over a single column, optionally grouped by another.

use crate::errors::ExecutionError;
use crate::executor::Executor;
use std::collections::HashMap;
use strata::tuple::{Field, FieldType, Schema, Tuple};

/// The supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

/// Output rows are `(groupVal, aggregateVal)` when grouping and a
/// single `(aggregateVal)` otherwise.
fn output_schema(group: Option<&(usize, FieldType)>) -> Schema {
    match group {
        Some(&(_, group_type)) => Schema::with_names(vec![
            (group_type, "groupVal"),
            (FieldType::Int, "aggregateVal"),
        ]),
        None => Schema::with_names(vec![(FieldType::Int, "aggregateVal")]),
    }
}

fn group_key(
    tuple: &Tuple,
    group: Option<&(usize, FieldType)>,
) -> Result<Option<Field>, ExecutionError> {
    match group {
        Some(&(index, _)) => tuple
            .field(index)
            .cloned()
            .map(Some)
            .ok_or_else(|| ExecutionError::FieldNotFound(format!("no field at index {index}"))),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct IntState {
    count: i64,
    sum: i64,
    min: Option<i32>,
    max: Option<i32>,
}

/// Computes one aggregate over an INT column.
pub struct IntegerAggregator {
    group: Option<(usize, FieldType)>,
    agg_field: usize,
    op: AggregateOp,
    groups: HashMap<Option<Field>, IntState>,
}

impl IntegerAggregator {
    pub fn new(group: Option<(usize, FieldType)>, agg_field: usize, op: AggregateOp) -> Self {
        Self {
            group,
            agg_field,
            op,
            groups: HashMap::new(),
        }
    }

    pub fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutionError> {
        let key = group_key(tuple, self.group.as_ref())?;
        let value = match tuple.field(self.agg_field) {
            Some(Field::Int(v)) => *v,
            Some(_) => {
                return Err(ExecutionError::GenericError(
                    "integer aggregate over a non-integer field".to_string(),
                ))
            }
            None => {
                return Err(ExecutionError::FieldNotFound(format!(
                    "no field at index {}",
                    self.agg_field
                )))
            }
        };

        let state = self.groups.entry(key).or_default();
        state.count += 1;
        state.sum += value as i64;
        state.min = Some(state.min.map_or(value, |m| m.min(value)));
        state.max = Some(state.max.map_or(value, |m| m.max(value)));
        Ok(())
    }

    pub fn results(&self) -> Result<Vec<Tuple>, ExecutionError> {
        let schema = output_schema(self.group.as_ref());
        let mut out = Vec::new();
        for (key, state) in &self.groups {
            let missing =
                || ExecutionError::GenericError("aggregate group has no values".to_string());
            let value = match self.op {
                AggregateOp::Min => state.min.ok_or_else(missing)?,
                AggregateOp::Max => state.max.ok_or_else(missing)?,
                AggregateOp::Sum => state.sum as i32,
                // Integer average truncates toward zero.
                AggregateOp::Avg => (state.sum / state.count) as i32,
                AggregateOp::Count => state.count as i32,
            };
            let fields = match key {
                Some(group_value) => vec![group_value.clone(), Field::Int(value)],
                None => vec![Field::Int(value)],
            };
            out.push(Tuple::new(schema.clone(), fields)?);
        }
        Ok(out)
    }

    fn clear(&mut self) {
        self.groups.clear();
    }
}

/// Counts rows of a STRING column; COUNT is the only aggregate defined
/// over strings.
pub struct StringAggregator {
    group: Option<(usize, FieldType)>,
    agg_field: usize,
    counts: HashMap<Option<Field>, i64>,
}

impl StringAggregator {
    pub fn new(
        group: Option<(usize, FieldType)>,
        agg_field: usize,
        op: AggregateOp,
    ) -> Result<Self, ExecutionError> {
        if op != AggregateOp::Count {
            return Err(ExecutionError::GenericError(
                "string fields only support COUNT".to_string(),
            ));
        }
        Ok(Self {
            group,
            agg_field,
            counts: HashMap::new(),
        })
    }

    pub fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutionError> {
        match tuple.field(self.agg_field) {
            Some(Field::Str(_)) => {}
            Some(_) => {
                return Err(ExecutionError::GenericError(
                    "string aggregate over a non-string field".to_string(),
                ))
            }
            None => {
                return Err(ExecutionError::FieldNotFound(format!(
                    "no field at index {}",
                    self.agg_field
                )))
            }
        }
        let key = group_key(tuple, self.group.as_ref())?;
        *self.counts.entry(key).or_insert(0) += 1;
        Ok(())
    }

    pub fn results(&self) -> Result<Vec<Tuple>, ExecutionError> {
        let schema = output_schema(self.group.as_ref());
        let mut out = Vec::new();
        for (key, count) in &self.counts {
            let fields = match key {
                Some(group_value) => vec![group_value.clone(), Field::Int(*count as i32)],
                None => vec![Field::Int(*count as i32)],
            };
            out.push(Tuple::new(schema.clone(), fields)?);
        }
        Ok(out)
    }

    fn clear(&mut self) {
        self.counts.clear();
    }
}

enum Aggregator {
    Int(IntegerAggregator),
    Str(StringAggregator),
}

impl Aggregator {
    fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutionError> {
        match self {
            Aggregator::Int(agg) => agg.merge(tuple),
            Aggregator::Str(agg) => agg.merge(tuple),
        }
    }

    fn results(&self) -> Result<Vec<Tuple>, ExecutionError> {
        match self {
            Aggregator::Int(agg) => agg.results(),
            Aggregator::Str(agg) => agg.results(),
        }
    }

    fn clear(&mut self) {
        match self {
            Aggregator::Int(agg) => agg.clear(),
            Aggregator::Str(agg) => agg.clear(),
        }
    }
}

/// Drains its child on the first `next`, then streams the aggregate
/// rows. The aggregator is picked by the aggregated column's type.
pub struct AggregateExecutor<'a> {
    child: Box<dyn Executor + 'a>,
    aggregator: Aggregator,
    schema: Schema,
    results: Option<std::vec::IntoIter<Tuple>>,
}

impl<'a> AggregateExecutor<'a> {
    pub fn new(
        child: Box<dyn Executor + 'a>,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self, ExecutionError> {
        let child_schema = child.schema();
        let field_type = |index: usize| {
            child_schema
                .field_type(index)
                .copied()
                .ok_or_else(|| ExecutionError::FieldNotFound(format!("no field at index {index}")))
        };

        let agg_type = field_type(agg_field)?;
        let group = match group_field {
            Some(index) => Some((index, field_type(index)?)),
            None => None,
        };

        let aggregator = match agg_type {
            FieldType::Int => Aggregator::Int(IntegerAggregator::new(group, agg_field, op)),
            FieldType::Str(_) => Aggregator::Str(StringAggregator::new(group, agg_field, op)?),
        };

        Ok(Self {
            child,
            schema: output_schema(group.as_ref()),
            aggregator,
            results: None,
        })
    }
}

impl Executor for AggregateExecutor<'_> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        if self.results.is_none() {
            while let Some(tuple) = self.child.next()? {
                self.aggregator.merge(&tuple)?;
            }
            self.results = Some(self.aggregator.results()?.into_iter());
        }
        Ok(self.results.as_mut().and_then(|iter| iter.next()))
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        self.child.rewind()?;
        self.aggregator.clear();
        self.results = None;
        Ok(())
    }
}
