use super::{Executor, Predicate};
use crate::errors::ExecutionError;
use strata::tuple::{Schema, Tuple};

/// Passes through the child's tuples that satisfy the predicate.
pub struct FilterExecutor<'a> {
    child: Box<dyn Executor + 'a>,
    predicate: Predicate,
}

impl<'a> FilterExecutor<'a> {
    pub fn new(child: Box<dyn Executor + 'a>, predicate: Predicate) -> Self {
        Self { child, predicate }
    }
}

impl Executor for FilterExecutor<'_> {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        while let Some(tuple) = self.child.next()? {
            if self.predicate.matches(&tuple)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        self.child.rewind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::CmpOp;
    use strata::tuple::{Field, FieldType};

    struct RowSource {
        schema: Schema,
        rows: Vec<Tuple>,
        cursor: usize,
    }

    impl Executor for RowSource {
        fn schema(&self) -> &Schema {
            &self.schema
        }

        fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
            let row = self.rows.get(self.cursor).cloned();
            self.cursor += 1;
            Ok(row)
        }

        fn rewind(&mut self) -> Result<(), ExecutionError> {
            self.cursor = 0;
            Ok(())
        }
    }

    fn source(values: &[i32]) -> RowSource {
        let schema = Schema::with_names(vec![(FieldType::Int, "a")]);
        RowSource {
            rows: values
                .iter()
                .map(|&v| Tuple::new(schema.clone(), vec![Field::Int(v)]).unwrap())
                .collect(),
            schema,
            cursor: 0,
        }
    }

    #[test]
    fn keeps_only_matching_tuples() {
        let mut filter = FilterExecutor::new(
            Box::new(source(&[1, 5, 2, 8, 3])),
            Predicate::new(0, CmpOp::Gt, Field::Int(2)),
        );
        let mut seen = Vec::new();
        while let Some(t) = filter.next().unwrap() {
            seen.push(t.field(0).cloned().unwrap());
        }
        assert_eq!(seen, vec![Field::Int(5), Field::Int(8), Field::Int(3)]);
    }

    #[test]
    fn rewind_restarts_the_stream() {
        let mut filter = FilterExecutor::new(
            Box::new(source(&[1, 5])),
            Predicate::new(0, CmpOp::Ge, Field::Int(5)),
        );
        assert!(filter.next().unwrap().is_some());
        assert!(filter.next().unwrap().is_none());
        filter.rewind().unwrap();
        assert!(filter.next().unwrap().is_some());
    }
}
