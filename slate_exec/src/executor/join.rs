use super::{Executor, JoinPredicate};
use crate::errors::ExecutionError;
use strata::tuple::{Schema, Tuple};

/// Nested-loop join. The right input is materialized once and replayed
/// for every left tuple; the output schema is the two schemas
/// concatenated, left columns first.
pub struct NestedLoopJoinExecutor<'a> {
    left: Box<dyn Executor + 'a>,
    right: Box<dyn Executor + 'a>,
    predicate: JoinPredicate,
    schema: Schema,
    right_rows: Vec<Tuple>,
    right_materialized: bool,
    right_cursor: usize,
    left_row: Option<Tuple>,
    left_primed: bool,
}

impl<'a> NestedLoopJoinExecutor<'a> {
    pub fn new(
        left: Box<dyn Executor + 'a>,
        right: Box<dyn Executor + 'a>,
        predicate: JoinPredicate,
    ) -> Self {
        let schema = Schema::merge(left.schema(), right.schema());
        Self {
            left,
            right,
            predicate,
            schema,
            right_rows: Vec::new(),
            right_materialized: false,
            right_cursor: 0,
            left_row: None,
            left_primed: false,
        }
    }
}

impl Executor for NestedLoopJoinExecutor<'_> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        if !self.right_materialized {
            while let Some(row) = self.right.next()? {
                self.right_rows.push(row);
            }
            self.right_materialized = true;
        }
        if !self.left_primed {
            self.left_row = self.left.next()?;
            self.left_primed = true;
        }

        loop {
            let Some(left_row) = self.left_row.as_ref() else {
                return Ok(None);
            };

            while self.right_cursor < self.right_rows.len() {
                let right_row = &self.right_rows[self.right_cursor];
                self.right_cursor += 1;

                if self.predicate.matches(left_row, right_row)? {
                    let mut fields = left_row.fields().to_vec();
                    fields.extend(right_row.fields().iter().cloned());
                    let joined = Tuple::new(self.schema.clone(), fields)?;
                    return Ok(Some(joined));
                }
            }

            self.left_row = self.left.next()?;
            self.right_cursor = 0;
        }
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        self.left.rewind()?;
        self.left_row = None;
        self.left_primed = false;
        self.right_cursor = 0;
        Ok(())
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

    fn pairs(name_a: &str, name_b: &str, values: &[(i32, i32)]) -> RowSource {
        let schema = Schema::with_names(vec![(FieldType::Int, name_a), (FieldType::Int, name_b)]);
        RowSource {
            rows: values
                .iter()
                .map(|&(a, b)| {
                    Tuple::new(schema.clone(), vec![Field::Int(a), Field::Int(b)]).unwrap()
                })
                .collect(),
            schema,
            cursor: 0,
        }
    }

    fn collect(join: &mut NestedLoopJoinExecutor<'_>) -> Vec<Vec<Field>> {
        let mut out = Vec::new();
        while let Some(t) = join.next().unwrap() {
            out.push(t.fields().to_vec());
        }
        out
    }

    #[test]
    fn equality_join_pairs_matching_rows() {
        let left = pairs("id", "x", &[(1, 10), (2, 20), (3, 30)]);
        let right = pairs("ref", "y", &[(2, 200), (3, 300), (2, 201)]);
        let mut join = NestedLoopJoinExecutor::new(
            Box::new(left),
            Box::new(right),
            JoinPredicate::new(0, CmpOp::Eq, 0),
        );

        assert_eq!(join.schema().num_fields(), 4);
        let rows = collect(&mut join);
        assert_eq!(
            rows,
            vec![
                vec![
                    Field::Int(2),
                    Field::Int(20),
                    Field::Int(2),
                    Field::Int(200)
                ],
                vec![
                    Field::Int(2),
                    Field::Int(20),
                    Field::Int(2),
                    Field::Int(201)
                ],
                vec![
                    Field::Int(3),
                    Field::Int(30),
                    Field::Int(3),
                    Field::Int(300)
                ],
            ]
        );
    }

    #[test]
    fn join_with_no_matches_is_empty() {
        let left = pairs("id", "x", &[(1, 10)]);
        let right = pairs("ref", "y", &[(9, 90)]);
        let mut join = NestedLoopJoinExecutor::new(
            Box::new(left),
            Box::new(right),
            JoinPredicate::new(0, CmpOp::Eq, 0),
        );
        assert!(collect(&mut join).is_empty());
    }

    #[test]
    fn rewind_replays_the_full_cross_product() {
        let left = pairs("id", "x", &[(1, 10), (2, 20)]);
        let right = pairs("ref", "y", &[(1, 100), (2, 200)]);
        let mut join = NestedLoopJoinExecutor::new(
            Box::new(left),
            Box::new(right),
            JoinPredicate::new(0, CmpOp::Eq, 0),
        );

        let first = collect(&mut join);
        join.rewind().unwrap();
        let second = collect(&mut join);
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }
}
