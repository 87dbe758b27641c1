mod common;

use common::*;
use slate_exec::aggregate_executor::{AggregateExecutor, AggregateOp};
use slate_exec::executor::dml::{DeleteExecutor, InsertExecutor};
use slate_exec::executor::filter::FilterExecutor;
use slate_exec::executor::join::NestedLoopJoinExecutor;
use slate_exec::executor::scan::SeqScanExecutor;
use slate_exec::executor::{CmpOp, Executor, JoinPredicate, Predicate};
use strata::transaction::TransactionId;
use strata::tuple::Field;

fn insert_values(db: &TestDb, table_id: u64, tid: TransactionId, values: &[i32]) {
    for &v in values {
        db.pool.insert_tuple(tid, table_id, int_tuple(v)).unwrap();
    }
}

#[test]
fn single_row_round_trip() {
    let db = setup(5);
    let table_id = db.create_table("t", int_schema());

    let t1 = TransactionId::new();
    let source = RowSource::new(int_schema(), vec![int_tuple(42)]);
    let mut insert = InsertExecutor::new(&db.pool, Box::new(source), table_id, t1);
    let report = insert.next().unwrap().unwrap();
    assert_eq!(report.field(0), Some(&Field::Int(1)));
    assert!(insert.next().unwrap().is_none());
    db.pool.commit(t1);

    let t2 = TransactionId::new();
    let mut scan = SeqScanExecutor::new(&db.pool, &db.catalog, table_id, t2).unwrap();
    let tuple = scan.next().unwrap().unwrap();
    assert_eq!(tuple.field(0), Some(&Field::Int(42)));
    assert!(tuple.record_id().is_some());
    assert!(scan.next().unwrap().is_none());
    db.pool.commit(t2);
}

#[test]
fn abort_discards_every_write() {
    let db = setup(5);
    let table_id = db.create_table("t", int_schema());

    let t1 = TransactionId::new();
    insert_values(&db, table_id, t1, &[1, 2, 3]);
    db.pool.abort(t1);

    let t2 = TransactionId::new();
    let mut scan = SeqScanExecutor::new(&db.pool, &db.catalog, table_id, t2).unwrap();
    assert!(drain(&mut scan).is_empty());
    db.pool.commit(t2);
}

#[test]
fn a_transaction_sees_its_own_uncommitted_writes() {
    let db = setup(5);
    let table_id = db.create_table("t", int_schema());

    let t1 = TransactionId::new();
    insert_values(&db, table_id, t1, &[7]);
    let mut scan = SeqScanExecutor::new(&db.pool, &db.catalog, table_id, t1).unwrap();
    assert_eq!(drain(&mut scan), vec![vec![Field::Int(7)]]);
    db.pool.commit(t1);
}

#[test]
fn filter_selects_matching_rows() {
    let db = setup(5);
    let table_id = db.create_table("t", int_schema());

    let t1 = TransactionId::new();
    insert_values(&db, table_id, t1, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    db.pool.commit(t1);

    let t2 = TransactionId::new();
    let scan = SeqScanExecutor::new(&db.pool, &db.catalog, table_id, t2).unwrap();
    let mut filter = FilterExecutor::new(
        Box::new(scan),
        Predicate::new(0, CmpOp::Gt, Field::Int(7)),
    );
    assert_eq!(
        drain(&mut filter),
        vec![
            vec![Field::Int(8)],
            vec![Field::Int(9)],
            vec![Field::Int(10)]
        ]
    );
    db.pool.commit(t2);
}

#[test]
fn aggregate_sums_a_scanned_table() {
    let db = setup(5);
    let table_id = db.create_table("t", int_schema());

    let t1 = TransactionId::new();
    insert_values(&db, table_id, t1, &[5, 10, 15]);
    db.pool.commit(t1);

    let t2 = TransactionId::new();
    let scan = SeqScanExecutor::new(&db.pool, &db.catalog, table_id, t2).unwrap();
    let mut agg =
        AggregateExecutor::new(Box::new(scan), 0, None, AggregateOp::Sum).unwrap();
    assert_eq!(drain(&mut agg), vec![vec![Field::Int(30)]]);
    db.pool.commit(t2);
}

#[test]
fn join_pairs_rows_across_tables() {
    let db = setup(10);
    let users = db.create_table("users", int_schema());
    let orders = db.create_table("orders", int_schema());

    let t1 = TransactionId::new();
    insert_values(&db, users, t1, &[1, 2, 3]);
    insert_values(&db, orders, t1, &[2, 3, 3]);
    db.pool.commit(t1);

    let t2 = TransactionId::new();
    let left = SeqScanExecutor::new(&db.pool, &db.catalog, users, t2).unwrap();
    let right = SeqScanExecutor::new(&db.pool, &db.catalog, orders, t2).unwrap();
    let mut join = NestedLoopJoinExecutor::new(
        Box::new(left),
        Box::new(right),
        JoinPredicate::new(0, CmpOp::Eq, 0),
    );

    let mut rows = drain(&mut join);
    rows.sort_by_key(|row| match row[0] {
        Field::Int(v) => v,
        _ => 0,
    });
    assert_eq!(
        rows,
        vec![
            vec![Field::Int(2), Field::Int(2)],
            vec![Field::Int(3), Field::Int(3)],
            vec![Field::Int(3), Field::Int(3)],
        ]
    );
    db.pool.commit(t2);
}

#[test]
fn delete_removes_the_filtered_rows() {
    let db = setup(5);
    let table_id = db.create_table("t", int_schema());

    let t1 = TransactionId::new();
    insert_values(&db, table_id, t1, &[1, 2, 3, 4, 5]);
    db.pool.commit(t1);

    let t2 = TransactionId::new();
    let scan = SeqScanExecutor::new(&db.pool, &db.catalog, table_id, t2).unwrap();
    let victims = FilterExecutor::new(
        Box::new(scan),
        Predicate::new(0, CmpOp::Le, Field::Int(2)),
    );
    let mut delete = DeleteExecutor::new(&db.pool, Box::new(victims), t2);
    let report = delete.next().unwrap().unwrap();
    assert_eq!(report.field(0), Some(&Field::Int(2)));
    db.pool.commit(t2);

    let t3 = TransactionId::new();
    let mut scan = SeqScanExecutor::new(&db.pool, &db.catalog, table_id, t3).unwrap();
    assert_eq!(
        drain(&mut scan),
        vec![
            vec![Field::Int(3)],
            vec![Field::Int(4)],
            vec![Field::Int(5)]
        ]
    );
    db.pool.commit(t3);
}

#[test]
fn inserts_spill_onto_new_pages_and_scan_back() {
    let db = setup(10);
    let table_id = db.create_table("t", wide_schema());

    let t1 = TransactionId::new();
    for v in 0..10 {
        db.pool.insert_tuple(t1, table_id, wide_tuple(v)).unwrap();
    }
    db.pool.commit(t1);

    // Ten four-slot tuples need three pages.
    assert_eq!(db.catalog.file(table_id).unwrap().num_pages(), 3);

    let t2 = TransactionId::new();
    let mut scan = SeqScanExecutor::new(&db.pool, &db.catalog, table_id, t2).unwrap();
    let ids: Vec<Field> = drain(&mut scan).into_iter().map(|row| row[0].clone()).collect();
    assert_eq!(ids, (0..10).map(Field::Int).collect::<Vec<_>>());
    db.pool.commit(t2);
}
