use futures::executor::LocalPool;
use rowscope_document::{ColumnPath, Document};
use rowscope_query::Direction;
use rowscope_testkit::{
    MemoryTable,
    data_gen::{driver_with, people_table},
};

use super::{field, ids, load_context};
use crate::{
    loader::{CANCELLED_MESSAGE, EndState},
    notify::{LoadSide, UpdateEvent},
    source::{RowOrder, WindowedRowSource},
};

/// Reframes with both load flags set until neither side makes progress.
fn load_everything(source: &mut WindowedRowSource, pool: &mut LocalPool) {
    for _ in 0..100 {
        source.reframe(-1, true, 1, true).unwrap();
        pool.run_until_stalled();
        let snapshot = source.rows_and_offset();
        if snapshot.hit_end_low.is_end() && snapshot.hit_end_high.is_end() {
            return;
        }
    }
    panic!("row source did not reach both ends");
}

fn high_ids(source: &WindowedRowSource) -> Vec<i64> {
    let snapshot = source.rows_and_offset();
    let window = snapshot.rows();
    (0..window.back_offset())
        .filter_map(|offset| window.get(offset))
        .map(|row| field(row, "id").map_or(-1, |id| id as i64))
        .collect()
}

fn low_ids(source: &WindowedRowSource) -> Vec<i64> {
    let snapshot = source.rows_and_offset();
    let window = snapshot.rows();
    (window.front_offset()..0)
        .rev()
        .filter_map(|offset| window.get(offset))
        .map(|row| field(row, "id").map_or(-1, |id| id as i64))
        .collect()
}

#[test]
fn test_config_is_requested_once_on_first_reframe() {
    let mut pool = LocalPool::new();
    let (driver, table) = driver_with("people", people_table(100));
    let (ctx, mut updates) = load_context(&driver, &pool, 60);
    let mut source = WindowedRowSource::for_table(
        ctx,
        table,
        RowOrder::by_primary_key(Direction::Ascending),
        None,
        None,
    );

    pool.run_until_stalled();
    assert_eq!(driver.config_calls(), 0);
    {
        let snapshot = source.rows_and_offset();
        assert_eq!(snapshot.hit_end_low, EndState::Complete);
        assert_eq!(snapshot.hit_end_high, EndState::NotYet);
        assert!(snapshot.rows().is_empty());
    }

    source.reframe(0, false, 20, false).unwrap();
    source.reframe(0, false, 20, false).unwrap();
    pool.run_until_stalled();
    assert_eq!(driver.config_calls(), 1);
    assert_eq!(driver.run_calls(), 0);
    assert_eq!(updates.drain(), vec![UpdateEvent::Configured]);
    assert!(source.config_loaded().is_some());

    source.reframe(0, false, 20, false).unwrap();
    source.reframe(0, false, 20, false).unwrap();
    pool.run_until_stalled();
    assert_eq!(driver.run_calls(), 1);
    assert_eq!(high_ids(&source), (0..60).collect::<Vec<_>>());
    assert_eq!(updates.drain(), vec![UpdateEvent::Loaded(LoadSide::High)]);

    // The requested range is materialized; nothing more is loaded.
    source.reframe(0, false, 20, false).unwrap();
    pool.run_until_stalled();
    assert_eq!(driver.run_calls(), 1);
    assert_eq!(driver.next_calls(), 60);
    assert_eq!(driver.config_calls(), 1);
}

#[test]
fn test_rows_without_the_column_come_last() {
    let mut pool = LocalPool::new();
    let (driver, table) = driver_with("people", people_table(30));
    let (ctx, _updates) = load_context(&driver, &pool, 100);
    let order = RowOrder::by_column(ColumnPath::field("age"), Direction::Ascending);
    let mut source = WindowedRowSource::for_table(ctx, table, order, None, None);

    load_everything(&mut source, &mut pool);
    let snapshot = source.rows_and_offset();
    let window = snapshot.rows();
    assert_eq!(window.len(), 30);
    let ages: Vec<Option<f64>> = window.iter().map(|(_, row)| field(row, "age")).collect();
    assert!(ages[..27].windows(2).all(|w| w[0].is_some() && w[0] <= w[1]));
    let tail: Vec<Document> = window.slice(27, 30).into_iter().cloned().collect();
    assert_eq!(ids(&tail), vec![0, 10, 20]);
}

#[test]
fn test_descending_unindexed_order_puts_missing_last() {
    let mut pool = LocalPool::new();
    let rows = people_table(30).rows().to_vec();
    let (driver, table) = driver_with("plain", MemoryTable::new("id").with_rows(rows));
    let (ctx, _updates) = load_context(&driver, &pool, 100);
    let order = RowOrder::by_column(ColumnPath::field("age"), Direction::Descending);
    let mut source = WindowedRowSource::for_table(ctx, table, order, None, None);

    load_everything(&mut source, &mut pool);
    let all = high_ids(&source);
    assert_eq!(all.len(), 30);
    assert_eq!(&all[27..], &[0, 10, 20]);
    assert_eq!(driver.run_calls(), 1);
}

#[test]
fn test_primary_key_seek_splits_around_the_key() {
    let mut pool = LocalPool::new();
    let (driver, table) = driver_with("people", people_table(100));
    let (ctx, _updates) = load_context(&driver, &pool, 10);
    let mut source = WindowedRowSource::for_table(
        ctx,
        table,
        RowOrder::by_primary_key(Direction::Ascending),
        Some(Document::from(50)),
        None,
    );

    source.reframe(-5, false, 5, false).unwrap();
    pool.run_until_stalled();
    source.reframe(-5, false, 5, false).unwrap();
    pool.run_until_stalled();

    assert_eq!(low_ids(&source), (40..50).rev().collect::<Vec<_>>());
    assert_eq!(high_ids(&source), (50..60).collect::<Vec<_>>());
    assert_eq!(driver.run_calls(), 2);
}

#[test]
fn test_descending_seek_on_indexed_column() {
    let mut pool = LocalPool::new();
    let (driver, table) = driver_with("people", people_table(100));
    let (ctx, _updates) = load_context(&driver, &pool, 100);
    let order = RowOrder::by_column(ColumnPath::field("age"), Direction::Descending);
    let mut source =
        WindowedRowSource::for_table(ctx, table, order, Some(Document::from(45)), None);

    load_everything(&mut source, &mut pool);
    let snapshot = source.rows_and_offset();
    let window = snapshot.rows();
    let age = |offset: i64| window.get(offset).and_then(|row| field(row, "age"));
    // Low side scans ages above the key, nearest first.
    assert!(age(-1).is_some_and(|a| a > 45.0));
    assert_eq!(age(0), Some(45.0));
    let high: Vec<Option<f64>> = (0..window.back_offset()).map(age).collect();
    let present = high.iter().take_while(|a| a.is_some()).count();
    assert!(high[..present].windows(2).all(|w| w[0] >= w[1]));
    assert!(high[present..].iter().all(Option::is_none));
    assert_eq!(high.len() - present, 10);
    assert_eq!(window.len(), 100);
}

#[test]
fn test_unindexed_seek_filters_by_key() {
    let mut pool = LocalPool::new();
    let (driver, table) = driver_with("people", people_table(100));
    let (ctx, _updates) = load_context(&driver, &pool, 100);
    let order = RowOrder::by_column(ColumnPath::field("name"), Direction::Ascending);
    let mut source = WindowedRowSource::for_table(
        ctx,
        table,
        order,
        Some(Document::from("person-00050")),
        None,
    );

    load_everything(&mut source, &mut pool);
    assert_eq!(low_ids(&source), (0..50).rev().collect::<Vec<_>>());
    assert_eq!(high_ids(&source), (50..100).collect::<Vec<_>>());
}

#[test]
fn test_malformed_config_fails_every_reframe() {
    let mut pool = LocalPool::new();
    let table_def = MemoryTable::new("id").with_raw_config(Document::from("not a config"));
    let (driver, table) = driver_with("broken", table_def);
    let (ctx, mut updates) = load_context(&driver, &pool, 10);
    let mut source = WindowedRowSource::for_table(
        ctx,
        table,
        RowOrder::by_primary_key(Direction::Ascending),
        None,
        None,
    );

    source.reframe(0, true, 10, true).unwrap();
    pool.run_until_stalled();
    assert_eq!(updates.drain(), vec![UpdateEvent::Configured]);
    assert!(source.reframe(0, true, 10, true).is_err());
    assert!(source.reframe(0, false, 0, false).is_err());
    assert_eq!(driver.config_calls(), 1);
    assert_eq!(driver.run_calls(), 0);
}

#[test]
fn test_unavailable_config_ends_both_sides() {
    let mut pool = LocalPool::new();
    let (driver, table) = driver_with("people", people_table(10));
    let (ctx, _updates) = load_context(&driver, &pool, 10);
    let mut source = WindowedRowSource::for_table(
        ctx,
        table,
        RowOrder::by_primary_key(Direction::Ascending),
        Some(Document::from(5)),
        None,
    );

    driver.fail_config("permission denied");
    source.reframe(0, true, 10, true).unwrap();
    pool.run_until_stalled();
    source.reframe(0, true, 10, true).unwrap();

    let snapshot = source.rows_and_offset();
    assert_eq!(snapshot.hit_end_low.error(), Some("permission denied"));
    assert_eq!(snapshot.hit_end_high.error(), Some("permission denied"));
    assert_eq!(driver.run_calls(), 0);
}

#[test]
fn test_cancel_before_config_arrives() {
    let mut pool = LocalPool::new();
    let (driver, table) = driver_with("people", people_table(10));
    let (ctx, mut updates) = load_context(&driver, &pool, 10);
    let mut source = WindowedRowSource::for_table(
        ctx,
        table,
        RowOrder::by_primary_key(Direction::Ascending),
        None,
        None,
    );

    source.reframe(0, true, 10, true).unwrap();
    source.cancel_pending_requests();
    pool.run_until_stalled();

    assert_eq!(driver.config_calls(), 1);
    assert!(updates.drain().is_empty());
    assert!(source.config_loaded().is_none());
    assert_eq!(
        source.rows_and_offset().hit_end_high,
        EndState::Error(CANCELLED_MESSAGE.to_string())
    );
}

#[test]
fn test_click_to_load_after_budget() {
    let mut pool = LocalPool::new();
    let (driver, table) = driver_with("people", people_table(100));
    let (ctx, _updates) = load_context(&driver, &pool, 10);
    let mut source = WindowedRowSource::for_table(
        ctx,
        table,
        RowOrder::by_primary_key(Direction::Ascending),
        None,
        Some(1),
    );

    source.reframe(0, false, 10, true).unwrap();
    pool.run_until_stalled();
    source.reframe(0, false, 10, true).unwrap();
    pool.run_until_stalled();
    assert!(source.rows_and_offset().click_to_load_high);
    assert_eq!(high_ids(&source), vec![0]);

    source.reframe(0, false, 10, true).unwrap();
    pool.run_until_stalled();
    assert_eq!(high_ids(&source), vec![0]);

    source.unlimit_mem_usage();
    assert!(!source.rows_and_offset().click_to_load_high);
    source.reframe(0, false, 10, true).unwrap();
    pool.run_until_stalled();
    assert_eq!(high_ids(&source).len(), 11);
}

#[test]
fn test_fixed_source_never_loads() {
    let rows = people_table(5).rows().to_vec();
    let mut source =
        WindowedRowSource::fixed(rows, RowOrder::by_primary_key(Direction::Ascending));
    source.reframe(-10, true, 10, true).unwrap();
    let snapshot = source.rows_and_offset();
    assert_eq!(snapshot.hit_end_low, EndState::Complete);
    assert_eq!(snapshot.hit_end_high, EndState::Complete);
    assert_eq!(snapshot.rows().len(), 5);
    assert!(!source.is_table_backed());
}

#[test]
fn test_reload_restarts_from_the_pivot() {
    let mut pool = LocalPool::new();
    let (driver, table) = driver_with("people", people_table(100));
    let (ctx, _updates) = load_context(&driver, &pool, 60);
    let mut source = WindowedRowSource::for_table(
        ctx,
        table,
        RowOrder::by_primary_key(Direction::Ascending),
        Some(Document::from(40)),
        None,
    );
    load_everything(&mut source, &mut pool);
    assert_eq!(driver.config_calls(), 1);

    source.reload();
    assert!(source.config_pending());
    assert!(source.rows_and_offset().rows().is_empty());
    pool.run_until_stalled();
    assert_eq!(driver.config_calls(), 2);
    assert!(source.config_loaded().is_some());

    load_everything(&mut source, &mut pool);
    assert_eq!(high_ids(&source), (40..100).collect::<Vec<_>>());
    assert_eq!(low_ids(&source), (0..40).rev().collect::<Vec<_>>());
}
