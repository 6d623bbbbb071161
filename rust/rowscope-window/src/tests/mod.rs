use std::rc::Rc;

use futures::executor::LocalPool;
use rowscope_common::async_runtime::LocalScheduler;
use rowscope_document::{ColumnPath, Document};
use rowscope_testkit::MemoryDriver;

use crate::{
    loader::LoadContext,
    notify::{UpdateReceiver, update_channel},
};

mod source_scenarios;

/// A load context running on `pool`, and the receiving end of its update
/// channel.
pub(crate) fn load_context(
    driver: &MemoryDriver,
    pool: &LocalPool,
    batch_size: usize,
) -> (LoadContext, UpdateReceiver) {
    let (notifier, updates) = update_channel();
    let ctx = LoadContext {
        driver: Rc::new(driver.clone()),
        scheduler: LocalScheduler::new(pool.spawner()),
        notifier,
        batch_size,
    };
    (ctx, updates)
}

/// Numeric value of a top-level field, or `None` if absent.
pub(crate) fn field(row: &Document, name: &str) -> Option<f64> {
    ColumnPath::field(name)
        .extract(row)
        .and_then(Document::as_f64)
}

pub(crate) fn ids(rows: &[Document]) -> Vec<i64> {
    rows.iter()
        .map(|row| field(row, "id").map_or(-1, |id| id as i64))
        .collect()
}
