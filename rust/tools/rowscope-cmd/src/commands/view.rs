use std::{path::Path, rc::Rc};

use anyhow::{Context, Result};
use futures::executor::LocalPool;
use log::info;
use rowscope_document::ColumnPath;
use rowscope_query::{Direction, TableId};
use rowscope_testkit::{MemoryDriver, MemoryTable};
use rowscope_window::{EndState, RowOrder, TableViewer, ViewerOptions, Viewport};
use serde::Serialize;

use crate::utils::{parse_index_arg, read_rows, validate_file_exists};

pub struct ViewArgs {
    pub file: String,
    pub primary_key: String,
    pub indexes: Vec<String>,
    pub order: Option<String>,
    pub desc: bool,
    pub seek: Option<String>,
    pub scroll: f64,
    pub height: f64,
    pub options: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ViewSummary {
    pub rendered: [i64; 2],
    pub highlight: Option<Highlight>,
    pub low: String,
    pub high: String,
    pub click_to_load_high: bool,
    pub rows: Vec<RenderedRow>,
}

#[derive(Debug, Serialize)]
pub struct Highlight {
    pub start: i64,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct RenderedRow {
    pub offset: i64,
    pub row: serde_json::Value,
}

pub fn run(args: ViewArgs) -> Result<()> {
    let summary = summarize(&args)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Opens the file as a table, applies scroll and seek, and reports what
/// ends up rendered.
pub fn summarize(args: &ViewArgs) -> Result<ViewSummary> {
    validate_file_exists(&args.file)?;
    let rows = read_rows(&args.file)?;
    info!("loaded {} rows from {}", rows.len(), args.file);

    let mut table = MemoryTable::new(args.primary_key.as_str()).with_rows(rows);
    for arg in &args.indexes {
        let (name, path) = parse_index_arg(arg)?;
        table = table.with_index(&name, path);
    }
    let name = Path::new(&args.file)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("table");
    let table_id = TableId::new("local", name);
    let driver = MemoryDriver::new();
    driver.add_table(table_id.clone(), table);

    let options = match &args.options {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read options file {path}"))?;
            serde_json::from_str::<ViewerOptions>(&text)
                .with_context(|| format!("Invalid options in {path}"))?
        }
        None => ViewerOptions::default(),
    };

    let direction = if args.desc {
        Direction::Descending
    } else {
        Direction::Ascending
    };
    let order = match &args.order {
        Some(column) => RowOrder::by_column(ColumnPath::parse(column), direction),
        None => RowOrder::by_primary_key(direction),
    };

    let mut pool = LocalPool::new();
    let mut viewer = TableViewer::open(
        Rc::new(driver),
        pool.spawner(),
        table_id,
        order,
        Viewport::new(0.0, args.height),
        options,
    )?;
    viewer.refresh()?;
    viewer.settle(&mut pool)?;

    if args.scroll != 0.0 {
        viewer.scroll(Viewport::new(args.scroll, args.height))?;
        viewer.settle(&mut pool)?;
    }
    if let Some(value) = &args.seek {
        viewer.seek(value)?;
        viewer.settle(&mut pool)?;
    }

    let rendered = viewer.rendered();
    let status = viewer.status();
    Ok(ViewSummary {
        rendered: [rendered.front, rendered.back],
        highlight: viewer.highlight().map(|h| Highlight {
            start: h.start,
            count: h.count,
        }),
        low: describe(&status.hit_end_low),
        high: describe(&status.hit_end_high),
        click_to_load_high: status.click_to_load_high,
        rows: viewer
            .rendered_rows()
            .iter()
            .map(|(offset, row)| RenderedRow {
                offset: *offset,
                row: serde_json::Value::from(row),
            })
            .collect(),
    })
}

fn describe(state: &EndState) -> String {
    match state {
        EndState::NotYet => "more".to_string(),
        EndState::Complete => "complete".to_string(),
        EndState::Error(message) => format!("error: {message}"),
    }
}
