use std::io::{IsTerminal, Write};

use arraypipe::document::Document;
use arraypipe::frame::Frame;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value as Json;

use crate::exit::{document_error, CliResult};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct SentOutput<'a> {
    status: &'a str,
    #[serde(rename = "type")]
    type_name: &'a str,
    rows: u32,
    cols: u32,
    payload_size: usize,
    elapsed_ms: u128,
}

/// Print a received value.
pub fn print_value(doc: &Document, frame: &Frame, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let json = doc
                .to_json()
                .map_err(|err| document_error("cannot render value", err))?;
            println!("{json}");
        }
        OutputFormat::Table => println!("{}", value_table(doc)),
        OutputFormat::Pretty => {
            println!(
                "type={} rows={} cols={} size={} data={}",
                frame.type_code,
                frame.shape.rows,
                frame.shape.cols,
                frame.payload.len(),
                doc.data
            );
        }
        OutputFormat::Raw => print_raw(frame.payload.as_ref()),
    }
    Ok(())
}

/// Print the outcome of a completed send.
pub fn print_sent(frame: &Frame, elapsed_ms: u128, format: OutputFormat) {
    let out = SentOutput {
        status: "acknowledged",
        type_name: frame.type_code.name(),
        rows: frame.shape.rows,
        cols: frame.shape.cols,
        payload_size: frame.payload.len(),
        elapsed_ms,
    };
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STATUS", "TYPE", "SHAPE", "SIZE", "ELAPSED"])
                .add_row(vec![
                    out.status.to_string(),
                    out.type_name.to_string(),
                    format!("{}x{}", out.rows, out.cols),
                    out.payload_size.to_string(),
                    format!("{}ms", out.elapsed_ms),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "status={} type={} rows={} cols={} size={} elapsed={}ms",
            out.status, out.type_name, out.rows, out.cols, out.payload_size, out.elapsed_ms
        ),
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Lay a column-major document out as its matrix.
fn value_table(doc: &Document) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let Some(items) = doc.data.as_array() else {
        table
            .set_header(vec![doc.type_name.to_uppercase()])
            .add_row(vec![cell(&doc.data)]);
        return table;
    };

    let rows = doc.rows.unwrap_or(1);
    let cols = doc.cols.unwrap_or(items.len());
    let mut header = vec![doc.type_name.to_uppercase()];
    header.extend((1..=cols).map(|c| c.to_string()));
    table.set_header(header);

    for r in 0..rows {
        let mut row = vec![(r + 1).to_string()];
        row.extend((0..cols).map(|c| items.get(r + c * rows).map(cell).unwrap_or_default()));
        table.add_row(row);
    }
    table
}

fn cell(item: &Json) -> String {
    match item {
        Json::String(text) => text.clone(),
        Json::Array(parts) => match parts.as_slice() {
            [re, im] => format!("{re}{:+}i", im.as_f64().unwrap_or_default()),
            _ => item.to_string(),
        },
        other => other.to_string(),
    }
}
