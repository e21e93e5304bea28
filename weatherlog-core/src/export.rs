//! Export — render every stored query as JSON, CSV, XML or PDF
//!
//! Display fields are read out of the opaque weather payload with optional
//! chaining; anything missing renders as `N/A` and never fails the export.
//!
//! The PDF uses the built-in Helvetica faces, which only cover WinAnsi. Text
//! outside that set (CJK, Cyrillic, ...) is printed as `?` in PDF cells. The
//! JSON, CSV and XML exports keep the full text.

use std::io::Cursor;
use std::str::FromStr;

use bytes::Bytes;
use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::WeatherlogError;
use crate::models::{QueryRecord, WeatherDocument};
use crate::store::QueryStore;

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Xml,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Xml => "xml",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xml => "application/xml",
            ExportFormat::Pdf => "application/pdf",
        }
    }

    pub fn file_name(&self) -> String {
        format!("weather_queries.{}", self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = WeatherlogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "xml" => Ok(ExportFormat::Xml),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(WeatherlogError::Export(format!(
                "Unsupported export format '{}'. Supported: json, csv, xml, pdf",
                other
            ))),
        }
    }
}

// ============================================================================
// Display fields
// ============================================================================

/// `current.main.temp`, or `N/A`.
pub fn temperature(doc: &WeatherDocument) -> String {
    match doc.current.get("main").and_then(|main| main.get("temp")) {
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => NOT_AVAILABLE.to_string(),
        Some(other) => other.to_string(),
    }
}

/// `current.weather[0].description`, or `N/A`.
pub fn weather_summary(doc: &WeatherDocument) -> String {
    doc.current
        .get("weather")
        .and_then(|list| list.get(0))
        .and_then(|first| first.get("description"))
        .and_then(|d| d.as_str())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

fn iso_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

// ============================================================================
// Rendering
// ============================================================================

pub async fn render_all(store: &QueryStore, format: ExportFormat) -> Result<Bytes, WeatherlogError> {
    let records = store.list().await?;
    tracing::info!(format = format.as_str(), count = records.len(), "Exporting weather queries");
    render(&records, format)
}

pub fn render(records: &[QueryRecord], format: ExportFormat) -> Result<Bytes, WeatherlogError> {
    let bytes = match format {
        ExportFormat::Json => render_json(records)?,
        ExportFormat::Csv => render_csv(records)?,
        ExportFormat::Xml => render_xml(records)?,
        ExportFormat::Pdf => render_pdf(records)?,
    };
    Ok(Bytes::from(bytes))
}

fn render_json(records: &[QueryRecord]) -> Result<Vec<u8>, WeatherlogError> {
    Ok(serde_json::to_vec_pretty(records)?)
}

const CSV_HEADER: [&str; 8] = [
    "ID",
    "Location Input",
    "Resolved Location",
    "Start Date",
    "End Date",
    "Created At",
    "Temperature (°C)",
    "Weather",
];

fn render_csv(records: &[QueryRecord]) -> Result<Vec<u8>, WeatherlogError> {
    let csv_err = |e: csv::Error| WeatherlogError::Export(format!("CSV: {}", e));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(csv_err)?;

    for record in records {
        writer
            .write_record([
                record.id.to_string(),
                record.location_input.clone(),
                record.resolved_location.clone(),
                iso_date(record.start_date),
                iso_date(record.end_date),
                record.created_at.to_rfc3339(),
                temperature(&record.weather_result),
                weather_summary(&record.weather_result),
            ])
            .map_err(csv_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| WeatherlogError::Io(e.into_error()))
}

fn render_xml(records: &[QueryRecord]) -> Result<Vec<u8>, WeatherlogError> {
    let xml_err = |e: quick_xml::Error| WeatherlogError::Export(format!("XML: {}", e));

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("weather_queries")))
        .map_err(xml_err)?;

    for record in records {
        writer
            .write_event(Event::Start(BytesStart::new("query")))
            .map_err(xml_err)?;

        let fields = [
            ("id", record.id.to_string()),
            ("location_input", record.location_input.clone()),
            ("resolved_location", record.resolved_location.clone()),
            ("start_date", iso_date(record.start_date)),
            ("end_date", iso_date(record.end_date)),
            ("created_at", record.created_at.to_rfc3339()),
            ("temperature", temperature(&record.weather_result)),
            ("weather", weather_summary(&record.weather_result)),
        ];
        for (name, text) in fields {
            writer
                .write_event(Event::Start(BytesStart::new(name)))
                .map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(&text)))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(xml_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("query")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("weather_queries")))
        .map_err(xml_err)?;

    Ok(writer.into_inner().into_inner())
}

// ----------------------------------------------------------------------------
// PDF (US Letter, one gridded table, paginated)
// ----------------------------------------------------------------------------

const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;
const MARGIN_MM: f32 = 18.0;
const ROW_HEIGHT_MM: f32 = 8.0;
const PDF_TITLE: &str = "Weather Queries Report";
const PDF_HEADER: [&str; 6] = ["ID", "Location", "Resolved Location", "Temperature", "Weather", "Date"];
/// Column widths in mm; they sum to the printable width.
const PDF_COLUMNS: [f32; 6] = [12.0, 34.0, 56.0, 24.0, 32.0, 21.9];

fn pdf_row(record: &QueryRecord) -> [String; 6] {
    let temp = temperature(&record.weather_result);
    let temp = if temp == NOT_AVAILABLE {
        temp
    } else {
        format!("{}°C", temp)
    };

    [
        record.id.to_string(),
        truncate(&record.location_input, 20),
        truncate(&record.resolved_location, 30),
        temp,
        truncate(&weather_summary(&record.weather_result), 20),
        record.created_at.format("%Y-%m-%d").to_string(),
    ]
}

/// WinAnsi characters above Latin-1's printable range.
const WINANSI_EXTRAS: &str = "€‚ƒ„…†‡ˆ‰Š‹ŒŽ‘’“”•–—˜™š›œžŸ";

/// Replace what the built-in fonts cannot encode with `?`.
fn winansi(text: &str) -> String {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c,
            _ if WINANSI_EXTRAS.contains(c) => c,
            _ => '?',
        })
        .collect()
}

fn draw_line(layer: &PdfLayerReference, x1: f32, y1: f32, x2: f32, y2: f32) {
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(x1), Mm(y1)), false),
            (Point::new(Mm(x2), Mm(y2)), false),
        ],
        is_closed: false,
    });
}

/// Draws one table row with its top edge at `top`, cell borders included.
fn draw_row(layer: &PdfLayerReference, font: &IndirectFontRef, size: f32, cells: &[String], top: f32) {
    let bottom = top - ROW_HEIGHT_MM;
    let right = PAGE_WIDTH_MM - MARGIN_MM;

    draw_line(layer, MARGIN_MM, top, right, top);
    draw_line(layer, MARGIN_MM, bottom, right, bottom);

    let mut x = MARGIN_MM;
    draw_line(layer, x, top, x, bottom);
    for (cell, width) in cells.iter().zip(PDF_COLUMNS) {
        layer.use_text(winansi(cell), size, Mm(x + 1.5), Mm(bottom + 2.5), font);
        x += width;
        draw_line(layer, x, top, x, bottom);
    }
}

fn render_pdf(records: &[QueryRecord]) -> Result<Vec<u8>, WeatherlogError> {
    let pdf_err = |e: printpdf::Error| WeatherlogError::Export(format!("PDF: {}", e));

    let (doc, page, layer) =
        PdfDocument::new(PDF_TITLE, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?;

    let header: Vec<String> = PDF_HEADER.iter().map(|h| h.to_string()).collect();

    let mut layer = doc.get_page(page).get_layer(layer);
    let mut top = PAGE_HEIGHT_MM - MARGIN_MM;

    layer.use_text(PDF_TITLE, 20.0, Mm(MARGIN_MM), Mm(top - 8.0), &bold);
    top -= 8.0 + 12.0;
    draw_row(&layer, &bold, 10.0, &header, top);
    top -= ROW_HEIGHT_MM;

    for record in records {
        if top - ROW_HEIGHT_MM < MARGIN_MM {
            let (next_page, next_layer) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            layer = doc.get_page(next_page).get_layer(next_layer);
            top = PAGE_HEIGHT_MM - MARGIN_MM;
            draw_row(&layer, &bold, 10.0, &header, top);
            top -= ROW_HEIGHT_MM;
        }

        draw_row(&layer, &regular, 9.0, &pdf_row(record), top);
        top -= ROW_HEIGHT_MM;
    }

    doc.save_to_bytes().map_err(pdf_err)
}

// ============================================================================
// TESTS
// ============================================================================
