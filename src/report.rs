//! Result presentation: probability table, plain-text summary and PDF export.
//!
//! Rejected outcomes never produce a clinical report; only the plain-text
//! summary covers them, with a fixed re-upload message.

use std::io::BufWriter;

use printpdf::*;
use thiserror::Error;

use crate::models::{DiagnosisResult, PipelineOutcome, SeverityStage};

/// Shown in place of a diagnosis when the gate rejects an upload.
pub const REJECTION_MESSAGE: &str =
    "Uploaded file is not a brain MRI image. Please upload a correct image.";

pub const REPORT_TITLE: &str = "Prediction Results";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("PDF font error: {0}")]
    Font(String),

    #[error("PDF save error: {0}")]
    Save(String),

    #[error("PDF buffer error: {0}")]
    Buffer(String),
}

/// One line of the raw prediction table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub label: SeverityStage,
    pub probability: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub rows: Vec<ReportRow>,
}

impl ReportTable {
    /// One row per severity stage, in label order.
    pub fn from_result(result: &DiagnosisResult) -> Self {
        let rows = result
            .labelled()
            .map(|(label, probability)| ReportRow { label, probability })
            .collect();
        Self { rows }
    }

    /// `"<label>: <percent>"` per row.
    pub fn lines(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| format!("{}: {}", row.label, format_percent(row.probability)))
            .collect()
    }
}

/// Two-decimal percentage: `0.85` → `"85.00%"`.
pub fn format_percent(value: f32) -> String {
    format!("{:.2}%", f64::from(value) * 100.0)
}

/// Plain-text summary of an outcome.
pub fn render_text(outcome: &PipelineOutcome) -> String {
    let result = match outcome {
        PipelineOutcome::Rejected { .. } => return REJECTION_MESSAGE.to_string(),
        PipelineOutcome::Diagnosed(result) => result,
    };

    let mut out = String::new();
    out.push_str(&format!("Prediction: {}\n", result.predicted_label));
    out.push_str(&format!("Confidence: {}\n", format_percent(result.confidence)));
    out.push_str("Raw Prediction Data:\n");
    for line in ReportTable::from_result(result).lines() {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// A4 PDF for a diagnosed image. Returns PDF bytes.
pub fn render_pdf(result: &DiagnosisResult, image_name: Option<&str>) -> Result<Vec<u8>, ReportError> {
    let (doc, page1, layer1) = PdfDocument::new(REPORT_TITLE, Mm(210.0), Mm(297.0), "Layer 1");
    let layer = doc.get_page(page1).get_layer(layer1);
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Font(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Font(e.to_string()))?;

    let mut y = Mm(280.0);

    // Title, centered on the page
    layer.use_text(REPORT_TITLE, 14.0, Mm(85.0), y, &bold);
    y -= Mm(10.0);

    if let Some(name) = image_name {
        layer.use_text(format!("Image: {name}"), 9.0, Mm(20.0), y, &font);
        y -= Mm(8.0);
    }

    layer.use_text(
        format!("Prediction: {}", result.predicted_label),
        12.0,
        Mm(20.0),
        y,
        &font,
    );
    y -= Mm(8.0);
    layer.use_text(
        format!("Confidence: {}", format_percent(result.confidence)),
        12.0,
        Mm(20.0),
        y,
        &font,
    );
    y -= Mm(10.0);

    layer.use_text("Raw Prediction Data:", 12.0, Mm(20.0), y, &bold);
    y -= Mm(8.0);
    for line in ReportTable::from_result(result).lines() {
        layer.use_text(line, 11.0, Mm(25.0), y, &font);
        y -= Mm(6.0);
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ReportError::Save(e.to_string()))?;
    buf.into_inner()
        .map_err(|e| ReportError::Buffer(e.to_string()))
}
