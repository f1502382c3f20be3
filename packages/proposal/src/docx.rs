//! Minimal WordprocessingML writer.
//!
//! A proposal is laid out as a flat list of [`Block`]s and rendered into
//! `word/document.xml`. The package holds only the three parts Word needs
//! to open it, written in a fixed order with a fixed timestamp so the
//! same blocks always produce the same bytes.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::ProposalError;

const CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"</Types>"#,
);

const RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#,
);

const DOCUMENT_OPEN: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    "<w:body>",
);

/// US Letter, one-inch margins.
const SECTION_PROPERTIES: &str = concat!(
    "<w:sectPr>",
    r#"<w:pgSz w:w="12240" w:h="15840"/>"#,
    r#"<w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/>"#,
    "</w:sectPr>",
);

const DOCUMENT_CLOSE: &str = "</w:body></w:document>";

/// Usable page width in twentieths of a point.
const TEXT_WIDTH_TWIPS: u32 = 9360;

/// Paragraph presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    /// Firm name at the top of the letter.
    Title,
    /// Section heading.
    Heading,
    Body,
    /// Bold body text.
    Strong,
    /// Letterhead contact lines.
    Small,
}

impl TextStyle {
    /// Run properties (`w:rPr` contents).
    const fn run_properties(self) -> &'static str {
        match self {
            Self::Title => r#"<w:b/><w:sz w:val="36"/>"#,
            Self::Heading => r#"<w:b/><w:sz w:val="26"/>"#,
            Self::Body => r#"<w:sz w:val="22"/>"#,
            Self::Strong => r#"<w:b/><w:sz w:val="22"/>"#,
            Self::Small => r#"<w:sz w:val="18"/>"#,
        }
    }

    /// Paragraph properties (`w:pPr` contents).
    const fn paragraph_properties(self) -> &'static str {
        match self {
            Self::Title | Self::Small => r#"<w:jc w:val="center"/><w:spacing w:after="0"/>"#,
            Self::Heading => r#"<w:spacing w:before="240" w:after="120"/>"#,
            Self::Body | Self::Strong => r#"<w:spacing w:after="120"/>"#,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub text: String,
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub bold: bool,
}

impl Cell {
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    #[must_use]
    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

/// A bordered table. Column widths are percentages of the text width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub column_percents: Vec<u32>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

impl Block {
    #[must_use]
    pub fn text(text: impl Into<String>, style: TextStyle) -> Self {
        Self::Paragraph(Paragraph {
            text: text.into(),
            style,
        })
    }

    #[must_use]
    pub fn blank() -> Self {
        Self::text("", TextStyle::Body)
    }
}

/// Escapes text for XML character data and drops characters XML 1.0
/// cannot carry.
#[must_use]
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c < ' ' => {}
            c => out.push(c),
        }
    }
    out
}

/// A run of text; embedded newlines become line breaks.
fn push_run(out: &mut String, text: &str, run_properties: &str) {
    out.push_str("<w:r><w:rPr>");
    out.push_str(run_properties);
    out.push_str("</w:rPr>");
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            out.push_str("<w:br/>");
        }
        out.push_str(r#"<w:t xml:space="preserve">"#);
        out.push_str(&escape_xml(line));
        out.push_str("</w:t>");
    }
    out.push_str("</w:r>");
}

fn push_paragraph(out: &mut String, paragraph: &Paragraph) {
    out.push_str("<w:p><w:pPr>");
    out.push_str(paragraph.style.paragraph_properties());
    out.push_str("</w:pPr>");
    if !paragraph.text.is_empty() {
        push_run(out, &paragraph.text, paragraph.style.run_properties());
    }
    out.push_str("</w:p>");
}

fn push_table(out: &mut String, table: &Table) {
    let widths: Vec<String> = table
        .column_percents
        .iter()
        .map(|pct| (TEXT_WIDTH_TWIPS * pct / 100).to_string())
        .collect();

    out.push_str("<w:tbl><w:tblPr>");
    out.push_str(r#"<w:tblW w:w="5000" w:type="pct"/><w:tblBorders>"#);
    for edge in ["top", "left", "bottom", "right", "insideH", "insideV"] {
        out.push_str("<w:");
        out.push_str(edge);
        out.push_str(r#" w:val="single" w:sz="4" w:space="0" w:color="808080"/>"#);
    }
    out.push_str("</w:tblBorders></w:tblPr><w:tblGrid>");
    for width in &widths {
        out.push_str(r#"<w:gridCol w:w=""#);
        out.push_str(width);
        out.push_str(r#""/>"#);
    }
    out.push_str("</w:tblGrid>");

    for row in &table.rows {
        out.push_str("<w:tr>");
        for (i, cell) in row.iter().enumerate() {
            out.push_str("<w:tc><w:tcPr>");
            if let Some(width) = widths.get(i) {
                out.push_str(r#"<w:tcW w:w=""#);
                out.push_str(width);
                out.push_str(r#"" w:type="dxa"/>"#);
            }
            out.push_str(r#"</w:tcPr><w:p><w:pPr><w:spacing w:after="0"/></w:pPr>"#);
            if !cell.text.is_empty() {
                let style = if cell.bold {
                    TextStyle::Strong
                } else {
                    TextStyle::Body
                };
                push_run(out, &cell.text, style.run_properties());
            }
            out.push_str("</w:p></w:tc>");
        }
        out.push_str("</w:tr>");
    }
    out.push_str("</w:tbl>");
}

/// Renders `word/document.xml`.
#[must_use]
pub fn render_document_xml(blocks: &[Block]) -> String {
    let mut out = String::from(DOCUMENT_OPEN);
    for block in blocks {
        match block {
            Block::Paragraph(p) => push_paragraph(&mut out, p),
            Block::Table(t) => {
                push_table(&mut out, t);
                // Word merges a table with one that directly follows it.
                push_paragraph(&mut out, &Paragraph {
                    text: String::new(),
                    style: TextStyle::Body,
                });
            }
        }
    }
    out.push_str(SECTION_PROPERTIES);
    out.push_str(DOCUMENT_CLOSE);
    out
}

/// Packages blocks as `.docx` bytes.
///
/// # Errors
///
/// Returns [`ProposalError::Zip`] or [`ProposalError::Write`] if the
/// archive cannot be written.
pub fn write_docx(blocks: &[Block]) -> Result<Vec<u8>, ProposalError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let document = render_document_xml(blocks);
    let parts: [(&str, &str); 3] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", RELS_XML),
        ("word/document.xml", document.as_str()),
    ];

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        writer.start_file(name, options)?;
        writer.write_all(content.as_bytes())?;
    }
    Ok(writer.finish()?.into_inner())
}
