//! Row materialization.
//!
//! Converts one source row into an immutable [`Document`] under the detected
//! [`ExecutionMode`]. Every mode attaches the same identity spine (docid
//! from the primary keys, `add` action, and a checksum over the rendered
//! row) and differs only in where content and locators come from.
//!
//! A materialization failure (empty keys, empty row, or an unmatched
//! primary-key name) is fatal for the whole batch: silently omitting a row
//! would be undetected data loss. Null metadata values, by contrast, are
//! omitted without error.

use tracing::debug;

use crate::checksum::{generate_docid, sha1_hex};
use crate::error::Result;
use crate::mode::{
    ExecutionMode, BLOB_COLUMN, CLOB_COLUMN, LAST_MODIFIED_COLUMN, LOB_URL_COLUMN,
    MIME_TYPE_COLUMN, TITLE_COLUMN, URL_COLUMN,
};
use crate::models::{prop, ColumnValue, Document, DocumentBuilder, Row, ACTION_ADD};
use crate::render::RowRenderer;

/// URL scheme for synthesized display locators.
const FEED_SCHEME: &str = "dbsweep";
/// MIME type for rendered-row content.
const HTML_MIMETYPE: &str = "text/html";
/// MIME type for character large-object content.
const TEXT_MIMETYPE: &str = "text/plain";
/// MIME type for binary large-object content.
const BINARY_MIMETYPE: &str = "application/octet-stream";

/// Everything the materializer needs besides the row itself.
pub struct MaterializeContext<'a> {
    pub db_name: &'a str,
    pub hostname: &'a str,
    pub primary_keys: &'a [String],
    /// Prefix prepended to the `dbconn_url` value in metadata-URL mode.
    pub base_url: Option<&'a str>,
    pub renderer: &'a dyn RowRenderer,
}

/// Convert one row into a document under the given mode.
pub fn materialize(mode: ExecutionMode, row: &Row, ctx: &MaterializeContext<'_>) -> Result<Document> {
    match mode {
        ExecutionMode::Normal => row_to_doc(row, ctx),
        ExecutionMode::MetadataUrl => metadata_url_doc(row, ctx),
        ExecutionMode::Clob => large_object_doc(row, ctx, CLOB_COLUMN),
        ExecutionMode::Blob => large_object_doc(row, ctx, BLOB_COLUMN),
    }
}

/// Normal mode: the rendered row is the document content.
fn row_to_doc(row: &Row, ctx: &MaterializeContext<'_>) -> Result<Document> {
    let docid = generate_docid(ctx.primary_keys, row)?;
    let content = ctx.renderer.render(ctx.db_name, row, ctx.primary_keys);

    Ok(Document::builder()
        .property(prop::CHECKSUM, sha1_hex(content.as_bytes()))
        .property(prop::CONTENT, content)
        .property(prop::ACTION, ACTION_ADD)
        .property(prop::MIMETYPE, HTML_MIMETYPE)
        .property(prop::DISPLAY_URL, display_url(ctx, &docid))
        .property(prop::DOCID, docid)
        .build())
}

/// Metadata-URL mode: the row points at an externally hosted document. The
/// `dbconn_url` value becomes both search and display locator; the remaining
/// columns (minus consumed ones and the primary keys) become metadata.
fn metadata_url_doc(row: &Row, ctx: &MaterializeContext<'_>) -> Result<Document> {
    let docid = generate_docid(ctx.primary_keys, row)?;
    let rendered = ctx.renderer.render(ctx.db_name, row, ctx.primary_keys);

    let mut builder = Document::builder()
        .property(prop::CHECKSUM, sha1_hex(rendered.as_bytes()))
        .property(prop::ACTION, ACTION_ADD)
        .property(prop::DOCID, docid);

    if let Some(url) = find_column(row, URL_COLUMN).and_then(ColumnValue::render) {
        let url = url.trim().to_string();
        if !url.is_empty() {
            let full = match ctx.base_url.map(str::trim).filter(|b| !b.is_empty()) {
                Some(base) => format!("{}{}", base, url),
                None => url,
            };
            builder = builder
                .property(prop::SEARCH_URL, full.clone())
                .property(prop::DISPLAY_URL, full);
        }
    }

    let mime = find_column(row, MIME_TYPE_COLUMN).and_then(ColumnValue::render);
    builder = builder.maybe_property(prop::MIMETYPE, mime);

    if let Some(last_modified) =
        find_column(row, LAST_MODIFIED_COLUMN).and_then(ColumnValue::as_timestamp)
    {
        builder = builder.timestamp_property(prop::LAST_MODIFIED, last_modified);
    }

    let skip = [URL_COLUMN, MIME_TYPE_COLUMN, LAST_MODIFIED_COLUMN];
    builder = add_metadata(builder, row, &skip, ctx.primary_keys);

    Ok(builder.build())
}

/// CLOB/BLOB mode: a designated column carries the document content. A
/// `dbconn_lob_url` column, when present, replaces the synthesized display
/// locator; a `dbconn_title` column supplies the title.
fn large_object_doc(row: &Row, ctx: &MaterializeContext<'_>, lob_column: &str) -> Result<Document> {
    let docid = generate_docid(ctx.primary_keys, row)?;
    let rendered = ctx.renderer.render(ctx.db_name, row, ctx.primary_keys);

    let mut builder = Document::builder()
        .property(prop::CHECKSUM, sha1_hex(rendered.as_bytes()))
        .property(prop::ACTION, ACTION_ADD);

    match find_column(row, lob_column) {
        Some(ColumnValue::Bytes(bytes)) => {
            builder = builder
                .binary_property(prop::CONTENT, bytes.clone())
                .property(prop::MIMETYPE, BINARY_MIMETYPE);
        }
        Some(value) => {
            if let Some(text) = value.render() {
                builder = builder
                    .property(prop::CONTENT, text)
                    .property(prop::MIMETYPE, TEXT_MIMETYPE);
            }
        }
        None => {}
    }

    let fetch_url = find_column(row, LOB_URL_COLUMN)
        .and_then(ColumnValue::render)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    builder = match fetch_url {
        Some(url) => builder.property(prop::DISPLAY_URL, url),
        None => builder.property(prop::DISPLAY_URL, display_url(ctx, &docid)),
    };

    let title = find_column(row, TITLE_COLUMN).and_then(ColumnValue::render);
    builder = builder.maybe_property(prop::TITLE, title);

    let skip = [lob_column, TITLE_COLUMN];
    builder = add_metadata(builder, row, &skip, ctx.primary_keys);

    Ok(builder.property(prop::DOCID, docid).build())
}

fn display_url(ctx: &MaterializeContext<'_>, docid: &str) -> String {
    format!(
        "{}://{}/{}/{}",
        FEED_SCHEME, ctx.hostname, ctx.db_name, docid
    )
}

/// Case-insensitive column lookup.
fn find_column<'a>(row: &'a Row, name: &str) -> Option<&'a ColumnValue> {
    row.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

/// Attach every column not in the skip list (nor a primary key) as a
/// metadata property. Null values are omitted.
fn add_metadata(
    mut builder: DocumentBuilder,
    row: &Row,
    skip: &[&str],
    primary_keys: &[String],
) -> DocumentBuilder {
    for (column, value) in row {
        let skipped = skip.iter().any(|s| s.eq_ignore_ascii_case(column))
            || primary_keys.iter().any(|k| k.eq_ignore_ascii_case(column));
        if skipped {
            debug!(%column, "column excluded from metadata");
            continue;
        }
        match value.render() {
            Some(rendered) => builder = builder.property(column, rendered),
            None => debug!(%column, "null column omitted from metadata"),
        }
    }
    builder
}
