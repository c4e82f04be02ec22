// ABOUTME: FOR / ELSEFOR / ENDFOR block evaluation
// ABOUTME: Binds the item and loop metadata for every element and joins the rendered bodies

use indexmap::IndexMap;
use std::sync::Arc;

use super::render_body;
use crate::template::engine::Renderer;
use crate::template::error::{Result, TemplateError};
use crate::template::path;
use crate::template::scanner::{self, Keyword};
use crate::template::scope::Scope;
use crate::template::value::Value;

/// Name bound to the per-iteration metadata record
pub const LOOP_VARIABLE: &str = "loop";

#[derive(Debug, PartialEq)]
struct Header<'a> {
    item: &'a str,
    collection: &'a str,
}

/// Parse `item in collection`
fn parse_header(header: &str) -> Option<Header<'_>> {
    let mut words = header.split_whitespace();
    let item = words.next()?;
    let keyword = words.next()?;
    let collection = words.next()?;
    if words.next().is_some() || !keyword.eq_ignore_ascii_case("in") {
        return None;
    }
    let valid_item = item.starts_with(|c: char| c.is_alphabetic() || c == '_')
        && item.chars().all(path::is_word_char);
    valid_item.then_some(Header { item, collection })
}

fn metadata(index: usize, length: usize) -> Value {
    let mut record = IndexMap::new();
    record.insert("index".to_string(), Value::from(index + 1));
    record.insert("index0".to_string(), Value::from(index));
    record.insert("length".to_string(), Value::from(length));
    record.insert("first".to_string(), Value::Bool(index == 0));
    record.insert("last".to_string(), Value::Bool(index + 1 == length));
    Value::from(record)
}

/// Evaluate a FOR block. An empty or missing collection renders the
/// `elsefor` body once, or nothing when there is none.
pub(crate) fn evaluate(renderer: &mut Renderer<'_>, block: &str, scope: &Arc<Scope>) -> Result<Value> {
    let tags = scanner::tags(block);
    let (Some(opener), Some(close)) = (
        tags.first().filter(|tag| tag.keyword == Some(Keyword::For)),
        scanner::find_closing(&tags, 0, Keyword::For, Keyword::EndFor),
    ) else {
        renderer.record(TemplateError::block("for", "could not match endfor"));
        return Ok(Value::Null);
    };

    let Some(header) = parse_header(&opener.argument) else {
        renderer.record(TemplateError::block(
            "for",
            format!("malformed header '{}', expected 'item in collection'", opener.argument),
        ));
        return Ok(Value::Null);
    };

    let mut depth = 0usize;
    let mut else_tag = None;
    for tag in &tags[1..close] {
        match tag.keyword {
            Some(Keyword::For) => depth += 1,
            Some(Keyword::EndFor) => depth = depth.saturating_sub(1),
            Some(Keyword::ElseFor) if depth == 0 && else_tag.is_none() => else_tag = Some(tag),
            _ => {}
        }
    }
    let body_end = else_tag.map(|tag| tag.start).unwrap_or(tags[close].start);

    let collection = if path::is_dotted_path(header.collection) {
        path::resolve(header.collection, scope)
    } else {
        scope.get(header.collection).cloned().unwrap_or_default()
    };
    let items = collection.iter_items().unwrap_or_default();

    if items.is_empty() {
        let rendered = match else_tag {
            Some(tag) => render_body(renderer, block, tag.end, tags[close].start, scope)?,
            None => String::new(),
        };
        return Ok(Value::String(rendered));
    }

    let length = items.len();
    let mut rendered = Vec::with_capacity(length);
    for (index, item) in items.into_iter().enumerate() {
        let local = Scope::layered([Arc::clone(scope)])
            .with(header.item, item)
            .with(LOOP_VARIABLE, metadata(index, length));
        rendered.push(render_body(renderer, block, opener.end, body_end, &Arc::new(local))?);
    }

    Ok(Value::String(rendered.join("\n").trim().to_string()))
}
