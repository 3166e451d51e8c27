use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::metadata::DateValue;
use crate::xml::{append_to_root, find_element, insert_after, render_element, replace_text};

/// Field written into the metadata file
pub const DATE_ADDED_TAG: &str = "dateadded";
/// Field written into the descriptor file
pub const DESCRIPTOR_ADDED_TAG: &str = "Added";
/// A new `<dateadded>` goes right after this element
const METADATA_ANCHOR_TAG: &str = "title";
const RATING_TAG: &str = "mpaa";

/// Set `<dateadded>` in metadata content, inserting it after `<title>` (or at
/// the end of the root element) when absent. Ratings listed in `rating_map`
/// are rewritten too.
pub fn rewrite_metadata(
    content: &str,
    value: &DateValue,
    rating_map: &HashMap<String, String>,
) -> Result<String> {
    let timestamp = value.timestamp();

    let mut out = match find_element(content, DATE_ADDED_TAG)? {
        Some(element) => replace_text(content, &element, &timestamp),
        None => match find_element(content, METADATA_ANCHOR_TAG)? {
            Some(title) => {
                insert_after(content, &title, &render_element(DATE_ADDED_TAG, &timestamp))
            }
            None => append_field(content, DATE_ADDED_TAG, &timestamp)?,
        },
    };

    if !rating_map.is_empty() {
        out = remap_rating(&out, rating_map)?;
    }

    Ok(out)
}

/// Set `<Added>` in descriptor content, appending it to the root when absent.
pub fn rewrite_descriptor(content: &str, value: &DateValue) -> Result<String> {
    let timestamp = value.timestamp();

    match find_element(content, DESCRIPTOR_ADDED_TAG)? {
        Some(element) => Ok(replace_text(content, &element, &timestamp)),
        None => append_field(content, DESCRIPTOR_ADDED_TAG, &timestamp),
    }
}

fn append_field(content: &str, tag: &str, value: &str) -> Result<String> {
    append_to_root(content, &render_element(tag, value)).map_err(|e| match e {
        Error::MissingAnchor(_) => Error::MissingAnchor(tag.to_string()),
        other => other,
    })
}

fn remap_rating(content: &str, rating_map: &HashMap<String, String>) -> Result<String> {
    let Some(element) = find_element(content, RATING_TAG)? else {
        return Ok(content.to_string());
    };

    match rating_map.get(element.text.trim()) {
        Some(mapped) => {
            tracing::debug!(from = %element.text, to = %mapped, "remapping rating");
            Ok(replace_text(content, &element, mapped))
        }
        None => Ok(content.to_string()),
    }
}
