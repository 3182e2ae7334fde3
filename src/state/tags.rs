/// Tag list <-> single column encoding
///
/// Tags are stored in one TEXT column joined by a single comma. A tag that
/// contains the delimiter (or is empty) could not be decoded back to the same
/// list, so `encode` rejects it instead of writing an ambiguous value.

use crate::error::{Error, Result, ValidationIssue};

/// Canonical delimiter, used in both directions
pub const TAG_DELIMITER: &str = ",";

/// Join tags into the stored representation
pub fn encode<S: AsRef<str>>(tags: &[S]) -> Result<String> {
    let invalid: Vec<ValidationIssue> = tags
        .iter()
        .map(AsRef::as_ref)
        .filter(|tag| tag.is_empty() || tag.contains(TAG_DELIMITER))
        .map(|tag| ValidationIssue::InvalidTag(tag.to_string()))
        .collect();

    if !invalid.is_empty() {
        return Err(Error::Validation(invalid));
    }

    Ok(tags
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(TAG_DELIMITER))
}

/// Split a stored value back into tags. Empty input yields no tags.
pub fn decode(encoded: &str) -> Vec<String> {
    if encoded.is_empty() {
        return Vec::new();
    }
    encoded.split(TAG_DELIMITER).map(str::to_string).collect()
}

/// Clean raw user input: trim each tag and drop blanks
pub fn normalize<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .map(|tag| tag.as_ref().trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}
