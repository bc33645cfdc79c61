//! Boundary normalisation for untrusted text input.
//!
//! Every list-valued field (product types, contract types) and every email
//! address passes through here exactly once before it reaches the store.

/// Canonical form of an email address: trimmed and lower-cased.
pub fn email(raw: &str) -> String { raw.trim().to_lowercase() }

/// Split a comma-separated form value into a deduplicated list of trimmed,
/// non-empty entries. Order of first appearance is kept.
pub fn split_list(raw: &str) -> Vec<String> { dedupe(raw.split(',')) }

/// Trim, drop empties and deduplicate a sequence of entries.
pub fn dedupe<I, T>(items: I) -> Vec<String>
where
  I: IntoIterator<Item = T>,
  T: AsRef<str>,
{
  let mut out: Vec<String> = Vec::new();
  for item in items {
    let trimmed = item.as_ref().trim();
    if !trimmed.is_empty() && !out.iter().any(|e| e == trimmed) {
      out.push(trimmed.to_owned());
    }
  }
  out
}

/// Case folding used by every case-insensitive text match. Full Unicode
/// lower-casing, so accented capitals fold too.
pub fn fold_case(raw: &str) -> String { raw.to_lowercase() }

/// [`fold_case`] applied to each entry of a list.
pub fn fold_list(items: &[String]) -> Vec<String> {
  items.iter().map(|s| fold_case(s)).collect()
}

/// `None` for absent or whitespace-only text, the trimmed text otherwise.
pub fn optional_text(raw: Option<&str>) -> Option<String> {
  raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}
