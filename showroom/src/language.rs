//! Conversation language codes.

/// Code used when no language could be determined.
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// Normalizes a BCP-47-like code: lowercase, `_` -> `-`, at most 16 chars, alphanumeric
/// subtags, primary subtag of 2-3 chars. Returns `None` when the input does not qualify.
pub fn sanitize_language_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_lowercase().replace('_', "-");
    if code.is_empty() || code.chars().count() > 16 {
        return None;
    }
    if code
        .split('-')
        .any(|token| token.is_empty() || !token.chars().all(char::is_alphanumeric))
    {
        return None;
    }
    let primary_len = code.split('-').next().map(|p| p.chars().count()).unwrap_or(0);
    if !(2..=3).contains(&primary_len) {
        return None;
    }
    Some(code)
}

/// Picks the first valid code among inferred, existing and configured default; else `und`.
pub fn choose_language(
    inferred: Option<&str>,
    existing: Option<&str>,
    default: Option<&str>,
) -> String {
    [inferred, existing, default]
        .into_iter()
        .flatten()
        .find_map(sanitize_language_code)
        .unwrap_or_else(|| UNDETERMINED_LANGUAGE.to_string())
}

/// Whether customer-facing fixed texts should be written in Spanish.
pub fn is_spanish(code: &str) -> bool {
    code.trim().to_lowercase().starts_with("es")
}
