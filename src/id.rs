use uuid::Uuid;

/// Generates a client-side document/file id the backend accepts: 32 lowercase
/// hex characters, well inside the 36-character limit and never starting
/// with a special character.
pub fn unique() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Whether `id` satisfies the backend's custom id rules.
pub fn is_valid(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    id.len() <= 36 && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
