//! Semantic version comparison for the `$v*` operators.
//!
//! Versions are normalised into strings that compare lexicographically in
//! version order: numeric parts are left-padded, build metadata is dropped,
//! and a release sorts after its pre-releases (`1.0.0` > `1.0.0-beta`).

/// Normalise a version string for lexicographic comparison.
pub fn padded_version(input: &str) -> String {
    let without_prefix = input.strip_prefix('v').unwrap_or(input);
    let core = without_prefix.split('+').next().unwrap_or_default();

    let mut parts: Vec<String> = core
        .split(|c| c == '.' || c == '-')
        .map(|part| {
            if !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()) {
                format!("{:>5}", part)
            } else {
                part.to_string()
            }
        })
        .collect();

    // Releases get a high-sorting marker so they outrank pre-release tags.
    if parts.len() == 3 {
        parts.push("~".to_string());
    }

    parts.join("-")
}
