use serde::{Deserialize, Deserializer};

/// Checkbox semantics of HTML forms: absent is false, and so are `""` and `"false"`.
pub fn checkbox<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.is_some_and(|v| checkbox_value(&v)))
}

pub fn checkbox_value(raw: &str) -> bool {
    !(raw.is_empty() || raw.eq_ignore_ascii_case("false"))
}

/// Character-count bounds check, inclusive on both ends.
pub fn length_between(value: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&value.chars().count())
}
