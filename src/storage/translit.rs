use deunicode::deunicode_with_tofu;

/// Transliterates a path component to ASCII and replaces every character
/// outside `[A-Za-z0-9._/%]` with `separator`
///
/// # Example
///
/// ```
/// use webmirror::storage::sanitize;
///
/// assert_eq!(sanitize("t#e$s%t^:Алгоритм", '_'), "t_e_s%t__Algoritm");
/// ```
pub fn sanitize(input: &str, separator: char) -> String {
    if input.is_empty() {
        return String::new();
    }

    deunicode_with_tofu(input, "_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '%') {
                c
            } else {
                separator
            }
        })
        .collect()
}
