//! Masking of credentials in text that ends up in logs.

use regex::Regex;
use std::sync::LazyLock;

static SECRET_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(appid|key|api_key|apikey|token)=([^&\s]+)")
        .expect("secret pattern compiles")
});

/// Replace the values of credential-bearing query parameters with `***`.
///
/// ```
/// use tarnished_weather::utils::redact_secrets;
///
/// assert_eq!(
///     redact_secrets("q=London&appid=abc123"),
///     "q=London&appid=***"
/// );
/// ```
pub fn redact_secrets(text: &str) -> String {
    SECRET_PARAM.replace_all(text, "$1=***").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_known_parameters() {
        assert_eq!(
            redact_secrets("/weather?q=Oslo&appid=secret&units=metric"),
            "/weather?q=Oslo&appid=***&units=metric"
        );
        assert_eq!(redact_secrets("key=abc&API_KEY=def"), "key=***&API_KEY=***");
    }

    #[test]
    fn test_leaves_other_text_alone() {
        assert_eq!(redact_secrets("city=Oslo&days=3"), "city=Oslo&days=3");
        assert_eq!(redact_secrets("monkey business"), "monkey business");
        assert_eq!(redact_secrets(""), "");
    }
}
