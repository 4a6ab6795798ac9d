//! Internationalization (i18n) for PromptCanvas.
//!
//! Key→string tables are parsed from embedded `locales/*.txt` files the first
//! time any lookup happens. The `t!("key")` macro looks up the current
//! language, falling back to English. Language can be switched at runtime via
//! `set_language()`.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// lang_code → (key → translated_string)
static TRANSLATIONS: OnceLock<HashMap<&'static str, HashMap<String, String>>> = OnceLock::new();

static CURRENT_LANG: Mutex<Option<String>> = Mutex::new(None);

/// Supported languages: (code, native_name)
pub const LANGUAGES: &[(&str, &str)] = &[("en", "English"), ("zh-CN", "中文(简体)")];

fn tables() -> &'static HashMap<&'static str, HashMap<String, String>> {
    TRANSLATIONS.get_or_init(|| {
        let mut translations = HashMap::new();
        translations.insert("en", parse_translations(include_str!("../locales/en.txt")));
        translations.insert(
            "zh-CN",
            parse_translations(include_str!("../locales/zh-CN.txt")),
        );
        translations
    })
}

/// Initialize the i18n system. `preferred` is the configured language code;
/// an empty or unknown value falls back to the detected system language.
pub fn init(preferred: Option<&str>) {
    let lang = match preferred {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => detect_system_language(),
    };
    set_language(&lang);
}

/// Set the active language. If `code` is not a known language, falls back to "en".
pub fn set_language(code: &str) {
    let resolved = if tables().contains_key(code) { code } else { "en" };
    let mut guard = CURRENT_LANG.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(resolved.to_string());
}

/// Get the current language code.
pub fn current_language() -> String {
    let guard = CURRENT_LANG.lock().unwrap_or_else(|e| e.into_inner());
    guard.clone().unwrap_or_else(|| "en".to_string())
}

/// Look up a translation key in the current language, falling back to
/// English, or returning the key itself as last resort.
pub fn translate(key: &str) -> String {
    translate_in(&current_language(), key)
}

/// Look up a key in an explicit language.
pub fn translate_in(lang: &str, key: &str) -> String {
    let tables = tables();
    if let Some(map) = tables.get(lang)
        && let Some(val) = map.get(key)
    {
        return val.clone();
    }
    if lang != "en"
        && let Some(map) = tables.get("en")
        && let Some(val) = map.get(key)
    {
        return val.clone();
    }
    key.to_string()
}

/// Detect the system language from the usual locale variables.
/// Returns "en" if no match is found.
pub fn detect_system_language() -> String {
    for var in &["LC_ALL", "LC_MESSAGES", "LANG", "LANGUAGE"] {
        if let Ok(val) = std::env::var(var)
            && let Some(lang) = match_system_locale(&val)
        {
            return lang;
        }
    }
    "en".to_string()
}

/// Match a system locale string (e.g. "en_US.UTF-8", "zh_CN", "zh-Hans") to a supported language.
fn match_system_locale(locale: &str) -> Option<String> {
    let normalized = locale.to_lowercase().replace('_', "-");
    let lang_part = normalized.split('.').next().unwrap_or(&normalized);
    let lang_part = lang_part.split('@').next().unwrap_or(lang_part);

    for &(code, _) in LANGUAGES {
        if code.to_lowercase() == lang_part {
            return Some(code.to_string());
        }
    }

    let primary = lang_part.split('-').next().unwrap_or(lang_part);
    for &(code, _) in LANGUAGES {
        let code_primary = code.split('-').next().unwrap_or(code);
        if code_primary.to_lowercase() == primary {
            return Some(code.to_string());
        }
    }

    None
}

/// Parse a simple key=value translation file.
/// Lines starting with `#` are comments. Empty lines ignored.
fn parse_translations(data: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, val)) = line.split_once('=') {
            map.insert(key.trim().to_string(), val.trim().to_string());
        }
    }
    map
}

/// Translation macro. Usage: `t!("tool.brush")` or `t!("notify.lasso_min", count = 3)`
#[macro_export]
macro_rules! t {
    ($key:expr) => {
        $crate::i18n::translate($key)
    };
    ($key:expr, $($name:ident = $val:expr),+ $(,)?) => {{
        let mut s = $crate::i18n::translate($key);
        $(
            s = s.replace(concat!("{", stringify!($name), "}"), &format!("{}", $val));
        )+
        s
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_strings_match_supported_languages() {
        assert_eq!(match_system_locale("zh_CN.UTF-8").as_deref(), Some("zh-CN"));
        assert_eq!(match_system_locale("zh_TW").as_deref(), Some("zh-CN"));
        assert_eq!(match_system_locale("en_GB.UTF-8").as_deref(), Some("en"));
        assert_eq!(match_system_locale("fr_FR"), None);
    }

    #[test]
    fn every_english_key_has_a_chinese_translation() {
        let en = &tables()["en"];
        let zh = &tables()["zh-CN"];
        let missing: Vec<&String> = en.keys().filter(|k| !zh.contains_key(*k)).collect();
        assert!(missing.is_empty(), "missing zh-CN keys: {:?}", missing);
    }

    #[test]
    fn unknown_key_falls_back_to_key() {
        assert_eq!(translate_in("zh-CN", "no.such.key"), "no.such.key");
        assert_eq!(translate_in("en", "tool.brush"), "Brush");
        assert_eq!(translate_in("zh-CN", "tool.brush"), "画笔");
    }
}
