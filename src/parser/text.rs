use std::sync::LazyLock;

use regex::Regex;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)>").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());

/// Fold accented Latin letters to their ASCII base letter.
pub fn strip_accents(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        _ => c,
    }
}

/// Lowercased, accent-folded form used for every keyword comparison.
pub fn fold(s: &str) -> String {
    strip_accents(&s.to_lowercase())
}

/// URL-safe slug: lowercase ASCII alphanumerics separated by single hyphens.
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_hyphen = false;
    for c in fold(s).chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Decode the handful of HTML entities catalog pages actually emit.
pub fn decode_entities(s: &str) -> String {
    let named = s
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&ndash;", "–")
        .replace("&mdash;", "—");
    let numeric = NUMERIC_ENTITY_RE.replace_all(&named, |caps: &regex::Captures| {
        let code = &caps[1];
        let parsed = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        parsed
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    // &amp; last so "&amp;lt;" stays "&lt;"
    numeric.replace("&amp;", "&")
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of a markup fragment: scripts, styles and comments dropped,
/// tags replaced by spaces, entities decoded, whitespace collapsed.
pub fn strip_tags(markup: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(markup, " ");
    let without_comments = COMMENT_RE.replace_all(&without_scripts, " ");
    let without_tags = TAG_RE.replace_all(&without_comments, " ");
    collapse_whitespace(&decode_entities(&without_tags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_folds_accents_and_collapses() {
        assert_eq!(slugify("Anel Solitário  Zircônia!"), "anel-solitario-zirconia");
        assert_eq!(slugify("--Brinco / Argola--"), "brinco-argola");
        assert_eq!(slugify("Ring Model X"), "ring-model-x");
    }

    #[test]
    fn slugify_is_idempotent() {
        for name in ["Colar Coração 45cm", "  ---  ", "Pulseira  Riviera (Dourada)", "ÇÃO"] {
            let once = slugify(name);
            assert_eq!(slugify(&once), once);
            assert!(!once.starts_with('-') && !once.ends_with('-'));
            assert!(!once.contains("--"));
        }
    }

    #[test]
    fn slugify_empty_input() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn decode_entities_named_and_numeric() {
        assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("R&#36; 10&#x2C;00"), "R$ 10,00");
        assert_eq!(decode_entities("a&amp;lt;b"), "a&lt;b");
    }

    #[test]
    fn strip_tags_drops_scripts() {
        let html = "<p>Anel <b>delicado</b></p><script>var x = '<b>no</b>';</script><!-- hidden -->";
        assert_eq!(strip_tags(html), "Anel delicado");
    }
}
