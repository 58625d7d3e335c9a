// 🔤 Text Normalizer - canonical form for free-text labels
// Transliterate -> lowercase -> punctuation to spaces -> collapse whitespace

/// Fixed substitution table for the Azerbaijani Latin alphabet
fn transliterate(c: char) -> Option<char> {
    match c {
        'ə' | 'Ə' => Some('e'),
        'ı' | 'İ' => Some('i'),
        'ş' | 'Ş' => Some('s'),
        'ö' | 'Ö' => Some('o'),
        'ü' | 'Ü' => Some('u'),
        'ğ' | 'Ğ' => Some('g'),
        'ç' | 'Ç' => Some('c'),
        _ => None,
    }
}

fn is_separator(c: char) -> bool {
    matches!(
        c,
        '(' | ')' | '[' | ']' | '{' | '}' | ':' | ';' | ',' | '/' | '\\' | '-' | '–' | '—'
    )
}

/// Canonicalize a label for comparison.
///
/// `normalize(normalize(x)) == normalize(x)` for every input.
pub fn normalize(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());

    for c in text.chars() {
        if let Some(t) = transliterate(c) {
            folded.push(t);
            continue;
        }
        // to_lowercase can yield several chars; run each through the table again
        for lower in c.to_lowercase() {
            let lower = transliterate(lower).unwrap_or(lower);
            if is_separator(lower) {
                folded.push(' ');
            } else {
                folded.push(lower);
            }
        }
    }

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transliterates_azerbaijani_letters() {
        assert_eq!(normalize("Ümumi kapital"), "umumi kapital");
        assert_eq!(normalize("Ötən dövr"), "oten dovr");
        assert_eq!(normalize("MƏCMU ÖHDƏLİKLƏR"), "mecmu ohdelikler");
        assert_eq!(normalize("Çəkilmiş ığ"), "cekilmis ig");
    }

    #[test]
    fn test_punctuation_becomes_space() {
        assert_eq!(normalize("Hesabat (cari)"), "hesabat cari");
        assert_eq!(normalize("Kreditlər: xalis/net"), "kreditler xalis net");
        assert_eq!(normalize("a—b–c-d"), "a b c d");
        assert_eq!(normalize("[1] {2}; 3,4"), "1 2 3 4");
    }

    #[test]
    fn test_whitespace_collapsed_and_trimmed() {
        assert_eq!(normalize("  Pul   vəsaitləri \t\n "), "pul vesaitleri");
        assert_eq!(normalize("a\u{00a0}b"), "a b");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_dots_are_kept() {
        assert_eq!(normalize("1.5.6 Kreditlər"), "1.5.6 kreditler");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Ümumi kapital",
            "Hesabat (cari) dövrü",
            "MÜŞTƏRİLƏRƏ VERİLMİŞ KREDİTLƏR",
            "  (1,234.50) — x ",
            "İİ ıı ẞ Σσς",
            "Итого по разделу",
            "",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }
}
