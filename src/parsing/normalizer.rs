//! Character-level cleanup of OCR output before any pattern matching.
//!
//! Every rewrite maps into a set the other rewrites never touch, so
//! `normalize(normalize(x)) == normalize(x)` holds for any input.

/// Kanji the recogniser tends to swap for a visually close variant.
const KANJI_CONFUSIONS: &[(&str, &str)] = &[
    ("殘", "残"),
    ("歸", "帰"),
    ("閒", "間"),
    ("探査", "探索"),
];

pub fn normalize(text: &str) -> String {
    let mut out: String = text.chars().map(fold_width).collect();

    for (from, to) in KANJI_CONFUSIONS {
        if out.contains(from) {
            out = out.replace(from, to);
        }
    }

    fix_digit_confusions(&out)
}

fn fold_width(c: char) -> char {
    match c {
        '\u{FF10}'..='\u{FF19}' => char::from(b'0' + (c as u32 - 0xFF10) as u8),
        '：' => ':',
        '［' => '[',
        '］' => ']',
        '\u{3000}' => ' ',
        _ => c,
    }
}

fn confusable_digit(c: char) -> Option<char> {
    match c {
        'O' | 'o' => Some('0'),
        'l' | 'I' => Some('1'),
        _ => None,
    }
}

fn is_numeric_context(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, ':' | '時' | '分')
}

/// Latin letters only become digits when they touch numeric text, so names keep their letters.
/// Runs to a fixed point: `lO5` needs two passes to become `105`.
fn fix_digit_confusions(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();

    loop {
        let mut changed = false;
        for i in 0..chars.len() {
            let Some(digit) = confusable_digit(chars[i]) else {
                continue;
            };
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1).copied();
            if prev.is_some_and(is_numeric_context) || next.is_some_and(is_numeric_context) {
                chars[i] = digit;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    chars.into_iter().collect()
}
