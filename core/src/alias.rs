use chrono::{DateTime, Local};

/// Counter style used when bumping a string that collides with an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementStyle {
    /// `"Foo"` → `"Foo (2)"` → `"Foo (3)"`; used for display names.
    Default,
    /// `"foo"` → `"foo-2"` → `"foo-3"`; used for aliases.
    Dash,
}

/// Append a counter to `s`, or bump the trailing one if present.
#[must_use]
pub fn increment(s: &str, style: IncrementStyle) -> String {
    match style {
        IncrementStyle::Default => match trailing_paren_counter(s).and_then(bump) {
            Some((head, next)) => format!("{head}({next})"),
            None => format!("{s} (2)"),
        },
        IncrementStyle::Dash => match trailing_dash_counter(s).and_then(bump) {
            Some((head, next)) => format!("{head}-{next}"),
            None => format!("{s}-2"),
        },
    }
}

/// Next counter value; a saturated counter is treated like no counter at all.
fn bump((head, n): (&str, u64)) -> Option<(&str, u64)> {
    Some((head, n.checked_add(1)?))
}

/// Split `"Foo (3)"` into `("Foo ", 3)`.
fn trailing_paren_counter(s: &str) -> Option<(&str, u64)> {
    let inner = s.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    let digits = &inner[open + 1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n = digits.parse().ok()?;
    Some((&s[..open], n))
}

/// Split `"foo-3"` into `("foo", 3)`.
fn trailing_dash_counter(s: &str) -> Option<(&str, u64)> {
    let dash = s.rfind('-')?;
    let digits = &s[dash + 1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n = digits.parse().ok()?;
    Some((&s[..dash], n))
}

fn transliterate(ch: char) -> Option<&'static str> {
    let s = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'ď' | 'đ' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => "e",
        'ğ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'ı' => "i",
        'ł' | 'ľ' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ř' => "r",
        'ś' | 'š' | 'ş' => "s",
        'ß' => "ss",
        'ť' | 'ţ' => "t",
        'þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(s)
}

/// Reduce a string to a lowercase, dash-separated slug made of `[a-z0-9]`.
#[must_use]
pub fn string_url_safe(input: &str) -> String {
    let lowered = input.replace('-', " ").to_lowercase();

    let mut ascii = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        if ch == '\'' {
            continue;
        }
        match transliterate(ch) {
            Some(t) => ascii.push_str(t),
            None => ascii.push(ch),
        }
    }

    let mut slug = String::with_capacity(ascii.len());
    let mut gap = false;
    for ch in ascii.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            gap = false;
            slug.push(ch);
        } else {
            gap = true;
        }
    }
    slug
}

/// Build the alias for a record: keep `alias` if set, otherwise derive it from `name`.
#[must_use]
pub fn generate_alias(alias: &str, name: &str) -> String {
    generate_alias_at(alias, name, Local::now())
}

pub(crate) fn generate_alias_at(alias: &str, name: &str, now: DateTime<Local>) -> String {
    let source = if alias.trim().is_empty() { name } else { alias };
    let slug = string_url_safe(source);
    if slug.replace('-', "").trim().is_empty() {
        return now.format("%Y-%m-%d-%H-%M-%S").to_string();
    }
    slug
}
