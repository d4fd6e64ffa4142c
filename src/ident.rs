//! Header-text normalization into storage-safe SQL identifiers.
//!
//! Uploaded spreadsheets name their columns in whatever language and
//! punctuation the tenant likes; everything that ends up in generated DDL
//! goes through [`normalize`] first. The output alphabet is `[a-z0-9_]`,
//! so a normalized identifier can never smuggle SQL through a header cell.
//! Quoting is still applied everywhere via [`quote_ident`].

/// Apostrophe-like marks stripped outright. The soft/hard signs of the
/// Cyrillic source data transliterate to apostrophes in the classic
/// scheme, which is where most of these show up.
const APOSTROPHES: [char; 5] = ['\'', '\u{2019}', '\u{02BC}', '\u{02BB}', '`'];

/// Transliterate one lowercase Cyrillic character to its Latin spelling.
/// Returns `None` for characters outside the Russian alphabet.
fn translit(c: char) -> Option<&'static str> {
    Some(match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' | 'э' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "j",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "c",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ы' => "y",
        'ю' => "ju",
        'я' => "ja",
        _ => return None,
    })
}

/// Map arbitrary header text to a canonical ASCII identifier.
///
/// One rule for every caller: transliterate Cyrillic, drop apostrophe-like
/// marks, lowercase, collapse any other non-alphanumeric run into a single
/// underscore, and trim underscores at the ends. An identifier that would
/// start with a digit is prefixed with `c_`; text that normalizes to
/// nothing at all becomes `col`.
///
/// Total and deterministic: every input produces a usable identifier.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_sep = false;

    for ch in text.chars() {
        for lc in ch.to_lowercase() {
            if APOSTROPHES.contains(&lc) {
                continue;
            }
            let piece: Option<String> = if lc.is_ascii_alphanumeric() {
                Some(lc.to_string())
            } else {
                translit(lc).map(str::to_owned)
            };
            match piece {
                Some(p) if p.is_empty() => {}
                Some(p) => {
                    if pending_sep && !out.is_empty() {
                        out.push('_');
                    }
                    pending_sep = false;
                    out.push_str(&p);
                }
                None => pending_sep = true,
            }
        }
    }

    if out.is_empty() {
        "col".to_string()
    } else if out.starts_with(|c: char| c.is_ascii_digit()) {
        format!("c_{out}")
    } else {
        out
    }
}

/// Human-facing label for a normalized identifier: first letter uppercased.
/// Used for cube projection aliases, never for table or column names.
pub fn display_name(ident: &str) -> String {
    let mut chars = ident.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Double-quote an identifier for SQL, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
