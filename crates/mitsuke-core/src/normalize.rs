//! 6-step filename normalization pipeline for catalog searches.
//!
//! Turns a noisy media filename into a "real name" suitable as a search
//! query, plus the narrower retry candidates used after a miss.
//!
//! Steps applied in order by [`TitleNormalizer::real_name`]:
//! 1. Quick removal of episode/volume markers and everything after them
//! 2. Configured word removal (normal list)
//! 3. Connector normalization
//! 4. Bracketed-numeric stripping
//! 5. Bracket and quote normalization
//! 6. Whitespace collapse, dropping number pairs exposed by step 5

use std::sync::LazyLock;

use regex::Regex;

use crate::words::WordFilterSet;

/// Markers that start the non-title part of a filename, tried in order.
///
/// The first pattern that matches anywhere wins, even if a later pattern
/// would match earlier in the string.
static QUICK_REMOVE_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(#)|(1st)|(2nd)|(3rd)|(Ⅰ)|(Ⅱ)|(Ⅲ)",
        r"(?i)[上中下][巻卷姦]",
        r"(?i)[前中後][編编]",
        r"(?i)[第全][0-9一二三四五六七八九十参弐壱]+[章話话巻卷幕夜期発縛]?",
        r"(?i)(vol|episode|act|scene|ep|volume|screen|voice|case|menu|rail|round|game|page|collection|cage|office|doll|princess)[ .\-_][0-9]+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Two space-separated number groups, e.g. an episode range "01 54".
static RE_NUMBER_PAIR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+ [0-9]+").unwrap());

/// A bracketed four-digit number, e.g. "[2021]" or "(1998)".
static RE_BRACKETED_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\[(（【]\s*([0-9]{4})\s*[\])）】]").unwrap()
});

/// Release years accepted as search hints.
const YEAR_RANGE: std::ops::RangeInclusive<u32> = 1950..=2050;

/// Brackets and quotes turned into spaces in step 5.
const BRACKET_CHARS: &[char] = &['（', '）', '(', ')', '【', '】', '「', '」', '『', '』'];

/// Filename normalizer holding the compiled word lists.
#[derive(Debug, Clone, Default)]
pub struct TitleNormalizer {
    filters: WordFilterSet,
}

impl TitleNormalizer {
    pub fn new(filters: WordFilterSet) -> Self {
        Self { filters }
    }

    pub fn filters(&self) -> &WordFilterSet {
        &self.filters
    }

    /// Run the full pipeline and return the real name.
    pub fn real_name(&self, raw: &str) -> String {
        let s = quick_remove_info(raw);
        tracing::debug!(step = 1, name = %s, "Quick remove info");

        let s = self.filters.normal.apply(&s);
        tracing::debug!(step = 2, name = %s, "Normal words removed");

        let s = replace_connectors(&s);
        tracing::debug!(step = 3, name = %s, "Connectors replaced");

        let s = strip_bracketed_numbers(&s);
        tracing::debug!(step = 4, name = %s, "Bracketed numbers stripped");

        let s = replace_brackets(&s);
        tracing::debug!(step = 5, name = %s, "Brackets replaced");

        // Step 5 can put a number next to another one, e.g. "100 (2016)".
        let s = collapse_whitespace(&RE_NUMBER_PAIR.replace_all(&collapse_whitespace(&s), ""));
        tracing::debug!(step = 6, name = %s, "Real name");
        s
    }

    /// Apply the strict word list to an already normalized name.
    pub fn strict_name(&self, name: &str) -> String {
        collapse_whitespace(&self.filters.strict.apply(name))
    }

    /// Compute the whole fallback plan for `raw` without searching anything.
    ///
    /// Partials are seeded from the strict name (or the real name when the
    /// strict list consumed everything) and stop at the first fixed point.
    pub fn candidates(&self, raw: &str, max_partial: u32) -> Candidates {
        let real = self.real_name(raw);
        let strict = self.strict_name(&real);

        let mut partials = Vec::new();
        let mut previous = if strict.is_empty() {
            real.clone()
        } else {
            strict.clone()
        };
        for _ in 0..max_partial {
            let next = partial_name(&previous);
            if next == previous {
                break;
            }
            partials.push(next.clone());
            previous = next;
        }

        Candidates {
            real,
            strict,
            partials,
        }
    }
}

/// Every search candidate derived from one filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    pub real: String,
    pub strict: String,
    pub partials: Vec<String>,
}

// ── Step 1: Quick remove ──────────────────────────────────────────────

/// Truncate before the first configured marker (episode titles, volumes, ...).
pub fn quick_remove_info(s: &str) -> String {
    for marker in QUICK_REMOVE_MARKERS.iter() {
        if let Some(m) = marker.find(s) {
            return s[..m.start()].to_string();
        }
    }
    s.to_string()
}

// ── Step 3: Connectors ────────────────────────────────────────────────

/// `. - _ + & @` become spaces; backticks and apostrophes are dropped.
pub fn replace_connectors(s: &str) -> String {
    s.chars()
        .filter_map(|c| match c {
            '.' | '-' | '_' | '+' | '&' | '@' => Some(' '),
            '`' | '\'' => None,
            c => Some(c),
        })
        .collect()
}

// ── Step 4: Bracketed numbers ─────────────────────────────────────────

/// Drop square-bracket fragments that are only digits (years, ids), remove
/// the remaining brackets, then erase "N N" number pairs.
pub fn strip_bracketed_numbers(s: &str) -> String {
    let kept: String = s
        .split(['[', ']'])
        .filter(|fragment| !is_purely_numeric(fragment))
        .collect();
    RE_NUMBER_PAIR.replace_all(&kept, "").into_owned()
}

/// Digits only, ignoring whitespace. Empty fragments are not numeric.
fn is_purely_numeric(fragment: &str) -> bool {
    let mut digits = fragment.chars().filter(|c| !c.is_whitespace()).peekable();
    digits.peek().is_some() && digits.all(|c| c.is_ascii_digit())
}

// ── Step 5: Brackets and quotes ───────────────────────────────────────

/// Full/half-width brackets and corner quotes become spaces, as does every
/// other whitespace character.
pub fn replace_brackets(s: &str) -> String {
    s.chars()
        .map(|c| {
            if BRACKET_CHARS.contains(&c) || c.is_whitespace() {
                ' '
            } else {
                c
            }
        })
        .collect()
}

// ── Step 6: Whitespace ────────────────────────────────────────────────

/// Trim and collapse multiple whitespace runs to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Retry candidates ──────────────────────────────────────────────────

/// Drop the trailing token unless the name is a single ASCII word.
///
/// Names made only of ASCII letters and digits are returned unchanged, as
/// are single-token names. Repeated calls reach a fixed point after at most
/// `tokens - 1` steps.
pub fn partial_name(name: &str) -> String {
    if is_ascii_word(name) {
        return name.to_string();
    }
    let tokens: Vec<&str> = name.split_whitespace().collect();
    if tokens.len() <= 1 {
        return name.to_string();
    }
    tokens[..tokens.len() - 1].join(" ")
}

fn is_ascii_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

// ── Release year ──────────────────────────────────────────────────────

/// Extract a bracketed release year from a raw filename.
///
/// Step 4 strips these from the real name, so the year is picked up here
/// separately and used to narrow searches.
pub fn release_year(raw: &str) -> Option<u32> {
    RE_BRACKETED_YEAR
        .captures_iter(raw)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .find(|year| YEAR_RANGE.contains(year))
}
