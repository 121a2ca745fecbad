//! Katakana helpers: vowel reduction and mora counting.
//!
//! Readings produced by a morphological analyzer are katakana; reducing them
//! to vowels is the usual basis for rhyme and meter analysis.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

/// Single katakana mapped to the vowel of their mora.
const SINGLE_VOWELS: &[(char, &str)] = &[
    ('ア', "カサタナハマヤラワア\u{3099}ガザダバヷパァ"),
    ('イ', "キシチニヒミリヰギジヂビヸピィ"),
    ('ウ', "クスツヌフムユルグズヅブヴプゥ"),
    ('エ', "ケセテネヘメレヱゲゼデベヹペェ"),
    ('オ', "コソトノホモヨロヲゴゾドボヺポォ"),
];

/// Two-character mora (`consonant + small kana`) and their vowel.
///
/// Later rows win when the same pair appears twice.
const PAIR_VOWELS: &[(char, &str, char)] = &[
    // open yo-on
    ('ア', "キシチニヒミリギジヂビヸピ", 'ャ'),
    ('ウ', "キシチニヒミリギジヂビヸピ", 'ュ'),
    ('オ', "キシチニヒミリギジヂビヸピ", 'ョ'),
    // closed yo-on
    ('ア', "クグ", 'ヮ'),
    // choku-on
    ('ア', "ツフヴ", 'ァ'),
    ('イ', "ステツフズデヴ", 'ィ'),
    ('ウ', "トホド", 'ゥ'),
    ('エ', "シチツフジヴ", 'ェ'),
    ('オ', "ツフヴ", 'ォ'),
    // open yo-on
    ('エ', "イキニヒピミリギビ", 'ェ'),
    ('ア', "ステツフズデヴ", 'ャ'),
    ('ウ', "ステツフズデヴ", 'ュ'),
    ('オ', "ステツフズデヴ", 'ョ'),
    // closed yo-on
    ('ア', "クスヌプムルグズブ", 'ァ'),
    ('イ', "ウクヌプムルグブ", 'ィ'),
    ('エ', "ウクスヌプムルグズブ", 'ェ'),
    ('オ', "ウクスヌプムルグズブ", 'ォ'),
];

/// Characters that each count as one mora after vowel reduction.
const MORA_CHARS: &[char] = &['ア', 'イ', 'ウ', 'エ', 'オ', 'ッ', 'ン', 'ー'];

struct VowelTables {
    single: HashMap<char, char>,
    pairs: HashMap<String, char>,
    pair_regex: Regex,
}

static VOWEL_TABLES: LazyLock<VowelTables> = LazyLock::new(|| {
    let mut single = HashMap::new();
    for &(vowel, chars) in SINGLE_VOWELS {
        for c in chars.chars() {
            single.insert(c, vowel);
        }
    }

    let mut pairs = HashMap::new();
    for &(vowel, heads, tail) in PAIR_VOWELS {
        for head in heads.chars() {
            pairs.insert(format!("{head}{tail}"), vowel);
        }
    }

    let pair_regex = either(pairs.keys()).expect("Invalid katakana pair regex");

    VowelTables {
        single,
        pairs,
        pair_regex,
    }
});

/// Builds a compact regex matching any of the given strings.
///
/// Strings of two or more characters are grouped by first character; first
/// characters sharing the same set of suffixes are folded into one character
/// class, as are suffix sets made of single characters. Single-character
/// strings are matched by one trailing class.
///
/// ```
/// let re = shikaku::kana::either(["ac", "ad", "bc", "bd"]).unwrap();
/// assert_eq!(re.as_str(), "[ab][cd]");
/// ```
pub fn either<I, S>(strings: I) -> Result<Regex, regex::Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut strings: Vec<String> = strings.into_iter().map(|s| s.as_ref().to_string()).collect();
    strings.sort_by_key(|s| std::cmp::Reverse(s.chars().count()));

    let mut prefixes: BTreeMap<char, BTreeSet<String>> = BTreeMap::new();
    for s in &strings {
        let mut chars = s.chars();
        if let Some(first) = chars.next() {
            let rest = chars.as_str();
            if !rest.is_empty() {
                prefixes.entry(first).or_default().insert(rest.to_string());
            }
        }
    }

    // Larger suffix sets first, then by first character.
    let mut prefixes: Vec<(char, BTreeSet<String>)> = prefixes.into_iter().collect();
    prefixes.sort_by_key(|(_, suffixes)| std::cmp::Reverse(suffixes.len()));

    let mut groups: Vec<String> = Vec::new();
    let mut seen: Vec<&BTreeSet<String>> = Vec::new();
    for (first, suffixes) in &prefixes {
        if seen.contains(&suffixes) {
            continue;
        }
        seen.push(suffixes);

        let mut heads: Vec<char> = prefixes
            .iter()
            .filter(|(_, other)| other == suffixes)
            .map(|(c, _)| *c)
            .collect();
        heads.sort_unstable();

        let head = if heads.len() >= 2 {
            char_class(heads.iter().map(|c| c.to_string()))
        } else {
            regex::escape(&first.to_string())
        };

        let tail = if suffixes.len() >= 2 {
            if suffixes.iter().any(|s| s.chars().count() > 1) {
                let mut alternatives: Vec<&String> = suffixes.iter().collect();
                alternatives.sort_by_key(|s| std::cmp::Reverse(s.chars().count()));
                let alternatives: Vec<String> =
                    alternatives.iter().map(|s| regex::escape(s)).collect();
                format!("(?:{})", alternatives.join("|"))
            } else {
                char_class(suffixes.iter().cloned())
            }
        } else {
            suffixes.iter().map(|s| regex::escape(s)).collect()
        };

        groups.push(head + &tail);
    }
    groups.sort_by(|a, b| pattern_order(a, b));

    let mut singles: Vec<String> = strings
        .iter()
        .filter(|s| s.chars().count() == 1)
        .map(|s| regex::escape(s))
        .collect();
    singles.sort_by(|a, b| pattern_order(a, b));
    if singles.len() >= 2 {
        singles = vec![format!("[{}]", singles.concat())];
    }

    groups.extend(singles);
    Regex::new(&groups.join("|"))
}

/// Longer patterns first, then lexicographic.
fn pattern_order(a: &str, b: &str) -> std::cmp::Ordering {
    b.chars()
        .count()
        .cmp(&a.chars().count())
        .then_with(|| a.cmp(b))
}

fn char_class<I: IntoIterator<Item = String>>(members: I) -> String {
    let escaped: String = members.into_iter().map(|m| regex::escape(&m)).collect();
    format!("[{escaped}]")
}

/// Converts a katakana string to the vowels of its mora.
///
/// Characters outside the katakana tables are kept as they are.
///
/// ```
/// assert_eq!(shikaku::kana::katakana_to_vowels("コンピューター"), "オンウーアー");
/// ```
pub fn katakana_to_vowels(text: &str) -> String {
    let tables = &*VOWEL_TABLES;
    let paired = tables.pair_regex.replace_all(text, |caps: &regex::Captures| {
        tables.pairs[&caps[0]].to_string()
    });

    paired
        .chars()
        .map(|c| tables.single.get(&c).copied().unwrap_or(c))
        .collect()
}

/// Counts the mora in a katakana string.
///
/// Only kana are counted, so latin or kanji input counts as zero.
///
/// ```
/// assert_eq!(shikaku::kana::count_mora("コンピューター"), 6);
/// ```
pub fn count_mora(text: &str) -> usize {
    count_mora_in_vowels(&katakana_to_vowels(text))
}

fn count_mora_in_vowels(vowels: &str) -> usize {
    vowels.chars().filter(|c| MORA_CHARS.contains(c)).count()
}
