//! Aozora Bunko markup normalization.
//!
//! Aozora Bunko text files carry three kinds of markup:
//!
//! - ruby: `｜明日《あした》` or, with an implicit base, `明日《あした》`
//! - editor annotations: `［＃３字下げ］`, `［＃「走れ」に傍点］`
//! - a header (title, author and a notation legend between two lines of
//!   dashes) and a footer starting at `底本：`
//!
//! Clean mode walks the text once with an explicit state machine and keeps
//! only base text. Raw mode only normalizes line endings.

use crate::utils::normalize_line_endings;

/// Opens a ruby base when the base is not a plain kanji run.
const RUBY_BAR: char = '｜';
const RUBY_OPEN: char = '《';
const RUBY_CLOSE: char = '》';
const ANNOTATION_OPEN: char = '［';
const ANNOTATION_MARK: char = '＃';
const ANNOTATION_CLOSE: char = '］';
/// Quotes the target text inside an annotation; brackets there are literal.
const QUOTE_OPEN: char = '「';
const QUOTE_CLOSE: char = '」';

/// First line of the bibliographic footer.
const FOOTER_PREFIX: &str = "底本：";

/// Minimum number of dashes forming a header delimiter line.
const DELIMITER_MIN_DASHES: usize = 5;

/// How loaded text is post-processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextMode {
    /// Original markup kept verbatim, including header and footer.
    Raw,
    /// Ruby readings, annotations, header and footer removed.
    #[default]
    Clean,
}

impl TextMode {
    /// Maps a `raw` flag onto a mode.
    pub fn from_raw_flag(raw: bool) -> Self {
        if raw { TextMode::Raw } else { TextMode::Clean }
    }
}

/// Normalizes Aozora Bunko text.
///
/// Never fails: malformed or unknown markup is passed through unchanged.
pub fn normalize(text: &str, mode: TextMode) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = normalize_line_endings(text);

    match mode {
        TextMode::Raw => text,
        TextMode::Clean => clean(&text),
    }
}

/// Position relative to the header and footer blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    /// Title and author lines before the first delimiter.
    Preamble,
    /// Notation legend between the two delimiters.
    Legend,
    Body,
    /// Everything from `底本：` on.
    Footer,
}

fn clean(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut block = Block::Preamble;
    // Lines seen before the header is known to be closed.
    let mut held: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        match block {
            Block::Preamble | Block::Legend => {
                if is_footer_start(line) {
                    for held_line in held.drain(..) {
                        push_body_line(&mut out, held_line);
                    }
                    block = Block::Footer;
                } else if is_delimiter(line) {
                    held.push(line);
                    if block == Block::Preamble {
                        block = Block::Legend;
                    } else {
                        held.clear();
                        block = Block::Body;
                    }
                } else {
                    held.push(line);
                }
            }
            Block::Body => {
                if is_footer_start(line) {
                    block = Block::Footer;
                } else {
                    push_body_line(&mut out, line);
                }
            }
            Block::Footer => break,
        }
    }

    // No closing delimiter: the held lines were body text all along.
    for held_line in held {
        push_body_line(&mut out, held_line);
    }

    // Blank lines at the edges go; indentation of the first line stays.
    let first = out.iter().position(|line| !line.trim().is_empty());
    let last = out.iter().rposition(|line| !line.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => out[first..=last].join("\n"),
        _ => String::new(),
    }
}

fn is_delimiter(line: &str) -> bool {
    let line = line.trim();
    line.len() >= DELIMITER_MIN_DASHES && line.chars().all(|c| c == '-')
}

fn is_footer_start(line: &str) -> bool {
    line.starts_with(FOOTER_PREFIX)
}

fn push_body_line(out: &mut Vec<String>, line: &str) {
    out.push(strip_inline_markup(line));
}

/// Inline scanning state within a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inline {
    Text,
    /// After `｜`, collecting an explicit ruby base.
    RubyBase,
    /// Inside `《…》`.
    RubyReading,
    /// Inside `［＃…］`; `depth` counts nested `［` outside of `「…」`,
    /// `quotes` counts open `「`.
    Annotation {
        depth: usize,
        quotes: usize,
        in_base: bool,
    },
}

/// Removes ruby readings and annotations from one line.
///
/// Constructs still open at the end of the line are emitted verbatim.
fn strip_inline_markup(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut state = Inline::Text;
    // Verbatim text of the open ruby base (with its bar) and its base characters.
    let mut base_raw = String::new();
    let mut base = String::new();
    // Verbatim text of the open reading or annotation.
    let mut span = String::new();

    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            Inline::Text => match c {
                RUBY_BAR => {
                    base_raw.clear();
                    base.clear();
                    base_raw.push(c);
                    state = Inline::RubyBase;
                }
                RUBY_OPEN => {
                    span.clear();
                    span.push(c);
                    state = Inline::RubyReading;
                }
                ANNOTATION_OPEN if chars.peek() == Some(&ANNOTATION_MARK) => {
                    span.clear();
                    span.push(c);
                    state = Inline::Annotation {
                        depth: 1,
                        quotes: 0,
                        in_base: false,
                    };
                }
                _ => out.push(c),
            },
            Inline::RubyBase => match c {
                RUBY_OPEN => {
                    out.push_str(&base);
                    span.clear();
                    span.push(c);
                    state = Inline::RubyReading;
                }
                RUBY_BAR => {
                    // The earlier bar never got a reading.
                    out.push_str(&base_raw);
                    base_raw.clear();
                    base.clear();
                    base_raw.push(c);
                }
                ANNOTATION_OPEN if chars.peek() == Some(&ANNOTATION_MARK) => {
                    span.clear();
                    span.push(c);
                    state = Inline::Annotation {
                        depth: 1,
                        quotes: 0,
                        in_base: true,
                    };
                }
                _ => {
                    base_raw.push(c);
                    base.push(c);
                }
            },
            Inline::RubyReading => {
                span.push(c);
                if c == RUBY_CLOSE {
                    span.clear();
                    state = Inline::Text;
                }
            }
            Inline::Annotation {
                depth,
                quotes,
                in_base,
            } => {
                span.push(c);
                let (depth, quotes) = match c {
                    QUOTE_OPEN => (depth, quotes + 1),
                    QUOTE_CLOSE => (depth, quotes.saturating_sub(1)),
                    ANNOTATION_OPEN if quotes == 0 => (depth + 1, quotes),
                    ANNOTATION_CLOSE if quotes == 0 => (depth - 1, quotes),
                    _ => (depth, quotes),
                };
                state = if depth == 0 {
                    span.clear();
                    if in_base { Inline::RubyBase } else { Inline::Text }
                } else {
                    Inline::Annotation {
                        depth,
                        quotes,
                        in_base,
                    }
                };
            }
        }
    }

    match state {
        Inline::Text => {}
        Inline::RubyBase => out.push_str(&base_raw),
        Inline::RubyReading => out.push_str(&span),
        Inline::Annotation { in_base, .. } => {
            if in_base {
                out.push_str(&base_raw);
            }
            out.push_str(&span);
        }
    }

    out
}
