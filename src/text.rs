//! Tokenizer capability and the default regex tokenizer for Reddit markdown.

use regex::Regex;
use std::sync::OnceLock;

/// Turns post text into sentences and word tokens.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
    fn split_sentences(&self, text: &str) -> Vec<String>;

    /// Sentences, each tokenized. Empty sentences are dropped.
    fn tokenize_sentences(&self, text: &str) -> Vec<Vec<String>> {
        self.split_sentences(text)
            .iter()
            .map(|s| self.tokenize(s))
            .filter(|words| !words.is_empty())
            .collect()
    }
}

/// Word runs (with inner apostrophes) and single punctuation marks.
/// Markdown is simplified first, see [`simplify_post`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleTokenizer;

static WORD_RE: OnceLock<Regex> = OnceLock::new();
static HEADING_RE: OnceLock<Regex> = OnceLock::new();
static NEWLINES_RE: OnceLock<Regex> = OnceLock::new();

fn word_re() -> &'static Regex {
    WORD_RE.get_or_init(|| Regex::new(r"\w+(?:['’]\w+)*|[^\w\s]").expect("static token pattern"))
}

/// Strip the markdown that carries no words and turn line structure into sentence breaks.
pub fn simplify_post(text: &str) -> String {
    let heading = HEADING_RE.get_or_init(|| Regex::new(r"#{2,}").expect("static heading pattern"));
    let newlines = NEWLINES_RE.get_or_init(|| Regex::new(r"\n+").expect("static newline pattern"));

    let mut s: String = text.chars().filter(|c| !matches!(c, '*' | '^' | '>' | '<')).collect();
    s = heading.replace_all(&s, "").into_owned();
    for junk in ["~~", "``", "--", "''"] {
        s = s.replace(junk, "");
    }
    s = s.replace('\t', " ");
    s = newlines.replace_all(&s, "\n").into_owned();
    s = s.replace(".\n", "\n").replace('\n', ". ").replace('\r', ". ");
    s.replace(":.", ": ")
}

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        word_re()
            .find_iter(&simplify_post(text))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn split_sentences(&self, text: &str) -> Vec<String> {
        let text = simplify_post(text);
        let mut out = Vec::new();
        let mut start = 0;
        let mut chars = text.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if matches!(c, '.' | '!' | '?') {
                if let Some(&(j, next)) = chars.peek() {
                    if next.is_whitespace() {
                        push_sentence(&mut out, &text[start..j]);
                        start = j;
                    }
                } else {
                    push_sentence(&mut out, &text[start..i + c.len_utf8()]);
                    start = text.len();
                }
            }
        }
        if start < text.len() {
            push_sentence(&mut out, &text[start..]);
        }
        out
    }
}

fn push_sentence(out: &mut Vec<String>, s: &str) {
    let s = s.trim();
    // a lone "." left over from collapsed newlines is not a sentence
    if !s.is_empty() && s.chars().any(|c| c.is_alphanumeric()) {
        out.push(s.to_string());
    }
}

/// Flatten text so it fits in one tab-separated field.
pub fn one_line(text: &str) -> String {
    text.split(|c: char| c == '\t' || c == '\n' || c == '\r')
        .filter(|p| !p.trim().is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(". ")
}
