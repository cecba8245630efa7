// Word tokenization for mixed CJK and alphabetic text.
//
// Logographic characters become one token each; alphabetic runs become one
// token per word. Punctuation is split off into its own token so that
// sentence boundaries can be detected without losing its timestamp.

use std::collections::HashSet;

use super::grapheme::GraphemeCluster;
use crate::alignment::TimedChar;

const CJK_PUNCTUATION: &[char] = &[
    '。', '，', '！', '？', '、', '；', '：', '“', '”', '‘', '’', '（', '）', '…', '—', '·', '《', '》', '〈', '〉',
];

/// A word-like unit with the timing of its first and last character.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// True inside the CJK Unified Ideographs block (U+4E00..=U+9FFF).
pub fn is_cjk(ch: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&ch)
}

/// First character of `s` is CJK; empty strings are not.
pub fn starts_with_cjk(s: &str) -> bool {
    s.chars().next().is_some_and(is_cjk)
}

fn ends_with_cjk(s: &str) -> bool {
    s.chars().next_back().is_some_and(is_cjk)
}

/// ASCII punctuation plus the common full-width CJK marks.
pub fn is_punctuation(ch: char) -> bool {
    ch.is_ascii_punctuation() || CJK_PUNCTUATION.contains(&ch)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Punctuation,
    Cjk,
    Space,
    Word,
}

fn classify(ch: char) -> CharClass {
    if is_punctuation(ch) {
        CharClass::Punctuation
    } else if is_cjk(ch) {
        CharClass::Cjk
    } else if ch.is_whitespace() {
        CharClass::Space
    } else {
        CharClass::Word
    }
}

#[derive(Default)]
struct Run {
    text: String,
    start: f64,
    end: f64,
}

impl Run {
    fn push(&mut self, text: &str, start: f64, end: f64) {
        if self.text.is_empty() {
            self.start = start;
        }
        self.text.push_str(text);
        self.end = end;
    }

    fn flush_into(&mut self, tokens: &mut Vec<Token>) {
        if !self.text.is_empty() {
            tokens.push(Token {
                text: std::mem::take(&mut self.text),
                start: self.start,
                end: self.end,
            });
        }
    }
}

/// Splits timed grapheme clusters into tokens in a single left-to-right scan.
/// Each cluster is classified by its base character.
pub fn tokenize(units: &[GraphemeCluster]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut run = Run::default();

    for unit in units {
        let Some(base) = unit.base() else {
            continue;
        };

        match classify(base) {
            CharClass::Punctuation | CharClass::Cjk => {
                run.flush_into(&mut tokens);
                tokens.push(Token {
                    text: unit.text.clone(),
                    start: unit.start,
                    end: unit.end,
                });
            }
            CharClass::Space => run.flush_into(&mut tokens),
            CharClass::Word => run.push(&unit.text, unit.start, unit.end),
        }
    }

    run.flush_into(&mut tokens);
    tokens
}

/// [`tokenize`] over plain timed characters, one unit per character.
pub fn tokenize_chars(chars: &[TimedChar]) -> Vec<Token> {
    let units: Vec<GraphemeCluster> = chars
        .iter()
        .map(|c| GraphemeCluster {
            text: c.ch.to_string(),
            start: c.start,
            end: c.end,
        })
        .collect();
    tokenize(&units)
}

/// Joins tokens into display text.
///
/// Punctuation is stripped and whitespace collapsed; tokens that end up empty
/// are dropped. Neighbours are separated by a space only when neither side is
/// CJK.
pub fn smart_join(tokens: &[Token]) -> String {
    let mut result = String::new();
    let mut prev: Option<String> = None;

    for token in tokens {
        let stripped: String = token.text.chars().filter(|c| !is_punctuation(*c)).collect();
        let cleaned = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.is_empty() {
            continue;
        }

        if let Some(p) = &prev {
            if !ends_with_cjk(p) && !starts_with_cjk(&cleaned) {
                result.push(' ');
            }
        }
        result.push_str(&cleaned);
        prev = Some(cleaned);
    }

    result
}

/// Greedy grouping of tokens into subtitle lines.
///
/// A group closes when it reaches `words_per_line`, when the token contains a
/// sentence ender, when the silence before the next token reaches
/// `pause_threshold`, or at the last token.
pub fn group_words(
    tokens: &[Token],
    words_per_line: usize,
    sentence_enders: &HashSet<String>,
    pause_threshold: f64,
) -> Vec<Vec<Token>> {
    let words_per_line = words_per_line.max(1);
    let mut groups = Vec::new();
    let mut current: Vec<Token> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        current.push(token.clone());

        let is_limit_reached = current.len() >= words_per_line;
        let is_sentence_end = sentence_enders
            .iter()
            .any(|ender| !ender.is_empty() && token.text.contains(ender.as_str()));
        let is_pause = tokens
            .get(i + 1)
            .is_some_and(|next| next.start - token.end >= pause_threshold);
        let is_last = i + 1 == tokens.len();

        if is_limit_reached || is_sentence_end || is_pause || is_last {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(text: &str, step: f64) -> Vec<TimedChar> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| TimedChar {
                ch,
                start: i as f64 * step,
                end: (i + 1) as f64 * step,
            })
            .collect()
    }

    fn enders(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_is_cjk_range() {
        assert!(is_cjk('\u{4E00}'));
        assert!(is_cjk('中'));
        assert!(is_cjk('\u{9FFF}'));
        assert!(!is_cjk('\u{4DFF}'));
        assert!(!is_cjk('\u{A000}'));
        assert!(!is_cjk('あ'));
        for ch in ('a'..='z').chain('A'..='Z') {
            assert!(!is_cjk(ch));
        }
        assert!(!starts_with_cjk(""));
    }

    #[test]
    fn test_is_cjk_whole_block() {
        for code in 0x4E00u32..=0x9FFF {
            let ch = char::from_u32(code).unwrap();
            assert!(is_cjk(ch), "U+{:04X}", code);
            assert_eq!(is_cjk(ch), is_cjk(ch));
        }
    }

    #[test]
    fn test_tokenize_mixed_text() {
        let tokens = tokenize_chars(&uniform("中文 hi, ok", 0.1));
        assert_eq!(texts(&tokens), vec!["中", "文", "hi", ",", "ok"]);

        // "hi" spans characters 3..=4
        assert!((tokens[2].start - 0.3).abs() < 1e-9);
        assert!((tokens[2].end - 0.5).abs() < 1e-9);
        // punctuation keeps its own timestamp
        assert!((tokens[3].start - 0.5).abs() < 1e-9);
        // last word flushed at the end of input
        assert!((tokens[4].end - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_tokenize_cjk_punctuation() {
        let tokens = tokenize_chars(&uniform("你好。再见！", 0.1));
        assert_eq!(texts(&tokens), vec!["你", "好", "。", "再", "见", "！"]);
    }

    #[test]
    fn test_ascii_apostrophe_and_period_split_words() {
        // every ASCII punctuation mark is its own token, even inside a word
        let tokens = tokenize_chars(&uniform("don't 3.5", 0.1));
        assert_eq!(texts(&tokens), vec!["don", "'", "t", "3", ".", "5"]);
        assert_eq!(smart_join(&tokens), "don t 3 5");
    }

    #[test]
    fn test_tokenize_whitespace_only() {
        assert!(tokenize_chars(&uniform("   \n ", 0.1)).is_empty());
        assert!(tokenize_chars(&[]).is_empty());
    }

    #[test]
    fn test_tokenize_keeps_clusters_whole() {
        let units = vec![
            GraphemeCluster { text: "e\u{0301}".into(), start: 0.0, end: 0.2 },
            GraphemeCluster { text: "t".into(), start: 0.2, end: 0.3 },
            GraphemeCluster { text: "e\u{0301}".into(), start: 0.3, end: 0.5 },
        ];
        let tokens = tokenize(&units);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "e\u{0301}te\u{0301}");
        assert_eq!(tokens[0].end, 0.5);
    }

    #[test]
    fn test_smart_join_spacing() {
        let tokens = tokenize_chars(&uniform("中文 hello world.", 0.1));
        assert_eq!(smart_join(&tokens), "中文hello world");

        let tokens = tokenize_chars(&uniform("hello 世界", 0.1));
        assert_eq!(smart_join(&tokens), "hello世界");
    }

    #[test]
    fn test_smart_join_drops_punctuation_only_tokens() {
        let tokens = vec![
            Token { text: "“".into(), start: 0.0, end: 0.1 },
            Token { text: "Hi,".into(), start: 0.1, end: 0.2 },
            Token { text: "...".into(), start: 0.2, end: 0.3 },
            Token { text: "you".into(), start: 0.3, end: 0.4 },
        ];
        assert_eq!(smart_join(&tokens), "Hi you");
        assert_eq!(smart_join(&[]), "");
    }

    #[test]
    fn test_group_words_cap() {
        let tokens = tokenize_chars(&uniform("一二三四五六七八九十", 0.1));
        let groups = group_words(&tokens, 3, &HashSet::new(), 0.2);
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
    }

    #[test]
    fn test_group_words_sentence_end_and_pause() {
        let mut tokens = tokenize_chars(&uniform("a b. c d e", 0.1));
        // silence before "e"
        let last = tokens.len() - 1;
        tokens[last].start += 1.0;
        tokens[last].end += 1.0;

        let groups = group_words(&tokens, 10, &enders(&["."]), 0.2);
        let joined: Vec<String> = groups.iter().map(|g| smart_join(g)).collect();
        assert_eq!(joined, vec!["a b", "c d", "e"]);
    }
}
