// ABOUTME: Placeholder scanner that finds {{ ... }} spans and classifies them
// ABOUTME: Matches IF/FOR blocks to their closing tags with a depth counter

pub const OPEN: &str = "{{";
pub const CLOSE: &str = "}}";

/// WYSIWYG editors sometimes emit this entity in place of a plain space
const NBSP_ENTITY: &str = "&nbsp;";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Conditional,
    Loop,
    Assignment,
    Import,
    Pipeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    ElseIf,
    Else,
    EndIf,
    For,
    ElseFor,
    EndFor,
    Set,
    Import,
}

/// A single `{{ ... }}` tag
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub start: usize,
    pub end: usize,
    /// Normalized, trimmed text between the delimiters
    pub inner: String,
    pub keyword: Option<Keyword>,
    /// Text following the keyword (condition, loop header, assignment...)
    pub argument: String,
}

/// A classified placeholder. Block placeholders span their whole block.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub start: usize,
    pub end: usize,
    /// Raw source text of the span, used as the substitution key
    pub text: String,
    pub kind: DirectiveKind,
    /// Trimmed directive; for IF/FOR blocks the full normalized block text
    pub directive: String,
    /// An IF/FOR opener whose closing tag was never found
    pub unterminated: bool,
}

/// Check if a string contains anything that looks like a placeholder
pub fn has_placeholders(text: &str) -> bool {
    text.find(OPEN)
        .map(|start| text[start + OPEN.len()..].contains(CLOSE))
        .unwrap_or(false)
}

/// Collect every well-formed tag in order. An opening delimiter without a
/// closing one is skipped.
pub fn tags(text: &str) -> Vec<Tag> {
    let mut found = Vec::new();
    let mut offset = 0;

    while let Some(relative) = text[offset..].find(OPEN) {
        let start = offset + relative;
        let inner_start = start + OPEN.len();
        match text[inner_start..].find(CLOSE) {
            Some(relative_close) => {
                let inner_end = inner_start + relative_close;
                let end = inner_end + CLOSE.len();
                found.push(classify_tag(start, end, &text[inner_start..inner_end]));
                offset = end;
            }
            None => offset = inner_start,
        }
    }

    found
}

/// Scan a template into classified placeholders
pub fn scan(text: &str) -> Vec<Placeholder> {
    let tags = tags(text);
    let mut placeholders = Vec::new();
    let mut index = 0;

    while index < tags.len() {
        let tag = &tags[index];
        let block = match tag.keyword {
            Some(Keyword::If) => Some((DirectiveKind::Conditional, Keyword::If, Keyword::EndIf)),
            Some(Keyword::For) => Some((DirectiveKind::Loop, Keyword::For, Keyword::EndFor)),
            _ => None,
        };

        if let Some((kind, opener, closer)) = block {
            if let Some(close_index) = find_closing(&tags, index, opener, closer) {
                let end = tags[close_index].end;
                placeholders.push(Placeholder {
                    start: tag.start,
                    end,
                    text: text[tag.start..end].to_string(),
                    kind,
                    directive: normalize(&text[tag.start..end]).trim().to_string(),
                    unterminated: false,
                });
                index = close_index + 1;
                continue;
            }
        }

        let kind = match tag.keyword {
            Some(Keyword::If) => DirectiveKind::Conditional,
            Some(Keyword::For) => DirectiveKind::Loop,
            Some(Keyword::Set) => DirectiveKind::Assignment,
            Some(Keyword::Import) => DirectiveKind::Import,
            _ => DirectiveKind::Pipeline,
        };
        placeholders.push(Placeholder {
            start: tag.start,
            end: tag.end,
            text: text[tag.start..tag.end].to_string(),
            kind,
            directive: tag.inner.clone(),
            unterminated: block.is_some(),
        });
        index += 1;
    }

    placeholders
}

/// Index of the tag closing the block opened at `from`, counting nested
/// blocks of the same kind
pub fn find_closing(tags: &[Tag], from: usize, opener: Keyword, closer: Keyword) -> Option<usize> {
    let mut depth = 0usize;
    for (index, tag) in tags.iter().enumerate().skip(from) {
        if tag.keyword == Some(opener) {
            depth += 1;
        } else if tag.keyword == Some(closer) {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(index);
            }
        }
    }
    None
}

fn normalize(text: &str) -> String {
    text.replace(NBSP_ENTITY, " ")
}

fn classify_tag(start: usize, end: usize, raw_inner: &str) -> Tag {
    let inner = normalize(raw_inner)
        .trim_matches(|c: char| c.is_whitespace() || c == '{' || c == '}')
        .to_string();
    let (keyword, argument) = match parse_keyword(&inner) {
        Some((keyword, argument)) => (Some(keyword), argument.to_string()),
        None => (None, String::new()),
    };
    Tag {
        start,
        end,
        inner,
        keyword,
        argument,
    }
}

fn parse_keyword(inner: &str) -> Option<(Keyword, &str)> {
    if let Some(rest) = strip_word(inner, "elseif") {
        return Some((Keyword::ElseIf, rest));
    }
    if let Some(rest) = strip_word(inner, "else") {
        // "else if x" reads as "elseif x"
        if let Some(condition) = strip_word(rest, "if") {
            if !condition.is_empty() {
                return Some((Keyword::ElseIf, condition));
            }
        }
        return rest.is_empty().then_some((Keyword::Else, rest));
    }

    const BARE: [(&str, Keyword); 3] = [
        ("endif", Keyword::EndIf),
        ("elsefor", Keyword::ElseFor),
        ("endfor", Keyword::EndFor),
    ];
    for (word, keyword) in BARE {
        if let Some(rest) = strip_word(inner, word) {
            return rest.is_empty().then_some((keyword, rest));
        }
    }

    const WITH_ARGUMENT: [(&str, Keyword); 4] = [
        ("if", Keyword::If),
        ("for", Keyword::For),
        ("set", Keyword::Set),
        ("import", Keyword::Import),
    ];
    for (word, keyword) in WITH_ARGUMENT {
        if let Some(rest) = strip_word(inner, word) {
            return (!rest.is_empty()).then_some((keyword, rest));
        }
    }

    None
}

/// Strip a case-insensitive leading word that is followed by whitespace or
/// the end of the text, returning the trimmed remainder
fn strip_word<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let head = text.get(..word.len())?;
    if !head.eq_ignore_ascii_case(word) {
        return None;
    }
    let rest = &text[word.len()..];
    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}
