//! Mustache-style interpolation over string variables.
//!
//! Supports `{{ name }}` (HTML-escaped), `{{{ name }}}` and `{{& name }}`
//! (raw), `{{! comment }}`, and `{{# name }}`/`{{^ name }}` sections closed by
//! `{{/ name }}`. Variables are strings, so a section renders when its value is
//! non-empty and an inverted section when it is empty. Unknown names render as
//! empty strings and an unterminated tag is emitted as literal text.
//!
//! Partials and delimiter changes are not supported; [`validate`] rejects them
//! along with unbalanced sections.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Escaped(&'a str),
    Raw(&'a str),
    Section(&'a str),
    Inverted(&'a str),
    Close(&'a str),
    Partial(&'a str),
    Delimiters,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed section \"{0}\"")]
    UnclosedSection(String),
    #[error("unexpected closing tag \"{0}\"")]
    UnexpectedClose(String),
    #[error("partials are not supported: \"{0}\"")]
    UnsupportedPartial(String),
    #[error("delimiter changes are not supported")]
    UnsupportedDelimiters,
}

pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let tokens = tokenize(template);
    let mut output = String::with_capacity(template.len());
    render_tokens(&tokens, vars, &mut output);
    output
}

/// Checks that `template` only uses supported tags and that sections balance.
pub fn validate(template: &str) -> Result<(), TemplateError> {
    let mut open: Vec<&str> = Vec::new();

    for token in tokenize(template) {
        match token {
            Token::Section(name) | Token::Inverted(name) => open.push(name),
            Token::Close(name) => {
                if open.pop() != Some(name) {
                    return Err(TemplateError::UnexpectedClose(name.to_string()));
                }
            }
            Token::Partial(name) => {
                return Err(TemplateError::UnsupportedPartial(name.to_string()));
            }
            Token::Delimiters => return Err(TemplateError::UnsupportedDelimiters),
            Token::Text(_) | Token::Escaped(_) | Token::Raw(_) => {}
        }
    }

    match open.pop() {
        Some(name) => Err(TemplateError::UnclosedSection(name.to_string())),
        None => Ok(()),
    }
}

fn tokenize(template: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Text(&rest[..start]));
        }
        let tag_start = &rest[start..];

        if let Some(inner) = tag_start.strip_prefix("{{{") {
            let Some(end) = inner.find("}}}") else {
                tokens.push(Token::Text(tag_start));
                return tokens;
            };
            tokens.push(Token::Raw(inner[..end].trim()));
            rest = &inner[end + 3..];
            continue;
        }

        let inner = &tag_start[2..];
        let Some(end) = inner.find("}}") else {
            tokens.push(Token::Text(tag_start));
            return tokens;
        };
        rest = &inner[end + 2..];

        let tag = inner[..end].trim();
        let mut chars = tag.chars();
        let sigil = chars.next();
        let name = chars.as_str().trim();
        match sigil {
            Some('!') => {}
            Some('&') => tokens.push(Token::Raw(name)),
            Some('#') => tokens.push(Token::Section(name)),
            Some('^') => tokens.push(Token::Inverted(name)),
            Some('/') => tokens.push(Token::Close(name)),
            Some('>') => tokens.push(Token::Partial(name)),
            Some('=') => tokens.push(Token::Delimiters),
            _ => tokens.push(Token::Escaped(tag)),
        }
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    tokens
}

fn render_tokens(tokens: &[Token<'_>], vars: &[(&str, &str)], output: &mut String) {
    let lookup = |name: &str| {
        vars.iter()
            .find(|(key, _)| *key == name)
            .map_or("", |(_, value)| *value)
    };

    let mut index = 0;
    while index < tokens.len() {
        match tokens[index] {
            Token::Text(text) => output.push_str(text),
            Token::Escaped(name) => push_escaped(output, lookup(name)),
            Token::Raw(name) => output.push_str(lookup(name)),
            Token::Section(name) | Token::Inverted(name) => {
                let close = closing_index(tokens, index);
                let inverted = matches!(tokens[index], Token::Inverted(_));
                if lookup(name).is_empty() == inverted {
                    render_tokens(&tokens[index + 1..close], vars, output);
                }
                index = close;
            }
            // Stray closes, partials without a registry and delimiter changes
            // render nothing.
            Token::Close(_) | Token::Partial(_) | Token::Delimiters => {}
        }
        index += 1;
    }
}

// Index of the close tag matching the section opened at `open`, or the end of
// `tokens` when it is never closed.
fn closing_index(tokens: &[Token<'_>], open: usize) -> usize {
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::Section(_) | Token::Inverted(_) => depth += 1,
            Token::Close(_) => {
                depth -= 1;
                if depth == 0 {
                    return index;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

fn push_escaped(output: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            '/' => output.push_str("&#x2F;"),
            '`' => output.push_str("&#x60;"),
            '=' => output.push_str("&#x3D;"),
            other => output.push(other),
        }
    }
}
