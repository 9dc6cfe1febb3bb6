//! Tokenizer for `!mcp` command arguments.
//!
//! Tokens are separated by whitespace. Double or single quotes group text
//! containing spaces, and a token whose unquoted prefix is an identifier
//! followed by `=` may be a named argument; binding decides, since plain
//! values such as base64 keys can look the same.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Positional(String),
    Named { name: String, value: String },
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut text = String::new();
        let mut name: Option<String> = None;
        let mut quoted_before_eq = false;

        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();
            match c {
                '"' | '\'' => {
                    let quote = c;
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == quote {
                            closed = true;
                            break;
                        }
                        text.push(inner);
                    }
                    if !closed {
                        return Err(format!("Unclosed quote ({quote}) in command arguments."));
                    }
                    if name.is_none() {
                        quoted_before_eq = true;
                    }
                }
                '=' if name.is_none() && !quoted_before_eq && is_identifier(&text) => {
                    name = Some(std::mem::take(&mut text));
                }
                _ => text.push(c),
            }
        }

        tokens.push(match name {
            Some(name) => Token::Named { name, value: text },
            None => Token::Positional(text),
        });
    }

    Ok(tokens)
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
