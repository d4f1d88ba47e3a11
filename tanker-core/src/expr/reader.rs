use crate::{Error, Result};

/// Parsed form of the s-expression mini-language.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Sym(String),
    Str(String),
    Int(i64),
    Float(f64),
    Param(Placeholder),
    List(Vec<Ast>),
}

/// A `{…}` placeholder: `{}` consumes the next positional argument, `{2}`
/// indexes positional arguments, `{name.attr}` looks up a named argument
/// and traverses its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub key: String,
    pub path: Vec<String>,
}

impl Placeholder {
    fn parse(body: &str) -> Placeholder {
        let mut parts = body.split('.').map(str::to_string);
        let key = parts.next().unwrap_or_default();
        Placeholder {
            key,
            path: parts.collect(),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Word(String),
    Quoted(String),
    Param(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut body = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => body.push(escaped),
                            None => return Err(Error::parse("unterminated string escape")),
                        },
                        Some(c) if c == quote => {
                            // Doubled quote escapes itself.
                            if chars.peek() == Some(&quote) {
                                chars.next();
                                body.push(quote);
                            } else {
                                break;
                            }
                        }
                        Some(c) => body.push(c),
                        None => return Err(Error::parse("unterminated string literal")),
                    }
                }
                tokens.push(Token::Quoted(body));
            }
            '{' => {
                chars.next();
                let mut body = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => body.push(c),
                        None => return Err(Error::parse("unterminated `{` placeholder")),
                    }
                }
                tokens.push(Token::Param(body));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

/// Parse one complete expression; trailing tokens are an error.
pub fn parse(input: &str) -> Result<Ast> {
    let mut tokens = tokenize(input)?;
    tokens.reverse();
    let ast = read(&mut tokens)?;
    if !tokens.is_empty() {
        return Err(Error::parse(format!(
            "unexpected trailing input after expression: `{}`",
            input
        )));
    }
    Ok(ast)
}

fn read(tokens: &mut Vec<Token>) -> Result<Ast> {
    match tokens.pop() {
        None => Err(Error::parse("unexpected end of expression")),
        Some(Token::Open) => {
            let mut items = Vec::new();
            loop {
                match tokens.last() {
                    None => return Err(Error::parse("missing closing `)`")),
                    Some(Token::Close) => {
                        tokens.pop();
                        break;
                    }
                    _ => items.push(read(tokens)?),
                }
            }
            Ok(Ast::List(items))
        }
        Some(Token::Close) => Err(Error::parse("unexpected `)`")),
        Some(Token::Quoted(body)) => Ok(Ast::Str(body)),
        Some(Token::Param(body)) => Ok(Ast::Param(Placeholder::parse(&body))),
        Some(Token::Word(word)) => Ok(atom(word)),
    }
}

fn atom(word: String) -> Ast {
    if let Ok(int) = word.parse::<i64>() {
        return Ast::Int(int);
    }
    if let Ok(float) = word.parse::<f64>() {
        return Ast::Float(float);
    }
    Ast::Sym(word)
}
