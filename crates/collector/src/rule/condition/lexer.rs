//! 조건식 토크나이저

use std::fmt;

/// 조건식 토큰
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    /// 점으로 구분된 필드 경로 (`audiodiff.maxdiff` -> `["audiodiff", "maxdiff"]`)
    Path(Vec<String>),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    In,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Path(segments) => write!(f, "{}", segments.join(".")),
            Self::True => f.write_str("True"),
            Self::False => f.write_str("False"),
            Self::Null => f.write_str("None"),
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
            Self::Not => f.write_str("not"),
            Self::In => f.write_str("in"),
            Self::Eq => f.write_str("=="),
            Self::Ne => f.write_str("!="),
            Self::Lt => f.write_str("<"),
            Self::Le => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::Ge => f.write_str(">="),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Percent => f.write_str("%"),
            Self::Pow => f.write_str("**"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::LBracket => f.write_str("["),
            Self::RBracket => f.write_str("]"),
            Self::Comma => f.write_str(","),
        }
    }
}

/// 위치 정보가 붙은 토큰
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    /// 문자 단위 시작 위치
    pub offset: usize,
}

/// 조건식을 토큰 목록으로 분해합니다.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        let start = pos;

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        let token = match c {
            '(' => single(&mut pos, Token::LParen),
            ')' => single(&mut pos, Token::RParen),
            '[' => single(&mut pos, Token::LBracket),
            ']' => single(&mut pos, Token::RBracket),
            ',' => single(&mut pos, Token::Comma),
            '+' => single(&mut pos, Token::Plus),
            '-' => single(&mut pos, Token::Minus),
            '/' => single(&mut pos, Token::Slash),
            '%' => single(&mut pos, Token::Percent),
            '*' => {
                if chars.get(pos + 1) == Some(&'*') {
                    pos += 2;
                    Token::Pow
                } else {
                    single(&mut pos, Token::Star)
                }
            }
            '=' => {
                if chars.get(pos + 1) == Some(&'=') {
                    pos += 2;
                    Token::Eq
                } else {
                    return Err(format!("unexpected '=' at {start}, did you mean '=='?"));
                }
            }
            '!' => {
                if chars.get(pos + 1) == Some(&'=') {
                    pos += 2;
                    Token::Ne
                } else {
                    return Err(format!("unexpected '!' at {start}"));
                }
            }
            '<' => {
                if chars.get(pos + 1) == Some(&'=') {
                    pos += 2;
                    Token::Le
                } else {
                    single(&mut pos, Token::Lt)
                }
            }
            '>' => {
                if chars.get(pos + 1) == Some(&'=') {
                    pos += 2;
                    Token::Ge
                } else {
                    single(&mut pos, Token::Gt)
                }
            }
            '\'' | '"' => lex_string(&chars, &mut pos)?,
            c if c.is_ascii_digit() => lex_number(&chars, &mut pos)?,
            c if c.is_alphabetic() || c == '_' => lex_word(&chars, &mut pos)?,
            other => return Err(format!("unexpected character '{other}' at {start}")),
        };

        tokens.push(Spanned {
            token,
            offset: start,
        });
    }

    Ok(tokens)
}

fn single(pos: &mut usize, token: Token) -> Token {
    *pos += 1;
    token
}

fn lex_string(chars: &[char], pos: &mut usize) -> Result<Token, String> {
    let start = *pos;
    let quote = chars[*pos];
    *pos += 1;
    let mut value = String::new();

    while let Some(&c) = chars.get(*pos) {
        *pos += 1;
        match c {
            '\\' => {
                let escaped = chars
                    .get(*pos)
                    .ok_or_else(|| format!("unterminated string starting at {start}"))?;
                *pos += 1;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => *other,
                });
            }
            c if c == quote => return Ok(Token::Str(value)),
            c => value.push(c),
        }
    }

    Err(format!("unterminated string starting at {start}"))
}

fn lex_number(chars: &[char], pos: &mut usize) -> Result<Token, String> {
    let start = *pos;
    while chars.get(*pos).is_some_and(char::is_ascii_digit) {
        *pos += 1;
    }
    if chars.get(*pos) == Some(&'.') && chars.get(*pos + 1).is_some_and(char::is_ascii_digit) {
        *pos += 1;
        while chars.get(*pos).is_some_and(char::is_ascii_digit) {
            *pos += 1;
        }
    }
    if matches!(chars.get(*pos), Some('e' | 'E')) {
        let mut lookahead = *pos + 1;
        if matches!(chars.get(lookahead), Some('+' | '-')) {
            lookahead += 1;
        }
        if chars.get(lookahead).is_some_and(char::is_ascii_digit) {
            *pos = lookahead;
            while chars.get(*pos).is_some_and(char::is_ascii_digit) {
                *pos += 1;
            }
        }
    }

    let text: String = chars[start..*pos].iter().collect();
    text.parse::<f64>()
        .map(Token::Number)
        .map_err(|e| format!("invalid number '{text}' at {start}: {e}"))
}

fn lex_word(chars: &[char], pos: &mut usize) -> Result<Token, String> {
    let start = *pos;
    let mut segments = vec![read_segment(chars, pos)];

    // 점 뒤에 식별자나 배열 인덱스가 오면 경로로 이어짐
    while chars.get(*pos) == Some(&'.')
        && chars
            .get(*pos + 1)
            .is_some_and(|c| c.is_alphanumeric() || *c == '_')
    {
        *pos += 1;
        segments.push(read_segment(chars, pos));
    }

    if segments.len() > 1 {
        if segments.iter().any(|s| s.starts_with("__")) {
            return Err(format!("dunder access is not allowed at {start}"));
        }
        return Ok(Token::Path(segments));
    }

    let word = segments.remove(0);
    Ok(match word.as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "True" | "true" => Token::True,
        "False" | "false" => Token::False,
        "None" | "null" => Token::Null,
        w if w.starts_with("__") => {
            return Err(format!("dunder access is not allowed at {start}"));
        }
        _ => Token::Path(vec![word]),
    })
}

fn read_segment(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while chars
        .get(*pos)
        .is_some_and(|c| c.is_alphanumeric() || *c == '_')
    {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}
