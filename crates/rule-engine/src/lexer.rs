//! 规则表达式词法分析

use crate::error::{Result, RuleError};
use crate::operators::Comparator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Integer(i64),
    Str(String),
    And,
    Or,
    Compare(Comparator),
    OpenParen,
    CloseParen,
    Comma,
    Eof,
}

/// 带起始位置（字节偏移）的词法单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// 将归一化后的表达式切分为词法单元，末尾追加 Eof
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let kind = match c {
            '(' => {
                chars.next();
                TokenKind::OpenParen
            }
            ')' => {
                chars.next();
                TokenKind::CloseParen
            }
            ',' => {
                chars.next();
                TokenKind::Comma
            }
            '>' | '<' | '=' | '!' => {
                chars.next();
                let symbol = match chars.peek() {
                    Some(&(_, '=')) => {
                        chars.next();
                        format!("{}=", c)
                    }
                    _ => c.to_string(),
                };
                let cmp = Comparator::from_symbol(&symbol).ok_or_else(|| {
                    RuleError::syntax(pos, format!("无法识别的操作符 '{}'", symbol))
                })?;
                TokenKind::Compare(cmp)
            }
            '\'' | '"' => {
                chars.next();
                TokenKind::Str(read_string(&mut chars, c, pos)?)
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Some(&(next_pos, next)) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '.' {
                        return Err(RuleError::syntax(
                            next_pos,
                            format!("数字常量后出现非法字符 '{}'", next),
                        ));
                    }
                }
                let value = digits.parse::<i64>().map_err(|_| {
                    RuleError::syntax(pos, format!("整数常量超出范围: {}", digits))
                })?;
                TokenKind::Integer(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match ident.as_str() {
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    _ => TokenKind::Ident(ident),
                }
            }
            other => {
                return Err(RuleError::syntax(pos, format!("非法字符 '{}'", other)));
            }
        };

        tokens.push(Token {
            kind,
            position: pos,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: input.len(),
    });

    Ok(tokens)
}

/// 读取引号内的字符串内容，起始引号已被消费
fn read_string<I>(chars: &mut std::iter::Peekable<I>, quote: char, start: usize) -> Result<String>
where
    I: Iterator<Item = (usize, char)>,
{
    let mut value = String::new();

    loop {
        match chars.next() {
            None | Some((_, '\n')) => {
                return Err(RuleError::syntax(start, "字符串常量未闭合"));
            }
            Some((_, c)) if c == quote => return Ok(value),
            Some((_, '\\')) => match chars.next() {
                None => return Err(RuleError::syntax(start, "字符串常量未闭合")),
                Some((_, '\n')) => {}
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, e @ ('\\' | '\'' | '"'))) => value.push(e),
                // 未知转义保留反斜杠
                Some((_, e)) => {
                    value.push('\\');
                    value.push(e);
                }
            },
            Some((_, c)) => value.push(c),
        }
    }
}
