//! Literal decoding and source-text helpers used by the AST builder.

pub(crate) fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_inline_space(c: char) -> bool {
    matches!(
        c,
        ' ' | '\t' | '\u{000B}' | '\u{000C}' | '\u{00A0}' | '\u{FEFF}'
    )
}

/// True when a line terminator separates `pos` from the previous token,
/// looking through whitespace and comments. A line comment always ends in one.
pub(crate) fn preceded_by_line_terminator(script: &str, pos: usize) -> bool {
    let mut before = match script.get(..pos) {
        Some(s) => s,
        None => return false,
    };
    loop {
        let trimmed = before.trim_end_matches(is_inline_space);
        match trimmed.chars().last() {
            Some(c) if is_line_terminator(c) => return true,
            _ => {}
        }
        if !trimmed.ends_with("*/") {
            return false;
        }
        match trimmed[..trimmed.len() - 2].rfind("/*") {
            Some(start) => {
                if trimmed[start..].chars().any(is_line_terminator) {
                    return true;
                }
                before = &trimmed[..start];
            }
            None => return false,
        }
    }
}

/// Parses the text of a `numeric_literal` token.
pub(crate) fn parse_numeric_literal(text: &str) -> Option<f64> {
    let radix_digits = |digits: &str, radix: u32| -> Option<f64> {
        digits.chars().try_fold(0f64, |acc, c| {
            c.to_digit(radix).map(|d| acc * radix as f64 + d as f64)
        })
    };
    let lower = text.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return radix_digits(hex, 16);
    }
    if let Some(bin) = lower.strip_prefix("0b") {
        return radix_digits(bin, 2);
    }
    if let Some(oct) = lower.strip_prefix("0o") {
        return radix_digits(oct, 8);
    }
    let mut normalized = lower.replace(".e", ".0e");
    if normalized.starts_with('.') {
        normalized.insert(0, '0');
    }
    if normalized.ends_with('.') {
        normalized.push('0');
    }
    normalized.parse::<f64>().ok()
}

/// Decodes the escape sequences inside the body of a string literal.
pub(crate) fn unescape_string_literal(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next() {
            Some(e) => e,
            None => return Err("Invalid or unexpected token".to_string()),
        };
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'v' => out.push('\u{000B}'),
            '0' if !chars.peek().map_or(false, |n| n.is_ascii_digit()) => out.push('\0'),
            'x' => {
                let code = read_hex_digits(&mut chars, 2)?;
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            'u' => {
                let code = read_unicode_escape(&mut chars)?;
                if (0xD800..0xDC00).contains(&code) {
                    // A high surrogate only forms a character with a following `\uDC00`-`\uDFFF`.
                    let mut lookahead = chars.clone();
                    let low = match (lookahead.next(), lookahead.next()) {
                        (Some('\\'), Some('u')) => read_unicode_escape(&mut lookahead).ok(),
                        _ => None,
                    };
                    match low {
                        Some(low) if (0xDC00..0xE000).contains(&low) => {
                            let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                            out.push(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                            chars = lookahead;
                        }
                        _ => out.push('\u{FFFD}'),
                    }
                } else {
                    out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                }
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
    }
    Ok(out)
}

fn read_hex_digits(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    count: usize,
) -> Result<u32, String> {
    let mut code = 0u32;
    for _ in 0..count {
        match chars.next().and_then(|c| c.to_digit(16)) {
            Some(d) => code = code * 16 + d,
            None => return Err("Invalid hexadecimal escape sequence".to_string()),
        }
    }
    Ok(code)
}

fn read_unicode_escape(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<u32, String> {
    if chars.peek() != Some(&'{') {
        return read_hex_digits(chars, 4);
    }
    chars.next();
    let mut code = 0u32;
    let mut digits = 0;
    loop {
        match chars.next() {
            Some('}') if digits > 0 => break,
            Some(c) => match c.to_digit(16) {
                Some(d) if code <= 0x10FFFF => {
                    code = code * 16 + d;
                    digits += 1;
                }
                _ => return Err("Invalid Unicode escape sequence".to_string()),
            },
            None => return Err("Invalid Unicode escape sequence".to_string()),
        }
    }
    if code > 0x10FFFF {
        return Err("Undefined Unicode code-point".to_string());
    }
    Ok(code)
}

/// Deepest syntactic nesting a script may have before it is parsed.
pub(crate) const MAX_NESTING_DEPTH: usize = 256;

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// Lexical upper bound on how deeply the grammar will recurse into `script`.
///
/// Every open bracket is one level. Within a level, prefix operators, prefix
/// keywords, statement keywords and right-associative operators (`=`, `?`,
/// `=>`, `**`) each add one until the expression they start is over, which is
/// taken to be at `;`, `,`, the end of a line that follows an operand, or the
/// start of a new statement after a block. Strings and comments are skipped.
///
/// Returns the byte offset at which the bound first exceeds `limit`.
pub(crate) fn find_excessive_nesting(script: &str, limit: usize) -> Option<usize> {
    let bytes = script.as_bytes();
    // Pending weight of every enclosing level, and whether it is the
    // parenthesized header of `if`, `while` or `for`.
    let mut open: Vec<(usize, bool)> = Vec::new();
    let mut enclosing = 0usize;
    let mut pending = 0usize;
    let mut after_operand = false;
    let mut after_block = false;
    let mut after_header = false;
    let mut after_control_keyword = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\r' | 0x0B | 0x0C => {
                i += 1;
                continue;
            }
            b'\n' => {
                if after_operand && !after_header && !after_block {
                    pending = 0;
                }
                i += 1;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = script[i + 2..].find("*/").map_or(bytes.len(), |e| i + 2 + e + 2);
                if script[i..end].contains('\n') && after_operand && !after_header && !after_block {
                    pending = 0;
                }
                i = end;
                continue;
            }
            _ => {}
        }

        let block_ended = std::mem::replace(&mut after_block, false);
        let control_keyword = std::mem::replace(&mut after_control_keyword, false);
        after_header = false;

        match b {
            b'\'' | b'"' => {
                if block_ended {
                    pending = 0;
                }
                i += 1;
                while i < bytes.len() && bytes[i] != b && bytes[i] != b'\n' {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                i += 1;
                after_operand = true;
                continue;
            }
            _ if is_word_byte(b) => {
                let start = i;
                while i < bytes.len() && (is_word_byte(bytes[i]) || (bytes[start].is_ascii_digit() && bytes[i] == b'.')) {
                    i += 1;
                }
                let word = &script[start..i];
                if block_ended && !matches!(word, "else" | "while" | "catch" | "finally" | "in" | "instanceof") {
                    pending = 0;
                }
                match word {
                    "if" | "while" | "for" => {
                        pending += 1;
                        after_operand = false;
                        after_control_keyword = true;
                    }
                    "else" | "do" | "new" | "typeof" | "void" | "delete" => {
                        pending += 1;
                        after_operand = false;
                    }
                    "in" | "instanceof" | "return" | "throw" | "case" => after_operand = false,
                    _ => after_operand = true,
                }
            }
            b'(' | b'[' | b'{' => {
                if block_ended && b == b'{' {
                    pending = 0;
                }
                open.push((pending, b == b'(' && control_keyword));
                enclosing += pending;
                pending = 0;
                after_operand = false;
                i += 1;
            }
            b')' | b']' | b'}' => {
                if let Some((saved, header)) = open.pop() {
                    enclosing -= saved;
                    pending = saved;
                    after_header = header;
                }
                after_operand = true;
                after_block = b == b'}';
                i += 1;
            }
            b';' | b',' => {
                pending = 0;
                after_operand = false;
                i += 1;
            }
            b'?' => {
                match bytes.get(i + 1) {
                    Some(b'?') | Some(b'.') => i += 2,
                    _ => {
                        pending += 1;
                        i += 1;
                    }
                }
                after_operand = false;
            }
            b'=' => {
                match bytes.get(i + 1) {
                    Some(b'=') => {
                        while i < bytes.len() && bytes[i] == b'=' {
                            i += 1;
                        }
                    }
                    Some(b'>') => {
                        pending += 1;
                        i += 2;
                    }
                    _ => {
                        pending += 1;
                        i += 1;
                    }
                }
                after_operand = false;
            }
            b'*' if bytes.get(i + 1) == Some(&b'*') => {
                pending += 1;
                after_operand = false;
                i += 2;
            }
            b'!' | b'<' | b'>' if bytes.get(i + 1) == Some(&b'=') => {
                while i + 1 < bytes.len() && bytes[i + 1] == b'=' {
                    i += 1;
                }
                after_operand = false;
                i += 1;
            }
            b'!' | b'~' => {
                pending += 1;
                after_operand = false;
                i += 1;
            }
            b'+' | b'-' => {
                let doubled = bytes.get(i + 1) == Some(&b);
                if after_operand && doubled {
                    // Postfix update; the operand continues.
                    i += 2;
                } else if after_operand {
                    after_operand = false;
                    i += 1;
                } else {
                    pending += 1;
                    i += if doubled { 2 } else { 1 };
                }
            }
            _ => {
                after_operand = false;
                i += 1;
            }
        }

        if open.len() + enclosing + pending > limit {
            return Some(i.min(bytes.len()).saturating_sub(1));
        }
    }
    None
}
