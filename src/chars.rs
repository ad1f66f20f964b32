//! Character classes shared by the scanner and the emitter.

pub(crate) fn is_alpha(ch: impl Into<Option<char>>) -> bool {
    let Some(ch) = ch.into() else {
        return false;
    };
    ch >= '0' && ch <= '9'
        || ch >= 'A' && ch <= 'Z'
        || ch >= 'a' && ch <= 'z'
        || ch == '_'
        || ch == '-'
}

pub(crate) fn is_ascii(ch: char) -> bool {
    ch.is_ascii()
}

pub(crate) fn is_printable(ch: char) -> bool {
    match ch {
        '\u{feff}' | '\u{fffe}' | '\u{ffff}' => false,
        '\x0a'
        | '\x20'..='\x7e'
        | '\u{0085}'
        | '\u{00a0}'..='\u{d7ff}'
        | '\u{e000}'..='\u{fffd}'
        | '\u{10000}'..='\u{10ffff}' => true,
        _ => false,
    }
}

pub(crate) fn is_bom(ch: char) -> bool {
    ch == '\u{feff}'
}

pub(crate) fn is_space(ch: impl Into<Option<char>>) -> bool {
    ch.into() == Some(' ')
}

pub(crate) fn is_tab(ch: impl Into<Option<char>>) -> bool {
    ch.into() == Some('\t')
}

pub(crate) fn is_blank(ch: impl Into<Option<char>>) -> bool {
    let ch = ch.into();
    is_space(ch) || is_tab(ch)
}

pub(crate) fn is_break(ch: impl Into<Option<char>>) -> bool {
    matches!(
        ch.into(),
        Some('\r' | '\n' | '\u{0085}' | '\u{2028}' | '\u{2029}')
    )
}

pub(crate) fn is_breakz(ch: impl Into<Option<char>>) -> bool {
    let ch = ch.into();
    ch.is_none() || is_break(ch)
}

pub(crate) fn is_blankz(ch: impl Into<Option<char>>) -> bool {
    let ch = ch.into();
    is_blank(ch) || is_breakz(ch)
}

/// Characters that may follow an anchor or alias name.
pub(crate) fn ends_anchor(ch: impl Into<Option<char>>) -> bool {
    let ch = ch.into();
    is_blankz(ch)
        || matches!(
            ch,
            Some('?' | ':' | ',' | ']' | '}' | '%' | '@' | '`')
        )
}
