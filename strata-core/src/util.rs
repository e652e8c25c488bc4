pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

/// True for a bare `[A-Za-z_][A-Za-z0-9_]*` identifier.
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[macro_export]
macro_rules! possibly_parenthesized {
    ($buff:ident, $cond:expr, $v:expr) => {
        if $cond {
            $buff.push('(');
            $v;
            $buff.push(')');
        } else {
            $v;
        }
    };
}

pub fn char_boundary_before(value: &str, mut index: usize) -> usize {
    index = index.min(value.len());
    while !value.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        format_args!(
            "{}{}",
            &$query[..$crate::char_boundary_before(&$query, 497)].trim_end(),
            if $query.len() > 497 { "..." } else { "" },
        )
    };
}
