use std::cmp::min;
use syn::{GenericArgument, Path, PathArguments, Type};

pub fn matches_path(path: &Path, expect: &[&str]) -> bool {
    let len = min(path.segments.len(), expect.len());
    path.segments
        .iter()
        .rev()
        .take(len)
        .map(|v| &v.ident)
        .eq(expect.iter().rev().take(len))
}

/// The `T` of `Wrapper<T>` when `ty` is a path type whose last segment is `wrapper`.
pub fn inner_type<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    if !matches_path(&path.path, &[wrapper]) {
        return None;
    }
    let PathArguments::AngleBracketed(arguments) = &path.path.segments.last()?.arguments else {
        return None;
    };
    arguments.args.iter().find_map(|v| match v {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}
