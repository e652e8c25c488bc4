use crate::util::inner_type;
use quote::ToTokens;
use syn::{Field, Ident, LitStr, Type, parse::ParseBuffer};

pub(crate) struct ColumnMetadata {
    pub(crate) ident: Ident,
    pub(crate) ty: Type,
    pub(crate) name: String,
    pub(crate) nullable: bool,
    pub(crate) primary_key: bool,
    pub(crate) unique: bool,
    pub(crate) auto_increment: bool,
    pub(crate) passive: bool,
}

pub(crate) struct AssociationMetadata {
    pub(crate) ident: Ident,
    pub(crate) name: String,
    pub(crate) child: Type,
    pub(crate) foreign_key: String,
}

pub(crate) enum FieldMetadata {
    Column(ColumnMetadata),
    Association(AssociationMetadata),
}

pub fn decode_column(field: &Field) -> FieldMetadata {
    let ident = field
        .ident
        .clone()
        .expect("Field is expected to have a name");
    let mut name = ident.to_string();
    if name.starts_with('_') {
        name.remove(0);
    }
    let passive = inner_type(&field.ty, "Passive");
    let nullable = inner_type(passive.unwrap_or(&field.ty), "Option").is_some();
    let association = inner_type(&field.ty, "Association");
    let mut metadata = ColumnMetadata {
        ident: ident.clone(),
        ty: field.ty.clone(),
        name,
        nullable,
        primary_key: false,
        unique: false,
        auto_increment: false,
        passive: passive.is_some(),
    };
    let mut foreign_key = None;
    for attr in &field.attrs {
        let meta = &attr.meta;
        if meta.path().is_ident("strata") {
            let Ok(list) = meta.require_list() else {
                panic!(
                    "Error while parsing `strata`, use it like: `#[strata(attribute = value, ...)]`",
                );
            };
            let _ = list.parse_nested_meta(|arg| {
                if arg.path.is_ident("name") {
                    let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                        panic!("Error while parsing `name`, use it like: `#[strata(name = \"my_column\")]`");
                    };
                    metadata.name = v.value();
                } else if arg.path.is_ident("primary_key") {
                    let Err(..) = arg.value() else {
                        // value() is Err for Meta::Path
                        panic!("Error while parsing `primary_key`, use it like: `#[strata(primary_key)]`");
                    };
                    metadata.primary_key = true;
                    metadata.nullable = false;
                } else if arg.path.is_ident("unique") {
                    let Err(..) = arg.value() else {
                        panic!("Error while parsing `unique`, use it like: `#[strata(unique)]`");
                    };
                    metadata.unique = true;
                } else if arg.path.is_ident("auto_increment") {
                    let Err(..) = arg.value() else {
                        panic!("Error while parsing `auto_increment`, use it like: `#[strata(auto_increment)]`");
                    };
                    metadata.auto_increment = true;
                } else if arg.path.is_ident("foreign_key") {
                    let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                        panic!("Error while parsing `foreign_key`, use it like: `#[strata(foreign_key = \"parent_id\")]`");
                    };
                    foreign_key = Some(v.value());
                } else {
                    panic!(
                        "Unknown attribute `{}` inside strata macro",
                        arg.path.to_token_stream().to_string()
                    );
                }
                Ok(())
            });
        }
    }
    match (association, foreign_key) {
        (Some(child), Some(foreign_key)) => FieldMetadata::Association(AssociationMetadata {
            ident,
            name: metadata.name,
            child: child.clone(),
            foreign_key,
        }),
        (Some(..), None) => panic!(
            "Association `{}` needs its foreign key, use it like: `#[strata(foreign_key = \"parent_id\")]`",
            metadata.name
        ),
        (None, Some(..)) => panic!(
            "`foreign_key` only applies to `Association<T>` fields, `{}` is a column",
            metadata.name
        ),
        (None, None) => FieldMetadata::Column(metadata),
    }
}
