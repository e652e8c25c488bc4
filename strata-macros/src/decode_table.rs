use crate::decode_column::{AssociationMetadata, ColumnMetadata, FieldMetadata, decode_column};
use convert_case::{Case, Casing};
use quote::ToTokens;
use syn::{ItemStruct, LitStr, parse::ParseBuffer};

pub(crate) struct TableMetadata {
    pub(crate) item: ItemStruct,
    pub(crate) name: String,
    pub(crate) columns: Vec<ColumnMetadata>,
    pub(crate) associations: Vec<AssociationMetadata>,
    /// The struct implements `strata::Hooks` by hand.
    pub(crate) hooks: bool,
}

impl TableMetadata {
    /// The first column declared as primary key, the registry rejects the others.
    pub(crate) fn primary_key(&self) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.primary_key)
    }
}

pub fn decode_table(item: ItemStruct) -> TableMetadata {
    let mut columns = Vec::new();
    let mut associations = Vec::new();
    for field in &item.fields {
        match decode_column(field) {
            FieldMetadata::Column(v) => columns.push(v),
            FieldMetadata::Association(v) => associations.push(v),
        }
    }
    let mut name = item.ident.to_string().to_case(Case::Snake);
    if name.starts_with('_') {
        name.remove(0);
    }
    let mut hooks = false;
    for attr in &item.attrs {
        let meta = &attr.meta;
        if meta.path().is_ident("strata") {
            let Ok(list) = meta.require_list() else {
                panic!("Error while parsing `strata`, use it like: `#[strata(attribute = value, ..)]`",);
            };
            let _ = list.parse_nested_meta(|arg| {
                if arg.path.is_ident("name") {
                    let Ok(value) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                        panic!(
                            "Error while parsing `name`, use it like: `#[strata(name = \"my_table\")]`"
                        );
                    };
                    name = value.value();
                } else if arg.path.is_ident("hooks") {
                    hooks = true;
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
    TableMetadata {
        item,
        name,
        columns,
        associations,
        hooks,
    }
}
