use crate::decode_table::TableMetadata;
use proc_macro2::TokenStream;
use quote::quote;

/// `Entity::from_row`: columns are moved out of the row by label, absent columns take the
/// field default, association slots start as not loaded.
pub(crate) fn from_row(table: &TableMetadata) -> TokenStream {
    let columns = table.columns.iter().map(|c| {
        let ident = &c.ident;
        let name = &c.name;
        let ty = &c.ty;
        quote! {
            #ident: match row.take_column(#name) {
                Some(v) => <#ty as ::strata::AsValue>::try_from_value(v).map_err(|e| {
                    ::strata::Error::conversion(format!("Column `{}`: {}", #name, e))
                })?,
                None => ::std::default::Default::default(),
            }
        }
    });
    let associations = table.associations.iter().map(|a| {
        let ident = &a.ident;
        quote!(#ident: ::strata::Association::NotLoaded)
    });
    quote! {
        fn from_row(row: ::strata::RowLabeled) -> ::strata::Result<Self> {
            let mut row = row;
            Ok(Self {
                #(#columns,)*
                #(#associations,)*
            })
        }
    }
}
