mod decode_column;
mod decode_table;
mod from_row;
mod util;

use decode_table::decode_table;
use from_row::from_row;
use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemStruct, parse_macro_input};

/// Implements `strata::Entity` for a struct with named fields.
///
/// Struct attributes: `#[strata(name = "table")]`, defaults to the snake case type name,
/// and `#[strata(hooks)]` to implement `strata::Hooks` by hand instead of getting the
/// empty implementation.
/// Field attributes: `#[strata(primary_key)]`, `#[strata(auto_increment)]`,
/// `#[strata(unique)]`, `#[strata(name = "column")]` and, on `Association<T>` fields,
/// `#[strata(foreign_key = "column_of_T")]`.
#[proc_macro_derive(Entity, attributes(strata))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let item: ItemStruct = parse_macro_input!(input as ItemStruct);
    let table = decode_table(item);
    let name = &table.item.ident;
    let (impl_generics, ty_generics, where_clause) = table.item.generics.split_for_impl();
    let type_name = name.to_string();
    let table_name = &table.name;
    let column_defs = table.columns.iter().map(|c| {
        let name = &c.name;
        let ty = &c.ty;
        let nullable = c.nullable;
        let primary_key = c.primary_key;
        let auto_increment = c.auto_increment;
        let unique = c.unique;
        quote! {
            ::strata::ColumnDef {
                name: #name,
                value: <#ty as ::strata::AsValue>::as_empty_value(),
                nullable: #nullable,
                primary_key: #primary_key,
                auto_increment: #auto_increment,
                unique: #unique,
            }
        }
    });
    let association_defs = table.associations.iter().map(|a| {
        let name = &a.name;
        let foreign_key = &a.foreign_key;
        let child = &a.child;
        quote! {
            ::strata::AssociationDef {
                name: #name,
                foreign_key: #foreign_key,
                child_type: ::std::any::TypeId::of::<#child>(),
                child: <#child as ::strata::Entity>::describe,
            }
        }
    });
    let row = table.columns.iter().map(|c| {
        let name = &c.name;
        let field = &c.ident;
        if c.passive {
            quote! {
                (#name, match &self.#field {
                    ::strata::Passive::Set(v) => ::strata::Passive::Set(
                        ::strata::AsValue::as_value(::std::clone::Clone::clone(v)),
                    ),
                    ::strata::Passive::NotSet => ::strata::Passive::NotSet,
                })
            }
        } else {
            quote! {
                (#name, ::strata::Passive::Set(
                    ::strata::AsValue::as_value(::std::clone::Clone::clone(&self.#field)),
                ))
            }
        }
    });
    let (primary_key, set_primary_key) = match table.primary_key() {
        Some(column) => {
            let field = &column.ident;
            let ty = &column.ty;
            (
                quote!(::strata::AsValue::as_value(::std::clone::Clone::clone(&self.#field))),
                quote! {
                    self.#field = <#ty as ::strata::AsValue>::try_from_value(value)?;
                    Ok(())
                },
            )
        }
        None => (
            quote!(::strata::Value::Null),
            quote! {
                let _ = value;
                Err(::strata::Error::schema(format!("Entity `{}` has no primary key", #type_name)))
            },
        ),
    };
    let attach = table.associations.iter().map(|a| {
        let name = &a.name;
        let field = &a.ident;
        let child = &a.child;
        quote! {
            #name => {
                self.#field = ::strata::Association::Loaded(
                    rows.into_iter()
                        .map(<#child as ::strata::Entity>::from_row)
                        .collect::<::strata::Result<_>>()?,
                );
                Ok(())
            }
        }
    });
    let from_row = from_row(&table);
    let hooks = (!table.hooks).then(|| {
        quote! {
            impl #impl_generics ::strata::Hooks for #name #ty_generics #where_clause {}
        }
    });
    quote! {
        #hooks

        impl #impl_generics ::strata::Entity for #name #ty_generics #where_clause {
            fn describe() -> ::strata::EntityDescriptor {
                ::strata::EntityDescriptor {
                    name: #type_name,
                    table: #table_name,
                    columns: vec![#(#column_defs),*],
                    associations: vec![#(#association_defs),*],
                }
            }

            fn row(&self) -> ::strata::Fields {
                vec![#(#row),*]
            }

            #from_row

            fn primary_key(&self) -> ::strata::Value {
                #primary_key
            }

            fn set_primary_key(&mut self, value: ::strata::Value) -> ::strata::Result<()> {
                #set_primary_key
            }

            fn attach(
                &mut self,
                name: &str,
                rows: ::std::vec::Vec<::strata::RowLabeled>,
            ) -> ::strata::Result<()> {
                match name {
                    #(#attach)*
                    _ => {
                        let _ = rows;
                        Err(::strata::Error::schema(format!(
                            "Entity `{}` has no association named `{}`",
                            #type_name, name
                        )))
                    }
                }
            }
        }
    }
    .into()
}
