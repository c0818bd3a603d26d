//! Entity derive macro implementation

mod attrs;

use crate::common::syn_types::{option_inner, vec_inner};
use attrs::{FieldAttr, field_attr, struct_attr};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let struct_attr = struct_attr(&input.attrs)?;
    let table = struct_attr.table.as_ref().map(|t| quote! { .table(#t) });

    let mut steps = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let attr = field_attr(field)?;
        if attr.skip {
            continue;
        }
        let field_name = ident.to_string();

        if attr.has_many && attr.has_one {
            return Err(syn::Error::new_spanned(
                field,
                "a field cannot be both has_many and has_one",
            ));
        }
        if attr.has_many {
            if vec_inner(&field.ty).is_none() {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "has_many fields must be Vec<T> where T: Entity",
                ));
            }
            steps.push(quote! {
                .has_many(#field_name, |e: &mut Self| &mut e.#ident)
            });
            continue;
        }
        if attr.has_one {
            if option_inner(&field.ty).is_none() {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "has_one fields must be Option<T> where T: Entity",
                ));
            }
            steps.push(quote! {
                .has_one(#field_name, |e: &mut Self| &mut e.#ident)
            });
            continue;
        }

        let column_name = attr.column.clone().unwrap_or_else(|| match struct_attr.rename_all {
            Some(rule) => rule.apply(&field_name),
            None => field_name.clone(),
        });
        let modifiers = column_modifiers(&attr);
        steps.push(quote! {
            .column(
                ::datamap::ColumnMap::<Self>::new(
                    #field_name,
                    |e: &Self| &e.#ident,
                    |e: &mut Self| &mut e.#ident,
                )
                .column(#column_name)
                #(#modifiers)*
            )
        });
    }

    Ok(quote! {
        impl #impl_generics ::datamap::Entity for #name #ty_generics #where_clause {
            fn mapping() -> ::datamap::EntityMapping<Self> {
                ::datamap::EntityMapping::new()
                    #table
                    #(#steps)*
            }
        }
    })
}

fn column_modifiers(attr: &FieldAttr) -> Vec<TokenStream> {
    let mut out = Vec::new();
    if let Some(alt) = &attr.alt_name {
        out.push(quote! { .with_alt_name(#alt) });
    }
    if attr.is_id {
        out.push(quote! { .primary_key() });
    }
    if attr.auto_increment {
        out.push(quote! { .auto_increment() });
    }
    if attr.return_value {
        out.push(quote! { .return_value() });
    }
    if let Some(db_type) = &attr.db_type {
        out.push(quote! { .with_db_type(::datamap::DbType::#db_type) });
    }
    if let Some(converter) = &attr.converter {
        out.push(quote! {
            .converter(::std::sync::Arc::new(
                <#converter as ::core::default::Default>::default(),
            ))
        });
    }
    out
}
