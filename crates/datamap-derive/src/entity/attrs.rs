//! Attribute parsing for the Entity derive macro.
//!
//! Handles parsing of struct-level and field-level `#[orm(...)]` attributes.

use heck::{ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use syn::{Attribute, Result};

/// Column naming rule applied to fields without `#[orm(column = "...")]`.
#[derive(Clone, Copy)]
pub(super) enum RenameRule {
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
}

impl RenameRule {
    fn parse(lit: &syn::LitStr) -> Result<Self> {
        match lit.value().as_str() {
            "PascalCase" => Ok(Self::Pascal),
            "camelCase" => Ok(Self::Camel),
            "snake_case" => Ok(Self::Snake),
            "SCREAMING_SNAKE_CASE" => Ok(Self::ScreamingSnake),
            other => Err(syn::Error::new_spanned(
                lit,
                format!(
                    "unknown rename_all rule \"{other}\"; expected PascalCase, camelCase, snake_case or SCREAMING_SNAKE_CASE"
                ),
            )),
        }
    }

    pub(super) fn apply(self, field: &str) -> String {
        match self {
            Self::Pascal => field.to_upper_camel_case(),
            Self::Camel => field.to_lower_camel_case(),
            Self::Snake => field.to_snake_case(),
            Self::ScreamingSnake => field.to_shouty_snake_case(),
        }
    }
}

/// Struct-level `#[orm(table = "...", rename_all = "...")]`.
#[derive(Default)]
pub(super) struct StructAttr {
    pub table: Option<String>,
    pub rename_all: Option<RenameRule>,
}

impl syn::parse::Parse for StructAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = StructAttr::default();
        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            let _: syn::Token![=] = input.parse()?;
            let value: syn::LitStr = input.parse()?;
            if ident == "table" {
                attr.table = Some(value.value());
            } else if ident == "rename_all" {
                attr.rename_all = Some(RenameRule::parse(&value)?);
            } else {
                return Err(syn::Error::new_spanned(
                    ident,
                    "unknown struct attribute; expected `table` or `rename_all`",
                ));
            }
            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }
        Ok(attr)
    }
}

/// Field-level `#[orm(...)]` flags and values.
#[derive(Default)]
pub(super) struct FieldAttr {
    pub is_id: bool,
    pub auto_increment: bool,
    pub return_value: bool,
    pub skip: bool,
    pub has_many: bool,
    pub has_one: bool,
    pub column: Option<String>,
    pub alt_name: Option<String>,
    pub db_type: Option<syn::Ident>,
    pub converter: Option<syn::Path>,
}

impl FieldAttr {
    fn merge(&mut self, other: FieldAttr) {
        self.is_id |= other.is_id;
        self.auto_increment |= other.auto_increment;
        self.return_value |= other.return_value;
        self.skip |= other.skip;
        self.has_many |= other.has_many;
        self.has_one |= other.has_one;
        if other.column.is_some() {
            self.column = other.column;
        }
        if other.alt_name.is_some() {
            self.alt_name = other.alt_name;
        }
        if other.db_type.is_some() {
            self.db_type = other.db_type;
        }
        if other.converter.is_some() {
            self.converter = other.converter;
        }
    }
}

impl syn::parse::Parse for FieldAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();

        // Comma-separated flags or key = "value" pairs
        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;

            if !input.peek(syn::Token![=]) {
                match ident.to_string().as_str() {
                    "id" => attr.is_id = true,
                    "auto_increment" => attr.auto_increment = true,
                    "return_value" => attr.return_value = true,
                    "skip" => attr.skip = true,
                    "has_many" => attr.has_many = true,
                    "has_one" => attr.has_one = true,
                    _ => {
                        return Err(syn::Error::new_spanned(
                            ident,
                            "unknown field flag; expected id, auto_increment, return_value, skip, has_many or has_one",
                        ));
                    }
                }
            } else {
                let _: syn::Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                match ident.to_string().as_str() {
                    "column" => attr.column = Some(value.value()),
                    "alt_name" => attr.alt_name = Some(value.value()),
                    "db_type" => attr.db_type = Some(syn::Ident::new(&value.value(), value.span())),
                    "converter" => attr.converter = Some(value.parse()?),
                    _ => {
                        return Err(syn::Error::new_spanned(
                            ident,
                            "unknown field attribute; expected column, alt_name, db_type or converter",
                        ));
                    }
                }
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(attr)
    }
}

/// Parse every `#[orm(...)]` on a struct.
pub(super) fn struct_attr(attrs: &[Attribute]) -> Result<StructAttr> {
    let mut out = StructAttr::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("orm")) {
        let parsed: StructAttr = attr.parse_args()?;
        if parsed.table.is_some() {
            out.table = parsed.table;
        }
        if parsed.rename_all.is_some() {
            out.rename_all = parsed.rename_all;
        }
    }
    Ok(out)
}

/// Parse and merge every `#[orm(...)]` on a field.
pub(super) fn field_attr(field: &syn::Field) -> Result<FieldAttr> {
    let mut out = FieldAttr::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("orm")) {
        out.merge(attr.parse_args()?);
    }
    Ok(out)
}
