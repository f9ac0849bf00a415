use heck::ToUpperCamelCase;
use proc_macro_error2::abort;
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Data, DeriveInput, Fields, spanned::Spanned};

const DEFAULT_VISIBILITY_COLUMN: &str = "published_at";
const DEFAULT_PRIMARY_KEY: &str = "id";

/// Configuration collected from every `#[viewable(...)]` attribute on the model.
#[derive(Debug, Default, PartialEq, Eq)]
struct ViewableConfig {
    column: Option<String>,
    primary_key: Option<String>,
    disabled: bool,
}

impl ViewableConfig {
    fn column(&self) -> &str {
        self.column.as_deref().unwrap_or(DEFAULT_VISIBILITY_COLUMN)
    }

    fn primary_key(&self) -> &str {
        self.primary_key.as_deref().unwrap_or(DEFAULT_PRIMARY_KEY)
    }
}

#[allow(clippy::needless_pass_by_value)] // DeriveInput is consumed by proc-macro pattern
pub fn expand_derive_viewable(input: DeriveInput) -> TokenStream {
    match expand(&input) {
        Ok(tokens) => tokens,
        Err(err) => abort!(err.span(), "{}", err),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let field_names = named_fields(input)?;
    let config = parse_viewable_attrs(input)?;

    let span = input.ident.span();
    let entity_ident = syn::Ident::new("Entity", span);

    let pk = config.primary_key();
    ensure_field(&field_names, pk, input.span(), "primary_key")?;
    let pk_ident = column_ident(pk, span);

    let published_col_body = if config.disabled {
        quote! { ::core::option::Option::None }
    } else {
        let column = config.column();
        ensure_field(&field_names, column, input.span(), "column")?;
        ensure_optional(input, column)?;
        let col_ident = column_ident(column, span);
        quote! { ::core::option::Option::Some(Self::Column::#col_ident) }
    };

    Ok(quote! {
        impl ::viewable_db::ViewableEntity for #entity_ident {
            fn published_col() -> ::core::option::Option<Self::Column> {
                #published_col_body
            }

            fn primary_col() -> Self::Column {
                Self::Column::#pk_ident
            }
        }
    })
}

fn named_fields(input: &DeriveInput) -> syn::Result<Vec<String>> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.span(),
            "#[derive(Viewable)] can only be applied to structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new(
            input.span(),
            "#[derive(Viewable)] requires a struct with named fields",
        ));
    };
    Ok(named
        .named
        .iter()
        .filter_map(|f| f.ident.as_ref().map(ToString::to_string))
        .collect())
}

fn ensure_field(fields: &[String], name: &str, span: Span, key: &str) -> syn::Result<()> {
    if fields.iter().any(|f| f == name) {
        return Ok(());
    }
    Err(syn::Error::new(
        span,
        format!("viewable: `{key}` names `{name}`, which is not a field of this model"),
    ))
}

/// The visibility column is nullable; a non-`Option` field can never read as published.
fn ensure_optional(input: &DeriveInput, column: &str) -> syn::Result<()> {
    let Data::Struct(data) = &input.data else {
        return Ok(());
    };
    let Some(field) = data
        .fields
        .iter()
        .find(|f| f.ident.as_ref().is_some_and(|i| i == column))
    else {
        return Ok(());
    };
    let is_option = match &field.ty {
        syn::Type::Path(p) => p
            .path
            .segments
            .last()
            .is_some_and(|seg| seg.ident == "Option"),
        _ => false,
    };
    if is_option {
        Ok(())
    } else {
        Err(syn::Error::new(
            field.ty.span(),
            format!("viewable: visibility column `{column}` must be an `Option<_>` field"),
        ))
    }
}

/// Parse all `#[viewable]` / `#[viewable(...)]` attributes.
///
/// Repeating an identical setting is accepted; two different values for the
/// same setting, or `disabled` next to `column`, is an error.
fn parse_viewable_attrs(input: &DeriveInput) -> syn::Result<ViewableConfig> {
    let mut config = ViewableConfig::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("viewable") {
            continue;
        }
        // Bare `#[viewable]` means "defaults".
        if matches!(attr.meta, syn::Meta::Path(_)) {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let span = meta.path.span();

            if meta.path.is_ident("disabled") {
                if config.column.is_some() {
                    return Err(syn::Error::new(
                        span,
                        "viewable: `disabled` cannot be combined with `column`",
                    ));
                }
                config.disabled = true;
                return Ok(());
            }

            let key = meta
                .path
                .get_ident()
                .map(ToString::to_string)
                .unwrap_or_default();
            let value = meta.value()?.parse::<syn::LitStr>()?.value();
            if value.is_empty() {
                return Err(syn::Error::new(
                    span,
                    format!("viewable: `{key}` must not be empty"),
                ));
            }

            match key.as_str() {
                "column" => {
                    if config.disabled {
                        return Err(syn::Error::new(
                            span,
                            "viewable: `column` cannot be combined with `disabled`",
                        ));
                    }
                    merge_setting(&mut config.column, value, "column", span)
                }
                "primary_key" => merge_setting(&mut config.primary_key, value, "primary_key", span),
                _ => Err(syn::Error::new(
                    span,
                    format!(
                        "Unknown attribute '{key}'. Valid attributes: column, primary_key, disabled"
                    ),
                )),
            }
        })?;
    }

    Ok(config)
}

fn merge_setting(
    slot: &mut Option<String>,
    value: String,
    key: &str,
    span: Span,
) -> syn::Result<()> {
    match slot {
        Some(existing) if *existing != value => Err(syn::Error::new(
            span,
            format!("viewable: conflicting `{key}` declarations (`{existing}` and `{value}`)"),
        )),
        Some(_) => Ok(()),
        None => {
            *slot = Some(value);
            Ok(())
        }
    }
}

fn column_ident(name: &str, span: Span) -> syn::Ident {
    syn::Ident::new(&name.to_upper_camel_case(), span)
}
