//! `#[derive(Bundle)]`: implements `dataflow_core::ts::bundle::Bundle`
//! for a struct of time-series fields by folding `modified`/`is_valid`
//! across every field (§3, §4.5 peered/non-peered bundles).
//!
//! Every field type is expected to implement `TimeSeriesInput`
//! (`TS`, `TSS`, `TSD`, `TSW`, `TSL`, or a nested `#[derive(Bundle)]`
//! struct, since `Bundle` itself only needs `modified`/`is_valid` to
//! satisfy the same shape `BundleField`'s blanket impl asks for).

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

#[proc_macro_derive(Bundle)]
pub fn derive_bundle(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            Fields::Unit => {
                return syn::Error::new_spanned(&input, "Bundle cannot be derived for a unit struct")
                    .to_compile_error()
                    .into();
            }
            Fields::Unnamed(_) => {
                return syn::Error::new_spanned(&input, "Bundle requires named fields")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Bundle can only be derived for a struct")
                .to_compile_error()
                .into();
        }
    };

    let field_idents: Vec<_> = fields.iter().map(|f| f.ident.clone().unwrap()).collect();
    let field_names: Vec<_> = field_idents.iter().map(|i| i.to_string()).collect();

    let modified_expr = if field_idents.is_empty() {
        quote! { false }
    } else {
        quote! { #( dataflow_core::ts::output::TimeSeriesInput::modified(&self.#field_idents, now) )||* }
    };

    let is_valid_expr = if field_idents.is_empty() {
        quote! { true }
    } else {
        quote! { #( dataflow_core::ts::output::TimeSeriesInput::is_valid(&self.#field_idents) )&&* }
    };

    let expanded = quote! {
        impl #impl_generics dataflow_core::ts::bundle::Bundle for #name #ty_generics #where_clause {
            fn field_names(&self) -> &'static [&'static str] {
                &[ #(#field_names),* ]
            }

            fn modified(&self, now: dataflow_core::EngineTime) -> bool {
                #modified_expr
            }

            fn is_valid(&self) -> bool {
                #is_valid_expr
            }
        }
    };

    TokenStream::from(expanded)
}
