//! `#[injectable]` expansion.

use darling::FromMeta;
use darling::ast::NestedMeta;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{Attribute, FnArg, Ident, ItemFn, LitStr, Meta, Pat, PatType, Result, ReturnType, Type};

/// Options for `#[injectable(...)]`.
#[derive(Debug, Default, FromMeta)]
#[darling(default)]
struct InjectableOptions {
    /// Path to the runtime crate; `::warren` unless set.
    krate: Option<syn::Path>,
}

/// Options for `#[inject(...)]` on a parameter.
#[derive(Debug, Default, FromMeta)]
#[darling(default)]
struct InjectOptions {
    name: Option<String>,
}

enum Binding {
    Dependency { index: usize },
    Receiver,
}

struct Param {
    ident: Ident,
    ty: Type,
    binding: Binding,
}

pub(crate) fn injectable_impl(args: TokenStream, input: ItemFn) -> TokenStream {
    let nested = match NestedMeta::parse_meta_list(args) {
        Ok(nested) => nested,
        Err(err) => return err.to_compile_error(),
    };
    let options = match InjectableOptions::from_list(&nested) {
        Ok(options) => options,
        Err(err) => return err.write_errors(),
    };

    expand(options, input).unwrap_or_else(|err| err.to_compile_error())
}

fn expand(options: InjectableOptions, input: ItemFn) -> Result<TokenStream> {
    let krate = options
        .krate
        .map(|path| quote!(#path))
        .unwrap_or_else(|| quote!(::warren));

    if !input.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.sig.generics,
            "#[injectable] functions cannot be generic",
        ));
    }

    if let ReturnType::Default = input.sig.output {
        return Err(syn::Error::new_spanned(
            &input.sig,
            "#[injectable] functions must return Result<T, E>",
        ));
    }

    let mut body_fn = input.clone();
    let mut params = Vec::new();
    let mut dependency_names: Vec<LitStr> = Vec::new();
    let mut has_receiver = false;

    for arg in body_fn.sig.inputs.iter_mut() {
        let PatType { attrs, pat, ty, .. } = match arg {
            FnArg::Typed(pat_type) => pat_type,
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "#[injectable] cannot be used on methods taking self",
                ));
            }
        };

        let ident = match &**pat {
            Pat::Ident(pat_ident) if pat_ident.by_ref.is_none() && pat_ident.subpat.is_none() => {
                pat_ident.ident.clone()
            }
            _ => {
                return Err(syn::Error::new_spanned(
                    pat,
                    "#[injectable] parameters must be plain identifiers",
                ));
            }
        };

        let is_receiver = attrs.iter().any(|attr| attr.path().is_ident("receiver"));
        let inject = parse_inject_attrs(attrs)?;
        attrs.retain(|attr| !attr.path().is_ident("receiver") && !attr.path().is_ident("inject"));

        let binding = if is_receiver {
            if has_receiver {
                return Err(syn::Error::new_spanned(pat, "only one #[receiver] parameter is allowed"));
            }
            if inject.name.is_some() {
                return Err(syn::Error::new_spanned(pat, "#[receiver] cannot be renamed with #[inject]"));
            }
            has_receiver = true;
            Binding::Receiver
        } else {
            let name = inject.name.unwrap_or_else(|| ident.unraw().to_string());
            dependency_names.push(LitStr::new(&name, ident.span()));
            Binding::Dependency {
                index: dependency_names.len() - 1,
            }
        };

        params.push(Param {
            ident: format_ident!("__warren_{}", ident.unraw().to_string()),
            ty: (**ty).clone(),
            binding,
        });
    }

    let outer_vis = &input.vis;
    let outer_name = &input.sig.ident;
    let outer_attrs: Vec<&Attribute> = input.attrs.iter().collect();
    let is_async = input.sig.asyncness.is_some();

    let body_name = format_ident!("__warren_{}_body", outer_name);
    body_fn.sig.ident = body_name.clone();
    body_fn.vis = syn::Visibility::Inherited;
    body_fn.attrs.retain(|attr| !attr.path().is_ident("doc"));

    let extract: Vec<TokenStream> = params
        .iter()
        .map(|Param { ident, ty, binding }| match binding {
            Binding::Dependency { index } => quote! {
                let #ident: #ty = __invocation.arg::<#ty>(#index)?;
            },
            Binding::Receiver => quote! {
                let #ident: #ty = __invocation.receiver::<#ty>()?;
            },
        })
        .collect();
    let call_args: Vec<&Ident> = params.iter().map(|param| &param.ident).collect();
    let arity = dependency_names.len();
    let names = quote!([#(#dependency_names),*] as [&'static str; #arity]);

    let constructor = if is_async {
        quote! {
            #krate::Injectable::from_value_async_fn(
                #names,
                |__invocation: #krate::Invocation| async move {
                    #(#extract)*
                    #body_name(#(#call_args),*)
                        .await
                        .map(#krate::Value::new)
                        .map_err(#krate::WarrenError::user)
                },
            )
        }
    } else {
        quote! {
            #krate::Injectable::from_value_fn(
                #names,
                |__invocation: #krate::Invocation| {
                    #(#extract)*
                    #body_name(#(#call_args),*)
                        .map(#krate::Value::new)
                        .map_err(#krate::WarrenError::user)
                },
            )
        }
    };

    Ok(quote! {
        #(#outer_attrs)*
        #outer_vis fn #outer_name() -> #krate::Injectable {
            #body_fn

            #constructor
        }
    })
}

fn parse_inject_attrs(attrs: &[Attribute]) -> Result<InjectOptions> {
    let mut options = InjectOptions::default();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("inject")) {
        if let Meta::Path(_) = attr.meta {
            continue;
        }
        let parsed = InjectOptions::from_meta(&attr.meta)
            .map_err(|err| syn::Error::new_spanned(attr, err.to_string()))?;
        if parsed.name.is_some() {
            options.name = parsed.name;
        }
    }

    Ok(options)
}
