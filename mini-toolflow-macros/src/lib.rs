use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{
    parse_macro_input, AttributeArgs, FnArg, GenericArgument, Ident, ItemFn, Lit, LitStr, Meta,
    NestedMeta, Pat, PathArguments, Type,
};
use proc_macro_crate::{crate_name, FoundCrate};

/// Resolve host crate path (equivalent to `$crate`).
///
/// `FoundCrate::Itself` is also reported for integration tests and demos of
/// the host package, where `crate` would point at the wrong crate, so the
/// crate currently being compiled is checked as well.
fn host_crate() -> TokenStream2 {
    match crate_name("mini-toolflow") {
        Ok(FoundCrate::Itself) => {
            let compiling = std::env::var("CARGO_CRATE_NAME").unwrap_or_default();
            if compiling == "mini_toolflow" {
                quote!(crate)
            } else {
                quote!(::mini_toolflow)
            }
        }
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Err(_) => quote!(::mini_toolflow),
    }
}

/// Turn a plain function into a `Tool` implementation.
///
/// ```ignore
/// #[tool(
///     name = "get_weather",
///     description = "Get weather for a given city",
///     params(city = "City name, e.g. 'San Francisco'")
/// )]
/// fn get_weather(city: String) -> String { .. }
/// ```
///
/// Generates `GetWeatherParams` (deserialized from the model arguments) and a
/// unit struct `GetWeatherTool`. The function's return value must convert into
/// `ToolOutput`. Parameters typed `Option<T>` are advertised as not required.
#[proc_macro_attribute]
pub fn tool(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as AttributeArgs);
    let input_fn = parse_macro_input!(item as ItemFn);
    match expand(args, input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Values given inside `#[tool(..)]`.
struct ToolAttrs {
    name: Option<String>,
    description: String,
    params: Vec<(String, String)>,
}

impl ToolAttrs {
    fn parse(args: AttributeArgs, fn_ident: &Ident) -> syn::Result<Self> {
        let mut name = None;
        let mut description = None;
        let mut params = Vec::new();

        for nested in args {
            match nested {
                NestedMeta::Meta(Meta::NameValue(nv)) => {
                    let Lit::Str(value) = &nv.lit else {
                        return Err(syn::Error::new_spanned(&nv.lit, "expected a string literal"));
                    };
                    if nv.path.is_ident("name") {
                        name = Some(value.value());
                    } else if nv.path.is_ident("description") {
                        description = Some(value.value());
                    } else {
                        return Err(syn::Error::new_spanned(&nv.path, "unknown tool attribute"));
                    }
                }
                NestedMeta::Meta(Meta::List(list)) if list.path.is_ident("params") => {
                    for entry in list.nested {
                        match entry {
                            NestedMeta::Meta(Meta::NameValue(nv)) => match (nv.path.get_ident(), &nv.lit) {
                                (Some(ident), Lit::Str(value)) => params.push((ident.to_string(), value.value())),
                                _ => return Err(syn::Error::new_spanned(&nv, "expected `param = \"description\"`")),
                            },
                            other => return Err(syn::Error::new_spanned(other, "expected `param = \"description\"`")),
                        }
                    }
                }
                other => return Err(syn::Error::new_spanned(other, "unsupported tool attribute")),
            }
        }

        let description = description
            .ok_or_else(|| syn::Error::new_spanned(fn_ident, "tool requires `description = \"...\"`"))?;
        Ok(Self { name, description, params })
    }

    fn describe(&self, param: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == param)
            .map(|(_, description)| description.as_str())
    }
}

/// The typed arguments of the annotated function.
fn signature_fields(input_fn: &ItemFn) -> syn::Result<Vec<(Ident, Type)>> {
    input_fn
        .sig
        .inputs
        .iter()
        .map(|arg| match arg {
            FnArg::Typed(pt) => match &*pt.pat {
                Pat::Ident(pi) => Ok((pi.ident.clone(), (*pt.ty).clone())),
                other => Err(syn::Error::new_spanned(other, "only simple identifiers are supported")),
            },
            FnArg::Receiver(_) => Err(syn::Error::new_spanned(arg, "methods with self are not supported")),
        })
        .collect()
}

fn expand(args: AttributeArgs, input_fn: ItemFn) -> syn::Result<TokenStream2> {
    let fn_ident = input_fn.sig.ident.clone();
    let fn_name = fn_ident.to_string();
    let attrs = ToolAttrs::parse(args, &fn_ident)?;
    let fields = signature_fields(&input_fn)?;

    if let Some((unknown, _)) = attrs
        .params
        .iter()
        .find(|(name, _)| !fields.iter().any(|(ident, _)| ident == name.as_str()))
    {
        return Err(syn::Error::new_spanned(
            &fn_ident,
            format!("param '{unknown}' not found in function signature"),
        ));
    }

    let tool_name = attrs.name.clone().unwrap_or_else(|| fn_name.clone());
    let description = &attrs.description;
    let params_ident = Ident::new(&format!("{}Params", pascal_case(&fn_name)), fn_ident.span());
    let tool_ident = Ident::new(&format!("{}Tool", pascal_case(&fn_name)), fn_ident.span());

    let host = host_crate();
    let serde_path = LitStr::new(&format!("{}::serde", host.to_string().replace(' ', "")), Span::call_site());

    let mut field_defs = Vec::with_capacity(fields.len());
    let mut arg_schemas = Vec::with_capacity(fields.len());
    for (ident, ty) in &fields {
        let param = ident.to_string();
        let Some(param_description) = attrs.describe(&param) else {
            return Err(syn::Error::new_spanned(ident, format!("missing description for param '{param}'")));
        };

        let (json_type, required) = match option_inner(ty) {
            Some(inner) => (json_type(inner), false),
            None => (json_type(ty), true),
        };
        field_defs.push(if required {
            quote!(pub #ident: #ty)
        } else {
            quote!(#[serde(default)] pub #ident: #ty)
        });
        arg_schemas.push(quote! {
            #host::tools::schema::ArgSchema {
                name: #param.into(),
                arg_type: #json_type.into(),
                description: #param_description.into(),
                required: #required,
            }
        });
    }

    let call_args = fields.iter().map(|(ident, _)| quote!(params.#ident));
    let call = match input_fn.sig.asyncness {
        Some(_) => quote!(#fn_ident(#(#call_args),*).await),
        None => quote!(#fn_ident(#(#call_args),*)),
    };

    Ok(quote! {
        #input_fn

        #[derive(#host::serde::Deserialize)]
        #[serde(crate = #serde_path)]
        pub struct #params_ident {
            #(#field_defs,)*
        }

        pub struct #tool_ident;

        #[#host::async_trait::async_trait]
        impl #host::tools::traits::Tool for #tool_ident {
            fn name(&self) -> &str { #tool_name }
            fn description(&self) -> &str { #description }
            fn args(&self) -> Vec<#host::tools::schema::ArgSchema> {
                vec![#(#arg_schemas),*]
            }
            async fn run(
                &self,
                input: #host::serde_json::Value,
            ) -> ::core::result::Result<Vec<#host::tools::output::ToolOutput>, #host::tools::error::ToolError> {
                let params: #params_ident = #host::serde_json::from_value(input)
                    .map_err(|e| #host::tools::error::ToolError::ParamsNotMatched(e.to_string()))?;
                Ok(vec![#host::tools::output::ToolOutput::from(#call)])
            }
        }
    })
}

/// `get_weather` -> `GetWeather`.
fn pascal_case(s: &str) -> String {
    s.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect::<String>())
                .unwrap_or_default()
        })
        .collect()
}

/// `Some(T)` when `ty` is spelled `Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(p) = ty else { return None };
    let seg = p.path.segments.last()?;
    if seg.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(ab) = &seg.arguments else { return None };
    ab.args.iter().find_map(|a| match a {
        GenericArgument::Type(t) => Some(t),
        _ => None,
    })
}

/// JSON Schema type advertised for a parameter type.
fn json_type(ty: &Type) -> &'static str {
    let Type::Path(p) = ty else { return "object" };
    let Some(last) = p.path.segments.last() else { return "object" };
    match last.ident.to_string().as_str() {
        "String" => "string",
        "bool" => "boolean",
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize"
        | "u8" | "u16" | "u32" | "u64" | "u128" | "usize" => "integer",
        "f32" | "f64" => "number",
        "Vec" => "array",
        _ => "object",
    }
}
