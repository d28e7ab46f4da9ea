//! Procedural macros for rill built-in methods
//!
//! Provides the `#[method]` attribute macro for declaring built-in methods
//! with rustdoc-style documentation that is automatically converted into a
//! method-table entry and a help entry.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, ItemFn, Meta};

/// A parsed markdown documentation with structured sections
#[derive(Debug, Clone)]
struct DocMarkdown {
    summary: String,
    examples: Vec<String>,
}

/// Extract rustdoc comments from function attributes
fn extract_doc_comments(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|attr| {
            if attr.path().is_ident("doc") {
                if let Meta::NameValue(nv) = &attr.meta {
                    if let syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(lit_str),
                        ..
                    }) = &nv.value
                    {
                        return Some(lit_str.value());
                    }
                }
            }
            None
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse markdown sections from documentation. The summary is everything
/// before the first `#` header; `# Examples` sections contribute fenced
/// ```rill code blocks.
fn parse_doc_markdown(raw_doc: &str) -> DocMarkdown {
    let mut summary = String::new();
    let mut examples = Vec::new();
    let mut current_section = "summary";
    let mut current_content = String::new();

    let flush = |section: &str, content: &str, summary: &mut String, examples: &mut Vec<String>| {
        match section {
            "summary" => *summary = content.trim().to_string(),
            "examples" => {
                for code_block in content.split("```") {
                    let trimmed_block = code_block.trim();
                    if let Some(code_str) = trimmed_block.strip_prefix("rill") {
                        let code = code_str.trim().to_string();
                        if !code.is_empty() {
                            examples.push(code);
                        }
                    }
                }
            }
            _ => {}
        }
    };

    for line in raw_doc.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("# ") {
            flush(current_section, &current_content, &mut summary, &mut examples);
            let header = rest.trim().to_lowercase();
            current_section = if header.contains("example") {
                "examples"
            } else {
                "other"
            };
            current_content.clear();
        } else {
            current_content.push_str(line);
            current_content.push('\n');
        }
    }
    flush(current_section, &current_content, &mut summary, &mut examples);

    DocMarkdown { summary, examples }
}

/// Pull `key = "value"` out of the raw attribute token text.
fn parse_str_arg(attr_str: &str, key: &str) -> Option<String> {
    let marker = format!("{} = \"", key);
    let start = attr_str.find(&marker)?;
    let rest = &attr_str[start + marker.len()..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Pull `arity = N` out of the raw attribute token text.
fn parse_arity_arg(attr_str: &str) -> usize {
    if let Some(start) = attr_str.find("arity =") {
        let rest = attr_str[start + 7..].trim_start();
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(n) = digits.parse() {
            return n;
        }
    }
    0
}

/// Attribute macro for declaring rill built-in methods
///
/// Wraps a `fn(&Value, &[Value]) -> Result<Value, RillError>` and submits a
/// `MethodSpec` describing it to the inventory-backed method table. Doc
/// comments become the help summary; ```rill fenced blocks under an
/// `# Examples` header become help examples.
///
/// # Attribute Arguments
///
/// - `receiver`: value kind the method is defined on (`"string"`, `"list"`, …)
/// - `name`: the rill-visible method name (defaults to the function name)
/// - `arity`: number of required arguments (defaults to 0)
/// - `category`: category for help organization (defaults to "Methods")
///
/// # Example
///
/// ````ignore
/// #[method(receiver = "string", name = "upper", category = "Strings")]
/// /// Uppercase copy of the receiver.
/// ///
/// /// # Examples
/// /// ```rill
/// /// "abc".upper => "ABC"
/// /// ```
/// pub fn string_upper(recv: &Value, args: &[Value]) -> Result<Value, RillError> {
///     // ...
/// }
/// ````
#[proc_macro_attribute]
pub fn method(attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);
    let attr_str = attr.to_string();

    let fn_name = func.sig.ident.clone();
    let receiver = parse_str_arg(&attr_str, "receiver").unwrap_or_default();
    let name = parse_str_arg(&attr_str, "name").unwrap_or_else(|| fn_name.to_string());
    let category = parse_str_arg(&attr_str, "category").unwrap_or_else(|| "Methods".to_string());
    let arity = parse_arity_arg(&attr_str);

    let raw_docs = extract_doc_comments(&func.attrs);
    let parsed_docs = parse_doc_markdown(&raw_docs);
    let summary = parsed_docs.summary;
    let examples = parsed_docs.examples;

    let expanded = quote! {
        #func

        ::inventory::submit! {
            crate::methods::MethodSpec {
                receiver: #receiver,
                name: #name,
                arity: #arity,
                category: #category,
                summary: #summary,
                examples: &[#(#examples),*],
                func: #fn_name,
            }
        }
    };

    TokenStream::from(expanded)
}
