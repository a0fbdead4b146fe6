use proc_macro::TokenStream;

use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// Runs the annotated function between `weft::initialize` and `weft::join_all`.
///
/// ```ignore
/// #[weft::main]
/// fn main() {
///     weft::spawn(|| println!("hello from a fiber")).unwrap();
/// }
/// ```
#[proc_macro_attribute]
pub fn main(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemFn);

    let attributes = &item.attrs;
    let visibility = &item.vis;
    let signature = &item.sig;
    let body = &item.block;

    let result = quote! {
        #(#attributes)*
        #visibility #signature {
            ::weft::initialize();
            let body = move || #body;
            let output = body();
            ::weft::join_all();
            output
        }
    };

    result.into()
}
