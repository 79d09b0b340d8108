//! Markdown → HTML compilation.
//!
//! Uses [pulldown-cmark](https://docs.rs/pulldown-cmark) with the GitHub
//! flavored extensions (tables, strikethrough, task lists, footnotes, GFM
//! blockquote tags). Raw HTML in the source passes through untouched, which is
//! what lets templates emit markup before compilation.

use pulldown_cmark::{Options, Parser, html};

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_GFM
}

pub fn compile_markdown(text: &str) -> String {
    let parser = Parser::new_ext(text, options());
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
