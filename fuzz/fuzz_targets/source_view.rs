//! Fuzz target for source view construction.
//!
//! Builds a view over arbitrary text in every language and checks the line
//! table invariants hold for each byte offset.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use tagscan_domain::{Language, SourceView};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    text: String,
    language_index: u8,
}

fuzz_target!(|input: FuzzInput| {
    let language = Language::ALL[input.language_index as usize % Language::ALL.len()];
    let view = SourceView::new(input.text.clone(), language);

    assert!(view.line_count() >= 1);
    for index in (0..input.text.len()).filter(|i| input.text.is_char_boundary(*i)) {
        let loc = view.location_of(index);
        assert!(loc.line >= 1 && loc.line <= view.line_count());
        let line = view.line_boundary(loc.line);
        assert_eq!(line.start + loc.column, index);
        // scope_of is total.
        let _ = view.scope_of(index);
    }
});
