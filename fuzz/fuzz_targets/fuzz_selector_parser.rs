#![no_main]

use libfuzzer_sys::fuzz_target;
use mooring_dom::{Document, SelectorList};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    match SelectorList::parse(input) {
        Ok(list) => {
            assert!(!list.is_empty(), "parsed an empty selector list");
            // Anything that parses must also match without panicking.
            let doc = Document::new();
            let el = doc.create_element("div");
            doc.set_attribute(el, "id", "a").unwrap();
            doc.set_attribute(el, "class", "b c").unwrap();
            doc.append_child(doc.body(), el).unwrap();
            let found = doc.query_selector(input).expect("reparse of accepted input");
            if let Some(node) = found {
                assert!(doc.is_element(node));
            }
        }
        Err(err) => {
            assert!(err.offset <= input.len(), "error offset past end of input");
            // The document must agree that the selector is invalid.
            let doc = Document::new();
            assert!(doc.query_selector(input).is_err());
        }
    }
});
