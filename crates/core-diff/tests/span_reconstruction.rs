//! Span sequences must lay out each side verbatim.

use core_diff::{DiffSpan, SpanKind, diff};
use proptest::prelude::*;

fn concat(spans: &[DiffSpan]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

proptest! {
    #[test]
    fn sides_reconstruct_inputs(a in "[ab \n]{0,24}", b in "[ab \n]{0,24}") {
        let r = diff(&a, &b);
        prop_assert_eq!(concat(&r.original), a.clone());
        prop_assert_eq!(concat(&r.proposed), b.clone());
    }

    // At most one styled span per side, and it is always the last one.
    #[test]
    fn styled_tail_is_single_and_last(a in "[abc ]{0,20}", b in "[abc ]{0,20}") {
        let r = diff(&a, &b);
        for (spans, styled) in [(&r.original, SpanKind::Removed), (&r.proposed, SpanKind::Added)] {
            let count = spans.iter().filter(|s| s.kind == styled).count();
            prop_assert!(count <= 1);
            if count == 1 {
                prop_assert_eq!(spans.last().map(|s| s.kind), Some(styled));
            }
            prop_assert!(spans.iter().all(|s| s.kind == styled || s.kind == SpanKind::Unchanged));
        }
    }

    #[test]
    fn styled_tail_begins_with_a_word(a in "[ab \n]{0,24}", b in "[ab \n]{0,24}") {
        let r = diff(&a, &b);
        for spans in [&r.original, &r.proposed] {
            for span in spans.iter().filter(|s| s.kind != SpanKind::Unchanged) {
                prop_assert!(!span.text.starts_with(char::is_whitespace));
            }
        }
    }
}
