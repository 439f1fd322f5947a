//! Property tests for identifier normalization and thread ordering

mod common;

use common::{at_minute, Fixture};
use proptest::prelude::*;
use sms_transcript_export::thread::assemble_thread;
use sms_transcript_export::{ContactIdentifier, MessageStore};
use std::collections::BTreeSet;

proptest! {
    #[test]
    fn phone_normalization_is_idempotent(raw in r"\+?[0-9][0-9 ()\-.]{0,18}") {
        let id = ContactIdentifier::parse(&raw).unwrap();
        prop_assert!(matches!(id, ContactIdentifier::Phone(_)));
        prop_assert_eq!(ContactIdentifier::parse(id.value()).unwrap(), id);
    }

    #[test]
    fn email_normalization_is_idempotent(local in "[A-Za-z0-9._]{1,12}", domain in "[A-Za-z]{1,10}\\.[a-z]{2,3}") {
        let id = ContactIdentifier::parse(&format!("{local}@{domain}")).unwrap();
        prop_assert_eq!(ContactIdentifier::parse(id.value()).unwrap(), id);
    }

    #[test]
    fn name_normalization_is_idempotent(raw in "[A-Za-zÀ-ÿ][A-Za-zÀ-ÿ ]{0,24}") {
        let id = ContactIdentifier::parse(&raw).unwrap();
        prop_assert!(matches!(id, ContactIdentifier::Name(_)));
        prop_assert_eq!(ContactIdentifier::parse(id.value()).unwrap(), id);
    }

    #[test]
    fn name_matching_ignores_case_and_spacing(raw in "[A-Za-z]{1,8}( [A-Za-z]{1,8}){0,2}") {
        let spaced = format!("  {}  ", raw.to_uppercase().replace(' ', "   "));
        let id = ContactIdentifier::parse(&raw).unwrap();
        prop_assert!(id.matches_display_name(&spaced));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn thread_is_strictly_ordered_and_complete(
        messages in prop::collection::vec((prop::option::of(0i64..6), any::<bool>(), 1i64..=2), 1..40)
    ) {
        let fixture = Fixture::new();
        fixture.add_handle(1, "+491701234567");
        fixture.add_chat(1, &[1]);
        fixture.add_chat(2, &[1]);
        for (index, (minute, from_me, chat)) in messages.iter().enumerate() {
            let id = i64::try_from(index).unwrap() + 1;
            fixture.add_message(id, *chat, 1, minute.map(at_minute), Some("x"), *from_me);
        }

        let store = MessageStore::open(fixture.db_path()).unwrap();
        let entries = assemble_thread(&store, &BTreeSet::from([1, 2])).unwrap();

        prop_assert_eq!(entries.len(), messages.len());
        for pair in entries.windows(2) {
            prop_assert!(pair[0].order_key() < pair[1].order_key());
        }
        let ids: BTreeSet<i64> = entries.iter().map(|e| e.id).collect();
        prop_assert_eq!(ids.len(), messages.len());
    }
}
