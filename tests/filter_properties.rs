//! Property tests for event filter matching.

use proptest::prelude::*;

use timeseries_query::domain::foundation::{Event, EventFilter, WILDCARD};

fn name() -> impl Strategy<Value = String> {
    "[a-z_]{1,12}"
}

fn event() -> impl Strategy<Value = Event> {
    (
        name(),
        proptest::option::of(name()),
        proptest::option::of(name()),
        proptest::option::of(name()),
        proptest::option::of(name()),
        proptest::option::of(name()),
    )
        .prop_map(|(event, object, app, user, plugin, key)| {
            let mut e = Event::new(event);
            e.object = object;
            e.app = app;
            e.user = user;
            e.plugin = plugin;
            e.key = key;
            e
        })
}

/// A filter built from the event's own fields always matches it.
fn exact_filter(event: &Event) -> EventFilter {
    EventFilter {
        event: event.event.clone(),
        object: event.object.clone(),
        app: event.app.clone(),
        user: event.user.clone(),
        plugin: event.plugin.clone(),
        key: event.key.clone(),
    }
}

proptest! {
    #[test]
    fn filter_from_event_fields_matches(e in event()) {
        prop_assert!(exact_filter(&e).matches(&e));
    }

    #[test]
    fn unconstrained_wildcard_matches_everything(e in event()) {
        prop_assert!(EventFilter::any().matches(&e));
    }

    #[test]
    fn different_event_name_never_matches(e in event(), other in name()) {
        prop_assume!(other != e.event);
        prop_assert!(!EventFilter::new(other).matches(&e));
    }

    #[test]
    fn wildcard_object_matches_like_no_object(e in event()) {
        let wildcard = EventFilter::any().object(WILDCARD);
        prop_assert_eq!(wildcard.matches(&e), EventFilter::any().matches(&e));
    }

    #[test]
    fn object_constraint_requires_equal_object(e in event(), wanted in name()) {
        let filter = EventFilter::any().object(wanted.clone());
        prop_assert_eq!(filter.matches(&e), e.object.as_deref() == Some(wanted.as_str()));
    }

    #[test]
    fn plugin_constraint_has_no_wildcard(e in event()) {
        // `*` is a literal plugin name, not a wildcard.
        let filter = EventFilter::any().plugin(WILDCARD);
        prop_assert_eq!(filter.matches(&e), e.plugin.as_deref() == Some(WILDCARD));
    }

    #[test]
    fn adding_constraints_only_narrows(e in event(), app in name()) {
        let broad = EventFilter::new(e.event.clone());
        let narrow = broad.clone().app(app);
        prop_assert!(!narrow.matches(&e) || broad.matches(&e));
    }
}
