//! Behavioral tests for the generic substrate: visibility, effectivity,
//! uniqueness and the anchor delete cascade, run against the in-memory
//! store.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use omr_core::builder::PropertyBuilder;
use omr_core::instance::{AttachmentEnd, InstanceProperties};
use omr_core::types::name;
use omr_core::{CallContext, GenericHandler, TypeRegistry, ZonePolicy};
use omr_memory::InMemoryMetadataStore;

fn open_handler() -> GenericHandler {
    GenericHandler::new(
        Arc::new(InMemoryMetadataStore::new()),
        TypeRegistry::builtin(),
        ZonePolicy::open(),
    )
}

fn named_properties(qualified_name: &str) -> InstanceProperties {
    PropertyBuilder::new()
        .set_string(name::QUALIFIED_NAME, qualified_name)
        .unwrap()
        .set_string(name::DISPLAY_NAME, "display")
        .unwrap()
        .build()
}

#[tokio::test]
async fn bean_lifecycle() {
    let handler = open_handler();
    let ctx = CallContext::new("kim");

    let guid = handler
        .create_bean(&ctx, name::GLOSSARY, named_properties("Glossary:A"), vec![], None)
        .await
        .unwrap();

    let entity = handler.get_bean(&ctx, guid, name::GLOSSARY).await.unwrap();
    assert_eq!(entity.qualified_name(), Some("Glossary:A"));

    handler
        .update_bean(&ctx, guid, name::GLOSSARY, named_properties("Glossary:A2"), false)
        .await
        .unwrap();
    let entity = handler.get_bean(&ctx, guid, name::GLOSSARY).await.unwrap();
    assert_eq!(entity.qualified_name(), Some("Glossary:A2"));
    assert_eq!(entity.version, 2);

    handler.delete_bean(&ctx, guid, name::GLOSSARY).await.unwrap();
    let err = handler.get_bean(&ctx, guid, name::GLOSSARY).await.unwrap_err();
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn empty_user_id_is_rejected_before_any_work() {
    let handler = open_handler();
    let ctx = CallContext::new("");
    let err = handler
        .create_bean(&ctx, name::GLOSSARY, named_properties("Glossary:A"), vec![], None)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn duplicate_qualified_names_conflict() {
    let handler = open_handler();
    let ctx = CallContext::new("kim");

    handler
        .create_bean(&ctx, name::GLOSSARY, named_properties("Glossary:A"), vec![], None)
        .await
        .unwrap();
    let err = handler
        .create_bean(&ctx, name::GLOSSARY, named_properties("Glossary:A"), vec![], None)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 409);

    // duplicate-processing passes skip the uniqueness gate
    let dup_ctx = CallContext::new("kim").for_duplicate_processing();
    handler
        .create_bean(&dup_ctx, name::GLOSSARY, named_properties("Glossary:A"), vec![], None)
        .await
        .unwrap();
}

#[tokio::test]
async fn update_may_keep_its_own_qualified_name() {
    let handler = open_handler();
    let ctx = CallContext::new("kim");

    let a = handler
        .create_bean(&ctx, name::GLOSSARY, named_properties("Glossary:A"), vec![], None)
        .await
        .unwrap();
    handler
        .create_bean(&ctx, name::GLOSSARY, named_properties("Glossary:B"), vec![], None)
        .await
        .unwrap();

    // same name on itself is fine
    handler
        .update_bean(&ctx, a, name::GLOSSARY, named_properties("Glossary:A"), false)
        .await
        .unwrap();
    // stealing another live name is not
    let err = handler
        .update_bean(&ctx, a, name::GLOSSARY, named_properties("Glossary:B"), false)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 409);
}

#[tokio::test]
async fn zone_visibility_is_enforced() {
    let store = Arc::new(InMemoryMetadataStore::new());
    let curated = GenericHandler::new(
        store.clone(),
        TypeRegistry::builtin(),
        ZonePolicy {
            supported_zones: vec!["curated".into()],
            default_zones: vec!["curated".into()],
        },
    );
    let production_only = GenericHandler::new(
        store,
        TypeRegistry::builtin(),
        ZonePolicy {
            supported_zones: vec!["production".into()],
            default_zones: vec![],
        },
    );
    let ctx = CallContext::new("kim");

    let guid = curated
        .create_bean(&ctx, name::GLOSSARY, named_properties("Glossary:A"), vec![], None)
        .await
        .unwrap();
    // visible through the creating service
    curated.get_bean(&ctx, guid, name::GLOSSARY).await.unwrap();
    // invisible through a service supporting disjoint zones
    let err = production_only
        .get_bean(&ctx, guid, name::GLOSSARY)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 403);
}

#[tokio::test]
async fn effectivity_filters_point_in_time_reads() {
    let handler = open_handler();
    let ctx = CallContext::new("kim");

    let from = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
    let properties = PropertyBuilder::new()
        .set_string(name::QUALIFIED_NAME, "Glossary:Windowed")
        .unwrap()
        .effectivity(Some(from), Some(to))
        .unwrap()
        .build();
    let guid = handler
        .create_bean(&ctx, name::GLOSSARY, properties, vec![], None)
        .await
        .unwrap();

    let before = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let inside = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();

    let err = handler
        .get_bean(&CallContext::new("kim").at_time(before), guid, name::GLOSSARY)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 404);

    handler
        .get_bean(&CallContext::new("kim").at_time(inside), guid, name::GLOSSARY)
        .await
        .unwrap();

    // lineage traversals see through the window
    handler
        .get_bean(
            &CallContext::new("kim").at_time(before).for_lineage(),
            guid,
            name::GLOSSARY,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn anchor_cascade_removes_dependents_and_links() {
    let store = Arc::new(InMemoryMetadataStore::new());
    let handler = GenericHandler::new(store.clone(), TypeRegistry::builtin(), ZonePolicy::open());
    let ctx = CallContext::new("kim");

    let glossary = handler
        .create_bean(&ctx, name::GLOSSARY, named_properties("Glossary:A"), vec![], None)
        .await
        .unwrap();
    let category = handler
        .create_bean(
            &ctx,
            name::GLOSSARY_CATEGORY,
            named_properties("Category:C1"),
            vec![],
            Some(glossary),
        )
        .await
        .unwrap();
    // an anchor chained off the category
    handler
        .create_bean(
            &ctx,
            name::GLOSSARY_TERM,
            named_properties("Term:T1"),
            vec![],
            Some(category),
        )
        .await
        .unwrap();
    handler
        .link_elements(
            &ctx,
            name::CATEGORY_ANCHOR,
            glossary,
            category,
            InstanceProperties::new(),
        )
        .await
        .unwrap();

    assert_eq!(store.live_entity_count().await, 3);
    assert_eq!(store.live_relationship_count().await, 1);

    handler.delete_bean(&ctx, glossary, name::GLOSSARY).await.unwrap();

    assert_eq!(store.live_entity_count().await, 0);
    assert_eq!(store.live_relationship_count().await, 0);
}

#[tokio::test]
async fn duplicate_links_conflict_and_missing_unlinks_404() {
    let handler = open_handler();
    let ctx = CallContext::new("kim");

    let glossary = handler
        .create_bean(&ctx, name::GLOSSARY, named_properties("Glossary:A"), vec![], None)
        .await
        .unwrap();
    let category = handler
        .create_bean(
            &ctx,
            name::GLOSSARY_CATEGORY,
            named_properties("Category:C1"),
            vec![],
            None,
        )
        .await
        .unwrap();

    handler
        .link_elements(
            &ctx,
            name::CATEGORY_ANCHOR,
            glossary,
            category,
            InstanceProperties::new(),
        )
        .await
        .unwrap();
    let err = handler
        .link_elements(
            &ctx,
            name::CATEGORY_ANCHOR,
            glossary,
            category,
            InstanceProperties::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 409);

    handler
        .unlink_elements(&ctx, name::CATEGORY_ANCHOR, glossary, category)
        .await
        .unwrap();
    let err = handler
        .unlink_elements(&ctx, name::CATEGORY_ANCHOR, glossary, category)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn type_checks_guard_every_operation() {
    let handler = open_handler();
    let ctx = CallContext::new("kim");

    let err = handler
        .create_bean(&ctx, "NoSuchType", named_properties("X:1"), vec![], None)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 422);

    let glossary = handler
        .create_bean(&ctx, name::GLOSSARY, named_properties("Glossary:A"), vec![], None)
        .await
        .unwrap();
    let err = handler
        .get_bean(&ctx, glossary, name::COLLECTION)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 422);

    // wrong end types on a link
    let collection = handler
        .create_bean(
            &ctx,
            name::COLLECTION,
            named_properties("Collection:Q"),
            vec![],
            None,
        )
        .await
        .unwrap();
    let err = handler
        .link_elements(
            &ctx,
            name::CATEGORY_ANCHOR,
            collection,
            glossary,
            InstanceProperties::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 422);

    // classification scoped to glossaries only
    let err = handler
        .set_classification(&ctx, collection, name::TAXONOMY, InstanceProperties::new())
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 422);
}

#[tokio::test]
async fn find_beans_pages_after_filtering() {
    let handler = open_handler();
    let ctx = CallContext::new("kim");

    for i in 0..5 {
        handler
            .create_bean(
                &ctx,
                name::GLOSSARY,
                named_properties(&format!("Glossary:Set{i}")),
                vec![],
                None,
            )
            .await
            .unwrap();
    }

    let page_one = handler
        .find_beans(
            &ctx,
            name::GLOSSARY,
            "Set",
            false,
            &[name::QUALIFIED_NAME.to_string()],
            0,
            2,
        )
        .await
        .unwrap();
    let page_two = handler
        .find_beans(
            &ctx,
            name::GLOSSARY,
            "Set",
            false,
            &[name::QUALIFIED_NAME.to_string()],
            2,
            2,
        )
        .await
        .unwrap();
    assert_eq!(page_one.len(), 2);
    assert_eq!(page_two.len(), 2);
    assert_ne!(page_one[0].guid, page_two[0].guid);

    let attached = handler
        .get_attached(&ctx, page_one[0].guid, name::CATEGORY_ANCHOR, AttachmentEnd::One)
        .await
        .unwrap();
    assert!(attached.is_empty());
}
