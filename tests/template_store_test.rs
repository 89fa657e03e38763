//! Template store integration tests
//!
//! Drives `src/store/templates.rs` against the fake tree backend:
//!
//! - Saving a public template fans out to the public index; other users
//!   see it tagged `is_public_shared` while the owner never sees a
//!   duplicate.
//! - `get` prefers the caller's own record and falls back to the public
//!   index.
//! - Updating with `is_public = false` removes the mirror but keeps the
//!   private record; updating a missing template reports not-found.
//! - Deleting a public template removes both records.
//! - Validation: anonymous users cannot save, and a name and at least
//!   one section are required.

mod common;

use serde_json::json;

use quillbase::{QuillbaseError, TemplateUpdate};

fn sections(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_save_private_template_writes_single_record() {
    let (_server, fake, client) = common::backend().await;

    let template = client
        .templates()
        .save("u1", "Blog post", &sections(&["Intro", "Body"]), "", false)
        .await
        .expect("save");

    assert!(!template.is_public);
    assert!(fake
        .value_at(&["templates", "u1", &template.template_id])
        .is_object());
    assert_eq!(fake.value_at(&["public_templates"]), json!(null));
}

#[tokio::test]
async fn test_public_template_fans_out_to_public_index() {
    let (_server, fake, client) = common::backend().await;
    let store = client.templates();

    let template = store
        .save("u1", "Shared outline", &sections(&["One"]), "desc", true)
        .await
        .expect("save");

    let mirror = fake.value_at(&["public_templates", &template.template_id]);
    assert_eq!(mirror["template_name"], json!("Shared outline"));
    assert_eq!(mirror["user_id"], json!("u1"));

    // Another user sees it, tagged as shared.
    let visible = store.list("u2", true).await;
    assert_eq!(visible.len(), 1);
    assert!(visible[0].is_public_shared);
    assert_eq!(visible[0].template_name, "Shared outline");

    // The owner sees exactly one copy, untagged.
    let own = store.list("u1", true).await;
    assert_eq!(own.len(), 1);
    assert!(!own[0].is_public_shared);
}

#[tokio::test]
async fn test_list_sorts_most_recently_updated_first() {
    let (_server, fake, client) = common::backend().await;
    fake.seed(
        &["templates", "u1", "t-old"],
        json!({
            "template_id": "t-old",
            "template_name": "Old",
            "sections": ["A"],
            "user_id": "u1",
            "created_at": 100,
            "updated_at": 100
        }),
    );
    fake.seed(
        &["templates", "u1", "t-new"],
        json!({
            "template_id": "t-new",
            "template_name": "New",
            "sections": ["A"],
            "user_id": "u1",
            "created_at": 100,
            "updated_at": 500
        }),
    );

    let templates = client.templates().list("u1", false).await;
    assert_eq!(templates.len(), 2);
    assert_eq!(templates[0].template_id, "t-new");
    assert_eq!(templates[1].template_id, "t-old");
}

#[tokio::test]
async fn test_get_prefers_own_record_then_public_index() {
    let (_server, _fake, client) = common::backend().await;
    let store = client.templates();

    let shared = store
        .save("owner", "Shared", &sections(&["S"]), "", true)
        .await
        .expect("save");
    let private = store
        .save("reader", "Private", &sections(&["P"]), "", false)
        .await
        .expect("save");

    let got = store
        .get(&private.template_id, Some("reader"))
        .await
        .expect("own template");
    assert_eq!(got.template_name, "Private");

    // A foreign public template is reachable through the index.
    let got = store
        .get(&shared.template_id, Some("reader"))
        .await
        .expect("public template");
    assert_eq!(got.template_name, "Shared");

    // A foreign private template is not.
    assert!(store.get(&private.template_id, Some("owner")).await.is_none());
}

#[tokio::test]
async fn test_update_edits_fields_in_place() {
    let (_server, fake, client) = common::backend().await;
    let store = client.templates();

    let template = store
        .save("u1", "Draft", &sections(&["One"]), "old", false)
        .await
        .expect("save");

    let updated = store
        .update(
            &template.template_id,
            "u1",
            TemplateUpdate {
                template_name: Some("Final".to_string()),
                description: Some("new".to_string()),
                ..TemplateUpdate::default()
            },
        )
        .await
        .expect("update");

    assert_eq!(updated.template_name, "Final");
    assert_eq!(updated.description, "new");
    assert_eq!(updated.sections, sections(&["One"]));
    assert_eq!(
        fake.value_at(&["templates", "u1", &template.template_id, "template_name"]),
        json!("Final")
    );
}

#[tokio::test]
async fn test_update_making_private_removes_public_mirror() {
    let (_server, fake, client) = common::backend().await;
    let store = client.templates();

    let template = store
        .save("u1", "Shared", &sections(&["One"]), "", true)
        .await
        .expect("save");
    assert!(fake
        .value_at(&["public_templates", &template.template_id])
        .is_object());

    let updated = store
        .update(
            &template.template_id,
            "u1",
            TemplateUpdate {
                is_public: Some(false),
                ..TemplateUpdate::default()
            },
        )
        .await
        .expect("update");

    assert!(!updated.is_public);
    assert_eq!(
        fake.value_at(&["public_templates", &template.template_id]),
        json!(null)
    );
    assert!(fake
        .value_at(&["templates", "u1", &template.template_id])
        .is_object());
}

#[tokio::test]
async fn test_update_making_public_writes_mirror() {
    let (_server, fake, client) = common::backend().await;
    let store = client.templates();

    let template = store
        .save("u1", "Quiet", &sections(&["One"]), "", false)
        .await
        .expect("save");

    store
        .update(
            &template.template_id,
            "u1",
            TemplateUpdate {
                is_public: Some(true),
                ..TemplateUpdate::default()
            },
        )
        .await
        .expect("update");

    let mirror = fake.value_at(&["public_templates", &template.template_id]);
    assert_eq!(mirror["template_name"], json!("Quiet"));
    assert_eq!(mirror["is_public"], json!(true));
}

#[tokio::test]
async fn test_update_missing_template_is_not_found() {
    let (_server, _fake, client) = common::backend().await;
    let err = client
        .templates()
        .update("no-such-id", "u1", TemplateUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, QuillbaseError::NotFound(_)));
    assert_eq!(err.to_string(), "Template not found");
}

#[tokio::test]
async fn test_delete_public_template_removes_both_records() {
    let (_server, fake, client) = common::backend().await;
    let store = client.templates();

    let template = store
        .save("u1", "Shared", &sections(&["One"]), "", true)
        .await
        .expect("save");

    assert!(store.delete(&template.template_id, "u1").await);
    assert_eq!(
        fake.value_at(&["templates", "u1", &template.template_id]),
        json!(null)
    );
    assert_eq!(
        fake.value_at(&["public_templates", &template.template_id]),
        json!(null)
    );
}

#[tokio::test]
async fn test_delete_for_anonymous_is_false() {
    let (_server, _fake, client) = common::backend().await;
    assert!(!client.templates().delete("t1", "anonymous").await);
}

#[tokio::test]
async fn test_save_requires_login() {
    let (_server, _fake, client) = common::backend().await;
    let err = client
        .templates()
        .save("anonymous", "Name", &sections(&["One"]), "", false)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Please login to save templates");
}

#[tokio::test]
async fn test_save_requires_name_and_sections() {
    let (_server, _fake, client) = common::backend().await;
    let store = client.templates();

    let err = store
        .save("u1", "", &sections(&["One"]), "", false)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Template name and sections are required");

    let err = store.save("u1", "Name", &[], "", false).await.unwrap_err();
    assert_eq!(err.to_string(), "Template name and sections are required");
}
