//! User-owned document templates with public sharing
//!
//! Private records live under `templates/{user_id}/{template_id}`; a
//! public template is mirrored in full under
//! `public_templates/{template_id}` so other users can list it. The two
//! writes are not atomic and a crash between them can leave the mirror
//! out of step, so update and delete re-synchronize both locations
//! whenever visibility is touched.

use uuid::Uuid;

use crate::error::{QuillbaseError, Result};
use crate::tree::{Snapshot, TreeClient};
use crate::types::{is_anonymous, now_ts, Template};
use crate::warnings::WarningChannel;

/// Partial update for [`TemplateStore::update`].
///
/// `None` means "leave unchanged". Passing `is_public`, even with the
/// value it already has, re-derives the public mirror.
#[derive(Debug, Clone, Default)]
pub struct TemplateUpdate {
    /// New display name
    pub template_name: Option<String>,
    /// New ordered section headings
    pub sections: Option<Vec<String>>,
    /// New description
    pub description: Option<String>,
    /// New visibility
    pub is_public: Option<bool>,
}

/// Store for document templates.
#[derive(Clone)]
pub struct TemplateStore {
    db: Option<TreeClient>,
    warnings: WarningChannel,
}

impl TemplateStore {
    pub(crate) fn new(db: Option<TreeClient>, warnings: WarningChannel) -> Self {
        Self { db, warnings }
    }

    fn db(&self) -> Result<&TreeClient> {
        self.db.as_ref().ok_or(QuillbaseError::NotConfigured)
    }

    /// Saves a new template and returns the stored record.
    ///
    /// Public templates are mirrored into the public index in a second,
    /// non-atomic write.
    pub async fn save(
        &self,
        user_id: &str,
        template_name: &str,
        sections: &[String],
        description: &str,
        is_public: bool,
    ) -> Result<Template> {
        let db = self.db()?;
        if is_anonymous(Some(user_id)) {
            return Err(QuillbaseError::Validation(
                "Please login to save templates".to_string(),
            ));
        }
        if template_name.is_empty() || sections.is_empty() {
            return Err(QuillbaseError::Validation(
                "Template name and sections are required".to_string(),
            ));
        }

        let now = now_ts();
        let template = Template {
            template_id: Uuid::new_v4().to_string(),
            template_name: template_name.to_string(),
            sections: sections.to_vec(),
            description: description.to_string(),
            user_id: user_id.to_string(),
            is_public,
            created_at: now,
            updated_at: now,
            is_public_shared: false,
        };
        let record = serde_json::to_value(&template)?;

        db.root()
            .child("templates")
            .child(user_id)
            .child(&template.template_id)
            .set(&record)
            .await?;
        if is_public {
            db.root()
                .child("public_templates")
                .child(&template.template_id)
                .set(&record)
                .await?;
        }

        self.warnings.clear();
        Ok(template)
    }

    /// Lists templates visible to a user, most recently updated first.
    ///
    /// The user's own templates come first-hand from their private
    /// subtree; with `include_public`, foreign entries from the public
    /// index are appended with `is_public_shared = true`. The user's own
    /// mirrors are skipped so a shared template never shows up twice for
    /// its owner.
    pub async fn list(&self, user_id: &str, include_public: bool) -> Vec<Template> {
        let Some(db) = &self.db else {
            return Vec::new();
        };

        let mut templates: Vec<Template> = Vec::new();

        if !is_anonymous(Some(user_id)) {
            if let Ok(snapshot) = db.root().child("templates").child(user_id).get().await {
                templates.extend(
                    snapshot
                        .children()
                        .into_iter()
                        .filter_map(|(_, child)| child.decode::<Template>().ok().flatten()),
                );
            }
        }

        if include_public {
            if let Ok(snapshot) = db.root().child("public_templates").get().await {
                templates.extend(
                    snapshot
                        .children()
                        .into_iter()
                        .filter_map(|(_, child)| child.decode::<Template>().ok().flatten())
                        .filter(|template| template.user_id != user_id)
                        .map(|mut template| {
                            template.is_public_shared = true;
                            template
                        }),
                );
            }
        }

        templates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        self.warnings.clear();
        templates
    }

    /// Fetches one template: the user's own record first, then the
    /// public index.
    pub async fn get(&self, template_id: &str, user_id: Option<&str>) -> Option<Template> {
        let db = self.db.as_ref()?;

        if let Some(user_id) = user_id.filter(|id| !is_anonymous(Some(*id))) {
            let snapshot = db
                .root()
                .child("templates")
                .child(user_id)
                .child(template_id)
                .get()
                .await
                .ok()?;
            if let Ok(Some(template)) = snapshot.decode::<Template>() {
                return Some(template);
            }
        }

        let snapshot = db
            .root()
            .child("public_templates")
            .child(template_id)
            .get()
            .await
            .ok()?;
        snapshot.decode::<Template>().ok().flatten()
    }

    /// Applies a partial update to an existing template.
    ///
    /// Whenever `is_public` is explicitly passed the public mirror is
    /// re-derived (written when public, removed when private) even if
    /// the value did not change, which re-synchronizes a mirror left
    /// stale by an earlier partial failure.
    pub async fn update(
        &self,
        template_id: &str,
        user_id: &str,
        update: TemplateUpdate,
    ) -> Result<Template> {
        let db = self.db()?;
        if is_anonymous(Some(user_id)) {
            return Err(QuillbaseError::Validation("Invalid user ID".to_string()));
        }

        let template_ref = db
            .root()
            .child("templates")
            .child(user_id)
            .child(template_id);
        let mut template = match template_ref.get().await?.decode::<Template>()? {
            Some(template) => template,
            None => {
                return Err(QuillbaseError::NotFound("Template not found".to_string()));
            }
        };

        template.updated_at = now_ts();
        if let Some(template_name) = update.template_name {
            template.template_name = template_name;
        }
        if let Some(sections) = update.sections {
            template.sections = sections;
        }
        if let Some(description) = update.description {
            template.description = description;
        }

        let mirror_ref = db.root().child("public_templates").child(template_id);
        if let Some(is_public) = update.is_public {
            template.is_public = is_public;
            if is_public {
                mirror_ref.set(&serde_json::to_value(&template)?).await?;
            } else {
                mirror_ref.remove().await?;
            }
        }

        template_ref.set(&serde_json::to_value(&template)?).await?;
        self.warnings.clear();
        Ok(template)
    }

    /// Deletes a template, removing its public mirror first when the
    /// private record says it has one.
    pub async fn delete(&self, template_id: &str, user_id: &str) -> bool {
        let Some(db) = &self.db else {
            return false;
        };
        if is_anonymous(Some(user_id)) {
            return false;
        }

        match self.delete_inner(db, template_id, user_id).await {
            Ok(()) => {
                self.warnings.clear();
                true
            }
            Err(err) => {
                self.warnings
                    .record(format!("Error deleting template: {err}"));
                false
            }
        }
    }

    async fn delete_inner(
        &self,
        db: &TreeClient,
        template_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let template_ref = db
            .root()
            .child("templates")
            .child(user_id)
            .child(template_id);

        let is_public = matches!(
            template_ref.get().await?,
            Snapshot::Object(ref map) if map.get("is_public").and_then(serde_json::Value::as_bool).unwrap_or(false)
        );
        if is_public {
            db.root()
                .child("public_templates")
                .child(template_id)
                .remove()
                .await?;
        }
        template_ref.remove().await
    }
}
