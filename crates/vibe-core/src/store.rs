//! Projects and gallery
//!
//! Persistence is an injected collaborator: the traits here are what the
//! server depends on, the dashmap-backed implementations are what it runs
//! with by default. All project access is scoped to the owner; a project
//! owned by someone else is indistinguishable from a missing one.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Authenticated user identifier, as issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// # Errors
    /// Returns error for a blank id
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(StoreError::Invalid {
                field: "user id",
                message: "must not be blank".to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique project identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub Ulid);

impl ProjectId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProjectId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|_| StoreError::not_found("project", s))
    }
}

/// How a project's page was produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Image,
}

/// Saved page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub owner: UserId,
    pub name: String,
    pub description: Option<String>,
    pub input_type: InputType,
    /// Prompt text or image reference the page was generated from
    pub input_data: Option<serde_json::Value>,
    pub html: String,
    pub css: String,
    pub metadata: Option<serde_json::Value>,
    pub vibe_score: Option<u8>,
    pub style_type: Option<String>,
    pub is_public: bool,
    pub deployed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a project being created
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub input_type: InputType,
    pub input_data: Option<serde_json::Value>,
    pub html: String,
    pub css: String,
    pub metadata: Option<serde_json::Value>,
    pub vibe_score: Option<u8>,
    pub style_type: Option<String>,
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub html: Option<String>,
    pub css: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub vibe_score: Option<u8>,
    pub style_type: Option<String>,
    pub is_public: Option<bool>,
    pub deployed: Option<bool>,
}

impl ProjectUpdate {
    fn apply(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name;
        }
        if let Some(description) = self.description {
            project.description = Some(description);
        }
        if let Some(html) = self.html {
            project.html = html;
        }
        if let Some(css) = self.css {
            project.css = css;
        }
        if let Some(metadata) = self.metadata {
            project.metadata = Some(metadata);
        }
        if let Some(score) = self.vibe_score {
            project.vibe_score = Some(score.min(100));
        }
        if let Some(style) = self.style_type {
            project.style_type = Some(style);
        }
        if let Some(public) = self.is_public {
            project.is_public = public;
        }
        if let Some(deployed) = self.deployed {
            project.deployed = deployed;
        }
    }
}

/// Owner-scoped project persistence
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// # Errors
    /// Invalid fields
    async fn create(&self, owner: &UserId, project: NewProject) -> Result<Project, StoreError>;

    /// # Errors
    /// [`StoreError::NotFound`] if missing or owned by someone else
    async fn get(&self, owner: &UserId, id: ProjectId) -> Result<Project, StoreError>;

    /// Owner's projects, newest first
    ///
    /// # Errors
    /// Backend failures
    async fn list(&self, owner: &UserId) -> Result<Vec<Project>, StoreError>;

    /// # Errors
    /// [`StoreError::NotFound`] if missing or owned by someone else
    async fn update(&self, owner: &UserId, id: ProjectId, update: ProjectUpdate) -> Result<Project, StoreError>;

    /// Remove and return the project
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if missing or owned by someone else
    async fn delete(&self, owner: &UserId, id: ProjectId) -> Result<Project, StoreError>;

    /// Projects the owner created at or after `since`
    ///
    /// # Errors
    /// Backend failures
    async fn count_created_since(&self, owner: &UserId, since: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// In-memory [`ProjectStore`]
#[derive(Debug, Default)]
pub struct InMemoryProjectStore {
    projects: DashMap<ProjectId, Project>,
}

impl InMemoryProjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn create_at(&self, owner: &UserId, new: NewProject, now: DateTime<Utc>) -> Result<Project, StoreError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(StoreError::Invalid {
                field: "name",
                message: "must not be blank".to_owned(),
            });
        }
        let project = Project {
            id: ProjectId::new(),
            owner: owner.clone(),
            name: name.to_owned(),
            description: new.description,
            input_type: new.input_type,
            input_data: new.input_data,
            html: new.html,
            css: new.css,
            metadata: new.metadata,
            vibe_score: new.vibe_score.map(|s| s.min(100)),
            style_type: new.style_type,
            is_public: false,
            deployed: false,
            created_at: now,
            updated_at: now,
        };
        self.projects.insert(project.id, project.clone());
        tracing::debug!(project = %project.id, owner = %owner, "Created project");
        Ok(project)
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn create(&self, owner: &UserId, project: NewProject) -> Result<Project, StoreError> {
        self.create_at(owner, project, Utc::now())
    }

    async fn get(&self, owner: &UserId, id: ProjectId) -> Result<Project, StoreError> {
        self.projects
            .get(&id)
            .filter(|p| &p.owner == owner)
            .map(|p| p.clone())
            .ok_or_else(|| StoreError::not_found("project", id))
    }

    async fn list(&self, owner: &UserId) -> Result<Vec<Project>, StoreError> {
        let mut projects: Vec<Project> = self
            .projects
            .iter()
            .filter(|entry| &entry.owner == owner)
            .map(|entry| entry.value().clone())
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(projects)
    }

    async fn update(&self, owner: &UserId, id: ProjectId, update: ProjectUpdate) -> Result<Project, StoreError> {
        let mut entry = self
            .projects
            .get_mut(&id)
            .filter(|p| &p.owner == owner)
            .ok_or_else(|| StoreError::not_found("project", id))?;
        update.apply(&mut entry);
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete(&self, owner: &UserId, id: ProjectId) -> Result<Project, StoreError> {
        self.projects
            .remove_if(&id, |_, p| &p.owner == owner)
            .map(|(_, p)| p)
            .ok_or_else(|| StoreError::not_found("project", id))
    }

    async fn count_created_since(&self, owner: &UserId, since: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self
            .projects
            .iter()
            .filter(|p| &p.owner == owner && p.created_at >= since)
            .count())
    }
}

/// Gallery entry identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GalleryId(pub Ulid);

impl std::fmt::Display for GalleryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GalleryId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|_| StoreError::not_found("gallery item", s))
    }
}

/// Published page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub id: GalleryId,
    pub title: String,
    pub author: UserId,
    /// Thumbnail as a data URL
    pub image: Option<String>,
    pub tags: Vec<String>,
    pub likes: u32,
    pub html: String,
    pub css: String,
    pub created_at: DateTime<Utc>,
}

/// Publish request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewGalleryItem {
    /// Prompt the page came from; becomes the title
    pub prompt: String,
    pub style: String,
    pub image: Option<String>,
    pub html: String,
    pub css: String,
}

/// Title shown in the gallery: the prompt, cut at 30 characters
#[must_use]
pub fn gallery_title(prompt: &str) -> String {
    const MAX: usize = 30;
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return "Untitled Project".to_owned();
    }
    if prompt.chars().count() > MAX {
        let cut: String = prompt.chars().take(MAX).collect();
        format!("{cut}...")
    } else {
        prompt.to_owned()
    }
}

/// Published-page persistence
#[async_trait]
pub trait GalleryStore: Send + Sync {
    /// # Errors
    /// Invalid fields
    async fn publish(&self, author: &UserId, item: NewGalleryItem) -> Result<GalleryItem, StoreError>;

    /// Newest first, at most `limit`
    ///
    /// # Errors
    /// Backend failures
    async fn list(&self, limit: usize) -> Result<Vec<GalleryItem>, StoreError>;

    /// Only the author may unpublish
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if missing or published by someone else
    async fn delete(&self, author: &UserId, id: GalleryId) -> Result<(), StoreError>;
}

/// In-memory [`GalleryStore`]
#[derive(Debug, Default)]
pub struct InMemoryGalleryStore {
    items: DashMap<GalleryId, GalleryItem>,
}

impl InMemoryGalleryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GalleryStore for InMemoryGalleryStore {
    async fn publish(&self, author: &UserId, item: NewGalleryItem) -> Result<GalleryItem, StoreError> {
        if item.html.trim().is_empty() {
            return Err(StoreError::Invalid {
                field: "html",
                message: "nothing to publish".to_owned(),
            });
        }
        let mut tags = Vec::with_capacity(2);
        if !item.style.trim().is_empty() {
            tags.push(item.style.trim().to_owned());
        }
        tags.push("Community".to_owned());

        let published = GalleryItem {
            id: GalleryId(Ulid::new()),
            title: gallery_title(&item.prompt),
            author: author.clone(),
            image: item.image,
            tags,
            likes: 0,
            html: item.html,
            css: item.css,
            created_at: Utc::now(),
        };
        self.items.insert(published.id, published.clone());
        tracing::info!(item = %published.id, author = %author, "Published to gallery");
        Ok(published)
    }

    async fn list(&self, limit: usize) -> Result<Vec<GalleryItem>, StoreError> {
        let mut items: Vec<GalleryItem> = self.items.iter().map(|e| e.value().clone()).collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        items.truncate(limit);
        Ok(items)
    }

    async fn delete(&self, author: &UserId, id: GalleryId) -> Result<(), StoreError> {
        self.items
            .remove_if(&id, |_, item| &item.author == author)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("gallery item", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn named(name: &str) -> NewProject {
        NewProject {
            name: name.to_owned(),
            html: "<html></html>".to_owned(),
            ..NewProject::default()
        }
    }

    #[tokio::test]
    async fn projects_are_owner_scoped() {
        let store = InMemoryProjectStore::new();
        let alice = user("alice");
        let bob = user("bob");
        let project = store.create(&alice, named("Landing")).await.unwrap();

        assert!(store.get(&alice, project.id).await.is_ok());
        assert!(matches!(store.get(&bob, project.id).await, Err(StoreError::NotFound { .. })));
        assert!(store.update(&bob, project.id, ProjectUpdate::default()).await.is_err());
        assert!(store.delete(&bob, project.id).await.is_err());
        assert!(store.list(&bob).await.unwrap().is_empty());
        assert!(store.delete(&alice, project.id).await.is_ok());
        assert!(store.get(&alice, project.id).await.is_err());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = InMemoryProjectStore::new();
        let alice = user("alice");
        let now = Utc::now();
        store.create_at(&alice, named("old"), now - Duration::days(2)).unwrap();
        store.create_at(&alice, named("new"), now).unwrap();
        let names: Vec<_> = store.list(&alice).await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["new", "old"]);
        assert_eq!(store.count_created_since(&alice, now - Duration::days(1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_is_partial() {
        let store = InMemoryProjectStore::new();
        let alice = user("alice");
        let project = store.create(&alice, named("Landing")).await.unwrap();
        let update = ProjectUpdate {
            is_public: Some(true),
            vibe_score: Some(250),
            ..ProjectUpdate::default()
        };
        let updated = store.update(&alice, project.id, update).await.unwrap();
        assert_eq!(updated.name, "Landing");
        assert!(updated.is_public);
        assert_eq!(updated.vibe_score, Some(100));
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let store = InMemoryProjectStore::new();
        assert!(store.create(&user("alice"), named("  ")).await.is_err());
        assert!(UserId::new(" ").is_err());
    }

    #[tokio::test]
    async fn gallery_titles_tags_and_ownership() {
        let gallery = InMemoryGalleryStore::new();
        let alice = user("alice");
        let item = gallery
            .publish(
                &alice,
                NewGalleryItem {
                    prompt: "A landing page for a very fancy coffee roastery".to_owned(),
                    style: "Playful".to_owned(),
                    html: "<html></html>".to_owned(),
                    ..NewGalleryItem::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(item.title, "A landing page for a very fanc...");
        assert_eq!(item.tags, ["Playful", "Community"]);
        assert_eq!(gallery.list(10).await.unwrap().len(), 1);

        assert!(gallery.delete(&user("bob"), item.id).await.is_err());
        gallery.delete(&alice, item.id).await.unwrap();
        assert!(gallery.list(10).await.unwrap().is_empty());
    }

    #[test]
    fn untitled_when_no_prompt() {
        assert_eq!(gallery_title(""), "Untitled Project");
        assert_eq!(gallery_title("Short"), "Short");
    }
}
