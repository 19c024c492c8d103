//! Tool records and their SQLite-backed store.
//!
//! The store is constructed once in `main` and injected through app state;
//! there is no module-level connection. Description blocks are kept as a
//! JSON column since they are only ever read and written whole.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("a tool with the same id or slug already exists")]
    Conflict,
    #[error("catalog database failure")]
    Db(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionBlock {
    pub image: String,
    pub text: String,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    Iframe,
    React,
}

impl AppType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Iframe => "iframe",
            Self::React => "react",
        }
    }

    fn from_column(s: &str) -> Self {
        match s {
            "react" => Self::React,
            _ => Self::Iframe,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tool {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub description: Vec<DescriptionBlock>,
    pub thumbnail: String,
    pub slug: String,
    pub app_type: AppType,
    pub embed_html: Option<String>,
    /// Storage reference of the uploaded archive; internal, never shown to
    /// clients.
    pub archive_ref: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Tool {
    /// Relative URL a frontend embeds the tool under.
    pub fn embed_url(&self) -> String {
        match self.app_type {
            AppType::React => format!("{}/{}/", crate::MOUNT_PREFIX, self.slug),
            AppType::Iframe => format!("/mini-tools/{}", self.slug),
        }
    }
}

/// Creation payload; `id` defaults to a fresh UUID when absent.
#[derive(Debug, Deserialize)]
pub struct NewTool {
    pub id: Option<String>,
    pub title: String,
    pub summary: String,
    pub description: Vec<DescriptionBlock>,
    pub thumbnail: String,
    pub slug: String,
    pub app_type: Option<AppType>,
    pub embed_html: Option<String>,
}

/// Partial update; absent fields keep their stored value. The id, slug and
/// archive reference are deliberately not client-assignable.
#[derive(Debug, Default, Deserialize)]
pub struct ToolUpdate {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<Vec<DescriptionBlock>>,
    pub thumbnail: Option<String>,
    pub app_type: Option<AppType>,
    pub embed_html: Option<String>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tools (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    summary     TEXT NOT NULL,
    description TEXT NOT NULL,
    thumbnail   TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    app_type    TEXT NOT NULL DEFAULT 'iframe',
    embed_html  TEXT,
    archive_ref TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
";

const COLUMNS: &str = "id, title, summary, description, thumbnail, slug, \
                       app_type, embed_html, archive_ref, created_at, updated_at";

pub struct ToolStore {
    conn: Mutex<Connection>,
}

impl ToolStore {
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn insert(&self, new: NewTool) -> Result<Tool, CatalogError> {
        let now = chrono::Utc::now().to_rfc3339();
        let tool = Tool {
            id: new.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            title: new.title,
            summary: new.summary,
            description: new.description,
            thumbnail: new.thumbnail,
            slug: new.slug.to_lowercase(),
            app_type: new.app_type.unwrap_or(AppType::Iframe),
            embed_html: new.embed_html,
            archive_ref: None,
            created_at: now.clone(),
            updated_at: now,
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tools (id, title, summary, description, thumbnail, slug, \
             app_type, embed_html, archive_ref, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                tool.id,
                tool.title,
                tool.summary,
                blocks_to_column(&tool.description),
                tool.thumbnail,
                tool.slug,
                tool.app_type.as_str(),
                tool.embed_html,
                tool.archive_ref,
                tool.created_at,
                tool.updated_at,
            ],
        )
        .map_err(map_constraint)?;
        Ok(tool)
    }

    pub fn list(&self) -> Result<Vec<Tool>, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {COLUMNS} FROM tools ORDER BY created_at DESC"))?;
        let tools = stmt
            .query_map([], tool_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tools)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Tool>, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let tool = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM tools WHERE id = ?1"),
                params![id],
                tool_from_row,
            )
            .optional()?;
        Ok(tool)
    }

    pub fn find_by_slug(&self, slug: &str) -> Result<Option<Tool>, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let tool = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM tools WHERE slug = lower(?1)"),
                params![slug],
                tool_from_row,
            )
            .optional()?;
        Ok(tool)
    }

    /// Case-insensitive substring search over title, summary and the
    /// description blocks.
    pub fn search(&self, query: &str) -> Result<Vec<Tool>, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM tools \
             WHERE instr(lower(title), lower(?1)) > 0 \
                OR instr(lower(summary), lower(?1)) > 0 \
                OR instr(lower(description), lower(?1)) > 0 \
             ORDER BY created_at DESC"
        ))?;
        let tools = stmt
            .query_map(params![query], tool_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tools)
    }

    pub fn update(&self, id: &str, update: ToolUpdate) -> Result<Option<Tool>, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let Some(mut tool) = find_by_id_locked(&conn, id)? else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            tool.title = title;
        }
        if let Some(summary) = update.summary {
            tool.summary = summary;
        }
        if let Some(description) = update.description {
            tool.description = description;
        }
        if let Some(thumbnail) = update.thumbnail {
            tool.thumbnail = thumbnail;
        }
        if let Some(app_type) = update.app_type {
            tool.app_type = app_type;
        }
        if let Some(embed_html) = update.embed_html {
            tool.embed_html = Some(embed_html);
        }
        tool.updated_at = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tools SET title = ?2, summary = ?3, description = ?4, thumbnail = ?5, \
             app_type = ?6, embed_html = ?7, updated_at = ?8 WHERE id = ?1",
            params![
                tool.id,
                tool.title,
                tool.summary,
                blocks_to_column(&tool.description),
                tool.thumbnail,
                tool.app_type.as_str(),
                tool.embed_html,
                tool.updated_at,
            ],
        )?;
        Ok(Some(tool))
    }

    /// Removes a record and returns it so the caller can clean up any
    /// stored archive it still references.
    pub fn delete(&self, id: &str) -> Result<Option<Tool>, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let Some(tool) = find_by_id_locked(&conn, id)? else {
            return Ok(None);
        };
        conn.execute("DELETE FROM tools WHERE id = ?1", params![id])?;
        Ok(Some(tool))
    }

    /// Points the tool at a freshly stored archive, marking it a react app.
    /// Returns the updated record together with the previous reference so
    /// the caller can delete the old blob after the repoint.
    pub fn set_archive(
        &self,
        id: &str,
        reference: &str,
    ) -> Result<Option<(Tool, Option<String>)>, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let Some(mut tool) = find_by_id_locked(&conn, id)? else {
            return Ok(None);
        };
        let previous = tool.archive_ref.replace(reference.to_owned());
        tool.app_type = AppType::React;
        tool.updated_at = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tools SET archive_ref = ?2, app_type = ?3, updated_at = ?4 WHERE id = ?1",
            params![tool.id, tool.archive_ref, tool.app_type.as_str(), tool.updated_at],
        )?;
        Ok(Some((tool, previous)))
    }
}

fn find_by_id_locked(conn: &Connection, id: &str) -> Result<Option<Tool>, CatalogError> {
    let tool = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM tools WHERE id = ?1"),
            params![id],
            tool_from_row,
        )
        .optional()?;
    Ok(tool)
}

fn blocks_to_column(blocks: &[DescriptionBlock]) -> String {
    serde_json::to_string(blocks).unwrap_or_else(|_| "[]".to_owned())
}

fn tool_from_row(row: &Row<'_>) -> rusqlite::Result<Tool> {
    let description: String = row.get(3)?;
    let description = serde_json::from_str(&description).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let app_type: String = row.get(6)?;
    Ok(Tool {
        id: row.get(0)?,
        title: row.get(1)?,
        summary: row.get(2)?,
        description,
        thumbnail: row.get(4)?,
        slug: row.get(5)?,
        app_type: AppType::from_column(&app_type),
        embed_html: row.get(7)?,
        archive_ref: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_constraint(e: rusqlite::Error) -> CatalogError {
    match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            CatalogError::Conflict
        }
        other => CatalogError::Db(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str) -> DescriptionBlock {
        DescriptionBlock {
            image: "https://img.example/shot.png".to_owned(),
            text: text.to_owned(),
            orientation: Orientation::Left,
        }
    }

    fn new_tool(id: &str, slug: &str, title: &str) -> NewTool {
        NewTool {
            id: Some(id.to_owned()),
            title: title.to_owned(),
            summary: format!("{title} summary"),
            description: vec![block("does things")],
            thumbnail: "https://img.example/thumb.png".to_owned(),
            slug: slug.to_owned(),
            app_type: None,
            embed_html: None,
        }
    }

    #[test]
    fn insert_and_find_round_trip() {
        let store = ToolStore::open_in_memory().unwrap();
        let tool = store.insert(new_tool("t1", "Calc", "Calculator")).unwrap();
        assert_eq!(tool.slug, "calc"); // stored lowercase
        assert_eq!(tool.app_type, AppType::Iframe);

        let found = store.find_by_id("t1").unwrap().unwrap();
        assert_eq!(found.title, "Calculator");
        assert_eq!(found.description.len(), 1);

        // Slug lookup ignores case
        assert!(store.find_by_slug("CALC").unwrap().is_some());
        assert!(store.find_by_slug("other").unwrap().is_none());
    }

    #[test]
    fn generates_an_id_when_none_is_supplied() {
        let store = ToolStore::open_in_memory().unwrap();
        let mut new = new_tool("ignored", "gen", "Generated");
        new.id = None;
        let tool = store.insert(new).unwrap();
        assert!(!tool.id.is_empty());
        assert!(store.find_by_id(&tool.id).unwrap().is_some());
    }

    #[test]
    fn duplicate_id_or_slug_is_a_conflict() {
        let store = ToolStore::open_in_memory().unwrap();
        store.insert(new_tool("t1", "calc", "Calculator")).unwrap();
        assert!(matches!(
            store.insert(new_tool("t1", "other", "Other")),
            Err(CatalogError::Conflict)
        ));
        assert!(matches!(
            store.insert(new_tool("t2", "calc", "Other")),
            Err(CatalogError::Conflict)
        ));
    }

    #[test]
    fn list_returns_newest_first() {
        let store = ToolStore::open_in_memory().unwrap();
        store.insert(new_tool("t1", "first", "First")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.insert(new_tool("t2", "second", "Second")).unwrap();

        let tools = store.list().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].id, "t2");
        assert_eq!(tools[1].id, "t1");
    }

    #[test]
    fn partial_update_keeps_untouched_fields() {
        let store = ToolStore::open_in_memory().unwrap();
        store.insert(new_tool("t1", "calc", "Calculator")).unwrap();

        let updated = store
            .update(
                "t1",
                ToolUpdate {
                    title: Some("Better Calculator".to_owned()),
                    ..ToolUpdate::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Better Calculator");
        assert_eq!(updated.summary, "Calculator summary");
        assert_eq!(updated.slug, "calc");

        assert!(store.update("missing", ToolUpdate::default()).unwrap().is_none());
    }

    #[test]
    fn delete_returns_the_removed_record() {
        let store = ToolStore::open_in_memory().unwrap();
        store.insert(new_tool("t1", "calc", "Calculator")).unwrap();
        let removed = store.delete("t1").unwrap().unwrap();
        assert_eq!(removed.id, "t1");
        assert!(store.find_by_id("t1").unwrap().is_none());
        assert!(store.delete("t1").unwrap().is_none());
    }

    #[test]
    fn set_archive_flips_app_type_and_reports_the_old_reference() {
        let store = ToolStore::open_in_memory().unwrap();
        store.insert(new_tool("t1", "calc", "Calculator")).unwrap();

        let (tool, previous) = store.set_archive("t1", "storage/a.zip").unwrap().unwrap();
        assert_eq!(tool.app_type, AppType::React);
        assert_eq!(tool.archive_ref.as_deref(), Some("storage/a.zip"));
        assert_eq!(previous, None);
        assert_eq!(tool.embed_url(), "/mini-tools-react/calc/");

        let (_, previous) = store.set_archive("t1", "storage/b.zip").unwrap().unwrap();
        assert_eq!(previous.as_deref(), Some("storage/a.zip"));
    }

    #[test]
    fn search_matches_title_summary_and_description() {
        let store = ToolStore::open_in_memory().unwrap();
        let mut with_desc = new_tool("t1", "calc", "Calculator");
        with_desc.description = vec![block("crunches numbers quickly")];
        store.insert(with_desc).unwrap();
        store.insert(new_tool("t2", "notes", "Notepad")).unwrap();

        let by_title = store.search("CALCUL").unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].id, "t1");

        let by_description = store.search("crunches").unwrap();
        assert_eq!(by_description.len(), 1);

        let by_summary = store.search("Notepad summary").unwrap();
        assert_eq!(by_summary.len(), 1);
        assert_eq!(by_summary[0].id, "t2");

        assert!(store.search("zzz").unwrap().is_empty());
    }
}
