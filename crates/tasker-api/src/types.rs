//! Wire shapes of the tracker and wiki REST payloads, and their mapping
//! onto the core model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tasker_core::types::{Identity, Iteration, Page, PageRef, PageUpdate, Reference, Timeframe, WorkItem};

// ─── Tracker ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Href {
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkItemLinks {
    pub html: Option<Href>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkItemDto {
    pub id: i64,
    pub rev: i64,
    pub url: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(rename = "_links", default)]
    pub links: WorkItemLinks,
}

impl WorkItemDto {
    fn text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

impl From<WorkItemDto> for WorkItem {
    fn from(dto: WorkItemDto) -> Self {
        let tags = dto
            .text("System.Tags")
            .split(';')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        WorkItem {
            id: dto.id,
            rev: dto.rev,
            title: dto.text("System.Title"),
            area_path: dto.text("System.AreaPath"),
            iteration_path: dto.text("System.IterationPath"),
            state: dto.text("System.State"),
            tags,
            html_url: dto.links.html.as_ref().map(|h| h.href.clone()).unwrap_or_default(),
            url: dto.url,
            fields: dto.fields,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WiqlRequest<'a> {
    pub query: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WiqlResponse {
    #[serde(default)]
    pub work_items: Vec<Reference>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueList<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationAttributes {
    pub time_frame: Option<Timeframe>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IterationDto {
    pub path: String,
    #[serde(default)]
    pub attributes: IterationAttributes,
}

impl From<IterationDto> for Iteration {
    fn from(dto: IterationDto) -> Self {
        Iteration {
            path: dto.path,
            // Iterations without dates are never searched.
            timeframe: dto.attributes.time_frame.unwrap_or(Timeframe::Future),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDto {
    pub id: String,
    pub provider_display_name: String,
}

impl From<IdentityDto> for Identity {
    fn from(dto: IdentityDto) -> Self {
        Identity {
            id: dto.id,
            display_name: dto.provider_display_name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionData {
    pub authenticated_user: IdentityDto,
}

// ─── Wiki ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentLinks {
    pub base: Option<String>,
    pub webui: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SpaceDto {
    pub key: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VersionDto {
    pub number: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageDto {
    pub value: String,
    pub representation: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BodyDto {
    pub storage: StorageDto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelDto {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelList {
    #[serde(default)]
    pub results: Vec<LabelDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataDto {
    #[serde(default)]
    pub labels: LabelList,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentDto {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub title: String,
    pub space: Option<SpaceDto>,
    pub version: Option<VersionDto>,
    pub body: Option<BodyDto>,
    #[serde(default)]
    pub metadata: MetadataDto,
    #[serde(rename = "_links", default)]
    pub links: ContentLinks,
}

impl ContentDto {
    /// Core page; `base` is used when the payload carries no `_links.base`.
    pub fn into_page(self, base: &str) -> Page {
        let base = self.links.base.as_deref().unwrap_or(base).trim_end_matches('/');
        let web_url = match &self.links.webui {
            Some(webui) => format!("{base}{webui}"),
            None => String::new(),
        };
        Page {
            web_url,
            id: self.id,
            kind: self.kind,
            title: self.title,
            space_key: self.space.map(|s| s.key).unwrap_or_default(),
            version: self.version.map(|v| v.number).unwrap_or_default(),
            body: self.body.map(|b| b.storage.value).unwrap_or_default(),
            labels: self.metadata.labels.results.into_iter().map(|l| l.name).collect(),
        }
    }
}

impl From<&ContentDto> for PageRef {
    fn from(dto: &ContentDto) -> Self {
        PageRef {
            id: dto.id.clone(),
            title: dto.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentList {
    #[serde(default)]
    pub results: Vec<ContentDto>,
    #[serde(rename = "_links", default)]
    pub links: ContentLinks,
}

/// Body of `PUT /rest/api/content/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct ContentUpdate {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub space: SpaceDto,
    pub body: BodyDto,
    pub version: VersionDto,
}

impl From<&PageUpdate> for ContentUpdate {
    fn from(update: &PageUpdate) -> Self {
        ContentUpdate {
            id: update.id.clone(),
            kind: if update.kind.is_empty() {
                "page".to_string()
            } else {
                update.kind.clone()
            },
            title: update.title.clone(),
            space: SpaceDto {
                key: update.space_key.clone(),
            },
            body: BodyDto {
                storage: StorageDto {
                    value: update.body.clone(),
                    representation: update.representation.clone(),
                },
            },
            version: VersionDto {
                number: update.version,
            },
        }
    }
}
