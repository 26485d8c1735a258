use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Config;
use crate::types::{Chapter, McqItem, Subject};

#[derive(Clone)]
pub struct AdminStore {
    state: Arc<RwLock<AdminStoreState>>,
    path: Option<PathBuf>,
    recycle_retention: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{message}")]
    Conflict { message: String },
    #[error("{message}")]
    Persistence { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub mobile: String,
    pub password: String,
    pub credits: i64,
    pub role: String,
    #[serde(default)]
    pub inbox: Vec<InboxMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    pub id: String,
    pub text: String,
    pub date: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftCodeRecord {
    pub id: String,
    pub code: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub generated_by: Option<String>,
    #[serde(default)]
    pub redeemed_by: Option<String>,
    #[serde(default)]
    pub redeemed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub credits: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    pub app_name: String,
    pub maintenance_mode: bool,
    pub maintenance_message: String,
    pub admin_code: String,
    pub admin_email: String,
    pub admin_phone: String,
    pub api_keys: Vec<String>,
    pub ai_model: Option<String>,
    pub ai_instruction: String,
    pub marquee_lines: Vec<String>,
    pub live_message_1: String,
    pub live_message_2: String,
    pub allowed_classes: Vec<String>,
    pub allowed_boards: Vec<String>,
    pub allowed_streams: Vec<String>,
    pub hidden_subjects: Vec<String>,
    pub payment_enabled: bool,
    pub upi_id: String,
    pub upi_name: String,
    pub packages: Vec<PackageRecord>,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            app_name: "Studydesk".to_string(),
            maintenance_mode: false,
            maintenance_message: String::new(),
            admin_code: String::new(),
            admin_email: String::new(),
            admin_phone: String::new(),
            api_keys: Vec::new(),
            ai_model: None,
            ai_instruction: String::new(),
            marquee_lines: Vec::new(),
            live_message_1: String::new(),
            live_message_2: String::new(),
            allowed_classes: Vec::new(),
            allowed_boards: Vec::new(),
            allowed_streams: Vec::new(),
            hidden_subjects: Vec::new(),
            payment_enabled: false,
            upi_id: String::new(),
            upi_name: String::new(),
            packages: Vec::new(),
        }
    }
}

/// Admin-authored material for one chapter. Any populated field beats the
/// generated equivalent during content resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentOverrideRecord {
    pub free_link: Option<String>,
    pub premium_link: Option<String>,
    pub legacy_link: Option<String>,
    pub price: Option<i64>,
    pub manual_mcqs: Option<Vec<McqItem>>,
    pub weekly_test_mcqs: Option<Vec<McqItem>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecycleKind {
    User,
    Chapter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecycleBinEntry {
    pub id: String,
    pub original_id: String,
    pub kind: RecycleKind,
    pub name: String,
    pub payload: Value,
    #[serde(default)]
    pub restore_key: Option<String>,
    pub deleted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandRecord {
    pub id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStatus {
    Pending,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryRequestRecord {
    pub id: String,
    pub name: String,
    pub mobile: String,
    pub status: RecoveryStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct AdminStoreState {
    users: HashMap<String, UserRecord>,
    gift_codes: Vec<GiftCodeRecord>,
    settings: SystemSettings,
    content_overrides: HashMap<String, ContentOverrideRecord>,
    chapter_lists: HashMap<String, Vec<Chapter>>,
    custom_subjects: HashMap<String, Subject>,
    recycle_bin: Vec<RecycleBinEntry>,
    demands: Vec<DemandRecord>,
    recovery_requests: Vec<RecoveryRequestRecord>,
    activity_log: Vec<ActivityLogEntry>,
}

impl AdminStoreState {
    /// Drops expired recycle-bin entries; returns whether anything was pruned.
    fn prune_recycle_bin(&mut self, now: DateTime<Utc>) -> bool {
        let before = self.recycle_bin.len();
        self.recycle_bin.retain(|entry| entry.expires_at > now);
        self.recycle_bin.len() != before
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub credits: Option<i64>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub name: String,
    pub mobile: String,
    pub password: String,
    #[serde(default)]
    pub credits: i64,
}

impl AdminStore {
    pub fn from_config(config: &Config) -> Self {
        let path = config.store_path.clone();
        let mut state = Self::load_state(path.as_ref());
        if state.prune_recycle_bin(Utc::now()) {
            tracing::debug!(
                target: "studydesk.store",
                "dropped expired recycle bin entries on load",
            );
        }

        Self {
            state: Arc::new(RwLock::new(state)),
            path,
            recycle_retention: Duration::days(config.recycle_retention_days),
        }
    }

    // --- users ---

    pub async fn create_user(&self, input: CreateUserInput) -> Result<UserRecord, StoreError> {
        let name = normalize_non_empty(&input.name, "name")?;
        let mobile = normalize_non_empty(&input.mobile, "mobile")?;
        let password = normalize_non_empty(&input.password, "password")?;

        self.mutate(|state| {
            if state
                .users
                .values()
                .any(|user| user.mobile == mobile)
            {
                return Err(StoreError::Conflict {
                    message: format!("a user with mobile {mobile} already exists"),
                });
            }

            let now = Utc::now();
            let user = UserRecord {
                id: format!("usr_{}", Uuid::new_v4().simple()),
                name,
                mobile,
                password,
                credits: input.credits,
                role: "user".to_string(),
                inbox: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            state.users.insert(user.id.clone(), user.clone());
            Ok(user)
        })
        .await
    }

    /// Lists users, optionally filtered by a case-insensitive match against
    /// name, id, or mobile number.
    pub async fn list_users(&self, search: Option<&str>) -> Vec<UserRecord> {
        let state = self.state.read().await;
        let needle = search
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty());

        let mut users: Vec<UserRecord> = state
            .users
            .values()
            .filter(|user| match &needle {
                Some(needle) => {
                    user.name.to_lowercase().contains(needle)
                        || user.id.to_lowercase().contains(needle)
                        || user.mobile.contains(needle)
                }
                None => true,
            })
            .cloned()
            .collect();
        users.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        users
    }

    pub async fn get_user(&self, user_id: &str) -> Result<UserRecord, StoreError> {
        let state = self.state.read().await;
        state.users.get(user_id).cloned().ok_or(StoreError::NotFound)
    }

    pub async fn update_user(
        &self,
        user_id: &str,
        input: UpdateUserInput,
    ) -> Result<UserRecord, StoreError> {
        let user_id = user_id.to_string();
        self.mutate(move |state| {
            let user = state.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;

            if let Some(name) = input.name {
                user.name = normalize_non_empty(&name, "name")?;
            }
            if let Some(credits) = input.credits {
                user.credits = credits;
            }
            if let Some(password) = input.password {
                user.password = normalize_non_empty(&password, "password")?;
            }
            user.updated_at = Utc::now();
            Ok(user.clone())
        })
        .await
    }

    /// Appends a direct message to the user's inbox, unread.
    pub async fn send_message(&self, user_id: &str, text: &str) -> Result<UserRecord, StoreError> {
        let text = normalize_non_empty(text, "text")?;
        let user_id = user_id.to_string();
        self.mutate(move |state| {
            let user = state.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
            user.inbox.push(InboxMessage {
                id: format!("msg_{}", Uuid::new_v4().simple()),
                text,
                date: Utc::now(),
                read: false,
            });
            user.updated_at = Utc::now();
            Ok(user.clone())
        })
        .await
    }

    /// Moves the user into the recycle bin instead of destroying the record.
    pub async fn soft_delete_user(&self, user_id: &str) -> Result<RecycleBinEntry, StoreError> {
        let user_id = user_id.to_string();
        let retention = self.recycle_retention;
        self.mutate(move |state| {
            let user = state.users.remove(&user_id).ok_or(StoreError::NotFound)?;
            let now = Utc::now();
            let payload =
                serde_json::to_value(&user).map_err(|error| StoreError::Persistence {
                    message: format!("failed to encode user payload: {error}"),
                })?;
            let entry = RecycleBinEntry {
                id: format!("bin_{}", Uuid::new_v4().simple()),
                original_id: user.id.clone(),
                kind: RecycleKind::User,
                name: user.name.clone(),
                payload,
                restore_key: None,
                deleted_at: now,
                expires_at: now + retention,
            };
            state.recycle_bin.push(entry.clone());
            Ok(entry)
        })
        .await
    }

    // --- gift codes ---

    pub async fn generate_gift_codes(
        &self,
        count: usize,
        amount: i64,
        prefix: &str,
        generated_by: Option<&str>,
    ) -> Result<Vec<GiftCodeRecord>, StoreError> {
        if count == 0 || count > 100 {
            return Err(StoreError::Validation {
                field: "count",
                message: "count must be between 1 and 100".to_string(),
            });
        }
        if amount <= 0 {
            return Err(StoreError::Validation {
                field: "amount",
                message: "amount must be positive".to_string(),
            });
        }

        let prefix = prefix.to_string();
        let generated_by = generated_by.map(str::to_string);
        self.mutate(move |state| {
            let now = Utc::now();
            let mut created = Vec::with_capacity(count);
            for _ in 0..count {
                let record = GiftCodeRecord {
                    id: format!("gc_{}", Uuid::new_v4().simple()),
                    code: format!("{}-{}-{}", prefix, random_code_fragment(5), amount),
                    amount,
                    created_at: now,
                    generated_by: generated_by.clone(),
                    redeemed_by: None,
                    redeemed_at: None,
                };
                state.gift_codes.push(record.clone());
                created.push(record);
            }
            Ok(created)
        })
        .await
    }

    pub async fn list_gift_codes(&self) -> Vec<GiftCodeRecord> {
        let state = self.state.read().await;
        let mut codes = state.gift_codes.clone();
        codes.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        codes
    }

    pub async fn delete_gift_code(&self, code_id: &str) -> Result<(), StoreError> {
        let code_id = code_id.to_string();
        self.mutate(move |state| {
            let before = state.gift_codes.len();
            state.gift_codes.retain(|record| record.id != code_id);
            if state.gift_codes.len() == before {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    /// Marks the code redeemed and credits the user. A code can only be
    /// redeemed once; the second attempt is a conflict.
    pub async fn redeem_gift_code(
        &self,
        code: &str,
        user_id: &str,
    ) -> Result<(GiftCodeRecord, UserRecord), StoreError> {
        let code = normalize_non_empty(code, "code")?.to_uppercase();
        let user_id = user_id.to_string();
        self.mutate(move |state| {
            if !state.users.contains_key(&user_id) {
                return Err(StoreError::NotFound);
            }

            let record = state
                .gift_codes
                .iter_mut()
                .find(|record| record.code == code)
                .ok_or(StoreError::NotFound)?;

            if record.redeemed_by.is_some() {
                return Err(StoreError::Conflict {
                    message: "gift code has already been redeemed".to_string(),
                });
            }

            let now = Utc::now();
            record.redeemed_by = Some(user_id.clone());
            record.redeemed_at = Some(now);
            let record = record.clone();

            let user = state.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
            user.credits += record.amount;
            user.updated_at = now;
            Ok((record, user.clone()))
        })
        .await
    }

    // --- settings and packages ---

    pub async fn get_settings(&self) -> SystemSettings {
        let state = self.state.read().await;
        state.settings.clone()
    }

    /// Replaces the settings blob. API keys are stored trimmed, with empty
    /// fragments dropped.
    pub async fn update_settings(
        &self,
        mut settings: SystemSettings,
    ) -> Result<SystemSettings, StoreError> {
        settings.api_keys = settings
            .api_keys
            .iter()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect();

        self.mutate(move |state| {
            state.settings = settings;
            Ok(state.settings.clone())
        })
        .await
    }

    pub async fn add_package(
        &self,
        name: &str,
        price: i64,
        credits: i64,
    ) -> Result<PackageRecord, StoreError> {
        let name = normalize_non_empty(name, "name")?;
        if price < 0 {
            return Err(StoreError::Validation {
                field: "price",
                message: "price must not be negative".to_string(),
            });
        }
        self.mutate(move |state| {
            let package = PackageRecord {
                id: format!("pkg_{}", Uuid::new_v4().simple()),
                name,
                price,
                credits,
            };
            state.settings.packages.push(package.clone());
            Ok(package)
        })
        .await
    }

    pub async fn remove_package(&self, package_id: &str) -> Result<(), StoreError> {
        let package_id = package_id.to_string();
        self.mutate(move |state| {
            let before = state.settings.packages.len();
            state
                .settings
                .packages
                .retain(|package| package.id != package_id);
            if state.settings.packages.len() == before {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    // --- custom subjects ---

    pub async fn list_custom_subjects(&self) -> Vec<Subject> {
        let state = self.state.read().await;
        let mut subjects: Vec<Subject> = state.custom_subjects.values().cloned().collect();
        subjects.sort_by(|left, right| left.name.cmp(&right.name));
        subjects
    }

    pub async fn upsert_subject(
        &self,
        name: &str,
        icon: &str,
        color: &str,
    ) -> Result<Subject, StoreError> {
        let name = normalize_non_empty(name, "name")?;
        let icon = icon.trim().to_string();
        let color = color.trim().to_string();
        self.mutate(move |state| {
            let subject = Subject {
                id: crate::catalog::subject_id(&name),
                name,
                icon,
                color,
            };
            state
                .custom_subjects
                .insert(subject.id.clone(), subject.clone());
            Ok(subject)
        })
        .await
    }

    pub async fn delete_subject(&self, subject_id: &str) -> Result<(), StoreError> {
        let subject_id = subject_id.to_string();
        self.mutate(move |state| {
            state
                .custom_subjects
                .remove(&subject_id)
                .map(|_| ())
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    // --- content overrides ---

    pub async fn get_override(&self, key: &str) -> Option<ContentOverrideRecord> {
        let state = self.state.read().await;
        state.content_overrides.get(key).cloned()
    }

    pub async fn list_overrides(&self) -> Vec<(String, ContentOverrideRecord)> {
        let state = self.state.read().await;
        let mut rows: Vec<(String, ContentOverrideRecord)> = state
            .content_overrides
            .iter()
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect();
        rows.sort_by(|left, right| left.0.cmp(&right.0));
        rows
    }

    pub async fn put_override(
        &self,
        key: &str,
        mut record: ContentOverrideRecord,
    ) -> Result<ContentOverrideRecord, StoreError> {
        let key = normalize_non_empty(key, "key")?;
        record.updated_at = Utc::now();
        self.mutate(move |state| {
            state.content_overrides.insert(key, record.clone());
            Ok(record)
        })
        .await
    }

    pub async fn delete_override(&self, key: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        self.mutate(move |state| {
            state
                .content_overrides
                .remove(&key)
                .map(|_| ())
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    // --- chapter lists ---

    pub async fn get_chapter_list(&self, key: &str) -> Option<Vec<Chapter>> {
        let state = self.state.read().await;
        state
            .chapter_lists
            .get(key)
            .filter(|chapters| !chapters.is_empty())
            .cloned()
    }

    pub async fn save_chapter_list(
        &self,
        key: &str,
        chapters: Vec<Chapter>,
    ) -> Result<Vec<Chapter>, StoreError> {
        let key = normalize_non_empty(key, "key")?;
        self.mutate(move |state| {
            state.chapter_lists.insert(key, chapters.clone());
            Ok(chapters)
        })
        .await
    }

    /// Removes one chapter from a saved list and parks it in the recycle bin
    /// so it can be restored to the same list later.
    pub async fn delete_chapter(
        &self,
        key: &str,
        chapter_id: &str,
    ) -> Result<RecycleBinEntry, StoreError> {
        let key = key.to_string();
        let chapter_id = chapter_id.to_string();
        let retention = self.recycle_retention;
        self.mutate(move |state| {
            let chapters = state.chapter_lists.get_mut(&key).ok_or(StoreError::NotFound)?;
            let position = chapters
                .iter()
                .position(|chapter| chapter.id == chapter_id)
                .ok_or(StoreError::NotFound)?;
            let chapter = chapters.remove(position);

            let now = Utc::now();
            let payload =
                serde_json::to_value(&chapter).map_err(|error| StoreError::Persistence {
                    message: format!("failed to encode chapter payload: {error}"),
                })?;
            let entry = RecycleBinEntry {
                id: format!("bin_{}", Uuid::new_v4().simple()),
                original_id: chapter.id.clone(),
                kind: RecycleKind::Chapter,
                name: chapter.title.clone(),
                payload,
                restore_key: Some(key.clone()),
                deleted_at: now,
                expires_at: now + retention,
            };
            state.recycle_bin.push(entry.clone());
            Ok(entry)
        })
        .await
    }

    // --- recycle bin ---

    pub async fn list_recycle_bin(&self) -> Vec<RecycleBinEntry> {
        let now = Utc::now();
        let state = self.state.read().await;
        let mut entries: Vec<RecycleBinEntry> = state
            .recycle_bin
            .iter()
            .filter(|entry| entry.expires_at > now)
            .cloned()
            .collect();
        entries.sort_by(|left, right| right.deleted_at.cmp(&left.deleted_at));
        entries
    }

    pub async fn restore_entry(&self, entry_id: &str) -> Result<RecycleBinEntry, StoreError> {
        let entry_id = entry_id.to_string();
        self.mutate(move |state| {
            let now = Utc::now();
            state.prune_recycle_bin(now);

            let position = state
                .recycle_bin
                .iter()
                .position(|entry| entry.id == entry_id)
                .ok_or(StoreError::NotFound)?;
            let entry = state.recycle_bin[position].clone();

            match entry.kind {
                RecycleKind::User => {
                    if state.users.contains_key(&entry.original_id) {
                        return Err(StoreError::Conflict {
                            message: format!(
                                "a user with id {} already exists",
                                entry.original_id
                            ),
                        });
                    }
                    let user: UserRecord = serde_json::from_value(entry.payload.clone())
                        .map_err(|error| StoreError::Persistence {
                            message: format!("failed to decode user payload: {error}"),
                        })?;
                    state.users.insert(user.id.clone(), user);
                }
                RecycleKind::Chapter => {
                    let key = entry.restore_key.clone().ok_or_else(|| {
                        StoreError::Persistence {
                            message: "chapter entry is missing its restore key".to_string(),
                        }
                    })?;
                    let chapter: Chapter = serde_json::from_value(entry.payload.clone())
                        .map_err(|error| StoreError::Persistence {
                            message: format!("failed to decode chapter payload: {error}"),
                        })?;
                    state.chapter_lists.entry(key).or_default().push(chapter);
                }
            }

            state.recycle_bin.remove(position);
            Ok(entry)
        })
        .await
    }

    pub async fn purge_entry(&self, entry_id: &str) -> Result<(), StoreError> {
        let entry_id = entry_id.to_string();
        self.mutate(move |state| {
            state.prune_recycle_bin(Utc::now());
            let before = state.recycle_bin.len();
            state.recycle_bin.retain(|entry| entry.id != entry_id);
            if state.recycle_bin.len() == before {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    // --- demands ---

    pub async fn add_demand(
        &self,
        user_name: Option<&str>,
        detail: &str,
    ) -> Result<DemandRecord, StoreError> {
        let detail = normalize_non_empty(detail, "detail")?;
        let user_name = user_name
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self.mutate(move |state| {
            let record = DemandRecord {
                id: format!("dm_{}", Uuid::new_v4().simple()),
                user_name,
                detail,
                created_at: Utc::now(),
            };
            state.demands.push(record.clone());
            Ok(record)
        })
        .await
    }

    pub async fn list_demands(&self) -> Vec<DemandRecord> {
        let state = self.state.read().await;
        let mut demands = state.demands.clone();
        demands.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        demands
    }

    pub async fn delete_demand(&self, demand_id: &str) -> Result<(), StoreError> {
        let demand_id = demand_id.to_string();
        self.mutate(move |state| {
            let before = state.demands.len();
            state.demands.retain(|record| record.id != demand_id);
            if state.demands.len() == before {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    // --- recovery requests ---

    pub async fn add_recovery_request(
        &self,
        name: &str,
        mobile: &str,
    ) -> Result<RecoveryRequestRecord, StoreError> {
        let name = normalize_non_empty(name, "name")?;
        let mobile = normalize_non_empty(mobile, "mobile")?;
        self.mutate(move |state| {
            let record = RecoveryRequestRecord {
                id: format!("rr_{}", Uuid::new_v4().simple()),
                name,
                mobile,
                status: RecoveryStatus::Pending,
                created_at: Utc::now(),
                resolved_at: None,
            };
            state.recovery_requests.push(record.clone());
            Ok(record)
        })
        .await
    }

    pub async fn list_recovery_requests(&self) -> Vec<RecoveryRequestRecord> {
        let state = self.state.read().await;
        let mut requests = state.recovery_requests.clone();
        requests.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        requests
    }

    pub async fn resolve_recovery_request(
        &self,
        request_id: &str,
    ) -> Result<RecoveryRequestRecord, StoreError> {
        let request_id = request_id.to_string();
        self.mutate(move |state| {
            let record = state
                .recovery_requests
                .iter_mut()
                .find(|record| record.id == request_id)
                .ok_or(StoreError::NotFound)?;
            if record.status == RecoveryStatus::Pending {
                record.status = RecoveryStatus::Resolved;
                record.resolved_at = Some(Utc::now());
            }
            Ok(record.clone())
        })
        .await
    }

    // --- activity log ---

    pub async fn log_activity(&self, message: &str) -> Result<ActivityLogEntry, StoreError> {
        let message = normalize_non_empty(message, "message")?;
        self.mutate(move |state| {
            let entry = ActivityLogEntry {
                id: format!("act_{}", Uuid::new_v4().simple()),
                message,
                at: Utc::now(),
            };
            state.activity_log.push(entry.clone());
            Ok(entry)
        })
        .await
    }

    pub async fn list_activity(&self, limit: usize) -> Vec<ActivityLogEntry> {
        let safe_limit = limit.clamp(1, 1000);
        let state = self.state.read().await;
        // Reverse first so same-timestamp appends still list newest first.
        let mut entries: Vec<ActivityLogEntry> =
            state.activity_log.iter().rev().cloned().collect();
        entries.sort_by(|left, right| right.at.cmp(&left.at));
        entries.truncate(safe_limit);
        entries
    }

    // --- raw collection access ---

    pub async fn export_collection(&self, collection: &str) -> Result<Value, StoreError> {
        let state = self.state.read().await;
        let value = match collection {
            "users" => serde_json::to_value(&state.users),
            "gift_codes" => serde_json::to_value(&state.gift_codes),
            "settings" => serde_json::to_value(&state.settings),
            "content_overrides" => serde_json::to_value(&state.content_overrides),
            "chapter_lists" => serde_json::to_value(&state.chapter_lists),
            "custom_subjects" => serde_json::to_value(&state.custom_subjects),
            "recycle_bin" => serde_json::to_value(&state.recycle_bin),
            "demands" => serde_json::to_value(&state.demands),
            "recovery_requests" => serde_json::to_value(&state.recovery_requests),
            "activity_log" => serde_json::to_value(&state.activity_log),
            _ => return Err(StoreError::NotFound),
        };
        value.map_err(|error| StoreError::Persistence {
            message: format!("failed to encode collection: {error}"),
        })
    }

    /// Replaces a whole collection from raw JSON. The payload must decode as
    /// the collection's record type.
    pub async fn import_collection(
        &self,
        collection: &str,
        payload: Value,
    ) -> Result<(), StoreError> {
        let collection = collection.to_string();
        self.mutate(move |state| {
            let outcome = match collection.as_str() {
                "users" => serde_json::from_value(payload).map(|value| state.users = value),
                "gift_codes" => {
                    serde_json::from_value(payload).map(|value| state.gift_codes = value)
                }
                "settings" => serde_json::from_value(payload).map(|value| state.settings = value),
                "content_overrides" => {
                    serde_json::from_value(payload).map(|value| state.content_overrides = value)
                }
                "chapter_lists" => {
                    serde_json::from_value(payload).map(|value| state.chapter_lists = value)
                }
                "custom_subjects" => {
                    serde_json::from_value(payload).map(|value| state.custom_subjects = value)
                }
                "recycle_bin" => {
                    serde_json::from_value(payload).map(|value| state.recycle_bin = value)
                }
                "demands" => serde_json::from_value(payload).map(|value| state.demands = value),
                "recovery_requests" => {
                    serde_json::from_value(payload).map(|value| state.recovery_requests = value)
                }
                "activity_log" => {
                    serde_json::from_value(payload).map(|value| state.activity_log = value)
                }
                _ => return Err(StoreError::NotFound),
            };
            outcome.map_err(|error| StoreError::Validation {
                field: "payload",
                message: format!("payload does not match collection shape: {error}"),
            })
        })
        .await
    }

    // --- persistence ---

    fn load_state(path: Option<&PathBuf>) -> AdminStoreState {
        let Some(path) = path else {
            return AdminStoreState::default();
        };

        let raw = match std::fs::read_to_string(path) {
            Ok(value) => value,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return AdminStoreState::default();
            }
            Err(error) => {
                tracing::warn!(
                    target: "studydesk.store",
                    path = %path.display(),
                    error = %error,
                    "failed to read admin store; booting with empty state",
                );
                return AdminStoreState::default();
            }
        };

        match serde_json::from_str::<AdminStoreState>(&raw) {
            Ok(state) => state,
            Err(error) => {
                tracing::warn!(
                    target: "studydesk.store",
                    path = %path.display(),
                    error = %error,
                    "failed to parse admin store; booting with empty state",
                );
                AdminStoreState::default()
            }
        }
    }

    async fn persist_state(&self, snapshot: &AdminStoreState) -> Result<(), StoreError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|error| {
                StoreError::Persistence {
                    message: format!("failed to prepare admin store directory: {error}"),
                }
            })?;
        }

        let payload = serde_json::to_vec(snapshot).map_err(|error| StoreError::Persistence {
            message: format!("failed to encode admin store payload: {error}"),
        })?;

        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, payload)
            .await
            .map_err(|error| StoreError::Persistence {
                message: format!("failed to write admin store payload: {error}"),
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|error| StoreError::Persistence {
                message: format!("failed to finalize admin store payload: {error}"),
            })?;

        Ok(())
    }

    async fn mutate<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut AdminStoreState) -> Result<T, StoreError>,
    {
        let (result, snapshot) = {
            let mut state = self.state.write().await;
            let result = operation(&mut state)?;
            (result, state.clone())
        };

        self.persist_state(&snapshot).await?;
        Ok(result)
    }
}

fn normalize_non_empty(value: &str, field: &'static str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation {
            field,
            message: format!("{field} must not be empty"),
        });
    }
    Ok(trimmed.to_string())
}

fn random_code_fragment(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(|byte| (byte as char).to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_path(path: Option<PathBuf>) -> AdminStore {
        let mut config = Config::for_tests();
        config.store_path = path;
        AdminStore::from_config(&config)
    }

    fn store() -> AdminStore {
        store_with_path(None)
    }

    async fn seed_user(store: &AdminStore) -> UserRecord {
        store
            .create_user(CreateUserInput {
                name: "Asha".to_string(),
                mobile: "9876543210".to_string(),
                password: "secret".to_string(),
                credits: 10,
            })
            .await
            .expect("create user")
    }

    #[tokio::test]
    async fn create_and_search_users() {
        let store = store();
        let user = seed_user(&store).await;

        let hits = store.list_users(Some("asha")).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, user.id);

        let misses = store.list_users(Some("nobody")).await;
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn duplicate_mobile_is_a_conflict() {
        let store = store();
        seed_user(&store).await;
        let result = store
            .create_user(CreateUserInput {
                name: "Other".to_string(),
                mobile: "9876543210".to_string(),
                password: "pw".to_string(),
                credits: 0,
            })
            .await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn direct_message_lands_unread() {
        let store = store();
        let user = seed_user(&store).await;
        let updated = store
            .send_message(&user.id, "Your premium plan is live")
            .await
            .expect("send message");
        assert_eq!(updated.inbox.len(), 1);
        assert!(!updated.inbox[0].read);
    }

    #[tokio::test]
    async fn gift_code_redeems_exactly_once() {
        let store = store();
        let user = seed_user(&store).await;
        let codes = store
            .generate_gift_codes(1, 50, "SD", Some("admin"))
            .await
            .expect("generate codes");
        let code = &codes[0].code;
        assert!(code.starts_with("SD-"));
        assert!(code.ends_with("-50"));

        let (record, credited) = store
            .redeem_gift_code(code, &user.id)
            .await
            .expect("first redemption");
        assert_eq!(record.redeemed_by.as_deref(), Some(user.id.as_str()));
        assert_eq!(credited.credits, 60);

        let second = store.redeem_gift_code(code, &user.id).await;
        assert!(matches!(second, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn settings_api_keys_are_trimmed() {
        let store = store();
        let settings = SystemSettings {
            api_keys: vec![
                " key-one ".to_string(),
                String::new(),
                "key-two".to_string(),
            ],
            ..SystemSettings::default()
        };
        let saved = store.update_settings(settings).await.expect("save settings");
        assert_eq!(saved.api_keys, vec!["key-one", "key-two"]);
    }

    #[tokio::test]
    async fn soft_deleted_user_restores_from_bin() {
        let store = store();
        let user = seed_user(&store).await;

        let entry = store.soft_delete_user(&user.id).await.expect("soft delete");
        assert!(store.get_user(&user.id).await.is_err());

        store.restore_entry(&entry.id).await.expect("restore");
        let restored = store.get_user(&user.id).await.expect("user is back");
        assert_eq!(restored.name, "Asha");
        assert!(store.list_recycle_bin().await.is_empty());
    }

    #[tokio::test]
    async fn restore_refuses_user_id_collision() {
        let store = store();
        let user = seed_user(&store).await;
        let entry = store.soft_delete_user(&user.id).await.expect("soft delete");

        // Put a record with the same id back manually via raw import.
        let mut users = HashMap::new();
        users.insert(user.id.clone(), user.clone());
        store
            .import_collection("users", serde_json::to_value(&users).expect("encode"))
            .await
            .expect("import users");

        let result = store.restore_entry(&entry.id).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn deleted_chapter_restores_to_its_list() {
        let store = store();
        let key = "CBSE-10-Science-English";
        store
            .save_chapter_list(
                key,
                vec![
                    Chapter {
                        id: "ch-1".to_string(),
                        title: "Light".to_string(),
                        description: None,
                    },
                    Chapter {
                        id: "ch-2".to_string(),
                        title: "Sound".to_string(),
                        description: None,
                    },
                ],
            )
            .await
            .expect("save list");

        let entry = store.delete_chapter(key, "ch-1").await.expect("delete chapter");
        assert_eq!(
            store.get_chapter_list(key).await.expect("list remains").len(),
            1
        );

        store.restore_entry(&entry.id).await.expect("restore");
        let chapters = store.get_chapter_list(key).await.expect("list restored");
        assert_eq!(chapters.len(), 2);
        assert!(chapters.iter().any(|chapter| chapter.id == "ch-1"));
    }

    #[tokio::test]
    async fn expired_bin_entries_are_invisible() {
        let mut config = Config::for_tests();
        config.recycle_retention_days = 1;
        let store = AdminStore::from_config(&config);
        let user = seed_user(&store).await;
        store.soft_delete_user(&user.id).await.expect("soft delete");

        // Rewrite the bin with an already-expired entry via raw import.
        let mut entries = store.list_recycle_bin().await;
        entries[0].expires_at = Utc::now() - Duration::days(1);
        store
            .import_collection(
                "recycle_bin",
                serde_json::to_value(&entries).expect("encode"),
            )
            .await
            .expect("import bin");

        assert!(store.list_recycle_bin().await.is_empty());
        let result = store.restore_entry(&entries[0].id).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn state_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.json");

        let store = store_with_path(Some(path.clone()));
        let user = seed_user(&store).await;
        store
            .generate_gift_codes(2, 25, "SD", None)
            .await
            .expect("generate codes");

        let reloaded = store_with_path(Some(path));
        let again = reloaded.get_user(&user.id).await.expect("user persisted");
        assert_eq!(again.mobile, "9876543210");
        assert_eq!(reloaded.list_gift_codes().await.len(), 2);
    }

    #[tokio::test]
    async fn corrupt_store_file_boots_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").expect("write corrupt file");

        let store = store_with_path(Some(path));
        assert!(store.list_users(None).await.is_empty());
    }

    #[tokio::test]
    async fn recovery_request_resolves_once() {
        let store = store();
        let request = store
            .add_recovery_request("Asha", "9876543210")
            .await
            .expect("add request");
        assert_eq!(request.status, RecoveryStatus::Pending);

        let resolved = store
            .resolve_recovery_request(&request.id)
            .await
            .expect("resolve");
        assert_eq!(resolved.status, RecoveryStatus::Resolved);
        let resolved_at = resolved.resolved_at.expect("resolution timestamp");

        let again = store
            .resolve_recovery_request(&request.id)
            .await
            .expect("idempotent resolve");
        assert_eq!(again.resolved_at, Some(resolved_at));
    }

    #[tokio::test]
    async fn activity_log_lists_newest_first() {
        let store = store();
        store.log_activity("first").await.expect("log");
        store.log_activity("second").await.expect("log");
        let entries = store.list_activity(10).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "second");
    }

    #[tokio::test]
    async fn unknown_collection_is_not_found() {
        let store = store();
        assert!(matches!(
            store.export_collection("nope").await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store
                .import_collection("nope", serde_json::json!({}))
                .await,
            Err(StoreError::NotFound)
        ));
    }
}
