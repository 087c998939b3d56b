//! Claim models, payload variants and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClaimType {
    Teaching,
    Transport,
    Thesis,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Teaching => "TEACHING",
            ClaimType::Transport => "TRANSPORT",
            ClaimType::Thesis => "THESIS",
        }
    }
}

impl std::fmt::Display for ClaimType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClaimType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEACHING" => Ok(ClaimType::Teaching),
            "TRANSPORT" => Ok(ClaimType::Transport),
            "THESIS" => Ok(ClaimType::Thesis),
            _ => Err(format!("Unknown claim type: {}", s)),
        }
    }
}

/// Claim lifecycle. PENDING is the only state that can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "PENDING",
            ClaimStatus::Approved => "APPROVED",
            ClaimStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClaimStatus::Pending)
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(ClaimStatus::Pending),
            "APPROVED" => Ok(ClaimStatus::Approved),
            "REJECTED" => Ok(ClaimStatus::Rejected),
            _ => Err(format!("Unknown claim status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Claim {
    pub id: String,
    pub claim_type: String,
    pub status: String,
    /// JSON payload for the claim type
    pub details: String,
    pub amount: f64,
    pub submitted_by_id: String,
    pub center_id: String,
    pub processed_by_id: Option<String>,
    pub processed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Claim {
    pub fn status_enum(&self) -> Option<ClaimStatus> {
        self.status.parse().ok()
    }

    pub fn claim_type_enum(&self) -> Option<ClaimType> {
        self.claim_type.parse().ok()
    }
}

/// Claim as returned to clients, with the payload decoded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub id: String,
    pub claim_type: String,
    pub status: String,
    pub details: serde_json::Value,
    pub amount: f64,
    pub submitted_by_id: String,
    pub center_id: String,
    pub processed_by_id: Option<String>,
    pub processed_at: Option<String>,
    pub created_at: String,
}

impl From<Claim> for ClaimResponse {
    fn from(claim: Claim) -> Self {
        let details = serde_json::from_str(&claim.details).unwrap_or(serde_json::Value::Null);
        Self {
            id: claim.id,
            claim_type: claim.claim_type,
            status: claim.status,
            details,
            amount: claim.amount,
            submitted_by_id: claim.submitted_by_id,
            center_id: claim.center_id,
            processed_by_id: claim.processed_by_id,
            processed_at: claim.processed_at,
            created_at: claim.created_at,
        }
    }
}

/// Claim row with the submitter's name for coordinator listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClaimWithSubmitter {
    pub id: String,
    pub claim_type: String,
    pub status: String,
    pub amount: f64,
    pub submitted_by_id: String,
    pub submitter_name: String,
    pub processed_at: Option<String>,
    pub created_at: String,
}

// -------------------------------------------------------------------------
// Payload variants
// -------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TeachingClaim {
    pub course_code: String,
    pub course_title: String,
    /// YYYY-MM-DD
    pub teaching_date: String,
    pub contact_hours: f64,
    pub hourly_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TransportClaim {
    pub origin: String,
    pub destination: String,
    /// YYYY-MM-DD
    pub travel_date: String,
    pub distance_km: f64,
    pub fare: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThesisDegree {
    Bachelors,
    Masters,
    Phd,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupervisionRole {
    Supervisor,
    CoSupervisor,
    Examiner,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ThesisClaim {
    pub student_name: String,
    pub student_id: String,
    pub thesis_title: String,
    pub degree: ThesisDegree,
    pub supervision_role: SupervisionRole,
    pub amount: f64,
}

/// A claim payload decoded against the schema of its claim type
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimPayload {
    Teaching(TeachingClaim),
    Transport(TransportClaim),
    Thesis(ThesisClaim),
}

impl ClaimPayload {
    /// Decode `details` with the schema selected by `claim_type`
    pub fn from_parts(
        claim_type: ClaimType,
        details: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match claim_type {
            ClaimType::Teaching => ClaimPayload::Teaching(serde_json::from_value(details)?),
            ClaimType::Transport => ClaimPayload::Transport(serde_json::from_value(details)?),
            ClaimType::Thesis => ClaimPayload::Thesis(serde_json::from_value(details)?),
        })
    }

    pub fn claim_type(&self) -> ClaimType {
        match self {
            ClaimPayload::Teaching(_) => ClaimType::Teaching,
            ClaimPayload::Transport(_) => ClaimType::Transport,
            ClaimPayload::Thesis(_) => ClaimType::Thesis,
        }
    }

    /// Total amount claimed
    pub fn amount(&self) -> f64 {
        let amount = match self {
            ClaimPayload::Teaching(t) => t.contact_hours * t.hourly_rate,
            ClaimPayload::Transport(t) => t.fare,
            ClaimPayload::Thesis(t) => t.amount,
        };
        (amount * 100.0).round() / 100.0
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            ClaimPayload::Teaching(t) => serde_json::to_string(t),
            ClaimPayload::Transport(t) => serde_json::to_string(t),
            ClaimPayload::Thesis(t) => serde_json::to_string(t),
        }
    }
}

/// Lecturer request to submit a claim
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateClaimRequest {
    #[serde(alias = "claimType")]
    pub claim_type: ClaimType,
    pub details: serde_json::Value,
    /// Ignored: the center always comes from the lecturer's assignment
    #[serde(default, alias = "centerId")]
    pub center_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RejectClaimRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimListQuery {
    pub status: Option<String>,
}

/// Per-status claim counts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimStatusCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

/// Which claims a count covers
#[derive(Debug, Clone, Copy)]
pub enum ClaimScope<'a> {
    All,
    Center(&'a str),
    SubmittedBy(&'a str),
}

// -------------------------------------------------------------------------
// Queries
// -------------------------------------------------------------------------

pub struct NewClaim<'a> {
    pub claim_type: ClaimType,
    pub details: &'a str,
    pub amount: f64,
    pub submitted_by_id: &'a str,
    pub center_id: &'a str,
}

pub async fn insert_claim(db: &SqlitePool, new: &NewClaim<'_>) -> Result<Claim, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO claims (id, claim_type, status, details, amount, submitted_by_id, center_id, created_at, updated_at)
        VALUES (?, ?, 'PENDING', ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new.claim_type.as_str())
    .bind(new.details)
    .bind(new.amount)
    .bind(new.submitted_by_id)
    .bind(new.center_id)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    find_claim(db, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn find_claim(db: &SqlitePool, id: &str) -> Result<Option<Claim>, sqlx::Error> {
    sqlx::query_as::<_, Claim>("SELECT * FROM claims WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Claim lookup scoped to its owning center
pub async fn find_claim_in_center(
    db: &SqlitePool,
    claim_id: &str,
    center_id: &str,
) -> Result<Option<Claim>, sqlx::Error> {
    sqlx::query_as::<_, Claim>("SELECT * FROM claims WHERE id = ? AND center_id = ?")
        .bind(claim_id)
        .bind(center_id)
        .fetch_optional(db)
        .await
}

/// Move a PENDING claim to a terminal status.
///
/// The status guard and the processed fields share one statement, so of two
/// racing transitions only the first matches a row. Returns whether this
/// call performed the transition.
pub async fn transition_claim(
    db: &SqlitePool,
    claim_id: &str,
    center_id: &str,
    status: ClaimStatus,
    processed_by_id: &str,
) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE claims
        SET status = ?, processed_by_id = ?, processed_at = ?, updated_at = ?
        WHERE id = ? AND center_id = ? AND status = 'PENDING'
        "#,
    )
    .bind(status.as_str())
    .bind(processed_by_id)
    .bind(&now)
    .bind(&now)
    .bind(claim_id)
    .bind(center_id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_claims_for_lecturer(
    db: &SqlitePool,
    user_id: &str,
) -> Result<Vec<Claim>, sqlx::Error> {
    sqlx::query_as::<_, Claim>(
        "SELECT * FROM claims WHERE submitted_by_id = ? ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn list_claims_for_center(
    db: &SqlitePool,
    center_id: &str,
    status: Option<ClaimStatus>,
) -> Result<Vec<ClaimWithSubmitter>, sqlx::Error> {
    let mut sql = String::from(
        r#"
        SELECT c.id, c.claim_type, c.status, c.amount, c.submitted_by_id,
               u.name AS submitter_name, c.processed_at, c.created_at
        FROM claims c
        JOIN users u ON u.id = c.submitted_by_id
        WHERE c.center_id = ?
        "#,
    );
    if status.is_some() {
        sql.push_str(" AND c.status = ?");
    }
    sql.push_str(" ORDER BY c.created_at DESC");

    let mut query = sqlx::query_as::<_, ClaimWithSubmitter>(&sql).bind(center_id);
    if let Some(status) = status {
        query = query.bind(status.as_str());
    }
    query.fetch_all(db).await
}

pub async fn count_claims_by_status(
    db: &SqlitePool,
    scope: ClaimScope<'_>,
) -> Result<ClaimStatusCounts, sqlx::Error> {
    let (filter, binding) = match scope {
        ClaimScope::All => ("", None),
        ClaimScope::Center(id) => ("WHERE center_id = ?", Some(id)),
        ClaimScope::SubmittedBy(id) => ("WHERE submitted_by_id = ?", Some(id)),
    };
    let sql = format!(
        "SELECT status, COUNT(*) FROM claims {} GROUP BY status",
        filter
    );

    let mut query = sqlx::query_as::<_, (String, i64)>(&sql);
    if let Some(id) = binding {
        query = query.bind(id);
    }

    let mut counts = ClaimStatusCounts::default();
    for (status, count) in query.fetch_all(db).await? {
        match status.parse() {
            Ok(ClaimStatus::Pending) => counts.pending = count,
            Ok(ClaimStatus::Approved) => counts.approved = count,
            Ok(ClaimStatus::Rejected) => counts.rejected = count,
            Err(_) => {}
        }
    }
    Ok(counts)
}
