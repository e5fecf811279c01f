use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// User Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

// ============================================================================
// Household Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Household {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHouseholdRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateHouseholdRequest {
    pub name: Option<String>,
}

// ============================================================================
// Membership Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    pub fn can_manage_household(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn can_manage_members(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn can_manage_rooms(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdMembership {
    pub id: Uuid,
    pub household_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberWithUser {
    pub membership: HouseholdMembership,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

// ============================================================================
// Room Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub household_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRequest {
    pub name: String,
}

// ============================================================================
// Scheduling Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
    Once,
}

impl IntervalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalType::Daily => "daily",
            IntervalType::Weekly => "weekly",
            IntervalType::Monthly => "monthly",
            IntervalType::Yearly => "yearly",
            IntervalType::Custom => "custom",
            IntervalType::Once => "once",
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, IntervalType::Once)
    }
}

impl FromStr for IntervalType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(IntervalType::Daily),
            "weekly" => Ok(IntervalType::Weekly),
            "monthly" => Ok(IntervalType::Monthly),
            "yearly" => Ok(IntervalType::Yearly),
            "custom" => Ok(IntervalType::Custom),
            "once" => Ok(IntervalType::Once),
            _ => Err(()),
        }
    }
}

/// A recurrence rule: how often a chore repeats.
///
/// `value` is the multiplier for the unit implied by `kind` (days for daily
/// and custom, weeks, months or years). One-off chores always carry 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    #[serde(rename = "type")]
    pub kind: IntervalType,
    pub value: u32,
}

impl Interval {
    pub fn new(kind: IntervalType, value: u32) -> Self {
        Self { kind, value }
    }

    pub fn once() -> Self {
        Self { kind: IntervalType::Once, value: 1 }
    }

    pub fn is_recurring(&self) -> bool {
        self.kind.is_recurring()
    }
}

/// Due date of a chore. `NoDeadline` is only legal for one-off chores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum Deadline {
    #[default]
    NoDeadline,
    Scheduled(DateTime<Utc>),
}

impl Deadline {
    pub fn as_option(&self) -> Option<DateTime<Utc>> {
        match self {
            Deadline::NoDeadline => None,
            Deadline::Scheduled(at) => Some(*at),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, Deadline::Scheduled(_))
    }
}

impl From<Option<DateTime<Utc>>> for Deadline {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        match value {
            Some(at) => Deadline::Scheduled(at),
            None => Deadline::NoDeadline,
        }
    }
}

// ============================================================================
// Chore Types
// ============================================================================

/// Captured when a chore is marked done; keeps the prior deadline for undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub completed_at: DateTime<Utc>,
    pub completed_by: Uuid,
    pub previous_due_at: Deadline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chore {
    pub id: Uuid,
    pub household_id: Uuid,
    pub room_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub assigned_to: Option<Uuid>,
    pub interval: Interval,
    pub due_at: Deadline,
    pub is_overdue: bool,
    pub last_completion: Option<CompletionRecord>,
    pub created_by: Uuid,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chore {
    pub fn is_completed(&self) -> bool {
        self.last_completion.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChoreRequest {
    pub name: String,
    pub description: Option<String>,
    pub interval: Interval,
    pub due_at: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub room_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateChoreRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub interval: Option<Interval>,
    pub due_at: Option<Deadline>,
    pub assigned_to: Option<Uuid>,
    pub room_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingDueDates {
    pub chore_id: Uuid,
    pub interval: Interval,
    pub dates: Vec<DateTime<Utc>>,
}

// ============================================================================
// Invitation Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Expired => "expired",
        }
    }
}

impl FromStr for InvitationStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            "declined" => Ok(InvitationStatus::Declined),
            "expired" => Ok(InvitationStatus::Expired),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub household_id: Uuid,
    pub email: String,
    pub role: Role,
    pub invited_by: Uuid,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationWithHousehold {
    pub invitation: Invitation,
    pub household: Household,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
    pub role: Option<Role>,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSuccess<T> {
    pub data: T,
}

impl<T> ApiSuccess<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ============================================================================
// Tests
// ============================================================================
