use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use crate::schema::leads;

/// What the visitor types into the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadDraft {
    pub full_name: String,
    pub whatsapp: String, // masked, e.g. "(11) 99999-8888"
    pub instagram: String,
    pub niche: String,
    pub revenue_range: String,
    pub biggest_challenge: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadField {
    FullName,
    Whatsapp,
    Instagram,
    Niche,
    RevenueRange,
    BiggestChallenge,
}

impl LeadField {
    pub const ALL: [LeadField; 6] = [
        LeadField::FullName,
        LeadField::Whatsapp,
        LeadField::Instagram,
        LeadField::Niche,
        LeadField::RevenueRange,
        LeadField::BiggestChallenge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadField::FullName => "full_name",
            LeadField::Whatsapp => "whatsapp",
            LeadField::Instagram => "instagram",
            LeadField::Niche => "niche",
            LeadField::RevenueRange => "revenue_range",
            LeadField::BiggestChallenge => "biggest_challenge",
        }
    }
}

impl LeadDraft {
    pub fn get(&self, field: LeadField) -> &str {
        match field {
            LeadField::FullName => &self.full_name,
            LeadField::Whatsapp => &self.whatsapp,
            LeadField::Instagram => &self.instagram,
            LeadField::Niche => &self.niche,
            LeadField::RevenueRange => &self.revenue_range,
            LeadField::BiggestChallenge => &self.biggest_challenge,
        }
    }

    pub fn set(&mut self, field: LeadField, value: String) {
        let slot = match field {
            LeadField::FullName => &mut self.full_name,
            LeadField::Whatsapp => &mut self.whatsapp,
            LeadField::Instagram => &mut self.instagram,
            LeadField::Niche => &mut self.niche,
            LeadField::RevenueRange => &mut self.revenue_range,
            LeadField::BiggestChallenge => &mut self.biggest_challenge,
        };
        *slot = value;
    }

    /// Every field is required; whitespace-only counts as empty.
    pub fn missing_fields(&self) -> Vec<LeadField> {
        LeadField::ALL
            .into_iter()
            .filter(|field| self.get(*field).trim().is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Lost,
    Won,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Lost => "lost",
            LeadStatus::Won => "won",
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = leads)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Lead {
    pub id: i32,
    pub full_name: String,
    pub whatsapp: String,
    pub instagram: String,
    pub niche: String,
    pub revenue_range: String,
    pub biggest_challenge: String,
    pub status: String, // one of LeadStatus, written by back-office tooling after insert
    pub notes: Option<String>,
    pub created_at: String, // RFC 3339, UTC
}

#[derive(Debug, Insertable)]
#[diesel(table_name = leads)]
pub struct NewLead {
    pub full_name: String,
    pub whatsapp: String,
    pub instagram: String,
    pub niche: String,
    pub revenue_range: String,
    pub biggest_challenge: String,
    pub status: String,
    pub created_at: String,
}

impl NewLead {
    pub fn from_draft(draft: &LeadDraft, created_at: String) -> Self {
        Self {
            full_name: draft.full_name.clone(),
            whatsapp: draft.whatsapp.clone(),
            instagram: draft.instagram.clone(),
            niche: draft.niche.clone(),
            revenue_range: draft.revenue_range.clone(),
            biggest_challenge: draft.biggest_challenge.clone(),
            status: LeadStatus::New.as_str().to_string(),
            created_at,
        }
    }
}
