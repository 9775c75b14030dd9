use diesel::prelude::*;
use diesel::r2d2::PoolError;
use diesel::result::Error as DieselError;
use crate::{
    models::lead_models::{Lead, LeadStatus, NewLead},
    schema::leads,
    DbPool,
};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("failed to get DB connection: {0}")]
    Pool(#[from] PoolError),
    #[error("database error: {0}")]
    Query(#[from] DieselError),
}

pub struct LeadRepository {
    pool: DbPool
}

impl LeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create_lead(&self, new_lead: &NewLead) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        diesel::insert_into(leads::table)
            .values(new_lead)
            .execute(&mut conn)?;
        Ok(())
    }

    // Newest first
    pub fn list_leads(&self) -> Result<Vec<Lead>, RepositoryError> {
        let mut conn = self.pool.get()?;
        let list = leads::table
            .order((leads::created_at.desc(), leads::id.desc()))
            .select(Lead::as_select())
            .load(&mut conn)?;
        Ok(list)
    }

    pub fn find_by_id(&self, lead_id: i32) -> Result<Option<Lead>, RepositoryError> {
        let mut conn = self.pool.get()?;
        let lead = leads::table
            .find(lead_id)
            .select(Lead::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(lead)
    }

    /// Returns false when no lead has that id.
    pub fn update_status(&self, lead_id: i32, status: LeadStatus) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.get()?;
        let updated = diesel::update(leads::table.find(lead_id))
            .set(leads::status.eq(status.as_str()))
            .execute(&mut conn)?;
        Ok(updated > 0)
    }
}
