// /stayhub/services/booking-service/src/repository/mod.rs

pub mod audit;
pub mod booking;
pub mod payment;
pub mod property;

use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;

/// Main repository struct combining all repositories
pub struct Repository {
    pub pool: PgPool,
    booking_repo: Arc<booking::BookingRepository>,
    property_repo: Arc<property::PropertyRepository>,
    payment_repo: Arc<payment::PaymentRepository>,
    audit_repo: Arc<audit::AuditRepository>,
}

impl Repository {
    /// Create new repository instance
    pub fn new(pool: PgPool) -> Self {
        Self {
            booking_repo: Arc::new(booking::BookingRepository::new(pool.clone())),
            property_repo: Arc::new(property::PropertyRepository::new(pool.clone())),
            payment_repo: Arc::new(payment::PaymentRepository::new(pool.clone())),
            audit_repo: Arc::new(audit::AuditRepository::new(pool.clone())),
            pool,
        }
    }

    pub fn booking(&self) -> &booking::BookingRepository {
        &self.booking_repo
    }

    pub fn property(&self) -> &property::PropertyRepository {
        &self.property_repo
    }

    pub fn payment(&self) -> &payment::PaymentRepository {
        &self.payment_repo
    }

    pub fn audit(&self) -> &audit::AuditRepository {
        &self.audit_repo
    }

    /// Begin database transaction
    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }
}
