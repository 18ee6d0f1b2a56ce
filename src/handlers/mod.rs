pub mod common;
pub mod delivery_notes;
pub mod health;
pub mod orders;
pub mod quotes;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    notifications::DocumentMailer,
    services::{
        conversions::ConversionService, delivery_notes::DeliveryNoteService,
        orders::OrderService, quotes::QuoteService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub quotes: Arc<QuoteService>,
    pub orders: Arc<OrderService>,
    pub delivery_notes: Arc<DeliveryNoteService>,
    pub conversions: Arc<ConversionService>,
    pub mailer: Arc<DocumentMailer>,
}

impl AppServices {
    /// Wire every service against one connection pool and event channel.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        config: &AppConfig,
        mailer: DocumentMailer,
    ) -> Self {
        let quotes = QuoteService::new(db_pool.clone(), event_sender.clone())
            .with_retention(config.quote_retention());
        let orders = OrderService::new(db_pool.clone(), event_sender.clone())
            .with_code_width(config.code_padding);
        let delivery_notes = DeliveryNoteService::new(db_pool.clone(), event_sender.clone());
        let conversions = ConversionService::new(db_pool, event_sender)
            .with_code_width(config.code_padding)
            .with_remission_source_states(config.remission_source_states());

        Self {
            quotes: Arc::new(quotes),
            orders: Arc::new(orders),
            delivery_notes: Arc::new(delivery_notes),
            conversions: Arc::new(conversions),
            mailer: Arc::new(mailer),
        }
    }
}
