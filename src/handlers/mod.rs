pub mod budgets;
pub mod orders;
pub mod pricing;
pub mod receivables;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::directory::{Catalog, DbDirectory, Directory};
use crate::events::EventSender;
use crate::services::{
    budgets::BudgetService, commissions::CommissionService, conversion::ConversionService,
    locks::LedgerLocks, orders::OrderService, pricing::PricingSettingsService,
    receivables::LedgerService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer used by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub pricing_settings: Arc<PricingSettingsService>,
    pub budgets: Arc<BudgetService>,
    pub conversion: Arc<ConversionService>,
    pub orders: Arc<OrderService>,
    pub ledger: Arc<LedgerService>,
    pub commissions: Arc<CommissionService>,
}

impl AppServices {
    /// Wires every service against the database-backed directory and catalog.
    /// Order-scoped services share one lock table.
    pub fn new(
        db_pool: Arc<DbPool>,
        config: Arc<AppConfig>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        let db_directory = Arc::new(DbDirectory::new(db_pool.clone()));
        let directory: Arc<dyn Directory> = db_directory.clone();
        let catalog: Arc<dyn Catalog> = db_directory;
        let locks = LedgerLocks::new();

        let commissions = CommissionService::new(
            db_pool.clone(),
            directory.clone(),
            config.commissions.clone(),
            locks.clone(),
            event_sender.clone(),
        );
        let budgets = BudgetService::new(
            db_pool.clone(),
            catalog,
            directory.clone(),
            config.clone(),
            event_sender.clone(),
        );
        let conversion = ConversionService::new(
            db_pool.clone(),
            directory,
            commissions.clone(),
            config,
            event_sender.clone(),
        );
        let orders = OrderService::new(
            db_pool.clone(),
            commissions.clone(),
            locks.clone(),
            event_sender.clone(),
        );
        let ledger = LedgerService::new(db_pool.clone(), locks, event_sender);

        Self {
            pricing_settings: Arc::new(PricingSettingsService::new(db_pool)),
            budgets: Arc::new(budgets),
            conversion: Arc::new(conversion),
            orders: Arc::new(orders),
            ledger: Arc::new(ledger),
            commissions: Arc::new(commissions),
        }
    }
}
