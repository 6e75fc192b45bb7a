// Pure pricing pipeline
pub mod aggregation;
pub mod discount;
pub mod line_items;
pub mod pricing;

// Budget and order lifecycle
pub mod budgets;
pub mod conversion;
pub mod orders;
pub mod sequence;

// Settlement
pub mod commissions;
pub mod locks;
pub mod receivables;
