pub mod operation;
pub mod reconciler;
pub mod refresh;
pub mod scheduler;

pub use operation::ReconcileOperation;
pub use reconciler::ViewReconciler;
pub use refresh::CatalogRefresh;
pub use scheduler::ReconcileScheduler;
