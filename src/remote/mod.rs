pub mod factory;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use factory::build_remote_factory;
pub use traits::{PendingPurchase, PresaleHandle, PurchaseReceipt, RemoteFactory};
