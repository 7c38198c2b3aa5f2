pub mod presale_contract;
pub mod webhook;

pub use presale_contract::{AlloyPresaleFactory, AlloyPresaleHandle};
pub use webhook::{build_notifier, LogNotifier, Notifier, WebhookNotifier};
