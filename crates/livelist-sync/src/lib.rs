// File: livelist-sync/src/lib.rs
// Purpose: Main entry point for livelist-sync library

//! # livelist-sync
//!
//! Live paginated lists for the payments admin backend: a page is loaded
//! over REST, then kept current by events pushed over a WebSocket.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use livelist_sync::{
//!     ApiClient, HttpPageSource, LiveList, LiveListConfig, LiveView, MessageBus,
//!     PageQuery, PushChannel, PushChannelConfig, Transaction,
//! };
//!
//! let config = LiveListConfig::load_default()?;
//!
//! // 1. One bus and one push connection for the whole process
//! let bus = MessageBus::new(config.push.bus_capacity);
//! let push = PushChannel::spawn(PushChannelConfig::from(&config), bus.clone());
//!
//! // 2. One view per visible list
//! let source = Arc::new(HttpPageSource::new(ApiClient::new(&config.api)?));
//! let query = PageQuery::new(config.view.page_size).with_filter("status", "pending");
//! let view: LiveView<Transaction> = LiveView::spawn(LiveList::new(query), source, &bus);
//!
//! // 3. Observe snapshots
//! let mut snapshots = view.subscribe();
//! while snapshots.changed().await.is_ok() {
//!     println!("{} records", snapshots.borrow().records.len());
//! }
//! ```

pub mod actions;
pub mod bus;
pub mod collection;
pub mod compression;
pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod live_list;
pub mod record;
pub mod source;
pub mod transport;
pub mod view;

// Re-export main types
pub use actions::{assignee_for, AdminActions, TransactionAction};
pub use bus::{MessageBus, Subscription};
pub use collection::RecordCollection;
pub use config::{LiveListConfig, StaleResponsePolicy};
pub use error::{extract_error_message, Result, SyncError};
pub use event::{EventEffect, Notification, PushEvent, PushFrame};
pub use http::{ApiClient, HttpPageSource, RetryPolicy};
pub use live_list::{ApplyOutcome, ListSnapshot, LiveList, LoadOutcome, LoadState, LoadTicket};
pub use record::{
    CommissionPayment, Device, FcmLog, MomoPayTransaction, Record, RecordId, RecordKind, SmsLog,
    TopUpRequest, Transaction, TransactionLog, WaveBusinessTransaction,
};
pub use source::{PageQuery, PageResponse, PageSource, Sort, SortDirection};
pub use transport::{ConnectionStatus, PushChannel, PushChannelConfig};
pub use view::{LiveView, ViewCommand, ViewEvent};
