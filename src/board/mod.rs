//! Kanban board client.
//!
//! ## Module Map
//!
//! ```text
//!  drag / CLI ──> view.rs  (DragSession, drop_index, BoardView)
//!                   │ MoveRequest
//!                   v
//!                tasks.rs  (TaskOrchestrator: optimistic apply → persist → repair)
//!                   │
//!                   v
//!                store.rs  (BoardStore: shared snapshot, pending ops, revisions)
//!                   │   └─ snapshot.rs  (BoardSnapshot: pure placement rules)
//!                   │
//!     gateway.rs <──┴──> reconcile.rs <── ws.rs  (push channel, reconnect)
//!   (BoardGateway,                        (PushEvent, ConnectionState)
//!    HttpGateway)
//! ```
//!
//! ## Supporting Modules
//!
//! | Module    | Responsibility                                           |
//! |-----------|----------------------------------------------------------|
//! | `models`  | Wire types: `Board`, `Task`, `Team`, request payloads    |
//! | `session` | Persisted bearer credential + `SessionEvent` broadcast   |
//! | `auth`    | `AuthStore`: login/logout, current user                  |
//! | `teams`   | `TeamStore`: teams and membership                        |

pub mod auth;
pub mod gateway;
pub mod models;
pub mod reconcile;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod tasks;
pub mod teams;
pub mod view;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;
