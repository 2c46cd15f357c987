use sqlx::SqlitePool;

pub mod actions;
pub mod agents;
pub mod domains;
pub mod migrations;
pub mod pings;

pub type Db = SqlitePool;

pub use actions::{ActionRecord, NewAction};
pub use agents::{AgentRecord, NewAgent};
pub use domains::{
    DomainRecord, DomainRouteRecord, NewDomain, NewDomainRoute, UpdatedDomain, UpdatedDomainRoute,
};
pub use pings::PingRecord;
