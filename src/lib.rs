//! sqlmapper: an XML-driven SQL mapping framework
//!
//! Statements are declared in XML mapper catalogs and resolved at runtime
//! into a dynamically assembled SQL string plus bound arguments, executed
//! through a layered handler pipeline over pooled sessions (with
//! transaction affinity), and materialised into user-defined aggregate
//! types.

pub mod bind;
pub mod catalog;
pub mod context;
pub mod driver;
pub mod engine;
pub mod error;
pub mod eval;
pub mod executor;
pub mod node;
pub mod param;
pub mod pool;
pub mod scope;
pub mod session;
pub mod statement;
pub mod util;
pub mod value;

pub use bind::{bind_list, bind_list_with, bind_one, FromRow, FromValue, RowIter};
pub use catalog::{load_catalog, parse_mapper_str, Catalog, Mapper, Settings};
pub use context::Context;
pub use driver::{driver_named, register_driver, Driver, Translator};
pub use engine::{key_of, nested_transaction, transaction, Engine, Manager, TxManager};
pub use error::{Error, Result};
pub use param::ParamView;
pub use executor::{
    DebugMiddleware, Executor, Middleware, PreparedHandler, TimeoutMiddleware,
};
pub use pool::{Environments, SessionFactory};
pub use session::{
    ExecResult, MemoryRows, PreparedStatement, Rows, Session, Transaction,
};
pub use statement::{Action, Statement};
pub use value::Value;
