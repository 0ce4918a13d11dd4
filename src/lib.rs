// Sales Ledger - Core Library
// One durable ledger shared by the chat bot, the web dashboard and the CLI

pub mod bot;
pub mod config;
pub mod csv_io;
pub mod ledger;
pub mod logging;
pub mod parser;
pub mod record;
pub mod summary;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use bot::{confirmation, BotAdapter, SendMessage, Update};
pub use config::{Config, ConfigError, ServerConfig};
pub use csv_io::{load_sales_csv, read_sales_csv, write_sales_csv};
pub use ledger::{read_records, Ledger, StorageError};
pub use logging::init_tracing;
pub use parser::{Grammar, ParseError, ParseFailure, SaleFields};
pub use record::{Amount, Record, Source, RIEL};
pub use summary::{ItemTotal, Summary};

#[cfg(feature = "server")]
pub use server::{build_router, ApiResponse, AppState, GrammarInfo, NewSale};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
