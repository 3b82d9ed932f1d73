//! # dremio-sql
//!
//! A library for running SQL against a Dremio cluster and for finding the tables a query reads
//! or writes without executing it.
//!
//! # Features
//!
//! - Submit SQL through the REST API and wait for the job to finish, with an optional timeout.
//! - Fetch a page of the job results along with their schema.
//! - Parse Dremio SQL into a generic syntax tree with named, ordered children.
//! - Extract table references as their path of identifiers, honoring `"quoted.names"`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use dremio_sql::{
//!     client::DremioClient,
//!     config::{ClusterConfig, Credentials},
//!     job::RunOptions,
//!     references::extract_table_references,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     env_logger::init();
//!
//!     let sql = r#"
//!         select c.id, sum(o.total)
//!         from "@analyst"."sales.2024".orders o
//!         inner join crm.customers c on o.customer_id = c.id
//!         group by c.id
//!     "#;
//!     for reference in extract_table_references(sql)? {
//!         println!("{:?}", reference.segments());
//!     }
//!
//!     let credentials = Credentials {
//!         user_name: "dremio".to_owned(),
//!         password: "dremio123".to_owned(),
//!     };
//!     let client = DremioClient::login(&ClusterConfig::new("localhost"), &credentials).await?;
//!     let options = RunOptions {
//!         timeout: Some(Duration::from_secs(60)),
//!         ..RunOptions::default()
//!     };
//!     let results = client.run_query_and_get_results(sql, &options).await?;
//!     println!("{} rows", results.row_count);
//!     Ok(())
//! }
//! ```
pub mod ast;
pub mod client;
pub mod config;
pub mod error;
pub mod job;
pub mod parser;
pub mod references;
pub mod scanner;
pub mod test_utils;

pub use error::{Error, Result};
