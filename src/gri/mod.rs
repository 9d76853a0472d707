//! Genomic Range Index: schema installation (§4.2) and query compilation
//! (§4.3).

pub mod query;
pub mod schema;

pub use query::genomic_range_rowids_sql;
pub use schema::create_genomic_range_index_sql;
