pub mod query_warmup;
