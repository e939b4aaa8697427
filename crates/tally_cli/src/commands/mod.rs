pub(crate) mod ingest;
pub(crate) mod limits;
pub(crate) mod meta;
pub(crate) mod migrate;
pub(crate) mod repo;
