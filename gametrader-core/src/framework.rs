use sqlx::PgPool;

/// Entry point for every SQL query and command.
///
/// Each query is a plain struct with a `kanau::processor::Processor` impl on
/// this type, so callers read as `processor.process(GetOfferById { .. })`.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
