use crate::entities::OfferStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OfferRecord {
    pub offer_id: i64,
    pub offerer_user_id: i64,
    pub offerer_game_id: i64,
    pub recipient_user_id: i64,
    pub recipient_game_id: i64,
    pub status: OfferStatus,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

/// The four references that make up a trade proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OfferProposal {
    pub offerer_user_id: i64,
    pub offerer_game_id: i64,
    pub recipient_user_id: i64,
    pub recipient_game_id: i64,
}

impl OfferRecord {
    pub fn proposal(&self) -> OfferProposal {
        OfferProposal {
            offerer_user_id: self.offerer_user_id,
            offerer_game_id: self.offerer_game_id,
            recipient_user_id: self.recipient_user_id,
            recipient_game_id: self.recipient_game_id,
        }
    }
}

const OFFER_COLUMNS: &str = "offer_id, offerer_user_id, offerer_game_id, recipient_user_id, \
     recipient_game_id, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct GetOfferById {
    pub offer_id: i64,
}

impl Processor<GetOfferById> for DatabaseProcessor {
    type Output = Option<OfferRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOfferById")]
    async fn process(&self, query: GetOfferById) -> Result<Option<OfferRecord>, sqlx::Error> {
        sqlx::query_as::<_, OfferRecord>(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers WHERE offer_id = $1"
        ))
        .bind(query.offer_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// List offers, filtered by either or both participants.
pub struct ListOffers {
    pub offerer_user_id: Option<i64>,
    pub recipient_user_id: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

impl Processor<ListOffers> for DatabaseProcessor {
    type Output = Vec<OfferRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListOffers")]
    async fn process(&self, query: ListOffers) -> Result<Vec<OfferRecord>, sqlx::Error> {
        let mut query_builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(format!(
            "SELECT {OFFER_COLUMNS} FROM offers WHERE TRUE"
        ));
        if let Some(offerer) = query.offerer_user_id {
            query_builder.push(" AND offerer_user_id = ").push_bind(offerer);
        }
        if let Some(recipient) = query.recipient_user_id {
            query_builder.push(" AND recipient_user_id = ").push_bind(recipient);
        }
        query_builder
            .push(" ORDER BY offer_id LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        query_builder
            .build_query_as::<OfferRecord>()
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Delete an offer row. Returns whether a row was removed.
pub struct DeleteOffer {
    pub offer_id: i64,
}

impl Processor<DeleteOffer> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteOffer")]
    async fn process(&self, cmd: DeleteOffer) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM offers WHERE offer_id = $1")
            .bind(cmd.offer_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

impl OfferRecord {
    /// Insert an offer already carrying its validated status.
    pub async fn insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        proposal: OfferProposal,
        status: OfferStatus,
    ) -> Result<OfferRecord, sqlx::Error> {
        sqlx::query_as::<_, OfferRecord>(&format!(
            r#"
            INSERT INTO offers
                (offerer_user_id, offerer_game_id, recipient_user_id, recipient_game_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {OFFER_COLUMNS}
            "#
        ))
        .bind(proposal.offerer_user_id)
        .bind(proposal.offerer_game_id)
        .bind(proposal.recipient_user_id)
        .bind(proposal.recipient_game_id)
        .bind(status)
        .fetch_one(&mut **tx)
        .await
    }

    /// Load an offer and hold its row lock until the transaction ends.
    ///
    /// This is what serializes concurrent status updates on one offer.
    pub async fn lock_for_update_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        offer_id: i64,
    ) -> Result<Option<OfferRecord>, sqlx::Error> {
        sqlx::query_as::<_, OfferRecord>(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers WHERE offer_id = $1 FOR UPDATE"
        ))
        .bind(offer_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Update the status within a transaction and return the new row.
    pub async fn set_status_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        offer_id: i64,
        status: OfferStatus,
    ) -> Result<Option<OfferRecord>, sqlx::Error> {
        sqlx::query_as::<_, OfferRecord>(&format!(
            r#"
            UPDATE offers
            SET status = $1, updated_at = NOW()
            WHERE offer_id = $2
            RETURNING {OFFER_COLUMNS}
            "#
        ))
        .bind(status)
        .bind(offer_id)
        .fetch_optional(&mut **tx)
        .await
    }
}
